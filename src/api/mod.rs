pub mod chat;
pub mod documents;
pub mod health;

use crate::config::{StreamingSettings, WidgetConfig};
use crate::db::models::{Message, RemoteDocument, Sender};
use crate::upload::file::FileCandidate;
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One prior turn sent along with a request.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct HistoryEntry {
    pub role: Role,
    pub content: String,
}

impl From<&Message> for HistoryEntry {
    fn from(msg: &Message) -> Self {
        HistoryEntry {
            role: match msg.sender {
                Sender::Bot => Role::Assistant,
                Sender::User => Role::User,
            },
            content: msg.content.clone(),
        }
    }
}

/// Body of a non-streaming reply, also used for the JSON fallback of the streaming endpoints.
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct ChatResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub response: String,
    #[serde(default)]
    pub error: Option<String>,
}

impl ChatResponse {
    /// The reply text, or the backend's reason for not giving one.
    pub fn into_reply(self) -> Result<String, ApiError> {
        if self.success && !self.response.is_empty() {
            Ok(self.response)
        } else {
            Err(ApiError::Backend(
                self.error
                    .unwrap_or_else(|| "AI returned empty response".to_string()),
            ))
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("Backend error: {0}")]
    Backend(String),
}

/// A failed backend operation: what the widget was trying to do, and why it failed.
#[derive(Debug, thiserror::Error)]
#[error("{message}: {source}")]
pub struct ServiceError {
    pub message: String,
    #[source]
    pub source: ApiError,
}

impl ServiceError {
    pub fn new(message: impl Into<String>, source: impl Into<ApiError>) -> Self {
        Self {
            message: message.into(),
            source: source.into(),
        }
    }
}

/// Uploads a document so later questions can reference it.
#[async_trait::async_trait]
pub trait DocumentUploader: Send + Sync {
    async fn upload_document(&self, file: &FileCandidate) -> Result<RemoteDocument, ServiceError>;
}

/// A single availability check against the backend.
#[async_trait::async_trait]
pub trait HealthProbe: Send + Sync {
    async fn probe(&self) -> bool;
}

/// Thin HTTP client for the chat backend.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: Client,
    base_url: String,
    api_key: Option<String>,
    pacing: StreamingSettings,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Self {
        let api_key = api_key.filter(|k| !k.is_empty());
        if api_key.is_none() {
            tracing::warn!(
                "no API key configured; requests will be sent without an Authorization header"
            );
        }
        Self {
            http: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            pacing: StreamingSettings::default(),
        }
    }

    pub fn from_config(config: &WidgetConfig) -> Self {
        Self::new(config.api_base_url.clone(), config.api_key.clone())
            .with_pacing(config.pacing.clone())
    }

    pub fn with_pacing(mut self, pacing: StreamingSettings) -> Self {
        self.pacing = pacing;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authorize(&self, req: RequestBuilder) -> RequestBuilder {
        match &self.api_key {
            Some(key) => req.header("Authorization", format!("Bearer {}", key)),
            None => req,
        }
    }

    /// POST with a JSON body and bearer credential.
    fn post_json<T: Serialize + ?Sized>(&self, path: &str, body: &T) -> RequestBuilder {
        self.authorize(
            self.http
                .post(self.url(path))
                .header("Content-Type", "application/json")
                .json(body),
        )
    }
}

/// Turn a non-2xx response into an [`ApiError::Api`], keeping the body for context.
pub(crate) async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response, ApiError> {
    if resp.status().is_success() {
        return Ok(resp);
    }
    let status = resp.status().as_u16();
    let message = resp
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());
    Err(ApiError::Api { status, message })
}

pub(crate) fn is_json(resp: &reqwest::Response) -> bool {
    resp.headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.contains("application/json"))
}
