use super::{
    check_status, ApiClient, ApiError, ChatResponse, DocumentUploader, HistoryEntry, ServiceError,
};
use crate::config::PDF_MIME;
use crate::db::models::RemoteDocument;
use crate::stream::FragmentStream;
use crate::upload::file::FileCandidate;
use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Serialize};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct QaPayload<'a> {
    file_uri: &'a str,
    question: &'a str,
    history: &'a [HistoryEntry],
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UploadResponse {
    file_uri: Option<String>,
    mime_type: Option<String>,
}

impl ApiClient {
    /// `POST /documents/upload` as multipart with a single `file` field.
    pub async fn upload_pdf(&self, file: &FileCandidate) -> Result<RemoteDocument, ServiceError> {
        let result: Result<RemoteDocument, ApiError> = async {
            let part = Part::bytes(file.data.clone())
                .file_name(file.name.clone())
                .mime_str(&file.mime_type)?;
            let form = Form::new().part("file", part);

            let req = self
                .authorize(self.http.post(self.url("/documents/upload")))
                .multipart(form);
            let resp = check_status(req.send().await?).await?;
            let data: UploadResponse = resp
                .json()
                .await
                .map_err(|e| ApiError::Parse(e.to_string()))?;

            let file_uri = data.file_uri.filter(|u| !u.is_empty()).ok_or_else(|| {
                ApiError::Backend("Failed to upload PDF: No file URI returned".to_string())
            })?;
            Ok(RemoteDocument {
                file_uri,
                mime_type: data.mime_type.unwrap_or_else(|| PDF_MIME.to_string()),
            })
        }
        .await;

        result.map_err(|e| {
            tracing::warn!(file = %file.name, "PDF upload failed: {}", e);
            ServiceError::new("Failed to upload PDF", e)
        })
    }

    /// `POST /documents/qa` and wait for the whole answer.
    pub async fn document_qa(
        &self,
        file_uri: &str,
        question: &str,
        history: &[HistoryEntry],
    ) -> Result<String, ServiceError> {
        let body = QaPayload {
            file_uri,
            question,
            history,
        };
        let result: Result<String, ApiError> = async {
            let resp = check_status(self.post_json("/documents/qa", &body).send().await?).await?;
            let data: ChatResponse = resp
                .json()
                .await
                .map_err(|e| ApiError::Parse(e.to_string()))?;
            data.into_reply()
        }
        .await;

        result.map_err(|e| {
            tracing::warn!("document Q&A failed: {}", e);
            ServiceError::new("Failed to generate document Q&A response", e)
        })
    }

    /// Streaming variant of [`ApiClient::document_qa`]; accepts SSE or a JSON body.
    pub fn stream_document_qa(
        &self,
        file_uri: &str,
        question: &str,
        history: &[HistoryEntry],
    ) -> FragmentStream {
        let body = QaPayload {
            file_uri,
            question,
            history,
        };
        FragmentStream::open(
            self.post_json("/documents/qa", &body),
            "Failed to generate streaming document Q&A response",
            self.pacing.clone(),
        )
    }
}

#[async_trait::async_trait]
impl DocumentUploader for ApiClient {
    async fn upload_document(&self, file: &FileCandidate) -> Result<RemoteDocument, ServiceError> {
        self.upload_pdf(file).await
    }
}
