use crate::api::ServiceError;
use serde::Serialize;

#[derive(Debug, thiserror::Error)]
pub enum WidgetError {
    #[error(transparent)]
    Service(#[from] ServiceError),
    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    Validation(String),
    #[error("Message cannot be sent: {0}")]
    NotSendable(String),
    #[error("Unknown setting key: {0}")]
    UnknownSetting(String),
}

impl WidgetError {
    /// Text shown in place of a bot reply that failed.
    pub fn reply_text(&self) -> String {
        match self {
            WidgetError::Service(e) => format!(
                "Sorry, I couldn't complete that request. {} ({})",
                e.message, e.source
            ),
            other => format!("Sorry, something went wrong: {}", other),
        }
    }
}

impl Serialize for WidgetError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}
