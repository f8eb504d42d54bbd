use super::{check_status, ApiClient, ApiError, ChatResponse, HistoryEntry, ServiceError};
use crate::stream::FragmentStream;
use serde::Serialize;

#[derive(Serialize)]
struct ChatPayload<'a> {
    message: &'a str,
    history: &'a [HistoryEntry],
}

impl ApiClient {
    /// `POST /chat` and wait for the whole reply.
    pub async fn chat(&self, message: &str, history: &[HistoryEntry]) -> Result<String, ServiceError> {
        let body = ChatPayload { message, history };
        let result: Result<String, ApiError> = async {
            let resp = check_status(self.post_json("/chat", &body).send().await?).await?;
            let data: ChatResponse = resp
                .json()
                .await
                .map_err(|e| ApiError::Parse(e.to_string()))?;
            data.into_reply()
        }
        .await;

        result.map_err(|e| {
            tracing::warn!("chat request failed: {}", e);
            ServiceError::new("Failed to get chat response", e)
        })
    }

    /// `POST /chat/stream`; the request goes out on first poll.
    pub fn stream_chat(&self, message: &str, history: &[HistoryEntry]) -> FragmentStream {
        let body = ChatPayload { message, history };
        FragmentStream::open(
            self.post_json("/chat/stream", &body),
            "Failed to generate streaming response",
            self.pacing.clone(),
        )
    }
}
