use super::{is_json, ApiClient, ApiError, HealthProbe};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub timestamp: Option<serde_json::Value>,
}

impl ApiClient {
    /// `GET /health`. Anything but a JSON `{"status": "ok"}` counts as unhealthy.
    pub async fn check_health(&self) -> Result<bool, ApiError> {
        let resp = self
            .authorize(self.http.get(self.url("/health")))
            .send()
            .await?;

        if !resp.status().is_success() {
            tracing::warn!("API health check returned status {}", resp.status().as_u16());
            return Ok(false);
        }

        // An HTML page here usually means the backend is not running behind this URL.
        if !is_json(&resp) {
            tracing::warn!(
                url = %self.base_url,
                "API health check returned non-JSON content"
            );
            return Ok(false);
        }

        let data: HealthResponse = resp
            .json()
            .await
            .map_err(|e| ApiError::Parse(e.to_string()))?;
        if data.status != "ok" {
            tracing::warn!(message = %data.message, "API reported status {}", data.status);
        }
        Ok(data.status == "ok")
    }
}

#[async_trait::async_trait]
impl HealthProbe for ApiClient {
    async fn probe(&self) -> bool {
        match self.check_health().await {
            Ok(healthy) => healthy,
            Err(e) => {
                tracing::warn!(url = %self.base_url, "API health check failed: {}", e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::api::{ApiClient, HealthProbe};
    use crate::test_support::MockServer;

    async fn probe_with(status: u16, content_type: &'static str, body: &'static str) -> bool {
        let server = MockServer::start().await;
        let client = ApiClient::new(server.base_url.clone(), Some("k".into()));
        let handle = tokio::spawn(server.respond_once(status, content_type, body));
        let healthy = client.probe().await;
        let request = handle.await.unwrap();
        assert!(request.starts_with("GET /health HTTP/1.1"));
        healthy
    }

    #[tokio::test]
    async fn test_ok_status_is_healthy() {
        assert!(
            probe_with(
                200,
                "application/json",
                r#"{"status":"ok","message":"up","timestamp":1700000000000}"#
            )
            .await
        );
    }

    #[tokio::test]
    async fn test_error_status_is_unhealthy() {
        assert!(!probe_with(200, "application/json", r#"{"status":"error","message":"db down"}"#).await);
        assert!(!probe_with(503, "application/json", r#"{"status":"ok"}"#).await);
    }

    #[tokio::test]
    async fn test_html_response_is_unhealthy() {
        assert!(!probe_with(200, "text/html", "<html>vite dev server</html>").await);
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_unhealthy() {
        let server = MockServer::start().await;
        let client = ApiClient::new(server.base_url.clone(), None);
        drop(server);
        assert!(!client.probe().await);
    }
}
