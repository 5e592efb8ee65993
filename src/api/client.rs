//! reqwest implementation of [`ChatBackend`] for the Dify app API.

use async_trait::async_trait;
use futures::StreamExt;
use log::{debug, info, warn};

use super::backend::{ApiError, ByteStream, ChatBackend};
use super::types::{
    ApiErrorBody, AppInfo, AppParameters, BlockingAnswer, HistoryRecord, HistoryResponse,
    MESSAGE_END_EVENT, ResponseMode, SendMessageRequest,
};

pub const DEFAULT_BASE_URL: &str = "https://api.dify.ai/v1";

/// Dify app API client. One instance per app key.
pub struct DifyClient {
    api_key: String,
    base_url: String,
    user: String,
    client: reqwest::Client,
}

impl DifyClient {
    /// Creates a new client.
    ///
    /// # Arguments
    /// * `api_key` - App API key (sent as a bearer token)
    /// * `base_url` - Optional custom base URL (defaults to Dify cloud)
    /// * `user` - End-user identifier, required by the history endpoint
    pub fn new(api_key: String, base_url: Option<String>, user: String) -> Self {
        let base_url = base_url
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();
        Self {
            api_key,
            base_url,
            user,
            client: reqwest::Client::new(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    /// Turns non-2xx responses into `ApiError::Api`, preferring the backend's
    /// own `message` field over the raw body.
    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "unknown error".to_string());
        warn!("Dify API error: {} - {}", status, body);
        let message = serde_json::from_str::<ApiErrorBody>(&body)
            .ok()
            .filter(|b| !b.message.is_empty())
            .map(|b| {
                if b.code.is_empty() {
                    b.message
                } else {
                    format!("{} ({})", b.message, b.code)
                }
            })
            .unwrap_or(body);
        Err(ApiError::Api { status, message })
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, ApiError> {
        let response = self
            .client
            .get(self.url(path))
            .bearer_auth(&self.api_key)
            .query(query)
            .send()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;
        debug!("GET /{} status: {}", path, response.status());

        let response = Self::check_status(response).await?;
        let body = response
            .text()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;
        serde_json::from_str(&body).map_err(|e| ApiError::Parse(format!("/{path}: {e}")))
    }
}

/// Re-frames a blocking answer as the record sequence a stream would have
/// carried, so both modes share one reducer.
fn blocking_as_records(answer: &BlockingAnswer) -> Vec<u8> {
    let body = serde_json::json!({
        "event": "message",
        "answer": answer.answer,
        "conversation_id": answer.conversation_id,
    });
    let end = serde_json::json!({
        "event": MESSAGE_END_EVENT,
        "conversation_id": answer.conversation_id,
    });
    format!("data: {body}\n\ndata: {end}\n\n").into_bytes()
}

#[async_trait]
impl ChatBackend for DifyClient {
    async fn send_message(&self, request: &SendMessageRequest) -> Result<ByteStream, ApiError> {
        let json_body = serde_json::to_string(request)
            .map_err(|e| ApiError::Parse(format!("request serialization failed: {e}")))?;
        info!(
            "Sending message: mode={}, conversation={:?}, query_len={}",
            request.response_mode.as_str(),
            request.conversation_id,
            request.query.len()
        );
        debug!("Raw chat-messages request: {}", json_body);

        let response = self
            .client
            .post(self.url("chat-messages"))
            .bearer_auth(&self.api_key)
            .header("Content-Type", "application/json")
            .body(json_body)
            .send()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;
        debug!("chat-messages response status: {}", response.status());

        let response = Self::check_status(response).await?;

        match request.response_mode {
            ResponseMode::Streaming => {
                let stream = response
                    .bytes_stream()
                    .map(|r| r.map(|b| b.to_vec()).map_err(|e| ApiError::Network(e.to_string())));
                Ok(Box::pin(stream))
            }
            ResponseMode::Blocking => {
                let answer: BlockingAnswer = response
                    .json()
                    .await
                    .map_err(|e| ApiError::Parse(e.to_string()))?;
                let bytes = blocking_as_records(&answer);
                Ok(Box::pin(futures::stream::iter([Ok::<_, ApiError>(bytes)])))
            }
        }
    }

    async fn conversation_history(
        &self,
        conversation_id: &str,
    ) -> Result<Vec<HistoryRecord>, ApiError> {
        let response: HistoryResponse = self
            .get_json(
                "messages",
                &[("conversation_id", conversation_id), ("user", &self.user)],
            )
            .await?;
        info!(
            "Loaded {} history records for conversation {}",
            response.data.len(),
            conversation_id
        );
        if response.has_more {
            warn!("Conversation {} has older turns that were not loaded", conversation_id);
        }
        Ok(response.data)
    }

    async fn app_info(&self) -> Result<AppInfo, ApiError> {
        self.get_json("info", &[]).await
    }

    async fn app_parameters(&self) -> Result<AppParameters, ApiError> {
        self.get_json("parameters", &[]).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let client = DifyClient::new("k".into(), Some("http://host/v1/".into()), "u".into());
        assert_eq!(client.url("info"), "http://host/v1/info");
    }

    #[test]
    fn test_default_base_url() {
        let client = DifyClient::new("k".into(), None, "u".into());
        assert_eq!(client.url("parameters"), "https://api.dify.ai/v1/parameters");
    }

    #[test]
    fn test_blocking_answer_reframed_as_records() {
        let bytes = blocking_as_records(&BlockingAnswer {
            answer: "Hello".to_string(),
            conversation_id: "c-1".to_string(),
        });
        let text = String::from_utf8(bytes).unwrap();
        let records: Vec<&str> = text.split("\n\n").filter(|s| !s.is_empty()).collect();

        assert_eq!(records.len(), 2);
        assert!(records[0].starts_with("data: "));
        assert!(records[0].contains(r#""answer":"Hello""#));
        assert!(records[1].contains(r#""event":"message_end""#));
    }
}
