use std::fmt;
use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;

use super::types::{AppInfo, AppParameters, HistoryRecord, SendMessageRequest};

/// Errors that can occur while talking to the chat backend.
#[derive(Debug)]
pub enum ApiError {
    /// Client misconfigured (missing API key, bad URL). Not retryable.
    Config(String),
    /// Network-level failure (timeout, DNS, connection refused, body read).
    Network(String),
    /// Backend answered with a non-2xx status.
    Api { status: u16, message: String },
    /// A response body could not be decoded.
    Parse(String),
    /// The event receiver was dropped while a stream was being driven.
    ChannelClosed,
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::Config(msg) => write!(f, "config error: {msg}"),
            ApiError::Network(msg) => write!(f, "network error: {msg}"),
            ApiError::Api { status, message } => {
                write!(f, "API error (HTTP {status}): {message}")
            }
            ApiError::Parse(msg) => write!(f, "parse error: {msg}"),
            ApiError::ChannelClosed => write!(f, "channel closed"),
        }
    }
}

impl std::error::Error for ApiError {}

/// Raw response body of a send-message call, as transport chunks.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Vec<u8>, ApiError>> + Send>>;

/// The four backend calls the chat session needs.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Starts a send-message call and hands back its body unread.
    async fn send_message(&self, request: &SendMessageRequest) -> Result<ByteStream, ApiError>;

    /// Full question/answer history of a server-assigned conversation, oldest first.
    async fn conversation_history(
        &self,
        conversation_id: &str,
    ) -> Result<Vec<HistoryRecord>, ApiError>;

    async fn app_info(&self) -> Result<AppInfo, ApiError>;

    async fn app_parameters(&self) -> Result<AppParameters, ApiError>;
}
