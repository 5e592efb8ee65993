//! Test utilities shared across the crate.
//!
//! This module is only compiled during tests (`#[cfg(test)]`).

use std::sync::Arc;

use async_trait::async_trait;

use crate::api::{
    ApiError, AppInfo, AppParameters, ByteStream, ChatBackend, HistoryRecord, ResponseMode,
    SendMessageRequest,
};

/// A backend for tests that never touch the network. Every send yields an
/// empty body.
pub struct NoopBackend;

#[async_trait]
impl ChatBackend for NoopBackend {
    async fn send_message(&self, _request: &SendMessageRequest) -> Result<ByteStream, ApiError> {
        Ok(Box::pin(futures::stream::empty::<Result<Vec<u8>, ApiError>>()))
    }

    async fn conversation_history(
        &self,
        _conversation_id: &str,
    ) -> Result<Vec<HistoryRecord>, ApiError> {
        Ok(Vec::new())
    }

    async fn app_info(&self) -> Result<AppInfo, ApiError> {
        Ok(AppInfo::default())
    }

    async fn app_parameters(&self) -> Result<AppParameters, ApiError> {
        Ok(AppParameters::default())
    }
}

/// Creates a test App with a NoopBackend.
pub fn test_app() -> crate::core::state::App {
    crate::core::state::App::new(
        Arc::new(NoopBackend),
        "tester".to_string(),
        ResponseMode::Streaming,
    )
}
