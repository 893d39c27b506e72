//! LLM Gateway port
//!
//! Defines the interface for communicating with LLM providers.

use async_trait::async_trait;
use roundtable_domain::{ChatRequest, LlmBinding, StreamEvent};
use thiserror::Error;
use tokio::sync::mpsc;

/// Errors that can occur during LLM gateway operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Model not available: {0}")]
    ModelNotAvailable(String),

    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("Timeout")]
    Timeout,

    #[error("Missing credentials for {0}")]
    MissingCredentials(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Other error: {0}")]
    Other(String),
}

impl GatewayError {
    /// Whether retrying the same request may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            GatewayError::ConnectionError(_) | GatewayError::Timeout | GatewayError::RequestFailed(_)
        )
    }
}

/// Gateway for LLM communication
///
/// Each call names the provider binding it should use, so one gateway
/// serves every agent of a discussion. Implementations (adapters) live in
/// the infrastructure layer.
#[async_trait]
pub trait LlmGateway: Send + Sync {
    /// Run a chat completion and return the full response text.
    async fn chat(&self, binding: &LlmBinding, request: &ChatRequest)
    -> Result<String, GatewayError>;

    /// Run a chat completion and stream the response.
    ///
    /// Default implementation calls `chat()` and wraps the result in a single
    /// `Completed` event, so adapters without streaming work unchanged.
    async fn chat_streaming(
        &self,
        binding: &LlmBinding,
        request: &ChatRequest,
    ) -> Result<StreamHandle, GatewayError> {
        let result = self.chat(binding, request).await?;
        let (tx, rx) = mpsc::channel(1);
        let _ = tx.send(StreamEvent::Completed(result)).await;
        Ok(StreamHandle::new(rx))
    }
}

/// Handle for receiving streaming events from an LLM call.
///
/// Wraps an `mpsc::Receiver<StreamEvent>` and provides convenience methods
/// for consuming the stream.
pub struct StreamHandle {
    pub receiver: mpsc::Receiver<StreamEvent>,
}

/// Reported when a stream ends without `Completed` or `Error`.
pub const STREAM_CLOSED_EARLY: &str = "stream closed before completion";

impl StreamHandle {
    pub fn new(receiver: mpsc::Receiver<StreamEvent>) -> Self {
        Self { receiver }
    }

    /// Consume the stream and collect all text into a single string.
    pub async fn collect_text(mut self) -> Result<String, GatewayError> {
        let mut full_text = String::new();
        while let Some(event) = self.receiver.recv().await {
            match event {
                StreamEvent::Delta(chunk) => full_text.push_str(&chunk),
                StreamEvent::Completed(text) => {
                    if full_text.is_empty() {
                        return Ok(text);
                    }
                    return Ok(full_text);
                }
                StreamEvent::Error(e) => {
                    return Err(GatewayError::RequestFailed(e));
                }
            }
        }
        Err(GatewayError::RequestFailed(
            STREAM_CLOSED_EARLY.to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoGateway;

    #[async_trait]
    impl LlmGateway for EchoGateway {
        async fn chat(
            &self,
            binding: &LlmBinding,
            request: &ChatRequest,
        ) -> Result<String, GatewayError> {
            Ok(format!(
                "{}:{}",
                binding.model,
                request.last_user_content().unwrap_or_default()
            ))
        }
    }

    #[tokio::test]
    async fn test_default_streaming_wraps_chat() {
        let binding = LlmBinding::new("ollama", "m1");
        let handle = EchoGateway
            .chat_streaming(&binding, &ChatRequest::prompt("sys", "hi"))
            .await
            .unwrap();
        assert_eq!(handle.collect_text().await.unwrap(), "m1:hi");
    }

    #[tokio::test]
    async fn test_collect_text_prefers_deltas() {
        let (tx, rx) = mpsc::channel(4);
        tx.send(StreamEvent::Delta("ab".into())).await.unwrap();
        tx.send(StreamEvent::Delta("cd".into())).await.unwrap();
        tx.send(StreamEvent::Completed("ignored".into()))
            .await
            .unwrap();
        assert_eq!(StreamHandle::new(rx).collect_text().await.unwrap(), "abcd");
    }

    #[tokio::test]
    async fn test_collect_text_surfaces_stream_error() {
        let (tx, rx) = mpsc::channel(2);
        tx.send(StreamEvent::Delta("partial".into())).await.unwrap();
        tx.send(StreamEvent::Error("boom".into())).await.unwrap();
        let err = StreamHandle::new(rx).collect_text().await.unwrap_err();
        assert_eq!(err, GatewayError::RequestFailed("boom".into()));
    }

    #[tokio::test]
    async fn test_collect_text_rejects_truncated_stream() {
        let (tx, rx) = mpsc::channel(2);
        tx.send(StreamEvent::Delta("partial".into())).await.unwrap();
        drop(tx);
        let err = StreamHandle::new(rx).collect_text().await.unwrap_err();
        assert_eq!(
            err,
            GatewayError::RequestFailed(STREAM_CLOSED_EARLY.to_string())
        );
    }

    #[test]
    fn test_transient_classification() {
        assert!(GatewayError::Timeout.is_transient());
        assert!(!GatewayError::MissingCredentials("x".into()).is_transient());
    }
}
