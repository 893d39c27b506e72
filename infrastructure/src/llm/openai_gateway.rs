//! OpenAI-compatible chat completions gateway
//!
//! Every provider is reached through the `/chat/completions` endpoint of an
//! OpenAI-compatible API; the binding's provider only picks the default
//! base URL and whether an API key is required.

use super::sse::{SseDecoder, SsePayload};
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::{Client, StatusCode, Url};
use roundtable_application::ports::llm_gateway::{GatewayError, LlmGateway, StreamHandle};
use roundtable_domain::core::string::preview;
use roundtable_domain::{ChatMessage, ChatRequest, LlmBinding, StreamEvent};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, warn};

/// Sent when a local provider needs no key; many servers still want the header.
const PLACEHOLDER_API_KEY: &str = "sk-placeholder";

/// Connection settings shared by every call of a gateway.
#[derive(Debug, Clone, PartialEq)]
pub struct GatewaySettings {
    /// Per-request timeout.
    pub timeout: Duration,
    /// Retries after the first attempt for transient failures.
    pub max_retries: u32,
    /// Delay before the first retry; doubles on each further retry.
    pub base_delay: Duration,
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(180),
            max_retries: 6,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl GatewaySettings {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }
}

// ==================== Wire types ====================

#[derive(Serialize)]
struct CompletionBody<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    stream: bool,
}

#[derive(Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<CompletionChoice>,
}

#[derive(Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Deserialize)]
struct CompletionMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
}

#[derive(Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: Option<StreamDelta>,
}

#[derive(Deserialize)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
}

// ==================== Base URLs ====================

/// Default API root for a provider without a configured base URL.
pub fn default_base_url(provider: &str) -> &'static str {
    match provider.trim().to_lowercase().as_str() {
        "ollama" | "ollama_chat" => "http://localhost:11434/v1",
        "vllm" => "http://localhost:8000/v1",
        "deepseek" => "https://api.deepseek.com/v1",
        _ => "https://api.openai.com/v1",
    }
}

/// Append `/v1` to a base URL that has no path.
///
/// Many self-hosted gateways serve a web UI at the root and the API under
/// `/v1`. URLs that already carry a path are kept as they are.
pub fn normalize_base_url(url: &str) -> String {
    let trimmed = url.trim().trim_end_matches('/');
    match Url::parse(trimmed) {
        Ok(parsed) if parsed.path().is_empty() || parsed.path() == "/" => {
            format!("{trimmed}/v1")
        }
        _ => trimmed.to_string(),
    }
}

fn base_url(binding: &LlmBinding) -> String {
    binding
        .base_url
        .as_deref()
        .filter(|url| !url.trim().is_empty())
        .map(normalize_base_url)
        .unwrap_or_else(|| default_base_url(&binding.provider).to_string())
}

// ==================== Gateway ====================

/// LLM gateway for any OpenAI-compatible endpoint.
pub struct OpenAiCompatibleGateway {
    client: Client,
    settings: GatewaySettings,
}

impl OpenAiCompatibleGateway {
    pub fn new(settings: GatewaySettings) -> Result<Self, GatewayError> {
        let client = Client::builder()
            .timeout(settings.timeout)
            .build()
            .map_err(|e| GatewayError::ConnectionError(e.to_string()))?;
        Ok(Self { client, settings })
    }

    pub fn settings(&self) -> &GatewaySettings {
        &self.settings
    }

    async fn send(
        &self,
        binding: &LlmBinding,
        request: &ChatRequest,
        stream: bool,
    ) -> Result<reqwest::Response, GatewayError> {
        let url = format!("{}/chat/completions", base_url(binding));
        let body = CompletionBody {
            model: &binding.model,
            messages: &request.messages,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            stream,
        };
        let api_key = binding.api_key.as_deref().unwrap_or(PLACEHOLDER_API_KEY);

        debug!("POST {} ({}, stream: {})", url, binding, stream);
        let response = self
            .client
            .post(&url)
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let text = response.text().await.unwrap_or_default();
        Err(status_error(status, binding, &text))
    }

    async fn complete(
        &self,
        binding: &LlmBinding,
        request: &ChatRequest,
    ) -> Result<String, GatewayError> {
        let response = self.send(binding, request, false).await?;
        let text = response.text().await.map_err(map_transport_error)?;
        parse_completion(&text, binding)
    }

    /// Run `op` until it succeeds, fails permanently, or runs out of retries.
    async fn with_retry<T, F, Fut>(&self, binding: &LlmBinding, mut op: F) -> Result<T, GatewayError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, GatewayError>>,
    {
        let attempts = self.settings.max_retries + 1;
        let mut delay = self.settings.base_delay;
        let mut attempt = 1;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() && attempt < attempts => {
                    warn!(
                        "LLM call {} failed (attempt {}/{}): {}, retrying in {:?}",
                        binding, attempt, attempts, e, delay
                    );
                    tokio::time::sleep(delay).await;
                    delay = delay.saturating_mul(2);
                    attempt += 1;
                }
                Err(e) => {
                    error!("LLM call {} failed after {} attempts: {}", binding, attempt, e);
                    return Err(e);
                }
            }
        }
    }
}

#[async_trait]
impl LlmGateway for OpenAiCompatibleGateway {
    async fn chat(&self, binding: &LlmBinding, request: &ChatRequest) -> Result<String, GatewayError> {
        check_credentials(binding)?;
        self.with_retry(binding, || self.complete(binding, request))
            .await
    }

    async fn chat_streaming(
        &self,
        binding: &LlmBinding,
        request: &ChatRequest,
    ) -> Result<StreamHandle, GatewayError> {
        check_credentials(binding)?;
        let response = self
            .with_retry(binding, || self.send(binding, request, true))
            .await?;

        let (tx, rx) = mpsc::channel(64);
        let label = binding.to_string();
        tokio::spawn(async move {
            let mut bytes = response.bytes_stream();
            let mut decoder = SseDecoder::new();
            let mut full_text = String::new();

            while let Some(chunk) = bytes.next().await {
                let chunk = match chunk {
                    Ok(chunk) => chunk,
                    Err(e) => {
                        warn!("Stream from {} broke: {}", label, e);
                        let _ = tx.send(StreamEvent::Error(e.to_string())).await;
                        return;
                    }
                };
                for payload in decoder.push(&chunk) {
                    if !forward(payload, &tx, &mut full_text).await {
                        return;
                    }
                }
            }
            if let Some(payload) = decoder.finish() {
                if !forward(payload, &tx, &mut full_text).await {
                    return;
                }
            }
            let _ = tx.send(StreamEvent::Completed(full_text)).await;
        });

        Ok(StreamHandle::new(rx))
    }
}

/// Forward one SSE payload; false once the stream is over or the
/// receiver is gone.
async fn forward(
    payload: SsePayload,
    tx: &mpsc::Sender<StreamEvent>,
    full_text: &mut String,
) -> bool {
    match payload {
        SsePayload::Done => {
            let _ = tx
                .send(StreamEvent::Completed(std::mem::take(full_text)))
                .await;
            false
        }
        SsePayload::Data(data) => match delta_text(&data) {
            Some(delta) if !delta.is_empty() => {
                full_text.push_str(&delta);
                tx.send(StreamEvent::Delta(delta)).await.is_ok()
            }
            _ => true,
        },
    }
}

fn delta_text(data: &str) -> Option<String> {
    let chunk: StreamChunk = serde_json::from_str(data).ok()?;
    chunk
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.delta)
        .and_then(|delta| delta.content)
}

fn check_credentials(binding: &LlmBinding) -> Result<(), GatewayError> {
    if binding.is_missing_credentials() {
        return Err(GatewayError::MissingCredentials(binding.to_string()));
    }
    Ok(())
}

fn parse_completion(text: &str, binding: &LlmBinding) -> Result<String, GatewayError> {
    let lowered = text.trim_start().to_lowercase();
    if lowered.starts_with("<!doctype") || lowered.starts_with("<html") {
        return Err(GatewayError::InvalidResponse(format!(
            "{} returned an HTML page instead of JSON; check the base URL ({})",
            binding,
            base_url(binding)
        )));
    }
    let response: CompletionResponse = serde_json::from_str(text)
        .map_err(|e| GatewayError::InvalidResponse(format!("{}: {}", e, preview(text, 200))))?;
    response
        .choices
        .into_iter()
        .next()
        .map(|choice| choice.message.content.unwrap_or_default())
        .ok_or_else(|| GatewayError::InvalidResponse("response has no choices".to_string()))
}

fn map_transport_error(e: reqwest::Error) -> GatewayError {
    if e.is_timeout() {
        GatewayError::Timeout
    } else if e.is_connect() {
        GatewayError::ConnectionError(e.to_string())
    } else {
        GatewayError::RequestFailed(e.to_string())
    }
}

fn status_error(status: StatusCode, binding: &LlmBinding, body: &str) -> GatewayError {
    let detail = format!("HTTP {}: {}", status.as_u16(), preview(body, 300));
    match status {
        StatusCode::NOT_FOUND => GatewayError::ModelNotAvailable(format!("{binding} ({detail})")),
        StatusCode::TOO_MANY_REQUESTS => GatewayError::RequestFailed(detail),
        s if s.is_server_error() => GatewayError::RequestFailed(detail),
        _ => GatewayError::Other(detail),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_base_url() {
        assert_eq!(normalize_base_url("https://oneapi.example.com"), "https://oneapi.example.com/v1");
        assert_eq!(normalize_base_url("https://oneapi.example.com/"), "https://oneapi.example.com/v1");
        assert_eq!(
            normalize_base_url("https://generativelanguage.googleapis.com/v1beta/openai/"),
            "https://generativelanguage.googleapis.com/v1beta/openai"
        );
        assert_eq!(normalize_base_url("http://localhost:8000/v1"), "http://localhost:8000/v1");
    }

    #[test]
    fn test_base_url_falls_back_to_provider_default() {
        assert_eq!(base_url(&LlmBinding::new("ollama", "qwen")), "http://localhost:11434/v1");
        assert_eq!(base_url(&LlmBinding::new("openai", "gpt-4o")), "https://api.openai.com/v1");
        let custom = LlmBinding::new("openai", "gpt-4o").with_base_url("http://proxy:3000");
        assert_eq!(base_url(&custom), "http://proxy:3000/v1");
        let blank = LlmBinding::new("vllm", "m").with_base_url("  ");
        assert_eq!(base_url(&blank), "http://localhost:8000/v1");
    }

    #[test]
    fn test_parse_completion() {
        let binding = LlmBinding::new("openai", "gpt-4o");
        let json = r#"{"choices":[{"message":{"role":"assistant","content":"你好"}}]}"#;
        assert_eq!(parse_completion(json, &binding).unwrap(), "你好");

        let html = "<!DOCTYPE html><html><body>admin</body></html>";
        assert!(matches!(
            parse_completion(html, &binding),
            Err(GatewayError::InvalidResponse(_))
        ));
        assert!(matches!(
            parse_completion(r#"{"choices":[]}"#, &binding),
            Err(GatewayError::InvalidResponse(_))
        ));
    }

    #[test]
    fn test_delta_text() {
        assert_eq!(
            delta_text(r#"{"choices":[{"delta":{"content":"ab"}}]}"#).as_deref(),
            Some("ab")
        );
        assert_eq!(delta_text(r#"{"choices":[{"delta":{"role":"assistant"}}]}"#), None);
        assert_eq!(delta_text("not json"), None);
    }

    #[test]
    fn test_status_errors() {
        let binding = LlmBinding::new("openai", "gpt-4o");
        assert!(matches!(
            status_error(StatusCode::NOT_FOUND, &binding, ""),
            GatewayError::ModelNotAvailable(_)
        ));
        assert!(status_error(StatusCode::TOO_MANY_REQUESTS, &binding, "").is_transient());
        assert!(status_error(StatusCode::BAD_GATEWAY, &binding, "").is_transient());
        assert!(!status_error(StatusCode::UNAUTHORIZED, &binding, "bad key").is_transient());
    }

    #[tokio::test]
    async fn test_missing_credentials_fail_without_request() {
        let gateway = OpenAiCompatibleGateway::new(GatewaySettings::default()).unwrap();
        let request = ChatRequest::prompt("s", "u");

        let result = gateway.chat(&LlmBinding::new("openai", "gpt-4o"), &request).await;

        assert_eq!(
            result,
            Err(GatewayError::MissingCredentials("openai/gpt-4o".to_string()))
        );
    }

    #[tokio::test]
    async fn test_retry_stops_on_permanent_error() {
        let gateway = OpenAiCompatibleGateway::new(
            GatewaySettings::default().with_base_delay(Duration::from_millis(1)),
        )
        .unwrap();
        let binding = LlmBinding::new("ollama", "m");
        let calls = std::sync::atomic::AtomicU32::new(0);

        let result: Result<(), _> = gateway
            .with_retry(&binding, || {
                calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                async { Err(GatewayError::Other("HTTP 400".to_string())) }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retry_recovers_from_transient_errors() {
        let gateway = OpenAiCompatibleGateway::new(
            GatewaySettings::default()
                .with_max_retries(3)
                .with_base_delay(Duration::from_millis(1)),
        )
        .unwrap();
        let binding = LlmBinding::new("ollama", "m");
        let calls = std::sync::atomic::AtomicU32::new(0);

        let result = gateway
            .with_retry(&binding, || {
                let n = calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(GatewayError::Timeout)
                    } else {
                        Ok("ok")
                    }
                }
            })
            .await;

        assert_eq!(result, Ok("ok"));
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 3);
    }
}
