//! Chat-completion fallback used when the knowledge base has no answer.
//!
//! Every outcome, including transport and provider failures, is turned into
//! an answer string. Nothing is retried.

use crate::config::Credentials;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use vistula_bot_common::{BotError, DiagnosticEvent, DiagnosticSink, Result};

pub const MISSING_KEY_ANSWER: &str =
    "API key not found. Set DEEPSEEK_API_KEY or OPENROUTER_API_KEY.";
pub const UNKNOWN_RESPONSE_ANSWER: &str = "I don't know yet.";
pub const SYSTEM_PROMPT: &str = "You are a helpful assistant for Vistula University students.";

const PREVIEW_CHARS: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    OpenRouter,
    DeepSeek,
}

impl ProviderKind {
    pub fn name(&self) -> &'static str {
        match self {
            ProviderKind::OpenRouter => "openrouter",
            ProviderKind::DeepSeek => "deepseek",
        }
    }

    pub fn default_endpoint(&self) -> &'static str {
        match self {
            ProviderKind::OpenRouter => "https://openrouter.ai/api/v1/chat/completions",
            ProviderKind::DeepSeek => "https://api.deepseek.com/v1/chat/completions",
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            ProviderKind::OpenRouter => "gpt-4o-mini",
            ProviderKind::DeepSeek => "deepseek-chat",
        }
    }
}

#[derive(Clone)]
pub struct ProviderConfig {
    pub kind: ProviderKind,
    pub endpoint: String,
    pub model: String,
    api_key: String,
}

impl ProviderConfig {
    pub fn new(kind: ProviderKind, api_key: impl Into<String>) -> Self {
        Self {
            kind,
            endpoint: kind.default_endpoint().to_string(),
            model: kind.default_model().to_string(),
            api_key: api_key.into(),
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("kind", &self.kind)
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

/// OpenRouter is preferred over DeepSeek when both keys are set.
pub fn select_provider(credentials: &Credentials) -> Option<ProviderConfig> {
    if let Some(key) = &credentials.openrouter_api_key {
        Some(ProviderConfig::new(ProviderKind::OpenRouter, key.clone()))
    } else {
        credentials
            .deepseek_api_key
            .as_ref()
            .map(|key| ProviderConfig::new(ProviderKind::DeepSeek, key.clone()))
    }
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

/// What a provider's response body amounted to.
#[derive(Debug, Clone, PartialEq)]
pub enum CompletionOutcome {
    Answer(String),
    NonJson { preview: String },
    ErrorEnvelope(String),
    Unrecognized,
}

impl CompletionOutcome {
    pub fn category(&self) -> &'static str {
        match self {
            CompletionOutcome::Answer(_) => "answer",
            CompletionOutcome::NonJson { .. } => "non_json",
            CompletionOutcome::ErrorEnvelope(_) => "error_envelope",
            CompletionOutcome::Unrecognized => "unrecognized",
        }
    }

    pub fn into_answer(self) -> String {
        match self {
            CompletionOutcome::Answer(answer) => answer,
            CompletionOutcome::NonJson { preview } => format!(
                "API returned non-JSON response. Content starts with:\n{}",
                preview
            ),
            CompletionOutcome::ErrorEnvelope(error) => format!("API error: {}", error),
            CompletionOutcome::Unrecognized => UNKNOWN_RESPONSE_ANSWER.to_string(),
        }
    }
}

/// Reads a 2xx response body. Understands `choices[0].message.content`
/// and a flat `result` field; empty content counts as missing.
pub fn interpret_response(body: &str) -> CompletionOutcome {
    let data: Value = match serde_json::from_str(body) {
        Ok(data) => data,
        Err(_) => {
            return CompletionOutcome::NonJson {
                preview: body.chars().take(PREVIEW_CHARS).collect(),
            }
        }
    };

    let content = match data.get("choices").and_then(Value::as_array) {
        Some(choices) if !choices.is_empty() => choices[0]
            .get("message")
            .and_then(|message| message.get("content"))
            .and_then(Value::as_str),
        _ => data.get("result").and_then(Value::as_str),
    };

    if let Some(answer) = content.filter(|answer| !answer.is_empty()) {
        return CompletionOutcome::Answer(answer.trim().to_string());
    }

    match data.get("error") {
        Some(Value::String(message)) => CompletionOutcome::ErrorEnvelope(message.clone()),
        Some(error) => CompletionOutcome::ErrorEnvelope(error.to_string()),
        None => CompletionOutcome::Unrecognized,
    }
}

pub struct LlmClient {
    provider: Option<ProviderConfig>,
    client: reqwest::Client,
    sink: Arc<dyn DiagnosticSink>,
}

impl LlmClient {
    pub fn new(
        provider: Option<ProviderConfig>,
        timeout: Duration,
        sink: Arc<dyn DiagnosticSink>,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BotError::Configuration(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            provider,
            client,
            sink,
        })
    }

    pub fn provider(&self) -> Option<&ProviderConfig> {
        self.provider.as_ref()
    }

    pub async fn complete(&self, question: &str) -> String {
        let provider = match &self.provider {
            Some(provider) => provider,
            None => {
                self.sink.record(DiagnosticEvent::ProviderMissing);
                return MISSING_KEY_ANSWER.to_string();
            }
        };

        self.sink.record(DiagnosticEvent::ProviderSelected {
            provider: provider.kind.name().to_string(),
            model: provider.model.clone(),
        });

        let request = ChatCompletionRequest {
            model: &provider.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: question,
                },
            ],
            stream: false,
        };

        let body = match self.send(provider, &request).await {
            Ok(body) => body,
            Err(e) => {
                let detail = match e {
                    BotError::Upstream(detail) => detail,
                    other => other.to_string(),
                };
                self.record_failure(provider, "request", &detail);
                return format!("API request error: {}", detail);
            }
        };

        let outcome = interpret_response(&body);
        match &outcome {
            CompletionOutcome::Answer(_) => {
                self.sink.record(DiagnosticEvent::UpstreamAnswered {
                    provider: provider.kind.name().to_string(),
                });
            }
            other => {
                let detail: String = body.chars().take(PREVIEW_CHARS).collect();
                self.record_failure(provider, other.category(), &detail);
            }
        }
        outcome.into_answer()
    }

    // Transport failures and non-2xx statuses both surface as upstream errors.
    async fn send(&self, provider: &ProviderConfig, request: &ChatCompletionRequest<'_>) -> Result<String> {
        let response = self
            .client
            .post(&provider.endpoint)
            .bearer_auth(&provider.api_key)
            .json(request)
            .send()
            .await
            .map_err(upstream_error)?;

        response
            .error_for_status()
            .map_err(upstream_error)?
            .text()
            .await
            .map_err(upstream_error)
    }

    fn record_failure(&self, provider: &ProviderConfig, category: &str, detail: &str) {
        self.sink.record(DiagnosticEvent::UpstreamFailure {
            provider: provider.kind.name().to_string(),
            category: category.to_string(),
            detail: detail.to_string(),
        });
    }
}

fn upstream_error(e: reqwest::Error) -> BotError {
    BotError::Upstream(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        http::{header::AUTHORIZATION, HeaderMap, StatusCode},
        routing::post,
        Router,
    };
    use std::sync::Mutex;
    use vistula_bot_common::{MemorySink, NullSink};

    type Captured = Arc<Mutex<Vec<(Option<String>, Value)>>>;

    // Imitates a provider endpoint and records what it was sent.
    async fn spawn_upstream(status: StatusCode, reply: &'static str, delay: Duration) -> (String, Captured) {
        let captured: Captured = Arc::new(Mutex::new(Vec::new()));
        let recorder = captured.clone();

        let app = Router::new().route(
            "/v1/chat/completions",
            post(move |headers: HeaderMap, body: String| {
                let recorder = recorder.clone();
                async move {
                    let auth = headers
                        .get(AUTHORIZATION)
                        .and_then(|v| v.to_str().ok())
                        .map(str::to_string);
                    let payload = serde_json::from_str(&body).unwrap_or(Value::Null);
                    recorder.lock().unwrap().push((auth, payload));
                    tokio::time::sleep(delay).await;
                    (status, reply)
                }
            }),
        );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        (format!("http://{}/v1/chat/completions", addr), captured)
    }

    fn client_for(endpoint: &str, sink: Arc<dyn DiagnosticSink>) -> LlmClient {
        let provider = ProviderConfig::new(ProviderKind::OpenRouter, "sk-test").with_endpoint(endpoint);
        LlmClient::new(Some(provider), Duration::from_secs(5), sink).unwrap()
    }

    #[test]
    fn test_provider_preference_order() {
        let both = Credentials::new(Some("or-key"), Some("ds-key"), None);
        assert_eq!(select_provider(&both).unwrap().kind, ProviderKind::OpenRouter);

        let deepseek_only = Credentials::new(None, Some("ds-key"), None);
        let provider = select_provider(&deepseek_only).unwrap();
        assert_eq!(provider.kind, ProviderKind::DeepSeek);
        assert_eq!(provider.model, "deepseek-chat");
        assert_eq!(provider.endpoint, "https://api.deepseek.com/v1/chat/completions");

        let embeddings_only = Credentials::new(None, None, Some("sk-openai"));
        assert!(select_provider(&embeddings_only).is_none());
    }

    #[test]
    fn test_interpret_choices_shape() {
        let outcome = interpret_response(
            r#"{"choices": [{"message": {"role": "assistant", "content": "  The dean's office is in room 12.\n"}}]}"#,
        );
        assert_eq!(
            outcome,
            CompletionOutcome::Answer("The dean's office is in room 12.".to_string())
        );
    }

    #[test]
    fn test_interpret_result_shape() {
        let outcome = interpret_response(r#"{"result": "Classes start in October. "}"#);
        assert_eq!(outcome, CompletionOutcome::Answer("Classes start in October.".to_string()));
    }

    #[test]
    fn test_interpret_error_envelope() {
        let outcome = interpret_response(r#"{"error": {"message": "quota exceeded", "code": 429}}"#);
        assert!(matches!(&outcome, CompletionOutcome::ErrorEnvelope(e) if e.contains("quota exceeded")));
        assert!(outcome.into_answer().starts_with("API error: "));
    }

    #[test]
    fn test_interpret_empty_content_falls_through() {
        let outcome = interpret_response(r#"{"choices": [{"message": {"content": ""}}]}"#);
        assert_eq!(outcome, CompletionOutcome::Unrecognized);
        assert_eq!(outcome.into_answer(), UNKNOWN_RESPONSE_ANSWER);
    }

    #[test]
    fn test_interpret_non_json_preview_is_bounded() {
        let body = "<html>".repeat(200);
        match interpret_response(&body) {
            CompletionOutcome::NonJson { preview } => assert_eq!(preview.chars().count(), 500),
            other => panic!("Expected non-JSON outcome, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_missing_provider_returns_sentinel() {
        let sink = Arc::new(MemorySink::new());
        let client = LlmClient::new(None, Duration::from_secs(15), sink.clone()).unwrap();

        assert_eq!(client.complete("library hours").await, MISSING_KEY_ANSWER);
        assert_eq!(sink.events(), vec![DiagnosticEvent::ProviderMissing]);
    }

    #[tokio::test]
    async fn test_successful_completion_request_shape() {
        let (endpoint, captured) = spawn_upstream(
            StatusCode::OK,
            r#"{"choices": [{"message": {"content": " Library opens at 8. "}}]}"#,
            Duration::ZERO,
        )
        .await;
        let sink = Arc::new(MemorySink::new());
        let client = client_for(&endpoint, sink.clone());

        assert_eq!(client.complete("When does the library open?").await, "Library opens at 8.");

        let captured = captured.lock().unwrap();
        let (auth, payload) = &captured[0];
        assert_eq!(auth.as_deref(), Some("Bearer sk-test"));
        assert_eq!(payload["model"], "gpt-4o-mini");
        assert_eq!(payload["stream"], false);
        assert_eq!(payload["messages"][0]["role"], "system");
        assert_eq!(payload["messages"][0]["content"], SYSTEM_PROMPT);
        assert_eq!(payload["messages"][1]["role"], "user");
        assert_eq!(payload["messages"][1]["content"], "When does the library open?");
        assert_eq!(payload["messages"].as_array().unwrap().len(), 2);

        assert!(sink
            .events()
            .contains(&DiagnosticEvent::UpstreamAnswered { provider: "openrouter".to_string() }));
    }

    #[tokio::test]
    async fn test_http_error_status_becomes_diagnostic() {
        let (endpoint, _) =
            spawn_upstream(StatusCode::UNAUTHORIZED, r#"{"error": "bad key"}"#, Duration::ZERO).await;
        let sink = Arc::new(MemorySink::new());
        let answer = client_for(&endpoint, sink.clone()).complete("anything").await;

        assert!(answer.starts_with("API request error: "), "{}", answer);
        assert!(answer.contains("401"), "{}", answer);
        assert!(!answer.contains("Upstream error"), "{}", answer);
        assert!(sink.events().iter().any(|e| matches!(
            e,
            DiagnosticEvent::UpstreamFailure { category, .. } if category == "request"
        )));
    }

    #[tokio::test]
    async fn test_non_json_body_becomes_diagnostic() {
        let (endpoint, _) =
            spawn_upstream(StatusCode::OK, "<html>Bad gateway</html>", Duration::ZERO).await;
        let answer = client_for(&endpoint, Arc::new(NullSink)).complete("anything").await;

        assert_eq!(
            answer,
            "API returned non-JSON response. Content starts with:\n<html>Bad gateway</html>"
        );
    }

    #[tokio::test]
    async fn test_error_envelope_in_success_response() {
        let (endpoint, _) =
            spawn_upstream(StatusCode::OK, r#"{"error": "model overloaded"}"#, Duration::ZERO).await;
        let answer = client_for(&endpoint, Arc::new(NullSink)).complete("anything").await;

        assert_eq!(answer, "API error: model overloaded");
    }

    #[tokio::test]
    async fn test_unrecognized_shape() {
        let (endpoint, _) = spawn_upstream(StatusCode::OK, r#"{"id": "x"}"#, Duration::ZERO).await;
        let answer = client_for(&endpoint, Arc::new(NullSink)).complete("anything").await;

        assert_eq!(answer, UNKNOWN_RESPONSE_ANSWER);
    }

    #[tokio::test]
    async fn test_timeout_becomes_diagnostic() {
        let (endpoint, _) =
            spawn_upstream(StatusCode::OK, r#"{"result": "late"}"#, Duration::from_secs(2)).await;
        let provider = ProviderConfig::new(ProviderKind::DeepSeek, "sk-test").with_endpoint(endpoint);
        let client = LlmClient::new(Some(provider), Duration::from_millis(200), Arc::new(NullSink)).unwrap();

        let answer = client.complete("anything").await;
        assert!(answer.starts_with("API request error: "), "{}", answer);
    }

    #[tokio::test]
    async fn test_connection_failure_becomes_diagnostic() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let endpoint = format!("http://{}/v1/chat/completions", addr);
        let answer = client_for(&endpoint, Arc::new(NullSink)).complete("anything").await;
        assert!(answer.starts_with("API request error: "), "{}", answer);
    }
}
