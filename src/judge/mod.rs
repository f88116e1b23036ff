// promptforge — Judgment service (LLM-backed decisions for classifier and optimizer)

pub mod scripted;

pub use scripted::ScriptedJudge;

use crate::error::ServiceError;
use crate::provider::{ChatMessage, ChatOptions, LLMProvider};
use async_trait::async_trait;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// One judgment call.
#[derive(Debug, Clone, PartialEq)]
pub struct JudgeRequest {
    pub system: String,
    pub prompt: String,
    /// Sampling temperature; `None` leaves the backend default.
    pub temperature: Option<f64>,
}

impl JudgeRequest {
    pub fn new(system: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            prompt: prompt.into(),
            temperature: None,
        }
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

/// Injectable capability behind the classifier and optimizer.
///
/// The core never talks to a concrete LLM; callers hand in any
/// implementation (an HTTP-backed one or a scripted stub).
#[async_trait]
pub trait JudgmentService: Send + Sync {
    /// Return the raw text reply.
    async fn complete(&self, request: &JudgeRequest) -> Result<String, ServiceError>;

    /// Return a JSON reply. `schema` describes the expected shape; callers
    /// still validate the value themselves.
    async fn structured_complete(
        &self,
        request: &JudgeRequest,
        _schema: &Value,
    ) -> Result<Value, ServiceError> {
        let text = self.complete(request).await?;
        parse_json_reply(&text)
    }

    fn name(&self) -> &str;
}

/// Run a judgment call under a deadline.
pub async fn with_timeout<T, F>(limit: Duration, call: F) -> Result<T, ServiceError>
where
    F: Future<Output = Result<T, ServiceError>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(ServiceError::Timeout(limit)),
    }
}

/// Remove a surrounding Markdown code fence, if any.
pub fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string ("json", "markdown", ...) on the opening line.
    let body = match rest.find('\n') {
        Some(idx) => &rest[idx + 1..],
        None => rest,
    };
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

/// Parse a judgment reply as JSON, tolerating a code fence around it.
pub fn parse_json_reply(text: &str) -> Result<Value, ServiceError> {
    serde_json::from_str(strip_code_fences(text))
        .map_err(|e| ServiceError::Malformed(format!("reply is not JSON: {}", e)))
}

// ---------------------------------------------------------------------------
// Provider-backed judge
// ---------------------------------------------------------------------------

/// Judgment service over any `LLMProvider`.
pub struct ProviderJudge {
    provider: Arc<dyn LLMProvider>,
    model: String,
    max_retries: usize,
    retry_delay_ms: u64,
}

impl ProviderJudge {
    pub fn new(provider: Arc<dyn LLMProvider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            max_retries: 3,
            retry_delay_ms: 1000,
        }
    }

    pub fn with_retries(mut self, max_retries: usize, retry_delay_ms: u64) -> Self {
        self.max_retries = max_retries;
        self.retry_delay_ms = retry_delay_ms;
        self
    }

    fn options(&self, request: &JudgeRequest, json_mode: bool) -> ChatOptions {
        ChatOptions {
            temperature: request.temperature,
            json_mode,
            max_retries: self.max_retries,
            retry_delay: Duration::from_millis(self.retry_delay_ms),
        }
    }

    async fn send(
        &self,
        request: &JudgeRequest,
        options: ChatOptions,
    ) -> Result<String, ServiceError> {
        let messages = [
            ChatMessage::system(&request.system),
            ChatMessage::user(&request.prompt),
        ];
        let response = self
            .provider
            .chat(&self.model, &messages, &options)
            .await?;

        if let Some(usage) = &response.usage {
            tracing::debug!(
                model = %self.model,
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = usage.completion_tokens,
                "Judgment call complete"
            );
        }
        if response.content.trim().is_empty() {
            return Err(ServiceError::Malformed("empty reply".into()));
        }
        Ok(response.content)
    }
}

#[async_trait]
impl JudgmentService for ProviderJudge {
    async fn complete(&self, request: &JudgeRequest) -> Result<String, ServiceError> {
        self.send(request, self.options(request, false)).await
    }

    async fn structured_complete(
        &self,
        request: &JudgeRequest,
        _schema: &Value,
    ) -> Result<Value, ServiceError> {
        let text = self.send(request, self.options(request, true)).await?;
        parse_json_reply(&text)
    }

    fn name(&self) -> &str {
        &self.model
    }
}
