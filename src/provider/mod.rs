// promptforge — LLM Provider abstraction

pub mod factory;
pub mod http;

use crate::error::ServiceError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

// ---------------------------------------------------------------------------
// Core types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// Per-call settings. Retries apply to transient failures only.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatOptions {
    pub temperature: Option<f64>,
    /// Ask the backend for a JSON object reply.
    pub json_mode: bool,
    pub max_retries: usize,
    pub retry_delay: Duration,
}

impl Default for ChatOptions {
    fn default() -> Self {
        Self {
            temperature: None,
            json_mode: false,
            max_retries: 3,
            retry_delay: Duration::from_millis(1000),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct TokenUsage {
    #[serde(default)]
    pub prompt_tokens: u64,
    #[serde(default)]
    pub completion_tokens: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChatReply {
    pub content: String,
    pub finish_reason: Option<String>,
    pub usage: Option<TokenUsage>,
}

// ---------------------------------------------------------------------------
// Provider trait
// ---------------------------------------------------------------------------

/// A chat-completion backend. Failures come back already classified so
/// callers can tell an outage from a bad reply.
#[async_trait]
pub trait LLMProvider: Send + Sync {
    async fn chat(
        &self,
        model: &str,
        messages: &[ChatMessage],
        options: &ChatOptions,
    ) -> Result<ChatReply, ServiceError>;

    fn default_model(&self) -> &str;
}

impl ServiceError {
    /// Worth retrying: the same request may succeed a moment later.
    pub fn is_transient(&self) -> bool {
        match self {
            ServiceError::Network(_) | ServiceError::Timeout(_) | ServiceError::RateLimited => true,
            ServiceError::Api { status, .. } => *status >= 500,
            ServiceError::Malformed(_) | ServiceError::NotConfigured => false,
        }
    }
}
