// promptforge — HTTP-based LLM provider (OpenAI-compatible)

use super::*;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

/// HTTPProvider speaks the OpenAI-compatible chat completions API.
/// Works with OpenAI, OpenRouter, Groq, vLLM and similar endpoints.
pub struct HTTPProvider {
    api_key: String,
    api_base: String,
    client: Client,
    model: String,
    request_timeout: Duration,
}

impl HTTPProvider {
    pub fn new(
        api_key: String,
        api_base: String,
        model: String,
        request_timeout: Duration,
    ) -> anyhow::Result<Self> {
        let builder = Client::builder()
            .timeout(request_timeout)
            .connect_timeout(Duration::from_secs(30));

        let base = if api_base.is_empty() {
            // Default API bases by key prefix
            if api_key.starts_with("sk-or-") {
                "https://openrouter.ai/api/v1".to_string()
            } else if api_key.starts_with("gsk_") {
                "https://api.groq.com/openai/v1".to_string()
            } else {
                "https://api.openai.com/v1".to_string()
            }
        } else {
            api_base
        };

        Ok(Self {
            api_key,
            api_base: base,
            client: builder.build()?,
            model,
            request_timeout,
        })
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    async fn send_once(
        &self,
        url: &str,
        body: &serde_json::Value,
    ) -> Result<ChatReply, ServiceError> {
        let response = self
            .client
            .post(url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(body)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        let text = response.text().await.map_err(|e| self.transport_error(e))?;
        tracing::debug!(status = %status, body_len = text.len(), "LLM response received");

        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(ServiceError::RateLimited);
        }
        if !status.is_success() {
            return Err(ServiceError::Api {
                status: status.as_u16(),
                message: truncate(&text, 300),
            });
        }
        parse_response(&text)
    }

    fn transport_error(&self, err: reqwest::Error) -> ServiceError {
        if err.is_timeout() {
            ServiceError::Timeout(self.request_timeout)
        } else {
            ServiceError::Network(err.to_string())
        }
    }
}

#[async_trait]
impl LLMProvider for HTTPProvider {
    async fn chat(
        &self,
        model: &str,
        messages: &[ChatMessage],
        options: &ChatOptions,
    ) -> Result<ChatReply, ServiceError> {
        let use_model = if model.is_empty() { &self.model } else { model };
        let url = format!("{}/chat/completions", self.api_base.trim_end_matches('/'));

        let mut body = json!({
            "model": use_model,
            "messages": messages,
        });
        if let Some(obj) = body.as_object_mut() {
            if let Some(t) = options.temperature {
                obj.insert("temperature".into(), json!(t));
            }
            if options.json_mode {
                obj.insert("response_format".into(), json!({"type": "json_object"}));
            }
        }

        let mut attempt = 0;
        loop {
            tracing::debug!(url = %url, model = %use_model, attempt = attempt, "Sending LLM request");
            match self.send_once(&url, &body).await {
                Ok(reply) => return Ok(reply),
                Err(e) if e.is_transient() && attempt < options.max_retries => {
                    tracing::warn!(error = %e, attempt = attempt, "Transient LLM error, retrying");
                    attempt += 1;
                    tokio::time::sleep(options.retry_delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn default_model(&self) -> &str {
        &self.model
    }
}

#[derive(Deserialize)]
struct CompletionBody {
    #[serde(default)]
    choices: Vec<Choice>,
    usage: Option<TokenUsage>,
    error: Option<ErrorBody>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
}

/// Parse an OpenAI-compatible chat completion response.
fn parse_response(body: &str) -> Result<ChatReply, ServiceError> {
    let parsed: CompletionBody = serde_json::from_str(body).map_err(|e| {
        ServiceError::Malformed(format!("unreadable completion body ({}): {}", e, truncate(body, 120)))
    })?;

    if let Some(err) = parsed.error {
        return Err(ServiceError::Malformed(format!("error object in reply: {}", err.message)));
    }

    let choice = parsed
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| ServiceError::Malformed("no choices in completion".into()))?;

    Ok(ChatReply {
        content: choice.message.content.unwrap_or_default(),
        finish_reason: choice.finish_reason,
        usage: parsed.usage,
    })
}

fn truncate(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_parse_simple_response() {
        let json = r#"{
            "choices": [{
                "message": {"role": "assistant", "content": "Rewritten prompt"},
                "finish_reason": "stop"
            }],
            "usage": {"prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15}
        }"#;

        let resp = parse_response(json).unwrap();
        assert_eq!(resp.content, "Rewritten prompt");
        assert_eq!(resp.finish_reason.as_deref(), Some("stop"));
        assert_eq!(resp.usage.unwrap().completion_tokens, 5);
    }

    #[test]
    fn test_parse_null_content() {
        let json = r#"{"choices": [{"message": {"role": "assistant", "content": null}}]}"#;
        let resp = parse_response(json).unwrap();
        assert!(resp.content.is_empty());
        assert!(resp.finish_reason.is_none());
    }

    #[test]
    fn test_parse_error_response() {
        let json = r#"{"error": {"message": "Invalid API key", "type": "auth_error"}}"#;
        let err = parse_response(json).unwrap_err();
        assert!(matches!(err, ServiceError::Malformed(ref m) if m.contains("Invalid API key")));
    }

    #[test]
    fn test_parse_no_choices() {
        let err = parse_response(r#"{"choices": []}"#).unwrap_err();
        assert!(matches!(err, ServiceError::Malformed(ref m) if m.contains("no choices")));
    }

    #[test]
    fn test_html_body_is_malformed_not_network() {
        let err = parse_response("<html><body>Gateway</body></html>").unwrap_err();
        assert!(matches!(err, ServiceError::Malformed(_)));
        assert!(!err.is_transient());
    }

    #[test]
    fn test_default_api_base_from_key_prefix() {
        let p = HTTPProvider::new("sk-or-abc".into(), String::new(), "m".into(), Duration::from_secs(5)).unwrap();
        assert_eq!(p.api_base(), "https://openrouter.ai/api/v1");
        let p = HTTPProvider::new("sk-abc".into(), "http://localhost:9/v1/".into(), "m".into(), Duration::from_secs(5)).unwrap();
        assert_eq!(p.api_base(), "http://localhost:9/v1/");
    }

    fn fast_options(max_retries: usize) -> ChatOptions {
        ChatOptions {
            max_retries,
            retry_delay: Duration::from_millis(5),
            ..ChatOptions::default()
        }
    }

    #[tokio::test]
    async fn test_status_codes_map_to_service_errors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
            .mount(&server)
            .await;
        let p = HTTPProvider::new("k".into(), server.uri(), "m".into(), Duration::from_secs(5)).unwrap();
        let err = p.chat("", &[ChatMessage::user("hi")], &fast_options(2)).await.unwrap_err();
        assert!(matches!(err, ServiceError::Api { status: 401, ref message } if message == "bad key"));
        // 4xx is not retried
        assert_eq!(server.received_requests().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_rate_limit_retried_then_reported() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;
        let p = HTTPProvider::new("k".into(), server.uri(), "m".into(), Duration::from_secs(5)).unwrap();
        let err = p.chat("", &[ChatMessage::user("hi")], &fast_options(1)).await.unwrap_err();
        assert!(matches!(err, ServiceError::RateLimited));
        assert_eq!(server.received_requests().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_slow_backend_reports_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("{}")
                    .set_delay(Duration::from_millis(500)),
            )
            .mount(&server)
            .await;
        let p = HTTPProvider::new("k".into(), server.uri(), "m".into(), Duration::from_millis(50)).unwrap();
        let err = p.chat("", &[ChatMessage::user("hi")], &fast_options(0)).await.unwrap_err();
        assert!(matches!(err, ServiceError::Timeout(d) if d == Duration::from_millis(50)));
    }

    #[tokio::test]
    async fn test_json_mode_and_temperature_sent_in_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"{"choices":[{"message":{"content":"{}"},"finish_reason":"stop"}]}"#,
            ))
            .mount(&server)
            .await;
        let p = HTTPProvider::new("k".into(), server.uri(), "m".into(), Duration::from_secs(5)).unwrap();
        let opts = ChatOptions {
            temperature: Some(0.0),
            json_mode: true,
            ..fast_options(0)
        };
        p.chat("", &[ChatMessage::system("s"), ChatMessage::user("u")], &opts).await.unwrap();

        let requests = server.received_requests().await.unwrap();
        let sent: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
        assert_eq!(sent["response_format"]["type"], "json_object");
        assert_eq!(sent["temperature"], 0.0);
        assert_eq!(sent["messages"][0]["role"], "system");
        assert_eq!(sent["model"], "m");
        assert!(sent.get("max_retries").is_none());
    }
}
