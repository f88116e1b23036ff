// promptforge — Scripted judgment service (deterministic, offline)

use super::{JudgeRequest, JudgmentService};
use crate::error::ServiceError;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

/// A judgment service that replays a fixed queue of replies.
///
/// Each call pops the next scripted reply; once the queue is empty every
/// call fails with `ServiceError::Malformed`. Requests are recorded so
/// callers can inspect what was asked.
pub struct ScriptedJudge {
    replies: Mutex<VecDeque<Result<String, ServiceError>>>,
    requests: Mutex<Vec<JudgeRequest>>,
    delay: Option<Duration>,
}

impl ScriptedJudge {
    pub fn new(replies: Vec<Result<String, ServiceError>>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            requests: Mutex::new(Vec::new()),
            delay: None,
        }
    }

    /// Replay the given texts in order.
    pub fn replies<I, S>(texts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(texts.into_iter().map(|t| Ok(t.into())).collect())
    }

    /// Sleep before every reply.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn call_count(&self) -> usize {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    pub fn requests(&self) -> Vec<JudgeRequest> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[async_trait]
impl JudgmentService for ScriptedJudge {
    async fn complete(&self, request: &JudgeRequest) -> Result<String, ServiceError> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(request.clone());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let next = self
            .replies
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front();
        next.unwrap_or_else(|| Err(ServiceError::Malformed("no scripted reply left".into())))
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_replays_in_order_then_fails() {
        let judge = ScriptedJudge::replies(["first", "second"]);
        let req = JudgeRequest::new("s", "p");
        assert_eq!(judge.complete(&req).await.unwrap(), "first");
        assert_eq!(judge.complete(&req).await.unwrap(), "second");
        assert!(judge.complete(&req).await.is_err());
        assert_eq!(judge.call_count(), 3);
    }

    #[tokio::test]
    async fn test_scripted_error_is_returned() {
        let judge = ScriptedJudge::new(vec![Err(ServiceError::RateLimited)]);
        let err = judge.complete(&JudgeRequest::new("s", "p")).await.unwrap_err();
        assert!(matches!(err, ServiceError::RateLimited));
    }

    #[tokio::test]
    async fn test_structured_default_parses_fenced_json() {
        let judge = ScriptedJudge::replies(["```json\n{\"n\": 2}\n```"]);
        let value = judge
            .structured_complete(&JudgeRequest::new("s", "p"), &json!({}))
            .await
            .unwrap();
        assert_eq!(value, json!({"n": 2}));
    }
}
