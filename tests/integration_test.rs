use promptforge::artifact::{AgentGuidelines, BusinessGoals, Component, SystemDescription};
use promptforge::assembler::SectionKind;
use promptforge::config::Config;
use promptforge::judge::{ProviderJudge, ScriptedJudge};
use promptforge::pipeline::{BuildRequest, PromptBuilder, Stage};
use promptforge::provider::http::HTTPProvider;
use promptforge::selection::SelectionSource;
use promptforge::store::ArtifactStore;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const FEATURE: &str = "Add login endpoint with token refresh";

async fn seeded_store(tmp: &TempDir) -> Arc<ArtifactStore> {
    let store = ArtifactStore::new(tmp.path().join("resources"));
    store.init().await.unwrap();

    let system = SystemDescription {
        components: vec![
            Component {
                name: "auth".into(),
                description: "Handles login and token issuance".into(),
                file_paths: vec!["src/auth/mod.rs".into()],
                responsibilities: vec!["auth".into()],
                dependencies: vec![],
            },
            Component {
                name: "billing".into(),
                description: "Creates invoice and payment records".into(),
                file_paths: vec!["src/billing/mod.rs".into()],
                responsibilities: vec![],
                dependencies: vec![],
            },
        ],
        ..Default::default()
    };
    store.save_system_description(&system).await.unwrap();
    store
        .save_business_goals(&BusinessGoals {
            purpose: "Self-service account management".into(),
            external_constraints: vec!["GDPR".into()],
        })
        .await
        .unwrap();
    store
        .save_agent_guidelines(&AgentGuidelines {
            guardrails: vec!["Never log tokens".into()],
            ..Default::default()
        })
        .await
        .unwrap();
    Arc::new(store)
}

fn offline(request: BuildRequest) -> BuildRequest {
    BuildRequest {
        enable_optimization: Some(false),
        ..request
    }
}

fn classification_reply(components: &[&str]) -> String {
    json!({
        "selected_component_names": components,
        "selected_infrastructure_sections": [],
        "selected_business_context_filenames": [],
        "include_business_goals": false,
        "include_agent_guidelines": true,
        "include_system_io_examples": false,
        "reasoning": "Login lives in auth",
        "feature_category": "api",
        "complexity": "low",
        "relevance_scores": {"auth": 0.9}
    })
    .to_string()
}

fn chat_completion(content: &str) -> serde_json::Value {
    json!({
        "id": "chatcmpl-1",
        "object": "chat.completion",
        "model": "gpt-4-turbo-preview",
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": content},
            "finish_reason": "stop"
        }],
        "usage": {"prompt_tokens": 120, "completion_tokens": 40, "total_tokens": 160}
    })
}

// ---------------------------------------------------------------------------
// Keyword path
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_login_feature_keyword_path_selects_auth() {
    promptforge::logger::init_test();
    let tmp = TempDir::new().unwrap();
    let builder = PromptBuilder::new(seeded_store(&tmp).await, &Config::default());

    let out = builder
        .build_prompt(offline(BuildRequest {
            enable_classification: Some(false),
            ..BuildRequest::new(FEATURE)
        }))
        .await
        .unwrap();

    assert_eq!(out.selection.selected.components, vec!["auth".to_string()]);
    assert!(out.selection.relevance_scores["auth"] > 0.0);
    assert!(!out.selection.relevance_scores.contains_key("billing"));
    assert!(out.prompt.contains("#### auth"));
    assert!(!out.prompt.contains("billing"));
    assert!(!out.metadata.classified);
    assert!(out.metadata.fallback_reason.is_none());
}

#[tokio::test]
async fn test_classifier_without_judge_uses_keywords() {
    let tmp = TempDir::new().unwrap();
    let builder = PromptBuilder::new(seeded_store(&tmp).await, &Config::default());
    assert!(!builder.has_judge());

    let out = builder.build_prompt(BuildRequest::new(FEATURE)).await.unwrap();
    assert!(!out.metadata.classified);
    assert!(!out.optimized);
    assert_eq!(out.metadata.selection_source, SelectionSource::Keyword);
    assert_eq!(out.prompt, out.initial_prompt);
}

// ---------------------------------------------------------------------------
// Classifier path (scripted)
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_schema_invalid_reply_falls_back() {
    let tmp = TempDir::new().unwrap();
    let judge = Arc::new(ScriptedJudge::replies([r#"{"components": ["auth"]}"#]));
    let builder = PromptBuilder::new(seeded_store(&tmp).await, &Config::default()).with_judge(judge);

    let out = builder.build_prompt(offline(BuildRequest::new(FEATURE))).await.unwrap();
    assert!(!out.metadata.classified);
    assert!(out.classification.is_none());
    assert!(!out.prompt.trim().is_empty());
    assert!(out.metadata.fallback_reason.unwrap().contains("schema"));
}

#[tokio::test]
async fn test_unknown_component_rejects_whole_selection() {
    let tmp = TempDir::new().unwrap();
    let judge = Arc::new(ScriptedJudge::replies([classification_reply(&["auth", "nonexistent"])]));
    let builder = PromptBuilder::new(seeded_store(&tmp).await, &Config::default()).with_judge(judge);

    let out = builder.build_prompt(offline(BuildRequest::new(FEATURE))).await.unwrap();
    assert!(!out.metadata.classified);
    assert_eq!(out.metadata.selection_source, SelectionSource::Keyword);
    assert!(out.metadata.fallback_reason.unwrap().contains("nonexistent"));
    assert_eq!(out.selection.selected.components, vec!["auth".to_string()]);
}

#[tokio::test]
async fn test_classified_and_optimized_build() {
    let tmp = TempDir::new().unwrap();
    let rewrite = format!(
        "# Task\n\nAdd a login endpoint with token refresh to the auth component.\n\n{}",
        "Keep responses consistent with the existing API.\n".repeat(60)
    );
    let judge = Arc::new(ScriptedJudge::replies([classification_reply(&["billing"]), rewrite.clone()]));
    let builder = PromptBuilder::new(seeded_store(&tmp).await, &Config::default()).with_judge(judge.clone());

    let out = builder.build_prompt(BuildRequest::new(FEATURE)).await.unwrap();
    assert!(out.metadata.classified);
    assert!(out.optimized, "{:?}", out.metadata.optimization_failure);
    assert_eq!(out.prompt, rewrite.trim());
    assert_ne!(out.initial_prompt, out.prompt);
    // the classifier's choice wins over keyword overlap
    assert_eq!(out.selection.selected.components, vec!["billing".to_string()]);
    assert!(out.initial_prompt.contains("#### billing"));
    assert!(out.assembled.has_section(SectionKind::AgentGuidelines));
    assert!(!out.assembled.has_section(SectionKind::BusinessGoals));
    assert_eq!(
        out.metadata.stages,
        vec![Stage::Start, Stage::Selecting, Stage::Assembling, Stage::Optimizing, Stage::Done]
    );
    assert_eq!(judge.call_count(), 2);
}

#[tokio::test]
async fn test_optimizer_disabled_keeps_initial_prompt() {
    let tmp = TempDir::new().unwrap();
    let judge = Arc::new(ScriptedJudge::replies([classification_reply(&["auth"])]));
    let builder = PromptBuilder::new(seeded_store(&tmp).await, &Config::default()).with_judge(judge.clone());

    let out = builder.build_prompt(offline(BuildRequest::new(FEATURE))).await.unwrap();
    assert!(out.metadata.classified);
    assert!(!out.optimized);
    assert_eq!(out.prompt, out.initial_prompt);
    assert!(!out.metadata.stages.contains(&Stage::Optimizing));
    assert_eq!(judge.call_count(), 1);
}

#[tokio::test]
async fn test_borderline_scores_are_reported_not_pruned() {
    let tmp = TempDir::new().unwrap();
    let reply = classification_reply(&["auth", "billing"]).replace(
        r#""relevance_scores":{"auth":0.9}"#,
        r#""relevance_scores":{"auth":0.9,"billing":0.2}"#,
    );
    let judge = Arc::new(ScriptedJudge::replies([reply]));
    let builder = PromptBuilder::new(seeded_store(&tmp).await, &Config::default()).with_judge(judge);

    let out = builder.build_prompt(offline(BuildRequest::new(FEATURE))).await.unwrap();
    assert!(out.metadata.classified);
    assert_eq!(out.selection.selected.components.len(), 2);
    assert_eq!(out.metadata.borderline, vec!["billing".to_string()]);
}

// ---------------------------------------------------------------------------
// Profiles and sections
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_unknown_model_uses_default_profile() {
    let tmp = TempDir::new().unwrap();
    let builder = PromptBuilder::new(seeded_store(&tmp).await, &Config::default());

    let out = builder
        .build_prompt(BuildRequest {
            model: Some("unknown-model-v9".into()),
            ..BuildRequest::new(FEATURE)
        })
        .await
        .unwrap();
    assert_eq!(out.metadata.model, "unknown-model-v9");
    assert_eq!(out.metadata.profile, "gpt-4-turbo-preview");
    assert_eq!(out.assembled.target_model, "unknown-model-v9");
    assert!(out.prompt.contains("## Feature Request"));
}

#[tokio::test]
async fn test_claude_profile_renders_xml_sections() {
    let tmp = TempDir::new().unwrap();
    let builder = PromptBuilder::new(seeded_store(&tmp).await, &Config::default());

    let out = builder
        .build_prompt(BuildRequest {
            model: Some("claude-3-opus".into()),
            ..BuildRequest::new(FEATURE)
        })
        .await
        .unwrap();
    assert_eq!(out.metadata.profile, "claude-3-opus");
    assert!(out.prompt.contains("<feature_request>"));
    assert!(out.prompt.contains("<component name=\"auth\">"));
    assert!(!out.prompt.contains("## "));
}

#[tokio::test]
async fn test_empty_selection_renders_only_feature_request() {
    let tmp = TempDir::new().unwrap();
    let mut config = Config::default();
    config.pipeline.always_include_business_goals = false;
    config.pipeline.always_include_agent_guidelines = false;
    let builder = PromptBuilder::new(seeded_store(&tmp).await, &config);

    let out = builder
        .build_prompt(BuildRequest::new("Translate widget labels into Portuguese"))
        .await
        .unwrap();
    assert_eq!(out.selection.selected_count(), 0);
    assert_eq!(out.assembled.section_kinds(), vec![SectionKind::FeatureRequest]);
    assert!(out.prompt.contains("Translate widget labels into Portuguese"));
}

#[tokio::test]
async fn test_include_all_context_renders_everything() {
    let tmp = TempDir::new().unwrap();
    let judge = Arc::new(ScriptedJudge::replies(Vec::<String>::new()));
    let builder = PromptBuilder::new(seeded_store(&tmp).await, &Config::default()).with_judge(judge.clone());

    let out = builder
        .build_prompt(offline(BuildRequest {
            include_all_context: true,
            ..BuildRequest::new(FEATURE)
        }))
        .await
        .unwrap();
    assert_eq!(out.metadata.selection_source, SelectionSource::AllContext);
    assert!(out.prompt.contains("#### auth") && out.prompt.contains("#### billing"));
    assert!(out.assembled.has_section(SectionKind::BusinessGoals));
    assert_eq!(judge.call_count(), 0);
}

#[tokio::test]
async fn test_identical_requests_give_identical_prompts() {
    let tmp = TempDir::new().unwrap();
    let builder = PromptBuilder::new(seeded_store(&tmp).await, &Config::default());
    let a = builder.build_prompt(BuildRequest::new(FEATURE)).await.unwrap();
    let b = builder.build_prompt(BuildRequest::new(FEATURE)).await.unwrap();
    assert_eq!(a.prompt, b.prompt);
}

// ---------------------------------------------------------------------------
// Provider-backed judge over HTTP
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_provider_judge_retries_rate_limit_then_classifies() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(429).set_body_string("slow down"))
        .up_to_n_times(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_string_contains("json_object"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(chat_completion(&format!("```json\n{}\n```", classification_reply(&["auth"])))),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let provider = HTTPProvider::new(
        "test-key".into(),
        mock_server.uri(),
        "gpt-4-turbo-preview".into(),
        Duration::from_secs(5),
    )
    .unwrap();
    let judge = ProviderJudge::new(Arc::new(provider), "gpt-4-turbo-preview").with_retries(2, 10);

    let tmp = TempDir::new().unwrap();
    let builder = PromptBuilder::new(seeded_store(&tmp).await, &Config::default()).with_judge(Arc::new(judge));
    let out = builder.build_prompt(offline(BuildRequest::new(FEATURE))).await.unwrap();

    assert!(out.metadata.classified, "{:?}", out.metadata.fallback_reason);
    assert_eq!(out.classification.unwrap().reasoning, "Login lives in auth");
    assert_eq!(mock_server.received_requests().await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_server_error_degrades_to_initial_prompt() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&mock_server)
        .await;

    let tmp = TempDir::new().unwrap();
    let store_root = seeded_store(&tmp).await.root().to_path_buf();

    let mut config = Config::default();
    config.resources.dir = store_root.to_string_lossy().to_string();
    config.providers.vllm.api_key = "local".into();
    config.providers.vllm.api_base = mock_server.uri();
    config.judge.max_retries = 0;

    let builder = PromptBuilder::from_config(&config).unwrap();
    assert!(builder.has_judge());

    let out = builder.build_prompt(BuildRequest::new(FEATURE)).await.unwrap();
    assert!(!out.metadata.classified);
    assert!(!out.optimized);
    assert_eq!(out.prompt, out.initial_prompt);
    assert!(out.metadata.fallback_reason.unwrap().contains("500"));
    assert!(out.metadata.optimization_failure.is_some());
    assert_eq!(out.selection.selected.components, vec!["auth".to_string()]);
}

#[tokio::test]
async fn test_non_json_success_body_is_malformed_not_an_outage() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html><body>Proxy login</body></html>"))
        .mount(&mock_server)
        .await;

    let tmp = TempDir::new().unwrap();
    let store_root = seeded_store(&tmp).await.root().to_path_buf();

    let mut config = Config::default();
    config.resources.dir = store_root.to_string_lossy().to_string();
    config.providers.vllm.api_key = "local".into();
    config.providers.vllm.api_base = mock_server.uri();
    config.judge.max_retries = 2;

    let builder = PromptBuilder::from_config(&config).unwrap();
    let out = builder.build_prompt(BuildRequest::new(FEATURE)).await.unwrap();

    assert!(!out.metadata.classified);
    assert!(out.metadata.fallback_reason.unwrap().contains("malformed"));
    // A bad reply is not an outage: the optimizer still gets its call.
    let failure = out.metadata.optimization_failure.unwrap();
    assert!(!failure.contains("unavailable"), "{}", failure);
    assert_eq!(out.prompt, out.initial_prompt);
    // Malformed replies are not retried.
    assert_eq!(mock_server.received_requests().await.unwrap().len(), 2);
}
