// promptforge — Classifier (judgment-based context selection)

use crate::artifact::{ArtifactKind, Manifest};
use crate::error::ClassificationError;
use crate::judge::{with_timeout, JudgeRequest, JudgmentService};
use crate::selection::{Complexity, FeatureCategory, SelectionResult, SelectionSource};
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashSet};
use std::fmt::Write;
use std::sync::Arc;
use std::time::Duration;

const SYSTEM_PROMPT: &str = "You are an expert at analyzing software feature requirements and \
identifying the context needed to implement them. Select only the artifacts that directly \
contribute to implementing the feature; irrelevant context reduces prompt effectiveness. \
Reply with a single JSON object and nothing else.";

/// Reply shape expected from the judgment service.
#[derive(Debug, Deserialize)]
struct ClassificationReply {
    selected_component_names: Vec<String>,
    selected_infrastructure_sections: Vec<String>,
    selected_business_context_filenames: Vec<String>,
    include_business_goals: bool,
    include_agent_guidelines: bool,
    include_system_io_examples: bool,
    reasoning: String,
    feature_category: FeatureCategory,
    complexity: Complexity,
    #[serde(default)]
    relevance_scores: BTreeMap<String, f64>,
}

/// Asks a judgment service which artifacts a feature needs.
pub struct Classifier {
    judge: Arc<dyn JudgmentService>,
    temperature: f64,
    timeout: Duration,
}

impl Classifier {
    pub fn new(judge: Arc<dyn JudgmentService>) -> Self {
        Self {
            judge,
            temperature: 0.3,
            timeout: Duration::from_secs(60),
        }
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Classify a feature against the full manifest.
    ///
    /// Any service failure, schema mismatch, out-of-range score or unknown
    /// identifier is an error; callers fall back to keyword selection.
    pub async fn classify(
        &self,
        feature_description: &str,
        manifest: &Manifest,
    ) -> Result<SelectionResult, ClassificationError> {
        let request = JudgeRequest::new(SYSTEM_PROMPT, build_prompt(feature_description, manifest))
            .with_temperature(self.temperature);
        let schema = response_schema();

        tracing::debug!(
            judge = %self.judge.name(),
            entries = manifest.len(),
            "Requesting classification"
        );

        let reply = with_timeout(
            self.timeout,
            self.judge.structured_complete(&request, &schema),
        )
        .await?;

        let result = parse_reply(reply, manifest)?;
        tracing::info!(
            category = %result.feature_category,
            complexity = %result.complexity,
            selected = result.selected_count(),
            "Classification accepted"
        );
        Ok(result)
    }
}

/// JSON schema describing the classification reply.
pub fn response_schema() -> Value {
    let names = json!({ "type": "array", "items": { "type": "string" } });
    json!({
        "type": "object",
        "required": [
            "selected_component_names",
            "selected_infrastructure_sections",
            "selected_business_context_filenames",
            "include_business_goals",
            "include_agent_guidelines",
            "include_system_io_examples",
            "reasoning",
            "feature_category",
            "complexity"
        ],
        "properties": {
            "selected_component_names": names,
            "selected_infrastructure_sections": names,
            "selected_business_context_filenames": names,
            "include_business_goals": { "type": "boolean" },
            "include_agent_guidelines": { "type": "boolean" },
            "include_system_io_examples": { "type": "boolean" },
            "reasoning": { "type": "string" },
            "feature_category": {
                "type": "string",
                "enum": ["api", "database", "ui", "infrastructure", "integration", "other"]
            },
            "complexity": { "type": "string", "enum": ["low", "medium", "high"] },
            "relevance_scores": {
                "type": "object",
                "additionalProperties": { "type": "number", "minimum": 0, "maximum": 1 }
            }
        }
    })
}

/// Render the classification request. Every manifest entry is listed.
fn build_prompt(feature_description: &str, manifest: &Manifest) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Analyze the feature description below and decide which artifacts are needed to implement it.\n"
    );
    let _ = writeln!(out, "Feature Description:\n{}\n", feature_description.trim());

    let groups = [
        (ArtifactKind::BusinessGoals, "Business Goals"),
        (ArtifactKind::SystemIoExamples, "System Input/Output Examples"),
        (ArtifactKind::Component, "Available Components"),
        (ArtifactKind::InfrastructureSection, "Available Infrastructure Sections"),
        (ArtifactKind::AgentGuidelines, "Development Guidelines"),
        (ArtifactKind::BusinessContext, "Available Business Context Documents"),
    ];
    for (kind, heading) in groups {
        if !manifest.has_kind(kind) {
            continue;
        }
        let _ = writeln!(out, "{}:", heading);
        for entry in manifest.entries_of(kind) {
            if kind.is_singleton() {
                let _ = writeln!(out, "- {}", entry.text_excerpt);
            } else {
                let _ = writeln!(
                    out,
                    "- \"{}\" [{}]: {}",
                    entry.identifier, entry.display_name, entry.text_excerpt
                );
            }
        }
        out.push('\n');
    }

    out.push_str(
        "Return a JSON object with exactly these fields:\n\
         {\n\
         \x20 \"selected_component_names\": [\"component name\", ...],\n\
         \x20 \"selected_infrastructure_sections\": [\"section title\", ...],\n\
         \x20 \"selected_business_context_filenames\": [\"filename\", ...],\n\
         \x20 \"include_business_goals\": true/false,\n\
         \x20 \"include_agent_guidelines\": true/false,\n\
         \x20 \"include_system_io_examples\": true/false,\n\
         \x20 \"reasoning\": \"why these artifacts were selected\",\n\
         \x20 \"feature_category\": \"api|database|ui|infrastructure|integration|other\",\n\
         \x20 \"complexity\": \"low|medium|high\",\n\
         \x20 \"relevance_scores\": {\"identifier\": 0.0-1.0, ...}\n\
         }\n\
         Use identifiers exactly as quoted above.\n",
    );
    out
}

/// Validate a reply against the manifest and turn it into a selection.
fn parse_reply(reply: Value, manifest: &Manifest) -> Result<SelectionResult, ClassificationError> {
    let reply: ClassificationReply =
        serde_json::from_value(reply).map_err(|e| ClassificationError::Schema(e.to_string()))?;

    for (identifier, score) in &reply.relevance_scores {
        if !(0.0..=1.0).contains(score) {
            return Err(ClassificationError::ScoreOutOfRange {
                identifier: identifier.clone(),
                score: *score,
            });
        }
    }

    let requested = [
        (ArtifactKind::Component, &reply.selected_component_names),
        (ArtifactKind::InfrastructureSection, &reply.selected_infrastructure_sections),
        (ArtifactKind::BusinessContext, &reply.selected_business_context_filenames),
    ];
    for (kind, ids) in requested {
        if let Some(unknown) = ids.iter().find(|id| !manifest.contains(kind, id)) {
            return Err(ClassificationError::UnknownIdentifier {
                kind,
                identifier: unknown.clone(),
            });
        }
    }

    let wanted: HashSet<(ArtifactKind, &str)> = requested
        .iter()
        .flat_map(|(kind, ids)| ids.iter().map(move |id| (*kind, id.as_str())))
        .collect();

    let mut result = SelectionResult {
        reasoning: reply.reasoning.clone(),
        feature_category: reply.feature_category,
        complexity: reply.complexity,
        source: SelectionSource::Classifier,
        ..Default::default()
    };

    // Rebuild in manifest order so output never depends on reply order.
    for entry in manifest.entries() {
        let chosen = match entry.kind {
            ArtifactKind::BusinessGoals => reply.include_business_goals,
            ArtifactKind::AgentGuidelines => reply.include_agent_guidelines,
            ArtifactKind::SystemIoExamples => reply.include_system_io_examples,
            kind => wanted.contains(&(kind, entry.identifier.as_str())),
        };
        if chosen {
            result.include(entry.kind, &entry.identifier);
        }
    }

    let known: HashSet<&str> = manifest.entries().iter().map(|e| e.identifier.as_str()).collect();
    for (identifier, score) in reply.relevance_scores {
        if known.contains(identifier.as_str()) {
            result.relevance_scores.insert(identifier, score);
        } else {
            tracing::debug!(identifier = %identifier, "Ignoring score for unlisted identifier");
        }
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::{
        AgentGuidelines, BusinessGoals, Component, ProjectArtifacts, SystemDescription,
    };
    use crate::error::ServiceError;
    use crate::judge::ScriptedJudge;

    fn component(name: &str, description: &str) -> Component {
        Component {
            name: name.into(),
            description: description.into(),
            file_paths: vec![],
            responsibilities: vec![],
            dependencies: vec![],
        }
    }

    fn manifest() -> Manifest {
        Manifest::build(ProjectArtifacts {
            business_goals: Some(BusinessGoals {
                purpose: "Sell widgets".into(),
                external_constraints: vec![],
            }),
            system: SystemDescription {
                components: vec![component("auth", "login token"), component("billing", "invoice payment")],
                ..Default::default()
            },
            agent_guidelines: Some(AgentGuidelines {
                guardrails: vec!["No secrets in logs".into()],
                ..Default::default()
            }),
            business_context: vec![],
        })
    }

    fn reply(components: &[&str], scores: Value) -> String {
        json!({
            "selected_component_names": components,
            "selected_infrastructure_sections": [],
            "selected_business_context_filenames": [],
            "include_business_goals": true,
            "include_agent_guidelines": false,
            "include_system_io_examples": true,
            "reasoning": "login work",
            "feature_category": "api",
            "complexity": "low",
            "relevance_scores": scores
        })
        .to_string()
    }

    #[tokio::test]
    async fn test_valid_reply_becomes_selection() {
        let judge = Arc::new(ScriptedJudge::replies([reply(&["billing", "auth"], json!({"auth": 0.9}))]));
        let classifier = Classifier::new(judge.clone());
        let sel = classifier.classify("Add login endpoint", &manifest()).await.unwrap();

        // Manifest order, not reply order.
        assert_eq!(sel.selected.components, vec!["auth".to_string(), "billing".to_string()]);
        assert!(sel.include_business_goals);
        assert!(!sel.include_agent_guidelines);
        // No IO examples in the manifest, so the flag stays off.
        assert!(!sel.include_system_io_examples);
        assert_eq!(sel.source, SelectionSource::Classifier);
        assert_eq!(sel.complexity, Complexity::Low);
        assert_eq!(sel.relevance_scores["auth"], 0.9);

        let requests = judge.requests();
        assert_eq!(requests[0].temperature, Some(0.3));
        assert!(requests[0].prompt.contains("\"billing\""));
        assert!(requests[0].prompt.contains("Add login endpoint"));
    }

    #[tokio::test]
    async fn test_unknown_identifier_rejected() {
        let judge = Arc::new(ScriptedJudge::replies([reply(&["auth", "nonexistent"], json!({}))]));
        let err = Classifier::new(judge).classify("x", &manifest()).await.unwrap_err();
        match err {
            ClassificationError::UnknownIdentifier { kind, identifier } => {
                assert_eq!(kind, ArtifactKind::Component);
                assert_eq!(identifier, "nonexistent");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_score_out_of_range_rejected() {
        let judge = Arc::new(ScriptedJudge::replies([reply(&["auth"], json!({"auth": 1.4}))]));
        let err = Classifier::new(judge).classify("x", &manifest()).await.unwrap_err();
        assert!(matches!(err, ClassificationError::ScoreOutOfRange { .. }));
    }

    #[tokio::test]
    async fn test_missing_field_is_schema_error() {
        let judge = Arc::new(ScriptedJudge::replies([r#"{"selected_component_names": ["auth"]}"#]));
        let err = Classifier::new(judge).classify("x", &manifest()).await.unwrap_err();
        assert!(matches!(err, ClassificationError::Schema(_)));
    }

    #[tokio::test]
    async fn test_unknown_category_is_schema_error() {
        let bad = reply(&[], json!({})).replace("\"api\"", "\"blockchain\"");
        let judge = Arc::new(ScriptedJudge::replies([bad]));
        let err = Classifier::new(judge).classify("x", &manifest()).await.unwrap_err();
        assert!(matches!(err, ClassificationError::Schema(_)));
    }

    #[tokio::test]
    async fn test_prose_reply_is_service_error() {
        let judge = Arc::new(ScriptedJudge::replies(["I think auth is relevant."]));
        let err = Classifier::new(judge).classify("x", &manifest()).await.unwrap_err();
        assert!(matches!(err, ClassificationError::Service(ServiceError::Malformed(_))));
    }

    #[tokio::test]
    async fn test_timeout_is_service_error() {
        let judge = Arc::new(
            ScriptedJudge::replies([reply(&["auth"], json!({}))]).with_delay(Duration::from_millis(200)),
        );
        let err = Classifier::new(judge)
            .with_timeout(Duration::from_millis(10))
            .classify("x", &manifest())
            .await
            .unwrap_err();
        assert!(matches!(err, ClassificationError::Service(ServiceError::Timeout(_))));
    }

    #[test]
    fn test_schema_lists_required_fields() {
        let schema = response_schema();
        let required = schema["required"].as_array().unwrap();
        assert!(required.contains(&json!("selected_component_names")));
        assert!(required.contains(&json!("complexity")));
    }
}
