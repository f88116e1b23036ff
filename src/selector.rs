// promptforge — Keyword context selector (deterministic fallback path)

use crate::artifact::{ArtifactKind, Manifest};
use crate::keywords::{extract_keywords, matches};
use crate::selection::{Complexity, FeatureCategory, SelectionResult, SelectionSource};
use std::collections::BTreeSet;

/// Tuning for the keyword path.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectorOptions {
    /// Entries must score strictly above this to be included.
    pub threshold: f64,
    pub always_include_business_goals: bool,
    pub always_include_agent_guidelines: bool,
}

impl Default for SelectorOptions {
    fn default() -> Self {
        Self {
            threshold: 0.0,
            always_include_business_goals: true,
            always_include_agent_guidelines: true,
        }
    }
}

impl SelectorOptions {
    fn always_includes(&self, kind: ArtifactKind) -> bool {
        match kind {
            ArtifactKind::BusinessGoals => self.always_include_business_goals,
            ArtifactKind::AgentGuidelines => self.always_include_agent_guidelines,
            _ => false,
        }
    }
}

/// Category vocabulary, checked in this order; first hit wins.
const CATEGORY_TERMS: &[(FeatureCategory, &[&str])] = &[
    (
        FeatureCategory::Infrastructure,
        &["deploy", "infrastructure", "docker", "kubernetes", "terraform", "pipeline", "aws", "gcp", "azure", "staging", "production"],
    ),
    (
        FeatureCategory::Database,
        &["database", "schema", "migration", "table", "query", "sql", "index", "postgres", "mysql"],
    ),
    (
        FeatureCategory::Api,
        &["api", "endpoint", "rest", "graphql", "route", "request", "response", "http"],
    ),
    (
        FeatureCategory::Ui,
        &["button", "page", "form", "screen", "component", "layout", "frontend", "modal", "view"],
    ),
    (
        FeatureCategory::Integration,
        &["integration", "integrate", "webhook", "third", "party", "sync", "import", "export"],
    ),
];

/// Select artifacts by keyword overlap with the feature description.
///
/// Pure: identical inputs always give an identical result. Never fails.
pub fn select(feature_description: &str, manifest: &Manifest, options: &SelectorOptions) -> SelectionResult {
    let query = extract_keywords(feature_description);
    let mut result = SelectionResult {
        feature_category: infer_category(&query),
        complexity: Complexity::Medium,
        source: SelectionSource::Keyword,
        ..Default::default()
    };

    let mut matched = 0usize;
    for entry in manifest.entries() {
        let score = matches(&query, &entry.keywords);
        let forced = options.always_includes(entry.kind);
        if score > options.threshold || forced {
            result.include(entry.kind, &entry.identifier);
            if score > options.threshold {
                matched += 1;
                result.relevance_scores.insert(entry.identifier.clone(), score);
            }
        }
    }

    result.reasoning = format!(
        "Keyword selection: {} of {} artifacts matched {} feature keywords",
        matched,
        manifest.len(),
        query.len()
    );

    tracing::debug!(
        matched = matched,
        selected = result.selected_count(),
        category = %result.feature_category,
        "Keyword selection complete"
    );

    result
}

fn infer_category(query: &BTreeSet<String>) -> FeatureCategory {
    CATEGORY_TERMS
        .iter()
        .find(|(_, terms)| terms.iter().any(|t| query.contains(*t)))
        .map(|(category, _)| *category)
        .unwrap_or(FeatureCategory::Other)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::{
        AgentGuidelines, Component, InfrastructureDescription, InfrastructureSection,
        ProjectArtifacts, SectionType, SystemDescription,
    };

    fn component(name: &str, description: &str) -> Component {
        Component {
            name: name.into(),
            description: description.into(),
            file_paths: vec![],
            responsibilities: vec![],
            dependencies: vec![],
        }
    }

    fn auth_billing_manifest() -> Manifest {
        Manifest::build(ProjectArtifacts {
            system: SystemDescription {
                components: vec![
                    component("auth", "login token"),
                    component("billing", "invoice payment"),
                ],
                ..Default::default()
            },
            ..Default::default()
        })
    }

    #[test]
    fn test_login_feature_selects_auth_only() {
        let manifest = auth_billing_manifest();
        let sel = select("Add login endpoint with token refresh", &manifest, &SelectorOptions::default());
        assert_eq!(sel.selected.components, vec!["auth".to_string()]);
        assert!(sel.relevance_scores["auth"] > 0.0);
        assert!(!sel.relevance_scores.contains_key("billing"));
        assert_eq!(sel.source, SelectionSource::Keyword);
        assert_eq!(sel.feature_category, FeatureCategory::Api);
    }

    #[test]
    fn test_selection_is_deterministic() {
        let manifest = auth_billing_manifest();
        let opts = SelectorOptions::default();
        let a = select("Refactor invoice payment retries", &manifest, &opts);
        let b = select("Refactor invoice payment retries", &manifest, &opts);
        assert_eq!(a, b);
    }

    #[test]
    fn test_empty_manifest_returns_empty_selection() {
        let sel = select("anything at all", &Manifest::default(), &SelectorOptions::default());
        assert_eq!(sel.selected_count(), 0);
    }

    #[test]
    fn test_selected_identifiers_exist_in_manifest() {
        let manifest = auth_billing_manifest();
        let sel = select("auth billing login invoice", &manifest, &SelectorOptions::default());
        for id in &sel.selected.components {
            assert!(manifest.contains(ArtifactKind::Component, id));
        }
        assert_eq!(sel.selected.components.len(), 2);
    }

    #[test]
    fn test_guidelines_always_included_when_configured() {
        let manifest = Manifest::build(ProjectArtifacts {
            agent_guidelines: Some(AgentGuidelines {
                guardrails: vec!["Never log secrets".into()],
                ..Default::default()
            }),
            ..Default::default()
        });
        let sel = select("Add dark mode", &manifest, &SelectorOptions::default());
        assert!(sel.include_agent_guidelines);
        assert!(sel.relevance_scores.is_empty());

        let opts = SelectorOptions {
            always_include_agent_guidelines: false,
            ..Default::default()
        };
        let sel = select("Add dark mode", &manifest, &opts);
        assert!(!sel.include_agent_guidelines);
    }

    #[test]
    fn test_threshold_is_strict() {
        let manifest = auth_billing_manifest();
        // "login" hits 1 of 2 query keywords: score 0.5.
        let opts = SelectorOptions {
            threshold: 0.5,
            ..Default::default()
        };
        let sel = select("login screen", &manifest, &opts);
        assert!(sel.selected.components.is_empty());
    }

    #[test]
    fn test_database_feature_reaches_storage_section() {
        let manifest = Manifest::build(ProjectArtifacts {
            system: SystemDescription {
                infrastructure: InfrastructureDescription {
                    sections: vec![InfrastructureSection {
                        title: "Primary store".into(),
                        section_type: SectionType::Storage,
                        content: "RDS".into(),
                        keywords: vec![],
                    }],
                },
                ..Default::default()
            },
            ..Default::default()
        });
        let sel = select("Add a database column for nicknames", &manifest, &SelectorOptions::default());
        assert_eq!(sel.selected.infrastructure_sections, vec!["Primary store".to_string()]);
        assert_eq!(sel.feature_category, FeatureCategory::Database);
    }
}
