// promptforge — Selection result (output of either selection path)

use crate::artifact::{ArtifactKind, Manifest};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeatureCategory {
    Api,
    Database,
    Ui,
    Infrastructure,
    Integration,
    #[default]
    Other,
}

impl fmt::Display for FeatureCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FeatureCategory::Api => "api",
            FeatureCategory::Database => "database",
            FeatureCategory::Ui => "ui",
            FeatureCategory::Infrastructure => "infrastructure",
            FeatureCategory::Integration => "integration",
            FeatureCategory::Other => "other",
        })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Complexity {
    Low,
    #[default]
    Medium,
    High,
}

impl fmt::Display for Complexity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Complexity::Low => "low",
            Complexity::Medium => "medium",
            Complexity::High => "high",
        })
    }
}

/// Which path produced a selection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionSource {
    Classifier,
    #[default]
    Keyword,
    AllContext,
}

/// Selected identifiers for the multi-entry kinds, in manifest order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectedIds {
    #[serde(default)]
    pub components: Vec<String>,
    #[serde(default)]
    pub infrastructure_sections: Vec<String>,
    #[serde(default)]
    pub business_context: Vec<String>,
}

impl SelectedIds {
    pub fn for_kind(&self, kind: ArtifactKind) -> &[String] {
        match kind {
            ArtifactKind::Component => &self.components,
            ArtifactKind::InfrastructureSection => &self.infrastructure_sections,
            ArtifactKind::BusinessContext => &self.business_context,
            _ => &[],
        }
    }

    fn for_kind_mut(&mut self, kind: ArtifactKind) -> Option<&mut Vec<String>> {
        match kind {
            ArtifactKind::Component => Some(&mut self.components),
            ArtifactKind::InfrastructureSection => Some(&mut self.infrastructure_sections),
            ArtifactKind::BusinessContext => Some(&mut self.business_context),
            _ => None,
        }
    }

    pub fn contains(&self, kind: ArtifactKind, identifier: &str) -> bool {
        self.for_kind(kind).iter().any(|id| id == identifier)
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
            && self.infrastructure_sections.is_empty()
            && self.business_context.is_empty()
    }
}

/// Which artifacts to render, plus the judgment (or heuristic) behind it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SelectionResult {
    pub selected: SelectedIds,
    pub include_business_goals: bool,
    pub include_agent_guidelines: bool,
    pub include_system_io_examples: bool,
    pub reasoning: String,
    pub feature_category: FeatureCategory,
    pub complexity: Complexity,
    /// Identifier → score in [0, 1]. Absent means unranked, not zero.
    pub relevance_scores: BTreeMap<String, f64>,
    pub source: SelectionSource,
}

impl SelectionResult {
    /// Select every entry of the manifest.
    pub fn all(manifest: &Manifest) -> Self {
        let mut result = SelectionResult {
            reasoning: "All available context included".to_string(),
            source: SelectionSource::AllContext,
            ..Default::default()
        };
        for entry in manifest.entries() {
            result.include(entry.kind, &entry.identifier);
        }
        result
    }

    /// Mark one artifact as selected. Singleton kinds set their flag.
    pub fn include(&mut self, kind: ArtifactKind, identifier: &str) {
        match kind {
            ArtifactKind::BusinessGoals => self.include_business_goals = true,
            ArtifactKind::AgentGuidelines => self.include_agent_guidelines = true,
            ArtifactKind::SystemIoExamples => self.include_system_io_examples = true,
            _ => {
                if let Some(ids) = self.selected.for_kind_mut(kind) {
                    if !ids.iter().any(|id| id == identifier) {
                        ids.push(identifier.to_string());
                    }
                }
            }
        }
    }

    pub fn is_selected(&self, kind: ArtifactKind, identifier: &str) -> bool {
        match kind {
            ArtifactKind::BusinessGoals => self.include_business_goals,
            ArtifactKind::AgentGuidelines => self.include_agent_guidelines,
            ArtifactKind::SystemIoExamples => self.include_system_io_examples,
            _ => self.selected.contains(kind, identifier),
        }
    }

    /// Selected identifiers whose explicit score is below `cutoff`.
    ///
    /// Advisory only: unranked identifiers are never reported.
    pub fn borderline(&self, cutoff: f64) -> Vec<String> {
        [
            &self.selected.components,
            &self.selected.infrastructure_sections,
            &self.selected.business_context,
        ]
        .into_iter()
        .flatten()
        .filter(|id| {
            self.relevance_scores
                .get(id.as_str())
                .is_some_and(|score| *score < cutoff)
        })
        .cloned()
        .collect()
    }

    /// Number of selected artifacts, counting each enabled flag once.
    pub fn selected_count(&self) -> usize {
        self.selected.components.len()
            + self.selected.infrastructure_sections.len()
            + self.selected.business_context.len()
            + usize::from(self.include_business_goals)
            + usize::from(self.include_agent_guidelines)
            + usize::from(self.include_system_io_examples)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_include_deduplicates() {
        let mut sel = SelectionResult::default();
        sel.include(ArtifactKind::Component, "auth");
        sel.include(ArtifactKind::Component, "auth");
        sel.include(ArtifactKind::AgentGuidelines, "agent_guidelines");
        assert_eq!(sel.selected.components, vec!["auth".to_string()]);
        assert!(sel.include_agent_guidelines);
        assert_eq!(sel.selected_count(), 2);
    }

    #[test]
    fn test_borderline_ignores_unranked() {
        let mut sel = SelectionResult::default();
        sel.include(ArtifactKind::Component, "auth");
        sel.include(ArtifactKind::Component, "billing");
        sel.include(ArtifactKind::BusinessContext, "terms.md");
        sel.relevance_scores.insert("auth".into(), 0.9);
        sel.relevance_scores.insert("billing".into(), 0.2);
        assert_eq!(sel.borderline(0.5), vec!["billing".to_string()]);
    }

    #[test]
    fn test_category_serde_lowercase() {
        let cat: FeatureCategory = serde_json::from_str("\"infrastructure\"").unwrap();
        assert_eq!(cat, FeatureCategory::Infrastructure);
        assert!(serde_json::from_str::<Complexity>("\"extreme\"").is_err());
    }
}
