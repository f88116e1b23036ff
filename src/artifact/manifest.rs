// promptforge — Artifact manifest (read-only snapshot for one build call)

use super::{
    AgentGuidelines, ArtifactKind, BusinessContextArtifact, BusinessGoals, Component,
    InfrastructureSection, IoExample, SystemDescription,
};
use crate::keywords::extract_keywords;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

const SECTION_EXCERPT_CHARS: usize = 500;
const DOCUMENT_EXCERPT_CHARS: usize = 800;

/// Everything loaded from the store that a prompt may render.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectArtifacts {
    pub business_goals: Option<BusinessGoals>,
    pub system: SystemDescription,
    pub agent_guidelines: Option<AgentGuidelines>,
    pub business_context: Vec<BusinessContextArtifact>,
}

/// One selectable artifact as seen by the selectors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub kind: ArtifactKind,
    pub identifier: String,
    pub display_name: String,
    pub text_excerpt: String,
    pub keywords: BTreeSet<String>,
}

/// Immutable snapshot of the available artifacts.
///
/// Entry order is fixed: business goals, system IO examples, components,
/// infrastructure sections, agent guidelines, business-context documents.
/// Within a kind, stored order is kept.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    entries: Vec<ManifestEntry>,
    artifacts: ProjectArtifacts,
}

impl Manifest {
    pub fn build(artifacts: ProjectArtifacts) -> Self {
        let mut entries = Vec::new();

        if let Some(goals) = &artifacts.business_goals {
            if !goals.purpose.trim().is_empty() || !goals.external_constraints.is_empty() {
                entries.push(goals_entry(goals));
            }
        }
        if !artifacts.system.io_examples.is_empty() {
            entries.push(io_examples_entry(&artifacts.system.io_examples));
        }
        entries.extend(artifacts.system.components.iter().map(component_entry));
        entries.extend(
            artifacts
                .system
                .infrastructure
                .sections
                .iter()
                .map(section_entry),
        );
        if let Some(guidelines) = &artifacts.agent_guidelines {
            if !guidelines.is_empty() {
                entries.push(guidelines_entry(guidelines));
            }
        }
        entries.extend(artifacts.business_context.iter().map(document_entry));

        Self { entries, artifacts }
    }

    pub fn entries(&self) -> &[ManifestEntry] {
        &self.entries
    }

    pub fn artifacts(&self) -> &ProjectArtifacts {
        &self.artifacts
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn entries_of(&self, kind: ArtifactKind) -> impl Iterator<Item = &ManifestEntry> {
        self.entries.iter().filter(move |e| e.kind == kind)
    }

    pub fn has_kind(&self, kind: ArtifactKind) -> bool {
        self.entries_of(kind).next().is_some()
    }

    pub fn contains(&self, kind: ArtifactKind, identifier: &str) -> bool {
        self.entries_of(kind).any(|e| e.identifier == identifier)
    }

    pub fn component(&self, name: &str) -> Option<&Component> {
        self.artifacts.system.components.iter().find(|c| c.name == name)
    }

    pub fn section(&self, title: &str) -> Option<&InfrastructureSection> {
        self.artifacts
            .system
            .infrastructure
            .sections
            .iter()
            .find(|s| s.title == title)
    }

    pub fn document(&self, filename: &str) -> Option<&BusinessContextArtifact> {
        self.artifacts
            .business_context
            .iter()
            .find(|d| d.filename == filename)
    }
}

fn goals_entry(goals: &BusinessGoals) -> ManifestEntry {
    let text = format!("{} {}", goals.purpose, goals.external_constraints.join(" "));
    ManifestEntry {
        kind: ArtifactKind::BusinessGoals,
        identifier: ArtifactKind::BusinessGoals.as_str().to_string(),
        display_name: "Business Goals".to_string(),
        text_excerpt: excerpt(&goals.purpose, SECTION_EXCERPT_CHARS),
        keywords: extract_keywords(&text),
    }
}

fn io_examples_entry(examples: &[IoExample]) -> ManifestEntry {
    let text = examples
        .iter()
        .map(|ex| format!("{} {}", ex.input_description, ex.output_description))
        .collect::<Vec<_>>()
        .join(" ");
    let first = &examples[0];
    ManifestEntry {
        kind: ArtifactKind::SystemIoExamples,
        identifier: ArtifactKind::SystemIoExamples.as_str().to_string(),
        display_name: "System Input/Output Examples".to_string(),
        text_excerpt: excerpt(
            &format!("{} -> {}", first.input_description, first.output_description),
            SECTION_EXCERPT_CHARS,
        ),
        keywords: extract_keywords(&text),
    }
}

fn component_entry(component: &Component) -> ManifestEntry {
    let text = format!(
        "{} {} {}",
        component.name,
        component.description,
        component.responsibilities.join(" ")
    );
    ManifestEntry {
        kind: ArtifactKind::Component,
        identifier: component.name.clone(),
        display_name: component.name.clone(),
        text_excerpt: excerpt(&component.description, SECTION_EXCERPT_CHARS),
        keywords: extract_keywords(&text),
    }
}

fn section_entry(section: &InfrastructureSection) -> ManifestEntry {
    let mut keywords = extract_keywords(&section.title);
    for kw in &section.keywords {
        keywords.extend(extract_keywords(kw));
    }
    keywords.extend(
        section
            .section_type
            .vocabulary()
            .iter()
            .map(|w| w.to_string()),
    );
    ManifestEntry {
        kind: ArtifactKind::InfrastructureSection,
        identifier: section.title.clone(),
        display_name: format!("{} ({})", section.title, section.section_type),
        text_excerpt: excerpt(&section.content, SECTION_EXCERPT_CHARS),
        keywords,
    }
}

fn guidelines_entry(guidelines: &AgentGuidelines) -> ManifestEntry {
    let text = guidelines
        .guardrails
        .iter()
        .chain(&guidelines.best_practices)
        .chain(&guidelines.coding_standards)
        .cloned()
        .collect::<Vec<_>>()
        .join(" ");
    ManifestEntry {
        kind: ArtifactKind::AgentGuidelines,
        identifier: ArtifactKind::AgentGuidelines.as_str().to_string(),
        display_name: "Development Guidelines".to_string(),
        text_excerpt: format!(
            "{} guardrails, {} best practices, {} coding standards",
            guidelines.guardrails.len(),
            guidelines.best_practices.len(),
            guidelines.coding_standards.len()
        ),
        keywords: extract_keywords(&text),
    }
}

fn document_entry(doc: &BusinessContextArtifact) -> ManifestEntry {
    let summary = document_summary(&doc.extracted_markdown, DOCUMENT_EXCERPT_CHARS);
    let stem = doc
        .filename
        .rsplit_once('.')
        .map(|(stem, _)| stem)
        .unwrap_or(&doc.filename);
    ManifestEntry {
        kind: ArtifactKind::BusinessContext,
        identifier: doc.filename.clone(),
        display_name: format!("{} ({})", doc.filename, doc.file_type),
        keywords: extract_keywords(&format!("{} {}", stem, summary)),
        text_excerpt: summary,
    }
}

/// Prefer an "Overview" section when it fits, else the leading text.
fn document_summary(markdown: &str, max_chars: usize) -> String {
    for marker in ["## Overview", "**Overview**"] {
        if let Some(start) = markdown.find(marker) {
            let rest = &markdown[start + marker.len()..];
            let end = rest
                .find("\n##")
                .or_else(|| rest.find("\n**"))
                .map(|i| start + marker.len() + i)
                .unwrap_or(markdown.len());
            let overview = markdown[start..end].trim();
            if overview.chars().count() <= max_chars {
                return overview.to_string();
            }
        }
    }
    excerpt(markdown, max_chars)
}

/// Truncate to `max_chars` characters, marking the cut with "...".
pub(crate) fn excerpt(text: &str, max_chars: usize) -> String {
    let trimmed = text.trim();
    match trimmed.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &trimmed[..idx]),
        None => trimmed.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::SectionType;

    fn sample() -> ProjectArtifacts {
        ProjectArtifacts {
            business_goals: Some(BusinessGoals {
                purpose: "Sell widgets online".into(),
                external_constraints: vec!["PCI compliance".into()],
            }),
            system: SystemDescription {
                io_examples: vec![],
                components: vec![
                    Component {
                        name: "auth".into(),
                        description: "Handles login and token issuance".into(),
                        file_paths: vec!["src/auth.rs".into()],
                        responsibilities: vec![],
                        dependencies: vec![],
                    },
                    Component {
                        name: "billing".into(),
                        description: "Invoice and payment processing".into(),
                        file_paths: vec![],
                        responsibilities: vec![],
                        dependencies: vec![],
                    },
                ],
                infrastructure: crate::artifact::InfrastructureDescription {
                    sections: vec![InfrastructureSection {
                        title: "Primary Database".into(),
                        section_type: SectionType::Storage,
                        content: "Postgres 15 on RDS".into(),
                        keywords: vec!["Postgres".into()],
                    }],
                },
            },
            agent_guidelines: Some(AgentGuidelines::default()),
            business_context: vec![],
        }
    }

    #[test]
    fn test_manifest_order_and_skips_empty_singletons() {
        let manifest = Manifest::build(sample());
        let kinds: Vec<_> = manifest.entries().iter().map(|e| e.kind).collect();
        assert_eq!(
            kinds,
            vec![
                ArtifactKind::BusinessGoals,
                ArtifactKind::Component,
                ArtifactKind::Component,
                ArtifactKind::InfrastructureSection,
            ]
        );
        assert!(!manifest.has_kind(ArtifactKind::AgentGuidelines));
    }

    #[test]
    fn test_section_keywords_include_type_vocabulary() {
        let manifest = Manifest::build(sample());
        let entry = manifest
            .entries_of(ArtifactKind::InfrastructureSection)
            .next()
            .unwrap();
        assert!(entry.keywords.contains("postgres"));
        assert!(entry.keywords.contains("database"));
        assert!(entry.keywords.contains("persist"));
    }

    #[test]
    fn test_contains_is_scoped_by_kind() {
        let manifest = Manifest::build(sample());
        assert!(manifest.contains(ArtifactKind::Component, "auth"));
        assert!(!manifest.contains(ArtifactKind::InfrastructureSection, "auth"));
        assert!(!manifest.contains(ArtifactKind::Component, "nonexistent"));
    }

    #[test]
    fn test_document_summary_prefers_overview() {
        let md = "# Pricing\nintro text\n## Overview\nTiered pricing rules\n## Details\nlots";
        assert_eq!(document_summary(md, 800), "## Overview\nTiered pricing rules");
    }

    #[test]
    fn test_excerpt_char_boundary() {
        assert_eq!(excerpt("héllo wörld", 5), "héllo...");
        assert_eq!(excerpt("short", 10), "short");
    }
}
