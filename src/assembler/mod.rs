// promptforge — Prompt assembler (deterministic template rendering)

use crate::artifact::{FeatureRequest, IoExample, Manifest};
use crate::profile::{FormattingProfile, HeadingStyle, Verbosity};
use crate::selection::SelectionResult;
use serde::Serialize;
use std::fmt::Write;
use std::path::Path;

const CLOSING_INSTRUCTION: &str =
    "Please implement this feature following the guidelines and using the system context provided above.";

/// Top-level prompt sections, in render order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionKind {
    BusinessGoals,
    SystemDescription,
    AgentGuidelines,
    BusinessContext,
    FeatureRequest,
}

impl SectionKind {
    pub fn heading(&self) -> &'static str {
        match self {
            SectionKind::BusinessGoals => "Business Goals",
            SectionKind::SystemDescription => "System Description",
            SectionKind::AgentGuidelines => "Development Guidelines",
            SectionKind::BusinessContext => "Business Context Documentation",
            SectionKind::FeatureRequest => "Feature Request",
        }
    }

    fn tag(&self) -> &'static str {
        match self {
            SectionKind::BusinessGoals => "business_goals",
            SectionKind::SystemDescription => "system_description",
            SectionKind::AgentGuidelines => "agent_guidelines",
            SectionKind::BusinessContext => "business_context",
            SectionKind::FeatureRequest => "feature_request",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PromptSection {
    pub kind: SectionKind,
    pub heading: String,
    pub body: String,
}

/// The rendered prompt plus its structure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssembledPrompt {
    pub sections: Vec<PromptSection>,
    /// Model the prompt was requested for (may be unknown to the profile table).
    pub target_model: String,
    /// Profile actually used for rendering.
    pub profile: String,
    pub raw_text: String,
}

impl AssembledPrompt {
    pub fn text(&self) -> &str {
        &self.raw_text
    }

    pub fn has_section(&self, kind: SectionKind) -> bool {
        self.sections.iter().any(|s| s.kind == kind)
    }

    pub fn section_kinds(&self) -> Vec<SectionKind> {
        self.sections.iter().map(|s| s.kind).collect()
    }

    /// Write the prompt text to a file, creating parent directories.
    pub async fn save(&self, path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        tokio::fs::write(path, &self.raw_text).await
    }
}

/// Render the selected artifacts and the feature request.
///
/// Output depends only on the arguments: identical input gives
/// byte-identical text. Sections with nothing selected are omitted;
/// the Feature Request section is always present.
pub fn assemble(
    selection: &SelectionResult,
    manifest: &Manifest,
    feature: &FeatureRequest,
    target_model: &str,
    profile: &FormattingProfile,
) -> AssembledPrompt {
    let r = Renderer { profile };
    let mut sections = Vec::new();

    let candidates = [
        (SectionKind::BusinessGoals, r.business_goals(selection, manifest)),
        (SectionKind::SystemDescription, r.system_description(selection, manifest)),
        (SectionKind::AgentGuidelines, r.agent_guidelines(selection, manifest)),
        (SectionKind::BusinessContext, r.business_context(selection, manifest)),
        (SectionKind::FeatureRequest, Some(r.feature_request(feature))),
    ];
    for (kind, body) in candidates {
        if let Some(body) = body.filter(|b| !b.trim().is_empty()) {
            sections.push(PromptSection {
                kind,
                heading: kind.heading().to_string(),
                body,
            });
        }
    }

    let raw_text = r.document(&sections);
    tracing::debug!(
        profile = %profile.name,
        sections = sections.len(),
        chars = raw_text.len(),
        "Prompt assembled"
    );

    AssembledPrompt {
        sections,
        target_model: target_model.to_string(),
        profile: profile.name.to_string(),
        raw_text,
    }
}

struct Renderer<'a> {
    profile: &'a FormattingProfile,
}

impl Renderer<'_> {
    fn document(&self, sections: &[PromptSection]) -> String {
        let mut out = String::new();
        match self.profile.heading_style {
            HeadingStyle::Markdown => {
                out.push_str("# Software Development Task\n\n");
                for s in sections {
                    let _ = write!(out, "## {}\n\n{}\n", s.heading, s.body);
                }
            }
            HeadingStyle::XmlTags => {
                for s in sections {
                    let _ = write!(out, "<{tag}>\n{}</{tag}>\n\n", s.body, tag = s.kind.tag());
                }
            }
        }
        out
    }

    /// Open a nested block. `level` 3 for subsections, 4 for items.
    fn open(&self, out: &mut String, level: usize, title: &str, tag: &str) {
        match self.profile.heading_style {
            HeadingStyle::Markdown => {
                let _ = writeln!(out, "{} {}", "#".repeat(level), title);
            }
            HeadingStyle::XmlTags if level >= 4 => {
                let _ = writeln!(out, "<{} name=\"{}\">", tag, title.replace('"', "&quot;"));
            }
            HeadingStyle::XmlTags => {
                let _ = writeln!(out, "<{}>", tag);
            }
        }
    }

    fn close(&self, out: &mut String, tag: &str) {
        match self.profile.heading_style {
            HeadingStyle::Markdown => out.push('\n'),
            HeadingStyle::XmlTags => {
                let _ = writeln!(out, "</{}>", tag);
            }
        }
    }

    fn list(&self, out: &mut String, items: &[String]) {
        for item in items {
            let _ = writeln!(out, "- {}", item);
        }
    }

    fn examples(&self, out: &mut String, examples: &[IoExample]) {
        for ex in examples.iter().take(self.profile.max_examples) {
            let _ = writeln!(out, "**Input:** {}", ex.input_description);
            let _ = writeln!(out, "**Output:** {}", ex.output_description);
            if let Some(example) = ex.example.as_deref().filter(|e| !e.trim().is_empty()) {
                let _ = writeln!(out, "**Example:**\n```\n{}\n```", example.trim_end());
            }
        }
    }

    fn business_goals(&self, selection: &SelectionResult, manifest: &Manifest) -> Option<String> {
        if !selection.include_business_goals {
            return None;
        }
        let goals = manifest.artifacts().business_goals.as_ref()?;
        let mut out = String::new();
        if !goals.purpose.trim().is_empty() {
            let _ = writeln!(out, "**Purpose:** {}", goals.purpose.trim());
        }
        if !goals.external_constraints.is_empty() {
            out.push_str("\n**External Constraints:**\n");
            self.list(&mut out, &goals.external_constraints);
        }
        Some(out)
    }

    fn system_description(&self, selection: &SelectionResult, manifest: &Manifest) -> Option<String> {
        let system = &manifest.artifacts().system;
        let mut out = String::new();

        if selection.include_system_io_examples && !system.io_examples.is_empty() {
            self.open(&mut out, 3, "System Input/Output Examples", "io_examples");
            self.examples(&mut out, &system.io_examples);
            self.close(&mut out, "io_examples");
        }

        let components: Vec<_> = selection
            .selected
            .components
            .iter()
            .filter_map(|name| manifest.component(name))
            .collect();
        if !components.is_empty() {
            self.open(&mut out, 3, "Components", "components");
            for c in components {
                self.open(&mut out, 4, &c.name, "component");
                if !c.description.trim().is_empty() {
                    let _ = writeln!(out, "{}", c.description.trim());
                }
                if self.profile.verbosity == Verbosity::Detailed {
                    if !c.responsibilities.is_empty() {
                        out.push_str("**Responsibilities:**\n");
                        self.list(&mut out, &c.responsibilities);
                    }
                    if !c.dependencies.is_empty() {
                        let _ = writeln!(out, "**Dependencies:** {}", c.dependencies.join(", "));
                    }
                }
                if !c.file_paths.is_empty() {
                    let shown: Vec<_> = c
                        .file_paths
                        .iter()
                        .take(self.profile.max_file_paths)
                        .map(String::as_str)
                        .collect();
                    let _ = writeln!(out, "**Files:** {}", shown.join(", "));
                }
                self.close(&mut out, "component");
            }
            self.close(&mut out, "components");
        }

        let sections: Vec<_> = selection
            .selected
            .infrastructure_sections
            .iter()
            .filter_map(|title| manifest.section(title))
            .collect();
        if !sections.is_empty() {
            self.open(&mut out, 3, "Infrastructure", "infrastructure");
            for s in sections {
                self.open(&mut out, 4, &s.title, "section");
                let _ = writeln!(out, "*Type: {}*", s.section_type);
                if !s.content.trim().is_empty() {
                    let _ = writeln!(out, "{}", s.content.trim());
                }
                self.close(&mut out, "section");
            }
            self.close(&mut out, "infrastructure");
        }

        (!out.is_empty()).then_some(out)
    }

    fn agent_guidelines(&self, selection: &SelectionResult, manifest: &Manifest) -> Option<String> {
        if !selection.include_agent_guidelines {
            return None;
        }
        let guidelines = manifest.artifacts().agent_guidelines.as_ref()?;
        let mut out = String::new();
        let groups = [
            ("Guardrails", "guardrails", &guidelines.guardrails),
            ("Best Practices", "best_practices", &guidelines.best_practices),
            ("Coding Standards", "coding_standards", &guidelines.coding_standards),
        ];
        for (title, tag, items) in groups {
            if items.is_empty() {
                continue;
            }
            self.open(&mut out, 3, title, tag);
            self.list(&mut out, items);
            self.close(&mut out, tag);
        }
        Some(out)
    }

    fn business_context(&self, selection: &SelectionResult, manifest: &Manifest) -> Option<String> {
        let docs: Vec<_> = selection
            .selected
            .business_context
            .iter()
            .filter_map(|name| manifest.document(name))
            .collect();
        if docs.is_empty() {
            return None;
        }
        let mut out =
            String::from("The following business context documents provide additional domain knowledge:\n\n");
        for doc in docs {
            self.open(&mut out, 3, &doc.filename, "document");
            let _ = writeln!(out, "*Source: {} ({})*\n", doc.source_uri, doc.file_type);
            if !doc.extracted_markdown.trim().is_empty() {
                let _ = writeln!(out, "{}", doc.extracted_markdown.trim());
            }
            self.close(&mut out, "document");
        }
        Some(out)
    }

    fn feature_request(&self, feature: &FeatureRequest) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "**Type:** {}", feature.feature_type);
        let _ = writeln!(out, "**Description:** {}\n", feature.description.trim());
        if !feature.examples.is_empty() {
            self.open(&mut out, 3, "Feature Examples", "examples");
            self.examples(&mut out, &feature.examples);
            self.close(&mut out, "examples");
        }
        let _ = writeln!(out, "---\n{}", CLOSING_INSTRUCTION);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::{
        AgentGuidelines, ArtifactKind, BusinessGoals, Component, InfrastructureDescription,
        InfrastructureSection, ProjectArtifacts, SectionType, SystemDescription,
    };
    use crate::profile::{profile_for, DEFAULT_PROFILE};

    fn manifest() -> Manifest {
        Manifest::build(ProjectArtifacts {
            business_goals: Some(BusinessGoals {
                purpose: "Sell widgets".into(),
                external_constraints: vec!["PCI DSS".into()],
            }),
            system: SystemDescription {
                io_examples: vec![],
                components: vec![Component {
                    name: "auth".into(),
                    description: "Login and tokens".into(),
                    file_paths: (1..=8).map(|i| format!("src/auth/{}.rs", i)).collect(),
                    responsibilities: vec!["Issue tokens".into()],
                    dependencies: vec!["db".into()],
                }],
                infrastructure: InfrastructureDescription {
                    sections: vec![InfrastructureSection {
                        title: "Primary DB".into(),
                        section_type: SectionType::Storage,
                        content: "Postgres".into(),
                        keywords: vec![],
                    }],
                },
            },
            agent_guidelines: Some(AgentGuidelines {
                guardrails: vec!["Never log secrets".into()],
                best_practices: vec![],
                coding_standards: vec!["rustfmt".into()],
            }),
            business_context: vec![],
        })
    }

    fn feature() -> FeatureRequest {
        FeatureRequest::new("Add login endpoint")
    }

    #[test]
    fn test_empty_selection_renders_only_feature_request() {
        let profile = profile_for(DEFAULT_PROFILE, DEFAULT_PROFILE);
        let prompt = assemble(&SelectionResult::default(), &manifest(), &feature(), DEFAULT_PROFILE, profile);
        assert_eq!(prompt.section_kinds(), vec![SectionKind::FeatureRequest]);
        assert!(prompt.raw_text.contains("Add login endpoint"));
        assert!(!prompt.raw_text.contains("## System Description"));
    }

    #[test]
    fn test_fixed_section_order() {
        let profile = profile_for(DEFAULT_PROFILE, DEFAULT_PROFILE);
        let sel = SelectionResult::all(&manifest());
        let prompt = assemble(&sel, &manifest(), &feature(), DEFAULT_PROFILE, profile);
        assert_eq!(
            prompt.section_kinds(),
            vec![
                SectionKind::BusinessGoals,
                SectionKind::SystemDescription,
                SectionKind::AgentGuidelines,
                SectionKind::FeatureRequest,
            ]
        );
        let text = &prompt.raw_text;
        let goals = text.find("## Business Goals").unwrap();
        let system = text.find("## System Description").unwrap();
        let guidelines = text.find("## Development Guidelines").unwrap();
        let request = text.find("## Feature Request").unwrap();
        assert!(goals < system && system < guidelines && guidelines < request);
        // Empty guideline list is not rendered.
        assert!(!text.contains("### Best Practices"));
    }

    #[test]
    fn test_assembly_is_byte_identical() {
        let profile = profile_for("claude-3-opus", DEFAULT_PROFILE);
        let sel = SelectionResult::all(&manifest());
        let a = assemble(&sel, &manifest(), &feature(), "claude-3-opus", profile);
        let b = assemble(&sel, &manifest(), &feature(), "claude-3-opus", profile);
        assert_eq!(a.raw_text, b.raw_text);
    }

    #[test]
    fn test_xml_profile_uses_tags() {
        let profile = profile_for("claude-3-opus", DEFAULT_PROFILE);
        let mut sel = SelectionResult::default();
        sel.include(ArtifactKind::Component, "auth");
        let prompt = assemble(&sel, &manifest(), &feature(), "claude-3-opus", profile);
        assert!(prompt.raw_text.contains("<system_description>"));
        assert!(prompt.raw_text.contains("<component name=\"auth\">"));
        assert!(prompt.raw_text.contains("</feature_request>"));
        assert!(!prompt.raw_text.contains("## "));
    }

    #[test]
    fn test_concise_profile_limits_detail() {
        let profile = profile_for("gpt-3.5-turbo", DEFAULT_PROFILE);
        let mut sel = SelectionResult::default();
        sel.include(ArtifactKind::Component, "auth");
        let prompt = assemble(&sel, &manifest(), &feature(), "gpt-3.5-turbo", profile);
        assert!(!prompt.raw_text.contains("Issue tokens"));
        assert!(prompt.raw_text.contains("src/auth/3.rs"));
        assert!(!prompt.raw_text.contains("src/auth/4.rs"));
    }

    #[test]
    fn test_only_selected_components_rendered() {
        let profile = profile_for(DEFAULT_PROFILE, DEFAULT_PROFILE);
        let mut sel = SelectionResult::default();
        sel.include(ArtifactKind::InfrastructureSection, "Primary DB");
        let prompt = assemble(&sel, &manifest(), &feature(), DEFAULT_PROFILE, profile);
        assert!(prompt.raw_text.contains("#### Primary DB"));
        assert!(!prompt.raw_text.contains("### Components"));
    }

    #[tokio::test]
    async fn test_save_writes_raw_text() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("out").join("prompt.md");
        let profile = profile_for(DEFAULT_PROFILE, DEFAULT_PROFILE);
        let prompt = assemble(&SelectionResult::default(), &manifest(), &feature(), DEFAULT_PROFILE, profile);
        prompt.save(&path).await.unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), prompt.raw_text);
    }
}
