// promptforge — Project artifacts (canonical entity definitions)

pub mod manifest;

pub use manifest::{Manifest, ManifestEntry, ProjectArtifacts};

use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Artifact kinds
// ---------------------------------------------------------------------------

/// Every kind of stored project context, in fixed manifest order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    BusinessGoals,
    SystemIoExamples,
    Component,
    InfrastructureSection,
    AgentGuidelines,
    BusinessContext,
}

impl ArtifactKind {
    pub const ALL: [ArtifactKind; 6] = [
        ArtifactKind::BusinessGoals,
        ArtifactKind::SystemIoExamples,
        ArtifactKind::Component,
        ArtifactKind::InfrastructureSection,
        ArtifactKind::AgentGuidelines,
        ArtifactKind::BusinessContext,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactKind::BusinessGoals => "business_goals",
            ArtifactKind::SystemIoExamples => "system_io_examples",
            ArtifactKind::Component => "component",
            ArtifactKind::InfrastructureSection => "infrastructure_section",
            ArtifactKind::AgentGuidelines => "agent_guidelines",
            ArtifactKind::BusinessContext => "business_context",
        }
    }

    /// Kinds that exist at most once per project and are selected by flag
    /// rather than by identifier.
    pub fn is_singleton(&self) -> bool {
        matches!(
            self,
            ArtifactKind::BusinessGoals
                | ArtifactKind::SystemIoExamples
                | ArtifactKind::AgentGuidelines
        )
    }

    pub fn parse(s: &str) -> Option<Self> {
        let normalized = s.trim().to_lowercase().replace('-', "_");
        Self::ALL.into_iter().find(|k| {
            k.as_str() == normalized
                || (normalized == "components" && *k == ArtifactKind::Component)
                || (normalized == "infrastructure" && *k == ArtifactKind::InfrastructureSection)
                || (normalized == "guidelines" && *k == ArtifactKind::AgentGuidelines)
        })
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Business goals & guidelines
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BusinessGoals {
    #[serde(default)]
    pub purpose: String,
    #[serde(default)]
    pub external_constraints: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentGuidelines {
    #[serde(default)]
    pub guardrails: Vec<String>,
    #[serde(default)]
    pub best_practices: Vec<String>,
    #[serde(default)]
    pub coding_standards: Vec<String>,
}

impl AgentGuidelines {
    pub fn is_empty(&self) -> bool {
        self.guardrails.is_empty() && self.best_practices.is_empty() && self.coding_standards.is_empty()
    }
}

// ---------------------------------------------------------------------------
// System description
// ---------------------------------------------------------------------------

/// An input/output example, used both at system level and per feature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IoExample {
    pub input_description: String,
    pub output_description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub example: Option<String>,
}

/// An indexed codebase unit. Identity is `name`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Component {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub file_paths: Vec<String>,
    #[serde(default)]
    pub responsibilities: Vec<String>,
    #[serde(default)]
    pub dependencies: Vec<String>,
}

/// Output of a codebase indexing run, stored apart from the system description.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComponentIndex {
    #[serde(default)]
    pub components: Vec<Component>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub indexed_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_root: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SectionType {
    Cicd,
    Deployment,
    Compute,
    Storage,
    Networking,
}

impl SectionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SectionType::Cicd => "cicd",
            SectionType::Deployment => "deployment",
            SectionType::Compute => "compute",
            SectionType::Storage => "storage",
            SectionType::Networking => "networking",
        }
    }

    /// Terms that indicate a feature touches this kind of infrastructure.
    pub fn vocabulary(&self) -> &'static [&'static str] {
        match self {
            SectionType::Cicd => &["pipeline", "deploy", "build", "test", "gitlab", "runner", "cicd"],
            SectionType::Deployment => &["deploy", "container", "docker", "ecs", "fargate", "task"],
            SectionType::Storage => &["storage", "database", "rds", "dynamodb", "data", "persist"],
            SectionType::Networking => &["network", "vpc", "subnet", "security", "load", "balancer", "alb"],
            SectionType::Compute => &["compute", "instance", "ec2", "lambda", "server", "resource"],
        }
    }
}

impl fmt::Display for SectionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A titled piece of infrastructure documentation. Identity is `title`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InfrastructureSection {
    pub title: String,
    pub section_type: SectionType,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub keywords: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InfrastructureDescription {
    #[serde(default)]
    pub sections: Vec<InfrastructureSection>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SystemDescription {
    #[serde(default)]
    pub io_examples: Vec<IoExample>,
    #[serde(default)]
    pub components: Vec<Component>,
    #[serde(default)]
    pub infrastructure: InfrastructureDescription,
}

// ---------------------------------------------------------------------------
// Business context
// ---------------------------------------------------------------------------

/// An indexed business document. Identity is `filename`.
///
/// `extracted_markdown` is stored beside the metadata and joined in by the
/// store on load; it is never written into the metadata list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusinessContextArtifact {
    pub filename: String,
    #[serde(default)]
    pub file_type: String,
    #[serde(default)]
    pub source_uri: String,
    #[serde(default, skip_serializing)]
    pub extracted_markdown: String,
    #[serde(default)]
    pub indexed_at: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BusinessContext {
    #[serde(default)]
    pub artifacts: Vec<BusinessContextArtifact>,
    #[serde(default)]
    pub indexed_at: String,
}

// ---------------------------------------------------------------------------
// Feature request
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeatureType {
    #[default]
    Feature,
    Fix,
    Instance,
}

impl fmt::Display for FeatureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FeatureType::Feature => "feature",
            FeatureType::Fix => "fix",
            FeatureType::Instance => "instance",
        })
    }
}

/// What the downstream model is asked to build.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureRequest {
    pub description: String,
    #[serde(default)]
    pub feature_type: FeatureType,
    #[serde(default)]
    pub examples: Vec<IoExample>,
}

impl FeatureRequest {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            feature_type: FeatureType::Feature,
            examples: Vec::new(),
        }
    }
}
