// promptforge — Artifact store (flat JSON files in a resources directory)

use crate::artifact::{
    AgentGuidelines, ArtifactKind, BusinessContext, BusinessContextArtifact, BusinessGoals,
    ComponentIndex, InfrastructureDescription, InfrastructureSection, Manifest, ManifestEntry,
    ProjectArtifacts, SystemDescription,
};
use crate::error::StoreError;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tokio::sync::{Mutex, MutexGuard};

const BUSINESS_GOALS_FILE: &str = "business_goals.json";
const SYSTEM_DESCRIPTION_FILE: &str = "system_description.json";
const AGENT_GUIDELINES_FILE: &str = "agent_guidelines.json";
const COMPONENT_INDEX_FILE: &str = "component_index.json";
const INFRASTRUCTURE_FILE: &str = "infrastructure.json";
const BUSINESS_CONTEXT_FILE: &str = "business_context.json";
const BUSINESS_CONTEXT_DIR: &str = "business-context";

/// Persists project artifacts as JSON files under one directory.
///
/// Reads take no lock. Writes are serialized per artifact kind and land
/// atomically (temp file + rename), so a reader sees either the old or
/// the new file, never a partial one.
pub struct ArtifactStore {
    root: PathBuf,
    locks: [Mutex<()>; 6],
}

impl ArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            locks: Default::default(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn exists(&self) -> bool {
        self.root.is_dir()
    }

    /// Create the resources directory layout.
    pub async fn init(&self) -> Result<(), StoreError> {
        tokio::fs::create_dir_all(self.root.join(BUSINESS_CONTEXT_DIR)).await?;
        Ok(())
    }

    async fn lock(&self, kind: ArtifactKind) -> MutexGuard<'_, ()> {
        self.locks[kind as usize].lock().await
    }

    // -----------------------------------------------------------------------
    // Per-kind load / save
    // -----------------------------------------------------------------------

    pub async fn load_business_goals(&self) -> Result<Option<BusinessGoals>, StoreError> {
        read_json(&self.root.join(BUSINESS_GOALS_FILE)).await
    }

    pub async fn save_business_goals(&self, goals: &BusinessGoals) -> Result<(), StoreError> {
        let _guard = self.lock(ArtifactKind::BusinessGoals).await;
        write_json(&self.root.join(BUSINESS_GOALS_FILE), goals).await
    }

    pub async fn load_system_description(&self) -> Result<Option<SystemDescription>, StoreError> {
        read_json(&self.root.join(SYSTEM_DESCRIPTION_FILE)).await
    }

    pub async fn save_system_description(&self, system: &SystemDescription) -> Result<(), StoreError> {
        let _guard = self.lock(ArtifactKind::SystemIoExamples).await;
        write_json(&self.root.join(SYSTEM_DESCRIPTION_FILE), system).await
    }

    pub async fn load_agent_guidelines(&self) -> Result<Option<AgentGuidelines>, StoreError> {
        read_json(&self.root.join(AGENT_GUIDELINES_FILE)).await
    }

    pub async fn save_agent_guidelines(&self, guidelines: &AgentGuidelines) -> Result<(), StoreError> {
        let _guard = self.lock(ArtifactKind::AgentGuidelines).await;
        write_json(&self.root.join(AGENT_GUIDELINES_FILE), guidelines).await
    }

    pub async fn load_component_index(&self) -> Result<Option<ComponentIndex>, StoreError> {
        read_json(&self.root.join(COMPONENT_INDEX_FILE)).await
    }

    pub async fn save_component_index(&self, index: &ComponentIndex) -> Result<(), StoreError> {
        let _guard = self.lock(ArtifactKind::Component).await;
        write_json(&self.root.join(COMPONENT_INDEX_FILE), index).await
    }

    pub async fn load_infrastructure(&self) -> Result<Option<InfrastructureDescription>, StoreError> {
        read_json(&self.root.join(INFRASTRUCTURE_FILE)).await
    }

    pub async fn save_infrastructure(&self, infra: &InfrastructureDescription) -> Result<(), StoreError> {
        let _guard = self.lock(ArtifactKind::InfrastructureSection).await;
        write_json(&self.root.join(INFRASTRUCTURE_FILE), infra).await
    }

    /// Merge scraped sections into the stored infrastructure description.
    ///
    /// A section replaces any stored section with the same title; new titles
    /// are appended. Returns the merged description.
    pub async fn merge_infrastructure_sections(
        &self,
        sections: Vec<InfrastructureSection>,
    ) -> Result<InfrastructureDescription, StoreError> {
        let _guard = self.lock(ArtifactKind::InfrastructureSection).await;
        let path = self.root.join(INFRASTRUCTURE_FILE);
        let mut infra: InfrastructureDescription = read_json(&path).await?.unwrap_or_default();

        for section in sections {
            match infra.sections.iter_mut().find(|s| s.title == section.title) {
                Some(existing) => *existing = section,
                None => infra.sections.push(section),
            }
        }

        write_json(&path, &infra).await?;
        tracing::info!(sections = infra.sections.len(), "Infrastructure sections merged");
        Ok(infra)
    }

    // -----------------------------------------------------------------------
    // Business context
    // -----------------------------------------------------------------------

    /// Metadata list only; Markdown bodies are left empty.
    pub async fn load_business_context(&self) -> Result<Option<BusinessContext>, StoreError> {
        read_json(&self.root.join(BUSINESS_CONTEXT_FILE)).await
    }

    /// Store one indexed document: its Markdown body and its metadata entry.
    /// An entry with the same filename is replaced.
    pub async fn save_business_context_document(
        &self,
        mut artifact: BusinessContextArtifact,
    ) -> Result<(), StoreError> {
        let _guard = self.lock(ArtifactKind::BusinessContext).await;

        if artifact.indexed_at.is_empty() {
            artifact.indexed_at = chrono::Utc::now().to_rfc3339();
        }

        let md_path = self.document_path(&artifact.filename);
        write_atomic(&md_path, artifact.extracted_markdown.as_bytes()).await?;

        let meta_path = self.root.join(BUSINESS_CONTEXT_FILE);
        let mut context: BusinessContext = read_json(&meta_path).await?.unwrap_or_default();
        context.indexed_at = artifact.indexed_at.clone();
        match context
            .artifacts
            .iter_mut()
            .find(|a| a.filename == artifact.filename)
        {
            Some(existing) => *existing = artifact,
            None => context.artifacts.push(artifact),
        }
        write_json(&meta_path, &context).await
    }

    /// Load one document with its Markdown body joined in.
    pub async fn load_business_context_document(
        &self,
        filename: &str,
    ) -> Result<BusinessContextArtifact, StoreError> {
        let not_found = || StoreError::NotFound {
            kind: ArtifactKind::BusinessContext,
            identifier: filename.to_string(),
        };
        let context = self.load_business_context().await?.ok_or_else(not_found)?;
        let mut artifact = context
            .artifacts
            .into_iter()
            .find(|a| a.filename == filename)
            .ok_or_else(not_found)?;
        artifact.extracted_markdown = self.read_document_body(&artifact.filename).await?;
        Ok(artifact)
    }

    fn document_path(&self, filename: &str) -> PathBuf {
        let safe_name = Path::new(filename)
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| filename.replace(['/', '\\'], "_"));
        self.root
            .join(BUSINESS_CONTEXT_DIR)
            .join(format!("{}.md", safe_name))
    }

    async fn read_document_body(&self, filename: &str) -> Result<String, StoreError> {
        match tokio::fs::read_to_string(self.document_path(filename)).await {
            Ok(body) => Ok(body),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(filename = %filename, "Business context body missing, using empty text");
                Ok(String::new())
            }
            Err(e) => Err(e.into()),
        }
    }

    // -----------------------------------------------------------------------
    // Snapshot
    // -----------------------------------------------------------------------

    /// Load everything a prompt may render.
    ///
    /// Components come from the system description first, then from the
    /// component index for names not already present. Infrastructure comes
    /// from `infrastructure.json` when it exists.
    pub async fn load_artifacts(&self) -> Result<ProjectArtifacts, StoreError> {
        let business_goals = self.load_business_goals().await?;
        let agent_guidelines = self.load_agent_guidelines().await?;
        let mut system = self.load_system_description().await?.unwrap_or_default();

        if let Some(index) = self.load_component_index().await? {
            for component in index.components {
                if !system.components.iter().any(|c| c.name == component.name) {
                    system.components.push(component);
                }
            }
        }
        if let Some(infra) = self.load_infrastructure().await? {
            system.infrastructure = infra;
        }

        let mut business_context = Vec::new();
        if let Some(context) = self.load_business_context().await? {
            for mut artifact in context.artifacts {
                artifact.extracted_markdown = self.read_document_body(&artifact.filename).await?;
                business_context.push(artifact);
            }
        }

        Ok(ProjectArtifacts {
            business_goals,
            system,
            agent_guidelines,
            business_context,
        })
    }

    /// Build the manifest for one build call.
    pub async fn manifest(&self) -> Result<Manifest, StoreError> {
        if !self.exists() {
            return Err(StoreError::Unavailable(self.root.display().to_string()));
        }
        let manifest = Manifest::build(self.load_artifacts().await?);
        tracing::debug!(entries = manifest.len(), root = %self.root.display(), "Manifest built");
        Ok(manifest)
    }

    /// Look up a named artifact, failing with `NotFound` when absent.
    pub async fn require(
        &self,
        kind: ArtifactKind,
        identifier: &str,
    ) -> Result<ManifestEntry, StoreError> {
        let manifest = self.manifest().await?;
        let found = manifest
            .entries_of(kind)
            .find(|e| e.identifier == identifier)
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                kind,
                identifier: identifier.to_string(),
            });
        found
    }
}

async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, StoreError> {
    match tokio::fs::read_to_string(path).await {
        Ok(content) => Ok(Some(serde_json::from_str(&content)?)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

async fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), StoreError> {
    let content = serde_json::to_string_pretty(value)?;
    write_atomic(path, content.as_bytes()).await
}

async fn write_atomic(path: &Path, content: &[u8]) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    // Atomic write: write to temp file then rename
    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp_path = PathBuf::from(tmp_name);
    tokio::fs::write(&tmp_path, content).await?;
    tokio::fs::rename(&tmp_path, path).await?;

    Ok(())
}
