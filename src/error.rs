// promptforge — Error types
//
// One enum per concern. Classification and optimization failures are
// recovered inside the pipeline; only store-level failures reach callers.

use crate::artifact::ArtifactKind;
use std::time::Duration;
use thiserror::Error;

/// Failures of the external judgment service (network, timeout, bad reply).
#[derive(Error, Debug, Clone)]
pub enum ServiceError {
    #[error("network error: {0}")]
    Network(String),
    #[error("judgment call timed out after {0:?}")]
    Timeout(Duration),
    #[error("rate limited by judgment service")]
    RateLimited,
    #[error("judgment service error ({status}): {message}")]
    Api { status: u16, message: String },
    #[error("malformed judgment response: {0}")]
    Malformed(String),
    #[error("no judgment service configured")]
    NotConfigured,
}

/// Artifact store failures.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("failed to access artifact file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse stored artifact: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("{kind} artifact not found: {identifier}")]
    NotFound {
        kind: ArtifactKind,
        identifier: String,
    },
    #[error("artifact store unavailable at {0}")]
    Unavailable(String),
}

/// A judgment response that cannot be used as a selection.
#[derive(Error, Debug)]
pub enum ClassificationError {
    #[error("judgment service failed: {0}")]
    Service(#[from] ServiceError),
    #[error("response does not match classification schema: {0}")]
    Schema(String),
    #[error("relevance score for {identifier} out of range: {score}")]
    ScoreOutOfRange { identifier: String, score: f64 },
    #[error("response references unknown {kind}: {identifier}")]
    UnknownIdentifier {
        kind: ArtifactKind,
        identifier: String,
    },
}

/// Document extraction failures.
#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("document not found: {0}")]
    NotFound(String),
    #[error("unsupported document format: {0}")]
    UnsupportedFormat(String),
    #[error("failed to read document: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse {format} document: {message}")]
    Parse { format: String, message: String },
}

/// Errors surfaced by `build_prompt`.
#[derive(Error, Debug)]
pub enum BuildError {
    #[error("manifest unavailable: {0}")]
    ManifestUnavailable(#[source] StoreError),
    #[error("requested artifact not found: {0}")]
    ArtifactNotFound(#[source] StoreError),
}

impl From<StoreError> for BuildError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { .. } => BuildError::ArtifactNotFound(err),
            other => BuildError::ManifestUnavailable(other),
        }
    }
}
