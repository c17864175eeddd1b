//! Artifact store port.

use super::{BoxFuture, CollaboratorError};

/// Content to persist as a job artifact.
#[derive(Debug, Clone)]
pub struct NewArtifact {
    pub tenant_id: String,
    pub job_id: String,
    /// Category tag such as `html_final`, `markdown_final`, `screenshot`.
    pub artifact_type: String,
    pub filename: String,
    pub content_type: String,
    pub content: Vec<u8>,
}

impl NewArtifact {
    pub fn text(
        tenant_id: &str,
        job_id: &str,
        artifact_type: &str,
        filename: &str,
        content_type: &str,
        content: &str,
    ) -> Self {
        Self {
            tenant_id: tenant_id.to_string(),
            job_id: job_id.to_string(),
            artifact_type: artifact_type.to_string(),
            filename: filename.to_string(),
            content_type: content_type.to_string(),
            content: content.as_bytes().to_vec(),
        }
    }
}

/// Stores deliverables and screenshots and hands out public URLs.
pub trait ArtifactStore: Send + Sync {
    /// Persist an artifact and return its id.
    fn store_artifact(&self, artifact: NewArtifact)
    -> BoxFuture<'_, Result<String, CollaboratorError>>;

    /// Public URL of a stored artifact.
    fn get_public_url<'a>(
        &'a self,
        artifact_id: &'a str,
    ) -> BoxFuture<'a, Result<String, CollaboratorError>>;
}
