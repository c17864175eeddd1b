//! Key-addressed blob store on the local filesystem.
//!
//! Keys are relative slash-separated paths (`jobs/{id}/execution_steps.json`)
//! resolved under the store root. Writes go to a temp file first and are
//! renamed into place, so a reader never sees a half-written blob.

use std::path::{Component, Path, PathBuf};

use magnet_types::error::RepositoryError;

#[derive(Debug, Clone)]
pub struct FilesystemBlobStore {
    root: PathBuf,
}

impl FilesystemBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, RepositoryError> {
        let relative = Path::new(key);
        let valid = !key.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !valid {
            return Err(RepositoryError::Blob(format!("invalid blob key '{key}'")));
        }
        Ok(self.root.join(relative))
    }

    pub async fn put(&self, key: &str, bytes: &[u8]) -> Result<(), RepositoryError> {
        let path = self.path_for(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| RepositoryError::Blob(format!("create {}: {e}", parent.display())))?;
        }
        let tmp = path.with_extension("tmp");
        tokio::fs::write(&tmp, bytes)
            .await
            .map_err(|e| RepositoryError::Blob(format!("write {}: {e}", tmp.display())))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| RepositoryError::Blob(format!("rename {}: {e}", path.display())))?;
        tracing::debug!(key, bytes = bytes.len(), "blob written");
        Ok(())
    }

    pub async fn get(&self, key: &str) -> Result<Vec<u8>, RepositoryError> {
        let path = self.path_for(key)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(RepositoryError::Blob(format!("blob '{key}' does not exist")))
            }
            Err(e) => Err(RepositoryError::Blob(format!("read {}: {e}", path.display()))),
        }
    }
}
