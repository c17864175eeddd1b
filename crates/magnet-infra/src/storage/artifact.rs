//! Local filesystem artifact store.
//!
//! Implements `ArtifactStore` from `magnet-core`. Bytes live on disk and the
//! metadata row in SQLite; public URLs are derived from the configured base
//! URL and the on-disk layout:
//!
//! ```text
//! {root}/{tenant_id}/{job_id}/{artifact_id}/{filename}
//! {public_base_url}/{tenant_id}/{job_id}/{artifact_id}/{filename}
//! ```

use std::path::{Component, Path, PathBuf};

use chrono::{DateTime, Utc};
use magnet_core::ports::{ArtifactStore, BoxFuture, CollaboratorError, NewArtifact};
use serde::Serialize;
use sqlx::Row;
use uuid::Uuid;

use crate::sqlite::parse_datetime;
use crate::sqlite::pool::DatabasePool;

/// Metadata of a stored artifact.
#[derive(Debug, Clone, Serialize)]
pub struct ArtifactRecord {
    pub artifact_id: String,
    pub tenant_id: String,
    pub job_id: String,
    pub artifact_type: String,
    pub filename: String,
    pub content_type: String,
    pub size_bytes: u64,
    /// Path relative to the store root.
    pub path: String,
    pub created_at: DateTime<Utc>,
}

impl ArtifactRecord {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, CollaboratorError> {
        let get = |column: &str| -> Result<String, CollaboratorError> {
            row.try_get(column).map_err(|e| CollaboratorError::Io(e.to_string()))
        };
        let size: i64 = row
            .try_get("size_bytes")
            .map_err(|e| CollaboratorError::Io(e.to_string()))?;
        Ok(Self {
            artifact_id: get("artifact_id")?,
            tenant_id: get("tenant_id")?,
            job_id: get("job_id")?,
            artifact_type: get("artifact_type")?,
            filename: get("filename")?,
            content_type: get("content_type")?,
            size_bytes: size.max(0) as u64,
            path: get("path")?,
            created_at: parse_datetime(&get("created_at")?)
                .map_err(|e| CollaboratorError::Io(e.to_string()))?,
        })
    }
}

pub struct FilesystemArtifactStore {
    pool: DatabasePool,
    root: PathBuf,
    public_base_url: String,
}

impl FilesystemArtifactStore {
    pub fn new(pool: DatabasePool, root: impl Into<PathBuf>, public_base_url: &str) -> Self {
        Self {
            pool,
            root: root.into(),
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Metadata of one artifact.
    pub async fn get_artifact(&self, artifact_id: &str) -> Result<Option<ArtifactRecord>, CollaboratorError> {
        let row = sqlx::query("SELECT * FROM artifacts WHERE artifact_id = ?")
            .bind(artifact_id)
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(|e| CollaboratorError::Io(e.to_string()))?;
        row.as_ref().map(ArtifactRecord::from_row).transpose()
    }

    /// Every artifact of a job, oldest first.
    pub async fn list_for_job(&self, job_id: &str) -> Result<Vec<ArtifactRecord>, CollaboratorError> {
        let rows = sqlx::query("SELECT * FROM artifacts WHERE job_id = ? ORDER BY created_at, artifact_id")
            .bind(job_id)
            .fetch_all(&self.pool.reader)
            .await
            .map_err(|e| CollaboratorError::Io(e.to_string()))?;
        rows.iter().map(ArtifactRecord::from_row).collect()
    }

    /// Absolute path of a stored artifact.
    pub fn absolute_path(&self, record: &ArtifactRecord) -> PathBuf {
        self.root.join(&record.path)
    }

    async fn store(&self, artifact: NewArtifact) -> Result<String, CollaboratorError> {
        let tenant = path_segment(&artifact.tenant_id)?;
        let job = path_segment(&artifact.job_id)?;
        let filename = path_segment(&artifact.filename)?;
        let artifact_id = Uuid::now_v7().to_string();

        let relative = format!("{tenant}/{job}/{artifact_id}/{filename}");
        let path = self.root.join(&relative);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| CollaboratorError::Io(format!("create {}: {e}", parent.display())))?;
        }
        tokio::fs::write(&path, &artifact.content)
            .await
            .map_err(|e| CollaboratorError::Io(format!("write {}: {e}", path.display())))?;

        sqlx::query(
            r#"INSERT INTO artifacts (artifact_id, tenant_id, job_id, artifact_type, filename,
                                      content_type, size_bytes, path, created_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(&artifact_id)
        .bind(&artifact.tenant_id)
        .bind(&artifact.job_id)
        .bind(&artifact.artifact_type)
        .bind(&artifact.filename)
        .bind(&artifact.content_type)
        .bind(artifact.content.len() as i64)
        .bind(&relative)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool.writer)
        .await
        .map_err(|e| CollaboratorError::Io(e.to_string()))?;

        tracing::debug!(
            artifact_id = %artifact_id,
            job_id = %artifact.job_id,
            artifact_type = %artifact.artifact_type,
            bytes = artifact.content.len(),
            "artifact stored"
        );
        Ok(artifact_id)
    }

    async fn public_url(&self, artifact_id: &str) -> Result<String, CollaboratorError> {
        let record = self
            .get_artifact(artifact_id)
            .await?
            .ok_or_else(|| CollaboratorError::NotFound(format!("artifact {artifact_id}")))?;
        Ok(format!("{}/{}", self.public_base_url, record.path))
    }
}

/// A single, non-empty path component.
fn path_segment(value: &str) -> Result<&str, CollaboratorError> {
    let mut components = Path::new(value).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(value),
        _ => Err(CollaboratorError::Rejected(format!("invalid artifact path segment '{value}'"))),
    }
}

impl ArtifactStore for FilesystemArtifactStore {
    fn store_artifact(&self, artifact: NewArtifact) -> BoxFuture<'_, Result<String, CollaboratorError>> {
        Box::pin(self.store(artifact))
    }

    fn get_public_url<'a>(&'a self, artifact_id: &'a str) -> BoxFuture<'a, Result<String, CollaboratorError>> {
        Box::pin(self.public_url(artifact_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sqlite::pool::test_support::test_pool;

    #[tokio::test]
    async fn test_store_and_resolve_url() {
        let (pool, _db) = test_pool().await;
        let dir = tempfile::tempdir().unwrap();
        let store = FilesystemArtifactStore::new(pool, dir.path(), "https://cdn.example.com/a/");

        let id = store
            .store_artifact(NewArtifact::text(
                "tenant-1",
                "job-1",
                "html_final",
                "final.html",
                "text/html; charset=utf-8",
                "<html></html>",
            ))
            .await
            .unwrap();

        let url = store.get_public_url(&id).await.unwrap();
        assert_eq!(url, format!("https://cdn.example.com/a/tenant-1/job-1/{id}/final.html"));

        let record = store.get_artifact(&id).await.unwrap().unwrap();
        assert_eq!(record.size_bytes, 13);
        let bytes = tokio::fs::read(store.absolute_path(&record)).await.unwrap();
        assert_eq!(bytes, b"<html></html>");

        assert_eq!(store.list_for_job("job-1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_artifact_url() {
        let (pool, _db) = test_pool().await;
        let dir = tempfile::tempdir().unwrap();
        let store = FilesystemArtifactStore::new(pool, dir.path(), "http://localhost");
        let err = store.get_public_url("missing").await.unwrap_err();
        assert!(matches!(err, CollaboratorError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_rejects_path_traversal() {
        let (pool, _db) = test_pool().await;
        let dir = tempfile::tempdir().unwrap();
        let store = FilesystemArtifactStore::new(pool, dir.path(), "http://localhost");
        let err = store
            .store_artifact(NewArtifact::text("t", "../job", "x", "f.txt", "text/plain", "x"))
            .await
            .unwrap_err();
        assert!(matches!(err, CollaboratorError::Rejected(_)));
    }
}
