//! SQLite job store implementation.
//!
//! Implements `JobStore` from `magnet-core`. JSON columns hold the
//! submission, execution history, artifact ids and plan summary. Once the
//! serialized history exceeds the offload threshold it moves to a blob
//! (`jobs/{job_id}/execution_steps.json`) and the row keeps only the
//! pointer; every later write goes to the blob.

use magnet_core::ports::JobStore;
use magnet_types::error::RepositoryError;
use magnet_types::job::{AppendedSteps, ExecutionStepRecord, Job, JobStatus, JobUpdate, StepAppend};
use sqlx::{Row, SqliteConnection};

use super::pool::DatabasePool;
use super::{parse_datetime, parse_json, query_error, to_json};
use crate::storage::FilesystemBlobStore;

/// Blob key of a job's offloaded execution history.
pub fn execution_steps_key(job_id: &str) -> String {
    format!("jobs/{job_id}/execution_steps.json")
}

/// SQLite-backed implementation of `JobStore`.
pub struct SqliteJobStore {
    pool: DatabasePool,
    blobs: FilesystemBlobStore,
    offload_threshold: usize,
}

impl SqliteJobStore {
    /// `offload_threshold` is the serialized size in bytes above which the
    /// execution history moves to the blob store.
    pub fn new(pool: DatabasePool, blobs: FilesystemBlobStore, offload_threshold: usize) -> Self {
        Self {
            pool,
            blobs,
            offload_threshold,
        }
    }

    /// Most recently created jobs first.
    pub async fn list_jobs(&self, limit: u32) -> Result<Vec<Job>, RepositoryError> {
        let rows = sqlx::query("SELECT * FROM jobs ORDER BY created_at DESC LIMIT ?")
            .bind(limit as i64)
            .fetch_all(&self.pool.reader)
            .await
            .map_err(query_error)?;

        rows.iter()
            .map(|row| JobRow::from_row(row).map_err(query_error)?.into_job())
            .collect()
    }

    /// Serialize the history; offload it when it is already offloaded or
    /// too large. Returns the inline column value and the blob pointer.
    async fn encode_steps(
        &self,
        job_id: &str,
        steps: &[ExecutionStepRecord],
        existing_key: Option<String>,
    ) -> Result<(String, Option<String>), RepositoryError> {
        let json = to_json("execution_steps", &steps)?;
        if existing_key.is_none() && json.len() <= self.offload_threshold {
            return Ok((json, None));
        }

        let key = existing_key.unwrap_or_else(|| execution_steps_key(job_id));
        self.blobs.put(&key, json.as_bytes()).await?;
        tracing::debug!(job_id, key = %key, bytes = json.len(), "execution history offloaded");
        Ok(("[]".to_string(), Some(key)))
    }

    async fn decode_blob(&self, key: &str) -> Result<Vec<ExecutionStepRecord>, RepositoryError> {
        let bytes = self.blobs.get(key).await?;
        serde_json::from_slice(&bytes)
            .map_err(|e| RepositoryError::Blob(format!("invalid execution history in '{key}': {e}")))
    }

    async fn fetch_for_update(
        conn: &mut SqliteConnection,
        job_id: &str,
    ) -> Result<Job, RepositoryError> {
        let row = sqlx::query("SELECT * FROM jobs WHERE job_id = ?")
            .bind(job_id)
            .fetch_optional(&mut *conn)
            .await
            .map_err(query_error)?
            .ok_or(RepositoryError::NotFound)?;
        JobRow::from_row(&row).map_err(query_error)?.into_job()
    }

    /// Apply `update` onto `job` and write the row back.
    async fn write_update(
        &self,
        conn: &mut SqliteConnection,
        mut job: Job,
        mut update: JobUpdate,
    ) -> Result<(), RepositoryError> {
        let new_steps = update.execution_steps.take();
        update.apply_to(&mut job);

        let (steps, key) = match new_steps {
            Some(steps) => {
                self.encode_steps(&job.job_id, &steps, job.execution_steps_s3_key.clone())
                    .await?
            }
            None => (
                to_json("execution_steps", &job.execution_steps)?,
                job.execution_steps_s3_key.clone(),
            ),
        };
        let plan = job
            .execution_plan
            .as_ref()
            .map(|p| to_json("execution_plan", p))
            .transpose()?;

        sqlx::query(
            r#"UPDATE jobs
               SET status = ?, execution_steps = ?, execution_steps_s3_key = ?, artifacts = ?,
                   execution_plan = ?, error_message = ?, error_type = ?, output_url = ?,
                   output_artifact_id = ?, updated_at = ?, completed_at = ?
               WHERE job_id = ?"#,
        )
        .bind(job.status.as_str())
        .bind(steps)
        .bind(key)
        .bind(to_json("artifacts", &job.artifacts)?)
        .bind(plan)
        .bind(&job.error_message)
        .bind(&job.error_type)
        .bind(&job.output_url)
        .bind(&job.output_artifact_id)
        .bind(job.updated_at.to_rfc3339())
        .bind(job.completed_at.map(|t| t.to_rfc3339()))
        .bind(&job.job_id)
        .execute(&mut *conn)
        .await
        .map_err(query_error)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Internal row type
// ---------------------------------------------------------------------------

struct JobRow {
    job_id: String,
    tenant_id: String,
    workflow_id: String,
    submission_data: String,
    status: String,
    execution_steps: String,
    execution_steps_s3_key: Option<String>,
    artifacts: String,
    execution_plan: Option<String>,
    error_message: Option<String>,
    error_type: Option<String>,
    output_url: Option<String>,
    output_artifact_id: Option<String>,
    created_at: String,
    updated_at: String,
    completed_at: Option<String>,
}

impl JobRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            job_id: row.try_get("job_id")?,
            tenant_id: row.try_get("tenant_id")?,
            workflow_id: row.try_get("workflow_id")?,
            submission_data: row.try_get("submission_data")?,
            status: row.try_get("status")?,
            execution_steps: row.try_get("execution_steps")?,
            execution_steps_s3_key: row.try_get("execution_steps_s3_key")?,
            artifacts: row.try_get("artifacts")?,
            execution_plan: row.try_get("execution_plan")?,
            error_message: row.try_get("error_message")?,
            error_type: row.try_get("error_type")?,
            output_url: row.try_get("output_url")?,
            output_artifact_id: row.try_get("output_artifact_id")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
            completed_at: row.try_get("completed_at")?,
        })
    }

    fn into_job(self) -> Result<Job, RepositoryError> {
        let status: JobStatus = serde_json::from_value(serde_json::Value::String(self.status.clone()))
            .map_err(|_| RepositoryError::Query(format!("invalid job status: {}", self.status)))?;

        Ok(Job {
            job_id: self.job_id,
            tenant_id: self.tenant_id,
            workflow_id: self.workflow_id,
            submission_data: parse_json("submission_data", &self.submission_data)?,
            status,
            execution_steps: parse_json("execution_steps", &self.execution_steps)?,
            execution_steps_s3_key: self.execution_steps_s3_key,
            artifacts: parse_json("artifacts", &self.artifacts)?,
            execution_plan: self
                .execution_plan
                .as_deref()
                .map(|s| parse_json("execution_plan", s))
                .transpose()?,
            error_message: self.error_message,
            error_type: self.error_type,
            output_url: self.output_url,
            output_artifact_id: self.output_artifact_id,
            created_at: parse_datetime(&self.created_at)?,
            updated_at: parse_datetime(&self.updated_at)?,
            completed_at: self.completed_at.as_deref().map(parse_datetime).transpose()?,
        })
    }
}

// ---------------------------------------------------------------------------
// JobStore
// ---------------------------------------------------------------------------

impl JobStore for SqliteJobStore {
    async fn create_job(&self, job: &Job) -> Result<(), RepositoryError> {
        let (steps, key) = self
            .encode_steps(&job.job_id, &job.execution_steps, job.execution_steps_s3_key.clone())
            .await?;
        let plan = job
            .execution_plan
            .as_ref()
            .map(|p| to_json("execution_plan", p))
            .transpose()?;

        sqlx::query(
            r#"INSERT INTO jobs (job_id, tenant_id, workflow_id, submission_data, status,
                                 execution_steps, execution_steps_s3_key, artifacts, execution_plan,
                                 error_message, error_type, output_url, output_artifact_id,
                                 created_at, updated_at, completed_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(&job.job_id)
        .bind(&job.tenant_id)
        .bind(&job.workflow_id)
        .bind(to_json("submission_data", &job.submission_data)?)
        .bind(job.status.as_str())
        .bind(steps)
        .bind(key)
        .bind(to_json("artifacts", &job.artifacts)?)
        .bind(plan)
        .bind(&job.error_message)
        .bind(&job.error_type)
        .bind(&job.output_url)
        .bind(&job.output_artifact_id)
        .bind(job.created_at.to_rfc3339())
        .bind(job.updated_at.to_rfc3339())
        .bind(job.completed_at.map(|t| t.to_rfc3339()))
        .execute(&self.pool.writer)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                RepositoryError::Conflict(format!("job {} already exists", job.job_id))
            }
            _ => query_error(e),
        })?;

        Ok(())
    }

    async fn get_job(&self, job_id: &str) -> Result<Option<Job>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM jobs WHERE job_id = ?")
            .bind(job_id)
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(query_error)?;

        match row {
            Some(row) => Ok(Some(JobRow::from_row(&row).map_err(query_error)?.into_job()?)),
            None => Ok(None),
        }
    }

    async fn update_job(&self, job_id: &str, update: JobUpdate) -> Result<(), RepositoryError> {
        // Read-modify-write on the single writer connection.
        let mut tx = self.pool.writer.begin().await.map_err(query_error)?;
        let job = Self::fetch_for_update(&mut *tx, job_id).await?;
        self.write_update(&mut *tx, job, update).await?;
        tx.commit().await.map_err(query_error)?;
        Ok(())
    }

    async fn load_execution_steps(&self, job: &Job) -> Result<Vec<ExecutionStepRecord>, RepositoryError> {
        let Some(key) = &job.execution_steps_s3_key else {
            return Ok(job.execution_steps.clone());
        };
        self.decode_blob(key).await
    }

    async fn append_execution_step(
        &self,
        job_id: &str,
        append: StepAppend,
    ) -> Result<AppendedSteps, RepositoryError> {
        // The canonical history is re-read inside the writer transaction so
        // concurrent appends for one job serialise instead of overwriting.
        let mut tx = self.pool.writer.begin().await.map_err(query_error)?;
        let job = Self::fetch_for_update(&mut *tx, job_id).await?;
        let mut steps = match &job.execution_steps_s3_key {
            Some(key) => self.decode_blob(key).await?,
            None => job.execution_steps.clone(),
        };
        let mut artifacts = job.artifacts.clone();

        let Some(update) = append.merge_into(&mut steps, &mut artifacts) else {
            tracing::debug!(job_id, "duplicate step completion dropped");
            return Ok(AppendedSteps {
                steps,
                artifacts,
                appended: false,
            });
        };
        self.write_update(&mut *tx, job, update).await?;
        tx.commit().await.map_err(query_error)?;

        Ok(AppendedSteps {
            steps,
            artifacts,
            appended: true,
        })
    }
}
