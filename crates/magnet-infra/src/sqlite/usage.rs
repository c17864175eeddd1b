//! SQLite usage recorder.
//!
//! One row per AI call. Recording is best-effort from the engine's point of
//! view; errors are returned and the caller decides whether to log them.

use magnet_core::ports::{BoxFuture, CollaboratorError, UsageRecord, UsageRecorder};
use magnet_types::error::RepositoryError;
use serde::Serialize;
use sqlx::Row;

use super::pool::DatabasePool;
use super::query_error;

/// Token totals for one job.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UsageTotals {
    pub calls: u64,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub total_tokens: u64,
    pub cost_usd: f64,
}

pub struct SqliteUsageRecorder {
    pool: DatabasePool,
}

impl SqliteUsageRecorder {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }

    pub async fn totals_for_job(&self, job_id: &str) -> Result<UsageTotals, RepositoryError> {
        let row = sqlx::query(
            r#"SELECT COUNT(*) AS calls,
                      COALESCE(SUM(input_tokens), 0) AS input_tokens,
                      COALESCE(SUM(output_tokens), 0) AS output_tokens,
                      COALESCE(SUM(total_tokens), 0) AS total_tokens,
                      COALESCE(SUM(cost_usd), 0.0) AS cost_usd
               FROM usage_records WHERE job_id = ?"#,
        )
        .bind(job_id)
        .fetch_one(&self.pool.reader)
        .await
        .map_err(query_error)?;

        let count = |column: &str| -> Result<u64, RepositoryError> {
            let value: i64 = row.try_get(column).map_err(query_error)?;
            Ok(value.max(0) as u64)
        };
        Ok(UsageTotals {
            calls: count("calls")?,
            input_tokens: count("input_tokens")?,
            output_tokens: count("output_tokens")?,
            total_tokens: count("total_tokens")?,
            cost_usd: row.try_get("cost_usd").map_err(query_error)?,
        })
    }

    async fn insert(&self, record: UsageRecord) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"INSERT INTO usage_records (tenant_id, job_id, step_order, provider, model,
                                          input_tokens, output_tokens, total_tokens, cost_usd, recorded_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(&record.tenant_id)
        .bind(&record.job_id)
        .bind(record.step_order as i64)
        .bind(&record.provider)
        .bind(&record.model)
        .bind(record.usage.input_tokens as i64)
        .bind(record.usage.output_tokens as i64)
        .bind(record.usage.total_tokens as i64)
        .bind(record.usage.cost_usd)
        .bind(record.recorded_at.to_rfc3339())
        .execute(&self.pool.writer)
        .await
        .map_err(query_error)?;
        Ok(())
    }
}

impl UsageRecorder for SqliteUsageRecorder {
    fn record(&self, record: UsageRecord) -> BoxFuture<'_, Result<(), CollaboratorError>> {
        Box::pin(async move {
            self.insert(record)
                .await
                .map_err(|e| CollaboratorError::Io(e.to_string()))
        })
    }
}
