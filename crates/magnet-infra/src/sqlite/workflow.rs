//! SQLite workflow store implementation.
//!
//! Implements `WorkflowStore` from `magnet-core`. The whole workflow
//! definition is stored as a JSON document; `tenant_id` and
//! `workflow_name` are copied into columns for listing.

use chrono::Utc;
use magnet_core::ports::WorkflowStore;
use magnet_types::error::RepositoryError;
use magnet_types::workflow::Workflow;
use sqlx::Row;

use super::pool::DatabasePool;
use super::{parse_json, query_error, to_json};

/// SQLite-backed implementation of `WorkflowStore`.
pub struct SqliteWorkflowStore {
    pool: DatabasePool,
}

impl SqliteWorkflowStore {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }

    /// All workflows, ordered by name.
    pub async fn list_workflows(&self) -> Result<Vec<Workflow>, RepositoryError> {
        let rows = sqlx::query("SELECT definition FROM workflows ORDER BY workflow_name")
            .fetch_all(&self.pool.reader)
            .await
            .map_err(query_error)?;

        rows.iter()
            .map(|row| {
                let definition: String = row.try_get("definition").map_err(query_error)?;
                parse_json("workflow definition", &definition)
            })
            .collect()
    }
}

impl WorkflowStore for SqliteWorkflowStore {
    async fn get_workflow(&self, workflow_id: &str) -> Result<Option<Workflow>, RepositoryError> {
        let row = sqlx::query("SELECT definition FROM workflows WHERE workflow_id = ?")
            .bind(workflow_id)
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(query_error)?;

        row.map(|row| {
            let definition: String = row.try_get("definition").map_err(query_error)?;
            parse_json("workflow definition", &definition)
        })
        .transpose()
    }

    async fn save_workflow(&self, workflow: &Workflow) -> Result<(), RepositoryError> {
        let now = Utc::now().to_rfc3339();
        sqlx::query(
            r#"INSERT INTO workflows (workflow_id, tenant_id, workflow_name, definition, created_at, updated_at)
               VALUES (?, ?, ?, ?, ?, ?)
               ON CONFLICT(workflow_id) DO UPDATE SET
                   tenant_id = excluded.tenant_id,
                   workflow_name = excluded.workflow_name,
                   definition = excluded.definition,
                   updated_at = excluded.updated_at"#,
        )
        .bind(&workflow.workflow_id)
        .bind(&workflow.tenant_id)
        .bind(&workflow.workflow_name)
        .bind(to_json("workflow definition", workflow)?)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool.writer)
        .await
        .map_err(query_error)?;

        tracing::debug!(workflow_id = %workflow.workflow_id, steps = workflow.steps.len(), "workflow saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sqlite::pool::test_support::test_pool;
    use magnet_types::workflow::{StepType, WorkflowStep};

    fn workflow(name: &str, steps: usize) -> Workflow {
        Workflow {
            workflow_id: "wf-1".into(),
            tenant_id: "tenant-1".into(),
            workflow_name: name.into(),
            steps: (1..=steps as u32)
                .map(|order| WorkflowStep {
                    step_order: order,
                    step_name: format!("step {order}"),
                    step_type: Some(StepType::AiGeneration),
                    ..Default::default()
                })
                .collect(),
            tracking_enabled: false,
        }
    }

    #[tokio::test]
    async fn test_save_get_and_upsert() {
        let (pool, _dir) = test_pool().await;
        let store = SqliteWorkflowStore::new(pool);

        store.save_workflow(&workflow("Guide", 2)).await.unwrap();
        let loaded = store.get_workflow("wf-1").await.unwrap().unwrap();
        assert_eq!(loaded.steps.len(), 2);
        assert!(!loaded.tracking_enabled);

        store.save_workflow(&workflow("Guide v2", 3)).await.unwrap();
        let loaded = store.get_workflow("wf-1").await.unwrap().unwrap();
        assert_eq!(loaded.workflow_name, "Guide v2");
        assert_eq!(loaded.steps.len(), 3);
        assert_eq!(store.list_workflows().await.unwrap().len(), 1);

        assert!(store.get_workflow("other").await.unwrap().is_none());
    }
}
