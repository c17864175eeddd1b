//! Application state wiring stores, collaborators and the coordinator.
//!
//! The coordinator is generic over its stores; `AppState` pins it to the
//! SQLite implementations.

use std::path::PathBuf;
use std::sync::Arc;

use magnet_core::ports::Collaborators;
use magnet_core::workflow::StepExecutionCoordinator;
use magnet_infra::config::{load_engine_config, resolve_data_dir};
use magnet_infra::handoff::StoreHandoffTrigger;
use magnet_infra::http::{OpenAiResponsesClient, ReqwestWebhookTransport, RemoteBrowserDriver};
use magnet_infra::notify::TracingNotifier;
use magnet_infra::sqlite::job::SqliteJobStore;
use magnet_infra::sqlite::pool::{DatabasePool, database_url};
use magnet_infra::sqlite::usage::SqliteUsageRecorder;
use magnet_infra::sqlite::workflow::SqliteWorkflowStore;
use magnet_infra::storage::{FilesystemArtifactStore, FilesystemBlobStore};
use magnet_types::config::EngineConfig;

/// Coordinator pinned to the SQLite stores.
pub type ConcreteCoordinator = StepExecutionCoordinator<SqliteJobStore, SqliteWorkflowStore>;

/// Shared application state used by every command.
#[derive(Clone)]
pub struct AppState {
    pub data_dir: PathBuf,
    pub config: EngineConfig,
    pub jobs: Arc<SqliteJobStore>,
    pub workflows: Arc<SqliteWorkflowStore>,
    pub artifacts: Arc<FilesystemArtifactStore>,
    pub usage: Arc<SqliteUsageRecorder>,
    pub coordinator: Arc<ConcreteCoordinator>,
}

impl AppState {
    /// Connect to the database and wire every collaborator.
    pub async fn init() -> anyhow::Result<Self> {
        let data_dir = resolve_data_dir();
        tokio::fs::create_dir_all(&data_dir).await?;

        let config = load_engine_config(&data_dir).await;
        let db_pool = DatabasePool::new(&format!("{}?mode=rwc", database_url(&data_dir))).await?;

        let jobs = Arc::new(SqliteJobStore::new(
            db_pool.clone(),
            FilesystemBlobStore::new(data_dir.join("blobs")),
            config.storage.execution_steps_offload_bytes,
        ));
        let workflows = Arc::new(SqliteWorkflowStore::new(db_pool.clone()));
        let artifacts = Arc::new(FilesystemArtifactStore::new(
            db_pool.clone(),
            data_dir.join("artifacts"),
            &config.storage.public_base_url,
        ));
        let usage = Arc::new(SqliteUsageRecorder::new(db_pool));

        let collaborators = Collaborators {
            ai: Arc::new(OpenAiResponsesClient::from_config(&config.ai)),
            artifacts: artifacts.clone(),
            webhooks: Arc::new(ReqwestWebhookTransport::from_settings(&config.webhook)),
            browser: Arc::new(RemoteBrowserDriver::new(config.browser.driver_url.clone())),
            handoff: Arc::new(StoreHandoffTrigger::new(jobs.clone(), workflows.clone())),
            notifier: Arc::new(TracingNotifier),
            usage: usage.clone(),
        };
        let coordinator = Arc::new(StepExecutionCoordinator::new(
            jobs.clone(),
            workflows.clone(),
            &collaborators,
            &config,
        ));

        tracing::debug!(data_dir = %data_dir.display(), "application state ready");
        Ok(Self {
            data_dir,
            config,
            jobs,
            workflows,
            artifacts,
            usage,
            coordinator,
        })
    }
}
