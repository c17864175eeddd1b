//! Store and collaborator traits implemented by the infrastructure layer.
//!
//! Stores (`JobStore`, `WorkflowStore`) use native async fn in traits and are
//! consumed generically by the coordinator. Collaborators that handlers call
//! from spawned tasks are object-safe with boxed futures so one instance can
//! be shared as `Arc<dyn Trait>` across every handler.

use std::sync::Arc;

pub use futures_util::future::BoxFuture;

pub mod ai;
pub mod artifact;
pub mod browser;
pub mod handoff;
pub mod notify;
pub mod store;
pub mod webhook;

pub use ai::{AiError, AiProvider, AiRequest, AiResponse};
pub use artifact::{ArtifactStore, NewArtifact};
pub use browser::{BrowserDriver, BrowserRun, BrowserSession, Screenshot};
pub use handoff::{HandoffRequest, HandoffTrigger};
pub use notify::{JobNotification, Notifier, UsageRecord, UsageRecorder};
pub use store::{JobStore, WorkflowStore};
pub use webhook::{WebhookRequest, WebhookResponse, WebhookTransport};

/// Failure reported by a non-AI collaborator.
#[derive(Debug, thiserror::Error)]
pub enum CollaboratorError {
    /// The remote side could not be reached or the connection broke.
    #[error("transport error: {0}")]
    Transport(String),

    /// The collaborator answered but refused the request.
    #[error("rejected: {0}")]
    Rejected(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("I/O error: {0}")]
    Io(String),

    /// The collaborator is not configured in this deployment.
    #[error("not configured: {0}")]
    NotConfigured(String),
}

/// Every collaborator the built-in handlers and the reconciler call.
#[derive(Clone)]
pub struct Collaborators {
    pub ai: Arc<dyn AiProvider>,
    pub artifacts: Arc<dyn ArtifactStore>,
    pub webhooks: Arc<dyn WebhookTransport>,
    pub browser: Arc<dyn BrowserDriver>,
    pub handoff: Arc<dyn HandoffTrigger>,
    pub notifier: Arc<dyn Notifier>,
    pub usage: Arc<dyn UsageRecorder>,
}
