//! Best-effort side channels: completion notifications and usage records.
//!
//! Failures on these channels are logged by the caller and never fail a job.

use chrono::{DateTime, Utc};
use magnet_types::job::UsageInfo;

use super::{BoxFuture, CollaboratorError};

/// Sent once a job's deliverable is stored.
#[derive(Debug, Clone)]
pub struct JobNotification {
    pub job_id: String,
    pub tenant_id: String,
    pub workflow_id: String,
    pub output_url: String,
}

pub trait Notifier: Send + Sync {
    fn job_completed(&self, notification: JobNotification)
    -> BoxFuture<'_, Result<(), CollaboratorError>>;
}

/// Token usage of one AI call.
#[derive(Debug, Clone)]
pub struct UsageRecord {
    pub tenant_id: String,
    pub job_id: String,
    pub step_order: u32,
    pub provider: String,
    pub model: String,
    pub usage: UsageInfo,
    pub recorded_at: DateTime<Utc>,
}

pub trait UsageRecorder: Send + Sync {
    fn record(&self, record: UsageRecord) -> BoxFuture<'_, Result<(), CollaboratorError>>;
}
