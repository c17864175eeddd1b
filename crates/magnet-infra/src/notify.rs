//! Completion notifier that reports finished jobs through `tracing`.

use magnet_core::ports::{BoxFuture, CollaboratorError, JobNotification, Notifier};

#[derive(Debug, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn job_completed(&self, notification: JobNotification) -> BoxFuture<'_, Result<(), CollaboratorError>> {
        Box::pin(async move {
            tracing::info!(
                job_id = %notification.job_id,
                tenant_id = %notification.tenant_id,
                workflow_id = %notification.workflow_id,
                output_url = %notification.output_url,
                "lead magnet ready"
            );
            Ok(())
        })
    }
}
