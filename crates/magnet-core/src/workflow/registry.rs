//! Step handler trait and the step-type registry.
//!
//! Handlers receive an owned [`StepInvocation`] snapshot and return a
//! [`StepOutcome`] delta; they never touch job state directly. The
//! coordinator builds one registry at construction and consults it after
//! applying the webhook override.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use magnet_types::config::EngineConfig;
use magnet_types::job::ExecutionStepRecord;
use magnet_types::workflow::{StepType, WorkflowStep};
use serde_json::Value;

use crate::ports::{BoxFuture, Collaborators};

use super::context::build_input_text;
use super::error::{StepError, WorkflowError};
use super::handlers::{
    AiGenerationHandler, BrowserAutomationHandler, HandoffHandler, HtmlGenerationHandler,
    WebhookHandler,
};

// ---------------------------------------------------------------------------
// Invocation and outcome
// ---------------------------------------------------------------------------

/// Result of an earlier step, as seen by later handlers.
#[derive(Debug, Clone)]
pub struct StepResult {
    pub step_order: u32,
    pub step_name: String,
    pub step_type: String,
    pub output: String,
    pub artifact_ids: Vec<String>,
}

impl StepResult {
    pub fn from_record(record: &ExecutionStepRecord) -> Self {
        Self {
            step_order: record.step_order,
            step_name: record.step_name.clone(),
            step_type: record.details.step_type().to_string(),
            output: record.output.clone().unwrap_or_default(),
            artifact_ids: record.artifact_id.iter().cloned().collect(),
        }
    }
}

/// Everything a handler may read. Owned so it can move into a spawned task.
#[derive(Debug, Clone)]
pub struct StepInvocation {
    pub step: WorkflowStep,
    /// Position of the step in the `step_order`-sorted workflow.
    pub step_index: usize,
    pub job_id: String,
    pub tenant_id: String,
    pub submission: Value,
    /// Outputs of steps in earlier groups.
    pub previous_context: String,
    /// Formatted form submission.
    pub current_context: String,
    /// Completed earlier steps, ascending `step_order`.
    pub prior_results: Vec<StepResult>,
    /// Read-only snapshot of the execution history.
    pub history: Arc<Vec<ExecutionStepRecord>>,
}

impl StepInvocation {
    /// `build_input_text(previous_context, current_context)`.
    pub fn input_text(&self) -> String {
        build_input_text(&self.previous_context, &self.current_context)
    }

    /// Output of the most recent prior step, if any.
    pub fn previous_step_output(&self) -> Option<&str> {
        self.prior_results.last().map(|r| r.output.as_str())
    }
}

/// The delta a handler returns.
#[derive(Debug, Clone)]
pub struct StepOutcome {
    /// Text merged into the accumulated context. Becomes the record's
    /// `output` when the handler leaves that unset.
    pub output: String,
    /// New artifact ids to add to the job.
    pub artifact_ids: Vec<String>,
    /// The handler's history entry. Timing is filled in by the coordinator.
    pub record: ExecutionStepRecord,
}

// ---------------------------------------------------------------------------
// StepHandler
// ---------------------------------------------------------------------------

/// Executes one step type.
///
/// Object-safe so handlers of different types live in one registry and can
/// be shared across spawned tasks as `Arc<dyn StepHandler>`.
pub trait StepHandler: Send + Sync {
    fn execute(&self, invocation: StepInvocation) -> BoxFuture<'_, Result<StepOutcome, StepError>>;
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Maps step-type tags to handlers.
#[derive(Default, Clone)]
pub struct StepHandlerRegistry {
    handlers: HashMap<StepType, Arc<dyn StepHandler>>,
}

impl StepHandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the five built-in handlers wired to `collaborators`.
    pub fn with_builtins(collaborators: &Collaborators, config: &EngineConfig) -> Self {
        let mut registry = Self::new();
        registry.register(
            StepType::AiGeneration,
            Arc::new(AiGenerationHandler::new(
                Arc::clone(&collaborators.ai),
                Arc::clone(&collaborators.usage),
                &config.ai,
            )),
        );
        registry.register(
            StepType::HtmlGeneration,
            Arc::new(HtmlGenerationHandler::new(
                Arc::clone(&collaborators.ai),
                Arc::clone(&collaborators.artifacts),
                Arc::clone(&collaborators.usage),
                &config.ai,
            )),
        );
        registry.register(
            StepType::Webhook,
            Arc::new(WebhookHandler::new(
                Arc::clone(&collaborators.webhooks),
                &config.webhook,
            )),
        );
        registry.register(
            StepType::BrowserAutomation,
            Arc::new(BrowserAutomationHandler::new(
                Arc::clone(&collaborators.browser),
                Arc::clone(&collaborators.artifacts),
                &config.browser,
            )),
        );
        registry.register(
            StepType::Handoff,
            Arc::new(HandoffHandler::new(Arc::clone(&collaborators.handoff))),
        );
        registry
    }

    /// Register (or replace) the handler for `step_type`.
    pub fn register(&mut self, step_type: StepType, handler: Arc<dyn StepHandler>) {
        if self.handlers.insert(step_type, handler).is_some() {
            tracing::debug!(step_type = %step_type, "replaced step handler");
        }
    }

    pub fn get_handler(&self, step_type: StepType) -> Result<Arc<dyn StepHandler>, WorkflowError> {
        self.handlers
            .get(&step_type)
            .cloned()
            .ok_or(WorkflowError::UnknownStepType(step_type))
    }

    pub fn all_types(&self) -> BTreeSet<StepType> {
        self.handlers.keys().copied().collect()
    }

    /// Type a step is dispatched as: `webhook` whenever a non-empty
    /// `webhook_url` is present, otherwise the declared type.
    pub fn dispatch_type(step: &WorkflowStep) -> StepType {
        if step.has_webhook_url() {
            StepType::Webhook
        } else {
            step.declared_type()
        }
    }
}

impl std::fmt::Debug for StepHandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StepHandlerRegistry")
            .field("types", &self.all_types())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
