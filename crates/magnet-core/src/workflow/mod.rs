//! Job-step engine: dependency resolution, dispatch and coordination.
//!
//! - `dag` -- step list to grouped execution plan (petgraph)
//! - `registry` -- step handler trait and step-type registry
//! - `handlers` -- built-in handlers for the five step types
//! - `context` -- accumulated text context between steps
//! - `checkpoint` -- incremental persistence of job progress
//! - `executor` -- full-job and per-step coordinator
//! - `reconciler` -- finalization against the canonical history
//! - `tracking` -- deliverable assembly and tracking-script injection

pub mod checkpoint;
pub mod context;
pub mod dag;
pub mod error;
pub mod executor;
pub mod handlers;
pub mod reconciler;
pub mod registry;
pub mod tracking;

pub use error::{CoordinatorError, ReconcileError, StepError, WorkflowError};
pub use executor::{FINAL_STEP_INDEX, ProcessOutcome, StepExecutionCoordinator};
pub use registry::{StepHandler, StepHandlerRegistry, StepInvocation, StepOutcome};
