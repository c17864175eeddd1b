//! Shared domain types for magnet.
//!
//! Workflow definitions, job records, execution-step history entries and
//! engine configuration, plus the repository error type used by the store
//! traits in `magnet-core`.
//!
//! Zero infrastructure dependencies -- only serde, chrono, thiserror.

pub mod config;
pub mod error;
pub mod job;
pub mod workflow;
