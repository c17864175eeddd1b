//! Browser automation driver port.

use std::time::Duration;

use super::{BoxFuture, CollaboratorError};

/// One agent-driven browser session.
#[derive(Debug, Clone)]
pub struct BrowserSession {
    pub job_id: String,
    pub instructions: String,
    pub input: String,
    pub start_url: Option<String>,
    pub max_actions: u32,
    /// Total time the driver may spend before giving up.
    pub wait_budget: Duration,
}

/// A PNG captured during the session.
#[derive(Debug, Clone)]
pub struct Screenshot {
    pub filename: String,
    pub png: Vec<u8>,
}

/// Session result.
#[derive(Debug, Clone, Default)]
pub struct BrowserRun {
    pub output_text: String,
    pub final_url: Option<String>,
    pub actions_taken: u32,
    pub screenshots: Vec<Screenshot>,
}

pub trait BrowserDriver: Send + Sync {
    fn run(&self, session: BrowserSession) -> BoxFuture<'_, Result<BrowserRun, CollaboratorError>>;
}
