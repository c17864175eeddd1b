//! Outgoing webhook transport port.

use std::collections::HashMap;
use std::time::Duration;

use serde_json::Value;

use super::{BoxFuture, CollaboratorError};

/// A fully built outgoing webhook call.
#[derive(Debug, Clone)]
pub struct WebhookRequest {
    pub url: String,
    pub method: String,
    pub headers: HashMap<String, String>,
    pub payload: Value,
    pub timeout: Duration,
}

/// What the remote endpoint answered.
#[derive(Debug, Clone)]
pub struct WebhookResponse {
    pub status: u16,
    pub body: String,
}

impl WebhookResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Sends webhook requests. Non-2xx answers are returned, not raised.
pub trait WebhookTransport: Send + Sync {
    fn send(&self, request: WebhookRequest)
    -> BoxFuture<'_, Result<WebhookResponse, CollaboratorError>>;
}
