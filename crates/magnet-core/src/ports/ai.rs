//! AI provider port.
//!
//! The engine treats the provider as opaque: it sends a model, instructions
//! and input text, and receives output text plus usage information.

use magnet_types::job::UsageInfo;
use serde::Serialize;
use serde_json::Value;

use super::BoxFuture;

/// One generation request.
#[derive(Debug, Clone, Serialize)]
pub struct AiRequest {
    pub model: String,
    pub instructions: String,
    pub input: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<String>,
}

/// Provider answer.
#[derive(Debug, Clone, Default)]
pub struct AiResponse {
    pub output_text: String,
    pub usage_info: UsageInfo,
    /// Provider response id, when reported.
    pub response_id: Option<String>,
}

/// Errors from the AI provider.
#[derive(Debug, Clone, thiserror::Error)]
pub enum AiError {
    /// The provider could not download an image referenced in the input.
    #[error("invalid image URL {url}: {message}")]
    InvalidImageUrl { url: String, message: String },

    #[error("rate limited: {0}")]
    RateLimited(String),

    #[error("provider request failed: {0}")]
    Request(String),

    #[error("invalid provider response: {0}")]
    InvalidResponse(String),
}

/// Object-safe AI provider.
pub trait AiProvider: Send + Sync {
    /// Provider name for logs and usage records.
    fn name(&self) -> &str;

    fn generate(&self, request: AiRequest) -> BoxFuture<'_, Result<AiResponse, AiError>>;
}
