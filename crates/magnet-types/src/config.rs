//! Engine configuration types.
//!
//! `EngineConfig` mirrors `config.toml` in the data directory. Every section
//! and field has a default, so an empty file is a valid configuration.

use serde::{Deserialize, Serialize};

/// Top-level configuration for the execution engine.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub ai: AiConfig,
    #[serde(default)]
    pub webhook: WebhookSettings,
    #[serde(default)]
    pub browser: BrowserSettings,
    #[serde(default)]
    pub tracking: TrackingSettings,
    #[serde(default)]
    pub storage: StorageSettings,
}

/// AI provider settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiConfig {
    /// Base URL of an OpenAI-compatible Responses API.
    #[serde(default = "default_ai_base_url")]
    pub base_url: String,
    /// Model used when a step does not name one.
    #[serde(default = "default_model")]
    pub default_model: String,
    /// Environment variable holding the API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    /// Per-call timeout for generation steps.
    #[serde(default = "default_ai_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_ai_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_model() -> String {
    "gpt-4o".to_string()
}

fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

fn default_ai_timeout_secs() -> u64 {
    300
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            base_url: default_ai_base_url(),
            default_model: default_model(),
            api_key_env: default_api_key_env(),
            timeout_secs: default_ai_timeout_secs(),
        }
    }
}

/// Outgoing webhook settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookSettings {
    #[serde(default = "default_webhook_timeout_secs")]
    pub timeout_secs: u64,
    /// Environment variable holding the HMAC signing secret. Unsigned when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signing_secret_env: Option<String>,
}

fn default_webhook_timeout_secs() -> u64 {
    30
}

impl Default for WebhookSettings {
    fn default() -> Self {
        Self {
            timeout_secs: default_webhook_timeout_secs(),
            signing_secret_env: None,
        }
    }
}

/// Browser automation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserSettings {
    /// Remote driver endpoint. Browser steps fail when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub driver_url: Option<String>,
    /// Total wait budget for one browser session.
    #[serde(default = "default_browser_wait_secs")]
    pub wait_budget_secs: u64,
    #[serde(default = "default_max_actions")]
    pub max_actions: u32,
}

fn default_browser_wait_secs() -> u64 {
    120
}

fn default_max_actions() -> u32 {
    25
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            driver_url: None,
            wait_budget_secs: default_browser_wait_secs(),
            max_actions: default_max_actions(),
        }
    }
}

/// Lead tracking settings for HTML deliverables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackingSettings {
    #[serde(default = "default_tracking_endpoint")]
    pub endpoint: String,
}

fn default_tracking_endpoint() -> String {
    "https://track.example.com/v1/events".to_string()
}

impl Default for TrackingSettings {
    fn default() -> Self {
        Self {
            endpoint: default_tracking_endpoint(),
        }
    }
}

/// Artifact and history storage settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageSettings {
    /// Public base URL that artifact keys are appended to.
    #[serde(default = "default_public_base_url")]
    pub public_base_url: String,
    /// Serialized `execution_steps` larger than this are offloaded to a blob.
    #[serde(default = "default_offload_threshold")]
    pub execution_steps_offload_bytes: usize,
}

fn default_public_base_url() -> String {
    "http://localhost:8080/artifacts".to_string()
}

fn default_offload_threshold() -> usize {
    256 * 1024
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            public_base_url: default_public_base_url(),
            execution_steps_offload_bytes: default_offload_threshold(),
        }
    }
}
