//! OpenAiResponsesClient -- [`AiProvider`] over an OpenAI-compatible
//! Responses API (`POST {base_url}/responses`).
//!
//! The API key is wrapped in [`secrecy::SecretString`] and is only exposed
//! when building the `Authorization` header. A missing key is reported per
//! call, so commands that never generate do not need one.

use magnet_core::ports::{AiError, AiProvider, AiRequest, AiResponse, BoxFuture};
use magnet_types::config::AiConfig;
use magnet_types::job::UsageInfo;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use crate::pricing::estimate_cost;

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct ResponsesBody {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    output: Vec<OutputItem>,
    #[serde(default)]
    usage: Option<WireUsage>,
}

#[derive(Debug, Deserialize)]
struct OutputItem {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    content: Vec<ContentPart>,
}

#[derive(Debug, Deserialize)]
struct ContentPart {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct WireUsage {
    #[serde(default)]
    input_tokens: u64,
    #[serde(default)]
    output_tokens: u64,
    #[serde(default)]
    total_tokens: u64,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    #[serde(default)]
    message: String,
    #[serde(default)]
    code: Option<String>,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// AI provider for OpenAI and compatible endpoints.
///
/// Does NOT derive Debug; the key must never reach logs.
pub struct OpenAiResponsesClient {
    client: reqwest::Client,
    api_key: Option<SecretString>,
    api_key_env: String,
    base_url: String,
}

impl OpenAiResponsesClient {
    pub fn new(base_url: &str, api_key: Option<SecretString>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            api_key_env: String::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Client for `config.base_url` with the key read from `config.api_key_env`.
    pub fn from_config(config: &AiConfig) -> Self {
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|k| !k.is_empty())
            .map(SecretString::from);
        if api_key.is_none() {
            tracing::debug!(env = %config.api_key_env, "no AI API key in environment");
        }
        Self {
            api_key_env: config.api_key_env.clone(),
            ..Self::new(&config.base_url, api_key)
        }
    }

    async fn call(&self, request: AiRequest) -> Result<AiResponse, AiError> {
        let api_key = self.api_key.as_ref().ok_or_else(|| {
            AiError::Request(format!("no API key configured (set {})", self.api_key_env))
        })?;

        let response = self
            .client
            .post(format!("{}/responses", self.base_url))
            .bearer_auth(api_key.expose_secret())
            .json(&request)
            .send()
            .await
            .map_err(|e| AiError::Request(format!("HTTP request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(map_error(status.as_u16(), &body));
        }

        let body: ResponsesBody = response
            .json()
            .await
            .map_err(|e| AiError::InvalidResponse(format!("failed to parse response: {e}")))?;

        let output_text = body
            .output
            .iter()
            .filter(|item| item.kind == "message")
            .flat_map(|item| item.content.iter())
            .filter(|part| part.kind == "output_text")
            .filter_map(|part| part.text.as_deref())
            .collect::<Vec<_>>()
            .join("");

        let usage = body.usage.unwrap_or_default();
        Ok(AiResponse {
            output_text,
            usage_info: UsageInfo {
                input_tokens: usage.input_tokens,
                output_tokens: usage.output_tokens,
                total_tokens: usage.total_tokens,
                cost_usd: Some(estimate_cost(usage.input_tokens, usage.output_tokens, &request.model)),
            },
            response_id: body.id,
        })
    }
}

impl AiProvider for OpenAiResponsesClient {
    fn name(&self) -> &str {
        "openai"
    }

    fn generate(&self, request: AiRequest) -> BoxFuture<'_, Result<AiResponse, AiError>> {
        Box::pin(self.call(request))
    }
}

/// Map an error answer. Image download failures name the offending URL so
/// the caller can strip it and retry.
fn map_error(status: u16, body: &str) -> AiError {
    let detail = serde_json::from_str::<ErrorBody>(body).ok().map(|b| b.error);
    let message = detail
        .as_ref()
        .map(|d| d.message.clone())
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| body.to_string());
    let code = detail.and_then(|d| d.code).unwrap_or_default();

    if status == 429 {
        return AiError::RateLimited(message);
    }
    let about_image = code.contains("image") || message.to_lowercase().contains("image");
    if status == 400 && about_image {
        if let Some(url) = extract_url(&message) {
            return AiError::InvalidImageUrl { url, message };
        }
    }
    AiError::Request(format!("HTTP {status}: {message}"))
}

fn extract_url(message: &str) -> Option<String> {
    let start = message.find("https://").or_else(|| message.find("http://"))?;
    let url: String = message[start..]
        .chars()
        .take_while(|c| !c.is_whitespace() && !matches!(c, '\'' | '"' | ')' | '>' | '<'))
        .collect();
    let url = url.trim_end_matches(['.', ',', ';']);
    (!url.is_empty()).then(|| url.to_string())
}
