//! Remote browser driver.
//!
//! Browser sessions run in an external automation service. The driver posts
//! the session to `{driver_url}/sessions` and waits for the finished run;
//! screenshots come back base64-encoded.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use magnet_core::ports::{BoxFuture, BrowserDriver, BrowserRun, BrowserSession, CollaboratorError, Screenshot};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
struct SessionRequest<'a> {
    job_id: &'a str,
    instructions: &'a str,
    input: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    start_url: Option<&'a str>,
    max_actions: u32,
    wait_budget_secs: u64,
}

#[derive(Debug, Deserialize)]
struct SessionResult {
    #[serde(default)]
    output_text: String,
    #[serde(default)]
    final_url: Option<String>,
    #[serde(default)]
    actions_taken: u32,
    #[serde(default)]
    screenshots: Vec<WireScreenshot>,
}

#[derive(Debug, Deserialize)]
struct WireScreenshot {
    filename: String,
    png_base64: String,
}

pub struct RemoteBrowserDriver {
    client: reqwest::Client,
    driver_url: Option<String>,
}

impl RemoteBrowserDriver {
    /// Without a driver URL every session fails with `NotConfigured`.
    pub fn new(driver_url: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            driver_url: driver_url.map(|u| u.trim_end_matches('/').to_string()),
        }
    }

    async fn run_session(&self, session: BrowserSession) -> Result<BrowserRun, CollaboratorError> {
        let base = self
            .driver_url
            .as_deref()
            .ok_or_else(|| CollaboratorError::NotConfigured("browser driver URL is not set".into()))?;

        let body = SessionRequest {
            job_id: &session.job_id,
            instructions: &session.instructions,
            input: &session.input,
            start_url: session.start_url.as_deref(),
            max_actions: session.max_actions,
            wait_budget_secs: session.wait_budget.as_secs(),
        };
        let response = self
            .client
            .post(format!("{base}/sessions"))
            .timeout(session.wait_budget)
            .json(&body)
            .send()
            .await
            .map_err(|e| CollaboratorError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(CollaboratorError::Rejected(format!("driver returned HTTP {status}: {text}")));
        }

        let result: SessionResult = response
            .json()
            .await
            .map_err(|e| CollaboratorError::Transport(format!("invalid driver response: {e}")))?;

        let screenshots = result
            .screenshots
            .into_iter()
            .map(|s| {
                STANDARD
                    .decode(s.png_base64.as_bytes())
                    .map(|png| Screenshot {
                        filename: s.filename.clone(),
                        png,
                    })
                    .map_err(|e| CollaboratorError::Transport(format!("screenshot {}: {e}", s.filename)))
            })
            .collect::<Result<Vec<_>, _>>()?;

        tracing::debug!(
            job_id = %session.job_id,
            actions = result.actions_taken,
            screenshots = screenshots.len(),
            "browser session finished"
        );
        Ok(BrowserRun {
            output_text: result.output_text,
            final_url: result.final_url,
            actions_taken: result.actions_taken,
            screenshots,
        })
    }
}

impl BrowserDriver for RemoteBrowserDriver {
    fn run(&self, session: BrowserSession) -> BoxFuture<'_, Result<BrowserRun, CollaboratorError>> {
        Box::pin(self.run_session(session))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    fn session() -> BrowserSession {
        BrowserSession {
            job_id: "job-1".into(),
            instructions: "Find the pricing page".into(),
            input: "".into(),
            start_url: Some("https://example.com".into()),
            max_actions: 5,
            wait_budget: Duration::from_secs(10),
        }
    }

    #[tokio::test]
    async fn test_not_configured() {
        let driver = RemoteBrowserDriver::new(None);
        let err = driver.run(session()).await.unwrap_err();
        assert!(matches!(err, CollaboratorError::NotConfigured(_)));
    }

    #[tokio::test]
    async fn test_run_decodes_screenshots() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/sessions");
                then.status(200).json_body(json!({
                    "output_text": "Pricing starts at $10",
                    "final_url": "https://example.com/pricing",
                    "actions_taken": 3,
                    "screenshots": [{"filename": "shot-1.png", "png_base64": "iVBORw=="}]
                }));
            })
            .await;

        let driver = RemoteBrowserDriver::new(Some(format!("{}/", server.base_url())));
        let run = driver.run(session()).await.unwrap();
        assert_eq!(run.actions_taken, 3);
        assert_eq!(run.final_url.as_deref(), Some("https://example.com/pricing"));
        assert_eq!(run.screenshots.len(), 1);
        assert_eq!(run.screenshots[0].png, vec![0x89, b'P', b'N', b'G']);
    }

    #[tokio::test]
    async fn test_driver_error_is_rejected() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/sessions");
                then.status(503).body("no browsers available");
            })
            .await;

        let driver = RemoteBrowserDriver::new(Some(server.base_url()));
        let err = driver.run(session()).await.unwrap_err();
        assert!(err.to_string().contains("no browsers available"));
    }
}
