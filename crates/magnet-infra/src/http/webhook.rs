//! Outgoing webhook transport over `reqwest`.
//!
//! The JSON payload is serialized once; when a signing secret is configured
//! the exact body bytes are signed with HMAC-SHA256 and the hex digest is
//! sent as `X-Magnet-Signature: sha256=<hex>`.

use hmac::{Hmac, Mac};
use magnet_core::ports::{BoxFuture, CollaboratorError, WebhookRequest, WebhookResponse, WebhookTransport};
use magnet_types::config::WebhookSettings;
use reqwest::Method;
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "X-Magnet-Signature";

/// HMAC-SHA256 of `body`, hex-encoded.
pub fn sign_payload(secret: &[u8], body: &[u8]) -> Result<String, CollaboratorError> {
    let mut mac = HmacSha256::new_from_slice(secret)
        .map_err(|e| CollaboratorError::Rejected(format!("invalid signing key: {e}")))?;
    mac.update(body);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

pub struct ReqwestWebhookTransport {
    client: reqwest::Client,
    signing_secret: Option<SecretString>,
}

impl ReqwestWebhookTransport {
    pub fn new(signing_secret: Option<SecretString>) -> Self {
        Self {
            client: reqwest::Client::new(),
            signing_secret,
        }
    }

    /// Transport with the signing secret read from `settings.signing_secret_env`.
    pub fn from_settings(settings: &WebhookSettings) -> Self {
        let secret = settings.signing_secret_env.as_deref().and_then(|env| {
            let value = std::env::var(env).ok().filter(|v| !v.is_empty());
            if value.is_none() {
                tracing::warn!(env, "webhook signing secret variable is empty or unset, sending unsigned");
            }
            value.map(SecretString::from)
        });
        Self::new(secret)
    }

    async fn deliver(&self, request: WebhookRequest) -> Result<WebhookResponse, CollaboratorError> {
        let method = Method::from_bytes(request.method.to_uppercase().as_bytes())
            .map_err(|_| CollaboratorError::Rejected(format!("invalid HTTP method '{}'", request.method)))?;
        let body = serde_json::to_vec(&request.payload)
            .map_err(|e| CollaboratorError::Rejected(format!("unserializable payload: {e}")))?;

        let mut builder = self
            .client
            .request(method.clone(), &request.url)
            .timeout(request.timeout);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if method != Method::GET {
            if let Some(secret) = &self.signing_secret {
                let signature = sign_payload(secret.expose_secret().as_bytes(), &body)?;
                builder = builder.header(SIGNATURE_HEADER, format!("sha256={signature}"));
            }
            builder = builder.header("content-type", "application/json").body(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| CollaboratorError::Transport(e.to_string()))?;
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| CollaboratorError::Transport(format!("failed to read response body: {e}")))?;

        tracing::debug!(url = %request.url, method = %method, status, "webhook delivered");
        Ok(WebhookResponse { status, body })
    }
}

impl WebhookTransport for ReqwestWebhookTransport {
    fn send(&self, request: WebhookRequest) -> BoxFuture<'_, Result<WebhookResponse, CollaboratorError>> {
        Box::pin(self.deliver(request))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::time::Duration;

    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    fn request(url: String, method: &str) -> WebhookRequest {
        WebhookRequest {
            url,
            method: method.into(),
            headers: HashMap::from([("X-Api-Key".to_string(), "abc".to_string())]),
            payload: json!({"job_id": "job-1"}),
            timeout: Duration::from_secs(5),
        }
    }

    #[test]
    fn test_sign_payload_rfc4231_vector() {
        let signature = sign_payload(b"Jefe", b"what do ya want for nothing?").unwrap();
        assert_eq!(
            signature,
            "5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843"
        );
    }

    #[tokio::test]
    async fn test_signed_post() {
        let body = serde_json::to_vec(&json!({"job_id": "job-1"})).unwrap();
        let expected = format!("sha256={}", sign_payload(b"s3cret", &body).unwrap());

        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/hook")
                    .header("x-api-key", "abc")
                    .header("x-magnet-signature", expected.as_str());
                then.status(202).body("queued");
            })
            .await;

        let transport = ReqwestWebhookTransport::new(Some(SecretString::from("s3cret")));
        let response = transport.send(request(server.url("/hook"), "post")).await.unwrap();

        mock.assert_async().await;
        assert_eq!(response.status, 202);
        assert!(response.is_success());
        assert_eq!(response.body, "queued");
    }

    #[tokio::test]
    async fn test_error_status_is_returned_not_raised() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(PUT).path("/hook");
                then.status(500).body("boom");
            })
            .await;

        let transport = ReqwestWebhookTransport::new(None);
        let response = transport.send(request(server.url("/hook"), "PUT")).await.unwrap();
        assert_eq!(response.status, 500);
        assert!(!response.is_success());
    }

    #[tokio::test]
    async fn test_unreachable_host_is_transport_error() {
        let transport = ReqwestWebhookTransport::new(None);
        let err = transport
            .send(request("http://127.0.0.1:1/hook".into(), "POST"))
            .await
            .unwrap_err();
        assert!(matches!(err, CollaboratorError::Transport(_)));
    }

    #[tokio::test]
    async fn test_invalid_method() {
        let transport = ReqwestWebhookTransport::new(None);
        let err = transport
            .send(request("http://127.0.0.1:1/hook".into(), "BAD METHOD"))
            .await
            .unwrap_err();
        assert!(matches!(err, CollaboratorError::Rejected(_)));
    }
}
