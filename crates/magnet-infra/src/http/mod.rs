//! HTTP adapters for the AI provider, outgoing webhooks and the remote
//! browser driver. All of them share `reqwest` and never log secrets.

pub mod ai;
pub mod browser;
pub mod webhook;

pub use ai::OpenAiResponsesClient;
pub use browser::RemoteBrowserDriver;
pub use webhook::{ReqwestWebhookTransport, SIGNATURE_HEADER, sign_payload};
