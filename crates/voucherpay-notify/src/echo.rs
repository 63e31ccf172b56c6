//! Echo-back verification: re-post a received notification to the
//! provider and read back its verdict.

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use std::time::Duration;

use crate::error::NotifyError;
use crate::notification::Notification;

/// Longest provider response line kept for logs and audit.
const MAX_RESPONSE_ECHO: usize = 64;

/// The provider's answer to an echo-back request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EchoResponse {
    /// The provider sent this notification.
    Verified,
    /// The provider did not send this notification.
    Invalid,
    /// Neither `VERIFIED` nor `INVALID`; carries the (truncated) first line.
    Undetermined(String),
}

impl EchoResponse {
    /// Interpret a response body. Only the first line counts, and it must
    /// match exactly.
    pub fn from_body(body: &str) -> Self {
        let line = body.lines().next().unwrap_or_default().trim_end_matches('\r');
        match line {
            "VERIFIED" => Self::Verified,
            "INVALID" => Self::Invalid,
            other => Self::Undetermined(other.chars().take(MAX_RESPONSE_ECHO).collect()),
        }
    }
}

/// Sends the echo-back request.
#[async_trait]
pub trait EchoVerifier: Send + Sync {
    async fn verify(&self, notification: &Notification) -> Result<EchoResponse, NotifyError>;
}

/// Echo-back over HTTP(S) with a bounded timeout.
pub struct HttpEchoVerifier {
    client: reqwest::Client,
    verify_url: String,
}

impl HttpEchoVerifier {
    pub fn new(verify_url: impl Into<String>, timeout: Duration) -> Result<Self, NotifyError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("voucherpay/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| NotifyError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self::from_reqwest(verify_url, client))
    }

    /// Use an existing client.
    pub fn from_reqwest(verify_url: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            client,
            verify_url: verify_url.into(),
        }
    }
}

#[async_trait]
impl EchoVerifier for HttpEchoVerifier {
    async fn verify(&self, notification: &Notification) -> Result<EchoResponse, NotifyError> {
        let body = notification.echo_body();
        tracing::debug!(url = %self.verify_url, bytes = body.len(), "posting notification back to provider");

        let resp = self
            .client
            .post(&self.verify_url)
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(body)
            .send()
            .await
            .map_err(map_transport)?;

        let status = resp.status();
        if !status.is_success() {
            return Err(NotifyError::Transport(format!("provider answered HTTP {status}")));
        }
        let text = resp.text().await.map_err(map_transport)?;
        Ok(EchoResponse::from_body(&text))
    }
}

fn map_transport(err: reqwest::Error) -> NotifyError {
    if err.is_timeout() {
        NotifyError::Timeout
    } else {
        NotifyError::Transport(err.to_string())
    }
}
