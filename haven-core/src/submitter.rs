//! Delivery of a single queued item to its backend endpoint.

use std::sync::RwLock;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{EndpointMethod, SyncItem};

/// Default timeout for a single submission.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
/// Timeout for the reachability check.
const HEALTH_TIMEOUT: Duration = Duration::from_secs(5);
/// Response bodies are truncated to this many characters in errors.
const MAX_ERROR_BODY: usize = 512;

/// Errors reported by a submission attempt.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SubmitError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Request timed out")]
    Timeout,

    #[error("Server returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Unknown item kind: {0}")]
    UnknownKind(String),

    #[error("No credential available")]
    MissingCredential,
}

impl SubmitError {
    /// Returns true if repeating the same request cannot succeed.
    ///
    /// Unknown kinds and 4xx responses (other than 408 and 429) are
    /// permanent; everything else may clear up on its own.
    pub fn is_permanent(&self) -> bool {
        match self {
            SubmitError::UnknownKind(_) => true,
            SubmitError::Status { status, .. } => {
                (400..500).contains(status) && *status != 408 && *status != 429
            }
            _ => false,
        }
    }
}

/// Performs exactly one delivery attempt for an item.
///
/// Implementations must not retry internally; retry policy belongs to the
/// reconciler.
#[async_trait]
pub trait Submitter: Send + Sync {
    async fn submit(&self, item: &SyncItem) -> Result<(), SubmitError>;
}

/// Submits items to the backend over HTTP with a bearer credential.
pub struct HttpSubmitter {
    client: reqwest::Client,
    base_url: String,
    token: RwLock<Option<String>>,
}

impl HttpSubmitter {
    pub fn new(base_url: impl Into<String>, token: Option<String>) -> Result<Self, SubmitError> {
        Self::with_timeout(base_url, token, DEFAULT_REQUEST_TIMEOUT)
    }

    pub fn with_timeout(
        base_url: impl Into<String>,
        token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, SubmitError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SubmitError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.into(),
            token: RwLock::new(token),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Replaces the credential attached to subsequent submissions.
    pub fn set_token(&self, token: Option<String>) {
        *self
            .token
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = token;
    }

    fn current_token(&self) -> Option<String> {
        self.token
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn build_url(&self, path: &str) -> String {
        format!("{}{}", normalize_base_url(&self.base_url), path)
    }
}

impl std::fmt::Debug for HttpSubmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpSubmitter")
            .field("base_url", &self.base_url)
            .field("has_token", &self.current_token().is_some())
            .finish()
    }
}

#[async_trait]
impl Submitter for HttpSubmitter {
    async fn submit(&self, item: &SyncItem) -> Result<(), SubmitError> {
        let endpoint = item
            .kind
            .endpoint()
            .ok_or_else(|| SubmitError::UnknownKind(item.kind.to_string()))?;
        let token = self.current_token().ok_or(SubmitError::MissingCredential)?;

        let url = self.build_url(endpoint.path);
        let request = match endpoint.method {
            EndpointMethod::Post => self.client.post(&url),
            EndpointMethod::Put => self.client.put(&url),
        };

        tracing::debug!("Submitting {} {} to {}", item.kind, item.id, url);

        let response = request
            .bearer_auth(token)
            .json(&item.payload)
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SubmitError::Status {
                status: status.as_u16(),
                body: body.chars().take(MAX_ERROR_BODY).collect(),
            });
        }

        Ok(())
    }
}

/// Submitter used when no server is configured; every attempt fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledSubmitter;

#[async_trait]
impl Submitter for DisabledSubmitter {
    async fn submit(&self, _item: &SyncItem) -> Result<(), SubmitError> {
        Err(SubmitError::Transport("no server configured".to_string()))
    }
}

fn map_transport_error(e: reqwest::Error) -> SubmitError {
    if e.is_timeout() {
        SubmitError::Timeout
    } else {
        SubmitError::Transport(e.to_string())
    }
}

/// Normalizes a configured server URL to an `http(s)` base without a
/// trailing slash.
fn normalize_base_url(server_url: &str) -> String {
    let base_url = if let Some(rest) = server_url.strip_prefix("ws://") {
        format!("http://{}", rest)
    } else if let Some(rest) = server_url.strip_prefix("wss://") {
        format!("https://{}", rest)
    } else if !server_url.starts_with("http://") && !server_url.starts_with("https://") {
        format!("http://{}", server_url)
    } else {
        server_url.to_string()
    };

    base_url.trim_end_matches('/').to_string()
}

/// Checks whether the server answers its health endpoint.
pub async fn check_server(server_url: &str) -> bool {
    let url = format!("{}/health", normalize_base_url(server_url));

    let client = match reqwest::Client::builder().timeout(HEALTH_TIMEOUT).build() {
        Ok(c) => c,
        Err(_) => return false,
    };

    match client.get(&url).send().await {
        Ok(response) => response.status().is_success(),
        Err(e) => {
            tracing::debug!("Health check for {} failed: {}", url, e);
            false
        }
    }
}
