use std::sync::Arc;
use std::time::Duration;

use haven_core::{
    ConnectivityMonitor, DisabledSubmitter, FileQueueStore, HttpSubmitter, Notifier, RetryPolicy,
    SubmitError, Submitter, SyncQueue,
};

use crate::config::Config;

/// Errors that can occur while setting up sync.
#[derive(Debug)]
pub enum SyncClientError {
    /// No server URL configured
    NotConfigured,
    /// The HTTP client could not be created
    ClientError(SubmitError),
}

impl std::fmt::Display for SyncClientError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncClientError::NotConfigured => write!(
                f,
                "Sync not configured. Add sync.server_url to config or set HAVEN_SERVER_URL."
            ),
            SyncClientError::ClientError(e) => write!(f, "Failed to create HTTP client: {}", e),
        }
    }
}

impl std::error::Error for SyncClientError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SyncClientError::ClientError(e) => Some(e),
            SyncClientError::NotConfigured => None,
        }
    }
}

/// Opens the persisted queue described by `config`.
///
/// The queue starts out offline; callers that want to deliver items probe
/// the server first. Without a configured server the queue can still be
/// filled and inspected, it just never drains.
pub fn open_queue(
    config: &Config,
    notifier: Arc<dyn Notifier>,
) -> Result<SyncQueue, SyncClientError> {
    let store = Arc::new(FileQueueStore::new(config.data_dir.value.clone()));
    let submitter: Arc<dyn Submitter> = match &config.sync.server_url {
        Some(url) => Arc::new(
            HttpSubmitter::with_timeout(
                url.clone(),
                config.sync.api_token.clone(),
                Duration::from_secs(config.sync.request_timeout_secs),
            )
            .map_err(SyncClientError::ClientError)?,
        ),
        None => Arc::new(DisabledSubmitter),
    };

    let policy = RetryPolicy::default().with_max_retries(config.sync.max_retries);

    Ok(SyncQueue::new(
        store,
        submitter,
        Arc::new(ConnectivityMonitor::new(false)),
        notifier,
        policy,
    ))
}
