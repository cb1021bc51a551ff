//! Haven Core Library
//!
//! Offline queue for deferred user actions: chat messages, emotion samples
//! and profile edits recorded while disconnected are persisted locally and
//! delivered once connectivity returns.

pub mod connectivity;
pub mod models;
pub mod notifier;
pub mod queue;
pub mod reconciler;
mod state;
pub mod store;
pub mod submitter;

#[cfg(test)]
mod testing;

pub use connectivity::{ConnectivityEvent, ConnectivityMonitor};
pub use models::{Endpoint, EndpointMethod, SyncItem, SyncKind};
pub use notifier::{Notification, Notifier, TracingNotifier};
pub use queue::SyncQueue;
pub use reconciler::{DrainOutcome, DrainReport, Reconciler, RetryPolicy, SkipReason, MAX_RETRIES};
pub use store::{FileQueueStore, MemoryQueueStore, QueueStore, StoreError, QUEUE_STORAGE_KEY};
pub use submitter::{check_server, DisabledSubmitter, HttpSubmitter, SubmitError, Submitter};

pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
