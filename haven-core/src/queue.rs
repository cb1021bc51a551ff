//! The offline queue facade.
//!
//! [`SyncQueue`] is constructed once at startup and handed to whatever
//! records user actions. It owns the persisted queue, the reconciler, and
//! the wiring between connectivity changes and drains.

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

use crate::connectivity::{ConnectivityEvent, ConnectivityMonitor};
use crate::models::{SyncItem, SyncKind};
use crate::notifier::{Notification, Notifier};
use crate::reconciler::{DrainOutcome, Reconciler, RetryPolicy};
use crate::state::QueueState;
use crate::store::{QueueStore, StoreError};
use crate::submitter::Submitter;

/// Handle to the offline queue. Cloning is cheap and shares the same queue.
#[derive(Clone)]
pub struct SyncQueue {
    state: Arc<QueueState>,
    reconciler: Arc<Reconciler>,
    connectivity: Arc<ConnectivityMonitor>,
    notifier: Arc<dyn Notifier>,
}

impl SyncQueue {
    pub fn new(
        store: Arc<dyn QueueStore>,
        submitter: Arc<dyn Submitter>,
        connectivity: Arc<ConnectivityMonitor>,
        notifier: Arc<dyn Notifier>,
        policy: RetryPolicy,
    ) -> Self {
        let state = Arc::new(QueueState::new(store));
        let reconciler = Arc::new(Reconciler::new(
            state.clone(),
            submitter,
            connectivity.clone(),
            notifier.clone(),
            policy,
        ));
        Self {
            state,
            reconciler,
            connectivity,
            notifier,
        }
    }

    pub fn connectivity(&self) -> &Arc<ConnectivityMonitor> {
        &self.connectivity
    }

    /// Queues a user action and returns its id.
    ///
    /// The item is persisted before this returns. When online, a drain is
    /// started in the background; this call never waits for the network.
    pub fn enqueue(&self, kind: SyncKind, payload: Value) -> Result<String, StoreError> {
        let item = SyncItem::new(kind, payload);
        let id = item.id.clone();

        self.state.append(item)?;
        tracing::debug!("Queued {}", id);

        if self.connectivity.is_online() {
            self.spawn_drain();
        }

        Ok(id)
    }

    /// Returns the pending items in queue order.
    pub fn peek(&self) -> Vec<SyncItem> {
        self.state.load()
    }

    pub fn len(&self) -> usize {
        self.peek().len()
    }

    pub fn is_empty(&self) -> bool {
        self.peek().is_empty()
    }

    /// Discards every pending item, whatever its retry state.
    ///
    /// A drain running at the same time will not write its results back.
    pub fn clear(&self) -> Result<(), StoreError> {
        self.state.clear()?;
        tracing::info!("Offline queue cleared");
        Ok(())
    }

    /// Runs a drain pass and waits for it.
    pub async fn drain(&self) -> Result<DrainOutcome, StoreError> {
        self.reconciler.drain().await
    }

    /// Starts a drain on the current tokio runtime without waiting for it.
    ///
    /// Returns `None` when called outside a runtime; the items stay queued
    /// until the next trigger.
    pub fn spawn_drain(&self) -> Option<JoinHandle<()>> {
        let handle = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                tracing::debug!("No async runtime, leaving drain to the next trigger");
                return None;
            }
        };

        let reconciler = self.reconciler.clone();
        Some(handle.spawn(async move {
            if let Err(e) = reconciler.drain().await {
                tracing::error!("Failed to persist offline queue after drain: {}", e);
            }
        }))
    }

    /// Reacts to a connectivity transition.
    pub async fn handle_connectivity(&self, event: ConnectivityEvent) {
        match event {
            ConnectivityEvent::BecameOnline => {
                self.notifier.notify(Notification::Restored);
                self.reconciler.reset_backoff();
                if let Err(e) = self.reconciler.drain().await {
                    tracing::error!("Failed to persist offline queue after drain: {}", e);
                }
            }
            ConnectivityEvent::BecameOffline => {
                self.notifier.notify(Notification::Offline);
            }
        }
    }

    /// Acts on the current state after transitions were missed.
    ///
    /// Nothing is announced, since it is unknown which edges happened; a
    /// drain is attempted and does nothing while offline.
    pub async fn catch_up(&self) {
        if let Err(e) = self.reconciler.drain().await {
            tracing::error!("Failed to persist offline queue after drain: {}", e);
        }
    }

    /// Subscribes to the connectivity monitor and handles every transition
    /// until the returned task is aborted.
    pub fn spawn_connectivity_listener(&self) -> JoinHandle<()> {
        let mut events = self.connectivity.subscribe();
        let queue = self.clone();

        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => queue.handle_connectivity(event).await,
                    Err(RecvError::Lagged(missed)) => {
                        tracing::warn!("Missed {} connectivity event(s)", missed);
                        queue.catch_up().await;
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconciler::{SkipReason, MAX_RETRIES};
    use crate::store::{FileQueueStore, MemoryQueueStore};
    use crate::testing::{RecordingNotifier, ScriptedSubmitter};
    use serde_json::json;
    use std::time::Duration;
    use tempfile::TempDir;

    struct Harness {
        queue: SyncQueue,
        store: Arc<MemoryQueueStore>,
        submitter: Arc<ScriptedSubmitter>,
        notifier: Arc<RecordingNotifier>,
    }

    fn harness(online: bool) -> Harness {
        let store = Arc::new(MemoryQueueStore::new());
        let submitter = ScriptedSubmitter::new();
        let notifier = RecordingNotifier::new();
        let queue = SyncQueue::new(
            store.clone(),
            submitter.clone(),
            Arc::new(ConnectivityMonitor::new(online)),
            notifier.clone(),
            RetryPolicy::immediate(),
        );
        Harness {
            queue,
            store,
            submitter,
            notifier,
        }
    }

    async fn wait_until(condition: impl Fn() -> bool) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while !condition() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("condition not met in time");
    }

    #[tokio::test]
    async fn test_enqueue_offline_persists_without_network() {
        let h = harness(false);

        let id = h
            .queue
            .enqueue(SyncKind::Message, json!({"text": "hello"}))
            .unwrap();

        let items = h.queue.peek();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].id, id);
        assert_eq!(items[0].retry_count, 0);
        assert_eq!(items[0].payload, json!({"text": "hello"}));
        assert_eq!(h.store.load(), items);
        assert!(h.submitter.calls().is_empty());
    }

    #[tokio::test]
    async fn test_enqueue_online_drains_in_background() {
        let h = harness(true);

        h.queue
            .enqueue(SyncKind::EmotionSample, json!({"emotion": "hopeful"}))
            .unwrap();

        let queue = h.queue.clone();
        wait_until(move || queue.is_empty()).await;
        assert_eq!(h.submitter.calls().len(), 1);
        assert_eq!(
            h.notifier.notifications(),
            vec![Notification::Synced { count: 1 }]
        );
    }

    #[test]
    fn test_enqueue_outside_runtime_still_persists() {
        let h = harness(true);
        h.queue
            .enqueue(SyncKind::ProfileUpdate, json!({"name": "Alex"}))
            .unwrap();
        assert_eq!(h.queue.len(), 1);
        assert!(h.queue.spawn_drain().is_none());
    }

    #[tokio::test]
    async fn test_going_online_drains_queued_items() {
        let h = harness(false);
        let _listener = h.queue.spawn_connectivity_listener();

        h.queue
            .enqueue(SyncKind::Message, json!({"text": "one"}))
            .unwrap();
        h.queue
            .enqueue(SyncKind::Message, json!({"text": "two"}))
            .unwrap();
        assert_eq!(h.queue.len(), 2);
        assert!(h.submitter.calls().is_empty());

        h.queue.connectivity().set_online(true);

        let queue = h.queue.clone();
        wait_until(move || queue.is_empty()).await;
        assert_eq!(h.submitter.calls().len(), 2);
        assert_eq!(
            h.notifier.notifications(),
            vec![Notification::Restored, Notification::Synced { count: 2 }]
        );
    }

    #[tokio::test]
    async fn test_going_offline_only_notifies() {
        let h = harness(true);
        h.queue.connectivity().set_online(false);
        h.queue
            .handle_connectivity(ConnectivityEvent::BecameOffline)
            .await;

        assert_eq!(h.notifier.notifications(), vec![Notification::Offline]);
        assert!(h.store.raw().is_none());
    }

    #[tokio::test]
    async fn test_catch_up_drains_without_announcing() {
        let h = harness(false);
        h.queue.enqueue(SyncKind::Message, json!({})).unwrap();

        h.queue.catch_up().await;
        assert_eq!(h.queue.len(), 1);

        h.queue.connectivity().set_online(true);
        h.queue.catch_up().await;

        assert!(h.queue.is_empty());
        assert_eq!(
            h.notifier.notifications(),
            vec![Notification::Synced { count: 1 }]
        );
    }

    #[tokio::test]
    async fn test_listener_recovers_from_missed_events() {
        let h = harness(false);
        h.queue.enqueue(SyncKind::Message, json!({})).unwrap();
        let _listener = h.queue.spawn_connectivity_listener();

        // More transitions than the channel holds, ending online.
        for step in 0..41 {
            h.queue.connectivity().set_online(step % 2 == 0);
        }

        let queue = h.queue.clone();
        wait_until(move || queue.is_empty()).await;
        assert_eq!(h.submitter.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_clear_removes_everything() {
        let h = harness(false);
        for text in ["a", "b", "c"] {
            h.queue
                .enqueue(SyncKind::Message, json!({ "text": text }))
                .unwrap();
        }

        h.queue.connectivity().set_online(true);
        h.submitter
            .fail_all_with(crate::submitter::SubmitError::Timeout);
        h.queue.drain().await.unwrap();
        assert!(h.queue.peek().iter().all(|item| item.retry_count == 1));

        h.queue.clear().unwrap();
        assert!(h.queue.peek().is_empty());
    }

    #[tokio::test]
    async fn test_size_only_shrinks_through_delivery_eviction_or_clear() {
        let h = harness(false);
        let a = h.queue.enqueue(SyncKind::Message, json!({})).unwrap();
        h.queue.enqueue(SyncKind::Message, json!({})).unwrap();
        h.submitter.fail_item(&a);

        assert_eq!(
            h.queue.drain().await.unwrap(),
            DrainOutcome::Skipped(SkipReason::Offline)
        );
        assert_eq!(h.queue.len(), 2);

        h.queue.connectivity().set_online(true);
        h.queue.drain().await.unwrap();
        assert_eq!(h.queue.len(), 1);

        for _ in 1..MAX_RETRIES {
            assert_eq!(h.queue.len(), 1);
            h.queue.drain().await.unwrap();
        }
        assert!(h.queue.is_empty());
    }

    #[tokio::test]
    async fn test_clear_from_another_queue_on_same_store_wins() {
        let temp = TempDir::new().unwrap();
        let submitter = ScriptedSubmitter::new();
        let draining = SyncQueue::new(
            Arc::new(FileQueueStore::new(temp.path().to_path_buf())),
            submitter.clone(),
            Arc::new(ConnectivityMonitor::new(false)),
            RecordingNotifier::new(),
            RetryPolicy::immediate(),
        );
        let clearing = SyncQueue::new(
            Arc::new(FileQueueStore::new(temp.path().to_path_buf())),
            ScriptedSubmitter::new(),
            Arc::new(ConnectivityMonitor::new(false)),
            RecordingNotifier::new(),
            RetryPolicy::immediate(),
        );

        let id = draining.enqueue(SyncKind::Message, json!({})).unwrap();
        submitter.fail_item(&id);
        let other = clearing.clone();
        submitter.on_submit(move |_| {
            other.clear().unwrap();
        });

        draining.connectivity().set_online(true);
        let outcome = draining.drain().await.unwrap();

        assert!(matches!(outcome, DrainOutcome::Discarded(_)));
        assert!(draining.is_empty());
        assert!(clearing.is_empty());
    }

    #[tokio::test]
    async fn test_queue_survives_restart() {
        let temp = TempDir::new().unwrap();
        let build = || {
            SyncQueue::new(
                Arc::new(FileQueueStore::new(temp.path().to_path_buf())),
                ScriptedSubmitter::new(),
                Arc::new(ConnectivityMonitor::new(false)),
                RecordingNotifier::new(),
                RetryPolicy::immediate(),
            )
        };

        let id = build()
            .enqueue(SyncKind::Message, json!({"text": "still here"}))
            .unwrap();

        let reopened = build();
        let items = reopened.peek();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].id, id);
    }
}
