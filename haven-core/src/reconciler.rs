//! Draining the offline queue against the backend.
//!
//! A drain takes a snapshot of the persisted queue, submits each item in
//! order (one at a time), and then commits the residual set in a single
//! write. Successful items are dropped, failed ones come back with their
//! retry count bumped, and items that reach the retry ceiling are abandoned.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::connectivity::ConnectivityMonitor;
use crate::notifier::{Notification, Notifier};
use crate::state::QueueState;
use crate::store::StoreError;
use crate::submitter::{SubmitError, Submitter};

/// Number of failed attempts after which an item is abandoned.
pub const MAX_RETRIES: u32 = 3;

/// How failed submissions are retried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Failed attempts after which an item is dropped.
    pub max_retries: u32,
    /// Wait imposed after the first drain that saw a failure.
    pub min_backoff: Duration,
    /// Upper bound for the doubling wait between failing drains.
    pub max_backoff: Duration,
    /// Drop items on errors that cannot succeed on retry (4xx) instead of
    /// spending the remaining attempts.
    pub abandon_permanent_failures: bool,
}

impl RetryPolicy {
    /// No waiting between drains.
    pub fn immediate() -> Self {
        Self {
            min_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
            ..Self::default()
        }
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Decides whether an item that has now failed `attempts` times is dropped.
    fn should_abandon(&self, attempts: u32, error: &SubmitError) -> bool {
        attempts >= self.max_retries
            || matches!(error, SubmitError::UnknownKind(_))
            || (self.abandon_permanent_failures && error.is_permanent())
    }

    /// Wait after `failed_drains` consecutive drains with failures.
    fn backoff(&self, failed_drains: u32) -> Duration {
        if failed_drains == 0 || self.min_backoff.is_zero() {
            return Duration::ZERO;
        }
        let exponent = (failed_drains - 1).min(16);
        self.min_backoff
            .saturating_mul(1 << exponent)
            .min(self.max_backoff.max(self.min_backoff))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: MAX_RETRIES,
            min_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(60),
            abandon_permanent_failures: false,
        }
    }
}

/// Counts from a single drain pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DrainReport {
    /// Items handed to the submitter.
    pub attempted: usize,
    /// Items delivered and removed.
    pub succeeded: usize,
    /// Items that failed and stay queued.
    pub retried: usize,
    /// Items dropped after their last attempt.
    pub abandoned: usize,
    /// Items left untouched because connectivity was lost mid-drain.
    pub deferred: usize,
}

impl DrainReport {
    pub fn failed(&self) -> usize {
        self.retried + self.abandoned
    }
}

/// Why a drain did nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    Offline,
    Empty,
    /// Another drain is running; this request was coalesced into it.
    InProgress,
    /// A recent drain failed and the backoff has not elapsed.
    Backoff,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DrainOutcome {
    Skipped(SkipReason),
    /// The residual queue was committed.
    Completed(DrainReport),
    /// Items were removed from the store while draining (the queue was
    /// cleared, possibly by another process); those were not written back.
    Discarded(DrainReport),
}

#[derive(Debug, Default)]
struct BackoffState {
    failed_drains: u32,
    not_before: Option<Instant>,
}

pub struct Reconciler {
    state: Arc<QueueState>,
    submitter: Arc<dyn Submitter>,
    connectivity: Arc<ConnectivityMonitor>,
    notifier: Arc<dyn Notifier>,
    policy: RetryPolicy,
    running: tokio::sync::Mutex<()>,
    backoff: Mutex<BackoffState>,
}

impl Reconciler {
    pub(crate) fn new(
        state: Arc<QueueState>,
        submitter: Arc<dyn Submitter>,
        connectivity: Arc<ConnectivityMonitor>,
        notifier: Arc<dyn Notifier>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            state,
            submitter,
            connectivity,
            notifier,
            policy,
            running: tokio::sync::Mutex::new(()),
            backoff: Mutex::new(BackoffState::default()),
        }
    }

    /// Forgets previous failures so the next drain runs immediately.
    pub fn reset_backoff(&self) {
        *self.backoff_state() = BackoffState::default();
    }

    fn backoff_state(&self) -> std::sync::MutexGuard<'_, BackoffState> {
        self.backoff
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn in_backoff(&self) -> bool {
        match self.backoff_state().not_before {
            Some(deadline) => Instant::now() < deadline,
            None => false,
        }
    }

    fn record_result(&self, report: &DrainReport) {
        let mut backoff = self.backoff_state();
        if report.failed() == 0 {
            *backoff = BackoffState::default();
            return;
        }

        backoff.failed_drains += 1;
        let wait = self.policy.backoff(backoff.failed_drains);
        backoff.not_before = if wait.is_zero() {
            None
        } else {
            tracing::debug!("Next drain delayed by {:?}", wait);
            Some(Instant::now() + wait)
        };
    }

    /// Runs one drain pass.
    ///
    /// Does nothing while offline, while another drain is running, during
    /// backoff, or when the queue is empty. The only error is failing to
    /// persist the residual queue.
    pub async fn drain(&self) -> Result<DrainOutcome, StoreError> {
        if !self.connectivity.is_online() {
            return Ok(DrainOutcome::Skipped(SkipReason::Offline));
        }

        let Ok(_running) = self.running.try_lock() else {
            tracing::debug!("Drain already in progress, coalescing");
            return Ok(DrainOutcome::Skipped(SkipReason::InProgress));
        };

        if self.in_backoff() {
            return Ok(DrainOutcome::Skipped(SkipReason::Backoff));
        }

        let snapshot = self.state.load();
        if snapshot.is_empty() {
            return Ok(DrainOutcome::Skipped(SkipReason::Empty));
        }

        tracing::info!("Draining {} queued item(s)", snapshot.len());

        let snapshot_ids: HashSet<String> = snapshot.iter().map(|item| item.id.clone()).collect();
        let mut report = DrainReport::default();
        let mut residual = Vec::with_capacity(snapshot.len());
        let mut abandoned = Vec::new();

        let mut items = snapshot.into_iter();
        while let Some(item) = items.next() {
            if !self.connectivity.is_online() {
                report.deferred = 1 + items.len();
                tracing::info!(
                    "Connectivity lost mid-drain, deferring {} item(s)",
                    report.deferred
                );
                residual.push(item);
                residual.extend(items.by_ref());
                break;
            }

            // A persisted record can already be past the ceiling.
            if item.retry_count >= self.policy.max_retries {
                tracing::warn!(
                    "Abandoning {} {} with {} recorded attempt(s)",
                    item.kind,
                    item.id,
                    item.retry_count
                );
                report.abandoned += 1;
                abandoned.push(Notification::Abandoned {
                    item_id: item.id.clone(),
                    kind: item.kind.clone(),
                    attempts: item.retry_count,
                });
                continue;
            }

            report.attempted += 1;
            match self.submitter.submit(&item).await {
                Ok(()) => {
                    tracing::debug!("Delivered {} {}", item.kind, item.id);
                    report.succeeded += 1;
                }
                Err(e) => {
                    let attempts = item.next_attempt();
                    if self.policy.should_abandon(attempts, &e) {
                        tracing::warn!(
                            "Abandoning {} {} after {} attempt(s): {}",
                            item.kind,
                            item.id,
                            attempts,
                            e
                        );
                        report.abandoned += 1;
                        abandoned.push(Notification::Abandoned {
                            item_id: item.id.clone(),
                            kind: item.kind.clone(),
                            attempts,
                        });
                    } else {
                        tracing::debug!(
                            "Failed to deliver {} {} (attempt {}): {}",
                            item.kind,
                            item.id,
                            attempts,
                            e
                        );
                        report.retried += 1;
                        residual.push(item.retried());
                    }
                }
            }
        }

        let committed = self
            .state
            .commit(&snapshot_ids, residual)?;
        self.record_result(&report);

        tracing::info!(
            "Drain finished: {} delivered, {} retrying, {} abandoned, {} deferred",
            report.succeeded,
            report.retried,
            report.abandoned,
            report.deferred
        );

        if report.succeeded > 0 {
            self.notifier.notify(Notification::Synced {
                count: report.succeeded,
            });
        }

        if !committed {
            tracing::info!("Queue was cleared during drain, discarding residual items");
            return Ok(DrainOutcome::Discarded(report));
        }

        for notification in abandoned {
            self.notifier.notify(notification);
        }

        Ok(DrainOutcome::Completed(report))
    }
}
