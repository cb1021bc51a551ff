use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::sync_kind::SyncKind;

/// A single deferred user action waiting to be delivered.
///
/// Field names follow the persisted record layout:
/// `id`, `type`, `data`, `timestamp`, `retryCount`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncItem {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: SyncKind,
    #[serde(rename = "data")]
    pub payload: Value,
    #[serde(rename = "timestamp")]
    pub enqueued_at: DateTime<Utc>,
    #[serde(rename = "retryCount")]
    pub retry_count: u32,
}

impl SyncItem {
    pub fn new(kind: SyncKind, payload: Value) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            kind,
            payload,
            enqueued_at: Utc::now(),
            retry_count: 0,
        }
    }

    pub fn with_retry_count(mut self, retry_count: u32) -> Self {
        self.retry_count = retry_count;
        self
    }

    /// Failed attempts this item will have if the next one fails too.
    pub fn next_attempt(&self) -> u32 {
        self.retry_count.saturating_add(1)
    }

    /// Returns a copy of this item after one more failed attempt.
    pub fn retried(&self) -> Self {
        let mut next = self.clone();
        next.retry_count = self.next_attempt();
        next
    }
}
