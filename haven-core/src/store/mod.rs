//! Durable storage for the offline queue.
//!
//! The queue is persisted as a single JSON array of records under a fixed
//! key. Stores always replace the whole array; there is no append-only
//! format to recover from.

mod file;
mod memory;

use std::collections::HashSet;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::models::SyncItem;

pub use file::FileQueueStore;
pub use memory::MemoryQueueStore;

/// Well-known key the queue is stored under.
pub const QUEUE_STORAGE_KEY: &str = "offline_queue";

/// Errors that can occur while persisting the queue.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("I/O error for {}: {1}", .0.display())]
    Io(PathBuf, #[source] io::Error),

    #[error("Failed to serialize queue: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// A persistent, ordered list of pending sync items.
///
/// `load` never fails: a missing or unreadable store is an empty queue.
/// `save` overwrites everything previously stored.
pub trait QueueStore: Send + Sync {
    fn load(&self) -> Vec<SyncItem>;

    fn save(&self, items: &[SyncItem]) -> Result<(), StoreError>;
}

pub(crate) fn encode(items: &[SyncItem]) -> Result<Vec<u8>, StoreError> {
    Ok(serde_json::to_vec(items)?)
}

/// Decodes a stored queue, treating corruption as data loss.
pub(crate) fn decode(bytes: &[u8], origin: &str) -> Vec<SyncItem> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Vec::new();
    }

    let items: Vec<SyncItem> = match serde_json::from_slice(bytes) {
        Ok(items) => items,
        Err(e) => {
            tracing::warn!("Discarding unreadable offline queue in {}: {}", origin, e);
            return Vec::new();
        }
    };

    let mut seen = HashSet::new();
    let before = items.len();
    let items: Vec<SyncItem> = items
        .into_iter()
        .filter(|item| seen.insert(item.id.clone()))
        .collect();
    if items.len() != before {
        tracing::warn!(
            "Dropped {} duplicate item(s) from offline queue in {}",
            before - items.len(),
            origin
        );
    }

    items
}
