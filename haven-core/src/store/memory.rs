use std::sync::Mutex;

use super::{decode, encode, QueueStore, StoreError};
use crate::models::SyncItem;

/// In-memory queue store.
///
/// Keeps the encoded bytes rather than the items so that it behaves exactly
/// like the file store, including for corrupt contents.
#[derive(Debug, Default)]
pub struct MemoryQueueStore {
    bytes: Mutex<Option<Vec<u8>>>,
}

impl MemoryQueueStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store preloaded with raw stored contents.
    pub fn with_raw(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            bytes: Mutex::new(Some(bytes.into())),
        }
    }

    /// Returns the raw stored contents, if anything was ever stored.
    pub fn raw(&self) -> Option<Vec<u8>> {
        self.bytes
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

impl QueueStore for MemoryQueueStore {
    fn load(&self) -> Vec<SyncItem> {
        match self.raw() {
            Some(bytes) => decode(&bytes, "memory"),
            None => Vec::new(),
        }
    }

    fn save(&self, items: &[SyncItem]) -> Result<(), StoreError> {
        let bytes = encode(items)?;
        *self
            .bytes
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(bytes);
        Ok(())
    }
}
