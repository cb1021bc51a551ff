//! Serialized access to the persisted queue.
//!
//! Every read-modify-write of the store goes through [`QueueState`] while
//! holding its lock, so an enqueue can never interleave with a drain's
//! commit in the same process. Across processes the persisted queue is the
//! only shared state: a drain writes back only the items that are still in
//! the store when it commits.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::models::SyncItem;
use crate::store::{QueueStore, StoreError};

pub(crate) struct QueueState {
    store: Arc<dyn QueueStore>,
    lock: Mutex<()>,
}

impl QueueState {
    pub fn new(store: Arc<dyn QueueStore>) -> Self {
        Self {
            store,
            lock: Mutex::new(()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ()> {
        self.lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn load(&self) -> Vec<SyncItem> {
        let _guard = self.lock();
        self.store.load()
    }

    pub fn append(&self, item: SyncItem) -> Result<(), StoreError> {
        let _guard = self.lock();
        let mut items = self.store.load();
        items.push(item);
        self.store.save(&items)
    }

    pub fn clear(&self) -> Result<(), StoreError> {
        let _guard = self.lock();
        self.store.save(&[])
    }

    /// Replaces the snapshot's items with `residual`.
    ///
    /// Items appended after the snapshot was taken are kept, after the
    /// residual items. Snapshot items that are no longer in the store were
    /// removed by someone else (a clear, possibly from another process
    /// sharing the store) and are not written back. Returns `false` when
    /// that happened for any snapshot item.
    pub fn commit(
        &self,
        snapshot_ids: &HashSet<String>,
        residual: Vec<SyncItem>,
    ) -> Result<bool, StoreError> {
        let _guard = self.lock();
        let current = self.store.load();
        let still_queued: HashSet<&str> = current.iter().map(|item| item.id.as_str()).collect();
        let intact = snapshot_ids
            .iter()
            .all(|id| still_queued.contains(id.as_str()));

        let mut items: Vec<SyncItem> = residual
            .into_iter()
            .filter(|item| still_queued.contains(item.id.as_str()))
            .collect();
        items.extend(
            current
                .iter()
                .filter(|item| !snapshot_ids.contains(&item.id))
                .cloned(),
        );
        self.store.save(&items)?;
        Ok(intact)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SyncKind;
    use crate::store::{FileQueueStore, MemoryQueueStore};
    use serde_json::json;
    use tempfile::TempDir;

    fn item(text: &str) -> SyncItem {
        SyncItem::new(SyncKind::Message, json!({ "text": text }))
    }

    fn ids(items: &[SyncItem]) -> HashSet<String> {
        items.iter().map(|i| i.id.clone()).collect()
    }

    #[test]
    fn test_append_preserves_order() {
        let state = QueueState::new(Arc::new(MemoryQueueStore::new()));
        let a = item("a");
        let b = item("b");
        state.append(a.clone()).unwrap();
        state.append(b.clone()).unwrap();
        assert_eq!(state.load(), vec![a, b]);
    }

    #[test]
    fn test_commit_keeps_items_appended_after_snapshot() {
        let state = QueueState::new(Arc::new(MemoryQueueStore::new()));
        let a = item("a");
        let b = item("b");
        state.append(a.clone()).unwrap();
        state.append(b.clone()).unwrap();

        let snapshot = state.load();
        let late = item("late");
        state.append(late.clone()).unwrap();

        let residual = vec![b.retried()];
        assert!(state.commit(&ids(&snapshot), residual).unwrap());

        let items = state.load();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].id, b.id);
        assert_eq!(items[0].retry_count, 1);
        assert_eq!(items[1], late);
    }

    #[test]
    fn test_commit_after_clear_is_discarded() {
        let state = QueueState::new(Arc::new(MemoryQueueStore::new()));
        let a = item("a");
        state.append(a.clone()).unwrap();

        let snapshot = state.load();
        state.clear().unwrap();

        let committed = state.commit(&ids(&snapshot), vec![a.retried()]).unwrap();
        assert!(!committed);
        assert!(state.load().is_empty());
    }

    #[test]
    fn test_commit_after_clear_keeps_newer_items() {
        let state = QueueState::new(Arc::new(MemoryQueueStore::new()));
        let a = item("a");
        state.append(a.clone()).unwrap();

        let snapshot = state.load();
        state.clear().unwrap();
        let fresh = item("fresh");
        state.append(fresh.clone()).unwrap();

        assert!(!state.commit(&ids(&snapshot), vec![a.retried()]).unwrap());
        assert_eq!(state.load(), vec![fresh]);
    }

    #[test]
    fn test_clear_from_another_handle_is_respected() {
        let temp = TempDir::new().unwrap();
        let first = QueueState::new(Arc::new(FileQueueStore::new(temp.path().to_path_buf())));
        let second = QueueState::new(Arc::new(FileQueueStore::new(temp.path().to_path_buf())));

        let a = item("a");
        first.append(a.clone()).unwrap();
        let snapshot = first.load();

        second.clear().unwrap();

        assert!(!first.commit(&ids(&snapshot), vec![a.retried()]).unwrap());
        assert!(first.load().is_empty());
        assert!(second.load().is_empty());
    }
}
