use std::fs;
use std::io;
use std::path::PathBuf;

use super::{decode, encode, QueueStore, StoreError, QUEUE_STORAGE_KEY};
use crate::models::SyncItem;

/// Queue store backed by a JSON file in a data directory.
///
/// Writes go to a temporary sibling file which is then renamed over the
/// target, so readers only ever see a complete queue.
#[derive(Debug, Clone)]
pub struct FileQueueStore {
    data_dir: PathBuf,
    key: String,
}

impl FileQueueStore {
    /// Creates a store using the default queue key.
    pub fn new(data_dir: PathBuf) -> Self {
        Self::with_key(data_dir, QUEUE_STORAGE_KEY)
    }

    pub fn with_key(data_dir: PathBuf, key: impl Into<String>) -> Self {
        Self {
            data_dir,
            key: key.into(),
        }
    }

    /// Returns the full path of the queue file.
    pub fn path(&self) -> PathBuf {
        self.data_dir.join(format!("{}.json", self.key))
    }

    fn temp_path(&self) -> PathBuf {
        self.data_dir.join(format!("{}.json.tmp", self.key))
    }

    pub fn exists(&self) -> bool {
        self.path().exists()
    }
}

impl QueueStore for FileQueueStore {
    fn load(&self) -> Vec<SyncItem> {
        let path = self.path();

        match fs::read(&path) {
            Ok(bytes) => decode(&bytes, &path.display().to_string()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Vec::new(),
            Err(e) => {
                tracing::warn!("Failed to read offline queue {}: {}", path.display(), e);
                Vec::new()
            }
        }
    }

    fn save(&self, items: &[SyncItem]) -> Result<(), StoreError> {
        fs::create_dir_all(&self.data_dir)
            .map_err(|e| StoreError::Io(self.data_dir.clone(), e))?;

        let bytes = encode(items)?;
        let temp = self.temp_path();
        fs::write(&temp, bytes).map_err(|e| StoreError::Io(temp.clone(), e))?;

        let path = self.path();
        fs::rename(&temp, &path).map_err(|e| StoreError::Io(path, e))?;

        Ok(())
    }
}
