//! File-backed store
//!
//! All keys live in a single JSON object file:
//!
//! ```text
//! { "pendingEvents": "{\"events\":[...]}" }
//! ```
//!
//! The file is read once when the store is opened. Every write updates the
//! in-memory copy and replaces the file through [`atomic_write`].

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use tracing::{debug, warn};

use super::{PersistentStore, StoreResult};
use crate::utils::atomic::{atomic_write, cleanup_temp_file};

/// Key-value store persisted as one JSON file
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    values: Mutex<BTreeMap<String, String>>,
}

impl FileStore {
    /// Open the store at `path`
    ///
    /// A missing file is an empty store. An unreadable or corrupt file is
    /// logged and also treated as empty; it is replaced on the next write.
    pub fn open<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();

        if cleanup_temp_file(&path)? {
            debug!(path = %path.display(), "Removed stale store temp file");
        }

        let values = match fs::read_to_string(&path) {
            Ok(content) if content.trim().is_empty() => BTreeMap::new(),
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                warn!(path = %path.display(), error = %e, "Store file is corrupt, starting empty");
                BTreeMap::new()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Store file is unreadable, starting empty");
                BTreeMap::new()
            }
        };

        Ok(Self {
            path,
            values: Mutex::new(values),
        })
    }

    /// Get the store file path
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl PersistentStore for FileStore {
    fn get_string(&self, key: &str, default: &str) -> String {
        self.values
            .lock()
            .get(key)
            .cloned()
            .unwrap_or_else(|| default.to_string())
    }

    fn set_string(&self, key: &str, value: &str) -> StoreResult<()> {
        // Lock is held across the write so concurrent sets land in order
        let mut values = self.values.lock();
        values.insert(key.to_string(), value.to_string());
        let content = serde_json::to_string_pretty(&*values)?;
        atomic_write(&self.path, &content)?;
        Ok(())
    }
}
