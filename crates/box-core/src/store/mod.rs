//! # Key/Value Store
//!
//! In-memory map from queue path to `StoredObject`, optionally mirrored to
//! a `QueueArchive`. Archive failures are logged; the in-memory copy stays
//! authoritative.

mod archive;
mod list;
mod map;

pub use archive::{is_valid_queue_name, QueueArchive};
pub use list::SharedList;
pub use map::{djb2, SharedMap};

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid queue name: {0:?}")]
    InvalidQueueName(String),
    #[error("Corrupt archive file {path}: {reason}")]
    Corrupt { path: PathBuf, reason: String },
}

/// A stored message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl StoredObject {
    pub fn new<S: Into<String>, B: Into<Vec<u8>>>(content_type: S, bytes: B) -> Self {
        StoredObject {
            content_type: content_type.into(),
            bytes: bytes.into(),
        }
    }
}

pub struct Store {
    objects: SharedMap<StoredObject>,
    /// Queue paths in first-insertion order
    order: SharedList<String>,
    archive: Option<QueueArchive>,
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

impl Store {
    /// Memory-only store
    pub fn new() -> Self {
        Store {
            objects: SharedMap::new(),
            order: SharedList::new(),
            archive: None,
        }
    }

    /// Store backed by `archive`, preloaded with each queue's newest message
    pub fn with_archive(archive: QueueArchive) -> Result<Self, StoreError> {
        let loaded = archive.load_all()?;
        let store = Store {
            objects: SharedMap::new(),
            order: SharedList::new(),
            archive: Some(archive),
        };
        for (name, object) in loaded {
            store.insert_memory(&name, object);
        }
        if !store.is_empty() {
            log::info!("Loaded {} queue(s) from archive", store.len());
        }
        Ok(store)
    }

    fn insert_memory(&self, path: &str, object: StoredObject) {
        if !self.objects.set(path, object) {
            self.order.push(path.to_string());
        }
    }

    /// Store `bytes` under `path`, replacing any previous object
    pub fn put(&self, path: &str, content_type: &str, bytes: &[u8]) {
        self.insert_memory(path, StoredObject::new(content_type, bytes));

        if let Some(ref archive) = self.archive {
            if !is_valid_queue_name(path) {
                log::warn!("Queue '{}' is not a valid directory name; kept in memory only", path);
                return;
            }
            if let Err(e) = archive.save(path, content_type, bytes) {
                log::warn!("Failed to archive queue '{}': {}", path, e);
            }
        }
    }

    /// Run `f` on the stored object under the map lock
    pub fn get<R>(&self, path: &str, f: impl FnOnce(&StoredObject) -> R) -> Option<R> {
        self.objects.get(path, f)
    }

    pub fn get_cloned(&self, path: &str) -> Option<StoredObject> {
        self.objects.get_cloned(path)
    }

    /// Remove and return the object
    pub fn delete(&self, path: &str) -> Option<StoredObject> {
        let object = self.objects.remove(path)?;
        if let Some(index) = self.order.position(|p| p == path) {
            self.order.remove_at(index);
        }
        if let Some(ref archive) = self.archive {
            if is_valid_queue_name(path) {
                if let Err(e) = archive.delete_latest(path) {
                    log::warn!("Failed to drop archived pointer for '{}': {}", path, e);
                }
            }
        }
        Some(object)
    }

    /// Queue paths in first-insertion order
    pub fn paths(&self) -> Vec<String> {
        let mut out = Vec::with_capacity(self.order.len());
        self.order.for_each(|p| out.push(p.clone()));
        out
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Drop every object from memory; the archive is untouched
    pub fn clear(&self) {
        self.objects.clear();
        self.order.clear();
    }

    pub fn archive(&self) -> Option<&QueueArchive> {
        self.archive.as_ref()
    }
}
