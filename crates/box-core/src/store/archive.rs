//! # Queue Archive
//!
//! On-disk mirror of the store:
//!
//! ```text
//! queues/<name>/<id>.msg     payload
//! queues/<name>/<id>.type    content type
//! queues/<name>/latest.id    decimal id of the newest message
//! ```
//!
//! Every file is written to a temporary file in the same directory and
//! renamed into place.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use super::{StoreError, StoredObject};

const LATEST_FILE: &str = "latest.id";
const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Names that are safe as a single directory component
pub fn is_valid_queue_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\', '\0'])
}

#[derive(Debug, Clone)]
pub struct QueueArchive {
    root: PathBuf,
}

impl QueueArchive {
    /// Open (creating if needed) the archive at `root`
    pub fn open<P: Into<PathBuf>>(root: P) -> Result<Self, StoreError> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(QueueArchive { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn queue_dir(&self, name: &str) -> Result<PathBuf, StoreError> {
        if !is_valid_queue_name(name) {
            return Err(StoreError::InvalidQueueName(name.to_string()));
        }
        Ok(self.root.join(name))
    }

    /// Id of the newest message, if any
    pub fn latest_id(&self, name: &str) -> Result<Option<u64>, StoreError> {
        let path = self.queue_dir(name)?.join(LATEST_FILE);
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        text.trim()
            .parse::<u64>()
            .map(Some)
            .map_err(|_| StoreError::Corrupt {
                path,
                reason: "latest.id is not a number".to_string(),
            })
    }

    /// Persist a message and advance `latest.id`
    pub fn save(&self, name: &str, content_type: &str, bytes: &[u8]) -> Result<u64, StoreError> {
        let dir = self.queue_dir(name)?;
        fs::create_dir_all(&dir)?;

        let id = self.next_id(&dir)?;
        write_atomic(&dir, &format!("{}.msg", id), bytes)?;
        write_atomic(&dir, &format!("{}.type", id), content_type.as_bytes())?;
        write_atomic(&dir, LATEST_FILE, id.to_string().as_bytes())?;
        log::debug!("Archived {}/{} ({} bytes)", name, id, bytes.len());
        Ok(id)
    }

    /// Drop the `latest.id` pointer; message files stay
    pub fn delete_latest(&self, name: &str) -> Result<bool, StoreError> {
        let path = self.queue_dir(name)?.join(LATEST_FILE);
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Read the newest message of a queue
    pub fn load(&self, name: &str) -> Result<Option<StoredObject>, StoreError> {
        let id = match self.latest_id(name)? {
            Some(id) => id,
            None => return Ok(None),
        };
        let dir = self.queue_dir(name)?;
        let bytes = fs::read(dir.join(format!("{}.msg", id)))?;
        let content_type = match fs::read_to_string(dir.join(format!("{}.type", id))) {
            Ok(ct) => ct,
            Err(e) if e.kind() == io::ErrorKind::NotFound => DEFAULT_CONTENT_TYPE.to_string(),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(StoredObject::new(content_type, bytes)))
    }

    /// Newest message of every queue with a `latest.id`
    pub fn load_all(&self) -> Result<Vec<(String, StoredObject)>, StoreError> {
        let mut out = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let name = match entry.file_name().into_string() {
                Ok(name) if is_valid_queue_name(&name) => name,
                _ => continue,
            };
            match self.load(&name) {
                Ok(Some(object)) => out.push((name, object)),
                Ok(None) => {}
                Err(e) => log::warn!("Skipping queue '{}': {}", name, e),
            }
        }
        out.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(out)
    }

    fn next_id(&self, dir: &Path) -> Result<u64, StoreError> {
        let mut id = 1u64;
        for entry in fs::read_dir(dir)? {
            let name = entry?.file_name();
            let name = name.to_string_lossy();
            if let Some(n) = name.strip_suffix(".msg").and_then(|s| s.parse::<u64>().ok()) {
                id = id.max(n.saturating_add(1));
            }
        }
        Ok(id)
    }
}

fn write_atomic(dir: &Path, file_name: &str, bytes: &[u8]) -> Result<(), StoreError> {
    let mut tmp = tempfile::Builder::new()
        .prefix(".tmp-")
        .tempfile_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(dir.join(file_name))
        .map_err(|e| StoreError::Io(e.error))?;
    Ok(())
}
