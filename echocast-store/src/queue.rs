//! Durable job queue
//!
//! Append-only store of pending requests: one JSON file per entry, named so
//! that lexicographic order is submission order. A successful dequeue
//! removes the entry durably (single atomic unlink) before the request is
//! handed to the runner; if the process dies after that point the request
//! is lost, which is the documented limitation — the job record still
//! reflects the last written stage.

use std::fs;
use std::path::{Path, PathBuf};

use echocast_core::domain::job::JobRequest;
use tracing::warn;

use crate::atomic;
use crate::error::StoreError;

/// FIFO queue of pending [`JobRequest`]s backed by a directory of JSON
/// files.
pub struct DurableQueue {
    dir: PathBuf,
}

impl DurableQueue {
    /// Opens (creating if needed) the queue directory.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| StoreError::io(&dir, e))?;
        Ok(Self { dir })
    }

    /// Appends a request to the queue.
    ///
    /// On failure the caller must not assume the job was recorded.
    pub fn enqueue(&self, request: &JobRequest) -> Result<(), StoreError> {
        let path = self.entry_path(request);
        let bytes = serde_json::to_vec_pretty(request)
            .map_err(|e| StoreError::corrupt(&path, e))?;
        atomic::write_bytes(&path, &bytes).map_err(|e| match e {
            StoreError::Io { path, source } => StoreError::QueueWrite { path, source },
            other => other,
        })
    }

    /// Removes and returns the oldest pending request, or `None` when the
    /// queue is empty.
    ///
    /// The entry is unlinked before the request is returned, so the same
    /// request can never be yielded twice. Unreadable entries are renamed
    /// aside and skipped rather than blocking the queue head forever.
    pub fn dequeue_one(&self) -> Result<Option<JobRequest>, StoreError> {
        for path in self.entries()? {
            let bytes = match fs::read(&path) {
                Ok(bytes) => bytes,
                Err(e) => return Err(StoreError::io(&path, e)),
            };

            match serde_json::from_slice::<JobRequest>(&bytes) {
                Ok(request) => {
                    fs::remove_file(&path).map_err(|e| StoreError::io(&path, e))?;
                    return Ok(Some(request));
                }
                Err(e) => {
                    warn!("Discarding unreadable queue entry {}: {}", path.display(), e);
                    self.discard(&path)?;
                }
            }
        }
        Ok(None)
    }

    /// Number of pending entries.
    pub fn len(&self) -> Result<usize, StoreError> {
        Ok(self.entries()?.len())
    }

    pub fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.entries()?.is_empty())
    }

    /// Pending entry paths in FIFO order.
    fn entries(&self) -> Result<Vec<PathBuf>, StoreError> {
        let mut paths = Vec::new();
        let read_dir = fs::read_dir(&self.dir).map_err(|e| StoreError::io(&self.dir, e))?;
        for entry in read_dir {
            let entry = entry.map_err(|e| StoreError::io(&self.dir, e))?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some("json") {
                paths.push(path);
            }
        }
        paths.sort();
        Ok(paths)
    }

    fn entry_path(&self, request: &JobRequest) -> PathBuf {
        // Timestamp prefix (nanosecond precision) makes lexicographic order
        // match submission order; the id breaks same-instant ties.
        let stamp = request.submitted_at.format("%Y%m%d%H%M%S%9f");
        self.dir.join(format!("{stamp}_{}.json", request.id))
    }

    fn discard(&self, path: &Path) -> Result<(), StoreError> {
        let mut discarded = path.as_os_str().to_owned();
        discarded.push(".corrupt");
        fs::rename(path, &discarded).map_err(|e| StoreError::io(path, e))
    }
}
