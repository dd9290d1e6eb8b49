//! Job record store
//!
//! One JSON document per job id, written atomically, so concurrent readers
//! never observe a half-written record and a crash while writing one record
//! cannot corrupt another's. Exclusivity is per-record: the server reading
//! job A never contends with the worker writing job B.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::Utc;
use echocast_core::domain::job::{JobRecord, JobRequest, JobUpdate};
use tracing::{debug, warn};

use crate::atomic;
use crate::error::StoreError;

/// Per-job status documents keyed by job id.
pub struct JobRecordStore {
    dir: PathBuf,
}

impl JobRecordStore {
    /// Opens (creating if needed) the records directory.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| StoreError::io(&dir, e))?;
        Ok(Self { dir })
    }

    /// Creates the initial `queued` record for a request.
    pub fn create(&self, request: &JobRequest) -> Result<JobRecord, StoreError> {
        let record = JobRecord::queued(request);
        atomic::write_json(&self.record_path(&record.id)?, &record)?;
        Ok(record)
    }

    /// Loads a record, or `None` when no job with this id exists.
    pub fn get(&self, id: &str) -> Result<Option<JobRecord>, StoreError> {
        let path = self.record_path(id)?;
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StoreError::io(&path, e)),
        };
        let record =
            serde_json::from_slice(&bytes).map_err(|e| StoreError::corrupt(&path, e))?;
        Ok(Some(record))
    }

    /// Merges `update` into the record and persists it.
    ///
    /// Terminal records are left untouched (the merge is a no-op); progress
    /// never decreases. Returns the record as stored after the call.
    pub fn update(&self, id: &str, update: JobUpdate) -> Result<JobRecord, StoreError> {
        let mut record = self
            .get(id)?
            .ok_or_else(|| StoreError::RecordNotFound(id.to_string()))?;

        if !record.apply(update) {
            debug!("Ignoring update to terminal job {} ({})", id, record.status);
            return Ok(record);
        }

        atomic::write_json(&self.record_path(id)?, &record)?;
        Ok(record)
    }

    /// Flags the job for cooperative cancellation.
    ///
    /// Returns whether the request was accepted; `false` when the job is
    /// already terminal. Only the worker transitions the status itself.
    pub fn request_cancel(&self, id: &str) -> Result<bool, StoreError> {
        let mut record = self
            .get(id)?
            .ok_or_else(|| StoreError::RecordNotFound(id.to_string()))?;

        if record.status.is_terminal() {
            return Ok(false);
        }

        record.cancel_requested = true;
        record.updated_at = Utc::now();
        atomic::write_json(&self.record_path(id)?, &record)?;
        Ok(true)
    }

    /// Records ordered by `created_at` descending.
    pub fn list(&self, limit: usize, offset: usize) -> Result<Vec<JobRecord>, StoreError> {
        let mut records = Vec::new();
        let read_dir = fs::read_dir(&self.dir).map_err(|e| StoreError::io(&self.dir, e))?;
        for entry in read_dir {
            let entry = entry.map_err(|e| StoreError::io(&self.dir, e))?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match read_record(&path) {
                Ok(record) => records.push(record),
                Err(e) => warn!("Skipping unreadable job record {}: {}", path.display(), e),
            }
        }

        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(records.into_iter().skip(offset).take(limit).collect())
    }

    fn record_path(&self, id: &str) -> Result<PathBuf, StoreError> {
        // Ids are generated internally but arrive back through URL paths;
        // anything that could escape the directory is treated as unknown.
        if id.is_empty()
            || !id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(StoreError::RecordNotFound(id.to_string()));
        }
        Ok(self.dir.join(format!("{id}.json")))
    }
}

fn read_record(path: &Path) -> Result<JobRecord, StoreError> {
    let bytes = fs::read(path).map_err(|e| StoreError::io(path, e))?;
    serde_json::from_slice(&bytes).map_err(|e| StoreError::corrupt(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use echocast_core::domain::job::JobStatus;

    fn store() -> (tempfile::TempDir, JobRecordStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = JobRecordStore::open(dir.path()).unwrap();
        (dir, store)
    }

    fn submit(store: &JobRecordStore, url: &str) -> JobRecord {
        store
            .create(&JobRequest::new(url.to_string(), None, None))
            .unwrap()
    }

    #[test]
    fn test_create_then_get() {
        let (_dir, store) = store();
        let record = submit(&store, "https://example.com/a");

        let loaded = store.get(&record.id).unwrap().unwrap();
        assert_eq!(loaded.status, JobStatus::Queued);
        assert_eq!(loaded.progress, 0);
        assert_eq!(loaded.url, "https://example.com/a");
    }

    #[test]
    fn test_get_unknown_returns_none() {
        let (_dir, store) = store();
        assert!(store.get("deadbeef").unwrap().is_none());
    }

    #[test]
    fn test_update_unknown_is_error() {
        let (_dir, store) = store();
        let err = store.update("deadbeef", JobUpdate::default()).unwrap_err();
        assert!(matches!(err, StoreError::RecordNotFound(_)));
    }

    #[test]
    fn test_progress_never_decreases_across_updates() {
        let (_dir, store) = store();
        let record = submit(&store, "https://example.com/a");

        store
            .update(&record.id, JobUpdate::stage(JobStatus::Generating, "gen"))
            .unwrap();
        let after = store
            .update(
                &record.id,
                JobUpdate {
                    progress: Some(20),
                    ..JobUpdate::default()
                },
            )
            .unwrap();
        assert_eq!(after.progress, 50);
    }

    #[test]
    fn test_terminal_record_is_immutable() {
        let (_dir, store) = store();
        let record = submit(&store, "https://example.com/a");
        store.update(&record.id, JobUpdate::completed("ep1")).unwrap();

        let after = store
            .update(&record.id, JobUpdate::stage(JobStatus::Fetching, "again"))
            .unwrap();
        assert_eq!(after.status, JobStatus::Completed);
        assert_eq!(after.result_episode_id.as_deref(), Some("ep1"));

        // And the stored document matches.
        let stored = store.get(&record.id).unwrap().unwrap();
        assert_eq!(stored.status, JobStatus::Completed);
    }

    #[test]
    fn test_cancel_is_accepted_while_live() {
        let (_dir, store) = store();
        let record = submit(&store, "https://example.com/a");

        assert!(store.request_cancel(&record.id).unwrap());
        assert!(store.get(&record.id).unwrap().unwrap().cancel_requested);
    }

    #[test]
    fn test_cancel_on_terminal_job_is_rejected() {
        let (_dir, store) = store();
        let record = submit(&store, "https://example.com/a");
        store.update(&record.id, JobUpdate::failed("boom")).unwrap();

        assert!(!store.request_cancel(&record.id).unwrap());
        assert!(!store.get(&record.id).unwrap().unwrap().cancel_requested);
    }

    #[test]
    fn test_list_is_newest_first_with_pagination() {
        let (_dir, store) = store();
        for i in 0..5 {
            let mut request =
                JobRequest::new(format!("https://example.com/{i}"), None, None);
            request.submitted_at = Utc::now() + chrono::Duration::milliseconds(i);
            store.create(&request).unwrap();
        }

        let page = store.list(2, 0).unwrap();
        assert_eq!(page.len(), 2);
        assert_eq!(page[0].url, "https://example.com/4");
        assert_eq!(page[1].url, "https://example.com/3");

        let next = store.list(2, 2).unwrap();
        assert_eq!(next[0].url, "https://example.com/2");
    }

    #[test]
    fn test_path_traversal_ids_are_rejected() {
        let (_dir, store) = store();
        assert!(store.get("../etc/passwd").is_err());
        let err = store.update("../x", JobUpdate::default()).unwrap_err();
        assert!(matches!(err, StoreError::RecordNotFound(_)));
    }
}
