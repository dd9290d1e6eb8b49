//! Cross-process worker lock
//!
//! At most one worker invocation may mutate shared state at a time, even
//! when an external scheduler launches several concurrently. Mutual
//! exclusion rests on atomically linking a fully written token file into
//! the well-known lock path: the JSON token (holder identity plus
//! acquisition time) is staged under a unique temp name and `hard_link`ed
//! into place, so the lock path either does not exist or holds a complete
//! token — no reader ever observes a half-written marker.
//!
//! This is polling/best-effort locking: `try_acquire` never blocks, because
//! the scheduler retries on its own interval. A token older than the
//! configured staleness threshold is presumed abandoned by a crashed holder
//! and is reclaimed. Reclaim first renames the marker aside (exactly one
//! racing reclaimer's rename succeeds) and deletes it only after
//! re-checking that the displaced token is the stale one that was observed;
//! a live token displaced by a lost race is linked back. An unreadable
//! marker counts as abandoned only once its mtime also exceeds the
//! threshold.

use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::StoreError;

/// Exclusive worker execution rights.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockToken {
    pub pid: u32,
    pub token: Uuid,
    pub acquired_at: DateTime<Utc>,
}

/// File-based mutual exclusion between independently scheduled worker
/// processes.
pub struct WorkerLock {
    path: PathBuf,
}

impl WorkerLock {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Attempts to acquire the lock without blocking.
    ///
    /// Returns `None` immediately when a valid, non-stale token is held by
    /// another process. An existing token older than `stale_after` (or an
    /// unreadable marker whose mtime is older than `stale_after`) is
    /// reclaimed; when two callers race on the reclaim, exactly one wins
    /// and the other backs off.
    pub fn try_acquire(&self, stale_after: Duration) -> Result<Option<LockToken>, StoreError> {
        // Two attempts: the second runs only after reclaiming a stale or
        // abandoned marker.
        for _ in 0..2 {
            let token = LockToken {
                pid: std::process::id(),
                token: Uuid::new_v4(),
                acquired_at: Utc::now(),
            };
            if self.link_token(&token)? {
                debug!("Acquired worker lock (pid {})", token.pid);
                return Ok(Some(token));
            }
            if !self.reclaim_if_stale(stale_after)? {
                return Ok(None);
            }
        }
        Ok(None)
    }

    /// Releases the lock, but only when the on-disk token still matches
    /// `token`. This prevents releasing a lock that a later process
    /// acquired after a stale reclaim.
    pub fn release(&self, token: &LockToken) -> Result<(), StoreError> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("Worker lock already gone on release");
                return Ok(());
            }
            Err(e) => return Err(StoreError::io(&self.path, e)),
        };

        match serde_json::from_slice::<LockToken>(&bytes) {
            Ok(current) if current.token == token.token => {
                fs::remove_file(&self.path).map_err(|e| StoreError::io(&self.path, e))?;
                debug!("Released worker lock (pid {})", token.pid);
            }
            Ok(current) => {
                warn!(
                    "Not releasing worker lock: held by pid {} with a different token",
                    current.pid
                );
            }
            Err(e) => {
                // Leave it for the next acquirer's staleness reclaim.
                warn!("Worker lock unreadable on release, leaving in place: {}", e);
            }
        }
        Ok(())
    }

    /// Stages the fully serialized token under a unique sibling name and
    /// links it into the lock path. Returns whether the link — and with it
    /// the acquisition — succeeded.
    fn link_token(&self, token: &LockToken) -> Result<bool, StoreError> {
        let staged = self.sibling("staged");
        let bytes = serde_json::to_vec_pretty(token)
            .map_err(|e| StoreError::corrupt(&self.path, e))?;
        fs::write(&staged, &bytes).map_err(|e| StoreError::io(&staged, e))?;

        let linked = fs::hard_link(&staged, &self.path);
        if let Err(e) = fs::remove_file(&staged) {
            warn!("Could not remove staged lock token {}: {}", staged.display(), e);
        }

        match linked {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(false),
            Err(e) => Err(StoreError::io(&self.path, e)),
        }
    }

    /// Removes the lock marker when it is stale or abandoned. Returns
    /// whether a reclaim happened (and another acquire attempt is worth
    /// making).
    fn reclaim_if_stale(&self, stale_after: Duration) -> Result<bool, StoreError> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            // Holder released between our link attempt and this read.
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(true),
            Err(e) => return Err(StoreError::io(&self.path, e)),
        };

        let observed = serde_json::from_slice::<LockToken>(&bytes);
        let stale = match &observed {
            Ok(current) => {
                let age = Utc::now().signed_duration_since(current.acquired_at);
                let stale = chrono::Duration::from_std(stale_after)
                    .map(|threshold| age > threshold)
                    .unwrap_or(false);
                if !stale {
                    debug!("Worker lock held by pid {}, backing off", current.pid);
                }
                stale
            }
            // A token mid-write is unreadable too; junk is reclaimed only
            // once the file itself is old enough.
            Err(_) => self.marker_older_than(stale_after)?,
        };
        if !stale {
            return Ok(false);
        }

        // Move the marker aside; exactly one racing reclaimer's rename
        // succeeds.
        let displaced = self.sibling("reclaim");
        match fs::rename(&self.path, &displaced) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(true),
            Err(e) => return Err(StoreError::io(&self.path, e)),
        }

        // Between the read and the rename the marker may have been
        // reclaimed and re-acquired by a racer; confirm what was displaced
        // is the token judged stale before destroying it.
        let displaced_token = fs::read(&displaced)
            .ok()
            .and_then(|bytes| serde_json::from_slice::<LockToken>(&bytes).ok());
        let matches_observation = match (&observed, &displaced_token) {
            (Ok(a), Some(b)) => a.token == b.token,
            (Err(_), None) => true,
            _ => false,
        };

        if matches_observation {
            match &observed {
                Ok(current) => info!(
                    "Reclaimed stale worker lock held by pid {} since {}",
                    current.pid, current.acquired_at
                ),
                Err(e) => info!("Reclaimed unreadable worker lock: {}", e),
            }
            if let Err(e) = fs::remove_file(&displaced) {
                warn!(
                    "Could not remove displaced lock marker {}: {}",
                    displaced.display(),
                    e
                );
            }
            Ok(true)
        } else {
            // A live token was displaced; put it back and back off.
            if let Err(e) = fs::hard_link(&displaced, &self.path) {
                if e.kind() != ErrorKind::AlreadyExists {
                    return Err(StoreError::io(&self.path, e));
                }
            }
            if let Err(e) = fs::remove_file(&displaced) {
                warn!(
                    "Could not remove displaced lock marker {}: {}",
                    displaced.display(),
                    e
                );
            }
            debug!("Lost reclaim race, backing off");
            Ok(false)
        }
    }

    /// Whether the marker file's mtime is older than `stale_after`.
    fn marker_older_than(&self, stale_after: Duration) -> Result<bool, StoreError> {
        let metadata = match fs::metadata(&self.path) {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(true),
            Err(e) => return Err(StoreError::io(&self.path, e)),
        };
        let modified = metadata
            .modified()
            .map_err(|e| StoreError::io(&self.path, e))?;
        Ok(modified
            .elapsed()
            .map(|age| age > stale_after)
            .unwrap_or(false))
    }

    fn sibling(&self, label: &str) -> PathBuf {
        let name = self
            .path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("worker.lock");
        self.path
            .with_file_name(format!(".{name}.{label}.{}", Uuid::new_v4().simple()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const STALE: Duration = Duration::from_secs(3600);

    #[test]
    fn test_second_acquire_fails_while_held() {
        let dir = tempfile::tempdir().unwrap();
        let lock = WorkerLock::new(dir.path().join("worker.lock"));

        let token = lock.try_acquire(STALE).unwrap().unwrap();
        assert!(lock.try_acquire(STALE).unwrap().is_none());

        lock.release(&token).unwrap();
        assert!(lock.try_acquire(STALE).unwrap().is_some());
    }

    #[test]
    fn test_lock_file_always_holds_a_complete_token() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("worker.lock");
        let lock = WorkerLock::new(&path);

        let token = lock.try_acquire(STALE).unwrap().unwrap();
        let on_disk: LockToken = serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();
        assert_eq!(on_disk.token, token.token);
        assert_eq!(on_disk.pid, std::process::id());
        lock.release(&token).unwrap();

        // No staged temp files are left behind.
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_stale_lock_is_reclaimed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("worker.lock");
        let lock = WorkerLock::new(&path);

        let abandoned = LockToken {
            pid: 1,
            token: Uuid::new_v4(),
            acquired_at: Utc::now() - chrono::Duration::hours(2),
        };
        fs::write(&path, serde_json::to_vec(&abandoned).unwrap()).unwrap();

        let token = lock.try_acquire(STALE).unwrap();
        assert!(token.is_some());
    }

    #[test]
    fn test_fresh_lock_is_not_reclaimed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("worker.lock");
        let lock = WorkerLock::new(&path);

        let holder = LockToken {
            pid: 1,
            token: Uuid::new_v4(),
            acquired_at: Utc::now(),
        };
        fs::write(&path, serde_json::to_vec(&holder).unwrap()).unwrap();

        assert!(lock.try_acquire(STALE).unwrap().is_none());
    }

    #[test]
    fn test_corrupt_lock_needs_old_mtime_to_be_reclaimed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("worker.lock");
        fs::write(&path, b"not json at all").unwrap();

        let lock = WorkerLock::new(&path);

        // Freshly written junk could be a token mid-write: hands off.
        assert!(lock.try_acquire(STALE).unwrap().is_none());

        // Once the file is older than the threshold it is reclaimed.
        std::thread::sleep(Duration::from_millis(50));
        assert!(lock.try_acquire(Duration::from_millis(10)).unwrap().is_some());
    }

    #[test]
    fn test_release_with_mismatched_token_leaves_lock() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("worker.lock");
        let lock = WorkerLock::new(&path);

        let old_token = lock.try_acquire(STALE).unwrap().unwrap();

        // Simulate a later process reclaiming and re-acquiring.
        let newer = LockToken {
            pid: 999,
            token: Uuid::new_v4(),
            acquired_at: Utc::now(),
        };
        fs::write(&path, serde_json::to_vec(&newer).unwrap()).unwrap();

        lock.release(&old_token).unwrap();
        assert!(path.exists(), "newer holder's lock must survive");
    }

    #[test]
    fn test_release_is_idempotent_when_lock_gone() {
        let dir = tempfile::tempdir().unwrap();
        let lock = WorkerLock::new(dir.path().join("worker.lock"));
        let token = lock.try_acquire(STALE).unwrap().unwrap();
        lock.release(&token).unwrap();
        lock.release(&token).unwrap();
    }

    #[test]
    fn test_racing_acquirers_never_hold_concurrently() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("worker.lock");
        let holders = Arc::new(AtomicUsize::new(0));

        let threads: Vec<_> = (0..3)
            .map(|_| {
                let path = path.clone();
                let holders = Arc::clone(&holders);
                std::thread::spawn(move || {
                    let lock = WorkerLock::new(&path);
                    let mut acquisitions = 0usize;
                    while acquisitions < 200 {
                        let Some(token) = lock.try_acquire(STALE).unwrap() else {
                            continue;
                        };
                        acquisitions += 1;

                        let concurrent = holders.fetch_add(1, Ordering::SeqCst) + 1;
                        assert_eq!(concurrent, 1, "two holders at once");

                        // The on-disk token must still be ours mid-hold: a
                        // racer must never mistake a live lock for junk.
                        let on_disk: LockToken =
                            serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();
                        assert_eq!(on_disk.token, token.token, "live lock was stolen");

                        holders.fetch_sub(1, Ordering::SeqCst);
                        lock.release(&token).unwrap();
                    }
                })
            })
            .collect();

        for thread in threads {
            thread.join().unwrap();
        }
    }

    #[test]
    fn test_stale_reclaim_has_exactly_one_winner() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("worker.lock");

        let abandoned = LockToken {
            pid: 1,
            token: Uuid::new_v4(),
            acquired_at: Utc::now() - chrono::Duration::hours(2),
        };
        fs::write(&path, serde_json::to_vec(&abandoned).unwrap()).unwrap();

        let threads: Vec<_> = (0..4)
            .map(|_| {
                let path = path.clone();
                std::thread::spawn(move || {
                    WorkerLock::new(&path).try_acquire(STALE).unwrap().is_some()
                })
            })
            .collect();

        let winners = threads
            .into_iter()
            .map(|t| t.join().unwrap())
            .filter(|&won| won)
            .count();
        assert_eq!(winners, 1);
    }
}
