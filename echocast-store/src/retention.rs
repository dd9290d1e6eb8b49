//! Retention manager
//!
//! Bounds retained episodes by count and by cumulative disk footprint,
//! evicting oldest-first. Runs after every successful publish; idempotent
//! and safe with zero or one episodes. Retention only ever sees episodes
//! whose jobs already reached `completed`, so nothing in-flight can be
//! evicted.

use tracing::{info, warn};

use crate::episodes::EpisodeStore;
use crate::error::StoreError;

/// Eviction bounds for retained episodes.
#[derive(Debug, Clone, Copy)]
pub struct RetentionPolicy {
    /// Maximum number of retained episodes.
    pub max_count: usize,
    /// Maximum cumulative size of retained audio artifacts.
    pub max_total_bytes: u64,
}

impl RetentionPolicy {
    /// Evicts oldest episodes until both bounds hold. Returns the evicted
    /// episode ids, oldest first.
    pub fn enforce(&self, store: &EpisodeStore) -> Result<Vec<String>, StoreError> {
        let mut episodes = store.list()?;
        episodes.reverse(); // oldest first

        let mut total_bytes: u64 = episodes.iter().map(|e| e.size_bytes).sum();
        let mut evicted = Vec::new();

        while !episodes.is_empty()
            && (episodes.len() > self.max_count || total_bytes > self.max_total_bytes)
        {
            let oldest = episodes.remove(0);
            match store.delete(&oldest.id) {
                Ok(freed) => {
                    total_bytes = total_bytes.saturating_sub(oldest.size_bytes.max(freed));
                    info!(
                        "Evicted episode {} ({} bytes) for retention",
                        oldest.id, oldest.size_bytes
                    );
                    evicted.push(oldest.id);
                }
                Err(e) => {
                    // Stop rather than spin on an undeletable artifact.
                    warn!("Retention could not evict episode {}: {}", oldest.id, e);
                    break;
                }
            }
        }

        Ok(evicted)
    }
}
