//! Shared application state

use std::sync::Arc;

use echocast_store::episodes::EpisodeStore;
use echocast_store::queue::DurableQueue;
use echocast_store::records::JobRecordStore;
use echocast_store::StoreError;

use crate::config::Config;

/// Handles to the shared on-disk stores.
///
/// All stores are plain directory handles; cloning the state clones the
/// `Arc`s, not the directories.
#[derive(Clone)]
pub struct AppState {
    pub queue: Arc<DurableQueue>,
    pub records: Arc<JobRecordStore>,
    pub episodes: Arc<EpisodeStore>,
}

impl AppState {
    pub fn open(config: &Config) -> Result<Self, StoreError> {
        Ok(Self {
            queue: Arc::new(DurableQueue::open(config.queue_dir())?),
            records: Arc::new(JobRecordStore::open(config.jobs_dir())?),
            episodes: Arc::new(EpisodeStore::open(config.episodes_dir())?),
        })
    }
}
