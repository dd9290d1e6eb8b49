//! Server configuration

use std::path::PathBuf;

/// Settings for the submission/status API.
#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: String,
    /// Root of all on-disk state, shared with the worker.
    pub data_dir: PathBuf,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            bind_addr: std::env::var("ECHOCAST_BIND_ADDR")
                .unwrap_or_else(|_| "0.0.0.0:8080".to_string()),
            data_dir: PathBuf::from(
                std::env::var("ECHOCAST_DATA_DIR").unwrap_or_else(|_| "data".to_string()),
            ),
        }
    }

    pub fn queue_dir(&self) -> PathBuf {
        self.data_dir.join("queue")
    }

    pub fn jobs_dir(&self) -> PathBuf {
        self.data_dir.join("jobs")
    }

    pub fn episodes_dir(&self) -> PathBuf {
        self.data_dir.join("episodes")
    }
}
