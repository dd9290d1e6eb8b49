//! EchoCast Worker
//!
//! A single-shot worker invocation: acquire the cross-process lock, dequeue
//! at most one pending job, run it through the pipeline to a terminal state,
//! release the lock, exit. An external scheduler (cron, systemd timer) is
//! expected to invoke it on an interval; overlapping invocations coordinate
//! through the lock and simply exit when another holder is active.

mod config;
mod feed;
mod providers;
mod runner;

use anyhow::{Context, Result};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use echocast_core::domain::job::JobUpdate;
use echocast_store::episodes::EpisodeStore;
use echocast_store::lock::WorkerLock;
use echocast_store::queue::DurableQueue;
use echocast_store::records::JobRecordStore;
use echocast_store::retention::RetentionPolicy;

use crate::config::Config;
use crate::feed::FeedWriter;
use crate::providers::build_providers;
use crate::runner::{JobRunner, StageTimeouts};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "echocast_worker=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting EchoCast worker");

    let config = Config::from_env().context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;

    let queue = DurableQueue::open(config.queue_dir()).context("Failed to open job queue")?;
    let records =
        JobRecordStore::open(config.jobs_dir()).context("Failed to open job record store")?;
    let episodes =
        EpisodeStore::open(config.episodes_dir()).context("Failed to open episode store")?;

    let lock = WorkerLock::new(config.lock_path());
    let token = match lock.try_acquire(config.lock_stale_after)? {
        Some(token) => token,
        None => {
            info!("Another worker holds the lock, exiting");
            return Ok(());
        }
    };

    // From here on the lock must be released on every path.
    let outcome = run_one(&config, queue, records, episodes).await;

    if let Err(e) = lock.release(&token) {
        warn!("Failed to release worker lock: {}", e);
    }

    outcome
}

/// Dequeues and runs at most one job.
async fn run_one(
    config: &Config,
    queue: DurableQueue,
    records: JobRecordStore,
    episodes: EpisodeStore,
) -> Result<()> {
    let request = match queue.dequeue_one().context("Failed to read job queue")? {
        Some(request) => request,
        None => {
            info!("Queue is empty, nothing to do");
            return Ok(());
        }
    };

    // Per-job model overrides apply to this invocation only.
    let mut config = config.clone();
    if let Some(model) = &request.llm_model {
        config.llm.model = model.clone();
    }
    if let Some(model) = &request.tts_model {
        config.tts.model = model.clone();
    }

    // The queue entry is already consumed; a provider misconfiguration
    // must still leave the job in an observable terminal state.
    let providers = match build_providers(&config) {
        Ok(providers) => providers,
        Err(e) => {
            if records.get(&request.id)?.is_none() {
                records.create(&request)?;
            }
            records.update(
                &request.id,
                JobUpdate::failed(format!("ConfigError: {e:#}")),
            )?;
            return Err(e).context("Failed to build providers");
        }
    };
    let retention = RetentionPolicy {
        max_count: config.keep_last_episodes,
        max_total_bytes: config.max_disk_bytes,
    };
    let feed = FeedWriter::new(
        config.feed.clone(),
        config.episodes_dir().join("feed.xml"),
    );

    let runner = JobRunner::new(
        records,
        episodes,
        providers,
        retention,
        feed,
        StageTimeouts {
            fetch: config.fetch_timeout,
            generate: config.generate_timeout,
            synthesize: config.synthesize_timeout,
        },
    );

    let id = request.id.clone();
    runner
        .run(request)
        .await
        .with_context(|| format!("Failed to persist state for job {id}"))?;

    info!("Worker invocation finished");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use echocast_core::domain::job::{JobRequest, JobStatus};

    fn test_config(data_dir: &std::path::Path) -> Config {
        let mut config = Config::default();
        config.data_dir = data_dir.to_path_buf();
        config.llm.api_key = "llm-key".to_string();
        config.tts.api_key = "tts-key".to_string();
        config
    }

    #[tokio::test]
    async fn test_unknown_provider_marks_dequeued_job_failed() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = test_config(dir.path());
        config.llm.provider = "volcengine".to_string();

        let queue = DurableQueue::open(config.queue_dir()).unwrap();
        let records = JobRecordStore::open(config.jobs_dir()).unwrap();
        let episodes = EpisodeStore::open(config.episodes_dir()).unwrap();

        let request = JobRequest::new("https://example.com/a".to_string(), None, None);
        records.create(&request).unwrap();
        queue.enqueue(&request).unwrap();

        let result = run_one(&config, queue, records, episodes).await;
        assert!(result.is_err());

        // The consumed entry still ends in an observable terminal state.
        let records = JobRecordStore::open(config.jobs_dir()).unwrap();
        let record = records.get(&request.id).unwrap().unwrap();
        assert_eq!(record.status, JobStatus::Failed);
        let error = record.error.unwrap();
        assert!(error.starts_with("ConfigError:"), "{error}");
        assert!(DurableQueue::open(config.queue_dir()).unwrap().is_empty().unwrap());
    }

    #[tokio::test]
    async fn test_unknown_provider_registers_out_of_band_entry() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = test_config(dir.path());
        config.tts.provider = "edge-tts".to_string();

        let queue = DurableQueue::open(config.queue_dir()).unwrap();
        let records = JobRecordStore::open(config.jobs_dir()).unwrap();
        let episodes = EpisodeStore::open(config.episodes_dir()).unwrap();

        // Enqueued directly, no record created by a submitter.
        let request = JobRequest::new("https://example.com/b".to_string(), None, None);
        queue.enqueue(&request).unwrap();

        assert!(run_one(&config, queue, records, episodes).await.is_err());

        let records = JobRecordStore::open(config.jobs_dir()).unwrap();
        let record = records.get(&request.id).unwrap().unwrap();
        assert_eq!(record.status, JobStatus::Failed);
    }
}
