//! Job runner
//!
//! Drives exactly one job through the pipeline:
//!
//! ```text
//! fetching -> generating -> synthesizing -> publishing -> completed
//! ```
//!
//! Stage failures and timeouts are terminal for the job, never for the
//! process: the runner records the failure into the job record and returns
//! `Ok`. Only store errors (the runner cannot even report what happened)
//! bubble out. Cancellation is cooperative: the record is re-read at every
//! stage boundary and a requested cancel ends the job before the next
//! stage starts.

use std::time::Duration;

use chrono::Utc;
use echocast_core::domain::episode::Episode;
use echocast_core::domain::job::{JobRequest, JobStatus, JobUpdate};
use echocast_core::error::StageError;
use echocast_store::episodes::EpisodeStore;
use echocast_store::records::JobRecordStore;
use echocast_store::retention::RetentionPolicy;
use echocast_store::StoreError;
use tracing::{info, warn};

use crate::feed::FeedWriter;
use crate::providers::ProviderSet;

/// Per-stage wall-clock budgets.
#[derive(Debug, Clone, Copy)]
pub struct StageTimeouts {
    pub fetch: Duration,
    pub generate: Duration,
    pub synthesize: Duration,
}

pub struct JobRunner {
    records: JobRecordStore,
    episodes: EpisodeStore,
    providers: ProviderSet,
    retention: RetentionPolicy,
    feed: FeedWriter,
    timeouts: StageTimeouts,
}

impl JobRunner {
    pub fn new(
        records: JobRecordStore,
        episodes: EpisodeStore,
        providers: ProviderSet,
        retention: RetentionPolicy,
        feed: FeedWriter,
        timeouts: StageTimeouts,
    ) -> Self {
        Self {
            records,
            episodes,
            providers,
            retention,
            feed,
            timeouts,
        }
    }

    /// Runs one dequeued job to a terminal state.
    ///
    /// `Err` means the job record itself could not be read or written;
    /// everything else ends in `completed`, `failed`, or `cancelled`.
    pub async fn run(&self, request: JobRequest) -> Result<(), StoreError> {
        let id = request.id.clone();
        info!("Running job {} for {}", id, request.url);

        // A record normally exists from submission; an entry enqueued out
        // of band gets one now so status is observable either way.
        if self.records.get(&id)?.is_none() {
            self.records.create(&request)?;
        }

        if self.finish_if_cancelled(&id)? {
            return Ok(());
        }

        self.records
            .update(&id, JobUpdate::stage(JobStatus::Fetching, "Fetching content"))?;
        let fetched = match tokio::time::timeout(
            self.timeouts.fetch,
            self.providers.fetcher.fetch(&request.url),
        )
        .await
        {
            Ok(Ok(content)) => content,
            Ok(Err(e)) => return self.fail(&id, &e),
            Err(_) => {
                return self.fail(&id, &StageError::Fetch(timeout_message(self.timeouts.fetch)))
            }
        };
        info!(
            "Fetched \"{}\" ({} chars) for job {}",
            fetched.title,
            fetched.text.len(),
            id
        );

        if self.finish_if_cancelled(&id)? {
            return Ok(());
        }

        self.records
            .update(&id, JobUpdate::stage(JobStatus::Generating, "Generating script"))?;
        let script = match tokio::time::timeout(
            self.timeouts.generate,
            self.providers.generator.generate(&fetched.title, &fetched.text),
        )
        .await
        {
            Ok(Ok(script)) => script,
            Ok(Err(e)) => return self.fail(&id, &e),
            Err(_) => {
                return self.fail(
                    &id,
                    &StageError::Generation(timeout_message(self.timeouts.generate)),
                )
            }
        };

        if self.finish_if_cancelled(&id)? {
            return Ok(());
        }

        self.records.update(
            &id,
            JobUpdate::stage(JobStatus::Synthesizing, "Synthesizing audio"),
        )?;
        let audio = match tokio::time::timeout(
            self.timeouts.synthesize,
            self.providers.synthesizer.synthesize(&script),
        )
        .await
        {
            Ok(Ok(audio)) => audio,
            Ok(Err(e)) => return self.fail(&id, &e),
            Err(_) => {
                return self.fail(
                    &id,
                    &StageError::Synthesis(timeout_message(self.timeouts.synthesize)),
                )
            }
        };

        if self.finish_if_cancelled(&id)? {
            return Ok(());
        }

        self.records
            .update(&id, JobUpdate::stage(JobStatus::Publishing, "Publishing episode"))?;
        match self.publish(&request, &fetched.title, &script, &audio) {
            Ok(episode_id) => {
                self.records.update(&id, JobUpdate::completed(&episode_id))?;
                info!("Job {} published episode {}", id, episode_id);
                Ok(())
            }
            Err(e) => self.fail(&id, &e),
        }
    }

    /// Writes all episode artifacts and runs the post-publish housekeeping.
    /// Returns the new episode id.
    fn publish(
        &self,
        request: &JobRequest,
        title: &str,
        script: &str,
        audio: &crate::providers::SynthesizedAudio,
    ) -> Result<String, StageError> {
        let short_id: String = request.id.chars().take(8).collect();
        let episode_id = format!("{}_{}", Utc::now().format("%Y%m%d_%H%M%S"), short_id);

        let audio_path = self
            .episodes
            .save_audio(&episode_id, &audio.format, &audio.bytes)
            .map_err(|e| StageError::Publish(e.to_string()))?;

        // The script is a diagnostic artifact; losing it does not fail the
        // publish.
        if let Err(e) = self
            .episodes
            .save_script(&episode_id, title, &request.url, script)
        {
            warn!("Could not save script for episode {}: {}", episode_id, e);
        }

        let size_bytes = audio.bytes.len() as u64;
        let episode = Episode {
            id: episode_id.clone(),
            title: title.to_string(),
            source_url: request.url.clone(),
            audio_file: format!("{episode_id}.{}", audio.format),
            size_bytes,
            duration_seconds: Episode::estimate_duration(size_bytes, &audio.format),
            created_at: Utc::now(),
        };

        if let Err(e) = self.episodes.save_metadata(&episode) {
            // Without metadata the episode is invisible to listing and
            // retention; remove the orphaned audio and fail the publish.
            if let Err(rm) = std::fs::remove_file(&audio_path) {
                warn!(
                    "Could not remove orphaned audio {}: {}",
                    audio_path.display(),
                    rm
                );
            }
            return Err(StageError::Publish(e.to_string()));
        }

        match self.retention.enforce(&self.episodes) {
            Ok(evicted) if !evicted.is_empty() => {
                info!("Retention evicted {} episode(s)", evicted.len());
            }
            Ok(_) => {}
            Err(e) => warn!("Retention pass failed: {}", e),
        }

        // Feed regeneration is best effort; the next publish rewrites it.
        match self.episodes.list() {
            Ok(episodes) => {
                if let Err(e) = self.feed.regenerate(&episodes) {
                    warn!("Could not regenerate feed: {}", e);
                }
            }
            Err(e) => warn!("Could not list episodes for feed: {}", e),
        }

        Ok(episode_id)
    }

    /// Re-reads the record and, when cancellation was requested, moves the
    /// job to `cancelled`. Returns whether the job ended here.
    fn finish_if_cancelled(&self, id: &str) -> Result<bool, StoreError> {
        let requested = self
            .records
            .get(id)?
            .map(|record| record.cancel_requested)
            .unwrap_or(false);
        if requested {
            info!("Job {} cancelled by request", id);
            self.records.update(id, JobUpdate::cancelled())?;
        }
        Ok(requested)
    }

    /// Records a stage failure. Progress stays frozen at the checkpoint of
    /// the stage that failed.
    fn fail(&self, id: &str, error: &StageError) -> Result<(), StoreError> {
        warn!("Job {} failed: {}", id, error);
        self.records
            .update(id, JobUpdate::failed(format!("{}: {}", error.kind(), error)))?;
        Ok(())
    }
}

fn timeout_message(budget: Duration) -> String {
    format!("timed out after {}s", budget.as_secs())
}
