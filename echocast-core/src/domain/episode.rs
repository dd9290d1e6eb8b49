//! Episode domain types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A completed, publishable audio artifact.
///
/// An episode exists iff some job reached `completed` with this id as its
/// `result_episode_id`. Episodes are ordered by `created_at` for retention.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Episode {
    pub id: String,
    pub title: String,
    pub source_url: String,
    /// Audio file name relative to the episodes directory.
    pub audio_file: String,
    pub size_bytes: u64,
    /// Best-effort estimate; `None` when it could not be determined.
    pub duration_seconds: Option<f64>,
    pub created_at: DateTime<Utc>,
}

impl Episode {
    /// Estimates playback duration from file size and a nominal bitrate for
    /// the given audio format. Best-effort only.
    pub fn estimate_duration(size_bytes: u64, format: &str) -> Option<f64> {
        // Nominal encoded bitrates in kbit/s for the formats the TTS
        // providers emit.
        let kbps = match format {
            "mp3" => 128.0,
            "m4a" | "aac" => 96.0,
            "opus" | "ogg" => 64.0,
            "wav" => 1411.0,
            _ => return None,
        };
        Some(size_bytes as f64 * 8.0 / (kbps * 1000.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_estimate_duration_known_formats() {
        // 1 minute of 128 kbps mp3 is 960_000 bytes.
        let d = Episode::estimate_duration(960_000, "mp3").unwrap();
        assert!((d - 60.0).abs() < 0.01);

        assert!(Episode::estimate_duration(1_000_000, "m4a").is_some());
        assert!(Episode::estimate_duration(1_000_000, "opus").is_some());
    }

    #[test]
    fn test_estimate_duration_unknown_format() {
        assert!(Episode::estimate_duration(1_000_000, "flac").is_none());
    }
}
