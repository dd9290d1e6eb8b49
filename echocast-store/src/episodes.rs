//! Episode store
//!
//! Retained output artifacts: per episode an audio file, the generated
//! script, and a JSON metadata document, all keyed by episode id in a
//! single directory. Audio writes go through the same temp-then-rename
//! path as everything else so a failed publish never leaves a partially
//! written artifact behind.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::Utc;
use echocast_core::domain::episode::Episode;
use tracing::warn;

use crate::atomic;
use crate::error::StoreError;

/// Disk-backed store of published episodes.
pub struct EpisodeStore {
    dir: PathBuf,
}

impl EpisodeStore {
    /// Opens (creating if needed) the episodes directory.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| StoreError::io(&dir, e))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Writes the audio artifact for an episode. Returns its path.
    pub fn save_audio(
        &self,
        episode_id: &str,
        format: &str,
        bytes: &[u8],
    ) -> Result<PathBuf, StoreError> {
        let path = self.dir.join(format!("{episode_id}.{format}"));
        atomic::write_bytes(&path, bytes)?;
        Ok(path)
    }

    /// Persists the generated script next to the audio, with a small
    /// provenance header.
    pub fn save_script(
        &self,
        episode_id: &str,
        title: &str,
        source_url: &str,
        script: &str,
    ) -> Result<PathBuf, StoreError> {
        let path = self.dir.join(format!("{episode_id}.txt"));
        let body = format!(
            "Title: {title}\nSource: {source_url}\nGenerated: {}\n\n{script}\n",
            Utc::now().to_rfc3339()
        );
        atomic::write_bytes(&path, body.as_bytes())?;
        Ok(path)
    }

    /// Persists an episode's metadata document.
    pub fn save_metadata(&self, episode: &Episode) -> Result<(), StoreError> {
        atomic::write_json(&self.dir.join(format!("{}.json", episode.id)), episode)
    }

    /// Loads one episode's metadata.
    pub fn get(&self, episode_id: &str) -> Result<Option<Episode>, StoreError> {
        let path = self.dir.join(format!("{episode_id}.json"));
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StoreError::io(&path, e)),
        };
        let episode =
            serde_json::from_slice(&bytes).map_err(|e| StoreError::corrupt(&path, e))?;
        Ok(Some(episode))
    }

    /// All episodes ordered by `created_at` descending (newest first).
    pub fn list(&self) -> Result<Vec<Episode>, StoreError> {
        let mut episodes = Vec::new();
        let read_dir = fs::read_dir(&self.dir).map_err(|e| StoreError::io(&self.dir, e))?;
        for entry in read_dir {
            let entry = entry.map_err(|e| StoreError::io(&self.dir, e))?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let bytes = fs::read(&path).map_err(|e| StoreError::io(&path, e))?;
            match serde_json::from_slice::<Episode>(&bytes) {
                Ok(episode) => episodes.push(episode),
                Err(e) => {
                    warn!(
                        "Skipping non-episode metadata {}: {}",
                        path.display(),
                        e
                    );
                }
            }
        }
        episodes.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(episodes)
    }

    /// Deletes an episode's audio, script, and metadata. Returns the bytes
    /// freed by removing the audio artifact.
    pub fn delete(&self, episode_id: &str) -> Result<u64, StoreError> {
        let mut freed = 0;

        if let Some(episode) = self.get(episode_id)? {
            let audio = self.dir.join(&episode.audio_file);
            match fs::remove_file(&audio) {
                Ok(()) => freed = episode.size_bytes,
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(StoreError::io(&audio, e)),
            }
        }

        for name in [format!("{episode_id}.txt"), format!("{episode_id}.json")] {
            let path = self.dir.join(name);
            match fs::remove_file(&path) {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(StoreError::io(&path, e)),
            }
        }

        Ok(freed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    pub(crate) fn episode(id: &str, size: u64, offset_secs: i64) -> Episode {
        Episode {
            id: id.to_string(),
            title: format!("Episode {id}"),
            source_url: "https://example.com".to_string(),
            audio_file: format!("{id}.mp3"),
            size_bytes: size,
            duration_seconds: Episode::estimate_duration(size, "mp3"),
            created_at: Utc::now() + chrono::Duration::seconds(offset_secs),
        }
    }

    #[test]
    fn test_save_and_get_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = EpisodeStore::open(dir.path()).unwrap();

        let audio = store.save_audio("ep1", "mp3", b"fake audio").unwrap();
        assert!(audio.exists());

        let mut meta = episode("ep1", 10, 0);
        meta.size_bytes = fs::metadata(&audio).unwrap().len();
        store.save_metadata(&meta).unwrap();

        let loaded = store.get("ep1").unwrap().unwrap();
        assert_eq!(loaded.title, "Episode ep1");
        assert_eq!(loaded.size_bytes, 10);
    }

    #[test]
    fn test_list_is_newest_first() {
        let dir = tempfile::tempdir().unwrap();
        let store = EpisodeStore::open(dir.path()).unwrap();

        store.save_metadata(&episode("old", 1, 0)).unwrap();
        store.save_metadata(&episode("mid", 1, 10)).unwrap();
        store.save_metadata(&episode("new", 1, 20)).unwrap();

        let ids: Vec<_> = store.list().unwrap().into_iter().map(|e| e.id).collect();
        assert_eq!(ids, vec!["new", "mid", "old"]);
    }

    #[test]
    fn test_delete_removes_all_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let store = EpisodeStore::open(dir.path()).unwrap();

        store.save_audio("ep1", "mp3", b"0123456789").unwrap();
        store
            .save_script("ep1", "Title", "https://example.com", "script body")
            .unwrap();
        let mut meta = episode("ep1", 10, 0);
        meta.audio_file = "ep1.mp3".to_string();
        store.save_metadata(&meta).unwrap();

        let freed = store.delete("ep1").unwrap();
        assert_eq!(freed, 10);
        assert!(!dir.path().join("ep1.mp3").exists());
        assert!(!dir.path().join("ep1.txt").exists());
        assert!(!dir.path().join("ep1.json").exists());
        assert!(store.get("ep1").unwrap().is_none());
    }

    #[test]
    fn test_script_has_provenance_header() {
        let dir = tempfile::tempdir().unwrap();
        let store = EpisodeStore::open(dir.path()).unwrap();

        let path = store
            .save_script("ep1", "My Title", "https://example.com/post", "Hello.")
            .unwrap();
        let body = fs::read_to_string(path).unwrap();
        assert!(body.starts_with("Title: My Title\n"));
        assert!(body.contains("Source: https://example.com/post"));
        assert!(body.ends_with("Hello.\n"));
    }
}
