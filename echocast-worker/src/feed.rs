//! RSS feed writer
//!
//! Regenerates the podcast feed after every publish. Feed failure is
//! best-effort by contract: the episode is already on disk, so the runner
//! only logs a warning when this fails.

use std::path::PathBuf;

use anyhow::Context as _;
use echocast_core::domain::episode::Episode;

use crate::config::FeedConfig;

pub struct FeedWriter {
    config: FeedConfig,
    path: PathBuf,
}

impl FeedWriter {
    pub fn new(config: FeedConfig, path: PathBuf) -> Self {
        Self { config, path }
    }

    /// Renders and atomically writes the feed for the given episodes
    /// (expected newest-first).
    pub fn regenerate(&self, episodes: &[Episode]) -> anyhow::Result<()> {
        let xml = self.render(episodes);
        let tmp = self.path.with_extension("xml.tmp");
        std::fs::write(&tmp, xml.as_bytes())
            .with_context(|| format!("failed to write {}", tmp.display()))?;
        std::fs::rename(&tmp, &self.path)
            .with_context(|| format!("failed to move feed into place at {}", self.path.display()))?;
        Ok(())
    }

    /// Renders the RSS 2.0 document (with iTunes namespace tags).
    pub fn render(&self, episodes: &[Episode]) -> String {
        let mut xml = String::with_capacity(1024 + episodes.len() * 512);
        xml.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
        xml.push_str(
            "<rss version=\"2.0\" xmlns:itunes=\"http://www.itunes.com/dtds/podcast-1.0.dtd\">\n",
        );
        xml.push_str("  <channel>\n");
        push_tag(&mut xml, "title", &self.config.title);
        push_tag(&mut xml, "link", &self.config.base_url);
        push_tag(&mut xml, "description", &self.config.description);
        push_tag(&mut xml, "language", &self.config.language);
        push_tag(&mut xml, "itunes:author", &self.config.author);

        for episode in episodes {
            xml.push_str("    <item>\n");
            push_item_tag(&mut xml, "title", &episode.title);
            push_item_tag(&mut xml, "guid", &episode.id);
            push_item_tag(&mut xml, "link", &episode.source_url);
            push_item_tag(&mut xml, "pubDate", &episode.created_at.to_rfc2822());
            if let Some(duration) = episode.duration_seconds {
                push_item_tag(&mut xml, "itunes:duration", &format_duration(duration));
            }
            xml.push_str(&format!(
                "      <enclosure url=\"{}\" length=\"{}\" type=\"{}\"/>\n",
                escape_xml(&self.enclosure_url(episode)),
                episode.size_bytes,
                mime_type(&episode.audio_file),
            ));
            xml.push_str("    </item>\n");
        }

        xml.push_str("  </channel>\n</rss>\n");
        xml
    }

    fn enclosure_url(&self, episode: &Episode) -> String {
        format!(
            "{}/episodes/{}",
            self.config.base_url.trim_end_matches('/'),
            episode.audio_file
        )
    }
}

fn push_tag(xml: &mut String, tag: &str, value: &str) {
    xml.push_str(&format!("    <{tag}>{}</{tag}>\n", escape_xml(value)));
}

fn push_item_tag(xml: &mut String, tag: &str, value: &str) {
    xml.push_str(&format!("      <{tag}>{}</{tag}>\n", escape_xml(value)));
}

fn escape_xml(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

fn mime_type(file_name: &str) -> &'static str {
    match file_name.rsplit('.').next() {
        Some("mp3") => "audio/mpeg",
        Some("m4a") | Some("aac") => "audio/mp4",
        Some("ogg") | Some("opus") => "audio/ogg",
        Some("wav") => "audio/wav",
        _ => "application/octet-stream",
    }
}

fn format_duration(seconds: f64) -> String {
    let total = seconds.round() as u64;
    format!("{:02}:{:02}:{:02}", total / 3600, (total % 3600) / 60, total % 60)
}
