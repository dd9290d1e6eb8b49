//! Pipeline collaborators
//!
//! The runner consumes content fetch, script generation, and speech
//! synthesis through these narrow capability traits. Concrete providers
//! are selected once at startup from configuration — a closed registry,
//! so no string dispatch leaks into the runner.

pub mod fetcher;
pub mod llm;
pub mod tts;

use std::sync::Arc;

use anyhow::Context as _;
use async_trait::async_trait;
use echocast_core::error::StageError;

use crate::config::Config;
use fetcher::HtmlContentFetcher;
use llm::OpenAiScriptGenerator;
use tts::OpenAiSpeechSynthesizer;

/// Result of fetching a URL.
#[derive(Debug, Clone)]
pub struct FetchedContent {
    pub title: String,
    pub text: String,
}

/// Result of synthesizing a script.
#[derive(Debug, Clone)]
pub struct SynthesizedAudio {
    pub bytes: Vec<u8>,
    /// Audio format (file extension), e.g. "mp3".
    pub format: String,
}

/// Extracts readable article text from a URL.
#[async_trait]
pub trait ContentFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<FetchedContent, StageError>;
}

/// Turns article text into a spoken-word script.
#[async_trait]
pub trait ScriptGenerator: Send + Sync {
    async fn generate(&self, title: &str, text: &str) -> Result<String, StageError>;
}

/// Turns a script into audio bytes.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    async fn synthesize(&self, script: &str) -> Result<SynthesizedAudio, StageError>;
}

/// The collaborators a job runner needs, selected at startup.
pub struct ProviderSet {
    pub fetcher: Arc<dyn ContentFetcher>,
    pub generator: Arc<dyn ScriptGenerator>,
    pub synthesizer: Arc<dyn SpeechSynthesizer>,
}

/// Builds the provider set from configuration.
///
/// Unknown provider names are a startup error, not a per-job one.
pub fn build_providers(config: &Config) -> anyhow::Result<ProviderSet> {
    let fetcher = Arc::new(
        HtmlContentFetcher::new(config.fetch_timeout)
            .context("Failed to build content fetcher")?,
    );

    let generator: Arc<dyn ScriptGenerator> = match config.llm.provider.as_str() {
        "openai" | "openai-compatible" => Arc::new(
            OpenAiScriptGenerator::new(config.llm.clone(), config.generate_timeout)
                .context("Failed to build script generator")?,
        ),
        other => anyhow::bail!("unknown LLM provider: {other}"),
    };

    let synthesizer: Arc<dyn SpeechSynthesizer> = match config.tts.provider.as_str() {
        "openai" | "openai-compatible" => Arc::new(
            OpenAiSpeechSynthesizer::new(config.tts.clone(), config.synthesize_timeout)
                .context("Failed to build speech synthesizer")?,
        ),
        other => anyhow::bail!("unknown TTS provider: {other}"),
    };

    Ok(ProviderSet {
        fetcher,
        generator,
        synthesizer,
    })
}

/// Truncates `text` to at most `max_chars` characters, on a char boundary.
/// Marking the cut (ellipsis etc.) is the caller's business.
pub(crate) fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => &text[..byte_idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_chars_respects_boundaries() {
        assert_eq!(truncate_chars("日本語のテキスト", 4), "日本語の");
        assert_eq!(truncate_chars("short", 100), "short");
        assert_eq!(truncate_chars("", 0), "");
    }

    #[test]
    fn test_registry_rejects_unknown_providers() {
        let mut config = Config::default();
        config.llm.provider = "volcengine".to_string();
        assert!(build_providers(&config).is_err());

        let mut config = Config::default();
        config.tts.provider = "edge-tts".to_string();
        assert!(build_providers(&config).is_err());
    }

    #[test]
    fn test_registry_accepts_openai_compatible() {
        let mut config = Config::default();
        config.llm.provider = "openai-compatible".to_string();
        assert!(build_providers(&config).is_ok());
    }
}
