//! Worker configuration
//!
//! All tunables for a single worker invocation: data layout, per-stage
//! timeouts, lock staleness, retention bounds, and the collaborator
//! (LLM/TTS/feed) settings.

use std::path::PathBuf;
use std::time::Duration;

/// Built-in system prompt used when no prompt file is configured.
const DEFAULT_SYSTEM_PROMPT: &str = "You are a podcast host. Rewrite the \
article you are given as a natural, engaging spoken monologue for a single \
host. Keep the facts intact, drop navigation cruft, and do not mention that \
this is an article or that you are an AI. Output only the words to be \
spoken.";

/// Worker configuration
///
/// The lock staleness threshold must exceed the worst-case total pipeline
/// duration (sum of the stage timeouts), otherwise a slow job could be
/// treated as a crashed one and a second worker started concurrently.
#[derive(Debug, Clone)]
pub struct Config {
    /// Root of all on-disk state (queue, jobs, episodes, lock marker).
    pub data_dir: PathBuf,

    /// Age after which an existing lock marker is presumed abandoned.
    pub lock_stale_after: Duration,

    /// Per-stage timeouts; exceeding one fails the job with that stage's
    /// error.
    pub fetch_timeout: Duration,
    pub generate_timeout: Duration,
    pub synthesize_timeout: Duration,

    /// Retention bounds for published episodes.
    pub keep_last_episodes: usize,
    pub max_disk_bytes: u64,

    pub llm: LlmConfig,
    pub tts: TtsConfig,
    pub feed: FeedConfig,
}

/// Script-generation collaborator settings (OpenAI-compatible API).
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub provider: String,
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    /// Article text is truncated to this many characters before prompting.
    pub context_chars: usize,
    pub system_prompt: String,
}

/// Speech-synthesis collaborator settings (OpenAI-compatible API).
#[derive(Debug, Clone)]
pub struct TtsConfig {
    pub provider: String,
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub voice: String,
    pub speed: f32,
    /// Audio container/format requested from the synthesizer (mp3, opus, ...).
    pub format: String,
}

/// Podcast feed metadata.
#[derive(Debug, Clone)]
pub struct FeedConfig {
    pub title: String,
    pub description: String,
    pub author: String,
    pub language: String,
    /// Public base URL episodes are served under; enclosure URLs are
    /// `<base_url>/episodes/<file>`.
    pub base_url: String,
}

impl Config {
    /// Creates configuration from environment variables.
    ///
    /// Required: ECHOCAST_LLM_API_KEY, ECHOCAST_TTS_API_KEY.
    /// Everything else falls back to a default.
    pub fn from_env() -> anyhow::Result<Self> {
        let llm_api_key = require_env("ECHOCAST_LLM_API_KEY")?;
        let tts_api_key = require_env("ECHOCAST_TTS_API_KEY")?;

        let system_prompt = match std::env::var("ECHOCAST_LLM_PROMPT_FILE") {
            Ok(path) => std::fs::read_to_string(&path).map_err(|e| {
                anyhow::anyhow!("failed to read prompt file {}: {}", path, e)
            })?,
            Err(_) => DEFAULT_SYSTEM_PROMPT.to_string(),
        };

        Ok(Self {
            data_dir: PathBuf::from(env_or("ECHOCAST_DATA_DIR", "data")),
            lock_stale_after: env_secs("ECHOCAST_LOCK_STALE_SECS", 1800),
            fetch_timeout: env_secs("ECHOCAST_FETCH_TIMEOUT_SECS", 60),
            generate_timeout: env_secs("ECHOCAST_GENERATE_TIMEOUT_SECS", 300),
            synthesize_timeout: env_secs("ECHOCAST_SYNTHESIZE_TIMEOUT_SECS", 600),
            keep_last_episodes: env_parse("ECHOCAST_KEEP_LAST_EPISODES", 5),
            max_disk_bytes: env_parse::<u64>("ECHOCAST_MAX_DISK_MB", 200) * 1024 * 1024,
            llm: LlmConfig {
                provider: env_or("ECHOCAST_LLM_PROVIDER", "openai"),
                base_url: env_or("ECHOCAST_LLM_BASE_URL", "https://api.openai.com/v1"),
                api_key: llm_api_key,
                model: env_or("ECHOCAST_LLM_MODEL", "gpt-4o-mini"),
                context_chars: env_parse("ECHOCAST_LLM_CONTEXT_CHARS", 16_000),
                system_prompt,
            },
            tts: TtsConfig {
                provider: env_or("ECHOCAST_TTS_PROVIDER", "openai"),
                base_url: env_or("ECHOCAST_TTS_BASE_URL", "https://api.openai.com/v1"),
                api_key: tts_api_key,
                model: env_or("ECHOCAST_TTS_MODEL", "tts-1"),
                voice: env_or("ECHOCAST_TTS_VOICE", "alloy"),
                speed: env_parse("ECHOCAST_TTS_SPEED", 1.0),
                format: env_or("ECHOCAST_TTS_FORMAT", "mp3"),
            },
            feed: FeedConfig {
                title: env_or("ECHOCAST_FEED_TITLE", "EchoCast"),
                description: env_or("ECHOCAST_FEED_DESCRIPTION", "AI generated podcast"),
                author: env_or("ECHOCAST_FEED_AUTHOR", "EchoCast"),
                language: env_or("ECHOCAST_FEED_LANGUAGE", "en"),
                base_url: env_or("ECHOCAST_FEED_BASE_URL", ""),
            },
        })
    }

    /// Validates the configuration.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.llm.api_key.is_empty() {
            anyhow::bail!("LLM api key cannot be empty");
        }
        if self.tts.api_key.is_empty() {
            anyhow::bail!("TTS api key cannot be empty");
        }
        if self.keep_last_episodes == 0 {
            anyhow::bail!("keep_last_episodes must be greater than 0");
        }
        if self.max_disk_bytes == 0 {
            anyhow::bail!("max_disk_bytes must be greater than 0");
        }
        let pipeline_worst_case =
            self.fetch_timeout + self.generate_timeout + self.synthesize_timeout;
        if self.lock_stale_after <= pipeline_worst_case {
            anyhow::bail!(
                "lock staleness threshold ({:?}) must exceed the worst-case \
                 pipeline duration ({:?})",
                self.lock_stale_after,
                pipeline_worst_case
            );
        }
        if !self.tts.speed.is_finite() || self.tts.speed <= 0.0 {
            anyhow::bail!("TTS speed must be positive");
        }
        Ok(())
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

    pub fn lock_path(&self) -> PathBuf {
        self.data_dir.join("worker.lock")
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            lock_stale_after: Duration::from_secs(1800),
            fetch_timeout: Duration::from_secs(60),
            generate_timeout: Duration::from_secs(300),
            synthesize_timeout: Duration::from_secs(600),
            keep_last_episodes: 5,
            max_disk_bytes: 200 * 1024 * 1024,
            llm: LlmConfig {
                provider: "openai".to_string(),
                base_url: "https://api.openai.com/v1".to_string(),
                api_key: String::new(),
                model: "gpt-4o-mini".to_string(),
                context_chars: 16_000,
                system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            },
            tts: TtsConfig {
                provider: "openai".to_string(),
                base_url: "https://api.openai.com/v1".to_string(),
                api_key: String::new(),
                model: "tts-1".to_string(),
                voice: "alloy".to_string(),
                speed: 1.0,
                format: "mp3".to_string(),
            },
            feed: FeedConfig {
                title: "EchoCast".to_string(),
                description: "AI generated podcast".to_string(),
                author: "EchoCast".to_string(),
                language: "en".to_string(),
                base_url: String::new(),
            },
        }
    }
}

fn require_env(name: &str) -> anyhow::Result<String> {
    std::env::var(name).map_err(|_| anyhow::anyhow!("{name} environment variable not set"))
}

fn env_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

fn env_secs(name: &str, default: u64) -> Duration {
    Duration::from_secs(env_parse(name, default))
}

fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|s| s.parse::<T>().ok())
        .unwrap_or(default)
}
