//! Speech synthesis over an OpenAI-compatible audio API

use std::time::Duration;

use async_trait::async_trait;
use echocast_core::error::StageError;
use tracing::debug;

use super::{SpeechSynthesizer, SynthesizedAudio};
use crate::config::TtsConfig;

pub struct OpenAiSpeechSynthesizer {
    client: reqwest::Client,
    config: TtsConfig,
}

impl OpenAiSpeechSynthesizer {
    pub fn new(config: TtsConfig, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client, config })
    }
}

#[async_trait]
impl SpeechSynthesizer for OpenAiSpeechSynthesizer {
    async fn synthesize(&self, script: &str) -> Result<SynthesizedAudio, StageError> {
        let url = format!("{}/audio/speech", self.config.base_url.trim_end_matches('/'));

        debug!(
            "Requesting synthesis from {} (model {}, voice {}, {} chars)",
            url,
            self.config.model,
            self.config.voice,
            script.len()
        );

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&serde_json::json!({
                "model": self.config.model,
                "input": script,
                "voice": self.config.voice,
                "speed": self.config.speed,
                "response_format": self.config.format,
            }))
            .send()
            .await
            .map_err(|e| StageError::Synthesis(format!("network error: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(StageError::Synthesis(format!(
                "API error {status}: {body}"
            )));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| StageError::Synthesis(format!("failed to read audio: {e}")))?;

        if bytes.is_empty() {
            return Err(StageError::Synthesis("empty audio response".to_string()));
        }

        Ok(SynthesizedAudio {
            bytes: bytes.to_vec(),
            format: self.config.format.clone(),
        })
    }
}
