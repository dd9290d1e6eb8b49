//! Script generation over an OpenAI-compatible chat-completions API

use std::time::Duration;

use async_trait::async_trait;
use echocast_core::error::StageError;
use serde::Deserialize;
use tracing::debug;

use super::{ScriptGenerator, truncate_chars};
use crate::config::LlmConfig;

pub struct OpenAiScriptGenerator {
    client: reqwest::Client,
    config: LlmConfig,
}

impl OpenAiScriptGenerator {
    pub fn new(config: LlmConfig, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client, config })
    }

    fn user_prompt(&self, title: &str, text: &str) -> String {
        let text = truncate_chars(text, self.config.context_chars);
        format!("Title: {title}\n\n{text}")
    }
}

#[async_trait]
impl ScriptGenerator for OpenAiScriptGenerator {
    async fn generate(&self, title: &str, text: &str) -> Result<String, StageError> {
        let url = format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'));

        debug!(
            "Requesting script from {} (model {}, {} input chars)",
            url,
            self.config.model,
            text.len()
        );

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&serde_json::json!({
                "model": self.config.model,
                "messages": [
                    { "role": "system", "content": self.config.system_prompt },
                    { "role": "user", "content": self.user_prompt(title, text) },
                ],
                "temperature": 0.7,
            }))
            .send()
            .await
            .map_err(|e| StageError::Generation(format!("network error: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(StageError::Generation(format!(
                "API error {status}: {body}"
            )));
        }

        let completion = response
            .json::<ChatCompletion>()
            .await
            .map_err(|e| StageError::Generation(format!("malformed response: {e}")))?;

        let script = completion
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .unwrap_or_default();

        if script.trim().is_empty() {
            return Err(StageError::Generation("empty completion".to_string()));
        }

        Ok(script)
    }
}

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Message,
}

#[derive(Debug, Deserialize)]
struct Message {
    content: String,
}
