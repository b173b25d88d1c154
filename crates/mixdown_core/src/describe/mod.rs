//! Best-effort mix description generation.
//!
//! Calls a chat-completions-style HTTP API after the video pipeline
//! completes. The response carries a free-text description, CSV tags, and
//! creative song titles; the titles can be substituted back into the
//! tracklist. Failures here never fail the pipeline.

use std::env;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Description collaborator settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DescribeConfig {
    /// Enable the collaborator at all.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Chat-completions endpoint.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Model name sent in the request.
    #[serde(default = "default_model")]
    pub model: String,

    /// Genre woven into the prompt.
    #[serde(default = "default_genre")]
    pub genre: String,

    /// Environment variable holding the API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Replace tracklist titles with the generated ones when counts match.
    #[serde(default = "default_true")]
    pub update_titles: bool,
}

fn default_true() -> bool {
    true
}

fn default_endpoint() -> String {
    "https://api.perplexity.ai/chat/completions".to_string()
}

fn default_model() -> String {
    "sonar-pro".to_string()
}

fn default_genre() -> String {
    "lofi jazz".to_string()
}

fn default_api_key_env() -> String {
    "MIXDOWN_API_KEY".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for DescribeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: default_endpoint(),
            model: default_model(),
            genre: default_genre(),
            api_key_env: default_api_key_env(),
            timeout_secs: default_timeout_secs(),
            update_titles: true,
        }
    }
}

/// Errors from the description collaborator. These are logged by the
/// caller, never escalated.
#[derive(Error, Debug)]
pub enum DescribeError {
    #[error("API key environment variable '{0}' is not set")]
    MissingApiKey(String),

    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API returned status {status}: {body}")]
    Api { status: u16, body: String },

    #[error("malformed API response: {0}")]
    Malformed(String),
}

/// Generated description package.
#[derive(Debug, Clone)]
pub struct Description {
    /// Full response text (description, tags, titles).
    pub content: String,
    /// Parsed song titles, in order; empty if none were found.
    pub titles: Vec<String>,
}

/// Generates a description for a finished mix.
pub struct DescriptionGenerator {
    config: DescribeConfig,
}

impl DescriptionGenerator {
    pub fn new(config: DescribeConfig) -> Self {
        Self { config }
    }

    /// Check if the API key is present without sending anything.
    pub fn has_api_key(&self) -> bool {
        env::var(&self.config.api_key_env).is_ok()
    }

    /// Request a description for a mix with `track_count` tracks.
    pub fn generate(&self, track_count: usize) -> Result<Description, DescribeError> {
        let api_key = env::var(&self.config.api_key_env)
            .map_err(|_| DescribeError::MissingApiKey(self.config.api_key_env.clone()))?;

        let prompt = format!(
            "Create a music mix description package with the following format:\n\n\
             1. A captivating paragraph description for a {genre} mix that mentions \
             the mood, instruments, and ideal listening scenarios\n\
             2. 10 CSV tags optimized for music platforms\n\
             3. {count} creative song titles that fit the genre\n\n\
             Format the response exactly like this example:\n\
             Description:\n[paragraph description]\n\n\
             Tags:\n[tag1],[tag2],[tag3],...\n\n\
             Song Titles:\n1. [Title 1]\n2. [Title 2]\n...etc",
            genre = self.config.genre,
            count = track_count,
        );

        let payload = serde_json::json!({
            "model": self.config.model,
            "messages": [
                {
                    "role": "system",
                    "content": "You are a creative music description writer. Be engaging and specific."
                },
                { "role": "user", "content": prompt }
            ],
            "max_tokens": 500,
            "temperature": 0.7,
        });

        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(self.config.timeout_secs))
            .build()?;

        let response = client
            .post(self.config.endpoint.as_str())
            .bearer_auth(api_key)
            .json(&payload)
            .send()?;

        let status = response.status();
        if !status.is_success() {
            return Err(DescribeError::Api {
                status: status.as_u16(),
                body: response.text().unwrap_or_default(),
            });
        }

        let body: serde_json::Value = response.json()?;
        let content = body["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| DescribeError::Malformed("missing choices[0].message.content".into()))?
            .to_string();

        let titles = parse_song_titles(&content);
        Ok(Description { content, titles })
    }
}

/// Pull the numbered titles out of the `Song Titles:` section.
fn parse_song_titles(content: &str) -> Vec<String> {
    let Some(section) = content.split("Song Titles:").nth(1) else {
        return Vec::new();
    };
    section
        .lines()
        .filter_map(|line| {
            let line = line.trim();
            let (number, rest) = line.split_once('.')?;
            if number.chars().all(|c| c.is_ascii_digit()) && !number.is_empty() {
                let title = rest.trim();
                (!title.is_empty()).then(|| title.to_string())
            } else {
                None
            }
        })
        .collect()
}
