//! Configuration types for the chat core.

use crate::error::{ChatError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable consulted when the config file carries no API key.
pub const API_KEY_ENV: &str = "GEMINI_API_KEY";

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// Language service (translation / reply / transcription / TTS) settings.
    pub service: ServiceConfig,
    /// Audio capture settings.
    pub audio: AudioConfig,
    /// Message pipeline settings.
    pub pipeline: PipelineConfig,
}

/// Language service connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Base URL of the generative API.
    pub api_url: String,
    /// API key; empty means "resolve from the environment".
    pub api_key: String,
    /// Model used for translation, transcription, and reply generation.
    pub text_model: String,
    /// Model used for speech synthesis.
    pub speech_model: String,
    /// Prebuilt voice name for synthesis.
    pub voice: String,
    /// Per-request timeout in seconds.
    pub request_timeout_secs: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            api_url: "https://generativelanguage.googleapis.com".to_owned(),
            api_key: String::new(),
            text_model: "gemini-2.5-flash".to_owned(),
            speech_model: "gemini-2.5-flash-preview-tts".to_owned(),
            voice: "Puck".to_owned(),
            request_timeout_secs: 30,
        }
    }
}

impl ServiceConfig {
    /// The API key from config, falling back to [`API_KEY_ENV`].
    ///
    /// Returns `None` when neither source yields a non-empty key; the
    /// service client then runs in degraded (fallback-only) mode rather
    /// than failing.
    #[must_use]
    pub fn resolved_api_key(&self) -> Option<String> {
        if !self.api_key.trim().is_empty() {
            return Some(self.api_key.trim().to_owned());
        }
        std::env::var(API_KEY_ENV)
            .ok()
            .map(|v| v.trim().to_owned())
            .filter(|v| !v.is_empty())
    }
}

/// Audio capture configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Input device name (None = system default).
    pub input_device: Option<String>,
    /// Target sample rate for finalized captures, in Hz.
    pub capture_sample_rate: u32,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            input_device: None,
            capture_sample_rate: 16_000,
        }
    }
}

/// Message pipeline configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Simulated counterpart think time before the reply is requested, in
    /// milliseconds. Stands in for real network/turn latency; set to 0 in
    /// tests.
    pub reply_delay_ms: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            reply_delay_ms: 1_500,
        }
    }
}

impl ChatConfig {
    /// Default config file location: `<config_dir>/kaiwa/config.toml`.
    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("kaiwa").join("config.toml"))
    }

    /// Load configuration from a TOML file.
    ///
    /// A missing file yields the defaults; a malformed file is an error.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)?;
        toml::from_str(&raw)
            .map_err(|e| ChatError::Config(format!("invalid config ({}): {e}", path.display())))
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn defaults_are_sensible() {
        let config = ChatConfig::default();
        assert_eq!(config.pipeline.reply_delay_ms, 1_500);
        assert_eq!(config.audio.capture_sample_rate, 16_000);
        assert!(config.service.api_url.starts_with("https://"));
        assert_eq!(config.service.voice, "Puck");
    }

    #[test]
    fn load_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = ChatConfig::load(&dir.path().join("nope.toml")).unwrap();
        assert_eq!(config.service.text_model, "gemini-2.5-flash");
    }

    #[test]
    fn load_partial_file_keeps_defaults_elsewhere() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
[pipeline]
reply_delay_ms = 0

[service]
voice = "Kore"
"#,
        )
        .unwrap();

        let config = ChatConfig::load(&path).unwrap();
        assert_eq!(config.pipeline.reply_delay_ms, 0);
        assert_eq!(config.service.voice, "Kore");
        assert_eq!(config.service.text_model, "gemini-2.5-flash");
    }

    #[test]
    fn load_malformed_file_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "not [valid toml").unwrap();
        assert!(ChatConfig::load(&path).is_err());
    }
}
