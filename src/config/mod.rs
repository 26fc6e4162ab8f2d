//! Configuration management for Parley

pub mod file;

use std::time::Duration;

use crate::prompt::DEFAULT_SYSTEM_PROMPT;
use crate::{Error, Result};

use file::ParleyConfigFile;

/// Default API base URL
pub const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";

/// Default bound on each remote call
pub const DEFAULT_STAGE_TIMEOUT: Duration = Duration::from_secs(60);

/// Parley configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL for the speech and chat APIs
    pub api_base: String,

    /// Language model configuration
    pub llm: LlmConfig,

    /// Voice configuration
    pub voice: VoiceConfig,

    /// Upper bound on each remote call before it counts as failed
    pub stage_timeout: Duration,
}

/// Language model configuration
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// Chat model identifier
    pub model: String,

    /// Instructions seeded as the first turn of every session
    pub system_prompt: String,
}

/// Voice processing configuration
#[derive(Debug, Clone)]
pub struct VoiceConfig {
    /// STT model (e.g. "gpt-4o-transcribe", "whisper-1")
    pub stt_model: String,

    /// TTS model (e.g. "gpt-4o-mini-tts", "tts-1")
    pub tts_model: String,

    /// TTS voice identifier
    pub tts_voice: String,

    /// Delivery instructions for the TTS model
    pub tts_instructions: Option<String>,

    /// TTS speed multiplier (0.25 to 4.0)
    pub tts_speed: f32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            llm: LlmConfig {
                model: "gpt-4o".to_string(),
                system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            },
            voice: VoiceConfig {
                stt_model: "gpt-4o-transcribe".to_string(),
                tts_model: "gpt-4o-mini-tts".to_string(),
                tts_voice: "nova".to_string(),
                tts_instructions: Some("Speak very slowly.".to_string()),
                tts_speed: 1.0,
            },
            stage_timeout: DEFAULT_STAGE_TIMEOUT,
        }
    }
}

impl Config {
    /// Load configuration (env > toml > default)
    ///
    /// # Errors
    ///
    /// Returns error if the resulting settings are invalid
    pub fn load() -> Result<Self> {
        let fc = file::load_config_file();
        Self::from_sources(fc, |key| std::env::var(key).ok())
    }

    /// Merge a parsed config file with environment lookups over defaults
    ///
    /// # Errors
    ///
    /// Returns error if the resulting settings are invalid
    pub fn from_sources(
        fc: ParleyConfigFile,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let defaults = Self::default();

        let stage_timeout = match env("PARLEY_STAGE_TIMEOUT_SECS") {
            Some(raw) => Some(raw.trim().parse::<u64>().map_err(|_| {
                Error::Config(format!("PARLEY_STAGE_TIMEOUT_SECS is not a number: {raw}"))
            })?),
            None => fc.server.stage_timeout_secs,
        }
        .map_or(defaults.stage_timeout, Duration::from_secs);

        let config = Self {
            api_base: env("PARLEY_API_BASE")
                .or(fc.server.api_base)
                .unwrap_or(defaults.api_base),
            llm: LlmConfig {
                model: env("PARLEY_CHAT_MODEL")
                    .or(fc.llm.model)
                    .unwrap_or(defaults.llm.model),
                system_prompt: fc
                    .llm
                    .system_prompt
                    .unwrap_or(defaults.llm.system_prompt),
            },
            voice: VoiceConfig {
                stt_model: env("PARLEY_STT_MODEL")
                    .or(fc.voice.stt_model)
                    .unwrap_or(defaults.voice.stt_model),
                tts_model: env("PARLEY_TTS_MODEL")
                    .or(fc.voice.tts_model)
                    .unwrap_or(defaults.voice.tts_model),
                tts_voice: env("PARLEY_TTS_VOICE")
                    .or(fc.voice.tts_voice)
                    .unwrap_or(defaults.voice.tts_voice),
                tts_instructions: fc
                    .voice
                    .tts_instructions
                    .or(defaults.voice.tts_instructions)
                    .filter(|s| !s.trim().is_empty()),
                tts_speed: fc.voice.tts_speed.unwrap_or(defaults.voice.tts_speed),
            },
            stage_timeout,
        };

        config.validate()?;
        Ok(config)
    }

    /// Check settings that would otherwise fail at request time
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` describing the first invalid setting
    pub fn validate(&self) -> Result<()> {
        if !(0.25..=4.0).contains(&self.voice.tts_speed) {
            return Err(Error::Config(format!(
                "tts_speed must be between 0.25 and 4.0, got {}",
                self.voice.tts_speed
            )));
        }
        if self.stage_timeout.is_zero() {
            return Err(Error::Config("stage timeout must be positive".to_string()));
        }
        if self.llm.system_prompt.trim().is_empty() {
            return Err(Error::Config("system prompt must not be empty".to_string()));
        }
        if !self.api_base.starts_with("http://") && !self.api_base.starts_with("https://") {
            return Err(Error::Config(format!(
                "api_base must be an http(s) URL, got {}",
                self.api_base
            )));
        }
        Ok(())
    }
}
