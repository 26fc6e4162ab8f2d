//! TOML configuration file loading
//!
//! Supports `~/.config/parley/config.toml` as a persistent config source.
//! All fields are optional; the file is a partial overlay on top of defaults.

use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
pub struct ParleyConfigFile {
    /// Language model configuration
    #[serde(default)]
    pub llm: LlmFileConfig,

    /// Voice/audio configuration
    #[serde(default)]
    pub voice: VoiceFileConfig,

    /// Remote API configuration
    #[serde(default)]
    pub server: ServerFileConfig,
}

/// Language model configuration
#[derive(Debug, Default, Deserialize)]
pub struct LlmFileConfig {
    /// Chat model identifier (e.g. "gpt-4o")
    pub model: Option<String>,

    /// Replacement for the built-in tutor instructions
    pub system_prompt: Option<String>,
}

/// Voice processing configuration
#[derive(Debug, Default, Deserialize)]
pub struct VoiceFileConfig {
    /// STT model (e.g. "gpt-4o-transcribe")
    pub stt_model: Option<String>,

    /// TTS model (e.g. "gpt-4o-mini-tts")
    pub tts_model: Option<String>,

    /// TTS voice identifier (e.g. "nova")
    pub tts_voice: Option<String>,

    /// Delivery instructions for the TTS model
    pub tts_instructions: Option<String>,

    /// TTS speed multiplier
    pub tts_speed: Option<f32>,
}

/// Remote API configuration
#[derive(Debug, Default, Deserialize)]
pub struct ServerFileConfig {
    /// API base URL
    pub api_base: Option<String>,

    /// Upper bound on each remote call, in seconds
    pub stage_timeout_secs: Option<u64>,
}

/// Load the TOML config file from the standard path
///
/// Returns `ParleyConfigFile::default()` if the file doesn't exist or can't be parsed.
pub fn load_config_file() -> ParleyConfigFile {
    config_file_path().map_or_else(ParleyConfigFile::default, |path| load_config_file_from(&path))
}

/// Load a TOML config file from `path`
///
/// Returns `ParleyConfigFile::default()` if the file doesn't exist or can't be parsed.
pub fn load_config_file_from(path: &Path) -> ParleyConfigFile {
    if !path.exists() {
        return ParleyConfigFile::default();
    }

    match std::fs::read_to_string(path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(config) => {
                tracing::info!(path = %path.display(), "loaded config file");
                config
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to parse config file, using defaults"
                );
                ParleyConfigFile::default()
            }
        },
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to read config file"
            );
            ParleyConfigFile::default()
        }
    }
}

/// Return the config file path: `~/.config/parley/config.toml`
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.config_dir().join("parley").join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_file_parses() {
        let fc: ParleyConfigFile = toml::from_str(
            r#"
            [voice]
            tts_voice = "alloy"
            tts_speed = 0.8
            "#,
        )
        .unwrap();

        assert_eq!(fc.voice.tts_voice.as_deref(), Some("alloy"));
        assert_eq!(fc.voice.tts_speed, Some(0.8));
        assert!(fc.llm.model.is_none());
        assert!(fc.server.api_base.is_none());
    }

    #[test]
    fn test_missing_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let fc = load_config_file_from(&dir.path().join("absent.toml"));
        assert!(fc.voice.stt_model.is_none());
    }

    #[test]
    fn test_invalid_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[voice\nnot toml").unwrap();
        let fc = load_config_file_from(&path);
        assert!(fc.voice.tts_model.is_none());
    }
}
