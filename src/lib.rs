//! Parley - hold-to-talk conversation practice with an AI language tutor
//!
//! The learner names a scenario, the tutor opens the conversation, and each
//! exchange runs through remote speech-to-text, a chat model, and
//! text-to-speech:
//!
//! ```text
//! ┌──────────────┐   capture    ┌───────────────────┐
//! │  Microphone  │ ───────────▶ │                   │ ──▶ Speech-to-text
//! └──────────────┘              │ SessionController │ ──▶ Chat completion
//! ┌──────────────┐   playback   │                   │ ──▶ Text-to-speech
//! │   Speaker    │ ◀─────────── │                   │
//! └──────────────┘              └─────────┬─────────┘
//!                                         │ SessionEvent
//!                                         ▼
//!                                  Terminal front end
//! ```

use std::sync::Arc;

pub mod config;
pub mod credentials;
pub mod error;
pub mod llm;
pub mod prompt;
pub mod services;
pub mod session;
pub mod voice;

pub use config::Config;
pub use credentials::{Credential, CredentialStore};
pub use error::{Error, Result};
pub use llm::ChatClient;
pub use services::{Generator, Services, Synthesizer, Transcriber};
pub use session::{
    Affordances, Role, SessionController, SessionEvent, SessionSettings, SessionState, Stage,
    Turn,
};
pub use voice::{
    AudioArtifact, CaptureHandle, DevicePlayer, Microphone, Player, SpeechCapture, StopSignal,
};

/// Build the OpenAI-backed services described by `config`
///
/// Audio devices are not touched until the first reply is played
#[must_use]
pub fn openai_services(config: &Config) -> Services {
    let client = reqwest::Client::new();

    Services {
        transcriber: Arc::new(voice::SpeechToText::new(
            client.clone(),
            config.api_base.clone(),
            config.voice.stt_model.clone(),
        )),
        generator: Arc::new(ChatClient::new(
            client.clone(),
            config.api_base.clone(),
            config.llm.model.clone(),
        )),
        synthesizer: Arc::new(voice::TextToSpeech::new(
            client,
            config.api_base.clone(),
            &config.voice,
        )),
        player: Arc::new(DevicePlayer::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_services_build_without_audio_devices() {
        let services = openai_services(&Config::default());

        // Nothing is opened up front; unplayable audio fails the play call only
        let err = services
            .player
            .play(AudioArtifact::new(vec![0; 4], "audio/ogg"), StopSignal::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Audio(_)));
    }
}
