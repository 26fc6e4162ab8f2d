//! Text-to-speech (TTS) processing

use async_trait::async_trait;

use super::{AudioArtifact, MIME_MPEG};
use crate::config::VoiceConfig;
use crate::credentials::Credential;
use crate::services::Synthesizer;
use crate::session::Stage;
use crate::{Error, Result};

/// Synthesizes speech from text via `OpenAI`'s speech endpoint
pub struct TextToSpeech {
    client: reqwest::Client,
    api_base: String,
    model: String,
    voice: String,
    instructions: Option<String>,
    speed: f32,
}

impl TextToSpeech {
    /// Create a new TTS client from voice settings
    #[must_use]
    pub fn new(client: reqwest::Client, api_base: impl Into<String>, voice: &VoiceConfig) -> Self {
        Self {
            client,
            api_base: api_base.into(),
            model: voice.tts_model.clone(),
            voice: voice.tts_voice.clone(),
            instructions: voice.tts_instructions.clone(),
            speed: voice.tts_speed,
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/audio/speech", self.api_base.trim_end_matches('/'))
    }
}

#[async_trait]
impl Synthesizer for TextToSpeech {
    async fn synthesize(&self, credential: &Credential, text: &str) -> Result<AudioArtifact> {
        #[derive(serde::Serialize)]
        struct TtsRequest<'a> {
            model: &'a str,
            input: &'a str,
            voice: &'a str,
            #[serde(skip_serializing_if = "Option::is_none")]
            instructions: Option<&'a str>,
            speed: f32,
            response_format: &'static str,
        }

        let request = TtsRequest {
            model: &self.model,
            input: text,
            voice: &self.voice,
            instructions: self.instructions.as_deref(),
            speed: self.speed,
            response_format: "mp3",
        };

        tracing::debug!(chars = text.chars().count(), model = %self.model, "synthesizing speech");

        let response = self
            .client
            .post(self.endpoint())
            .header("Authorization", credential.bearer())
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::service(Stage::Speaking, e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::service(
                Stage::Speaking,
                format!("TTS error {status}: {body}"),
            ));
        }

        let audio = response
            .bytes()
            .await
            .map_err(|e| Error::service(Stage::Speaking, e.to_string()))?;

        if audio.is_empty() {
            return Err(Error::service(Stage::Speaking, "empty audio response"));
        }

        tracing::debug!(audio_bytes = audio.len(), "speech synthesized");
        Ok(AudioArtifact::new(audio.to_vec(), MIME_MPEG))
    }
}
