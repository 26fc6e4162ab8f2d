//! Speech-to-text (STT) processing

use async_trait::async_trait;

use super::AudioArtifact;
use crate::credentials::Credential;
use crate::services::Transcriber;
use crate::session::Stage;
use crate::{Error, Result};

/// Response from the `OpenAI` transcription API
#[derive(serde::Deserialize)]
struct TranscriptionResponse {
    text: String,
}

/// Transcribes speech to text via `OpenAI`'s transcription endpoint
pub struct SpeechToText {
    client: reqwest::Client,
    api_base: String,
    model: String,
}

impl SpeechToText {
    /// Create a new STT client
    #[must_use]
    pub fn new(client: reqwest::Client, api_base: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client,
            api_base: api_base.into(),
            model: model.into(),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/audio/transcriptions", self.api_base.trim_end_matches('/'))
    }
}

#[async_trait]
impl Transcriber for SpeechToText {
    async fn transcribe(&self, credential: &Credential, audio: &AudioArtifact) -> Result<String> {
        tracing::debug!(
            audio_bytes = audio.len(),
            mime = %audio.mime_type,
            model = %self.model,
            "starting transcription"
        );

        let form = reqwest::multipart::Form::new()
            .part(
                "file",
                reqwest::multipart::Part::bytes(audio.bytes.clone())
                    .file_name(format!("speech.{}", audio.extension()))
                    .mime_str(&audio.mime_type)
                    .map_err(|e| Error::service(Stage::Transcribing, e.to_string()))?,
            )
            .text("model", self.model.clone());

        let response = self
            .client
            .post(self.endpoint())
            .header("Authorization", credential.bearer())
            .multipart(form)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "transcription request failed");
                Error::service(Stage::Transcribing, e.to_string())
            })?;

        let status = response.status();
        tracing::debug!(status = %status, "received response");

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "transcription API error");
            return Err(Error::service(
                Stage::Transcribing,
                format!("API error {status}: {body}"),
            ));
        }

        let result: TranscriptionResponse = response.json().await.map_err(|e| {
            tracing::error!(error = %e, "failed to parse transcription response");
            Error::service(Stage::Transcribing, format!("malformed response: {e}"))
        })?;

        tracing::info!(transcript = %result.text, "transcription complete");
        Ok(result.text)
    }
}
