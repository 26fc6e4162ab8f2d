//! Remote service contracts consumed by the session controller
//!
//! Each call is a single request/response exchange. Implementations report
//! failures as `Error::Service` tagged with their stage.

use std::sync::Arc;

use async_trait::async_trait;

use crate::credentials::Credential;
use crate::session::Turn;
use crate::voice::{AudioArtifact, Player};
use crate::Result;

/// Speech-to-text
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Transcribe recorded speech to text
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or the response is malformed
    async fn transcribe(&self, credential: &Credential, audio: &AudioArtifact) -> Result<String>;
}

/// Text generation over the full conversation
#[async_trait]
pub trait Generator: Send + Sync {
    /// Produce the next assistant reply for `turns`
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or the response is malformed
    async fn generate(&self, credential: &Credential, turns: &[Turn]) -> Result<String>;
}

/// Text-to-speech
#[async_trait]
pub trait Synthesizer: Send + Sync {
    /// Synthesize `text` to audio
    ///
    /// # Errors
    ///
    /// Returns error if the request fails
    async fn synthesize(&self, credential: &Credential, text: &str) -> Result<AudioArtifact>;
}

/// The collaborators a session calls out to once audio has been captured
#[derive(Clone)]
pub struct Services {
    pub transcriber: Arc<dyn Transcriber>,
    pub generator: Arc<dyn Generator>,
    pub synthesizer: Arc<dyn Synthesizer>,
    pub player: Arc<dyn Player>,
}
