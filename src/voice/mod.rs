//! Voice processing module
//!
//! Handles microphone capture, playback, and the remote speech services.

mod capture;
mod playback;
mod stt;
mod tts;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;

use crate::Result;

pub use capture::{Microphone, Recording, SAMPLE_RATE, downmix, samples_to_wav};
pub use playback::{AudioPlayback, DevicePlayer, PLAYBACK_SAMPLE_RATE};
pub use stt::SpeechToText;
pub use tts::TextToSpeech;

/// MIME type of captured speech
pub const MIME_WAV: &str = "audio/wav";

/// MIME type of synthesized speech
pub const MIME_MPEG: &str = "audio/mpeg";

/// A finished piece of audio: opaque bytes tagged with a MIME type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioArtifact {
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

impl AudioArtifact {
    pub fn new(bytes: Vec<u8>, mime_type: impl Into<String>) -> Self {
        Self {
            bytes,
            mime_type: mime_type.into(),
        }
    }

    /// File extension matching the MIME type, for multipart uploads
    #[must_use]
    pub fn extension(&self) -> &'static str {
        match self.mime_type.as_str() {
            MIME_WAV | "audio/x-wav" => "wav",
            MIME_MPEG | "audio/mp3" => "mp3",
            "audio/webm" => "webm",
            "audio/ogg" => "ogg",
            _ => "bin",
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Source of capture handles (a microphone)
pub trait SpeechCapture {
    /// Acquire the input device and start recording
    ///
    /// # Errors
    ///
    /// Returns `Error::CaptureUnavailable` if the device is denied or absent
    fn open(&self) -> Result<Box<dyn CaptureHandle>>;
}

/// One recording episode
///
/// The device is released when the handle is finished or dropped,
/// whichever happens first
pub trait CaptureHandle {
    /// Stop recording, release the device, and return the recorded audio
    ///
    /// # Errors
    ///
    /// Returns error if the recording cannot be encoded
    fn finish(self: Box<Self>) -> Result<AudioArtifact>;
}

/// Shared flag that cuts a playback short
///
/// Clones observe the same flag; once raised it stays raised
#[derive(Debug, Clone, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the playback holding this signal to stop
    pub fn raise(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    #[must_use]
    pub fn is_raised(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Plays synthesized audio
#[async_trait]
pub trait Player: Send + Sync {
    /// Play `audio`, completing when playback has finished or `stop` is raised
    ///
    /// # Errors
    ///
    /// Returns error if the audio cannot be decoded or played
    async fn play(&self, audio: AudioArtifact, stop: StopSignal) -> Result<()>;
}
