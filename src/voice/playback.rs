//! Speaker output

use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, mpsc};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleRate, StreamConfig};

use super::{AudioArtifact, MIME_MPEG, Player, StopSignal, downmix};
use crate::{Error, Result};

/// Output rate (the speech endpoint returns 24kHz audio)
pub const PLAYBACK_SAMPLE_RATE: u32 = 24000;

/// Grace period past the expected duration before playback is abandoned
const DRAIN_GRACE: Duration = Duration::from_millis(500);

/// How often a waiting playback checks its stop signal
const STOP_POLL: Duration = Duration::from_millis(50);

/// The default output device, configured for mono speech
#[derive(Debug, Clone)]
pub struct AudioPlayback {
    config: StreamConfig,
}

impl AudioPlayback {
    /// Probe the default output device
    ///
    /// # Errors
    ///
    /// Returns `Error::Audio` if there is no output device or it cannot play
    /// 24kHz audio
    pub fn new() -> Result<Self> {
        let device = output_device()?;
        let wanted = SampleRate(PLAYBACK_SAMPLE_RATE);

        let config = device
            .supported_output_configs()
            .map_err(audio_err)?
            .filter(|c| c.channels() <= 2)
            .filter(|c| c.min_sample_rate() <= wanted && wanted <= c.max_sample_rate())
            .min_by_key(cpal::SupportedStreamConfigRange::channels)
            .ok_or_else(|| Error::Audio("no output config supports 24kHz".to_string()))?
            .with_sample_rate(wanted)
            .config();

        tracing::debug!(
            device = device.name().unwrap_or_default(),
            channels = config.channels,
            "output device ready"
        );

        Ok(Self { config })
    }

    /// Play mono samples at [`PLAYBACK_SAMPLE_RATE`], returning once they
    /// have been handed to the device or `stop` is raised
    ///
    /// # Errors
    ///
    /// Returns `Error::Audio` if the output stream fails to open
    pub fn play_blocking(&self, samples: Vec<f32>, stop: &StopSignal) -> Result<()> {
        if samples.is_empty() || stop.is_raised() {
            return Ok(());
        }

        let total = samples.len();
        let channels = usize::from(self.config.channels);
        let (done_tx, done_rx) = mpsc::sync_channel::<()>(1);

        let samples = Arc::new(samples);
        let cursor = Arc::new(AtomicUsize::new(0));
        let source = Arc::clone(&samples);
        let position = Arc::clone(&cursor);
        let halt = stop.clone();

        let stream = output_device()?
            .build_output_stream(
                &self.config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    if halt.is_raised() {
                        data.fill(0.0);
                        let _ = done_tx.try_send(());
                        return;
                    }
                    let mut pos = position.load(Ordering::Relaxed);
                    for frame in data.chunks_mut(channels) {
                        let value = source.get(pos).copied().unwrap_or(0.0);
                        frame.fill(value);
                        pos = (pos + 1).min(source.len());
                    }
                    position.store(pos, Ordering::Relaxed);
                    if pos == source.len() {
                        // Full buffer means the signal was already sent
                        let _ = done_tx.try_send(());
                    }
                },
                |err| tracing::error!(error = %err, "output stream error"),
                None,
            )
            .map_err(audio_err)?;
        stream.play().map_err(audio_err)?;

        let expected = Duration::from_millis(
            u64::try_from(total).unwrap_or(u64::MAX) * 1000 / u64::from(PLAYBACK_SAMPLE_RATE),
        );
        let deadline = Instant::now() + expected + DRAIN_GRACE;
        loop {
            match done_rx.recv_timeout(STOP_POLL) {
                Ok(()) | Err(mpsc::RecvTimeoutError::Disconnected) => break,
                Err(mpsc::RecvTimeoutError::Timeout) if stop.is_raised() => break,
                Err(mpsc::RecvTimeoutError::Timeout) if Instant::now() >= deadline => {
                    tracing::warn!(
                        played = cursor.load(Ordering::Relaxed),
                        total,
                        "playback did not drain in time"
                    );
                    break;
                }
                Err(mpsc::RecvTimeoutError::Timeout) => {}
            }
        }

        if stop.is_raised() {
            drop(stream);
            tracing::debug!(played = cursor.load(Ordering::Relaxed), total, "playback stopped");
            return Ok(());
        }

        // Let the device flush its last buffer
        std::thread::sleep(Duration::from_millis(100));
        drop(stream);

        tracing::debug!(samples = total, "playback complete");
        Ok(())
    }

    /// Decode MP3 bytes and play them
    ///
    /// # Errors
    ///
    /// Returns `Error::Audio` if decoding or playback fails
    pub fn play_mp3_blocking(&self, mp3: &[u8], stop: &StopSignal) -> Result<()> {
        self.play_blocking(decode_mp3(mp3)?, stop)
    }
}

/// [`Player`] backed by the default output device
///
/// The device is probed on every play, so a missing speaker fails that
/// reply only. Playback runs on a blocking thread; the returned future
/// completes when the audio has finished or been stopped.
#[derive(Debug, Clone, Copy, Default)]
pub struct DevicePlayer;

impl DevicePlayer {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Player for DevicePlayer {
    async fn play(&self, audio: AudioArtifact, stop: StopSignal) -> Result<()> {
        if audio.mime_type != MIME_MPEG {
            return Err(Error::Audio(format!("cannot play {}", audio.mime_type)));
        }
        tokio::task::spawn_blocking(move || {
            AudioPlayback::new()?.play_mp3_blocking(&audio.bytes, &stop)
        })
        .await
        .map_err(|e| Error::Audio(format!("playback task failed: {e}")))?
    }
}

fn output_device() -> Result<Device> {
    cpal::default_host()
        .default_output_device()
        .ok_or_else(|| Error::Audio("no output device available".to_string()))
}

fn audio_err(e: impl ToString) -> Error {
    Error::Audio(e.to_string())
}

/// Decode MP3 bytes to mono f32 samples
fn decode_mp3(mp3: &[u8]) -> Result<Vec<f32>> {
    let mut decoder = minimp3::Decoder::new(Cursor::new(mp3));
    let mut samples = Vec::new();

    loop {
        let frame = match decoder.next_frame() {
            Ok(frame) => frame,
            Err(minimp3::Error::Eof) => break,
            Err(e) => return Err(Error::Audio(format!("MP3 decode error: {e}"))),
        };
        let pcm: Vec<f32> = frame.data.iter().map(|&s| f32::from(s) / 32768.0).collect();
        let channels = u16::try_from(frame.channels).unwrap_or(1);
        samples.extend(downmix(&pcm, channels));
    }

    Ok(samples)
}
