//! Microphone capture

use std::sync::{Arc, Mutex};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{
    Device, FromSample, Sample, SampleFormat, SampleRate, SizedSample, Stream, StreamConfig,
    SupportedStreamConfig,
};

use super::{AudioArtifact, CaptureHandle, MIME_WAV, SpeechCapture};
use crate::{Error, Result};

/// Preferred capture rate (16kHz is plenty for speech)
pub const SAMPLE_RATE: u32 = 16000;

/// The default input device
///
/// Each [`open`](SpeechCapture::open) acquires the device for one recording
#[derive(Debug, Clone, Copy, Default)]
pub struct Microphone;

impl SpeechCapture for Microphone {
    fn open(&self) -> Result<Box<dyn CaptureHandle>> {
        Ok(Box::new(Recording::start()?))
    }
}

/// A live recording from the default input device
///
/// Holds the input stream until [`release`](Self::release) or drop
pub struct Recording {
    stream: Option<Stream>,
    samples: Arc<Mutex<Vec<f32>>>,
    config: StreamConfig,
}

impl Recording {
    /// Acquire the default input device and start recording
    ///
    /// # Errors
    ///
    /// Returns `Error::CaptureUnavailable` if there is no input device or the
    /// stream cannot be opened, which is how a refused permission shows up
    pub fn start() -> Result<Self> {
        let device = cpal::default_host()
            .default_input_device()
            .ok_or_else(|| unavailable("no input device available"))?;
        let supported = input_config(&device)?;
        let config = supported.config();

        let samples = Arc::new(Mutex::new(Vec::new()));
        let stream = match supported.sample_format() {
            SampleFormat::F32 => input_stream::<f32>(&device, &config, &samples)?,
            SampleFormat::I16 => input_stream::<i16>(&device, &config, &samples)?,
            SampleFormat::U16 => input_stream::<u16>(&device, &config, &samples)?,
            other => return Err(unavailable(format!("unsupported sample format {other}"))),
        };
        stream.play().map_err(unavailable)?;

        tracing::debug!(
            device = device.name().unwrap_or_default(),
            sample_rate = config.sample_rate.0,
            channels = config.channels,
            format = %supported.sample_format(),
            "recording started"
        );

        Ok(Self {
            stream: Some(stream),
            samples,
            config,
        })
    }

    /// Stop the stream and give the device back
    pub fn release(&mut self) {
        if self.stream.take().is_some() {
            tracing::debug!("input device released");
        }
    }

    /// Mono samples recorded since the last drain
    #[must_use]
    pub fn drain(&self) -> Vec<f32> {
        let raw = self
            .samples
            .lock()
            .map(|mut buf| std::mem::take(&mut *buf))
            .unwrap_or_default();
        downmix(&raw, self.config.channels)
    }

    #[must_use]
    pub const fn sample_rate(&self) -> u32 {
        self.config.sample_rate.0
    }

    #[must_use]
    pub const fn channels(&self) -> u16 {
        self.config.channels
    }
}

impl CaptureHandle for Recording {
    fn finish(mut self: Box<Self>) -> Result<AudioArtifact> {
        self.release();
        let samples = self.drain();
        let wav = samples_to_wav(&samples, self.sample_rate())?;
        tracing::debug!(samples = samples.len(), wav_bytes = wav.len(), "recording finalized");
        Ok(AudioArtifact::new(wav, MIME_WAV))
    }
}

impl Drop for Recording {
    fn drop(&mut self) {
        self.release();
    }
}

/// 16kHz mono when offered (f32 first), otherwise whatever the device defaults to
fn input_config(device: &Device) -> Result<SupportedStreamConfig> {
    let wanted = SampleRate(SAMPLE_RATE);
    let speech = device
        .supported_input_configs()
        .map_err(unavailable)?
        .filter(|c| c.min_sample_rate() <= wanted && wanted <= c.max_sample_rate())
        .min_by_key(|c| (c.channels(), c.sample_format() != SampleFormat::F32))
        .map(|c| c.with_sample_rate(wanted));

    match speech {
        Some(supported) => Ok(supported),
        None => device.default_input_config().map_err(unavailable),
    }
}

/// Open an input stream in the device's native format, storing f32 samples
fn input_stream<T>(
    device: &Device,
    config: &StreamConfig,
    samples: &Arc<Mutex<Vec<f32>>>,
) -> Result<Stream>
where
    T: SizedSample,
    f32: FromSample<T>,
{
    let sink = Arc::clone(samples);
    device
        .build_input_stream(
            config,
            move |data: &[T], _: &cpal::InputCallbackInfo| {
                if let Ok(mut buf) = sink.lock() {
                    append_as_f32(&mut buf, data);
                }
            },
            |err| tracing::error!(error = %err, "input stream error"),
            None,
        )
        .map_err(unavailable)
}

fn append_as_f32<T>(buf: &mut Vec<f32>, data: &[T])
where
    T: Sample,
    f32: FromSample<T>,
{
    buf.extend(data.iter().map(|&s| s.to_sample::<f32>()));
}

fn unavailable(reason: impl ToString) -> Error {
    Error::CaptureUnavailable(reason.to_string())
}

/// Average interleaved frames down to one channel
#[must_use]
pub fn downmix(samples: &[f32], channels: u16) -> Vec<f32> {
    if channels <= 1 {
        return samples.to_vec();
    }

    #[allow(clippy::cast_precision_loss)]
    samples
        .chunks(usize::from(channels))
        .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
        .collect()
}

/// Encode mono f32 samples as 16-bit PCM WAV
///
/// # Errors
///
/// Returns error if WAV encoding fails
pub fn samples_to_wav(samples: &[f32], sample_rate: u32) -> Result<Vec<u8>> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let wav_err = |e: hound::Error| Error::Audio(format!("WAV encode error: {e}"));

    let mut out = std::io::Cursor::new(Vec::with_capacity(44 + samples.len() * 2));
    let mut writer = hound::WavWriter::new(&mut out, spec).map_err(wav_err)?;
    for &sample in samples {
        writer.write_sample(to_pcm16(sample)).map_err(wav_err)?;
    }
    writer.finalize().map_err(wav_err)?;

    Ok(out.into_inner())
}

#[allow(clippy::cast_possible_truncation)]
fn to_pcm16(sample: f32) -> i16 {
    (sample * 32767.0).clamp(-32768.0, 32767.0) as i16
}
