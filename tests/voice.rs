//! Voice pipeline integration tests
//!
//! Tests audio encoding without requiring audio hardware

use std::io::Cursor;

use parley::voice::{AudioArtifact, MIME_MPEG, MIME_WAV, SAMPLE_RATE, downmix, samples_to_wav};

/// Generate sine wave audio samples
fn generate_sine_samples(frequency: f32, duration_secs: f32, amplitude: f32) -> Vec<f32> {
    let num_samples = (SAMPLE_RATE as f32 * duration_secs) as usize;
    (0..num_samples)
        .map(|i| {
            let t = i as f32 / SAMPLE_RATE as f32;
            amplitude * (2.0 * std::f32::consts::PI * frequency * t).sin()
        })
        .collect()
}

#[test]
fn test_samples_to_wav() {
    let samples = generate_sine_samples(440.0, 0.1, 0.5);
    let wav_data = samples_to_wav(&samples, SAMPLE_RATE).unwrap();

    // Check WAV header
    assert_eq!(&wav_data[0..4], b"RIFF");
    assert_eq!(&wav_data[8..12], b"WAVE");

    // 16-bit mono after the 44 byte header
    assert_eq!(wav_data.len(), 44 + samples.len() * 2);
}

#[test]
fn test_wav_roundtrip() {
    let original_samples = generate_sine_samples(440.0, 0.1, 0.5);
    let wav_data = samples_to_wav(&original_samples, SAMPLE_RATE).unwrap();

    let mut reader = hound::WavReader::new(Cursor::new(wav_data)).unwrap();
    let spec = reader.spec();
    assert_eq!(spec.channels, 1);
    assert_eq!(spec.sample_rate, SAMPLE_RATE);
    assert_eq!(spec.bits_per_sample, 16);

    let decoded: Vec<f32> = reader
        .samples::<i16>()
        .map(|s| f32::from(s.unwrap()) / 32767.0)
        .collect();

    assert_eq!(decoded.len(), original_samples.len());
    for (a, b) in original_samples.iter().zip(&decoded) {
        assert!((a - b).abs() < 0.001, "sample drifted: {a} vs {b}");
    }
}

#[test]
fn test_wav_keeps_device_rate() {
    // Devices without 16 kHz support record at their own rate
    let samples = vec![0.0; 4410];
    let wav_data = samples_to_wav(&samples, 44_100).unwrap();

    let reader = hound::WavReader::new(Cursor::new(wav_data)).unwrap();
    assert_eq!(reader.spec().sample_rate, 44_100);
    assert_eq!(reader.duration(), 4410);
}

#[test]
fn test_wav_clamps_out_of_range_samples() {
    let wav_data = samples_to_wav(&[2.0, -2.0], SAMPLE_RATE).unwrap();

    let mut reader = hound::WavReader::new(Cursor::new(wav_data)).unwrap();
    let decoded: Vec<i16> = reader.samples::<i16>().map(Result::unwrap).collect();
    assert_eq!(decoded, vec![i16::MAX, i16::MIN]);
}

#[test]
fn test_stereo_capture_downmixed_before_encoding() {
    // Left channel carries the tone, right is silent
    let tone = generate_sine_samples(440.0, 0.05, 0.8);
    let stereo: Vec<f32> = tone.iter().flat_map(|&s| [s, 0.0]).collect();

    let mono = downmix(&stereo, 2);
    assert_eq!(mono.len(), tone.len());
    assert!((mono[10] - tone[10] / 2.0).abs() < f32::EPSILON);

    let wav_data = samples_to_wav(&mono, SAMPLE_RATE).unwrap();
    let reader = hound::WavReader::new(Cursor::new(wav_data)).unwrap();
    assert_eq!(reader.spec().channels, 1);
}

#[test]
fn test_audio_artifact_extension() {
    let wav = AudioArtifact::new(vec![1, 2, 3], MIME_WAV);
    assert_eq!(wav.extension(), "wav");
    assert_eq!(wav.len(), 3);

    let mp3 = AudioArtifact::new(Vec::new(), MIME_MPEG);
    assert_eq!(mp3.extension(), "mp3");
    assert!(mp3.is_empty());

    assert_eq!(AudioArtifact::new(vec![0], "audio/webm").extension(), "webm");
    assert_eq!(AudioArtifact::new(vec![0], "application/x-unknown").extension(), "bin");
}
