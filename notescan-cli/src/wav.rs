//! WAV decoding into the mono `f32` samples the pipeline expects.

use anyhow::{Context, Result};
use std::path::Path;

/// Decoded, mono audio.
#[derive(Debug, Clone)]
pub struct DecodedAudio {
    /// Mono samples in [-1, 1].
    pub samples: Vec<f32>,
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Channel count of the source file.
    pub channels: u16,
}

/// Reads a WAV file and averages its channels to mono.
///
/// Integer formats are scaled into [-1, 1] by their bit depth.
pub fn read_wav_mono(path: &Path) -> Result<DecodedAudio> {
    let mut reader = hound::WavReader::open(path)
        .with_context(|| format!("cannot open WAV file {}", path.display()))?;
    let spec = reader.spec();

    let interleaved: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<Result<_, _>>()
            .with_context(|| format!("corrupt samples in {}", path.display()))?,
        hound::SampleFormat::Int => {
            let scale = (1i64 << (spec.bits_per_sample.saturating_sub(1))) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<Result<_, _>>()
                .with_context(|| format!("corrupt samples in {}", path.display()))?
        }
    };

    Ok(DecodedAudio {
        samples: mix_to_mono(&interleaved, spec.channels),
        sample_rate: spec.sample_rate,
        channels: spec.channels,
    })
}

/// Averages interleaved frames down to one channel.
pub fn mix_to_mono(interleaved: &[f32], channels: u16) -> Vec<f32> {
    match channels {
        0 | 1 => interleaved.to_vec(),
        n => interleaved
            .chunks_exact(n as usize)
            .map(|frame| frame.iter().sum::<f32>() / n as f32)
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("notescan-{}-{}", std::process::id(), name))
    }

    #[test]
    fn test_mix_to_mono_averages_frames() {
        let stereo = [1.0, 0.0, 0.5, 0.5, -1.0, 1.0];
        assert_eq!(mix_to_mono(&stereo, 2), vec![0.5, 0.5, 0.0]);
        assert_eq!(mix_to_mono(&stereo, 1), stereo.to_vec());
    }

    #[test]
    fn test_reads_16_bit_stereo() {
        let path = temp_path("stereo16.wav");
        let spec = hound::WavSpec {
            channels: 2,
            sample_rate: 22050,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(&path, spec).unwrap();
        for _ in 0..10 {
            writer.write_sample(i16::MAX).unwrap();
            writer.write_sample(0i16).unwrap();
        }
        writer.finalize().unwrap();

        let audio = read_wav_mono(&path).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(audio.sample_rate, 22050);
        assert_eq!(audio.channels, 2);
        assert_eq!(audio.samples.len(), 10);
        assert!((audio.samples[0] - 0.5).abs() < 1e-3);
    }

    #[test]
    fn test_reads_float_mono() {
        let path = temp_path("mono32f.wav");
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 44100,
            bits_per_sample: 32,
            sample_format: hound::SampleFormat::Float,
        };
        let mut writer = hound::WavWriter::create(&path, spec).unwrap();
        for sample in [0.25f32, -0.25, 0.75] {
            writer.write_sample(sample).unwrap();
        }
        writer.finalize().unwrap();

        let audio = read_wav_mono(&path).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(audio.samples, vec![0.25, -0.25, 0.75]);
    }

    #[test]
    fn test_missing_file_is_an_error() {
        assert!(read_wav_mono(Path::new("/nonexistent/notescan.wav")).is_err());
    }
}
