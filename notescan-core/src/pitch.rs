//! # Pitch Detection Module
//!
//! The monophonic estimator and the [`PitchEstimator`] seam the frame
//! scanner drives. The estimator works in the time domain: it compares the
//! first half of a frame against lagged copies of itself and reports the
//! lag of best self-similarity as the period.
//!
//! ## Features
//! - RMS noise gate to reject silence before any correlation work
//! - Difference-based correlation over every lag in the first half frame
//! - Rising-edge acceptance that skips the trivial zero-lag peak
//! - Frequency range guard on the final estimate
//!
//! The lag search is O(M²) in the half-frame length M and dominates the
//! cost of a monophonic scan.

use crate::config::MonophonicConfig;

/// One pitch found in one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PitchDetection {
    /// Detected frequency in Hz.
    pub frequency_hz: f64,
    /// Spectral amplitude in [0, 1], when the estimator measures one.
    pub amplitude: Option<f64>,
}

/// A per-frame pitch estimator.
///
/// Implementations must be pure: the same frame and sample rate always give
/// the same detections. An empty result means "no pitch" and is not an error.
pub trait PitchEstimator {
    /// Detects the pitches present in a single frame.
    fn detect(&self, frame: &[f32], sample_rate: u32) -> Vec<PitchDetection>;
}

/// Root-mean-square level of a frame.
pub fn rms(signal: &[f32]) -> f64 {
    if signal.is_empty() {
        return 0.0;
    }
    (signal.iter().map(|&s| (s as f64) * (s as f64)).sum::<f64>() / signal.len() as f64).sqrt()
}

/// Detects the dominant frequency of a frame by lag-domain difference correlation.
///
/// # Arguments
/// * `signal` - One analysis frame
/// * `sample_rate` - Sample rate in Hz
/// * `config` - Silence gate, acceptance threshold and frequency range
///
/// # Returns
/// * `Some(frequency)` - Detected frequency in Hz
/// * `None` - No pitch (silence, no periodicity, or out of range)
pub fn detect_pitch_correlation(
    signal: &[f32],
    sample_rate: u32,
    config: &MonophonicConfig,
) -> Option<f64> {
    let half = signal.len() / 2;
    if half < 2 || sample_rate == 0 {
        return None;
    }

    // --- Noise gate ---
    if rms(signal) < config.silence_threshold {
        return None;
    }

    // --- Lag search ---
    // The zero-lag score is exactly 1.0, so seeding `previous` with it means
    // lag 0 can never pass the rising-edge test.
    let reference = &signal[..half];
    let mut previous = 1.0;
    let mut best_offset = 0;
    let mut best_correlation = f64::NEG_INFINITY;
    let mut in_region = false;

    for offset in 0..half {
        let lagged = &signal[offset..offset + half];
        let sum: f64 = reference
            .iter()
            .zip(lagged)
            .map(|(&a, &b)| (a as f64 - b as f64).abs())
            .sum();
        let correlation = 1.0 - sum / half as f64;

        if correlation > config.correlation_threshold && correlation > previous {
            in_region = true;
            if correlation > best_correlation {
                best_correlation = correlation;
                best_offset = offset;
            }
        } else if in_region {
            // The first qualifying region has ended; later regions sit on
            // period multiples.
            break;
        }
        previous = correlation;
    }

    if best_offset == 0 {
        return None;
    }

    let frequency = sample_rate as f64 / best_offset as f64;
    log::trace!(
        "correlation pitch: lag {} (score {:.4}) -> {:.2} Hz",
        best_offset,
        best_correlation,
        frequency
    );

    if frequency >= config.min_frequency && frequency <= config.max_frequency {
        Some(frequency)
    } else {
        None
    }
}

/// [`PitchEstimator`] wrapper around [`detect_pitch_correlation`].
#[derive(Debug, Clone, Default)]
pub struct MonophonicEstimator {
    config: MonophonicConfig,
}

impl MonophonicEstimator {
    /// Creates an estimator with the given parameters.
    pub fn new(config: MonophonicConfig) -> Self {
        Self { config }
    }

    /// The parameters this estimator runs with.
    pub fn config(&self) -> &MonophonicConfig {
        &self.config
    }
}

impl PitchEstimator for MonophonicEstimator {
    fn detect(&self, frame: &[f32], sample_rate: u32) -> Vec<PitchDetection> {
        detect_pitch_correlation(frame, sample_rate, &self.config)
            .map(|frequency_hz| PitchDetection {
                frequency_hz,
                amplitude: None,
            })
            .into_iter()
            .collect()
    }
}
