//! # Polyphonic Spectral Estimator
//!
//! Finds several simultaneous fundamentals in one frame: local maxima of
//! the magnitude spectrum are picked, the loudest are kept, and peaks that
//! sit on a harmonic of a lower accepted peak are discarded.

use std::cmp::Ordering;

use crate::config::SpectralConfig;
use crate::fft::{bin_to_hz, magnitude_spectrum};
use crate::pitch::{PitchDetection, PitchEstimator};

/// A local maximum of the magnitude spectrum.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpectralPeak {
    /// Spectrum bin index.
    pub bin: usize,
    /// Bin centre frequency in Hz.
    pub frequency_hz: f64,
    /// Normalized magnitude at the bin.
    pub amplitude: f64,
}

/// Locates spectral peaks inside the configured frequency range.
///
/// A bin is a peak when it exceeds `peak_threshold` and is strictly greater
/// than every other bin within `peak_neighborhood` of it. The first and last
/// `edge_bins` bins are never considered.
///
/// # Arguments
/// * `spectrum` - Magnitudes from [`magnitude_spectrum`]
/// * `sample_rate` - Sample rate in Hz
/// * `frame_len` - Length of the frame the spectrum was computed from
/// * `config` - Threshold, neighbourhood and range settings
pub fn find_peaks(
    spectrum: &[f64],
    sample_rate: u32,
    frame_len: usize,
    config: &SpectralConfig,
) -> Vec<SpectralPeak> {
    let len = spectrum.len();
    if len <= 2 * config.edge_bins {
        return Vec::new();
    }
    let radius = config.peak_neighborhood;

    (config.edge_bins..len - config.edge_bins)
        .filter(|&bin| {
            let value = spectrum[bin];
            if value <= config.peak_threshold {
                return false;
            }
            let lo = bin.saturating_sub(radius);
            let hi = (bin + radius).min(len - 1);
            (lo..=hi).all(|other| other == bin || value > spectrum[other])
        })
        .map(|bin| SpectralPeak {
            bin,
            frequency_hz: bin_to_hz(bin, sample_rate, frame_len),
            amplitude: spectrum[bin],
        })
        .filter(|peak| {
            peak.frequency_hz >= config.min_frequency && peak.frequency_hz <= config.max_frequency
        })
        .collect()
}

/// Keeps the `max_peaks` loudest peaks, loudest first.
///
/// The sort is stable, so equally loud peaks keep their bin order.
pub fn loudest_peaks(mut peaks: Vec<SpectralPeak>, max_peaks: usize) -> Vec<SpectralPeak> {
    peaks.sort_by(|a, b| b.amplitude.partial_cmp(&a.amplitude).unwrap_or(Ordering::Equal));
    peaks.truncate(max_peaks);
    peaks
}

/// Whether `frequency` lies on a harmonic (2nd or higher) of `fundamental`.
///
/// The ratio must be within `tolerance` of its nearest integer, and that
/// integer must be greater than one.
pub fn is_harmonic(frequency: f64, fundamental: f64, tolerance: f64) -> bool {
    if fundamental <= 0.0 {
        return false;
    }
    let ratio = frequency / fundamental;
    let nearest = ratio.round();
    nearest > 1.0 && (ratio - nearest).abs() < tolerance
}

/// Removes peaks that are harmonics of a lower fundamental.
///
/// Peaks are walked once in ascending frequency. A peak not yet excluded
/// becomes a fundamental and excludes every later peak on one of its
/// harmonics. Exclusions are final: when two true fundamentals are
/// harmonically related, the lower one wins.
///
/// # Returns
/// * The surviving fundamentals, ascending in frequency
pub fn filter_harmonics(peaks: &[SpectralPeak], tolerance: f64) -> Vec<SpectralPeak> {
    let mut sorted = peaks.to_vec();
    sorted.sort_by(|a, b| {
        a.frequency_hz
            .partial_cmp(&b.frequency_hz)
            .unwrap_or(Ordering::Equal)
    });

    let mut excluded = vec![false; sorted.len()];
    let mut fundamentals: Vec<SpectralPeak> = Vec::new();

    for i in 0..sorted.len() {
        if excluded[i] {
            continue;
        }
        let candidate = sorted[i];
        if fundamentals
            .iter()
            .any(|f| is_harmonic(candidate.frequency_hz, f.frequency_hz, tolerance))
        {
            continue;
        }

        fundamentals.push(candidate);
        for j in (i + 1)..sorted.len() {
            if !excluded[j] && is_harmonic(sorted[j].frequency_hz, candidate.frequency_hz, tolerance)
            {
                excluded[j] = true;
            }
        }
    }

    fundamentals
}

/// Detects the fundamentals present in one frame.
///
/// # Returns
/// * One detection per fundamental, ascending in frequency, with its
///   amplitude clamped into [0, 1]. Empty when nothing clears the threshold.
pub fn detect_polyphonic(
    frame: &[f32],
    sample_rate: u32,
    config: &SpectralConfig,
) -> Vec<PitchDetection> {
    if sample_rate == 0 {
        return Vec::new();
    }
    let spectrum = magnitude_spectrum(frame, config.method, config.window, config.remove_dc);
    let peaks = find_peaks(&spectrum, sample_rate, frame.len(), config);
    if peaks.is_empty() {
        return Vec::new();
    }

    let loudest = loudest_peaks(peaks, config.max_peaks);
    let fundamentals = filter_harmonics(&loudest, config.harmonic_tolerance);
    log::trace!(
        "spectral frame: {} peaks kept, {} fundamentals",
        loudest.len(),
        fundamentals.len()
    );

    fundamentals
        .into_iter()
        .map(|peak| PitchDetection {
            frequency_hz: peak.frequency_hz,
            amplitude: Some(peak.amplitude.clamp(0.0, 1.0)),
        })
        .collect()
}

/// [`PitchEstimator`] wrapper around [`detect_polyphonic`].
#[derive(Debug, Clone, Default)]
pub struct SpectralEstimator {
    config: SpectralConfig,
}

impl SpectralEstimator {
    /// Creates an estimator with the given parameters.
    pub fn new(config: SpectralConfig) -> Self {
        Self { config }
    }

    /// The parameters this estimator runs with.
    pub fn config(&self) -> &SpectralConfig {
        &self.config
    }
}

impl PitchEstimator for SpectralEstimator {
    fn detect(&self, frame: &[f32], sample_rate: u32) -> Vec<PitchDetection> {
        detect_polyphonic(frame, sample_rate, &self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SpectrumMethod;
    use approx::assert_relative_eq;
    use std::f32::consts::PI;

    const SAMPLE_RATE: u32 = 44100;
    const FRAME: usize = 4096;

    fn peak(frequency_hz: f64, amplitude: f64) -> SpectralPeak {
        SpectralPeak { bin: 0, frequency_hz, amplitude }
    }

    /// Sum of sines placed exactly on bin centres, so nothing leaks.
    fn bin_chord(partials: &[(usize, f32)]) -> Vec<f32> {
        (0..FRAME)
            .map(|i| {
                partials
                    .iter()
                    .map(|&(bin, amp)| amp * (2.0 * PI * bin as f32 * i as f32 / FRAME as f32).sin())
                    .sum()
            })
            .collect()
    }

    #[test]
    fn test_harmonic_series_collapses_to_fundamental() {
        let peaks = vec![peak(220.0, 0.5), peak(440.0, 0.3), peak(660.0, 0.2)];
        let kept = filter_harmonics(&peaks, 0.1);
        assert_eq!(kept.len(), 1);
        assert_relative_eq!(kept[0].frequency_hz, 220.0);
    }

    #[test]
    fn test_harmonic_filter_ignores_input_order() {
        let peaks = vec![peak(660.0, 0.9), peak(220.0, 0.2), peak(440.0, 0.5)];
        let kept = filter_harmonics(&peaks, 0.1);
        assert_eq!(kept.len(), 1);
        assert_relative_eq!(kept[0].frequency_hz, 220.0);
    }

    #[test]
    fn test_unrelated_peaks_survive() {
        // 550 / 440 = 1.25 rounds to 1, which is not a harmonic.
        let peaks = vec![peak(440.0, 0.5), peak(550.0, 0.4), peak(1100.0, 0.1)];
        let kept = filter_harmonics(&peaks, 0.1);
        let freqs: Vec<f64> = kept.iter().map(|p| p.frequency_hz).collect();
        assert_eq!(freqs, vec![440.0, 550.0]);
    }

    #[test]
    fn test_related_fundamentals_lower_wins() {
        let peaks = vec![peak(200.0, 0.2), peak(400.0, 0.9)];
        let kept = filter_harmonics(&peaks, 0.1);
        assert_eq!(kept.len(), 1);
        assert_relative_eq!(kept[0].frequency_hz, 200.0);
    }

    #[test]
    fn test_is_harmonic_tolerance() {
        assert!(is_harmonic(445.0, 220.0, 0.1));
        assert!(!is_harmonic(470.0, 220.0, 0.1));
        assert!(!is_harmonic(220.0, 220.0, 0.1));
        assert!(!is_harmonic(440.0, 0.0, 0.1));
    }

    #[test]
    fn test_loudest_peaks_truncates_and_orders() {
        let peaks = (1..=15).map(|i| peak(i as f64 * 100.0, i as f64 / 100.0)).collect();
        let loudest = loudest_peaks(peaks, 10);
        assert_eq!(loudest.len(), 10);
        assert_relative_eq!(loudest[0].amplitude, 0.15);
        assert_relative_eq!(loudest[9].amplitude, 0.06);
    }

    #[test]
    fn test_find_peaks_respects_edges_and_neighbourhood() {
        let mut spectrum = vec![0.0; 100];
        spectrum[5] = 1.0; // inside the edge band
        spectrum[30] = 0.5;
        spectrum[33] = 0.4; // within 5 bins of a louder one
        spectrum[60] = 0.2;
        spectrum[61] = 0.2; // ties are not strict maxima
        let config = SpectralConfig { min_frequency: 0.0, ..SpectralConfig::default() };
        let peaks = find_peaks(&spectrum, 200, 200, &config);
        let bins: Vec<usize> = peaks.iter().map(|p| p.bin).collect();
        assert_eq!(bins, vec![30]);
    }

    #[test]
    fn test_find_peaks_applies_frequency_range() {
        let mut spectrum = vec![0.0; 2048];
        spectrum[20] = 0.5; // ~215 Hz
        spectrum[500] = 0.5; // ~5383 Hz
        let peaks = find_peaks(&spectrum, SAMPLE_RATE, FRAME, &SpectralConfig::default());
        assert_eq!(peaks.len(), 1);
        assert_eq!(peaks[0].bin, 20);
    }

    #[test]
    fn test_detects_two_note_chord_without_its_harmonics() {
        // Bins 41 and 52 are ~441 Hz and ~560 Hz; bin 82 is the octave of 41.
        let frame = bin_chord(&[(41, 0.6), (52, 0.5), (82, 0.3)]);
        for method in [SpectrumMethod::Direct, SpectrumMethod::Fft] {
            let config = SpectralConfig { method, ..SpectralConfig::default() };
            let detections = detect_polyphonic(&frame, SAMPLE_RATE, &config);
            let bins: Vec<f64> = detections
                .iter()
                .map(|d| (d.frequency_hz * FRAME as f64 / SAMPLE_RATE as f64).round())
                .collect();
            assert_eq!(bins, vec![41.0, 52.0], "{:?}", method);
            let amplitude = detections[0].amplitude.unwrap();
            assert!((amplitude - 0.3).abs() < 1e-3, "amplitude {}", amplitude);
        }
    }

    #[test]
    fn test_silent_frame_has_no_peaks() {
        let frame = vec![0.0f32; 1024];
        assert!(detect_polyphonic(&frame, SAMPLE_RATE, &SpectralConfig::default()).is_empty());
    }

    #[test]
    fn test_tiny_frame_is_empty() {
        let frame = vec![0.5f32; 16];
        assert!(SpectralEstimator::default().detect(&frame, SAMPLE_RATE).is_empty());
    }
}
