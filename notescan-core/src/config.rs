//! # Configuration Module
//!
//! Every tunable of the pipeline lives here as an explicit parameter. The
//! structs derive serde so a whole analysis profile can be saved to and
//! loaded from a file; missing fields fall back to their defaults.

use serde::{Deserialize, Serialize};

use crate::error::{AnalysisError, Result};

/// Which estimator the frame scanner runs on each frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EstimatorKind {
    /// One dominant frequency per frame (time-domain correlation).
    #[default]
    Monophonic,
    /// Several simultaneous fundamentals per frame (magnitude spectrum).
    Polyphonic,
}

/// How the magnitude spectrum is computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpectrumMethod {
    /// Direct summation of the discrete Fourier transform.
    #[default]
    Direct,
    /// Same magnitudes computed with RustFFT.
    Fft,
}

/// Window applied to a frame before the spectrum is taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WindowFunction {
    /// Samples are used as-is.
    #[default]
    Rectangular,
    /// Hann taper, reduces spectral leakage.
    Hann,
}

/// Parameters of the monophonic (correlation) estimator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonophonicConfig {
    /// Frames with an RMS below this are treated as silence (default: 0.01)
    pub silence_threshold: f64,
    /// A lag must score above this to be accepted (default: 0.9)
    pub correlation_threshold: f64,
    /// Lowest frequency reported, in Hz (default: 50.0)
    pub min_frequency: f64,
    /// Highest frequency reported, in Hz (default: 1000.0)
    pub max_frequency: f64,
}

impl Default for MonophonicConfig {
    fn default() -> Self {
        Self {
            silence_threshold: 0.01,
            correlation_threshold: 0.9,
            min_frequency: 50.0,
            max_frequency: 1000.0,
        }
    }
}

/// Parameters of the polyphonic (spectral) estimator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpectralConfig {
    /// Minimum normalized magnitude for a bin to count as a peak (default: 0.01)
    pub peak_threshold: f64,
    /// Allowed distance from an integer frequency ratio for a harmonic (default: 0.1)
    pub harmonic_tolerance: f64,
    /// Lowest peak frequency kept, in Hz (default: 50.0)
    pub min_frequency: f64,
    /// Highest peak frequency kept, in Hz (default: 4000.0)
    pub max_frequency: f64,
    /// Loudest peaks retained before harmonic filtering (default: 10)
    pub max_peaks: usize,
    /// Bins skipped at each end of the spectrum (default: 10)
    pub edge_bins: usize,
    /// A peak must beat every bin within this many bins of it (default: 5)
    pub peak_neighborhood: usize,
    /// Spectrum computation (default: direct summation)
    pub method: SpectrumMethod,
    /// Window applied before the transform (default: rectangular)
    pub window: WindowFunction,
    /// Subtract the frame mean before the transform (default: false)
    pub remove_dc: bool,
}

impl Default for SpectralConfig {
    fn default() -> Self {
        Self {
            peak_threshold: 0.01,
            harmonic_tolerance: 0.1,
            min_frequency: 50.0,
            max_frequency: 4000.0,
            max_peaks: 10,
            edge_bins: 10,
            peak_neighborhood: 5,
            method: SpectrumMethod::Direct,
            window: WindowFunction::Rectangular,
            remove_dc: false,
        }
    }
}

/// Parameters of the note quantizer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuantizeConfig {
    /// Events closer than this to the group start join the group (default: 0.02)
    pub time_window_seconds: f64,
    /// Duration given to the last note, which has no successor (default: 0.2)
    pub default_duration_seconds: f64,
    /// Lower clamp for gap-derived durations (default: 0.05)
    pub min_duration_seconds: f64,
    /// Upper clamp for gap-derived durations (default: 2.0)
    pub max_duration_seconds: f64,
}

impl Default for QuantizeConfig {
    fn default() -> Self {
        Self {
            time_window_seconds: 0.02,
            default_duration_seconds: 0.2,
            min_duration_seconds: 0.05,
            max_duration_seconds: 2.0,
        }
    }
}

impl QuantizeConfig {
    /// Checks that every duration is positive and the clamp range is ordered.
    pub fn validate(&self) -> Result<()> {
        positive("quantize.time_window_seconds", self.time_window_seconds)?;
        positive("quantize.default_duration_seconds", self.default_duration_seconds)?;
        positive("quantize.min_duration_seconds", self.min_duration_seconds)?;
        positive("quantize.max_duration_seconds", self.max_duration_seconds)?;
        if self.min_duration_seconds > self.max_duration_seconds {
            return Err(AnalysisError::InvalidConfig(format!(
                "quantize.min_duration_seconds ({}) exceeds max_duration_seconds ({})",
                self.min_duration_seconds, self.max_duration_seconds
            )));
        }
        Ok(())
    }
}

/// Complete analysis profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Estimator run on each frame (default: monophonic)
    pub estimator: EstimatorKind,
    /// Samples per analysis frame (default: 2048)
    pub window_size: usize,
    /// Samples between consecutive frame starts (default: 512)
    pub hop_size: usize,
    /// Monophonic estimator parameters
    pub monophonic: MonophonicConfig,
    /// Spectral estimator parameters
    pub spectral: SpectralConfig,
    /// Quantizer parameters
    pub quantize: QuantizeConfig,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            estimator: EstimatorKind::Monophonic,
            window_size: 2048,
            hop_size: 512,
            monophonic: MonophonicConfig::default(),
            spectral: SpectralConfig::default(),
            quantize: QuantizeConfig::default(),
        }
    }
}

impl AnalysisConfig {
    /// Profile tuned for chords: polyphonic estimator on a 4096-sample window.
    pub fn polyphonic() -> Self {
        Self {
            estimator: EstimatorKind::Polyphonic,
            window_size: 4096,
            hop_size: 1024,
            ..Self::default()
        }
    }

    /// Rejects parameter combinations the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.window_size == 0 {
            return Err(AnalysisError::InvalidConfig("window_size must be non-zero".into()));
        }
        if self.hop_size == 0 {
            return Err(AnalysisError::InvalidConfig("hop_size must be non-zero".into()));
        }
        if self.hop_size > self.window_size {
            return Err(AnalysisError::InvalidConfig(format!(
                "hop_size ({}) exceeds window_size ({})",
                self.hop_size, self.window_size
            )));
        }

        let mono = &self.monophonic;
        non_negative("monophonic.silence_threshold", mono.silence_threshold)?;
        range("monophonic", mono.min_frequency, mono.max_frequency)?;

        let spectral = &self.spectral;
        non_negative("spectral.peak_threshold", spectral.peak_threshold)?;
        positive("spectral.harmonic_tolerance", spectral.harmonic_tolerance)?;
        range("spectral", spectral.min_frequency, spectral.max_frequency)?;
        if spectral.max_peaks == 0 {
            return Err(AnalysisError::InvalidConfig("spectral.max_peaks must be non-zero".into()));
        }

        self.quantize.validate()
    }
}

fn positive(name: &str, value: f64) -> Result<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(AnalysisError::InvalidConfig(format!("{name} must be positive, got {value}")))
    }
}

fn non_negative(name: &str, value: f64) -> Result<()> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(AnalysisError::InvalidConfig(format!("{name} must be non-negative, got {value}")))
    }
}

fn range(section: &str, min: f64, max: f64) -> Result<()> {
    positive(&format!("{section}.min_frequency"), min)?;
    positive(&format!("{section}.max_frequency"), max)?;
    if min >= max {
        return Err(AnalysisError::InvalidConfig(format!(
            "{section} frequency range is empty: {min} - {max} Hz"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(AnalysisConfig::default().validate().is_ok());
        assert!(AnalysisConfig::polyphonic().validate().is_ok());
    }

    #[test]
    fn test_rejects_zero_hop() {
        let config = AnalysisConfig { hop_size: 0, ..AnalysisConfig::default() };
        assert!(matches!(config.validate(), Err(AnalysisError::InvalidConfig(_))));
    }

    #[test]
    fn test_rejects_hop_larger_than_window() {
        let config = AnalysisConfig { window_size: 1024, hop_size: 2048, ..AnalysisConfig::default() };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_inverted_duration_clamp() {
        let mut config = AnalysisConfig::default();
        config.quantize.min_duration_seconds = 3.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_zero_time_window() {
        let mut config = AnalysisConfig::default();
        config.quantize.time_window_seconds = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_profile_fills_defaults() {
        let json = r#"{ "estimator": "polyphonic", "spectral": { "peak_threshold": 0.05 } }"#;
        let config: AnalysisConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.estimator, EstimatorKind::Polyphonic);
        assert_eq!(config.spectral.peak_threshold, 0.05);
        assert_eq!(config.spectral.max_peaks, 10);
        assert_eq!(config.window_size, 2048);
        assert_eq!(config.quantize, QuantizeConfig::default());
    }
}
