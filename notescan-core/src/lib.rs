// notescan-core/src/lib.rs

//! The core logic for note scanning.
//! This crate turns mono sample buffers into timed note events: it detects
//! pitch frame by frame, quantizes the results into chords and maps those
//! onto playback offsets or a MIDI tick grid. It is completely headless and
//! does no audio I/O.
//!
//! ```no_run
//! use notescan_core::{AnalysisConfig, SampleBuffer, analyze};
//!
//! let samples: Vec<f32> = vec![]; // decoded mono audio
//! let buffer = SampleBuffer::new(&samples, 44100)?;
//! let notes = analyze(buffer, &AnalysisConfig::default())?;
//! for note in &notes {
//!     println!("{:.3}s {:?}", note.time, note.midi_notes);
//! }
//! # Ok::<(), notescan_core::AnalysisError>(())
//! ```

pub mod config;
pub mod error;
pub mod export;
pub mod fft;
pub mod pitch;
pub mod quantize;
pub mod scanner;
pub mod schedule;
pub mod spectral;
pub mod stream;
pub mod tuning;

pub use config::{AnalysisConfig, EstimatorKind, MonophonicConfig, QuantizeConfig, SpectralConfig};
pub use error::{AnalysisError, Result};
pub use export::MidiExportConfig;
pub use pitch::{PitchDetection, PitchEstimator};
pub use quantize::NoteEvent;
pub use scanner::{CancelFlag, Estimator, FrameScanner, RawPitchEvent, SampleBuffer, ScanProgress};

/// Runs the configured estimator over every frame of `buffer`.
///
/// # Errors
/// * `InvalidConfig` - the configuration fails validation
pub fn detect_events(buffer: SampleBuffer<'_>, config: &AnalysisConfig) -> Result<Vec<RawPitchEvent>> {
    config.validate()?;
    let scanner = FrameScanner::new(
        buffer,
        Estimator::from_config(config),
        config.window_size,
        config.hop_size,
    )?;
    scanner.scan_with(None, None)
}

/// Full pipeline: frame scan, pitch estimation and quantization.
///
/// The result depends only on the samples and the configuration; running it
/// twice gives identical notes. A buffer shorter than one window yields no
/// notes.
///
/// # Errors
/// * `InvalidConfig` - the configuration fails validation
pub fn analyze(buffer: SampleBuffer<'_>, config: &AnalysisConfig) -> Result<Vec<NoteEvent>> {
    analyze_with(buffer, config, None, None)
}

/// [`analyze`] with optional progress reporting and cancellation.
///
/// # Errors
/// * `InvalidConfig` - the configuration fails validation
/// * `Cancelled` - `cancel` was raised before the scan finished
pub fn analyze_with(
    buffer: SampleBuffer<'_>,
    config: &AnalysisConfig,
    observer: Option<&mut dyn scanner::ProgressObserver>,
    cancel: Option<&CancelFlag>,
) -> Result<Vec<NoteEvent>> {
    config.validate()?;
    log::debug!(
        "Analyzing {:.2}s of audio ({} samples at {} Hz) with the {:?} estimator",
        buffer.duration_seconds(),
        buffer.len(),
        buffer.sample_rate(),
        config.estimator
    );

    let scanner = FrameScanner::new(
        buffer,
        Estimator::from_config(config),
        config.window_size,
        config.hop_size,
    )?;
    let events = scanner.scan_with(observer, cancel)?;
    quantize::quantize(&events, &config.quantize)
}
