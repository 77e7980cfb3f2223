//! Error types for the note scanning pipeline.
//!
//! "No pitch" is not an error: estimators report it as `None` or an empty
//! detection list. Everything here is a caller contract violation or an
//! aborted run.

use thiserror::Error;

/// Errors that can occur while scanning, quantizing or exporting.
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// The sample buffer holds no samples at all.
    #[error("Empty sample buffer: no analysis possible")]
    EmptyBuffer,

    /// The sample rate is zero.
    #[error("Invalid sample rate: {0} Hz")]
    InvalidSampleRate(u32),

    /// A configuration value is out of its accepted range.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Raw pitch events were handed to the quantizer out of time order.
    #[error("Event {index} at {time}s precedes the previous event at {previous}s")]
    UnorderedEvents {
        /// Position of the offending event in the input.
        index: usize,
        /// Its time in seconds.
        time: f64,
        /// Time of the event before it.
        previous: f64,
    },

    /// The run was cancelled at a frame boundary.
    #[error("Scan cancelled after {frames_completed} frames")]
    Cancelled {
        /// Frames fully analysed before the cancellation was observed.
        frames_completed: usize,
    },

    /// Writing the exported note file failed.
    #[error("Export failed: {0}")]
    Export(#[from] std::io::Error),
}

/// Result type for pipeline operations.
pub type Result<T> = std::result::Result<T, AnalysisError>;
