//! # Frame Scanner
//!
//! Slides a fixed analysis window across a sample buffer at a fixed hop and
//! runs a [`PitchEstimator`] on every frame. Frames start at sample `0, hop,
//! 2·hop, …` for as long as the whole window fits; every detection is tagged
//! with the frame's start time.
//!
//! Iteration is pull based: [`FrameScanner::events`] yields raw pitch events
//! lazily, and each call starts again from the first sample.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crossbeam_channel::Sender;

use crate::config::{AnalysisConfig, EstimatorKind};
use crate::error::{AnalysisError, Result};
use crate::pitch::{MonophonicEstimator, PitchDetection, PitchEstimator};
use crate::spectral::SpectralEstimator;

/// Read-only view of single-channel audio and its sample rate.
#[derive(Debug, Clone, Copy)]
pub struct SampleBuffer<'a> {
    samples: &'a [f32],
    sample_rate: u32,
}

impl<'a> SampleBuffer<'a> {
    /// Wraps decoded mono samples.
    ///
    /// # Errors
    /// * `EmptyBuffer` - no samples at all
    /// * `InvalidSampleRate` - the sample rate is zero
    pub fn new(samples: &'a [f32], sample_rate: u32) -> Result<Self> {
        if samples.is_empty() {
            return Err(AnalysisError::EmptyBuffer);
        }
        if sample_rate == 0 {
            return Err(AnalysisError::InvalidSampleRate(sample_rate));
        }
        Ok(Self { samples, sample_rate })
    }

    /// The samples.
    pub fn samples(&self) -> &'a [f32] {
        self.samples
    }

    /// Sample rate in Hz.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Number of samples.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Always false; an empty buffer cannot be constructed.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Length in seconds.
    pub fn duration_seconds(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }
}

/// One pitch observation at one frame time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RawPitchEvent {
    /// Frame start time in seconds.
    pub time: f64,
    /// Detected frequency in Hz.
    pub frequency_hz: f64,
    /// Spectral amplitude in [0, 1]; only the polyphonic estimator sets it.
    pub amplitude: Option<f64>,
}

impl RawPitchEvent {
    /// Tags a detection with the time of the frame it came from.
    pub fn from_detection(time: f64, detection: PitchDetection) -> Self {
        Self {
            time,
            frequency_hz: detection.frequency_hz,
            amplitude: detection.amplitude,
        }
    }
}

/// A window of samples at a known position in the buffer.
#[derive(Debug, Clone, Copy)]
pub struct Frame<'a> {
    /// Zero-based frame number.
    pub index: usize,
    /// Index of the first sample.
    pub start: usize,
    /// `start / sample_rate`, in seconds.
    pub time: f64,
    /// The frame's samples.
    pub samples: &'a [f32],
}

/// Number of whole frames that fit in `len` samples.
pub fn frame_count(len: usize, window_size: usize, hop_size: usize) -> usize {
    if window_size == 0 || hop_size == 0 || len < window_size {
        0
    } else {
        (len - window_size) / hop_size + 1
    }
}

/// Start time in seconds of the frame beginning at sample `start`.
pub fn frame_time(start: usize, sample_rate: u32) -> f64 {
    start as f64 / sample_rate as f64
}

/// Lazy iterator over the frames of a buffer.
#[derive(Debug, Clone)]
pub struct Frames<'a> {
    samples: &'a [f32],
    sample_rate: u32,
    window_size: usize,
    hop_size: usize,
    next_start: usize,
    index: usize,
}

impl<'a> Iterator for Frames<'a> {
    type Item = Frame<'a>;

    fn next(&mut self) -> Option<Frame<'a>> {
        let end = self.next_start.checked_add(self.window_size)?;
        if self.window_size == 0 || end > self.samples.len() {
            return None;
        }
        let frame = Frame {
            index: self.index,
            start: self.next_start,
            time: frame_time(self.next_start, self.sample_rate),
            samples: &self.samples[self.next_start..end],
        };
        self.next_start += self.hop_size;
        self.index += 1;
        Some(frame)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = frame_count(
            self.samples.len().saturating_sub(self.next_start),
            self.window_size,
            self.hop_size,
        );
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Frames<'_> {}

/// Iterates the frames of `buffer`, starting from its first sample.
pub fn frames(buffer: SampleBuffer<'_>, window_size: usize, hop_size: usize) -> Frames<'_> {
    Frames {
        samples: buffer.samples(),
        sample_rate: buffer.sample_rate(),
        window_size,
        hop_size,
        next_start: 0,
        index: 0,
    }
}

/// Progress of an eager scan, reported after each completed frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanProgress {
    /// Frames analysed so far.
    pub frames_completed: usize,
    /// Frames the scan will analyse in total.
    pub total_frames: usize,
}

impl ScanProgress {
    /// Completed fraction in [0, 1].
    pub fn fraction(&self) -> f32 {
        if self.total_frames == 0 {
            1.0
        } else {
            self.frames_completed as f32 / self.total_frames as f32
        }
    }
}

/// Receives progress at frame boundaries. Must not block.
pub trait ProgressObserver {
    /// Called once after every analysed frame.
    fn on_progress(&mut self, progress: ScanProgress);
}

impl<F: FnMut(ScanProgress)> ProgressObserver for F {
    fn on_progress(&mut self, progress: ScanProgress) {
        self(progress)
    }
}

/// Forwards progress over a crossbeam channel, dropping updates the
/// receiver is not ready for.
#[derive(Debug, Clone)]
pub struct ChannelProgress(pub Sender<ScanProgress>);

impl ProgressObserver for ChannelProgress {
    fn on_progress(&mut self, progress: ScanProgress) {
        // Full or disconnected channels are ignored; progress is advisory.
        let _ = self.0.try_send(progress);
    }
}

/// Shared cancellation request, honoured between frames.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    /// Creates a flag in the "not cancelled" state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    /// Whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// The estimator an [`AnalysisConfig`] selects.
#[derive(Debug, Clone)]
pub enum Estimator {
    /// Time-domain correlation estimator.
    Monophonic(MonophonicEstimator),
    /// Spectral peak estimator with harmonic filtering.
    Polyphonic(SpectralEstimator),
}

impl Estimator {
    /// Builds the estimator named by `config.estimator` with its parameters.
    pub fn from_config(config: &AnalysisConfig) -> Self {
        match config.estimator {
            EstimatorKind::Monophonic => {
                Estimator::Monophonic(MonophonicEstimator::new(config.monophonic.clone()))
            }
            EstimatorKind::Polyphonic => {
                Estimator::Polyphonic(SpectralEstimator::new(config.spectral.clone()))
            }
        }
    }
}

impl PitchEstimator for Estimator {
    fn detect(&self, frame: &[f32], sample_rate: u32) -> Vec<PitchDetection> {
        match self {
            Estimator::Monophonic(estimator) => estimator.detect(frame, sample_rate),
            Estimator::Polyphonic(estimator) => estimator.detect(frame, sample_rate),
        }
    }
}

impl<E: PitchEstimator + ?Sized> PitchEstimator for &E {
    fn detect(&self, frame: &[f32], sample_rate: u32) -> Vec<PitchDetection> {
        (**self).detect(frame, sample_rate)
    }
}

/// Runs an estimator over every frame of a buffer.
#[derive(Debug, Clone)]
pub struct FrameScanner<'a, E> {
    buffer: SampleBuffer<'a>,
    estimator: E,
    window_size: usize,
    hop_size: usize,
}

impl<'a, E: PitchEstimator> FrameScanner<'a, E> {
    /// Creates a scanner.
    ///
    /// # Errors
    /// * `InvalidConfig` - zero window or hop size
    pub fn new(
        buffer: SampleBuffer<'a>,
        estimator: E,
        window_size: usize,
        hop_size: usize,
    ) -> Result<Self> {
        if window_size == 0 || hop_size == 0 {
            return Err(AnalysisError::InvalidConfig(format!(
                "window_size ({window_size}) and hop_size ({hop_size}) must be non-zero"
            )));
        }
        Ok(Self {
            buffer,
            estimator,
            window_size,
            hop_size,
        })
    }

    /// The frames this scanner visits, from the start of the buffer.
    pub fn frames(&self) -> Frames<'a> {
        frames(self.buffer, self.window_size, self.hop_size)
    }

    /// Number of frames a full scan analyses.
    pub fn frame_count(&self) -> usize {
        frame_count(self.buffer.len(), self.window_size, self.hop_size)
    }

    /// Lazy sequence of raw pitch events in time order.
    pub fn events(&self) -> PitchEvents<'_, 'a, E> {
        PitchEvents {
            frames: self.frames(),
            estimator: &self.estimator,
            sample_rate: self.buffer.sample_rate(),
            pending: VecDeque::new(),
        }
    }

    /// Scans the whole buffer.
    pub fn scan(&self) -> Vec<RawPitchEvent> {
        self.events().collect()
    }

    /// Scans the whole buffer with optional progress reporting and cancellation.
    ///
    /// Cancellation is checked before each frame. A cancelled scan returns
    /// `Cancelled` and none of the events gathered so far.
    pub fn scan_with(
        &self,
        mut observer: Option<&mut dyn ProgressObserver>,
        cancel: Option<&CancelFlag>,
    ) -> Result<Vec<RawPitchEvent>> {
        let total_frames = self.frame_count();
        let sample_rate = self.buffer.sample_rate();
        log::debug!(
            "Scanning {} samples at {} Hz: {} frames (window {}, hop {})",
            self.buffer.len(),
            sample_rate,
            total_frames,
            self.window_size,
            self.hop_size
        );

        let mut events = Vec::new();
        for frame in self.frames() {
            if cancel.is_some_and(CancelFlag::is_cancelled) {
                log::debug!("Scan cancelled after {} frames", frame.index);
                return Err(AnalysisError::Cancelled {
                    frames_completed: frame.index,
                });
            }

            events.extend(
                self.estimator
                    .detect(frame.samples, sample_rate)
                    .into_iter()
                    .map(|detection| RawPitchEvent::from_detection(frame.time, detection)),
            );

            if let Some(observer) = observer.as_deref_mut() {
                observer.on_progress(ScanProgress {
                    frames_completed: frame.index + 1,
                    total_frames,
                });
            }
        }

        log::debug!("Scan produced {} raw pitch events", events.len());
        Ok(events)
    }
}

/// Lazy raw pitch events of a [`FrameScanner`].
#[derive(Debug)]
pub struct PitchEvents<'s, 'a, E> {
    frames: Frames<'a>,
    estimator: &'s E,
    sample_rate: u32,
    pending: VecDeque<RawPitchEvent>,
}

impl<E: PitchEstimator> Iterator for PitchEvents<'_, '_, E> {
    type Item = RawPitchEvent;

    fn next(&mut self) -> Option<RawPitchEvent> {
        loop {
            if let Some(event) = self.pending.pop_front() {
                return Some(event);
            }
            let frame = self.frames.next()?;
            let detections = self.estimator.detect(frame.samples, self.sample_rate);
            log::trace!("frame {} at {:.4}s: {} detections", frame.index, frame.time, detections.len());
            self.pending.extend(
                detections
                    .into_iter()
                    .map(|detection| RawPitchEvent::from_detection(frame.time, detection)),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Reports one fixed pitch per frame, amplitude = first sample.
    struct FirstSample;

    impl PitchEstimator for FirstSample {
        fn detect(&self, frame: &[f32], _sample_rate: u32) -> Vec<PitchDetection> {
            vec![PitchDetection {
                frequency_hz: 100.0,
                amplitude: Some(frame[0] as f64),
            }]
        }
    }

    fn ramp(len: usize) -> Vec<f32> {
        (0..len).map(|i| i as f32).collect()
    }

    #[test]
    fn test_empty_buffer_is_rejected() {
        assert!(matches!(SampleBuffer::new(&[], 44100), Err(AnalysisError::EmptyBuffer)));
    }

    #[test]
    fn test_zero_sample_rate_is_rejected() {
        assert!(matches!(
            SampleBuffer::new(&[0.0; 16], 0),
            Err(AnalysisError::InvalidSampleRate(0))
        ));
    }

    #[test]
    fn test_zero_hop_is_rejected() {
        let samples = ramp(16);
        let buffer = SampleBuffer::new(&samples, 8).unwrap();
        assert!(FrameScanner::new(buffer, FirstSample, 4, 0).is_err());
    }

    #[test]
    fn test_frame_positions_and_times() {
        let samples = ramp(10);
        let buffer = SampleBuffer::new(&samples, 4).unwrap();
        let starts: Vec<(usize, usize, f64)> =
            frames(buffer, 4, 3).map(|f| (f.index, f.start, f.time)).collect();
        assert_eq!(starts, vec![(0, 0, 0.0), (1, 3, 0.75), (2, 6, 1.5)]);
        assert_eq!(frames(buffer, 4, 3).len(), 3);
        assert_eq!(frame_count(10, 4, 3), 3);
    }

    #[test]
    fn test_last_frame_may_end_exactly_at_buffer_end() {
        assert_eq!(frame_count(8, 4, 4), 2);
        assert_eq!(frame_count(7, 4, 4), 1);
    }

    #[test]
    fn test_short_buffer_has_no_frames() {
        let samples = ramp(100);
        let buffer = SampleBuffer::new(&samples, 44100).unwrap();
        let scanner = FrameScanner::new(buffer, FirstSample, 2048, 512).unwrap();
        assert_eq!(scanner.frame_count(), 0);
        assert!(scanner.scan().is_empty());
        assert!(scanner.scan_with(None, None).unwrap().is_empty());
    }

    #[test]
    fn test_events_are_tagged_with_frame_time() {
        let samples = ramp(12);
        let buffer = SampleBuffer::new(&samples, 2).unwrap();
        let scanner = FrameScanner::new(buffer, FirstSample, 4, 4).unwrap();
        let events = scanner.scan();
        let times: Vec<f64> = events.iter().map(|e| e.time).collect();
        let firsts: Vec<Option<f64>> = events.iter().map(|e| e.amplitude).collect();
        assert_eq!(times, vec![0.0, 2.0, 4.0]);
        assert_eq!(firsts, vec![Some(0.0), Some(4.0), Some(8.0)]);
    }

    #[test]
    fn test_events_restart_on_each_call() {
        let samples = ramp(64);
        let buffer = SampleBuffer::new(&samples, 8).unwrap();
        let scanner = FrameScanner::new(buffer, FirstSample, 16, 8).unwrap();
        let first: Vec<RawPitchEvent> = scanner.events().take(2).collect();
        let again: Vec<RawPitchEvent> = scanner.events().take(2).collect();
        assert_eq!(first, again);
        assert_eq!(scanner.events().count(), scanner.frame_count());
    }

    #[test]
    fn test_progress_observer_sees_every_frame() {
        let samples = ramp(40);
        let buffer = SampleBuffer::new(&samples, 8).unwrap();
        let scanner = FrameScanner::new(buffer, FirstSample, 8, 8).unwrap();
        let mut seen = Vec::new();
        let mut observer = |p: ScanProgress| seen.push(p.frames_completed);
        scanner.scan_with(Some(&mut observer), None).unwrap();
        assert_eq!(seen, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_channel_progress_never_blocks() {
        let samples = ramp(40);
        let buffer = SampleBuffer::new(&samples, 8).unwrap();
        let scanner = FrameScanner::new(buffer, FirstSample, 8, 8).unwrap();
        let (tx, rx) = crossbeam_channel::bounded(1);
        let mut observer = ChannelProgress(tx);
        let events = scanner.scan_with(Some(&mut observer), None).unwrap();
        assert_eq!(events.len(), 5);
        let first = rx.try_recv().unwrap();
        assert_eq!(first.frames_completed, 1);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_cancelled_scan_returns_no_events() {
        let samples = ramp(40);
        let buffer = SampleBuffer::new(&samples, 8).unwrap();
        let scanner = FrameScanner::new(buffer, FirstSample, 8, 8).unwrap();
        let cancel = CancelFlag::new();
        let trigger = cancel.clone();
        let mut observer = move |p: ScanProgress| {
            if p.frames_completed == 2 {
                trigger.cancel();
            }
        };
        let result = scanner.scan_with(Some(&mut observer), Some(&cancel));
        assert!(matches!(result, Err(AnalysisError::Cancelled { frames_completed: 2 })));
    }

    #[test]
    fn test_estimator_follows_config() {
        let config = AnalysisConfig::polyphonic();
        assert!(matches!(Estimator::from_config(&config), Estimator::Polyphonic(_)));
        let config = AnalysisConfig::default();
        assert!(matches!(Estimator::from_config(&config), Estimator::Monophonic(_)));
    }

    #[test]
    fn test_progress_fraction() {
        let progress = ScanProgress { frames_completed: 1, total_frames: 4 };
        assert_eq!(progress.fraction(), 0.25);
        let done = ScanProgress { frames_completed: 0, total_frames: 0 };
        assert_eq!(done.fraction(), 1.0);
    }
}
