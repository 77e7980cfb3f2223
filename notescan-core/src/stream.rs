//! # Live Frame Assembly
//!
//! Turns a stream of arbitrarily sized sample chunks (for example from an
//! audio input callback) into the same frames the static scanner would cut
//! from the concatenated samples, and runs an estimator on them.
//!
//! ## Features
//! - Chunk accumulation with hop-sized draining
//! - Absolute frame times, independent of chunk boundaries
//! - Pull-based event iterator over a crossbeam channel

use crossbeam_channel::Receiver;
use std::collections::VecDeque;

use crate::error::{AnalysisError, Result};
use crate::pitch::PitchEstimator;
use crate::scanner::{CancelFlag, RawPitchEvent, frame_time};

/// A frame cut from streamed samples.
#[derive(Debug, Clone, PartialEq)]
pub struct OwnedFrame {
    /// Zero-based frame number since the stream began.
    pub index: usize,
    /// Absolute index of the frame's first sample.
    pub start: usize,
    /// `start / sample_rate`, in seconds.
    pub time: f64,
    /// The frame's samples.
    pub samples: Vec<f32>,
}

/// Accumulates sample chunks and emits complete, overlapping frames.
#[derive(Debug, Clone)]
pub struct FrameAssembler {
    sample_rate: u32,
    window_size: usize,
    hop_size: usize,
    pending: Vec<f32>,
    pending_start: usize,
    next_index: usize,
}

impl FrameAssembler {
    /// Creates an assembler.
    ///
    /// # Errors
    /// * `InvalidSampleRate` - zero sample rate
    /// * `InvalidConfig` - zero sizes, or a hop larger than the window
    pub fn new(sample_rate: u32, window_size: usize, hop_size: usize) -> Result<Self> {
        if sample_rate == 0 {
            return Err(AnalysisError::InvalidSampleRate(sample_rate));
        }
        if window_size == 0 || hop_size == 0 || hop_size > window_size {
            return Err(AnalysisError::InvalidConfig(format!(
                "unusable frame geometry: window {window_size}, hop {hop_size}"
            )));
        }
        Ok(Self {
            sample_rate,
            window_size,
            hop_size,
            pending: Vec::with_capacity(window_size * 2),
            pending_start: 0,
            next_index: 0,
        })
    }

    /// Appends a chunk and returns every frame that became complete.
    pub fn push(&mut self, chunk: &[f32]) -> Vec<OwnedFrame> {
        self.pending.extend_from_slice(chunk);

        let mut ready = Vec::new();
        // While we have enough data for a full frame, emit it.
        while self.pending.len() >= self.window_size {
            ready.push(OwnedFrame {
                index: self.next_index,
                start: self.pending_start,
                time: frame_time(self.pending_start, self.sample_rate),
                samples: self.pending[..self.window_size].to_vec(),
            });
            // Only the hop is consumed; the rest overlaps the next frame.
            self.pending.drain(..self.hop_size);
            self.pending_start += self.hop_size;
            self.next_index += 1;
        }
        ready
    }

    /// Samples received but not yet part of an emitted frame's hop.
    pub fn buffered(&self) -> usize {
        self.pending.len()
    }

    /// Sample rate frames are timed against.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

/// Runs an estimator over frames assembled from a chunk channel.
///
/// Iteration blocks on the channel and ends when every sender is dropped or
/// the cancel flag is raised. Cancellation is observed between frames, so a
/// frame's events are either all yielded or none are.
#[derive(Debug)]
pub struct LiveScanner<E> {
    receiver: Receiver<Vec<f32>>,
    assembler: FrameAssembler,
    estimator: E,
    cancel: Option<CancelFlag>,
    ready: VecDeque<OwnedFrame>,
    pending: VecDeque<RawPitchEvent>,
    frames_completed: usize,
}

impl<E: PitchEstimator> LiveScanner<E> {
    /// Creates a scanner reading chunks from `receiver`.
    pub fn new(receiver: Receiver<Vec<f32>>, assembler: FrameAssembler, estimator: E) -> Self {
        Self {
            receiver,
            assembler,
            estimator,
            cancel: None,
            ready: VecDeque::new(),
            pending: VecDeque::new(),
            frames_completed: 0,
        }
    }

    /// Stops iteration at the next frame boundary once `cancel` is raised.
    pub fn with_cancel(mut self, cancel: CancelFlag) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Frames analysed so far.
    pub fn frames_completed(&self) -> usize {
        self.frames_completed
    }

    fn cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(CancelFlag::is_cancelled)
    }
}

impl<E: PitchEstimator> Iterator for LiveScanner<E> {
    type Item = RawPitchEvent;

    fn next(&mut self) -> Option<RawPitchEvent> {
        loop {
            if let Some(event) = self.pending.pop_front() {
                return Some(event);
            }
            if self.cancelled() {
                return None;
            }
            if let Some(frame) = self.ready.pop_front() {
                let detections = self.estimator.detect(&frame.samples, self.assembler.sample_rate());
                self.pending.extend(
                    detections
                        .into_iter()
                        .map(|detection| RawPitchEvent::from_detection(frame.time, detection)),
                );
                self.frames_completed += 1;
                continue;
            }
            match self.receiver.recv() {
                Ok(chunk) => {
                    let frames = self.assembler.push(&chunk);
                    self.ready.extend(frames);
                }
                Err(_) => {
                    log::debug!(
                        "Live scan ended after {} frames ({} samples left unframed)",
                        self.frames_completed,
                        self.assembler.buffered()
                    );
                    return None;
                }
            }
        }
    }
}
