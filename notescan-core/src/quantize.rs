//! # Note Quantizer
//!
//! Collapses the dense per-frame pitch stream into discrete note events.
//! Events closer than `time_window_seconds` to the start of the current
//! group join it; the first event outside the window opens a new group.
//! Each group becomes one [`NoteEvent`] whose duration is the gap to the
//! next group.
//!
//! Quantization is a pure function of its input and configuration. Playback
//! scheduling and MIDI export both consume its output, so the two must never
//! disagree about when a note starts or how long it lasts.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::ops::Range;

use crate::config::QuantizeConfig;
use crate::error::{AnalysisError, Result};
use crate::scanner::RawPitchEvent;
use crate::tuning::{MIDI_MAX, hz_to_midi_clamped};

/// A discrete, timed chord (or single note).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoteEvent {
    /// Onset in seconds: the time of the group's first raw event.
    pub time: f64,
    /// Distinct detected frequencies in Hz, ascending.
    pub pitches: Vec<f64>,
    /// Distinct MIDI notes derived from `pitches`, clamped into [0, 127].
    pub midi_notes: BTreeSet<u8>,
    /// How long the note sounds, in seconds.
    pub duration_seconds: f64,
    /// MIDI velocity from the loudest amplitude in the group, if any was measured.
    pub velocity: Option<u8>,
}

impl NoteEvent {
    /// Builds a note from one non-empty group of raw events.
    fn from_group(group: &[RawPitchEvent], duration_seconds: f64) -> Self {
        let mut pitches: Vec<f64> = group.iter().map(|e| e.frequency_hz).collect();
        pitches.sort_by(f64::total_cmp);
        pitches.dedup();

        let midi_notes = pitches.iter().filter_map(|&hz| hz_to_midi_clamped(hz)).collect();

        let velocity = group
            .iter()
            .filter_map(|e| e.amplitude)
            .reduce(f64::max)
            .map(amplitude_to_velocity);

        Self {
            time: group[0].time,
            pitches,
            midi_notes,
            duration_seconds,
            velocity,
        }
    }

    /// End of the note in seconds.
    pub fn end_time(&self) -> f64 {
        self.time + self.duration_seconds
    }
}

/// Maps an amplitude in [0, 1] to a MIDI velocity: `min(127, round(a · 127))`.
pub fn amplitude_to_velocity(amplitude: f64) -> u8 {
    (amplitude.max(0.0) * MIDI_MAX as f64).round().min(MIDI_MAX as f64) as u8
}

/// Splits time-ordered events into groups, returned as index ranges.
///
/// The first group's window is measured from time zero; every later group's
/// window from its own first event.
///
/// # Errors
/// * `UnorderedEvents` - an event is earlier than its predecessor
pub fn group_events(events: &[RawPitchEvent], time_window_seconds: f64) -> Result<Vec<Range<usize>>> {
    let mut groups = Vec::new();
    let mut group_start_time = 0.0;
    let mut current = 0..0;

    for (index, event) in events.iter().enumerate() {
        if index > 0 {
            let previous = events[index - 1].time;
            // Written as a negated comparison so NaN times are rejected too.
            if !(event.time >= previous) {
                return Err(AnalysisError::UnorderedEvents {
                    index,
                    time: event.time,
                    previous,
                });
            }
        }

        if event.time - group_start_time < time_window_seconds {
            current.end = index + 1;
        } else {
            if !current.is_empty() {
                groups.push(current);
            }
            group_start_time = event.time;
            current = index..index + 1;
        }
    }

    if !current.is_empty() {
        groups.push(current);
    }
    Ok(groups)
}

/// Quantizes raw pitch events into note events.
///
/// # Arguments
/// * `events` - Raw events with non-decreasing times
/// * `config` - Grouping window and duration rules
///
/// # Returns
/// * Note events with strictly increasing times; every input event belongs
///   to exactly one of them
///
/// # Errors
/// * `InvalidConfig` - non-positive window or durations
/// * `UnorderedEvents` - input times decrease
pub fn quantize(events: &[RawPitchEvent], config: &QuantizeConfig) -> Result<Vec<NoteEvent>> {
    config.validate()?;
    let groups = group_events(events, config.time_window_seconds)?;
    let starts: Vec<f64> = groups.iter().map(|g| events[g.start].time).collect();

    let notes: Vec<NoteEvent> = groups
        .iter()
        .enumerate()
        .map(|(i, range)| {
            let duration = match starts.get(i + 1) {
                Some(next) => (next - starts[i])
                    .clamp(config.min_duration_seconds, config.max_duration_seconds),
                None => config.default_duration_seconds,
            };
            NoteEvent::from_group(&events[range.clone()], duration)
        })
        .collect();

    log::debug!("Quantized {} raw events into {} notes", events.len(), notes.len());
    Ok(notes)
}
