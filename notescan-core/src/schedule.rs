//! Wall-clock playback plan for quantized notes.
//!
//! A synthesizer front-end triggers each [`ScheduledNote`] at `offset` after
//! playback starts and releases it after `duration`.

use std::time::Duration;

use crate::quantize::NoteEvent;

/// One chord to trigger during playback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledNote {
    /// Delay from the start of playback.
    pub offset: Duration,
    /// How long the chord is held.
    pub duration: Duration,
    /// MIDI notes to sound, ascending.
    pub midi_notes: Vec<u8>,
    /// Velocity to trigger with.
    pub velocity: u8,
}

impl ScheduledNote {
    /// Release point relative to the start of playback.
    pub fn end(&self) -> Duration {
        self.offset + self.duration
    }
}

fn seconds(value: f64) -> Duration {
    Duration::try_from_secs_f64(value).unwrap_or_default()
}

/// Maps note events onto playback offsets.
///
/// Notes without a measured velocity use `default_velocity`.
pub fn playback_schedule(notes: &[NoteEvent], default_velocity: u8) -> Vec<ScheduledNote> {
    notes
        .iter()
        .map(|note| ScheduledNote {
            offset: seconds(note.time),
            duration: seconds(note.duration_seconds),
            midi_notes: note.midi_notes.iter().copied().collect(),
            velocity: note.velocity.unwrap_or(default_velocity).min(127),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn note(time: f64, midi: &[u8], duration_seconds: f64, velocity: Option<u8>) -> NoteEvent {
        NoteEvent {
            time,
            pitches: Vec::new(),
            midi_notes: midi.iter().copied().collect(),
            duration_seconds,
            velocity,
        }
    }

    #[test]
    fn test_schedule_offsets_follow_note_times() {
        let notes = vec![note(0.5, &[64, 60], 0.25, Some(90)), note(1.0, &[67], 0.2, None)];
        let schedule = playback_schedule(&notes, 100);
        assert_eq!(schedule[0].offset, Duration::from_millis(500));
        assert_eq!(schedule[0].end(), Duration::from_millis(750));
        assert_eq!(schedule[0].midi_notes, vec![60, 64]);
        assert_eq!(schedule[0].velocity, 90);
        assert_eq!(schedule[1].velocity, 100);
    }

    #[test]
    fn test_invalid_times_collapse_to_zero() {
        let schedule = playback_schedule(&[note(-1.0, &[60], f64::NAN, None)], 100);
        assert_eq!(schedule[0].offset, Duration::ZERO);
        assert_eq!(schedule[0].duration, Duration::ZERO);
    }
}
