//! # Musical Tuning Module
//!
//! Conversions between frequency in Hz and MIDI note numbers, based on
//! twelve-tone equal temperament with A4 (MIDI 69) = 440 Hz.
//!
//! ## Features
//! - Continuous and rounded frequency to note conversion
//! - Clamping into the MIDI range [0, 127]
//! - Note name lookups in both directions
//! - Cent deviation calculations

use once_cell::sync::Lazy;
use std::collections::BTreeMap;

/// Reference pitch of A4 in Hz.
pub const A4_FREQUENCY: f64 = 440.0;
/// MIDI note number of A4.
pub const A4_MIDI: i32 = 69;
/// Highest valid MIDI note number.
pub const MIDI_MAX: u8 = 127;

/// Represents a single MIDI note with its name and frequency.
#[derive(Debug, Clone)]
pub struct Note {
    /// Note name (e.g., "A4", "C#3")
    pub name: String,
    /// Frequency in Hz
    pub frequency: f64,
}

/// All 128 MIDI notes (C-1 to G9), computed once on first use.
static NOTES: Lazy<Vec<Note>> = Lazy::new(|| {
    const NOTE_NAMES: [&str; 12] = [
        "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
    ];
    (0..=MIDI_MAX as i32)
        .map(|midi| {
            // MIDI 0 is C-1, so octave numbers start one below zero.
            let octave = midi / 12 - 1;
            Note {
                name: format!("{}{}", NOTE_NAMES[(midi % 12) as usize], octave),
                frequency: midi_to_hz(midi),
            }
        })
        .collect()
});

/// Note name to MIDI number lookups.
static NOTE_MAP: Lazy<BTreeMap<String, u8>> = Lazy::new(|| {
    NOTES
        .iter()
        .enumerate()
        .map(|(i, note)| (note.name.clone(), i as u8))
        .collect()
});

/// Continuous note number for a frequency: `69 + 12·log2(hz / 440)`.
///
/// Returns `None` for non-positive or non-finite input.
pub fn fractional_midi(hz: f64) -> Option<f64> {
    if !hz.is_finite() || hz <= 0.0 {
        return None;
    }
    Some(A4_MIDI as f64 + 12.0 * (hz / A4_FREQUENCY).log2())
}

/// Nearest MIDI note number for a frequency, unclamped.
///
/// `None` is the "no note" sentinel for `hz <= 0`; callers must guard.
pub fn hz_to_midi(hz: f64) -> Option<i32> {
    fractional_midi(hz).map(|n| n.round() as i32)
}

/// Nearest MIDI note number for a frequency, clamped into [0, 127].
pub fn hz_to_midi_clamped(hz: f64) -> Option<u8> {
    hz_to_midi(hz).map(|n| n.clamp(0, MIDI_MAX as i32) as u8)
}

/// Frequency of a MIDI note number: `440 · 2^((midi - 69) / 12)`.
pub fn midi_to_hz(midi: i32) -> f64 {
    A4_FREQUENCY * 2f64.powf((midi - A4_MIDI) as f64 / 12.0)
}

/// Name of a MIDI note (e.g. 60 -> "C4"). Values above 127 are clamped.
pub fn note_name(midi: u8) -> &'static str {
    &NOTES[midi.min(MIDI_MAX) as usize].name
}

/// MIDI number for a note name such as "A4" or "C#3".
pub fn midi_from_name(name: &str) -> Option<u8> {
    NOTE_MAP.get(name).copied()
}

/// Finds the closest MIDI note to a frequency.
///
/// # Returns
/// * `Some((midi, target_frequency))` - clamped note number and its exact pitch
/// * `None` - the frequency is not positive
pub fn nearest_note(freq: f64) -> Option<(u8, f64)> {
    hz_to_midi_clamped(freq).map(|midi| (midi, NOTES[midi as usize].frequency))
}

/// Calculates the deviation from a target frequency in cents.
///
/// 100 cents = 1 semitone; positive values are sharp, negative flat.
pub fn cents_deviation(freq: f64, target_freq: f64) -> f64 {
    1200.0 * (freq / target_freq).log2()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_a4_reference() {
        assert_eq!(hz_to_midi(440.0), Some(69));
        assert_relative_eq!(midi_to_hz(69), 440.0);
        assert_relative_eq!(midi_to_hz(81), 880.0, max_relative = 1e-12);
    }

    #[test]
    fn test_round_trip_all_midi_notes() {
        for n in 0..=127 {
            assert_eq!(hz_to_midi(midi_to_hz(n)), Some(n), "round trip failed for {}", n);
        }
    }

    #[test]
    fn test_non_positive_frequency_has_no_note() {
        assert_eq!(hz_to_midi(0.0), None);
        assert_eq!(hz_to_midi(-10.0), None);
        assert_eq!(hz_to_midi(f64::NAN), None);
        assert_eq!(hz_to_midi_clamped(0.0), None);
    }

    #[test]
    fn test_out_of_range_clamps() {
        assert_eq!(hz_to_midi_clamped(1.0), Some(0));
        assert_eq!(hz_to_midi_clamped(50_000.0), Some(127));
        assert_eq!(hz_to_midi(50_000.0).map(|n| n > 127), Some(true));
    }

    #[test]
    fn test_note_names() {
        assert_eq!(note_name(60), "C4");
        assert_eq!(note_name(69), "A4");
        assert_eq!(note_name(0), "C-1");
        assert_eq!(note_name(127), "G9");
        assert_eq!(midi_from_name("C#3"), Some(49));
        assert_eq!(midi_from_name("H2"), None);
    }

    #[test]
    fn test_nearest_note_and_cents() {
        let (midi, target) = nearest_note(445.0).unwrap();
        assert_eq!(midi, 69);
        assert_relative_eq!(target, 440.0);
        let cents = cents_deviation(445.0, target);
        assert!(cents > 19.0 && cents < 20.0, "got {} cents", cents);
    }
}
