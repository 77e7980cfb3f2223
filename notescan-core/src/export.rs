//! # MIDI Export Module
//!
//! Maps quantized notes onto a fixed-tempo tick grid and writes them as a
//! single-track Standard MIDI File.
//!
//! ## Features
//! - Seconds to ticks at a fixed tempo and resolution
//! - Rest gaps between chords expressed as delta time
//! - Tempo meta event so players reproduce the analysed timing

use midly::num::{u4, u7, u15, u24, u28};
use midly::{Format, Header, MetaMessage, MidiMessage, Smf, Timing, TrackEvent, TrackEventKind};
use serde::{Deserialize, Serialize};
use std::io::Write;

use crate::error::Result;
use crate::quantize::NoteEvent;

/// Tick grid and channel settings for export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MidiExportConfig {
    /// Tempo in beats per minute (default: 120.0)
    pub bpm: f64,
    /// Ticks per quarter note (default: 128)
    pub ticks_per_beat: u16,
    /// MIDI channel 0-15 (default: 0)
    pub channel: u8,
    /// Velocity for notes without a measured amplitude (default: 100)
    pub default_velocity: u8,
}

impl Default for MidiExportConfig {
    fn default() -> Self {
        Self {
            bpm: 120.0,
            ticks_per_beat: 128,
            channel: 0,
            default_velocity: 100,
        }
    }
}

impl MidiExportConfig {
    fn ticks_per_second(&self) -> f64 {
        self.bpm.max(1.0) / 60.0 * self.ticks_per_beat as f64
    }

    /// Microseconds per quarter note, as stored in the tempo meta event.
    pub fn microseconds_per_beat(&self) -> u32 {
        (60_000_000.0 / self.bpm.max(1.0)).round() as u32
    }
}

/// Converts seconds to ticks on the export grid. Negative input maps to 0.
pub fn seconds_to_ticks(seconds: f64, config: &MidiExportConfig) -> u32 {
    (seconds.max(0.0) * config.ticks_per_second()).round() as u32
}

/// A note event placed on the tick grid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickedChord {
    /// Idle ticks between the previous chord's end and this chord's start.
    pub rest_ticks: u32,
    /// Absolute start tick.
    pub start_tick: u32,
    /// Length in ticks, at least one.
    pub duration_ticks: u32,
    /// MIDI notes, ascending.
    pub midi_notes: Vec<u8>,
    /// Note-on velocity.
    pub velocity: u8,
}

/// Places every note on the tick grid.
pub fn plan_ticks(notes: &[NoteEvent], config: &MidiExportConfig) -> Vec<TickedChord> {
    let mut previous_end = 0u32;
    notes
        .iter()
        .map(|note| {
            let start_tick = seconds_to_ticks(note.time, config);
            let duration_ticks = seconds_to_ticks(note.duration_seconds, config).max(1);
            let rest_ticks = start_tick.saturating_sub(previous_end);
            previous_end = start_tick.saturating_add(duration_ticks);
            TickedChord {
                rest_ticks,
                start_tick,
                duration_ticks,
                midi_notes: note.midi_notes.iter().copied().collect(),
                velocity: note.velocity.unwrap_or(config.default_velocity).min(127),
            }
        })
        .collect()
}

/// Builds the single track: tempo, note pairs, end of track.
///
/// A chord still sounding when the next one starts is released at that
/// onset, so each key has at most one active note.
fn build_track(chords: &[TickedChord], config: &MidiExportConfig) -> Vec<TrackEvent<'static>> {
    let channel = u4::new(config.channel.min(15));

    // (absolute tick, note-offs sort before note-ons at the same tick, event)
    let mut timed: Vec<(u32, u8, TrackEventKind<'static>)> = vec![
        (0, 0, TrackEventKind::Meta(MetaMessage::TrackName(b"notescan"))),
        (
            0,
            0,
            TrackEventKind::Meta(MetaMessage::Tempo(u24::new(
                config.microseconds_per_beat().min(0x00FF_FFFF),
            ))),
        ),
    ];

    for (i, chord) in chords.iter().enumerate() {
        let mut end = chord.start_tick.saturating_add(chord.duration_ticks);
        if let Some(next) = chords.get(i + 1) {
            if next.start_tick > chord.start_tick {
                end = end.min(next.start_tick);
            }
        }
        for &key in &chord.midi_notes {
            let key = u7::new(key.min(127));
            timed.push((
                chord.start_tick,
                2,
                TrackEventKind::Midi {
                    channel,
                    message: MidiMessage::NoteOn { key, vel: u7::new(chord.velocity.clamp(1, 127)) },
                },
            ));
            timed.push((
                end,
                1,
                TrackEventKind::Midi {
                    channel,
                    message: MidiMessage::NoteOff { key, vel: u7::new(0) },
                },
            ));
        }
    }

    timed.sort_by_key(|&(tick, order, _)| (tick, order));

    let last_tick = timed.last().map_or(0, |&(tick, _, _)| tick);
    let mut track = Vec::with_capacity(timed.len() + 1);
    let mut cursor = 0u32;
    for (tick, _, kind) in timed {
        track.push(TrackEvent {
            delta: u28::new((tick - cursor).min(0x0FFF_FFFF)),
            kind,
        });
        cursor = tick;
    }
    track.push(TrackEvent {
        delta: u28::new(last_tick - cursor),
        kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
    });
    track
}

/// Writes the notes as a Standard MIDI File.
///
/// # Errors
/// * `Export` - the writer failed
pub fn write_midi<W: Write>(notes: &[NoteEvent], config: &MidiExportConfig, writer: W) -> Result<()> {
    let chords = plan_ticks(notes, config);
    let header = Header::new(
        Format::SingleTrack,
        Timing::Metrical(u15::new(config.ticks_per_beat.clamp(1, 0x7FFF))),
    );
    let mut smf = Smf::new(header);
    smf.tracks.push(build_track(&chords, config));
    smf.write_std(writer)?;
    log::debug!("Exported {} chords as MIDI", chords.len());
    Ok(())
}

/// Encodes the notes as Standard MIDI File bytes.
pub fn to_midi_bytes(notes: &[NoteEvent], config: &MidiExportConfig) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    write_midi(notes, config, &mut bytes)?;
    Ok(bytes)
}
