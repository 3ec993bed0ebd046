// MIDI output from timed note events.
//
// Writes SMF Format 1: track 0 carries the tempo, track 1 the melody (track
// name, program change, then NoteOn/NoteOff pairs). Offsets are quarter
// notes and map to ticks at `TICKS_PER_QUARTER`.
//
// A note that would still be sounding when the same key is struck again is
// cut at the next strike, so repeated keys never stack on one channel.
//
// The file is written to `<path>.tmp` and renamed into place, so a failed
// write never leaves a truncated track at `path`.
//
// Uses the `midly` crate for encoding.

use crate::error::{GenerationError, Result};
use crate::track::TimedNoteEvent;
use midly::{
    Format, Header, MetaMessage, MidiMessage, Smf, Timing, Track, TrackEvent, TrackEventKind,
    num::{u4, u7, u15, u24, u28},
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

/// Ticks per quarter note in MIDI output.
pub const TICKS_PER_QUARTER: u16 = 480;

/// Slowest tempo whose microseconds-per-quarter still fits in 24 bits.
const MIN_TEMPO_BPM: u16 = 4;

/// Rendering parameters for the melody track.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MidiSettings {
    pub tempo_bpm: u16,
    /// General MIDI program (0 = acoustic grand piano).
    pub program: u8,
    pub velocity: u8,
    /// Note duration in quarter notes.
    pub note_length: f64,
    pub track_name: String,
}

impl Default for MidiSettings {
    fn default() -> Self {
        MidiSettings {
            tempo_bpm: 120,
            program: 0,
            velocity: 80,
            note_length: 1.0,
            track_name: "Melody".to_string(),
        }
    }
}

/// Convert events to MIDI and write them to `path`, creating the parent
/// directory if needed.
pub fn write_midi(events: &[TimedNoteEvent], settings: &MidiSettings, path: &Path) -> Result<()> {
    let io_err = |source: std::io::Error| GenerationError::Serialization {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(io_err)?;
    }

    let smf = events_to_smf(events, settings);
    let tmp = temp_path(path);
    if let Err(e) = smf.save(&tmp) {
        let _ = std::fs::remove_file(&tmp);
        return Err(io_err(e));
    }
    if let Err(e) = std::fs::rename(&tmp, path) {
        let _ = std::fs::remove_file(&tmp);
        return Err(io_err(e));
    }

    info!(path = %path.display(), notes = events.len(), "wrote MIDI track");
    Ok(())
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}

fn quarters_to_ticks(quarters: f64) -> u32 {
    (quarters.max(0.0) * TICKS_PER_QUARTER as f64).round() as u32
}

/// Convert events to an in-memory SMF.
pub fn events_to_smf<'a>(events: &[TimedNoteEvent], settings: &'a MidiSettings) -> Smf<'a> {
    let mut smf = Smf::new(Header::new(
        Format::Parallel,
        Timing::Metrical(u15::new(TICKS_PER_QUARTER)),
    ));

    // Track 0: tempo track
    let tempo_microseconds = 60_000_000 / settings.tempo_bpm.max(MIN_TEMPO_BPM) as u32;
    smf.tracks.push(vec![
        TrackEvent {
            delta: u28::new(0),
            kind: TrackEventKind::Meta(MetaMessage::Tempo(u24::new(tempo_microseconds))),
        },
        TrackEvent {
            delta: u28::new(0),
            kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
        },
    ]);

    let channel = u4::new(0);
    let velocity = u7::new(settings.velocity.min(127));
    let length_ticks = quarters_to_ticks(settings.note_length).max(1);

    // (tick, is_note_on, key). Note-offs sort before note-ons on the same tick.
    let mut timeline: Vec<(u32, bool, u8)> = Vec::with_capacity(events.len() * 2);
    let mut next_strike: [Option<u32>; 128] = [None; 128];
    for event in events.iter().rev() {
        let key = event.key.min(127);
        let on = quarters_to_ticks(event.offset);
        let mut off = on + length_ticks;
        if let Some(next) = next_strike[key as usize] {
            off = off.min(next).max(on + 1);
        }
        next_strike[key as usize] = Some(on);
        timeline.push((on, true, key));
        timeline.push((off, false, key));
    }
    timeline.sort_by_key(|&(tick, is_on, key)| (tick, is_on, key));

    let mut track: Track<'a> = Vec::with_capacity(timeline.len() + 3);
    track.push(TrackEvent {
        delta: u28::new(0),
        kind: TrackEventKind::Meta(MetaMessage::TrackName(settings.track_name.as_bytes())),
    });
    track.push(TrackEvent {
        delta: u28::new(0),
        kind: TrackEventKind::Midi {
            channel,
            message: MidiMessage::ProgramChange {
                program: u7::new(settings.program.min(127)),
            },
        },
    });

    let mut last_tick = 0;
    for (tick, is_on, key) in timeline {
        let message = if is_on {
            MidiMessage::NoteOn {
                key: u7::new(key),
                vel: velocity,
            }
        } else {
            MidiMessage::NoteOff {
                key: u7::new(key),
                vel: u7::new(0),
            }
        };
        track.push(TrackEvent {
            delta: u28::new(tick - last_tick),
            kind: TrackEventKind::Midi { channel, message },
        });
        last_tick = tick;
    }

    track.push(TrackEvent {
        delta: u28::new(0),
        kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
    });
    smf.tracks.push(track);

    smf
}
