// Track building: symbol sequence -> timed note events.
//
// Offsets are in quarter notes, start at 0 and advance by a fixed step for
// every event that is actually emitted. A symbol that does not parse as a note
// produces no event and does not advance the offset; it is recorded as a
// `Dropped` outcome so callers can count and inspect it. Dropping is the
// intended behavior, never an error.

use crate::note::{Note, NoteParseError};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Offset step of the fixed-step renderer.
pub const FIXED_STEP: f64 = 0.5;

/// How event offsets advance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum OffsetPolicy {
    /// Advance by `step` quarter notes per event.
    FixedStep { step: f64 },
    /// Back-to-back quarter notes.
    Sequential,
}

impl OffsetPolicy {
    pub fn step(&self) -> f64 {
        match *self {
            OffsetPolicy::FixedStep { step } => step,
            OffsetPolicy::Sequential => 1.0,
        }
    }
}

impl Default for OffsetPolicy {
    fn default() -> Self {
        OffsetPolicy::FixedStep { step: FIXED_STEP }
    }
}

/// A note with its start time, ready for serialization.
#[derive(Debug, Clone, PartialEq)]
pub struct TimedNoteEvent {
    pub symbol: String,
    /// MIDI key number.
    pub key: u8,
    /// Start offset in quarter notes.
    pub offset: f64,
}

/// What happened to one position of the input sequence.
#[derive(Debug, Clone, PartialEq)]
pub enum NoteOutcome {
    Placed { position: usize, offset: f64 },
    Dropped {
        position: usize,
        symbol: String,
        reason: NoteParseError,
    },
}

/// Result of building a track: the emitted events plus one outcome per input
/// symbol.
#[derive(Debug, Clone, Default)]
pub struct TrackBuild {
    pub events: Vec<TimedNoteEvent>,
    pub outcomes: Vec<NoteOutcome>,
}

impl TrackBuild {
    pub fn placed(&self) -> usize {
        self.events.len()
    }

    pub fn dropped(&self) -> usize {
        self.outcomes.len() - self.events.len()
    }

    /// Length of the track in quarter notes, given a note duration.
    pub fn duration(&self, note_length: f64) -> f64 {
        self.events
            .last()
            .map(|e| e.offset + note_length)
            .unwrap_or(0.0)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TrackBuilder {
    policy: OffsetPolicy,
}

impl TrackBuilder {
    pub fn new(policy: OffsetPolicy) -> Self {
        TrackBuilder { policy }
    }

    pub fn build<S: AsRef<str>>(&self, sequence: &[S]) -> TrackBuild {
        let step = self.policy.step();
        let mut build = TrackBuild::default();
        let mut offset = 0.0;

        for (position, symbol) in sequence.iter().enumerate() {
            let symbol = symbol.as_ref();
            match symbol.parse::<Note>() {
                Ok(note) => {
                    build.events.push(TimedNoteEvent {
                        symbol: symbol.to_string(),
                        key: note.key,
                        offset,
                    });
                    build.outcomes.push(NoteOutcome::Placed { position, offset });
                    offset += step;
                }
                Err(reason) => {
                    debug!(position, symbol, %reason, "dropping unplayable symbol");
                    build.outcomes.push(NoteOutcome::Dropped {
                        position,
                        symbol: symbol.to_string(),
                        reason,
                    });
                }
            }
        }

        build
    }
}
