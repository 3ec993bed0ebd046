// Note symbol parsing.
//
// A symbol is a step letter (A-G, either case), zero or more accidentals
// (`#` sharp, `-` or `b` flat) and an optional octave number (default 4).
// "C4" is middle C, MIDI key 60. Because `-` is a flat sign, octaves are
// never negative.

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Octave assumed when a symbol carries none.
pub const DEFAULT_OCTAVE: u8 = 4;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NoteParseError {
    #[error("empty symbol")]
    Empty,

    #[error("'{0}' is not a note letter")]
    BadStep(char),

    #[error("'{0}' is not an octave number")]
    BadOctave(String),

    #[error("key {0} outside MIDI range 0..=127")]
    OutOfRange(i32),

    #[error("{0} accidentals is more than a note can carry")]
    BadAccidentals(usize),
}

/// A single pitched note.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Note {
    /// Upper-case step letter.
    pub step: char,
    /// Semitones from accidentals (sharps positive, flats negative).
    pub alter: i8,
    pub octave: u8,
    /// MIDI key number.
    pub key: u8,
}

impl FromStr for Note {
    type Err = NoteParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut chars = s.chars();
        let first = chars.next().ok_or(NoteParseError::Empty)?;
        let step = first.to_ascii_uppercase();
        let pitch_class: i32 = match step {
            'C' => 0,
            'D' => 2,
            'E' => 4,
            'F' => 5,
            'G' => 7,
            'A' => 9,
            'B' => 11,
            _ => return Err(NoteParseError::BadStep(first)),
        };

        let rest = chars.as_str();
        let octave_start = rest
            .find(|c: char| !matches!(c, '#' | '-' | 'b'))
            .unwrap_or(rest.len());
        let (accidentals, octave_str) = rest.split_at(octave_start);

        let alter: i32 = accidentals
            .chars()
            .map(|c| if c == '#' { 1 } else { -1 })
            .sum();

        let octave = if octave_str.is_empty() {
            DEFAULT_OCTAVE
        } else if octave_str.chars().all(|c| c.is_ascii_digit()) {
            octave_str
                .parse::<u8>()
                .map_err(|_| NoteParseError::BadOctave(octave_str.to_string()))?
        } else {
            return Err(NoteParseError::BadOctave(octave_str.to_string()));
        };

        let key = (octave as i32 + 1) * 12 + pitch_class + alter;
        if !(0..=127).contains(&key) {
            return Err(NoteParseError::OutOfRange(key));
        }
        let alter =
            i8::try_from(alter).map_err(|_| NoteParseError::BadAccidentals(accidentals.len()))?;

        Ok(Note {
            step,
            alter,
            octave,
            key: key as u8,
        })
    }
}

impl fmt::Display for Note {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.step)?;
        let sign = if self.alter > 0 { '#' } else { '-' };
        for _ in 0..self.alter.unsigned_abs() {
            write!(f, "{sign}")?;
        }
        write!(f, "{}", self.octave)
    }
}
