// Note vocabulary: the symbols the generator can emit and their indices.
//
// Built once at startup from persisted note data (JSON), immutable afterwards
// and shared read-only across requests. The symbol list ("pitchnames") is
// deduplicated and sorted so the symbol <-> index bijection is identical for
// identical input, regardless of input order.
//
// Raw data is untrusted: anything that is not a plausible symbol string is
// filtered out here. Whether a symbol actually parses as a playable note is
// decided later by the track builder (see `note.rs`, `track.rs`), which drops
// unplayable symbols instead of failing.
//
// If nothing usable survives filtering, or the data file is missing, the
// vocabulary falls back to `DEFAULT_PITCHNAMES`. This is a policy, not an
// error, so `load` never fails.

use crate::error::{GenerationError, Result};
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeSet;
use std::path::Path;
use tracing::{info, warn};

/// Substituted when the source data yields no symbols: one octave of C major.
pub const DEFAULT_PITCHNAMES: [&str; 8] = ["C4", "D4", "E4", "F4", "G4", "A4", "B4", "C5"];

/// On-disk layouts accepted by `Vocabulary::load`.
#[derive(Deserialize)]
#[serde(untagged)]
enum PersistedNotes {
    List(Vec<Value>),
    Bundle { notes: Vec<Value> },
}

/// Sorted, deduplicated note symbols with dense indices `0..len()`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vocabulary {
    pitchnames: Vec<String>,
}

impl Vocabulary {
    /// Build from raw JSON entries, discarding non-strings and malformed
    /// strings.
    pub fn build(raw: &[Value]) -> Self {
        Self::from_symbols(raw.iter().filter_map(Value::as_str))
    }

    /// Build from candidate symbol strings with the same filtering as `build`.
    pub fn from_symbols<I, S>(symbols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let set: BTreeSet<String> = symbols
            .into_iter()
            .filter(|s| is_symbol(s.as_ref()))
            .map(|s| s.as_ref().to_string())
            .collect();

        if set.is_empty() {
            return Self::default_set();
        }
        Self {
            pitchnames: set.into_iter().collect(),
        }
    }

    /// The documented fallback vocabulary.
    pub fn default_set() -> Self {
        Self::from_sorted(DEFAULT_PITCHNAMES.iter().map(|s| s.to_string()).collect())
    }

    fn from_sorted(mut pitchnames: Vec<String>) -> Self {
        pitchnames.sort();
        pitchnames.dedup();
        Self { pitchnames }
    }

    /// Load persisted note data. Accepts a bare JSON array of entries or an
    /// object with a `notes` array. Never fails: an absent, unreadable or
    /// unparseable file yields the default vocabulary.
    pub fn load(path: &Path) -> Self {
        let data = match std::fs::read_to_string(path) {
            Ok(data) => data,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "note data unavailable, using default vocabulary");
                return Self::default_set();
            }
        };

        let raw = match serde_json::from_str::<PersistedNotes>(&data) {
            Ok(PersistedNotes::List(raw)) | Ok(PersistedNotes::Bundle { notes: raw }) => raw,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "note data malformed, using default vocabulary");
                return Self::default_set();
            }
        };

        let vocab = Self::build(&raw);
        info!(
            path = %path.display(),
            entries = raw.len(),
            n_vocab = vocab.len(),
            "loaded vocabulary"
        );
        vocab
    }

    /// Index of `symbol`, or `UnknownSymbol`.
    pub fn index_of(&self, symbol: &str) -> Result<usize> {
        self.pitchnames
            .binary_search_by(|p| p.as_str().cmp(symbol))
            .map_err(|_| GenerationError::UnknownSymbol(symbol.to_string()))
    }

    /// Symbol at `index`, or `IndexOutOfRange`.
    pub fn symbol_of(&self, index: usize) -> Result<&str> {
        self.pitchnames
            .get(index)
            .map(String::as_str)
            .ok_or(GenerationError::IndexOutOfRange {
                index,
                n_vocab: self.pitchnames.len(),
            })
    }

    pub fn pitchnames(&self) -> &[String] {
        &self.pitchnames
    }

    /// `n_vocab`. Always at least 1.
    pub fn len(&self) -> usize {
        self.pitchnames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pitchnames.is_empty()
    }

    pub fn is_default(&self) -> bool {
        self.pitchnames == Self::default_set().pitchnames
    }
}

/// A symbol candidate must be a non-empty token without whitespace or control
/// characters.
fn is_symbol(s: &str) -> bool {
    !s.is_empty() && !s.chars().any(|c| c.is_whitespace() || c.is_control())
}
