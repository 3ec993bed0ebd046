// Melodist: autoregressive note-sequence generator.
//
// Generates a melody one note symbol at a time by sampling a scorer's
// next-symbol distribution at a caller-chosen temperature, then renders the
// symbols as a timed single-voice MIDI track. When no trained scorer is
// available the generator degrades to uniform sampling over the vocabulary,
// so a request always produces a file.
//
// Architecture:
// - vocab.rs: Note vocabulary (sorted symbol <-> index bijection, defaults)
// - sampler.rs: Temperature rescaling and weighted index sampling
// - scorer.rs: `Scorer` trait and the JSON transition-table scorer
// - generator.rs: Sliding-window generation loop, model-backed and fallback modes
// - note.rs: Note symbol parsing to MIDI keys
// - track.rs: Symbol sequence -> timed note events, with drop outcomes
// - midi.rs: MIDI file output from timed events
// - config.rs: Data-driven defaults (lengths, temperature, timing, MIDI)
// - compose.rs: Per-request facade that ties the above together
// - error.rs: Error taxonomy
//
// Randomness comes from `melodist_prng::NoteRng`, one instance per request.
// Output is deterministic given a seed.

pub mod compose;
pub mod config;
pub mod error;
pub mod generator;
pub mod midi;
pub mod note;
pub mod sampler;
pub mod scorer;
pub mod track;
pub mod vocab;

pub use compose::{Composer, GenerationReport};
pub use config::GeneratorConfig;
pub use error::{GenerationError, ScorerError};
pub use generator::{GenerationRequest, Mode, SEQUENCE_LENGTH, SequenceGenerator, generate};
pub use scorer::{Scorer, TransitionScorer};
pub use track::{OffsetPolicy, TimedNoteEvent, TrackBuilder};
pub use vocab::Vocabulary;
