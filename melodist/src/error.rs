// Error taxonomy for generation and rendering.
//
// Only conditions the caller can act on live here. Malformed note symbols
// during track building and missing vocabulary data are not errors: they are
// recorded as outcomes (see `track.rs`) or degraded to defaults (see
// `vocab.rs`).

use std::path::PathBuf;
use thiserror::Error;

/// Failure raised by a `Scorer` implementation.
#[derive(Debug, Error)]
pub enum ScorerError {
    #[error("model returned {got} probabilities, expected {expected}")]
    ShapeMismatch { expected: usize, got: usize },

    #[error("window has {got} entries, expected {expected}")]
    WindowLength { expected: usize, got: usize },

    #[error("inference failed: {0}")]
    Inference(String),
}

/// Errors surfaced by the generation core.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("temperature must be a positive finite number, got {0}")]
    InvalidTemperature(f64),

    #[error("requested length must be at least 1")]
    InvalidLength,

    #[error("unknown note symbol '{0}'")]
    UnknownSymbol(String),

    #[error("index {index} outside vocabulary of {n_vocab} symbols")]
    IndexOutOfRange { index: usize, n_vocab: usize },

    #[error("scorer failed at step {step}: {source}")]
    ScorerFailure {
        step: usize,
        #[source]
        source: ScorerError,
    },

    #[error("failed to write track to {}: {source}", .path.display())]
    Serialization {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid generator config: {0}")]
    InvalidConfig(String),

    #[error("invalid config {}: {message}", .path.display())]
    Config { path: PathBuf, message: String },

    #[error("cannot load model {}: {message}", .path.display())]
    Model { path: PathBuf, message: String },
}

pub type Result<T> = std::result::Result<T, GenerationError>;
