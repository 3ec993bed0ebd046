// Scoring functions: window of recent indices in, next-symbol distribution out.
//
// The sequence generator only sees the `Scorer` trait. A trained network
// lives behind it in production; its loading and weights are not this
// crate's business. The window arrives normalized (`index / n_vocab`, so
// every value is in [0, 1)) and the scorer must return one probability per
// vocabulary entry.
//
// `TransitionScorer` is the bundled implementation: a transition-table model
// loaded from JSON, keyed on the last one or two indices of the window, with
// backoff from order 2 to order 1 to the unigram table. Table weights are
// unnormalized counts; a small additive smoothing keeps every symbol
// reachable.
//
// Closures `Fn(&[f64]) -> Result<Vec<f64>, ScorerError>` implement `Scorer`
// too, which is how callers plug in an external inference runtime.

use crate::error::{GenerationError, ScorerError};
use crate::generator::SEQUENCE_LENGTH;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Maps a normalized context window to a probability vector over the
/// vocabulary. Implementations are shared read-only across requests.
pub trait Scorer: Send + Sync {
    fn score(&self, window: &[f64]) -> Result<Vec<f64>, ScorerError>;
}

impl<F> Scorer for F
where
    F: Fn(&[f64]) -> Result<Vec<f64>, ScorerError> + Send + Sync,
{
    fn score(&self, window: &[f64]) -> Result<Vec<f64>, ScorerError> {
        self(window)
    }
}

/// Next-index weights. Key: vocabulary index. Value: unnormalized count.
type TransitionTable = BTreeMap<usize, f64>;

/// Transition-table scorer with order-2 -> order-1 -> unigram backoff.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionScorer {
    /// Vocabulary size the tables were built against.
    pub n_vocab: usize,
    /// Expected window length.
    #[serde(default = "default_window_length")]
    pub window_length: usize,
    /// Keyed by the last two indices, "a,b".
    #[serde(default)]
    pub order2: BTreeMap<String, TransitionTable>,
    /// Keyed by the last index.
    #[serde(default)]
    pub order1: BTreeMap<String, TransitionTable>,
    #[serde(default)]
    pub order0: TransitionTable,
    /// Added to every entry before normalizing.
    #[serde(default = "default_smoothing")]
    pub smoothing: f64,
}

fn default_window_length() -> usize {
    SEQUENCE_LENGTH
}

fn default_smoothing() -> f64 {
    0.01
}

impl TransitionScorer {
    /// An untrained scorer: uniform over `n_vocab` symbols.
    pub fn uniform(n_vocab: usize) -> Self {
        TransitionScorer {
            n_vocab,
            window_length: SEQUENCE_LENGTH,
            order2: BTreeMap::new(),
            order1: BTreeMap::new(),
            order0: TransitionTable::new(),
            smoothing: default_smoothing(),
        }
    }

    /// Load and validate a model file.
    pub fn load(path: &Path) -> Result<Self, GenerationError> {
        let model_err = |message: String| GenerationError::Model {
            path: path.to_path_buf(),
            message,
        };
        let data = std::fs::read_to_string(path).map_err(|e| model_err(e.to_string()))?;
        let model: TransitionScorer =
            serde_json::from_str(&data).map_err(|e| model_err(e.to_string()))?;
        model.validate().map_err(model_err)?;
        Ok(model)
    }

    /// Check that the model expects the generator's window length, every
    /// table index fits the vocabulary and every weight is a finite
    /// non-negative number.
    pub fn validate(&self) -> Result<(), String> {
        if self.n_vocab == 0 {
            return Err("n_vocab must be at least 1".into());
        }
        if self.window_length != SEQUENCE_LENGTH {
            return Err(format!(
                "window_length {} does not match the generator window of {SEQUENCE_LENGTH}",
                self.window_length
            ));
        }
        if !self.smoothing.is_finite() || self.smoothing < 0.0 {
            return Err(format!("invalid smoothing {}", self.smoothing));
        }

        let tables = self
            .order2
            .values()
            .chain(self.order1.values())
            .chain(std::iter::once(&self.order0));
        for table in tables {
            for (&index, &weight) in table {
                if index >= self.n_vocab {
                    return Err(format!("index {index} >= n_vocab {}", self.n_vocab));
                }
                if !weight.is_finite() || weight < 0.0 {
                    return Err(format!("invalid weight {weight} for index {index}"));
                }
            }
        }
        Ok(())
    }

    /// Recover a vocabulary index from a normalized window value.
    fn decode(&self, value: f64) -> Result<usize, ScorerError> {
        if !value.is_finite() || value < 0.0 {
            return Err(ScorerError::Inference(format!(
                "window value {value} is not a normalized index"
            )));
        }
        let index = (value * self.n_vocab as f64).round() as usize;
        Ok(index.min(self.n_vocab - 1))
    }

    /// Highest-order non-empty table for the given context.
    fn lookup(&self, context: &[usize]) -> Option<&TransitionTable> {
        if context.len() >= 2 {
            let key = context_key(&context[context.len() - 2..]);
            if let Some(table) = self.order2.get(&key).filter(|t| !t.is_empty()) {
                return Some(table);
            }
        }
        if let Some(&last) = context.last() {
            let key = context_key(&[last]);
            if let Some(table) = self.order1.get(&key).filter(|t| !t.is_empty()) {
                return Some(table);
            }
        }
        Some(&self.order0).filter(|t| !t.is_empty())
    }
}

impl Scorer for TransitionScorer {
    fn score(&self, window: &[f64]) -> Result<Vec<f64>, ScorerError> {
        if window.len() != self.window_length {
            return Err(ScorerError::WindowLength {
                expected: self.window_length,
                got: window.len(),
            });
        }

        let tail = &window[window.len().saturating_sub(2)..];
        let context = tail
            .iter()
            .map(|&v| self.decode(v))
            .collect::<Result<Vec<_>, _>>()?;

        let mut probs = vec![self.smoothing; self.n_vocab];
        if let Some(table) = self.lookup(&context) {
            for (&index, &weight) in table {
                if let Some(p) = probs.get_mut(index) {
                    *p += weight;
                }
            }
        }

        let total: f64 = probs.iter().sum();
        if total <= 0.0 {
            return Ok(vec![1.0 / self.n_vocab as f64; self.n_vocab]);
        }
        Ok(probs.into_iter().map(|p| p / total).collect())
    }
}

/// Encode a context of indices as a map key.
fn context_key(context: &[usize]) -> String {
    context
        .iter()
        .map(|i| i.to_string())
        .collect::<Vec<_>>()
        .join(",")
}
