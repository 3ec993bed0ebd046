// Autoregressive sequence generation.
//
// One generator, two modes, chosen when it is constructed:
//
// - ModelBacked: a scorer is available. The window is seeded with
//   `SEQUENCE_LENGTH` uniformly random indices (no corpus context is needed,
//   so generation cannot fail for lack of a seed). Each step normalizes the
//   window, asks the scorer for a distribution, samples it at the requested
//   temperature, emits the symbol and slides the window by one.
// - Fallback: no scorer. Each step draws a symbol uniformly from the
//   vocabulary. There is no window and temperature has no effect.
//
// The scorer is called once per output symbol and may block. Its failures
// are propagated immediately with the step number; there are no retries.
//
// All mutable state (window, rng) belongs to the caller's request. The
// vocabulary and scorer are only borrowed immutably.

use crate::error::{GenerationError, Result, ScorerError};
use crate::sampler;
use crate::scorer::Scorer;
use crate::vocab::Vocabulary;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use tracing::{debug, info};

/// Number of indices in the context window.
pub const SEQUENCE_LENGTH: usize = 50;

/// Steps between progress log lines.
const PROGRESS_INTERVAL: usize = 50;

/// What the caller asks for.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// Number of symbols to emit. Must be at least 1.
    pub length: usize,
    /// Sampling temperature. Must be positive.
    pub temperature: f64,
    /// Seed for the request's random stream. `None` draws one from entropy.
    #[serde(default)]
    pub seed: Option<u64>,
}

/// Which generation path is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    ModelBacked,
    Fallback,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::ModelBacked => write!(f, "model-backed"),
            Mode::Fallback => write!(f, "fallback"),
        }
    }
}

/// Fixed-length rolling context of vocabulary indices.
///
/// Every `push` evicts the oldest index, so the length never changes after
/// construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Window {
    indices: VecDeque<usize>,
}

impl Window {
    /// `SEQUENCE_LENGTH` indices drawn uniformly from `[0, n_vocab)`.
    pub fn random(n_vocab: usize, rng: &mut impl Rng) -> Self {
        let indices = (0..SEQUENCE_LENGTH)
            .map(|_| rng.random_range(0..n_vocab))
            .collect();
        Window { indices }
    }

    /// Append `index` and return the evicted oldest index.
    pub fn push(&mut self, index: usize) -> Option<usize> {
        self.indices.push_back(index);
        self.indices.pop_front()
    }

    /// Scale each index by `1 / n_vocab`, the scorer's expected input.
    pub fn normalized(&self, n_vocab: usize) -> Vec<f64> {
        let scale = n_vocab as f64;
        self.indices.iter().map(|&i| i as f64 / scale).collect()
    }

    pub fn indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.indices.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}

/// Produces note symbol sequences from a vocabulary and an optional scorer.
pub struct SequenceGenerator<'a> {
    vocab: &'a Vocabulary,
    scorer: Option<&'a dyn Scorer>,
}

impl<'a> SequenceGenerator<'a> {
    /// The mode is fixed here: model-backed iff `scorer` is present.
    pub fn new(vocab: &'a Vocabulary, scorer: Option<&'a dyn Scorer>) -> Self {
        SequenceGenerator { vocab, scorer }
    }

    pub fn mode(&self) -> Mode {
        if self.scorer.is_some() {
            Mode::ModelBacked
        } else {
            Mode::Fallback
        }
    }

    /// Generate exactly `request.length` symbols.
    ///
    /// `request.seed` is ignored here; the caller owns `rng`.
    pub fn generate(&self, request: &GenerationRequest, rng: &mut impl Rng) -> Result<Vec<String>> {
        sampler::validate_temperature(request.temperature)?;
        if request.length == 0 {
            return Err(GenerationError::InvalidLength);
        }

        info!(
            mode = %self.mode(),
            length = request.length,
            temperature = request.temperature,
            n_vocab = self.vocab.len(),
            "generating sequence"
        );

        match self.scorer {
            Some(scorer) => self.generate_with_model(scorer, request, rng),
            None => self.generate_uniform(request, rng),
        }
    }

    fn generate_with_model(
        &self,
        scorer: &dyn Scorer,
        request: &GenerationRequest,
        rng: &mut impl Rng,
    ) -> Result<Vec<String>> {
        let n_vocab = self.vocab.len();
        let mut window = Window::random(n_vocab, rng);
        let mut output = Vec::with_capacity(request.length);

        for step in 0..request.length {
            let features = window.normalized(n_vocab);
            let probs = scorer
                .score(&features)
                .map_err(|source| GenerationError::ScorerFailure { step, source })?;
            if probs.len() != n_vocab {
                return Err(GenerationError::ScorerFailure {
                    step,
                    source: ScorerError::ShapeMismatch {
                        expected: n_vocab,
                        got: probs.len(),
                    },
                });
            }

            let index = sampler::sample(&probs, request.temperature, rng)?;
            output.push(self.vocab.symbol_of(index)?.to_string());
            window.push(index);

            if (step + 1) % PROGRESS_INTERVAL == 0 {
                debug!(step = step + 1, total = request.length, "sampled");
            }
        }

        Ok(output)
    }

    fn generate_uniform(&self, request: &GenerationRequest, rng: &mut impl Rng) -> Result<Vec<String>> {
        let n_vocab = self.vocab.len();
        (0..request.length)
            .map(|_| {
                self.vocab
                    .symbol_of(rng.random_range(0..n_vocab))
                    .map(str::to_string)
            })
            .collect()
    }
}

/// Free-function form of `SequenceGenerator::generate`.
pub fn generate(
    request: &GenerationRequest,
    vocab: &Vocabulary,
    scorer: Option<&dyn Scorer>,
    rng: &mut impl Rng,
) -> Result<Vec<String>> {
    SequenceGenerator::new(vocab, scorer).generate(request, rng)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scorer::TransitionScorer;
    use melodist_prng::NoteRng;
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn request(length: usize, temperature: f64) -> GenerationRequest {
        GenerationRequest {
            length,
            temperature,
            seed: None,
        }
    }

    #[test]
    fn test_window_push_keeps_length() {
        let mut rng = NoteRng::new(1);
        let mut window = Window::random(7, &mut rng);
        assert_eq!(window.len(), SEQUENCE_LENGTH);
        let oldest = window.indices().next();
        assert_eq!(window.push(3), oldest);
        assert_eq!(window.len(), SEQUENCE_LENGTH);
        assert_eq!(window.indices().last(), Some(3));
    }

    #[test]
    fn test_window_normalized_in_unit_range() {
        let mut rng = NoteRng::new(2);
        let window = Window::random(12, &mut rng);
        let features = window.normalized(12);
        assert_eq!(features.len(), SEQUENCE_LENGTH);
        assert!(features.iter().all(|&v| (0.0..1.0).contains(&v)));
    }

    #[test]
    fn test_mode_selection() {
        let vocab = Vocabulary::default_set();
        let scorer = TransitionScorer::uniform(vocab.len());
        assert_eq!(SequenceGenerator::new(&vocab, None).mode(), Mode::Fallback);
        assert_eq!(
            SequenceGenerator::new(&vocab, Some(&scorer)).mode(),
            Mode::ModelBacked
        );
    }

    #[test]
    fn test_model_backed_length_300() {
        let vocab = Vocabulary::default_set();
        let scorer = TransitionScorer::uniform(vocab.len());
        let mut rng = NoteRng::new(3);
        let out = generate(&request(300, 0.9), &vocab, Some(&scorer), &mut rng).unwrap();
        assert_eq!(out.len(), 300);
        assert!(out.iter().all(|s| vocab.index_of(s).is_ok()));
    }

    #[test]
    fn test_fallback_length_100() {
        let vocab = Vocabulary::default_set();
        let mut rng = NoteRng::new(4);
        let out = generate(&request(100, 0.9), &vocab, None, &mut rng).unwrap();
        assert_eq!(out.len(), 100);
    }

    #[test]
    fn test_fallback_draws_from_vocabulary() {
        let vocab = Vocabulary::from_symbols(["C4", "D4", "E4"]);
        let mut rng = NoteRng::new(5);
        let out = generate(&request(5, 0.9), &vocab, None, &mut rng).unwrap();
        assert_eq!(out.len(), 5);
        for symbol in &out {
            assert!(["C4", "D4", "E4"].contains(&symbol.as_str()));
        }
    }

    #[test]
    fn test_scorer_sees_fixed_window_every_step() {
        let vocab = Vocabulary::from_symbols(["A4", "B4", "C4", "D4"]);
        let calls = AtomicUsize::new(0);
        let scorer = |window: &[f64]| -> std::result::Result<Vec<f64>, ScorerError> {
            assert_eq!(window.len(), SEQUENCE_LENGTH);
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![0.25; 4])
        };
        let mut rng = NoteRng::new(6);
        let out = generate(&request(120, 1.0), &vocab, Some(&scorer), &mut rng).unwrap();
        assert_eq!(out.len(), 120);
        assert_eq!(calls.load(Ordering::SeqCst), 120);
    }

    #[test]
    fn test_window_slides_sampled_indices_in() {
        // A deterministic scorer always picks index 1; after the first step
        // the newest window entry must be 1 / n_vocab.
        let vocab = Vocabulary::from_symbols(["A4", "B4", "C4"]);
        let last_seen = std::sync::Mutex::new(Vec::new());
        let scorer = |window: &[f64]| -> std::result::Result<Vec<f64>, ScorerError> {
            last_seen.lock().unwrap().push(window[SEQUENCE_LENGTH - 1]);
            Ok(vec![0.0, 1.0, 0.0])
        };
        let mut rng = NoteRng::new(7);
        let out = generate(&request(4, 0.05), &vocab, Some(&scorer), &mut rng).unwrap();
        assert_eq!(out, vec!["B4"; 4]);
        let seen = last_seen.lock().unwrap();
        for &v in &seen[1..] {
            assert!((v - 1.0 / 3.0).abs() < 1e-12);
        }
    }

    #[test]
    fn test_model_follows_transition_table() {
        let vocab = Vocabulary::from_symbols(["A4", "B4", "C4"]);
        let mut model = TransitionScorer::uniform(3);
        model.smoothing = 0.0;
        model.order1 = BTreeMap::from([
            ("0".to_string(), BTreeMap::from([(1, 1.0)])),
            ("1".to_string(), BTreeMap::from([(2, 1.0)])),
            ("2".to_string(), BTreeMap::from([(0, 1.0)])),
        ]);
        let mut rng = NoteRng::new(8);
        let out = generate(&request(30, 0.5), &vocab, Some(&model), &mut rng).unwrap();
        for pair in out.windows(2) {
            let a = vocab.index_of(&pair[0]).unwrap();
            let b = vocab.index_of(&pair[1]).unwrap();
            assert_eq!(b, (a + 1) % 3, "{pair:?}");
        }
    }

    #[test]
    fn test_same_seed_same_sequence() {
        let vocab = Vocabulary::default_set();
        let scorer = TransitionScorer::uniform(vocab.len());
        let a = generate(&request(64, 1.2), &vocab, Some(&scorer), &mut NoteRng::new(9)).unwrap();
        let b = generate(&request(64, 1.2), &vocab, Some(&scorer), &mut NoteRng::new(9)).unwrap();
        assert_eq!(a, b);

        let c = generate(&request(64, 1.2), &vocab, None, &mut NoteRng::new(9)).unwrap();
        let d = generate(&request(64, 1.2), &vocab, None, &mut NoteRng::new(9)).unwrap();
        assert_eq!(c, d);
    }

    #[test]
    fn test_scorer_failure_propagates_without_retry() {
        let vocab = Vocabulary::default_set();
        let calls = AtomicUsize::new(0);
        let failing = |_: &[f64]| -> std::result::Result<Vec<f64>, ScorerError> {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(ScorerError::Inference("weights missing".into()))
        };
        let mut rng = NoteRng::new(10);
        let err = generate(&request(10, 0.9), &vocab, Some(&failing), &mut rng).unwrap_err();
        assert!(matches!(err, GenerationError::ScorerFailure { step: 0, .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_wrong_shape_is_scorer_failure() {
        let vocab = Vocabulary::from_symbols(["C4", "D4", "E4"]);
        let short = |_: &[f64]| -> std::result::Result<Vec<f64>, ScorerError> { Ok(vec![1.0]) };
        let mut rng = NoteRng::new(11);
        let err = generate(&request(3, 0.9), &vocab, Some(&short), &mut rng).unwrap_err();
        assert!(matches!(
            err,
            GenerationError::ScorerFailure {
                step: 0,
                source: ScorerError::ShapeMismatch { expected: 3, got: 1 }
            }
        ));
    }

    #[test]
    fn test_invalid_request_rejected_before_scoring() {
        let vocab = Vocabulary::default_set();
        let mut rng = NoteRng::new(12);
        for t in [0.0, -1.0] {
            assert!(matches!(
                generate(&request(10, t), &vocab, None, &mut rng),
                Err(GenerationError::InvalidTemperature(_))
            ));
        }
        assert!(matches!(
            generate(&request(0, 0.9), &vocab, None, &mut rng),
            Err(GenerationError::InvalidLength)
        ));
    }
}
