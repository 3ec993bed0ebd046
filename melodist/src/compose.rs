// Request-level entry point.
//
// A `Composer` is built once per process from a `GeneratorConfig`: it loads
// the vocabulary and, if possible, the scorer, then serves any number of
// requests. Both are read-only after construction, so one `Composer` can be
// shared across threads. Each `compose` call seeds its own `NoteRng` and
// allocates its own window, so concurrent requests share no mutable state.
//
// Missing resources degrade instead of failing: no note data means the
// default vocabulary, no usable model means fallback mode. Only request
// validation, scorer failures and file writes produce errors.

use crate::config::GeneratorConfig;
use crate::error::{GenerationError, Result};
use crate::generator::{GenerationRequest, Mode, SequenceGenerator};
use crate::midi::write_midi;
use crate::scorer::{Scorer, TransitionScorer};
use crate::track::TrackBuilder;
use crate::vocab::Vocabulary;
use melodist_prng::NoteRng;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Summary of one completed request.
#[derive(Debug, Clone, Serialize)]
pub struct GenerationReport {
    pub mode: Mode,
    /// Seed the request's random stream was built from; replaying it with the
    /// same composer reproduces the output.
    pub seed: u64,
    pub temperature: f64,
    pub notes: Vec<String>,
    pub events_written: usize,
    pub events_dropped: usize,
    /// Track length in quarter notes.
    pub duration_quarters: f64,
    pub path: PathBuf,
}

pub struct Composer {
    vocab: Vocabulary,
    scorer: Option<Box<dyn Scorer>>,
    config: GeneratorConfig,
}

impl Composer {
    /// Fails with `InvalidConfig` if `config` does not validate.
    pub fn new(
        vocab: Vocabulary,
        scorer: Option<Box<dyn Scorer>>,
        config: GeneratorConfig,
    ) -> Result<Self> {
        config.validate().map_err(GenerationError::InvalidConfig)?;
        Ok(Composer {
            vocab,
            scorer,
            config,
        })
    }

    /// Load the vocabulary and model named in `config`. Missing or unusable
    /// resources degrade; only an invalid `config` is an error.
    pub fn from_config(config: GeneratorConfig) -> Result<Self> {
        config.validate().map_err(GenerationError::InvalidConfig)?;
        let vocab = match &config.vocab_path {
            Some(path) => Vocabulary::load(path),
            None => Vocabulary::default_set(),
        };
        let scorer = config
            .model_path
            .as_deref()
            .and_then(|path| load_scorer(path, &vocab));

        let composer = Composer::new(vocab, scorer, config)?;
        info!(
            mode = %composer.mode(),
            n_vocab = composer.vocab.len(),
            default_vocabulary = composer.vocab.is_default(),
            "composer ready"
        );
        Ok(composer)
    }

    pub fn mode(&self) -> Mode {
        self.generator().mode()
    }

    pub fn vocabulary(&self) -> &Vocabulary {
        &self.vocab
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    /// Default length for the active mode and the configured temperature.
    pub fn default_request(&self) -> GenerationRequest {
        self.config.default_request(self.mode())
    }

    fn generator(&self) -> SequenceGenerator<'_> {
        SequenceGenerator::new(&self.vocab, self.scorer.as_deref())
    }

    /// Generate a sequence, render it and write a MIDI file to `path`.
    pub fn compose(&self, request: &GenerationRequest, path: &Path) -> Result<GenerationReport> {
        let seed = request.seed.unwrap_or_else(rand::random);
        let mut rng = NoteRng::new(seed);
        let generator = self.generator();
        let mode = generator.mode();

        let notes = generator.generate(request, &mut rng)?;
        let build = TrackBuilder::new(self.config.offsets(mode)).build(&notes);
        if build.dropped() > 0 {
            info!(dropped = build.dropped(), "skipped unplayable symbols");
        }
        write_midi(&build.events, &self.config.midi, path)?;

        Ok(GenerationReport {
            mode,
            seed,
            temperature: request.temperature,
            events_written: build.placed(),
            events_dropped: build.dropped(),
            duration_quarters: build.duration(self.config.midi.note_length),
            notes,
            path: path.to_path_buf(),
        })
    }
}

/// Load the transition model at `path` if it exists and matches the
/// vocabulary. Any problem is logged and yields `None` (fallback mode).
fn load_scorer(path: &Path, vocab: &Vocabulary) -> Option<Box<dyn Scorer>> {
    if !path.exists() {
        info!(path = %path.display(), "no model found, using fallback generation");
        return None;
    }
    match TransitionScorer::load(path) {
        Ok(model) if model.n_vocab == vocab.len() => {
            info!(path = %path.display(), n_vocab = model.n_vocab, "loaded model");
            Some(Box::new(model))
        }
        Ok(model) => {
            warn!(
                path = %path.display(),
                model_vocab = model.n_vocab,
                n_vocab = vocab.len(),
                "model does not match vocabulary, using fallback generation"
            );
            None
        }
        Err(e) => {
            warn!(error = %e, "failed to load model, using fallback generation");
            None
        }
    }
}
