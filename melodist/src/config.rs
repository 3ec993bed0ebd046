// Generator configuration.
//
// Everything tunable about a generation run lives in `GeneratorConfig`,
// loaded from JSON at startup. Missing fields take the defaults below, so an
// empty object `{}` is a valid config. Where the vocabulary and model files
// are found, the defaults for length and temperature, the offset policy per
// mode and the MIDI rendering parameters are all set here.
//
// Length and timing are configured per mode because the model-backed and
// fallback paths have historically rendered differently: 300 back-to-back
// quarter notes versus 100 notes on a half-quarter grid.
//
// CLI flags override file values (see `main.rs`).

use crate::error::{GenerationError, Result};
use crate::generator::{GenerationRequest, Mode};
use crate::midi::MidiSettings;
use crate::track::{FIXED_STEP, OffsetPolicy};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Temperature used when a request does not specify one.
pub const DEFAULT_TEMPERATURE: f64 = 0.9;

/// Default output length with a scorer loaded.
pub const MODEL_LENGTH: usize = 300;

/// Default output length in fallback mode.
pub const FALLBACK_LENGTH: usize = 100;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// Persisted note data. Absent or unreadable -> default vocabulary.
    pub vocab_path: Option<PathBuf>,
    /// Transition model. Absent or unloadable -> fallback mode.
    pub model_path: Option<PathBuf>,
    pub default_temperature: f64,
    pub model_length: usize,
    pub fallback_length: usize,
    pub model_offsets: OffsetPolicy,
    pub fallback_offsets: OffsetPolicy,
    pub midi: MidiSettings,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        GeneratorConfig {
            vocab_path: Some(PathBuf::from("data/note_data.json")),
            model_path: Some(PathBuf::from("data/model.json")),
            default_temperature: DEFAULT_TEMPERATURE,
            model_length: MODEL_LENGTH,
            fallback_length: FALLBACK_LENGTH,
            model_offsets: OffsetPolicy::Sequential,
            fallback_offsets: OffsetPolicy::FixedStep { step: FIXED_STEP },
            midi: MidiSettings::default(),
        }
    }
}

impl GeneratorConfig {
    /// Load from a JSON file and validate.
    pub fn load(path: &Path) -> Result<Self> {
        let config_err = |message: String| GenerationError::Config {
            path: path.to_path_buf(),
            message,
        };
        let data = std::fs::read_to_string(path).map_err(|e| config_err(e.to_string()))?;
        let config: GeneratorConfig =
            serde_json::from_str(&data).map_err(|e| config_err(e.to_string()))?;
        config.validate().map_err(config_err)?;
        Ok(config)
    }

    pub fn validate(&self) -> std::result::Result<(), String> {
        if !(self.default_temperature.is_finite() && self.default_temperature > 0.0) {
            return Err(format!(
                "default_temperature must be positive, got {}",
                self.default_temperature
            ));
        }
        if self.model_length == 0 || self.fallback_length == 0 {
            return Err("generation lengths must be at least 1".into());
        }
        for policy in [self.model_offsets, self.fallback_offsets] {
            let step = policy.step();
            if !(step.is_finite() && step > 0.0) {
                return Err(format!("offset step must be positive, got {step}"));
            }
        }
        if !(self.midi.note_length.is_finite() && self.midi.note_length > 0.0) {
            return Err(format!(
                "note_length must be positive, got {}",
                self.midi.note_length
            ));
        }
        Ok(())
    }

    pub fn default_length(&self, mode: Mode) -> usize {
        match mode {
            Mode::ModelBacked => self.model_length,
            Mode::Fallback => self.fallback_length,
        }
    }

    pub fn offsets(&self, mode: Mode) -> OffsetPolicy {
        match mode {
            Mode::ModelBacked => self.model_offsets,
            Mode::Fallback => self.fallback_offsets,
        }
    }

    /// The request a caller gets when it specifies nothing.
    pub fn default_request(&self, mode: Mode) -> GenerationRequest {
        GenerationRequest {
            length: self.default_length(mode),
            temperature: self.default_temperature,
            seed: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = GeneratorConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.default_length(Mode::ModelBacked), 300);
        assert_eq!(config.default_length(Mode::Fallback), 100);
        assert_eq!(config.offsets(Mode::Fallback).step(), 0.5);
        assert_eq!(config.offsets(Mode::ModelBacked).step(), 1.0);

        let req = config.default_request(Mode::Fallback);
        assert_eq!(req.length, 100);
        assert_eq!(req.temperature, 0.9);
    }

    #[test]
    fn test_empty_object_is_default() {
        let config: GeneratorConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, GeneratorConfig::default());
    }

    #[test]
    fn test_partial_override() {
        let json = r#"{
            "default_temperature": 1.3,
            "fallback_offsets": {"policy": "sequential"},
            "midi": {"tempo_bpm": 90}
        }"#;
        let config: GeneratorConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.default_temperature, 1.3);
        assert_eq!(config.fallback_offsets, OffsetPolicy::Sequential);
        assert_eq!(config.midi.tempo_bpm, 90);
        assert_eq!(config.midi.velocity, MidiSettings::default().velocity);
        assert_eq!(config.model_length, MODEL_LENGTH);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = GeneratorConfig {
            default_temperature: 0.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        config.default_temperature = 0.9;
        config.fallback_length = 0;
        assert!(config.validate().is_err());

        config.fallback_length = 100;
        config.model_offsets = OffsetPolicy::FixedStep { step: -0.5 };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"model_length": 0}"#).unwrap();
        match GeneratorConfig::load(&path) {
            Err(GenerationError::Config { path: p, .. }) => assert_eq!(p, path),
            other => panic!("expected config error, got {other:?}"),
        }
    }

    #[test]
    fn test_load_missing_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(GeneratorConfig::load(&dir.path().join("nope.json")).is_err());
    }
}
