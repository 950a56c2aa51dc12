//! Engine configuration
//!
//! Every field has a default, so an empty TOML file (or none at all) is a
//! valid configuration.

use crate::ambiguity::DEFAULT_AMBIGUITY_PENALTY;
use crate::confidence::{ConfidenceWeights, DEFAULT_MIN_ANSWERS_FOR_CONSISTENCY};
use crate::error::{QuestioningError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_MAX_QUESTIONS: usize = 100;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    /// Used when neither the context nor the phase sets a target
    pub target_confidence: f64,
    pub max_questions_per_session: usize,
    /// Overrides the catalog's `followUpRules.maxDepth`
    pub max_follow_up_depth: Option<u32>,
    pub persist_questions: bool,
    pub min_answers_for_consistency: usize,
    pub ambiguity_penalty: f64,
    pub weights: ConfidenceWeights,
    pub templates_path: Option<PathBuf>,
    pub database_path: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            target_confidence: 0.8,
            max_questions_per_session: DEFAULT_MAX_QUESTIONS,
            max_follow_up_depth: None,
            persist_questions: false,
            min_answers_for_consistency: DEFAULT_MIN_ANSWERS_FOR_CONSISTENCY,
            ambiguity_penalty: DEFAULT_AMBIGUITY_PENALTY,
            weights: ConfidenceWeights::default(),
            templates_path: None,
            database_path: None,
        }
    }
}

impl EngineConfig {
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: EngineConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Defaults when the file does not exist; errors when it exists but is
    /// invalid
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// `<config_dir>/elicit/config.toml`
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("elicit")
            .join("config.toml")
    }

    /// `<data_dir>/elicit/sessions.db` unless configured
    pub fn database_path(&self) -> PathBuf {
        self.database_path.clone().unwrap_or_else(|| {
            dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("elicit")
                .join("sessions.db")
        })
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.target_confidence) {
            return Err(QuestioningError::config(format!(
                "target_confidence {} outside [0, 1]",
                self.target_confidence
            )));
        }
        if self.max_questions_per_session == 0 {
            return Err(QuestioningError::config("max_questions_per_session must be positive"));
        }
        if !(0.0..=1.0).contains(&self.ambiguity_penalty) {
            return Err(QuestioningError::config(format!(
                "ambiguity_penalty {} outside [0, 1]",
                self.ambiguity_penalty
            )));
        }
        if !self.weights.is_valid() {
            return Err(QuestioningError::config(
                "weights must be non-negative with a positive sum",
            ));
        }
        Ok(())
    }
}
