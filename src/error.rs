//! Error types for the questioning engine
//!
//! Only genuine failures live here. A reached question ceiling, a met target,
//! or an exhausted catalog are ordinary outcomes and surface as `None` or a
//! terminal `SessionStatus`, never as errors.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum QuestioningError {
    /// Template source missing, unreadable, or empty
    #[error("Template load error: {0}")]
    TemplateLoad(String),

    /// Invalid catalog or engine configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Phase not declared in the catalog's phase transitions
    #[error("Unknown phase: {0}")]
    UnknownPhase(String),

    #[error("Persistence error: {0}")]
    Persistence(#[from] rusqlite::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, QuestioningError>;

impl QuestioningError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn template_load(msg: impl Into<String>) -> Self {
        Self::TemplateLoad(msg.into())
    }
}
