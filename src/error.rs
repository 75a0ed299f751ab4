//! Error types for structural modification.

use thiserror::Error;

use crate::model::Grammar;

/// Every failure the engine reports. All of them are local to one file.
#[derive(Error, Debug)]
pub enum ModifyError {
    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Could not determine file type for: {0}")]
    UnknownGrammar(String),

    /// Parsing and traversal succeeded but nothing matched.
    #[error("No modifications were applied")]
    NoModificationsApplied,

    #[error("Failed to parse {grammar}: {message}")]
    Parse { grammar: Grammar, message: String },

    #[error("Invalid modification: {0}")]
    InvalidModification(String),

    #[error("Serialization failed: {0}")]
    Serialize(#[from] std::io::Error),

    #[error("Serialized output is not valid UTF-8")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),
}

impl ModifyError {
    pub fn parse(grammar: Grammar, message: impl Into<String>) -> Self {
        ModifyError::Parse {
            grammar,
            message: message.into(),
        }
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        ModifyError::InvalidModification(message.into())
    }
}

pub type Result<T> = std::result::Result<T, ModifyError>;
