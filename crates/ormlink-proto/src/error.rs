//! Protocol error types.

use thiserror::Error;

/// Protocol-level errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// Serialization of an option object failed.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// A filter map used an operator key outside the known vocabulary.
    #[error("unknown operator: {0}")]
    UnknownOperator(String),
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}
