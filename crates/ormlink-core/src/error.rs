//! Core error types.

use thiserror::Error;

use crate::catalog::ModelDef;
use crate::storage::StorageError;
use crate::validation::ValidationError;

/// Core errors.
#[derive(Debug, Error)]
pub enum Error {
    /// Model catalog error.
    #[error("catalog error: {0}")]
    Catalog(#[from] CatalogError),

    /// Malformed query construction.
    #[error("query error: {0}")]
    Query(#[from] QueryError),

    /// Association lookup failed.
    #[error("association error: {0}")]
    Association(#[from] AssociationError),

    /// Attribute validation failed.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Storage adapter error other than validation.
    #[error("storage error: {0}")]
    Storage(StorageError),

    /// Protocol error.
    #[error("protocol error: {0}")]
    Protocol(#[from] ormlink_proto::Error),
}

impl Error {
    /// Lift a storage error raised while writing `model`.
    ///
    /// Backend validation failures become a [`ValidationError`] keyed by the
    /// model's attribute and association keys. Everything else is passed
    /// through unchanged.
    pub fn from_storage(err: StorageError, model: &ModelDef) -> Self {
        Self::from_storage_prefixed(err, model, None)
    }

    /// Like [`Error::from_storage`], prefixing every emitted key with
    /// `prefix.` (used for nested association writes).
    pub fn from_storage_prefixed(err: StorageError, model: &ModelDef, prefix: Option<&str>) -> Self {
        match err {
            StorageError::Validation(backend) => {
                Error::Validation(ValidationError::from_backend(model, &backend, prefix))
            }
            other => Error::Storage(other),
        }
    }

    /// Prefix the keys of a validation error; other errors are unchanged.
    pub fn with_prefix(self, prefix: &str) -> Self {
        match self {
            Error::Validation(err) => Error::Validation(err.with_prefix(prefix)),
            other => other,
        }
    }

    /// The validation error, if this is one.
    pub fn as_validation(&self) -> Option<&ValidationError> {
        match self {
            Error::Validation(err) => Some(err),
            _ => None,
        }
    }
}

/// Catalog errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CatalogError {
    /// No model registered under this name.
    #[error("unknown model: {0}")]
    UnknownModel(String),

    /// A model with this name is already registered.
    #[error("model '{0}' is already registered")]
    DuplicateModel(String),

    /// The model declares no primary key.
    #[error("model '{0}' has no primary key")]
    MissingPrimaryKey(String),

    /// Two attributes or associations share a key.
    #[error("model '{model}' declares '{key}' more than once")]
    DuplicateKey {
        /// Model name.
        model: String,
        /// Repeated key.
        key: String,
    },
}

/// Errors building or compiling a query.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    /// Node kind that cannot appear on the left of a comparison.
    #[error("a {kind} node cannot be used as the left side of a predicate")]
    InvalidLeftOperand {
        /// Node kind name.
        kind: &'static str,
    },

    /// A nested query was built for a different model than the association target.
    #[error("include '{alias}' targets '{expected}' but the nested query is for '{actual}'")]
    NestedModelMismatch {
        /// Association alias.
        alias: String,
        /// Association target model.
        expected: String,
        /// Model of the nested query.
        actual: String,
    },
}

/// Association lookup errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AssociationError {
    /// The model declares no association under this key.
    #[error("model '{model}' has no association '{key}'")]
    UnknownAssociation {
        /// Source model name.
        model: String,
        /// Requested association key.
        key: String,
    },

    /// The association's target model is not registered.
    #[error("association '{model}.{key}' targets unregistered model '{target}'")]
    UnresolvedTarget {
        /// Source model name.
        model: String,
        /// Association key.
        key: String,
        /// Target model name.
        target: String,
    },
}
