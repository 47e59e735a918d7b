//! Structured validation errors.
//!
//! A storage adapter reports constraint failures as a flat list of
//! [`Violation`]s. [`ValidationError::from_backend`] regroups them by the
//! model's attribute and association keys and maps backend kinds to stable
//! codes. Every declared key is present in the result, with an empty list
//! when it has no errors.

use std::collections::BTreeMap;

use serde::Serialize;
use thiserror::Error;

use crate::catalog::ModelDef;
use crate::storage::{BackendValidationError, Violation, ViolationKind};

/// Code for a missing required value.
pub const REQUIRED: &str = "attribute.required";
/// Code for a duplicate value in a unique attribute.
pub const UNIQUE: &str = "attribute.unique";
/// Code for a non-string value in a string attribute.
pub const STRING: &str = "attribute.string";

/// One failure on one key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorItem {
    /// Stable code, such as `attribute.required`.
    pub kind: String,
    /// Backend message.
    pub message: String,
}

impl ErrorItem {
    /// Create an item.
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
        }
    }
}

/// Validation failure for one model, keyed by attribute.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[error("validation failed for {model}: {message}")]
pub struct ValidationError {
    /// Model that failed.
    pub model: String,
    /// Summary message from the backend.
    pub message: String,
    /// Failures per declared attribute or association key.
    pub attributes: BTreeMap<String, Vec<ErrorItem>>,
    /// Failures on paths the model does not declare (composite indexes,
    /// table constraints).
    pub constraints: BTreeMap<String, Vec<ErrorItem>>,
}

impl ValidationError {
    /// An error with every declared key present and empty.
    pub fn new(model: &ModelDef, message: impl Into<String>) -> Self {
        let attributes = model
            .declared_keys()
            .map(|key| (key.to_string(), Vec::new()))
            .collect();
        Self {
            model: model.name.clone(),
            message: message.into(),
            attributes,
            constraints: BTreeMap::new(),
        }
    }

    /// Regroup backend violations by the model's keys, optionally prefixing
    /// every key with `prefix.`.
    pub fn from_backend(
        model: &ModelDef,
        backend: &BackendValidationError,
        prefix: Option<&str>,
    ) -> Self {
        let mut error = Self::new(model, backend.message.clone());
        for violation in &backend.violations {
            error.record(model, violation);
        }
        match prefix {
            Some(prefix) => error.with_prefix(prefix),
            None => error,
        }
    }

    fn record(&mut self, model: &ModelDef, violation: &Violation) {
        let item = ErrorItem::new(domain_code(&violation.kind), violation.message.clone());
        let declared = model.declared_keys().any(|key| key == violation.path);
        let bucket = if declared {
            &mut self.attributes
        } else {
            &mut self.constraints
        };
        bucket.entry(violation.path.clone()).or_default().push(item);
    }

    /// Prefix every key with `prefix.`.
    pub fn with_prefix(self, prefix: &str) -> Self {
        let rekey = |map: BTreeMap<String, Vec<ErrorItem>>| {
            map.into_iter()
                .map(|(key, items)| (format!("{prefix}.{key}"), items))
                .collect()
        };
        Self {
            attributes: rekey(self.attributes),
            constraints: rekey(self.constraints),
            ..self
        }
    }

    /// Failures recorded for `key`.
    pub fn errors_for(&self, key: &str) -> &[ErrorItem] {
        self.attributes
            .get(key)
            .or_else(|| self.constraints.get(key))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Keys with at least one failure.
    pub fn failing_keys(&self) -> Vec<&str> {
        self.attributes
            .iter()
            .chain(self.constraints.iter())
            .filter(|(_, items)| !items.is_empty())
            .map(|(key, _)| key.as_str())
            .collect()
    }
}

/// Stable code for a backend violation kind.
pub fn domain_code(kind: &ViolationKind) -> String {
    match kind {
        ViolationKind::NotNull => REQUIRED.to_string(),
        ViolationKind::Unique => UNIQUE.to_string(),
        ViolationKind::StringType => STRING.to_string(),
        ViolationKind::Other(code) => code.clone(),
    }
}
