//! Storage boundary.
//!
//! [`StorageEngine`] is the minimum an adapter must provide for the
//! repository and association engine to work: static finders and writers
//! per model, plus transactions. [`Instance`] is the capability set of one
//! loaded or built row. Everything crossing the boundary is plain JSON data
//! and the option shapes from [`ormlink_proto`].

mod memory;

use std::fmt::Debug;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use ormlink_proto::{
    AggregateFunction, DestroyOptions, FindOptions, Record, ReloadOptions, TableOptions,
    Transaction, UpdateOptions, WriteOptions,
};

use crate::catalog::ModelDef;

pub use memory::{MemoryEngine, MemoryInstance};

/// Backend classification of a failed constraint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViolationKind {
    /// Required value missing.
    NotNull,
    /// Duplicate value in a unique attribute.
    Unique,
    /// Non-string value in a string attribute.
    StringType,
    /// Any other backend code, passed through.
    Other(String),
}

/// One failed constraint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    /// Attribute key, or constraint name for table-level constraints.
    pub path: String,
    /// Classification.
    pub kind: ViolationKind,
    /// Backend message.
    pub message: String,
}

impl Violation {
    /// Create a violation.
    pub fn new(path: impl Into<String>, kind: ViolationKind, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            kind,
            message: message.into(),
        }
    }
}

/// Validation failure as reported by a storage adapter.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct BackendValidationError {
    /// Summary message.
    pub message: String,
    /// Individual failures.
    pub violations: Vec<Violation>,
}

impl BackendValidationError {
    /// Create a validation failure.
    pub fn new(message: impl Into<String>, violations: Vec<Violation>) -> Self {
        Self {
            message: message.into(),
            violations,
        }
    }
}

/// Storage adapter errors.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StorageError {
    /// Attribute validation failed.
    #[error("validation error: {0}")]
    Validation(BackendValidationError),

    /// The adapter has no table for this model.
    #[error("unknown model: {0}")]
    UnknownModel(String),

    /// The adapter cannot evaluate part of the options.
    #[error("unsupported: {0}")]
    Unsupported(String),

    /// Row not found.
    #[error("record not found")]
    NotFound,

    /// Transaction error.
    #[error("transaction error: {0}")]
    Transaction(String),

    /// Any other backend failure.
    #[error("database error: {0}")]
    Database(String),

    /// Protocol error.
    #[error("protocol error: {0}")]
    Protocol(#[from] ormlink_proto::Error),
}

/// Value passed to an association setter.
#[derive(Debug, Clone)]
pub enum AssociationTarget<I> {
    /// Clear the association.
    None,
    /// A single target (BelongsTo, HasOne).
    One(I),
    /// A list of targets (HasMany, BelongsToMany).
    Many(Vec<I>),
}

impl<I> AssociationTarget<I> {
    /// Targets as a slice-like iterator.
    pub fn iter(&self) -> impl Iterator<Item = &I> {
        let items: &[I] = match self {
            AssociationTarget::None => &[],
            AssociationTarget::One(item) => std::slice::from_ref(item),
            AssociationTarget::Many(items) => items,
        };
        items.iter()
    }

    /// The single target, if this is one.
    pub fn as_one(&self) -> Option<&I> {
        match self {
            AssociationTarget::One(item) => Some(item),
            _ => None,
        }
    }

    /// The target list, if this is one.
    pub fn as_many(&self) -> Option<&[I]> {
        match self {
            AssociationTarget::Many(items) => Some(items),
            _ => None,
        }
    }
}

/// A built or loaded row.
#[async_trait]
pub trait Instance: Clone + Debug + Send + Sync + Sized + 'static {
    /// Name of the model this row belongs to.
    fn model_name(&self) -> &str;

    /// Current value of an attribute.
    fn get(&self, key: &str) -> Option<&Value>;

    /// Set an attribute in memory.
    fn set(&mut self, key: &str, value: Value);

    /// The row has never been persisted.
    fn is_new_record(&self) -> bool;

    /// Eager-loaded association by alias, if loaded.
    fn related(&self, alias: &str) -> Option<&AssociationTarget<Self>>;

    /// Flatten to plain data, following loaded associations `depth` levels.
    fn to_plain_object(&self, depth: usize) -> Record;

    /// Insert (new) or update (persisted) this row.
    async fn save(&mut self, options: WriteOptions) -> Result<(), StorageError>;

    /// Replace the association `alias` with `target`.
    async fn set_association(
        &mut self,
        alias: &str,
        target: AssociationTarget<Self>,
        transaction: Option<Transaction>,
    ) -> Result<(), StorageError>;

    /// Re-read the row and the given includes from storage.
    async fn reload(&mut self, options: ReloadOptions) -> Result<(), StorageError>;
}

/// Static, per-model operations of a storage adapter.
#[async_trait]
pub trait StorageEngine: Send + Sync + 'static {
    /// Row type produced by this adapter.
    type Instance: Instance;

    /// Build an unsaved (or known-persisted) row without touching storage.
    fn build(
        &self,
        model: &ModelDef,
        data: Record,
        is_new: bool,
    ) -> Result<Self::Instance, StorageError>;

    /// All rows matching the options.
    async fn find_all(
        &self,
        model: &ModelDef,
        options: &FindOptions,
    ) -> Result<Vec<Self::Instance>, StorageError>;

    /// First row matching the options.
    async fn find_one(
        &self,
        model: &ModelDef,
        options: &FindOptions,
    ) -> Result<Option<Self::Instance>, StorageError>;

    /// Number of rows matching the options.
    async fn count(&self, model: &ModelDef, options: &FindOptions) -> Result<u64, StorageError>;

    /// Aggregate one attribute over the matching rows.
    async fn aggregate(
        &self,
        model: &ModelDef,
        attribute: &str,
        function: AggregateFunction,
        options: &FindOptions,
    ) -> Result<Value, StorageError>;

    /// Insert one row.
    async fn create(
        &self,
        model: &ModelDef,
        data: Record,
        options: WriteOptions,
    ) -> Result<Self::Instance, StorageError>;

    /// Insert many rows.
    async fn bulk_create(
        &self,
        model: &ModelDef,
        rows: Vec<Record>,
        options: WriteOptions,
    ) -> Result<Vec<Self::Instance>, StorageError>;

    /// Update matching rows; returns the number affected.
    async fn update(
        &self,
        model: &ModelDef,
        values: Record,
        options: &UpdateOptions,
    ) -> Result<u64, StorageError>;

    /// Insert or update by primary key; returns the row and whether it was
    /// created.
    async fn upsert(
        &self,
        model: &ModelDef,
        values: Record,
        options: WriteOptions,
    ) -> Result<(Self::Instance, bool), StorageError>;

    /// Delete (or soft-delete) matching rows; returns the number affected.
    async fn destroy(&self, model: &ModelDef, options: &DestroyOptions)
        -> Result<u64, StorageError>;

    /// Undo soft deletes on matching rows; returns the number affected.
    async fn restore(&self, model: &ModelDef, options: &DestroyOptions)
        -> Result<u64, StorageError>;

    /// Remove every row.
    async fn truncate(&self, model: &ModelDef, options: TableOptions) -> Result<(), StorageError>;

    /// Remove the table.
    async fn drop_table(&self, model: &ModelDef, options: TableOptions)
        -> Result<(), StorageError>;

    /// Open a transaction.
    async fn begin(&self) -> Result<Transaction, StorageError>;

    /// Commit a transaction.
    async fn commit(&self, transaction: Transaction) -> Result<(), StorageError>;

    /// Roll back a transaction.
    async fn rollback(&self, transaction: Transaction) -> Result<(), StorageError>;
}
