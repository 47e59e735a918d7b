//! ORMLink Core - model catalog, typed query algebra, and storage boundary.
//!
//! This crate holds everything that is independent of a particular storage
//! engine: the registry of model descriptors, the typed predicate and
//! projection builders, the immutable query descriptor and its compiler, the
//! mapping from backend validation failures to structured errors, and the
//! [`StorageEngine`] / [`Instance`] traits an adapter implements. An
//! in-memory adapter ([`MemoryEngine`]) ships for tests and embedding.

pub mod catalog;
pub mod error;
pub mod query;
pub mod storage;
pub mod validation;

pub use catalog::{
    AssociationDef, AssociationKind, AttributeDef, DataType, Entity, ModelDef, Registry,
};
pub use error::{AssociationError, CatalogError, Error, QueryError};
pub use query::{
    col, func, include_depth, Association, Expression, IncludeOverride, IncludeSpec, IntoOperand,
    Node, Operand, OrderTerm, Query, QueryDescriptor, Queryable, Where,
};
pub use storage::{
    AssociationTarget, BackendValidationError, Instance, MemoryEngine, MemoryInstance,
    StorageEngine, StorageError, Violation, ViolationKind,
};
pub use validation::{ErrorItem, ValidationError};

/// Re-export protocol types.
pub use ormlink_proto as proto;
