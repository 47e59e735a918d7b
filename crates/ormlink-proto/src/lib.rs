//! ORMLink option shapes.
//!
//! This crate defines the backend-native option objects that a storage
//! adapter consumes. The query layer in `ormlink-core` compiles its typed
//! descriptors into these shapes; nothing else in the workspace is allowed to
//! depend on their layout.
//!
//! # Modules
//!
//! - [`value`] - Plain record and filter-map aliases over `serde_json`
//! - [`op`] - Filter operator vocabulary and reserved keys
//! - [`options`] - Find/include/order/write option objects
//! - [`transaction`] - Opaque transaction handle threaded through writes
//! - [`error`] - Protocol error types
//!
//! # Serialization
//!
//! Every option type derives `serde::Serialize`, so the compiled form can be
//! inspected as JSON:
//!
//! ```
//! use ormlink_proto::{FindOptions, WhereMap};
//! use serde_json::json;
//!
//! let mut filter = WhereMap::new();
//! filter.insert("age".into(), json!({ "$lt": 50 }));
//!
//! let options = FindOptions::new(filter).with_limit(10);
//! assert_eq!(
//!     options.to_value().unwrap(),
//!     json!({ "where": { "age": { "$lt": 50 } }, "limit": 10 })
//! );
//! ```

pub mod error;
pub mod op;
pub mod options;
pub mod transaction;
pub mod value;

pub use error::Error;

// Re-export commonly used types at crate root
pub use op::{Op, AND_KEY, ARGS_KEY, COL_KEY, FN_KEY, OR_KEY};
pub use options::{
    AggregateFunction, AttributeOption, DestroyOptions, Direction, FindOptions, IncludeOptions,
    OrderHop, OrderOption, ReloadOptions, TableOptions, UpdateOptions, WriteOptions,
};
pub use transaction::Transaction;
pub use value::{Record, Value, WhereMap};
