//! ORMLink - typed queries and association persistence over a storage engine.
//!
//! A [`Repository`] pairs an entity with a [`StorageEngine`]. Reads compile a
//! [`Query`] into backend options; writes take a [`Partial`] of column and
//! association values and, for every include on the query, persist the
//! related rows through the [`AssociationEngine`].
//!
//! # Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use ormlink::prelude::*;
//!
//! let registry = Arc::new(Registry::new());
//! registry.register_entity::<User>()?;
//! let engine = Arc::new(MemoryEngine::new(registry.clone()));
//! let users = Repository::<User, _>::new(engine, registry)?;
//!
//! // Create a user together with a new mentee.
//! let query = users.query()?.include(|f| f.mentee, None)?;
//! let values = Partial::new()
//!     .with_field("name", "Bruce")
//!     .with_one("mentee", Related::Plain(record));
//! let bruce = users.create(&query, values, &PersistOptions::default()).await?;
//!
//! // Find adults, oldest first.
//! let adults = users
//!     .query()?
//!     .filter(|f| f.age.gte(18))
//!     .order(|f| vec![f.age.desc()]);
//! let rows = users.find_all(&adults).await?;
//! ```

pub mod associate;
pub mod config;
pub mod partial;
pub mod repository;

pub use associate::{AssociationEngine, WriteMode};
pub use config::{PersistOptions, ReadbackMode, RepositoryConfig};
pub use partial::{AssociationValue, Partial, Related};
pub use repository::Repository;

pub use ormlink_core::{Error, Instance, MemoryEngine, Query, StorageEngine};

/// Re-export protocol types.
pub use ormlink_proto as proto;

/// Commonly used types.
pub mod prelude {
    pub use crate::{
        AssociationValue, PersistOptions, Partial, ReadbackMode, Related, Repository,
        RepositoryConfig,
    };
    pub use ormlink_core::{
        col, func, Association, AssociationTarget, Entity, Error, Instance, MemoryEngine,
        ModelDef, Query, Queryable, Registry, StorageEngine, Where,
    };
}
