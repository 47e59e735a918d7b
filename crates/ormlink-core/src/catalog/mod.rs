//! Model catalog.
//!
//! The catalog holds one immutable [`ModelDef`] per registered model: its
//! attributes, its associations, and whether it soft-deletes. Descriptors are
//! registered once at startup and looked up by name afterwards, so an
//! association can name a target model that is registered later.

mod association;
mod attribute;
mod entity;
mod model;
mod registry;

pub use association::{AssociationDef, AssociationKind};
pub use attribute::{AttributeDef, DataType};
pub use entity::Entity;
pub use model::ModelDef;
pub use registry::Registry;
