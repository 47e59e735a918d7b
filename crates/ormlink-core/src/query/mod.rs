//! Typed query construction and compilation.
//!
//! - [`Node`] is the expression tree: attribute, column, function call,
//!   constant, alias, association reference.
//! - [`Queryable`] is a typed handle on a node that may stand on the left of
//!   a comparison; its comparison methods produce a [`Where`].
//! - [`Query`] is an immutable, typed query descriptor; every builder call
//!   returns a new value.
//! - The `compile_*` methods on [`QueryDescriptor`] turn a descriptor into
//!   the option shapes in [`ormlink_proto`].

mod association;
mod builder;
mod compile;
mod depth;
mod descriptor;
mod filter;
mod node;
mod operand;
mod queryable;

pub use association::Association;
pub use builder::Query;
pub use compile::compile_include_specs;
pub use depth::include_depth;
pub use descriptor::{IncludeOverride, IncludeSpec, OrderTerm, QueryDescriptor};
pub use filter::Where;
pub use node::{AttributeRef, Node};
pub use operand::{IntoOperand, Operand};
pub use queryable::{col, func, Expression, Queryable};
