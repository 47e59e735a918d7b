//! Typed query builder.

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use serde_json::Value;
use tracing::trace;

use ormlink_proto::{
    AttributeOption, FindOptions, IncludeOptions, OrderOption, WhereMap, AND_KEY, OR_KEY,
};

use super::association::Association;
use super::descriptor::{IncludeOverride, IncludeSpec, OrderTerm, QueryDescriptor};
use super::filter::Where;
use super::node::Node;
use crate::catalog::{Entity, ModelDef, Registry};
use crate::error::{Error, QueryError};

/// An immutable query on entity `T`.
///
/// Every builder method returns a new query; the receiver is never changed,
/// so a base query can be reused across calls.
///
/// ```
/// # use std::sync::Arc;
/// # use ormlink_core::{AttributeDef, DataType, Entity, ModelDef, Query, Queryable, Registry};
/// # struct User;
/// # struct UserFields { age: Queryable<i64> }
/// # impl Entity for User {
/// #     const NAME: &'static str = "User";
/// #     type Fields = UserFields;
/// #     fn model() -> ModelDef {
/// #         ModelDef::new("User")
/// #             .with_attribute(AttributeDef::identity("id"))
/// #             .with_attribute(AttributeDef::new("age", DataType::Integer))
/// #     }
/// #     fn fields() -> UserFields { UserFields { age: Queryable::attribute("age") } }
/// # }
/// let registry = Arc::new(Registry::new());
/// registry.register_entity::<User>().unwrap();
///
/// let adults = Query::<User>::new(registry).unwrap().filter(|f| f.age.gte(18));
/// let page = adults.skip(20).take(10);
///
/// assert_eq!(adults.descriptor().skipped(), 0);
/// assert_eq!(page.compile_wheres(), adults.compile_wheres());
/// ```
pub struct Query<T: Entity> {
    registry: Arc<Registry>,
    model: Arc<ModelDef>,
    descriptor: QueryDescriptor,
    _entity: PhantomData<fn() -> T>,
}

impl<T: Entity> Clone for Query<T> {
    fn clone(&self) -> Self {
        Self {
            registry: self.registry.clone(),
            model: self.model.clone(),
            descriptor: self.descriptor.clone(),
            _entity: PhantomData,
        }
    }
}

impl<T: Entity> fmt::Debug for Query<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Query")
            .field("model", &self.model.name)
            .field("descriptor", &self.descriptor)
            .finish()
    }
}

impl<T: Entity> PartialEq for Query<T> {
    fn eq(&self, other: &Self) -> bool {
        self.descriptor == other.descriptor
    }
}

impl<T: Entity> Query<T> {
    /// An empty query. Fails if `T` is not registered.
    pub fn new(registry: Arc<Registry>) -> Result<Self, Error> {
        let model = registry.model(T::NAME)?;
        Ok(Self {
            registry,
            descriptor: QueryDescriptor::new(model.name.clone()),
            model,
            _entity: PhantomData,
        })
    }

    fn derive(&self, descriptor: QueryDescriptor) -> Self {
        Self {
            registry: self.registry.clone(),
            model: self.model.clone(),
            descriptor,
            _entity: PhantomData,
        }
    }

    /// The untyped descriptor.
    pub fn descriptor(&self) -> &QueryDescriptor {
        &self.descriptor
    }

    /// Descriptor of the queried model.
    pub fn model(&self) -> &Arc<ModelDef> {
        &self.model
    }

    /// Registry the query resolves associations against.
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Eager loads of this query.
    pub fn includes(&self) -> &[IncludeSpec] {
        self.descriptor.includes()
    }

    /// Add a predicate built from the model's fields.
    ///
    /// Keys that reach through associations (`$posts.title$`) are rewritten
    /// to the aliases the associations are included under.
    pub fn filter<F>(&self, select: F) -> Self
    where
        F: FnOnce(T::Fields) -> Where,
    {
        self.filter_by(select(T::fields()))
    }

    /// Add an already built predicate.
    pub fn filter_by(&self, predicate: Where) -> Self {
        let map = aliased_where(predicate.into_map(), &self.model, &self.registry);
        self.derive(self.descriptor.clone().with_where(Where::from_map(map)))
    }

    /// Add projected expressions.
    pub fn attributes<F>(&self, select: F) -> Self
    where
        F: FnOnce(T::Fields) -> Vec<Node>,
    {
        self.derive(self.descriptor.clone().with_attrs(select(T::fields())))
    }

    /// Eager-load an association, optionally with a nested query on its
    /// target.
    ///
    /// Including the same association twice merges the two includes. Fails
    /// when the model has no such association, its target is not
    /// registered, or the nested query is for a different model.
    pub fn include<U, F>(&self, select: F, nested: Option<Query<U>>) -> Result<Self, Error>
    where
        U: Entity,
        F: FnOnce(T::Fields) -> Association<U>,
    {
        let handle = select(T::fields());
        let association = self.registry.association(&self.model, handle.key())?;
        let target = self.registry.resolve_target(&self.model, association)?;
        let alias = association.canonical_alias().to_string();

        if let Some(nested) = &nested {
            if nested.model.name != target.name {
                return Err(QueryError::NestedModelMismatch {
                    alias,
                    expected: target.name.clone(),
                    actual: nested.model.name.clone(),
                }
                .into());
            }
        }

        trace!(model = %self.model.name, alias = %alias, "include");
        let spec = IncludeSpec::new(target.name.clone(), alias)
            .with_nested(nested.map(|q| q.descriptor));
        Ok(self.derive(
            self.descriptor
                .clone()
                .with_include(spec, handle.overrides()),
        ))
    }

    /// Eager-load every association of the model, link-only.
    pub fn include_all(&self) -> Result<Self, Error> {
        let mut descriptor = self.descriptor.clone();
        for association in &self.model.associations {
            let target = self.registry.resolve_target(&self.model, association)?;
            let spec = IncludeSpec::new(target.name.clone(), association.canonical_alias());
            descriptor = descriptor.with_include(
                spec,
                IncludeOverride {
                    required: None,
                    associate_only: Some(true),
                },
            );
        }
        Ok(self.derive(descriptor))
    }

    /// Add ordering terms.
    pub fn order<F>(&self, select: F) -> Self
    where
        F: FnOnce(T::Fields) -> Vec<OrderTerm>,
    {
        self.derive(self.descriptor.clone().with_orderings(select(T::fields())))
    }

    /// Add grouping expressions.
    pub fn group_by<F>(&self, select: F) -> Self
    where
        F: FnOnce(T::Fields) -> Vec<Node>,
    {
        self.derive(self.descriptor.clone().with_group_bys(select(T::fields())))
    }

    /// Skip `n` more rows. Repeated calls add up.
    pub fn skip(&self, n: u64) -> Self {
        self.derive(self.descriptor.clone().with_skip(n))
    }

    /// Take `n` more rows. Repeated calls add up.
    pub fn take(&self, n: u64) -> Self {
        self.derive(self.descriptor.clone().with_take(n))
    }

    /// Combine with another query on the same entity.
    pub fn merge(&self, other: &Query<T>) -> Self {
        self.derive(self.descriptor.merge(&other.descriptor))
    }

    /// See [`QueryDescriptor::compile_wheres`].
    pub fn compile_wheres(&self) -> WhereMap {
        self.descriptor.compile_wheres()
    }

    /// See [`QueryDescriptor::compile_attributes`].
    pub fn compile_attributes(&self) -> Option<Vec<AttributeOption>> {
        self.descriptor.compile_attributes()
    }

    /// See [`QueryDescriptor::compile_includes`].
    pub fn compile_includes(&self) -> Option<Vec<IncludeOptions>> {
        self.descriptor.compile_includes()
    }

    /// See [`QueryDescriptor::compile_orderings`].
    pub fn compile_orderings(&self) -> Result<Option<Vec<OrderOption>>, Error> {
        self.descriptor.compile_orderings(&self.registry)
    }

    /// See [`QueryDescriptor::compile_group_bys`].
    pub fn compile_group_bys(&self) -> Option<Vec<Value>> {
        self.descriptor.compile_group_bys()
    }

    /// See [`QueryDescriptor::compile_find_options`].
    pub fn compile_find_options(&self) -> Result<FindOptions, Error> {
        self.descriptor.compile_find_options(&self.registry)
    }
}

fn aliased_where(map: WhereMap, model: &ModelDef, registry: &Registry) -> WhereMap {
    map.into_iter()
        .map(|(key, value)| {
            if key != AND_KEY && key != OR_KEY {
                return (aliased_key(&key, model, registry), value);
            }
            let value = match value {
                Value::Array(items) => Value::Array(
                    items
                        .into_iter()
                        .map(|item| aliased_clause(item, model, registry))
                        .collect(),
                ),
                single => aliased_clause(single, model, registry),
            };
            (key, value)
        })
        .collect()
}

fn aliased_clause(clause: Value, model: &ModelDef, registry: &Registry) -> Value {
    match clause {
        Value::Object(map) => Value::Object(aliased_where(map, model, registry)),
        other => other,
    }
}

// `$a.b.attr$` with each hop renamed to its canonical alias; unknown hops are
// left for the backend to reject.
fn aliased_key(key: &str, model: &ModelDef, registry: &Registry) -> String {
    let Some(inner) = key
        .strip_prefix('$')
        .and_then(|k| k.strip_suffix('$'))
        .filter(|k| k.contains('.'))
    else {
        return key.to_string();
    };
    let mut segments: Vec<String> = inner.split('.').map(str::to_string).collect();
    let hops = segments.len() - 1;

    let mut current: Option<Arc<ModelDef>> = None;
    for hop in segments.iter_mut().take(hops) {
        let source = current.as_deref().unwrap_or(model);
        let Some(association) = source.association(hop.as_str()) else {
            break;
        };
        let target = registry.resolve_target(source, association).ok();
        *hop = association.canonical_alias().to_string();
        match target {
            Some(target) => current = Some(target),
            None => break,
        }
    }
    format!("${}$", segments.join("."))
}
