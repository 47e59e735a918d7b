//! Typed association handles.

use std::fmt;
use std::marker::PhantomData;

use super::descriptor::IncludeOverride;
use super::queryable::Queryable;
use crate::catalog::Entity;

/// A typed handle on an association whose target entity is `U`.
///
/// Used to pick an include (`query.include(|f| f.mentor.clone(), None)`) and
/// to reach attributes of the associated model in predicates and orderings
/// (`f.mentor.field(|m| m.name)`). Include-time flag overrides ride along on
/// the handle.
pub struct Association<U> {
    key: String,
    path: Vec<String>,
    overrides: IncludeOverride,
    _target: PhantomData<fn() -> U>,
}

impl<U> Clone for Association<U> {
    fn clone(&self) -> Self {
        Self {
            key: self.key.clone(),
            path: self.path.clone(),
            overrides: self.overrides,
            _target: PhantomData,
        }
    }
}

impl<U> fmt::Debug for Association<U> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Association")
            .field("key", &self.key)
            .field("path", &self.path)
            .field("overrides", &self.overrides)
            .finish()
    }
}

impl<U: Entity> Association<U> {
    /// Handle on the association declared under `key`.
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            path: Vec::new(),
            overrides: IncludeOverride::default(),
            _target: PhantomData,
        }
    }

    /// Association key on the source model.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Include-time overrides carried by this handle.
    pub fn overrides(&self) -> IncludeOverride {
        self.overrides
    }

    /// Include as an inner join.
    pub fn required(mut self) -> Self {
        self.overrides.required = Some(true);
        self
    }

    /// Include as an outer join.
    pub fn optional(mut self) -> Self {
        self.overrides.required = Some(false);
        self
    }

    /// Only link existing targets on write; never save their attributes.
    pub fn associate_only(mut self) -> Self {
        self.overrides.associate_only = Some(true);
        self
    }

    /// Save target attributes on write.
    pub fn cascade(mut self) -> Self {
        self.overrides.associate_only = Some(false);
        self
    }

    /// An attribute of the associated model, for predicates and orderings.
    ///
    /// The path is built from association keys; queries resolve each hop to
    /// the alias the association is included under.
    pub fn field<V, F>(&self, select: F) -> Queryable<V>
    where
        F: FnOnce(U::Fields) -> Queryable<V>,
    {
        let mut queryable = select(U::fields()).under(&self.key);
        for hop in self.path.iter().rev() {
            queryable = queryable.under(hop);
        }
        queryable
    }

    /// An association of the associated model, one hop further.
    pub fn then<W, F>(&self, select: F) -> Association<W>
    where
        W: Entity,
        F: FnOnce(U::Fields) -> Association<W>,
    {
        let next = select(U::fields());
        let mut path = self.path.clone();
        path.push(self.key.clone());
        path.extend(next.path);
        Association {
            key: next.key,
            path,
            overrides: next.overrides,
            _target: PhantomData,
        }
    }

    /// Reference to the association itself, usable on the left of a predicate.
    pub fn reference(&self) -> Queryable<serde_json::Value> {
        Queryable::association(self.key.clone())
    }
}
