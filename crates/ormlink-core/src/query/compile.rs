//! Compilation of a descriptor into adapter options.

use serde_json::Value;

use ormlink_proto::{AttributeOption, FindOptions, IncludeOptions, OrderHop, OrderOption, WhereMap};

use super::descriptor::{IncludeSpec, OrderTerm, QueryDescriptor};
use super::filter::Where;
use super::node::Node;
use crate::catalog::Registry;
use crate::error::Error;

impl QueryDescriptor {
    /// Conjunction of all predicates (empty map when there are none).
    pub fn compile_wheres(&self) -> WhereMap {
        Where::all(self.wheres().iter().cloned()).into_map()
    }

    /// Projection, or `None` to select every attribute.
    pub fn compile_attributes(&self) -> Option<Vec<AttributeOption>> {
        if self.attrs().is_empty() {
            return None;
        }
        Some(self.attrs().iter().map(compile_projection).collect())
    }

    /// Grouping, or `None`.
    pub fn compile_group_bys(&self) -> Option<Vec<Value>> {
        if self.group_bys().is_empty() {
            return None;
        }
        let group = self
            .group_bys()
            .iter()
            .map(|node| match node {
                Node::Attribute(attr) => Value::String(attr.dotted()),
                other => other.compile_right(),
            })
            .collect();
        Some(group)
    }

    /// Ordering, or `None`.
    ///
    /// Attributes reached through associations compile to a join path of
    /// `{model, as}` hops followed by the attribute name.
    pub fn compile_orderings(&self, registry: &Registry) -> Result<Option<Vec<OrderOption>>, Error> {
        if self.orderings().is_empty() {
            return Ok(None);
        }
        let order = self
            .orderings()
            .iter()
            .map(|term| self.compile_ordering(term, registry))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Some(order))
    }

    fn compile_ordering(&self, term: &OrderTerm, registry: &Registry) -> Result<OrderOption, Error> {
        match &term.node {
            Node::Attribute(attr) if !attr.path.is_empty() => {
                let mut model = registry.model(self.model())?;
                let mut hops = Vec::with_capacity(attr.path.len());
                for key in &attr.path {
                    let association = registry.association(&model, key)?;
                    let target = registry.resolve_target(&model, association)?;
                    hops.push(OrderHop::new(
                        target.name.clone(),
                        association.canonical_alias(),
                    ));
                    model = target;
                }
                Ok(OrderOption::through(
                    hops,
                    Value::String(attr.name.clone()),
                    term.direction,
                ))
            }
            Node::Attribute(attr) => Ok(OrderOption::new(
                Value::String(attr.name.clone()),
                term.direction,
            )),
            Node::Alias { name, .. } => Ok(OrderOption::new(Value::String(name.clone()), term.direction)),
            other => Ok(OrderOption::new(other.compile_right(), term.direction)),
        }
    }

    /// Eager loads, or `None`.
    pub fn compile_includes(&self) -> Option<Vec<IncludeOptions>> {
        if self.includes().is_empty() {
            return None;
        }
        Some(compile_include_specs(self.includes()))
    }

    /// Full option object for `find_all` and friends.
    pub fn compile_find_options(&self, registry: &Registry) -> Result<FindOptions, Error> {
        Ok(FindOptions {
            filter: self.compile_wheres(),
            attributes: self.compile_attributes(),
            include: self.compile_includes(),
            order: self.compile_orderings(registry)?,
            group: self.compile_group_bys(),
            offset: (self.skipped() > 0).then_some(self.skipped()),
            limit: (self.taken() > 0).then_some(self.taken()),
            transaction: None,
        })
    }
}

/// Compile an include tree. Nested queries contribute only their filter,
/// projection, and includes.
pub fn compile_include_specs(specs: &[IncludeSpec]) -> Vec<IncludeOptions> {
    specs.iter().map(compile_include).collect()
}

fn compile_include(spec: &IncludeSpec) -> IncludeOptions {
    let mut options = IncludeOptions::new(spec.target_model.clone(), spec.alias.clone());
    options.required = spec.required;
    if let Some(nested) = &spec.nested {
        let filter = nested.compile_wheres();
        options.filter = (!filter.is_empty()).then_some(filter);
        options.attributes = nested.compile_attributes();
        options.include = nested.compile_includes();
    }
    options
}

fn compile_projection(node: &Node) -> AttributeOption {
    match node {
        Node::Attribute(attr) if attr.path.is_empty() => AttributeOption::Name(attr.name.clone()),
        Node::Alias { name, inner } => AttributeOption::Aliased(inner.compile_right(), name.clone()),
        other => AttributeOption::Expr(other.compile_right()),
    }
}
