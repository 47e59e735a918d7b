//! Untyped query descriptor and merge.

use ormlink_proto::Direction;

use super::filter::Where;
use super::node::Node;

/// One ordering term.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderTerm {
    /// Expression to order on.
    pub node: Node,
    /// Sort direction.
    pub direction: Direction,
}

impl OrderTerm {
    /// Create an ordering term.
    pub fn new(node: Node, direction: Direction) -> Self {
        Self { node, direction }
    }
}

/// Flags set on an association handle at include time.
///
/// `None` keeps whatever the include already had (or the default).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IncludeOverride {
    /// Inner join.
    pub required: Option<bool>,
    /// Link only, never save target attributes.
    pub associate_only: Option<bool>,
}

/// Eager-load directive inside a descriptor.
#[derive(Debug, Clone, PartialEq)]
pub struct IncludeSpec {
    /// Target model name.
    pub target_model: String,
    /// Canonical association alias on the parent.
    pub alias: String,
    /// Nested query on the target.
    pub nested: Option<QueryDescriptor>,
    /// Inner join.
    pub required: bool,
    /// Link only, never save target attributes.
    pub associate_only: bool,
}

impl IncludeSpec {
    /// Create an include with default flags.
    pub fn new(target_model: impl Into<String>, alias: impl Into<String>) -> Self {
        Self {
            target_model: target_model.into(),
            alias: alias.into(),
            nested: None,
            required: false,
            associate_only: false,
        }
    }

    /// Set the nested query.
    pub fn with_nested(mut self, nested: Option<QueryDescriptor>) -> Self {
        self.nested = nested;
        self
    }

    /// Apply flag overrides.
    pub fn with_overrides(mut self, overrides: IncludeOverride) -> Self {
        if let Some(required) = overrides.required {
            self.required = required;
        }
        if let Some(associate_only) = overrides.associate_only {
            self.associate_only = associate_only;
        }
        self
    }

    /// Includes of the nested query, or an empty slice.
    pub fn children(&self) -> &[IncludeSpec] {
        self.nested.as_ref().map(|q| q.includes()).unwrap_or_default()
    }

    /// Combine with a later include of the same alias: nested queries are
    /// merged, flags come from `later`.
    fn merged_with(&self, later: &IncludeSpec) -> IncludeSpec {
        let nested = match (&self.nested, &later.nested) {
            (Some(earlier), Some(newer)) => Some(earlier.merge(newer)),
            (earlier, newer) => newer.clone().or_else(|| earlier.clone()),
        };
        IncludeSpec {
            target_model: later.target_model.clone(),
            alias: later.alias.clone(),
            nested,
            required: later.required,
            associate_only: later.associate_only,
        }
    }
}

/// An immutable query on one model.
///
/// Lists keep insertion order. Includes are unique by alias. `skipped` and
/// `taken` are zero when unset.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryDescriptor {
    model: String,
    wheres: Vec<Where>,
    attrs: Vec<Node>,
    includes: Vec<IncludeSpec>,
    orderings: Vec<OrderTerm>,
    group_bys: Vec<Node>,
    skipped: u64,
    taken: u64,
}

impl QueryDescriptor {
    /// An empty query on `model`.
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            wheres: Vec::new(),
            attrs: Vec::new(),
            includes: Vec::new(),
            orderings: Vec::new(),
            group_bys: Vec::new(),
            skipped: 0,
            taken: 0,
        }
    }

    /// Model this query runs against.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Accumulated predicates.
    pub fn wheres(&self) -> &[Where] {
        &self.wheres
    }

    /// Projection.
    pub fn attrs(&self) -> &[Node] {
        &self.attrs
    }

    /// Eager loads.
    pub fn includes(&self) -> &[IncludeSpec] {
        &self.includes
    }

    /// Ordering terms.
    pub fn orderings(&self) -> &[OrderTerm] {
        &self.orderings
    }

    /// Grouping expressions.
    pub fn group_bys(&self) -> &[Node] {
        &self.group_bys
    }

    /// Rows to skip.
    pub fn skipped(&self) -> u64 {
        self.skipped
    }

    /// Maximum rows, zero for no limit.
    pub fn taken(&self) -> u64 {
        self.taken
    }

    /// Add a predicate.
    pub fn with_where(mut self, predicate: Where) -> Self {
        self.wheres.push(predicate);
        self
    }

    /// Add projected expressions.
    pub fn with_attrs(mut self, attrs: impl IntoIterator<Item = Node>) -> Self {
        self.attrs.extend(attrs);
        self
    }

    /// Add or replace an include.
    ///
    /// An existing include under the same alias is removed and merged with
    /// the new one (nested queries merged, flags from `overrides` or else the
    /// existing include); the result moves to the end of the list.
    pub fn with_include(mut self, spec: IncludeSpec, overrides: IncludeOverride) -> Self {
        let spec = match self.includes.iter().position(|i| i.alias == spec.alias) {
            Some(index) => {
                let existing = self.includes.remove(index);
                let nested = match (existing.nested, spec.nested) {
                    (Some(earlier), Some(newer)) => Some(earlier.merge(&newer)),
                    (earlier, newer) => newer.or(earlier),
                };
                IncludeSpec {
                    nested,
                    ..existing
                }
                .with_overrides(overrides)
            }
            None => spec.with_overrides(overrides),
        };
        self.includes.push(spec);
        self
    }

    /// Add ordering terms.
    pub fn with_orderings(mut self, orderings: impl IntoIterator<Item = OrderTerm>) -> Self {
        self.orderings.extend(orderings);
        self
    }

    /// Add grouping expressions.
    pub fn with_group_bys(mut self, group_bys: impl IntoIterator<Item = Node>) -> Self {
        self.group_bys.extend(group_bys);
        self
    }

    /// Skip `n` more rows.
    pub fn with_skip(mut self, n: u64) -> Self {
        self.skipped = self.skipped.saturating_add(n);
        self
    }

    /// Take `n` more rows.
    pub fn with_take(mut self, n: u64) -> Self {
        self.taken = self.taken.saturating_add(n);
        self
    }

    /// Combine two queries on the same model.
    ///
    /// Lists are concatenated without repeating entries already present.
    /// Includes are grouped by alias and merged recursively. `skipped` and
    /// `taken` come from `other` when set there.
    pub fn merge(&self, other: &QueryDescriptor) -> QueryDescriptor {
        let mut includes = self.includes.clone();
        for spec in &other.includes {
            match includes.iter_mut().find(|i| i.alias == spec.alias) {
                Some(existing) => *existing = existing.merged_with(spec),
                None => includes.push(spec.clone()),
            }
        }
        QueryDescriptor {
            model: self.model.clone(),
            wheres: union(&self.wheres, &other.wheres),
            attrs: union(&self.attrs, &other.attrs),
            includes,
            orderings: union(&self.orderings, &other.orderings),
            group_bys: union(&self.group_bys, &other.group_bys),
            skipped: if other.skipped != 0 { other.skipped } else { self.skipped },
            taken: if other.taken != 0 { other.taken } else { self.taken },
        }
    }
}

fn union<T: Clone + PartialEq>(left: &[T], right: &[T]) -> Vec<T> {
    let mut out = left.to_vec();
    for item in right {
        if !out.contains(item) {
            out.push(item.clone());
        }
    }
    out
}
