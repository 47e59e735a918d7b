//! Option objects handed to a storage adapter.
//!
//! These are the compiled form of a query descriptor. Field names and JSON
//! layout follow the adapter contract: `where`, `attributes`, `include`,
//! `order`, `group`, `offset`, `limit`. Transaction handles travel alongside
//! but are never serialized.

use serde::ser::SerializeSeq;
use serde::{Deserialize, Serialize, Serializer};

use crate::error::Error;
use crate::transaction::Transaction;
use crate::value::{Value, WhereMap};

/// Aggregate function types for `aggregate` calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregateFunction {
    /// Count of non-null values.
    Count,
    /// Sum of numeric values.
    Sum,
    /// Average of numeric values.
    Avg,
    /// Minimum value.
    Min,
    /// Maximum value.
    Max,
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    /// Ascending order.
    Asc,
    /// Descending order.
    Desc,
}

/// One projected attribute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeOption {
    /// A plain attribute name.
    Name(String),
    /// An expression paired with its output alias: `[expr, alias]`.
    Aliased(Value, String),
    /// A bare expression (column or function call object).
    Expr(Value),
}

impl AttributeOption {
    /// Project a plain attribute by name.
    pub fn name(name: impl Into<String>) -> Self {
        AttributeOption::Name(name.into())
    }

    /// Project an expression under an alias.
    pub fn aliased(expr: Value, alias: impl Into<String>) -> Self {
        AttributeOption::Aliased(expr, alias.into())
    }
}

/// One hop of an ordering join path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderHop {
    /// Target model of the association traversed.
    pub model: String,
    /// Alias the association is included under.
    #[serde(rename = "as")]
    pub alias: String,
}

impl OrderHop {
    /// Create a hop through an association.
    pub fn new(model: impl Into<String>, alias: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            alias: alias.into(),
        }
    }
}

/// One ordering term.
///
/// Serializes as an array: the join-path hops (if any), then the target, then
/// the direction, e.g. `[{"model": "User", "as": "mentor"}, "name", "DESC"]`.
/// Plain attribute names are ambiguous across joined tables, so an ordering
/// through an association always carries its hops.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderOption {
    /// Associations traversed from the root model, outermost first.
    pub path: Vec<OrderHop>,
    /// Leaf attribute name or compiled expression.
    pub target: Value,
    /// Sort direction.
    pub direction: Direction,
}

impl OrderOption {
    /// Order by a target on the root model.
    pub fn new(target: Value, direction: Direction) -> Self {
        Self {
            path: Vec::new(),
            target,
            direction,
        }
    }

    /// Order by a target reached through association hops.
    pub fn through(path: Vec<OrderHop>, target: Value, direction: Direction) -> Self {
        Self {
            path,
            target,
            direction,
        }
    }

    /// The target as an attribute name, when it is one.
    pub fn target_name(&self) -> Option<&str> {
        self.target.as_str()
    }
}

impl Serialize for OrderOption {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.path.len() + 2))?;
        for hop in &self.path {
            seq.serialize_element(hop)?;
        }
        seq.serialize_element(&self.target)?;
        seq.serialize_element(&self.direction)?;
        seq.end()
    }
}

/// Eager-load directive for one association.
///
/// Nested options carry only `where`, `attributes` and `include`; ordering
/// and grouping never propagate into includes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IncludeOptions {
    /// Target model name.
    pub model: String,
    /// Association alias on the parent model.
    #[serde(rename = "as")]
    pub alias: String,
    /// Inner join (parent rows without a match are dropped).
    pub required: bool,
    /// Filter on the included rows.
    #[serde(rename = "where", skip_serializing_if = "Option::is_none")]
    pub filter: Option<WhereMap>,
    /// Projection of the included rows.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attributes: Option<Vec<AttributeOption>>,
    /// Nested includes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub include: Option<Vec<IncludeOptions>>,
}

impl IncludeOptions {
    /// Create an include for `model` under `alias`.
    pub fn new(model: impl Into<String>, alias: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            alias: alias.into(),
            required: false,
            filter: None,
            attributes: None,
            include: None,
        }
    }

    /// Nested includes, or an empty slice.
    pub fn children(&self) -> &[IncludeOptions] {
        self.include.as_deref().unwrap_or_default()
    }
}

/// Options for `find_all`, `find_one`, `count`, and `aggregate`.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct FindOptions {
    /// Compiled filter (possibly empty).
    #[serde(rename = "where")]
    pub filter: WhereMap,
    /// Projection.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attributes: Option<Vec<AttributeOption>>,
    /// Eager loads.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub include: Option<Vec<IncludeOptions>>,
    /// Ordering terms.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order: Option<Vec<OrderOption>>,
    /// Grouping expressions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group: Option<Vec<Value>>,
    /// Rows to skip. Present only when non-zero.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<u64>,
    /// Maximum rows. Present only when non-zero.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u64>,
    /// Caller transaction.
    #[serde(skip)]
    pub transaction: Option<Transaction>,
}

impl FindOptions {
    /// Create options with the given filter.
    pub fn new(filter: WhereMap) -> Self {
        Self {
            filter,
            ..Default::default()
        }
    }

    /// Set the projection.
    pub fn with_attributes(mut self, attributes: Vec<AttributeOption>) -> Self {
        self.attributes = Some(attributes);
        self
    }

    /// Set the eager loads.
    pub fn with_include(mut self, include: Vec<IncludeOptions>) -> Self {
        self.include = Some(include);
        self
    }

    /// Set the ordering.
    pub fn with_order(mut self, order: Vec<OrderOption>) -> Self {
        self.order = Some(order);
        self
    }

    /// Set the offset.
    pub fn with_offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Set the limit.
    pub fn with_limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Scope to a transaction.
    pub fn with_transaction(mut self, transaction: Option<Transaction>) -> Self {
        self.transaction = transaction;
        self
    }

    /// Eager loads, or an empty slice.
    pub fn includes(&self) -> &[IncludeOptions] {
        self.include.as_deref().unwrap_or_default()
    }

    /// Render the options as JSON.
    pub fn to_value(&self) -> Result<Value, Error> {
        Ok(serde_json::to_value(self)?)
    }
}

/// Options for instance `reload`.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct ReloadOptions {
    /// Eager loads to refresh alongside the row.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub include: Option<Vec<IncludeOptions>>,
    /// Caller transaction.
    #[serde(skip)]
    pub transaction: Option<Transaction>,
}

impl ReloadOptions {
    /// Reload with the given include tree.
    pub fn new(include: Vec<IncludeOptions>, transaction: Option<Transaction>) -> Self {
        Self {
            include: if include.is_empty() { None } else { Some(include) },
            transaction,
        }
    }

    /// Eager loads, or an empty slice.
    pub fn includes(&self) -> &[IncludeOptions] {
        self.include.as_deref().unwrap_or_default()
    }
}

/// Options for `create`, `bulk_create`, `upsert`, and instance `save`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WriteOptions {
    /// Run attribute validation before writing.
    pub validate: bool,
    /// Caller transaction.
    #[serde(skip)]
    pub transaction: Option<Transaction>,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            validate: true,
            transaction: None,
        }
    }
}

/// Options for bulk `update`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UpdateOptions {
    /// Rows to update.
    #[serde(rename = "where")]
    pub filter: WhereMap,
    /// Maximum rows to update.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u64>,
    /// Run attribute validation before writing.
    pub validate: bool,
    /// Caller transaction.
    #[serde(skip)]
    pub transaction: Option<Transaction>,
}

/// Options for `destroy` and `restore`.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct DestroyOptions {
    /// Rows to destroy or restore.
    #[serde(rename = "where")]
    pub filter: WhereMap,
    /// Maximum rows affected.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u64>,
    /// Hard-delete rows of a paranoid model.
    pub force: bool,
    /// Caller transaction.
    #[serde(skip)]
    pub transaction: Option<Transaction>,
}

/// Options for table-level `truncate` and `drop`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct TableOptions {
    /// Also clear tables that reference this one.
    pub cascade: bool,
    /// Caller transaction.
    #[serde(skip)]
    pub transaction: Option<Transaction>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_order_option_with_join_path() {
        let order = OrderOption::through(
            vec![OrderHop::new("User", "mentor")],
            json!("name"),
            Direction::Desc,
        );
        assert_eq!(
            serde_json::to_value(&order).unwrap(),
            json!([{ "model": "User", "as": "mentor" }, "name", "DESC"])
        );
        assert_eq!(order.target_name(), Some("name"));
    }

    #[test]
    fn test_aliased_attribute_is_a_pair() {
        let attr = AttributeOption::aliased(json!({ "$fn": "count", "args": [] }), "total");
        assert_eq!(
            serde_json::to_value(&attr).unwrap(),
            json!([{ "$fn": "count", "args": [] }, "total"])
        );
    }

    #[test]
    fn test_include_options_omit_empty_parts() {
        let mut include = IncludeOptions::new("Post", "posts");
        assert_eq!(
            serde_json::to_value(&include).unwrap(),
            json!({ "model": "Post", "as": "posts", "required": false })
        );

        include.include = Some(vec![IncludeOptions::new("Comment", "comments")]);
        assert_eq!(include.children().len(), 1);
    }

    #[test]
    fn test_reload_options_drop_empty_include() {
        let options = ReloadOptions::new(vec![], None);
        assert!(options.include.is_none());
        assert!(options.includes().is_empty());
    }
}
