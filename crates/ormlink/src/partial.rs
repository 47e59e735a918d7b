//! Input values for writes.
//!
//! A [`Partial`] separates plain column values from association values. An
//! association key that is absent is *undefined* and leaves the association
//! alone; [`AssociationValue::Null`] clears it.

use std::collections::BTreeMap;

use ormlink_core::ModelDef;
use ormlink_proto::{Record, Value};

/// One related item supplied for an association.
#[derive(Debug, Clone)]
pub enum Related<I> {
    /// Plain data; built into a new or existing row depending on its key.
    Plain(Record),
    /// A row the engine already produced.
    Instance(I),
    /// A bare primary key of an existing row.
    Key(Value),
}

impl<I> Related<I> {
    /// Wrap a plain value: objects become data, anything else a key.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(record) => Related::Plain(record),
            other => Related::Key(other),
        }
    }
}

/// The value supplied for one association key.
#[derive(Debug, Clone)]
pub enum AssociationValue<I> {
    /// Clear the association.
    Null,
    /// A single related item.
    One(Related<I>),
    /// A list of related items.
    Many(Vec<Related<I>>),
}

impl<I> AssociationValue<I> {
    /// The supplied items, in order.
    pub fn items(&self) -> &[Related<I>] {
        match self {
            AssociationValue::Null => &[],
            AssociationValue::One(item) => std::slice::from_ref(item),
            AssociationValue::Many(items) => items,
        }
    }
}

/// Column values plus association values for one row.
#[derive(Debug, Clone)]
pub struct Partial<I> {
    /// Plain column values.
    pub fields: Record,
    /// Association values keyed by association alias.
    pub associations: BTreeMap<String, AssociationValue<I>>,
}

impl<I> Partial<I> {
    /// An empty partial.
    pub fn new() -> Self {
        Self {
            fields: Record::new(),
            associations: BTreeMap::new(),
        }
    }

    /// Split a JSON record using `model`'s associations.
    ///
    /// Keys naming an association (by key or alias) become association
    /// values filed under the canonical alias; JSON null clears, arrays give
    /// many items. Everything else stays a plain field.
    pub fn from_record(model: &ModelDef, record: Record) -> Self {
        let mut partial = Self::new();
        for (key, value) in record {
            let Some(association) = model.association(&key) else {
                partial.fields.insert(key, value);
                continue;
            };
            let value = match value {
                Value::Null => AssociationValue::Null,
                Value::Array(items) => {
                    AssociationValue::Many(items.into_iter().map(Related::from_value).collect())
                }
                other => AssociationValue::One(Related::from_value(other)),
            };
            partial
                .associations
                .insert(association.canonical_alias().to_string(), value);
        }
        partial
    }

    /// Set a plain field.
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// Associate one item.
    pub fn with_one(mut self, alias: impl Into<String>, item: Related<I>) -> Self {
        self.associations
            .insert(alias.into(), AssociationValue::One(item));
        self
    }

    /// Associate a list of items.
    pub fn with_many(mut self, alias: impl Into<String>, items: Vec<Related<I>>) -> Self {
        self.associations
            .insert(alias.into(), AssociationValue::Many(items));
        self
    }

    /// Clear an association.
    pub fn with_null(mut self, alias: impl Into<String>) -> Self {
        self.associations
            .insert(alias.into(), AssociationValue::Null);
        self
    }

    /// The value supplied for `alias`, if any.
    pub fn association(&self, alias: &str) -> Option<&AssociationValue<I>> {
        self.associations.get(alias)
    }

    /// Whether any association value was supplied.
    pub fn has_associations(&self) -> bool {
        !self.associations.is_empty()
    }
}

impl<I> Default for Partial<I> {
    fn default() -> Self {
        Self::new()
    }
}

impl<I> From<Record> for Partial<I> {
    fn from(fields: Record) -> Self {
        Self {
            fields,
            associations: BTreeMap::new(),
        }
    }
}
