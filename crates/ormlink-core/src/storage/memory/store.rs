//! Tables, constraint checks, and row shaping for the in-memory adapter.

use std::cmp::Ordering;
use std::collections::HashMap;

use serde_json::Value;

use ormlink_proto::value::is_nullish;
use ormlink_proto::{AggregateFunction, AttributeOption, Direction, OrderOption, Record, WhereMap};

use super::filter::{compare_values, values_equal, WhereEvaluator};
use crate::catalog::{DataType, ModelDef};
use crate::storage::{BackendValidationError, StorageError, Violation, ViolationKind};

/// One stored row.
#[derive(Debug, Clone)]
pub(crate) struct Row {
    pub data: Record,
    /// Soft-deleted (paranoid models only).
    pub deleted: bool,
}

impl Row {
    pub fn new(data: Record) -> Self {
        Self {
            data,
            deleted: false,
        }
    }

    fn has(&self, key: &str, value: &Value) -> bool {
        self.data.get(key).is_some_and(|v| values_equal(v, value))
    }
}

/// Rows of one model, in insertion order.
#[derive(Debug, Clone, Default)]
pub(crate) struct Table {
    pub rows: Vec<Row>,
    next_id: i64,
}

impl Table {
    /// Rows not soft-deleted.
    pub fn live(&self) -> impl Iterator<Item = &Row> {
        self.rows.iter().filter(|row| !row.deleted)
    }

    /// Live rows whose `key` equals `value`.
    pub fn live_where<'a>(&'a self, key: &'a str, value: &'a Value) -> impl Iterator<Item = &'a Row> {
        self.live().filter(move |row| row.has(key, value))
    }

    /// Index of the row with primary key `pk`.
    pub fn position(&self, model: &ModelDef, pk: &Value) -> Result<Option<usize>, StorageError> {
        let pk_name = primary_key(model)?;
        Ok(self.rows.iter().position(|row| row.has(pk_name, pk)))
    }

    /// Indices of rows matching `filter`, among live or deleted rows.
    pub fn matching(
        &self,
        filter: &WhereMap,
        deleted: bool,
        limit: Option<u64>,
    ) -> Result<Vec<usize>, StorageError> {
        let mut indices = Vec::new();
        for (index, row) in self.rows.iter().enumerate() {
            if row.deleted != deleted {
                continue;
            }
            if limit.is_some_and(|limit| indices.len() as u64 >= limit) {
                break;
            }
            if WhereEvaluator::matches(filter, &row.data)? {
                indices.push(index);
            }
        }
        Ok(indices)
    }

    /// Insert a row, assigning defaults and the auto-increment key.
    pub fn insert(
        &mut self,
        model: &ModelDef,
        data: &Record,
        validate: bool,
    ) -> Result<Record, StorageError> {
        let mut record = Record::new();
        for attr in &model.attributes {
            match data.get(&attr.name) {
                Some(value) if !(value.is_null() && attr.auto_increment) => {
                    record.insert(attr.name.clone(), value.clone());
                }
                _ => {
                    if let Some(default) = &attr.default {
                        record.insert(attr.name.clone(), default.clone());
                    } else if !attr.auto_increment {
                        record.insert(attr.name.clone(), Value::Null);
                    }
                }
            }
        }

        let mut next_id = self.next_id;
        for attr in model.attributes.iter().filter(|a| a.auto_increment) {
            match record.get(&attr.name).and_then(Value::as_i64) {
                Some(explicit) => next_id = next_id.max(explicit),
                None => {
                    next_id += 1;
                    record.insert(attr.name.clone(), Value::from(next_id));
                }
            }
        }

        check(model, &record, &self.rows, None, validate)?;
        self.next_id = next_id;
        self.rows.push(Row::new(record.clone()));
        Ok(record)
    }

    /// Overwrite the declared attributes of row `index` with `data`.
    pub fn update_at(
        &mut self,
        model: &ModelDef,
        index: usize,
        data: &Record,
        validate: bool,
    ) -> Result<Record, StorageError> {
        let mut merged = self.rows[index].data.clone();
        merged.extend(normalize(model, data));
        check(model, &merged, &self.rows, Some(index), validate)?;
        self.rows[index].data = merged.clone();
        Ok(merged)
    }

    /// Apply `values` to every row in `indices`, all or nothing.
    pub fn update_many(
        &mut self,
        model: &ModelDef,
        indices: &[usize],
        values: &Record,
        validate: bool,
    ) -> Result<(), StorageError> {
        let values = normalize(model, values);
        let mut preview = self.rows.clone();
        for &index in indices {
            preview[index].data.extend(values.clone());
        }
        for &index in indices {
            check(model, &preview[index].data, &preview, Some(index), validate)?;
        }
        self.rows = preview;
        Ok(())
    }
}

/// All tables, keyed by model name. Tables are created on first write.
#[derive(Debug, Clone, Default)]
pub(crate) struct Store {
    tables: HashMap<String, Table>,
}

impl Store {
    pub fn table(&self, name: &str) -> Option<&Table> {
        self.tables.get(name)
    }

    pub fn table_mut(&mut self, name: &str) -> &mut Table {
        self.tables.entry(name.to_string()).or_default()
    }

    pub fn drop_table(&mut self, name: &str) {
        self.tables.remove(name);
    }
}

pub(crate) fn primary_key(model: &ModelDef) -> Result<&str, StorageError> {
    model
        .primary_key_name()
        .map_err(|err| StorageError::Database(err.to_string()))
}

/// Keep only declared attributes.
pub(crate) fn normalize(model: &ModelDef, data: &Record) -> Record {
    data.iter()
        .filter(|(key, _)| model.attribute(key).is_some())
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

/// Check not-null, string-type, and uniqueness constraints of `record`
/// against `rows`, ignoring the row at `skip`.
///
/// Not-null and uniqueness are storage constraints and always apply; type
/// checks run only when `validate` is set.
fn check(
    model: &ModelDef,
    record: &Record,
    rows: &[Row],
    skip: Option<usize>,
    validate: bool,
) -> Result<(), StorageError> {
    let mut violations = Vec::new();
    for attr in &model.attributes {
        let value = match record.get(&attr.name) {
            Some(value) if !value.is_null() => value,
            _ => {
                if !attr.allow_null && !attr.auto_increment {
                    violations.push(Violation::new(
                        attr.name.clone(),
                        ViolationKind::NotNull,
                        format!("{}.{} cannot be null", model.name, attr.name),
                    ));
                }
                continue;
            }
        };

        if validate && attr.data_type == DataType::String && !value.is_string() {
            violations.push(Violation::new(
                attr.name.clone(),
                ViolationKind::StringType,
                format!("{} must be a string", attr.name),
            ));
        }

        if attr.unique || attr.primary_key {
            let taken = rows
                .iter()
                .enumerate()
                .any(|(index, row)| Some(index) != skip && row.has(&attr.name, value));
            if taken {
                violations.push(Violation::new(
                    attr.name.clone(),
                    ViolationKind::Unique,
                    format!("{} must be unique", attr.name),
                ));
            }
        }
    }

    if violations.is_empty() {
        Ok(())
    } else {
        Err(StorageError::Validation(BackendValidationError::new(
            "Validation error",
            violations,
        )))
    }
}

/// Sort records by root-model ordering terms. Nulls sort last.
pub(crate) fn sort_records<T>(
    records: &mut [(Record, T)],
    order: &[OrderOption],
) -> Result<(), StorageError> {
    let mut keys = Vec::with_capacity(order.len());
    for term in order {
        match (term.path.is_empty(), term.target_name()) {
            (true, Some(name)) => keys.push((name.to_string(), term.direction)),
            _ => {
                return Err(StorageError::Unsupported(format!(
                    "ordering by {}",
                    term.target
                )))
            }
        }
    }
    records.sort_by(|(a, _), (b, _)| {
        for (key, direction) in &keys {
            let ordering = compare_nullable(a.get(key), b.get(key));
            let ordering = match direction {
                Direction::Asc => ordering,
                Direction::Desc => ordering.reverse(),
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    });
    Ok(())
}

fn compare_nullable(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (is_nullish(a), is_nullish(b), a, b) {
        (true, true, _, _) => Ordering::Equal,
        (true, false, _, _) => Ordering::Greater,
        (false, true, _, _) => Ordering::Less,
        (false, false, Some(a), Some(b)) => compare_values(a, b).unwrap_or(Ordering::Equal),
        _ => Ordering::Equal,
    }
}

/// Apply a projection. Only plain attribute names are supported.
pub(crate) fn project(
    record: Record,
    attributes: Option<&[AttributeOption]>,
) -> Result<Record, StorageError> {
    let Some(attributes) = attributes else {
        return Ok(record);
    };
    let mut projected = Record::new();
    for attribute in attributes {
        let AttributeOption::Name(name) = attribute else {
            return Err(StorageError::Unsupported(
                "projection of expressions".to_string(),
            ));
        };
        if let Some(value) = record.get(name) {
            projected.insert(name.clone(), value.clone());
        }
    }
    Ok(projected)
}

/// Aggregate non-null values.
pub(crate) fn aggregate<'a>(
    values: impl Iterator<Item = &'a Value>,
    function: AggregateFunction,
) -> Value {
    let values: Vec<&Value> = values.filter(|v| !v.is_null()).collect();
    match function {
        AggregateFunction::Count => Value::from(values.len() as u64),
        AggregateFunction::Sum | AggregateFunction::Avg => {
            if values.is_empty() {
                return Value::Null;
            }
            let integers: Option<Vec<i64>> = values.iter().map(|v| v.as_i64()).collect();
            let floats: Vec<f64> = values.iter().filter_map(|v| v.as_f64()).collect();
            match (function, integers) {
                (AggregateFunction::Sum, Some(ints)) => Value::from(ints.iter().sum::<i64>()),
                (AggregateFunction::Sum, None) => Value::from(floats.iter().sum::<f64>()),
                _ => Value::from(floats.iter().sum::<f64>() / floats.len().max(1) as f64),
            }
        }
        AggregateFunction::Min | AggregateFunction::Max => {
            let pick = if function == AggregateFunction::Min {
                Ordering::Less
            } else {
                Ordering::Greater
            };
            values
                .into_iter()
                .reduce(|best, v| {
                    if compare_values(v, best) == Some(pick) {
                        v
                    } else {
                        best
                    }
                })
                .cloned()
                .unwrap_or(Value::Null)
        }
    }
}
