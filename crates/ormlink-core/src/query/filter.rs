//! Compiled predicates.

use serde_json::{Map, Value};

use ormlink_proto::value::is_operator_map;
use ormlink_proto::{Op, WhereMap, AND_KEY, COL_KEY, FN_KEY, OR_KEY};

use super::operand::{IntoOperand, Operand};
use super::queryable::Expression;
use crate::error::QueryError;

/// A predicate in compiled form.
///
/// A `Where` maps left keys to either a bare value (equality) or an operator
/// map. Combining with [`Where::and`] merges maps; combining with
/// [`Where::or`] wraps both sides in `$or`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Where {
    map: WhereMap,
}

impl Where {
    /// The empty predicate (matches everything).
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap an already compiled map.
    pub fn from_map(map: WhereMap) -> Self {
        Self { map }
    }

    /// One comparison: `{left: right}` for the identity operator, otherwise
    /// `{left: {op: right}}`.
    pub fn build(left: String, op: Op, right: Value) -> Self {
        let value = if op.is_identity() {
            right
        } else {
            let mut ops = Map::new();
            ops.insert(op.key().to_string(), right);
            Value::Object(ops)
        };
        let mut map = Map::new();
        map.insert(left, value);
        Self { map }
    }

    /// Compare an arbitrary expression.
    ///
    /// Fails when the expression is a column, function call, or alias, which
    /// have no left-hand key.
    pub fn compare<V>(
        left: &Expression<V>,
        op: Op,
        right: impl IntoOperand<V>,
    ) -> Result<Self, QueryError> {
        let key = left.compile_left()?;
        Ok(Self::build(key, op, right.into_operand().into_right()))
    }

    /// Compare an expression against an untyped operand.
    pub fn compare_operand<V>(
        left: &Expression<V>,
        op: Op,
        right: Operand,
    ) -> Result<Self, QueryError> {
        let key = left.compile_left()?;
        Ok(Self::build(key, op, right.into_right()))
    }

    /// Conjunction.
    ///
    /// Keys present on one side only are copied. When both sides constrain
    /// the same key with operator maps, operators are merged. Anything that
    /// would overwrite an existing entry (the same operator twice, or a bare
    /// value against anything) is appended to an `$and` array instead, so no
    /// constraint is ever dropped.
    pub fn and(mut self, other: Where) -> Where {
        conjoin(&mut self.map, other.map);
        self
    }

    /// Disjunction: `{"$or": [self, other]}`.
    pub fn or(self, other: Where) -> Where {
        let mut map = Map::new();
        map.insert(
            OR_KEY.to_string(),
            Value::Array(vec![Value::Object(self.map), Value::Object(other.map)]),
        );
        Self { map }
    }

    /// Conjunction of many predicates.
    pub fn all(predicates: impl IntoIterator<Item = Where>) -> Where {
        predicates.into_iter().fold(Where::new(), Where::and)
    }

    /// Whether the predicate constrains nothing.
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// The compiled map.
    pub fn as_map(&self) -> &WhereMap {
        &self.map
    }

    /// Consume into the compiled map.
    pub fn into_map(self) -> WhereMap {
        self.map
    }

    /// The compiled map as a JSON value.
    pub fn to_value(&self) -> Value {
        Value::Object(self.map.clone())
    }
}

fn conjoin(target: &mut WhereMap, other: WhereMap) {
    for (key, value) in other {
        if key == AND_KEY {
            match value {
                Value::Array(items) => {
                    for item in items {
                        push_and(target, item);
                    }
                }
                single => push_and(target, single),
            }
            continue;
        }

        let leftover = match target.get_mut(&key) {
            None => {
                target.insert(key, value);
                continue;
            }
            Some(Value::Object(current))
                if is_operator_object(current)
                    && is_operator_map(&value)
                    && !is_reference(&value) =>
            {
                let Value::Object(incoming) = value else {
                    continue;
                };
                let mut collisions = Map::new();
                for (op, operand) in incoming {
                    match current.get(&op) {
                        Some(existing) if *existing == operand => {}
                        Some(_) => {
                            collisions.insert(op, operand);
                        }
                        None => {
                            current.insert(op, operand);
                        }
                    }
                }
                if collisions.is_empty() {
                    continue;
                }
                Value::Object(collisions)
            }
            Some(existing) => {
                if *existing == value {
                    continue;
                }
                value
            }
        };
        push_and(target, single_entry(key, leftover));
    }
}

// Column references and function calls are equality operands, not operators.
fn is_operator_object(map: &WhereMap) -> bool {
    !map.is_empty()
        && map.keys().all(|k| k.starts_with('$'))
        && !map.contains_key(COL_KEY)
        && !map.contains_key(FN_KEY)
}

fn is_reference(value: &Value) -> bool {
    matches!(value, Value::Object(map) if map.contains_key(COL_KEY) || map.contains_key(FN_KEY))
}

fn single_entry(key: String, value: Value) -> Value {
    let mut map = Map::new();
    map.insert(key, value);
    Value::Object(map)
}

fn push_and(target: &mut WhereMap, item: Value) {
    let slot = target
        .entry(AND_KEY.to_string())
        .or_insert_with(|| Value::Array(Vec::new()));
    match slot {
        Value::Array(items) => items.push(item),
        other => {
            let previous = other.take();
            *other = Value::Array(vec![previous, item]);
        }
    }
}
