//! Filter evaluation for the in-memory adapter.
//!
//! Evaluates compiled where-maps against plain records. Column references
//! (`{"$col": ...}`) resolve against the same record; function calls and
//! association-qualified keys (`$mentor.name$`) need a real query engine and
//! are reported as unsupported.

use std::cmp::Ordering;
use std::str::FromStr;

use serde_json::{Map, Value};

use ormlink_proto::{Op, Record, WhereMap, AND_KEY, COL_KEY, FN_KEY, OR_KEY};

use crate::storage::StorageError;

/// Evaluates where-maps against records.
pub(crate) struct WhereEvaluator;

impl WhereEvaluator {
    /// Check whether `row` satisfies every entry of `filter`.
    pub fn matches(filter: &WhereMap, row: &Record) -> Result<bool, StorageError> {
        for (key, expected) in filter {
            if !Self::matches_entry(key, expected, row)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn matches_entry(key: &str, expected: &Value, row: &Record) -> Result<bool, StorageError> {
        match key {
            AND_KEY => Self::all_of(expected, row),
            OR_KEY => Self::any_of(expected, row),
            _ if key.starts_with('$') => Err(StorageError::Unsupported(format!(
                "filter key '{key}' requires a join"
            ))),
            _ => {
                let actual = row.get(key);
                match expected {
                    Value::Object(ops) if is_reference(ops) => {
                        let resolved = Self::resolve(expected, row)?;
                        Ok(Self::equals(actual, &resolved))
                    }
                    Value::Object(ops) if is_operators(ops) => {
                        for (op, operand) in ops {
                            let operand = Self::resolve(operand, row)?;
                            if !Self::apply(op, actual, &operand)? {
                                return Ok(false);
                            }
                        }
                        Ok(true)
                    }
                    literal => Ok(Self::equals(actual, literal)),
                }
            }
        }
    }

    fn all_of(clauses: &Value, row: &Record) -> Result<bool, StorageError> {
        match clauses {
            Value::Array(items) => {
                for item in items {
                    if !Self::matches_clause(item, row)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            other => Self::matches_clause(other, row),
        }
    }

    fn any_of(clauses: &Value, row: &Record) -> Result<bool, StorageError> {
        match clauses {
            Value::Array(items) => {
                for item in items {
                    if Self::matches_clause(item, row)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            Value::Object(entries) => {
                for (key, expected) in entries {
                    if Self::matches_entry(key, expected, row)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            other => Err(StorageError::Unsupported(format!("disjunction over {other}"))),
        }
    }

    fn matches_clause(clause: &Value, row: &Record) -> Result<bool, StorageError> {
        match clause {
            Value::Object(map) => Self::matches(map, row),
            other => Err(StorageError::Unsupported(format!("clause {other}"))),
        }
    }

    /// Resolve column references in an operand.
    fn resolve(operand: &Value, row: &Record) -> Result<Value, StorageError> {
        match operand {
            Value::Object(map) if map.contains_key(FN_KEY) => Err(StorageError::Unsupported(
                "function calls in filters".to_string(),
            )),
            Value::Object(map) if map.contains_key(COL_KEY) => {
                let column = map.get(COL_KEY).and_then(Value::as_str).unwrap_or_default();
                if column.contains('.') {
                    return Err(StorageError::Unsupported(format!(
                        "column '{column}' requires a join"
                    )));
                }
                Ok(row.get(column).cloned().unwrap_or(Value::Null))
            }
            Value::Array(items) => items
                .iter()
                .map(|item| Self::resolve(item, row))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
            other => Ok(other.clone()),
        }
    }

    fn apply(op: &str, actual: Option<&Value>, operand: &Value) -> Result<bool, StorageError> {
        let op = Op::from_str(op)?;
        let present = actual.filter(|v| !v.is_null());
        let result = match op {
            Op::Eq => Self::equals(actual, operand),
            Op::Ne => present.is_some_and(|v| !operand.is_null() && !values_equal(v, operand)),
            Op::Gt => Self::ordered(present, operand, Ordering::is_gt),
            Op::Gte => Self::ordered(present, operand, Ordering::is_ge),
            Op::Lt => Self::ordered(present, operand, Ordering::is_lt),
            Op::Lte => Self::ordered(present, operand, Ordering::is_le),
            Op::Is => Self::equals(actual, operand),
            Op::Not => !Self::equals(actual, operand),
            Op::In => match (present, operand) {
                (Some(v), Value::Array(set)) => set.iter().any(|s| values_equal(v, s)),
                _ => false,
            },
            Op::NotIn => match (present, operand) {
                (Some(v), Value::Array(set)) => !set.iter().any(|s| values_equal(v, s)),
                _ => true,
            },
            Op::Between | Op::NotBetween => {
                let inside = match (present, operand.as_array().map(Vec::as_slice)) {
                    (Some(v), Some([low, high])) => {
                        Self::ordered(Some(v), low, Ordering::is_ge)
                            && Self::ordered(Some(v), high, Ordering::is_le)
                    }
                    _ => false,
                };
                if op == Op::Between {
                    inside
                } else {
                    present.is_some() && !inside
                }
            }
            Op::Like | Op::NotLike | Op::ILike | Op::NotILike => {
                let (Some(Value::String(s)), Value::String(pattern)) = (present, operand) else {
                    return Ok(matches!(op, Op::NotLike | Op::NotILike));
                };
                let hit = match op {
                    Op::ILike | Op::NotILike => {
                        like_match(&s.to_lowercase(), &pattern.to_lowercase())
                    }
                    _ => like_match(s, pattern),
                };
                if matches!(op, Op::Like | Op::ILike) {
                    hit
                } else {
                    !hit
                }
            }
            Op::Overlap
            | Op::Contains
            | Op::Contained
            | Op::Any
            | Op::Adjacent
            | Op::StrictLeft
            | Op::StrictRight
            | Op::NoExtendRight
            | Op::NoExtendLeft => {
                return Err(StorageError::Unsupported(format!("operator {op}")));
            }
        };
        Ok(result)
    }

    /// Equality with SQL `IS NULL` semantics for a null operand.
    fn equals(actual: Option<&Value>, expected: &Value) -> bool {
        match (actual, expected) {
            (None | Some(Value::Null), Value::Null) => true,
            (None | Some(Value::Null), _) => false,
            (Some(v), expected) => values_equal(v, expected),
        }
    }

    fn ordered(actual: Option<&Value>, operand: &Value, test: fn(Ordering) -> bool) -> bool {
        actual
            .and_then(|v| compare_values(v, operand))
            .map(test)
            .unwrap_or(false)
    }
}

fn is_reference(map: &Map<String, Value>) -> bool {
    map.contains_key(COL_KEY) || map.contains_key(FN_KEY)
}

fn is_operators(map: &Map<String, Value>) -> bool {
    !map.is_empty() && map.keys().all(|k| k.starts_with('$'))
}

/// Check if two values are equal. Numbers compare by value across
/// integer/float representations.
pub(crate) fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(_), Value::Number(_)) => compare_values(a, b) == Some(Ordering::Equal),
        _ => a == b,
    }
}

/// Compare two values, returning their ordering if comparable.
pub(crate) fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_i64(), y.as_i64()) {
            (Some(x), Some(y)) => Some(x.cmp(&y)),
            _ => x.as_f64()?.partial_cmp(&y.as_f64()?),
        },
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        (Value::Null, Value::Null) => Some(Ordering::Equal),
        _ => None,
    }
}

/// Match a string against a SQL LIKE pattern.
///
/// Supports:
/// - `%` matches zero or more characters
/// - `_` matches exactly one character
/// - `\%` and `\_` match the literal character
pub(crate) fn like_match(value: &str, pattern: &str) -> bool {
    let value: Vec<char> = value.chars().collect();
    let Some(tokens) = like_tokens(pattern) else {
        return false;
    };

    // Greedy scan; on mismatch, retry from the last `%` one character later.
    let (mut v, mut t) = (0, 0);
    let mut resume: Option<(usize, usize)> = None;
    while v < value.len() {
        match tokens.get(t) {
            Some(LikeToken::Any) => {
                resume = Some((t + 1, v));
                t += 1;
            }
            Some(LikeToken::One) => {
                v += 1;
                t += 1;
            }
            Some(LikeToken::Char(c)) if *c == value[v] => {
                v += 1;
                t += 1;
            }
            _ => match resume {
                Some((after, from)) => {
                    t = after;
                    v = from + 1;
                    resume = Some((after, from + 1));
                }
                None => return false,
            },
        }
    }
    tokens[t..].iter().all(|token| *token == LikeToken::Any)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LikeToken {
    Any,
    One,
    Char(char),
}

// `None` for a pattern ending in a lone backslash, which matches nothing.
fn like_tokens(pattern: &str) -> Option<Vec<LikeToken>> {
    let mut tokens = Vec::with_capacity(pattern.len());
    let mut chars = pattern.chars();
    while let Some(c) = chars.next() {
        let token = match c {
            '%' if tokens.last() == Some(&LikeToken::Any) => continue,
            '%' => LikeToken::Any,
            '_' => LikeToken::One,
            '\\' => LikeToken::Char(chars.next()?),
            other => LikeToken::Char(other),
        };
        tokens.push(token);
    }
    Some(tokens)
}
