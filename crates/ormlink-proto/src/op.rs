//! Filter operator vocabulary.
//!
//! A compiled predicate is a map from a left-projection key to either a
//! literal (identity comparison) or an operator map such as
//! `{"$lt": 50}`. The keys below are the only operator keys an adapter has
//! to understand.

use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// Reserved key wrapping a disjunction array.
pub const OR_KEY: &str = "$or";

/// Reserved key wrapping a conjunction array.
pub const AND_KEY: &str = "$and";

/// Reserved key marking a column reference (`{"$col": "name"}`).
pub const COL_KEY: &str = "$col";

/// Reserved key marking a function call (`{"$fn": "lower", "args": [...]}`).
pub const FN_KEY: &str = "$fn";

/// Argument list key inside a function call object.
pub const ARGS_KEY: &str = "args";

/// A comparison operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    /// Equality. The identity operator: compiles to a bare value.
    Eq,
    /// Not equal.
    Ne,
    /// Greater than.
    Gt,
    /// Greater than or equal.
    Gte,
    /// Less than.
    Lt,
    /// Less than or equal.
    Lte,
    /// SQL LIKE pattern.
    Like,
    /// Negated LIKE.
    NotLike,
    /// Case-insensitive LIKE.
    ILike,
    /// Negated case-insensitive LIKE.
    NotILike,
    /// IS NOT.
    Not,
    /// IS (null/boolean tests).
    Is,
    /// Member of a set.
    In,
    /// Not a member of a set.
    NotIn,
    /// Inside an inclusive range `[lo, hi]`.
    Between,
    /// Outside an inclusive range.
    NotBetween,
    /// Array overlap (`&&`).
    Overlap,
    /// Array/range contains (`@>`).
    Contains,
    /// Array/range contained by (`<@`).
    Contained,
    /// ANY of an array.
    Any,
    /// Range adjacency (`-|-`).
    Adjacent,
    /// Range strictly left of (`<<`).
    StrictLeft,
    /// Range strictly right of (`>>`).
    StrictRight,
    /// Range does not extend right of (`&<`).
    NoExtendRight,
    /// Range does not extend left of (`&>`).
    NoExtendLeft,
}

impl Op {
    /// Every operator, in declaration order.
    pub const ALL: [Op; 25] = [
        Op::Eq,
        Op::Ne,
        Op::Gt,
        Op::Gte,
        Op::Lt,
        Op::Lte,
        Op::Like,
        Op::NotLike,
        Op::ILike,
        Op::NotILike,
        Op::Not,
        Op::Is,
        Op::In,
        Op::NotIn,
        Op::Between,
        Op::NotBetween,
        Op::Overlap,
        Op::Contains,
        Op::Contained,
        Op::Any,
        Op::Adjacent,
        Op::StrictLeft,
        Op::StrictRight,
        Op::NoExtendRight,
        Op::NoExtendLeft,
    ];

    /// The operator key used inside a compiled operator map.
    pub fn key(self) -> &'static str {
        match self {
            Op::Eq => "$eq",
            Op::Ne => "$ne",
            Op::Gt => "$gt",
            Op::Gte => "$gte",
            Op::Lt => "$lt",
            Op::Lte => "$lte",
            Op::Like => "$like",
            Op::NotLike => "$notLike",
            Op::ILike => "$iLike",
            Op::NotILike => "$notILike",
            Op::Not => "$not",
            Op::Is => "$is",
            Op::In => "$in",
            Op::NotIn => "$notIn",
            Op::Between => "$between",
            Op::NotBetween => "$notBetween",
            Op::Overlap => "$overlap",
            Op::Contains => "$contains",
            Op::Contained => "$contained",
            Op::Any => "$any",
            Op::Adjacent => "$adjacent",
            Op::StrictLeft => "$strictLeft",
            Op::StrictRight => "$strictRight",
            Op::NoExtendRight => "$noExtendRight",
            Op::NoExtendLeft => "$noExtendLeft",
        }
    }

    /// Whether this operator compiles to the bare right-hand value.
    pub fn is_identity(self) -> bool {
        self == Op::Eq
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for Op {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Op::ALL
            .iter()
            .copied()
            .find(|op| op.key() == s)
            .ok_or_else(|| Error::UnknownOperator(s.to_string()))
    }
}
