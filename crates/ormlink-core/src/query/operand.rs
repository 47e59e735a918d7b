//! Right-hand operands of a comparison.

use serde_json::Value;

use super::node::Node;

/// A compiled-or-compilable right-hand side.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// A plain value.
    Value(Value),
    /// An expression node (column, function, another attribute).
    Node(Node),
}

impl Operand {
    /// Compile to the value placed in the operator map.
    pub fn compile_right(&self) -> Value {
        match self {
            Operand::Value(value) => value.clone(),
            Operand::Node(node) => node.compile_right(),
        }
    }

    /// Compile, consuming the operand.
    pub fn into_right(self) -> Value {
        match self {
            Operand::Value(value) => value,
            Operand::Node(node) => node.compile_right(),
        }
    }
}

/// Types usable as the right-hand side of a comparison against a `V` column.
///
/// Implemented for scalars (and their `Option` and `Vec` forms) matching the
/// column's value type, and for other queryables and expressions of the same
/// value type.
pub trait IntoOperand<V> {
    /// Convert into an operand.
    fn into_operand(self) -> Operand;
}

macro_rules! scalar_operand {
    ($($ty:ty),* $(,)?) => {
        $(
            impl IntoOperand<$ty> for $ty {
                fn into_operand(self) -> Operand {
                    Operand::Value(Value::from(self))
                }
            }

            impl IntoOperand<Option<$ty>> for $ty {
                fn into_operand(self) -> Operand {
                    Operand::Value(Value::from(self))
                }
            }

            impl IntoOperand<Option<$ty>> for Option<$ty> {
                fn into_operand(self) -> Operand {
                    Operand::Value(self.map_or(Value::Null, Value::from))
                }
            }

            impl IntoOperand<Vec<$ty>> for Vec<$ty> {
                fn into_operand(self) -> Operand {
                    Operand::Value(Value::Array(self.into_iter().map(Value::from).collect()))
                }
            }
        )*
    };
}

scalar_operand!(bool, i16, i32, i64, u16, u32, u64, f32, f64, String);

impl IntoOperand<String> for &str {
    fn into_operand(self) -> Operand {
        Operand::Value(Value::from(self))
    }
}

impl IntoOperand<Option<String>> for &str {
    fn into_operand(self) -> Operand {
        Operand::Value(Value::from(self))
    }
}

impl IntoOperand<Value> for Value {
    fn into_operand(self) -> Operand {
        Operand::Value(self)
    }
}
