//! Typed expression handles.

use std::fmt;
use std::marker::PhantomData;

use serde_json::Value;

use ormlink_proto::{Direction, Op};

use super::descriptor::OrderTerm;
use super::filter::Where;
use super::node::{AttributeRef, Node};
use super::operand::{IntoOperand, Operand};
use crate::error::QueryError;

/// The node kinds allowed on the left of a predicate.
#[derive(Debug, Clone, PartialEq)]
enum LeftNode {
    Attribute(AttributeRef),
    Association(String),
    Constant(Value),
}

impl LeftNode {
    fn to_node(&self) -> Node {
        match self {
            LeftNode::Attribute(attr) => Node::Attribute(attr.clone()),
            LeftNode::Association(key) => Node::Association(key.clone()),
            LeftNode::Constant(value) => Node::Constant(value.clone()),
        }
    }
}

/// A typed handle on an attribute, association, or constant.
///
/// `V` is the value type of the column. Comparison methods accept only
/// operands convertible to `V`, so `age.lt("fifty")` is a compile error.
/// Only left-capable nodes can be wrapped in a `Queryable`; columns,
/// function calls, and aliases are [`Expression`]s.
pub struct Queryable<V> {
    left: LeftNode,
    _value: PhantomData<fn() -> V>,
}

impl<V> Clone for Queryable<V> {
    fn clone(&self) -> Self {
        Self {
            left: self.left.clone(),
            _value: PhantomData,
        }
    }
}

impl<V> fmt::Debug for Queryable<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Queryable").field(&self.left).finish()
    }
}

impl<V> PartialEq for Queryable<V> {
    fn eq(&self, other: &Self) -> bool {
        self.left == other.left
    }
}

impl<V> Queryable<V> {
    fn from_left(left: LeftNode) -> Self {
        Self {
            left,
            _value: PhantomData,
        }
    }

    /// Handle on an attribute of the root model.
    pub fn attribute(name: impl Into<String>) -> Self {
        Self::from_left(LeftNode::Attribute(AttributeRef::new(name)))
    }

    /// Handle on an association reference.
    pub fn association(key: impl Into<String>) -> Self {
        Self::from_left(LeftNode::Association(key.into()))
    }

    /// Handle on a literal.
    pub fn constant(value: impl Into<Value>) -> Self {
        Self::from_left(LeftNode::Constant(value.into()))
    }

    /// Re-root this handle under an association hop.
    pub(crate) fn under(self, association: &str) -> Self {
        match self.left {
            LeftNode::Attribute(attr) => Self::from_left(LeftNode::Attribute(attr.under(association))),
            other => Self::from_left(other),
        }
    }

    /// The underlying node.
    pub fn node(&self) -> Node {
        self.left.to_node()
    }

    /// Key this handle produces on the left of a predicate.
    pub fn compile_left(&self) -> String {
        match &self.left {
            LeftNode::Attribute(attr) => attr.left_key(),
            LeftNode::Association(key) => key.clone(),
            LeftNode::Constant(Value::String(s)) => s.clone(),
            LeftNode::Constant(other) => other.to_string(),
        }
    }

    /// Value this handle produces on the right of a predicate.
    pub fn compile_right(&self) -> Value {
        self.left.to_node().compile_right()
    }

    /// Reinterpret the value type. Escape hatch for untyped comparisons.
    pub fn cast<U>(self) -> Queryable<U> {
        Queryable::from_left(self.left)
    }

    /// Project under an output name.
    pub fn alias(&self, name: impl Into<String>) -> Expression<V> {
        Expression::from_node(Node::Alias {
            name: name.into(),
            inner: Box::new(self.node()),
        })
    }

    /// Ascending ordering on this handle.
    pub fn asc(&self) -> OrderTerm {
        OrderTerm::new(self.node(), Direction::Asc)
    }

    /// Descending ordering on this handle.
    pub fn desc(&self) -> OrderTerm {
        OrderTerm::new(self.node(), Direction::Desc)
    }

    fn build(&self, op: Op, right: Value) -> Where {
        Where::build(self.compile_left(), op, right)
    }

    fn build_operand(&self, op: Op, other: impl IntoOperand<V>) -> Where {
        self.build(op, other.into_operand().into_right())
    }

    fn build_list<I>(&self, op: Op, values: I) -> Where
    where
        I: IntoIterator,
        I::Item: IntoOperand<V>,
    {
        let list = values
            .into_iter()
            .map(|v| v.into_operand().into_right())
            .collect();
        self.build(op, Value::Array(list))
    }

    fn build_range(&self, op: Op, low: impl IntoOperand<V>, high: impl IntoOperand<V>) -> Where {
        let range = vec![low.into_operand().into_right(), high.into_operand().into_right()];
        self.build(op, Value::Array(range))
    }

    /// `= other`. Compiles to the bare value.
    pub fn eq(&self, other: impl IntoOperand<V>) -> Where {
        self.build_operand(Op::Eq, other)
    }

    /// `!= other`.
    pub fn ne(&self, other: impl IntoOperand<V>) -> Where {
        self.build_operand(Op::Ne, other)
    }

    /// `> other`.
    pub fn gt(&self, other: impl IntoOperand<V>) -> Where {
        self.build_operand(Op::Gt, other)
    }

    /// `>= other`.
    pub fn gte(&self, other: impl IntoOperand<V>) -> Where {
        self.build_operand(Op::Gte, other)
    }

    /// `< other`.
    pub fn lt(&self, other: impl IntoOperand<V>) -> Where {
        self.build_operand(Op::Lt, other)
    }

    /// `<= other`.
    pub fn lte(&self, other: impl IntoOperand<V>) -> Where {
        self.build_operand(Op::Lte, other)
    }

    /// `LIKE pattern`.
    pub fn like(&self, pattern: impl IntoOperand<V>) -> Where {
        self.build_operand(Op::Like, pattern)
    }

    /// `NOT LIKE pattern`.
    pub fn not_like(&self, pattern: impl IntoOperand<V>) -> Where {
        self.build_operand(Op::NotLike, pattern)
    }

    /// Case-insensitive `LIKE`.
    pub fn i_like(&self, pattern: impl IntoOperand<V>) -> Where {
        self.build_operand(Op::ILike, pattern)
    }

    /// Case-insensitive `NOT LIKE`.
    pub fn not_i_like(&self, pattern: impl IntoOperand<V>) -> Where {
        self.build_operand(Op::NotILike, pattern)
    }

    /// `IS NOT other`.
    pub fn not(&self, other: impl IntoOperand<V>) -> Where {
        self.build_operand(Op::Not, other)
    }

    /// `IS other`.
    pub fn is(&self, other: impl IntoOperand<V>) -> Where {
        self.build_operand(Op::Is, other)
    }

    /// `IS NULL`.
    pub fn is_null(&self) -> Where {
        self.build(Op::Is, Value::Null)
    }

    /// `IS NOT NULL`.
    pub fn is_not_null(&self) -> Where {
        self.build(Op::Not, Value::Null)
    }

    /// `IN (values...)`.
    pub fn in_<I>(&self, values: I) -> Where
    where
        I: IntoIterator,
        I::Item: IntoOperand<V>,
    {
        self.build_list(Op::In, values)
    }

    /// `NOT IN (values...)`.
    pub fn not_in<I>(&self, values: I) -> Where
    where
        I: IntoIterator,
        I::Item: IntoOperand<V>,
    {
        self.build_list(Op::NotIn, values)
    }

    /// `BETWEEN low AND high`.
    pub fn between(&self, low: impl IntoOperand<V>, high: impl IntoOperand<V>) -> Where {
        self.build_range(Op::Between, low, high)
    }

    /// `NOT BETWEEN low AND high`.
    pub fn not_between(&self, low: impl IntoOperand<V>, high: impl IntoOperand<V>) -> Where {
        self.build_range(Op::NotBetween, low, high)
    }

    /// Array overlap.
    pub fn overlap(&self, other: impl IntoOperand<V>) -> Where {
        self.build_operand(Op::Overlap, other)
    }

    /// Array or range contains `other`.
    pub fn contains(&self, other: impl IntoOperand<V>) -> Where {
        self.build_operand(Op::Contains, other)
    }

    /// Array or range is contained by `other`.
    pub fn contained(&self, other: impl IntoOperand<V>) -> Where {
        self.build_operand(Op::Contained, other)
    }

    /// Equal to any element of `values`.
    pub fn any<I>(&self, values: I) -> Where
    where
        I: IntoIterator,
        I::Item: IntoOperand<V>,
    {
        self.build_list(Op::Any, values)
    }

    /// Range is adjacent to `other`.
    pub fn adjacent(&self, other: impl IntoOperand<V>) -> Where {
        self.build_operand(Op::Adjacent, other)
    }

    /// Range is strictly left of `other`.
    pub fn strict_left(&self, other: impl IntoOperand<V>) -> Where {
        self.build_operand(Op::StrictLeft, other)
    }

    /// Range is strictly right of `other`.
    pub fn strict_right(&self, other: impl IntoOperand<V>) -> Where {
        self.build_operand(Op::StrictRight, other)
    }

    /// Range does not extend right of `other`.
    pub fn no_extend_right(&self, other: impl IntoOperand<V>) -> Where {
        self.build_operand(Op::NoExtendRight, other)
    }

    /// Range does not extend left of `other`.
    pub fn no_extend_left(&self, other: impl IntoOperand<V>) -> Where {
        self.build_operand(Op::NoExtendLeft, other)
    }
}

impl<V> From<Queryable<V>> for Node {
    fn from(queryable: Queryable<V>) -> Self {
        queryable.left.to_node()
    }
}

impl<V> From<&Queryable<V>> for Node {
    fn from(queryable: &Queryable<V>) -> Self {
        queryable.node()
    }
}

impl<V> IntoOperand<V> for Queryable<V> {
    fn into_operand(self) -> Operand {
        Operand::Node(self.into())
    }
}

impl<V> IntoOperand<V> for &Queryable<V> {
    fn into_operand(self) -> Operand {
        Operand::Node(self.node())
    }
}

/// A typed handle on any expression node.
///
/// Expressions can be projected, grouped, ordered on, and used as operands,
/// but only a [`Queryable`] offers comparison methods. Runtime-built
/// comparisons go through [`Where::compare`], which rejects nodes that cannot
/// stand on the left.
pub struct Expression<V> {
    node: Node,
    _value: PhantomData<fn() -> V>,
}

impl<V> Clone for Expression<V> {
    fn clone(&self) -> Self {
        Self::from_node(self.node.clone())
    }
}

impl<V> fmt::Debug for Expression<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Expression").field(&self.node).finish()
    }
}

impl<V> Expression<V> {
    /// Wrap a node.
    pub fn from_node(node: Node) -> Self {
        Self {
            node,
            _value: PhantomData,
        }
    }

    /// The underlying node.
    pub fn node(&self) -> &Node {
        &self.node
    }

    /// Key this expression produces on the left of a predicate.
    pub fn compile_left(&self) -> Result<String, QueryError> {
        self.node.compile_left()
    }

    /// Value this expression produces on the right of a predicate.
    pub fn compile_right(&self) -> Value {
        self.node.compile_right()
    }

    /// Reinterpret the value type.
    pub fn cast<U>(self) -> Expression<U> {
        Expression::from_node(self.node)
    }

    /// Project under an output name.
    pub fn alias(&self, name: impl Into<String>) -> Expression<V> {
        Expression::from_node(Node::Alias {
            name: name.into(),
            inner: Box::new(self.node.clone()),
        })
    }

    /// Ascending ordering on this expression.
    pub fn asc(&self) -> OrderTerm {
        OrderTerm::new(self.node.clone(), Direction::Asc)
    }

    /// Descending ordering on this expression.
    pub fn desc(&self) -> OrderTerm {
        OrderTerm::new(self.node.clone(), Direction::Desc)
    }
}

impl<V> From<Queryable<V>> for Expression<V> {
    fn from(queryable: Queryable<V>) -> Self {
        Expression::from_node(queryable.into())
    }
}

impl<V> From<Expression<V>> for Node {
    fn from(expression: Expression<V>) -> Self {
        expression.node
    }
}

impl<V> From<&Expression<V>> for Node {
    fn from(expression: &Expression<V>) -> Self {
        expression.node.clone()
    }
}

impl<V> IntoOperand<V> for Expression<V> {
    fn into_operand(self) -> Operand {
        Operand::Node(self.node)
    }
}

impl<V> IntoOperand<V> for &Expression<V> {
    fn into_operand(self) -> Operand {
        Operand::Node(self.node.clone())
    }
}

/// A raw column reference.
pub fn col<V>(name: impl Into<String>) -> Expression<V> {
    Expression::from_node(Node::Column(name.into()))
}

/// A function call over argument nodes.
pub fn func<V>(name: impl Into<String>, args: impl IntoIterator<Item = Node>) -> Expression<V> {
    Expression::from_node(Node::Function {
        name: name.into(),
        args: args.into_iter().collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_identity_comparison_compiles_to_bare_value() {
        let age: Queryable<i64> = Queryable::attribute("age");
        assert_eq!(age.eq(30).to_value(), json!({ "age": 30 }));
        assert_eq!(age.lt(50).to_value(), json!({ "age": { "$lt": 50 } }));
    }

    #[test]
    fn test_optional_column_accepts_none() {
        let email: Queryable<Option<String>> = Queryable::attribute("email");
        assert_eq!(email.eq(None::<String>).to_value(), json!({ "email": null }));
        assert_eq!(email.eq("a@b.c").to_value(), json!({ "email": "a@b.c" }));
        assert_eq!(email.is_null().to_value(), json!({ "email": { "$is": null } }));
    }

    #[test]
    fn test_list_and_range_operators() {
        let age: Queryable<i64> = Queryable::attribute("age");
        assert_eq!(
            age.in_([1, 2, 3]).to_value(),
            json!({ "age": { "$in": [1, 2, 3] } })
        );
        assert_eq!(
            age.between(18, 65).to_value(),
            json!({ "age": { "$between": [18, 65] } })
        );
        assert_eq!(
            age.not_in(Vec::<i64>::new()).to_value(),
            json!({ "age": { "$notIn": [] } })
        );
    }

    #[test]
    fn test_column_operand() {
        let updated: Queryable<i64> = Queryable::attribute("updatedAt");
        let created: Queryable<i64> = Queryable::attribute("createdAt");
        assert_eq!(
            updated.gt(&created).to_value(),
            json!({ "updatedAt": { "$gt": { "$col": "createdAt" } } })
        );
    }

    #[test]
    fn test_pattern_against_column() {
        let name: Queryable<String> = Queryable::attribute("name");
        let nickname: Queryable<String> = Queryable::attribute("nickname");
        assert_eq!(
            name.like(&nickname).to_value(),
            json!({ "name": { "$like": { "$col": "nickname" } } })
        );
        assert_eq!(
            name.not_i_like("%x").to_value(),
            json!({ "name": { "$notILike": "%x" } })
        );
    }

    #[test]
    fn test_function_operand() {
        let name: Queryable<String> = Queryable::attribute("name");
        let lowered: Expression<String> = func("lower", [Node::from(col::<String>("nickname"))]);
        assert_eq!(
            name.eq(lowered).to_value(),
            json!({ "name": { "$fn": "lower", "args": [{ "$col": "nickname" }] } })
        );
    }

    #[test]
    fn test_cast_and_alias() {
        let age: Queryable<i64> = Queryable::attribute("age");
        let loose: Queryable<String> = age.clone().cast();
        assert_eq!(loose.like("4%").to_value(), json!({ "age": { "$like": "4%" } }));

        let aliased = age.alias("years");
        assert_eq!(
            aliased.node(),
            &Node::Alias {
                name: "years".into(),
                inner: Box::new(Node::Attribute(AttributeRef::new("age"))),
            }
        );
        assert!(aliased.compile_left().is_err());
    }

    #[test]
    fn test_constant_left() {
        let one: Queryable<i64> = Queryable::constant(1);
        assert_eq!(one.compile_left(), "1");
        assert_eq!(one.compile_right(), json!(1));
    }
}
