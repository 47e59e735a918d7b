//! Expression tree nodes and their left/right compilation.

use serde_json::{json, Map, Value};

use ormlink_proto::{ARGS_KEY, COL_KEY, FN_KEY};

use crate::error::QueryError;

/// Reference to an attribute, possibly reached through associations.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AttributeRef {
    /// Association keys traversed from the root model, outermost first.
    pub path: Vec<String>,
    /// Attribute key on the last model of the path.
    pub name: String,
}

impl AttributeRef {
    /// An attribute on the root model.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            path: Vec::new(),
            name: name.into(),
        }
    }

    /// Prefix the path with one more association hop.
    pub fn under(mut self, association: &str) -> Self {
        self.path.insert(0, association.to_string());
        self
    }

    /// Dotted form: `mentor.name`.
    pub fn dotted(&self) -> String {
        if self.path.is_empty() {
            self.name.clone()
        } else {
            format!("{}.{}", self.path.join("."), self.name)
        }
    }

    /// Key used on the left of a predicate: `name`, or `$mentor.name$` for
    /// an attribute of an included association.
    pub fn left_key(&self) -> String {
        if self.path.is_empty() {
            self.name.clone()
        } else {
            format!("${}$", self.dotted())
        }
    }
}

/// One node of an expression tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// An attribute of the model (or of an included association).
    Attribute(AttributeRef),
    /// A raw column reference.
    Column(String),
    /// A function call.
    Function {
        /// Function name.
        name: String,
        /// Arguments.
        args: Vec<Node>,
    },
    /// A literal value.
    Constant(Value),
    /// An aliased expression.
    Alias {
        /// Output name.
        name: String,
        /// Aliased expression.
        inner: Box<Node>,
    },
    /// An association reference by key.
    Association(String),
}

impl Node {
    /// Short name of the node kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Node::Attribute(_) => "attribute",
            Node::Column(_) => "column",
            Node::Function { .. } => "function",
            Node::Constant(_) => "constant",
            Node::Alias { .. } => "alias",
            Node::Association(_) => "association",
        }
    }

    /// Whether the node may appear on the left of a predicate.
    pub fn is_left_capable(&self) -> bool {
        matches!(
            self,
            Node::Attribute(_) | Node::Constant(_) | Node::Association(_)
        )
    }

    /// The key this node produces on the left of a predicate.
    pub fn compile_left(&self) -> Result<String, QueryError> {
        match self {
            Node::Attribute(attr) => Ok(attr.left_key()),
            Node::Association(key) => Ok(key.clone()),
            Node::Constant(value) => Ok(match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            }),
            Node::Column(_) | Node::Function { .. } | Node::Alias { .. } => {
                Err(QueryError::InvalidLeftOperand { kind: self.kind() })
            }
        }
    }

    /// The value this node produces on the right of a predicate, or as an
    /// argument.
    pub fn compile_right(&self) -> Value {
        match self {
            Node::Attribute(attr) => json!({ COL_KEY: attr.dotted() }),
            Node::Column(name) | Node::Association(name) => json!({ COL_KEY: name }),
            Node::Function { name, args } => {
                let mut call = Map::new();
                call.insert(FN_KEY.to_string(), Value::String(name.clone()));
                call.insert(
                    ARGS_KEY.to_string(),
                    Value::Array(args.iter().map(Node::compile_right).collect()),
                );
                Value::Object(call)
            }
            Node::Constant(value) => value.clone(),
            Node::Alias { inner, .. } => inner.compile_right(),
        }
    }
}
