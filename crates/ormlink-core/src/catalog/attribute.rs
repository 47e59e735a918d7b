//! Attribute definitions.

use serde_json::Value;

/// Storage type of an attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    /// 64-bit integer.
    Integer,
    /// 64-bit float.
    Float,
    /// UTF-8 string.
    String,
    /// Boolean.
    Boolean,
    /// Timestamp stored as an ISO-8601 string.
    Date,
    /// Arbitrary JSON document.
    Json,
}

/// An attribute (column) of a model.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeDef {
    /// Attribute key.
    pub name: String,
    /// Storage type.
    pub data_type: DataType,
    /// Part of the primary key.
    pub primary_key: bool,
    /// Assigned by the storage engine when absent.
    pub auto_increment: bool,
    /// Null is an acceptable value.
    pub allow_null: bool,
    /// No two live rows may share a non-null value.
    pub unique: bool,
    /// Value used when the attribute is absent on create.
    pub default: Option<Value>,
}

impl AttributeDef {
    /// Create a new non-nullable attribute.
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
            primary_key: false,
            auto_increment: false,
            allow_null: false,
            unique: false,
            default: None,
        }
    }

    /// Create a nullable attribute.
    pub fn optional(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            allow_null: true,
            ..Self::new(name, data_type)
        }
    }

    /// Create an auto-incrementing integer primary key.
    pub fn identity(name: impl Into<String>) -> Self {
        Self {
            primary_key: true,
            auto_increment: true,
            ..Self::new(name, DataType::Integer)
        }
    }

    /// Mark as unique.
    pub fn with_unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Set the default value.
    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.default = Some(default.into());
        self
    }

    /// A value must be supplied on create.
    pub fn is_required(&self) -> bool {
        !self.allow_null && !self.auto_increment && self.default.is_none()
    }
}
