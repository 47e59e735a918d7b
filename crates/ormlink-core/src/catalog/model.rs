//! Model descriptors.

use std::collections::HashSet;

use super::association::AssociationDef;
use super::attribute::AttributeDef;
use crate::error::CatalogError;

/// Descriptor of one model: attributes, associations, soft-delete flag.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelDef {
    /// Model name (unique within a registry).
    pub name: String,
    /// Attributes in declaration order.
    pub attributes: Vec<AttributeDef>,
    /// Associations in declaration order.
    pub associations: Vec<AssociationDef>,
    /// Destroy marks rows deleted instead of removing them.
    pub paranoid: bool,
}

impl ModelDef {
    /// Create an empty model.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
            associations: Vec::new(),
            paranoid: false,
        }
    }

    /// Add an attribute.
    pub fn with_attribute(mut self, attribute: AttributeDef) -> Self {
        self.attributes.push(attribute);
        self
    }

    /// Add an association.
    pub fn with_association(mut self, association: AssociationDef) -> Self {
        self.associations.push(association);
        self
    }

    /// Enable soft delete.
    pub fn with_paranoid(mut self) -> Self {
        self.paranoid = true;
        self
    }

    /// Look up an attribute by key.
    pub fn attribute(&self, key: &str) -> Option<&AttributeDef> {
        self.attributes.iter().find(|a| a.name == key)
    }

    /// Look up an association by key or alias.
    pub fn association(&self, key: &str) -> Option<&AssociationDef> {
        self.associations.iter().find(|a| a.answers_to(key))
    }

    /// The primary key attribute.
    pub fn primary_key(&self) -> Result<&AttributeDef, CatalogError> {
        self.attributes
            .iter()
            .find(|a| a.primary_key)
            .ok_or_else(|| CatalogError::MissingPrimaryKey(self.name.clone()))
    }

    /// Name of the primary key attribute.
    pub fn primary_key_name(&self) -> Result<&str, CatalogError> {
        self.primary_key().map(|a| a.name.as_str())
    }

    /// Every declared key: attribute names, then association aliases.
    pub fn declared_keys(&self) -> impl Iterator<Item = &str> {
        self.attributes
            .iter()
            .map(|a| a.name.as_str())
            .chain(self.associations.iter().map(|a| a.canonical_alias()))
    }

    /// Check the descriptor is well formed.
    pub fn validate(&self) -> Result<(), CatalogError> {
        self.primary_key()?;
        let mut seen = HashSet::new();
        for key in self.declared_keys() {
            if !seen.insert(key) {
                return Err(CatalogError::DuplicateKey {
                    model: self.name.clone(),
                    key: key.to_string(),
                });
            }
        }
        Ok(())
    }
}
