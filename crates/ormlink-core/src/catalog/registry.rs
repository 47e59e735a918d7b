//! Model registry.

use std::sync::Arc;

use dashmap::DashMap;
use tracing::debug;

use super::association::{AssociationDef, AssociationKind};
use super::attribute::AttributeDef;
use super::entity::Entity;
use super::model::ModelDef;
use crate::error::{AssociationError, CatalogError};

/// Registry of model descriptors, keyed by model name.
///
/// Descriptors are immutable once registered. Association targets are looked
/// up by name on demand, so registration order does not matter.
#[derive(Debug, Default)]
pub struct Registry {
    models: DashMap<String, Arc<ModelDef>>,
}

impl Registry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a model descriptor.
    pub fn register(&self, model: ModelDef) -> Result<Arc<ModelDef>, CatalogError> {
        model.validate()?;
        let name = model.name.clone();
        let model = Arc::new(model);
        match self.models.entry(name.clone()) {
            dashmap::mapref::entry::Entry::Occupied(_) => Err(CatalogError::DuplicateModel(name)),
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(model.clone());
                debug!(model = %name, "registered model");
                Ok(model)
            }
        }
    }

    /// Register the model bound to an entity type.
    pub fn register_entity<T: Entity>(&self) -> Result<Arc<ModelDef>, CatalogError> {
        self.register(T::model())
    }

    /// Look up a model by name.
    pub fn model(&self, name: &str) -> Result<Arc<ModelDef>, CatalogError> {
        self.models
            .get(name)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| CatalogError::UnknownModel(name.to_string()))
    }

    /// Check whether a model is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.models.contains_key(name)
    }

    /// Names of all registered models, sorted.
    pub fn model_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.models.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    /// Attribute descriptors of a registered model.
    pub fn attributes(&self, name: &str) -> Result<Vec<AttributeDef>, CatalogError> {
        self.model(name).map(|model| model.attributes.clone())
    }

    /// Association descriptors of a registered model.
    pub fn associations(&self, name: &str) -> Result<Vec<AssociationDef>, CatalogError> {
        self.model(name).map(|model| model.associations.clone())
    }

    /// Look up an association on `model` by key or alias.
    pub fn association<'m>(
        &self,
        model: &'m ModelDef,
        key: &str,
    ) -> Result<&'m AssociationDef, AssociationError> {
        model
            .association(key)
            .ok_or_else(|| AssociationError::UnknownAssociation {
                model: model.name.clone(),
                key: key.to_string(),
            })
    }

    /// Resolve the target model of an association.
    pub fn resolve_target(
        &self,
        source: &ModelDef,
        association: &AssociationDef,
    ) -> Result<Arc<ModelDef>, AssociationError> {
        self.model(&association.target)
            .map_err(|_| AssociationError::UnresolvedTarget {
                model: source.name.clone(),
                key: association.key.clone(),
                target: association.target.clone(),
            })
    }

    /// Foreign key column for an association declared on `source`.
    ///
    /// BelongsTo: the column on the source, declared or `<alias>Id`.
    /// HasOne/HasMany: the column on the target, declared, else taken from a
    /// BelongsTo on the target pointing back at the source, else
    /// `<SourceModel>Id`. BelongsToMany: the join-table column pointing at the
    /// source, declared or `<SourceModel>Id`.
    pub fn foreign_key(&self, source: &ModelDef, association: &AssociationDef) -> String {
        if let Some(fk) = &association.foreign_key {
            return fk.clone();
        }
        match association.kind {
            AssociationKind::BelongsTo => format!("{}Id", association.canonical_alias()),
            AssociationKind::HasOne | AssociationKind::HasMany => self
                .back_reference(source, association)
                .unwrap_or_else(|| format!("{}Id", source.name)),
            AssociationKind::BelongsToMany => format!("{}Id", source.name),
        }
    }

    /// Join-table column pointing at the target of a BelongsToMany.
    pub fn other_key(&self, association: &AssociationDef) -> String {
        association
            .other_key
            .clone()
            .unwrap_or_else(|| format!("{}Id", association.target))
    }

    fn back_reference(&self, source: &ModelDef, association: &AssociationDef) -> Option<String> {
        let target = self.model(&association.target).ok()?;
        target
            .associations
            .iter()
            .find(|a| a.kind == AssociationKind::BelongsTo && a.target == source.name)
            .map(|back| self.foreign_key(&target, back))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{AttributeDef, DataType};

    fn registry() -> Registry {
        let registry = Registry::new();
        registry
            .register(
                ModelDef::new("User")
                    .with_attribute(AttributeDef::identity("id"))
                    .with_attribute(AttributeDef::optional("mentorId", DataType::Integer))
                    .with_association(AssociationDef::belongs_to("mentor", "User"))
                    .with_association(AssociationDef::has_one("mentee", "User"))
                    .with_association(AssociationDef::has_many("posts", "Post"))
                    .with_association(AssociationDef::has_many("badges", "Badge"))
                    .with_association(AssociationDef::belongs_to_many("tags", "Tag", "UserTag")),
            )
            .unwrap();
        registry
            .register(
                ModelDef::new("Post")
                    .with_attribute(AttributeDef::identity("id"))
                    .with_attribute(AttributeDef::optional("writerId", DataType::Integer))
                    .with_association(
                        AssociationDef::belongs_to("author", "User").with_foreign_key("writerId"),
                    ),
            )
            .unwrap();
        registry
    }

    #[test]
    fn test_register_and_lookup() {
        let registry = registry();
        assert!(registry.contains("User"));
        assert_eq!(registry.model_names(), vec!["Post", "User"]);
        assert_eq!(registry.attributes("Post").unwrap().len(), 2);
        assert_eq!(registry.associations("User").unwrap()[0].key, "mentor");
        assert_eq!(
            registry.model("Nope").unwrap_err(),
            CatalogError::UnknownModel("Nope".into())
        );
    }

    #[test]
    fn test_duplicate_registration() {
        let registry = registry();
        let err = registry
            .register(ModelDef::new("Post").with_attribute(AttributeDef::identity("id")))
            .unwrap_err();
        assert_eq!(err, CatalogError::DuplicateModel("Post".into()));
    }

    #[test]
    fn test_foreign_key_resolution() {
        let registry = registry();
        let user = registry.model("User").unwrap();

        let mentor = user.association("mentor").unwrap();
        assert_eq!(registry.foreign_key(&user, mentor), "mentorId");

        // back-reference on the same model
        let mentee = user.association("mentee").unwrap();
        assert_eq!(registry.foreign_key(&user, mentee), "mentorId");

        // back-reference with a declared foreign key
        let posts = user.association("posts").unwrap();
        assert_eq!(registry.foreign_key(&user, posts), "writerId");

        // unregistered target falls back to the default
        let badges = user.association("badges").unwrap();
        assert_eq!(registry.foreign_key(&user, badges), "UserId");

        let tags = user.association("tags").unwrap();
        assert_eq!(registry.foreign_key(&user, tags), "UserId");
        assert_eq!(registry.other_key(tags), "TagId");
    }

    #[test]
    fn test_unresolved_target() {
        let registry = registry();
        let user = registry.model("User").unwrap();
        let badges = user.association("badges").unwrap();
        assert_eq!(
            registry.resolve_target(&user, badges).unwrap_err(),
            AssociationError::UnresolvedTarget {
                model: "User".into(),
                key: "badges".into(),
                target: "Badge".into(),
            }
        );
    }
}
