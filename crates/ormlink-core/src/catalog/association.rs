//! Association definitions between models.

/// Kind of association, seen from the declaring (source) model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssociationKind {
    /// Source holds the foreign key to one target.
    BelongsTo,
    /// Target holds the foreign key back to one source.
    HasOne,
    /// Target rows hold the foreign key back to the source.
    HasMany,
    /// Source and target are linked through a join table.
    BelongsToMany,
}

impl AssociationKind {
    /// Whether the association holds a list of targets.
    pub fn is_to_many(self) -> bool {
        matches!(self, AssociationKind::HasMany | AssociationKind::BelongsToMany)
    }

    /// Whether the foreign key lives on the target model.
    pub fn is_owned_by_target(self) -> bool {
        matches!(self, AssociationKind::HasOne | AssociationKind::HasMany)
    }
}

/// An association declared on a source model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssociationDef {
    /// Association key on the source model.
    pub key: String,
    /// Association kind.
    pub kind: AssociationKind,
    /// Target model name, resolved lazily through the registry.
    pub target: String,
    /// Explicit foreign key name.
    ///
    /// BelongsTo: the column on the source. HasOne/HasMany: the column on the
    /// target. BelongsToMany: the join-table column pointing at the source.
    pub foreign_key: Option<String>,
    /// Join-table column pointing at the target (BelongsToMany only).
    pub other_key: Option<String>,
    /// Join table name (BelongsToMany only).
    pub through: Option<String>,
    /// Alias the association is included under, when it differs from the key.
    pub alias: Option<String>,
}

impl AssociationDef {
    fn new(key: impl Into<String>, kind: AssociationKind, target: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            kind,
            target: target.into(),
            foreign_key: None,
            other_key: None,
            through: None,
            alias: None,
        }
    }

    /// Create a belongs-to association.
    pub fn belongs_to(key: impl Into<String>, target: impl Into<String>) -> Self {
        Self::new(key, AssociationKind::BelongsTo, target)
    }

    /// Create a has-one association.
    pub fn has_one(key: impl Into<String>, target: impl Into<String>) -> Self {
        Self::new(key, AssociationKind::HasOne, target)
    }

    /// Create a has-many association.
    pub fn has_many(key: impl Into<String>, target: impl Into<String>) -> Self {
        Self::new(key, AssociationKind::HasMany, target)
    }

    /// Create a many-to-many association through a join table.
    pub fn belongs_to_many(
        key: impl Into<String>,
        target: impl Into<String>,
        through: impl Into<String>,
    ) -> Self {
        Self {
            through: Some(through.into()),
            ..Self::new(key, AssociationKind::BelongsToMany, target)
        }
    }

    /// Set the foreign key name.
    pub fn with_foreign_key(mut self, foreign_key: impl Into<String>) -> Self {
        self.foreign_key = Some(foreign_key.into());
        self
    }

    /// Set the join-table column pointing at the target.
    pub fn with_other_key(mut self, other_key: impl Into<String>) -> Self {
        self.other_key = Some(other_key.into());
        self
    }

    /// Set the include alias.
    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    /// The alias includes use: the declared alias, or the key.
    pub fn canonical_alias(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.key)
    }

    /// Whether `name` refers to this association by key or alias.
    pub fn answers_to(&self, name: &str) -> bool {
        self.key == name || self.canonical_alias() == name
    }
}
