//! Typed model binding.

use super::model::ModelDef;

/// A Rust type bound to a registered model.
///
/// `Fields` is a plain struct of [`Queryable`](crate::query::Queryable) and
/// [`Association`](crate::query::Association) handles, one per attribute and
/// association. Query builders hand it to selector closures, so a predicate
/// over a missing attribute, or one comparing values of the wrong type, does
/// not compile.
///
/// ```
/// use ormlink_core::{AttributeDef, DataType, Entity, ModelDef, Queryable};
///
/// struct Tag;
///
/// struct TagFields {
///     id: Queryable<i64>,
///     label: Queryable<String>,
/// }
///
/// impl Entity for Tag {
///     const NAME: &'static str = "Tag";
///     type Fields = TagFields;
///
///     fn model() -> ModelDef {
///         ModelDef::new(Self::NAME)
///             .with_attribute(AttributeDef::identity("id"))
///             .with_attribute(AttributeDef::new("label", DataType::String))
///     }
///
///     fn fields() -> TagFields {
///         TagFields {
///             id: Queryable::attribute("id"),
///             label: Queryable::attribute("label"),
///         }
///     }
/// }
///
/// let predicate = Tag::fields().label.eq("rust");
/// assert_eq!(predicate.to_value(), serde_json::json!({ "label": "rust" }));
/// ```
pub trait Entity: Send + Sync + 'static {
    /// Registered model name.
    const NAME: &'static str;

    /// Typed attribute and association handles.
    type Fields;

    /// Descriptor to register for this model.
    fn model() -> ModelDef;

    /// Fresh set of field handles.
    fn fields() -> Self::Fields;
}
