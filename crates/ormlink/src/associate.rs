//! Association persistence.
//!
//! After a root row is written, every include attached to the operation's
//! query is walked in declaration order and the association values supplied
//! in the input are written through the engine's association setter. Nested
//! rows that need it are saved first; their own includes are handled
//! recursively so failures carry a dotted path such as `mentor.mentee.email`.

use futures::future::{BoxFuture, FutureExt};
use ormlink_core::proto::{Record, ReloadOptions, Value};
use ormlink_core::query::compile_include_specs;
use ormlink_core::{
    include_depth, AssociationKind, AssociationTarget, Error, IncludeSpec, Instance, ModelDef,
    Registry, StorageEngine,
};
use tracing::{debug, trace};

use crate::config::PersistOptions;
use crate::partial::{AssociationValue, Partial, Related};

/// Which write produced the root row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// The root row was just inserted.
    Create,
    /// The root row already existed.
    Update,
}

/// Writes association values for a persisted root row.
pub struct AssociationEngine<'a, E: StorageEngine> {
    engine: &'a E,
    registry: &'a Registry,
}

impl<'a, E: StorageEngine> AssociationEngine<'a, E> {
    /// Create an engine over a storage adapter and its registry.
    pub fn new(engine: &'a E, registry: &'a Registry) -> Self {
        Self { engine, registry }
    }

    /// Persist the association values of `values` for each include, then
    /// reload `instance` with the include tree.
    ///
    /// Does nothing, and skips the reload, when `includes` is empty.
    pub fn persist<'s>(
        &'s self,
        model: &'s ModelDef,
        instance: &'s mut E::Instance,
        values: &'s Partial<E::Instance>,
        includes: &'s [IncludeSpec],
        mode: WriteMode,
        options: &'s PersistOptions,
    ) -> BoxFuture<'s, Result<(), Error>> {
        async move {
            if includes.is_empty() {
                return Ok(());
            }
            let pk_name = model.primary_key_name()?;

            for spec in includes {
                let Some(value) = values.association(&spec.alias) else {
                    trace!(alias = %spec.alias, "association value undefined");
                    continue;
                };
                let Some(association) = model.association(&spec.alias) else {
                    debug!(model = %model.name, alias = %spec.alias, "no association for include");
                    continue;
                };
                let target = match self.registry.resolve_target(model, association) {
                    Ok(target) => target,
                    Err(err) => {
                        debug!(error = %err, "association target unresolved");
                        continue;
                    }
                };
                let fk = self.registry.foreign_key(model, association);

                if association.kind == AssociationKind::BelongsTo
                    && values.fields.get(&fk).is_some_and(|v| !v.is_null())
                {
                    trace!(alias = %spec.alias, fk = %fk, "foreign key written with the row");
                    continue;
                }

                if let AssociationValue::Null = value {
                    let cleared = if association.kind.is_to_many() {
                        AssociationTarget::Many(Vec::new())
                    } else {
                        AssociationTarget::None
                    };
                    instance
                        .set_association(&spec.alias, cleared, options.transaction)
                        .await
                        .map_err(|err| Error::from_storage(err, model))?;
                    debug!(alias = %spec.alias, "association cleared");
                    continue;
                }

                let stamp = match (mode, association.kind) {
                    (WriteMode::Create, AssociationKind::HasOne | AssociationKind::HasMany) => {
                        instance.get(pk_name).filter(|v| !v.is_null()).cloned()
                    }
                    _ => None,
                };
                let stamp = stamp.as_ref().map(|pk| (fk.as_str(), pk));

                let mut items = Vec::with_capacity(value.items().len());
                for item in value.items() {
                    items.push(self.coerce(&target, spec, item, stamp, options).await?);
                }
                let linked = if association.kind.is_to_many() {
                    AssociationTarget::Many(items)
                } else {
                    items
                        .into_iter()
                        .next()
                        .map_or(AssociationTarget::None, AssociationTarget::One)
                };
                instance
                    .set_association(&spec.alias, linked, options.transaction)
                    .await
                    .map_err(|err| Error::from_storage(err, model))?;
            }

            let include = compile_include_specs(includes);
            instance
                .reload(ReloadOptions::new(include, options.transaction))
                .await
                .map_err(|err| Error::from_storage(err, model))?;
            debug!(model = %model.name, includes = includes.len(), "associations persisted");
            Ok(())
        }
        .boxed()
    }

    /// Turn one supplied item into an engine row, saving it when needed.
    async fn coerce(
        &self,
        target: &ModelDef,
        spec: &IncludeSpec,
        item: &Related<E::Instance>,
        stamp: Option<(&str, &Value)>,
        options: &PersistOptions,
    ) -> Result<E::Instance, Error> {
        let pk_name = target.primary_key_name()?;
        let (mut row, plain) = match item {
            Related::Instance(existing) => {
                let mut existing = existing.clone();
                if let Some((fk, pk)) = stamp {
                    existing.set(fk, pk.clone());
                }
                let plain = existing.to_plain_object(include_depth(spec.children()));
                (existing, plain)
            }
            Related::Plain(record) => {
                let mut record = record.clone();
                if let Some((fk, pk)) = stamp {
                    record.insert(fk.to_string(), pk.clone());
                }
                let is_new = record.get(pk_name).map_or(true, Value::is_null);
                let fields = Partial::<E::Instance>::from_record(target, record.clone()).fields;
                let row = self
                    .engine
                    .build(target, fields, is_new)
                    .map_err(|err| Error::from_storage(err, target))?;
                (row, record)
            }
            // A bare key names an existing row; the setter links it.
            Related::Key(key) => {
                let mut record = Record::new();
                record.insert(pk_name.to_string(), key.clone());
                let row = self
                    .engine
                    .build(target, record.clone(), false)
                    .map_err(|err| Error::from_storage(err, target))?;
                (row, record)
            }
        };

        let was_new = row.is_new_record();
        let has_data = plain.keys().any(|key| key != pk_name);
        if !was_new && (spec.associate_only || !has_data) {
            trace!(alias = %spec.alias, "attach only");
            return Ok(row);
        }

        row.save(options.write_options())
            .await
            .map_err(|err| Error::from_storage_prefixed(err, target, Some(spec.alias.as_str())))?;
        trace!(alias = %spec.alias, created = was_new, "nested row saved");

        let nested = Partial::from_record(target, plain);
        if nested.has_associations() && !spec.children().is_empty() {
            let mode = if was_new {
                WriteMode::Create
            } else {
                WriteMode::Update
            };
            self.persist(target, &mut row, &nested, spec.children(), mode, options)
                .await
                .map_err(|err| err.with_prefix(&spec.alias))?;
        }
        Ok(row)
    }
}
