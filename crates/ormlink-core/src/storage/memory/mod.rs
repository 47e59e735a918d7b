//! In-memory storage adapter.
//!
//! A complete [`StorageEngine`] over process memory, for tests and for
//! embedding without a database. It enforces not-null, string-type, and
//! unique constraints, evaluates the filter operators that make sense
//! without SQL, eager-loads all four association kinds, and supports
//! soft delete for paranoid models.
//!
//! Transactions are snapshots: `begin` copies the store and `rollback`
//! restores the copy. Concurrent transactions are not isolated from each
//! other.

mod filter;
mod instance;
mod store;

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use tracing::{debug, instrument, warn};

use ormlink_proto::{
    AggregateFunction, DestroyOptions, FindOptions, IncludeOptions, Record, TableOptions,
    Transaction, UpdateOptions, WriteOptions,
};

use self::filter::{values_equal, WhereEvaluator};
use self::store::{aggregate, primary_key, project, sort_records, Row, Store};
use super::{AssociationTarget, Instance, StorageEngine, StorageError};
use crate::catalog::{AssociationDef, AssociationKind, ModelDef, Registry};

pub use self::instance::MemoryInstance;

type Related = BTreeMap<String, AssociationTarget<MemoryInstance>>;

#[derive(Debug, Default)]
struct State {
    store: Store,
    snapshots: HashMap<u64, Store>,
    next_tx: u64,
}

/// State shared by the engine and every instance it hands out.
#[derive(Debug)]
pub(crate) struct Shared {
    registry: Arc<Registry>,
    state: Mutex<State>,
}

impl Shared {
    fn model(&self, name: &str) -> Result<Arc<ModelDef>, StorageError> {
        self.registry
            .model(name)
            .map_err(|_| StorageError::UnknownModel(name.to_string()))
    }

    /// Live rows matching `options`, sorted, paged, eager-loaded, projected.
    fn select(
        self: &Arc<Self>,
        store: &Store,
        model: &Arc<ModelDef>,
        options: &FindOptions,
    ) -> Result<Vec<MemoryInstance>, StorageError> {
        if options.group.is_some() {
            return Err(StorageError::Unsupported("grouping".to_string()));
        }
        let Some(table) = store.table(&model.name) else {
            return Ok(Vec::new());
        };

        let mut matched = Vec::new();
        for row in table.live() {
            if !WhereEvaluator::matches(&options.filter, &row.data)? {
                continue;
            }
            if let Some(related) = self.load(store, model, &row.data, options.includes(), true)? {
                matched.push((row.data.clone(), related));
            }
        }
        sort_records(&mut matched, options.order.as_deref().unwrap_or_default())?;

        let offset = options.offset.unwrap_or(0) as usize;
        let limit = options.limit.map_or(usize::MAX, |l| l as usize);
        matched
            .into_iter()
            .skip(offset)
            .take(limit)
            .map(|(data, related)| {
                let data = project(data, options.attributes.as_deref())?;
                Ok(MemoryInstance::loaded(self.clone(), model.clone(), data, related))
            })
            .collect()
    }

    /// Eager-load `includes` for one row.
    ///
    /// Returns `None` when `enforce_required` is set and a required include
    /// found nothing.
    fn load(
        self: &Arc<Self>,
        store: &Store,
        model: &ModelDef,
        data: &Record,
        includes: &[IncludeOptions],
        enforce_required: bool,
    ) -> Result<Option<Related>, StorageError> {
        let mut related = Related::new();
        for include in includes {
            let association = model.association(&include.alias).ok_or_else(|| {
                StorageError::Unsupported(format!(
                    "model '{}' has no association '{}'",
                    model.name, include.alias
                ))
            })?;
            let target = self.model(&include.model)?;

            let mut loaded = Vec::new();
            for row in self.associated_rows(store, model, association, &target, data)? {
                if let Some(filter) = &include.filter {
                    if !WhereEvaluator::matches(filter, &row)? {
                        continue;
                    }
                }
                let Some(nested) = self.load(store, &target, &row, include.children(), true)? else {
                    continue;
                };
                let row = project(row, include.attributes.as_deref())?;
                loaded.push(MemoryInstance::loaded(self.clone(), target.clone(), row, nested));
            }

            if enforce_required && include.required && loaded.is_empty() {
                return Ok(None);
            }
            let value = if association.kind.is_to_many() {
                AssociationTarget::Many(loaded)
            } else {
                loaded
                    .into_iter()
                    .next()
                    .map_or(AssociationTarget::None, AssociationTarget::One)
            };
            related.insert(include.alias.clone(), value);
        }
        Ok(Some(related))
    }

    fn associated_rows(
        &self,
        store: &Store,
        source: &ModelDef,
        association: &AssociationDef,
        target: &ModelDef,
        data: &Record,
    ) -> Result<Vec<Record>, StorageError> {
        let Some(table) = store.table(&target.name) else {
            return Ok(Vec::new());
        };
        let target_pk = primary_key(target)?;
        let fk = self.registry.foreign_key(source, association);
        let source_pk = data
            .get(primary_key(source)?)
            .filter(|v| !v.is_null());

        let rows = match association.kind {
            AssociationKind::BelongsTo => match data.get(&fk).filter(|v| !v.is_null()) {
                Some(key) => table.live_where(target_pk, key).map(|r| r.data.clone()).collect(),
                None => Vec::new(),
            },
            AssociationKind::HasOne | AssociationKind::HasMany => match source_pk {
                Some(pk) => table.live_where(&fk, pk).map(|r| r.data.clone()).collect(),
                None => Vec::new(),
            },
            AssociationKind::BelongsToMany => {
                let (Some(pk), Some(through)) = (source_pk, association.through.as_deref()) else {
                    return Ok(Vec::new());
                };
                let other_key = self.registry.other_key(association);
                let linked: Vec<Value> = store
                    .table(through)
                    .map(|links| {
                        links
                            .live_where(&fk, pk)
                            .filter_map(|link| link.data.get(&other_key).cloned())
                            .collect()
                    })
                    .unwrap_or_default();
                table
                    .live()
                    .filter(|row| {
                        row.data
                            .get(target_pk)
                            .is_some_and(|key| linked.iter().any(|l| values_equal(key, l)))
                    })
                    .map(|r| r.data.clone())
                    .collect()
            }
        };
        Ok(rows)
    }

    /// Point association `alias` of the row `source` at `target`.
    fn link(
        &self,
        model: &ModelDef,
        source: &mut Record,
        alias: &str,
        target: &AssociationTarget<MemoryInstance>,
    ) -> Result<(), StorageError> {
        let association = model.association(alias).ok_or_else(|| {
            StorageError::Unsupported(format!(
                "model '{}' has no association '{alias}'",
                model.name
            ))
        })?;
        let target_model = self.model(&association.target)?;
        let target_pk = primary_key(&target_model)?;
        let fk = self.registry.foreign_key(model, association);
        let keys = target
            .iter()
            .map(|item| persisted_key(item, target_pk))
            .collect::<Result<Vec<_>, _>>()?;

        let mut state = self.state.lock();
        let store = &mut state.store;

        if association.kind == AssociationKind::BelongsTo {
            let value = keys.into_iter().next().unwrap_or(Value::Null);
            source.insert(fk, value);
            let pk = persisted_key_of(model, source)?;
            let table = store.table_mut(&model.name);
            let index = table.position(model, &pk)?.ok_or(StorageError::NotFound)?;
            table.update_at(model, index, source, false)?;
            return Ok(());
        }

        let source_pk = persisted_key_of(model, source)?;
        match association.kind {
            AssociationKind::HasOne | AssociationKind::HasMany => {
                let table = store.table_mut(&target_model.name);
                for row in table.rows.iter_mut() {
                    let wanted = row
                        .data
                        .get(target_pk)
                        .is_some_and(|pk| keys.iter().any(|k| values_equal(pk, k)));
                    let points_here = row
                        .data
                        .get(&fk)
                        .is_some_and(|v| values_equal(v, &source_pk));
                    if wanted {
                        row.data.insert(fk.clone(), source_pk.clone());
                    } else if points_here {
                        row.data.insert(fk.clone(), Value::Null);
                    }
                }
            }
            _ => {
                let through = association.through.as_deref().ok_or_else(|| {
                    StorageError::Unsupported(format!("association '{alias}' has no join table"))
                })?;
                let other_key = self.registry.other_key(association);
                let links = store.table_mut(through);
                links.rows.retain(|row| {
                    !row.data
                        .get(&fk)
                        .is_some_and(|v| values_equal(v, &source_pk))
                });
                for key in keys {
                    let mut link = Record::new();
                    link.insert(fk.clone(), source_pk.clone());
                    link.insert(other_key.clone(), key);
                    links.rows.push(Row::new(link));
                }
            }
        }
        Ok(())
    }
}

fn persisted_key(item: &MemoryInstance, pk: &str) -> Result<Value, StorageError> {
    match item.get(pk) {
        Some(value) if !value.is_null() && !item.is_new_record() => Ok(value.clone()),
        _ => Err(StorageError::Database(format!(
            "associated {} row is not persisted",
            item.model_name()
        ))),
    }
}

fn persisted_key_of(model: &ModelDef, data: &Record) -> Result<Value, StorageError> {
    match data.get(primary_key(model)?) {
        Some(value) if !value.is_null() => Ok(value.clone()),
        _ => Err(StorageError::Database(format!(
            "{} row is not persisted",
            model.name
        ))),
    }
}

/// In-memory storage adapter.
#[derive(Debug, Clone)]
pub struct MemoryEngine {
    shared: Arc<Shared>,
}

impl MemoryEngine {
    /// Create an empty store over the models in `registry`.
    pub fn new(registry: Arc<Registry>) -> Self {
        Self {
            shared: Arc::new(Shared {
                registry,
                state: Mutex::new(State::default()),
            }),
        }
    }

    /// Registry the engine resolves associations against.
    pub fn registry(&self) -> &Arc<Registry> {
        &self.shared.registry
    }

    /// Number of stored rows for `model`, soft-deleted rows included.
    pub fn stored_rows(&self, model: &str) -> usize {
        let state = self.shared.state.lock();
        state.store.table(model).map_or(0, |t| t.rows.len())
    }

    fn instance(&self, model: &ModelDef, data: Record) -> Result<MemoryInstance, StorageError> {
        let model = self.shared.model(&model.name)?;
        Ok(MemoryInstance::loaded(
            self.shared.clone(),
            model,
            data,
            Related::new(),
        ))
    }
}

#[async_trait]
impl StorageEngine for MemoryEngine {
    type Instance = MemoryInstance;

    fn build(
        &self,
        model: &ModelDef,
        data: Record,
        is_new: bool,
    ) -> Result<MemoryInstance, StorageError> {
        let model = self.shared.model(&model.name)?;
        Ok(MemoryInstance::built(self.shared.clone(), model, data, is_new))
    }

    #[instrument(skip(self, model, options), fields(model = %model.name))]
    async fn find_all(
        &self,
        model: &ModelDef,
        options: &FindOptions,
    ) -> Result<Vec<MemoryInstance>, StorageError> {
        let model = self.shared.model(&model.name)?;
        let state = self.shared.state.lock();
        let rows = self.shared.select(&state.store, &model, options)?;
        debug!(rows = rows.len(), "find_all");
        Ok(rows)
    }

    async fn find_one(
        &self,
        model: &ModelDef,
        options: &FindOptions,
    ) -> Result<Option<MemoryInstance>, StorageError> {
        let options = options.clone().with_limit(1);
        Ok(self.find_all(model, &options).await?.into_iter().next())
    }

    async fn count(&self, model: &ModelDef, options: &FindOptions) -> Result<u64, StorageError> {
        let mut options = options.clone();
        options.attributes = None;
        Ok(self.find_all(model, &options).await?.len() as u64)
    }

    async fn aggregate(
        &self,
        model: &ModelDef,
        attribute: &str,
        function: AggregateFunction,
        options: &FindOptions,
    ) -> Result<Value, StorageError> {
        let mut options = options.clone();
        options.attributes = None;
        let rows = self.find_all(model, &options).await?;
        Ok(aggregate(
            rows.iter().filter_map(|row| row.get(attribute)),
            function,
        ))
    }

    #[instrument(skip(self, model, data, options), fields(model = %model.name))]
    async fn create(
        &self,
        model: &ModelDef,
        data: Record,
        options: WriteOptions,
    ) -> Result<MemoryInstance, StorageError> {
        let stored = {
            let mut state = self.shared.state.lock();
            state
                .store
                .table_mut(&model.name)
                .insert(model, &data, options.validate)?
        };
        debug!("row created");
        self.instance(model, stored)
    }

    async fn bulk_create(
        &self,
        model: &ModelDef,
        rows: Vec<Record>,
        options: WriteOptions,
    ) -> Result<Vec<MemoryInstance>, StorageError> {
        let stored = {
            let mut state = self.shared.state.lock();
            let table = state.store.table_mut(&model.name);
            let backup = table.clone();
            let mut stored = Vec::with_capacity(rows.len());
            for row in &rows {
                match table.insert(model, row, options.validate) {
                    Ok(record) => stored.push(record),
                    Err(err) => {
                        *table = backup;
                        return Err(err);
                    }
                }
            }
            stored
        };
        stored
            .into_iter()
            .map(|data| self.instance(model, data))
            .collect()
    }

    #[instrument(skip(self, model, values, options), fields(model = %model.name))]
    async fn update(
        &self,
        model: &ModelDef,
        values: Record,
        options: &UpdateOptions,
    ) -> Result<u64, StorageError> {
        let mut state = self.shared.state.lock();
        let table = state.store.table_mut(&model.name);
        let indices = table.matching(&options.filter, false, options.limit)?;
        table.update_many(model, &indices, &values, options.validate)?;
        debug!(affected = indices.len(), "rows updated");
        Ok(indices.len() as u64)
    }

    async fn upsert(
        &self,
        model: &ModelDef,
        values: Record,
        options: WriteOptions,
    ) -> Result<(MemoryInstance, bool), StorageError> {
        let pk_name = primary_key(model)?;
        let (stored, created) = {
            let mut state = self.shared.state.lock();
            let table = state.store.table_mut(&model.name);
            let existing = match values.get(pk_name).filter(|v| !v.is_null()) {
                Some(pk) => table.position(model, pk)?,
                None => None,
            };
            match existing {
                Some(index) => (table.update_at(model, index, &values, options.validate)?, false),
                None => (table.insert(model, &values, options.validate)?, true),
            }
        };
        Ok((self.instance(model, stored)?, created))
    }

    #[instrument(skip(self, model, options), fields(model = %model.name, force = options.force))]
    async fn destroy(
        &self,
        model: &ModelDef,
        options: &DestroyOptions,
    ) -> Result<u64, StorageError> {
        let mut state = self.shared.state.lock();
        let table = state.store.table_mut(&model.name);
        let indices = table.matching(&options.filter, false, options.limit)?;
        if model.paranoid && !options.force {
            for &index in &indices {
                table.rows[index].deleted = true;
            }
        } else {
            for &index in indices.iter().rev() {
                table.rows.remove(index);
            }
        }
        debug!(affected = indices.len(), "rows destroyed");
        Ok(indices.len() as u64)
    }

    async fn restore(
        &self,
        model: &ModelDef,
        options: &DestroyOptions,
    ) -> Result<u64, StorageError> {
        if !model.paranoid {
            return Ok(0);
        }
        let mut state = self.shared.state.lock();
        let table = state.store.table_mut(&model.name);
        let indices = table.matching(&options.filter, true, options.limit)?;
        for &index in &indices {
            table.rows[index].deleted = false;
        }
        Ok(indices.len() as u64)
    }

    async fn truncate(&self, model: &ModelDef, _options: TableOptions) -> Result<(), StorageError> {
        let mut state = self.shared.state.lock();
        state.store.table_mut(&model.name).rows.clear();
        Ok(())
    }

    async fn drop_table(
        &self,
        model: &ModelDef,
        _options: TableOptions,
    ) -> Result<(), StorageError> {
        let mut state = self.shared.state.lock();
        state.store.drop_table(&model.name);
        Ok(())
    }

    async fn begin(&self) -> Result<Transaction, StorageError> {
        let mut state = self.shared.state.lock();
        state.next_tx += 1;
        let id = state.next_tx;
        let snapshot = state.store.clone();
        state.snapshots.insert(id, snapshot);
        debug!(tx = id, "transaction started");
        Ok(Transaction::new(id))
    }

    async fn commit(&self, transaction: Transaction) -> Result<(), StorageError> {
        let mut state = self.shared.state.lock();
        state
            .snapshots
            .remove(&transaction.id())
            .map(|_| debug!(tx = transaction.id(), "transaction committed"))
            .ok_or_else(|| unknown_transaction(transaction))
    }

    async fn rollback(&self, transaction: Transaction) -> Result<(), StorageError> {
        let mut state = self.shared.state.lock();
        let snapshot = state
            .snapshots
            .remove(&transaction.id())
            .ok_or_else(|| unknown_transaction(transaction))?;
        if !state.snapshots.is_empty() {
            warn!(
                tx = transaction.id(),
                open = state.snapshots.len(),
                "rolling back while other transactions are open"
            );
        }
        state.store = snapshot;
        debug!(tx = transaction.id(), "transaction rolled back");
        Ok(())
    }
}

fn unknown_transaction(transaction: Transaction) -> StorageError {
    StorageError::Transaction(format!("unknown transaction {}", transaction.id()))
}
