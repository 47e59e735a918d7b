//! Repository: the query API over one entity and one storage engine.

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use ormlink_core::proto::value::is_operator_map;
use ormlink_core::proto::{
    AggregateFunction, DestroyOptions, FindOptions, Op, TableOptions, Transaction, UpdateOptions,
    Value,
};
use ormlink_core::{Entity, Error, ModelDef, Query, Registry, StorageEngine, StorageError, Where};
use tracing::{debug, instrument, warn};

use crate::associate::{AssociationEngine, WriteMode};
use crate::config::{PersistOptions, ReadbackMode, RepositoryConfig};
use crate::partial::Partial;

/// Reads and writes rows of entity `T` through engine `E`.
///
/// Every operation takes a [`Query`] for scoping: reads use all of it, writes
/// use its filter for targeting and its includes to decide which association
/// values in the input are persisted.
pub struct Repository<T: Entity, E: StorageEngine> {
    engine: Arc<E>,
    registry: Arc<Registry>,
    model: Arc<ModelDef>,
    config: RepositoryConfig,
    _entity: PhantomData<fn() -> T>,
}

impl<T: Entity, E: StorageEngine> Clone for Repository<T, E> {
    fn clone(&self) -> Self {
        Self {
            engine: self.engine.clone(),
            registry: self.registry.clone(),
            model: self.model.clone(),
            config: self.config,
            _entity: PhantomData,
        }
    }
}

impl<T: Entity, E: StorageEngine> fmt::Debug for Repository<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Repository")
            .field("model", &self.model.name)
            .field("config", &self.config)
            .finish()
    }
}

impl<T: Entity, E: StorageEngine> Repository<T, E> {
    /// Create a repository for a registered entity.
    pub fn new(engine: Arc<E>, registry: Arc<Registry>) -> Result<Self, Error> {
        let model = registry.model(T::NAME)?;
        Ok(Self {
            engine,
            registry,
            model,
            config: RepositoryConfig::default(),
            _entity: PhantomData,
        })
    }

    /// Replace the configuration.
    pub fn with_config(mut self, config: RepositoryConfig) -> Self {
        self.config = config;
        self
    }

    /// An empty query on this entity.
    pub fn query(&self) -> Result<Query<T>, Error> {
        Query::new(self.registry.clone())
    }

    /// The storage engine.
    pub fn engine(&self) -> &Arc<E> {
        &self.engine
    }

    /// The entity's model descriptor.
    pub fn model(&self) -> &ModelDef {
        &self.model
    }

    /// The configuration.
    pub fn config(&self) -> &RepositoryConfig {
        &self.config
    }

    // Reads

    /// All rows matching the query.
    pub async fn find_all(&self, query: &Query<T>) -> Result<Vec<E::Instance>, Error> {
        let options = query.compile_find_options()?;
        self.engine
            .find_all(&self.model, &options)
            .await
            .map_err(|err| self.storage_error(err))
    }

    /// The first row matching the query.
    pub async fn find_one(&self, query: &Query<T>) -> Result<Option<E::Instance>, Error> {
        let options = query.compile_find_options()?;
        self.engine
            .find_one(&self.model, &options)
            .await
            .map_err(|err| self.storage_error(err))
    }

    /// The row with primary key `id`, within the query's scope.
    pub async fn find_by_id(
        &self,
        query: &Query<T>,
        id: impl Into<Value>,
    ) -> Result<Option<E::Instance>, Error> {
        let scoped = self.by_primary_key(query, id.into())?;
        self.find_one(&scoped).await
    }

    /// Number of rows matching the query.
    pub async fn count(&self, query: &Query<T>) -> Result<u64, Error> {
        let options = query.compile_find_options()?;
        self.engine
            .count(&self.model, &options)
            .await
            .map_err(|err| self.storage_error(err))
    }

    /// Aggregate `attribute` over the rows matching the query.
    pub async fn aggregate(
        &self,
        query: &Query<T>,
        attribute: &str,
        function: AggregateFunction,
    ) -> Result<Value, Error> {
        let options = query.compile_find_options()?;
        self.engine
            .aggregate(&self.model, attribute, function, &options)
            .await
            .map_err(|err| self.storage_error(err))
    }

    /// Smallest value of `attribute`.
    pub async fn min(&self, query: &Query<T>, attribute: &str) -> Result<Value, Error> {
        self.aggregate(query, attribute, AggregateFunction::Min).await
    }

    /// Largest value of `attribute`.
    pub async fn max(&self, query: &Query<T>, attribute: &str) -> Result<Value, Error> {
        self.aggregate(query, attribute, AggregateFunction::Max).await
    }

    /// Sum of `attribute`.
    pub async fn sum(&self, query: &Query<T>, attribute: &str) -> Result<Value, Error> {
        self.aggregate(query, attribute, AggregateFunction::Sum).await
    }

    // Writes

    /// Find the first matching row, or create one.
    ///
    /// The created row starts from `defaults`; every literal equality in the
    /// query's filter is applied on top, so the new row matches the query.
    /// Returns the row and whether it was created.
    #[instrument(skip(self, query, defaults, options), fields(model = %self.model.name))]
    pub async fn find_or_create(
        &self,
        query: &Query<T>,
        defaults: Partial<E::Instance>,
        options: &PersistOptions,
    ) -> Result<(E::Instance, bool), Error> {
        let find = query
            .compile_find_options()?
            .with_transaction(options.transaction);
        let found = self
            .engine
            .find_one(&self.model, &find)
            .await
            .map_err(|err| self.storage_error(err))?;
        if let Some(row) = found {
            return Ok((row, false));
        }

        let mut values = defaults;
        for (key, value) in query.compile_wheres() {
            if key.starts_with('$') || is_operator_map(&value) {
                continue;
            }
            values.fields.insert(key, value);
        }
        debug!("no match, creating");
        let row = self.create(query, values, options).await?;
        Ok((row, true))
    }

    /// Insert one row, then persist its association values.
    #[instrument(skip(self, query, values, options), fields(model = %self.model.name))]
    pub async fn create(
        &self,
        query: &Query<T>,
        values: Partial<E::Instance>,
        options: &PersistOptions,
    ) -> Result<E::Instance, Error> {
        let mut row = self
            .engine
            .create(&self.model, values.fields.clone(), options.write_options())
            .await
            .map_err(|err| self.storage_error(err))?;
        if options.associate {
            self.associations()
                .persist(
                    &self.model,
                    &mut row,
                    &values,
                    query.includes(),
                    WriteMode::Create,
                    options,
                )
                .await?;
        }
        Ok(row)
    }

    /// Insert many rows in one engine call, then persist association values
    /// row by row.
    #[instrument(skip_all, fields(model = %self.model.name, rows = values.len()))]
    pub async fn bulk_create(
        &self,
        query: &Query<T>,
        values: Vec<Partial<E::Instance>>,
        options: &PersistOptions,
    ) -> Result<Vec<E::Instance>, Error> {
        let records = values.iter().map(|v| v.fields.clone()).collect();
        let mut rows = self
            .engine
            .bulk_create(&self.model, records, options.write_options())
            .await
            .map_err(|err| self.storage_error(err))?;
        if options.associate && !query.includes().is_empty() {
            let associations = self.associations();
            for (row, partial) in rows.iter_mut().zip(&values) {
                associations
                    .persist(
                        &self.model,
                        row,
                        partial,
                        query.includes(),
                        WriteMode::Create,
                        options,
                    )
                    .await?;
            }
        }
        Ok(rows)
    }

    /// Update the rows matching the query and return them as re-read.
    ///
    /// The engine reports only a count, so the rows are fetched again with
    /// the same filter and limit, and association values are persisted for
    /// each. With [`ReadbackMode::Detached`] the write and the read are not
    /// atomic. With [`ReadbackMode::Transactional`] and no caller
    /// transaction, both run in a transaction opened here.
    #[instrument(skip(self, query, values, options), fields(model = %self.model.name))]
    pub async fn update(
        &self,
        query: &Query<T>,
        values: Partial<E::Instance>,
        options: &PersistOptions,
    ) -> Result<Vec<E::Instance>, Error> {
        if self.config.readback == ReadbackMode::Detached || options.transaction.is_some() {
            return self.update_rows(query, &values, options).await;
        }

        let tx = self.transaction().await?;
        let scoped = options.with_transaction(tx);
        match self.update_rows(query, &values, &scoped).await {
            Ok(rows) => {
                self.commit(tx).await?;
                Ok(rows)
            }
            Err(err) => {
                if let Err(rollback) = self.rollback(tx).await {
                    warn!(error = %rollback, "rollback after failed update failed");
                }
                Err(err)
            }
        }
    }

    async fn update_rows(
        &self,
        query: &Query<T>,
        values: &Partial<E::Instance>,
        options: &PersistOptions,
    ) -> Result<Vec<E::Instance>, Error> {
        let filter = query.compile_wheres();
        let limit = Some(query.descriptor().taken()).filter(|n| *n > 0);

        if !values.fields.is_empty() {
            let update = UpdateOptions {
                filter: filter.clone(),
                limit,
                validate: options.validate,
                transaction: options.transaction,
            };
            let affected = self
                .engine
                .update(&self.model, values.fields.clone(), &update)
                .await
                .map_err(|err| self.storage_error(err))?;
            debug!(affected, "rows updated");
        }

        let mut find = FindOptions::new(filter).with_transaction(options.transaction);
        find.limit = limit;
        let mut rows = self
            .engine
            .find_all(&self.model, &find)
            .await
            .map_err(|err| self.storage_error(err))?;

        if options.associate && !query.includes().is_empty() {
            let associations = self.associations();
            for row in rows.iter_mut() {
                associations
                    .persist(
                        &self.model,
                        row,
                        values,
                        query.includes(),
                        WriteMode::Update,
                        options,
                    )
                    .await?;
            }
        }
        Ok(rows)
    }

    /// Insert or update by primary key. Returns the row and whether it was
    /// created.
    #[instrument(skip(self, query, values, options), fields(model = %self.model.name))]
    pub async fn upsert(
        &self,
        query: &Query<T>,
        values: Partial<E::Instance>,
        options: &PersistOptions,
    ) -> Result<(E::Instance, bool), Error> {
        let (mut row, created) = self
            .engine
            .upsert(&self.model, values.fields.clone(), options.write_options())
            .await
            .map_err(|err| self.storage_error(err))?;
        if options.associate {
            let mode = if created {
                WriteMode::Create
            } else {
                WriteMode::Update
            };
            self.associations()
                .persist(&self.model, &mut row, &values, query.includes(), mode, options)
                .await?;
        }
        Ok((row, created))
    }

    /// Update by primary key when `values` carries one, otherwise create.
    ///
    /// Returns `None` when the primary key matched no row.
    pub async fn save(
        &self,
        query: &Query<T>,
        values: Partial<E::Instance>,
        options: &PersistOptions,
    ) -> Result<Option<E::Instance>, Error> {
        let pk_name = self.model.primary_key_name()?;
        let key = values.fields.get(pk_name).filter(|v| !v.is_null()).cloned();
        match key {
            Some(key) => {
                let scoped = self.by_primary_key(query, key)?;
                let rows = self.update(&scoped, values, options).await?;
                if rows.is_empty() {
                    debug!(model = %self.model.name, "save matched no row");
                }
                Ok(rows.into_iter().next())
            }
            None => self.create(query, values, options).await.map(Some),
        }
    }

    /// Delete the rows matching the query. Paranoid models are soft-deleted
    /// unless `force` is set.
    #[instrument(skip(self, query), fields(model = %self.model.name))]
    pub async fn destroy(
        &self,
        query: &Query<T>,
        force: bool,
        transaction: Option<Transaction>,
    ) -> Result<u64, Error> {
        let options = DestroyOptions {
            filter: query.compile_wheres(),
            limit: Some(query.descriptor().taken()).filter(|n| *n > 0),
            force,
            transaction,
        };
        self.engine
            .destroy(&self.model, &options)
            .await
            .map_err(|err| self.storage_error(err))
    }

    /// Undo soft deletes on the rows matching the query.
    pub async fn restore(
        &self,
        query: &Query<T>,
        transaction: Option<Transaction>,
    ) -> Result<u64, Error> {
        let options = DestroyOptions {
            filter: query.compile_wheres(),
            limit: Some(query.descriptor().taken()).filter(|n| *n > 0),
            force: false,
            transaction,
        };
        self.engine
            .restore(&self.model, &options)
            .await
            .map_err(|err| self.storage_error(err))
    }

    /// Remove every row.
    pub async fn truncate(&self, options: TableOptions) -> Result<(), Error> {
        self.engine
            .truncate(&self.model, options)
            .await
            .map_err(|err| self.storage_error(err))
    }

    /// Remove the table.
    pub async fn drop(&self, options: TableOptions) -> Result<(), Error> {
        self.engine
            .drop_table(&self.model, options)
            .await
            .map_err(|err| self.storage_error(err))
    }

    // Transactions

    /// Open a transaction.
    pub async fn transaction(&self) -> Result<Transaction, Error> {
        self.engine
            .begin()
            .await
            .map_err(|err| self.storage_error(err))
    }

    /// Commit a transaction.
    pub async fn commit(&self, transaction: Transaction) -> Result<(), Error> {
        self.engine
            .commit(transaction)
            .await
            .map_err(|err| self.storage_error(err))
    }

    /// Roll back a transaction.
    pub async fn rollback(&self, transaction: Transaction) -> Result<(), Error> {
        self.engine
            .rollback(transaction)
            .await
            .map_err(|err| self.storage_error(err))
    }

    fn associations(&self) -> AssociationEngine<'_, E> {
        AssociationEngine::new(self.engine.as_ref(), &self.registry)
    }

    fn by_primary_key(&self, query: &Query<T>, key: Value) -> Result<Query<T>, Error> {
        let pk_name = self.model.primary_key_name()?;
        Ok(query.filter_by(Where::build(pk_name.to_string(), Op::Eq, key)))
    }

    fn storage_error(&self, err: StorageError) -> Error {
        Error::from_storage(err, &self.model)
    }
}
