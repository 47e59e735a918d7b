//! Rows handed out by the in-memory adapter.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use ormlink_proto::{Record, ReloadOptions, Transaction, WriteOptions};

use super::store::primary_key;
use super::{Related, Shared};
use crate::catalog::ModelDef;
use crate::storage::{AssociationTarget, Instance, StorageError};

/// A row of the in-memory adapter.
#[derive(Clone)]
pub struct MemoryInstance {
    shared: Arc<Shared>,
    model: Arc<ModelDef>,
    data: Record,
    is_new: bool,
    related: Related,
}

impl MemoryInstance {
    pub(crate) fn built(shared: Arc<Shared>, model: Arc<ModelDef>, data: Record, is_new: bool) -> Self {
        Self {
            shared,
            model,
            data,
            is_new,
            related: Related::new(),
        }
    }

    pub(crate) fn loaded(
        shared: Arc<Shared>,
        model: Arc<ModelDef>,
        data: Record,
        related: Related,
    ) -> Self {
        Self {
            shared,
            model,
            data,
            is_new: false,
            related,
        }
    }

    /// Attribute values.
    pub fn data(&self) -> &Record {
        &self.data
    }

    /// Descriptor of the row's model.
    pub fn model(&self) -> &ModelDef {
        &self.model
    }

    fn key(&self) -> Result<Value, StorageError> {
        match self.data.get(primary_key(&self.model)?) {
            Some(value) if !value.is_null() => Ok(value.clone()),
            _ => Err(StorageError::NotFound),
        }
    }
}

impl fmt::Debug for MemoryInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryInstance")
            .field("model", &self.model.name)
            .field("data", &self.data)
            .field("is_new", &self.is_new)
            .field("related", &self.related)
            .finish()
    }
}

#[async_trait]
impl Instance for MemoryInstance {
    fn model_name(&self) -> &str {
        &self.model.name
    }

    fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    fn set(&mut self, key: &str, value: Value) {
        self.data.insert(key.to_string(), value);
    }

    fn is_new_record(&self) -> bool {
        self.is_new
    }

    fn related(&self, alias: &str) -> Option<&AssociationTarget<Self>> {
        self.related.get(alias)
    }

    fn to_plain_object(&self, depth: usize) -> Record {
        let mut plain = self.data.clone();
        if depth == 0 {
            return plain;
        }
        for (alias, target) in &self.related {
            let value = match target {
                AssociationTarget::None => Value::Null,
                AssociationTarget::One(item) => Value::Object(item.to_plain_object(depth - 1)),
                AssociationTarget::Many(items) => Value::Array(
                    items
                        .iter()
                        .map(|item| Value::Object(item.to_plain_object(depth - 1)))
                        .collect(),
                ),
            };
            plain.insert(alias.clone(), value);
        }
        plain
    }

    async fn save(&mut self, options: WriteOptions) -> Result<(), StorageError> {
        let mut state = self.shared.state.lock();
        let table = state.store.table_mut(&self.model.name);
        if self.is_new {
            self.data = table.insert(&self.model, &self.data, options.validate)?;
            self.is_new = false;
        } else {
            let index = table
                .position(&self.model, &self.key()?)?
                .ok_or(StorageError::NotFound)?;
            self.data = table.update_at(&self.model, index, &self.data, options.validate)?;
        }
        Ok(())
    }

    async fn set_association(
        &mut self,
        alias: &str,
        target: AssociationTarget<Self>,
        _transaction: Option<Transaction>,
    ) -> Result<(), StorageError> {
        self.shared
            .link(&self.model, &mut self.data, alias, &target)?;
        self.related.insert(alias.to_string(), target);
        Ok(())
    }

    async fn reload(&mut self, options: ReloadOptions) -> Result<(), StorageError> {
        let key = self.key()?;
        let state = self.shared.state.lock();
        let table = state
            .store
            .table(&self.model.name)
            .ok_or(StorageError::NotFound)?;
        let row = table
            .live_where(primary_key(&self.model)?, &key)
            .next()
            .ok_or(StorageError::NotFound)?;
        let data = row.data.clone();
        let related = self
            .shared
            .load(&state.store, &self.model, &data, options.includes(), false)?
            .unwrap_or_default();
        drop(state);
        self.data = data;
        self.related = related;
        Ok(())
    }
}
