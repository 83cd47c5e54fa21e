pub mod scope;

use crate::core::{ObjectError, Result, Value};
use crate::facade::ObjectStore;
use crate::schema::Schema;
use std::collections::BTreeSet;
use std::sync::Arc;

pub use scope::CreateScope;

/// Where an entity stands relative to its row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityState {
    /// Created in memory, no row written yet
    New,
    /// Backed by a row (fetched, or inserted by a commit)
    Persisted,
    /// Deleted; no further mutation is accepted
    Deleted,
}

/// One object of a registered type, held in memory.
///
/// Field reads and writes never touch the database. `commit` writes the
/// changes: the first commit of a new entity inserts its row, every later
/// commit updates only the fields set since the previous commit.
///
/// Entities are plain values owned by the caller. Two fetches of the same key
/// give two independent entities, and the store keeps no reference to either.
#[derive(Debug, Clone)]
pub struct Entity {
    schema: Arc<Schema>,
    /// One value per schema field, in schema order; the key lives at `schema.key_index()`
    values: Vec<Value>,
    /// Positions of fields set since the last fetch or commit
    dirty: BTreeSet<usize>,
    state: EntityState,
    /// Key given to `create` or read from the row; re-keying a new entity leaves it
    origin_key: Value,
}

impl Entity {
    /// New, unpersisted entity with `key` and default values everywhere else.
    pub fn create(schema: Arc<Schema>, key: impl Into<Value>) -> Result<Self> {
        let key = schema.coerce_key(key.into())?;

        let mut values: Vec<Value> = schema
            .fields()
            .iter()
            .map(|field| field.field_type.default_value())
            .collect();
        values[schema.key_index()] = key.clone();

        Ok(Self {
            schema,
            values,
            dirty: BTreeSet::new(),
            state: EntityState::New,
            origin_key: key,
        })
    }

    /// Entity backed by an existing row whose values are in schema order.
    pub(crate) fn from_row(schema: Arc<Schema>, values: Vec<Value>) -> Self {
        let origin_key = values[schema.key_index()].clone();
        Self {
            schema,
            values,
            dirty: BTreeSet::new(),
            state: EntityState::Persisted,
            origin_key,
        }
    }

    /// Set a field, marking it dirty.
    ///
    /// Nothing changes when the call fails.
    ///
    /// ```ignore
    /// character.set("Level", 2)?.set("Hp", 150)?;
    /// ```
    pub fn set(&mut self, field: &str, value: impl Into<Value>) -> Result<&mut Self> {
        self.ensure_live()?;

        let index = self.schema.require_field(field)?;
        let def = &self.schema.fields()[index];

        if def.is_key && self.state == EntityState::Persisted {
            return Err(ObjectError::ImmutableKeyField(def.name.clone()));
        }

        let value = value.into();
        if !def.field_type.is_compatible(&value) {
            return Err(ObjectError::TypeMismatch(format!(
                "field '{}.{}' is {}, got {}",
                self.schema.type_name(),
                def.name,
                def.field_type,
                value.type_name()
            )));
        }

        self.values[index] = def.field_type.coerce(value)?;
        self.dirty.insert(index);
        Ok(self)
    }

    /// The in-memory value of `field`. It may be stale relative to the database.
    pub fn get(&self, field: &str) -> Result<&Value> {
        let index = self.schema.require_field(field)?;
        Ok(&self.values[index])
    }

    pub fn get_str(&self, field: &str) -> Result<&str> {
        let value = self.get(field)?;
        value.as_str().ok_or_else(|| self.wrong_accessor(field, value, "String"))
    }

    pub fn get_i64(&self, field: &str) -> Result<i64> {
        let value = self.get(field)?;
        value.as_i64().ok_or_else(|| self.wrong_accessor(field, value, "Integer"))
    }

    pub fn get_f64(&self, field: &str) -> Result<f64> {
        let value = self.get(field)?;
        match value {
            Value::Float(f) => Ok(*f),
            _ => Err(self.wrong_accessor(field, value, "Float")),
        }
    }

    pub fn get_bool(&self, field: &str) -> Result<bool> {
        let value = self.get(field)?;
        value.as_bool().ok_or_else(|| self.wrong_accessor(field, value, "Boolean"))
    }

    pub fn get_blob(&self, field: &str) -> Result<&[u8]> {
        let value = self.get(field)?;
        value.as_blob().ok_or_else(|| self.wrong_accessor(field, value, "Blob"))
    }

    /// Write pending changes through `store`.
    pub fn commit(&mut self, store: &ObjectStore) -> Result<()> {
        store.commit(self)
    }

    /// Delete the row through `store`. The entity is unusable afterwards.
    pub fn delete(&mut self, store: &ObjectStore) -> Result<()> {
        store.delete(self)
    }

    pub fn key(&self) -> &Value {
        &self.values[self.schema.key_index()]
    }

    pub fn type_name(&self) -> &str {
        self.schema.type_name()
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn state(&self) -> EntityState {
        self.state
    }

    pub fn is_persisted(&self) -> bool {
        self.state == EntityState::Persisted
    }

    pub fn is_deleted(&self) -> bool {
        self.state == EntityState::Deleted
    }

    pub fn is_dirty(&self) -> bool {
        !self.dirty.is_empty()
    }

    /// Names of the fields set since the last fetch or commit, in schema order.
    pub fn dirty_fields(&self) -> Vec<&str> {
        self.dirty
            .iter()
            .map(|&i| self.schema.fields()[i].name.as_str())
            .collect()
    }

    /// Field names and values in schema order.
    pub fn values(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.schema
            .fields()
            .iter()
            .map(|field| field.name.as_str())
            .zip(self.values.iter())
    }

    pub(crate) fn origin_key(&self) -> &Value {
        &self.origin_key
    }

    pub(crate) fn raw_values(&self) -> &[Value] {
        &self.values
    }

    pub(crate) fn dirty_indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.dirty.iter().copied()
    }

    pub(crate) fn mark_committed(&mut self) {
        self.dirty.clear();
        self.state = EntityState::Persisted;
    }

    pub(crate) fn mark_deleted(&mut self) {
        self.dirty.clear();
        self.state = EntityState::Deleted;
    }

    pub(crate) fn ensure_live(&self) -> Result<()> {
        if self.state == EntityState::Deleted {
            return Err(ObjectError::AlreadyDeleted {
                type_name: self.schema.type_name().to_string(),
                key: self.key().to_key_string(),
            });
        }
        Ok(())
    }

    fn wrong_accessor(&self, field: &str, value: &Value, wanted: &str) -> ObjectError {
        ObjectError::TypeMismatch(format!(
            "field '{}.{}' holds {}, not {}",
            self.schema.type_name(),
            field,
            value.type_name(),
            wanted
        ))
    }
}
