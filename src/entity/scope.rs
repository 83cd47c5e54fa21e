use super::{Entity, EntityState};
use crate::core::{ObjectError, Result, Value};
use crate::facade::ObjectStore;
use std::collections::HashSet;

/// Catches two uncommitted creations of the same key before either reaches
/// the database.
///
/// Without a scope, the second commit fails with `DuplicateKey`. Inside one,
/// the second `create` already fails with `DuplicateKeyLocal`. A key leaves
/// the scope once its entity is committed through [`CreateScope::commit`] or
/// dropped with [`CreateScope::abandon`]. An entity re-keyed before its
/// commit is tracked under the key it was created with.
///
/// A scope is single-threaded. Keep one per unit of work.
#[derive(Debug, Default)]
pub struct CreateScope {
    pending: HashSet<(String, Value)>,
}

impl CreateScope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(
        &mut self,
        store: &ObjectStore,
        type_name: &str,
        key: impl Into<Value>,
    ) -> Result<Entity> {
        let entity = store.create(type_name, key)?;
        self.check_free(&entity, entity.key())?;
        self.pending.insert(slot(&entity, entity.key()));
        Ok(entity)
    }

    /// Commit through the store. A newly inserted key stops being pending.
    ///
    /// A new entity re-keyed onto a key another entity of this scope holds
    /// fails with `DuplicateKeyLocal` and is not written.
    pub fn commit(&mut self, store: &ObjectStore, entity: &mut Entity) -> Result<()> {
        let was_new = entity.state() == EntityState::New;
        if was_new && entity.key() != entity.origin_key() {
            self.check_free(entity, entity.key())?;
        }

        store.commit(entity)?;
        if was_new {
            self.pending.remove(&slot(entity, entity.origin_key()));
        }
        Ok(())
    }

    /// Stop tracking an entity that will never be committed.
    pub fn abandon(&mut self, entity: &Entity) {
        if entity.state() == EntityState::New {
            self.pending.remove(&slot(entity, entity.origin_key()));
        }
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    fn check_free(&self, entity: &Entity, key: &Value) -> Result<()> {
        if self.pending.contains(&slot(entity, key)) {
            return Err(ObjectError::DuplicateKeyLocal {
                type_name: entity.type_name().to_string(),
                key: key.to_key_string(),
            });
        }
        Ok(())
    }
}

fn slot(entity: &Entity, key: &Value) -> (String, Value) {
    (entity.type_name().to_string(), key.clone())
}
