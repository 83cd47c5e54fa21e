//! Maps entities onto rows.
//!
//! Every operation here runs on one borrowed [`Connection`] and issues at
//! most one data statement per object, so a crash mid-way leaves each row
//! either fully old or fully new.

pub mod statements;

use crate::connection::Connection;
use crate::core::{FieldType, ObjectError, Result, Value};
use crate::entity::Entity;
use crate::interface::TransportError;
use crate::schema::{Schema, SchemaRegistry};
use statements::Statement;
use std::sync::Arc;
use tracing::{debug, error, info};

/// How a commit of a persisted entity writes its row.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CommitMode {
    /// Write only the fields set since the last fetch or commit. Concurrent
    /// writers of different fields of one row do not overwrite each other.
    #[default]
    DirtyColumns,
    /// Write every non-key field whenever anything is dirty. The last
    /// committer's in-memory copy becomes the whole row.
    FullRow,
}

/// Runs the persistence operations on one connection.
pub struct PersistSession<'c> {
    conn: &'c mut Connection,
    mode: CommitMode,
}

impl<'c> PersistSession<'c> {
    pub fn new(conn: &'c mut Connection, mode: CommitMode) -> Self {
        Self { conn, mode }
    }

    /// Create every registered table that does not exist yet, all or nothing.
    pub fn ensure_tables(&mut self, registry: &SchemaRegistry) -> Result<()> {
        self.conn.transaction(|conn| {
            for schema in registry.schemas() {
                conn.execute(&schema.create_table_sql(), &[])
                    .map_err(|e| storage_error("create table", schema, e))?;
                debug!(table = schema.table_name(), "table ensured");
            }
            Ok::<(), ObjectError>(())
        })?;
        info!(tables = registry.len(), "object tables ready");
        Ok(())
    }

    /// Write `entity`: an insert the first time, an update of the changed
    /// fields afterwards, nothing when there is nothing to write.
    pub fn commit(&mut self, entity: &mut Entity) -> Result<()> {
        entity.ensure_live()?;

        if entity.is_persisted() {
            self.update(entity)?;
        } else {
            self.insert(entity)?;
        }
        entity.mark_committed();
        Ok(())
    }

    pub fn insert(&mut self, entity: &Entity) -> Result<()> {
        let schema = entity.schema();
        let stmt = statements::insert(schema, entity.raw_values());
        debug!(type_name = schema.type_name(), key = %entity.key(), "insert");

        match self.execute(&stmt) {
            Ok(_) => Ok(()),
            Err(TransportError::UniqueViolation(_)) => Err(ObjectError::DuplicateKey {
                type_name: schema.type_name().to_string(),
                key: entity.key().to_key_string(),
            }),
            Err(err) => Err(storage_error("insert into", schema, err)),
        }
    }

    /// Update the row of a persisted entity. Returns false when no statement
    /// was needed because nothing is dirty.
    pub fn update(&mut self, entity: &Entity) -> Result<bool> {
        if !entity.is_dirty() {
            return Ok(false);
        }

        let schema = entity.schema();
        let columns: Vec<usize> = match self.mode {
            CommitMode::DirtyColumns => entity
                .dirty_indices()
                .filter(|&i| i != schema.key_index())
                .collect(),
            CommitMode::FullRow => schema.non_key_fields().map(|(i, _)| i).collect(),
        };
        // A key-only schema has nothing to update
        if columns.is_empty() {
            return Ok(false);
        }

        let stmt = statements::update(schema, &columns, entity.raw_values());
        debug!(
            type_name = schema.type_name(),
            key = %entity.key(),
            fields = ?entity.dirty_fields(),
            mode = ?self.mode,
            "update"
        );

        let affected = self
            .execute(&stmt)
            .map_err(|e| storage_error("update", schema, e))?;
        match affected {
            0 => Err(ObjectError::NotFound {
                type_name: schema.type_name().to_string(),
                key: entity.key().to_key_string(),
            }),
            1 => Ok(true),
            rows => Err(ambiguous(schema, entity.key(), rows as usize)),
        }
    }

    /// Load the single row whose key equals `key`.
    pub fn fetch_by_key(&mut self, schema: &Arc<Schema>, key: &Value) -> Result<Entity> {
        self.find(schema, key)?.ok_or_else(|| ObjectError::NotFound {
            type_name: schema.type_name().to_string(),
            key: key.to_key_string(),
        })
    }

    /// Like [`fetch_by_key`](Self::fetch_by_key), with `None` for a missing row.
    pub fn find(&mut self, schema: &Arc<Schema>, key: &Value) -> Result<Option<Entity>> {
        let stmt = statements::select_by_key(schema, key);
        let column_types: Vec<FieldType> = schema.fields().iter().map(|f| f.field_type).collect();
        debug!(type_name = schema.type_name(), key = %key, "fetch");

        let result = self
            .conn
            .query(&stmt.sql, &stmt.params, &column_types)
            .map_err(|e| storage_error("select from", schema, e))?;

        let mut rows = result.into_rows();
        match rows.len() {
            0 => Ok(None),
            1 => Ok(rows.pop().map(|row| Entity::from_row(Arc::clone(schema), row))),
            n => Err(ambiguous(schema, key, n)),
        }
    }

    /// Fetch several keys on this one connection. Missing keys yield `None`
    /// at their position.
    pub fn fetch_many(&mut self, schema: &Arc<Schema>, keys: &[Value]) -> Result<Vec<Option<Entity>>> {
        keys.iter().map(|key| self.find(schema, key)).collect()
    }

    pub fn exists(&mut self, schema: &Schema, key: &Value) -> Result<bool> {
        let rows = self.count_statement(schema, &statements::count_by_key(schema, key))?;
        if rows > 1 {
            return Err(ambiguous(schema, key, rows as usize));
        }
        Ok(rows == 1)
    }

    pub fn count(&mut self, schema: &Schema) -> Result<u64> {
        self.count_statement(schema, &statements::count_all(schema))
    }

    /// Delete the row with the entity's key and mark the entity deleted.
    ///
    /// The statement runs whether or not this entity was ever committed, so a
    /// new entity carrying a stored key removes that row. Deleting a row that
    /// is already gone succeeds.
    pub fn delete(&mut self, entity: &mut Entity) -> Result<()> {
        entity.ensure_live()?;

        let schema = entity.schema();
        let stmt = statements::delete(schema, entity.key());
        let affected = self
            .execute(&stmt)
            .map_err(|e| storage_error("delete from", schema, e))?;
        debug!(type_name = schema.type_name(), key = %entity.key(), affected, "delete");

        entity.mark_deleted();
        Ok(())
    }

    fn count_statement(&mut self, schema: &Schema, stmt: &Statement) -> Result<u64> {
        let result = self
            .conn
            .query(&stmt.sql, &stmt.params, &[FieldType::Integer])
            .map_err(|e| storage_error("count", schema, e))?;

        let count = result
            .rows
            .first()
            .and_then(|row| row.first())
            .and_then(Value::as_i64)
            .ok_or_else(|| {
                ObjectError::StorageError(format!("count on {} returned no value", schema.table_name()))
            })?;
        Ok(count.max(0) as u64)
    }

    fn execute(&mut self, stmt: &Statement) -> std::result::Result<u64, TransportError> {
        self.conn.execute(&stmt.sql, &stmt.params)
    }
}

fn storage_error(action: &str, schema: &Schema, err: TransportError) -> ObjectError {
    ObjectError::StorageError(format!("{} {}: {}", action, schema.table_name(), err))
}

fn ambiguous(schema: &Schema, key: &Value, rows: usize) -> ObjectError {
    // Only possible when the table was created outside this library without the key constraint
    error!(
        table = schema.table_name(),
        key = %key,
        rows,
        "key matched more than one row"
    );
    ObjectError::AmbiguousKey {
        type_name: schema.type_name().to_string(),
        key: key.to_key_string(),
        rows,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::config::ConnectionConfig;
    use crate::connection::sqlite::SqliteFactory;
    use crate::interface::ConnectionFactory;
    use crate::schema::FieldDef;

    fn registry() -> SchemaRegistry {
        let mut registry = SchemaRegistry::new();
        registry
            .register(
                "Character",
                vec![
                    FieldDef::key("Name", FieldType::String),
                    FieldDef::new("Level", FieldType::Integer),
                    FieldDef::new("Hp", FieldType::Integer),
                ],
            )
            .unwrap();
        registry
    }

    fn connection(name: &str) -> Connection {
        let config = ConnectionConfig::new("game", "").database(&format!("memory:{}", name));
        Connection::new(1, SqliteFactory.connect(&config).unwrap())
    }

    #[test]
    fn test_insert_fetch_update() {
        let registry = registry();
        let schema = registry.lookup("Character").unwrap();
        let mut conn = connection("persist_basic");
        let mut session = PersistSession::new(&mut conn, CommitMode::DirtyColumns);
        session.ensure_tables(&registry).unwrap();

        let mut hero = Entity::create(Arc::clone(&schema), "hero1").unwrap();
        hero.set("Level", 1).unwrap().set("Hp", 100).unwrap();
        session.commit(&mut hero).unwrap();
        assert!(hero.is_persisted());
        assert!(!hero.is_dirty());

        hero.set("Hp", 80).unwrap();
        assert!(session.update(&hero).unwrap());

        let loaded = session.fetch_by_key(&schema, &Value::from("hero1")).unwrap();
        assert_eq!(loaded.get_i64("Level").unwrap(), 1);
        assert_eq!(loaded.get_i64("Hp").unwrap(), 80);
        assert_eq!(session.count(&schema).unwrap(), 1);
    }

    #[test]
    fn test_clean_commit_writes_nothing() {
        let registry = registry();
        let schema = registry.lookup("Character").unwrap();
        let mut conn = connection("persist_clean");
        let mut session = PersistSession::new(&mut conn, CommitMode::FullRow);
        session.ensure_tables(&registry).unwrap();

        let mut hero = Entity::create(schema, "hero1").unwrap();
        session.commit(&mut hero).unwrap();
        assert!(!session.update(&hero).unwrap());
    }

    #[test]
    fn test_duplicate_insert() {
        let registry = registry();
        let schema = registry.lookup("Character").unwrap();
        let mut conn = connection("persist_dup");
        let mut session = PersistSession::new(&mut conn, CommitMode::DirtyColumns);
        session.ensure_tables(&registry).unwrap();

        let mut first = Entity::create(Arc::clone(&schema), "hero1").unwrap();
        session.commit(&mut first).unwrap();

        let mut second = Entity::create(schema, "hero1").unwrap();
        let err = session.commit(&mut second).unwrap_err();
        assert!(matches!(err, ObjectError::DuplicateKey { .. }));
        assert!(!second.is_persisted());
    }

    #[test]
    fn test_update_of_vanished_row() {
        let registry = registry();
        let schema = registry.lookup("Character").unwrap();
        let mut conn = connection("persist_vanished");
        let mut session = PersistSession::new(&mut conn, CommitMode::DirtyColumns);
        session.ensure_tables(&registry).unwrap();

        let mut hero = Entity::create(Arc::clone(&schema), "hero1").unwrap();
        session.commit(&mut hero).unwrap();
        let mut other = session.fetch_by_key(&schema, &Value::from("hero1")).unwrap();
        session.delete(&mut other).unwrap();

        hero.set("Hp", 1).unwrap();
        let err = session.commit(&mut hero).unwrap_err();
        assert!(matches!(err, ObjectError::NotFound { .. }));
        // The failed commit leaves the change pending
        assert!(hero.is_dirty());
    }

    #[test]
    fn test_fetch_many_and_exists() {
        let registry = registry();
        let schema = registry.lookup("Character").unwrap();
        let mut conn = connection("persist_many");
        let mut session = PersistSession::new(&mut conn, CommitMode::DirtyColumns);
        session.ensure_tables(&registry).unwrap();

        let mut hero = Entity::create(Arc::clone(&schema), "a").unwrap();
        session.commit(&mut hero).unwrap();

        let found = session
            .fetch_many(&schema, &[Value::from("a"), Value::from("b")])
            .unwrap();
        assert!(found[0].is_some());
        assert!(found[1].is_none());
        assert!(session.exists(&schema, &Value::from("a")).unwrap());
        assert!(!session.exists(&schema, &Value::from("b")).unwrap());
    }

    #[test]
    fn test_delete_by_key_of_new_entity() {
        let registry = registry();
        let schema = registry.lookup("Character").unwrap();
        let mut conn = connection("persist_delete_new");
        let mut session = PersistSession::new(&mut conn, CommitMode::DirtyColumns);
        session.ensure_tables(&registry).unwrap();

        let mut stored = Entity::create(Arc::clone(&schema), "hero1").unwrap();
        session.commit(&mut stored).unwrap();

        let mut stand_in = Entity::create(Arc::clone(&schema), "hero1").unwrap();
        session.delete(&mut stand_in).unwrap();
        assert!(stand_in.is_deleted());
        assert!(!session.exists(&schema, &Value::from("hero1")).unwrap());

        let mut ghost = Entity::create(schema, "ghost").unwrap();
        session.delete(&mut ghost).unwrap();
        assert!(ghost.is_deleted());
    }

    #[test]
    fn test_ambiguous_key() {
        let registry = registry();
        let schema = registry.lookup("Character").unwrap();
        let mut conn = connection("persist_ambiguous");
        // A table created by someone else, without the primary key
        conn.execute(
            "CREATE TABLE \"obj_character\" (\"Name\" TEXT, \"Level\" INTEGER, \"Hp\" INTEGER)",
            &[],
        )
        .unwrap();
        for _ in 0..2 {
            conn.execute(
                "INSERT INTO \"obj_character\" VALUES ('twin', 1, 1)",
                &[],
            )
            .unwrap();
        }

        let mut session = PersistSession::new(&mut conn, CommitMode::DirtyColumns);
        let err = session.fetch_by_key(&schema, &Value::from("twin")).unwrap_err();
        assert!(matches!(err, ObjectError::AmbiguousKey { rows: 2, .. }));
    }
}
