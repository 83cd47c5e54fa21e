// ============================================================================
// gameobj Library
// ============================================================================

pub mod core;
pub mod result;
pub mod interface;
pub mod connection;
pub mod discovery;
pub mod schema;
pub mod entity;
pub mod persist;
pub mod facade;
pub mod prelude;

// Re-export main types for convenience
pub use crate::core::{FieldType, ObjectError, Result, Row, Value};
pub use crate::result::QueryResult;

// Re-export connection API
pub use crate::connection::{
    Connection,
    config::ConnectionConfig,
    manager::ConnectionManager,
    pool::{ConnectionPool, PoolGuard, PoolStats},
    sqlite::SqliteFactory,
};

// Re-export object API
pub use crate::discovery::{ConfigResolver, DatabaseRecord, DiscoveryClient, HttpKvDiscovery, StaticDiscovery};
pub use crate::entity::{CreateScope, Entity, EntityState};
pub use crate::facade::{InitOptions, ObjectStore, StoreOptions};
pub use crate::persist::CommitMode;
pub use crate::schema::{FieldDef, ObjectModel, Schema, SchemaRegistry};

// ============================================================================
// Quick start
// ============================================================================

/// Open a store over an existing configuration, with every registered table
/// created.
///
/// Shorthand for [`ObjectStore::new`] followed by
/// [`ObjectStore::initialize_with_config`].
///
/// # Examples
///
/// ```
/// use gameobj::{ConnectionConfig, SchemaRegistry};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let registry = SchemaRegistry::from_model_json(r#"{
///     "Guild": {"Id": "Integer KEY", "Motto": "String"}
/// }"#)?;
///
/// let config = ConnectionConfig::new("game", "").database("memory:quick_start");
/// let store = gameobj::open(registry, config)?;
///
/// let mut guild = store.create("Guild", 7)?;
/// guild.set("Motto", "Onward")?;
/// guild.commit(&store)?;
///
/// assert!(store.exists("Guild", 7)?);
/// # Ok(())
/// # }
/// ```
pub fn open(registry: SchemaRegistry, config: ConnectionConfig) -> Result<ObjectStore> {
    let store = ObjectStore::new(registry);
    store.initialize_with_config(config)?;
    Ok(store)
}
