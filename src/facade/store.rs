use super::options::{InitOptions, StoreOptions};
use crate::connection::config::ConnectionConfig;
use crate::connection::manager::ConnectionManager;
use crate::connection::pool::PoolStats;
use crate::connection::sqlite::SqliteFactory;
use crate::core::{ObjectError, Result, Value};
use crate::discovery::ConfigResolver;
use crate::entity::Entity;
use crate::interface::ConnectionFactory;
use crate::persist::PersistSession;
use crate::schema::{Schema, SchemaRegistry};
use std::sync::Arc;
use tracing::{info, warn};

/// The context every object operation runs in.
///
/// Holds the registered types, the connection pool and the discovery client.
/// Build one per process (or per test), share it by reference or `Arc`
/// across threads, and `initialize` it before the first object operation.
///
/// # Examples
///
/// ```
/// use gameobj::{InitOptions, ObjectStore, SchemaRegistry};
///
/// let registry = SchemaRegistry::from_model_json(r#"{
///     "Character": {"Name": "String KEY", "Level": "Integer", "Hp": "Integer"}
/// }"#).unwrap();
///
/// let store = ObjectStore::new(registry);
/// store.initialize(
///     InitOptions::new("doc").credentials("game", "").database("memory:store_doc"),
/// ).unwrap();
///
/// let mut hero = store.create("Character", "hero1").unwrap();
/// hero.set("Level", 1).unwrap().set("Hp", 100).unwrap();
/// hero.commit(&store).unwrap();
///
/// let loaded = store.fetch_by_key("Character", "hero1").unwrap();
/// assert_eq!(loaded.get_i64("Hp").unwrap(), 100);
/// ```
pub struct ObjectStore {
    registry: Arc<SchemaRegistry>,
    connections: ConnectionManager,
    resolver: ConfigResolver,
    options: StoreOptions,
}

impl ObjectStore {
    /// A store backed by SQLite.
    pub fn new(registry: SchemaRegistry) -> Self {
        Self::with_factory(registry, Arc::new(SqliteFactory))
    }

    pub fn with_factory(registry: SchemaRegistry, factory: Arc<dyn ConnectionFactory>) -> Self {
        Self {
            registry: Arc::new(registry),
            connections: ConnectionManager::new(factory),
            resolver: ConfigResolver::new(),
            options: StoreOptions::default(),
        }
    }

    pub fn with_resolver(mut self, resolver: ConfigResolver) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn with_options(mut self, options: StoreOptions) -> Self {
        self.options = options;
        self
    }

    /// Resolve the database parameters and open the pool.
    ///
    /// Non-empty `discovery_hosts` connect the discovery client first. The
    /// parameters then come from the credentials in `init` when a user is
    /// given, otherwise from discovery under `init.app_id`.
    pub fn initialize(&self, init: InitOptions) -> Result<()> {
        if !init.discovery_hosts.is_empty() {
            self.resolver.connect_discovery(&init.discovery_hosts)?;
        }

        let config = if init.has_credentials() {
            let config = init.direct_config();
            config.validate()?;
            config
        } else {
            self.resolver.resolve(&init.app_id)?
        };

        self.initialize_with_config(init.apply_overrides(config))?;
        info!(app_id = %init.app_id, "object store initialized");
        Ok(())
    }

    /// Open the pool with an already resolved configuration.
    pub fn initialize_with_config(&self, config: ConnectionConfig) -> Result<()> {
        let first = !self.connections.is_initialized();
        self.connections.initialize(config)?;

        if first && self.options.ensure_tables_on_init {
            if let Err(err) = self.ensure_tables() {
                if let Err(shutdown_err) = self.connections.shutdown() {
                    warn!(error = %shutdown_err, "shutdown after failed table setup");
                }
                return Err(err);
            }
        }
        Ok(())
    }

    /// Close the pool and drop the discovery client. Safe to call twice.
    pub fn shutdown(&self) -> Result<()> {
        self.connections.shutdown()?;
        self.resolver.release()?;
        info!("object store shut down");
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.connections.is_initialized()
    }

    pub fn pool_stats(&self) -> Result<PoolStats> {
        self.connections.stats()
    }

    /// The configuration the pool was opened with.
    pub fn config(&self) -> Result<ConnectionConfig> {
        self.connections.config()
    }

    pub fn options(&self) -> StoreOptions {
        self.options
    }

    /// Registered types. Usable before initialize.
    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    pub fn resolver(&self) -> &ConfigResolver {
        &self.resolver
    }

    /// Create the table of every registered type that does not exist yet.
    pub fn ensure_tables(&self) -> Result<()> {
        self.with_session(|session| session.ensure_tables(&self.registry))
    }

    pub fn schema(&self, type_name: &str) -> Result<Arc<Schema>> {
        self.ensure_initialized()?;
        self.registry.lookup(type_name)
    }

    /// A new entity that exists only in memory until its first commit.
    pub fn create(&self, type_name: &str, key: impl Into<Value>) -> Result<Entity> {
        Entity::create(self.schema(type_name)?, key)
    }

    pub fn fetch_by_key(&self, type_name: &str, key: impl Into<Value>) -> Result<Entity> {
        let schema = self.schema(type_name)?;
        let key = schema.coerce_key(key.into())?;
        self.with_session(|session| session.fetch_by_key(&schema, &key))
    }

    /// Fetch several keys of one type over a single connection.
    pub fn fetch_many<I, K>(&self, type_name: &str, keys: I) -> Result<Vec<Option<Entity>>>
    where
        I: IntoIterator<Item = K>,
        K: Into<Value>,
    {
        let schema = self.schema(type_name)?;
        let keys = keys
            .into_iter()
            .map(|key| schema.coerce_key(key.into()))
            .collect::<Result<Vec<_>>>()?;
        self.with_session(|session| session.fetch_many(&schema, &keys))
    }

    pub fn exists(&self, type_name: &str, key: impl Into<Value>) -> Result<bool> {
        let schema = self.schema(type_name)?;
        let key = schema.coerce_key(key.into())?;
        self.with_session(|session| session.exists(&schema, &key))
    }

    pub fn count(&self, type_name: &str) -> Result<u64> {
        let schema = self.schema(type_name)?;
        self.with_session(|session| session.count(&schema))
    }

    /// Write the entity's pending changes. A persisted entity with nothing
    /// dirty does not touch the database.
    pub fn commit(&self, entity: &mut Entity) -> Result<()> {
        self.ensure_initialized()?;
        self.ensure_registered(entity)?;
        entity.ensure_live()?;

        if entity.is_persisted() && !entity.is_dirty() {
            return Ok(());
        }
        self.with_session(|session| session.commit(entity))
    }

    /// Delete the row with the entity's key and mark the entity deleted.
    pub fn delete(&self, entity: &mut Entity) -> Result<()> {
        self.ensure_initialized()?;
        self.ensure_registered(entity)?;
        entity.ensure_live()?;

        self.with_session(|session| session.delete(entity))
    }

    fn with_session<T>(&self, body: impl FnOnce(&mut PersistSession<'_>) -> Result<T>) -> Result<T> {
        // The handle goes back to the pool when it drops, on success or error
        let mut handle = self.connections.acquire()?;
        let mut session = PersistSession::new(handle.connection(), self.options.commit_mode);
        body(&mut session)
    }

    fn ensure_initialized(&self) -> Result<()> {
        if self.connections.is_initialized() {
            Ok(())
        } else {
            Err(ObjectError::NotInitialized)
        }
    }

    /// Entities carry their schema; it must be the one registered here.
    fn ensure_registered(&self, entity: &Entity) -> Result<()> {
        match self.registry.lookup(entity.type_name()) {
            Ok(schema) if Arc::ptr_eq(&schema, entity.schema()) => Ok(()),
            _ => Err(ObjectError::UnknownType(entity.type_name().to_string())),
        }
    }
}
