use super::{DEFAULT_DISCOVERY_ROOT, DatabaseRecord, DiscoveryClient, HttpKvDiscovery, database_key};
use crate::connection::config::ConnectionConfig;
use crate::core::{ObjectError, Result};
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

type Connector = Box<dyn Fn(&[String]) -> Result<Arc<dyn DiscoveryClient>> + Send + Sync>;

/// Resolves database connection parameters for an application.
///
/// A directly supplied configuration wins. Otherwise the parameters come
/// from the discovery store, whose client is connected on first use and kept
/// until [`release`](Self::release).
pub struct ConfigResolver {
    direct: Option<ConnectionConfig>,
    root: String,
    discovery: Mutex<Option<Arc<dyn DiscoveryClient>>>,
    connector: Connector,
}

impl ConfigResolver {
    pub fn new() -> Self {
        Self {
            direct: None,
            root: DEFAULT_DISCOVERY_ROOT.to_string(),
            discovery: Mutex::new(None),
            connector: Box::new(|hosts: &[String]| {
                let client: Arc<dyn DiscoveryClient> = Arc::new(HttpKvDiscovery::connect(hosts)?);
                Ok(client)
            }),
        }
    }

    /// Use `config` for every application instead of asking discovery.
    pub fn with_direct(mut self, config: ConnectionConfig) -> Self {
        self.direct = Some(config);
        self
    }

    /// Key prefix of the database records.
    pub fn with_root(mut self, root: &str) -> Self {
        self.root = root.to_string();
        self
    }

    /// Use an already connected discovery client.
    pub fn with_discovery(self, client: Arc<dyn DiscoveryClient>) -> Self {
        if let Ok(mut slot) = self.discovery.lock() {
            *slot = Some(client);
        }
        self
    }

    /// Replace how discovery clients are created from a host list.
    pub fn with_connector<F>(mut self, connector: F) -> Self
    where
        F: Fn(&[String]) -> Result<Arc<dyn DiscoveryClient>> + Send + Sync + 'static,
    {
        self.connector = Box::new(connector);
        self
    }

    pub fn root(&self) -> &str {
        &self.root
    }

    /// Connection parameters for `app_id`, from the direct configuration or,
    /// failing that, from an already connected discovery client.
    pub fn resolve(&self, app_id: &str) -> Result<ConnectionConfig> {
        if let Some(config) = &self.direct {
            config.validate()?;
            return Ok(config.clone());
        }

        match self.discovery()? {
            Some(client) => self.read_record(client.as_ref(), app_id),
            None => Err(ObjectError::ConfigNotFound(app_id.to_string())),
        }
    }

    /// Connection parameters for `app_id` read from the discovery store at `hosts`.
    pub fn resolve_via_discovery(&self, hosts: &[String], app_id: &str) -> Result<ConnectionConfig> {
        let client = self.connect_discovery(hosts)?;
        self.read_record(client.as_ref(), app_id)
    }

    /// The cached discovery client, connecting to `hosts` on first use.
    pub fn connect_discovery(&self, hosts: &[String]) -> Result<Arc<dyn DiscoveryClient>> {
        let mut slot = self.discovery.lock()?;
        if let Some(client) = slot.as_ref() {
            return Ok(Arc::clone(client));
        }

        let client = (self.connector)(hosts)?;
        info!(backend = client.backend_name(), ?hosts, "discovery client connected");
        *slot = Some(Arc::clone(&client));
        Ok(client)
    }

    pub fn discovery(&self) -> Result<Option<Arc<dyn DiscoveryClient>>> {
        Ok(self.discovery.lock()?.clone())
    }

    /// Drop the cached discovery client.
    pub fn release(&self) -> Result<()> {
        if self.discovery.lock()?.take().is_some() {
            debug!("discovery client released");
        }
        Ok(())
    }

    fn read_record(&self, client: &dyn DiscoveryClient, app_id: &str) -> Result<ConnectionConfig> {
        let key = database_key(&self.root, app_id)?;
        let bytes = client
            .get(&key)?
            .ok_or_else(|| ObjectError::ConfigNotFound(app_id.to_string()))?;

        debug!(%key, "database record found");
        DatabaseRecord::parse(&bytes)?.into_config()
    }
}

impl Default for ConfigResolver {
    fn default() -> Self {
        Self::new()
    }
}
