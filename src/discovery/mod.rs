//! Runtime configuration lookup through a distributed key-value store.
//!
//! Each application stores its database parameters as a small JSON record at
//! `<root>/<app_id>/database`. The resolver reads it once at startup.

pub mod http;
pub mod resolver;

use crate::connection::config::ConnectionConfig;
use crate::core::{ObjectError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::RwLock;

pub use http::HttpKvDiscovery;
pub use resolver::ConfigResolver;

/// Default key prefix under which applications publish their records.
pub const DEFAULT_DISCOVERY_ROOT: &str = "gameobj/apps";

/// Read access to a hierarchical key-value store.
pub trait DiscoveryClient: Send + Sync {
    /// Read the value at `key`. `Ok(None)` when the key does not exist.
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Short name of the backend, for logs.
    fn backend_name(&self) -> &'static str;
}

/// In-process key-value map.
///
/// Stands in for the coordination service in tests and in deployments that
/// ship a fixed configuration.
#[derive(Debug, Default)]
pub struct StaticDiscovery {
    entries: RwLock<HashMap<String, Vec<u8>>>,
}

impl StaticDiscovery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entry(self, key: impl Into<String>, value: impl Into<Vec<u8>>) -> Self {
        if let Ok(mut entries) = self.entries.write() {
            entries.insert(key.into(), value.into());
        }
        self
    }

    /// Publish `record` for `app_id` under the given root.
    pub fn with_record(self, root: &str, app_id: &str, record: &DatabaseRecord) -> Result<Self> {
        let key = database_key(root, app_id)?;
        Ok(self.with_entry(key, record.to_json()?))
    }

    pub fn put(&self, key: impl Into<String>, value: impl Into<Vec<u8>>) -> Result<()> {
        self.entries.write()?.insert(key.into(), value.into());
        Ok(())
    }
}

impl DiscoveryClient for StaticDiscovery {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.entries.read()?.get(key).cloned())
    }

    fn backend_name(&self) -> &'static str {
        "static"
    }
}

/// Database parameters as published in the discovery store.
///
/// ```json
/// {"user": "game", "password": "secret", "host": "10.0.0.5", "port": 3306, "database": "mygame"}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseRecord {
    pub user: String,
    #[serde(default)]
    pub password: String,
    pub host: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    pub database: String,
}

impl DatabaseRecord {
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes)
            .map_err(|e| ObjectError::ConfigInvalid(format!("malformed database record: {}", e)))
    }

    pub fn to_json(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self)
            .map_err(|e| ObjectError::ConfigInvalid(format!("cannot encode database record: {}", e)))
    }

    pub fn from_config(config: &ConnectionConfig) -> Self {
        Self {
            user: config.user.clone(),
            password: config.password.clone(),
            host: config.host.clone(),
            port: Some(config.port),
            database: config.database.clone(),
        }
    }

    /// Build a validated connection configuration with default pool settings.
    pub fn into_config(self) -> Result<ConnectionConfig> {
        let mut config = ConnectionConfig::new(&self.user, &self.password)
            .host(&self.host)
            .database(&self.database);
        if let Some(port) = self.port {
            config = config.port(port);
        }
        config.validate()?;
        Ok(config)
    }
}

/// Key of the database record for `app_id` under `root`.
pub fn database_key(root: &str, app_id: &str) -> Result<String> {
    if app_id.is_empty() || app_id.contains('/') {
        return Err(ObjectError::ConfigInvalid(format!(
            "invalid application identifier '{}'",
            app_id
        )));
    }
    Ok(format!("{}/{}/database", root.trim_matches('/'), app_id))
}
