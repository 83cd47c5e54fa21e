use crate::connection::config::ConnectionConfig;
use crate::persist::CommitMode;
use std::time::Duration;

/// Arguments of [`ObjectStore::initialize`](super::ObjectStore::initialize).
///
/// With a non-empty `user` the database parameters are taken from here.
/// Otherwise they are resolved for `app_id` through discovery.
#[derive(Debug, Clone, Default)]
pub struct InitOptions {
    pub user: String,
    pub password: String,
    pub host: String,
    pub port: Option<u16>,
    pub database: String,
    /// Discovery hosts, `host[:port]`. Non-empty connects the discovery client.
    pub discovery_hosts: Vec<String>,
    pub app_id: String,
    /// Overrides the pool size of the resolved configuration
    pub max_connections: Option<usize>,
    pub acquire_timeout: Option<Duration>,
}

impl InitOptions {
    pub fn new(app_id: &str) -> Self {
        Self {
            app_id: app_id.to_string(),
            ..Self::default()
        }
    }

    pub fn credentials(mut self, user: &str, password: &str) -> Self {
        self.user = user.to_string();
        self.password = password.to_string();
        self
    }

    pub fn host(mut self, host: &str) -> Self {
        self.host = host.to_string();
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn database(mut self, database: &str) -> Self {
        self.database = database.to_string();
        self
    }

    pub fn discovery_hosts<I, S>(mut self, hosts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.discovery_hosts = hosts.into_iter().map(Into::into).collect();
        self
    }

    pub fn max_connections(mut self, max: usize) -> Self {
        self.max_connections = Some(max);
        self
    }

    pub fn acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = Some(timeout);
        self
    }

    pub fn has_credentials(&self) -> bool {
        !self.user.is_empty()
    }

    /// Configuration built from the direct parameters. Empty host and
    /// database fall back to the defaults of [`ConnectionConfig`].
    pub(crate) fn direct_config(&self) -> ConnectionConfig {
        let mut config = ConnectionConfig::new(&self.user, &self.password);
        if !self.host.is_empty() {
            config = config.host(&self.host);
        }
        if let Some(port) = self.port {
            config = config.port(port);
        }
        if !self.database.is_empty() {
            config = config.database(&self.database);
        }
        config
    }

    pub(crate) fn apply_overrides(&self, mut config: ConnectionConfig) -> ConnectionConfig {
        if let Some(max) = self.max_connections {
            config = config.max_connections(max);
            if config.min_connections > max {
                config = config.min_connections(max);
            }
        }
        if let Some(timeout) = self.acquire_timeout {
            config = config.acquire_timeout(timeout);
        }
        config
    }
}

/// Behavior of an [`ObjectStore`](super::ObjectStore) that does not depend
/// on the database it talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreOptions {
    pub commit_mode: CommitMode,
    /// Create missing tables for every registered type during initialize
    pub ensure_tables_on_init: bool,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            commit_mode: CommitMode::default(),
            ensure_tables_on_init: true,
        }
    }
}
