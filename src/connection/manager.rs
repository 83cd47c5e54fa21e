use super::config::ConnectionConfig;
use super::pool::{ConnectionPool, PoolGuard, PoolStats};
use crate::core::{ObjectError, Result};
use crate::interface::ConnectionFactory;
use std::sync::{Arc, RwLock};
use tracing::info;

/// Owns the connection pool for the lifetime of an object store.
///
/// `initialize` once, `acquire` from any thread, `shutdown` at exit. A second
/// `initialize` with the same configuration is a no-op; with a different one
/// it fails until `shutdown` has run.
pub struct ConnectionManager {
    factory: Arc<dyn ConnectionFactory>,
    pool: RwLock<Option<Arc<ConnectionPool>>>,
}

impl ConnectionManager {
    pub fn new(factory: Arc<dyn ConnectionFactory>) -> Self {
        Self {
            factory,
            pool: RwLock::new(None),
        }
    }

    pub fn initialize(&self, config: ConnectionConfig) -> Result<()> {
        let mut slot = self.pool.write()?;

        if let Some(pool) = slot.as_ref() {
            if pool.config() == &config {
                return Ok(());
            }
            return Err(ObjectError::AlreadyInitialized);
        }

        let pool = ConnectionPool::new(config, Arc::clone(&self.factory))?;
        info!(
            backend = self.factory.backend_name(),
            url = %pool.config().to_url(),
            max_connections = pool.config().max_connections,
            "connection manager initialized"
        );
        *slot = Some(Arc::new(pool));
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.pool.read().map(|slot| slot.is_some()).unwrap_or(false)
    }

    /// Borrow a connection. Blocks up to the configured acquire timeout when
    /// every connection is checked out.
    pub fn acquire(&self) -> Result<PoolGuard> {
        // The slot lock is released before blocking on the pool.
        let pool = self.pool()?;
        pool.get_connection()
    }

    /// Return a connection to the pool. Dropping the handle does the same.
    pub fn release(&self, handle: PoolGuard) {
        drop(handle);
    }

    pub fn shutdown(&self) -> Result<()> {
        let pool = self.pool.write()?.take();
        if let Some(pool) = pool {
            pool.close()?;
            info!("connection manager shut down");
        }
        Ok(())
    }

    pub fn stats(&self) -> Result<PoolStats> {
        self.pool()?.stats()
    }

    pub fn config(&self) -> Result<ConnectionConfig> {
        Ok(self.pool()?.config().clone())
    }

    fn pool(&self) -> Result<Arc<ConnectionPool>> {
        self.pool
            .read()?
            .as_ref()
            .map(Arc::clone)
            .ok_or(ObjectError::NotInitialized)
    }
}
