use super::{Connection, config::ConnectionConfig};
use crate::core::{ObjectError, Result};
use crate::interface::ConnectionFactory;
use std::collections::VecDeque;
use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Bounded set of backend connections shared by every store operation.
///
/// Bookkeeping lives behind one mutex; the connections themselves are used
/// without holding it, so distinct handles run statements in parallel.
pub struct ConnectionPool {
    config: ConnectionConfig,
    /// Opens new backend connections
    factory: Arc<dyn ConnectionFactory>,
    shared: Arc<PoolShared>,
}

struct PoolShared {
    state: Mutex<PoolState>,
    /// Signalled whenever a connection or a connection slot is freed
    released: Condvar,
}

struct PoolState {
    idle: VecDeque<PooledConnection>,
    /// Connections created and not yet discarded, idle or checked out
    total: usize,
    next_id: u64,
    closed: bool,
}

/// An idle connection and its age stamps
struct PooledConnection {
    connection: Connection,
    created_at: Instant,
    last_used: Instant,
}

impl PooledConnection {
    fn new(connection: Connection) -> Self {
        let now = Instant::now();
        Self {
            connection,
            created_at: now,
            last_used: now,
        }
    }

    fn is_stale(&self, config: &ConnectionConfig) -> bool {
        let too_old = config
            .max_lifetime
            .is_some_and(|lifetime| self.created_at.elapsed() > lifetime);
        let idle_too_long = config
            .idle_timeout
            .is_some_and(|timeout| self.last_used.elapsed() > timeout);
        too_old || idle_too_long
    }
}

impl ConnectionPool {
    /// Validates `config` and opens `min_connections` up front
    pub fn new(config: ConnectionConfig, factory: Arc<dyn ConnectionFactory>) -> Result<Self> {
        config.validate()?;

        let pool = Self {
            config,
            factory,
            shared: Arc::new(PoolShared {
                state: Mutex::new(PoolState {
                    idle: VecDeque::new(),
                    total: 0,
                    next_id: 1,
                    closed: false,
                }),
                released: Condvar::new(),
            }),
        };

        pool.ensure_min_connections()?;

        Ok(pool)
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// Check out a connection, reusing an idle one or opening a new one.
    ///
    /// Blocks while the pool is exhausted, up to `acquire_timeout`, then fails
    /// with [`ObjectError::PoolTimeout`].
    pub fn get_connection(&self) -> Result<PoolGuard> {
        let deadline = Instant::now() + self.config.acquire_timeout;
        let mut state = self.shared.state.lock()?;

        loop {
            if state.closed {
                return Err(ObjectError::NotInitialized);
            }

            self.evict_stale(&mut state);

            if let Some(pooled) = state.idle.pop_front() {
                return Ok(self.guard(pooled.connection, pooled.created_at));
            }

            // Reserve the slot, then connect without holding the lock
            if state.total < self.config.max_connections {
                state.total += 1;
                let id = state.next_id;
                state.next_id += 1;
                drop(state);

                return match self.factory.connect(&self.config) {
                    Ok(inner) => {
                        debug!(connection = id, backend = self.factory.backend_name(), "opened connection");
                        Ok(self.guard(Connection::new(id, inner), Instant::now()))
                    }
                    Err(err) => {
                        self.forget_slot();
                        Err(err)
                    }
                };
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(ObjectError::PoolTimeout(self.config.acquire_timeout));
            }

            let (next, _) = self.shared.released.wait_timeout(state, deadline - now)?;
            state = next;
        }
    }

    /// Return a connection to the pool.
    ///
    /// Equivalent to dropping the guard.
    pub fn release(&self, guard: PoolGuard) {
        drop(guard);
    }

    /// Close every idle connection and refuse further checkouts.
    ///
    /// Connections still checked out are discarded when their guards drop.
    pub fn close(&self) -> Result<()> {
        let mut state = self.shared.state.lock()?;
        state.closed = true;
        let closed = state.idle.len();
        state.idle.clear();
        state.total -= closed;
        self.shared.released.notify_all();
        debug!(closed, "connection pool closed");
        Ok(())
    }

    pub fn stats(&self) -> Result<PoolStats> {
        let state = self.shared.state.lock()?;

        Ok(PoolStats {
            total_connections: state.total,
            available_connections: state.idle.len(),
            active_connections: state.total.saturating_sub(state.idle.len()),
            max_connections: self.config.max_connections,
        })
    }

    fn guard(&self, connection: Connection, created_at: Instant) -> PoolGuard {
        PoolGuard {
            connection: Some(connection),
            created_at,
            shared: Arc::clone(&self.shared),
        }
    }

    fn evict_stale(&self, state: &mut PoolState) {
        let before = state.idle.len();
        state.idle.retain(|pooled| !pooled.is_stale(&self.config));
        let removed = before - state.idle.len();
        if removed > 0 {
            state.total -= removed;
            debug!(removed, "evicted stale connections");
        }
    }

    fn forget_slot(&self) {
        if let Ok(mut state) = self.shared.state.lock() {
            state.total -= 1;
        }
        self.shared.released.notify_one();
    }

    fn ensure_min_connections(&self) -> Result<()> {
        let mut state = self.shared.state.lock()?;

        while state.total < self.config.min_connections {
            let id = state.next_id;
            state.next_id += 1;

            let inner = self.factory.connect(&self.config)?;
            state
                .idle
                .push_back(PooledConnection::new(Connection::new(id, inner)));
            state.total += 1;
        }

        Ok(())
    }
}

/// Snapshot of pool occupancy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolStats {
    pub total_connections: usize,
    pub available_connections: usize,
    pub active_connections: usize,
    pub max_connections: usize,
}

impl std::fmt::Display for PoolStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} in use, {} idle, {} open of {}",
            self.active_connections,
            self.available_connections,
            self.total_connections,
            self.max_connections
        )
    }
}

/// A checked-out connection. Dropping it hands the connection back, or
/// discards it if the transport reported it broken.
pub struct PoolGuard {
    connection: Option<Connection>,
    created_at: Instant,
    shared: Arc<PoolShared>,
}

impl std::fmt::Debug for PoolGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PoolGuard")
            .field("created_at", &self.created_at)
            .finish_non_exhaustive()
    }
}

impl PoolGuard {
    pub fn connection(&mut self) -> &mut Connection {
        self
    }
}

impl Deref for PoolGuard {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        match &self.connection {
            Some(connection) => connection,
            None => unreachable!("connection is only taken in drop"),
        }
    }
}

impl DerefMut for PoolGuard {
    fn deref_mut(&mut self) -> &mut Connection {
        match &mut self.connection {
            Some(connection) => connection,
            None => unreachable!("connection is only taken in drop"),
        }
    }
}

impl Drop for PoolGuard {
    fn drop(&mut self) {
        let Some(connection) = self.connection.take() else {
            return;
        };

        // A poisoned lock means another thread panicked mid-bookkeeping; the
        // counters are still consistent since every update is a single step.
        let mut state = match self.shared.state.lock() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        };

        if connection.is_broken() || state.closed {
            if connection.is_broken() {
                warn!(connection = connection.id(), "discarding broken connection");
            }
            state.total -= 1;
        } else {
            state.idle.push_back(PooledConnection {
                connection,
                created_at: self.created_at,
                last_used: Instant::now(),
            });
        }

        self.shared.released.notify_one();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{FieldType, Value};
    use crate::interface::{SqlConnection, TransportError};
    use crate::result::QueryResult;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    struct NullConnection;

    impl SqlConnection for NullConnection {
        fn execute(&mut self, sql: &str, _params: &[Value]) -> std::result::Result<u64, TransportError> {
            match sql {
                "BREAK" => Err(TransportError::Broken("gone".into())),
                "FAIL" => Err(TransportError::Statement("bad".into())),
                _ => Ok(0),
            }
        }

        fn query(
            &mut self,
            _sql: &str,
            _params: &[Value],
            _column_types: &[FieldType],
        ) -> std::result::Result<QueryResult, TransportError> {
            Ok(QueryResult::empty())
        }

        fn ping(&mut self) -> std::result::Result<(), TransportError> {
            Ok(())
        }
    }

    #[derive(Default)]
    struct CountingFactory {
        opened: AtomicUsize,
    }

    impl ConnectionFactory for CountingFactory {
        fn connect(&self, _config: &ConnectionConfig) -> Result<Box<dyn SqlConnection>> {
            self.opened.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(NullConnection))
        }

        fn backend_name(&self) -> &'static str {
            "null"
        }
    }

    fn pool(config: ConnectionConfig) -> (ConnectionPool, Arc<CountingFactory>) {
        let factory = Arc::new(CountingFactory::default());
        let pool = ConnectionPool::new(config, factory.clone()).unwrap();
        (pool, factory)
    }

    #[test]
    fn test_min_connections_opened_up_front() {
        let (pool, factory) = pool(ConnectionConfig::new("game", "").min_connections(3).max_connections(4));
        let stats = pool.stats().unwrap();

        assert_eq!((stats.total_connections, stats.available_connections), (3, 3));
        assert_eq!(factory.opened.load(Ordering::SeqCst), 3);
        assert_eq!(stats.to_string(), "0 in use, 3 idle, 3 open of 4");
    }

    #[test]
    fn test_idle_connection_is_reused() {
        let (pool, factory) = pool(ConnectionConfig::new("game", "").min_connections(0));

        let first = pool.get_connection().unwrap();
        let first_id = first.id();
        assert_eq!(pool.stats().unwrap().active_connections, 1);
        pool.release(first);

        let again = pool.get_connection().unwrap();
        assert_eq!(again.id(), first_id);
        assert_eq!(factory.opened.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_statement_error_keeps_connection() {
        let (pool, _) = pool(ConnectionConfig::new("game", "").max_connections(1));

        {
            let mut conn = pool.get_connection().unwrap();
            assert!(conn.execute("FAIL", &[]).is_err());
        }

        let stats = pool.stats().unwrap();
        assert_eq!((stats.available_connections, stats.active_connections), (1, 0));
    }

    #[test]
    fn test_broken_connection_is_discarded() {
        let (pool, factory) = pool(ConnectionConfig::new("game", "").max_connections(1));

        {
            let mut conn = pool.get_connection().unwrap();
            assert!(conn.execute("BREAK", &[]).is_err());
        }
        assert_eq!(pool.stats().unwrap().total_connections, 0);

        let _fresh = pool.get_connection().unwrap();
        assert_eq!(factory.opened.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_exhausted_pool_times_out() {
        let config = ConnectionConfig::new("game", "")
            .max_connections(2)
            .acquire_timeout(Duration::from_millis(80));
        let (pool, _) = pool(config);

        let _a = pool.get_connection().unwrap();
        let _b = pool.get_connection().unwrap();
        assert!(matches!(pool.get_connection(), Err(ObjectError::PoolTimeout(_))));
    }

    #[test]
    fn test_waiter_wakes_on_release() {
        let config = ConnectionConfig::new("game", "")
            .max_connections(1)
            .acquire_timeout(Duration::from_secs(5));
        let (pool, _) = pool(config);
        let pool = Arc::new(pool);

        let held = pool.get_connection().unwrap();
        let waiter = {
            let pool = Arc::clone(&pool);
            thread::spawn(move || pool.get_connection().map(|conn| conn.id()))
        };

        thread::sleep(Duration::from_millis(50));
        let held_id = held.id();
        drop(held);

        assert_eq!(waiter.join().unwrap().unwrap(), held_id);
    }

    #[test]
    fn test_close_refuses_checkout() {
        let (pool, _) = pool(ConnectionConfig::new("game", "").min_connections(1));
        pool.close().unwrap();

        assert_eq!(pool.stats().unwrap().total_connections, 0);
        assert!(matches!(pool.get_connection(), Err(ObjectError::NotInitialized)));
    }

    #[test]
    fn test_stale_idle_connection_is_replaced() {
        let config = ConnectionConfig::new("game", "")
            .min_connections(1)
            .idle_timeout(Duration::from_millis(10));
        let (pool, factory) = pool(config);

        thread::sleep(Duration::from_millis(30));
        let _conn = pool.get_connection().unwrap();

        assert_eq!(factory.opened.load(Ordering::SeqCst), 2);
    }
}
