pub mod config;
pub mod manager;
pub mod pool;
pub mod sqlite;

use crate::core::{FieldType, Value};
use crate::interface::{SqlConnection, TransportError};
use crate::result::QueryResult;
use tracing::warn;

type TransportResult<T> = std::result::Result<T, TransportError>;

/// Database connection handle
///
/// Wraps one transport connection owned by the pool. A connection that
/// reported a broken transport is marked and discarded on release instead of
/// being handed to the next caller.
pub struct Connection {
    /// Unique connection ID
    id: u64,
    /// Backend connection
    inner: Box<dyn SqlConnection>,
    broken: bool,
}

impl Connection {
    /// Create a new connection (internal use)
    pub(crate) fn new(id: u64, inner: Box<dyn SqlConnection>) -> Self {
        Self {
            id,
            inner,
            broken: false,
        }
    }

    /// Get connection ID
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Execute a statement that doesn't return rows (INSERT, UPDATE, DELETE, CREATE, etc.)
    ///
    /// Returns the number of affected rows
    pub fn execute(&mut self, sql: &str, params: &[Value]) -> TransportResult<u64> {
        let result = self.inner.execute(sql, params);
        self.track(result)
    }

    /// Execute a query and decode each column as the given type
    pub fn query(
        &mut self,
        sql: &str,
        params: &[Value],
        column_types: &[FieldType],
    ) -> TransportResult<QueryResult> {
        let result = self.inner.query(sql, params, column_types);
        self.track(result)
    }

    /// Check that the backend still answers
    pub fn ping(&mut self) -> TransportResult<()> {
        let result = self.inner.ping();
        self.track(result)
    }

    /// Run `body` between BEGIN and COMMIT, rolling back if it fails.
    ///
    /// A failed COMMIT is rolled back too. If that rollback fails as well
    /// the connection is marked broken, so the pool never hands out a
    /// connection with a transaction still open.
    ///
    /// # Examples
    ///
    /// ```ignore
    /// conn.transaction(|conn| {
    ///     conn.execute("CREATE TABLE a (id INTEGER)", &[])?;
    ///     conn.execute("CREATE TABLE b (id INTEGER)", &[])?;
    ///     Ok(())
    /// })?;
    /// ```
    pub fn transaction<T, E>(
        &mut self,
        body: impl FnOnce(&mut Connection) -> std::result::Result<T, E>,
    ) -> std::result::Result<T, E>
    where
        E: From<TransportError>,
    {
        self.execute("BEGIN", &[])?;
        match body(self) {
            Ok(value) => match self.execute("COMMIT", &[]) {
                Ok(_) => Ok(value),
                Err(commit_err) => {
                    warn!(connection = self.id, error = %commit_err, "commit failed, rolling back");
                    self.rollback();
                    Err(commit_err.into())
                }
            },
            Err(err) => {
                self.rollback();
                Err(err)
            }
        }
    }

    fn rollback(&mut self) {
        if let Err(err) = self.execute("ROLLBACK", &[]) {
            warn!(connection = self.id, error = %err, "rollback failed, discarding connection");
            self.broken = true;
        }
    }

    /// Check if the transport reported this connection as unusable
    pub fn is_broken(&self) -> bool {
        self.broken
    }

    fn track<T>(&mut self, result: TransportResult<T>) -> TransportResult<T> {
        if let Err(err) = &result {
            if err.is_broken() {
                self.broken = true;
            }
        }
        result
    }
}
