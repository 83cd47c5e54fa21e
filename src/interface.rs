use thiserror::Error;
use crate::connection::config::ConnectionConfig;
use crate::core::{FieldType, ObjectError, Result, Value};
use crate::result::QueryResult;

/// Failure reported by a relational transport.
///
/// The persistence engine turns these into [`ObjectError`]s with the type and
/// key of the object involved.
#[derive(Error, Debug)]
pub enum TransportError {
    /// A primary key or unique constraint rejected the statement.
    #[error("unique constraint violation: {0}")]
    UniqueViolation(String),

    /// Any other constraint (NOT NULL, CHECK, ...) rejected the statement.
    #[error("constraint violation: {0}")]
    Constraint(String),

    /// The statement failed; the connection is still usable.
    #[error("{0}")]
    Statement(String),

    /// The connection itself is unusable and must not go back to the pool.
    #[error("connection broken: {0}")]
    Broken(String),
}

impl TransportError {
    pub fn is_broken(&self) -> bool {
        matches!(self, Self::Broken(_))
    }
}

impl From<TransportError> for ObjectError {
    fn from(err: TransportError) -> Self {
        ObjectError::StorageError(err.to_string())
    }
}

/// A single connection to a relational database.
///
/// Implement this to run the object store on top of another SQL engine.
/// Statements use `?N` positional placeholders and every value is bound,
/// never spliced into the SQL text.
pub trait SqlConnection: Send {
    /// Execute a statement that modifies data (INSERT, UPDATE, DELETE, DDL).
    /// Returns the number of affected rows.
    fn execute(&mut self, sql: &str, params: &[Value]) -> std::result::Result<u64, TransportError>;

    /// Execute a query that returns rows, decoding column `i` as `column_types[i]`.
    fn query(
        &mut self,
        sql: &str,
        params: &[Value],
        column_types: &[FieldType],
    ) -> std::result::Result<QueryResult, TransportError>;

    /// Check if the connection is alive
    fn ping(&mut self) -> std::result::Result<(), TransportError>;
}

/// A factory for transport connections, used by the connection pool.
pub trait ConnectionFactory: Send + Sync {
    /// Open a new connection described by `config`.
    fn connect(&self, config: &ConnectionConfig) -> Result<Box<dyn SqlConnection>>;

    /// Short name of the backend, for logs.
    fn backend_name(&self) -> &'static str;
}
