use super::config::ConnectionConfig;
use crate::core::{FieldType, ObjectError, Result, Value};
use crate::interface::{ConnectionFactory, SqlConnection, TransportError};
use crate::result::QueryResult;
use rusqlite::types::{ToSql, ToSqlOutput, ValueRef};
use rusqlite::{ErrorCode, OpenFlags, ffi, params_from_iter};

type TransportResult<T> = std::result::Result<T, TransportError>;

/// Opens SQLite connections.
///
/// `database` is a file path, or `memory:<name>` for a named in-memory
/// database shared by every connection of the process. Host, port and
/// credentials are not used by this backend.
#[derive(Debug, Default, Clone, Copy)]
pub struct SqliteFactory;

impl ConnectionFactory for SqliteFactory {
    fn connect(&self, config: &ConnectionConfig) -> Result<Box<dyn SqlConnection>> {
        let open_failed = |err: rusqlite::Error| {
            ObjectError::StorageError(format!("cannot open '{}': {}", config.database, err))
        };

        let conn = match config.database.strip_prefix("memory:") {
            Some(name) => rusqlite::Connection::open_with_flags(
                format!("file:{}?mode=memory&cache=shared", name),
                OpenFlags::SQLITE_OPEN_READ_WRITE
                    | OpenFlags::SQLITE_OPEN_CREATE
                    | OpenFlags::SQLITE_OPEN_URI
                    | OpenFlags::SQLITE_OPEN_NO_MUTEX,
            )
            .map_err(open_failed)?,
            None => rusqlite::Connection::open(&config.database).map_err(open_failed)?,
        };

        if let Some(timeout) = config.statement_timeout {
            conn.busy_timeout(timeout).map_err(open_failed)?;
        }

        if !config.database.starts_with("memory:") {
            // WAL lets readers proceed while another connection writes
            conn.query_row("PRAGMA journal_mode=WAL", [], |_| Ok(()))
                .map_err(open_failed)?;
        }

        Ok(Box::new(SqliteConnection { conn }))
    }

    fn backend_name(&self) -> &'static str {
        "sqlite"
    }
}

/// One SQLite connection. Statements are prepared once and cached per connection.
pub struct SqliteConnection {
    conn: rusqlite::Connection,
}

impl SqlConnection for SqliteConnection {
    fn execute(&mut self, sql: &str, params: &[Value]) -> TransportResult<u64> {
        let mut stmt = self.conn.prepare_cached(sql).map_err(map_error)?;
        let affected = stmt.execute(params_from_iter(params.iter())).map_err(map_error)?;
        Ok(affected as u64)
    }

    fn query(
        &mut self,
        sql: &str,
        params: &[Value],
        column_types: &[FieldType],
    ) -> TransportResult<QueryResult> {
        let mut stmt = self.conn.prepare_cached(sql).map_err(map_error)?;
        let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();

        let mut rows = stmt.query(params_from_iter(params.iter())).map_err(map_error)?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().map_err(map_error)? {
            let mut values = Vec::with_capacity(column_types.len());
            for (i, ty) in column_types.iter().enumerate() {
                let raw = row.get_ref(i).map_err(map_error)?;
                let column = columns.get(i).map(String::as_str).unwrap_or("?");
                values.push(decode(raw, *ty, column)?);
            }
            out.push(values);
        }

        Ok(QueryResult::new(columns, out))
    }

    fn ping(&mut self) -> TransportResult<()> {
        self.conn
            .query_row("SELECT 1", [], |_| Ok(()))
            .map_err(map_error)
    }
}

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        use rusqlite::types::Value as Sql;

        Ok(match self {
            Value::String(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
            Value::Integer(i) => ToSqlOutput::Owned(Sql::Integer(*i)),
            Value::Float(f) => ToSqlOutput::Owned(Sql::Real(*f)),
            Value::Boolean(b) => ToSqlOutput::Owned(Sql::Integer(i64::from(*b))),
            Value::Blob(b) => ToSqlOutput::Borrowed(ValueRef::Blob(b)),
        })
    }
}

fn decode(raw: ValueRef<'_>, ty: FieldType, column: &str) -> TransportResult<Value> {
    let value = match (ty, raw) {
        (FieldType::String, ValueRef::Text(bytes)) => std::str::from_utf8(bytes)
            .ok()
            .map(|s| Value::String(s.to_string())),
        (FieldType::Integer, ValueRef::Integer(i)) => Some(Value::Integer(i)),
        (FieldType::Float, ValueRef::Real(f)) => Some(Value::Float(f)),
        (FieldType::Float, ValueRef::Integer(i)) => Some(Value::Float(i as f64)),
        (FieldType::Boolean, ValueRef::Integer(i)) => Some(Value::Boolean(i != 0)),
        (FieldType::Blob, ValueRef::Blob(bytes)) => Some(Value::Blob(bytes.to_vec())),
        _ => None,
    };

    value.ok_or_else(|| {
        TransportError::Statement(format!(
            "column '{}' holds {:?}, expected {}",
            column,
            raw.data_type(),
            ty
        ))
    })
}

fn map_error(err: rusqlite::Error) -> TransportError {
    match &err {
        rusqlite::Error::SqliteFailure(failure, _) => match failure.code {
            ErrorCode::ConstraintViolation => match failure.extended_code {
                ffi::SQLITE_CONSTRAINT_PRIMARYKEY | ffi::SQLITE_CONSTRAINT_UNIQUE => {
                    TransportError::UniqueViolation(err.to_string())
                }
                _ => TransportError::Constraint(err.to_string()),
            },
            ErrorCode::CannotOpen
            | ErrorCode::NotADatabase
            | ErrorCode::DatabaseCorrupt
            | ErrorCode::SystemIoFailure => TransportError::Broken(err.to_string()),
            _ => TransportError::Statement(err.to_string()),
        },
        _ => TransportError::Statement(err.to_string()),
    }
}
