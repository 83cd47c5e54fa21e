use thiserror::Error;

#[derive(Error, Debug)]
pub enum ObjectError {
    #[error("No configuration found for application '{0}'")]
    ConfigNotFound(String),

    #[error("Invalid configuration: {0}")]
    ConfigInvalid(String),

    #[error("Object store is not initialized")]
    NotInitialized,

    #[error("Object store is already initialized with a different configuration")]
    AlreadyInitialized,

    #[error("Connection pool timeout: no connection available after {0:?}")]
    PoolTimeout(std::time::Duration),

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Duplicate key {key} for type '{type_name}'")]
    DuplicateKey { type_name: String, key: String },

    #[error("Key {key} is already held by an uncommitted '{type_name}' in this scope")]
    DuplicateKeyLocal { type_name: String, key: String },

    #[error("No '{type_name}' with key {key}")]
    NotFound { type_name: String, key: String },

    #[error("Key {key} matched {rows} rows of '{type_name}'")]
    AmbiguousKey {
        type_name: String,
        key: String,
        rows: usize,
    },

    #[error("Type '{0}' is not registered")]
    UnknownType(String),

    #[error("Field '{0}' not found in type '{1}'")]
    UnknownField(String, String),

    #[error("Type mismatch: {0}")]
    TypeMismatch(String),

    #[error("Key field '{0}' cannot change once the object is persisted")]
    ImmutableKeyField(String),

    #[error("Object '{type_name}' with key {key} was already deleted")]
    AlreadyDeleted { type_name: String, key: String },

    #[error("Type '{0}' is already registered")]
    DuplicateType(String),

    #[error("Invalid schema: {0}")]
    InvalidSchema(String),
}

impl ObjectError {
    /// Transport failures and pool exhaustion may succeed on a later attempt.
    /// Everything else is a logic or data error.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::StorageError(_) | Self::PoolTimeout(_))
    }
}

pub type Result<T> = std::result::Result<T, ObjectError>;

impl<T> From<std::sync::PoisonError<T>> for ObjectError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        Self::StorageError(format!("lock poisoned: {}", err))
    }
}
