pub mod error;
pub mod value;

pub use error::{ObjectError, Result};
pub use value::{FieldType, Value};

pub type Row = Vec<Value>;
