use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;
use crate::core::{ObjectError, Result};

/// A typed field value.
///
/// Fields never hold NULL: a new object starts with the default of each
/// field's declared type.
#[derive(Debug, Clone)]
pub enum Value {
    String(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Blob(Vec<u8>),
}

impl Value {
    pub fn field_type(&self) -> FieldType {
        match self {
            Self::String(_) => FieldType::String,
            Self::Integer(_) => FieldType::Integer,
            Self::Float(_) => FieldType::Float,
            Self::Boolean(_) => FieldType::Boolean,
            Self::Blob(_) => FieldType::Blob,
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.field_type().name()
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(f) => Some(*f),
            Self::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_blob(&self) -> Option<&[u8]> {
        match self {
            Self::Blob(b) => Some(b),
            _ => None,
        }
    }

    /// Rendering used in error messages and logs. Strings are quoted so that
    /// `'42'` and `42` stay distinguishable.
    pub fn to_key_string(&self) -> String {
        match self {
            Self::String(s) => format!("'{}'", s),
            Self::Blob(b) => format!("x'{}'", hex::encode(b)),
            other => other.to_string(),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::String(a), Self::String(b)) => a == b,
            (Self::Integer(a), Self::Integer(b)) => a == b,
            // Bitwise so that Eq and Hash agree, NaN included
            (Self::Float(a), Self::Float(b)) => a.to_bits() == b.to_bits(),
            (Self::Boolean(a), Self::Boolean(b)) => a == b,
            (Self::Blob(a), Self::Blob(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            Self::String(s) => {
                0u8.hash(state);
                s.hash(state);
            }
            Self::Integer(i) => {
                1u8.hash(state);
                i.hash(state);
            }
            Self::Float(f) => {
                2u8.hash(state);
                f.to_bits().hash(state);
            }
            Self::Boolean(b) => {
                3u8.hash(state);
                b.hash(state);
            }
            Self::Blob(b) => {
                4u8.hash(state);
                b.hash(state);
            }
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(s) => write!(f, "{}", s),
            Self::Integer(i) => write!(f, "{}", i),
            Self::Float(fl) => write!(f, "{}", fl),
            Self::Boolean(b) => write!(f, "{}", b),
            Self::Blob(b) => write!(f, "x'{}'", hex::encode(b)),
        }
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Integer(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Self::Integer(i64::from(i))
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Self::Float(f)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Boolean(b)
    }
}

impl From<Vec<u8>> for Value {
    fn from(b: Vec<u8>) -> Self {
        Self::Blob(b)
    }
}

impl From<&[u8]> for Value {
    fn from(b: &[u8]) -> Self {
        Self::Blob(b.to_vec())
    }
}

/// Declared type of a schema field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldType {
    String,
    Integer,
    Float,
    Boolean,
    Blob,
}

impl FieldType {
    pub fn name(&self) -> &'static str {
        match self {
            Self::String => "String",
            Self::Integer => "Integer",
            Self::Float => "Float",
            Self::Boolean => "Boolean",
            Self::Blob => "Blob",
        }
    }

    pub fn is_compatible(&self, value: &Value) -> bool {
        matches!(
            (self, value),
            (Self::String, Value::String(_))
                | (Self::Integer, Value::Integer(_))
                | (Self::Float, Value::Float(_))
                | (Self::Float, Value::Integer(_)) // Integer -> Float widening
                | (Self::Boolean, Value::Boolean(_))
                | (Self::Blob, Value::Blob(_))
        )
    }

    /// Converts `value` into this type, widening integers into float fields.
    ///
    /// NaN and infinities are refused: the relational store cannot hold them
    /// in a NOT NULL column.
    pub fn coerce(&self, value: Value) -> Result<Value> {
        match (self, value) {
            (Self::Float, Value::Integer(i)) => Ok(Value::Float(i as f64)),
            (Self::Float, Value::Float(f)) if !f.is_finite() => Err(ObjectError::TypeMismatch(
                format!("expected a finite Float, got {}", f),
            )),
            (ty, value) if ty.is_compatible(&value) => Ok(value),
            (ty, value) => Err(ObjectError::TypeMismatch(format!(
                "expected {}, got {}",
                ty,
                value.type_name()
            ))),
        }
    }

    pub fn default_value(&self) -> Value {
        match self {
            Self::String => Value::String(String::new()),
            Self::Integer => Value::Integer(0),
            Self::Float => Value::Float(0.0),
            Self::Boolean => Value::Boolean(false),
            Self::Blob => Value::Blob(Vec::new()),
        }
    }

    /// Column type used in generated DDL.
    pub fn sql_type(&self) -> &'static str {
        match self {
            Self::String => "TEXT",
            Self::Integer | Self::Boolean => "INTEGER",
            Self::Float => "REAL",
            Self::Blob => "BLOB",
        }
    }

    /// Parses a textual literal (command line, config files) into a value of this type.
    ///
    /// Blobs are written as hex, optionally prefixed with `0x`.
    pub fn parse_value(&self, text: &str) -> Result<Value> {
        let mismatch = || ObjectError::TypeMismatch(format!("'{}' is not a valid {}", text, self));
        match self {
            Self::String => Ok(Value::String(text.to_string())),
            Self::Integer => text.trim().parse::<i64>().map(Value::Integer).map_err(|_| mismatch()),
            Self::Float => text
                .trim()
                .parse::<f64>()
                .map_err(|_| mismatch())
                .and_then(|f| self.coerce(Value::Float(f))),
            Self::Boolean => match text.trim().to_ascii_lowercase().as_str() {
                "true" | "1" | "yes" => Ok(Value::Boolean(true)),
                "false" | "0" | "no" => Ok(Value::Boolean(false)),
                _ => Err(mismatch()),
            },
            Self::Blob => {
                let digits = text.trim().trim_start_matches("0x");
                hex::decode(digits).map(Value::Blob).map_err(|_| mismatch())
            }
        }
    }
}

impl FromStr for FieldType {
    type Err = ObjectError;

    /// Accepts the type tags of the object-model description, case-insensitively.
    fn from_str(tag: &str) -> Result<Self> {
        match tag.to_ascii_lowercase().as_str() {
            "string" | "text" => Ok(Self::String),
            "integer" | "int" | "integer8" | "integer16" | "integer32" | "integer64" => {
                Ok(Self::Integer)
            }
            "float" | "double" => Ok(Self::Float),
            "bool" | "boolean" => Ok(Self::Boolean),
            "blob" | "bytes" => Ok(Self::Blob),
            _ => Err(ObjectError::InvalidSchema(format!("unknown field type '{}'", tag))),
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_equality_is_type_strict() {
        assert_eq!(Value::Integer(42), Value::Integer(42));
        assert_eq!(Value::Float(f64::NAN), Value::Float(f64::NAN));
        assert_ne!(Value::Integer(1), Value::Float(1.0));
        assert_ne!(Value::from("1"), Value::Integer(1));
    }

    #[test]
    fn test_field_accepts_values() {
        assert!(FieldType::Integer.is_compatible(&Value::Integer(42)));
        assert!(FieldType::Float.is_compatible(&Value::Integer(42)));
        assert!(!FieldType::Integer.is_compatible(&Value::Float(1.5)));
        assert!(!FieldType::String.is_compatible(&Value::Boolean(true)));
    }

    #[test]
    fn test_coerce_widens_integers() {
        assert_eq!(FieldType::Float.coerce(Value::Integer(3)).unwrap(), Value::Float(3.0));
        assert!(matches!(
            FieldType::Boolean.coerce(Value::Integer(1)),
            Err(ObjectError::TypeMismatch(_))
        ));
    }

    #[test]
    fn test_non_finite_floats_rejected() {
        for f in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            assert!(matches!(
                FieldType::Float.coerce(Value::Float(f)),
                Err(ObjectError::TypeMismatch(_))
            ));
        }
        assert!(FieldType::Float.parse_value("NaN").is_err());
        assert!(FieldType::Float.parse_value("inf").is_err());
        assert_eq!(FieldType::Float.parse_value("-0.5").unwrap(), Value::Float(-0.5));
    }

    #[test]
    fn test_type_tags() {
        assert_eq!("Integer32".parse::<FieldType>().unwrap(), FieldType::Integer);
        assert_eq!("double".parse::<FieldType>().unwrap(), FieldType::Float);
        assert_eq!("BOOL".parse::<FieldType>().unwrap(), FieldType::Boolean);
        assert!("Datetime".parse::<FieldType>().is_err());
    }

    #[test]
    fn test_parse_value() {
        assert_eq!(FieldType::Integer.parse_value(" 7 ").unwrap(), Value::Integer(7));
        assert_eq!(FieldType::Boolean.parse_value("yes").unwrap(), Value::Boolean(true));
        assert_eq!(
            FieldType::Blob.parse_value("0xdead").unwrap(),
            Value::Blob(vec![0xde, 0xad])
        );
        assert!(FieldType::Blob.parse_value("abc").is_err());
        assert!(FieldType::Blob.parse_value("zz").is_err());
        assert!(FieldType::Integer.parse_value("seven").is_err());
    }

    #[test]
    fn test_key_string_quotes_text() {
        assert_eq!(Value::from("hero1").to_key_string(), "'hero1'");
        assert_eq!(Value::Integer(9).to_key_string(), "9");
        assert_eq!(Value::Blob(vec![1, 255]).to_key_string(), "x'01ff'");
    }
}
