pub mod model;
pub mod naming;
pub mod registry;

use crate::core::{FieldType, ObjectError, Result, Value};
use naming::{quote_identifier, table_name_for, validate_identifier};
use std::collections::HashMap;

pub use model::ObjectModel;
pub use registry::SchemaRegistry;

/// One field of an object type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDef {
    pub name: String,
    pub field_type: FieldType,
    pub is_key: bool,
}

impl FieldDef {
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            is_key: false,
        }
    }

    pub fn key(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            is_key: true,
        }
    }
}

/// Validated description of an object type: ordered fields and exactly one key.
#[derive(Debug, Clone)]
pub struct Schema {
    type_name: String,
    table_name: String,
    fields: Vec<FieldDef>,
    key_index: usize,
    /// Field name -> position in `fields`
    index: HashMap<String, usize>,
}

impl Schema {
    pub fn new(type_name: impl Into<String>, fields: Vec<FieldDef>) -> Result<Self> {
        let type_name = type_name.into();
        validate_identifier("type", &type_name)?;

        if fields.is_empty() {
            return Err(ObjectError::InvalidSchema(format!(
                "type '{}' has no fields",
                type_name
            )));
        }

        let mut index = HashMap::with_capacity(fields.len());
        let mut folded = HashMap::with_capacity(fields.len());
        for (i, field) in fields.iter().enumerate() {
            validate_identifier("field", &field.name)?;
            // Column names are case-insensitive in SQL
            if let Some(previous) = folded.insert(field.name.to_ascii_lowercase(), &field.name) {
                return Err(ObjectError::InvalidSchema(format!(
                    "type '{}' declares field '{}' twice (as '{}')",
                    type_name, field.name, previous
                )));
            }
            index.insert(field.name.clone(), i);
        }

        let keys: Vec<usize> = fields
            .iter()
            .enumerate()
            .filter(|(_, f)| f.is_key)
            .map(|(i, _)| i)
            .collect();
        let key_index = match keys.as_slice() {
            [single] => *single,
            [] => {
                return Err(ObjectError::InvalidSchema(format!(
                    "type '{}' has no key field",
                    type_name
                )));
            }
            _ => {
                return Err(ObjectError::InvalidSchema(format!(
                    "type '{}' has {} key fields, composite keys are not supported",
                    type_name,
                    keys.len()
                )));
            }
        };

        Ok(Self {
            table_name: table_name_for(&type_name),
            type_name,
            fields,
            key_index,
            index,
        })
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    pub fn fields(&self) -> &[FieldDef] {
        &self.fields
    }

    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    pub fn key_index(&self) -> usize {
        self.key_index
    }

    pub fn key_field(&self) -> &FieldDef {
        &self.fields[self.key_index]
    }

    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.field_index(name).map(|i| &self.fields[i])
    }

    /// Like [`field_index`](Self::field_index) but fails with `UnknownField`.
    pub fn require_field(&self, name: &str) -> Result<usize> {
        self.field_index(name)
            .ok_or_else(|| ObjectError::UnknownField(name.to_string(), self.type_name.clone()))
    }

    /// Convert `key` to the key field's type, failing with `TypeMismatch`.
    pub fn coerce_key(&self, key: Value) -> Result<Value> {
        let field = self.key_field();
        if !field.field_type.is_compatible(&key) {
            return Err(ObjectError::TypeMismatch(format!(
                "key '{}' of '{}' is {}, got {}",
                field.name,
                self.type_name,
                field.field_type,
                key.type_name()
            )));
        }
        field.field_type.coerce(key)
    }

    /// Non-key fields with their positions, in declaration order.
    pub fn non_key_fields(&self) -> impl Iterator<Item = (usize, &FieldDef)> {
        self.fields
            .iter()
            .enumerate()
            .filter(|(_, field)| !field.is_key)
    }

    /// DDL for the backing table.
    pub fn create_table_sql(&self) -> String {
        let columns: Vec<String> = self
            .fields
            .iter()
            .map(|field| {
                let mut col = format!(
                    "{} {}",
                    quote_identifier(&field.name),
                    field.field_type.sql_type()
                );
                if field.is_key {
                    col.push_str(" PRIMARY KEY");
                }
                col.push_str(" NOT NULL");
                col
            })
            .collect();

        format!(
            "CREATE TABLE IF NOT EXISTS {} ({})",
            quote_identifier(&self.table_name),
            columns.join(", ")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn character_fields() -> Vec<FieldDef> {
        vec![
            FieldDef::key("Name", FieldType::String),
            FieldDef::new("Level", FieldType::Integer),
            FieldDef::new("Hp", FieldType::Integer),
        ]
    }

    #[test]
    fn test_single_key_schema() {
        let schema = Schema::new("Character", character_fields()).unwrap();
        assert_eq!(schema.table_name(), "obj_character");
        assert_eq!(schema.key_field().name, "Name");
        assert_eq!(schema.field_index("Hp"), Some(2));
        assert_eq!(
            schema.non_key_fields().map(|(_, f)| f.name.as_str()).collect::<Vec<_>>(),
            vec!["Level", "Hp"]
        );
    }

    #[test]
    fn test_key_count_is_enforced() {
        let no_key = vec![FieldDef::new("Level", FieldType::Integer)];
        assert!(matches!(
            Schema::new("Character", no_key),
            Err(ObjectError::InvalidSchema(_))
        ));

        let two_keys = vec![
            FieldDef::key("Name", FieldType::String),
            FieldDef::key("Id", FieldType::Integer),
        ];
        assert!(matches!(
            Schema::new("Character", two_keys),
            Err(ObjectError::InvalidSchema(_))
        ));
    }

    #[test]
    fn test_duplicate_fields_rejected_case_insensitively() {
        let mut fields = character_fields();
        fields.push(FieldDef::new("level", FieldType::Integer));
        let err = Schema::new("Character", fields).unwrap_err();
        assert!(err.to_string().contains("twice"));
    }

    #[test]
    fn test_empty_schema_rejected() {
        assert!(Schema::new("Empty", Vec::new()).is_err());
    }

    #[test]
    fn test_float_key_accepted() {
        let schema = Schema::new("Waypoint", vec![FieldDef::key("X", FieldType::Float)]).unwrap();
        assert_eq!(schema.coerce_key(Value::Integer(3)).unwrap(), Value::Float(3.0));
        assert!(matches!(
            schema.coerce_key(Value::Float(f64::NAN)),
            Err(ObjectError::TypeMismatch(_))
        ));
    }

    #[test]
    fn test_require_field() {
        let schema = Schema::new("Character", character_fields()).unwrap();
        assert_eq!(schema.require_field("Level").unwrap(), 1);
        assert!(matches!(
            schema.require_field("Mp"),
            Err(ObjectError::UnknownField(field, ty)) if field == "Mp" && ty == "Character"
        ));
    }

    #[test]
    fn test_create_table_sql() {
        let schema = Schema::new("Character", character_fields()).unwrap();
        assert_eq!(
            schema.create_table_sql(),
            "CREATE TABLE IF NOT EXISTS \"obj_character\" (\"Name\" TEXT PRIMARY KEY NOT NULL, \
             \"Level\" INTEGER NOT NULL, \"Hp\" INTEGER NOT NULL)"
        );
    }
}
