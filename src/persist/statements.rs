//! SQL text for the per-object statements.
//!
//! Identifiers come from validated schemas and are quoted. Values are always
//! bound as `?N` parameters, never spliced into the text.

use crate::core::Value;
use crate::schema::Schema;
use crate::schema::naming::quote_identifier;

/// SQL text plus its bound parameters, in placeholder order.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<Value>,
}

/// Most rows a key lookup reads. Two is enough to tell one row from many.
pub const KEY_LOOKUP_LIMIT: usize = 2;

pub fn insert(schema: &Schema, values: &[Value]) -> Statement {
    let columns: Vec<String> = schema
        .fields()
        .iter()
        .map(|field| quote_identifier(&field.name))
        .collect();
    let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("?{}", i)).collect();

    Statement {
        sql: format!(
            "INSERT INTO {} ({}) VALUES ({})",
            quote_identifier(schema.table_name()),
            columns.join(", "),
            placeholders.join(", ")
        ),
        params: values.to_vec(),
    }
}

pub fn select_by_key(schema: &Schema, key: &Value) -> Statement {
    Statement {
        sql: format!(
            "SELECT {} FROM {} WHERE {} = ?1 LIMIT {}",
            column_list(schema),
            quote_identifier(schema.table_name()),
            quote_identifier(&schema.key_field().name),
            KEY_LOOKUP_LIMIT
        ),
        params: vec![key.clone()],
    }
}

pub fn count_by_key(schema: &Schema, key: &Value) -> Statement {
    Statement {
        sql: format!(
            "SELECT COUNT(*) FROM {} WHERE {} = ?1",
            quote_identifier(schema.table_name()),
            quote_identifier(&schema.key_field().name)
        ),
        params: vec![key.clone()],
    }
}

pub fn count_all(schema: &Schema) -> Statement {
    Statement {
        sql: format!("SELECT COUNT(*) FROM {}", quote_identifier(schema.table_name())),
        params: Vec::new(),
    }
}

/// `UPDATE` writing the fields at `columns`, matched on the key.
///
/// `columns` must be non-empty and must not contain the key position.
pub fn update(schema: &Schema, columns: &[usize], values: &[Value]) -> Statement {
    let fields = schema.fields();
    let assignments: Vec<String> = columns
        .iter()
        .enumerate()
        .map(|(n, &i)| format!("{} = ?{}", quote_identifier(&fields[i].name), n + 1))
        .collect();

    let mut params: Vec<Value> = columns.iter().map(|&i| values[i].clone()).collect();
    params.push(values[schema.key_index()].clone());

    Statement {
        sql: format!(
            "UPDATE {} SET {} WHERE {} = ?{}",
            quote_identifier(schema.table_name()),
            assignments.join(", "),
            quote_identifier(&schema.key_field().name),
            params.len()
        ),
        params,
    }
}

pub fn delete(schema: &Schema, key: &Value) -> Statement {
    Statement {
        sql: format!(
            "DELETE FROM {} WHERE {} = ?1",
            quote_identifier(schema.table_name()),
            quote_identifier(&schema.key_field().name)
        ),
        params: vec![key.clone()],
    }
}

fn column_list(schema: &Schema) -> String {
    schema
        .fields()
        .iter()
        .map(|field| quote_identifier(&field.name))
        .collect::<Vec<_>>()
        .join(", ")
}
