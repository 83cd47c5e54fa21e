use crate::core::{ObjectError, Result};
use lazy_static::lazy_static;
use regex::Regex;

const MAX_IDENTIFIER_LEN: usize = 64;

lazy_static! {
    static ref IDENTIFIER: Regex = Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap();
}

/// Checks that `name` can be used as a table or column name as-is.
///
/// Type and field names become SQL identifiers, so they are restricted to
/// ASCII letters, digits and underscores.
pub fn validate_identifier(kind: &str, name: &str) -> Result<()> {
    if name.len() > MAX_IDENTIFIER_LEN {
        return Err(ObjectError::InvalidSchema(format!(
            "{} name '{}' is longer than {} characters",
            kind, name, MAX_IDENTIFIER_LEN
        )));
    }
    if !IDENTIFIER.is_match(name) {
        return Err(ObjectError::InvalidSchema(format!(
            "{} name '{}' must match [A-Za-z_][A-Za-z0-9_]*",
            kind, name
        )));
    }
    Ok(())
}

/// Double-quotes a validated identifier.
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Table backing objects of `type_name`.
///
/// Format: `obj_<lowercased type>`
pub fn table_name_for(type_name: &str) -> String {
    format!("obj_{}", type_name.to_ascii_lowercase())
}
