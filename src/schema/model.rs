//! Declarative object-model documents.
//!
//! ```json
//! {
//!   "Character": {
//!     "Name": "String KEY",
//!     "Level": "Integer",
//!     "Hp": "Integer"
//!   }
//! }
//! ```
//!
//! Each field descriptor is a type tag optionally followed by `KEY`. Field
//! order in the document is the column order.

use super::FieldDef;
use crate::core::{FieldType, ObjectError, Result};
use serde_json::{Map, Value as Json};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObjectModel {
    types: Vec<(String, Vec<FieldDef>)>,
}

impl ObjectModel {
    pub fn parse(text: &str) -> Result<Self> {
        let document: Map<String, Json> = serde_json::from_str(text)
            .map_err(|e| ObjectError::InvalidSchema(format!("object model is not a JSON object: {}", e)))?;

        let mut types = Vec::with_capacity(document.len());
        for (type_name, body) in &document {
            let Json::Object(fields) = body else {
                return Err(ObjectError::InvalidSchema(format!(
                    "type '{}' must map field names to descriptors",
                    type_name
                )));
            };

            let fields = fields
                .iter()
                .map(|(name, descriptor)| match descriptor {
                    Json::String(descriptor) => parse_field(name, descriptor),
                    _ => Err(ObjectError::InvalidSchema(format!(
                        "field '{}.{}' descriptor must be a string",
                        type_name, name
                    ))),
                })
                .collect::<Result<Vec<_>>>()?;

            types.push((type_name.clone(), fields));
        }

        Ok(Self { types })
    }

    pub fn types(&self) -> &[(String, Vec<FieldDef>)] {
        &self.types
    }
}

fn parse_field(name: &str, descriptor: &str) -> Result<FieldDef> {
    let mut tokens = descriptor.split_whitespace();
    let tag = tokens.next().ok_or_else(|| {
        ObjectError::InvalidSchema(format!("field '{}' has an empty descriptor", name))
    })?;

    let mut field = FieldDef::new(name, tag.parse::<FieldType>()?);
    for token in tokens {
        if token.eq_ignore_ascii_case("key") {
            field.is_key = true;
        } else {
            return Err(ObjectError::InvalidSchema(format!(
                "field '{}' has unknown attribute '{}'",
                name, token
            )));
        }
    }
    Ok(field)
}
