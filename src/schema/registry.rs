use super::{FieldDef, ObjectModel, Schema};
use crate::core::{ObjectError, Result};
use std::collections::HashMap;
use std::sync::Arc;

/// The set of object types known to a store.
///
/// Filled once at startup, then frozen inside the store behind an `Arc`, so
/// lookups never take a lock.
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    types: HashMap<String, Arc<Schema>>,
    /// Type names in registration order
    order: Vec<String>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from an object-model JSON document.
    ///
    /// # Examples
    ///
    /// ```
    /// use gameobj::SchemaRegistry;
    ///
    /// let registry = SchemaRegistry::from_model_json(r#"{
    ///     "Character": {"Name": "String KEY", "Level": "Integer"}
    /// }"#).unwrap();
    /// assert_eq!(registry.lookup("Character").unwrap().key_field().name, "Name");
    /// ```
    pub fn from_model_json(text: &str) -> Result<Self> {
        let mut registry = Self::new();
        registry.register_model(&ObjectModel::parse(text)?)?;
        Ok(registry)
    }

    pub fn register(&mut self, type_name: &str, fields: Vec<FieldDef>) -> Result<Arc<Schema>> {
        if self.types.contains_key(type_name) {
            return Err(ObjectError::DuplicateType(type_name.to_string()));
        }
        self.register_schema(Schema::new(type_name, fields)?)
    }

    pub fn register_schema(&mut self, schema: Schema) -> Result<Arc<Schema>> {
        let type_name = schema.type_name().to_string();
        if self.types.contains_key(&type_name) {
            return Err(ObjectError::DuplicateType(type_name));
        }

        // Table names are case-folded, so "Hero" and "hero" would share a table
        if let Some(existing) = self
            .types
            .values()
            .find(|other| other.table_name() == schema.table_name())
        {
            return Err(ObjectError::InvalidSchema(format!(
                "type '{}' maps to table '{}' already used by '{}'",
                type_name,
                schema.table_name(),
                existing.type_name()
            )));
        }

        let schema = Arc::new(schema);
        self.types.insert(type_name.clone(), Arc::clone(&schema));
        self.order.push(type_name);
        Ok(schema)
    }

    /// Register every type of `model`, stopping at the first error.
    pub fn register_model(&mut self, model: &ObjectModel) -> Result<()> {
        for (type_name, fields) in model.types() {
            self.register(type_name, fields.clone())?;
        }
        Ok(())
    }

    pub fn lookup(&self, type_name: &str) -> Result<Arc<Schema>> {
        self.types
            .get(type_name)
            .cloned()
            .ok_or_else(|| ObjectError::UnknownType(type_name.to_string()))
    }

    pub fn contains(&self, type_name: &str) -> bool {
        self.types.contains_key(type_name)
    }

    pub fn type_names(&self) -> Vec<&str> {
        self.order.iter().map(|s| s.as_str()).collect()
    }

    /// Schemas in registration order.
    pub fn schemas(&self) -> impl Iterator<Item = &Arc<Schema>> {
        self.order.iter().filter_map(|name| self.types.get(name))
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}
