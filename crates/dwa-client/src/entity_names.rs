//! Logical entity name to collection name lookup.

use std::collections::HashMap;

use serde_json::Value;

use crate::error::{Error, ErrorKind, Result};

/// Maps logical entity names (`account`) to entity set names (`accounts`).
///
/// Owned by the caller and passed to the serializer explicitly. The high
/// level client fills one from metadata once and never changes it after.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntityNameMap {
    names: HashMap<String, String>,
}

impl EntityNameMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the map from an `EntityDefinitions?$select=EntitySetName,LogicalName`
    /// response body. Entities without an entity set are skipped.
    pub fn from_metadata(body: &Value) -> Result<Self> {
        let definitions = body
            .get("value")
            .and_then(Value::as_array)
            .ok_or_else(|| {
                Error::new(ErrorKind::Parse {
                    message: "entity definitions response has no value array".to_string(),
                    raw: body.to_string(),
                })
            })?;

        Ok(definitions
            .iter()
            .filter_map(|definition| {
                let logical = definition.get("LogicalName")?.as_str()?;
                let collection = definition.get("EntitySetName")?.as_str()?;
                Some((logical.to_string(), collection.to_string()))
            })
            .collect())
    }

    /// Add or replace a mapping.
    pub fn insert(&mut self, logical_name: impl Into<String>, collection: impl Into<String>) {
        self.names.insert(logical_name.into(), collection.into());
    }

    /// Collection name for a logical entity name.
    pub fn get(&self, logical_name: &str) -> Option<&str> {
        self.names.get(logical_name).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl<K, V> FromIterator<(K, V)> for EntityNameMap
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            names: iter
                .into_iter()
                .map(|(logical, collection)| (logical.into(), collection.into()))
                .collect(),
        }
    }
}
