//! DocumentStore trait - the narrow interface to the underlying document store.
//!
//! A document store is a tree of collections holding documents. Each document
//! lives at an absolute path and carries a schema-less field map. The record
//! layer only needs single-document operations:
//! - read a document
//! - write a field map, either merging into or replacing what is stored
//! - update individual fields, including removing them
//! - delete a document
//! - allocate a fresh document id inside a collection

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::SystemTime;
use uuid::Uuid;

use crate::error::Result;
use crate::path;

/// Field map of a document.
pub type Fields = serde_json::Map<String, Value>;

/// Per-field changes for a single update call, keyed by field name.
pub type FieldUpdates = BTreeMap<String, FieldValue>;

/// Value of a single field in an update payload.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// Replace the field with this value (`null` included).
    Set(Value),
    /// Remove the field from the document.
    Delete,
}

impl FieldValue {
    /// Create a Set value.
    pub fn set(value: impl Into<Value>) -> Self {
        Self::Set(value.into())
    }

    /// Returns true for the deletion sentinel.
    pub fn is_delete(&self) -> bool {
        matches!(self, FieldValue::Delete)
    }
}

/// A stored document with metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Absolute path of the document.
    pub path: String,
    /// Field data.
    pub fields: Fields,
    /// When the document was first written.
    pub created_at: SystemTime,
    /// When the document was last written.
    pub updated_at: SystemTime,
}

impl Document {
    /// Id of the document (last path segment).
    pub fn id(&self) -> Option<&str> {
        path::last_segment(&self.path)
    }

    /// Deserialize the fields into a typed model.
    pub fn fields_as<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_value(Value::Object(self.fields.clone())).map_err(Into::into)
    }
}

/// Result of allocating a document id inside a collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllocatedId {
    /// The generated document id.
    pub id: String,
    /// Absolute address of the document that id names.
    pub address: String,
}

/// Generate a random document id.
pub fn generate_id() -> String {
    Uuid::new_v4().simple().to_string()
}

/// Merge `source` into `target`.
///
/// Fields absent from `source` are kept. Nested objects present on both sides
/// are merged recursively; any other value in `source` replaces the target's.
pub fn merge_fields(target: &mut Fields, source: &Fields) {
    for (name, value) in source {
        match (target.get_mut(name), value) {
            (Some(Value::Object(existing)), Value::Object(incoming)) => {
                merge_fields(existing, incoming);
            }
            _ => {
                target.insert(name.clone(), value.clone());
            }
        }
    }
}

/// Apply per-field updates to a field map.
pub fn apply_updates(target: &mut Fields, updates: FieldUpdates) {
    for (name, update) in updates {
        match update {
            FieldValue::Set(value) => {
                target.insert(name, value);
            }
            FieldValue::Delete => {
                target.remove(&name);
            }
        }
    }
}

/// The document-store client used by records.
///
/// Implementations own transport, consistency and timeout policy. Each call
/// is atomic for the single document it touches; nothing spans documents.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// The store's own root address, before any configured prefix.
    ///
    /// The empty string means the top of the tree.
    fn root_scope(&self) -> String;

    /// Get a document by path.
    ///
    /// Returns `None` if the document does not exist.
    async fn get(&self, address: &str) -> Result<Option<Document>>;

    /// Write a field map to a document, creating it if needed.
    ///
    /// With `merge`, stored fields absent from `data` are preserved.
    /// Without it, the stored field map is replaced.
    async fn write(&self, address: &str, data: &Fields, merge: bool) -> Result<()>;

    /// Apply per-field updates to an existing document.
    ///
    /// Fails with `DocumentNotFound` if the document does not exist.
    async fn update(&self, address: &str, updates: FieldUpdates) -> Result<()>;

    /// Delete a document.
    ///
    /// Returns `Ok(())` whether or not it existed. Documents in its
    /// sub-collections are not touched.
    async fn delete(&self, address: &str) -> Result<()>;

    /// Allocate a fresh document id under a collection address.
    async fn allocate_id(&self, collection_address: &str) -> Result<AllocatedId>;

    /// Check if a document exists.
    async fn exists(&self, address: &str) -> Result<bool> {
        Ok(self.get(address).await?.is_some())
    }
}
