//! In-memory document store implementation.
//!
//! This implementation is NOT durable - data is lost on process exit.
//! Use for testing and development only.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::SystemTime;
use tracing::debug;

use crate::error::{RecordError, Result};
use crate::path::{self, validate_path};
use crate::store::{
    apply_updates, generate_id, merge_fields, AllocatedId, Document, DocumentStore, FieldUpdates,
    Fields,
};

/// In-memory implementation of DocumentStore.
///
/// Uses a BTreeMap keyed by document path and a RwLock for concurrency.
/// Clones share the same underlying data.
#[derive(Clone)]
pub struct MemoryStore {
    data: Arc<RwLock<BTreeMap<String, Document>>>,
    root_scope: String,
}

impl MemoryStore {
    /// Create a new empty in-memory store rooted at the top of the tree.
    pub fn new() -> Self {
        Self {
            data: Arc::new(RwLock::new(BTreeMap::new())),
            root_scope: String::new(),
        }
    }

    /// Create a new empty store whose root scope is `root_scope`.
    pub fn with_root_scope(root_scope: impl Into<String>) -> Self {
        Self {
            root_scope: root_scope.into(),
            ..Self::new()
        }
    }

    /// Get the number of documents in the store.
    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    /// Check if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }

    /// Paths of all documents whose path starts with `prefix`, in order.
    pub fn paths(&self, prefix: &str) -> Vec<String> {
        self.data
            .read()
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect()
    }

    /// Clear all documents.
    pub fn clear(&self) {
        self.data.write().clear();
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    fn root_scope(&self) -> String {
        self.root_scope.clone()
    }

    async fn get(&self, address: &str) -> Result<Option<Document>> {
        validate_path(address)?;
        Ok(self.data.read().get(address).cloned())
    }

    async fn write(&self, address: &str, data: &Fields, merge: bool) -> Result<()> {
        validate_path(address)?;

        let mut docs = self.data.write();
        let now = SystemTime::now();

        match docs.get_mut(address) {
            Some(existing) => {
                if merge {
                    merge_fields(&mut existing.fields, data);
                } else {
                    existing.fields = data.clone();
                }
                existing.updated_at = now;
            }
            None => {
                docs.insert(
                    address.to_string(),
                    Document {
                        path: address.to_string(),
                        fields: data.clone(),
                        created_at: now,
                        updated_at: now,
                    },
                );
            }
        }

        debug!(address, merge, fields = data.len(), "document written");
        Ok(())
    }

    async fn update(&self, address: &str, updates: FieldUpdates) -> Result<()> {
        validate_path(address)?;

        let mut docs = self.data.write();
        let existing = docs
            .get_mut(address)
            .ok_or_else(|| RecordError::DocumentNotFound(address.to_string()))?;

        let count = updates.len();
        apply_updates(&mut existing.fields, updates);
        existing.updated_at = SystemTime::now();

        debug!(address, fields = count, "document updated");
        Ok(())
    }

    async fn delete(&self, address: &str) -> Result<()> {
        validate_path(address)?;

        if self.data.write().remove(address).is_some() {
            debug!(address, "document deleted");
        }
        Ok(())
    }

    async fn allocate_id(&self, collection_address: &str) -> Result<AllocatedId> {
        validate_path(collection_address)?;

        let docs = self.data.read();
        loop {
            let id = generate_id();
            let address = path::join(collection_address, &id);
            if !docs.contains_key(&address) {
                return Ok(AllocatedId { id, address });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn fields(value: Value) -> Fields {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[tokio::test]
    async fn test_write_and_get() {
        let store = MemoryStore::new();

        store
            .write("/humans/ann", &fields(json!({"name": "Ann"})), false)
            .await
            .unwrap();

        let doc = store.get("/humans/ann").await.unwrap().unwrap();
        assert_eq!(doc.path, "/humans/ann");
        assert_eq!(doc.fields, fields(json!({"name": "Ann"})));
        assert_eq!(doc.id(), Some("ann"));
    }

    #[tokio::test]
    async fn test_get_nonexistent() {
        let store = MemoryStore::new();
        assert!(store.get("/humans/nobody").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_merge_write_preserves_fields() {
        let store = MemoryStore::new();

        store
            .write("/humans/ann", &fields(json!({"name": "Ann", "age": 30})), false)
            .await
            .unwrap();
        store
            .write("/humans/ann", &fields(json!({"age": 31})), true)
            .await
            .unwrap();

        let doc = store.get("/humans/ann").await.unwrap().unwrap();
        assert_eq!(doc.fields, fields(json!({"name": "Ann", "age": 31})));
    }

    #[tokio::test]
    async fn test_overwrite_replaces_fields() {
        let store = MemoryStore::new();

        store
            .write("/humans/ann", &fields(json!({"name": "Ann", "age": 30})), false)
            .await
            .unwrap();
        store
            .write("/humans/ann", &fields(json!({"age": 31})), false)
            .await
            .unwrap();

        let doc = store.get("/humans/ann").await.unwrap().unwrap();
        assert_eq!(doc.fields, fields(json!({"age": 31})));
    }

    #[tokio::test]
    async fn test_update_requires_existing_document() {
        let store = MemoryStore::new();

        let mut updates = FieldUpdates::new();
        updates.insert("name".to_string(), crate::store::FieldValue::set("Ann"));
        let result = store.update("/humans/ann", updates).await;
        assert!(matches!(result, Err(RecordError::DocumentNotFound(_))));
    }

    #[tokio::test]
    async fn test_update_deletes_field() {
        let store = MemoryStore::new();
        store
            .write("/humans/ann", &fields(json!({"name": "Ann", "age": 30})), false)
            .await
            .unwrap();

        let mut updates = FieldUpdates::new();
        updates.insert("age".to_string(), crate::store::FieldValue::Delete);
        store.update("/humans/ann", updates).await.unwrap();

        let doc = store.get("/humans/ann").await.unwrap().unwrap();
        assert_eq!(doc.fields, fields(json!({"name": "Ann"})));
    }

    #[tokio::test]
    async fn test_delete_keeps_sub_collections() {
        let store = MemoryStore::new();
        store
            .write("/humans/ann", &fields(json!({"name": "Ann"})), false)
            .await
            .unwrap();
        store
            .write("/humans/ann/pets/rex", &fields(json!({"kind": "dog"})), false)
            .await
            .unwrap();

        store.delete("/humans/ann").await.unwrap();

        assert!(!store.exists("/humans/ann").await.unwrap());
        assert!(store.exists("/humans/ann/pets/rex").await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_nonexistent() {
        let store = MemoryStore::new();
        // Should not error
        store.delete("/humans/nobody").await.unwrap();
    }

    #[tokio::test]
    async fn test_allocate_id() {
        let store = MemoryStore::new();

        let a = store.allocate_id("/demo/humans").await.unwrap();
        let b = store.allocate_id("/demo/humans").await.unwrap();

        assert_ne!(a.id, b.id);
        assert_eq!(a.address, format!("/demo/humans/{}", a.id));
        // allocating does not create the document
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_paths_by_prefix() {
        let store = MemoryStore::new();
        let data = fields(json!({"x": 1}));
        store.write("/humans/a", &data, false).await.unwrap();
        store.write("/humans/b", &data, false).await.unwrap();
        store.write("/pets/c", &data, false).await.unwrap();

        let humans = store.paths("/humans/");
        assert_eq!(humans, vec!["/humans/a".to_string(), "/humans/b".to_string()]);
        assert_eq!(store.len(), 3);
    }

    #[tokio::test]
    async fn test_root_scope() {
        assert_eq!(MemoryStore::new().root_scope(), "");
        assert_eq!(
            MemoryStore::with_root_scope("/databases/default").root_scope(),
            "/databases/default"
        );
    }

    #[tokio::test]
    async fn test_invalid_path() {
        let store = MemoryStore::new();

        let result = store.write("no-leading-slash", &Fields::new(), false).await;
        assert!(matches!(result, Err(RecordError::InvalidPath(_))));
    }

    #[tokio::test]
    async fn test_clones_share_data() {
        let store = MemoryStore::new();
        let other = store.clone();
        store
            .write("/humans/ann", &fields(json!({"name": "Ann"})), false)
            .await
            .unwrap();
        assert!(other.exists("/humans/ann").await.unwrap());
        other.clear();
        assert!(store.is_empty());
    }
}
