//! Record - an in-memory field map bound to one document address.
//!
//! A record is either *Unsaved* (it knows the collection it will be created
//! in) or *Persisted* (it knows its document path). The first successful
//! [`Record::save`] moves it from one to the other; nothing moves it back.
//!
//! Mutating the attribute map never touches the store. Only `save`,
//! `save_attribute`, `delete_attribute` and `delete` issue writes.

use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::collection::CollectionRef;
use crate::config::{Configuration, RootScoping};
use crate::error::{RecordError, Result};
use crate::path::{self, validate_path, validate_segment};
use crate::store::{FieldUpdates, FieldValue, Fields};

/// Collection an unsaved record will be created in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CollectionTarget {
    /// Top-level collection, resolved against the configuration on save.
    TopLevel { name: String, scoping: RootScoping },
    /// Collection nested under an existing document, at a fixed address.
    Nested { address: String },
}

impl fmt::Display for CollectionTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CollectionTarget::TopLevel { name, .. } => write!(f, "collection {:?}", name),
            CollectionTarget::Nested { address } => write!(f, "{}", address),
        }
    }
}

/// Where a record lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordState {
    /// Not yet written. The document will be created in `collection`.
    Unsaved {
        collection: CollectionTarget,
        unique_id: Option<String>,
    },
    /// Written at least once, or constructed from a known path.
    Persisted { path: String, unique_id: String },
}

/// An active record over one document.
#[derive(Debug)]
pub struct Record {
    config: Arc<Configuration>,
    state: RecordState,
    collection_name: Option<String>,
    attributes: Fields,
}

/// Builder for [`Record`]. Obtain one with [`Record::builder`].
#[derive(Debug)]
pub struct RecordBuilder {
    config: Arc<Configuration>,
    attributes: Fields,
    unique_id: Option<String>,
    path: Option<String>,
    collection_name: Option<String>,
    collection_address: Option<String>,
    scoping: RootScoping,
}

impl RecordBuilder {
    /// Initial attribute map.
    pub fn attributes(mut self, attributes: Fields) -> Self {
        self.attributes = attributes;
        self
    }

    /// Initial attributes taken from any serializable model.
    ///
    /// The model must serialize to a map.
    pub fn attributes_from<T: Serialize>(mut self, model: &T) -> Result<Self> {
        match serde_json::to_value(model)? {
            Value::Object(map) => {
                self.attributes = map;
                Ok(self)
            }
            other => Err(RecordError::Serialization(format!(
                "model must serialize to a map, got {}",
                other
            ))),
        }
    }

    /// Known document id.
    pub fn unique_id(mut self, unique_id: impl Into<String>) -> Self {
        self.unique_id = Some(unique_id.into());
        self
    }

    /// Known absolute document path. Makes the record Persisted.
    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Collection the record belongs to.
    pub fn collection(mut self, collection_name: impl Into<String>) -> Self {
        self.collection_name = Some(collection_name.into());
        self
    }

    /// Resolve the collection directly under the store root, ignoring the
    /// configured root prefix.
    pub fn skip_root_scoping(mut self, skip: bool) -> Self {
        self.scoping = RootScoping::from_skip(skip);
        self
    }

    /// Collection with an already-resolved address (nested collections).
    pub(crate) fn in_collection(mut self, name: String, address: String) -> Self {
        self.collection_name = Some(name);
        self.collection_address = Some(address);
        self
    }

    /// Validate the addressing strategy and build the record.
    ///
    /// No store call is made.
    pub fn build(self) -> Result<Record> {
        // fail fast on missing configuration, whichever state we end up in
        self.config.store()?;

        let state = match (self.path, self.collection_name.as_deref()) {
            (Some(path), collection_name) => {
                validate_path(&path).map_err(|e| {
                    RecordError::InvalidConstruction(format!("invalid path: {}", e))
                })?;
                let id = path::last_segment(&path)
                    .ok_or_else(|| {
                        RecordError::InvalidConstruction(format!("path has no id: {}", path))
                    })?
                    .to_string();

                if let Some(unique_id) = &self.unique_id {
                    if *unique_id != id {
                        return Err(RecordError::InvalidConstruction(format!(
                            "unique id {:?} conflicts with path {}",
                            unique_id, path
                        )));
                    }
                }
                if let Some(name) = collection_name {
                    validate_segment(name)?;
                    let path_collection = path::parent(&path).and_then(path::last_segment);
                    if path_collection != Some(name) {
                        return Err(RecordError::InvalidConstruction(format!(
                            "collection {:?} conflicts with path {}",
                            name, path
                        )));
                    }
                }

                RecordState::Persisted {
                    path,
                    unique_id: id,
                }
            }
            (None, Some(name)) => {
                let collection = match self.collection_address {
                    Some(address) => CollectionTarget::Nested { address },
                    None => {
                        // configuration and identity errors surface here, before any I/O
                        self.config.resolve_collection_address(name, self.scoping)?;
                        CollectionTarget::TopLevel {
                            name: name.to_string(),
                            scoping: self.scoping,
                        }
                    }
                };
                if let Some(unique_id) = &self.unique_id {
                    validate_segment(unique_id)?;
                }
                RecordState::Unsaved {
                    collection,
                    unique_id: self.unique_id,
                }
            }
            (None, None) => {
                return Err(RecordError::InvalidConstruction(
                    "either a path or a collection name is required".to_string(),
                ));
            }
        };

        Ok(Record {
            config: self.config,
            state,
            collection_name: self.collection_name,
            attributes: self.attributes,
        })
    }
}

impl Record {
    /// Start building a record against `config`.
    pub fn builder(config: &Arc<Configuration>) -> RecordBuilder {
        RecordBuilder {
            config: Arc::clone(config),
            attributes: Fields::new(),
            unique_id: None,
            path: None,
            collection_name: None,
            collection_address: None,
            scoping: RootScoping::Scoped,
        }
    }

    /// New, unsaved record in a top-level collection.
    pub fn new(
        config: &Arc<Configuration>,
        collection_name: impl Into<String>,
        attributes: Fields,
    ) -> Result<Self> {
        Self::builder(config)
            .collection(collection_name)
            .attributes(attributes)
            .build()
    }

    /// Record for a document that already exists at `path`.
    pub fn existing(
        config: &Arc<Configuration>,
        path: impl Into<String>,
        attributes: Fields,
    ) -> Result<Self> {
        Self::builder(config).path(path).attributes(attributes).build()
    }

    /// Read the document at `path` into a persisted record.
    pub async fn load(config: &Arc<Configuration>, path: &str) -> Result<Self> {
        let store = config.store()?;
        let doc = store
            .get(path)
            .await?
            .ok_or_else(|| RecordError::DocumentNotFound(path.to_string()))?;
        Self::existing(config, doc.path, doc.fields)
    }

    /// Current lifecycle state.
    pub fn state(&self) -> &RecordState {
        &self.state
    }

    /// Returns true once the record has a document path.
    pub fn is_persisted(&self) -> bool {
        matches!(self.state, RecordState::Persisted { .. })
    }

    /// Document path, once persisted.
    pub fn path(&self) -> Option<&str> {
        match &self.state {
            RecordState::Persisted { path, .. } => Some(path),
            RecordState::Unsaved { .. } => None,
        }
    }

    /// Document id, if known.
    pub fn unique_id(&self) -> Option<&str> {
        match &self.state {
            RecordState::Persisted { unique_id, .. } => Some(unique_id),
            RecordState::Unsaved { unique_id, .. } => unique_id.as_deref(),
        }
    }

    /// Name of the collection this record belongs to, if known.
    pub fn collection_name(&self) -> Option<&str> {
        self.collection_name.as_deref()
    }

    /// In-memory attributes.
    pub fn attributes(&self) -> &Fields {
        &self.attributes
    }

    /// Mutable access to the in-memory attributes. Nothing is saved.
    pub fn attributes_mut(&mut self) -> &mut Fields {
        &mut self.attributes
    }

    /// In-memory value of one attribute.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }

    /// Set an attribute in memory only. Returns the previous value.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.attributes.insert(name.into(), value.into())
    }

    /// Remove an attribute in memory only.
    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.attributes.remove(name)
    }

    /// Deserialize the attributes into a typed model.
    pub fn to_model<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_value(Value::Object(self.attributes.clone())).map_err(Into::into)
    }

    /// Write all attributes to the store with merge semantics.
    ///
    /// An unsaved record uses its known id if it has one, otherwise asks the
    /// store for a fresh id, and becomes persisted once the write succeeds.
    /// Top-level collections are resolved against the configuration current
    /// at the time of the call.
    /// A persisted record rewrites its existing document.
    pub async fn save(&mut self) -> Result<()> {
        self.save_inner(None).await
    }

    /// Like [`Record::save`], creating the document under `unique_id`.
    ///
    /// The id is ignored once the record is persisted.
    pub async fn save_with_id(&mut self, unique_id: impl Into<String>) -> Result<()> {
        self.save_inner(Some(unique_id.into())).await
    }

    async fn save_inner(&mut self, requested_id: Option<String>) -> Result<()> {
        let store = self.config.store()?;

        let (path, unique_id) = match &self.state {
            RecordState::Persisted { path, unique_id } => {
                if let Some(requested) = requested_id.filter(|id| id != unique_id) {
                    warn!(
                        path = %path,
                        requested = %requested,
                        "ignoring id for a record that is already persisted"
                    );
                }
                (path.clone(), unique_id.clone())
            }
            RecordState::Unsaved {
                collection,
                unique_id,
            } => match requested_id.or_else(|| unique_id.clone()) {
                Some(id) => (self.document_address(collection, &id)?, id),
                None => {
                    let allocated = match collection {
                        CollectionTarget::TopLevel { name, scoping } => {
                            self.config
                                .resolve_new_document_address(name, *scoping)
                                .await?
                        }
                        CollectionTarget::Nested { address } => store.allocate_id(address).await?,
                    };
                    (allocated.address, allocated.id)
                }
            },
        };

        store.write(&path, &self.attributes, true).await?;

        if !self.is_persisted() {
            info!(path = %path, "record created");
        } else {
            debug!(path = %path, "record saved");
        }
        self.state = RecordState::Persisted { path, unique_id };
        Ok(())
    }

    /// Set one attribute and write only that field.
    ///
    /// Memory is updated before the store call. If the store call fails the
    /// previous in-memory value is restored and the error returned.
    pub async fn save_attribute(
        &mut self,
        name: impl Into<String>,
        value: impl Into<Value>,
    ) -> Result<()> {
        let name = name.into();
        let path = self.require_persisted("save_attribute")?;
        let store = self.config.store()?;
        let value = value.into();

        let previous = self.attributes.insert(name.clone(), value.clone());

        let mut updates = FieldUpdates::new();
        updates.insert(name.clone(), FieldValue::Set(value));
        if let Err(err) = store.update(&path, updates).await {
            warn!(path = %path, field = %name, error = %err, "field update failed, restoring");
            self.restore(name, previous);
            return Err(err);
        }
        Ok(())
    }

    /// Remove one attribute from memory and from the stored document.
    ///
    /// The field is removed, not set to null. On store failure the removed
    /// value is put back in memory.
    pub async fn delete_attribute(&mut self, name: &str) -> Result<()> {
        let path = self.require_persisted("delete_attribute")?;
        let store = self.config.store()?;

        let previous = self.attributes.remove(name);

        let mut updates = FieldUpdates::new();
        updates.insert(name.to_string(), FieldValue::Delete);
        if let Err(err) = store.update(&path, updates).await {
            warn!(path = %path, field = %name, error = %err, "field delete failed, restoring");
            self.restore(name.to_string(), previous);
            return Err(err);
        }
        Ok(())
    }

    /// Delete the stored document.
    ///
    /// The in-memory attributes and the persisted state are kept; the caller
    /// tracks that the document no longer exists.
    pub async fn delete(&self) -> Result<()> {
        let path = self.require_persisted("delete")?;
        self.config.store()?.delete(&path).await?;
        info!(path = %path, "record deleted");
        Ok(())
    }

    /// Replace the in-memory attributes with the stored document's fields.
    pub async fn reload(&mut self) -> Result<()> {
        let path = self.require_persisted("reload")?;
        let store = self.config.store()?;
        match store.get(&path).await? {
            Some(doc) => self.attributes = doc.fields,
            None => return Err(RecordError::DocumentNotFound(path)),
        }
        Ok(())
    }

    /// Reference to a sub-collection of this record's document.
    ///
    /// Requires a collection name and a resolvable document address (a path,
    /// or an unsaved record with a known id).
    pub fn collection(&self, sub_collection_name: &str) -> Result<CollectionRef> {
        if self.collection_name.is_none() {
            return Err(RecordError::UnresolvedParent(
                "a collection name is required to use nested collections".to_string(),
            ));
        }

        let parent = match &self.state {
            RecordState::Persisted { path, .. } => path.clone(),
            RecordState::Unsaved {
                collection,
                unique_id: Some(id),
            } => self.document_address(collection, id)?,
            RecordState::Unsaved {
                collection,
                unique_id: None,
            } => {
                return Err(RecordError::UnresolvedParent(format!(
                    "unsaved record in {} has no id yet",
                    collection
                )));
            }
        };

        let address = path::resolve_sub_collection_address(&parent, sub_collection_name)?;
        Ok(CollectionRef::new(
            Arc::clone(&self.config),
            sub_collection_name.to_string(),
            address,
        ))
    }

    /// Address of document `id` in an unsaved record's collection.
    fn document_address(&self, collection: &CollectionTarget, id: &str) -> Result<String> {
        match collection {
            CollectionTarget::TopLevel { name, scoping } => {
                self.config.resolve_document_address(name, id, *scoping)
            }
            CollectionTarget::Nested { address } => {
                validate_segment(id)?;
                Ok(path::join(address, id))
            }
        }
    }

    fn require_persisted(&self, operation: &str) -> Result<String> {
        match &self.state {
            RecordState::Persisted { path, .. } => Ok(path.clone()),
            RecordState::Unsaved { collection, .. } => Err(RecordError::NotPersisted(format!(
                "{} on unsaved record in {}",
                operation, collection
            ))),
        }
    }

    fn restore(&mut self, name: String, previous: Option<Value>) {
        match previous {
            Some(value) => {
                self.attributes.insert(name, value);
            }
            None => {
                self.attributes.remove(&name);
            }
        }
    }
}
