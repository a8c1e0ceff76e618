//! CollectionRef - a resolved collection address bound to a configuration.

use std::fmt;
use std::sync::Arc;

use crate::config::Configuration;
use crate::error::{RecordError, Result};
use crate::path::{self, validate_segment};
use crate::record::Record;
use crate::store::Fields;

/// Reference to a collection, top-level or nested under a document.
///
/// Cheap to create and never cached by the record it came from. Two
/// references are equal when their addresses are.
#[derive(Clone)]
pub struct CollectionRef {
    config: Arc<Configuration>,
    name: String,
    address: String,
}

impl CollectionRef {
    pub(crate) fn new(config: Arc<Configuration>, name: String, address: String) -> Self {
        Self {
            config,
            name,
            address,
        }
    }

    /// Collection name (last segment of the address).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Absolute collection address.
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Address of the document `id` in this collection.
    pub fn doc_address(&self, id: &str) -> Result<String> {
        validate_segment(id)?;
        Ok(path::join(&self.address, id))
    }

    /// New, unsaved record to be created in this collection.
    pub fn new_record(&self, attributes: Fields) -> Result<Record> {
        Record::builder(&self.config)
            .in_collection(self.name.clone(), self.address.clone())
            .attributes(attributes)
            .build()
    }

    /// Persisted record for the existing document `id`.
    pub fn record(&self, id: &str, attributes: Fields) -> Result<Record> {
        Record::builder(&self.config)
            .path(self.doc_address(id)?)
            .collection(self.name.clone())
            .attributes(attributes)
            .build()
    }

    /// Load the stored document `id` of this collection.
    pub async fn load(&self, id: &str) -> Result<Record> {
        let address = self.doc_address(id)?;
        let doc = self
            .config
            .store()?
            .get(&address)
            .await?
            .ok_or_else(|| RecordError::DocumentNotFound(address.clone()))?;
        self.record(id, doc.fields)
    }
}

impl PartialEq for CollectionRef {
    fn eq(&self, other: &Self) -> bool {
        self.address == other.address
    }
}

impl Eq for CollectionRef {}

impl fmt::Debug for CollectionRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CollectionRef")
            .field("name", &self.name)
            .field("address", &self.address)
            .finish()
    }
}
