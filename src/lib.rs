//! # docrecord
//!
//! Active-record layer over hierarchical, schema-less document stores.
//!
//! A document store is a tree of collections; each document sits at a path
//! like `/projects/demo/humans/ann` and holds a free-form field map. This
//! crate lets application code treat documents as objects:
//!
//! - **Address resolution**: `root / collection / id [/ sub-collection]`
//! - **Two-state records**: [`RecordState::Unsaved`] until the first save,
//!   [`RecordState::Persisted`] afterwards
//! - **Merge saves**: fields not in memory are preserved in the store
//! - **Single-field updates and deletes**, with a dedicated deletion sentinel
//! - **Nested collections** resolved from the parent record's own path
//!
//! ## Backends
//!
//! Any [`DocumentStore`] works. Two are included:
//!
//! - [`SqliteStore`]: Embedded SQLite database
//! - [`MemoryStore`]: In-memory store (testing and development)
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use serde_json::json;
//! use docrecord::{Configuration, MemoryStore, Record, Settings};
//!
//! #[tokio::main]
//! async fn main() -> docrecord::Result<()> {
//!     let config = Arc::new(Configuration::with_settings(
//!         Settings::new()
//!             .with_store(Arc::new(MemoryStore::new()))
//!             .with_root_prefix("/projects/demo"),
//!     )?);
//!
//!     let mut ann = Record::new(&config, "humans", Default::default())?;
//!     ann.set("name", "Ann");
//!     ann.save().await?;
//!     println!("saved at {:?}", ann.path());
//!
//!     ann.save_attribute("age", json!(30)).await?;
//!     ann.delete_attribute("age").await?;
//!
//!     let mut rex = ann.collection("pets")?.new_record(Default::default())?;
//!     rex.set("kind", "dog");
//!     rex.save().await?;
//!
//!     Ok(())
//! }
//! ```

pub mod collection;
pub mod config;
pub mod error;
pub mod memory;
pub mod path;
pub mod record;
pub mod sqlite;
pub mod store;

// Re-export main types
pub use collection::CollectionRef;
pub use config::{Configuration, RootScoping, Settings};
pub use error::{RecordError, Result};
pub use memory::MemoryStore;
pub use record::{CollectionTarget, Record, RecordBuilder, RecordState};
pub use sqlite::SqliteStore;
pub use store::{AllocatedId, Document, DocumentStore, FieldUpdates, FieldValue, Fields};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::collection::CollectionRef;
    pub use crate::config::{Configuration, RootScoping, Settings};
    pub use crate::error::{RecordError, Result};
    pub use crate::memory::MemoryStore;
    pub use crate::record::{CollectionTarget, Record, RecordState};
    pub use crate::sqlite::SqliteStore;
    pub use crate::store::{DocumentStore, FieldValue, Fields};
}
