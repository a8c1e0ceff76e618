//! Configuration holder and address resolution against the configured root.
//!
//! A [`Configuration`] is created explicitly and shared by `Arc` with every
//! record that resolves against it. Tests and hosts can keep several
//! independent configurations side by side.

use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

use crate::collection::CollectionRef;
use crate::error::{RecordError, Result};
use crate::path::{self, validate_path, validate_segment};
use crate::store::{AllocatedId, DocumentStore};

/// Environment variable read by [`Settings::with_root_prefix_from_env`].
pub const ROOT_PREFIX_ENV: &str = "DOCRECORD_ROOT_PREFIX";

/// Whether collection addresses are scoped under the configured root prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RootScoping {
    /// Resolve under `root_scope + root_prefix`. Requires a root prefix.
    #[default]
    Scoped,
    /// Resolve directly under the store's root scope.
    Unscoped,
}

impl RootScoping {
    /// Scoping for a record built with `skip_root_scoping`.
    pub fn from_skip(skip_root_scoping: bool) -> Self {
        if skip_root_scoping {
            RootScoping::Unscoped
        } else {
            RootScoping::Scoped
        }
    }
}

/// Complete configuration value. Replaced wholesale by
/// [`Configuration::configure`].
#[derive(Clone, Default)]
pub struct Settings {
    /// Prefix under which all collections are scoped.
    pub root_prefix: Option<String>,
    /// Document-store client.
    pub store: Option<Arc<dyn DocumentStore>>,
}

impl Settings {
    /// Empty settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the store client.
    pub fn with_store(mut self, store: Arc<dyn DocumentStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Set the root prefix.
    pub fn with_root_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.root_prefix = Some(prefix.into());
        self
    }

    /// Take the root prefix from `DOCRECORD_ROOT_PREFIX` when it is set.
    pub fn with_root_prefix_from_env(self) -> Self {
        match std::env::var(ROOT_PREFIX_ENV) {
            Ok(prefix) => self.with_root_prefix(prefix),
            Err(_) => self,
        }
    }
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("root_prefix", &self.root_prefix)
            .field("store", &self.store.as_ref().map(|s| s.root_scope()))
            .finish()
    }
}

/// Holder for the settings every record resolves against.
#[derive(Default)]
pub struct Configuration {
    settings: RwLock<Option<Settings>>,
}

impl Configuration {
    /// Create an unconfigured holder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a holder and configure it in one step.
    pub fn with_settings(settings: Settings) -> Result<Self> {
        let config = Self::new();
        config.configure(settings)?;
        Ok(config)
    }

    /// Replace the current configuration.
    ///
    /// The root prefix is normalized to `/a/b` form; a malformed prefix is a
    /// configuration error and leaves the previous configuration in place.
    pub fn configure(&self, mut settings: Settings) -> Result<()> {
        if let Some(prefix) = settings.root_prefix.take() {
            let normalized = path::normalize_prefix(&prefix).map_err(|e| {
                RecordError::Configuration(format!("invalid root prefix {:?}: {}", prefix, e))
            })?;
            settings.root_prefix = Some(normalized);
        }

        info!(
            root_prefix = ?settings.root_prefix,
            has_store = settings.store.is_some(),
            "record configuration replaced"
        );
        *self.settings.write() = Some(settings);
        Ok(())
    }

    /// Returns true once settings with a store client are present.
    pub fn is_configured(&self) -> bool {
        self.settings
            .read()
            .as_ref()
            .map(|s| s.store.is_some())
            .unwrap_or(false)
    }

    /// Snapshot of the current settings.
    pub fn settings(&self) -> Result<Settings> {
        self.settings
            .read()
            .clone()
            .ok_or_else(|| RecordError::Configuration("configure has not been called".to_string()))
    }

    /// The configured store client.
    pub fn store(&self) -> Result<Arc<dyn DocumentStore>> {
        self.settings()?
            .store
            .ok_or_else(|| RecordError::Configuration("store client is not set".to_string()))
    }

    /// The normalized root prefix, if one is configured.
    pub fn root_prefix(&self) -> Option<String> {
        self.settings
            .read()
            .as_ref()
            .and_then(|s| s.root_prefix.clone())
    }

    /// Root address all collections hang off: the store's root scope followed
    /// by the configured prefix.
    pub fn root_address(&self, scoping: RootScoping) -> Result<String> {
        let settings = self.settings()?;
        let store = settings
            .store
            .ok_or_else(|| RecordError::Configuration("store client is not set".to_string()))?;

        let scope = store.root_scope();
        let scope = scope.trim_end_matches(path::SEPARATOR);

        let root = match scoping {
            RootScoping::Unscoped => scope.to_string(),
            RootScoping::Scoped => {
                let prefix = settings.root_prefix.ok_or_else(|| {
                    RecordError::Configuration(
                        "root prefix is not set and root scoping was not skipped".to_string(),
                    )
                })?;
                format!("{}{}", scope, prefix)
            }
        };

        if !root.is_empty() {
            validate_path(&root).map_err(|e| {
                RecordError::Configuration(format!("invalid root address {:?}: {}", root, e))
            })?;
        }
        Ok(root)
    }

    /// Address of a top-level collection: `root/collection_name`.
    pub fn resolve_collection_address(
        &self,
        collection_name: &str,
        scoping: RootScoping,
    ) -> Result<String> {
        validate_segment(collection_name).map_err(|_| {
            RecordError::InvalidIdentity(format!(
                "collection name must be a non-empty segment, got {:?}",
                collection_name
            ))
        })?;
        Ok(path::join(&self.root_address(scoping)?, collection_name))
    }

    /// Address of a document: `root/collection_name/unique_id`.
    pub fn resolve_document_address(
        &self,
        collection_name: &str,
        unique_id: &str,
        scoping: RootScoping,
    ) -> Result<String> {
        let collection = self.resolve_collection_address(collection_name, scoping)?;
        validate_segment(unique_id)?;
        Ok(path::join(&collection, unique_id))
    }

    /// Ask the store for a fresh document id under `root/collection_name`.
    pub async fn resolve_new_document_address(
        &self,
        collection_name: &str,
        scoping: RootScoping,
    ) -> Result<AllocatedId> {
        let collection = self.resolve_collection_address(collection_name, scoping)?;
        let allocated = self.store()?.allocate_id(&collection).await?;
        debug!(address = %allocated.address, "allocated document id");
        Ok(allocated)
    }

    /// Reference to a top-level collection.
    pub fn collection(
        self: &Arc<Self>,
        collection_name: &str,
        scoping: RootScoping,
    ) -> Result<CollectionRef> {
        let address = self.resolve_collection_address(collection_name, scoping)?;
        Ok(CollectionRef::new(
            Arc::clone(self),
            collection_name.to_string(),
            address,
        ))
    }
}

impl fmt::Debug for Configuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Configuration")
            .field("settings", &*self.settings.read())
            .finish()
    }
}
