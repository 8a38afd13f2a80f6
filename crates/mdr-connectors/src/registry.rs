//! Pack discovery, metadata loading and implementation resolution.
//!
//! A pack is a directory under the installation root holding a
//! `pack_metadata.json` descriptor. The Rust implementation behind a pack is
//! not loaded from disk: it is looked up in a registration table that the
//! host populates at startup (see [`crate::edr::register_builtin_packs`]).

use crate::config::PackConfig;
use crate::traits::{AdapterResult, EndpointAdapter};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Descriptor file expected in every pack directory.
pub const METADATA_FILE: &str = "pack_metadata.json";

/// Packs shipped with this crate.
pub const BUNDLED_PACKS_DIR: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/packs");

/// Errors raised while resolving packs.
#[derive(Error, Debug)]
pub enum PackError {
    #[error("Pack not found: {0}")]
    NotFound(String),

    #[error("Invalid metadata for pack '{vendor}': {message}")]
    InvalidMetadata { vendor: String, message: String },

    #[error("Failed to load pack '{vendor}': {message}")]
    Load { vendor: String, message: String },

    #[error("Invalid configuration for pack '{vendor}': missing required keys {missing:?}")]
    ConfigValidation { vendor: String, missing: Vec<String> },
}

/// Result type for pack operations.
pub type PackResult<T> = Result<T, PackError>;

/// Declarative description of a pack.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PackMetadata {
    pub display_name: String,
    pub version: String,
    #[serde(default)]
    pub capabilities: Vec<String>,
    #[serde(default)]
    pub required_config: Vec<String>,
}

/// Builds an adapter for `(tenant_id, config)`.
pub type AdapterConstructor =
    Arc<dyn Fn(&str, &PackConfig) -> AdapterResult<Arc<dyn EndpointAdapter>> + Send + Sync>;

/// Discovers packs on disk and resolves them to registered constructors.
pub struct PackRegistry {
    root: PathBuf,
    constructors: HashMap<String, AdapterConstructor>,
    metadata: RwLock<HashMap<String, Arc<PackMetadata>>>,
}

impl PackRegistry {
    /// Creates an empty registry rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            constructors: HashMap::new(),
            metadata: RwLock::new(HashMap::new()),
        }
    }

    /// Creates a registry over the bundled packs with the built-in constructors.
    pub fn bundled() -> Self {
        let mut registry = Self::new(BUNDLED_PACKS_DIR);
        crate::edr::register_builtin_packs(&mut registry);
        registry
    }

    /// Installation root scanned by [`discover`](Self::discover).
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Registers the implementation for a vendor id, replacing any previous one.
    pub fn register_pack<F>(&mut self, vendor: &str, constructor: F)
    where
        F: Fn(&str, &PackConfig) -> AdapterResult<Arc<dyn EndpointAdapter>> + Send + Sync + 'static,
    {
        info!("Registering pack implementation: {}", vendor);
        self.constructors
            .insert(vendor.to_string(), Arc::new(constructor));
    }

    /// Lists installed vendor ids, sorted.
    ///
    /// Directories without a descriptor, reserved directories (leading `_`
    /// or `.`) and names outside `[A-Za-z0-9_-]` are skipped, so every id
    /// returned here is loadable. A missing root yields an empty list.
    pub fn discover(&self) -> Vec<String> {
        let entries = match std::fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) => {
                debug!(root = %self.root.display(), error = %e, "Pack root not readable");
                return Vec::new();
            }
        };

        let mut vendors: Vec<String> = entries
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().join(METADATA_FILE).is_file())
            .filter_map(|entry| entry.file_name().into_string().ok())
            .filter(|name| is_valid_pack_id(name))
            .collect();
        vendors.sort();
        vendors
    }

    /// Loads a pack's descriptor. Successful loads are cached.
    pub fn load_metadata(&self, vendor: &str) -> PackResult<Arc<PackMetadata>> {
        if let Some(cached) = self
            .metadata
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(vendor)
        {
            return Ok(Arc::clone(cached));
        }

        let path = self.descriptor_path(vendor)?;
        let contents = std::fs::read_to_string(&path)
            .map_err(|_| PackError::NotFound(vendor.to_string()))?;
        let metadata: PackMetadata =
            serde_json::from_str(&contents).map_err(|e| PackError::InvalidMetadata {
                vendor: vendor.to_string(),
                message: e.to_string(),
            })?;

        debug!(vendor, version = %metadata.version, "Loaded pack metadata");
        let metadata = Arc::new(metadata);
        self.metadata
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(vendor.to_string(), Arc::clone(&metadata));
        Ok(metadata)
    }

    /// Returns the constructor registered for a vendor.
    pub fn resolve_implementation(&self, vendor: &str) -> PackResult<AdapterConstructor> {
        self.constructors
            .get(vendor)
            .cloned()
            .ok_or_else(|| PackError::Load {
                vendor: vendor.to_string(),
                message: "no implementation registered".to_string(),
            })
    }

    /// Whether `config` carries every key the pack requires.
    pub fn validate_config(&self, vendor: &str, config: &PackConfig) -> PackResult<bool> {
        Ok(self.missing_config_keys(vendor, config)?.is_empty())
    }

    /// Required keys absent from `config`, in declaration order.
    pub fn missing_config_keys(&self, vendor: &str, config: &PackConfig) -> PackResult<Vec<String>> {
        let metadata = self.load_metadata(vendor)?;
        let missing: Vec<String> = metadata
            .required_config
            .iter()
            .filter(|key| !config.contains_key(key.as_str()))
            .cloned()
            .collect();
        if !missing.is_empty() {
            warn!(vendor, ?missing, "Pack configuration incomplete");
        }
        Ok(missing)
    }

    fn descriptor_path(&self, vendor: &str) -> PackResult<PathBuf> {
        if !is_valid_pack_id(vendor) {
            return Err(PackError::NotFound(vendor.to_string()));
        }
        Ok(self.root.join(vendor).join(METADATA_FILE))
    }
}

impl std::fmt::Debug for PackRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut registered: Vec<&String> = self.constructors.keys().collect();
        registered.sort();
        f.debug_struct("PackRegistry")
            .field("root", &self.root)
            .field("registered", &registered)
            .finish()
    }
}

fn is_reserved(name: &str) -> bool {
    name.starts_with('_') || name.starts_with('.')
}

/// A non-reserved name made of ASCII alphanumerics, `-` and `_`.
fn is_valid_pack_id(name: &str) -> bool {
    !name.is_empty()
        && !is_reserved(name)
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}
