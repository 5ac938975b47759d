//! Plugin-based backend registry
//!
//! Backends are looked up by provider name at runtime, so the binary never
//! branches on provider type.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use zonesync_core::registry::BackendRegistry;
//!
//! let registry = BackendRegistry::with_builtin();
//! zonesync_backend_bind::register(&registry);
//!
//! let backend = registry.connect(&config.provider_config()?)?;
//! ```
//!
//! ## Registration
//!
//! Backend crates expose a `register` function:
//!
//! ```rust,ignore
//! pub fn register(registry: &BackendRegistry) {
//!     registry.register_backend("bind", Box::new(BindFactory));
//! }
//! ```

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};
use tracing::debug;

use crate::backend::{MOCK_PROVIDER, MemoryBackendFactory};
use crate::config::ProviderConfig;
use crate::error::{Error, Result};
use crate::traits::{DnsBackend, DnsBackendFactory};

/// Registry mapping provider names to backend factories
///
/// Registration takes `&self`; the map sits behind an `RwLock`.
#[derive(Default)]
pub struct BackendRegistry {
    backends: RwLock<HashMap<String, Box<dyn DnsBackendFactory>>>,
}

impl BackendRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with the in-memory `mock` backend registered
    pub fn with_builtin() -> Self {
        let registry = Self::new();
        registry.register_backend(MOCK_PROVIDER, Box::new(MemoryBackendFactory::new()));
        registry
    }

    /// Register (or replace) the factory for `name`
    pub fn register_backend(&self, name: impl Into<String>, factory: Box<dyn DnsBackendFactory>) {
        let name = name.into();
        debug!("Registering backend '{}'", name);
        self.backends
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name, factory);
    }

    /// Build the backend selected by `config`
    pub fn connect(&self, config: &ProviderConfig) -> Result<Box<dyn DnsBackend>> {
        let backends = self.backends.read().unwrap_or_else(PoisonError::into_inner);

        let factory = backends.get(&config.provider).ok_or_else(|| {
            let mut known: Vec<&str> = backends.keys().map(String::as_str).collect();
            known.sort_unstable();
            Error::config(format!(
                "Unknown provider '{}' (registered: {})",
                config.provider,
                known.join(", ")
            ))
        })?;

        factory.connect(config)
    }

    /// Registered provider names, sorted
    pub fn list_backends(&self) -> Vec<String> {
        let backends = self.backends.read().unwrap_or_else(PoisonError::into_inner);
        let mut names: Vec<String> = backends.keys().cloned().collect();
        names.sort();
        names
    }

    /// Whether `name` is registered
    pub fn has_backend(&self, name: &str) -> bool {
        self.backends
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(name)
    }
}
