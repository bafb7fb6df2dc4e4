//! Capability registry for language lookup
//!
//! This module maps registry keys (file extensions and language ids) to capabilities.
//! Lookups never fail: keys nobody registered resolve to the pass-through capability.

use crate::capabilities::{
    JavascriptCapability, JsonCapability, JsxCapability, PassThrough, PhpCapability,
    PythonCapability,
};
use crate::capability::LanguageCapability;
use crate::error::RegistryError;
use std::collections::HashMap;
use std::sync::Arc;

/// Registry of language capabilities
///
/// Built once at startup and then shared read-only, so concurrent lookups need no locking.
///
/// # Examples
///
/// ```ignore
/// let mut registry = CapabilityRegistry::with_defaults();
/// registry.register("pyi", Arc::new(PythonCapability));
///
/// let capability = registry.resolve("py");
/// let content = capability.transform("x = 1\t\n")?;
/// ```
pub struct CapabilityRegistry {
    capabilities: HashMap<String, Arc<dyn LanguageCapability>>,
    fallback: Arc<dyn LanguageCapability>,
}

impl CapabilityRegistry {
    /// Create a new empty registry; everything resolves to pass-through
    pub fn new() -> Self {
        CapabilityRegistry {
            capabilities: HashMap::new(),
            fallback: Arc::new(PassThrough),
        }
    }

    /// Register a capability under one key
    ///
    /// If the key already has a capability, it will be replaced.
    pub fn register(&mut self, key: &str, capability: Arc<dyn LanguageCapability>) {
        let key = normalize_key(key);
        if key.is_empty() {
            tracing::warn!(capability = capability.name(), "ignoring empty registry key");
            return;
        }
        self.capabilities.insert(key, capability);
    }

    /// Register a capability under every key it declares
    pub fn install(&mut self, capability: Arc<dyn LanguageCapability>) {
        let keys: Vec<String> = capability.keys().into_iter().map(String::from).collect();
        for key in keys {
            self.register(&key, Arc::clone(&capability));
        }
    }

    /// Make `alias` resolve to whatever `target` currently resolves to
    pub fn alias(&mut self, alias: &str, target: &str) -> Result<(), RegistryError> {
        if normalize_key(alias).is_empty() {
            return Err(RegistryError::InvalidKey(alias.to_string()));
        }
        let capability = self
            .capabilities
            .get(&normalize_key(target))
            .cloned()
            .ok_or_else(|| RegistryError::UnknownTarget {
                alias: alias.to_string(),
                target: target.to_string(),
            })?;
        self.register(alias, capability);
        Ok(())
    }

    /// Look up the capability for a key, falling back to pass-through
    pub fn resolve(&self, key: &str) -> &dyn LanguageCapability {
        self.capabilities
            .get(&normalize_key(key))
            .unwrap_or(&self.fallback)
            .as_ref()
    }

    /// Check if a key has a registered capability
    pub fn has(&self, key: &str) -> bool {
        self.capabilities.contains_key(&normalize_key(key))
    }

    /// List all registered keys (sorted)
    pub fn list(&self) -> Vec<String> {
        let mut keys: Vec<_> = self.capabilities.keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Registered keys with the capability each one resolves to (sorted by key)
    pub fn entries(&self) -> Vec<(String, String)> {
        self.list()
            .into_iter()
            .map(|key| {
                let name = self.resolve(&key).name().to_string();
                (key, name)
            })
            .collect()
    }

    /// Create a registry with the built-in capabilities
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();

        registry.install(Arc::new(PythonCapability));
        registry.install(Arc::new(JavascriptCapability));
        registry.install(Arc::new(JsxCapability));
        registry.install(Arc::new(PhpCapability));
        registry.install(Arc::new(JsonCapability));

        registry
    }
}

impl Default for CapabilityRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl std::fmt::Debug for CapabilityRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map().entries(self.entries()).finish()
    }
}

/// Lowercase a key and drop a leading dot, so `.PY` and `py` are the same key
pub fn normalize_key(key: &str) -> String {
    key.trim().trim_start_matches('.').to_ascii_lowercase()
}
