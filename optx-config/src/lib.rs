//! Shared configuration loader for optx.
//!
//! `defaults/optx.default.toml` is embedded into every binary so that docs and
//! runtime behavior stay in sync. Applications layer user-specific files on top
//! of those defaults via [`Loader`] before deserializing into [`OptxConfig`].
//!
//! The execution core never reads configuration itself: callers turn the
//! [`LanguagesConfig`] section into a capability registry with
//! [`LanguagesConfig::build_registry`] and pass the execution knobs along.

use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError, File, FileFormat, ValueKind};
use optx_lang::capabilities::{RuleCapability, RuleSet};
use optx_lang::{CapabilityRegistry, RegistryError};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

const DEFAULT_TOML: &str = include_str!("../defaults/optx.default.toml");

/// Top-level configuration consumed by optx applications.
#[derive(Debug, Clone, Deserialize)]
pub struct OptxConfig {
    pub execution: ExecutionConfig,
    pub staging: StagingConfig,
    #[serde(default)]
    pub languages: LanguagesConfig,
}

/// How documents are run.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ExecutionConfig {
    pub dry_run: bool,
    pub continue_on_error: bool,
    pub max_parallelism: usize,
    pub timeout_secs: u64,
    pub allow_overwrite: bool,
    pub partial_apply: bool,
    pub recursive: bool,
}

impl ExecutionConfig {
    /// Per-document deadline, if one is configured
    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_secs > 0).then(|| Duration::from_secs(self.timeout_secs))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct StagingConfig {
    pub cleanup_on_start: bool,
    pub stale_after_secs: u64,
}

impl StagingConfig {
    /// Minimum age of a staging file before startup cleanup removes it
    pub fn stale_after(&self) -> Duration {
        Duration::from_secs(self.stale_after_secs)
    }
}

/// Capabilities declared on top of the built-in ones.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LanguagesConfig {
    /// Extra key -> existing key
    pub aliases: BTreeMap<String, String>,
    pub rules: Vec<RuleSet>,
}

impl LanguagesConfig {
    /// Built-in capabilities, then rule capabilities, then aliases.
    ///
    /// Rules are registered under their extensions and their name, so a rule can replace a
    /// built-in for an extension. Aliases are resolved last and may point at rule names.
    pub fn build_registry(&self) -> Result<CapabilityRegistry, RegistryError> {
        let mut registry = CapabilityRegistry::with_defaults();
        for rules in &self.rules {
            let capability: Arc<RuleCapability> = Arc::new(RuleCapability::new(rules.clone()));
            registry.install(capability.clone());
            registry.register(&rules.name, capability);
        }
        for (alias, target) in &self.aliases {
            registry.alias(alias, target)?;
        }
        tracing::debug!(
            rules = self.rules.len(),
            aliases = self.aliases.len(),
            "built capability registry"
        );
        Ok(registry)
    }
}

/// Helper for layering user overrides over the built-in defaults.
#[derive(Debug, Clone)]
pub struct Loader {
    builder: ConfigBuilder<DefaultState>,
}

impl Loader {
    /// Start a loader seeded with the embedded defaults.
    pub fn new() -> Self {
        let builder = Config::builder().add_source(File::from_str(DEFAULT_TOML, FileFormat::Toml));
        Self { builder }
    }

    /// Layer a configuration file. Missing files trigger an error.
    pub fn with_file(mut self, path: impl AsRef<Path>) -> Self {
        let source = File::from(path.as_ref())
            .format(FileFormat::Toml)
            .required(true);
        self.builder = self.builder.add_source(source);
        self
    }

    /// Layer an optional configuration file (ignored if the file is absent).
    pub fn with_optional_file(mut self, path: impl AsRef<Path>) -> Self {
        let source = File::from(path.as_ref())
            .format(FileFormat::Toml)
            .required(false);
        self.builder = self.builder.add_source(source);
        self
    }

    /// Apply a single key/value override (useful for CLI settings).
    pub fn set_override<I>(mut self, key: &str, value: I) -> Result<Self, ConfigError>
    where
        I: Into<ValueKind>,
    {
        self.builder = self.builder.set_override(key, value)?;
        Ok(self)
    }

    /// Finalize the builder and deserialize the resulting configuration.
    pub fn build(self) -> Result<OptxConfig, ConfigError> {
        self.builder.build()?.try_deserialize()
    }
}

impl Default for Loader {
    fn default() -> Self {
        Self::new()
    }
}

/// Convenience helper for callers that only need the defaults.
pub fn load_defaults() -> Result<OptxConfig, ConfigError> {
    Loader::new().build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn loads_default_config() {
        let config = load_defaults().expect("defaults to deserialize");
        assert!(!config.execution.dry_run);
        assert_eq!(config.execution.max_parallelism, 1);
        assert_eq!(config.execution.timeout(), None);
        assert!(config.staging.cleanup_on_start);
        assert_eq!(config.staging.stale_after(), Duration::from_secs(3600));
        assert!(config.languages.rules.is_empty());
    }

    #[test]
    fn supports_overrides() {
        let config = Loader::new()
            .set_override("execution.dry-run", true)
            .expect("override to apply")
            .set_override("execution.timeout-secs", 30)
            .expect("override to apply")
            .build()
            .expect("config to build");
        assert!(config.execution.dry_run);
        assert_eq!(config.execution.timeout(), Some(Duration::from_secs(30)));
    }

    #[test]
    fn missing_optional_file_is_ignored() {
        let config = Loader::new()
            .with_optional_file("/definitely/not/here/optx.toml")
            .build()
            .expect("config to build");
        assert!(!config.execution.continue_on_error);
    }

    #[test]
    fn missing_required_file_fails() {
        let result = Loader::new()
            .with_file("/definitely/not/here/optx.toml")
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn user_file_declares_rules_and_aliases() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("optx.toml");
        fs::write(
            &path,
            r#"
[execution]
max-parallelism = 4

[languages.aliases]
pyi = "python"
notes = "markdown"

[[languages.rules]]
name = "markdown"
extensions = ["md"]
trim-trailing-whitespace = true
final-newline = true
forbid = ["<<<<<<<"]
"#,
        )
        .unwrap();

        let config = Loader::new().with_file(&path).build().expect("config to build");
        assert_eq!(config.execution.max_parallelism, 4);
        assert!(!config.execution.dry_run);

        let registry = config.languages.build_registry().expect("registry to build");
        assert_eq!(registry.resolve("pyi").name(), "python");
        assert_eq!(registry.resolve(".MD").name(), "markdown");
        assert_eq!(registry.resolve("notes").name(), "markdown");
        assert!(registry.resolve("md").transform("a  \n<<<<<<< HEAD\n").is_err());
    }

    #[test]
    fn alias_to_unknown_key_is_rejected() {
        let languages = LanguagesConfig {
            aliases: BTreeMap::from([("x".to_string(), "nope".to_string())]),
            rules: Vec::new(),
        };
        assert!(matches!(
            languages.build_registry(),
            Err(RegistryError::UnknownTarget { .. })
        ));
    }
}
