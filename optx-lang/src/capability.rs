//! Capability trait definition
//!
//! A capability bundles the analyze and transform behavior for one kind of file. The trait
//! provides a uniform interface so the processor never needs to know which language it is
//! handling.

use crate::diagnostics::Diagnostic;
use crate::error::CapabilityError;

/// Analyze + transform behavior registered for a file type
///
/// Implementations must be stateless, so one instance can serve concurrent lookups from many
/// documents.
///
/// # Examples
///
/// ```ignore
/// struct Upper;
///
/// impl LanguageCapability for Upper {
///     fn name(&self) -> &str {
///         "upper"
///     }
///
///     fn transform(&self, content: &str) -> Result<String, CapabilityError> {
///         Ok(content.to_uppercase())
///     }
/// }
/// ```
pub trait LanguageCapability: Send + Sync {
    /// The name of this capability (e.g., "python", "json")
    fn name(&self) -> &str;

    /// Optional description of this capability
    fn description(&self) -> &str {
        ""
    }

    /// Registry keys this capability answers to by default (extensions and language ids)
    fn keys(&self) -> Vec<&str> {
        Vec::new()
    }

    /// Inspect content and report advisory findings
    ///
    /// Lines in the returned diagnostics are zero-based and relative to `content`.
    fn analyze(&self, _content: &str) -> Vec<Diagnostic> {
        Vec::new()
    }

    /// Produce the content that will be written
    ///
    /// Must be deterministic, and idempotent: `transform(transform(x)) == transform(x)`.
    fn transform(&self, content: &str) -> Result<String, CapabilityError>;
}
