//! Language capabilities for operation documents
//!
//!     Every content block of a transaction is routed to a [LanguageCapability] picked by the
//!     block's language key (the target extension or a `[block <language>]` override). A
//!     capability can inspect the content and report [Diagnostic]s (advisory only), and it can
//!     transform the content into the bytes that will be written. Transforms are deterministic
//!     and idempotent.
//!
//!     This is a pure lib: it never touches the filesystem or the environment. Which
//!     capabilities exist is decided by whoever builds the [CapabilityRegistry], usually the
//!     config crate at startup. The registry is read-only afterwards.
//!
//!     The file structure:
//!     .
//!     ├── capability.rs           # LanguageCapability trait
//!     ├── diagnostics.rs          # Advisory findings produced by analyze
//!     ├── error.rs
//!     ├── registry.rs             # Key -> capability lookup with pass-through fallback
//!     ├── processor.rs            # Runs capabilities over transactions
//!     └── capabilities
//!         ├── common.rs           # Shared text normalization and bracket scanning
//!         ├── <language>.rs       # Built-in capabilities
//!         └── rules.rs            # Capabilities declared in configuration

pub mod capabilities;
pub mod capability;
pub mod diagnostics;
pub mod error;
pub mod processor;
pub mod registry;

pub use capability::LanguageCapability;
pub use diagnostics::{Diagnostic, DiagnosticSeverity};
pub use error::{CapabilityError, ProcessingError, RegistryError};
pub use processor::{
    process_block, process_document, process_transaction, process_transactions, ProcessedBlock,
    ProcessedTransaction, ProcessingOutcome,
};
pub use registry::CapabilityRegistry;
