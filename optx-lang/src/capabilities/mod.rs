//! Capability implementations
//!
//! Built-in capabilities for the languages the registry knows out of the box, the pass-through
//! fallback, and rule capabilities declared in configuration.

pub mod common;
pub mod javascript;
pub mod json;
pub mod passthrough;
pub mod php;
pub mod python;
pub mod rules;

pub use javascript::{JavascriptCapability, JsxCapability};
pub use json::JsonCapability;
pub use passthrough::PassThrough;
pub use php::PhpCapability;
pub use python::PythonCapability;
pub use rules::{RuleCapability, RuleSet};
