//! JSON capability
//!
//! Content is parsed with serde_json and pretty printed with two-space indentation.

use crate::capability::LanguageCapability;
use crate::diagnostics::{Diagnostic, DiagnosticSeverity};
use crate::error::CapabilityError;
use serde_json::Value;

#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCapability;

impl JsonCapability {
    fn parse(content: &str) -> Result<Value, CapabilityError> {
        serde_json::from_str(content).map_err(|err| CapabilityError::InvalidJson {
            line: err.line().saturating_sub(1),
            column: err.column().saturating_sub(1),
            message: err.to_string(),
        })
    }
}

impl LanguageCapability for JsonCapability {
    fn name(&self) -> &str {
        "json"
    }

    fn description(&self) -> &str {
        "Validates and pretty prints JSON"
    }

    fn keys(&self) -> Vec<&str> {
        vec!["json"]
    }

    fn analyze(&self, content: &str) -> Vec<Diagnostic> {
        match Self::parse(content) {
            Ok(_) => Vec::new(),
            Err(err) => vec![Diagnostic::new(DiagnosticSeverity::Error, err.to_string())
                .at_line(err.line())
                .with_code("invalid-json")],
        }
    }

    fn transform(&self, content: &str) -> Result<String, CapabilityError> {
        let value = Self::parse(content)?;
        let mut pretty = serde_json::to_string_pretty(&value).map_err(|err| {
            CapabilityError::InvalidJson {
                line: 0,
                column: 0,
                message: err.to_string(),
            }
        })?;
        pretty.push('\n');
        Ok(pretty)
    }
}
