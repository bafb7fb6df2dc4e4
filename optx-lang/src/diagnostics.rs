//! Advisory findings produced by capabilities
//!
//! Diagnostics never block execution. They are attached to the report so a reviewer can see
//! what a capability noticed about the content it processed.

use serde::Serialize;
use std::fmt;

/// Diagnostic severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticSeverity {
    Error,
    Warning,
    Information,
    Hint,
}

impl fmt::Display for DiagnosticSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiagnosticSeverity::Error => write!(f, "error"),
            DiagnosticSeverity::Warning => write!(f, "warning"),
            DiagnosticSeverity::Information => write!(f, "info"),
            DiagnosticSeverity::Hint => write!(f, "hint"),
        }
    }
}

/// Structured finding about a piece of content
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    /// Zero-based line, relative to the content a capability saw until the processor shifts it
    pub line: Option<usize>,
    pub severity: DiagnosticSeverity,
    pub message: String,
    pub code: Option<String>,
    /// Name of the capability that produced it
    pub source: String,
}

impl Diagnostic {
    pub fn new(severity: DiagnosticSeverity, message: impl Into<String>) -> Self {
        Self {
            line: None,
            severity,
            message: message.into(),
            code: None,
            source: String::new(),
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(DiagnosticSeverity::Warning, message)
    }

    pub fn at_line(mut self, line: usize) -> Self {
        self.line = Some(line);
        self
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    pub(crate) fn shifted(mut self, lines: usize) -> Self {
        self.line = self.line.map(|line| line + lines);
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]: {}", self.severity, self.source, self.message)?;
        if let Some(code) = &self.code {
            write!(f, " ({})", code)?;
        }
        if let Some(line) = self.line {
            write!(f, " at line {}", line + 1)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_is_one_based() {
        let diag = Diagnostic::warning("`var` declaration")
            .at_line(2)
            .with_code("no-var")
            .with_source("javascript");
        assert_eq!(
            diag.to_string(),
            "warning [javascript]: `var` declaration (no-var) at line 3"
        );
    }

    #[test]
    fn test_shifted_keeps_missing_lines() {
        let diag = Diagnostic::new(DiagnosticSeverity::Hint, "x").shifted(10);
        assert_eq!(diag.line, None);
        assert_eq!(Diagnostic::warning("y").at_line(1).shifted(10).line, Some(11));
    }
}
