//! Python capability
//!
//! Indentation is significant in Python, so the transform is strict about it: leading tabs are
//! expanded to four spaces, and a line whose indentation has a space before a tab is rejected
//! because its meaning depends on the reader's tab width.

use super::common::{
    ensure_final_newline, indentation, map_lines, normalize_line_endings,
    strip_trailing_whitespace,
};
use crate::capability::LanguageCapability;
use crate::diagnostics::Diagnostic;
use crate::error::CapabilityError;
use once_cell::sync::Lazy;
use regex::Regex;

const TAB_WIDTH: usize = 4;

/// Python 2 style `print value` statements
static PRINT_STATEMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*print\s+[^\s(=]").unwrap());

#[derive(Debug, Clone, Copy, Default)]
pub struct PythonCapability;

impl LanguageCapability for PythonCapability {
    fn name(&self) -> &str {
        "python"
    }

    fn description(&self) -> &str {
        "Normalizes whitespace and indentation of Python source"
    }

    fn keys(&self) -> Vec<&str> {
        vec!["py", "pyw", "python"]
    }

    fn analyze(&self, content: &str) -> Vec<Diagnostic> {
        let mut diagnostics = Vec::new();
        for (line_number, line) in normalize_line_endings(content).lines().enumerate() {
            if PRINT_STATEMENT.is_match(line) {
                diagnostics.push(
                    Diagnostic::warning("Python 2 print statement")
                        .at_line(line_number)
                        .with_code("print-statement"),
                );
            }
            let indent = indentation(line);
            if indent.contains(' ') && indent.contains('\t') && line.len() > indent.len() {
                diagnostics.push(
                    Diagnostic::warning("indentation mixes tabs and spaces")
                        .at_line(line_number)
                        .with_code("mixed-indentation"),
                );
            }
        }
        diagnostics
    }

    fn transform(&self, content: &str) -> Result<String, CapabilityError> {
        let stripped = strip_trailing_whitespace(&normalize_line_endings(content));

        if let Some(line) = stripped
            .split('\n')
            .position(|line| indentation(line).contains(" \t"))
        {
            return Err(CapabilityError::AmbiguousIndentation { line });
        }

        let expanded = map_lines(&stripped, |line| {
            let indent = indentation(line);
            let width: usize = indent
                .chars()
                .map(|c| if c == '\t' { TAB_WIDTH } else { 1 })
                .sum();
            format!("{}{}", " ".repeat(width), &line[indent.len()..])
        });

        Ok(ensure_final_newline(&expanded))
    }
}
