//! PHP capability
//!
//! A closing `?>` at the end of a file invites stray output after it, so the transform drops
//! it. Everything else mirrors the JavaScript normalization.

use super::common::{
    check_brackets, ensure_final_newline, normalize_line_endings, strip_trailing_whitespace,
    Syntax,
};
use crate::capability::LanguageCapability;
use crate::diagnostics::{Diagnostic, DiagnosticSeverity};
use crate::error::CapabilityError;

const PHP_SYNTAX: Syntax = Syntax {
    line_comments: &["//", "#"],
    block_comment: Some(("/*", "*/")),
    quotes: &['"', '\''],
    regex_literals: false,
};

const OPEN_TAG: &str = "<?php";
const CLOSE_TAG: &str = "?>";

#[derive(Debug, Clone, Copy, Default)]
pub struct PhpCapability;

impl LanguageCapability for PhpCapability {
    fn name(&self) -> &str {
        "php"
    }

    fn description(&self) -> &str {
        "Normalizes whitespace and drops the trailing close tag of PHP source"
    }

    fn keys(&self) -> Vec<&str> {
        vec!["php", "phtml"]
    }

    fn analyze(&self, content: &str) -> Vec<Diagnostic> {
        if content.trim_start().starts_with(OPEN_TAG) {
            return Vec::new();
        }
        vec![Diagnostic::new(
            DiagnosticSeverity::Warning,
            "missing `<?php` open tag",
        )
        .at_line(0)
        .with_code("missing-open-tag")]
    }

    fn transform(&self, content: &str) -> Result<String, CapabilityError> {
        let normalized = strip_trailing_whitespace(&normalize_line_endings(content));

        let mut body = normalized.trim_end();
        while let Some(stripped) = body.strip_suffix(CLOSE_TAG) {
            body = stripped.trim_end();
        }

        check_brackets(body, &PHP_SYNTAX)?;
        Ok(ensure_final_newline(body))
    }
}
