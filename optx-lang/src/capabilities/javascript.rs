//! JavaScript and JSX capabilities
//!
//! Plain JavaScript must have balanced brackets to be transformed. JSX text is free prose where
//! an apostrophe is not a quote, so for JSX an imbalance is only reported as a diagnostic.

use super::common::{
    check_brackets, ensure_final_newline, normalize_line_endings, strip_trailing_whitespace,
    Syntax,
};
use crate::capability::LanguageCapability;
use crate::diagnostics::Diagnostic;
use crate::error::CapabilityError;
use once_cell::sync::Lazy;
use regex::Regex;

pub(crate) const JS_SYNTAX: Syntax = Syntax {
    line_comments: &["//"],
    block_comment: Some(("/*", "*/")),
    quotes: &['"', '\'', '`'],
    regex_literals: true,
};

const JSX_SYNTAX: Syntax = Syntax {
    quotes: &['"', '`'],
    ..JS_SYNTAX
};

static VAR_DECLARATION: Lazy<Regex> = Lazy::new(|| Regex::new(r"(^|[^\w$.])var\s").unwrap());

static LOOSE_EQUALITY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(^|[^=!<>])(==|!=)($|[^=])").unwrap());

#[derive(Debug, Clone, Copy, Default)]
pub struct JavascriptCapability;

impl LanguageCapability for JavascriptCapability {
    fn name(&self) -> &str {
        "javascript"
    }

    fn description(&self) -> &str {
        "Normalizes whitespace and checks bracket balance of JavaScript source"
    }

    fn keys(&self) -> Vec<&str> {
        vec!["js", "mjs", "cjs", "javascript"]
    }

    fn analyze(&self, content: &str) -> Vec<Diagnostic> {
        lint(content)
    }

    fn transform(&self, content: &str) -> Result<String, CapabilityError> {
        let normalized = strip_trailing_whitespace(&normalize_line_endings(content));
        check_brackets(&normalized, &JS_SYNTAX)?;
        Ok(ensure_final_newline(&normalized))
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct JsxCapability;

impl LanguageCapability for JsxCapability {
    fn name(&self) -> &str {
        "jsx"
    }

    fn description(&self) -> &str {
        "Normalizes whitespace of JSX source and warns about unbalanced brackets"
    }

    fn keys(&self) -> Vec<&str> {
        vec!["jsx"]
    }

    fn analyze(&self, content: &str) -> Vec<Diagnostic> {
        let mut diagnostics = lint(content);
        if let Err(err) = check_brackets(&normalize_line_endings(content), &JSX_SYNTAX) {
            diagnostics.push(
                Diagnostic::warning(err.to_string())
                    .at_line(err.line())
                    .with_code("unbalanced-bracket"),
            );
        }
        diagnostics
    }

    fn transform(&self, content: &str) -> Result<String, CapabilityError> {
        let normalized = strip_trailing_whitespace(&normalize_line_endings(content));
        Ok(ensure_final_newline(&normalized))
    }
}

fn lint(content: &str) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();
    for (line_number, line) in normalize_line_endings(content).lines().enumerate() {
        let code = line.split("//").next().unwrap_or_default();
        if VAR_DECLARATION.is_match(code) {
            diagnostics.push(
                Diagnostic::warning("`var` declaration, prefer `let` or `const`")
                    .at_line(line_number)
                    .with_code("no-var"),
            );
        }
        if LOOSE_EQUALITY.is_match(code) {
            diagnostics.push(
                Diagnostic::warning("loose equality comparison")
                    .at_line(line_number)
                    .with_code("eqeqeq"),
            );
        }
    }
    diagnostics
}
