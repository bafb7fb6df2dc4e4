//! Capabilities declared in configuration
//!
//! A [RuleSet] describes a handful of whitespace rules and forbidden substrings for a list of
//! extensions. It is deserialized from the `languages.rules` section of the config file and
//! wrapped in a [RuleCapability] for registration.

use super::common::{
    ensure_final_newline, map_lines, normalize_line_endings, strip_trailing_whitespace,
};
use crate::capability::LanguageCapability;
use crate::diagnostics::{Diagnostic, DiagnosticSeverity};
use crate::error::CapabilityError;
use serde::{Deserialize, Serialize};

/// Rule declaration as written in configuration
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct RuleSet {
    pub name: String,
    pub extensions: Vec<String>,
    pub trim_trailing_whitespace: bool,
    pub final_newline: bool,
    /// Replace every tab with this many spaces
    pub tabs_to_spaces: Option<usize>,
    /// Substrings that make the transform fail
    pub forbid: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct RuleCapability {
    rules: RuleSet,
    description: String,
}

impl RuleCapability {
    pub fn new(rules: RuleSet) -> Self {
        let description = format!("Rules for {}", rules.extensions.join(", "));
        RuleCapability { rules, description }
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    fn forbidden(&self, content: &str) -> Vec<(usize, &str)> {
        let mut found = Vec::new();
        for (line_number, line) in content.split('\n').enumerate() {
            for pattern in self.rules.forbid.iter().filter(|p| !p.is_empty()) {
                if line.contains(pattern.as_str()) {
                    found.push((line_number, pattern.as_str()));
                }
            }
        }
        found
    }
}

impl LanguageCapability for RuleCapability {
    fn name(&self) -> &str {
        &self.rules.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn keys(&self) -> Vec<&str> {
        self.rules.extensions.iter().map(String::as_str).collect()
    }

    fn analyze(&self, content: &str) -> Vec<Diagnostic> {
        self.forbidden(&normalize_line_endings(content))
            .into_iter()
            .map(|(line, pattern)| {
                Diagnostic::new(
                    DiagnosticSeverity::Error,
                    format!("contains forbidden `{}`", pattern),
                )
                .at_line(line)
                .with_code("forbidden")
            })
            .collect()
    }

    fn transform(&self, content: &str) -> Result<String, CapabilityError> {
        let mut out = normalize_line_endings(content);

        if let Some(width) = self.rules.tabs_to_spaces {
            let spaces = " ".repeat(width);
            out = map_lines(&out, |line| line.replace('\t', &spaces));
        }
        if self.rules.trim_trailing_whitespace {
            out = strip_trailing_whitespace(&out);
        }
        if self.rules.final_newline {
            out = ensure_final_newline(&out);
        }

        // forbid applies to the transformed output
        if let Some((line, pattern)) = self.forbidden(&out).into_iter().next() {
            return Err(CapabilityError::Forbidden {
                pattern: pattern.to_string(),
                line,
            });
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn yaml_rules() -> RuleSet {
        RuleSet {
            name: "yaml".to_string(),
            extensions: vec!["yml".to_string(), "yaml".to_string()],
            trim_trailing_whitespace: true,
            final_newline: true,
            tabs_to_spaces: Some(2),
            forbid: vec!["password:".to_string()],
        }
    }

    #[test]
    fn test_rules_transform() {
        let capability = RuleCapability::new(yaml_rules());
        assert_eq!(
            capability.transform("a:\r\n\tb: 1  \n\n").unwrap(),
            "a:\n  b: 1\n"
        );
        assert_eq!(capability.keys(), vec!["yml", "yaml"]);
    }

    #[test]
    fn test_forbidden_substring_fails() {
        let capability = RuleCapability::new(yaml_rules());
        let err = capability.transform("user: x\npassword: y\n").unwrap_err();
        assert_eq!(
            err,
            CapabilityError::Forbidden {
                pattern: "password:".to_string(),
                line: 1
            }
        );
        assert_eq!(capability.analyze("password: y")[0].line, Some(0));
    }

    #[test]
    fn test_rules_default_to_line_ending_normalization_only() {
        let capability = RuleCapability::new(RuleSet {
            name: "plain".to_string(),
            extensions: vec!["cfg".to_string()],
            ..RuleSet::default()
        });
        assert_eq!(capability.transform("a \r\n\tb").unwrap(), "a \n\tb");
    }
}
