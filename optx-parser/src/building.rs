//! Transaction building and validation
//!
//! Turns [`RawTransaction`] records into [`Transaction`] values. Validation is pure: it never
//! touches the filesystem, so a whole document can be checked before any I/O happens.
//! Existence checks belong to the planner.
//!
//! Errors are collected across all transactions of a document rather than stopping at the
//! first one, so a single run reports every defect.

use crate::ast::{
    infer_language, ActionKind, ContentBlock, OperationDocument, RawTransaction, Transaction,
};
use crate::error::{Field, ValidationError, ValidationErrors};
use std::path::{Component, Path, PathBuf};

/// Suffix reserved for staging artifacts; targets may never use it
pub const STAGING_SUFFIX: &str = ".optx-staged";

/// Result of building every record of a document
#[derive(Debug, Clone, Default)]
pub struct BuildOutcome {
    /// Transactions that passed validation, in source order
    pub transactions: Vec<Transaction>,
    pub errors: Vec<ValidationError>,
}

impl BuildOutcome {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Indices of the records that failed validation
    pub fn failed_indices(&self) -> Vec<usize> {
        let mut indices: Vec<usize> = self.errors.iter().map(|e| e.transaction_index).collect();
        indices.dedup();
        indices
    }
}

/// Build all records, keeping valid transactions and collecting every error.
pub fn build_all(records: &[RawTransaction]) -> BuildOutcome {
    let mut outcome = BuildOutcome::default();

    for record in records {
        match build(record) {
            Ok(transaction) => outcome.transactions.push(transaction),
            Err(errors) => outcome.errors.extend(errors),
        }
    }

    outcome
}

/// Build a complete document; fails if any record is invalid.
pub fn build_document(
    origin: impl Into<String>,
    records: &[RawTransaction],
) -> Result<OperationDocument, ValidationErrors> {
    let outcome = build_all(records);
    if !outcome.is_valid() {
        return Err(ValidationErrors(outcome.errors));
    }
    Ok(OperationDocument {
        origin: origin.into(),
        transactions: outcome.transactions,
    })
}

/// Build one record into a transaction, reporting every defect found.
pub fn build(record: &RawTransaction) -> Result<Transaction, Vec<ValidationError>> {
    let index = record.index;
    let mut errors = Vec::new();
    let mut fields = RecognizedFields::default();
    let mut extra = Vec::new();

    for entry in &record.metadata {
        let key = entry.key.to_ascii_lowercase();
        let slot = match key.as_str() {
            "action" => Some((&mut fields.action, Field::Action)),
            "target" => Some((&mut fields.target, Field::Target)),
            "reasoning" => Some((&mut fields.reasoning, Field::Reasoning)),
            "developer-notes" => Some((&mut fields.developer_notes, Field::DeveloperNotes)),
            "author" => Some((&mut fields.author, Field::Author)),
            "destination" => Some((&mut fields.destination, Field::Destination)),
            _ => None,
        };
        match slot {
            Some((slot, _)) if slot.is_none() => *slot = Some(entry.value.clone()),
            Some((_, field)) => errors.push(ValidationError::new(
                index,
                field,
                format!("`{}` given more than once (line {})", key, entry.position.line + 1),
            )),
            None => extra.push((entry.key.clone(), entry.value.clone())),
        }
    }

    let action = match fields.action.as_deref() {
        None => {
            errors.push(ValidationError::new(index, Field::Action, "missing"));
            None
        }
        Some(verb) => match ActionKind::from_verb(verb) {
            Some(action) => Some(action),
            None => {
                errors.push(ValidationError::new(
                    index,
                    Field::Action,
                    format!("unknown action `{}`", verb),
                ));
                None
            }
        },
    };

    let target = match fields.target.as_deref() {
        None => {
            errors.push(ValidationError::new(index, Field::Target, "missing"));
            None
        }
        Some(raw) => match check_relative_path(raw) {
            Ok(path) => Some(path),
            Err(reason) => {
                errors.push(ValidationError::new(index, Field::Target, reason));
                None
            }
        },
    };

    let reasoning = fields
        .reasoning
        .as_deref()
        .map(str::trim)
        .filter(|r| !r.is_empty());
    if reasoning.is_none() {
        errors.push(ValidationError::new(
            index,
            Field::Reasoning,
            "must not be empty",
        ));
    }

    let destination = match (action, fields.destination.as_deref()) {
        (Some(ActionKind::Rename), None) => {
            errors.push(ValidationError::new(
                index,
                Field::Destination,
                "rename requires a destination",
            ));
            None
        }
        (Some(ActionKind::Rename), Some(raw)) => match check_relative_path(raw) {
            Ok(path) if Some(&path) == target.as_ref() => {
                errors.push(ValidationError::new(
                    index,
                    Field::Destination,
                    "destination equals target",
                ));
                None
            }
            Ok(path) => Some(path),
            Err(reason) => {
                errors.push(ValidationError::new(index, Field::Destination, reason));
                None
            }
        },
        (Some(other), Some(_)) => {
            errors.push(ValidationError::new(
                index,
                Field::Destination,
                format!("only rename takes a destination, not {}", other),
            ));
            None
        }
        (None, _) => None,
        (Some(_), None) => None,
    };

    if let Some(action) = action {
        if action.forbids_content() && !record.blocks.is_empty() {
            errors.push(ValidationError::new(
                index,
                Field::Blocks,
                format!("{} must not carry content blocks", action),
            ));
        }
        if !action.forbids_content() && !action.is_metadata_only() && record.blocks.is_empty() {
            errors.push(ValidationError::new(
                index,
                Field::Blocks,
                format!("{} requires at least one content block", action),
            ));
        }
    }

    match (action, target, reasoning) {
        (Some(action), Some(target), Some(reasoning)) if errors.is_empty() => {
            let inferred = infer_language(&target);
            let blocks = record
                .blocks
                .iter()
                .map(|block| ContentBlock {
                    range: block.range.clone(),
                    marker: block.marker,
                    language: block
                        .language
                        .as_deref()
                        .map(str::to_ascii_lowercase)
                        .unwrap_or_else(|| inferred.clone()),
                    language_overridden: block.language.is_some(),
                    raw: block.content.clone(),
                })
                .collect();

            Ok(Transaction {
                index,
                action,
                target,
                destination,
                reasoning: reasoning.to_string(),
                developer_notes: non_empty(fields.developer_notes),
                author: non_empty(fields.author),
                extra,
                blocks,
                range: record.range.clone(),
            })
        }
        _ => Err(errors),
    }
}

#[derive(Default)]
struct RecognizedFields {
    action: Option<String>,
    target: Option<String>,
    reasoning: Option<String>,
    developer_notes: Option<String>,
    author: Option<String>,
    destination: Option<String>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Check that a path stays inside the project root, returning it normalized.
///
/// Rejects empty paths, absolute paths and prefixes, `..` segments, paths made only of `.`
/// segments, and names carrying the reserved staging suffix. `.` segments are dropped and
/// backslashes are treated as separators.
pub fn check_relative_path(raw: &str) -> Result<PathBuf, String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err("must not be empty".to_string());
    }

    let unified = raw.replace('\\', "/");
    if unified.starts_with('/') || has_drive_prefix(&unified) {
        return Err(format!("`{}` must be a relative path", raw));
    }

    let mut normalized = PathBuf::new();
    for component in Path::new(&unified).components() {
        match component {
            Component::Normal(part) => normalized.push(part),
            Component::CurDir => {}
            Component::ParentDir => {
                return Err(format!("`{}` must not contain `..` segments", raw));
            }
            Component::RootDir | Component::Prefix(_) => {
                return Err(format!("`{}` must be a relative path", raw));
            }
        }
    }

    if normalized.as_os_str().is_empty() {
        return Err(format!("`{}` does not name a file", raw));
    }

    let reserved = normalized
        .file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.ends_with(STAGING_SUFFIX));
    if reserved {
        return Err(format!(
            "`{}` uses the reserved suffix {}",
            raw, STAGING_SUFFIX
        ));
    }

    Ok(normalized)
}

fn has_drive_prefix(path: &str) -> bool {
    let bytes = path.as_bytes();
    bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokenizer::tokenize;
    use rstest::rstest;

    fn record(source: &str) -> RawTransaction {
        tokenize(source).unwrap().remove(0)
    }

    #[test]
    fn test_build_create() {
        let tx = build(&record(
            "~\naction: Create\ntarget: src/app.py\nreasoning: add app\nauthor: kim\nticket: OPS-1\n[block]\nprint('x')\n[/block]\n",
        ))
        .unwrap();

        assert_eq!(tx.action, ActionKind::Create);
        assert_eq!(tx.target, PathBuf::from("src/app.py"));
        assert_eq!(tx.author.as_deref(), Some("kim"));
        assert_eq!(tx.extra, vec![("ticket".to_string(), "OPS-1".to_string())]);
        assert_eq!(tx.blocks[0].language, "py");
        assert!(!tx.blocks[0].language_overridden);
    }

    #[test]
    fn test_missing_fields_are_all_reported() {
        let errors = build(&record("~\nauthor: kim\n")).unwrap_err();
        let fields: Vec<Field> = errors.into_iter().map(|e| e.field).collect();
        assert_eq!(fields, vec![Field::Action, Field::Target, Field::Reasoning]);
    }

    #[test]
    fn test_blank_reasoning_is_rejected() {
        let errors = build(&record(
            "~\naction: delete\ntarget: a.txt\nreasoning:    \n",
        ))
        .unwrap_err();
        assert_eq!(errors[0].field, Field::Reasoning);
    }

    #[test]
    fn test_delete_with_content_is_rejected() {
        let errors = build(&record(
            "~\naction: delete\ntarget: a.txt\nreasoning: r\n[block]\nx\n[/block]\n",
        ))
        .unwrap_err();
        assert_eq!(errors[0].field, Field::Blocks);
    }

    #[test]
    fn test_modify_without_content_is_rejected() {
        let errors = build(&record("~\naction: modify\ntarget: a.txt\nreasoning: r\n")).unwrap_err();
        assert_eq!(errors[0].field, Field::Blocks);
    }

    #[test]
    fn test_rename_is_metadata_only() {
        let tx = build(&record(
            "~\naction: rename\ntarget: a.txt\ndestination: b/a.txt\nreasoning: move\n",
        ))
        .unwrap();
        assert_eq!(tx.destination, Some(PathBuf::from("b/a.txt")));
        assert_eq!(tx.paths().count(), 2);

        let errors = build(&record("~\naction: rename\ntarget: a.txt\nreasoning: r\n")).unwrap_err();
        assert_eq!(errors[0].field, Field::Destination);
    }

    #[test]
    fn test_duplicate_key_is_rejected() {
        let errors = build(&record(
            "~\naction: delete\ntarget: a\nTarget: b\nreasoning: r\n",
        ))
        .unwrap_err();
        assert_eq!(errors[0].field, Field::Target);
    }

    #[test]
    fn test_language_override_wins() {
        let tx = build(&record(
            "~\naction: create\ntarget: script\nreasoning: r\n[block Python]\nx = 1\n[/block]\n",
        ))
        .unwrap();
        assert_eq!(tx.blocks[0].language, "python");
        assert!(tx.blocks[0].language_overridden);
    }

    #[test]
    fn test_build_all_collects_across_transactions() {
        let records = tokenize(
            "~\naction: explode\ntarget: a\nreasoning: r\n~\naction: delete\ntarget: ../b\nreasoning: r\n~\naction: delete\ntarget: c\nreasoning: r\n",
        )
        .unwrap();
        let outcome = build_all(&records);

        assert_eq!(outcome.transactions.len(), 1);
        assert_eq!(outcome.transactions[0].index, 2);
        assert_eq!(outcome.failed_indices(), vec![0, 1]);
        assert!(build_document("doc", &records).is_err());
    }

    #[rstest]
    #[case("a.txt", "a.txt")]
    #[case("./src//lib.rs", "src/lib.rs")]
    #[case("src\\win\\file.php", "src/win/file.php")]
    fn test_accepts_relative_paths(#[case] raw: &str, #[case] expected: &str) {
        assert_eq!(check_relative_path(raw).unwrap(), PathBuf::from(expected));
    }

    #[rstest]
    #[case("")]
    #[case("/etc/passwd")]
    #[case("../secret")]
    #[case("a/../../b")]
    #[case("a/..")]
    #[case("C:\\Windows\\x")]
    #[case("\\\\server\\share")]
    #[case(".")]
    #[case("./.")]
    #[case("notes.txt.optx-staged")]
    fn test_rejects_unsafe_paths(#[case] raw: &str) {
        assert!(check_relative_path(raw).is_err(), "accepted {raw:?}");
    }
}
