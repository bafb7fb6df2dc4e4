//! Content processing
//!
//! Runs each content block of a transaction through the capability its language key resolves
//! to. Transactions are never mutated: processing produces [ProcessedTransaction] values that
//! carry the transformed bytes next to the original transaction.
//!
//! A failing transform fails only its own transaction. Whether the rest of the document may
//! still be applied is the executor's decision.

use crate::capability::LanguageCapability;
use crate::diagnostics::Diagnostic;
use crate::error::{CapabilityError, ProcessingError};
use crate::registry::CapabilityRegistry;
use optx_parser::{ContentBlock, OperationDocument, Transaction};
use serde::Serialize;

/// One content block after its capability ran
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcessedBlock {
    /// Position of the block within its transaction
    pub index: usize,
    pub language: String,
    /// Name of the capability that handled the block
    pub capability: String,
    /// Transformed content
    pub content: String,
    /// Diagnostics with lines relative to the source document
    pub diagnostics: Vec<Diagnostic>,
}

/// A transaction together with its processed blocks
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcessedTransaction {
    pub transaction: Transaction,
    pub blocks: Vec<ProcessedBlock>,
}

impl ProcessedTransaction {
    /// Final content: the transformed blocks concatenated in order, if there are any
    pub fn content(&self) -> Option<String> {
        if self.blocks.is_empty() {
            return None;
        }
        Some(self.blocks.iter().map(|b| b.content.as_str()).collect())
    }

    pub fn diagnostics(&self) -> impl Iterator<Item = &Diagnostic> {
        self.blocks.iter().flat_map(|b| b.diagnostics.iter())
    }
}

/// Processing results of a whole document
#[derive(Debug, Clone, Default)]
pub struct ProcessingOutcome {
    /// Successfully processed transactions, in document order
    pub processed: Vec<ProcessedTransaction>,
    pub errors: Vec<ProcessingError>,
}

impl ProcessingOutcome {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn failed_indices(&self) -> Vec<usize> {
        self.errors.iter().map(|e| e.transaction_index).collect()
    }
}

/// Analyze and transform one block.
pub fn process_block(
    index: usize,
    block: &ContentBlock,
    capability: &dyn LanguageCapability,
) -> Result<ProcessedBlock, CapabilityError> {
    let first_line = block.range.start.line;
    let diagnostics = capability
        .analyze(&block.raw)
        .into_iter()
        .map(|diagnostic| {
            diagnostic
                .with_source(capability.name())
                .shifted(first_line)
        })
        .collect();
    let content = capability.transform(&block.raw)?;

    Ok(ProcessedBlock {
        index,
        language: block.language.clone(),
        capability: capability.name().to_string(),
        content,
        diagnostics,
    })
}

/// Process every block of a transaction; the first failing block fails the transaction.
pub fn process_transaction(
    transaction: &Transaction,
    registry: &CapabilityRegistry,
) -> Result<ProcessedTransaction, ProcessingError> {
    let mut blocks = Vec::with_capacity(transaction.blocks.len());

    for (index, block) in transaction.blocks.iter().enumerate() {
        let capability = registry.resolve(&block.language);
        tracing::debug!(
            transaction = transaction.index,
            block = index,
            language = %block.language,
            capability = capability.name(),
            "processing block"
        );
        let processed =
            process_block(index, block, capability).map_err(|error| ProcessingError {
                transaction_index: transaction.index,
                block_index: index,
                capability: capability.name().to_string(),
                language: block.language.clone(),
                error: shift_error(error, block.range.start.line),
            })?;
        blocks.push(processed);
    }

    Ok(ProcessedTransaction {
        transaction: transaction.clone(),
        blocks,
    })
}

/// Process all transactions of a document, collecting every failure.
pub fn process_document(
    document: &OperationDocument,
    registry: &CapabilityRegistry,
) -> ProcessingOutcome {
    process_transactions(&document.transactions, registry)
}

/// Process a list of transactions, collecting every failure.
pub fn process_transactions(
    transactions: &[Transaction],
    registry: &CapabilityRegistry,
) -> ProcessingOutcome {
    let mut outcome = ProcessingOutcome::default();
    for transaction in transactions {
        match process_transaction(transaction, registry) {
            Ok(processed) => outcome.processed.push(processed),
            Err(err) => {
                tracing::debug!(%err, "processing failed");
                outcome.errors.push(err);
            }
        }
    }
    outcome
}

/// Move a content-relative error line onto the document
fn shift_error(error: CapabilityError, lines: usize) -> CapabilityError {
    match error {
        CapabilityError::Unbalanced { bracket, line } => CapabilityError::Unbalanced {
            bracket,
            line: line + lines,
        },
        CapabilityError::AmbiguousIndentation { line } => {
            CapabilityError::AmbiguousIndentation { line: line + lines }
        }
        CapabilityError::InvalidJson {
            line,
            column,
            message,
        } => CapabilityError::InvalidJson {
            line: line + lines,
            column,
            message,
        },
        CapabilityError::Forbidden { pattern, line } => CapabilityError::Forbidden {
            pattern,
            line: line + lines,
        },
    }
}
