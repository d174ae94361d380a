//! SHA-256 hash chain over signed documents.
//!
//! Each signed document stores a hash computed from its own fields plus the
//! hash of the chain predecessor of the same document type. Retroactive
//! alteration of any signed document is detectable by recomputation. The first
//! document of a type's chain uses the empty string as its previous hash; that
//! is the standard chain-start convention, not a missing value.

use chrono::NaiveDate;
use morabeza_shared::error::{FiscalError, FiscalResult};
use morabeza_shared::types::DocumentId;
use rust_decimal::Decimal;
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::document::FiscalDocument;

/// Hash algorithm identifier stored on every signed document.
pub const HASH_ALGORITHM: &str = "SHA256";

/// Computes the integrity hash for a document.
///
/// SHA-256 over the UTF-8 concatenation of the ISO issue date, the formatted
/// invoice number, the grand total with exactly two decimal places, and the
/// previous hash string. Deterministic: identical inputs always yield the
/// same 64-char lowercase hex output.
#[must_use]
pub fn compute_hash(
    issue_date: NaiveDate,
    invoice_number: &str,
    grand_total: Decimal,
    previous_hash: &str,
) -> String {
    let payload = format!(
        "{}{}{}{}",
        issue_date.format("%Y-%m-%d"),
        invoice_number,
        format_amount(grand_total),
        previous_hash
    );
    let mut hasher = Sha256::new();
    hasher.update(payload.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Formats a monetary amount with exactly two decimal places for hashing
/// and export.
#[must_use]
pub fn format_amount(amount: Decimal) -> String {
    format!("{:.2}", amount.round_dp(2))
}

/// Recomputes a signed document's hash from its stored fields and compares
/// it to the stored hash.
///
/// # Errors
///
/// Returns `NotSigned` for drafts, `ChainIntegrityViolation` when any chain
/// field is missing or the recomputed hash differs from the stored one.
pub fn verify_document(document: &FiscalDocument) -> FiscalResult<()> {
    if !document.is_signed {
        return Err(FiscalError::NotSigned(format!(
            "document {} cannot be verified before signing",
            document.label()
        )));
    }
    let invoice_number = document.invoice_number.as_deref().ok_or_else(|| {
        FiscalError::ChainIntegrityViolation {
            details: format!("signed document {} has no invoice number", document.label()),
        }
    })?;
    let issue_date = document
        .issue_date
        .ok_or_else(|| FiscalError::ChainIntegrityViolation {
            details: format!("signed document {invoice_number} has no issue date"),
        })?;
    let previous_hash = document.previous_hash.as_deref().ok_or_else(|| {
        FiscalError::ChainIntegrityViolation {
            details: format!("signed document {invoice_number} has no previous hash"),
        }
    })?;
    let stored = document
        .hash
        .as_deref()
        .ok_or_else(|| FiscalError::ChainIntegrityViolation {
            details: format!("signed document {invoice_number} has no hash"),
        })?;

    let recomputed = compute_hash(
        issue_date,
        invoice_number,
        document.grand_total,
        previous_hash,
    );
    if recomputed != stored {
        return Err(FiscalError::ChainIntegrityViolation {
            details: format!(
                "hash mismatch on {invoice_number}: stored {stored}, recomputed {recomputed}"
            ),
        });
    }
    Ok(())
}

/// Checks that a document's stored `previous_hash` equals the hash of the
/// document that was its chain predecessor at signing time.
///
/// The predecessor hash comes from the store's per-type signing order; an
/// empty string means the document opened its chain.
///
/// # Errors
///
/// Returns `ChainIntegrityViolation` when the stored link does not match.
pub fn verify_chain_link(document: &FiscalDocument, predecessor_hash: &str) -> FiscalResult<()> {
    let stored = document.previous_hash.as_deref().unwrap_or_default();
    if stored != predecessor_hash {
        return Err(FiscalError::ChainIntegrityViolation {
            details: format!(
                "broken predecessor link on {}: stored previous hash {}, chain says {}",
                document.label(),
                if stored.is_empty() { "(chain start)" } else { stored },
                if predecessor_hash.is_empty() {
                    "(chain start)"
                } else {
                    predecessor_hash
                }
            ),
        });
    }
    Ok(())
}

/// Outcome of verifying one document against the chain.
#[derive(Debug, Clone, Serialize)]
pub struct VerificationReport {
    /// The verified document.
    pub document_id: DocumentId,
    /// Invoice number, when assigned.
    pub invoice_number: Option<String>,
    /// True when both the recomputed hash and the predecessor link match.
    pub valid: bool,
    /// Human-readable findings; empty when valid.
    pub details: Vec<String>,
}

/// Verifies a document's self-consistency and its chain-of-custody link,
/// collecting findings instead of failing on the first.
#[must_use]
pub fn verify_with_predecessor(
    document: &FiscalDocument,
    predecessor_hash: &str,
) -> VerificationReport {
    let mut details = Vec::new();
    if let Err(e) = verify_document(document) {
        details.push(e.to_string());
    }
    if let Err(e) = verify_chain_link(document, predecessor_hash) {
        details.push(e.to_string());
    }
    VerificationReport {
        document_id: document.id,
        invoice_number: document.invoice_number.clone(),
        valid: details.is_empty(),
        details,
    }
}
