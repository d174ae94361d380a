//! Immutability guard for signed documents.
//!
//! Every write path on a `FiscalDocument` consults this module before
//! touching the document. Once signed, a document can never be mutated or
//! deleted; the only correction mechanism is a new credit note referencing
//! it, which does not touch the original. The signed-check and the write must
//! happen under the same lock; the store guarantees that.

use morabeza_shared::error::{FiscalError, FiscalResult};

use crate::document::FiscalDocument;

/// Rejects mutation of a signed document.
///
/// # Errors
///
/// Returns `AlreadySigned` naming the correction mechanism.
pub fn ensure_mutable(document: &FiscalDocument) -> FiscalResult<()> {
    if document.is_signed {
        return Err(FiscalError::AlreadySigned(format!(
            "cannot modify signed document {}, issue a credit note instead",
            document.label()
        )));
    }
    Ok(())
}

/// Rejects deletion of a signed document. Deletion always fails once signed.
///
/// # Errors
///
/// Returns `AlreadySigned` naming the correction mechanism.
pub fn ensure_deletable(document: &FiscalDocument) -> FiscalResult<()> {
    if document.is_signed {
        return Err(FiscalError::AlreadySigned(format!(
            "cannot delete signed document {}, issue a credit note instead",
            document.label()
        )));
    }
    Ok(())
}

/// Rejects re-signing. Signing is one-time-only, not idempotent; a second
/// call is an error, not a no-op.
///
/// # Errors
///
/// Returns `AlreadySigned` when the document is already signed.
pub fn ensure_signable(document: &FiscalDocument) -> FiscalResult<()> {
    if document.is_signed {
        return Err(FiscalError::AlreadySigned(format!(
            "document {} is already signed",
            document.label()
        )));
    }
    Ok(())
}
