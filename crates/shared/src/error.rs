//! Application-wide fiscal error types.

use thiserror::Error;

use crate::types::DocumentId;

/// Result type alias using `FiscalError`.
pub type FiscalResult<T> = Result<T, FiscalError>;

/// Errors that can occur during fiscal operations.
#[derive(Debug, Error)]
pub enum FiscalError {
    /// Attempt to re-sign or mutate a signed document.
    #[error("Document is already signed: {0}")]
    AlreadySigned(String),

    /// Operation requires a signed document but got a draft.
    #[error("Document is not signed: {0}")]
    NotSigned(String),

    /// Credit-note referential rule violation.
    #[error("Invalid document reference: {0}")]
    InvalidReference(String),

    /// Verification found a hash mismatch or broken predecessor link.
    #[error("Hash chain integrity violation: {details}")]
    ChainIntegrityViolation {
        /// What exactly failed to verify.
        details: String,
    },

    /// Transient failure to serialize number allocation.
    #[error("Counter allocation contention, please retry")]
    CounterContention,

    /// Non-positive or out-of-range monetary value.
    #[error("Malformed amount: {0}")]
    MalformedAmount(String),

    /// Document not found in the store.
    #[error("Document not found: {0}")]
    DocumentNotFound(DocumentId),

    /// A generated IUD collided with an existing one.
    #[error("Duplicate IUD: {0}")]
    DuplicateIud(String),

    /// An allocated invoice number collided with an existing one.
    #[error("Duplicate invoice number: {0}")]
    DuplicateInvoiceNumber(String),

    /// Invalid company configuration.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Failure serializing the audit export.
    #[error("Audit export failed: {0}")]
    Export(String),
}

impl FiscalError {
    /// Returns the error code for API responses and logs.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::AlreadySigned(_) => "ALREADY_SIGNED",
            Self::NotSigned(_) => "NOT_SIGNED",
            Self::InvalidReference(_) => "INVALID_REFERENCE",
            Self::ChainIntegrityViolation { .. } => "CHAIN_INTEGRITY_VIOLATION",
            Self::CounterContention => "COUNTER_CONTENTION",
            Self::MalformedAmount(_) => "MALFORMED_AMOUNT",
            Self::DocumentNotFound(_) => "DOCUMENT_NOT_FOUND",
            Self::DuplicateIud(_) => "DUPLICATE_IUD",
            Self::DuplicateInvoiceNumber(_) => "DUPLICATE_INVOICE_NUMBER",
            Self::Configuration(_) => "CONFIGURATION_ERROR",
            Self::Export(_) => "EXPORT_ERROR",
        }
    }

    /// Returns true if this error is transient and the operation may be retried.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::CounterContention)
    }
}
