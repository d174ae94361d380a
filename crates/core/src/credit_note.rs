//! Referential rules for credit notes.
//!
//! A credit note corrects a signed original by reference; it never mutates
//! it. Each rule is checked independently and rejections name the violated
//! invariant, so callers can surface precise messages.

use morabeza_shared::error::{FiscalError, FiscalResult};
use rust_decimal::Decimal;

use crate::document::{DocumentType, FiscalDocument};

/// Validates the correction linkage of a candidate document.
///
/// `referenced` is the resolved target of `candidate.referenced_document`,
/// when one is set; the store resolves it under the same lock as the write.
///
/// # Errors
///
/// - `InvalidReference` for structural rule violations (missing reference or
///   reason code, self-reference, crediting a credit note, or a non-credit
///   document carrying a reference).
/// - `NotSigned` when the referenced document is still a draft.
/// - `MalformedAmount` when a partial credit amount is out of range.
pub fn validate(
    candidate: &FiscalDocument,
    referenced: Option<&FiscalDocument>,
) -> FiscalResult<()> {
    if candidate.document_type != DocumentType::CreditNote {
        if candidate.referenced_document.is_some() {
            return Err(FiscalError::InvalidReference(
                "only credit notes may reference a document".to_string(),
            ));
        }
        return Ok(());
    }

    let Some(referenced_id) = candidate.referenced_document else {
        return Err(FiscalError::InvalidReference(
            "credit note must reference the original document".to_string(),
        ));
    };
    if referenced_id == candidate.id {
        return Err(FiscalError::InvalidReference(
            "credit note cannot reference itself".to_string(),
        ));
    }
    if candidate
        .reason_code
        .as_deref()
        .is_none_or(|code| code.trim().is_empty())
    {
        return Err(FiscalError::InvalidReference(
            "credit note must have a reason code".to_string(),
        ));
    }

    let Some(original) = referenced else {
        return Err(FiscalError::InvalidReference(format!(
            "referenced document {referenced_id} does not exist"
        )));
    };
    if !original.is_signed {
        return Err(FiscalError::NotSigned(format!(
            "can only credit signed invoices, {} is a draft",
            original.label()
        )));
    }
    if original.document_type == DocumentType::CreditNote {
        return Err(FiscalError::InvalidReference(format!(
            "cannot credit a credit note ({})",
            original.label()
        )));
    }

    if let Some(amount) = candidate.credit_amount {
        if amount <= Decimal::ZERO {
            return Err(FiscalError::MalformedAmount(
                "credit amount must be positive".to_string(),
            ));
        }
        if amount > original.grand_total {
            return Err(FiscalError::MalformedAmount(format!(
                "credit amount {} exceeds the referenced document total {}",
                amount, original.grand_total
            )));
        }
    }

    Ok(())
}
