//! Invoice number formatting and series selection.
//!
//! An invoice number is `SERIES/YEAR/NNNNN` (5-digit zero-padded sequence).
//! The numeric sequence value is the unit of uniqueness; the formatted string
//! is presentation. Allocation of the next sequence value happens inside the
//! store's signing critical section, never here.

use morabeza_shared::config::CompanyConfig;

use crate::document::DocumentType;

/// Parsed components of a formatted invoice number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvoiceNumberParts {
    /// Series name, e.g. "FT A".
    pub series: String,
    /// Calendar year of the numbering stream.
    pub year: i32,
    /// Sequence value within the (series, year) stream.
    pub number: u32,
}

/// Returns the configured series for a document type.
///
/// Invoices and invoice-receipts share the invoice series; credit notes and
/// sales receipts each have their own.
#[must_use]
pub fn series_for(document_type: DocumentType, config: &CompanyConfig) -> &str {
    match document_type {
        DocumentType::Invoice | DocumentType::InvoiceReceipt => &config.invoice_series,
        DocumentType::CreditNote => &config.credit_note_series,
        DocumentType::SalesReceipt => &config.receipt_series,
    }
}

/// Formats an allocated sequence value as `SERIES/YEAR/NNNNN`.
#[must_use]
pub fn format_invoice_number(series: &str, year: i32, number: u32) -> String {
    format!("{series}/{year}/{number:05}")
}

/// Parses a formatted invoice number back into its components.
///
/// Returns `None` for strings that do not have the `SERIES/YEAR/NUMBER`
/// shape. Numbers wider than five digits (beyond 99999) still parse.
#[must_use]
pub fn parse_invoice_number(formatted: &str) -> Option<InvoiceNumberParts> {
    let mut parts = formatted.splitn(3, '/');
    let series = parts.next()?;
    let year = parts.next()?.parse::<i32>().ok()?;
    let number = parts.next()?.parse::<u32>().ok()?;
    if series.is_empty() || number == 0 {
        return None;
    }
    Some(InvoiceNumberParts {
        series: series.to_string(),
        year,
        number,
    })
}
