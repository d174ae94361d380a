//! Fiscal document model.

pub mod types;

#[cfg(test)]
mod tests;

pub use types::{
    validate_amounts, validate_lines, CustomerSnapshot, DocumentType, DraftDocumentInput,
    DraftUpdate, FiscalDocument, LineItem, PaymentMethod, FINAL_CONSUMER_TAX_ID,
};
