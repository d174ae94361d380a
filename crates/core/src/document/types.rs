//! Fiscal document domain types.
//!
//! A `FiscalDocument` is the signable entity: one per payment/invoice. It is
//! created as a draft with its monetary snapshot copied from the originating
//! sale, and becomes immutable once signed.

use chrono::{DateTime, NaiveDate, Utc};
use morabeza_shared::error::{FiscalError, FiscalResult};
use morabeza_shared::types::DocumentId;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Fiscal document type classification.
///
/// Codes follow the SAF-T CV document taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    /// Fatura (FT).
    Invoice,
    /// Nota de Crédito (NC) - correction referencing an original document.
    CreditNote,
    /// Talão de Venda (TV).
    SalesReceipt,
    /// Fatura Recibo (FR).
    InvoiceReceipt,
}

impl DocumentType {
    /// Two-letter SAF-T document code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Invoice => "FT",
            Self::CreditNote => "NC",
            Self::SalesReceipt => "TV",
            Self::InvoiceReceipt => "FR",
        }
    }

    /// Official DNRE document type code used in e-Fatura documents and IUDs.
    #[must_use]
    pub const fn dnre_code(&self) -> &'static str {
        match self {
            Self::Invoice => "1",
            Self::InvoiceReceipt => "2",
            Self::SalesReceipt => "3",
            Self::CreditNote => "5",
        }
    }

    /// All document types, in chain-display order.
    #[must_use]
    pub const fn all() -> [Self; 4] {
        [
            Self::Invoice,
            Self::CreditNote,
            Self::SalesReceipt,
            Self::InvoiceReceipt,
        ]
    }
}

impl std::fmt::Display for DocumentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Payment method recorded on the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    /// Cash payment.
    Cash,
    /// Credit card payment.
    CreditCard,
    /// Debit card payment.
    DebitCard,
    /// Online payment (credit transfer).
    Online,
}

impl PaymentMethod {
    /// Official DNRE payment means code.
    #[must_use]
    pub const fn means_code(&self) -> &'static str {
        match self {
            Self::Cash => "10",
            Self::Online => "30",
            Self::CreditCard => "48",
            Self::DebitCard => "49",
        }
    }
}

/// Tax id of the anonymous final-consumer placeholder.
pub const FINAL_CONSUMER_TAX_ID: &str = "999999999";

/// Denormalized customer identity captured at signing time.
///
/// A registered customer entity may exist elsewhere, but this snapshot is
/// authoritative for audit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerSnapshot {
    /// Customer tax id (NIF).
    pub tax_id: String,
    /// Customer display name.
    pub name: String,
}

impl CustomerSnapshot {
    /// The "Consumidor Final" placeholder used for anonymous sales.
    #[must_use]
    pub fn final_consumer() -> Self {
        Self {
            tax_id: FINAL_CONSUMER_TAX_ID.to_string(),
            name: "Consumidor Final".to_string(),
        }
    }
}

/// A sale line captured on the document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    /// Product identifier from the originating sale.
    pub product_code: String,
    /// Product description.
    pub description: String,
    /// Quantity sold, strictly positive.
    pub quantity: Decimal,
    /// Unit price, non-negative.
    pub unit_price: Decimal,
    /// Tax code for the line; the company default applies when absent.
    pub tax_code: Option<String>,
}

impl LineItem {
    /// Line total (quantity x unit price).
    #[must_use]
    pub fn total(&self) -> Decimal {
        self.quantity * self.unit_price
    }
}

/// Input for creating a draft fiscal document from a finalized sale.
#[derive(Debug, Clone)]
pub struct DraftDocumentInput {
    /// Document type to issue.
    pub document_type: DocumentType,
    /// Net amount (without tax), copied from the sale.
    pub net_total: Decimal,
    /// Tax amount, copied from the sale.
    pub tax_total: Decimal,
    /// Gross (grand) total, copied from the sale.
    pub grand_total: Decimal,
    /// Line items copied from the sale.
    pub lines: Vec<LineItem>,
    /// Customer snapshot; None means an anonymous final-consumer sale.
    pub customer: Option<CustomerSnapshot>,
    /// How the sale was paid.
    pub payment_method: PaymentMethod,
    /// Issue date; defaults to the signing date when unset.
    pub issue_date: Option<NaiveDate>,
    /// Original document corrected by this one (credit notes only).
    pub referenced_document: Option<DocumentId>,
    /// Reason code for the correction (credit notes only).
    pub reason_code: Option<String>,
    /// Partial correction amount (credit notes only, optional).
    pub credit_amount: Option<Decimal>,
}

/// Partial update applied to a draft document.
///
/// Every field is optional; unset fields are left unchanged. The store
/// rejects the whole update if the target document is already signed.
#[derive(Debug, Clone, Default)]
pub struct DraftUpdate {
    /// New net amount.
    pub net_total: Option<Decimal>,
    /// New tax amount.
    pub tax_total: Option<Decimal>,
    /// New grand total.
    pub grand_total: Option<Decimal>,
    /// Replacement line items.
    pub lines: Option<Vec<LineItem>>,
    /// New customer snapshot.
    pub customer: Option<CustomerSnapshot>,
    /// New payment method.
    pub payment_method: Option<PaymentMethod>,
    /// New issue date.
    pub issue_date: Option<NaiveDate>,
    /// New correction reason code.
    pub reason_code: Option<String>,
    /// New partial correction amount.
    pub credit_amount: Option<Decimal>,
}

/// The signable fiscal entity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FiscalDocument {
    /// Internal identifier.
    pub id: DocumentId,
    /// Document type.
    pub document_type: DocumentType,
    /// Formatted `SERIES/YEAR/NNNNN` number; None until signed.
    pub invoice_number: Option<String>,
    /// Issue date; defaulted at signing when unset.
    pub issue_date: Option<NaiveDate>,
    /// Net amount (without tax), frozen at draft creation.
    pub net_total: Decimal,
    /// Tax amount, frozen at draft creation.
    pub tax_total: Decimal,
    /// Gross total, frozen at draft creation. Hash input.
    pub grand_total: Decimal,
    /// Line items snapshot.
    pub lines: Vec<LineItem>,
    /// Customer snapshot; None means final consumer.
    pub customer: Option<CustomerSnapshot>,
    /// Payment method.
    pub payment_method: PaymentMethod,
    /// SHA-256 integrity hash, 64 hex chars, set once at signing.
    pub hash: Option<String>,
    /// Hash of the chain predecessor; empty string for the first document
    /// of a type's chain. Set once at signing.
    pub previous_hash: Option<String>,
    /// Hash algorithm identifier, set at signing.
    pub hash_algorithm: Option<String>,
    /// 45-character unique document identifier, set once at signing.
    pub iud: Option<String>,
    /// Software certificate number stamped at signing.
    pub software_certificate_number: Option<String>,
    /// Signed flag; monotonic false to true, never reset.
    pub is_signed: bool,
    /// When the document was signed; set exactly once.
    pub signed_at: Option<DateTime<Utc>>,
    /// Original document corrected by this one (credit notes only).
    pub referenced_document: Option<DocumentId>,
    /// Correction reason code (credit notes only).
    pub reason_code: Option<String>,
    /// Partial correction amount (credit notes only).
    pub credit_amount: Option<Decimal>,
}

impl FiscalDocument {
    /// Creates a draft document from a finalized sale.
    ///
    /// # Errors
    ///
    /// Returns `FiscalError::MalformedAmount` if the monetary snapshot or any
    /// line is out of range. Referential credit-note rules are checked by the
    /// store, which can see the referenced document.
    pub fn draft(input: DraftDocumentInput) -> FiscalResult<Self> {
        validate_amounts(input.net_total, input.tax_total, input.grand_total)?;
        validate_lines(&input.lines)?;
        if let Some(amount) = input.credit_amount {
            if amount <= Decimal::ZERO {
                return Err(FiscalError::MalformedAmount(
                    "credit amount must be positive".to_string(),
                ));
            }
        }

        Ok(Self {
            id: DocumentId::new(),
            document_type: input.document_type,
            invoice_number: None,
            issue_date: input.issue_date,
            net_total: input.net_total,
            tax_total: input.tax_total,
            grand_total: input.grand_total,
            lines: input.lines,
            customer: input.customer,
            payment_method: input.payment_method,
            hash: None,
            previous_hash: None,
            hash_algorithm: None,
            iud: None,
            software_certificate_number: None,
            is_signed: false,
            signed_at: None,
            referenced_document: input.referenced_document,
            reason_code: input.reason_code,
            credit_amount: input.credit_amount,
        })
    }

    /// Returns true if this is a credit note.
    #[must_use]
    pub fn is_credit_note(&self) -> bool {
        self.document_type == DocumentType::CreditNote
    }

    /// Label used in error messages: the invoice number once assigned,
    /// otherwise the internal id.
    #[must_use]
    pub fn label(&self) -> String {
        self.invoice_number
            .clone()
            .unwrap_or_else(|| self.id.to_string())
    }
}

/// Validates the monetary snapshot of a document.
///
/// # Errors
///
/// Returns `FiscalError::MalformedAmount` naming the offending field.
pub fn validate_amounts(net: Decimal, tax: Decimal, grand: Decimal) -> FiscalResult<()> {
    if net < Decimal::ZERO {
        return Err(FiscalError::MalformedAmount(
            "net total cannot be negative".to_string(),
        ));
    }
    if tax < Decimal::ZERO {
        return Err(FiscalError::MalformedAmount(
            "tax total cannot be negative".to_string(),
        ));
    }
    if grand <= Decimal::ZERO {
        return Err(FiscalError::MalformedAmount(
            "grand total must be positive".to_string(),
        ));
    }
    Ok(())
}

/// Validates line items.
///
/// # Errors
///
/// Returns `FiscalError::MalformedAmount` for non-positive quantities or
/// negative unit prices.
pub fn validate_lines(lines: &[LineItem]) -> FiscalResult<()> {
    for line in lines {
        if line.quantity <= Decimal::ZERO {
            return Err(FiscalError::MalformedAmount(format!(
                "line {} quantity must be positive",
                line.product_code
            )));
        }
        if line.unit_price < Decimal::ZERO {
            return Err(FiscalError::MalformedAmount(format!(
                "line {} unit price cannot be negative",
                line.product_code
            )));
        }
    }
    Ok(())
}
