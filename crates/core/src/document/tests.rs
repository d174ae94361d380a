//! Tests for the fiscal document model.

use rstest::rstest;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use morabeza_shared::error::FiscalError;

use super::types::{
    CustomerSnapshot, DocumentType, DraftDocumentInput, FiscalDocument, LineItem, PaymentMethod,
    FINAL_CONSUMER_TAX_ID,
};

fn input() -> DraftDocumentInput {
    DraftDocumentInput {
        document_type: DocumentType::Invoice,
        net_total: dec!(86.96),
        tax_total: dec!(13.04),
        grand_total: dec!(100.00),
        lines: vec![LineItem {
            product_code: "42".to_string(),
            description: "Cachupa rica".to_string(),
            quantity: dec!(2),
            unit_price: dec!(50.00),
            tax_code: None,
        }],
        customer: None,
        payment_method: PaymentMethod::Cash,
        issue_date: None,
        referenced_document: None,
        reason_code: None,
        credit_amount: None,
    }
}

#[test]
fn test_draft_starts_unsigned_with_empty_fiscal_fields() {
    let doc = FiscalDocument::draft(input()).unwrap();
    assert!(!doc.is_signed);
    assert!(doc.invoice_number.is_none());
    assert!(doc.hash.is_none());
    assert!(doc.previous_hash.is_none());
    assert!(doc.iud.is_none());
    assert!(doc.signed_at.is_none());
    assert_eq!(doc.grand_total, dec!(100.00));
}

#[rstest]
#[case(dec!(-0.01), dec!(13.04), dec!(100.00))]
#[case(dec!(86.96), dec!(-0.01), dec!(100.00))]
#[case(dec!(86.96), dec!(13.04), dec!(0))]
#[case(dec!(86.96), dec!(13.04), dec!(-100.00))]
fn test_malformed_amounts_rejected(
    #[case] net: Decimal,
    #[case] tax: Decimal,
    #[case] grand: Decimal,
) {
    let draft = DraftDocumentInput {
        net_total: net,
        tax_total: tax,
        grand_total: grand,
        ..input()
    };
    assert!(matches!(
        FiscalDocument::draft(draft),
        Err(FiscalError::MalformedAmount(_))
    ));
}

#[test]
fn test_zero_quantity_line_rejected() {
    let mut draft = input();
    draft.lines[0].quantity = dec!(0);
    assert!(matches!(
        FiscalDocument::draft(draft),
        Err(FiscalError::MalformedAmount(_))
    ));
}

#[test]
fn test_negative_unit_price_rejected() {
    let mut draft = input();
    draft.lines[0].unit_price = dec!(-1.00);
    assert!(FiscalDocument::draft(draft).is_err());
}

#[test]
fn test_non_positive_credit_amount_rejected() {
    let mut draft = input();
    draft.credit_amount = Some(dec!(0));
    assert!(matches!(
        FiscalDocument::draft(draft),
        Err(FiscalError::MalformedAmount(_))
    ));
}

#[test]
fn test_line_total() {
    let line = LineItem {
        product_code: "7".to_string(),
        description: "Grogue".to_string(),
        quantity: dec!(3),
        unit_price: dec!(2.50),
        tax_code: None,
    };
    assert_eq!(line.total(), dec!(7.50));
}

#[rstest]
#[case(DocumentType::Invoice, "FT", "1")]
#[case(DocumentType::InvoiceReceipt, "FR", "2")]
#[case(DocumentType::SalesReceipt, "TV", "3")]
#[case(DocumentType::CreditNote, "NC", "5")]
fn test_document_type_codes(
    #[case] doc_type: DocumentType,
    #[case] code: &str,
    #[case] dnre: &str,
) {
    assert_eq!(doc_type.code(), code);
    assert_eq!(doc_type.dnre_code(), dnre);
    assert_eq!(doc_type.to_string(), code);
}

#[rstest]
#[case(PaymentMethod::Cash, "10")]
#[case(PaymentMethod::Online, "30")]
#[case(PaymentMethod::CreditCard, "48")]
#[case(PaymentMethod::DebitCard, "49")]
fn test_payment_means_codes(#[case] method: PaymentMethod, #[case] code: &str) {
    assert_eq!(method.means_code(), code);
}

#[test]
fn test_final_consumer_placeholder() {
    let consumer = CustomerSnapshot::final_consumer();
    assert_eq!(consumer.tax_id, FINAL_CONSUMER_TAX_ID);
    assert_eq!(consumer.name, "Consumidor Final");
}

#[test]
fn test_label_prefers_invoice_number() {
    let mut doc = FiscalDocument::draft(input()).unwrap();
    assert_eq!(doc.label(), doc.id.to_string());
    doc.invoice_number = Some("FT A/2025/00001".to_string());
    assert_eq!(doc.label(), "FT A/2025/00001");
}

#[test]
fn test_document_serde_round_trip() {
    let doc = FiscalDocument::draft(input()).unwrap();
    let json = serde_json::to_string(&doc).unwrap();
    let back: FiscalDocument = serde_json::from_str(&json).unwrap();
    assert_eq!(back.id, doc.id);
    assert_eq!(back.grand_total, doc.grand_total);
    assert_eq!(back.document_type, doc.document_type);
    assert!(!back.is_signed);
}
