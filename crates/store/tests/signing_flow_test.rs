//! End-to-end signing flow tests.
//!
//! Walks the full lifecycle: draft, sign, attempted mutation, credit-note
//! correction, verification, and audit export, plus the signer's bounded
//! retry of transient contention.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal_macros::dec;

use morabeza_core::document::{
    CustomerSnapshot, DocumentType, DraftDocumentInput, DraftUpdate, FiscalDocument, LineItem,
    PaymentMethod,
};
use morabeza_core::saft::ExportEntry;
use morabeza_shared::config::CompanyConfig;
use morabeza_shared::error::{FiscalError, FiscalResult};
use morabeza_shared::types::DocumentId;
use morabeza_store::{DocumentStore, ExportService, FiscalSigner, MemoryStore};

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn invoice_input() -> DraftDocumentInput {
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
        customer: Some(CustomerSnapshot {
            tax_id: "123456789".to_string(),
            name: "Ilha Lda".to_string(),
        }),
        payment_method: PaymentMethod::Cash,
        issue_date: None,
        referenced_document: None,
        reason_code: None,
        credit_amount: None,
    }
}

fn credit_note_input(original: DocumentId) -> DraftDocumentInput {
    DraftDocumentInput {
        document_type: DocumentType::CreditNote,
        referenced_document: Some(original),
        reason_code: Some("M01".to_string()),
        ..invoice_input()
    }
}

async fn sign_on(
    store: &MemoryStore,
    id: DocumentId,
    today: NaiveDate,
) -> FiscalResult<FiscalDocument> {
    store.sign_commit(id, today, Utc::now()).await
}

// ============================================================================
// Test: the canonical scenario script
// Sign A -> 00001/"" ; sign B -> 00002/A.hash ; edit A rejected ;
// credit note on A accepted ; credit note on a credit note rejected.
// ============================================================================
#[tokio::test]
async fn test_scenario_script() {
    let store = Arc::new(MemoryStore::new(CompanyConfig::default()));
    let today = date(2025, 1, 15);

    // Sign invoice A.
    let a = store.create_draft(invoice_input()).await.unwrap();
    let a = sign_on(&store, a.id, today).await.unwrap();
    assert_eq!(a.invoice_number.as_deref(), Some("FT A/2025/00001"));
    assert_eq!(a.previous_hash.as_deref(), Some(""));
    assert!(a.is_signed);
    assert!(a.signed_at.is_some());
    assert_eq!(a.hash.as_deref().map(str::len), Some(64));
    assert_eq!(a.iud.as_deref().map(str::len), Some(45));
    assert_eq!(a.hash_algorithm.as_deref(), Some("SHA256"));

    // Sign invoice B in the same series/year.
    let b = store.create_draft(invoice_input()).await.unwrap();
    let b = sign_on(&store, b.id, today).await.unwrap();
    assert_eq!(b.invoice_number.as_deref(), Some("FT A/2025/00002"));
    assert_eq!(b.previous_hash, a.hash);

    // Editing A's totals fails: it is signed.
    let err = store
        .update_draft(
            a.id,
            DraftUpdate {
                grand_total: Some(dec!(1.00)),
                ..DraftUpdate::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, FiscalError::AlreadySigned(_)));
    assert!(err.to_string().contains("issue a credit note instead"));
    let unchanged = store.get(a.id).await.unwrap();
    assert_eq!(unchanged.grand_total, dec!(100.00));

    // Deleting A fails too.
    assert!(matches!(
        store.delete_draft(a.id).await,
        Err(FiscalError::AlreadySigned(_))
    ));

    // Credit note C referencing A succeeds and gets its own series.
    let c = store.create_draft(credit_note_input(a.id)).await.unwrap();
    assert_eq!(c.referenced_document, Some(a.id));
    let c = sign_on(&store, c.id, today).await.unwrap();
    assert_eq!(c.invoice_number.as_deref(), Some("NC A/2025/00001"));
    assert_eq!(c.previous_hash.as_deref(), Some(""));

    // Credit note D referencing C is rejected at creation.
    let err = store
        .create_draft(credit_note_input(c.id))
        .await
        .unwrap_err();
    assert!(matches!(err, FiscalError::InvalidReference(_)));
    assert!(err.to_string().contains("cannot credit a credit note"));
}

// ============================================================================
// Test: re-signing fails with AlreadySigned and changes nothing
// ============================================================================
#[tokio::test]
async fn test_re_signing_is_rejected_without_side_effects() {
    let store = Arc::new(MemoryStore::new(CompanyConfig::default()));
    let today = date(2025, 1, 15);

    let a = store.create_draft(invoice_input()).await.unwrap();
    let signed = sign_on(&store, a.id, today).await.unwrap();

    let err = sign_on(&store, a.id, today).await.unwrap_err();
    assert!(matches!(err, FiscalError::AlreadySigned(_)));

    let after = store.get(a.id).await.unwrap();
    assert_eq!(after.invoice_number, signed.invoice_number);
    assert_eq!(after.hash, signed.hash);
    assert_eq!(after.signed_at, signed.signed_at);

    // The failed re-sign must not have consumed a number.
    let b = store.create_draft(invoice_input()).await.unwrap();
    let b = sign_on(&store, b.id, today).await.unwrap();
    assert_eq!(b.invoice_number.as_deref(), Some("FT A/2025/00002"));
}

// ============================================================================
// Test: credit-note validation matrix at draft creation
// ============================================================================
#[tokio::test]
async fn test_credit_note_rules() {
    let store = Arc::new(MemoryStore::new(CompanyConfig::default()));
    let today = date(2025, 1, 15);

    let original = store.create_draft(invoice_input()).await.unwrap();

    // Referencing an unsigned original is rejected.
    let err = store
        .create_draft(credit_note_input(original.id))
        .await
        .unwrap_err();
    assert!(matches!(err, FiscalError::NotSigned(_)));

    let original = sign_on(&store, original.id, today).await.unwrap();

    // Missing reason code.
    let mut input = credit_note_input(original.id);
    input.reason_code = None;
    let err = store.create_draft(input).await.unwrap_err();
    assert!(err.to_string().contains("must have a reason code"));

    // Missing reference.
    let mut input = credit_note_input(original.id);
    input.referenced_document = None;
    let err = store.create_draft(input).await.unwrap_err();
    assert!(err.to_string().contains("must reference the original"));

    // A plain invoice may not carry a reference.
    let mut input = invoice_input();
    input.referenced_document = Some(original.id);
    let err = store.create_draft(input).await.unwrap_err();
    assert!(err
        .to_string()
        .contains("only credit notes may reference a document"));

    // Partial amount beyond the original total.
    let mut input = credit_note_input(original.id);
    input.credit_amount = Some(dec!(100.01));
    let err = store.create_draft(input).await.unwrap_err();
    assert!(matches!(err, FiscalError::MalformedAmount(_)));

    // A valid partial correction passes end to end.
    let mut input = credit_note_input(original.id);
    input.credit_amount = Some(dec!(40.00));
    let note = store.create_draft(input).await.unwrap();
    let note = sign_on(&store, note.id, today).await.unwrap();
    assert_eq!(note.credit_amount, Some(dec!(40.00)));
}

// ============================================================================
// Test: verification immediately after signing, and after tampering
// ============================================================================
#[tokio::test]
async fn test_verify_after_signing() {
    let store = Arc::new(MemoryStore::new(CompanyConfig::default()));
    let signer = FiscalSigner::new(Arc::clone(&store));

    let a = store.create_draft(invoice_input()).await.unwrap();
    let a = signer.sign(a.id).await.unwrap();
    let report = signer.verify(a.id).await.unwrap();
    assert!(report.valid, "{:?}", report.details);
    assert_eq!(report.invoice_number, a.invoice_number);

    // Drafts cannot be verified.
    let draft = store.create_draft(invoice_input()).await.unwrap();
    assert!(matches!(
        signer.verify(draft.id).await,
        Err(FiscalError::NotSigned(_))
    ));

    assert!(matches!(
        signer.verify(DocumentId::new()).await,
        Err(FiscalError::DocumentNotFound(_))
    ));
}

// ============================================================================
// Test: export includes exactly the signed documents in range
// ============================================================================
#[tokio::test]
async fn test_export_range_inclusion() {
    let store = Arc::new(MemoryStore::new(CompanyConfig::default()));
    let exporter = ExportService::new(Arc::clone(&store), CompanyConfig::default());

    let january = store.create_draft(invoice_input()).await.unwrap();
    let january = sign_on(&store, january.id, date(2025, 1, 10)).await.unwrap();

    let february = store.create_draft(invoice_input()).await.unwrap();
    let february = sign_on(&store, february.id, date(2025, 2, 10)).await.unwrap();

    // An unsigned draft never appears in an export.
    store.create_draft(invoice_input()).await.unwrap();

    let result = exporter
        .export(date(2025, 1, 1), date(2025, 1, 31))
        .await
        .unwrap();
    assert!(result.warnings.is_empty(), "{:?}", result.warnings);
    let january_number = january.invoice_number.as_deref().unwrap();
    let february_number = february.invoice_number.as_deref().unwrap();
    assert!(result.xml.contains(january_number));
    assert!(!result.xml.contains(february_number));
    assert!(result
        .xml
        .contains(&format!("<Hash>{}</Hash>", january.hash.as_deref().unwrap())));
    assert!(result.xml.contains("<NumberOfEntries>1</NumberOfEntries>"));
}

// ============================================================================
// Test: e-Fatura rendering for signed documents only
// ============================================================================
#[tokio::test]
async fn test_efatura_submission() {
    let store = Arc::new(MemoryStore::new(CompanyConfig::default()));
    let exporter = ExportService::new(Arc::clone(&store), CompanyConfig::default());

    let draft = store.create_draft(invoice_input()).await.unwrap();
    assert!(matches!(
        exporter.submit_efatura(draft.id).await,
        Err(FiscalError::NotSigned(_))
    ));

    let signed = sign_on(&store, draft.id, date(2025, 1, 15)).await.unwrap();
    let submission = exporter.submit_efatura(draft.id).await.unwrap();
    assert_eq!(submission.receipt.mode, "simulation");
    assert_eq!(
        Some(submission.receipt.invoice_number.as_str()),
        signed.invoice_number.as_deref()
    );
    assert!(submission.xml.contains("<IsSpecimen>true</IsSpecimen>"));
}

// ============================================================================
// Test: callbacks fire once per successful signing
// ============================================================================
#[tokio::test]
async fn test_on_signed_callback_fires_after_commit() {
    let store = Arc::new(MemoryStore::new(CompanyConfig::default()));
    let mut signer = FiscalSigner::new(Arc::clone(&store));

    let calls = Arc::new(AtomicU32::new(0));
    let seen = Arc::clone(&calls);
    signer.on_signed(Box::new(move |document| {
        assert!(document.is_signed);
        seen.fetch_add(1, Ordering::SeqCst);
    }));

    let a = store.create_draft(invoice_input()).await.unwrap();
    signer.sign(a.id).await.unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    // A failed signing must not notify.
    assert!(signer.sign(a.id).await.is_err());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

// ============================================================================
// A store decorator that injects transient contention, for the retry tests.
// ============================================================================
struct FlakyStore {
    inner: MemoryStore,
    failures_remaining: AtomicU32,
    attempts: AtomicU32,
}

impl FlakyStore {
    fn failing(times: u32) -> Self {
        Self {
            inner: MemoryStore::new(CompanyConfig::default()),
            failures_remaining: AtomicU32::new(times),
            attempts: AtomicU32::new(0),
        }
    }
}

#[async_trait]
impl DocumentStore for FlakyStore {
    async fn create_draft(&self, input: DraftDocumentInput) -> FiscalResult<FiscalDocument> {
        self.inner.create_draft(input).await
    }

    async fn update_draft(
        &self,
        id: DocumentId,
        update: DraftUpdate,
    ) -> FiscalResult<FiscalDocument> {
        self.inner.update_draft(id, update).await
    }

    async fn delete_draft(&self, id: DocumentId) -> FiscalResult<()> {
        self.inner.delete_draft(id).await
    }

    async fn get(&self, id: DocumentId) -> FiscalResult<FiscalDocument> {
        self.inner.get(id).await
    }

    async fn is_signed(&self, id: DocumentId) -> FiscalResult<bool> {
        self.inner.is_signed(id).await
    }

    async fn sign_commit(
        &self,
        id: DocumentId,
        today: NaiveDate,
        now: DateTime<Utc>,
    ) -> FiscalResult<FiscalDocument> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let remaining = self.failures_remaining.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures_remaining.store(remaining - 1, Ordering::SeqCst);
            return Err(FiscalError::CounterContention);
        }
        self.inner.sign_commit(id, today, now).await
    }

    async fn chain_predecessor_hash(&self, id: DocumentId) -> FiscalResult<String> {
        self.inner.chain_predecessor_hash(id).await
    }

    async fn export_snapshot(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> FiscalResult<Vec<ExportEntry>> {
        self.inner.export_snapshot(start, end).await
    }
}

#[tokio::test]
async fn test_transient_contention_is_retried() {
    let store = Arc::new(FlakyStore::failing(2));
    let signer = FiscalSigner::new(Arc::clone(&store));

    let draft = store.create_draft(invoice_input()).await.unwrap();
    let signed = signer.sign(draft.id).await.unwrap();

    assert!(signed.is_signed);
    assert_eq!(store.attempts.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_persistent_contention_surfaces_after_bounded_attempts() {
    let store = Arc::new(FlakyStore::failing(u32::MAX));
    let signer = FiscalSigner::new(Arc::clone(&store));

    let draft = store.create_draft(invoice_input()).await.unwrap();
    let err = signer.sign(draft.id).await.unwrap_err();

    assert!(matches!(err, FiscalError::CounterContention));
    assert_eq!(store.attempts.load(Ordering::SeqCst), 3);
    assert!(!store.is_signed(draft.id).await.unwrap());
}
