//! The persistence seam for fiscal documents.
//!
//! Every caller, including the signer's retry loop, goes through this trait;
//! tests substitute decorated or failing implementations behind it.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use morabeza_core::document::{DraftDocumentInput, DraftUpdate, FiscalDocument};
use morabeza_core::saft::ExportEntry;
use morabeza_shared::error::FiscalResult;
use morabeza_shared::types::DocumentId;

/// Storage operations on fiscal documents.
///
/// Implementations must make `sign_commit` atomic: either every fiscal field
/// plus the counter increment and chain-head advance become durable together,
/// or nothing does. Read methods must never observe a document mid-sign.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Creates a draft document from a finalized sale.
    ///
    /// Credit-note referential rules are enforced here as well as at signing,
    /// so an invalid correction is rejected before it ever exists.
    async fn create_draft(&self, input: DraftDocumentInput) -> FiscalResult<FiscalDocument>;

    /// Applies a partial update to a draft. Fails with `AlreadySigned` once
    /// the document is signed.
    async fn update_draft(
        &self,
        id: DocumentId,
        update: DraftUpdate,
    ) -> FiscalResult<FiscalDocument>;

    /// Deletes a draft. Always fails once the document is signed.
    async fn delete_draft(&self, id: DocumentId) -> FiscalResult<()>;

    /// Returns a document by id.
    async fn get(&self, id: DocumentId) -> FiscalResult<FiscalDocument>;

    /// Returns whether the document is signed.
    async fn is_signed(&self, id: DocumentId) -> FiscalResult<bool>;

    /// Signs a draft: allocates its number, links it into the hash chain,
    /// derives its IUD, and marks it immutable, all in one critical section.
    ///
    /// `today` and `now` are passed in so the critical section stays
    /// deterministic and testable.
    async fn sign_commit(
        &self,
        id: DocumentId,
        today: NaiveDate,
        now: DateTime<Utc>,
    ) -> FiscalResult<FiscalDocument>;

    /// Returns the hash of the document's chain predecessor as recorded in
    /// the per-type signing order; the empty string for a chain opener.
    async fn chain_predecessor_hash(&self, id: DocumentId) -> FiscalResult<String>;

    /// Returns signed documents with an issue date in `[start, end]`,
    /// prepared for export under one consistent read snapshot.
    async fn export_snapshot(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> FiscalResult<Vec<ExportEntry>>;
}
