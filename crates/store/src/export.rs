//! Read-only export services.
//!
//! Fetches a consistent snapshot of signed documents from the store and runs
//! the pure SAF-T exporter or the e-Fatura renderer over it. Nothing here
//! mutates or signs documents; export runs concurrently with signing against
//! the store's snapshot reads.

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use tracing::{info, warn};

use morabeza_core::saft::{efatura, export, EfaturaSubmission, SaftExport};
use morabeza_shared::config::CompanyConfig;
use morabeza_shared::error::FiscalResult;
use morabeza_shared::types::DocumentId;

use crate::store::DocumentStore;

/// SAF-T and e-Fatura export surface over a [`DocumentStore`].
pub struct ExportService<S: DocumentStore> {
    store: Arc<S>,
    config: CompanyConfig,
}

impl<S: DocumentStore> ExportService<S> {
    /// Creates an export service for the given store and issuer.
    #[must_use]
    pub fn new(store: Arc<S>, config: CompanyConfig) -> Self {
        Self { store, config }
    }

    /// Exports the signed documents with issue dates in `[start, end]` as a
    /// SAF-T audit file, re-verifying chain continuity along the way.
    ///
    /// # Errors
    ///
    /// Propagates store and serialization errors; chain breaks are returned
    /// as warnings in the result, not as errors.
    pub async fn export(&self, start: NaiveDate, end: NaiveDate) -> FiscalResult<SaftExport> {
        let entries = self.store.export_snapshot(start, end).await?;
        let result = export::export(
            &self.config,
            start,
            end,
            Utc::now().date_naive(),
            entries,
        )?;
        if result.warnings.is_empty() {
            info!(%start, %end, "audit export completed");
        } else {
            warn!(
                %start,
                %end,
                warnings = result.warnings.len(),
                "audit export completed with integrity warnings"
            );
        }
        Ok(result)
    }

    /// Renders a signed document as e-Fatura XML with a simulation-mode
    /// submission receipt.
    ///
    /// # Errors
    ///
    /// Returns `DocumentNotFound` for unknown ids and `NotSigned` for drafts.
    pub async fn submit_efatura(&self, id: DocumentId) -> FiscalResult<EfaturaSubmission> {
        let document = self.store.get(id).await?;
        let submission = efatura::submit_simulated(&self.config, &document)?;
        info!(
            document_id = %id,
            invoice_number = %submission.receipt.invoice_number,
            mode = %submission.receipt.mode,
            "e-Fatura document rendered"
        );
        Ok(submission)
    }
}
