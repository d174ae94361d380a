//! Signing orchestration.
//!
//! The signer drives the `Draft -> Signed` transition through the store's
//! atomic commit, retries transient counter contention with bounded
//! attempts, and notifies registered callbacks after a successful commit so
//! the order subsystem can update its own payment status.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use morabeza_core::chain::{self, VerificationReport};
use morabeza_core::document::FiscalDocument;
use morabeza_shared::error::{FiscalError, FiscalResult};
use morabeza_shared::types::DocumentId;

use crate::store::DocumentStore;

/// Callback invoked after a successful signing commit.
pub type OnSigned = Box<dyn Fn(&FiscalDocument) + Send + Sync>;

/// Bounded retry budget for transient allocation contention.
const MAX_SIGN_ATTEMPTS: u32 = 3;

/// Orchestrates document signing over a [`DocumentStore`].
pub struct FiscalSigner<S: DocumentStore> {
    store: Arc<S>,
    callbacks: Vec<OnSigned>,
}

impl<S: DocumentStore> FiscalSigner<S> {
    /// Creates a signer over the given store.
    #[must_use]
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            callbacks: Vec::new(),
        }
    }

    /// Registers a callback to run after every successful signing.
    pub fn on_signed(&mut self, callback: OnSigned) {
        self.callbacks.push(callback);
    }

    /// Signs a draft document.
    ///
    /// Transient `CounterContention` errors are retried up to three attempts
    /// before surfacing; every other error is returned as-is. Signing is
    /// one-time-only: a second call on the same document fails with
    /// `AlreadySigned`.
    ///
    /// # Errors
    ///
    /// Propagates the store's typed errors.
    pub async fn sign(&self, id: DocumentId) -> FiscalResult<FiscalDocument> {
        let mut attempt = 1;
        let document = loop {
            let now = Utc::now();
            match self.store.sign_commit(id, now.date_naive(), now).await {
                Ok(document) => break document,
                Err(e) if e.is_retryable() && attempt < MAX_SIGN_ATTEMPTS => {
                    warn!(
                        document_id = %id,
                        attempt,
                        error = %e,
                        "transient failure while signing, retrying"
                    );
                    attempt += 1;
                }
                Err(e) => {
                    warn!(document_id = %id, error = %e, "signing failed");
                    return Err(e);
                }
            }
        };

        info!(
            document_id = %id,
            invoice_number = document.invoice_number.as_deref().unwrap_or_default(),
            document_type = %document.document_type,
            "document signed"
        );
        for callback in &self.callbacks {
            callback(&document);
        }
        Ok(document)
    }

    /// Returns whether the document is signed.
    ///
    /// # Errors
    ///
    /// Returns `DocumentNotFound` for unknown ids.
    pub async fn is_signed(&self, id: DocumentId) -> FiscalResult<bool> {
        self.store.is_signed(id).await
    }

    /// Verifies a signed document's hash and its chain-of-custody link.
    ///
    /// # Errors
    ///
    /// Returns `DocumentNotFound` for unknown ids and `NotSigned` for drafts;
    /// integrity findings are reported in the result, not as errors.
    pub async fn verify(&self, id: DocumentId) -> FiscalResult<VerificationReport> {
        let document = self.store.get(id).await?;
        if !document.is_signed {
            return Err(FiscalError::NotSigned(format!(
                "document {} cannot be verified before signing",
                document.label()
            )));
        }
        let predecessor_hash = self.store.chain_predecessor_hash(id).await?;
        let report = chain::verify_with_predecessor(&document, &predecessor_hash);
        if !report.valid {
            warn!(
                document_id = %id,
                details = ?report.details,
                "chain verification found integrity violations"
            );
        }
        Ok(report)
    }
}
