//! In-memory document store with serialized signing transactions.
//!
//! All signing state (documents, series counters, chain heads, signing
//! order, uniqueness indexes) lives behind one `RwLock`. `sign_commit` takes
//! the write lock for the whole operation, so number allocation and
//! chain-predecessor lookup are a single critical section and an optimistic
//! read-max-then-write race cannot exist. Every fallible step runs before
//! the first mutation; the commit at the end is all-or-nothing, so a failed
//! signing never consumes a number and never leaves a partial state behind.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use tokio::sync::RwLock;

use morabeza_core::document::{DocumentType, DraftDocumentInput, DraftUpdate, FiscalDocument};
use morabeza_core::saft::ExportEntry;
use morabeza_core::{chain, credit_note, guard, iud, numbering};
use morabeza_shared::config::CompanyConfig;
use morabeza_shared::error::{FiscalError, FiscalResult};
use morabeza_shared::types::DocumentId;

use crate::store::DocumentStore;

#[derive(Debug, Default)]
struct StoreState {
    documents: HashMap<DocumentId, FiscalDocument>,
    /// High-water mark of allocated numbers per (series, year).
    counters: HashMap<(String, i32), u32>,
    /// Hash of the most recently signed document per type.
    chain_heads: HashMap<DocumentType, String>,
    /// Signing order per type; answers chain-predecessor queries.
    chain_order: HashMap<DocumentType, Vec<DocumentId>>,
    iud_index: HashSet<String>,
    number_index: HashSet<String>,
}

impl StoreState {
    fn document(&self, id: DocumentId) -> FiscalResult<&FiscalDocument> {
        self.documents
            .get(&id)
            .ok_or(FiscalError::DocumentNotFound(id))
    }

    fn resolve_referenced(&self, document: &FiscalDocument) -> Option<FiscalDocument> {
        document
            .referenced_document
            .and_then(|id| self.documents.get(&id).cloned())
    }

    /// Hash of the chain predecessor per the recorded signing order; empty
    /// string for a chain opener.
    fn predecessor_hash(&self, document: &FiscalDocument) -> FiscalResult<String> {
        let order = self
            .chain_order
            .get(&document.document_type)
            .map(Vec::as_slice)
            .unwrap_or_default();
        let position = order.iter().position(|id| *id == document.id).ok_or_else(|| {
            FiscalError::ChainIntegrityViolation {
                details: format!(
                    "signed document {} is missing from its type's signing order",
                    document.label()
                ),
            }
        })?;
        if position == 0 {
            return Ok(String::new());
        }
        let predecessor = self.document(order[position - 1])?;
        Ok(predecessor.hash.clone().unwrap_or_default())
    }
}

/// Single-writer in-memory document store.
pub struct MemoryStore {
    config: CompanyConfig,
    state: RwLock<StoreState>,
}

impl MemoryStore {
    /// Creates an empty store issuing documents for the given company.
    #[must_use]
    pub fn new(config: CompanyConfig) -> Self {
        Self {
            config,
            state: RwLock::new(StoreState::default()),
        }
    }

    /// The injected company configuration.
    #[must_use]
    pub fn config(&self) -> &CompanyConfig {
        &self.config
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn create_draft(&self, input: DraftDocumentInput) -> FiscalResult<FiscalDocument> {
        let document = FiscalDocument::draft(input)?;
        let mut state = self.state.write().await;
        let referenced = state.resolve_referenced(&document);
        credit_note::validate(&document, referenced.as_ref())?;
        state.documents.insert(document.id, document.clone());
        Ok(document)
    }

    async fn update_draft(
        &self,
        id: DocumentId,
        update: DraftUpdate,
    ) -> FiscalResult<FiscalDocument> {
        let mut state = self.state.write().await;
        let current = state.document(id)?;
        guard::ensure_mutable(current)?;

        let mut updated = current.clone();
        if let Some(net_total) = update.net_total {
            updated.net_total = net_total;
        }
        if let Some(tax_total) = update.tax_total {
            updated.tax_total = tax_total;
        }
        if let Some(grand_total) = update.grand_total {
            updated.grand_total = grand_total;
        }
        if let Some(lines) = update.lines {
            updated.lines = lines;
        }
        if let Some(customer) = update.customer {
            updated.customer = Some(customer);
        }
        if let Some(payment_method) = update.payment_method {
            updated.payment_method = payment_method;
        }
        if let Some(issue_date) = update.issue_date {
            updated.issue_date = Some(issue_date);
        }
        if let Some(reason_code) = update.reason_code {
            updated.reason_code = Some(reason_code);
        }
        if let Some(credit_amount) = update.credit_amount {
            updated.credit_amount = Some(credit_amount);
        }

        morabeza_core::document::validate_amounts(
            updated.net_total,
            updated.tax_total,
            updated.grand_total,
        )?;
        morabeza_core::document::validate_lines(&updated.lines)?;
        let referenced = state.resolve_referenced(&updated);
        credit_note::validate(&updated, referenced.as_ref())?;

        state.documents.insert(id, updated.clone());
        Ok(updated)
    }

    async fn delete_draft(&self, id: DocumentId) -> FiscalResult<()> {
        let mut state = self.state.write().await;
        let current = state.document(id)?;
        guard::ensure_deletable(current)?;
        state.documents.remove(&id);
        Ok(())
    }

    async fn get(&self, id: DocumentId) -> FiscalResult<FiscalDocument> {
        let state = self.state.read().await;
        state.document(id).cloned()
    }

    async fn is_signed(&self, id: DocumentId) -> FiscalResult<bool> {
        let state = self.state.read().await;
        Ok(state.document(id)?.is_signed)
    }

    async fn sign_commit(
        &self,
        id: DocumentId,
        today: NaiveDate,
        now: DateTime<Utc>,
    ) -> FiscalResult<FiscalDocument> {
        let mut state = self.state.write().await;

        let mut document = state.document(id)?.clone();
        guard::ensure_signable(&document)?;
        let referenced = state.resolve_referenced(&document);
        credit_note::validate(&document, referenced.as_ref())?;

        let issue_date = document.issue_date.unwrap_or(today);

        // Allocation: read the high-water mark and pick the next value; the
        // counter itself only advances at commit below.
        let mut allocation = None;
        let invoice_number = match document.invoice_number.clone() {
            Some(number) => number,
            None => {
                let series = numbering::series_for(document.document_type, &self.config);
                let year = today.year();
                let next = state
                    .counters
                    .get(&(series.to_string(), year))
                    .copied()
                    .unwrap_or(0)
                    + 1;
                allocation = Some((series.to_string(), year, next));
                numbering::format_invoice_number(series, year, next)
            }
        };

        let previous_hash = state
            .chain_heads
            .get(&document.document_type)
            .cloned()
            .unwrap_or_default();
        let hash = chain::compute_hash(
            issue_date,
            &invoice_number,
            document.grand_total,
            &previous_hash,
        );
        let document_iud = iud::generate(
            document.document_type,
            issue_date,
            &self.config.tax_registration_number,
            &invoice_number,
        );

        // Hard uniqueness constraints, checked before anything mutates.
        if state.number_index.contains(&invoice_number) {
            return Err(FiscalError::DuplicateInvoiceNumber(invoice_number));
        }
        if state.iud_index.contains(&document_iud) {
            return Err(FiscalError::DuplicateIud(document_iud));
        }

        document.invoice_number = Some(invoice_number.clone());
        document.issue_date = Some(issue_date);
        document.previous_hash = Some(previous_hash);
        document.hash = Some(hash.clone());
        document.hash_algorithm = Some(chain::HASH_ALGORITHM.to_string());
        document.iud = Some(document_iud.clone());
        document.software_certificate_number =
            Some(self.config.software_certificate_number.clone());
        document.is_signed = true;
        document.signed_at = Some(now);

        // Commit. Nothing above this point has touched the state.
        if let Some((series, year, next)) = allocation {
            state.counters.insert((series, year), next);
        }
        state
            .chain_heads
            .insert(document.document_type, hash);
        state
            .chain_order
            .entry(document.document_type)
            .or_default()
            .push(id);
        state.number_index.insert(invoice_number);
        state.iud_index.insert(document_iud);
        state.documents.insert(id, document.clone());

        Ok(document)
    }

    async fn chain_predecessor_hash(&self, id: DocumentId) -> FiscalResult<String> {
        let state = self.state.read().await;
        let document = state.document(id)?;
        if !document.is_signed {
            return Err(FiscalError::NotSigned(format!(
                "document {} has no chain position before signing",
                document.label()
            )));
        }
        state.predecessor_hash(document)
    }

    async fn export_snapshot(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> FiscalResult<Vec<ExportEntry>> {
        let state = self.state.read().await;
        let mut entries = Vec::new();
        for document in state.documents.values() {
            if !document.is_signed {
                continue;
            }
            let Some(issue_date) = document.issue_date else {
                continue;
            };
            if issue_date < start || issue_date > end {
                continue;
            }
            let referenced_number = state
                .resolve_referenced(document)
                .and_then(|original| original.invoice_number);
            let chain_predecessor_hash = state.predecessor_hash(document)?;
            entries.push(ExportEntry {
                document: document.clone(),
                referenced_number,
                chain_predecessor_hash,
            });
        }
        entries.sort_by(|a, b| {
            (a.document.issue_date, &a.document.invoice_number)
                .cmp(&(b.document.issue_date, &b.document.invoice_number))
        });
        Ok(entries)
    }
}
