//! Document persistence boundary and signing orchestration for Morabeza.
//!
//! This crate owns the shared mutable state of the fiscal core: the document
//! set, the per-(series, year) counters, and the per-type chain heads. All of
//! it lives behind a single lock so that number allocation, chain-predecessor
//! lookup, and the signed-document write commit as one critical section.
//!
//! # Modules
//!
//! - `store` - The `DocumentStore` seam every caller goes through
//! - `memory` - The in-memory single-writer store
//! - `signer` - Signing orchestration with bounded retry and callbacks
//! - `export` - Read-only SAF-T export and e-Fatura services

pub mod export;
pub mod memory;
pub mod signer;
pub mod store;

pub use export::ExportService;
pub use memory::MemoryStore;
pub use signer::FiscalSigner;
pub use store::DocumentStore;
