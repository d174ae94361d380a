//! Fiscal domain logic for Morabeza.
//!
//! This crate contains pure business logic with ZERO web or database dependencies.
//! All domain types, fiscal invariants, and calculations live here.
//!
//! # Modules
//!
//! - `document` - The signable fiscal document model
//! - `numbering` - Series selection and `SERIES/YEAR/NNNNN` formatting
//! - `chain` - SHA-256 hash chain computation and verification
//! - `iud` - 45-character unique document identifier derivation
//! - `guard` - Immutability rules for signed documents
//! - `credit_note` - Referential rules for correction documents
//! - `saft` - SAF-T audit export and e-Fatura document rendering

pub mod chain;
pub mod credit_note;
pub mod document;
pub mod guard;
pub mod iud;
pub mod numbering;
pub mod saft;
