//! Shared types, errors, and configuration for Morabeza.
//!
//! This crate provides common types used across all other crates:
//! - Typed IDs for type-safe entity references
//! - Application-wide fiscal error types
//! - Company configuration (injected, never a global singleton)

pub mod config;
pub mod error;
pub mod types;

pub use config::{CompanyConfig, TaxRate};
pub use error::{FiscalError, FiscalResult};
