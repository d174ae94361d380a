//! SAF-T audit export and e-Fatura document rendering.
//!
//! Both renderers are pure: they consume pre-fetched document snapshots and
//! company configuration and produce XML bytes. They never mutate or sign
//! documents, and they never touch the network or the filesystem.

pub mod efatura;
pub mod export;

pub use efatura::{EfaturaSubmission, SubmissionReceipt};
pub use export::{ExportEntry, SaftExport};
