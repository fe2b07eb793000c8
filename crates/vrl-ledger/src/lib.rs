//! Ledger boundary for the Vehicle Record Ledger (VRL).
//!
//! The ledger is an external collaborator: a strictly ordered, immutable,
//! ever-growing sequence of opaque entries. This crate provides:
//! - The [`Ledger`] trait (`append`, `iterate`, `head`, `next_nonce`)
//! - [`Submission`], the unit of write with its sequencing nonce
//! - [`EntryScan`], lazy page-by-page iteration up to a bound
//! - [`InMemoryLedger`] for tests and embedding, with fault injection
//! - [`FileLedger`], a CRC-framed append-only file for local runs

pub mod error;
pub mod file;
pub mod memory;
pub mod scan;
mod state;
pub mod traits;

pub use error::{LedgerError, LedgerResult};
pub use file::{FileLedger, FileLedgerConfig, SyncMode};
pub use memory::InMemoryLedger;
pub use scan::EntryScan;
pub use traits::{Ledger, Submission};
