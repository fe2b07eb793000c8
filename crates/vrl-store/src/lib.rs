//! Record store for the Vehicle Record Ledger (VRL).
//!
//! [`RecordStore`] is the public API: it writes records to the ledger through
//! a [`vrl_writer::WriteSerializer`] and answers keyed reads from the
//! incrementally maintained [`vrl_index::ReplayIndex`]. Records are never
//! rewritten; a delete appends a tombstone.

pub mod config;
pub mod error;
pub mod store;

pub use config::StoreConfig;
pub use error::{StoreError, StoreResult};
pub use store::{RecordStore, StoredRecord};

pub use vrl_index::{AdvanceReport, FileSnapshotStore, InMemorySnapshotStore, SnapshotStore};
pub use vrl_ledger::{FileLedger, FileLedgerConfig, InMemoryLedger, Ledger};
pub use vrl_types::{Identity, Record, Sequence, Tombstone};
