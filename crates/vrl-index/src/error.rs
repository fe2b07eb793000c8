//! Error types for the index crate.

use vrl_ledger::LedgerError;
use vrl_types::{DecodeError, Sequence};

/// Errors that can occur during index operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IndexError {
    /// The ledger could not be read.
    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),

    /// A cursor or bucket is inconsistent with the observed ledger.
    #[error("cursor for '{key_field}' at {cursor} is inconsistent with ledger head {head}: {reason}")]
    CursorCorruption {
        key_field: String,
        cursor: Sequence,
        head: Sequence,
        reason: String,
    },

    /// A scan was interrupted; progress through `committed` is kept.
    #[error("scan of '{key_field}' cancelled; committed through {committed}")]
    Cancelled {
        key_field: String,
        committed: Sequence,
    },

    /// A bucket references a sequence the ledger does not have.
    #[error("indexed entry {0} is missing from the ledger")]
    MissingEntry(Sequence),

    /// A bucket references an entry whose payload no longer decodes.
    #[error("indexed entry {sequence} does not decode: {source}")]
    Undecodable {
        sequence: Sequence,
        source: DecodeError,
    },

    /// Snapshot persistence failed.
    #[error("snapshot error: {0}")]
    Snapshot(String),
}

/// Convenience alias for index results.
pub type IndexResult<T> = Result<T, IndexError>;
