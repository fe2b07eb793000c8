use vrl_index::IndexError;
use vrl_ledger::LedgerError;
use vrl_writer::WriteError;

/// Failures returned by [`crate::RecordStore`].
///
/// Undecodable ledger entries never appear here; the index skips them.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("no record with {key_field} = {key:?}")]
    NotFound { key_field: String, key: String },

    /// Empty or invalid outgoing record, or a ledger rejection.
    #[error("submission error: {0}")]
    Submission(String),

    #[error("write conflict after {attempts} attempts: {reason}")]
    WriteConflict { attempts: u32, reason: String },

    #[error("ledger unavailable: {0}")]
    LedgerUnavailable(String),

    /// Persisted index state disagreed with the ledger and could not be
    /// rebuilt.
    #[error("cursor corruption: {0}")]
    CursorCorruption(String),

    #[error("index error: {0}")]
    Index(IndexError),

    #[error("ledger error: {0}")]
    Ledger(LedgerError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("store is shutting down")]
    Shutdown,
}

impl From<LedgerError> for StoreError {
    fn from(e: LedgerError) -> Self {
        match e {
            LedgerError::Unavailable(reason) => Self::LedgerUnavailable(reason),
            other => Self::Ledger(other),
        }
    }
}

impl From<IndexError> for StoreError {
    fn from(e: IndexError) -> Self {
        match e {
            IndexError::Ledger(inner) => inner.into(),
            e @ IndexError::CursorCorruption { .. } => Self::CursorCorruption(e.to_string()),
            other => Self::Index(other),
        }
    }
}

impl From<WriteError> for StoreError {
    fn from(e: WriteError) -> Self {
        match e {
            WriteError::Conflict { attempts, last } => Self::WriteConflict {
                attempts,
                reason: last.to_string(),
            },
            WriteError::Unavailable(reason) => Self::LedgerUnavailable(reason),
            WriteError::Rejected(reason) => Self::Submission(reason.to_string()),
            WriteError::Shutdown => Self::Shutdown,
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;
