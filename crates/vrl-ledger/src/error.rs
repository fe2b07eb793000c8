use vrl_types::Identity;

/// Errors produced by ledger operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    #[error("ledger unavailable: {0}")]
    Unavailable(String),

    #[error("nonce conflict for {sender}: expected {expected}, got {got}")]
    NonceConflict {
        sender: Identity,
        expected: u64,
        got: u64,
    },

    #[error("submission rejected: {0}")]
    Rejected(String),

    #[error("payload is empty")]
    EmptyPayload,

    #[error("corrupt ledger file at offset {offset}: {reason}")]
    Corrupt { offset: u64, reason: String },

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("storage error: {0}")]
    Storage(String),
}

impl LedgerError {
    /// Ordering/nonce collisions that a fresh submission may resolve.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::NonceConflict { .. })
    }

    /// Connectivity failures.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

impl From<std::io::Error> for LedgerError {
    fn from(e: std::io::Error) -> Self {
        Self::Storage(e.to_string())
    }
}

pub type LedgerResult<T> = Result<T, LedgerError>;
