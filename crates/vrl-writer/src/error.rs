use vrl_ledger::LedgerError;

/// Terminal failures of a queued write.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WriteError {
    /// Every attempt collided with another submission's nonce.
    #[error("write conflict persisted after {attempts} attempts: {last}")]
    Conflict { attempts: u32, last: LedgerError },

    #[error("ledger unavailable: {0}")]
    Unavailable(String),

    /// The ledger refused the submission for a reason a retry cannot fix.
    #[error("submission rejected: {0}")]
    Rejected(LedgerError),

    #[error("write serializer has shut down")]
    Shutdown,
}

impl From<LedgerError> for WriteError {
    fn from(e: LedgerError) -> Self {
        match e {
            LedgerError::Unavailable(reason) => Self::Unavailable(reason),
            other => Self::Rejected(other),
        }
    }
}

pub type WriteResult<T> = Result<T, WriteError>;
