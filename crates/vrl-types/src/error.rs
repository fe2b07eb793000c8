use thiserror::Error;

/// Errors produced by type operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid hex string: {0}")]
    InvalidHex(String),

    #[error("invalid byte length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    #[error("invalid sequence: {0}")]
    InvalidSequence(String),
}

/// A ledger payload that could not be decoded into a [`crate::Record`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("payload is empty")]
    Empty,

    #[error("payload is not valid UTF-8: {0}")]
    Utf8(String),

    #[error("payload is not valid JSON: {0}")]
    Json(String),

    #[error("payload is a JSON {0}, expected an object")]
    NotAnObject(&'static str),
}
