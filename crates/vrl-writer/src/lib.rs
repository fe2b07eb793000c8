//! Write serialization for the Vehicle Record Ledger (VRL).
//!
//! All writes from one submitting identity go through a single
//! [`WriteSerializer`]: a FIFO queue drained by one background task, so at
//! most one submission per identity is ever in flight. Nonce conflicts are
//! retried with a fresh nonce and exponential backoff; connectivity failures
//! are surfaced immediately.

pub mod config;
pub mod error;
pub mod pool;
mod retry;
pub mod serializer;

pub use config::{RetryConfig, WriterConfig};
pub use error::{WriteError, WriteResult};
pub use pool::WriterPool;
pub use serializer::{SubmissionState, WriteReceipt, WriteSerializer};
