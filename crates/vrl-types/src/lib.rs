//! Foundation types for the Vehicle Record Ledger (VRL).
//!
//! Every other VRL crate depends on `vrl-types`. The ledger itself is an
//! opaque, append-only sequence of data entries; the types here give those
//! entries an order, an author, and a decoded meaning.
//!
//! # Key Types
//!
//! - [`Sequence`] — Composite (block height, intra-block index) position in the ledger
//! - [`Identity`] — Submitting account address
//! - [`LedgerEntry`] — One immutable, sequenced ledger entry
//! - [`Record`] — Decoded domain object with an optional [`Tombstone`]
//! - [`RecordCodec`] — Deterministic JSON encoding between records and payloads

pub mod codec;
pub mod entry;
pub mod error;
pub mod identity;
pub mod record;
pub mod sequence;

pub use codec::RecordCodec;
pub use entry::LedgerEntry;
pub use error::{DecodeError, TypeError};
pub use identity::Identity;
pub use record::{Record, Tombstone, DELETED_FIELD};
pub use sequence::Sequence;
