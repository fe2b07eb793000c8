//! Replay index for the Vehicle Record Ledger.
//!
//! Turns the raw ledger into a queryable, versioned, per-key record store.
//! The index is keyed by field name: the first query on a field scans the
//! ledger from genesis, later queries only scan what was appended since.
//!
//! # Key Types
//!
//! - [`ReplayIndex`] -- Lazily built, incrementally advanced per-field index
//! - [`FieldIndex`] -- Cursor and buckets for one field name
//! - [`Bucket`] -- Ascending sequences whose record has a given key value
//! - [`RecordArena`] -- Decoded records shared across field indexes
//! - [`SnapshotStore`] -- Persistence for cursors and buckets

pub mod arena;
pub mod bucket;
pub mod error;
pub mod replay;
pub mod snapshot;

pub use arena::RecordArena;
pub use bucket::{Bucket, FieldIndex};
pub use error::{IndexError, IndexResult};
pub use replay::{AdvanceReport, IndexConfig, ReplayIndex};
pub use snapshot::{
    FieldSnapshot, FileSnapshotStore, InMemorySnapshotStore, IndexSnapshot, SnapshotStore,
};
