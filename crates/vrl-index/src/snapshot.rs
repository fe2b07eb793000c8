//! Persisted index state: per-field cursors and their buckets.
//!
//! A cursor is only meaningful together with the buckets it covers, so both
//! are always saved and restored as one unit.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use serde::{Deserialize, Serialize};
use tracing::debug;
use vrl_types::Sequence;

use crate::bucket::{Bucket, FieldIndex};
use crate::error::{IndexError, IndexResult};

const SNAPSHOT_VERSION: u32 = 1;

/// Serialized state of one field index.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSnapshot {
    pub cursor: Sequence,
    pub buckets: BTreeMap<String, Vec<Sequence>>,
}

impl FieldSnapshot {
    pub fn capture(field: &FieldIndex) -> Self {
        Self {
            cursor: field.cursor(),
            buckets: field
                .buckets()
                .iter()
                .map(|(k, b)| (k.clone(), b.as_slice().to_vec()))
                .collect(),
        }
    }

    /// Check the snapshot against the ledger head and rebuild the field
    /// index from it.
    pub fn restore(self, key_field: &str, head: Sequence) -> IndexResult<FieldIndex> {
        let corruption = |reason: String| IndexError::CursorCorruption {
            key_field: key_field.to_string(),
            cursor: self.cursor,
            head,
            reason,
        };

        if self.cursor > head {
            return Err(corruption("cursor is beyond the ledger head".into()));
        }

        let mut buckets = HashMap::with_capacity(self.buckets.len());
        for (key, sequences) in &self.buckets {
            if sequences.last().is_some_and(|s| *s > self.cursor) {
                return Err(corruption(format!("bucket '{key}' extends past the cursor")));
            }
            let bucket = Bucket::from_sorted(sequences.clone())
                .ok_or_else(|| corruption(format!("bucket '{key}' is not strictly ascending")))?;
            buckets.insert(key.clone(), bucket);
        }

        Ok(FieldIndex::from_parts(key_field.to_string(), self.cursor, buckets))
    }
}

/// Serialized state of the whole index.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexSnapshot {
    pub version: u32,
    pub fields: BTreeMap<String, FieldSnapshot>,
}

impl Default for IndexSnapshot {
    fn default() -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            fields: BTreeMap::new(),
        }
    }
}

/// Storage backend for index snapshots.
///
/// Implementations must replace the stored snapshot atomically: a reader
/// sees either the previous snapshot or the new one, never a mix.
pub trait SnapshotStore: Send + Sync {
    /// Returns `Ok(None)` if nothing has been saved yet.
    fn load(&self) -> IndexResult<Option<IndexSnapshot>>;

    fn save(&self, snapshot: &IndexSnapshot) -> IndexResult<()>;
}

/// Snapshot store that lives only as long as the process.
#[derive(Debug, Default)]
pub struct InMemorySnapshotStore {
    snapshot: RwLock<Option<IndexSnapshot>>,
}

impl InMemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SnapshotStore for InMemorySnapshotStore {
    fn load(&self) -> IndexResult<Option<IndexSnapshot>> {
        let snapshot = self
            .snapshot
            .read()
            .map_err(|e| IndexError::Snapshot(format!("lock poisoned: {e}")))?;
        Ok(snapshot.clone())
    }

    fn save(&self, snapshot: &IndexSnapshot) -> IndexResult<()> {
        let mut slot = self
            .snapshot
            .write()
            .map_err(|e| IndexError::Snapshot(format!("lock poisoned: {e}")))?;
        *slot = Some(snapshot.clone());
        Ok(())
    }
}

/// Snapshot store backed by a JSON file, replaced via temp file + rename.
#[derive(Debug, Clone)]
pub struct FileSnapshotStore {
    path: PathBuf,
}

impl FileSnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SnapshotStore for FileSnapshotStore {
    fn load(&self) -> IndexResult<Option<IndexSnapshot>> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(IndexError::Snapshot(e.to_string())),
        };
        let snapshot: IndexSnapshot = serde_json::from_slice(&bytes)
            .map_err(|e| IndexError::Snapshot(format!("{}: {e}", self.path.display())))?;
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(IndexError::Snapshot(format!(
                "unsupported snapshot version {}",
                snapshot.version
            )));
        }
        Ok(Some(snapshot))
    }

    fn save(&self, snapshot: &IndexSnapshot) -> IndexResult<()> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir).map_err(|e| IndexError::Snapshot(e.to_string()))?;

        let bytes = serde_json::to_vec_pretty(snapshot)
            .map_err(|e| IndexError::Snapshot(e.to_string()))?;
        let mut tmp = tempfile::NamedTempFile::new_in(&dir)
            .map_err(|e| IndexError::Snapshot(e.to_string()))?;
        tmp.write_all(&bytes)
            .and_then(|_| tmp.as_file().sync_all())
            .map_err(|e| IndexError::Snapshot(e.to_string()))?;
        tmp.persist(&self.path)
            .map_err(|e| IndexError::Snapshot(e.to_string()))?;

        debug!(path = %self.path.display(), fields = snapshot.fields.len(), "index snapshot saved");
        Ok(())
    }
}
