//! Decoded-record arena shared by every field index.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use vrl_types::{Record, Sequence};

/// Records decoded during scans, keyed by ledger sequence.
///
/// Entries are immutable, so a decoded record never goes stale. Buckets
/// store only sequences; lookups resolve them here and fall back to the
/// ledger on a miss (e.g. after restoring buckets from a snapshot).
#[derive(Debug, Default)]
pub struct RecordArena {
    records: RwLock<HashMap<Sequence, Arc<Record>>>,
}

impl RecordArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, sequence: Sequence) -> Option<Arc<Record>> {
        self.records
            .read()
            .expect("arena lock poisoned")
            .get(&sequence)
            .cloned()
    }

    /// Insert a record, keeping the existing one if already present.
    pub fn insert(&self, sequence: Sequence, record: Arc<Record>) -> Arc<Record> {
        self.records
            .write()
            .expect("arena lock poisoned")
            .entry(sequence)
            .or_insert(record)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.records.read().expect("arena lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_insert_wins() {
        let arena = RecordArena::new();
        let seq = Sequence::new(1, 0);
        let first = Arc::new(Record::new().with("vin", "V1"));
        let second = Arc::new(Record::new().with("vin", "V2"));
        arena.insert(seq, first.clone());
        let kept = arena.insert(seq, second);
        assert_eq!(kept, first);
        assert_eq!(arena.get(seq), Some(first));
        assert_eq!(arena.len(), 1);
        assert!(arena.get(Sequence::new(2, 0)).is_none());
    }
}
