//! Buckets and the per-field index that owns them.

use std::collections::HashMap;

use vrl_types::Sequence;

/// Ascending sequences of entries whose record carries one key value.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Bucket {
    sequences: Vec<Sequence>,
}

impl Bucket {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from already-ordered sequences. Returns `None` if they are not
    /// strictly ascending.
    pub fn from_sorted(sequences: Vec<Sequence>) -> Option<Self> {
        if sequences.windows(2).all(|w| w[0] < w[1]) {
            Some(Self { sequences })
        } else {
            None
        }
    }

    /// Append a sequence. Sequences at or below the current tail are
    /// ignored, so re-applying a scanned range never duplicates entries.
    pub fn push(&mut self, sequence: Sequence) -> bool {
        match self.sequences.last() {
            Some(last) if *last >= sequence => false,
            _ => {
                self.sequences.push(sequence);
                true
            }
        }
    }

    pub fn len(&self) -> usize {
        self.sequences.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sequences.is_empty()
    }

    pub fn as_slice(&self) -> &[Sequence] {
        &self.sequences
    }

    /// All sequences at or below `bound`.
    pub fn up_to(&self, bound: Sequence) -> &[Sequence] {
        let end = self.sequences.partition_point(|s| *s <= bound);
        &self.sequences[..end]
    }

    /// The highest sequence at or below `bound`.
    pub fn last_at(&self, bound: Sequence) -> Option<Sequence> {
        self.up_to(bound).last().copied()
    }
}

/// Cursor and buckets for one field name.
///
/// `cursor` is the highest sequence whose effects are fully reflected in
/// `buckets`. It never moves backwards except through an explicit reset.
#[derive(Clone, Debug)]
pub struct FieldIndex {
    key_field: String,
    cursor: Sequence,
    buckets: HashMap<String, Bucket>,
}

impl FieldIndex {
    pub fn new(key_field: impl Into<String>) -> Self {
        Self {
            key_field: key_field.into(),
            cursor: Sequence::GENESIS,
            buckets: HashMap::new(),
        }
    }

    pub(crate) fn from_parts(
        key_field: String,
        cursor: Sequence,
        buckets: HashMap<String, Bucket>,
    ) -> Self {
        Self {
            key_field,
            cursor,
            buckets,
        }
    }

    pub fn key_field(&self) -> &str {
        &self.key_field
    }

    pub fn cursor(&self) -> Sequence {
        self.cursor
    }

    pub fn bucket(&self, key: &str) -> Option<&Bucket> {
        self.buckets.get(key)
    }

    pub fn buckets(&self) -> &HashMap<String, Bucket> {
        &self.buckets
    }

    /// Number of distinct key values seen.
    pub fn key_count(&self) -> usize {
        self.buckets.len()
    }

    /// Apply one fully processed page: its matches, then the cursor.
    ///
    /// Returns the number of sequences actually added.
    pub(crate) fn commit(&mut self, matches: Vec<(String, Sequence)>, through: Sequence) -> usize {
        let mut added = 0;
        for (key, sequence) in matches {
            if sequence <= self.cursor {
                continue;
            }
            if self.buckets.entry(key).or_default().push(sequence) {
                added += 1;
            }
        }
        if through > self.cursor {
            self.cursor = through;
        }
        added
    }

    /// Forget everything; the next advance rescans from genesis.
    pub(crate) fn reset(&mut self) {
        self.cursor = Sequence::GENESIS;
        self.buckets.clear();
    }
}
