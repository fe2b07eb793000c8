//! Incremental replay of the ledger into per-field buckets.
//!
//! Each field name gets its own [`FieldIndex`], created on first use and
//! advanced from its cursor on every later read. Advancing a field is
//! serialized: concurrent readers of the same field wait for the scan in
//! flight and then find nothing left to do. Each page of entries is
//! committed (matches + cursor) in one step, so an interrupted scan keeps
//! exactly the pages it fully processed.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tokio::sync::{watch, Mutex};
use tracing::{debug, info, instrument, warn};
use vrl_ledger::{EntryScan, Ledger};
use vrl_types::{Record, RecordCodec, Sequence};

use crate::arena::RecordArena;
use crate::bucket::FieldIndex;
use crate::error::{IndexError, IndexResult};
use crate::snapshot::{FieldSnapshot, IndexSnapshot, SnapshotStore};

/// Tuning for ledger scans.
#[derive(Clone, Debug)]
pub struct IndexConfig {
    /// Entries pulled from the ledger per page.
    pub page_size: usize,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self { page_size: 256 }
    }
}

/// Outcome of one `advance` call.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AdvanceReport {
    pub key_field: String,
    /// Cursor before the call.
    pub from: Sequence,
    /// Cursor after the call.
    pub to: Sequence,
    /// Entries read from the ledger.
    pub scanned: u64,
    /// Sequences added to buckets.
    pub indexed: u64,
    /// Data-only entries skipped because their payload did not decode.
    pub skipped: u64,
    /// The field was reset and rescanned from genesis.
    pub rebuilt: bool,
}

impl AdvanceReport {
    fn new(key_field: &str, from: Sequence) -> Self {
        Self {
            key_field: key_field.to_string(),
            from,
            to: from,
            ..Default::default()
        }
    }

    /// Returns `true` if nothing new was scanned.
    pub fn is_noop(&self) -> bool {
        self.scanned == 0 && !self.rebuilt && self.from == self.to
    }
}

/// One field's index plus the lock that serializes its scans.
struct FieldSlot {
    scan: Mutex<()>,
    data: RwLock<FieldIndex>,
}

impl FieldSlot {
    fn new(field: FieldIndex) -> Self {
        Self {
            scan: Mutex::new(()),
            data: RwLock::new(field),
        }
    }

    fn cursor(&self) -> Sequence {
        self.data.read().expect("field lock poisoned").cursor()
    }
}

/// Lazily built, incrementally maintained per-field index over a ledger.
pub struct ReplayIndex {
    ledger: Arc<dyn Ledger>,
    fields: RwLock<HashMap<String, Arc<FieldSlot>>>,
    arena: RecordArena,
    snapshots: Option<Arc<dyn SnapshotStore>>,
    config: IndexConfig,
}

impl ReplayIndex {
    /// Create an empty index with no persistence.
    pub fn new(ledger: Arc<dyn Ledger>, config: IndexConfig) -> Self {
        Self {
            ledger,
            fields: RwLock::new(HashMap::new()),
            arena: RecordArena::new(),
            snapshots: None,
            config,
        }
    }

    /// Create an index that restores from, and saves to, `store`.
    ///
    /// Fields whose saved cursor or buckets disagree with the ledger are
    /// rebuilt from genesis rather than trusted.
    pub async fn open(
        ledger: Arc<dyn Ledger>,
        config: IndexConfig,
        store: Arc<dyn SnapshotStore>,
    ) -> IndexResult<Self> {
        let saved = store.load()?;
        let mut index = Self::new(ledger, config);
        index.snapshots = Some(store);

        let Some(saved) = saved else {
            return Ok(index);
        };

        let head = index.ledger.head().await?;
        let mut corrupted = Vec::new();
        {
            let mut fields = index.fields.write().expect("fields lock poisoned");
            for (key_field, field_snapshot) in saved.fields {
                match field_snapshot.restore(&key_field, head) {
                    Ok(field) => {
                        debug!(%key_field, cursor = %field.cursor(), "restored field index");
                        fields.insert(key_field, Arc::new(FieldSlot::new(field)));
                    }
                    Err(err) => {
                        warn!(%key_field, error = %err, "cursor corruption in snapshot; rebuilding");
                        corrupted.push(key_field);
                    }
                }
            }
        }

        for key_field in corrupted {
            index.rebuild(&key_field).await?;
        }
        Ok(index)
    }

    pub fn ledger(&self) -> &Arc<dyn Ledger> {
        &self.ledger
    }

    /// Field names that have been indexed so far.
    pub fn fields(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .fields
            .read()
            .expect("fields lock poisoned")
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }

    /// Current cursor of a field, if it has been indexed.
    pub fn cursor(&self, key_field: &str) -> Option<Sequence> {
        self.existing_slot(key_field).map(|slot| slot.cursor())
    }

    /// Scan everything appended since the field's cursor, up to the current
    /// ledger head.
    #[instrument(skip(self))]
    pub async fn advance(&self, key_field: &str) -> IndexResult<AdvanceReport> {
        let head = self.ledger.head().await?;
        self.advance_inner(key_field, head, None, false).await
    }

    /// Like [`Self::advance`], but stops between pages once `cancel` reads
    /// `true`, returning [`IndexError::Cancelled`] with the last committed
    /// sequence.
    pub async fn advance_until_cancelled(
        &self,
        key_field: &str,
        cancel: &watch::Receiver<bool>,
    ) -> IndexResult<AdvanceReport> {
        let head = self.ledger.head().await?;
        self.advance_inner(key_field, head, Some(cancel), false).await
    }

    /// Reset a field's cursor and buckets, then rescan from genesis.
    pub async fn rebuild(&self, key_field: &str) -> IndexResult<AdvanceReport> {
        let head = self.ledger.head().await?;
        self.advance_inner(key_field, head, None, true).await
    }

    /// The newest record whose `key_field` equals `key`, among entries at or
    /// below the head observed at the start of the call.
    #[instrument(skip(self), level = "debug")]
    pub async fn latest(
        &self,
        key_field: &str,
        key: &str,
    ) -> IndexResult<Option<(Sequence, Arc<Record>)>> {
        let head = self.ledger.head().await?;
        self.advance_inner(key_field, head, None, false).await?;

        let sequence = {
            let slot = self.slot(key_field);
            let data = slot.data.read().expect("field lock poisoned");
            data.bucket(key).and_then(|b| b.last_at(head))
        };
        match sequence {
            Some(sequence) => Ok(Some((sequence, self.resolve(sequence).await?))),
            None => Ok(None),
        }
    }

    /// Every record whose `key_field` equals `key`, ascending by sequence,
    /// among entries at or below the head observed at the start of the call.
    #[instrument(skip(self), level = "debug")]
    pub async fn history(
        &self,
        key_field: &str,
        key: &str,
    ) -> IndexResult<Vec<(Sequence, Arc<Record>)>> {
        let head = self.ledger.head().await?;
        self.advance_inner(key_field, head, None, false).await?;

        let sequences: Vec<Sequence> = {
            let slot = self.slot(key_field);
            let data = slot.data.read().expect("field lock poisoned");
            data.bucket(key)
                .map(|b| b.up_to(head).to_vec())
                .unwrap_or_default()
        };

        let mut records = Vec::with_capacity(sequences.len());
        for sequence in sequences {
            records.push((sequence, self.resolve(sequence).await?));
        }
        Ok(records)
    }

    /// Decode every data-only entry up to the current head, regardless of
    /// key. Undecodable payloads are skipped.
    #[instrument(skip(self), level = "debug")]
    pub async fn scan_all(&self) -> IndexResult<Vec<(Sequence, Arc<Record>)>> {
        let head = self.ledger.head().await?;
        let mut scan = EntryScan::new(
            self.ledger.as_ref(),
            Sequence::GENESIS.successor(),
            head,
            self.config.page_size,
        );

        let mut records = Vec::new();
        while let Some(page) = scan.next_page().await? {
            for entry in page.into_iter().filter(|e| e.is_data_only()) {
                match self.arena.get(entry.sequence) {
                    Some(record) => records.push((entry.sequence, record)),
                    None => match RecordCodec::decode(&entry.payload) {
                        Ok(record) => records.push((entry.sequence, Arc::new(record))),
                        Err(err) => {
                            warn!(sequence = %entry.sequence, error = %err, "skipping undecodable entry");
                        }
                    },
                }
            }
        }
        Ok(records)
    }

    /// Capture all field indexes.
    pub fn snapshot(&self) -> IndexSnapshot {
        let fields = self.fields.read().expect("fields lock poisoned");
        let mut snapshot = IndexSnapshot::default();
        for (name, slot) in fields.iter() {
            let data = slot.data.read().expect("field lock poisoned");
            snapshot
                .fields
                .insert(name.clone(), FieldSnapshot::capture(&data));
        }
        snapshot
    }

    fn existing_slot(&self, key_field: &str) -> Option<Arc<FieldSlot>> {
        self.fields
            .read()
            .expect("fields lock poisoned")
            .get(key_field)
            .cloned()
    }

    fn slot(&self, key_field: &str) -> Arc<FieldSlot> {
        if let Some(slot) = self.existing_slot(key_field) {
            return slot;
        }
        self.fields
            .write()
            .expect("fields lock poisoned")
            .entry(key_field.to_string())
            .or_insert_with(|| Arc::new(FieldSlot::new(FieldIndex::new(key_field))))
            .clone()
    }

    #[instrument(skip(self, cancel), level = "debug")]
    async fn advance_inner(
        &self,
        key_field: &str,
        head: Sequence,
        cancel: Option<&watch::Receiver<bool>>,
        reset: bool,
    ) -> IndexResult<AdvanceReport> {
        let slot = self.slot(key_field);
        let _scan = slot.scan.lock().await;

        let mut rebuilt = reset;
        if reset {
            slot.data.write().expect("field lock poisoned").reset();
            info!(%key_field, "field index reset for rebuild");
        }

        let mut cursor = slot.cursor();
        if cursor > head {
            // Either another reader already scanned past our snapshot, or the
            // cursor is ahead of anything the ledger has ever held.
            let current = self.ledger.head().await?;
            if cursor <= current {
                return Ok(AdvanceReport::new(key_field, cursor));
            }
            let err = IndexError::CursorCorruption {
                key_field: key_field.to_string(),
                cursor,
                head: current,
                reason: "cursor is beyond the ledger head".into(),
            };
            warn!(error = %err, "rebuilding field index");
            slot.data.write().expect("field lock poisoned").reset();
            cursor = Sequence::GENESIS;
            rebuilt = true;
        }

        let mut report = AdvanceReport::new(key_field, cursor);
        report.rebuilt = rebuilt;
        if cursor >= head {
            return Ok(report);
        }

        let mut scan = EntryScan::new(
            self.ledger.as_ref(),
            cursor.successor(),
            head,
            self.config.page_size,
        );

        while let Some(page) = scan.next_page().await? {
            if let Some(cancel) = cancel {
                if *cancel.borrow() {
                    info!(%key_field, committed = %report.to, "scan cancelled");
                    return Err(IndexError::Cancelled {
                        key_field: key_field.to_string(),
                        committed: report.to,
                    });
                }
            }

            let mut matches = Vec::new();
            let mut through = report.to;
            for entry in page {
                report.scanned += 1;
                through = entry.sequence;
                if !entry.is_data_only() {
                    continue;
                }
                let record = match RecordCodec::decode(&entry.payload) {
                    Ok(record) => record,
                    Err(err) => {
                        report.skipped += 1;
                        warn!(
                            %key_field,
                            sequence = %entry.sequence,
                            digest = %entry.short_digest(),
                            error = %err,
                            "skipping undecodable entry"
                        );
                        continue;
                    }
                };
                if let Some(key) = record.key_value(key_field) {
                    matches.push((key.to_string(), entry.sequence));
                    self.arena.insert(entry.sequence, Arc::new(record));
                }
            }

            let added = slot
                .data
                .write()
                .expect("field lock poisoned")
                .commit(matches, through);
            report.indexed += added as u64;
            report.to = through;
            debug!(%key_field, through = %through, added, "page committed");
        }

        // Nothing at or below `head` remains unscanned.
        slot.data
            .write()
            .expect("field lock poisoned")
            .commit(Vec::new(), head);
        report.to = head;

        info!(
            %key_field,
            from = %report.from,
            to = %report.to,
            scanned = report.scanned,
            indexed = report.indexed,
            skipped = report.skipped,
            rebuilt = report.rebuilt,
            "field index advanced"
        );

        self.persist();
        Ok(report)
    }

    /// Resolve a bucket sequence to its record, fetching from the ledger on
    /// an arena miss.
    async fn resolve(&self, sequence: Sequence) -> IndexResult<Arc<Record>> {
        if let Some(record) = self.arena.get(sequence) {
            return Ok(record);
        }
        let entry = self
            .ledger
            .entry(sequence)
            .await?
            .ok_or(IndexError::MissingEntry(sequence))?;
        let record = RecordCodec::decode(&entry.payload)
            .map_err(|source| IndexError::Undecodable { sequence, source })?;
        Ok(self.arena.insert(sequence, Arc::new(record)))
    }

    fn persist(&self) {
        let Some(store) = &self.snapshots else {
            return;
        };
        if let Err(err) = store.save(&self.snapshot()) {
            warn!(error = %err, "failed to save index snapshot");
        }
    }
}

#[cfg(test)]
mod tests {
    use vrl_ledger::InMemoryLedger;
    use vrl_types::Identity;

    use super::*;
    use crate::snapshot::InMemorySnapshotStore;

    fn writer() -> Identity {
        Identity::derive("index-writer")
    }

    fn put(ledger: &InMemoryLedger, record: Record) -> Sequence {
        ledger.submit_raw(writer(), None, RecordCodec::encode(&record))
    }

    fn car(vin: &str, make: &str) -> Record {
        Record::new().with("vin", vin).with("vehicle_make", make)
    }

    fn setup() -> (Arc<InMemoryLedger>, ReplayIndex) {
        let ledger = Arc::new(InMemoryLedger::new());
        let index = ReplayIndex::new(ledger.clone(), IndexConfig { page_size: 2 });
        (ledger, index)
    }

    #[tokio::test]
    async fn latest_and_history_follow_ledger_order() {
        let (ledger, index) = setup();
        let s1 = put(&ledger, car("V1", "Toyota"));
        put(&ledger, car("V2", "Ford"));
        let s3 = put(&ledger, car("V1", "Honda"));

        let (seq, record) = index.latest("vin", "V1").await.unwrap().unwrap();
        assert_eq!(seq, s3);
        assert_eq!(record.field("vehicle_make"), Some(&serde_json::json!("Honda")));

        let history = index.history("vin", "V1").await.unwrap();
        let seqs: Vec<_> = history.iter().map(|(s, _)| *s).collect();
        assert_eq!(seqs, vec![s1, s3]);
        assert_eq!(history.last().map(|(_, r)| r.clone()), Some(record));

        assert!(index.latest("vin", "UNKNOWN").await.unwrap().is_none());
        assert!(index.history("vin", "UNKNOWN").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn advance_is_incremental_and_idempotent() {
        let (ledger, index) = setup();
        for i in 0..5 {
            put(&ledger, car(&format!("V{i}"), "Kia"));
        }
        let first = index.advance("vin").await.unwrap();
        assert_eq!(first.scanned, 5);
        assert_eq!(first.indexed, 5);

        let again = index.advance("vin").await.unwrap();
        assert!(again.is_noop());

        put(&ledger, car("V0", "Kia"));
        let third = index.advance("vin").await.unwrap();
        assert_eq!(third.scanned, 1);
        assert_eq!(third.from, first.to);
        assert_eq!(index.cursor("vin"), Some(ledger.head().await.unwrap()));
    }

    #[tokio::test]
    async fn malformed_payload_does_not_disturb_neighbours() {
        let (ledger, index) = setup();
        let s1 = put(&ledger, car("V1", "Toyota"));
        ledger.submit_raw(writer(), None, b"{\"vin\": \"V1\", trunc".to_vec());
        ledger.submit_raw(writer(), None, vec![0xff, 0x00, 0x12]);
        let s4 = put(&ledger, car("V1", "Honda"));

        let report = index.advance("vin").await.unwrap();
        assert_eq!(report.skipped, 2);
        let seqs: Vec<_> = index
            .history("vin", "V1")
            .await
            .unwrap()
            .into_iter()
            .map(|(s, _)| s)
            .collect();
        assert_eq!(seqs, vec![s1, s4]);
    }

    #[tokio::test]
    async fn transfers_and_non_string_keys_are_ignored() {
        let (ledger, index) = setup();
        ledger.submit_raw(
            writer(),
            Some(Identity::derive("bob")),
            RecordCodec::encode(&car("V1", "Transfer")),
        );
        put(&ledger, Record::new().with("vin", 17));
        let s3 = put(&ledger, car("V1", "Mazda"));

        let history = index.history("vin", "V1").await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].0, s3);
        assert_eq!(index.scan_all().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn fields_are_indexed_independently() {
        let (ledger, index) = setup();
        put(&ledger, car("V1", "Toyota").with("plate", "AB-123"));
        put(&ledger, car("V2", "Toyota"));

        index.advance("vin").await.unwrap();
        assert_eq!(index.fields(), vec!["vin".to_string()]);
        assert!(index.cursor("vehicle_make").is_none());

        let by_make = index.history("vehicle_make", "Toyota").await.unwrap();
        assert_eq!(by_make.len(), 2);
        let by_plate = index.latest("plate", "AB-123").await.unwrap().unwrap();
        assert_eq!(by_plate.1.key_value("vin"), Some("V1"));
        assert_eq!(index.fields().len(), 3);
    }

    #[tokio::test]
    async fn tombstones_are_returned_as_latest() {
        let (ledger, index) = setup();
        put(&ledger, car("V1", "Toyota"));
        put(&ledger, Record::tombstone("vin", "V1"));
        let (_, latest) = index.latest("vin", "V1").await.unwrap().unwrap();
        assert!(latest.is_tombstone());
        assert_eq!(index.history("vin", "V1").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn rebuild_produces_the_same_buckets() {
        let (ledger, index) = setup();
        for i in 0..4 {
            put(&ledger, car(&format!("V{}", i % 2), "Audi"));
        }
        index.advance("vin").await.unwrap();
        let before = index.snapshot();
        let report = index.rebuild("vin").await.unwrap();
        assert!(report.rebuilt);
        assert_eq!(report.from, Sequence::GENESIS);
        assert_eq!(index.snapshot(), before);
    }

    /// Raises the cancel flag as page number `cancel_on` is fetched, so the
    /// pages before it have already been committed.
    struct CancelOnPage {
        inner: Arc<InMemoryLedger>,
        cancel: watch::Sender<bool>,
        fetched: std::sync::atomic::AtomicUsize,
        cancel_on: usize,
    }

    #[async_trait::async_trait]
    impl Ledger for CancelOnPage {
        async fn append(&self, submission: vrl_ledger::Submission) -> vrl_ledger::LedgerResult<Sequence> {
            self.inner.append(submission).await
        }

        async fn iterate(
            &self,
            from: Sequence,
            limit: usize,
        ) -> vrl_ledger::LedgerResult<Vec<vrl_types::LedgerEntry>> {
            let page = self.fetched.fetch_add(1, std::sync::atomic::Ordering::SeqCst) + 1;
            if page == self.cancel_on {
                self.cancel.send_replace(true);
            }
            self.inner.iterate(from, limit).await
        }

        async fn head(&self) -> vrl_ledger::LedgerResult<Sequence> {
            self.inner.head().await
        }

        async fn next_nonce(&self, sender: &Identity) -> vrl_ledger::LedgerResult<u64> {
            self.inner.next_nonce(sender).await
        }
    }

    #[tokio::test]
    async fn cancelled_scan_keeps_committed_pages_and_resumes() {
        let inner = Arc::new(InMemoryLedger::new());
        let (tx, rx) = watch::channel(false);
        let ledger = Arc::new(CancelOnPage {
            inner: inner.clone(),
            cancel: tx,
            fetched: std::sync::atomic::AtomicUsize::new(0),
            cancel_on: 3,
        });
        let index = ReplayIndex::new(ledger.clone(), IndexConfig { page_size: 2 });
        let seqs: Vec<Sequence> = ["V0", "V1", "V0", "V1", "V2", "V1", "V3"]
            .iter()
            .map(|vin| put(&inner, car(vin, "Seat")))
            .collect();

        // Pages [0,1] and [2,3] commit; the flag is up when the third arrives.
        let err = index.advance_until_cancelled("vin", &rx).await.unwrap_err();
        assert!(matches!(
            err,
            IndexError::Cancelled { committed, .. } if committed == seqs[3]
        ));
        assert_eq!(index.cursor("vin"), Some(seqs[3]));

        ledger.cancel.send_replace(false);
        let report = index.advance_until_cancelled("vin", &rx).await.unwrap();
        assert_eq!(report.from, seqs[3]);
        assert_eq!(report.scanned, 3);
        assert_eq!(report.indexed, 3);
        assert_eq!(index.cursor("vin"), Some(seqs[6]));

        for (vin, expected) in [("V1", vec![seqs[1], seqs[3], seqs[5]]), ("V0", vec![seqs[0], seqs[2]])] {
            let history: Vec<Sequence> = index
                .history("vin", vin)
                .await
                .unwrap()
                .into_iter()
                .map(|(s, _)| s)
                .collect();
            assert_eq!(history, expected);
        }
    }

    #[tokio::test]
    async fn concurrent_readers_do_not_duplicate_entries() {
        let ledger = Arc::new(InMemoryLedger::new());
        let index = Arc::new(ReplayIndex::new(ledger.clone(), IndexConfig { page_size: 3 }));
        for _ in 0..20 {
            put(&ledger, car("V1", "Volvo"));
        }

        let mut handles = Vec::new();
        for _ in 0..8 {
            let index = index.clone();
            handles.push(tokio::spawn(async move { index.history("vin", "V1").await }));
        }
        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap().len(), 20);
        }
        assert_eq!(index.history("vin", "V1").await.unwrap().len(), 20);
    }

    /// Reports a stale head exactly once, as if an append landed between the
    /// reader's head snapshot and its bucket lookup.
    struct StaleHeadOnce {
        inner: Arc<InMemoryLedger>,
        stale: std::sync::Mutex<Option<Sequence>>,
    }

    #[async_trait::async_trait]
    impl Ledger for StaleHeadOnce {
        async fn append(&self, submission: vrl_ledger::Submission) -> vrl_ledger::LedgerResult<Sequence> {
            self.inner.append(submission).await
        }

        async fn iterate(
            &self,
            from: Sequence,
            limit: usize,
        ) -> vrl_ledger::LedgerResult<Vec<vrl_types::LedgerEntry>> {
            self.inner.iterate(from, limit).await
        }

        async fn head(&self) -> vrl_ledger::LedgerResult<Sequence> {
            if let Some(stale) = self.stale.lock().unwrap().take() {
                return Ok(stale);
            }
            self.inner.head().await
        }

        async fn next_nonce(&self, sender: &Identity) -> vrl_ledger::LedgerResult<u64> {
            self.inner.next_nonce(sender).await
        }
    }

    #[tokio::test]
    async fn reads_are_bounded_by_their_head_snapshot() {
        let inner = Arc::new(InMemoryLedger::new());
        let ledger = Arc::new(StaleHeadOnce {
            inner: inner.clone(),
            stale: std::sync::Mutex::new(None),
        });
        let index = ReplayIndex::new(ledger.clone(), IndexConfig::default());
        let s1 = put(&inner, car("V1", "Fiat"));
        let s2 = put(&inner, car("V1", "Opel"));
        index.advance("vin").await.unwrap();

        *ledger.stale.lock().unwrap() = Some(s1);
        let history = index.history("vin", "V1").await.unwrap();
        assert_eq!(history.iter().map(|(s, _)| *s).collect::<Vec<_>>(), vec![s1]);
        // The cursor ahead of the stale head is not mistaken for corruption.
        assert_eq!(index.cursor("vin"), Some(s2));

        let (seq, _) = index.latest("vin", "V1").await.unwrap().unwrap();
        assert_eq!(seq, s2);
    }

    #[tokio::test]
    async fn snapshot_restores_without_rescanning() {
        let ledger = Arc::new(InMemoryLedger::new());
        let store = Arc::new(InMemorySnapshotStore::new());
        put(&ledger, car("V1", "Toyota"));
        put(&ledger, car("V1", "Honda"));
        {
            let index = ReplayIndex::open(ledger.clone(), IndexConfig::default(), store.clone())
                .await
                .unwrap();
            index.advance("vin").await.unwrap();
        }

        let index = ReplayIndex::open(ledger.clone(), IndexConfig::default(), store.clone())
            .await
            .unwrap();
        assert_eq!(index.cursor("vin"), Some(ledger.head().await.unwrap()));
        assert!(index.advance("vin").await.unwrap().is_noop());
        let (_, latest) = index.latest("vin", "V1").await.unwrap().unwrap();
        assert_eq!(latest.field("vehicle_make"), Some(&serde_json::json!("Honda")));
    }

    #[tokio::test]
    async fn corrupt_snapshot_triggers_rebuild() {
        let ledger = Arc::new(InMemoryLedger::new());
        let store = Arc::new(InMemorySnapshotStore::new());
        let s1 = put(&ledger, car("V1", "Toyota"));

        let mut bogus = IndexSnapshot::default();
        bogus.fields.insert(
            "vin".into(),
            FieldSnapshot {
                cursor: Sequence::new(99, 0),
                buckets: Default::default(),
            },
        );
        store.save(&bogus).unwrap();

        let index = ReplayIndex::open(ledger.clone(), IndexConfig::default(), store.clone())
            .await
            .unwrap();
        assert_eq!(index.cursor("vin"), Some(s1));
        assert_eq!(index.history("vin", "V1").await.unwrap().len(), 1);
        let saved = store.load().unwrap().unwrap();
        assert_eq!(saved.fields["vin"].cursor, s1);
    }

    #[tokio::test]
    async fn unavailable_ledger_leaves_index_untouched() {
        let (ledger, index) = setup();
        put(&ledger, car("V1", "Toyota"));
        index.advance("vin").await.unwrap();
        let before = index.snapshot();

        put(&ledger, car("V1", "Honda"));
        ledger.set_available(false);
        let err = index.latest("vin", "V1").await.unwrap_err();
        assert!(matches!(err, IndexError::Ledger(ref e) if e.is_unavailable()));
        assert_eq!(index.snapshot(), before);
    }
}
