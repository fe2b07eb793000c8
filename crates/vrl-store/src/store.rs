use std::sync::Arc;

use tracing::{debug, info, instrument};
use vrl_index::{AdvanceReport, ReplayIndex, SnapshotStore};
use vrl_ledger::Ledger;
use vrl_types::{Identity, Record, RecordCodec, Sequence};
use vrl_writer::{WriteSerializer, WriterPool};

use crate::config::StoreConfig;
use crate::error::{StoreError, StoreResult};

/// A record together with the ledger position it was read from.
#[derive(Clone, Debug, PartialEq)]
pub struct StoredRecord {
    pub sequence: Sequence,
    pub record: Arc<Record>,
}

impl StoredRecord {
    fn from_pair((sequence, record): (Sequence, Arc<Record>)) -> Self {
        Self { sequence, record }
    }

    pub fn is_tombstone(&self) -> bool {
        self.record.is_tombstone()
    }
}

/// Keyed record storage over an append-only ledger.
pub struct RecordStore {
    ledger: Arc<dyn Ledger>,
    index: ReplayIndex,
    writers: WriterPool,
    identity: Identity,
}

impl RecordStore {
    /// A store whose index lives only in memory. Must be called within a
    /// tokio runtime.
    pub fn new(ledger: Arc<dyn Ledger>, config: StoreConfig) -> StoreResult<Self> {
        let identity = config.resolve_identity()?;
        let index = ReplayIndex::new(ledger.clone(), config.index_config());
        Ok(Self::assemble(ledger, index, identity, &config))
    }

    /// A store that restores its index from `snapshots` and saves it back
    /// after every advance.
    pub async fn open(
        ledger: Arc<dyn Ledger>,
        config: StoreConfig,
        snapshots: Arc<dyn SnapshotStore>,
    ) -> StoreResult<Self> {
        let identity = config.resolve_identity()?;
        let index = ReplayIndex::open(ledger.clone(), config.index_config(), snapshots).await?;
        info!(identity = %identity, fields = ?index.fields(), "record store opened");
        Ok(Self::assemble(ledger, index, identity, &config))
    }

    fn assemble(
        ledger: Arc<dyn Ledger>,
        index: ReplayIndex,
        identity: Identity,
        config: &StoreConfig,
    ) -> Self {
        let writers = WriterPool::new(ledger.clone(), config.writer_config());
        writers.writer(identity);
        Self {
            ledger,
            index,
            writers,
            identity,
        }
    }

    /// The default submitting identity.
    pub fn identity(&self) -> Identity {
        self.identity
    }

    /// The serializer for the default identity.
    pub fn writer(&self) -> WriteSerializer {
        self.writers.writer(self.identity)
    }

    /// The serializer for another identity, spawned on first use.
    pub fn writer_for(&self, identity: Identity) -> WriteSerializer {
        self.writers.writer(identity)
    }

    pub fn index(&self) -> &ReplayIndex {
        &self.index
    }

    pub async fn head(&self) -> StoreResult<Sequence> {
        Ok(self.ledger.head().await?)
    }

    /// Append `record` as the default identity.
    pub async fn append(&self, record: &Record) -> StoreResult<Sequence> {
        self.append_with(&self.writer(), record).await
    }

    /// Append `record` through an explicit serializer.
    #[instrument(skip(self, writer, record), fields(identity = %writer.identity().short_id()))]
    pub async fn append_with(
        &self,
        writer: &WriteSerializer,
        record: &Record,
    ) -> StoreResult<Sequence> {
        if record.is_empty() {
            return Err(StoreError::Submission("record has no fields".into()));
        }
        let payload = RecordCodec::encode(record);
        let sequence = writer.submit(payload).await?;
        debug!(%sequence, tombstone = record.is_tombstone(), "record appended");
        Ok(sequence)
    }

    /// The newest record whose `key_field` equals `key`. Tombstones are
    /// returned like any other record.
    #[instrument(skip(self))]
    pub async fn latest(&self, key_field: &str, key: &str) -> StoreResult<StoredRecord> {
        self.index
            .latest(key_field, key)
            .await?
            .map(StoredRecord::from_pair)
            .ok_or_else(|| not_found(key_field, key))
    }

    /// Every record whose `key_field` equals `key`, oldest first.
    #[instrument(skip(self))]
    pub async fn history(&self, key_field: &str, key: &str) -> StoreResult<Vec<StoredRecord>> {
        let history = self.index.history(key_field, key).await?;
        if history.is_empty() {
            return Err(not_found(key_field, key));
        }
        Ok(history.into_iter().map(StoredRecord::from_pair).collect())
    }

    /// Append a tombstone `{key_field: key, deleted: true}`. Earlier entries
    /// are left untouched.
    pub async fn delete(&self, key_field: &str, key: &str) -> StoreResult<Sequence> {
        self.delete_with(&self.writer(), key_field, key).await
    }

    pub async fn delete_with(
        &self,
        writer: &WriteSerializer,
        key_field: &str,
        key: &str,
    ) -> StoreResult<Sequence> {
        if key_field.is_empty() || key.is_empty() {
            return Err(StoreError::Submission(
                "delete needs a key field and a key".into(),
            ));
        }
        let sequence = self
            .append_with(writer, &Record::tombstone(key_field, key))
            .await?;
        info!(%key_field, %key, %sequence, "tombstone appended");
        Ok(sequence)
    }

    /// Every decodable data-only record on the ledger, oldest first.
    #[instrument(skip(self))]
    pub async fn get_all(&self) -> StoreResult<Vec<StoredRecord>> {
        let records = self.index.scan_all().await?;
        Ok(records.into_iter().map(StoredRecord::from_pair).collect())
    }

    /// Bring the index for `key_field` up to the ledger head.
    pub async fn advance(&self, key_field: &str) -> StoreResult<AdvanceReport> {
        Ok(self.index.advance(key_field).await?)
    }

    /// Discard and rescan the index for `key_field`.
    pub async fn rebuild(&self, key_field: &str) -> StoreResult<AdvanceReport> {
        Ok(self.index.rebuild(key_field).await?)
    }

    /// Field names indexed so far.
    pub fn indexed_fields(&self) -> Vec<String> {
        self.index.fields()
    }
}

fn not_found(key_field: &str, key: &str) -> StoreError {
    StoreError::NotFound {
        key_field: key_field.to_string(),
        key: key.to_string(),
    }
}
