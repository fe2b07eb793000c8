use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use vrl_types::{Identity, LedgerEntry, Sequence};

use crate::error::{LedgerError, LedgerResult};
use crate::state::ChainState;
use crate::traits::{Ledger, Submission};

/// Header size: 4 bytes length + 4 bytes CRC.
const HEADER_SIZE: usize = 8;

/// Flush/sync strategy for appended entries.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncMode {
    /// `fsync` after every entry (safest, highest latency).
    EveryWrite,
    /// Flush to the OS page cache only.
    #[default]
    OsDefault,
}

/// Configuration for a [`FileLedger`].
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct FileLedgerConfig {
    /// Entries packed into one block before the height advances.
    pub entries_per_block: u32,
    pub sync_mode: SyncMode,
}

impl Default for FileLedgerConfig {
    fn default() -> Self {
        Self {
            entries_per_block: 1,
            sync_mode: SyncMode::default(),
        }
    }
}

/// Durable byte sink a [`FileLedger`] appends frames to.
trait FrameSink: Write + Send {
    fn sync(&self) -> io::Result<()>;
}

impl FrameSink for File {
    fn sync(&self) -> io::Result<()> {
        self.sync_data()
    }
}

struct FileInner {
    writer: BufWriter<Box<dyn FrameSink>>,
    /// Byte length of the last complete frame.
    offset: u64,
    state: ChainState,
}

/// Append-only ledger persisted to a single file.
///
/// On-disk format, one frame per entry:
/// ```text
/// [4 bytes: frame length (little-endian u32)]
/// [4 bytes: CRC32 of payload (little-endian u32)]
/// [N bytes: bincode-serialized LedgerEntry]
/// ```
/// On open, a torn final frame (a crash mid-append) is truncated away. A CRC
/// mismatch anywhere else is reported as corruption: entries are immutable,
/// so silently skipping one would leave a hole in the sequence.
pub struct FileLedger {
    path: PathBuf,
    inner: Mutex<FileInner>,
    config: FileLedgerConfig,
}

impl FileLedger {
    /// Open (or create) a ledger file and load its entries.
    pub fn open(path: &Path, config: FileLedgerConfig) -> LedgerResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(path)?;

        let file_len = file.metadata()?.len();
        let (entries, valid_len) = recover(path, file_len)?;
        if valid_len < file_len {
            warn!(
                path = %path.display(),
                valid_len,
                file_len,
                "truncating torn tail of ledger file"
            );
            file.set_len(valid_len)?;
        }

        let mut state = ChainState::new(config.entries_per_block);
        for entry in entries {
            state.push(entry);
        }

        let sink: Box<dyn FrameSink> = Box::new(file);
        info!(path = %path.display(), entries = state.len(), head = %state.head(), "ledger file opened");

        Ok(Self {
            path: path.to_path_buf(),
            inner: Mutex::new(FileInner {
                writer: BufWriter::new(sink),
                offset: valid_len,
                state,
            }),
            config,
        })
    }

    /// Path to the ledger file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of included entries.
    pub fn len(&self) -> usize {
        self.inner.lock().expect("ledger mutex poisoned").state.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn write_frame(&self, inner: &mut FileInner, entry: &LedgerEntry) -> LedgerResult<()> {
        let payload =
            bincode::serialize(entry).map_err(|e| LedgerError::Serialization(e.to_string()))?;
        let length = frame_length(payload.len())?;
        let crc = crc32fast::hash(&payload);

        let written = (|| {
            inner.writer.write_all(&length.to_le_bytes())?;
            inner.writer.write_all(&crc.to_le_bytes())?;
            inner.writer.write_all(&payload)?;
            inner.writer.flush()?;
            if self.config.sync_mode == SyncMode::EveryWrite {
                inner.writer.get_ref().sync()?;
            }
            Ok::<_, io::Error>(())
        })();

        if let Err(e) = written {
            warn!(offset = inner.offset, error = %e, "append failed; discarding partial frame");
            self.rollback(inner)?;
            return Err(e.into());
        }

        inner.offset += HEADER_SIZE as u64 + payload.len() as u64;
        Ok(())
    }

    /// Cut the file back to the last complete frame and start a fresh
    /// writer. The old writer's buffer is dropped unflushed.
    fn rollback(&self, inner: &mut FileInner) -> LedgerResult<()> {
        let file = OpenOptions::new().read(true).append(true).open(&self.path)?;
        file.set_len(inner.offset)?;
        let sink: Box<dyn FrameSink> = Box::new(file);
        let stale = std::mem::replace(&mut inner.writer, BufWriter::new(sink));
        let (_, _discarded) = stale.into_parts();
        Ok(())
    }
}

/// Frame lengths are stored as `u32`; larger entries cannot be framed.
fn frame_length(len: usize) -> LedgerResult<u32> {
    u32::try_from(len).map_err(|_| {
        LedgerError::Serialization(format!("entry of {len} bytes exceeds the {} byte frame limit", u32::MAX))
    })
}

/// Read every complete frame. Returns the entries and the byte length of
/// the valid prefix.
fn recover(path: &Path, file_len: u64) -> LedgerResult<(Vec<LedgerEntry>, u64)> {
    let mut file = BufReader::new(File::open(path)?);
    let mut entries = Vec::new();
    let mut offset: u64 = 0;

    while offset + HEADER_SIZE as u64 <= file_len {
        let mut header = [0u8; HEADER_SIZE];
        match file.read_exact(&mut header) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => break,
            Err(e) => return Err(e.into()),
        }

        let length = u32::from_le_bytes([header[0], header[1], header[2], header[3]]);
        let expected_crc = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);
        let frame_end = offset + HEADER_SIZE as u64 + length as u64;

        if length == 0 || frame_end > file_len {
            // Torn final write.
            break;
        }

        let mut payload = vec![0u8; length as usize];
        file.read_exact(&mut payload)?;

        let actual_crc = crc32fast::hash(&payload);
        if actual_crc != expected_crc {
            if frame_end == file_len {
                warn!(offset, "CRC mismatch on final frame; treating as torn write");
                break;
            }
            return Err(LedgerError::Corrupt {
                offset,
                reason: format!("crc mismatch: expected {expected_crc:#010x}, got {actual_crc:#010x}"),
            });
        }

        let entry: LedgerEntry = bincode::deserialize(&payload).map_err(|e| LedgerError::Corrupt {
            offset,
            reason: e.to_string(),
        })?;

        if let Some(last) = entries.last().map(|e: &LedgerEntry| e.sequence) {
            if entry.sequence <= last {
                return Err(LedgerError::Corrupt {
                    offset,
                    reason: format!("sequence {} does not follow {last}", entry.sequence),
                });
            }
        }

        entries.push(entry);
        offset = frame_end;
    }

    debug!(recovered = entries.len(), valid_len = offset, "ledger recovery complete");
    Ok((entries, offset))
}

#[async_trait]
impl Ledger for FileLedger {
    async fn append(&self, submission: Submission) -> LedgerResult<Sequence> {
        let mut inner = self.inner.lock().expect("ledger mutex poisoned");
        inner.state.check(&submission)?;
        let entry = inner
            .state
            .prepare(submission.sender, None, submission.payload);
        self.write_frame(&mut inner, &entry)?;
        let sequence = entry.sequence;
        inner.state.push(entry);

        debug!(submission = %submission.id, %sequence, offset = inner.offset, "entry appended to ledger file");
        Ok(sequence)
    }

    async fn iterate(&self, from: Sequence, limit: usize) -> LedgerResult<Vec<LedgerEntry>> {
        Ok(self
            .inner
            .lock()
            .expect("ledger mutex poisoned")
            .state
            .range(from, limit))
    }

    async fn head(&self) -> LedgerResult<Sequence> {
        Ok(self.inner.lock().expect("ledger mutex poisoned").state.head())
    }

    async fn next_nonce(&self, sender: &Identity) -> LedgerResult<u64> {
        Ok(self
            .inner
            .lock()
            .expect("ledger mutex poisoned")
            .state
            .next_nonce(sender))
    }
}
