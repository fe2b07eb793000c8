use std::fmt;
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;
use vrl_ledger::{Ledger, LedgerError, Submission};
use vrl_types::{Identity, Sequence};

use crate::config::{RetryConfig, WriterConfig};
use crate::error::{WriteError, WriteResult};
use crate::retry::compute_backoff;

/// Lifecycle of a single queued write.
///
/// `Queued -> Submitted -> Included`, or `Submitted -> Rejected` followed by
/// a fresh `Submitted` while the retry budget lasts, ending in `Failed`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SubmissionState {
    Queued,
    Submitted { attempt: u32, nonce: u64 },
    Rejected { attempt: u32 },
    Included(Sequence),
    Failed,
}

impl SubmissionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Included(_) | Self::Failed)
    }
}

impl fmt::Display for SubmissionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Queued => write!(f, "queued"),
            Self::Submitted { attempt, nonce } => {
                write!(f, "submitted (attempt {attempt}, nonce {nonce})")
            }
            Self::Rejected { attempt } => write!(f, "rejected (attempt {attempt})"),
            Self::Included(sequence) => write!(f, "included at {sequence}"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Result of an included write.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WriteReceipt {
    /// Id of the queued write, shared by all of its attempts.
    pub id: Uuid,
    pub sequence: Sequence,
    /// Submissions made, including the successful one.
    pub attempts: u32,
}

struct WriteRequest {
    id: Uuid,
    payload: Vec<u8>,
    reply: oneshot::Sender<WriteResult<WriteReceipt>>,
}

/// FIFO write queue for one submitting identity.
///
/// Cloning yields another handle to the same queue. The background worker
/// stops once every handle is dropped and the queue has drained. A caller
/// that stops waiting does not withdraw its write.
#[derive(Clone)]
pub struct WriteSerializer {
    identity: Identity,
    queue: mpsc::Sender<WriteRequest>,
}

impl WriteSerializer {
    /// Spawn the worker for `identity` on the current tokio runtime.
    pub fn spawn(ledger: Arc<dyn Ledger>, identity: Identity, config: WriterConfig) -> Self {
        let (queue, requests) = mpsc::channel(config.queue_depth.max(1));
        let worker = Worker {
            ledger,
            identity,
            retry: config.retry,
        };
        tokio::spawn(worker.run(requests));
        info!(identity = %identity.short_id(), "write serializer started");
        Self { identity, queue }
    }

    pub fn identity(&self) -> Identity {
        self.identity
    }

    /// Queue `payload` and wait until it is included or fails.
    pub async fn submit(&self, payload: Vec<u8>) -> WriteResult<Sequence> {
        self.submit_tracked(payload).await.map(|r| r.sequence)
    }

    /// Like [`Self::submit`], returning the full receipt.
    #[instrument(
        skip(self, payload),
        fields(identity = %self.identity.short_id(), bytes = payload.len()),
    )]
    pub async fn submit_tracked(&self, payload: Vec<u8>) -> WriteResult<WriteReceipt> {
        let id = Uuid::now_v7();
        let (reply, outcome) = oneshot::channel();
        self.queue
            .send(WriteRequest { id, payload, reply })
            .await
            .map_err(|_| WriteError::Shutdown)?;
        debug!(write = %id, state = %SubmissionState::Queued, "write queued");

        outcome.await.map_err(|_| WriteError::Shutdown)?
    }
}

impl fmt::Debug for WriteSerializer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WriteSerializer")
            .field("identity", &self.identity)
            .field("closed", &self.queue.is_closed())
            .finish()
    }
}

struct Worker {
    ledger: Arc<dyn Ledger>,
    identity: Identity,
    retry: RetryConfig,
}

impl Worker {
    async fn run(self, mut requests: mpsc::Receiver<WriteRequest>) {
        while let Some(request) = requests.recv().await {
            let outcome = self.process(request.id, request.payload).await;
            if request.reply.send(outcome).is_err() {
                debug!(write = %request.id, "caller stopped waiting for write outcome");
            }
        }
        info!(identity = %self.identity.short_id(), "write serializer stopped");
    }

    /// Drive one write to a terminal state. Only this task submits for
    /// `identity`, so each fresh nonce is taken right before its attempt.
    async fn process(&self, id: Uuid, payload: Vec<u8>) -> WriteResult<WriteReceipt> {
        let max_attempts = self.retry.max_attempts();
        let mut last_conflict: Option<LedgerError> = None;

        for attempt in 1..=max_attempts {
            let nonce = self.ledger.next_nonce(&self.identity).await?;
            let state = SubmissionState::Submitted { attempt, nonce };
            debug!(write = %id, %state, "submitting");

            let submission = Submission::new(self.identity, nonce, payload.clone());
            match self.ledger.append(submission).await {
                Ok(sequence) => {
                    let state = SubmissionState::Included(sequence);
                    debug!(write = %id, %state, "write included");
                    return Ok(WriteReceipt {
                        id,
                        sequence,
                        attempts: attempt,
                    });
                }
                Err(err) if err.is_conflict() => {
                    let state = SubmissionState::Rejected { attempt };
                    warn!(write = %id, %state, error = %err, "submission rejected");
                    last_conflict = Some(err);
                    if attempt < max_attempts {
                        let delay = compute_backoff(&self.retry, attempt - 1);
                        debug!(write = %id, delay_ms = delay.as_millis() as u64, "retrying after backoff");
                        tokio::time::sleep(delay).await;
                    }
                }
                Err(err) => {
                    warn!(write = %id, state = %SubmissionState::Failed, error = %err, "write failed");
                    return Err(err.into());
                }
            }
        }

        warn!(write = %id, state = %SubmissionState::Failed, attempts = max_attempts, "retry budget exhausted");
        Err(WriteError::Conflict {
            attempts: max_attempts,
            last: last_conflict.unwrap_or_else(|| {
                LedgerError::Rejected("no attempt was made".into())
            }),
        })
    }
}
