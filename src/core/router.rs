use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;
use vibe_core::core::events::{EventEmitter, ProgressEvent};
use vibe_core::models::job::JobId;

use crate::core::backend::MediaFetchHandle;
use crate::core::queue::BatchSlot;
use crate::core::single::SingleSlot;

/// Terminal outcome of one batch item: the output path on success, the
/// error text on failure.
pub type ItemOutcome = Result<Option<PathBuf>, String>;

/// Identifies the consumer a transfer was started for. Events are only
/// delivered while that consumer still owns the stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamOwner {
    Batch(JobId),
    Interactive(JobId),
}

struct BatchClaim {
    job_id: JobId,
    index: usize,
    completion: Option<oneshot::Sender<ItemOutcome>>,
}

/// Decides, per event, whether the shared progress stream belongs to the
/// batch item that currently holds a claim or to the interactive download.
pub struct ProgressRouter {
    claim: Mutex<Option<BatchClaim>>,
    batch: Arc<BatchSlot>,
    single: Arc<SingleSlot>,
    emitter: Arc<dyn EventEmitter>,
}

impl ProgressRouter {
    pub fn new(batch: Arc<BatchSlot>, single: Arc<SingleSlot>, emitter: Arc<dyn EventEmitter>) -> Self {
        Self {
            claim: Mutex::new(None),
            batch,
            single,
            emitter,
        }
    }

    /// Registers the batch item as owner of the stream. Returns `None` if
    /// another item still holds the claim.
    pub async fn claim_batch(&self, job_id: JobId, index: usize) -> Option<oneshot::Receiver<ItemOutcome>> {
        let mut claim = self.claim.lock().await;
        if let Some(existing) = claim.as_ref() {
            tracing::warn!(
                "Batch item {} asked for the progress stream while item {} holds it",
                index,
                existing.index
            );
            return None;
        }

        let (tx, rx) = oneshot::channel();
        *claim = Some(BatchClaim {
            job_id,
            index,
            completion: Some(tx),
        });
        Some(rx)
    }

    pub async fn release_batch(&self, job_id: JobId) {
        let mut claim = self.claim.lock().await;
        if claim.as_ref().is_some_and(|c| c.job_id == job_id) {
            *claim = None;
        }
    }

    pub async fn batch_claimed(&self) -> bool {
        self.claim.lock().await.is_some()
    }

    /// True while the batch engine owns, or is about to own, the stream.
    pub async fn batch_engaged(&self) -> bool {
        if self.batch_claimed().await {
            return true;
        }
        self.batch.state.lock().await.advancing
    }

    pub async fn dispatch(&self, owner: StreamOwner, event: ProgressEvent) {
        let job_id = match owner {
            StreamOwner::Interactive(job_id) => {
                if let Some(info) = self.single.apply_event(job_id, event).await {
                    self.emitter.emit_single_state(&info);
                }
                return;
            }
            StreamOwner::Batch(job_id) => job_id,
        };

        let mut claim = self.claim.lock().await;
        let Some(active) = claim.as_mut().filter(|c| c.job_id == job_id) else {
            tracing::debug!(
                "Dropping {:?} event from batch transfer {} that no longer owns the stream",
                event.kind(),
                job_id
            );
            return;
        };

        match event {
            ProgressEvent::Progress(progress) => {
                let mut queue = self.batch.state.lock().await;
                if queue.apply_progress(active.job_id, &progress) {
                    self.emitter.emit_queue_state(&queue.snapshot());
                }
            }
            ProgressEvent::StatusText { message } => {
                let mut queue = self.batch.state.lock().await;
                if queue.apply_status_text(active.job_id, message) {
                    self.emitter.emit_queue_state(&queue.snapshot());
                }
            }
            ProgressEvent::Error { message } => match active.completion.take() {
                Some(tx) => {
                    let _ = tx.send(Err(message));
                }
                None => tracing::debug!(
                    "Ignoring error for batch item {} after its outcome was settled: {}",
                    active.index,
                    message
                ),
            },
            ProgressEvent::Completed { result_path } => match active.completion.take() {
                Some(tx) => {
                    let _ = tx.send(Ok(result_path));
                }
                None => tracing::debug!(
                    "Ignoring completion for batch item {} after its outcome was settled",
                    active.index
                ),
            },
        }
    }

    /// Pumps one transfer's events through `dispatch`. Only the first
    /// terminal event is forwarded; anything after it is dropped.
    pub fn attach(self: &Arc<Self>, owner: StreamOwner, mut handle: MediaFetchHandle) -> JoinHandle<()> {
        let router = Arc::clone(self);
        tokio::spawn(async move {
            let mut settled = false;
            while let Some(event) = handle.next_event().await {
                if settled {
                    tracing::debug!("Dropping {:?} event after terminal outcome", event.kind());
                    continue;
                }
                settled = event.is_terminal();
                router.dispatch(owner, event).await;
            }

            if !settled {
                router
                    .dispatch(owner, ProgressEvent::error("Transfer ended without a result"))
                    .await;
            }
        })
    }
}
