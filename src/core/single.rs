use std::path::PathBuf;
use std::sync::Arc;

use anyhow::anyhow;
use tokio::sync::{Mutex, Notify};
use tokio_util::sync::CancellationToken;
use vibe_core::core::events::{EventEmitter, ProgressEvent, SingleDownloadInfo};
use vibe_core::models::job::{JobDescriptor, JobId};

use crate::core::backend::{self, MediaBackend, MetadataError};
use crate::core::process;
use crate::core::queue::QueueConfig;
use crate::core::router::{ProgressRouter, StreamOwner};
use crate::models::media::MetadataResult;

#[derive(Debug, thiserror::Error)]
pub enum ControllerError {
    #[error("A download is already in progress")]
    Busy,
    #[error("A batch is running; wait for it to finish or pause it")]
    BatchActive,
    #[error("Failed to start download: {0}")]
    Launch(String),
}

#[derive(Debug, Default)]
pub struct SingleDownload {
    pub busy: bool,
    pub job: Option<JobDescriptor>,
    pub percent: f64,
    pub speed: Option<String>,
    pub eta: Option<String>,
    pub status_text: Option<String>,
    pub error: Option<String>,
    pub complete: bool,
    pub last_output: Option<PathBuf>,
}

impl SingleDownload {
    pub fn to_info(&self) -> SingleDownloadInfo {
        SingleDownloadInfo {
            busy: self.busy,
            title: self.job.as_ref().map(|j| j.display_title.clone()),
            percent: self.percent,
            speed: self.speed.clone(),
            eta: self.eta.clone(),
            status_text: self.status_text.clone(),
            error: self.error.clone(),
            complete: self.complete,
            last_output: self.last_output.clone(),
        }
    }

    /// Applies one routed event. Returns false when nothing changed.
    pub fn apply(&mut self, event: ProgressEvent) -> bool {
        if !self.busy {
            tracing::debug!("Interactive download idle; dropping {:?} event", event.kind());
            return false;
        }

        match event {
            ProgressEvent::Progress(p) => {
                self.percent = p.percent;
                self.speed = p.speed;
                self.eta = p.eta;
            }
            ProgressEvent::StatusText { message } => self.status_text = Some(message),
            ProgressEvent::Error { message } => {
                tracing::error!("Interactive download failed: {}", message);
                self.error = Some(message);
                self.busy = false;
            }
            ProgressEvent::Completed { result_path } => {
                tracing::info!("Interactive download finished");
                self.percent = 100.0;
                self.complete = true;
                if result_path.is_some() {
                    self.last_output = result_path;
                }
                self.busy = false;
            }
        }
        true
    }
}

#[derive(Default)]
pub struct SingleSlot {
    pub(crate) state: Mutex<SingleDownload>,
    idle: Notify,
}

impl SingleSlot {
    pub async fn is_busy(&self) -> bool {
        self.state.lock().await.busy
    }

    pub async fn info(&self) -> SingleDownloadInfo {
        self.state.lock().await.to_info()
    }

    /// Marks the slot busy for `job` and resets progress. Returns false if a
    /// download already owns the slot.
    pub async fn reserve(&self, job: JobDescriptor) -> bool {
        let mut state = self.state.lock().await;
        if state.busy {
            return false;
        }
        let last_output = state.last_output.take();
        *state = SingleDownload {
            busy: true,
            job: Some(job),
            last_output,
            ..Default::default()
        };
        true
    }

    async fn abandon(&self, error: Option<String>) -> SingleDownloadInfo {
        let mut state = self.state.lock().await;
        state.busy = false;
        state.error = error;
        let info = state.to_info();
        drop(state);
        self.idle.notify_waiters();
        info
    }

    pub(crate) async fn apply_event(&self, job_id: JobId, event: ProgressEvent) -> Option<SingleDownloadInfo> {
        let mut state = self.state.lock().await;
        if state.job.as_ref().map(|j| j.id) != Some(job_id) {
            tracing::debug!("Dropping {:?} event from a previous interactive transfer", event.kind());
            return None;
        }
        if !state.apply(event) {
            return None;
        }
        let info = state.to_info();
        let now_idle = !state.busy;
        drop(state);
        if now_idle {
            self.idle.notify_waiters();
        }
        Some(info)
    }
}

#[derive(Clone)]
pub struct SingleController {
    slot: Arc<SingleSlot>,
    router: Arc<ProgressRouter>,
    backend: Arc<dyn MediaBackend>,
    emitter: Arc<dyn EventEmitter>,
    config: QueueConfig,
}

impl SingleController {
    pub fn new(
        slot: Arc<SingleSlot>,
        router: Arc<ProgressRouter>,
        backend: Arc<dyn MediaBackend>,
        emitter: Arc<dyn EventEmitter>,
        config: QueueConfig,
    ) -> Self {
        Self {
            slot,
            router,
            backend,
            emitter,
            config,
        }
    }

    pub async fn fetch_info(&self, url: &str) -> Result<MetadataResult, MetadataError> {
        let platform = vibe_core::platforms::Platform::from_url(url);
        backend::fetch_metadata_within(self.backend.as_ref(), url, platform, self.config.metadata_timeout).await
    }

    pub async fn start(&self, job: JobDescriptor) -> Result<(), ControllerError> {
        let title = job.display_title.clone();
        if !self.slot.reserve(job.clone()).await {
            return Err(ControllerError::Busy);
        }

        if self.router.batch_engaged().await {
            let info = self.slot.abandon(None).await;
            self.emitter.emit_single_state(&info);
            return Err(ControllerError::BatchActive);
        }

        self.emitter.emit_single_state(&self.slot.info().await);
        tracing::info!("Starting interactive download of '{}'", title);

        let handle = match self.backend.start_media_fetch(&job, CancellationToken::new()).await {
            Ok(handle) => handle,
            Err(e) => {
                let message = e.to_string();
                let info = self.slot.abandon(Some(message.clone())).await;
                self.emitter.emit_single_state(&info);
                return Err(ControllerError::Launch(message));
            }
        };

        self.router.attach(StreamOwner::Interactive(job.id), handle);
        Ok(())
    }

    pub async fn state(&self) -> SingleDownloadInfo {
        self.slot.info().await
    }

    pub async fn wait_until_idle(&self) -> SingleDownloadInfo {
        loop {
            let notified = self.slot.idle.notified();
            {
                let state = self.slot.state.lock().await;
                if !state.busy {
                    return state.to_info();
                }
            }
            notified.await;
        }
    }

    /// Opens the folder holding the last finished interactive download.
    pub async fn reveal_last_output(&self) -> anyhow::Result<PathBuf> {
        let path = self
            .slot
            .state
            .lock()
            .await
            .last_output
            .clone()
            .ok_or_else(|| anyhow!("No finished download to show"))?;
        process::reveal_in_folder(&path)?;
        Ok(path)
    }
}
