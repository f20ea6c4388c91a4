use std::path::PathBuf;

use serde::Serialize;

use crate::models::job::{JobId, JobMode, JobStatus};

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TransferProgress {
    pub percent: f64,
    pub total_size: Option<String>,
    pub speed: Option<String>,
    pub eta: Option<String>,
    pub downloaded_size: Option<String>,
}

/// Uniform event emitted by every external transfer, whatever tool runs it.
/// `Error` and `Completed` are terminal; a well-behaved source emits exactly
/// one of them, last.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "data")]
pub enum ProgressEvent {
    Progress(TransferProgress),
    Error { message: String },
    Completed { result_path: Option<PathBuf> },
    StatusText { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ProgressKind {
    Progress,
    Error,
    Completed,
    StatusText,
}

impl ProgressEvent {
    pub fn progress(percent: f64) -> Self {
        ProgressEvent::Progress(TransferProgress {
            percent,
            ..Default::default()
        })
    }

    pub fn error(message: impl Into<String>) -> Self {
        ProgressEvent::Error {
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ProgressKind {
        match self {
            ProgressEvent::Progress(_) => ProgressKind::Progress,
            ProgressEvent::Error { .. } => ProgressKind::Error,
            ProgressEvent::Completed { .. } => ProgressKind::Completed,
            ProgressEvent::StatusText { .. } => ProgressKind::StatusText,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.kind(), ProgressKind::Error | ProgressKind::Completed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchRunState {
    Idle,
    Running,
    Paused,
    Completed,
}

#[derive(Debug, Clone, Serialize)]
pub struct QueueItemInfo {
    pub index: usize,
    pub id: JobId,
    pub url: String,
    pub title: String,
    pub mode: JobMode,
    pub status: JobStatus,
    pub percent: f64,
    pub speed: Option<String>,
    pub eta: Option<String>,
    pub status_text: Option<String>,
    pub last_error: Option<String>,
    pub result_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize)]
pub struct QueueSnapshot {
    pub run_state: BatchRunState,
    pub cursor: usize,
    pub items: Vec<QueueItemInfo>,
}

impl QueueSnapshot {
    pub fn statuses(&self) -> Vec<JobStatus> {
        self.items.iter().map(|i| i.status).collect()
    }

    pub fn active_count(&self) -> usize {
        self.items.iter().filter(|i| i.status.is_active()).count()
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SingleDownloadInfo {
    pub busy: bool,
    pub title: Option<String>,
    pub percent: f64,
    pub speed: Option<String>,
    pub eta: Option<String>,
    pub status_text: Option<String>,
    pub error: Option<String>,
    pub complete: bool,
    pub last_output: Option<PathBuf>,
}

/// Observer for state the UI renders. Implementations must not block.
pub trait EventEmitter: Send + Sync + 'static {
    fn emit_queue_state(&self, snapshot: &QueueSnapshot);
    fn emit_single_state(&self, state: &SingleDownloadInfo);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopEmitter;

impl EventEmitter for NoopEmitter {
    fn emit_queue_state(&self, _snapshot: &QueueSnapshot) {}
    fn emit_single_state(&self, _state: &SingleDownloadInfo) {}
}
