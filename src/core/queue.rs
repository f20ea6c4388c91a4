use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, MutexGuard, Notify};
use tokio_util::sync::CancellationToken;
use vibe_core::core::events::{
    BatchRunState, EventEmitter, QueueItemInfo, QueueSnapshot, TransferProgress,
};
use vibe_core::models::job::{JobDescriptor, JobId, JobMode, JobStatus};

use crate::core::backend::{self, MediaBackend};
use crate::core::router::{ItemOutcome, ProgressRouter, StreamOwner};
use crate::core::single::SingleSlot;
use crate::models::settings::AppSettings;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueueError {
    #[error("No valid URLs found")]
    NoValidUrls,
    #[error("No queue entry at index {0}")]
    IndexOutOfRange(usize),
    #[error("Entry {0} has not failed")]
    NotFailed(usize),
    #[error("Entry {0} is being processed")]
    EntryActive(usize),
    #[error("Entry {0} has already started")]
    NotPending(usize),
    #[error("An interactive download is in progress")]
    InteractiveActive,
}

#[derive(Debug, Clone)]
pub struct QueueConfig {
    pub metadata_timeout: Duration,
    pub item_timeout: Duration,
    pub cooldown: Duration,
    pub embed_thumbnail: bool,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self::from_settings(&AppSettings::default())
    }
}

impl QueueConfig {
    pub fn from_settings(settings: &AppSettings) -> Self {
        Self {
            metadata_timeout: Duration::from_secs(settings.advanced.metadata_timeout_secs),
            item_timeout: Duration::from_secs(settings.advanced.item_timeout_secs),
            cooldown: Duration::from_millis(settings.advanced.cooldown_ms),
            embed_thumbnail: settings.download.embed_thumbnail,
        }
    }
}

/// Keeps the pasted lines that are absolute http(s) URLs, in order.
pub fn parse_batch_input(raw: &str) -> Vec<String> {
    raw.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter(|line| {
            url::Url::parse(line)
                .map(|u| matches!(u.scheme(), "http" | "https") && u.has_host())
                .unwrap_or(false)
        })
        .map(str::to_string)
        .collect()
}

#[derive(Debug, Clone)]
pub struct QueueEntry {
    pub job: JobDescriptor,
    pub status: JobStatus,
    pub percent: f64,
    pub speed: Option<String>,
    pub eta: Option<String>,
    pub status_text: Option<String>,
    pub last_error: Option<String>,
    pub result_path: Option<PathBuf>,
}

impl QueueEntry {
    fn new(job: JobDescriptor) -> Self {
        Self {
            job,
            status: JobStatus::Pending,
            percent: 0.0,
            speed: None,
            eta: None,
            status_text: None,
            last_error: None,
            result_path: None,
        }
    }

    fn reset_progress(&mut self) {
        self.percent = 0.0;
        self.speed = None;
        self.eta = None;
        self.status_text = None;
    }

    fn to_info(&self, index: usize) -> QueueItemInfo {
        QueueItemInfo {
            index,
            id: self.job.id,
            url: self.job.source_url.clone(),
            title: self.job.display_title.clone(),
            mode: self.job.mode,
            status: self.status,
            percent: self.percent,
            speed: self.speed.clone(),
            eta: self.eta.clone(),
            status_text: self.status_text.clone(),
            last_error: self.last_error.clone(),
            result_path: self.result_path.clone(),
        }
    }
}

/// Queue contents and run state. Every transition lives here so it can be
/// checked without a runtime; the engine only sequences them.
#[derive(Debug)]
pub struct BatchQueue {
    pub entries: Vec<QueueEntry>,
    pub cursor: usize,
    pub run_state: BatchRunState,
    /// A pass task is alive and will pick up runnable entries.
    pub advancing: bool,
    /// Bumped whenever the entry list is replaced; results from an older
    /// generation are discarded.
    pub generation: u64,
    in_flight: Option<(JobId, CancellationToken)>,
}

impl Default for BatchQueue {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            cursor: 0,
            run_state: BatchRunState::Idle,
            advancing: false,
            generation: 0,
            in_flight: None,
        }
    }
}

impl BatchQueue {
    pub fn load(&mut self, jobs: Vec<JobDescriptor>) {
        self.cancel_in_flight();
        self.entries = jobs.into_iter().map(QueueEntry::new).collect();
        self.cursor = 0;
        self.generation += 1;
        self.run_state = BatchRunState::Running;
    }

    pub fn clear(&mut self) {
        self.cancel_in_flight();
        self.entries.clear();
        self.cursor = 0;
        self.generation += 1;
        self.run_state = BatchRunState::Idle;
    }

    fn cancel_in_flight(&mut self) {
        if let Some((id, token)) = self.in_flight.take() {
            tracing::info!("Cancelling in-flight batch item {}", id);
            token.cancel();
        }
    }

    fn position(&self, id: JobId) -> Option<usize> {
        self.entries.iter().position(|e| e.job.id == id)
    }

    fn entry_by_id(&mut self, id: JobId) -> Option<&mut QueueEntry> {
        self.entries.iter_mut().find(|e| e.job.id == id)
    }

    /// Retried entries behind the cursor go first, then the cursor itself.
    pub fn next_runnable(&self) -> Option<usize> {
        let readmitted = self.entries[..self.cursor.min(self.entries.len())]
            .iter()
            .position(|e| e.status == JobStatus::Pending);
        readmitted.or_else(|| {
            (self.cursor..self.entries.len()).find(|&i| self.entries[i].status == JobStatus::Pending)
        })
    }

    pub fn begin(&mut self, index: usize) -> Option<JobDescriptor> {
        let entry = self.entries.get_mut(index)?;
        entry.status = JobStatus::Resolving;
        entry.last_error = None;
        entry.result_path = None;
        entry.reset_progress();
        Some(entry.job.clone())
    }

    /// Swaps in the resolved descriptor and moves the entry to `Downloading`.
    pub fn start_download(&mut self, job: JobDescriptor, token: CancellationToken) -> bool {
        let id = job.id;
        match self.entry_by_id(id) {
            Some(entry) if entry.status == JobStatus::Resolving => {
                entry.job = job;
                entry.status = JobStatus::Downloading;
                self.in_flight = Some((id, token));
                true
            }
            _ => false,
        }
    }

    pub fn finish(&mut self, id: JobId, outcome: ItemOutcome, from_cursor: bool) {
        if self.in_flight.as_ref().is_some_and(|(current, _)| *current == id) {
            self.in_flight = None;
        }

        let Some(index) = self.position(id) else {
            return;
        };
        let entry = &mut self.entries[index];
        if !entry.status.is_active() {
            tracing::debug!("Entry {} already settled; ignoring outcome", index);
            return;
        }

        entry.speed = None;
        entry.eta = None;
        match outcome {
            Ok(path) => {
                tracing::info!("Batch item {} completed: {}", index, entry.job.display_title);
                entry.status = JobStatus::Completed;
                entry.percent = 100.0;
                entry.result_path = path;
            }
            Err(message) => {
                tracing::warn!("Batch item {} failed: {}", index, message);
                entry.status = JobStatus::Failed;
                entry.last_error = Some(message);
            }
        }

        if from_cursor {
            self.cursor = self.cursor.max(index + 1);
        }
    }

    pub fn apply_progress(&mut self, id: JobId, progress: &TransferProgress) -> bool {
        match self.entry_by_id(id) {
            Some(entry) if entry.status.is_active() => {
                entry.percent = progress.percent;
                entry.speed = progress.speed.clone();
                entry.eta = progress.eta.clone();
                true
            }
            _ => false,
        }
    }

    pub fn apply_status_text(&mut self, id: JobId, message: String) -> bool {
        match self.entry_by_id(id) {
            Some(entry) if entry.status.is_active() => {
                entry.status_text = Some(message);
                true
            }
            _ => false,
        }
    }

    pub fn retry(&mut self, index: usize) -> Result<(), QueueError> {
        let entry = self.entries.get_mut(index).ok_or(QueueError::IndexOutOfRange(index))?;
        if entry.status != JobStatus::Failed {
            return Err(QueueError::NotFailed(index));
        }
        entry.status = JobStatus::Pending;
        entry.last_error = None;
        entry.reset_progress();
        Ok(())
    }

    pub fn remove(&mut self, index: usize) -> Result<JobDescriptor, QueueError> {
        let entry = self.entries.get(index).ok_or(QueueError::IndexOutOfRange(index))?;
        if entry.status.is_active() {
            return Err(QueueError::EntryActive(index));
        }
        let removed = self.entries.remove(index);
        if index < self.cursor {
            self.cursor -= 1;
        }
        Ok(removed.job)
    }

    pub fn set_mode(&mut self, index: usize, mode: JobMode) -> Result<(), QueueError> {
        let entry = self.entries.get_mut(index).ok_or(QueueError::IndexOutOfRange(index))?;
        if entry.status != JobStatus::Pending {
            return Err(QueueError::NotPending(index));
        }
        entry.job.mode = mode;
        entry.job.format_selector = mode.default_format_selector().to_string();
        Ok(())
    }

    pub fn clear_finished(&mut self) -> usize {
        let before = self.entries.len();
        let cursor = self.cursor;
        let mut kept_before_cursor = 0;
        let mut index = 0;
        self.entries.retain(|e| {
            let keep = !e.status.is_terminal();
            if keep && index < cursor {
                kept_before_cursor += 1;
            }
            index += 1;
            keep
        });
        self.cursor = kept_before_cursor;
        if self.entries.is_empty() && self.run_state == BatchRunState::Completed {
            self.run_state = BatchRunState::Idle;
        }
        before - self.entries.len()
    }

    pub fn all_terminal(&self) -> bool {
        self.entries.iter().all(|e| e.status.is_terminal())
    }

    /// Called when a pass finds nothing left to run.
    fn settle(&mut self) {
        self.advancing = false;
        if self.run_state != BatchRunState::Running {
            return;
        }
        if self.entries.is_empty() {
            self.run_state = BatchRunState::Idle;
        } else if self.all_terminal() {
            tracing::info!(
                "Batch finished: {} completed, {} failed",
                self.entries.iter().filter(|e| e.status == JobStatus::Completed).count(),
                self.entries.iter().filter(|e| e.status == JobStatus::Failed).count()
            );
            self.run_state = BatchRunState::Completed;
        }
    }

    pub fn snapshot(&self) -> QueueSnapshot {
        QueueSnapshot {
            run_state: self.run_state,
            cursor: self.cursor,
            items: self.entries.iter().enumerate().map(|(i, e)| e.to_info(i)).collect(),
        }
    }
}

#[derive(Default)]
pub struct BatchSlot {
    pub(crate) state: Mutex<BatchQueue>,
    settled: Notify,
}

struct Claimed {
    index: usize,
    job: JobDescriptor,
    generation: u64,
    from_cursor: bool,
}

/// Runs queue entries strictly one at a time.
#[derive(Clone)]
pub struct BatchEngine {
    slot: Arc<BatchSlot>,
    single: Arc<SingleSlot>,
    router: Arc<ProgressRouter>,
    backend: Arc<dyn MediaBackend>,
    emitter: Arc<dyn EventEmitter>,
    config: QueueConfig,
}

impl BatchEngine {
    pub fn new(
        slot: Arc<BatchSlot>,
        single: Arc<SingleSlot>,
        router: Arc<ProgressRouter>,
        backend: Arc<dyn MediaBackend>,
        emitter: Arc<dyn EventEmitter>,
        config: QueueConfig,
    ) -> Self {
        Self {
            slot,
            single,
            router,
            backend,
            emitter,
            config,
        }
    }

    fn emit(&self, queue: &BatchQueue) {
        self.emitter.emit_queue_state(&queue.snapshot());
    }

    async fn ensure_no_interactive(&self) -> Result<(), QueueError> {
        if self.single.is_busy().await {
            return Err(QueueError::InteractiveActive);
        }
        Ok(())
    }

    fn spawn_pass(&self, queue: &mut MutexGuard<'_, BatchQueue>) {
        if queue.advancing {
            return;
        }
        queue.advancing = true;
        let engine = self.clone();
        tokio::spawn(async move { engine.run_pass().await });
    }

    /// Replaces the queue with one entry per valid URL line and starts it.
    pub async fn submit(&self, raw: &str, mode: JobMode) -> Result<usize, QueueError> {
        let urls = parse_batch_input(raw);
        if urls.is_empty() {
            return Err(QueueError::NoValidUrls);
        }

        let mut queue = self.slot.state.lock().await;
        self.ensure_no_interactive().await?;

        let jobs: Vec<JobDescriptor> = urls.into_iter().map(|u| JobDescriptor::new(u, mode)).collect();
        let count = jobs.len();
        tracing::info!("Batch submitted with {} item(s)", count);
        queue.load(jobs);
        self.emit(&queue);
        self.spawn_pass(&mut queue);
        Ok(count)
    }

    pub async fn pause(&self) {
        let mut queue = self.slot.state.lock().await;
        if queue.run_state == BatchRunState::Running {
            tracing::info!("Batch paused at item {}", queue.cursor);
            queue.run_state = BatchRunState::Paused;
            self.emit(&queue);
        }
    }

    pub async fn resume(&self) -> Result<(), QueueError> {
        let mut queue = self.slot.state.lock().await;
        if queue.run_state != BatchRunState::Paused {
            return Ok(());
        }
        if !queue.advancing {
            self.ensure_no_interactive().await?;
        }
        tracing::info!("Batch resumed at item {}", queue.cursor);
        queue.run_state = BatchRunState::Running;
        self.emit(&queue);
        self.spawn_pass(&mut queue);
        Ok(())
    }

    pub async fn retry(&self, index: usize) -> Result<(), QueueError> {
        let mut queue = self.slot.state.lock().await;
        let starts_pass = !queue.advancing
            && matches!(queue.run_state, BatchRunState::Running | BatchRunState::Completed);
        if starts_pass {
            self.ensure_no_interactive().await?;
        }

        queue.retry(index)?;
        tracing::info!("Retrying batch item {}", index);
        if starts_pass {
            queue.run_state = BatchRunState::Running;
            self.spawn_pass(&mut queue);
        }
        self.emit(&queue);
        Ok(())
    }

    pub async fn cancel(&self) {
        let mut queue = self.slot.state.lock().await;
        tracing::info!("Batch cancelled with {} item(s)", queue.entries.len());
        queue.clear();
        self.emit(&queue);
        drop(queue);
        self.slot.settled.notify_waiters();
    }

    pub async fn remove(&self, index: usize) -> Result<JobDescriptor, QueueError> {
        let mut queue = self.slot.state.lock().await;
        let removed = queue.remove(index)?;
        self.emit(&queue);
        Ok(removed)
    }

    pub async fn set_entry_mode(&self, index: usize, mode: JobMode) -> Result<(), QueueError> {
        let mut queue = self.slot.state.lock().await;
        queue.set_mode(index, mode)?;
        self.emit(&queue);
        Ok(())
    }

    pub async fn clear_finished(&self) -> usize {
        let mut queue = self.slot.state.lock().await;
        let removed = queue.clear_finished();
        self.emit(&queue);
        removed
    }

    pub async fn snapshot(&self) -> QueueSnapshot {
        self.slot.state.lock().await.snapshot()
    }

    /// Resolves once no pass is running.
    pub async fn wait_until_settled(&self) -> QueueSnapshot {
        loop {
            let notified = self.slot.settled.notified();
            {
                let queue = self.slot.state.lock().await;
                if !queue.advancing {
                    return queue.snapshot();
                }
            }
            notified.await;
        }
    }

    async fn claim_next(&self) -> Option<Claimed> {
        let mut queue = self.slot.state.lock().await;
        let next = if queue.run_state == BatchRunState::Running {
            queue.next_runnable()
        } else {
            None
        };

        let Some(index) = next else {
            queue.settle();
            self.emit(&queue);
            return None;
        };

        let Some(job) = queue.begin(index) else {
            queue.settle();
            return None;
        };
        let claimed = Claimed {
            index,
            generation: queue.generation,
            from_cursor: index >= queue.cursor,
            job,
        };
        self.emit(&queue);
        Some(claimed)
    }

    async fn run_pass(self) {
        while let Some(item) = self.claim_next().await {
            tracing::info!("Processing batch item {}: {}", item.index, item.job.source_url);
            let id = item.job.id;
            let outcome = self.process(item.index, item.job, item.generation).await;

            {
                let mut queue = self.slot.state.lock().await;
                if queue.generation == item.generation {
                    queue.finish(id, outcome, item.from_cursor);
                    self.emit(&queue);
                } else {
                    tracing::debug!("Discarding outcome of item {} from a replaced batch", item.index);
                }
            }

            tokio::time::sleep(self.config.cooldown).await;
        }
        self.slot.settled.notify_waiters();
    }

    async fn process(&self, index: usize, job: JobDescriptor, generation: u64) -> ItemOutcome {
        let meta = backend::fetch_metadata_within(
            self.backend.as_ref(),
            &job.source_url,
            job.platform_hint,
            self.config.metadata_timeout,
        )
        .await
        .map_err(|e| {
            tracing::warn!("Metadata for batch item {} failed: {}", index, e.detail);
            e.to_string()
        })?;

        let job = job
            .with_title(meta.title.clone())
            .with_thumbnail(meta.thumbnail.clone(), self.config.embed_thumbnail);
        let token = CancellationToken::new();
        {
            let mut queue = self.slot.state.lock().await;
            if queue.generation != generation || !queue.start_download(job.clone(), token.clone()) {
                return Err("Batch item was cancelled".to_string());
            }
            self.emit(&queue);
        }

        let completion = self
            .router
            .claim_batch(job.id, index)
            .await
            .ok_or_else(|| "Another transfer is still reporting progress".to_string())?;

        let handle = match self.backend.start_media_fetch(&job, token.clone()).await {
            Ok(handle) => handle,
            Err(e) => {
                self.router.release_batch(job.id).await;
                return Err(e.to_string());
            }
        };
        self.router.attach(StreamOwner::Batch(job.id), handle);

        // Once the claim is released, anything the transfer still sends is
        // dropped by the router, so a cancelled item never waits for it.
        let outcome = tokio::select! {
            biased;
            received = completion => {
                received.unwrap_or_else(|_| Err("Transfer ended without a result".to_string()))
            }
            _ = token.cancelled() => Err("Download cancelled".to_string()),
            _ = tokio::time::sleep(self.config.item_timeout) => {
                token.cancel();
                tracing::warn!("Batch item {} hit the {}s ceiling", index, self.config.item_timeout.as_secs());
                Err(format!(
                    "Download timed out after {}s",
                    self.config.item_timeout.as_secs()
                ))
            }
        };

        self.router.release_batch(job.id).await;
        outcome
    }
}
