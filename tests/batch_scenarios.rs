use std::collections::{HashMap, HashSet, VecDeque};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use vibe_core::core::events::{
    BatchRunState, EventEmitter, ProgressEvent, QueueSnapshot, SingleDownloadInfo,
};
use vibe_core::fs_paths::RootedPaths;
use vibe_core::models::job::{JobDescriptor, JobMode, JobStatus};
use vibe_core::platforms::Platform;
use vibe_downloader_lib::core::backend::{FetchErrorKind, MediaBackend, MediaFetchHandle, MetadataError};
use vibe_downloader_lib::core::queue::{QueueConfig, QueueError};
use vibe_downloader_lib::core::single::ControllerError;
use vibe_downloader_lib::models::media::MetadataResult;
use vibe_downloader_lib::AppState;

#[derive(Clone)]
enum Meta {
    Ok,
    Fail(&'static str),
    Hang,
}

#[derive(Clone)]
struct Script {
    meta: Meta,
    events: Vec<(u64, ProgressEvent)>,
}

impl Script {
    fn succeed(total_ms: u64) -> Self {
        Script {
            meta: Meta::Ok,
            events: vec![
                (100, ProgressEvent::progress(50.0)),
                (
                    total_ms.saturating_sub(100),
                    ProgressEvent::Completed {
                        result_path: Some(PathBuf::from("/dl/out.mp4")),
                    },
                ),
            ],
        }
    }

    fn fail(message: &str) -> Self {
        Script {
            meta: Meta::Ok,
            events: vec![(100, ProgressEvent::progress(10.0)), (100, ProgressEvent::error(message))],
        }
    }
}

#[derive(Default)]
struct FakeBackend {
    scripts: Mutex<HashMap<String, VecDeque<Script>>>,
    started: Mutex<Vec<String>>,
    ignores_cancel: Mutex<HashSet<String>>,
}

impl FakeBackend {
    fn script(self, url: &str, script: Script) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .entry(url.to_string())
            .or_default()
            .push_back(script);
        self
    }

    /// Transfers for `url` keep reporting after their token fires, like a
    /// process whose children outlive the kill.
    fn ignoring_cancel(self, url: &str) -> Self {
        self.ignores_cancel.lock().unwrap().insert(url.to_string());
        self
    }

    fn next_script(&self, url: &str) -> Script {
        self.scripts
            .lock()
            .unwrap()
            .get_mut(url)
            .and_then(|q| if q.len() > 1 { q.pop_front() } else { q.front().cloned() })
            .unwrap_or_else(|| Script::succeed(200))
    }

    fn started(&self) -> Vec<String> {
        self.started.lock().unwrap().clone()
    }
}

#[async_trait]
impl MediaBackend for FakeBackend {
    fn name(&self) -> &str {
        "fake"
    }

    async fn fetch_metadata(&self, url: &str, _platform: Option<Platform>) -> Result<MetadataResult, MetadataError> {
        let meta = self
            .scripts
            .lock()
            .unwrap()
            .get(url)
            .and_then(|q| q.front().map(|s| s.meta.clone()))
            .unwrap_or(Meta::Ok);
        match meta {
            Meta::Ok => Ok(MetadataResult::from_json(
                &serde_json::json!({ "title": format!("Title of {}", url) }),
                url,
            )),
            Meta::Fail(raw) => Err(MetadataError::from_raw(raw, url)),
            Meta::Hang => {
                std::future::pending::<()>().await;
                unreachable!()
            }
        }
    }

    async fn start_media_fetch(
        &self,
        job: &JobDescriptor,
        cancel: CancellationToken,
    ) -> anyhow::Result<MediaFetchHandle> {
        self.started.lock().unwrap().push(job.source_url.clone());
        let script = self.next_script(&job.source_url);
        let stubborn = self.ignores_cancel.lock().unwrap().contains(&job.source_url);
        let (tx, rx) = mpsc::channel(16);

        tokio::spawn(async move {
            for (delay, event) in script.events {
                tokio::select! {
                    _ = tokio::time::sleep(Duration::from_millis(delay)) => {}
                    _ = cancel.cancelled(), if !stubborn => {
                        let _ = tx.send(ProgressEvent::error("cancelled")).await;
                        return;
                    }
                }
                if tx.send(event).await.is_err() {
                    return;
                }
            }
        });

        Ok(MediaFetchHandle::new(rx))
    }
}

#[derive(Default)]
struct Recorder {
    queue: Mutex<Vec<QueueSnapshot>>,
    single: Mutex<Vec<SingleDownloadInfo>>,
}

impl EventEmitter for Recorder {
    fn emit_queue_state(&self, snapshot: &QueueSnapshot) {
        self.queue.lock().unwrap().push(snapshot.clone());
    }

    fn emit_single_state(&self, state: &SingleDownloadInfo) {
        self.single.lock().unwrap().push(state.clone());
    }
}

impl Recorder {
    fn max_active(&self) -> usize {
        self.queue
            .lock()
            .unwrap()
            .iter()
            .map(|s| s.active_count())
            .max()
            .unwrap_or(0)
    }
}

struct Harness {
    state: AppState,
    backend: Arc<FakeBackend>,
    recorder: Arc<Recorder>,
    _dir: tempfile::TempDir,
}

fn harness(backend: FakeBackend) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let backend = Arc::new(backend);
    let recorder = Arc::new(Recorder::default());
    let config = QueueConfig {
        metadata_timeout: Duration::from_secs(45),
        item_timeout: Duration::from_secs(600),
        cooldown: Duration::from_millis(500),
        embed_thumbnail: false,
    };
    let state = AppState::new(
        Arc::new(RootedPaths::new(dir.path())),
        backend.clone(),
        recorder.clone(),
        config,
    );
    Harness {
        state,
        backend,
        recorder,
        _dir: dir,
    }
}

#[tokio::test(start_paused = true)]
async fn invalid_lines_are_dropped_and_order_kept() {
    let h = harness(FakeBackend::default());

    let count = h
        .state
        .batch
        .submit("https://a.test/1\nnot-a-url\nhttps://a.test/2\n", JobMode::Video)
        .await
        .unwrap();
    assert_eq!(count, 2);

    let done = h.state.batch.wait_until_settled().await;
    let urls: Vec<&str> = done.items.iter().map(|i| i.url.as_str()).collect();
    assert_eq!(urls, vec!["https://a.test/1", "https://a.test/2"]);
    assert_eq!(done.statuses(), vec![JobStatus::Completed, JobStatus::Completed]);
    assert_eq!(done.run_state, BatchRunState::Completed);
    assert_eq!(done.items[0].title, "Title of https://a.test/1");
}

#[tokio::test(start_paused = true)]
async fn submission_without_urls_is_rejected() {
    let h = harness(FakeBackend::default());
    assert_eq!(
        h.state.batch.submit("nothing here\n\n", JobMode::Video).await,
        Err(QueueError::NoValidUrls)
    );
    assert!(h.state.batch.snapshot().await.items.is_empty());
}

#[tokio::test(start_paused = true)]
async fn failed_item_does_not_block_the_rest() {
    let h = harness(FakeBackend::default().script("https://a.test/1", Script::fail("404")));

    h.state
        .batch
        .submit("https://a.test/1\nhttps://a.test/2\nhttps://a.test/3", JobMode::Video)
        .await
        .unwrap();
    let done = h.state.batch.wait_until_settled().await;

    assert_eq!(
        done.statuses(),
        vec![JobStatus::Failed, JobStatus::Completed, JobStatus::Completed]
    );
    assert_eq!(done.items[0].last_error.as_deref(), Some("404"));
    assert_eq!(
        h.backend.started(),
        vec!["https://a.test/1", "https://a.test/2", "https://a.test/3"]
    );
    assert!(h.recorder.max_active() <= 1);
}

#[tokio::test(start_paused = true)]
async fn pause_and_resume_around_one_item_changes_nothing() {
    let h = harness(FakeBackend::default().script("https://a.test/1", Script::succeed(1_000)));

    h.state
        .batch
        .submit("https://a.test/1\nhttps://a.test/2", JobMode::Video)
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(h.state.batch.snapshot().await.items[0].status, JobStatus::Downloading);

    h.state.batch.pause().await;
    h.state.batch.resume().await.unwrap();

    let done = h.state.batch.wait_until_settled().await;
    assert_eq!(done.statuses(), vec![JobStatus::Completed, JobStatus::Completed]);
    assert_eq!(done.run_state, BatchRunState::Completed);
}

#[tokio::test(start_paused = true)]
async fn pause_lets_in_flight_item_finish_then_holds() {
    let h = harness(FakeBackend::default().script("https://a.test/1", Script::succeed(1_000)));

    h.state
        .batch
        .submit("https://a.test/1\nhttps://a.test/2", JobMode::Audio)
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;
    h.state.batch.pause().await;

    let held = h.state.batch.wait_until_settled().await;
    assert_eq!(held.run_state, BatchRunState::Paused);
    assert_eq!(held.statuses(), vec![JobStatus::Completed, JobStatus::Pending]);
    assert_eq!(held.cursor, 1);

    h.state.batch.resume().await.unwrap();
    let done = h.state.batch.wait_until_settled().await;
    assert_eq!(done.statuses(), vec![JobStatus::Completed, JobStatus::Completed]);
}

#[tokio::test(start_paused = true)]
async fn retry_settles_without_leaking_state() {
    let h = harness(
        FakeBackend::default()
            .script("https://a.test/1", Script::fail("Connection reset"))
            .script("https://a.test/1", Script::succeed(300)),
    );

    h.state
        .batch
        .submit("https://a.test/1\nhttps://a.test/2", JobMode::Video)
        .await
        .unwrap();
    let first = h.state.batch.wait_until_settled().await;
    assert_eq!(first.statuses(), vec![JobStatus::Failed, JobStatus::Completed]);

    assert_eq!(h.state.batch.retry(1).await, Err(QueueError::NotFailed(1)));
    h.state.batch.retry(0).await.unwrap();

    let done = h.state.batch.wait_until_settled().await;
    assert_eq!(done.statuses(), vec![JobStatus::Completed, JobStatus::Completed]);
    assert_eq!(done.active_count(), 0);
    assert_eq!(done.cursor, 2);
    assert!(done.items[0].last_error.is_none());
    assert!(!h.state.router.batch_claimed().await);
    assert!(h.recorder.max_active() <= 1);
}

#[tokio::test(start_paused = true)]
async fn interactive_error_leaves_paused_batch_untouched() {
    let h = harness(
        FakeBackend::default()
            .script("https://a.test/1", Script::succeed(1_000))
            .script("https://b.test/x", Script::fail("HTTP Error 403")),
    );

    h.state
        .batch
        .submit("https://a.test/1\nhttps://a.test/2", JobMode::Video)
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;
    h.state.batch.pause().await;
    let before = h.state.batch.wait_until_settled().await;

    h.state
        .single
        .start(JobDescriptor::new("https://b.test/x", JobMode::Video))
        .await
        .unwrap();
    let single = h.state.single.wait_until_idle().await;
    assert_eq!(single.error.as_deref(), Some("HTTP Error 403"));
    assert!(!single.complete);

    let after = h.state.batch.snapshot().await;
    assert_eq!(after.run_state, BatchRunState::Paused);
    assert_eq!(after.statuses(), before.statuses());
    assert_eq!(after.items[1].percent, 0.0);
    assert!(after.items.iter().all(|i| i.last_error.is_none()));
}

#[tokio::test(start_paused = true)]
async fn metadata_timeout_fails_item_and_moves_on() {
    let h = harness(FakeBackend::default().script(
        "https://a.test/1",
        Script {
            meta: Meta::Hang,
            events: Vec::new(),
        },
    ));

    h.state
        .batch
        .submit("https://a.test/1\nhttps://a.test/2", JobMode::Video)
        .await
        .unwrap();
    let done = h.state.batch.wait_until_settled().await;

    assert_eq!(done.statuses(), vec![JobStatus::Failed, JobStatus::Completed]);
    assert_eq!(
        done.items[0].last_error.as_deref(),
        Some(FetchErrorKind::Timeout.message())
    );
    assert_eq!(h.backend.started(), vec!["https://a.test/2"]);
}

#[tokio::test(start_paused = true)]
async fn metadata_failure_is_classified() {
    let h = harness(FakeBackend::default().script(
        "https://a.test/1",
        Script {
            meta: Meta::Fail("ERROR: [generic] Private video"),
            events: Vec::new(),
        },
    ));

    h.state.batch.submit("https://a.test/1", JobMode::Video).await.unwrap();
    let done = h.state.batch.wait_until_settled().await;
    assert_eq!(
        done.items[0].last_error.as_deref(),
        Some(FetchErrorKind::Private.message())
    );
}

#[tokio::test(start_paused = true)]
async fn first_terminal_event_wins() {
    let h = harness(FakeBackend::default().script(
        "https://a.test/1",
        Script {
            meta: Meta::Ok,
            events: vec![
                (100, ProgressEvent::error("extractor crashed")),
                (10, ProgressEvent::Completed { result_path: None }),
            ],
        },
    ));

    h.state.batch.submit("https://a.test/1", JobMode::Video).await.unwrap();
    let done = h.state.batch.wait_until_settled().await;
    assert_eq!(done.statuses(), vec![JobStatus::Failed]);
    assert_eq!(done.items[0].last_error.as_deref(), Some("extractor crashed"));
}

#[tokio::test(start_paused = true)]
async fn hung_transfer_hits_item_ceiling() {
    let h = harness(FakeBackend::default().script(
        "https://a.test/1",
        Script {
            meta: Meta::Ok,
            events: vec![(3_600_000, ProgressEvent::Completed { result_path: None })],
        },
    ));

    h.state
        .batch
        .submit("https://a.test/1\nhttps://a.test/2", JobMode::Video)
        .await
        .unwrap();
    let done = h.state.batch.wait_until_settled().await;
    assert_eq!(done.statuses(), vec![JobStatus::Failed, JobStatus::Completed]);
    assert_eq!(
        done.items[0].last_error.as_deref(),
        Some("Download timed out after 600s")
    );
}

#[tokio::test(start_paused = true)]
async fn timed_out_transfer_cannot_touch_the_next_item() {
    let h = harness(
        FakeBackend::default()
            .script(
                "https://a.test/1",
                Script {
                    meta: Meta::Ok,
                    events: vec![
                        (100, ProgressEvent::progress(10.0)),
                        (600_700, ProgressEvent::progress(99.0)),
                        (100, ProgressEvent::error("Download cancelled")),
                    ],
                },
            )
            .ignoring_cancel("https://a.test/1")
            .script("https://a.test/2", Script::succeed(2_000)),
    );

    h.state
        .batch
        .submit("https://a.test/1\nhttps://a.test/2", JobMode::Video)
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(601_000)).await;

    let mid = h.state.batch.snapshot().await;
    assert_eq!(mid.items[1].status, JobStatus::Downloading);
    assert_eq!(mid.items[1].percent, 50.0);
    assert!(mid.items[1].last_error.is_none());

    let done = h.state.batch.wait_until_settled().await;
    assert_eq!(done.statuses(), vec![JobStatus::Failed, JobStatus::Completed]);
    assert_eq!(
        done.items[0].last_error.as_deref(),
        Some("Download timed out after 600s")
    );
    assert!(h.recorder.max_active() <= 1);
}

#[tokio::test(start_paused = true)]
async fn cancelled_transfer_cannot_touch_the_interactive_download() {
    let h = harness(
        FakeBackend::default()
            .script(
                "https://a.test/1",
                Script {
                    meta: Meta::Ok,
                    events: vec![
                        (100, ProgressEvent::progress(10.0)),
                        (5_000, ProgressEvent::progress(60.0)),
                        (100, ProgressEvent::error("late failure")),
                    ],
                },
            )
            .ignoring_cancel("https://a.test/1")
            .script("https://b.test/x", Script::succeed(10_000)),
    );

    h.state.batch.submit("https://a.test/1", JobMode::Video).await.unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;

    let cancelled_at = tokio::time::Instant::now();
    h.state.batch.cancel().await;
    h.state.batch.wait_until_settled().await;
    assert!(cancelled_at.elapsed() < Duration::from_secs(1));
    assert!(!h.state.router.batch_engaged().await);

    h.state
        .single
        .start(JobDescriptor::new("https://b.test/x", JobMode::Video))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(6_000)).await;

    let mid = h.state.single.state().await;
    assert!(mid.busy);
    assert!(mid.error.is_none());
    assert_eq!(mid.percent, 50.0);

    let single = h.state.single.wait_until_idle().await;
    assert!(single.complete);
    assert!(single.error.is_none());
}

#[tokio::test(start_paused = true)]
async fn controllers_exclude_each_other() {
    let h = harness(
        FakeBackend::default()
            .script("https://a.test/1", Script::succeed(1_000))
            .script("https://b.test/x", Script::succeed(1_000)),
    );

    h.state.batch.submit("https://a.test/1", JobMode::Video).await.unwrap();
    let rejected = h
        .state
        .single
        .start(JobDescriptor::new("https://b.test/x", JobMode::Video))
        .await;
    assert!(matches!(rejected, Err(ControllerError::BatchActive)));
    assert!(!h.state.single.state().await.busy);
    h.state.batch.wait_until_settled().await;

    h.state
        .single
        .start(JobDescriptor::new("https://b.test/x", JobMode::Video))
        .await
        .unwrap();
    assert!(matches!(
        h.state
            .single
            .start(JobDescriptor::new("https://b.test/x", JobMode::Video))
            .await,
        Err(ControllerError::Busy)
    ));
    assert_eq!(
        h.state.batch.submit("https://a.test/2", JobMode::Video).await,
        Err(QueueError::InteractiveActive)
    );

    let single = h.state.single.wait_until_idle().await;
    assert!(single.complete);
    assert_eq!(single.last_output, Some(PathBuf::from("/dl/out.mp4")));
    assert_eq!(h.state.batch.submit("https://a.test/2", JobMode::Video).await, Ok(1));
}

#[tokio::test(start_paused = true)]
async fn cancel_empties_queue_and_allows_new_batch() {
    let h = harness(FakeBackend::default().script("https://a.test/1", Script::succeed(5_000)));

    h.state
        .batch
        .submit("https://a.test/1\nhttps://a.test/2", JobMode::Video)
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;

    h.state.batch.cancel().await;
    let cleared = h.state.batch.snapshot().await;
    assert!(cleared.items.is_empty());
    assert_eq!(cleared.run_state, BatchRunState::Idle);

    let settled = h.state.batch.wait_until_settled().await;
    assert!(settled.items.is_empty());
    assert!(!h.state.router.batch_claimed().await);

    h.state.batch.submit("https://a.test/3", JobMode::Video).await.unwrap();
    let done = h.state.batch.wait_until_settled().await;
    assert_eq!(done.statuses(), vec![JobStatus::Completed]);
    assert_eq!(h.backend.started(), vec!["https://a.test/1", "https://a.test/3"]);
}

#[tokio::test(start_paused = true)]
async fn entry_mode_and_removal_guards() {
    let h = harness(FakeBackend::default().script("https://a.test/1", Script::succeed(1_000)));

    h.state
        .batch
        .submit("https://a.test/1\nhttps://a.test/2\nhttps://a.test/3", JobMode::Video)
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;

    assert_eq!(
        h.state.batch.set_entry_mode(0, JobMode::Audio).await,
        Err(QueueError::NotPending(0))
    );
    assert!(matches!(
        h.state.batch.remove(0).await,
        Err(QueueError::EntryActive(0))
    ));
    h.state.batch.set_entry_mode(1, JobMode::Audio).await.unwrap();
    h.state.batch.remove(2).await.unwrap();

    let done = h.state.batch.wait_until_settled().await;
    assert_eq!(done.items.len(), 2);
    assert_eq!(done.items[1].mode, JobMode::Audio);
    assert_eq!(done.statuses(), vec![JobStatus::Completed, JobStatus::Completed]);

    assert_eq!(h.state.batch.clear_finished().await, 2);
    assert_eq!(h.state.batch.snapshot().await.run_state, BatchRunState::Idle);
}
