use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;
use vibe_core::core::events::EventEmitter;
use vibe_core::fs_paths::{AppPaths, DesktopPaths};

use crate::core::backend::MediaBackend;
use crate::core::queue::{BatchEngine, BatchSlot, QueueConfig};
use crate::core::router::ProgressRouter;
use crate::core::single::{SingleController, SingleSlot};
use crate::core::ytdlp::YtDlpBackend;

pub mod cli;
pub mod commands;
pub mod core;
pub mod models;
pub mod storage;

pub struct AppState {
    pub paths: Arc<dyn AppPaths>,
    pub router: Arc<ProgressRouter>,
    pub batch: BatchEngine,
    pub single: SingleController,
}

impl AppState {
    /// Wires both controllers to one router so every transfer's events pass
    /// through the same ownership check.
    pub fn new(
        paths: Arc<dyn AppPaths>,
        backend: Arc<dyn MediaBackend>,
        emitter: Arc<dyn EventEmitter>,
        config: QueueConfig,
    ) -> Self {
        let batch_slot = Arc::new(BatchSlot::default());
        let single_slot = Arc::new(SingleSlot::default());
        let router = Arc::new(ProgressRouter::new(
            batch_slot.clone(),
            single_slot.clone(),
            emitter.clone(),
        ));

        let batch = BatchEngine::new(
            batch_slot,
            single_slot.clone(),
            router.clone(),
            backend.clone(),
            emitter.clone(),
            config.clone(),
        );
        let single = SingleController::new(single_slot, router.clone(), backend, emitter, config);

        Self {
            paths,
            router,
            batch,
            single,
        }
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

pub fn run() -> anyhow::Result<()> {
    init_logging();
    let args = cli::CliArgs::parse();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async move {
        let paths: Arc<dyn AppPaths> = Arc::new(DesktopPaths);
        let settings = storage::config::load_settings(paths.as_ref());
        let backend = Arc::new(YtDlpBackend::new(paths.clone())?);

        let state = AppState::new(
            paths,
            backend,
            Arc::new(cli::ConsoleEmitter::default()),
            QueueConfig::from_settings(&settings),
        );

        cli::execute(args, &state).await
    })
}
