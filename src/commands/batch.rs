use vibe_core::core::events::QueueSnapshot;
use vibe_core::models::job::JobMode;

use crate::AppState;

pub async fn submit_batch(state: &AppState, raw: &str, mode: Option<JobMode>) -> Result<QueueSnapshot, String> {
    let mode = match mode {
        Some(mode) => mode,
        None => crate::storage::config::load_settings(state.paths.as_ref())
            .download
            .default_batch_mode,
    };
    state.batch.submit(raw, mode).await.map_err(|e| e.to_string())?;
    Ok(state.batch.snapshot().await)
}

pub async fn pause_batch(state: &AppState) -> QueueSnapshot {
    state.batch.pause().await;
    state.batch.snapshot().await
}

pub async fn resume_batch(state: &AppState) -> Result<QueueSnapshot, String> {
    state.batch.resume().await.map_err(|e| e.to_string())?;
    Ok(state.batch.snapshot().await)
}

pub async fn cancel_batch(state: &AppState) -> QueueSnapshot {
    state.batch.cancel().await;
    state.batch.snapshot().await
}

pub async fn retry_batch_item(state: &AppState, index: usize) -> Result<QueueSnapshot, String> {
    state.batch.retry(index).await.map_err(|e| e.to_string())?;
    Ok(state.batch.snapshot().await)
}

pub async fn remove_batch_item(state: &AppState, index: usize) -> Result<QueueSnapshot, String> {
    state.batch.remove(index).await.map_err(|e| e.to_string())?;
    Ok(state.batch.snapshot().await)
}

pub async fn set_batch_item_mode(state: &AppState, index: usize, mode: JobMode) -> Result<QueueSnapshot, String> {
    state
        .batch
        .set_entry_mode(index, mode)
        .await
        .map_err(|e| e.to_string())?;
    Ok(state.batch.snapshot().await)
}

pub async fn clear_finished_batch(state: &AppState) -> QueueSnapshot {
    state.batch.clear_finished().await;
    state.batch.snapshot().await
}

pub async fn get_batch_state(state: &AppState) -> QueueSnapshot {
    state.batch.snapshot().await
}
