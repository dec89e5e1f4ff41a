use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use strand_persist::ThreadSummary;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct InitThreadRequest {
    pub thread_id: String,
}

#[derive(Debug, Serialize)]
pub struct InitThreadResponse {
    pub status: &'static str,
    pub thread_id: String,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: &'static str,
}

#[derive(Debug, Serialize)]
pub struct ThreadListResponse {
    pub threads: Vec<ThreadSummary>,
}

#[derive(Debug, Deserialize)]
pub struct SetTitleRequest {
    pub thread_id: String,
    pub title: String,
}

/// Initialize (or reset) a chat thread with a fresh system-only state
pub async fn init_thread(
    State(state): State<Arc<AppState>>,
    Json(req): Json<InitThreadRequest>,
) -> ApiResult<Json<InitThreadResponse>> {
    require_non_empty(&req.thread_id, "thread_id")?;

    state.chat.init(&req.thread_id).await?;

    Ok(Json(InitThreadResponse {
        status: "success",
        thread_id: req.thread_id,
    }))
}

/// Reset a conversation thread, preserving its creation time
pub async fn clear_thread(
    State(state): State<Arc<AppState>>,
    Path(thread_id): Path<String>,
) -> ApiResult<Json<StatusResponse>> {
    state.chat.clear(&thread_id).await?;
    Ok(Json(StatusResponse { status: "success" }))
}

/// List all chat threads, most recently active first
pub async fn list_threads(
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<ThreadListResponse>> {
    let threads = state.index.list_threads().await?;
    Ok(Json(ThreadListResponse { threads }))
}

/// Update the title of a specific chat thread
pub async fn set_thread_title(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SetTitleRequest>,
) -> ApiResult<Json<StatusResponse>> {
    require_non_empty(&req.thread_id, "thread_id")?;
    require_non_empty(&req.title, "title")?;

    state.chat.set_title(&req.thread_id, &req.title).await?;
    Ok(Json(StatusResponse { status: "success" }))
}

pub(crate) fn require_non_empty(value: &str, field: &str) -> ApiResult<()> {
    if value.trim().is_empty() {
        return Err(ApiError::BadRequest(format!("{} must not be empty", field)));
    }
    Ok(())
}
