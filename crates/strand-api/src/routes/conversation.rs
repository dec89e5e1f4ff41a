use axum::extract::{Path, State};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use strand_persist::MessageRole;

use crate::error::ApiResult;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct ConversationResponse {
    pub messages: Vec<ConversationMessage>,
}

#[derive(Debug, Serialize)]
pub struct ConversationMessage {
    pub role: MessageRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

/// Fetch the full message history for a thread, system messages omitted
pub async fn get_conversation(
    State(state): State<Arc<AppState>>,
    Path(thread_id): Path<String>,
) -> ApiResult<Json<ConversationResponse>> {
    let messages = state
        .chat
        .conversation(&thread_id)
        .await?
        .into_iter()
        .map(|m| ConversationMessage {
            role: m.role,
            content: m.content,
            timestamp: m.created_at,
        })
        .collect();

    Ok(Json(ConversationResponse { messages }))
}
