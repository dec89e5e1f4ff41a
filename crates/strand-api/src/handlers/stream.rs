use axum::extract::State;
use axum::response::sse::{Event, Sse};
use axum::Json;
use futures::stream::{Stream, StreamExt};
use serde::Deserialize;
use std::convert::Infallible;
use std::sync::Arc;

use crate::error::ApiResult;
use crate::routes::threads::require_non_empty;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    pub question: String,
    pub thread_id: String,
}

/// Submit a question and stream the reply using Server-Sent Events
///
/// One `data: <fragment>` event per fragment; stream close is the only
/// terminator. A generation failure simply ends the stream early, so the
/// fragments delivered so far are all the client gets.
pub async fn query_stream(
    State(state): State<Arc<AppState>>,
    Json(req): Json<QueryRequest>,
) -> ApiResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    require_non_empty(&req.thread_id, "thread_id")?;
    require_non_empty(&req.question, "question")?;

    let fragments = state.chat.query(&req.thread_id, &req.question).await?;

    let sse_stream = fragments.map(|fragment| Ok(Event::default().data(fragment)));

    Ok(Sse::new(sse_stream))
}
