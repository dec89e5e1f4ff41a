use std::sync::Arc;

use crate::error::Result;
use crate::models::{MessageRole, ThreadState, ThreadSummary};
use crate::store::StateStore;

/// User messages shown as a listing preview.
pub const PREVIEW_MESSAGES: usize = 3;

/// Derived listing view over the store.
///
/// Enumerates all thread ids and loads each full state to project its
/// summary. O(threads) loads per call; fine at the thread volumes this
/// service targets, and kept derived so no secondary index can drift from
/// the authoritative state.
pub struct ThreadIndex {
    store: Arc<StateStore>,
}

impl ThreadIndex {
    pub fn new(store: Arc<StateStore>) -> Self {
        Self { store }
    }

    /// All threads, most recently updated first. Ties are broken by id so
    /// the ordering is deterministic.
    pub async fn list_threads(&self) -> Result<Vec<ThreadSummary>> {
        let ids = self.store.list_thread_ids().await?;
        let mut summaries = Vec::with_capacity(ids.len());

        for id in ids {
            // A key can disappear between the scan and the load; skip it.
            match self.store.try_load(&id).await? {
                Some(state) => summaries.push(summarize(id, &state)),
                None => continue,
            }
        }

        summaries.sort_by(|a, b| {
            b.timestamp
                .cmp(&a.timestamp)
                .then_with(|| a.id.cmp(&b.id))
        });

        Ok(summaries)
    }
}

fn summarize(id: String, state: &ThreadState) -> ThreadSummary {
    let user_messages: Vec<&str> = state
        .messages
        .iter()
        .filter(|m| m.role == MessageRole::User)
        .map(|m| m.content.as_str())
        .collect();

    let skip = user_messages.len().saturating_sub(PREVIEW_MESSAGES);

    ThreadSummary {
        id,
        title: state.metadata.title.clone(),
        timestamp: state.metadata.updated_at,
        message_count: state.visible_count(),
        preview_messages: user_messages
            .into_iter()
            .skip(skip)
            .map(str::to_string)
            .collect(),
    }
}
