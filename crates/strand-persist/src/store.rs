use chrono::Utc;
use std::collections::HashSet;
use std::sync::Arc;

use crate::error::{PersistError, Result};
use crate::kv::KvStore;
use crate::models::ThreadState;

/// Namespace prefix for thread-state keys. Thread ids are recovered by
/// stripping this prefix, never by splitting on separators.
pub const THREAD_KEY_PREFIX: &str = "thread:";

/// Authoritative store for thread state.
///
/// Owns the persisted copy of every thread: callers work on transient
/// copies obtained from `load` and hand them back through `save`, which
/// replaces the whole document in one atomic write.
pub struct StateStore {
    kv: Arc<dyn KvStore>,
    system_prompt: String,
}

impl StateStore {
    pub fn new(kv: Arc<dyn KvStore>, system_prompt: impl Into<String>) -> Self {
        Self {
            kv,
            system_prompt: system_prompt.into(),
        }
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    /// Fresh state for a thread that has never been stored.
    pub fn initial_state(&self) -> ThreadState {
        ThreadState::initial(&self.system_prompt, Utc::now())
    }

    fn thread_key(thread_id: &str) -> String {
        format!("{}{}", THREAD_KEY_PREFIX, thread_id)
    }

    fn thread_id_from_key(key: &str) -> Option<&str> {
        key.strip_prefix(THREAD_KEY_PREFIX)
    }

    /// Load a thread's state, synthesizing the initial state for ids that
    /// have never been seen.
    pub async fn load(&self, thread_id: &str) -> Result<ThreadState> {
        match self.try_load(thread_id).await? {
            Some(state) => Ok(state),
            None => Ok(self.initial_state()),
        }
    }

    pub async fn try_load(&self, thread_id: &str) -> Result<Option<ThreadState>> {
        let Some(bytes) = self.kv.get(&Self::thread_key(thread_id)).await? else {
            return Ok(None);
        };
        Ok(Some(serde_json::from_slice(&bytes)?))
    }

    /// Load a thread that must already exist.
    pub async fn load_existing(&self, thread_id: &str) -> Result<ThreadState> {
        self.try_load(thread_id)
            .await?
            .ok_or_else(|| PersistError::ThreadNotFound(thread_id.to_string()))
    }

    /// Persist the full state under the thread's key in one write, so
    /// messages and metadata always land together.
    pub async fn save(&self, thread_id: &str, state: &ThreadState) -> Result<()> {
        let bytes = serde_json::to_vec(state)?;
        self.kv.set(&Self::thread_key(thread_id), bytes).await?;
        tracing::debug!(thread_id, messages = state.messages.len(), "thread state saved");
        Ok(())
    }

    /// Every known thread id. Set semantics, no ordering.
    pub async fn list_thread_ids(&self) -> Result<HashSet<String>> {
        let keys = self.kv.scan_prefix(THREAD_KEY_PREFIX).await?;
        Ok(keys
            .iter()
            .filter_map(|key| Self::thread_id_from_key(key))
            .map(str::to_string)
            .collect())
    }
}
