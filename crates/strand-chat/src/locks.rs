use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Per-thread admission gate.
///
/// `acquire` returns a guard that serializes work on one thread id from
/// load through save, while work on distinct ids proceeds in parallel.
/// Entries are kept for the life of the process; thread counts here are
/// conversation threads, not tasks, so the registry stays small.
#[derive(Default)]
pub struct ThreadLocks {
    inner: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl ThreadLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, thread_id: &str) -> OwnedMutexGuard<()> {
        let entry = {
            let mut registry = self.inner.lock().await;
            registry
                .entry(thread_id.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        entry.lock_owned().await
    }
}
