use chrono::Utc;
use futures::StreamExt;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use strand_llm::{ChatClient, ChatOptions, ChatRequest, StreamEvent};
use strand_persist::{Message, StateStore, ThreadState};

use crate::context::build_context;
use crate::error::{ChatError, Result};
use crate::locks::ThreadLocks;

/// Fragments buffered between generation and the consuming transport.
const FRAGMENT_BUFFER: usize = 64;
const TITLE_MAX_CHARS: usize = 30;

/// Orchestrates one conversation service: loads thread state, drives the
/// model, streams fragments to the caller, and persists the completed
/// exchange in a single write.
///
/// Constructed with explicit store and client handles so tests can swap in
/// fakes; there is no ambient global state.
pub struct ConversationService {
    store: Arc<StateStore>,
    client: Arc<dyn ChatClient>,
    model: String,
    options: ChatOptions,
    locks: ThreadLocks,
}

impl ConversationService {
    pub fn new(
        store: Arc<StateStore>,
        client: Arc<dyn ChatClient>,
        model: impl Into<String>,
        options: ChatOptions,
    ) -> Self {
        Self {
            store,
            client,
            model: model.into(),
            options,
            locks: ThreadLocks::new(),
        }
    }

    /// Run one query against a thread.
    ///
    /// Returns the reply as a lazy fragment sequence; the caller renders
    /// fragments as they arrive. The per-thread guard is held from load
    /// through the terminal save, so at most one query is in flight per
    /// thread id while distinct threads proceed in parallel.
    pub async fn query(&self, thread_id: &str, question: &str) -> Result<ReceiverStream<String>> {
        let guard = self.locks.acquire(thread_id).await;
        let state = self.store.load(thread_id).await?;

        let (tx, rx) = mpsc::channel(FRAGMENT_BUFFER);
        let store = Arc::clone(&self.store);
        let client = Arc::clone(&self.client);
        let model = self.model.clone();
        let options = self.options.clone();
        let thread_id = thread_id.to_string();
        let question = question.to_string();

        // Generation and the terminal save run detached from the transport:
        // a client that disconnects mid-stream stops receiving fragments,
        // but generation still completes and the history stays consistent.
        tokio::spawn(async move {
            let _guard = guard;
            if let Err(e) =
                Self::execute_query(store, client, model, options, state, &thread_id, &question, tx)
                    .await
            {
                tracing::error!(thread_id = %thread_id, error = %e, "query failed");
            }
        });

        Ok(ReceiverStream::new(rx))
    }

    async fn execute_query(
        store: Arc<StateStore>,
        client: Arc<dyn ChatClient>,
        model: String,
        options: ChatOptions,
        mut state: ThreadState,
        thread_id: &str,
        question: &str,
        tx: mpsc::Sender<String>,
    ) -> Result<()> {
        let user_message = Message::user(question);
        let context = build_context(store.system_prompt(), &state.messages, &user_message);
        let request = ChatRequest::new(model, context).with_options(options);

        let mut fragments = client
            .chat_stream(request)
            .await
            .map_err(|e| ChatError::Generation(e.to_string()))?;

        let mut answer = String::new();
        let mut failure: Option<String> = None;
        let mut receiver_gone = false;

        while let Some(item) = fragments.next().await {
            match item {
                Ok(StreamEvent::Token { content }) => {
                    answer.push_str(&content);
                    if !receiver_gone && tx.send(content).await.is_err() {
                        // Client went away; keep generating so the final
                        // exchange can still be persisted.
                        receiver_gone = true;
                    }
                }
                Ok(StreamEvent::Done { .. }) => break,
                Err(e) => {
                    failure = Some(e.to_string());
                    break;
                }
            }
        }

        if answer.is_empty() {
            // Nothing produced, nothing persisted.
            return match failure {
                Some(reason) => Err(ChatError::Generation(reason)),
                None => Ok(()),
            };
        }

        // A failure after partial output still persists what was produced:
        // the client already saw those fragments, and stored history must
        // match what was delivered.
        let assistant_message = Message::assistant(answer.as_str());
        let now = assistant_message.created_at;

        if !state.has_user_message() {
            state.metadata.title = derive_title(question);
        }
        state.messages.push(user_message);
        state.messages.push(assistant_message);
        state.metadata.updated_at = now;

        store.save(thread_id, &state).await?;
        tracing::info!(thread_id, receiver_gone, "exchange persisted");

        match failure {
            Some(reason) => Err(ChatError::Generation(reason)),
            None => Ok(()),
        }
    }

    /// Idempotently create or reset a thread to its initial state.
    pub async fn init(&self, thread_id: &str) -> Result<()> {
        let _guard = self.locks.acquire(thread_id).await;
        let state = self.store.initial_state();
        self.store.save(thread_id, &state).await?;
        Ok(())
    }

    /// Reset a thread's history, keeping its creation time when the thread
    /// already existed.
    pub async fn clear(&self, thread_id: &str) -> Result<()> {
        let _guard = self.locks.acquire(thread_id).await;
        let previous = self.store.try_load(thread_id).await?;
        let mut state = self.store.initial_state();
        if let Some(previous) = previous {
            state.metadata.created_at = previous.metadata.created_at;
        }
        self.store.save(thread_id, &state).await?;
        Ok(())
    }

    /// Rename a thread. Fails for a thread that was never stored.
    pub async fn set_title(&self, thread_id: &str, title: &str) -> Result<()> {
        let _guard = self.locks.acquire(thread_id).await;
        let mut state = self.store.load_existing(thread_id).await?;
        state.metadata.title = title.to_string();
        state.metadata.updated_at = Utc::now();
        self.store.save(thread_id, &state).await?;
        Ok(())
    }

    /// The thread's client-visible history, system messages excluded.
    pub async fn conversation(&self, thread_id: &str) -> Result<Vec<Message>> {
        let state = self.store.load(thread_id).await?;
        Ok(state.visible_messages().cloned().collect())
    }
}

/// Thread title from its first question: the question verbatim, or its
/// first 30 characters followed by an ellipsis when longer.
pub fn derive_title(question: &str) -> String {
    let mut chars = question.chars();
    let head: String = chars.by_ref().take(TITLE_MAX_CHARS).collect();
    if chars.next().is_some() {
        format!("{}...", head)
    } else {
        head
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_title_kept_verbatim() {
        assert_eq!(derive_title("what is rust?"), "what is rust?");
    }

    #[test]
    fn test_exactly_thirty_chars_not_truncated() {
        let question = "a".repeat(30);
        assert_eq!(derive_title(&question), question);
    }

    #[test]
    fn test_long_title_truncated_with_ellipsis() {
        let question = "x".repeat(31);
        let title = derive_title(&question);
        assert_eq!(title, format!("{}...", "x".repeat(30)));
    }

    #[test]
    fn test_truncation_respects_char_boundaries() {
        let question = "é".repeat(40);
        let title = derive_title(&question);
        assert_eq!(title.chars().count(), 33);
        assert!(title.ends_with("..."));
    }
}
