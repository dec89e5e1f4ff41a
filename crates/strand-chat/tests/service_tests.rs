use anyhow::Result;
use async_trait::async_trait;
use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Barrier;
use tokio::time::timeout;

use strand_chat::{ChatError, ConversationService};
use strand_llm::{
    ChatClient, ChatOptions, ChatRequest, ChatResponse, FragmentStream, StreamEvent,
};
use strand_persist::{MemoryKv, MessageRole, PersistError, StateStore};

const PROMPT: &str = "be helpful";

fn thread_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

fn last_question(request: &ChatRequest) -> String {
    request
        .messages
        .last()
        .expect("request context is never empty")
        .content()
        .to_string()
}

/// Replies "re: <question>" in two fragments, with an optional pause
/// between them to widen concurrency windows.
struct EchoClient {
    delay: Duration,
}

impl EchoClient {
    fn new() -> Self {
        Self {
            delay: Duration::ZERO,
        }
    }

    fn with_delay(delay: Duration) -> Self {
        Self { delay }
    }
}

#[async_trait]
impl ChatClient for EchoClient {
    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse> {
        Ok(ChatResponse {
            content: Some(format!("re: {}", last_question(&request))),
            usage: None,
            finish_reason: Some("stop".to_string()),
        })
    }

    async fn chat_stream(&self, request: ChatRequest) -> Result<FragmentStream> {
        let question = last_question(&request);
        let delay = self.delay;
        Ok(Box::pin(async_stream::stream! {
            yield Ok(StreamEvent::Token { content: "re: ".to_string() });
            if delay > Duration::ZERO {
                tokio::time::sleep(delay).await;
            }
            yield Ok(StreamEvent::Token { content: question });
            yield Ok(StreamEvent::Done { finish_reason: Some("stop".to_string()) });
        }))
    }
}

/// Yields the scripted fragments, then fails mid-stream.
struct FailingClient {
    fragments: Vec<String>,
}

#[async_trait]
impl ChatClient for FailingClient {
    async fn chat(&self, _request: ChatRequest) -> Result<ChatResponse> {
        anyhow::bail!("model unavailable")
    }

    async fn chat_stream(&self, _request: ChatRequest) -> Result<FragmentStream> {
        let fragments = self.fragments.clone();
        Ok(Box::pin(async_stream::stream! {
            for fragment in fragments {
                yield Ok(StreamEvent::Token { content: fragment });
            }
            yield Err(anyhow::anyhow!("connection reset mid-stream"));
        }))
    }
}

/// Both concurrent streams must reach the barrier before either produces
/// output; proves two generations were in flight at once.
struct BarrierClient {
    barrier: Arc<Barrier>,
}

#[async_trait]
impl ChatClient for BarrierClient {
    async fn chat(&self, _request: ChatRequest) -> Result<ChatResponse> {
        anyhow::bail!("not used")
    }

    async fn chat_stream(&self, _request: ChatRequest) -> Result<FragmentStream> {
        let barrier = Arc::clone(&self.barrier);
        Ok(Box::pin(async_stream::stream! {
            barrier.wait().await;
            yield Ok(StreamEvent::Token { content: "ok".to_string() });
            yield Ok(StreamEvent::Done { finish_reason: None });
        }))
    }
}

fn service_with(client: Arc<dyn ChatClient>) -> (Arc<ConversationService>, Arc<StateStore>) {
    let store = Arc::new(StateStore::new(Arc::new(MemoryKv::new()), PROMPT));
    let service = Arc::new(ConversationService::new(
        Arc::clone(&store),
        client,
        "test-model",
        ChatOptions::new(),
    ));
    (service, store)
}

async fn run_query(service: &ConversationService, thread: &str, question: &str) -> String {
    let stream = service.query(thread, question).await.unwrap();
    let fragments: Vec<String> = stream.collect().await;
    fragments.concat()
}

#[tokio::test]
async fn test_first_query_creates_thread_lazily() {
    let (service, store) = service_with(Arc::new(EchoClient::new()));
    let thread = thread_id();

    let reply = run_query(&service, &thread, "hello").await;
    assert_eq!(reply, "re: hello");

    let state = store.load_existing(&thread).await.unwrap();
    assert_eq!(state.messages.len(), 3);
    assert_eq!(state.messages[0].role, MessageRole::System);
    assert_eq!(state.messages[1].role, MessageRole::User);
    assert_eq!(state.messages[1].content, "hello");
    assert_eq!(state.messages[2].role, MessageRole::Assistant);
    assert_eq!(state.messages[2].content, "re: hello");
}

#[tokio::test]
async fn test_n_queries_store_one_plus_two_n_messages() {
    let (service, store) = service_with(Arc::new(EchoClient::new()));
    let thread = thread_id();

    for i in 1..=3 {
        run_query(&service, &thread, &format!("question {}", i)).await;
    }

    let state = store.load_existing(&thread).await.unwrap();
    assert_eq!(state.messages.len(), 7);

    let roles: Vec<MessageRole> = state.messages.iter().map(|m| m.role).collect();
    assert_eq!(
        roles,
        vec![
            MessageRole::System,
            MessageRole::User,
            MessageRole::Assistant,
            MessageRole::User,
            MessageRole::Assistant,
            MessageRole::User,
            MessageRole::Assistant,
        ]
    );

    // Strict chronological append order.
    for pair in state.messages.windows(2) {
        assert!(pair[0].created_at <= pair[1].created_at);
    }
}

#[tokio::test]
async fn test_title_set_from_first_question_only() {
    let (service, store) = service_with(Arc::new(EchoClient::new()));
    let thread = thread_id();

    run_query(&service, &thread, "short question").await;
    let state = store.load_existing(&thread).await.unwrap();
    assert_eq!(state.metadata.title, "short question");

    run_query(&service, &thread, "a different follow-up").await;
    let state = store.load_existing(&thread).await.unwrap();
    assert_eq!(state.metadata.title, "short question");
}

#[tokio::test]
async fn test_long_first_question_is_truncated_in_title() {
    let (service, store) = service_with(Arc::new(EchoClient::new()));
    let thread = thread_id();
    let question = "w".repeat(45);

    run_query(&service, &thread, &question).await;

    let state = store.load_existing(&thread).await.unwrap();
    assert_eq!(state.metadata.title, format!("{}...", "w".repeat(30)));
}

#[tokio::test]
async fn test_set_title_overrides_and_requires_existing_thread() {
    let (service, store) = service_with(Arc::new(EchoClient::new()));
    let thread = thread_id();

    run_query(&service, &thread, "original").await;
    service.set_title(&thread, "renamed").await.unwrap();
    let state = store.load_existing(&thread).await.unwrap();
    assert_eq!(state.metadata.title, "renamed");

    let err = service.set_title("never-stored", "x").await.unwrap_err();
    assert!(matches!(
        err,
        ChatError::Persist(PersistError::ThreadNotFound(_))
    ));
}

#[tokio::test]
async fn test_zero_fragment_failure_leaves_state_unchanged() {
    let (service, store) = service_with(Arc::new(FailingClient { fragments: vec![] }));
    let thread = thread_id();
    service.init(&thread).await.unwrap();

    let fragments: Vec<String> = service
        .query(&thread, "doomed")
        .await
        .unwrap()
        .collect()
        .await;
    assert!(fragments.is_empty());

    let state = store.load_existing(&thread).await.unwrap();
    assert_eq!(state.messages.len(), 1);
}

#[tokio::test]
async fn test_partial_failure_persists_what_was_delivered() {
    let (service, store) = service_with(Arc::new(FailingClient {
        fragments: vec!["par".to_string(), "tial".to_string()],
    }));
    let thread = thread_id();

    let fragments: Vec<String> = service
        .query(&thread, "interrupted")
        .await
        .unwrap()
        .collect()
        .await;
    assert_eq!(fragments.concat(), "partial");

    let state = store.load_existing(&thread).await.unwrap();
    assert_eq!(state.messages.len(), 3);
    assert_eq!(state.messages[2].role, MessageRole::Assistant);
    assert_eq!(state.messages[2].content, "partial");
}

#[tokio::test]
async fn test_concurrent_queries_on_same_thread_serialize() {
    let (service, store) = service_with(Arc::new(EchoClient::with_delay(
        Duration::from_millis(20),
    )));
    let thread = thread_id();

    let a = {
        let service = Arc::clone(&service);
        let thread = thread.clone();
        tokio::spawn(async move { run_query(&service, &thread, "A").await })
    };
    let b = {
        let service = Arc::clone(&service);
        let thread = thread.clone();
        tokio::spawn(async move { run_query(&service, &thread, "B").await })
    };

    assert_eq!(a.await.unwrap(), "re: A");
    assert_eq!(b.await.unwrap(), "re: B");

    let state = store.load_existing(&thread).await.unwrap();
    assert_eq!(state.messages.len(), 5, "no lost or duplicated exchanges");

    // Each user message is immediately followed by its own reply; the two
    // exchanges may land in either order but never interleave.
    let questions: Vec<&str> = state
        .messages
        .iter()
        .filter(|m| m.role == MessageRole::User)
        .map(|m| m.content.as_str())
        .collect();
    assert_eq!(questions.len(), 2);
    assert!(questions.contains(&"A") && questions.contains(&"B"));

    for (i, message) in state.messages.iter().enumerate() {
        if message.role == MessageRole::User {
            let reply = &state.messages[i + 1];
            assert_eq!(reply.role, MessageRole::Assistant);
            assert_eq!(reply.content, format!("re: {}", message.content));
        }
    }
}

#[tokio::test]
async fn test_queries_on_distinct_threads_run_in_parallel() {
    let barrier = Arc::new(Barrier::new(2));
    let (service, _store) = service_with(Arc::new(BarrierClient {
        barrier: Arc::clone(&barrier),
    }));

    // Both generations must be in flight at once for the barrier to
    // release; a serialized service would deadlock here.
    let result = timeout(Duration::from_secs(5), async {
        let a = {
            let service = Arc::clone(&service);
            tokio::spawn(async move { run_query(&service, "thread-a", "x").await })
        };
        let b = {
            let service = Arc::clone(&service);
            tokio::spawn(async move { run_query(&service, "thread-b", "y").await })
        };
        (a.await.unwrap(), b.await.unwrap())
    })
    .await
    .expect("distinct threads blocked each other");

    assert_eq!(result, ("ok".to_string(), "ok".to_string()));
}

#[tokio::test]
async fn test_dropped_receiver_does_not_abort_persistence() {
    let (service, store) = service_with(Arc::new(EchoClient::with_delay(
        Duration::from_millis(10),
    )));
    let thread = thread_id();

    let stream = service.query(&thread, "still recorded").await.unwrap();
    drop(stream); // client disconnects immediately

    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    loop {
        if let Ok(state) = store.load_existing(&thread).await {
            if state.messages.len() == 3 {
                assert_eq!(state.messages[2].content, "re: still recorded");
                break;
            }
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "exchange was never persisted after disconnect"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

#[tokio::test]
async fn test_init_resets_thread_to_initial_state() {
    let (service, store) = service_with(Arc::new(EchoClient::new()));
    let thread = thread_id();

    run_query(&service, &thread, "some history").await;
    service.init(&thread).await.unwrap();

    let state = store.load_existing(&thread).await.unwrap();
    assert_eq!(state.messages.len(), 1);
    assert_eq!(state.messages[0].role, MessageRole::System);
    assert_eq!(state.metadata.title, "New Chat");
}

#[tokio::test]
async fn test_clear_preserves_created_at() {
    let (service, store) = service_with(Arc::new(EchoClient::new()));
    let thread = thread_id();

    run_query(&service, &thread, "history").await;
    let before = store.load_existing(&thread).await.unwrap();

    service.clear(&thread).await.unwrap();
    let after = store.load_existing(&thread).await.unwrap();

    assert_eq!(after.messages.len(), 1);
    assert_eq!(after.metadata.created_at, before.metadata.created_at);
    assert!(after.metadata.updated_at >= before.metadata.updated_at);
    assert_eq!(after.metadata.title, "New Chat");
}

#[tokio::test]
async fn test_conversation_omits_system_messages() {
    let (service, _store) = service_with(Arc::new(EchoClient::new()));
    let thread = thread_id();

    run_query(&service, &thread, "visible?").await;

    let messages = service.conversation(&thread).await.unwrap();
    assert_eq!(messages.len(), 2);
    assert!(messages.iter().all(|m| m.role != MessageRole::System));
}
