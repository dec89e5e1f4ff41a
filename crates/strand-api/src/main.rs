use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use strand_api::config::Config;
use strand_api::router::build_router;
use strand_api::state::AppState;
use strand_chat::ConversationService;
use strand_llm::{ChatClient, ChatOptions, OpenAIClient};
use strand_persist::{KvStore, RedisKv, StateStore, ThreadIndex, DEFAULT_SYSTEM_PROMPT};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    // Load configuration
    let config =
        Config::load().map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))?;

    // Initialize logging
    init_logging(&config);

    tracing::info!("Starting Strand API server");
    tracing::info!("Config loaded: {}:{}", config.server.host, config.server.port);

    // Initialize chat-model client
    tracing::info!("Initializing chat client against {}", config.llm.base_url);
    let llm_client: Arc<dyn ChatClient> = Arc::new(OpenAIClient::with_base_url(
        config.openai_api_key.clone(),
        config.llm.base_url.clone(),
    )?);

    // Connect the shared key-value backend (one handle for the process)
    tracing::info!("Connecting to Redis at {}", config.redis.url);
    let kv: Arc<dyn KvStore> = Arc::new(RedisKv::connect(&config.redis.url).await?);
    tracing::info!("Redis connected");

    let system_prompt = config
        .chat
        .system_prompt
        .clone()
        .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string());
    let store = Arc::new(StateStore::new(kv, system_prompt));

    let options = ChatOptions::new().temperature(config.llm.temperature);
    let chat = ConversationService::new(
        Arc::clone(&store),
        llm_client,
        config.llm.model.clone(),
        options,
    );
    let index = ThreadIndex::new(store);

    // Create application state
    let state = Arc::new(AppState::new(config.clone(), chat, index));

    // Build router
    let app = build_router(state);

    // Start server
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("Server listening on {}", addr);
    tracing::info!("Health check: http://{}/health", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

fn init_logging(config: &Config) {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.logging.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(env_filter);

    match config.logging.format.as_str() {
        "json" => {
            registry
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            registry
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
    }
}
