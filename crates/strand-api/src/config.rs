use config::{Config as ConfigLoader, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub cors: CorsConfig,
    pub redis: RedisConfig,
    pub llm: LlmConfig,
    #[serde(default)]
    pub chat: ChatConfig,
    pub logging: LoggingConfig,

    // Secret (from ENV only; empty for keyless local endpoints)
    #[serde(default)]
    pub openai_api_key: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CorsConfig {
    pub enabled: bool,
    pub origins: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LlmConfig {
    pub model: String,
    /// Base URL of any OpenAI-compatible endpoint (Ollama's `/v1`, a hosted
    /// provider, ...)
    pub base_url: String,
    pub temperature: f32,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChatConfig {
    /// Standing system prompt; falls back to the built-in template.
    pub system_prompt: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

impl Config {
    /// Load configuration from TOML files and environment variables
    ///
    /// Hierarchy (weakest to strongest):
    /// 1. config/default.toml
    /// 2. config/{ENV}.toml (if ENV is set)
    /// 3. Environment variables (SERVER_, REDIS_, LLM_, LOGGING_, CHAT_ prefixes)
    pub fn load() -> Result<Self, ConfigError> {
        let env = std::env::var("ENV").unwrap_or_else(|_| "dev".to_string());

        let builder = ConfigLoader::builder()
            // 1. Load default config
            .add_source(File::with_name("config/default").required(false))
            // 2. Load environment-specific config
            .add_source(File::with_name(&format!("config/{}", env)).required(false))
            // 3. Environment variables override everything
            .add_source(
                Environment::default()
                    .prefix("SERVER")
                    .keep_prefix(true)
                    .separator("_")
                    .try_parsing(true),
            )
            .add_source(
                Environment::default()
                    .prefix("REDIS")
                    .keep_prefix(true)
                    .separator("_")
                    .try_parsing(true),
            )
            .add_source(
                Environment::default()
                    .prefix("LOGGING")
                    .keep_prefix(true)
                    .separator("_")
                    .try_parsing(true),
            );

        let config = builder.build()?;

        let mut cfg: Config = config.try_deserialize()?;

        // Underscored field names do not survive separator splitting, so
        // these overrides are applied directly.
        if let Ok(model) = std::env::var("LLM_MODEL") {
            cfg.llm.model = model;
        }
        if let Ok(base_url) = std::env::var("LLM_BASE_URL") {
            cfg.llm.base_url = base_url;
        }
        if let Ok(prompt) = std::env::var("CHAT_SYSTEM_PROMPT") {
            cfg.chat.system_prompt = Some(prompt);
        }

        // Secret from ENV only (not in TOML); optional because local
        // OpenAI-compatible endpoints accept keyless requests.
        cfg.openai_api_key = std::env::var("OPENAI_API_KEY").unwrap_or_default();

        Ok(cfg)
    }

    /// Load config from a specific path (useful for testing)
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let builder = ConfigLoader::builder().add_source(File::from(path.as_ref()));

        let config = builder.build()?;
        config.try_deserialize()
    }
}
