use config::{Config, Environment};
use serde::{Deserialize, Deserializer};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;
use vistula_bot_common::{BotError, Result};

pub const ENV_PREFIX: &str = "BOT";
pub const MIN_LLM_TIMEOUT_SECS: u64 = 15;
pub const MAX_LLM_TIMEOUT_SECS: u64 = 20;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    pub host: String,
    pub port: u16,
    #[serde(deserialize_with = "comma_separated")]
    pub cors_origins: Vec<String>,
    pub kb_path: PathBuf,
    pub cache_dir: PathBuf,
    pub llm_timeout_secs: u64,
    pub embedding_model: String,
    #[serde(skip)]
    pub credentials: Credentials,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            cors_origins: vec!["http://localhost:3000".to_string()],
            kb_path: PathBuf::from("data/kb.json"),
            cache_dir: PathBuf::from("data/cache"),
            llm_timeout_secs: MIN_LLM_TIMEOUT_SECS,
            embedding_model: vistula_bot_knowledge::DEFAULT_EMBEDDING_MODEL.to_string(),
            credentials: Credentials::default(),
        }
    }
}

impl BotConfig {
    /// Reads `.env` and `api.env` when present, then `BOT_*` settings and
    /// provider keys from the process environment.
    pub fn load() -> Result<Self> {
        dotenv::dotenv().ok();
        dotenv::from_filename("api.env").ok();

        let mut config =
            Self::from_environment(Environment::with_prefix(ENV_PREFIX).try_parsing(true))?;
        config.credentials = Credentials::from_env();

        info!("OPENROUTER_API_KEY loaded: {}", config.credentials.openrouter_api_key.is_some());
        info!("DEEPSEEK_API_KEY loaded: {}", config.credentials.deepseek_api_key.is_some());
        info!("OPENAI_API_KEY loaded: {}", config.credentials.openai_api_key.is_some());

        Ok(config)
    }

    pub fn from_environment(environment: Environment) -> Result<Self> {
        let config: Self = Config::builder()
            .add_source(environment)
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(|e| BotError::Configuration(e.to_string()))?;

        Ok(config.normalized())
    }

    fn normalized(mut self) -> Self {
        self.llm_timeout_secs = self
            .llm_timeout_secs
            .clamp(MIN_LLM_TIMEOUT_SECS, MAX_LLM_TIMEOUT_SECS);
        self
    }

    pub fn llm_timeout(&self) -> Duration {
        Duration::from_secs(self.llm_timeout_secs)
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn comma_separated<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    Ok(raw
        .split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .map(str::to_string)
        .collect())
}

/// Provider API keys. Empty values count as absent.
#[derive(Clone, Default)]
pub struct Credentials {
    pub openrouter_api_key: Option<String>,
    pub deepseek_api_key: Option<String>,
    pub openai_api_key: Option<String>,
}

impl Credentials {
    pub fn new(
        openrouter_api_key: Option<&str>,
        deepseek_api_key: Option<&str>,
        openai_api_key: Option<&str>,
    ) -> Self {
        Self {
            openrouter_api_key: non_empty(openrouter_api_key.map(str::to_string)),
            deepseek_api_key: non_empty(deepseek_api_key.map(str::to_string)),
            openai_api_key: non_empty(openai_api_key.map(str::to_string)),
        }
    }

    pub fn from_env() -> Self {
        Self {
            openrouter_api_key: non_empty(std::env::var("OPENROUTER_API_KEY").ok()),
            deepseek_api_key: non_empty(std::env::var("DEEPSEEK_API_KEY").ok()),
            openai_api_key: non_empty(std::env::var("OPENAI_API_KEY").ok()),
        }
    }
}

// Never print key material.
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("openrouter_api_key", &self.openrouter_api_key.is_some())
            .field("deepseek_api_key", &self.deepseek_api_key.is_some())
            .field("openai_api_key", &self.openai_api_key.is_some())
            .finish()
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
