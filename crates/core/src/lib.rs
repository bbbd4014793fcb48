pub mod config;
pub mod fallback;
pub mod handler;

use std::sync::Arc;
use tracing::{info, warn};
use vistula_bot_common::{DiagnosticSink, Result};
use vistula_bot_knowledge::{kb_questions, Embedder, EmbeddingCache, KbStore, Matcher, OpenAiEmbedder};

pub use config::{BotConfig, Credentials};
pub use fallback::{LlmClient, ProviderConfig, ProviderKind, MISSING_KEY_ANSWER};
pub use handler::{Answer, AnswerSource, RequestHandler};

/// Everything built once at startup and shared read-only by all requests.
pub struct BotCore {
    pub config: BotConfig,
    pub matcher: Arc<Matcher>,
    pub llm: Arc<LlmClient>,
    pub handler: Arc<RequestHandler>,
}

impl BotCore {
    pub async fn initialize(config: BotConfig, sink: Arc<dyn DiagnosticSink>) -> Result<Self> {
        let embedder: Option<Arc<dyn Embedder>> = match &config.credentials.openai_api_key {
            Some(key) => Some(Arc::new(OpenAiEmbedder::new(key, config.embedding_model.as_str()))),
            None => {
                info!("OPENAI_API_KEY not set, semantic matching disabled");
                None
            }
        };

        Self::initialize_with_embedder(config, embedder, sink).await
    }

    pub async fn initialize_with_embedder(
        config: BotConfig,
        embedder: Option<Arc<dyn Embedder>>,
        sink: Arc<dyn DiagnosticSink>,
    ) -> Result<Self> {
        let records = Arc::new(KbStore::new(&config.kb_path, sink.clone()).load().await);
        let mut matcher = Matcher::new(records.clone(), sink.clone());

        if let Some(embedder) = embedder {
            let cache = EmbeddingCache::new(&config.cache_dir, embedder.clone(), sink.clone());
            match cache.get_or_build(&kb_questions(&records)).await {
                Ok(vectors) => matcher = matcher.with_semantic(embedder, vectors),
                Err(e) => warn!("Failed to build embedding cache, semantic matching disabled: {}", e),
            }
        }

        let llm = LlmClient::new(
            fallback::select_provider(&config.credentials),
            config.llm_timeout(),
            sink,
        )?;

        match llm.provider() {
            Some(provider) => info!("LLM fallback provider: {} ({})", provider.kind.name(), provider.model),
            None => warn!("No LLM provider configured, fallback answers will report a missing key"),
        }

        let matcher = Arc::new(matcher);
        let llm = Arc::new(llm);
        let handler = Arc::new(RequestHandler::new(matcher.clone(), llm.clone()));

        Ok(Self {
            config,
            matcher,
            llm,
            handler,
        })
    }

    pub fn kb_records(&self) -> usize {
        self.matcher.records().len()
    }

    pub fn semantic_enabled(&self) -> bool {
        self.matcher.semantic_enabled()
    }

    pub fn llm_provider(&self) -> Option<&'static str> {
        self.llm.provider().map(|provider| provider.kind.name())
    }
}
