//! Knowledge base lookup: KB loading, embeddings and answer matching

pub mod embedding;
pub mod embedding_cache;
pub mod kb_store;
pub mod matcher;
pub mod text;

pub use embedding::{cosine_similarity, Embedder, OpenAiEmbedder, DEFAULT_EMBEDDING_MODEL};
pub use embedding_cache::{CacheSnapshot, EmbeddingCache};
pub use kb_store::{kb_questions, KbStore};
pub use matcher::{KbMatch, MatchStrategy, Matcher, GREETING_REPLY};
