use crate::embedding::Embedder;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};
use vistula_bot_common::{BotError, DiagnosticEvent, DiagnosticSink, Result};

pub const VECTORS_FILE: &str = "kb_embeddings.json";
pub const QUESTIONS_FILE: &str = "kb_questions.json";

/// What the persisted vectors were computed from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheSnapshot {
    pub model: String,
    pub dimension: usize,
    pub questions: Vec<String>,
}

/// Persisted embeddings of the KB questions.
///
/// The vectors are stored next to a snapshot of the embedding model and the
/// exact question list that produced them. They are reused only while the
/// model matches and the questions are unchanged (same values, same order);
/// any difference rebuilds every vector.
pub struct EmbeddingCache {
    dir: PathBuf,
    embedder: Arc<dyn Embedder>,
    sink: Arc<dyn DiagnosticSink>,
}

impl EmbeddingCache {
    pub fn new(
        dir: impl Into<PathBuf>,
        embedder: Arc<dyn Embedder>,
        sink: Arc<dyn DiagnosticSink>,
    ) -> Self {
        Self {
            dir: dir.into(),
            embedder,
            sink,
        }
    }

    pub fn vectors_path(&self) -> PathBuf {
        self.dir.join(VECTORS_FILE)
    }

    pub fn questions_path(&self) -> PathBuf {
        self.dir.join(QUESTIONS_FILE)
    }

    pub async fn get_or_build(&self, questions: &[String]) -> Result<Vec<Vec<f32>>> {
        if questions.is_empty() {
            return Ok(Vec::new());
        }

        if let Some(vectors) = self.load_persisted(questions).await {
            self.sink.record(DiagnosticEvent::EmbeddingCacheHit {
                entries: vectors.len(),
            });
            return Ok(vectors);
        }

        let vectors = self.embedder.embed(questions).await?;
        if vectors.len() != questions.len() {
            return Err(BotError::Embedding(format!(
                "embedder returned {} vectors for {} questions",
                vectors.len(),
                questions.len()
            )));
        }

        let dimension = vectors[0].len();
        if vectors.iter().any(|vector| vector.len() != dimension) {
            return Err(BotError::Embedding(
                "embedder returned vectors of differing dimensions".to_string(),
            ));
        }

        let snapshot = CacheSnapshot {
            model: self.embedder.model().to_string(),
            dimension,
            questions: questions.to_vec(),
        };
        if let Err(e) = self.persist(&snapshot, &vectors).await {
            warn!("Failed to persist embedding cache in {}: {}", self.dir.display(), e);
        }

        self.sink.record(DiagnosticEvent::EmbeddingCacheRebuilt {
            entries: vectors.len(),
        });
        Ok(vectors)
    }

    async fn load_persisted(&self, questions: &[String]) -> Option<Vec<Vec<f32>>> {
        let snapshot: CacheSnapshot = read_json(&self.questions_path()).await?;
        if snapshot.model != self.embedder.model() {
            debug!(
                "Embedding cache was built with {}, now using {}",
                snapshot.model,
                self.embedder.model()
            );
            return None;
        }
        if snapshot.questions != questions {
            debug!("KB questions changed since the embedding cache was written");
            return None;
        }

        let vectors: Vec<Vec<f32>> = read_json(&self.vectors_path()).await?;
        if vectors.len() != snapshot.questions.len() {
            debug!(
                "Embedding cache holds {} vectors for {} questions",
                vectors.len(),
                snapshot.questions.len()
            );
            return None;
        }
        if vectors.iter().any(|vector| vector.len() != snapshot.dimension) {
            debug!("Embedding cache vectors do not have {} dimensions", snapshot.dimension);
            return None;
        }

        Some(vectors)
    }

    // Vectors go first: a partial write leaves an outdated snapshot, which
    // forces a rebuild on the next start.
    async fn persist(&self, snapshot: &CacheSnapshot, vectors: &[Vec<f32>]) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir).await?;
        tokio::fs::write(self.vectors_path(), serde_json::to_vec(vectors)?).await?;
        tokio::fs::write(self.questions_path(), serde_json::to_vec_pretty(snapshot)?).await?;
        Ok(())
    }
}

async fn read_json<T: DeserializeOwned>(path: &Path) -> Option<T> {
    let bytes = tokio::fs::read(path).await.ok()?;
    serde_json::from_slice(&bytes).ok()
}
