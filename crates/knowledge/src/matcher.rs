//! Answer lookup against the knowledge base.
//!
//! Strategies run in order of confidence and the first one that accepts wins:
//!
//! 1. greeting phrases anywhere in the input
//! 2. exact question match (case and surrounding whitespace ignored)
//! 3. keyword overlap scoring, accepted above [`KEYWORD_THRESHOLD`]
//! 4. embedding cosine similarity, accepted at or above [`SEMANTIC_THRESHOLD`]

use crate::embedding::{cosine_similarity, Embedder};
use crate::text::{content_words, normalize, strip_punctuation};
use std::collections::HashSet;
use std::sync::Arc;
use vistula_bot_common::{DiagnosticEvent, DiagnosticSink, KbRecord};

pub const GREETINGS: &[&str] = &[
    "hi",
    "hello",
    "hey",
    "good morning",
    "good afternoon",
    "good evening",
];
pub const GREETING_REPLY: &str = "Hello! How may I help you?";

pub const KEYWORD_BONUS: f32 = 0.3;
/// Keyword scores must be strictly greater than this.
pub const KEYWORD_THRESHOLD: f32 = 0.15;
/// Similarities equal to this are accepted.
pub const SEMANTIC_THRESHOLD: f32 = 0.6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchStrategy {
    Greeting,
    Exact,
    Keyword,
    Semantic,
}

#[derive(Debug, Clone, PartialEq)]
pub struct KbMatch {
    pub answer: String,
    pub strategy: MatchStrategy,
    /// Position of the record in the KB; `None` for greetings.
    pub index: Option<usize>,
    pub score: f32,
}

// Per-record data derived once at construction.
struct PreparedRecord {
    normalized_question: String,
    words: HashSet<String>,
    keywords: Vec<String>,
}

impl PreparedRecord {
    fn from_record(record: &KbRecord) -> Self {
        Self {
            normalized_question: normalize(&record.question),
            words: content_words(&record.question),
            keywords: record.keywords.iter().map(|k| k.to_lowercase()).collect(),
        }
    }
}

pub struct Matcher {
    records: Arc<Vec<KbRecord>>,
    prepared: Vec<PreparedRecord>,
    embedder: Option<Arc<dyn Embedder>>,
    vectors: Vec<Vec<f32>>,
    sink: Arc<dyn DiagnosticSink>,
}

impl Matcher {
    pub fn new(records: Arc<Vec<KbRecord>>, sink: Arc<dyn DiagnosticSink>) -> Self {
        let prepared = records.iter().map(PreparedRecord::from_record).collect();

        Self {
            records,
            prepared,
            embedder: None,
            vectors: Vec::new(),
            sink,
        }
    }

    /// Enables the semantic stage. `vectors` must hold one entry per record,
    /// in KB order, produced by the same embedder.
    pub fn with_semantic(mut self, embedder: Arc<dyn Embedder>, vectors: Vec<Vec<f32>>) -> Self {
        self.embedder = Some(embedder);
        self.vectors = vectors;
        self
    }

    pub fn records(&self) -> &[KbRecord] {
        &self.records
    }

    pub fn semantic_enabled(&self) -> bool {
        self.embedder.is_some() && !self.vectors.is_empty() && self.vectors.len() == self.records.len()
    }

    pub async fn find_answer(&self, question: &str) -> Option<KbMatch> {
        if let Some(found) = self.match_lexical(question) {
            return Some(found);
        }
        self.match_semantic(question).await
    }

    /// Greeting, exact and keyword stages. Pure, so repeated calls agree.
    pub fn match_lexical(&self, question: &str) -> Option<KbMatch> {
        let normalized = normalize(question);

        if GREETINGS.iter().any(|greeting| normalized.contains(greeting)) {
            self.sink.record(DiagnosticEvent::GreetingMatched);
            return Some(KbMatch {
                answer: GREETING_REPLY.to_string(),
                strategy: MatchStrategy::Greeting,
                index: None,
                score: 1.0,
            });
        }

        if let Some(index) = self
            .prepared
            .iter()
            .position(|record| record.normalized_question == normalized)
        {
            self.sink.record(DiagnosticEvent::ExactMatch { index });
            return Some(self.answer_at(index, MatchStrategy::Exact, 1.0));
        }

        match self.best_keyword_match(&normalized) {
            Some((index, score)) if score > KEYWORD_THRESHOLD => {
                self.sink.record(DiagnosticEvent::KeywordMatch { index, score });
                Some(self.answer_at(index, MatchStrategy::Keyword, score))
            }
            best => {
                self.sink.record(DiagnosticEvent::KeywordRejected {
                    best_score: best.map(|(_, score)| score).unwrap_or(0.0),
                });
                None
            }
        }
    }

    /// Highest keyword score over the KB; the first record wins ties.
    /// Records scoring zero are never selected.
    pub fn best_keyword_match(&self, normalized_question: &str) -> Option<(usize, f32)> {
        let user_words = content_words(normalized_question);
        let mut best: Option<(usize, f32)> = None;

        for (index, record) in self.prepared.iter().enumerate() {
            let mut score = if record.words.is_empty() {
                0.0
            } else {
                let overlap = user_words.intersection(&record.words).count();
                overlap as f32 / record.words.len() as f32
            };

            if record
                .keywords
                .iter()
                .any(|keyword| normalized_question.contains(keyword.as_str()))
            {
                score += KEYWORD_BONUS;
            }

            if score > best.map(|(_, s)| s).unwrap_or(0.0) {
                best = Some((index, score));
            }
        }

        best
    }

    /// Index and similarity of the closest cached vector; the first wins ties.
    pub fn best_semantic_match(&self, query: &[f32]) -> Option<(usize, f32)> {
        let mut best: Option<(usize, f32)> = None;

        for (index, vector) in self.vectors.iter().enumerate() {
            let similarity = cosine_similarity(query, vector);
            match best {
                Some((_, best_similarity)) if similarity <= best_similarity => {}
                _ => best = Some((index, similarity)),
            }
        }

        best
    }

    async fn match_semantic(&self, question: &str) -> Option<KbMatch> {
        let embedder = match &self.embedder {
            Some(embedder) if self.semantic_enabled() => embedder,
            _ => {
                self.sink.record(DiagnosticEvent::SemanticUnavailable {
                    reason: "no embeddings loaded for the knowledge base".to_string(),
                });
                return None;
            }
        };

        let query = strip_punctuation(question);
        let query_vector = match embedder.embed(&[query]).await {
            Ok(mut vectors) if vectors.len() == 1 => vectors.remove(0),
            Ok(vectors) => {
                self.sink.record(DiagnosticEvent::SemanticUnavailable {
                    reason: format!("expected 1 query embedding, got {}", vectors.len()),
                });
                return None;
            }
            Err(e) => {
                self.sink.record(DiagnosticEvent::SemanticUnavailable {
                    reason: e.to_string(),
                });
                return None;
            }
        };

        let cached_dimension = self.vectors.first().map(Vec::len).unwrap_or(0);
        if query_vector.len() != cached_dimension {
            self.sink.record(DiagnosticEvent::SemanticUnavailable {
                reason: format!(
                    "query embedding has {} dimensions, cached vectors have {}",
                    query_vector.len(),
                    cached_dimension
                ),
            });
            return None;
        }

        match self.best_semantic_match(&query_vector) {
            Some((index, similarity)) if similarity >= SEMANTIC_THRESHOLD => {
                self.sink
                    .record(DiagnosticEvent::SemanticMatch { index, similarity });
                Some(self.answer_at(index, MatchStrategy::Semantic, similarity))
            }
            best => {
                self.sink.record(DiagnosticEvent::SemanticRejected {
                    best_similarity: best.map(|(_, s)| s).unwrap_or(0.0),
                });
                None
            }
        }
    }

    fn answer_at(&self, index: usize, strategy: MatchStrategy, score: f32) -> KbMatch {
        KbMatch {
            answer: self.records[index].answer.clone(),
            strategy,
            index: Some(index),
            score,
        }
    }
}
