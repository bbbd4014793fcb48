//! Structured diagnostic events emitted by the answer pipeline.
//!
//! Components take an `Arc<dyn DiagnosticSink>` and report what they did
//! instead of writing to the console. The binary wires in [`TracingSink`].

use std::sync::Mutex;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq)]
pub enum DiagnosticEvent {
    KbLoaded { records: usize, source: String },
    KbUnavailable { source: String, reason: String },
    EmbeddingCacheHit { entries: usize },
    EmbeddingCacheRebuilt { entries: usize },
    GreetingMatched,
    ExactMatch { index: usize },
    KeywordMatch { index: usize, score: f32 },
    KeywordRejected { best_score: f32 },
    SemanticMatch { index: usize, similarity: f32 },
    SemanticRejected { best_similarity: f32 },
    SemanticUnavailable { reason: String },
    ProviderSelected { provider: String, model: String },
    ProviderMissing,
    UpstreamFailure { provider: String, category: String, detail: String },
    UpstreamAnswered { provider: String },
}

pub trait DiagnosticSink: Send + Sync {
    fn record(&self, event: DiagnosticEvent);
}

/// Forwards events to `tracing` with structured fields.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn record(&self, event: DiagnosticEvent) {
        match event {
            DiagnosticEvent::KbLoaded { records, source } => {
                info!(records, source = %source, "Knowledge base loaded");
            }
            DiagnosticEvent::KbUnavailable { source, reason } => {
                warn!(source = %source, reason = %reason, "Knowledge base unavailable, continuing with empty KB");
            }
            DiagnosticEvent::EmbeddingCacheHit { entries } => {
                info!(entries, "Embedding cache is up to date");
            }
            DiagnosticEvent::EmbeddingCacheRebuilt { entries } => {
                info!(entries, "Embedding cache rebuilt");
            }
            DiagnosticEvent::GreetingMatched => {
                debug!("Greeting detected");
            }
            DiagnosticEvent::ExactMatch { index } => {
                info!(index, "Answer from KB (exact match)");
            }
            DiagnosticEvent::KeywordMatch { index, score } => {
                info!(index, score, "Answer from KB (keyword match)");
            }
            DiagnosticEvent::KeywordRejected { best_score } => {
                debug!(best_score, "Keyword score below threshold");
            }
            DiagnosticEvent::SemanticMatch { index, similarity } => {
                info!(index, similarity, "Answer from KB (semantic match)");
            }
            DiagnosticEvent::SemanticRejected { best_similarity } => {
                debug!(best_similarity, "Semantic similarity below threshold");
            }
            DiagnosticEvent::SemanticUnavailable { reason } => {
                debug!(reason = %reason, "Semantic matching skipped");
            }
            DiagnosticEvent::ProviderSelected { provider, model } => {
                debug!(provider = %provider, model = %model, "Sending request to LLM provider");
            }
            DiagnosticEvent::ProviderMissing => {
                warn!("No LLM API key set");
            }
            DiagnosticEvent::UpstreamFailure { provider, category, detail } => {
                warn!(provider = %provider, category = %category, detail = %detail, "LLM request failed");
            }
            DiagnosticEvent::UpstreamAnswered { provider } => {
                info!(provider = %provider, "Answer from LLM provider");
            }
        }
    }
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl DiagnosticSink for NullSink {
    fn record(&self, _event: DiagnosticEvent) {}
}

/// Keeps events in memory, in the order they were recorded.
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<DiagnosticEvent>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<DiagnosticEvent> {
        match self.events.lock() {
            Ok(events) => events.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl DiagnosticSink for MemorySink {
    fn record(&self, event: DiagnosticEvent) {
        match self.events.lock() {
            Ok(mut events) => events.push(event),
            Err(poisoned) => poisoned.into_inner().push(event),
        }
    }
}
