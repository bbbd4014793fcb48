use std::path::{Path, PathBuf};
use std::sync::Arc;
use vistula_bot_common::{DiagnosticEvent, DiagnosticSink, KbRecord};

/// Read-only source of knowledge base records.
///
/// The KB file is a JSON array of `{question, answer, keywords?}` objects.
/// A missing or unreadable file yields an empty KB so the service stays
/// queryable through the LLM fallback.
pub struct KbStore {
    path: PathBuf,
    sink: Arc<dyn DiagnosticSink>,
}

impl KbStore {
    pub fn new(path: impl Into<PathBuf>, sink: Arc<dyn DiagnosticSink>) -> Self {
        Self {
            path: path.into(),
            sink,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn load(&self) -> Vec<KbRecord> {
        let source = self.path.display().to_string();

        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) => {
                self.sink.record(DiagnosticEvent::KbUnavailable {
                    source,
                    reason: e.to_string(),
                });
                return Vec::new();
            }
        };

        match serde_json::from_slice::<Vec<KbRecord>>(&bytes) {
            Ok(records) => {
                self.sink.record(DiagnosticEvent::KbLoaded {
                    records: records.len(),
                    source,
                });
                records
            }
            Err(e) => {
                self.sink.record(DiagnosticEvent::KbUnavailable {
                    source,
                    reason: e.to_string(),
                });
                Vec::new()
            }
        }
    }
}

/// Question texts in KB order.
pub fn kb_questions(records: &[KbRecord]) -> Vec<String> {
    records.iter().map(|record| record.question.clone()).collect()
}
