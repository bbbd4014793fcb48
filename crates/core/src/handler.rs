use crate::fallback::LlmClient;
use std::sync::Arc;
use tracing::{debug, instrument};
use vistula_bot_knowledge::{MatchStrategy, Matcher};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnswerSource {
    KnowledgeBase(MatchStrategy),
    Llm,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Answer {
    pub text: String,
    pub source: AnswerSource,
}

/// Knowledge base first, LLM fallback second. Never fails: every error
/// below this point has already been turned into answer text.
pub struct RequestHandler {
    matcher: Arc<Matcher>,
    llm: Arc<LlmClient>,
}

impl RequestHandler {
    pub fn new(matcher: Arc<Matcher>, llm: Arc<LlmClient>) -> Self {
        Self { matcher, llm }
    }

    pub async fn ask(&self, question: &str) -> String {
        self.answer(question).await.text
    }

    #[instrument(skip_all, fields(question = %question.trim()))]
    pub async fn answer(&self, question: &str) -> Answer {
        let question = question.trim();

        if let Some(found) = self.matcher.find_answer(question).await {
            debug!("Answered from knowledge base via {:?}", found.strategy);
            return Answer {
                text: found.answer,
                source: AnswerSource::KnowledgeBase(found.strategy),
            };
        }

        Answer {
            text: self.llm.complete(question).await,
            source: AnswerSource::Llm,
        }
    }
}
