#[cfg(feature = "network")]
pub mod gemini;
pub mod ids;
pub mod parse;
pub mod prompt;

use thiserror::Error;

use crate::question::{Difficulty, Question, QuestionError, QuestionKind};

#[derive(Debug, Error)]
pub enum GenerateError {
    #[error("generation request failed: {0}")]
    Network(String),
    #[error("generation service returned HTTP {0}")]
    Status(u16),
    #[error("no valid response from the generation service")]
    MissingCandidate,
    #[error("malformed generated questions: {0}")]
    MalformedPayload(String),
    #[error("generated question rejected: {0}")]
    InvalidQuestion(#[from] QuestionError),
    #[error("question generation unavailable: {0}")]
    Unavailable(String),
}

/// Produces a fresh batch of questions. Implementations block until the
/// batch is complete.
pub trait QuestionGenerator: Send + Sync {
    fn generate(
        &self,
        kind: QuestionKind,
        difficulty: Difficulty,
        count: usize,
    ) -> Result<Vec<Question>, GenerateError>;
}

/// Stand-in used when no generation backend is configured.
pub struct UnavailableGenerator {
    reason: String,
}

impl UnavailableGenerator {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl QuestionGenerator for UnavailableGenerator {
    fn generate(
        &self,
        _kind: QuestionKind,
        _difficulty: Difficulty,
        _count: usize,
    ) -> Result<Vec<Question>, GenerateError> {
        Err(GenerateError::Unavailable(self.reason.clone()))
    }
}
