use std::time::Duration;

use reqwest::blocking::Client;
use serde_json::Value;
use tracing::{info, warn};

use crate::generator::parse::parse_response;
use crate::generator::prompt::build_request;
use crate::generator::{GenerateError, QuestionGenerator};
use crate::question::{Difficulty, Question, QuestionKind};

/// Gemini `generateContent` with a JSON response schema.
pub struct GeminiGenerator {
    client: Client,
    endpoint: String,
    model: String,
    api_key: String,
}

impl GeminiGenerator {
    pub fn new(
        api_key: &str,
        endpoint: &str,
        model: &str,
        timeout: Duration,
    ) -> Result<Self, GenerateError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GenerateError::Network(e.to_string()))?;
        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            model: model.to_string(),
            api_key: api_key.to_string(),
        })
    }

    fn url(&self) -> String {
        format!("{}/models/{}:generateContent", self.endpoint, self.model)
    }
}

impl QuestionGenerator for GeminiGenerator {
    fn generate(
        &self,
        kind: QuestionKind,
        difficulty: Difficulty,
        count: usize,
    ) -> Result<Vec<Question>, GenerateError> {
        if self.api_key.is_empty() {
            return Err(GenerateError::Unavailable(
                "no generation API key configured".to_string(),
            ));
        }
        info!(kind = %kind, difficulty = %difficulty, count, "requesting questions");
        let response = self
            .client
            .post(self.url())
            .query(&[("key", self.api_key.as_str())])
            .json(&build_request(kind, difficulty, count))
            .send()
            .map_err(|e| GenerateError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            warn!(status = status.as_u16(), "generation request rejected");
            return Err(GenerateError::Status(status.as_u16()));
        }
        let body: Value = response
            .json()
            .map_err(|e| GenerateError::MalformedPayload(e.to_string()))?;

        let questions = parse_response(kind, difficulty, &body, &mut rand::thread_rng())?;
        info!(kind = %kind, received = questions.len(), "questions generated");
        Ok(questions)
    }
}
