//! # Completion Client Module
//!
//! Thin client for an OpenAI-compatible chat-completions endpoint, used only
//! by the extraction tooling. The dispatch service never calls it.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;

/// Completions can legitimately take a while on large specs
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Upper bound for extraction responses; large specs produce large JSON
const MAX_COMPLETION_TOKENS: u32 = 16_000;

/// System prompt for the question-extraction completion
pub const EXTRACT_QUESTIONS_SYSTEM_PROMPT: &str = "\
You extract open clarification questions from software specification documents. \
Return ONLY a JSON array, no code fences and no commentary. Each element must \
have the string fields \"topic\", \"question\", \"context\", and \
\"answer_options\" (empty string when the spec offers no options), and may have \
\"recommended_option\" or \"suggested_answer\" when the spec suggests one.";

/// Build the user prompt for the question-extraction completion
pub fn extract_questions_user_prompt(spec_content: &str) -> String {
    format!(
        "Extract every open clarification question from the following \
         specification. Include questions marked with [NEEDS CLARIFICATION] \
         as well as unresolved decisions phrased as open questions.\n\n\
         Specification:\n\n{spec_content}"
    )
}

// ============================================================================
// Error Types
// ============================================================================

/// Error type for completion API failures
#[derive(Debug, thiserror::Error)]
pub enum CompletionError {
    #[error("Completion API returned HTTP {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Completion API request failed: {message}")]
    Transport { message: String },

    #[error("Completion API response could not be decoded: {message}")]
    Decode { message: String },
}

impl From<reqwest::Error> for CompletionError {
    fn from(error: reqwest::Error) -> Self {
        Self::Transport {
            message: error.to_string(),
        }
    }
}

// ============================================================================
// Trait Seam
// ============================================================================

/// One prompt/response round trip against a completion service
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(
        &self,
        system_prompt: &str,
        user_prompt: &str,
    ) -> Result<String, CompletionError>;
}

// ============================================================================
// OpenAI-compatible client
// ============================================================================

/// Client for an OpenAI-compatible `chat/completions` endpoint
#[derive(Debug, Clone)]
pub struct OpenAiCompletionClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl OpenAiCompletionClient {
    /// Build a client for an endpoint and model
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Result<Self, CompletionError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            http,
            base_url: {
                let base: String = base_url.into();
                base.trim_end_matches('/').to_string()
            },
            api_key: api_key.into(),
            model: model.into(),
        })
    }
}

#[async_trait]
impl CompletionClient for OpenAiCompletionClient {
    async fn complete(
        &self,
        system_prompt: &str,
        user_prompt: &str,
    ) -> Result<String, CompletionError> {
        let payload = json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": system_prompt},
                {"role": "user", "content": user_prompt}
            ],
            "max_completion_tokens": MAX_COMPLETION_TOKENS,
        });

        let response = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            // Azure-hosted deployments authenticate with this header instead
            // of the bearer token; sending both keeps either host happy.
            .header("api-key", &self.api_key)
            .json(&payload)
            .send()
            .await?;

        let status = response.status().as_u16();
        let body = response.text().await?;

        if status != 200 {
            return Err(CompletionError::Status {
                status,
                message: body.chars().take(500).collect(),
            });
        }

        let parsed: Value = serde_json::from_str(&body).map_err(|e| CompletionError::Decode {
            message: e.to_string(),
        })?;

        parsed
            .pointer("/choices/0/message/content")
            .and_then(Value::as_str)
            .map(|content| content.trim().to_string())
            .ok_or_else(|| CompletionError::Decode {
                message: "response carried no message content".to_string(),
            })
    }
}

#[cfg(test)]
#[path = "llm_tests.rs"]
mod tests;
