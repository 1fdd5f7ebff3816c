//! OpenAI-compatible grading oracle.
//!
//! One chat-completions call per invocation, with a JSON-schema response
//! constraint. The oracle's claim to emit valid JSON is never trusted; the
//! evaluation pipeline re-validates everything server-side.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use checkride_core::error::OracleError;
use checkride_core::traits::{GradingOracle, OracleRequest, ORACLE_SYSTEM_PROMPT};

const DEFAULT_BASE_URL: &str = "https://api.openai.com";
const DEFAULT_MODEL: &str = "gpt-4.1";
const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// OpenAI-compatible API grading oracle.
pub struct OpenAiOracle {
    api_key: String,
    base_url: String,
    model: String,
    client: reqwest::Client,
}

impl OpenAiOracle {
    pub fn new(api_key: &str, base_url: Option<String>, model: Option<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .expect("failed to build HTTP client");

        Self {
            api_key: api_key.to_string(),
            base_url: base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            model: model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            client,
        }
    }

    /// The user message for a request: grading context on the first turn, a
    /// correction demand embedding the invalid output on repair turns.
    fn user_content(request: &OracleRequest) -> String {
        let context = format!(
            "Question stem: {}\nACS task code: {}\nStudent answer: {}",
            request.stem, request.acs_task_code, request.answer
        );

        match &request.invalid_reply {
            None => context,
            Some(invalid) => format!(
                "Your previous output was invalid JSON for the required schema.\n\
                 Fix it and return only valid JSON with the required keys.\n\
                 Original context:\n{context}\n\nInvalid output to fix:\n{invalid}"
            ),
        }
    }

    /// JSON-schema constraint for the verdict shape.
    fn response_format() -> serde_json::Value {
        serde_json::json!({
            "type": "json_schema",
            "json_schema": {
                "name": "oral_evaluation",
                "schema": {
                    "type": "object",
                    "additionalProperties": false,
                    "required": [
                        "result", "confidence", "feedback",
                        "missing_points", "probe_question", "acs_task_code"
                    ],
                    "properties": {
                        "result": {
                            "type": "string",
                            "enum": ["PASS", "PROBE", "REMEDIATE", "FAIL"]
                        },
                        "confidence": { "type": "number", "minimum": 0, "maximum": 1 },
                        "feedback": { "type": "string" },
                        "missing_points": { "type": "array", "items": { "type": "string" } },
                        "probe_question": { "anyOf": [{ "type": "string" }, { "type": "null" }] },
                        "acs_task_code": { "type": "string" }
                    }
                }
            }
        })
    }
}

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    response_format: serde_json::Value,
}

#[derive(Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

#[async_trait]
impl GradingOracle for OpenAiOracle {
    fn name(&self) -> &str {
        "openai"
    }

    #[instrument(skip(self, request), fields(model = %self.model, acs = %request.acs_task_code))]
    async fn complete(&self, request: &OracleRequest) -> anyhow::Result<String> {
        let body = ChatRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: ORACLE_SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: Self::user_content(request),
                },
            ],
            response_format: Self::response_format(),
        };

        let response = self
            .client
            .post(format!("{}/v1/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    OracleError::Timeout(DEFAULT_TIMEOUT_SECS)
                } else {
                    OracleError::NetworkError(e.to_string())
                }
            })?;

        let status = response.status().as_u16();
        if status == 401 {
            let body = response.text().await.unwrap_or_default();
            return Err(OracleError::AuthenticationFailed(body).into());
        }
        if status >= 400 {
            let body = response.text().await.unwrap_or_default();
            return Err(OracleError::ApiError {
                status,
                message: body,
            }
            .into());
        }

        let api_response: ChatResponse = response.json().await.map_err(|e| {
            OracleError::ApiError {
                status: 0,
                message: format!("failed to parse response: {e}"),
            }
        })?;

        let content = api_response
            .choices
            .first()
            .and_then(|c| c.message.content.clone())
            .filter(|c| !c.trim().is_empty())
            .ok_or(OracleError::EmptyReply)?;

        Ok(content)
    }
}
