//! OpenRouter-backed optimizer client with automatic retry for transient errors.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;

use async_trait::async_trait;

use super::error::{classify_http_status, OptimizerError, OptimizerErrorKind, RetryConfig};
use super::{SchedulePayload, ScheduleOptimizer, TaskSnapshot};

const OPENROUTER_API_URL: &str = "https://openrouter.ai/api/v1/chat/completions";

/// Name of the function tool the optimizer must call to submit a proposal.
const SUBMIT_FUNCTION: &str = "submit_schedule";

/// OpenRouter API client implementing the optimizer gateway.
pub struct OpenRouterOptimizer {
    client: Client,
    api_key: String,
    model: String,
    timeout: Duration,
    retry_config: RetryConfig,
}

impl OpenRouterOptimizer {
    /// Create a new client with default retry configuration.
    pub fn new(api_key: String, model: String, timeout: Duration) -> Self {
        Self {
            client: Client::new(),
            api_key,
            model,
            timeout,
            retry_config: RetryConfig::default(),
        }
    }

    /// Create a new client with custom retry configuration.
    pub fn with_retry_config(
        api_key: String,
        model: String,
        timeout: Duration,
        retry_config: RetryConfig,
    ) -> Self {
        Self {
            client: Client::new(),
            api_key,
            model,
            timeout,
            retry_config,
        }
    }

    /// Parse Retry-After header if present.
    fn parse_retry_after(headers: &reqwest::header::HeaderMap) -> Option<Duration> {
        headers
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<u64>().ok().map(Duration::from_secs))
    }

    /// Create an OptimizerError from HTTP response status and body.
    fn create_error(
        status: reqwest::StatusCode,
        body: &str,
        retry_after: Option<Duration>,
    ) -> OptimizerError {
        let status_code = status.as_u16();
        match classify_http_status(status_code) {
            OptimizerErrorKind::RateLimited => {
                OptimizerError::rate_limited(body.to_string(), retry_after)
            }
            OptimizerErrorKind::ClientError => {
                OptimizerError::client_error(status_code, body.to_string())
            }
            _ => OptimizerError::server_error(status_code, body.to_string()),
        }
    }

    fn build_request(&self, tasks: &[TaskSnapshot], instructions: &str) -> ChatRequest {
        let payload = SchedulePayload {
            tasks: tasks.to_vec(),
        };
        ChatRequest {
            model: self.model.clone(),
            messages: vec![
                ChatRequestMessage {
                    role: "system",
                    content: instructions.to_string(),
                },
                ChatRequestMessage {
                    role: "user",
                    content: serde_json::to_string(&payload).unwrap_or_default(),
                },
            ],
            tools: vec![ToolDefinition {
                tool_type: "function",
                function: FunctionDefinition {
                    name: SUBMIT_FUNCTION,
                    description: "Submit the rearranged schedule.",
                    parameters: submit_schedule_schema(),
                },
            }],
            tool_choice: json!({
                "type": "function",
                "function": { "name": SUBMIT_FUNCTION }
            }),
        }
    }

    /// Execute a single request without retry.
    async fn execute_request(
        &self,
        request: &ChatRequest,
    ) -> Result<Vec<TaskSnapshot>, OptimizerError> {
        let response = match self
            .client
            .post(OPENROUTER_API_URL)
            .timeout(self.timeout)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(request)
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => {
                if e.is_timeout() {
                    return Err(OptimizerError::network_error(format!(
                        "Request timeout: {}",
                        e
                    )));
                } else if e.is_connect() {
                    return Err(OptimizerError::network_error(format!(
                        "Connection failed: {}",
                        e
                    )));
                } else {
                    return Err(OptimizerError::network_error(format!(
                        "Request failed: {}",
                        e
                    )));
                }
            }
        };

        let status = response.status();
        let retry_after = Self::parse_retry_after(response.headers());
        let body = response.text().await.unwrap_or_default();

        if !status.is_success() {
            return Err(Self::create_error(status, &body, retry_after));
        }

        parse_proposal(&body)
    }
}

/// Extract the proposed task array from a chat-completion response body.
fn parse_proposal(body: &str) -> Result<Vec<TaskSnapshot>, OptimizerError> {
    let parsed: ChatResponse = serde_json::from_str(body).map_err(|e| {
        OptimizerError::parse_error(format!("Failed to parse response: {}, body: {}", e, body))
    })?;

    let choice = parsed
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| OptimizerError::parse_error("No choices in response".to_string()))?;

    let call = choice
        .message
        .tool_calls
        .unwrap_or_default()
        .into_iter()
        .find(|c| c.function.name == SUBMIT_FUNCTION)
        .ok_or_else(|| {
            OptimizerError::parse_error(format!("No {} call in response", SUBMIT_FUNCTION))
        })?;

    let payload: SchedulePayload = serde_json::from_str(&call.function.arguments).map_err(|e| {
        OptimizerError::parse_error(format!(
            "Failed to parse {} arguments: {}",
            SUBMIT_FUNCTION, e
        ))
    })?;

    Ok(payload.tasks)
}

/// JSON schema for the submit_schedule function arguments.
fn submit_schedule_schema() -> serde_json::Value {
    json!({
        "type": "object",
        "properties": {
            "tasks": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "id": { "type": ["string", "null"], "description": "Existing task id, or null for a new task" },
                        "title": { "type": "string" },
                        "desc": { "type": ["string", "null"] },
                        "day_of_week": {
                            "type": "string",
                            "enum": ["Sunday", "Monday", "Tuesday", "Wednesday", "Thursday", "Friday", "Saturday"]
                        },
                        "start_time": { "type": "string", "description": "ISO 8601, e.g. 2025-03-10T09:00:00" },
                        "end_time": { "type": "string" },
                        "all_day": { "type": "boolean" },
                        "is_completed": { "type": ["boolean", "null"] },
                        "is_recurring": { "type": "boolean" },
                        "is_fixed": { "type": "boolean" },
                        "deadline": { "type": ["string", "null"] }
                    },
                    "required": ["title", "day_of_week", "start_time", "end_time"]
                }
            }
        },
        "required": ["tasks"]
    })
}

#[async_trait]
impl ScheduleOptimizer for OpenRouterOptimizer {
    async fn propose(
        &self,
        tasks: &[TaskSnapshot],
        instructions: &str,
    ) -> Result<Vec<TaskSnapshot>, OptimizerError> {
        let request = self.build_request(tasks, instructions);

        let mut attempt = 0;
        loop {
            match self.execute_request(&request).await {
                Ok(proposal) => {
                    tracing::debug!(
                        proposed = proposal.len(),
                        submitted = tasks.len(),
                        "optimizer returned a proposal"
                    );
                    return Ok(proposal);
                }
                Err(e) => {
                    if attempt < self.retry_config.max_retries
                        && e.is_transient()
                        && self.retry_config.should_retry(&e)
                    {
                        let delay = e.suggested_delay(attempt);
                        tracing::warn!(
                            attempt = attempt + 1,
                            delay_secs = delay.as_secs(),
                            "transient optimizer error, retrying: {}",
                            e
                        );
                        tokio::time::sleep(delay).await;
                        attempt += 1;
                        continue;
                    }
                    return Err(e);
                }
            }
        }
    }
}

// Request/response wire types (OpenAI-compatible chat completion subset).

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatRequestMessage>,
    tools: Vec<ToolDefinition>,
    tool_choice: serde_json::Value,
}

#[derive(Debug, Serialize)]
struct ChatRequestMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Serialize)]
struct ToolDefinition {
    #[serde(rename = "type")]
    tool_type: &'static str,
    function: FunctionDefinition,
}

#[derive(Debug, Serialize)]
struct FunctionDefinition {
    name: &'static str,
    description: &'static str,
    parameters: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    tool_calls: Option<Vec<ToolCall>>,
}

#[derive(Debug, Deserialize)]
struct ToolCall {
    function: FunctionCall,
}

#[derive(Debug, Deserialize)]
struct FunctionCall {
    name: String,
    /// Arguments as a JSON string. May be empty for no-argument functions.
    #[serde(default)]
    arguments: String,
}
