//! Google Gemini API backend.

use crate::model::{
    Backend, ModelError, ModelRequest, ModelResponse, Reply, Role, ToolCall, ToolOutcome,
    ToolResult, Turn, TurnContent, Usage,
};
use crate::retry::RetryPolicy;
use crate::tools::ToolSpec;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::debug;

const GEMINI_API_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

// ─────────────────────────────────────────────────────────────────────────────
// API Wire Types
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ApiRequest {
    contents: Vec<ApiContent>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<ApiTool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<ApiContent>,
    generation_config: ApiGenerationConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ApiGenerationConfig {
    max_output_tokens: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct ApiContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<ApiPart>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiPart {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    thought: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    function_call: Option<ApiFunctionCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    function_response: Option<ApiFunctionResponse>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ApiFunctionCall {
    name: String,
    #[serde(default)]
    args: Value,
    #[serde(default, skip_serializing)]
    id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ApiFunctionResponse {
    name: String,
    response: Value,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ApiTool {
    function_declarations: Vec<ApiFunctionDeclaration>,
}

#[derive(Debug, Serialize)]
struct ApiFunctionDeclaration {
    name: String,
    description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    parameters: Option<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiResponse {
    #[serde(default)]
    candidates: Vec<ApiCandidate>,
    #[serde(default)]
    usage_metadata: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiCandidate {
    #[serde(default)]
    content: Option<ApiContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiUsage {
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(default)]
    candidates_token_count: u32,
}

// ─────────────────────────────────────────────────────────────────────────────
// Backend Implementation
// ─────────────────────────────────────────────────────────────────────────────

/// Builder for creating a Gemini backend.
#[derive(Debug, Clone)]
pub struct GeminiBackendBuilder {
    api_key: String,
    model: String,
    base_url: String,
    max_tokens: u32,
    system: Option<String>,
    retry: RetryPolicy,
}

impl GeminiBackendBuilder {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            base_url: GEMINI_API_URL.to_string(),
            max_tokens: 4096,
            system: None,
            retry: RetryPolicy::default(),
        }
    }

    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn build(self) -> GeminiBackend {
        GeminiBackend {
            client: reqwest::Client::new(),
            api_key: self.api_key,
            model: self.model,
            base_url: self.base_url,
            max_tokens: self.max_tokens,
            system: self.system,
            retry: self.retry,
        }
    }
}

/// Gemini `generateContent` backend.
pub struct GeminiBackend {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
    max_tokens: u32,
    system: Option<String>,
    retry: RetryPolicy,
}

impl GeminiBackend {
    pub fn builder(api_key: impl Into<String>, model: impl Into<String>) -> GeminiBackendBuilder {
        GeminiBackendBuilder::new(api_key, model)
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn role_to_api(role: Role) -> &'static str {
        match role {
            Role::User | Role::ToolResult => "user",
            Role::Model | Role::ToolCall => "model",
        }
    }

    fn turn_to_part(turn: &Turn) -> ApiPart {
        match &turn.content {
            TurnContent::Text { text } => ApiPart {
                text: Some(text.clone()),
                ..ApiPart::default()
            },
            TurnContent::ToolCall(call) => ApiPart {
                function_call: Some(ApiFunctionCall {
                    name: call.name.clone(),
                    args: object_or_wrapped(&call.arguments),
                    id: None,
                }),
                ..ApiPart::default()
            },
            TurnContent::ToolResult(result) => ApiPart {
                function_response: Some(ApiFunctionResponse {
                    name: result.tool_name.clone(),
                    response: Self::result_to_api(result),
                }),
                ..ApiPart::default()
            },
        }
    }

    fn result_to_api(result: &ToolResult) -> Value {
        match &result.outcome {
            ToolOutcome::Success { output } => json!({ "result": output }),
            ToolOutcome::Failure { error } => json!({
                "error": error.to_string(),
                "kind": result.kind(),
            }),
        }
    }

    /// Consecutive turns from the same side are merged into one content
    /// block, so parallel calls and their results travel together.
    fn history_to_api(history: &[Turn]) -> Vec<ApiContent> {
        let mut contents: Vec<ApiContent> = Vec::new();
        for turn in history {
            let role = Self::role_to_api(turn.role);
            let part = Self::turn_to_part(turn);
            match contents.last_mut() {
                Some(last) if last.role.as_deref() == Some(role) => last.parts.push(part),
                _ => contents.push(ApiContent {
                    role: Some(role.to_string()),
                    parts: vec![part],
                }),
            }
        }
        contents
    }

    fn tools_to_api(specs: &[ToolSpec]) -> Vec<ApiTool> {
        if specs.is_empty() {
            return Vec::new();
        }
        let function_declarations = specs
            .iter()
            .map(|spec| ApiFunctionDeclaration {
                name: spec.name.clone(),
                description: spec.description.clone(),
                parameters: (!spec.params.is_empty()).then(|| spec.json_schema()),
            })
            .collect();
        vec![ApiTool {
            function_declarations,
        }]
    }

    fn response_to_reply(response: ApiResponse) -> Result<ModelResponse, ModelError> {
        let usage = response
            .usage_metadata
            .map(|u| Usage {
                input_tokens: u.prompt_token_count,
                output_tokens: u.candidates_token_count,
            })
            .unwrap_or_default();

        let Some(candidate) = response.candidates.into_iter().next() else {
            return Err(ModelError::Malformed("response has no candidates".into()));
        };
        let finish_reason = candidate.finish_reason.unwrap_or_default();
        let parts = candidate.content.map(|c| c.parts).unwrap_or_default();

        let mut calls = Vec::new();
        let mut text = String::new();
        for part in parts {
            if let Some(call) = part.function_call {
                calls.push(match call.id {
                    Some(id) => ToolCall {
                        id,
                        name: call.name,
                        arguments: call.args,
                    },
                    None => ToolCall::new(call.name, call.args),
                });
            } else if let Some(chunk) = part.text.filter(|_| !part.thought) {
                text.push_str(&chunk);
            }
        }

        let reply = if !calls.is_empty() {
            Reply::ToolCalls(calls)
        } else if !text.trim().is_empty() {
            Reply::Text(text)
        } else {
            return Err(ModelError::Malformed(format!(
                "response has neither text nor tool calls (finish reason: {})",
                if finish_reason.is_empty() { "unknown" } else { finish_reason.as_str() }
            )));
        };
        Ok(ModelResponse { reply, usage })
    }

    fn build_request(&self, request: ModelRequest<'_>) -> ApiRequest {
        ApiRequest {
            contents: Self::history_to_api(request.history),
            tools: Self::tools_to_api(request.tools),
            system_instruction: self.system.as_ref().map(|s| ApiContent {
                role: None,
                parts: vec![ApiPart {
                    text: Some(s.clone()),
                    ..ApiPart::default()
                }],
            }),
            generation_config: ApiGenerationConfig {
                max_output_tokens: self.max_tokens,
            },
        }
    }

    async fn send(&self, body: &ApiRequest) -> Result<ModelResponse, ModelError> {
        let url = format!("{}/models/{}:generateContent", self.base_url, self.model);
        let response = self
            .client
            .post(url)
            .header("x-goog-api-key", &self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| ModelError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let detail = format!("{status}: {}", body.trim());
            return Err(match status {
                StatusCode::TOO_MANY_REQUESTS => ModelError::RateLimited(detail),
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ModelError::Auth(detail),
                s if s.is_server_error() => ModelError::Unavailable(detail),
                _ => ModelError::Api(detail),
            });
        }

        let api_response: ApiResponse = response
            .json()
            .await
            .map_err(|e| ModelError::Malformed(e.to_string()))?;
        Self::response_to_reply(api_response)
    }
}

/// Gemini requires call arguments to be an object.
fn object_or_wrapped(arguments: &Value) -> Value {
    match arguments {
        Value::Object(_) => arguments.clone(),
        Value::Null => json!({}),
        other => json!({ "value": other }),
    }
}

impl std::fmt::Display for GeminiBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "gemini({})", self.model)
    }
}

impl Backend for GeminiBackend {
    async fn call(&self, request: ModelRequest<'_>) -> Result<ModelResponse, ModelError> {
        let body = self.build_request(request);
        debug!(
            model = %self.model,
            turns = request.history.len(),
            tools = request.tools.len(),
            "calling gemini"
        );
        let response = self
            .retry
            .run(|| self.send(&body), ModelError::is_transient)
            .await?;
        debug!(
            input_tokens = response.usage.input_tokens,
            output_tokens = response.usage.output_tokens,
            "gemini responded"
        );
        Ok(response)
    }
}
