// ABOUTME: Generic OpenAI-compatible LLM provider for hosted and local endpoints
// ABOUTME: Implements complete, complete_with_tools, and SSE streaming completions
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Aurora Chat

//! # `OpenAI`-Compatible Provider
//!
//! Implementation of [`LlmProvider`] for any `OpenAI`-compatible chat
//! completions endpoint: hosted APIs as well as local servers like Ollama
//! (<http://localhost:11434/v1>) and vLLM (<http://localhost:8000/v1>).
//!
//! Streaming responses go through the shared SSE parser in
//! [`super::sse_parser`] so partial lines across TCP chunks are handled
//! correctly.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};

use super::sse_parser::create_sse_stream;
use super::{
    ChatMessage, ChatRequest, ChatResponse, ChatResponseWithTools, ChatStream, FunctionCall,
    LlmCapabilities, LlmProvider, StreamChunk, TokenUsage, Tool,
};
use crate::config::LlmConfig;
use crate::errors::{AppError, ErrorCode};

/// Connect timeout; generous enough for cold local servers
const CONNECT_TIMEOUT_SECS: u64 = 30;

/// Provider name used in error messages
const PROVIDER_NAME: &str = "LLM";

// ============================================================================
// API Request/Response Types (OpenAI-compatible format)
// ============================================================================

/// OpenAI-compatible API request structure
#[derive(Debug, Serialize)]
struct OpenAiRequest {
    model: String,
    messages: Vec<OpenAiMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<OpenAiTool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<String>,
}

/// Tool definition for the API
#[derive(Debug, Clone, Serialize)]
struct OpenAiTool {
    #[serde(rename = "type")]
    tool_type: String,
    function: OpenAiFunction,
}

/// Function definition within a tool
#[derive(Debug, Clone, Serialize)]
struct OpenAiFunction {
    name: String,
    description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    parameters: Option<Value>,
}

/// Message structure for the API
#[derive(Debug, Clone, Serialize, Deserialize)]
struct OpenAiMessage {
    role: String,
    content: String,
}

impl From<&ChatMessage> for OpenAiMessage {
    fn from(msg: &ChatMessage) -> Self {
        Self {
            role: msg.role.as_str().to_owned(),
            content: msg.content.clone(),
        }
    }
}

/// API response structure
#[derive(Debug, Deserialize)]
struct OpenAiResponse {
    choices: Vec<OpenAiChoice>,
    #[serde(default)]
    usage: Option<OpenAiUsage>,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    message: OpenAiResponseMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAiResponseMessage {
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<OpenAiToolCall>>,
}

#[derive(Debug, Clone, Deserialize)]
struct OpenAiToolCall {
    function: OpenAiFunctionCall,
}

#[derive(Debug, Clone, Deserialize)]
struct OpenAiFunctionCall {
    name: String,
    arguments: String,
}

#[derive(Debug, Deserialize)]
struct OpenAiUsage {
    #[serde(rename = "prompt_tokens")]
    prompt: u32,
    #[serde(rename = "completion_tokens")]
    completion: u32,
    #[serde(rename = "total_tokens")]
    total: u32,
}

/// Streaming chunk structure
#[derive(Debug, Deserialize)]
struct OpenAiStreamChunk {
    choices: Vec<OpenAiStreamChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenAiStreamChoice {
    delta: OpenAiDelta,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAiDelta {
    #[serde(default)]
    content: Option<String>,
}

/// Error response structure
#[derive(Debug, Deserialize)]
struct OpenAiErrorResponse {
    error: OpenAiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct OpenAiErrorDetail {
    message: String,
    #[serde(rename = "type")]
    error_type: Option<String>,
}

// ============================================================================
// Provider Configuration
// ============================================================================

/// Configuration for the `OpenAI`-compatible provider
#[derive(Debug, Clone)]
pub struct OpenAiCompatibleConfig {
    /// Base URL for the API (e.g., <https://api.openai.com/v1>)
    pub base_url: String,
    /// API key (optional for local servers)
    pub api_key: Option<String>,
    /// Default model to use
    pub default_model: String,
    /// Whole-request timeout in seconds
    pub request_timeout_secs: u64,
}

impl From<&LlmConfig> for OpenAiCompatibleConfig {
    fn from(config: &LlmConfig) -> Self {
        Self {
            base_url: config.base_url.clone(),
            api_key: config.api_key.clone().filter(|k| !k.is_empty()),
            default_model: config.model.clone(),
            request_timeout_secs: config.request_timeout_secs,
        }
    }
}

// ============================================================================
// Provider Implementation
// ============================================================================

/// Generic `OpenAI`-compatible LLM provider
///
/// Works with any endpoint that implements the `OpenAI` chat completions API.
pub struct OpenAiCompatibleProvider {
    client: Client,
    config: OpenAiCompatibleConfig,
}

impl OpenAiCompatibleProvider {
    /// Create a new provider with the given configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(config: OpenAiCompatibleConfig) -> Result<Self, AppError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| AppError::internal(format!("Failed to create HTTP client: {e}")))?;

        info!(
            "Initializing LLM provider: base_url={}, model={}",
            config.base_url, config.default_model
        );

        Ok(Self { client, config })
    }

    /// Create a provider from the typed LLM configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn from_config(config: &LlmConfig) -> Result<Self, AppError> {
        Self::new(OpenAiCompatibleConfig::from(config))
    }

    /// Build the API URL for a given endpoint
    fn api_url(&self, endpoint: &str) -> String {
        format!(
            "{}/{}",
            self.config.base_url.trim_end_matches('/'),
            endpoint
        )
    }

    /// Convert internal messages to the wire format
    fn convert_messages(messages: &[ChatMessage]) -> Vec<OpenAiMessage> {
        messages.iter().map(OpenAiMessage::from).collect()
    }

    /// Map a transport error to an `AppError`
    fn transport_error(&self, e: &reqwest::Error) -> AppError {
        error!("Request to {} failed: {}", self.config.base_url, e);
        if e.is_connect() {
            AppError::external_service(
                PROVIDER_NAME,
                format!(
                    "Cannot connect to the model endpoint. Is the server running at {}?",
                    self.config.base_url
                ),
            )
        } else {
            AppError::external_service(PROVIDER_NAME, format!("Failed to connect: {e}"))
        }
    }

    /// Parse error response from the API
    fn parse_error_response(status: reqwest::StatusCode, body: &str) -> AppError {
        if let Ok(error_response) = serde_json::from_str::<OpenAiErrorResponse>(body) {
            let error_type = error_response
                .error
                .error_type
                .unwrap_or_else(|| "unknown".to_owned());

            match status.as_u16() {
                401 => AppError::auth_invalid(format!(
                    "API authentication failed: {}",
                    error_response.error.message
                )),
                429 => AppError::new(
                    ErrorCode::ExternalRateLimited,
                    "LLM rate limit reached. Please wait a moment and try again.",
                ),
                400 => AppError::invalid_input(format!(
                    "API validation error: {}",
                    error_response.error.message
                )),
                404 => AppError::not_found(format!(
                    "Model or endpoint: {}",
                    error_response.error.message
                )),
                _ => AppError::external_service(
                    PROVIDER_NAME,
                    format!("{} - {}", error_type, error_response.error.message),
                ),
            }
        } else {
            match status.as_u16() {
                // Non-JSON errors are common with local servers behind proxies
                502..=504 => AppError::external_service(
                    PROVIDER_NAME,
                    "Model endpoint is not responding".to_owned(),
                ),
                _ => AppError::external_service(
                    PROVIDER_NAME,
                    format!("API error ({}): {}", status, Self::truncate_body(body, 200)),
                ),
            }
        }
    }

    /// Truncate a response body for log output, never splitting a multibyte
    /// character
    fn truncate_body(body: &str, limit: usize) -> String {
        body.chars().take(limit).collect()
    }

    /// Convert internal `Tool` format to the wire format
    fn convert_tools(tools: &[Tool]) -> Vec<OpenAiTool> {
        tools
            .iter()
            .flat_map(|tool| {
                tool.function_declarations.iter().map(|func| OpenAiTool {
                    tool_type: "function".to_owned(),
                    function: OpenAiFunction {
                        name: func.name.clone(),
                        description: func.description.clone(),
                        parameters: func.parameters.clone(),
                    },
                })
            })
            .collect()
    }

    /// Convert wire tool calls to internal `FunctionCall` values
    ///
    /// Arguments arrive as a JSON-encoded string; unparseable arguments
    /// degrade to an empty object rather than failing the whole response.
    fn convert_tool_calls(tool_calls: &[OpenAiToolCall]) -> Vec<FunctionCall> {
        tool_calls
            .iter()
            .map(|call| {
                let args: Value =
                    serde_json::from_str(&call.function.arguments).unwrap_or_default();
                FunctionCall {
                    name: call.function.name.clone(),
                    args,
                }
            })
            .collect()
    }

    /// Add authorization header if an API key is configured
    fn add_auth_header(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        if let Some(ref api_key) = self.config.api_key {
            request.header("Authorization", format!("Bearer {api_key}"))
        } else {
            request
        }
    }

    /// POST a completion request and return the parsed response body
    async fn send_completion(&self, payload: &OpenAiRequest) -> Result<OpenAiResponse, AppError> {
        let http_request = self
            .client
            .post(self.api_url("chat/completions"))
            .header("Content-Type", "application/json")
            .json(payload);

        let response = self
            .add_auth_header(http_request)
            .send()
            .await
            .map_err(|e| self.transport_error(&e))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            AppError::external_service(PROVIDER_NAME, format!("Failed to read response: {e}"))
        })?;

        if !status.is_success() {
            return Err(Self::parse_error_response(status, &body));
        }

        serde_json::from_str(&body).map_err(|e| {
            error!(
                "Failed to parse API response: {} - body: {}",
                e,
                Self::truncate_body(&body, 500)
            );
            AppError::external_service(PROVIDER_NAME, format!("Failed to parse response: {e}"))
        })
    }
}

#[async_trait]
impl LlmProvider for OpenAiCompatibleProvider {
    fn name(&self) -> &'static str {
        "openai-compatible"
    }

    fn display_name(&self) -> &'static str {
        "OpenAI-compatible endpoint"
    }

    fn capabilities(&self) -> LlmCapabilities {
        LlmCapabilities::full_featured()
    }

    fn default_model(&self) -> &str {
        &self.config.default_model
    }

    #[instrument(skip(self, request), fields(model = %request.model.as_deref().unwrap_or(&self.config.default_model)))]
    async fn complete(&self, request: &ChatRequest) -> Result<ChatResponse, AppError> {
        let model = request
            .model
            .as_deref()
            .unwrap_or(&self.config.default_model);

        let payload = OpenAiRequest {
            model: model.to_owned(),
            messages: Self::convert_messages(&request.messages),
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            stream: Some(false),
            tools: None,
            tool_choice: None,
        };

        let response = self.send_completion(&payload).await?;
        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| AppError::external_service(PROVIDER_NAME, "API returned no choices"))?;

        let content = choice.message.content.unwrap_or_default();
        debug!(
            "Received completion: {} chars, finish_reason: {:?}",
            content.len(),
            choice.finish_reason
        );

        Ok(ChatResponse {
            content,
            model: model.to_owned(),
            usage: response.usage.map(|u| TokenUsage {
                prompt_tokens: u.prompt,
                completion_tokens: u.completion,
                total_tokens: u.total,
            }),
            finish_reason: choice.finish_reason,
        })
    }

    #[instrument(skip(self, request, tools), fields(model = %request.model.as_deref().unwrap_or(&self.config.default_model)))]
    async fn complete_with_tools(
        &self,
        request: &ChatRequest,
        tools: Option<&[Tool]>,
    ) -> Result<ChatResponseWithTools, AppError> {
        let model = request
            .model
            .as_deref()
            .unwrap_or(&self.config.default_model);

        let payload = OpenAiRequest {
            model: model.to_owned(),
            messages: Self::convert_messages(&request.messages),
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            stream: Some(false),
            tools: tools.map(Self::convert_tools),
            tool_choice: tools.map(|_| "auto".to_owned()),
        };

        let response = self.send_completion(&payload).await?;
        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| AppError::external_service(PROVIDER_NAME, "API returned no choices"))?;

        let function_calls = choice.message.tool_calls.map(|calls| {
            info!("Model returned {} tool calls", calls.len());
            Self::convert_tool_calls(&calls)
        });

        Ok(ChatResponseWithTools {
            content: choice.message.content,
            function_calls,
            usage: response.usage.map(|u| TokenUsage {
                prompt_tokens: u.prompt,
                completion_tokens: u.completion,
                total_tokens: u.total,
            }),
            finish_reason: choice.finish_reason,
        })
    }

    #[instrument(skip(self, request), fields(model = %request.model.as_deref().unwrap_or(&self.config.default_model)))]
    async fn complete_stream(&self, request: &ChatRequest) -> Result<ChatStream, AppError> {
        let model = request
            .model
            .as_deref()
            .unwrap_or(&self.config.default_model);

        let payload = OpenAiRequest {
            model: model.to_owned(),
            messages: Self::convert_messages(&request.messages),
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            stream: Some(true),
            tools: None,
            tool_choice: None,
        };

        let http_request = self
            .client
            .post(self.api_url("chat/completions"))
            .header("Content-Type", "application/json")
            .json(&payload);

        let response = self
            .add_auth_header(http_request)
            .send()
            .await
            .map_err(|e| self.transport_error(&e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Self::parse_error_response(status, &body));
        }

        Ok(create_sse_stream(
            response.bytes_stream(),
            |json_str| match serde_json::from_str::<OpenAiStreamChunk>(json_str) {
                Ok(chunk) => {
                    let choice = chunk.choices.into_iter().next()?;
                    Some(Ok(StreamChunk {
                        delta: choice.delta.content.unwrap_or_default(),
                        is_final: choice.finish_reason.is_some(),
                        finish_reason: choice.finish_reason,
                    }))
                }
                Err(e) => {
                    warn!("Failed to parse stream chunk: {}", e);
                    None
                }
            },
            PROVIDER_NAME,
        ))
    }

    #[instrument(skip(self))]
    async fn health_check(&self) -> Result<bool, AppError> {
        debug!("Performing health check at {}", self.config.base_url);

        let http_request = self.client.get(self.api_url("models"));
        let response = self
            .add_auth_header(http_request)
            .send()
            .await
            .map_err(|e| self.transport_error(&e))?;

        let healthy = response.status().is_success();
        if !healthy {
            warn!("Health check failed with status: {}", response.status());
        }
        Ok(healthy)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;

    #[test]
    fn test_parse_error_response_maps_status_codes() {
        let body = r#"{"error":{"message":"bad key","type":"invalid_request_error"}}"#;
        let error =
            OpenAiCompatibleProvider::parse_error_response(reqwest::StatusCode::UNAUTHORIZED, body);
        assert_eq!(error.code, ErrorCode::AuthInvalid);

        let error = OpenAiCompatibleProvider::parse_error_response(
            reqwest::StatusCode::TOO_MANY_REQUESTS,
            body,
        );
        assert_eq!(error.code, ErrorCode::ExternalRateLimited);

        let error = OpenAiCompatibleProvider::parse_error_response(
            reqwest::StatusCode::BAD_REQUEST,
            body,
        );
        assert_eq!(error.code, ErrorCode::InvalidInput);
    }

    #[test]
    fn test_parse_error_response_non_json_body() {
        let error = OpenAiCompatibleProvider::parse_error_response(
            reqwest::StatusCode::BAD_GATEWAY,
            "<html>upstream down</html>",
        );
        assert_eq!(error.code, ErrorCode::ExternalServiceError);
    }

    #[test]
    fn test_truncate_body_respects_char_boundaries() {
        // 4-byte scalar values; a byte slice at any interior index would panic
        let body = "🦀".repeat(300);
        let truncated = OpenAiCompatibleProvider::truncate_body(&body, 200);
        assert_eq!(truncated.chars().count(), 200);

        assert_eq!(OpenAiCompatibleProvider::truncate_body("curto", 500), "curto");
    }

    #[test]
    fn test_convert_tool_calls_with_malformed_arguments() {
        let calls = vec![OpenAiToolCall {
            function: OpenAiFunctionCall {
                name: "getWeather".to_owned(),
                arguments: "not json".to_owned(),
            },
        }];

        let converted = OpenAiCompatibleProvider::convert_tool_calls(&calls);
        assert_eq!(converted.len(), 1);
        assert_eq!(converted[0].name, "getWeather");
        assert_eq!(converted[0].args, Value::Null);
    }

    #[test]
    fn test_convert_tools_flattens_declarations() {
        let tools = vec![Tool {
            function_declarations: vec![crate::llm::FunctionDeclaration {
                name: "getWeather".to_owned(),
                description: "weather lookup".to_owned(),
                parameters: Some(serde_json::json!({"type": "object"})),
            }],
        }];

        let converted = OpenAiCompatibleProvider::convert_tools(&tools);
        assert_eq!(converted.len(), 1);
        assert_eq!(converted[0].tool_type, "function");
        assert_eq!(converted[0].function.name, "getWeather");
    }
}
