// ABOUTME: Shared test helpers for integration tests
// ABOUTME: Scripted mock LLM provider and in-memory store construction
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Aurora Chat

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs, dead_code)]

//! Shared test utilities for `aurora_chat_server` integration tests.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use aurora_chat_server::database::ChatStore;
use aurora_chat_server::errors::AppError;
use aurora_chat_server::llm::{
    ChatRequest, ChatResponse, ChatResponseWithTools, ChatStream, FunctionCall, LlmCapabilities,
    LlmProvider, StreamChunk, Tool,
};
use sqlx::sqlite::SqlitePoolOptions;

/// Scripted mock provider
///
/// Tool-loop responses are popped from a queue; once the queue is empty the
/// provider reports no tool calls. The streaming completion replays
/// `stream_text` as one chunk per entry, then a final chunk.
pub struct MockProvider {
    tool_responses: Mutex<VecDeque<ChatResponseWithTools>>,
    stream_text: Vec<String>,
    fail_streaming: bool,
}

impl MockProvider {
    #[must_use]
    pub fn streaming(chunks: &[&str]) -> Self {
        Self {
            tool_responses: Mutex::new(VecDeque::new()),
            stream_text: chunks.iter().map(|s| (*s).to_owned()).collect(),
            fail_streaming: false,
        }
    }

    #[must_use]
    pub fn failing() -> Self {
        Self {
            tool_responses: Mutex::new(VecDeque::new()),
            stream_text: Vec::new(),
            fail_streaming: true,
        }
    }

    /// Queue a tool-loop response carrying the given function calls
    pub fn push_tool_calls(&self, calls: Vec<FunctionCall>) {
        self.tool_responses
            .lock()
            .unwrap()
            .push_back(ChatResponseWithTools {
                content: None,
                function_calls: Some(calls),
                usage: None,
                finish_reason: Some("tool_calls".to_owned()),
            });
    }

    fn done_response() -> ChatResponseWithTools {
        ChatResponseWithTools {
            content: Some("done".to_owned()),
            function_calls: None,
            usage: None,
            finish_reason: Some("stop".to_owned()),
        }
    }
}

#[async_trait]
impl LlmProvider for MockProvider {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn display_name(&self) -> &'static str {
        "Mock Provider"
    }

    fn capabilities(&self) -> LlmCapabilities {
        LlmCapabilities::full_featured()
    }

    fn default_model(&self) -> &str {
        "mock-model"
    }

    async fn complete(&self, _request: &ChatRequest) -> Result<ChatResponse, AppError> {
        Ok(ChatResponse {
            content: self.stream_text.join(""),
            model: "mock-model".to_owned(),
            usage: None,
            finish_reason: Some("stop".to_owned()),
        })
    }

    async fn complete_with_tools(
        &self,
        _request: &ChatRequest,
        _tools: Option<&[Tool]>,
    ) -> Result<ChatResponseWithTools, AppError> {
        Ok(self
            .tool_responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(Self::done_response))
    }

    async fn complete_stream(&self, _request: &ChatRequest) -> Result<ChatStream, AppError> {
        if self.fail_streaming {
            return Err(AppError::external_service("LLM", "connection refused"));
        }

        let mut items: Vec<Result<StreamChunk, AppError>> = self
            .stream_text
            .iter()
            .map(|text| {
                Ok(StreamChunk {
                    delta: text.clone(),
                    is_final: false,
                    finish_reason: None,
                })
            })
            .collect();
        items.push(Ok(StreamChunk {
            delta: String::new(),
            is_final: true,
            finish_reason: Some("stop".to_owned()),
        }));

        Ok(Box::pin(futures_util::stream::iter(items)))
    }

    async fn health_check(&self) -> Result<bool, AppError> {
        Ok(true)
    }
}

/// In-memory store with the schema bootstrapped
pub async fn memory_store() -> ChatStore {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("in-memory pool");
    let store = ChatStore::new(pool);
    store.init_schema().await.expect("schema");
    store
}
