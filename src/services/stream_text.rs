// ABOUTME: Stream orchestrator driving tool round-trips and the final stream
// ABOUTME: Bounded non-streaming tool loop followed by a streaming completion

// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Aurora Chat

//! # Stream Orchestrator
//!
//! Drives the model with the assembled message set and the tool registry.
//! Tool calls cannot be resolved mid-stream with the chat-completions API, so
//! the orchestrator runs a bounded non-streaming loop first: each iteration
//! offers the tool declarations, executes whatever calls come back, and feeds
//! the results into the transcript. Once an iteration returns no calls (or
//! the iteration cap is hit), a fresh streaming completion produces the text
//! that actually reaches the client.

use tracing::{debug, instrument, warn};

use crate::errors::AppResult;
use crate::llm::{ChatMessage, ChatRequest, ChatStream, LlmProvider};
use crate::tools::ToolRegistry;

/// Upper bound on tool round-trips for a single request
///
/// A model that keeps requesting tools past this point is looping; the
/// transcript it built so far still feeds the final streaming completion.
pub const MAX_TOOL_ITERATIONS: usize = 10;

/// Handle returned by the orchestrator
pub struct StreamTextResult {
    /// Incremental model output for the final answer
    pub stream: ChatStream,
}

/// Run the tool loop and start the final streaming completion
///
/// The transcript grows in place: assistant text from tool iterations and
/// every tool result are appended before the streaming request is issued, so
/// the final answer is grounded in the tool output. Providers without
/// function calling skip straight to the streaming completion.
///
/// # Errors
///
/// Returns an error when a completion request fails before streaming starts.
/// Tool execution itself is total and never fails the request.
#[instrument(skip_all, fields(turns = messages.len()))]
pub async fn create_stream_text(
    provider: &dyn LlmProvider,
    registry: &ToolRegistry,
    mut messages: Vec<ChatMessage>,
) -> AppResult<StreamTextResult> {
    if provider.capabilities().supports_function_calling() {
        let tools = registry.declarations();

        for iteration in 0..MAX_TOOL_ITERATIONS {
            let request = ChatRequest::new(messages.clone());
            let response = provider.complete_with_tools(&request, Some(&tools)).await?;

            let Some(calls) = response.function_calls.filter(|c| !c.is_empty()) else {
                // No tool work requested; the streaming completion below
                // regenerates the answer incrementally.
                break;
            };

            debug!(
                iteration,
                call_count = calls.len(),
                "Model requested tool calls"
            );

            if let Some(content) = response.content.filter(|c| !c.trim().is_empty()) {
                messages.push(ChatMessage::assistant(content));
            }

            for call in &calls {
                let result = registry.execute(call).await;
                let payload = serde_json::to_string(&result.response)
                    .unwrap_or_else(|e| format!("{{\"error\":\"{e}\"}}"));
                messages.push(ChatMessage::user(format!(
                    "[Tool Result for {}]: {payload}",
                    result.name
                )));
            }

            if iteration + 1 == MAX_TOOL_ITERATIONS {
                warn!("Tool loop hit iteration cap, forcing final completion");
            }
        }
    }

    let stream = provider
        .complete_stream(&ChatRequest::new(messages).with_streaming())
        .await?;

    Ok(StreamTextResult { stream })
}
