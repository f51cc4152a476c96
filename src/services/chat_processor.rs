// ABOUTME: Top-level chat pipeline composing normalization, persistence, streaming
// ABOUTME: Decides ghost vs persistent mode and fans the stream out to both sinks

// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Aurora Chat

//! # Chat Pipeline
//!
//! Composes the service layer per incoming request:
//!
//! 1. Normalize the submitted transcript (strip dangling tool invocations).
//! 2. Prepend the system prompt built from the request identity.
//! 3. Ghost mode (explicit flag, or no authenticated user): stream directly,
//!    no conversation id, no store access, raw errors.
//! 4. Persistent mode: resolve or create the conversation, persist the input
//!    turns, validate, then stream. The stream is teed so a background task
//!    can save the assistant's answer while the client reads the same chunks.
//!
//! Input turns are persisted before validation on purpose: a transcript that
//! fails late validation is still part of the conversation record the user
//! will see in their history.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_stream::StreamExt;
use tracing::{debug, instrument, warn};

use crate::database::ChatStore;
use crate::errors::{AppError, AppResult};
use crate::llm::{ChatMessage, ChatStream, LlmProvider, MessageRole};
use crate::services::chat_operations::{find_or_create_chat, save_chat_response};
use crate::services::error_handler::error_handler;
use crate::services::message_filter::{
    process_tool_invocations, validate_messages, IncomingMessage,
};
use crate::services::prompts::{generate_system_prompt, IdentityContext};
use crate::services::stream_text::create_stream_text;
use crate::tools::ToolRegistry;

/// Shared dependencies the pipeline needs for every request
pub struct ChatDeps {
    /// Model backend
    pub provider: Arc<dyn LlmProvider>,
    /// Tools offered to the model
    pub registry: Arc<ToolRegistry>,
    /// Conversation storage
    pub store: ChatStore,
}

/// Everything extracted from one incoming chat request
#[derive(Debug, Clone)]
pub struct ChatRequestContext {
    /// Transcript as submitted by the client
    pub messages: Vec<IncomingMessage>,
    /// Display name from `x-user-name`, when present
    pub user_name: Option<String>,
    /// Authenticated user id from `x-user-id`, when present
    pub user_id: Option<String>,
    /// Existing conversation id from `x-chat-id`, when continuing
    pub chat_id: Option<String>,
    /// Explicit ephemeral-session flag from `x-ghost-mode`
    pub ghost_mode: bool,
}

/// What the pipeline hands back to the route handler
pub struct ChatOutcome {
    /// Incremental assistant output for the HTTP response body
    pub stream: ChatStream,
    /// Conversation id, `None` on ghost requests
    pub chat_id: Option<String>,
    /// Background persistence task, `None` on ghost requests
    pub persistence: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for ChatOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatOutcome")
            .field("chat_id", &self.chat_id)
            .field("persistence", &self.persistence)
            .finish_non_exhaustive()
    }
}

/// Assemble the message set sent to the model: system prompt first, then the
/// normalized transcript
#[must_use]
pub fn build_model_messages(
    processed: Vec<ChatMessage>,
    identity: &IdentityContext,
) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(processed.len() + 1);
    messages.push(generate_system_prompt(identity));
    messages.extend(processed);
    messages
}

/// Run the chat pipeline for one request
///
/// # Errors
///
/// Ghost requests surface raw pipeline errors. Persistent requests pass
/// errors through the presentation filter so the client sees a friendly
/// message with the original error code.
#[instrument(skip_all, fields(ghost = ctx.ghost_mode, continuing = ctx.chat_id.is_some()))]
pub async fn process_chat(deps: &ChatDeps, ctx: ChatRequestContext) -> AppResult<ChatOutcome> {
    let processed = process_tool_invocations(&ctx.messages);

    let is_logged_in = ctx.user_id.as_deref().is_some_and(|id| !id.is_empty());
    let identity = IdentityContext::new(ctx.user_name.clone(), is_logged_in);
    let model_messages = build_model_messages(processed.clone(), &identity);

    // Ghost mode: explicitly flagged, or no authenticated user. The store is
    // never touched and no conversation id exists.
    let Some(user_id) = ctx.user_id.filter(|_| !ctx.ghost_mode && is_logged_in) else {
        debug!("Ghost session, streaming without persistence");
        let result = create_stream_text(&*deps.provider, &deps.registry, model_messages).await?;
        return Ok(ChatOutcome {
            stream: result.stream,
            chat_id: None,
            persistence: None,
        });
    };

    let is_new_chat = ctx.chat_id.is_none();
    let conversation_id = find_or_create_chat(
        &deps.store,
        &processed,
        ctx.chat_id.as_deref(),
        None,
        &user_id,
    )
    .await?;

    // New conversations store the full transcript; continuing ones only the
    // newest turn, and only when it came from the user.
    let to_save: Vec<ChatMessage> = if is_new_chat {
        processed.clone()
    } else {
        processed
            .last()
            .filter(|m| m.role == MessageRole::User)
            .cloned()
            .into_iter()
            .collect()
    };
    if !to_save.is_empty() {
        deps.store.save_messages(&to_save, &conversation_id).await?;
    }

    // Late re-validation over the full model message set, system prompt
    // included, right before streaming.
    validate_messages(&model_messages)
        .map_err(|e| AppError::new(e.code, error_handler(&e)))?;

    let result = create_stream_text(&*deps.provider, &deps.registry, model_messages)
        .await
        .map_err(|e| AppError::new(e.code, error_handler(&e)))?;

    let (stream, save_rx) = tee_stream(result.stream);
    let persistence = save_chat_response(deps.store.clone(), save_rx, conversation_id.clone());

    Ok(ChatOutcome {
        stream,
        chat_id: Some(conversation_id),
        persistence: Some(persistence),
    })
}

/// Fan the model stream out to the client and the persistence task
///
/// Both sides receive every chunk. The client side dropping its receiver does
/// not stop persistence: the forwarding task keeps draining the model stream
/// so the answer is still saved.
fn tee_stream(
    mut stream: ChatStream,
) -> (
    ChatStream,
    mpsc::UnboundedReceiver<Result<crate::llm::StreamChunk, AppError>>,
) {
    let (client_tx, client_rx) = mpsc::unbounded_channel();
    let (save_tx, save_rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        let mut save_open = true;
        let mut client_open = true;
        while let Some(item) = stream.next().await {
            let copy = match &item {
                Ok(chunk) => Ok(chunk.clone()),
                Err(e) => Err(e.duplicate()),
            };
            if save_open && save_tx.send(copy).is_err() {
                save_open = false;
                warn!("Persistence receiver dropped mid-stream");
            }
            if client_open && client_tx.send(item).is_err() {
                // Client disconnected; keep draining for the save side.
                client_open = false;
                debug!("Client receiver dropped, continuing for persistence");
            }
            if !save_open && !client_open {
                break;
            }
        }
    });

    (Box::pin(UnboundedReceiverStream::new(client_rx)), save_rx)
}
