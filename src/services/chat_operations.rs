// ABOUTME: Conversation resolution and background persistence helpers
// ABOUTME: Find-or-create, title derivation, and the assistant-turn saver

// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Aurora Chat

//! Conversation store operations used by the chat pipeline: resolving or
//! creating the conversation record, and persisting the streamed assistant
//! answer once it has fully materialized.

use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::database::ChatStore;
use crate::errors::{AppError, AppResult};
use crate::llm::{ChatMessage, MessageRole, StreamChunk};

/// Longest conversation title kept when deriving from the first user message
const MAX_TITLE_CHARS: usize = 80;

/// Title used when no user message is available to derive one from
const FALLBACK_TITLE: &str = "Nova conversa";

/// Derive a conversation title from the first user turn
#[must_use]
pub fn derive_title(messages: &[ChatMessage]) -> String {
    messages
        .iter()
        .find(|m| m.role == MessageRole::User && !m.content.trim().is_empty())
        .map_or_else(
            || FALLBACK_TITLE.to_owned(),
            |m| {
                let trimmed = m.content.trim();
                if trimmed.chars().count() <= MAX_TITLE_CHARS {
                    trimmed.to_owned()
                } else {
                    let truncated: String = trimmed.chars().take(MAX_TITLE_CHARS).collect();
                    format!("{truncated}…")
                }
            },
        )
}

/// Resolve an existing conversation or create a new one
///
/// When a conversation id is supplied it must belong to `user_id`; a stale or
/// foreign id fails the request rather than silently starting a new record.
///
/// # Errors
///
/// Returns `ResourceNotFound` for an unknown or unowned conversation id, and
/// a database error if the lookup or insert fails.
pub async fn find_or_create_chat(
    store: &ChatStore,
    messages: &[ChatMessage],
    chat_id: Option<&str>,
    title: Option<&str>,
    user_id: &str,
) -> AppResult<String> {
    if let Some(id) = chat_id {
        return match store.get_conversation(id, user_id).await? {
            Some(conversation) => Ok(conversation.id),
            None => Err(AppError::not_found("Conversation")),
        };
    }

    let derived = derive_title(messages);
    let title = title.filter(|t| !t.trim().is_empty()).unwrap_or(&derived);
    let conversation = store.create_conversation(user_id, title).await?;
    debug!(conversation_id = %conversation.id, "Created conversation");
    Ok(conversation.id)
}

/// Persist the assistant's answer after the stream completes
///
/// Consumes the persistence side of the teed stream in the background,
/// accumulating deltas until the stream ends. Only a cleanly completed answer
/// is saved; a stream error discards the partial text, since the client saw
/// the same error and will resubmit. Persistence failures are logged and
/// swallowed: the answer already reached the user.
pub fn save_chat_response(
    store: ChatStore,
    mut rx: UnboundedReceiver<Result<StreamChunk, AppError>>,
    conversation_id: String,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut content = String::new();

        while let Some(result) = rx.recv().await {
            match result {
                Ok(chunk) => content.push_str(&chunk.delta),
                Err(e) => {
                    warn!(conversation_id = %conversation_id, error = %e,
                        "Stream failed, discarding partial assistant turn");
                    return;
                }
            }
        }

        if content.is_empty() {
            debug!(conversation_id = %conversation_id, "Empty assistant turn, nothing to save");
            return;
        }

        if let Err(e) = store
            .add_message(&conversation_id, MessageRole::Assistant.as_str(), &content)
            .await
        {
            warn!(conversation_id = %conversation_id, error = %e,
                "Failed to persist assistant turn");
        }
    })
}
