// ABOUTME: Chat route handlers for streaming conversations and history
// ABOUTME: Streams the assistant answer as plain text and manages stored conversations
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Aurora Chat

//! Chat routes
//!
//! The streaming endpoint accepts the full client transcript plus identity
//! headers and answers with an incremental `text/plain` body. For persisted
//! conversations the assigned id is echoed in the `x-chat-id` response header
//! so the client can adopt it. History endpoints serve the sidebar.

use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio_stream::StreamExt;
use tracing::info;

use crate::database::{ConversationSummary, MessageRecord};
use crate::errors::AppError;
use crate::services::chat_processor::{process_chat, ChatDeps, ChatRequestContext};
use crate::services::message_filter::IncomingMessage;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Body of the streaming chat endpoint
#[derive(Debug, Deserialize)]
pub struct ChatRequestBody {
    /// Full client-side transcript, newest turn last
    pub messages: Vec<IncomingMessage>,
}

/// Response for listing conversations
#[derive(Debug, Serialize, Deserialize)]
pub struct ConversationListResponse {
    /// Conversations, newest activity first
    pub conversations: Vec<ConversationSummary>,
}

/// Response for a conversation's messages
#[derive(Debug, Serialize, Deserialize)]
pub struct MessagesListResponse {
    /// Messages in chronological order
    pub messages: Vec<MessageRecord>,
}

/// Query parameters for listing conversations
#[derive(Debug, Deserialize, Default)]
pub struct ListConversationsQuery {
    /// Maximum number of conversations to return
    #[serde(default = "default_limit")]
    pub limit: i64,
    /// Offset for pagination
    #[serde(default)]
    pub offset: i64,
}

const fn default_limit() -> i64 {
    20
}

// ============================================================================
// Chat Routes
// ============================================================================

/// Chat routes handler
pub struct ChatRoutes;

impl ChatRoutes {
    /// Create all chat routes
    pub fn routes(deps: Arc<ChatDeps>) -> Router {
        Router::new()
            .route("/api/chat", post(Self::chat))
            .route("/api/chat/conversations", get(Self::list_conversations))
            .route(
                "/api/chat/conversations/:conversation_id/messages",
                get(Self::get_messages),
            )
            .route(
                "/api/chat/conversations/:conversation_id",
                delete(Self::delete_conversation),
            )
            .with_state(deps)
    }

    /// Read an identity or session header, treating blank values as absent
    fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_owned)
    }

    fn ghost_flag(headers: &HeaderMap) -> bool {
        Self::header_value(headers, "x-ghost-mode")
            .is_some_and(|v| v == "1" || v.eq_ignore_ascii_case("true"))
    }

    /// POST /api/chat - stream an assistant answer for the submitted transcript
    async fn chat(
        State(deps): State<Arc<ChatDeps>>,
        headers: HeaderMap,
        Json(body): Json<ChatRequestBody>,
    ) -> Result<Response, AppError> {
        let ctx = ChatRequestContext {
            messages: body.messages,
            user_name: Self::header_value(&headers, "x-user-name"),
            user_id: Self::header_value(&headers, "x-user-id"),
            chat_id: Self::header_value(&headers, "x-chat-id"),
            ghost_mode: Self::ghost_flag(&headers),
        };

        let outcome = process_chat(&deps, ctx).await?;

        let body_stream = outcome
            .stream
            .map(|result| result.map(|chunk| Bytes::from(chunk.delta)));

        let mut builder = Response::builder()
            .status(StatusCode::OK)
            .header(header::CONTENT_TYPE, "text/plain; charset=utf-8");
        if let Some(chat_id) = &outcome.chat_id {
            builder = builder.header("x-chat-id", chat_id);
        }

        builder
            .body(Body::from_stream(body_stream))
            .map_err(|e| AppError::internal(format!("Failed to build response: {e}")))
    }

    /// GET /api/chat/conversations - list the user's conversations
    async fn list_conversations(
        State(deps): State<Arc<ChatDeps>>,
        headers: HeaderMap,
        Query(query): Query<ListConversationsQuery>,
    ) -> Result<Json<ConversationListResponse>, AppError> {
        let user_id =
            Self::header_value(&headers, "x-user-id").ok_or_else(AppError::auth_required)?;

        let conversations = deps
            .store
            .list_conversations(&user_id, query.limit, query.offset)
            .await?;

        Ok(Json(ConversationListResponse { conversations }))
    }

    /// GET /api/chat/conversations/:id/messages - fetch a conversation's messages
    async fn get_messages(
        State(deps): State<Arc<ChatDeps>>,
        headers: HeaderMap,
        Path(conversation_id): Path<String>,
    ) -> Result<Json<MessagesListResponse>, AppError> {
        let user_id =
            Self::header_value(&headers, "x-user-id").ok_or_else(AppError::auth_required)?;

        // Ownership check before exposing any messages
        deps.store
            .get_conversation(&conversation_id, &user_id)
            .await?
            .ok_or_else(|| AppError::not_found("Conversation"))?;

        let messages = deps.store.get_messages(&conversation_id).await?;
        Ok(Json(MessagesListResponse { messages }))
    }

    /// DELETE /api/chat/conversations/:id - delete a conversation and its messages
    async fn delete_conversation(
        State(deps): State<Arc<ChatDeps>>,
        headers: HeaderMap,
        Path(conversation_id): Path<String>,
    ) -> Result<Response, AppError> {
        let user_id =
            Self::header_value(&headers, "x-user-id").ok_or_else(AppError::auth_required)?;

        let deleted = deps
            .store
            .delete_conversation(&conversation_id, &user_id)
            .await?;

        if deleted {
            info!(conversation_id = %conversation_id, "Conversation deleted");
            Ok(StatusCode::NO_CONTENT.into_response())
        } else {
            Err(AppError::not_found("Conversation"))
        }
    }
}
