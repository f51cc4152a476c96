// ABOUTME: Client-side stream consumer and chat session state machine
// ABOUTME: Appends partial tokens, tracks lifecycle status, adopts the server id

// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Aurora Chat

//! # Chat Session
//!
//! The receiving side of the streaming chat endpoint. A session owns the
//! visible message list and a lifecycle status:
//!
//! ```text
//! Idle → Submitted → Streaming → Ready
//!                  ↘          ↘
//!                    Error      Error
//! ```
//!
//! Partial tokens are appended to the in-progress assistant message as they
//! arrive. Cancellation moves the session to `Ready` and keeps the partial
//! text; it is never an error. When a persisted conversation finishes, the
//! session invalidates the conversation-list cache and reports a navigation
//! intent so the UI can route to the now-identified conversation.
//!
//! The instance key is the session's logical identity: adopted once from the
//! first server response that carries a conversation id, stable afterwards.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tokio_stream::StreamExt;
use tracing::debug;
use uuid::Uuid;

use crate::cache::{QueryCache, QueryKey};
use crate::llm::{ChatStream, MessageRole};

/// Delay before navigating to the adopted conversation route, giving the
/// history refetch time to land first
pub const NAVIGATION_SETTLE_DELAY: Duration = Duration::from_secs(1);

/// Request lifecycle status of a chat session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatStatus {
    /// No request in flight
    Idle,
    /// Request sent, no tokens received yet
    Submitted,
    /// Tokens arriving
    Streaming,
    /// Last request finished (completed or cancelled)
    Ready,
    /// Last request failed
    Error,
}

/// A message as rendered in the chat window
#[derive(Debug, Clone)]
pub struct UiMessage {
    /// Client-generated message id
    pub id: String,
    /// Sender role
    pub role: MessageRole,
    /// Message text; mutable while streaming, frozen afterwards
    pub content: String,
}

impl UiMessage {
    fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            content: content.into(),
        }
    }
}

/// What the server handed back for one submission
pub struct StreamResponse {
    /// Conversation id from the `x-chat-id` header, absent on ghost requests
    pub chat_id: Option<String>,
    /// Incremental assistant output
    pub stream: ChatStream,
}

/// A client-side route change the UI should perform
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigationIntent {
    /// Route to navigate to
    pub route: String,
    /// How long to wait before navigating
    pub delay: Duration,
}

/// Handle for cancelling an in-flight stream from outside the consumer
#[derive(Clone)]
pub struct CancelHandle {
    cancelled: Arc<AtomicBool>,
    notify: Arc<Notify>,
}

impl CancelHandle {
    /// Request cancellation of the in-flight stream
    pub fn stop(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }
}

/// Client-side chat session state machine
pub struct ChatSession {
    /// Logical session identity, adopted once from the first persisted response
    instance_key: Option<String>,
    /// Visible transcript, newest last
    pub messages: Vec<UiMessage>,
    /// Current lifecycle status
    pub status: ChatStatus,
    /// Message of the last failure, when `status` is `Error`
    pub last_error: Option<String>,
    /// Whether this session is ephemeral
    ghost: bool,
    cancelled: Arc<AtomicBool>,
    notify: Arc<Notify>,
    cache: Arc<QueryCache>,
}

impl ChatSession {
    /// Create a session backed by the given query cache
    #[must_use]
    pub fn new(cache: Arc<QueryCache>, ghost: bool) -> Self {
        Self {
            instance_key: None,
            messages: Vec::new(),
            status: ChatStatus::Idle,
            last_error: None,
            ghost,
            cancelled: Arc::new(AtomicBool::new(false)),
            notify: Arc::new(Notify::new()),
            cache,
        }
    }

    /// The adopted conversation id, once the server has assigned one
    #[must_use]
    pub fn instance_key(&self) -> Option<&str> {
        self.instance_key.as_deref()
    }

    /// Handle for cancelling the in-flight stream
    #[must_use]
    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle {
            cancelled: Arc::clone(&self.cancelled),
            notify: Arc::clone(&self.notify),
        }
    }

    /// Record the user's turn and mark the request as submitted
    ///
    /// The caller sends the transcript to the server and feeds the response
    /// to [`Self::consume`].
    pub fn submit(&mut self, content: impl Into<String>) {
        self.messages.push(UiMessage::new(MessageRole::User, content));
        self.status = ChatStatus::Submitted;
        self.last_error = None;
        self.cancelled.store(false, Ordering::SeqCst);
    }

    /// Remove a message from the local transcript
    ///
    /// Local-only: the persisted record is untouched.
    pub fn delete_message(&mut self, message_id: &str) {
        self.messages.retain(|m| m.id != message_id);
    }

    /// Consume the server stream, appending tokens to the assistant message
    ///
    /// Returns a navigation intent when a persisted conversation finished and
    /// the UI should route to it. Cancellation ends in `Ready` with partial
    /// text retained; stream errors end in `Error` with partial text retained
    /// so the user can see how far the answer got.
    pub async fn consume(&mut self, response: StreamResponse) -> Option<NavigationIntent> {
        let adopted = if self.instance_key.is_none() {
            if let Some(chat_id) = response.chat_id {
                debug!(chat_id = %chat_id, "Adopting conversation id");
                self.instance_key = Some(chat_id);
                true
            } else {
                false
            }
        } else {
            false
        };

        self.messages
            .push(UiMessage::new(MessageRole::Assistant, ""));
        let assistant_index = self.messages.len() - 1;

        let mut stream = response.stream;
        let mut cancelled = false;
        loop {
            if self.cancelled.load(Ordering::SeqCst) {
                cancelled = true;
                break;
            }

            let next = tokio::select! {
                () = self.notify.notified() => {
                    cancelled = true;
                    break;
                }
                next = stream.next() => next,
            };

            match next {
                Some(Ok(chunk)) => {
                    self.status = ChatStatus::Streaming;
                    self.messages[assistant_index].content.push_str(&chunk.delta);
                }
                Some(Err(e)) => {
                    self.status = ChatStatus::Error;
                    self.last_error = Some(e.message);
                    return None;
                }
                None => break,
            }
        }

        self.status = ChatStatus::Ready;
        if cancelled {
            debug!("Stream cancelled, partial text retained");
            return None;
        }

        self.on_finish(adopted)
    }

    /// Post-completion reconciliation: refresh the history and decide routing
    fn on_finish(&self, adopted: bool) -> Option<NavigationIntent> {
        if self.ghost {
            return None;
        }

        self.cache
            .invalidate_prefix(QueryKey::CONVERSATIONS_PREFIX);

        if adopted {
            self.instance_key.as_ref().map(|key| NavigationIntent {
                route: format!("/chat/{key}"),
                delay: NAVIGATION_SETTLE_DELAY,
            })
        } else {
            None
        }
    }
}
