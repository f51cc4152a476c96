// ABOUTME: Tests for the client-side chat session state machine
// ABOUTME: Lifecycle transitions, cancellation, id adoption, cache reconciliation
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Aurora Chat

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

use std::sync::Arc;
use std::time::Duration;

use aurora_chat_server::cache::{QueryCache, QueryKey};
use aurora_chat_server::client::{CancelHandle, ChatSession, ChatStatus, StreamResponse};
use aurora_chat_server::errors::AppError;
use aurora_chat_server::llm::{ChatStream, MessageRole, StreamChunk};
use futures_util::StreamExt;
use serde_json::json;

fn chunk(delta: &str) -> Result<StreamChunk, AppError> {
    Ok(StreamChunk {
        delta: delta.to_owned(),
        is_final: false,
        finish_reason: None,
    })
}

fn stream_of(items: Vec<Result<StreamChunk, AppError>>) -> ChatStream {
    Box::pin(futures_util::stream::iter(items))
}

fn session(ghost: bool) -> (ChatSession, Arc<QueryCache>) {
    let cache = Arc::new(QueryCache::new());
    (ChatSession::new(Arc::clone(&cache), ghost), cache)
}

#[tokio::test]
async fn test_lifecycle_idle_to_ready() {
    let (mut session, _cache) = session(false);
    assert_eq!(session.status, ChatStatus::Idle);

    session.submit("Qual o clima?");
    assert_eq!(session.status, ChatStatus::Submitted);
    assert_eq!(session.messages.len(), 1);
    assert_eq!(session.messages[0].role, MessageRole::User);

    let intent = session
        .consume(StreamResponse {
            chat_id: Some("c1".to_owned()),
            stream: stream_of(vec![chunk("Está "), chunk("bom.")]),
        })
        .await;

    assert_eq!(session.status, ChatStatus::Ready);
    assert_eq!(session.messages.len(), 2);
    assert_eq!(session.messages[1].role, MessageRole::Assistant);
    assert_eq!(session.messages[1].content, "Está bom.");

    let intent = intent.expect("navigation intent for new conversation");
    assert_eq!(intent.route, "/chat/c1");
}

#[tokio::test]
async fn test_stream_error_sets_error_state_and_keeps_partial_text() {
    let (mut session, _cache) = session(false);
    session.submit("oi");

    let intent = session
        .consume(StreamResponse {
            chat_id: Some("c1".to_owned()),
            stream: stream_of(vec![
                chunk("parcial"),
                Err(AppError::external_service("LLM", "boom")),
            ]),
        })
        .await;

    assert!(intent.is_none());
    assert_eq!(session.status, ChatStatus::Error);
    assert!(session.last_error.is_some());
    assert_eq!(session.messages[1].content, "parcial");
}

#[tokio::test]
async fn test_stop_transitions_to_ready_with_partial_text() {
    let (mut session, _cache) = session(false);
    session.submit("oi");

    // One chunk, then the stream hangs until cancelled
    let hanging: ChatStream = Box::pin(
        futures_util::stream::iter(vec![chunk("parcial")])
            .chain(futures_util::stream::pending()),
    );

    let handle: CancelHandle = session.cancel_handle();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        handle.stop();
    });

    let intent = session
        .consume(StreamResponse {
            chat_id: Some("c1".to_owned()),
            stream: hanging,
        })
        .await;

    // Cancellation is not an error and does not navigate
    assert!(intent.is_none());
    assert_eq!(session.status, ChatStatus::Ready);
    assert!(session.last_error.is_none());
    assert_eq!(session.messages[1].content, "parcial");
}

#[tokio::test]
async fn test_instance_key_is_adopted_once() {
    let (mut session, _cache) = session(false);

    session.submit("primeira");
    let first = session
        .consume(StreamResponse {
            chat_id: Some("c1".to_owned()),
            stream: stream_of(vec![chunk("ok")]),
        })
        .await;
    assert!(first.is_some());
    assert_eq!(session.instance_key(), Some("c1"));

    // Later responses cannot re-key the session and do not navigate again
    session.submit("segunda");
    let second = session
        .consume(StreamResponse {
            chat_id: Some("c2".to_owned()),
            stream: stream_of(vec![chunk("ok")]),
        })
        .await;
    assert!(second.is_none());
    assert_eq!(session.instance_key(), Some("c1"));
}

#[tokio::test]
async fn test_finish_invalidates_conversation_list_cache() {
    let (mut session, cache) = session(false);
    let key = QueryKey::Conversations {
        user_id: "u1".to_owned(),
    };
    cache.set(&key, json!([{ "id": "old" }]));

    session.submit("oi");
    session
        .consume(StreamResponse {
            chat_id: Some("c1".to_owned()),
            stream: stream_of(vec![chunk("ok")]),
        })
        .await;

    assert!(cache.get(&key).is_none());
}

#[tokio::test]
async fn test_ghost_session_never_navigates_or_invalidates() {
    let (mut session, cache) = session(true);
    let key = QueryKey::Conversations {
        user_id: "u1".to_owned(),
    };
    cache.set(&key, json!([]));

    session.submit("oi");
    let intent = session
        .consume(StreamResponse {
            chat_id: None,
            stream: stream_of(vec![chunk("ok")]),
        })
        .await;

    assert!(intent.is_none());
    assert!(session.instance_key().is_none());
    assert!(cache.get(&key).is_some());
}

#[tokio::test]
async fn test_delete_message_is_local_only() {
    let (mut session, _cache) = session(false);
    session.submit("primeira");
    session.submit("segunda");

    let id = session.messages[0].id.clone();
    session.delete_message(&id);

    assert_eq!(session.messages.len(), 1);
    assert_eq!(session.messages[0].content, "segunda");
}
