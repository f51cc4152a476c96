// ABOUTME: Client-side chat session layer consumed by frontend shells
// ABOUTME: Drives the streaming state machine and query-cache reconciliation

// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Aurora Chat

//! Client-side chat session support. A frontend embedding this crate drives
//! one [`session::ChatSession`] per chat window; the session consumes the
//! server's incremental stream, tracks request lifecycle status, and
//! reconciles the conversation id the server assigns for new chats.

pub mod session;

pub use session::{
    CancelHandle, ChatSession, ChatStatus, NavigationIntent, StreamResponse, UiMessage,
};
