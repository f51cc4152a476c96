// ABOUTME: Main library entry point for the Aurora chat assistant backend
// ABOUTME: Provides the streaming chat pipeline, tool calling, and conversation storage
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Aurora Chat

#![deny(unsafe_code)]

//! # Aurora Chat Server
//!
//! A streaming chat assistant backend. The server exposes a single chat
//! endpoint that streams model output as plain text while a background task
//! persists the finished assistant turn, plus conversation management
//! endpoints for the history sidebar.
//!
//! ## Features
//!
//! - **Streaming responses**: model output is forwarded chunk by chunk as it
//!   arrives, with persistence running on a teed copy of the same stream
//! - **Tool calling**: a closed registry of tools (weather lookup) resolved
//!   through bounded round-trips before the final streamed answer
//! - **Ghost sessions**: unauthenticated requests get the full pipeline with
//!   persistence disabled and no conversation id assigned
//! - **Conversation store**: SQLite-backed conversations and messages with
//!   per-user ownership checks on every query
//!
//! ## Architecture
//!
//! - **`llm`**: provider abstraction over OpenAI-compatible chat APIs
//! - **`tools`**: tool registry and the weather tool
//! - **`services`**: message normalization, prompt building, the stream
//!   orchestrator, and the chat pipeline
//! - **`database`**: conversation and message storage
//! - **`routes`**: axum HTTP surface
//! - **`client`**: the stream-consumer state machine used by front-end shells

// ============================================================================
// Public API
// ============================================================================
// These modules are used by the server binary (src/bin/) and integration
// tests (tests/). They must remain `pub`.

/// Client-side query cache with explicit invalidation
pub mod cache;

/// Client stream-consumer state machine for front-end shells
pub mod client;

/// Environment-driven configuration
pub mod config;

/// Conversation and message storage
pub mod database;

/// Unified error handling system with standard error codes and HTTP responses
pub mod errors;

/// LLM provider abstraction for AI chat integration
pub mod llm;

/// Production logging and structured output
pub mod logging;

/// HTTP routes for the chat and conversation endpoints
pub mod routes;

/// Chat pipeline services: normalization, prompts, streaming, persistence
pub mod services;

/// Tool registry and tool implementations
pub mod tools;
