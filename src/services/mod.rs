// ABOUTME: Domain service layer for the chat pipeline
// ABOUTME: Business logic extracted from route handlers
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Aurora Chat

//! Domain service layer
//!
//! Business logic behind the chat endpoint, kept out of the route handlers:
//! message normalization, prompt building, conversation persistence, the
//! stream orchestrator, and the pipeline tying them together.

/// Conversation resolution and persistence helpers
pub mod chat_operations;

/// The chat pipeline: normalize, persist, stream, fan out
pub mod chat_processor;

/// Presentation filter for upstream errors
pub mod error_handler;

/// Incoming message normalization and validation
pub mod message_filter;

/// System prompt construction
pub mod prompts;

/// Tool round-trip loop and streaming completion
pub mod stream_text;
