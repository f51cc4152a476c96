// ABOUTME: Route module organization for the Aurora chat server HTTP endpoints
// ABOUTME: Route definitions and thin handlers that delegate to the service layer
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Aurora Chat

//! HTTP route definitions, organized by domain. Handlers stay thin and
//! delegate to the service layer.

/// Chat endpoint and conversation history routes
pub mod chat;
/// Health check routes
pub mod health;

pub use chat::ChatRoutes;
pub use health::HealthRoutes;

use axum::Router;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::services::chat_processor::ChatDeps;

/// Assemble the full application router
#[must_use]
pub fn router(deps: Arc<ChatDeps>) -> Router {
    Router::new()
        .merge(ChatRoutes::routes(deps))
        .merge(HealthRoutes::routes())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
