// ABOUTME: Aurora chat server binary wiring config, storage, provider, and routes
// ABOUTME: Starts the HTTP server with the streaming chat endpoint

// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Aurora Chat

//! # Aurora Chat Server Binary
//!
//! Starts the chat backend: loads configuration from the environment, opens
//! the SQLite store, wires the model provider and tool registry, and serves
//! the HTTP API.

use anyhow::{Context, Result};
use aurora_chat_server::{
    config::ServerConfig,
    database::{self, ChatStore},
    llm::OpenAiCompatibleProvider,
    logging,
    routes::router,
    services::chat_processor::ChatDeps,
    tools::{ToolRegistry, WeatherTool},
};
use clap::Parser;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "aurora-chat-server")]
#[command(about = "Aurora - streaming chat assistant backend")]
pub struct Args {
    /// Override HTTP port
    #[arg(long)]
    http_port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Handle container environments where clap may not work properly
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            eprintln!("Argument parsing failed: {e}");
            eprintln!("Using default configuration");
            Args { http_port: None }
        }
    };

    let mut config = ServerConfig::from_env()?;
    if let Some(http_port) = args.http_port {
        config.http_port = http_port;
    }

    logging::init_from_env()?;

    info!("Starting Aurora Chat Server");
    info!("{}", config.summary());

    let pool = database::connect(&config.database_url).await?;
    let store = ChatStore::new(pool);
    store.init_schema().await?;
    info!("Database ready: {}", config.database_url);

    let provider = OpenAiCompatibleProvider::from_config(&config.llm)?;

    let weather = if config.weather.api_key.is_some() {
        WeatherTool::new(config.weather.clone())?
    } else {
        warn!("OPENWEATHER_API_KEY not set, weather lookups will fail upstream");
        WeatherTool::disabled()
    };
    let registry = ToolRegistry::new(weather);

    let deps = Arc::new(ChatDeps {
        provider: Arc::new(provider),
        registry: Arc::new(registry),
        store,
    });

    let app = router(deps);

    let addr = format!("0.0.0.0:{}", config.http_port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;

    info!("Listening on http://{addr}");
    info!("   Chat (streaming):   POST http://{addr}/api/chat");
    info!("   List conversations: GET  http://{addr}/api/chat/conversations");
    info!("   Conversation log:   GET  http://{addr}/api/chat/conversations/{{id}}/messages");
    info!("   Delete:             DELETE http://{addr}/api/chat/conversations/{{id}}");
    info!("   Health:             GET  http://{addr}/health");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to install shutdown handler: {e}");
        return;
    }
    info!("Shutdown signal received");
}
