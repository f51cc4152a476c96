// ABOUTME: Database layer for conversation and message storage
// ABOUTME: SQLite pool construction and schema bootstrap
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Aurora Chat

//! # Database Management
//!
//! SQLite-backed storage for chat conversations and messages. The pool is
//! created from a connection string (`sqlite:./data/aurora.db` or
//! `sqlite::memory:` for tests) and the schema is bootstrapped with
//! `CREATE TABLE IF NOT EXISTS` at startup.

pub mod chat;

pub use chat::{ChatStore, ConversationRecord, ConversationSummary, MessageRecord};

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;

use crate::errors::{AppError, AppResult};

/// Open a SQLite pool for the given connection string
///
/// Creates the database file when it does not exist yet.
///
/// # Errors
///
/// Returns an error if the URL is malformed or the pool cannot connect.
pub async fn connect(database_url: &str) -> AppResult<SqlitePool> {
    let options = SqliteConnectOptions::from_str(database_url)
        .map_err(|e| AppError::config(format!("Invalid DATABASE_URL: {e}")))?
        .create_if_missing(true);

    SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await
        .map_err(|e| AppError::database(format!("Failed to open database: {e}")))
}
