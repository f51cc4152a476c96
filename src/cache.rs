// ABOUTME: In-process query cache for client-side data fetching
// ABOUTME: Keyed cache with prefix invalidation, used by the stream consumer

// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Aurora Chat

//! # Query Cache
//!
//! A small concurrent cache for fetched query results, keyed by structured
//! cache keys rendered to strings. The client stream consumer invalidates the
//! conversation-list key after a persisted chat finishes so the history
//! sidebar refetches.

use std::fmt;

use dashmap::DashMap;
use serde_json::Value;

/// Structured cache keys for query results
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryKey {
    /// Conversation list for one user
    Conversations {
        /// Owner of the listed conversations
        user_id: String,
    },
    /// Message list for one conversation
    Messages {
        /// The conversation whose messages are cached
        conversation_id: String,
    },
}

impl QueryKey {
    /// Prefix that invalidates every conversation-list entry
    pub const CONVERSATIONS_PREFIX: &'static str = "conversations:";
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Conversations { user_id } => write!(f, "conversations:{user_id}"),
            Self::Messages { conversation_id } => write!(f, "messages:{conversation_id}"),
        }
    }
}

/// Concurrent cache of query results
#[derive(Debug, Default)]
pub struct QueryCache {
    entries: DashMap<String, Value>,
}

impl QueryCache {
    /// Create an empty cache
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a query result
    pub fn set(&self, key: &QueryKey, value: Value) {
        self.entries.insert(key.to_string(), value);
    }

    /// Fetch a cached query result
    #[must_use]
    pub fn get(&self, key: &QueryKey) -> Option<Value> {
        self.entries.get(&key.to_string()).map(|e| e.value().clone())
    }

    /// Drop a single entry
    pub fn invalidate(&self, key: &QueryKey) {
        self.entries.remove(&key.to_string());
    }

    /// Drop every entry whose key starts with `prefix`
    pub fn invalidate_prefix(&self, prefix: &str) {
        self.entries.retain(|key, _| !key.starts_with(prefix));
    }

    /// Number of cached entries
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache holds no entries
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
