// ABOUTME: Environment configuration management for deployment-specific settings
// ABOUTME: Typed config structs with from_env constructors and sane defaults
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Aurora Chat

//! Environment-based configuration management for production deployment

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use tracing::warn;

/// Top-level server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// HTTP port for the chat API
    pub http_port: u16,
    /// Database connection string (SQLite)
    pub database_url: String,
    /// Log level passed to the tracing filter
    pub log_level: String,
    /// LLM upstream configuration
    pub llm: LlmConfig,
    /// Weather tool upstream configuration
    pub weather: WeatherApiConfig,
}

/// Configuration for the OpenAI-compatible LLM upstream
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Base URL of the chat-completions API (hosted or local)
    pub base_url: String,
    /// Bearer token; local endpoints may not need one
    pub api_key: Option<String>,
    /// Model identifier sent with every request
    pub model: String,
    /// Whole-request timeout for non-streaming calls and the streaming
    /// connect, in seconds
    pub request_timeout_secs: u64,
}

/// Configuration for the OpenWeather upstream used by the weather tool
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeatherApiConfig {
    /// Base URL of the current-weather API
    pub base_url: String,
    /// API key; the tool reports `API_ERROR` entries when absent
    pub api_key: Option<String>,
    /// Per-call timeout in seconds
    pub request_timeout_secs: u64,
}

impl ServerConfig {
    /// Load configuration from environment variables
    ///
    /// # Errors
    /// Returns an error when a numeric variable fails to parse.
    pub fn from_env() -> Result<Self> {
        // Load .env file if it exists
        if let Err(e) = dotenvy::dotenv() {
            warn!("No .env file found or failed to load: {}", e);
        }

        Ok(Self {
            http_port: env_var_or("AURORA_HTTP_PORT", "8080")
                .parse()
                .context("Invalid AURORA_HTTP_PORT value")?,
            database_url: env_var_or("DATABASE_URL", "sqlite:./data/aurora.db"),
            log_level: env_var_or("RUST_LOG", "info"),
            llm: LlmConfig::from_env()?,
            weather: WeatherApiConfig::from_env()?,
        })
    }

    /// One-line summary for startup logging (never includes secrets)
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "http_port={} database={} llm={} model={} weather_key={}",
            self.http_port,
            self.database_url,
            self.llm.base_url,
            self.llm.model,
            if self.weather.api_key.is_some() {
                "set"
            } else {
                "missing"
            }
        )
    }
}

impl LlmConfig {
    /// Load LLM configuration from environment variables
    ///
    /// # Errors
    /// Returns an error when the timeout variable fails to parse.
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            base_url: env_var_or("AURORA_LLM_BASE_URL", "https://api.openai.com/v1"),
            api_key: env::var("AURORA_LLM_API_KEY").ok(),
            model: env_var_or("AURORA_LLM_MODEL", "gpt-4o-mini"),
            request_timeout_secs: env_var_or("AURORA_LLM_TIMEOUT_SECS", "120")
                .parse()
                .context("Invalid AURORA_LLM_TIMEOUT_SECS value")?,
        })
    }
}

impl WeatherApiConfig {
    /// Load weather configuration from environment variables
    ///
    /// # Errors
    /// Returns an error when the timeout variable fails to parse.
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            base_url: env_var_or(
                "OPENWEATHER_BASE_URL",
                "https://api.openweathermap.org/data/2.5",
            ),
            api_key: env::var("OPENWEATHER_API_KEY").ok(),
            request_timeout_secs: env_var_or("OPENWEATHER_TIMEOUT_SECS", "10")
                .parse()
                .context("Invalid OPENWEATHER_TIMEOUT_SECS value")?,
        })
    }
}

fn env_var_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_var_or_default() {
        assert_eq!(env_var_or("AURORA_DOES_NOT_EXIST", "fallback"), "fallback");
    }

    #[test]
    fn test_summary_never_leaks_keys() {
        let config = ServerConfig {
            http_port: 8080,
            database_url: "sqlite::memory:".to_string(),
            log_level: "info".to_string(),
            llm: LlmConfig {
                base_url: "http://localhost:11434/v1".to_string(),
                api_key: Some("super-secret".to_string()),
                model: "llama3".to_string(),
                request_timeout_secs: 120,
            },
            weather: WeatherApiConfig {
                base_url: "https://api.openweathermap.org/data/2.5".to_string(),
                api_key: Some("weather-secret".to_string()),
                request_timeout_secs: 10,
            },
        };

        let summary = config.summary();
        assert!(!summary.contains("super-secret"));
        assert!(!summary.contains("weather-secret"));
        assert!(summary.contains("weather_key=set"));
    }
}
