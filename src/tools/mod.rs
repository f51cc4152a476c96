// ABOUTME: Tool registry exposing callable tools to the model
// ABOUTME: Builds function declarations and dispatches model tool calls
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Aurora Chat

//! # Tool Registry
//!
//! The closed set of tools the assistant can call. The registry hands the
//! model a list of function declarations and dispatches each requested call
//! to the matching implementation. Tool execution is total: failures are
//! reported inside the `FunctionResponse` payload, never as a pipeline error.

pub mod weather;

pub use weather::WeatherTool;

use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use crate::llm::{FunctionCall, FunctionDeclaration, FunctionResponse, Tool};

/// Function name the model uses to request a weather lookup
pub const WEATHER_TOOL_NAME: &str = "getWeather";

/// Parameters accepted by the weather tool
///
/// The schema declares an array, but some models send a bare string for
/// single locations; both shapes are accepted.
#[derive(Debug, Clone, Deserialize)]
pub struct WeatherParams {
    /// Locations to resolve, in request order
    pub location: LocationInput,
}

/// One location or several
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum LocationInput {
    /// A single location string
    One(String),
    /// A list of location strings
    Many(Vec<String>),
}

impl LocationInput {
    /// Normalize to a list
    #[must_use]
    pub fn into_vec(self) -> Vec<String> {
        match self {
            Self::One(location) => vec![location],
            Self::Many(locations) => locations,
        }
    }
}

/// Registry of tools available to the chat pipeline
pub struct ToolRegistry {
    weather: WeatherTool,
}

impl ToolRegistry {
    /// Create a registry with the given tool implementations
    #[must_use]
    pub const fn new(weather: WeatherTool) -> Self {
        Self { weather }
    }

    /// Function declarations offered to the model on every tool-loop request
    #[must_use]
    pub fn declarations(&self) -> Vec<Tool> {
        vec![Tool {
            function_declarations: vec![FunctionDeclaration {
                name: WEATHER_TOOL_NAME.to_owned(),
                description: "Disponibiliza a previsão do tempo para um ou mais locais".to_owned(),
                parameters: Some(json!({
                    "type": "object",
                    "properties": {
                        "location": {
                            "type": "array",
                            "items": { "type": "string" },
                            "description": "Os locais para obter a previsão do tempo"
                        }
                    },
                    "required": ["location"]
                })),
            }],
        }]
    }

    /// Execute a function call requested by the model
    ///
    /// Never fails: unknown tools and malformed arguments produce an error
    /// payload the model can read and explain to the user.
    pub async fn execute(&self, call: &FunctionCall) -> FunctionResponse {
        debug!("Executing tool call: {}", call.name);

        let response = match call.name.as_str() {
            WEATHER_TOOL_NAME => match WeatherParams::deserialize(&call.args) {
                Ok(params) => {
                    let results = self.weather.execute(&params.location.into_vec()).await;
                    serde_json::to_value(results)
                        .unwrap_or_else(|e| json!({ "error": format!("serialization failed: {e}") }))
                }
                Err(e) => {
                    warn!("Malformed arguments for {}: {}", call.name, e);
                    json!({ "error": format!("invalid arguments: {e}") })
                }
            },
            unknown => {
                warn!("Model requested unknown tool: {unknown}");
                json!({ "error": format!("unknown tool: {unknown}") })
            }
        };

        FunctionResponse {
            name: call.name.clone(),
            response,
        }
    }
}
