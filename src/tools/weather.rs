// ABOUTME: Weather lookup tool backed by the OpenWeather current-weather API
// ABOUTME: Resolves each location independently and reports failures per entry
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Aurora Chat

//! # Weather Tool
//!
//! Fetches current weather for one or more locations. Each location is
//! resolved independently: a failure for one never drops the results of the
//! others, and the output preserves the input order. Failures carry a
//! user-presentable title/message (Portuguese, matching the assistant's
//! language) plus a closed machine-readable code.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, instrument, warn};

use crate::config::WeatherApiConfig;
use crate::errors::AppError;

/// Closed set of weather failure codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WeatherErrorCode {
    /// The location could not be resolved
    #[serde(rename = "NOT_FOUND")]
    NotFound,
    /// The upstream rejected the request (authentication, service failure)
    #[serde(rename = "API_ERROR")]
    ApiError,
    /// Transport failure reaching the upstream
    #[serde(rename = "NETWORK_ERROR")]
    NetworkError,
    /// The upstream answered with an incomplete payload
    #[serde(rename = "INVALID_DATA")]
    InvalidData,
}

/// Weather condition summary
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeatherCondition {
    /// Condition group (Rain, Clouds, Clear, ...)
    pub main: String,
    /// Localized description
    pub description: String,
}

/// Temperature and atmosphere readings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeatherMain {
    pub temp: f64,
    pub feels_like: f64,
    pub temp_min: f64,
    pub temp_max: f64,
    pub humidity: f64,
    pub pressure: f64,
}

/// Wind readings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeatherWind {
    pub speed: f64,
}

/// Country metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeatherSys {
    pub country: String,
}

/// A successful weather lookup for one location
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeatherReport {
    pub weather: Vec<WeatherCondition>,
    pub main: WeatherMain,
    pub wind: WeatherWind,
    pub sys: WeatherSys,
    /// Resolved location name
    pub name: String,
    /// Upstream status code (200 on success)
    pub cod: i64,
}

/// User-presentable failure detail for one location
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeatherErrorDetail {
    /// Short title for display
    pub title: String,
    /// Full user-facing message
    pub message: String,
    /// The location that failed (or the joined list for aggregate failures)
    pub location: String,
    /// Machine-readable failure code
    pub code: WeatherErrorCode,
}

/// A failed weather lookup entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeatherFailure {
    pub error: WeatherErrorDetail,
}

/// One entry of the weather tool output: a report or a failure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WeatherLookup {
    /// Successful lookup
    Report(WeatherReport),
    /// Failed lookup with user-presentable detail
    Failure(WeatherFailure),
}

impl WeatherLookup {
    /// The failure detail, when this entry is a failure
    #[must_use]
    pub const fn failure(&self) -> Option<&WeatherErrorDetail> {
        match self {
            Self::Report(_) => None,
            Self::Failure(failure) => Some(&failure.error),
        }
    }
}

/// Weather lookup tool backed by the OpenWeather current-weather API
pub struct WeatherTool {
    client: Client,
    config: WeatherApiConfig,
}

impl WeatherTool {
    /// Create a weather tool with the given upstream configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(config: WeatherApiConfig) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| AppError::internal(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self { client, config })
    }

    /// A tool with no upstream configured; every lookup reports a failure.
    /// Used in tests and when the API key is absent at startup.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            client: Client::new(),
            config: WeatherApiConfig {
                base_url: "http://127.0.0.1:9".to_owned(),
                api_key: None,
                request_timeout_secs: 1,
            },
        }
    }

    /// Fetch current weather for every requested location
    ///
    /// Total operation: the output always has one entry per location (report
    /// or failure) in input order. Only the degenerate empty-input case
    /// collapses to a single aggregate failure entry.
    #[instrument(skip(self), fields(locations = locations.len()))]
    pub async fn execute(&self, locations: &[String]) -> Vec<WeatherLookup> {
        let mut results = Vec::with_capacity(locations.len());

        for location in locations {
            results.push(self.lookup(location).await);
        }

        if results.is_empty() {
            return vec![WeatherLookup::Failure(WeatherFailure {
                error: WeatherErrorDetail {
                    title: "Serviço indisponível".to_owned(),
                    message: "Não foi possível obter previsão do tempo para nenhuma das \
                              localidades solicitadas. Por favor, tente novamente mais tarde."
                        .to_owned(),
                    location: locations.join(", "),
                    code: WeatherErrorCode::ApiError,
                },
            })];
        }

        results
    }

    /// Resolve one location, mapping every failure mode to a failure entry
    async fn lookup(&self, location: &str) -> WeatherLookup {
        match self.fetch(location).await {
            Ok(data) => Self::classify(location, &data),
            Err(e) => {
                warn!("Weather fetch for {location} failed: {e}");
                failure(
                    "Erro de conexão",
                    format!(
                        "Não foi possível conectar ao serviço meteorológico para obter dados \
                         de {location}. Verifique sua conexão e tente novamente."
                    ),
                    location,
                    WeatherErrorCode::NetworkError,
                )
            }
        }
    }

    /// Perform the HTTP call and decode the JSON body
    async fn fetch(&self, location: &str) -> Result<Value, reqwest::Error> {
        let url = format!(
            "{}/weather?q={}&appid={}&units=metric&lang=pt_br",
            self.config.base_url.trim_end_matches('/'),
            urlencoding::encode(location),
            self.config.api_key.as_deref().unwrap_or_default(),
        );

        let response = self.client.get(&url).send().await?;
        debug!(
            "Weather upstream answered {} for {location}",
            response.status()
        );
        response.json::<Value>().await
    }

    /// Map an upstream payload to a report or a failure entry
    fn classify(location: &str, data: &Value) -> WeatherLookup {
        let cod = status_code(data);

        if cod == 401 {
            return failure(
                "Erro de autenticação",
                "Não foi possível acessar o serviço meteorológico. Por favor, tente \
                 novamente mais tarde."
                    .to_owned(),
                location,
                WeatherErrorCode::ApiError,
            );
        }

        if cod != 200 {
            return failure(
                "Localização não encontrada",
                format!(
                    "Não foi possível encontrar dados para {location}. Verifique se o nome \
                     da cidade está correto."
                ),
                location,
                WeatherErrorCode::NotFound,
            );
        }

        let (Some(condition), Some(main)) = (data["weather"].get(0), data.get("main")) else {
            return incomplete_data(location);
        };

        let Ok(main) = WeatherMain::deserialize(main) else {
            return incomplete_data(location);
        };

        WeatherLookup::Report(WeatherReport {
            weather: vec![WeatherCondition {
                main: field_str(condition, "main"),
                description: field_str(condition, "description"),
            }],
            main,
            wind: WeatherWind {
                speed: data["wind"]["speed"].as_f64().unwrap_or(0.0),
            },
            sys: WeatherSys {
                country: field_str(&data["sys"], "country"),
            },
            name: field_str(data, "name"),
            cod,
        })
    }
}

/// The upstream reports `cod` as a number on success and a string on errors
fn status_code(data: &Value) -> i64 {
    match &data["cod"] {
        Value::Number(n) => n.as_i64().unwrap_or(0),
        Value::String(s) => s.parse().unwrap_or(0),
        _ => 0,
    }
}

fn field_str(value: &Value, key: &str) -> String {
    value[key].as_str().unwrap_or_default().to_owned()
}

fn failure(
    title: &str,
    message: String,
    location: &str,
    code: WeatherErrorCode,
) -> WeatherLookup {
    WeatherLookup::Failure(WeatherFailure {
        error: WeatherErrorDetail {
            title: title.to_owned(),
            message,
            location: location.to_owned(),
            code,
        },
    })
}

fn incomplete_data(location: &str) -> WeatherLookup {
    failure(
        "Dados incompletos",
        format!(
            "Os dados meteorológicos para {location} estão incompletos ou indisponíveis no \
             momento. Por favor, tente novamente mais tarde."
        ),
        location,
        WeatherErrorCode::InvalidData,
    )
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;
    use serde_json::json;

    fn sample_payload() -> Value {
        json!({
            "weather": [{ "main": "Clouds", "description": "nublado" }],
            "main": {
                "temp": 21.5, "feels_like": 21.0, "temp_min": 19.0,
                "temp_max": 24.0, "humidity": 60, "pressure": 1015
            },
            "wind": { "speed": 3.2 },
            "sys": { "country": "PT" },
            "name": "Lisboa",
            "cod": 200
        })
    }

    #[test]
    fn test_classify_success_payload() {
        let result = WeatherTool::classify("Lisboa", &sample_payload());
        match result {
            WeatherLookup::Report(report) => {
                assert_eq!(report.name, "Lisboa");
                assert_eq!(report.cod, 200);
                assert_eq!(report.weather[0].main, "Clouds");
                assert!((report.main.temp - 21.5).abs() < f64::EPSILON);
                assert_eq!(report.sys.country, "PT");
            }
            WeatherLookup::Failure(f) => panic!("expected report, got {:?}", f.error.code),
        }
    }

    #[test]
    fn test_classify_string_cod_not_found() {
        // Upstream error payloads encode cod as a string
        let data = json!({ "cod": "404", "message": "city not found" });
        let result = WeatherTool::classify("Atlantis", &data);
        let error = result.failure().expect("failure entry");
        assert_eq!(error.code, WeatherErrorCode::NotFound);
        assert_eq!(error.location, "Atlantis");
        assert!(error.message.contains("Atlantis"));
    }

    #[test]
    fn test_classify_auth_failure_is_api_error() {
        let data = json!({ "cod": 401, "message": "Invalid API key" });
        let result = WeatherTool::classify("Lisboa", &data);
        let error = result.failure().expect("failure entry");
        assert_eq!(error.code, WeatherErrorCode::ApiError);
        assert_eq!(error.title, "Erro de autenticação");
    }

    #[test]
    fn test_classify_missing_main_is_invalid_data() {
        let mut data = sample_payload();
        data.as_object_mut().expect("object").remove("main");
        let result = WeatherTool::classify("Lisboa", &data);
        let error = result.failure().expect("failure entry");
        assert_eq!(error.code, WeatherErrorCode::InvalidData);
    }

    #[test]
    fn test_missing_wind_defaults_to_zero_speed() {
        let mut data = sample_payload();
        data.as_object_mut().expect("object").remove("wind");
        match WeatherTool::classify("Lisboa", &data) {
            WeatherLookup::Report(report) => assert!((report.wind.speed - 0.0).abs() < f64::EPSILON),
            WeatherLookup::Failure(f) => panic!("expected report, got {:?}", f.error.code),
        }
    }

    #[tokio::test]
    async fn test_empty_input_collapses_to_aggregate_failure() {
        let tool = WeatherTool::disabled();
        let results = tool.execute(&[]).await;

        assert_eq!(results.len(), 1);
        let error = results[0].failure().expect("aggregate failure");
        assert_eq!(error.code, WeatherErrorCode::ApiError);
        assert_eq!(error.title, "Serviço indisponível");
    }

    #[tokio::test]
    async fn test_unreachable_upstream_reports_network_error_per_location() {
        let tool = WeatherTool::disabled();
        let locations = vec!["Lisboa".to_owned(), "Porto".to_owned()];
        let results = tool.execute(&locations).await;

        assert_eq!(results.len(), 2);
        for (result, location) in results.iter().zip(&locations) {
            let error = result.failure().expect("failure entry");
            assert_eq!(error.code, WeatherErrorCode::NetworkError);
            assert_eq!(&error.location, location);
        }
    }
}
