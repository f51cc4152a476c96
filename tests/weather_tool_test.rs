// ABOUTME: Integration tests for the weather tool against a local stub upstream
// ABOUTME: Mixed success/failure lookups with order preservation
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Aurora Chat

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

use std::collections::HashMap;

use aurora_chat_server::config::WeatherApiConfig;
use aurora_chat_server::tools::weather::{WeatherErrorCode, WeatherLookup, WeatherTool};
use aurora_chat_server::tools::{ToolRegistry, WEATHER_TOOL_NAME};
use axum::extract::Query;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};

/// Stub OpenWeather endpoint: `Paris` resolves, everything else is a 404
/// payload with the string-typed `cod` the real upstream sends on errors.
async fn stub_weather(Query(params): Query<HashMap<String, String>>) -> Json<Value> {
    let location = params.get("q").cloned().unwrap_or_default();
    if location == "Paris" {
        Json(json!({
            "weather": [{ "main": "Clear", "description": "céu limpo" }],
            "main": {
                "temp": 21.0, "feels_like": 20.5, "temp_min": 18.0,
                "temp_max": 24.0, "humidity": 55, "pressure": 1018
            },
            "wind": { "speed": 2.1 },
            "sys": { "country": "FR" },
            "name": "Paris",
            "cod": 200
        }))
    } else {
        Json(json!({ "cod": "404", "message": "city not found" }))
    }
}

async fn spawn_stub() -> String {
    let app = Router::new().route("/weather", get(stub_weather));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

async fn stub_tool() -> WeatherTool {
    WeatherTool::new(WeatherApiConfig {
        base_url: spawn_stub().await,
        api_key: Some("test-key".to_owned()),
        request_timeout_secs: 5,
    })
    .unwrap()
}

#[tokio::test]
async fn test_successful_lookup() {
    let tool = stub_tool().await;
    let results = tool.execute(&["Paris".to_owned()]).await;

    assert_eq!(results.len(), 1);
    match &results[0] {
        WeatherLookup::Report(report) => {
            assert_eq!(report.name, "Paris");
            assert_eq!(report.sys.country, "FR");
            assert!((report.main.temp - 21.0).abs() < f64::EPSILON);
        }
        WeatherLookup::Failure(f) => panic!("expected report, got {:?}", f.error.code),
    }
}

#[tokio::test]
async fn test_mixed_lookup_preserves_order_and_never_drops_entries() {
    let tool = stub_tool().await;
    let results = tool
        .execute(&["Paris".to_owned(), "CidadeInexistenteXYZ".to_owned()])
        .await;

    assert_eq!(results.len(), 2);
    assert!(matches!(&results[0], WeatherLookup::Report(r) if r.name == "Paris"));

    let error = results[1].failure().expect("not-found entry");
    assert_eq!(error.code, WeatherErrorCode::NotFound);
    assert_eq!(error.location, "CidadeInexistenteXYZ");
    assert_eq!(error.title, "Localização não encontrada");
}

#[tokio::test]
async fn test_registry_dispatch_over_stub() {
    let registry = ToolRegistry::new(stub_tool().await);
    let call = aurora_chat_server::llm::FunctionCall {
        name: WEATHER_TOOL_NAME.to_owned(),
        args: json!({ "location": ["Paris", "CidadeInexistenteXYZ"] }),
    };

    let response = registry.execute(&call).await;
    assert_eq!(response.name, WEATHER_TOOL_NAME);

    let entries = response.response.as_array().expect("array payload");
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0]["name"], "Paris");
    assert_eq!(entries[1]["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_locations_with_spaces_are_encoded() {
    let tool = stub_tool().await;
    let results = tool.execute(&["São Paulo".to_owned()]).await;

    // The stub only knows Paris, but the request must reach it intact
    let error = results[0].failure().expect("failure entry");
    assert_eq!(error.code, WeatherErrorCode::NotFound);
    assert_eq!(error.location, "São Paulo");
}
