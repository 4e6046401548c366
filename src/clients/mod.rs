// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 kaflow contributors

//! HTTP clients of the Kafka ecosystem services
//!
//! Each service is reached through an async trait so that handlers can run
//! against in-memory implementations. The reqwest-backed clients map
//! `404` to [`KaflowError::NotFound`], `409` to [`KaflowError::Conflict`]
//! and any other non-success status to [`KaflowError::Transport`].

mod kafka_connect;
mod kafka_rest;
mod schema_registry;

pub use kafka_connect::{ConnectorInfo, KafkaConnectApi, KafkaConnectClient};
pub use kafka_rest::{
    ConfigAlteration, ConfigOperation, KafkaRestApi, KafkaRestClient, TopicConfigEntry, TopicInfo,
};
pub use schema_registry::{SchemaRegistryApi, SchemaRegistryClient, SchemaVersion};

use std::time::Duration;

use crate::errors::{KaflowError, KaflowResult};

/// Shared reqwest client with a request timeout in seconds
fn http_client(timeout: u64) -> KaflowResult<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout))
        .build()
        .map_err(|e| KaflowError::Http {
            message: format!("Failed to create HTTP client: {}", e),
        })
}

/// Classify the status of a response
async fn check_response(
    response: reqwest::Response,
    service: &'static str,
    resource: &'static str,
    name: &str,
) -> KaflowResult<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    match status.as_u16() {
        404 => Err(KaflowError::NotFound {
            resource,
            name: name.to_string(),
        }),
        409 => Err(KaflowError::Conflict {
            resource,
            name: name.to_string(),
        }),
        code => Err(KaflowError::Transport {
            service,
            status: code,
            body: response.text().await.unwrap_or_default(),
        }),
    }
}

fn trim_url(url: &str) -> String {
    url.trim_end_matches('/').to_string()
}
