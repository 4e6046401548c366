// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 kaflow contributors

//! Kafka Connect REST API

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;

use super::{check_response, http_client, trim_url};
use crate::config::KafkaConnectConfig;
use crate::errors::{KaflowError, KaflowResult};

const SERVICE: &str = "Kafka Connect";
const RESOURCE: &str = "Connector";

/// Connector as reported by Kafka Connect
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConnectorInfo {
    pub name: String,
    #[serde(default)]
    pub config: BTreeMap<String, String>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub connector_type: Option<String>,
}

#[async_trait]
pub trait KafkaConnectApi: Send + Sync {
    async fn get_connector(&self, name: &str) -> KaflowResult<ConnectorInfo>;

    async fn create_connector(
        &self,
        name: &str,
        config: &BTreeMap<String, String>,
    ) -> KaflowResult<ConnectorInfo>;

    async fn update_connector_config(
        &self,
        name: &str,
        config: &BTreeMap<String, String>,
    ) -> KaflowResult<ConnectorInfo>;

    async fn delete_connector(&self, name: &str) -> KaflowResult<()>;

    /// Field level validation errors, empty when the config is valid
    async fn validate_connector_config(
        &self,
        config: &BTreeMap<String, String>,
    ) -> KaflowResult<Vec<String>>;
}

/// reqwest client of the Kafka Connect REST API
#[derive(Debug, Clone)]
pub struct KafkaConnectClient {
    base_url: String,
    client: reqwest::Client,
}

impl KafkaConnectClient {
    pub fn new(config: &KafkaConnectConfig) -> KaflowResult<Self> {
        Ok(Self {
            base_url: trim_url(&config.url),
            client: http_client(config.timeout)?,
        })
    }
}

#[derive(Debug, Deserialize)]
struct ValidationResponse {
    #[serde(default)]
    error_count: u32,
    #[serde(default)]
    configs: Vec<ValidatedConfig>,
}

#[derive(Debug, Deserialize)]
struct ValidatedConfig {
    value: ValidatedValue,
}

#[derive(Debug, Deserialize)]
struct ValidatedValue {
    name: String,
    #[serde(default)]
    errors: Vec<String>,
}

/// Flatten a validation response into `field: message` lines
fn validation_errors(response: ValidationResponse) -> Vec<String> {
    if response.error_count == 0 {
        return vec![];
    }

    response
        .configs
        .into_iter()
        .flat_map(|config| {
            let name = config.value.name;
            config
                .value
                .errors
                .into_iter()
                .map(move |error| format!("{}: {}", name, error))
        })
        .collect()
}

#[async_trait]
impl KafkaConnectApi for KafkaConnectClient {
    async fn get_connector(&self, name: &str) -> KaflowResult<ConnectorInfo> {
        let url = format!("{}/connectors/{}", self.base_url, name);
        let response = self.client.get(&url).send().await?;
        let response = check_response(response, SERVICE, RESOURCE, name).await?;
        Ok(response.json().await?)
    }

    async fn create_connector(
        &self,
        name: &str,
        config: &BTreeMap<String, String>,
    ) -> KaflowResult<ConnectorInfo> {
        let url = format!("{}/connectors", self.base_url);
        let body = json!({"name": name, "config": config});
        let response = self.client.post(&url).json(&body).send().await?;
        let response = check_response(response, SERVICE, RESOURCE, name).await?;
        Ok(response.json().await?)
    }

    async fn update_connector_config(
        &self,
        name: &str,
        config: &BTreeMap<String, String>,
    ) -> KaflowResult<ConnectorInfo> {
        let url = format!("{}/connectors/{}/config", self.base_url, name);
        let response = self.client.put(&url).json(config).send().await?;
        let response = check_response(response, SERVICE, RESOURCE, name).await?;
        Ok(response.json().await?)
    }

    async fn delete_connector(&self, name: &str) -> KaflowResult<()> {
        let url = format!("{}/connectors/{}", self.base_url, name);
        let response = self.client.delete(&url).send().await?;
        check_response(response, SERVICE, RESOURCE, name).await?;
        Ok(())
    }

    async fn validate_connector_config(
        &self,
        config: &BTreeMap<String, String>,
    ) -> KaflowResult<Vec<String>> {
        let class = config
            .get("connector.class")
            .ok_or_else(|| KaflowError::validation("connector config requires 'connector.class'"))?;
        let plugin = class.rsplit('.').next().unwrap_or(class);

        let url = format!(
            "{}/connector-plugins/{}/config/validate",
            self.base_url, plugin
        );
        let response = self.client.put(&url).json(config).send().await?;
        let response = check_response(response, SERVICE, "Connector plugin", plugin).await?;
        let body: Value = response.json().await?;
        let parsed: ValidationResponse = serde_json::from_value(body)?;
        Ok(validation_errors(parsed))
    }
}
