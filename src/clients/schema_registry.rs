// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 kaflow contributors

//! Confluent Schema Registry

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::{check_response, http_client, trim_url};
use crate::config::SchemaRegistryConfig;
use crate::errors::KaflowResult;

const SERVICE: &str = "Schema Registry";
const RESOURCE: &str = "Subject";

/// Registered version of a subject
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SchemaVersion {
    pub subject: String,
    pub version: u32,
    pub id: u32,
    pub schema: String,
}

#[async_trait]
pub trait SchemaRegistryApi: Send + Sync {
    async fn get_latest_version(&self, subject: &str) -> KaflowResult<SchemaVersion>;

    /// Whether `schema` can be registered under `subject`
    async fn check_compatibility(&self, subject: &str, schema: &str) -> KaflowResult<bool>;

    /// Register `schema`, returning its id
    async fn register_schema(&self, subject: &str, schema: &str) -> KaflowResult<u32>;

    /// Delete all versions of a subject
    async fn delete_subject(&self, subject: &str) -> KaflowResult<Vec<u32>>;
}

/// reqwest client of the Schema Registry API
#[derive(Debug, Clone)]
pub struct SchemaRegistryClient {
    base_url: String,
    client: reqwest::Client,
}

impl SchemaRegistryClient {
    pub fn new(config: &SchemaRegistryConfig) -> KaflowResult<Self> {
        Ok(Self {
            base_url: trim_url(&config.url),
            client: http_client(config.timeout)?,
        })
    }
}

#[derive(Debug, Deserialize)]
struct CompatibilityResponse {
    is_compatible: bool,
}

#[derive(Debug, Deserialize)]
struct RegisterResponse {
    id: u32,
}

#[async_trait]
impl SchemaRegistryApi for SchemaRegistryClient {
    async fn get_latest_version(&self, subject: &str) -> KaflowResult<SchemaVersion> {
        let url = format!("{}/subjects/{}/versions/latest", self.base_url, subject);
        let response = self.client.get(&url).send().await?;
        let response = check_response(response, SERVICE, RESOURCE, subject).await?;
        Ok(response.json().await?)
    }

    async fn check_compatibility(&self, subject: &str, schema: &str) -> KaflowResult<bool> {
        let url = format!(
            "{}/compatibility/subjects/{}/versions/latest",
            self.base_url, subject
        );
        let response = self
            .client
            .post(&url)
            .json(&json!({"schema": schema}))
            .send()
            .await?;
        let response = check_response(response, SERVICE, RESOURCE, subject).await?;
        let result: CompatibilityResponse = response.json().await?;
        Ok(result.is_compatible)
    }

    async fn register_schema(&self, subject: &str, schema: &str) -> KaflowResult<u32> {
        let url = format!("{}/subjects/{}/versions", self.base_url, subject);
        let response = self
            .client
            .post(&url)
            .json(&json!({"schema": schema}))
            .send()
            .await?;
        let response = check_response(response, SERVICE, RESOURCE, subject).await?;
        let result: RegisterResponse = response.json().await?;
        Ok(result.id)
    }

    async fn delete_subject(&self, subject: &str) -> KaflowResult<Vec<u32>> {
        let url = format!("{}/subjects/{}", self.base_url, subject);
        let response = self.client.delete(&url).send().await?;
        let response = check_response(response, SERVICE, RESOURCE, subject).await?;
        Ok(response.json().await?)
    }
}
