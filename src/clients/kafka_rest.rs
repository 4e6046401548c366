// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 kaflow contributors

//! Kafka REST Proxy v3

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeMap;
use tokio::sync::OnceCell;

use super::{check_response, http_client, trim_url};
use crate::components::KafkaTopic;
use crate::config::KafkaRestConfig;
use crate::errors::{KaflowError, KaflowResult};

const SERVICE: &str = "Kafka REST Proxy";
const RESOURCE: &str = "Topic";

/// Source of per-topic overrides in a topic config listing
pub const DYNAMIC_TOPIC_CONFIG: &str = "DYNAMIC_TOPIC_CONFIG";

/// Partition layout of an existing topic
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TopicInfo {
    pub topic_name: String,
    pub partitions_count: u32,
    pub replication_factor: u32,
}

/// One entry of a topic's configuration listing
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TopicConfigEntry {
    pub name: String,
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub source: String,
}

impl TopicConfigEntry {
    /// Set on the topic itself rather than inherited
    pub fn is_dynamic(&self) -> bool {
        self.source == DYNAMIC_TOPIC_CONFIG
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum ConfigOperation {
    Set,
    Delete,
}

/// One operation of a batched config alteration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConfigAlteration {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    pub operation: ConfigOperation,
}

impl ConfigAlteration {
    pub fn set(name: &str, value: &str) -> Self {
        Self {
            name: name.to_string(),
            value: Some(value.to_string()),
            operation: ConfigOperation::Set,
        }
    }

    pub fn delete(name: &str) -> Self {
        Self {
            name: name.to_string(),
            value: None,
            operation: ConfigOperation::Delete,
        }
    }
}

#[async_trait]
pub trait KafkaRestApi: Send + Sync {
    async fn get_topic(&self, name: &str) -> KaflowResult<TopicInfo>;

    async fn create_topic(&self, topic: &KafkaTopic) -> KaflowResult<()>;

    async fn delete_topic(&self, name: &str) -> KaflowResult<()>;

    async fn get_topic_config(&self, name: &str) -> KaflowResult<Vec<TopicConfigEntry>>;

    async fn batch_alter_topic_config(
        &self,
        name: &str,
        alterations: &[ConfigAlteration],
    ) -> KaflowResult<()>;

    /// Configuration of the first broker, name to value
    async fn get_broker_config(&self) -> KaflowResult<BTreeMap<String, String>>;
}

/// reqwest client of the REST Proxy v3 API
#[derive(Debug)]
pub struct KafkaRestClient {
    base_url: String,
    client: reqwest::Client,
    cluster_id: OnceCell<String>,
}

#[derive(Debug, Deserialize)]
struct Listing<T> {
    data: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct ClusterEntry {
    cluster_id: String,
}

#[derive(Debug, Deserialize)]
struct BrokerEntry {
    broker_id: i64,
}

impl KafkaRestClient {
    pub fn new(config: &KafkaRestConfig) -> KaflowResult<Self> {
        Ok(Self {
            base_url: trim_url(&config.url),
            client: http_client(config.timeout)?,
            cluster_id: OnceCell::new(),
        })
    }

    /// Id of the first cluster, looked up once
    async fn cluster_id(&self) -> KaflowResult<&str> {
        let id = self
            .cluster_id
            .get_or_try_init(|| async {
                let url = format!("{}/v3/clusters", self.base_url);
                let response = self.client.get(&url).send().await?;
                let response = check_response(response, SERVICE, "Cluster", "").await?;
                let listing: Listing<ClusterEntry> = response.json().await?;
                let cluster = listing.data.into_iter().next().ok_or_else(|| {
                    KaflowError::NotFound {
                        resource: "Kafka cluster",
                        name: self.base_url.clone(),
                    }
                })?;
                tracing::debug!("Using Kafka cluster '{}'", cluster.cluster_id);
                Ok::<_, KaflowError>(cluster.cluster_id)
            })
            .await?;
        Ok(id.as_str())
    }

    async fn topics_url(&self) -> KaflowResult<String> {
        Ok(format!(
            "{}/v3/clusters/{}/topics",
            self.base_url,
            self.cluster_id().await?
        ))
    }
}

/// Request body of a topic creation
fn create_topic_body(topic: &KafkaTopic) -> serde_json::Value {
    let mut body = json!({"topic_name": topic.name});
    if let Some(partitions) = topic.config.partitions_count {
        body["partitions_count"] = json!(partitions);
    }
    if let Some(replication) = topic.config.replication_factor {
        body["replication_factor"] = json!(replication);
    }
    let configs: Vec<_> = topic
        .config
        .configs
        .iter()
        .map(|(name, value)| json!({"name": name, "value": value}))
        .collect();
    if !configs.is_empty() {
        body["configs"] = json!(configs);
    }
    body
}

#[async_trait]
impl KafkaRestApi for KafkaRestClient {
    async fn get_topic(&self, name: &str) -> KaflowResult<TopicInfo> {
        let url = format!("{}/{}", self.topics_url().await?, name);
        let response = self.client.get(&url).send().await?;
        let response = check_response(response, SERVICE, RESOURCE, name).await?;
        Ok(response.json().await?)
    }

    async fn create_topic(&self, topic: &KafkaTopic) -> KaflowResult<()> {
        let url = self.topics_url().await?;
        let response = self
            .client
            .post(&url)
            .json(&create_topic_body(topic))
            .send()
            .await?;
        check_response(response, SERVICE, RESOURCE, &topic.name).await?;
        tracing::info!("Topic creation: {} created", topic.name);
        Ok(())
    }

    async fn delete_topic(&self, name: &str) -> KaflowResult<()> {
        let url = format!("{}/{}", self.topics_url().await?, name);
        let response = self.client.delete(&url).send().await?;
        check_response(response, SERVICE, RESOURCE, name).await?;
        tracing::info!("Topic deletion: {} deleted", name);
        Ok(())
    }

    async fn get_topic_config(&self, name: &str) -> KaflowResult<Vec<TopicConfigEntry>> {
        let url = format!("{}/{}/configs", self.topics_url().await?, name);
        let response = self.client.get(&url).send().await?;
        let response = check_response(response, SERVICE, RESOURCE, name).await?;
        let listing: Listing<TopicConfigEntry> = response.json().await?;
        Ok(listing.data)
    }

    async fn batch_alter_topic_config(
        &self,
        name: &str,
        alterations: &[ConfigAlteration],
    ) -> KaflowResult<()> {
        let url = format!("{}/{}/configs:alter", self.topics_url().await?, name);
        let response = self
            .client
            .post(&url)
            .json(&json!({"data": alterations}))
            .send()
            .await?;
        check_response(response, SERVICE, RESOURCE, name).await?;
        Ok(())
    }

    async fn get_broker_config(&self) -> KaflowResult<BTreeMap<String, String>> {
        let cluster = self.cluster_id().await?.to_string();
        let url = format!("{}/v3/clusters/{}/brokers", self.base_url, cluster);
        let response = self.client.get(&url).send().await?;
        let response = check_response(response, SERVICE, "Broker", "").await?;
        let brokers: Listing<BrokerEntry> = response.json().await?;
        let broker = brokers.data.first().ok_or_else(|| KaflowError::NotFound {
            resource: "Broker",
            name: cluster.clone(),
        })?;

        let url = format!(
            "{}/v3/clusters/{}/brokers/{}/configs",
            self.base_url, cluster, broker.broker_id
        );
        let response = self.client.get(&url).send().await?;
        let response =
            check_response(response, SERVICE, "Broker", &broker.broker_id.to_string()).await?;
        let listing: Listing<TopicConfigEntry> = response.json().await?;

        Ok(listing
            .data
            .into_iter()
            .filter_map(|entry| entry.value.map(|value| (entry.name, value)))
            .collect())
    }
}
