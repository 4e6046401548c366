// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 kaflow contributors

//! Kafka Connect sink and source connectors
//!
//! The connector itself lives in Kafka Connect. Resetting offsets and
//! consumer groups is done by the kafka-connect-resetter chart, run as a
//! short lived helm release.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;

use super::base::ComponentBase;
use super::topic::string_map;
use super::TopicBinding;
use crate::config::KaflowConfig;
use crate::defaults::merge_missing;
use crate::errors::{KaflowError, KaflowResult};
use crate::handlers::{Handlers, Report};
use crate::helm::{trim_release_name, HelmFlags, HelmRelease, HelmRepoConfig, CLEAN_SUFFIX};

pub const RESETTER_REPO_NAME: &str = "bakdata-kafka-connect-resetter";
pub const RESETTER_REPO_URL: &str = "https://bakdata.github.io/kafka-connect-resetter/";

const TOPICS: &str = "topics";
const TOPICS_REGEX: &str = "topics.regex";
const DLQ_TOPIC: &str = "errors.deadletterqueue.topic.name";
const CONNECTOR_CLASS: &str = "connector.class";

fn default_resetter_repo() -> HelmRepoConfig {
    HelmRepoConfig::new(RESETTER_REPO_NAME, RESETTER_REPO_URL)
}

/// Which side of Kafka the connector sits on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConnectorType {
    Sink,
    Source,
}

impl ConnectorType {
    fn as_str(self) -> &'static str {
        match self {
            Self::Sink => "sink",
            Self::Source => "source",
        }
    }
}

/// `name` must match the component, `connector.class` is required
fn finish_config(name: &str, config: &mut BTreeMap<String, String>) -> KaflowResult<()> {
    match config.get("name") {
        Some(existing) if existing != name => {
            return Err(KaflowError::validation(format!(
                "connector config name '{}' differs from component name '{}'",
                existing, name
            )))
        }
        _ => {
            config.insert("name".to_string(), name.to_string());
        }
    }
    Ok(())
}

fn validate_config(config: &BTreeMap<String, String>) -> KaflowResult<()> {
    if !config.contains_key(CONNECTOR_CLASS) {
        return Err(KaflowError::validation(format!(
            "connector config requires '{}'",
            CONNECTOR_CLASS
        )));
    }
    Ok(())
}

/// Fields shared by both connector kinds
struct Resetter<'a> {
    base: &'a ComponentBase,
    namespace: &'a Option<String>,
    repo_config: &'a HelmRepoConfig,
    version: &'a Option<String>,
    resetter_values: &'a Map<String, Value>,
}

impl Resetter<'_> {
    /// Helm release of the resetter job
    fn release(
        &self,
        config: &KaflowConfig,
        connector_type: ConnectorType,
        resetter_config: Value,
    ) -> KaflowResult<HelmRelease> {
        let namespace = self.namespace.as_deref().ok_or_else(|| {
            KaflowError::validation(format!(
                "connector '{}' needs a namespace to run the resetter",
                self.base.name
            ))
        })?;

        let mut reset_config = json!({
            "brokers": config.kafka_brokers,
            "connector": self.base.name,
        });
        reset_config = merge_missing(resetter_config, &reset_config);

        let values = json!({
            "connectorType": connector_type.as_str(),
            "config": reset_config,
            "nameOverride": trim_release_name(&self.base.name, CLEAN_SUFFIX),
        });
        let values = merge_missing(Value::Object(self.resetter_values.clone()), &values);

        Ok(HelmRelease {
            release_name: trim_release_name(&self.base.name, CLEAN_SUFFIX),
            chart: format!("{}/kafka-connect-resetter", self.repo_config.repository_name),
            namespace: namespace.to_string(),
            values,
            repo: Some(self.repo_config.clone()),
            flags: HelmFlags {
                version: self.version.clone(),
                repo_auth_flags: self.repo_config.repo_auth_flags.clone(),
                create_namespace: config.create_namespace,
                wait: true,
                wait_for_jobs: true,
                timeout: config.timeout,
                api_version: config.helm_config.api_version.clone(),
                ..Default::default()
            },
        })
    }
}

/// Connector writing Kafka topics into an external system
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct KafkaSinkConnector {
    #[serde(flatten)]
    pub base: ComponentBase,

    /// Kafka Connect configuration
    #[serde(default, alias = "app", deserialize_with = "string_map")]
    pub config: BTreeMap<String, String>,

    /// Namespace of the resetter job
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,

    #[serde(default = "default_resetter_repo")]
    pub repo_config: HelmRepoConfig,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub resetter_values: Map<String, Value>,
}

impl KafkaSinkConnector {
    pub fn finish(&mut self, _config: &KaflowConfig) -> KaflowResult<()> {
        finish_config(&self.base.name, &mut self.config)
    }

    pub fn validate(&self) -> KaflowResult<()> {
        validate_config(&self.config)?;
        if self.config.contains_key(TOPICS) && self.config.contains_key(TOPICS_REGEX) {
            return Err(KaflowError::validation(format!(
                "sink connector '{}' may define '{}' or '{}', not both",
                self.base.name, TOPICS, TOPICS_REGEX
            )));
        }
        Ok(())
    }

    fn resetter(&self) -> Resetter<'_> {
        Resetter {
            base: &self.base,
            namespace: &self.namespace,
            repo_config: &self.repo_config,
            version: &self.version,
            resetter_values: &self.resetter_values,
        }
    }

    pub fn resetter_release(
        &self,
        config: &KaflowConfig,
        delete_consumer_group: bool,
    ) -> KaflowResult<HelmRelease> {
        self.resetter().release(
            config,
            ConnectorType::Sink,
            json!({"deleteConsumerGroup": delete_consumer_group}),
        )
    }

    pub async fn deploy(&self, handlers: &Handlers, dry_run: bool) -> KaflowResult<Vec<Report>> {
        let mut reports = handlers.deploy_topics(&self.base.to_topics(), dry_run).await?;
        reports.push(
            handlers
                .connectors
                .apply(&self.base.name, &self.config, dry_run)
                .await?,
        );
        Ok(reports)
    }

    pub async fn destroy(&self, handlers: &Handlers, dry_run: bool) -> KaflowResult<Vec<Report>> {
        Ok(vec![handlers.connectors.destroy(&self.base.name, dry_run).await?])
    }

    /// Reset offsets, keeping the consumer group
    pub async fn reset(&self, handlers: &Handlers, dry_run: bool) -> KaflowResult<Vec<Report>> {
        let release = self.resetter_release(&handlers.config, false)?;
        handlers
            .helm
            .run_clean_job(&release, dry_run, handlers.config.retain_clean_jobs)
            .await
    }

    /// Delete the `to` topics and the consumer group
    pub async fn clean(&self, handlers: &Handlers, dry_run: bool) -> KaflowResult<Vec<Report>> {
        let mut reports = handlers.delete_topics(&self.base.to_topics(), dry_run).await?;
        let release = self.resetter_release(&handlers.config, true)?;
        reports.extend(
            handlers
                .helm
                .run_clean_job(&release, dry_run, handlers.config.retain_clean_jobs)
                .await?,
        );
        Ok(reports)
    }
}

impl TopicBinding for KafkaSinkConnector {
    fn binding_name(&self) -> &str {
        &self.base.name
    }

    fn add_input_topics(&mut self, topics: &[String]) {
        let mut current: Vec<String> = self
            .config
            .get(TOPICS)
            .map(|t| {
                t.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        for topic in topics {
            if !current.contains(topic) {
                current.push(topic.clone());
            }
        }
        self.config.insert(TOPICS.to_string(), current.join(","));
    }

    fn set_input_pattern(&mut self, pattern: &str) {
        self.config.insert(TOPICS_REGEX.to_string(), pattern.to_string());
    }

    fn set_error_topic(&mut self, topic: &str) {
        self.config.insert(DLQ_TOPIC.to_string(), topic.to_string());
    }

    fn inputs(&self) -> Vec<String> {
        self.config
            .get(TOPICS)
            .map(|t| {
                t.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_default()
    }

    fn outputs(&self) -> Vec<String> {
        self.config.get(DLQ_TOPIC).cloned().into_iter().collect()
    }
}

/// Connector reading an external system into Kafka
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct KafkaSourceConnector {
    #[serde(flatten)]
    pub base: ComponentBase,

    #[serde(default, alias = "app", deserialize_with = "string_map")]
    pub config: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,

    #[serde(default = "default_resetter_repo")]
    pub repo_config: HelmRepoConfig,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub resetter_values: Map<String, Value>,

    /// Topic holding the connector's source offsets
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset_topic: Option<String>,
}

impl KafkaSourceConnector {
    pub fn finish(&mut self, _config: &KaflowConfig) -> KaflowResult<()> {
        finish_config(&self.base.name, &mut self.config)
    }

    pub fn validate(&self) -> KaflowResult<()> {
        validate_config(&self.config)?;
        if self.base.from.is_some() {
            return Err(KaflowError::validation(format!(
                "source connector '{}' does not support a `from` section",
                self.base.name
            )));
        }
        Ok(())
    }

    pub fn resetter_release(&self, config: &KaflowConfig) -> KaflowResult<HelmRelease> {
        let mut reset_config = Map::new();
        if let Some(ref offset_topic) = self.offset_topic {
            reset_config.insert("offsetTopic".to_string(), json!(offset_topic));
        }

        Resetter {
            base: &self.base,
            namespace: &self.namespace,
            repo_config: &self.repo_config,
            version: &self.version,
            resetter_values: &self.resetter_values,
        }
        .release(config, ConnectorType::Source, Value::Object(reset_config))
    }

    pub async fn deploy(&self, handlers: &Handlers, dry_run: bool) -> KaflowResult<Vec<Report>> {
        let mut reports = handlers.deploy_topics(&self.base.to_topics(), dry_run).await?;
        reports.push(
            handlers
                .connectors
                .apply(&self.base.name, &self.config, dry_run)
                .await?,
        );
        Ok(reports)
    }

    pub async fn destroy(&self, handlers: &Handlers, dry_run: bool) -> KaflowResult<Vec<Report>> {
        Ok(vec![handlers.connectors.destroy(&self.base.name, dry_run).await?])
    }

    /// Reset the stored source offsets
    pub async fn reset(&self, handlers: &Handlers, dry_run: bool) -> KaflowResult<Vec<Report>> {
        let release = self.resetter_release(&handlers.config)?;
        handlers
            .helm
            .run_clean_job(&release, dry_run, handlers.config.retain_clean_jobs)
            .await
    }

    pub async fn clean(&self, handlers: &Handlers, dry_run: bool) -> KaflowResult<Vec<Report>> {
        let mut reports = handlers.delete_topics(&self.base.to_topics(), dry_run).await?;
        reports.extend(self.reset(handlers, dry_run).await?);
        Ok(reports)
    }
}

impl TopicBinding for KafkaSourceConnector {
    fn binding_name(&self) -> &str {
        &self.base.name
    }

    fn outputs(&self) -> Vec<String> {
        self.base
            .to
            .as_ref()
            .map(|to| to.topics.keys().cloned().collect())
            .unwrap_or_default()
    }
}
