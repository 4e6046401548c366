// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 kaflow contributors

//! Streams and producer apps deployed with the streams-bootstrap charts

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use super::base::ComponentBase;
use super::TopicBinding;
use crate::config::KaflowConfig;
use crate::errors::KaflowResult;
use crate::handlers::{Handlers, Report};
use crate::helm::{trim_release_name, HelmFlags, HelmRelease, HelmRepoConfig, CLEAN_SUFFIX};

pub const STREAMS_BOOTSTRAP_REPO_NAME: &str = "bakdata-streams-bootstrap";
pub const STREAMS_BOOTSTRAP_REPO_URL: &str = "https://bakdata.github.io/streams-bootstrap/";

fn default_repo() -> HelmRepoConfig {
    HelmRepoConfig::new(STREAMS_BOOTSTRAP_REPO_NAME, STREAMS_BOOTSTRAP_REPO_URL)
}

/// `streams` section of the chart values
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StreamsConfig {
    #[serde(default)]
    pub brokers: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema_registry_url: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub input_topics: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_pattern: Option<String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra_input_topics: BTreeMap<String, Vec<String>>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra_input_patterns: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_topic: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_topic: Option<String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra_output_topics: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delete_output: Option<bool>,

    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub config: Map<String, Value>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Chart values of a streams-bootstrap app
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StreamsAppValues {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name_override: Option<String>,

    #[serde(default)]
    pub streams: StreamsConfig,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl StreamsAppValues {
    /// Fill in cluster addresses and the release name override
    fn finish(&mut self, name: &str, config: &KaflowConfig) {
        if self.streams.brokers.is_empty() {
            self.streams.brokers = config.kafka_brokers.clone();
        }
        if config.schema_registry.enabled && self.streams.schema_registry_url.is_none() {
            self.streams.schema_registry_url = Some(config.schema_registry.url.clone());
        }
        if self.name_override.is_none() {
            self.name_override = Some(trim_release_name(name, ""));
        }
    }

    fn to_value(&self) -> KaflowResult<Value> {
        Ok(serde_json::to_value(self)?)
    }

    /// Values of the cleanup job
    fn clean_values(&self, delete_output: bool) -> KaflowResult<Value> {
        let mut values = self.clone();
        values.streams.delete_output = Some(delete_output);
        values.to_value()
    }
}

/// Release settings shared by both app kinds
fn release(
    config: &KaflowConfig,
    release_name: String,
    chart: String,
    namespace: &str,
    values: Value,
    repo: &HelmRepoConfig,
    version: &Option<String>,
) -> HelmRelease {
    HelmRelease {
        release_name,
        chart,
        namespace: namespace.to_string(),
        values,
        repo: Some(repo.clone()),
        flags: HelmFlags {
            version: version.clone(),
            repo_auth_flags: repo.repo_auth_flags.clone(),
            create_namespace: config.create_namespace,
            timeout: config.timeout,
            api_version: config.helm_config.api_version.clone(),
            ..Default::default()
        },
    }
}

/// Release of the cleanup job, waiting for the job to finish
fn clean_release(mut release: HelmRelease, name: &str, values: Value) -> HelmRelease {
    release.release_name = trim_release_name(name, CLEAN_SUFFIX);
    release.chart = format!("{}-cleanup-job", release.chart);
    release.values = values;
    release.flags.wait = true;
    release.flags.wait_for_jobs = true;
    release
}

fn debug_ignored(name: &str, what: &str) {
    tracing::debug!("Component '{}' does not accept {}, ignoring", name, what);
}

/// Kafka Streams application
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StreamsApp {
    #[serde(flatten)]
    pub base: ComponentBase,

    pub namespace: String,

    #[serde(default)]
    pub app: StreamsAppValues,

    #[serde(default = "default_repo")]
    pub repo_config: HelmRepoConfig,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

impl StreamsApp {
    pub fn finish(&mut self, config: &KaflowConfig) {
        let name = self.base.name.clone();
        self.app.finish(&name, config);
    }

    fn chart(&self) -> String {
        format!("{}/streams-app", self.repo_config.repository_name)
    }

    pub fn release(&self, config: &KaflowConfig) -> KaflowResult<HelmRelease> {
        Ok(release(
            config,
            trim_release_name(&self.base.name, ""),
            self.chart(),
            &self.namespace,
            self.app.to_value()?,
            &self.repo_config,
            &self.version,
        ))
    }

    fn clean_release(&self, config: &KaflowConfig, delete_output: bool) -> KaflowResult<HelmRelease> {
        let values = self.app.clean_values(delete_output)?;
        Ok(clean_release(self.release(config)?, &self.base.name, values))
    }

    pub async fn deploy(&self, handlers: &Handlers, dry_run: bool) -> KaflowResult<Vec<Report>> {
        let mut reports = handlers.deploy_topics(&self.base.to_topics(), dry_run).await?;
        reports.push(handlers.helm.apply(&self.release(&handlers.config)?, dry_run).await?);
        Ok(reports)
    }

    pub async fn destroy(&self, handlers: &Handlers, dry_run: bool) -> KaflowResult<Vec<Report>> {
        let release = self.release(&handlers.config)?;
        Ok(vec![handlers.helm.destroy(&release, dry_run).await?])
    }

    /// Reset consumer offsets, keeping output topics
    pub async fn reset(&self, handlers: &Handlers, dry_run: bool) -> KaflowResult<Vec<Report>> {
        let release = self.clean_release(&handlers.config, false)?;
        handlers
            .helm
            .run_clean_job(&release, dry_run, handlers.config.retain_clean_jobs)
            .await
    }

    /// Reset offsets, delete output data and the `to` topics
    pub async fn clean(&self, handlers: &Handlers, dry_run: bool) -> KaflowResult<Vec<Report>> {
        let release = self.clean_release(&handlers.config, true)?;
        let mut reports = handlers
            .helm
            .run_clean_job(&release, dry_run, handlers.config.retain_clean_jobs)
            .await?;
        reports.extend(handlers.delete_topics(&self.base.to_topics(), dry_run).await?);
        Ok(reports)
    }
}

impl TopicBinding for StreamsApp {
    fn binding_name(&self) -> &str {
        &self.base.name
    }

    fn add_input_topics(&mut self, topics: &[String]) {
        let inputs = &mut self.app.streams.input_topics;
        for topic in topics {
            if !inputs.contains(topic) {
                inputs.push(topic.clone());
            }
        }
    }

    fn set_input_pattern(&mut self, pattern: &str) {
        self.app.streams.input_pattern = Some(pattern.to_string());
    }

    fn add_extra_input_topics(&mut self, role: &str, topics: &[String]) {
        let entry = self
            .app
            .streams
            .extra_input_topics
            .entry(role.to_string())
            .or_default();
        for topic in topics {
            if !entry.contains(topic) {
                entry.push(topic.clone());
            }
        }
    }

    fn add_extra_input_pattern(&mut self, role: &str, pattern: &str) {
        self.app
            .streams
            .extra_input_patterns
            .insert(role.to_string(), pattern.to_string());
    }

    fn set_output_topic(&mut self, topic: &str) {
        self.app.streams.output_topic = Some(topic.to_string());
    }

    fn set_error_topic(&mut self, topic: &str) {
        self.app.streams.error_topic = Some(topic.to_string());
    }

    fn add_extra_output_topic(&mut self, role: &str, topic: &str) {
        self.app
            .streams
            .extra_output_topics
            .insert(role.to_string(), topic.to_string());
    }

    fn inputs(&self) -> Vec<String> {
        let streams = &self.app.streams;
        let mut inputs = streams.input_topics.clone();
        inputs.extend(streams.extra_input_topics.values().flatten().cloned());
        inputs
    }

    fn outputs(&self) -> Vec<String> {
        streams_outputs(&self.app.streams)
    }
}

fn streams_outputs(streams: &StreamsConfig) -> Vec<String> {
    let mut outputs: Vec<String> = streams.output_topic.iter().cloned().collect();
    outputs.extend(streams.error_topic.iter().cloned());
    outputs.extend(streams.extra_output_topics.values().cloned());
    outputs
}

/// Producer application, writes only
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProducerApp {
    #[serde(flatten)]
    pub base: ComponentBase,

    pub namespace: String,

    #[serde(default)]
    pub app: StreamsAppValues,

    #[serde(default = "default_repo")]
    pub repo_config: HelmRepoConfig,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

impl ProducerApp {
    pub fn finish(&mut self, config: &KaflowConfig) {
        let name = self.base.name.clone();
        self.app.finish(&name, config);
    }

    fn chart(&self) -> String {
        format!("{}/producer-app", self.repo_config.repository_name)
    }

    pub fn release(&self, config: &KaflowConfig) -> KaflowResult<HelmRelease> {
        Ok(release(
            config,
            trim_release_name(&self.base.name, ""),
            self.chart(),
            &self.namespace,
            self.app.to_value()?,
            &self.repo_config,
            &self.version,
        ))
    }

    pub async fn deploy(&self, handlers: &Handlers, dry_run: bool) -> KaflowResult<Vec<Report>> {
        let mut reports = handlers.deploy_topics(&self.base.to_topics(), dry_run).await?;
        reports.push(handlers.helm.apply(&self.release(&handlers.config)?, dry_run).await?);
        Ok(reports)
    }

    pub async fn destroy(&self, handlers: &Handlers, dry_run: bool) -> KaflowResult<Vec<Report>> {
        let release = self.release(&handlers.config)?;
        Ok(vec![handlers.helm.destroy(&release, dry_run).await?])
    }

    /// Delete output data and the `to` topics
    pub async fn clean(&self, handlers: &Handlers, dry_run: bool) -> KaflowResult<Vec<Report>> {
        let values = self.app.clean_values(true)?;
        let release = clean_release(self.release(&handlers.config)?, &self.base.name, values);
        let mut reports = handlers
            .helm
            .run_clean_job(&release, dry_run, handlers.config.retain_clean_jobs)
            .await?;
        reports.extend(handlers.delete_topics(&self.base.to_topics(), dry_run).await?);
        Ok(reports)
    }
}

impl TopicBinding for ProducerApp {
    fn binding_name(&self) -> &str {
        &self.base.name
    }

    fn add_input_topics(&mut self, _topics: &[String]) {
        debug_ignored(&self.base.name, "input topics");
    }

    fn set_output_topic(&mut self, topic: &str) {
        self.app.streams.output_topic = Some(topic.to_string());
    }

    fn set_error_topic(&mut self, topic: &str) {
        self.app.streams.error_topic = Some(topic.to_string());
    }

    fn add_extra_output_topic(&mut self, role: &str, topic: &str) {
        self.app
            .streams
            .extra_output_topics
            .insert(role.to_string(), topic.to_string());
    }

    fn outputs(&self) -> Vec<String> {
        streams_outputs(&self.app.streams)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn config() -> KaflowConfig {
        let mut config = KaflowConfig {
            kafka_brokers: "broker:9092".into(),
            ..Default::default()
        };
        config.schema_registry.enabled = true;
        config
    }

    fn streams_app() -> StreamsApp {
        serde_json::from_value(json!({
            "type": "streams-app",
            "name": "orders-filter",
            "prefix": "orders-",
            "namespace": "kafka",
            "app": {
                "image": "filter",
                "streams": {"config": {"max.poll.records": 10}}
            }
        }))
        .unwrap()
    }

    #[test]
    fn test_finish_injects_cluster_addresses() {
        let mut app = streams_app();
        app.finish(&config());

        assert_eq!(app.app.streams.brokers, "broker:9092");
        assert_eq!(
            app.app.streams.schema_registry_url.as_deref(),
            Some("http://localhost:8081")
        );
        assert_eq!(app.app.name_override.as_deref(), Some("orders-filter"));
        assert_eq!(app.app.extra.get("image"), Some(&json!("filter")));
    }

    #[test]
    fn test_bindings_fill_streams_values() {
        let mut app = streams_app();
        app.add_input_topics(&["a".to_string(), "a".to_string(), "b".to_string()]);
        app.add_extra_input_topics("side", &["c".to_string()]);
        app.set_output_topic("out");
        app.set_error_topic("err");
        app.add_extra_output_topic("audit", "audit-topic");

        assert_eq!(app.app.streams.input_topics, vec!["a", "b"]);
        assert_eq!(app.inputs(), vec!["a", "b", "c"]);
        assert_eq!(app.outputs(), vec!["out", "err", "audit-topic"]);

        let values = app.app.to_value().unwrap();
        assert_eq!(values["streams"]["inputTopics"], json!(["a", "b"]));
        assert_eq!(values["streams"]["extraOutputTopics"]["audit"], json!("audit-topic"));
    }

    #[test]
    fn test_release_uses_streams_bootstrap_chart() {
        let mut app = streams_app();
        app.finish(&config());
        let release = app.release(&config()).unwrap();

        assert_eq!(release.release_name, "orders-filter");
        assert_eq!(release.chart, "bakdata-streams-bootstrap/streams-app");
        assert_eq!(release.namespace, "kafka");
        assert_eq!(release.flags.timeout, 300);
    }

    #[test]
    fn test_clean_release_deletes_output() {
        let app = streams_app();
        let release = app.clean_release(&config(), true).unwrap();

        assert_eq!(release.release_name, "orders-filter-clean");
        assert_eq!(release.chart, "bakdata-streams-bootstrap/streams-app-cleanup-job");
        assert_eq!(release.values["streams"]["deleteOutput"], json!(true));
        assert!(release.flags.wait && release.flags.wait_for_jobs);
    }

    #[test]
    fn test_producer_ignores_inputs() {
        let mut producer: ProducerApp = serde_json::from_value(json!({
            "type": "producer-app",
            "name": "gen",
            "namespace": "kafka"
        }))
        .unwrap();

        producer.add_input_topics(&["in".to_string()]);
        producer.set_output_topic("out");

        assert!(producer.app.streams.input_topics.is_empty());
        assert_eq!(producer.outputs(), vec!["out"]);
    }
}
