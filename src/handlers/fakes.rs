// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 kaflow contributors

//! In-memory services recording every call

use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::Handlers;
use crate::clients::{
    ConfigAlteration, ConnectorInfo, KafkaConnectApi, KafkaRestApi, SchemaRegistryApi,
    SchemaVersion, TopicConfigEntry, TopicInfo,
};
use crate::components::KafkaTopic;
use crate::config::KaflowConfig;
use crate::errors::{KaflowError, KaflowResult};
use crate::helm::{parse_manifest, HelmApi, HelmFlags, HelmTemplate, RepoAuthFlags};

#[derive(Debug, Default)]
struct CallLog(Mutex<Vec<String>>);

impl CallLog {
    fn record(&self, call: String) {
        self.0.lock().unwrap().push(call);
    }

    fn all(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}

fn not_found(resource: &'static str, name: &str) -> KaflowError {
    KaflowError::NotFound {
        resource,
        name: name.to_string(),
    }
}

#[derive(Debug, Default)]
pub struct FakeKafkaRest {
    topics: Mutex<BTreeMap<String, TopicInfo>>,
    configs: Mutex<BTreeMap<String, Vec<TopicConfigEntry>>>,
    broker: Mutex<BTreeMap<String, String>>,
    alterations: Mutex<Vec<(String, Vec<ConfigAlteration>)>>,
    log: CallLog,
}

impl FakeKafkaRest {
    /// Add a live topic with dynamic configs
    pub fn add_topic(&self, name: &str, partitions: u32, replication: u32, configs: &[(&str, &str)]) {
        self.topics.lock().unwrap().insert(
            name.to_string(),
            TopicInfo {
                topic_name: name.to_string(),
                partitions_count: partitions,
                replication_factor: replication,
            },
        );

        let mut entries: Vec<TopicConfigEntry> = configs
            .iter()
            .map(|(key, value)| TopicConfigEntry {
                name: key.to_string(),
                value: Some(value.to_string()),
                source: "DYNAMIC_TOPIC_CONFIG".to_string(),
            })
            .collect();
        entries.push(TopicConfigEntry {
            name: "segment.bytes".to_string(),
            value: Some("1073741824".to_string()),
            source: "DEFAULT_CONFIG".to_string(),
        });
        self.configs.lock().unwrap().insert(name.to_string(), entries);
    }

    pub fn set_broker_config(&self, configs: &[(&str, &str)]) {
        let mut broker = self.broker.lock().unwrap();
        for (key, value) in configs {
            broker.insert(key.to_string(), value.to_string());
        }
    }

    pub fn has_topic(&self, name: &str) -> bool {
        self.topics.lock().unwrap().contains_key(name)
    }

    pub fn alterations(&self) -> Vec<(String, Vec<ConfigAlteration>)> {
        self.alterations.lock().unwrap().clone()
    }

    pub fn calls(&self) -> Vec<String> {
        self.log.all()
    }
}

#[async_trait]
impl KafkaRestApi for FakeKafkaRest {
    async fn get_topic(&self, name: &str) -> KaflowResult<TopicInfo> {
        self.log.record(format!("get_topic {}", name));
        self.topics
            .lock()
            .unwrap()
            .get(name)
            .cloned()
            .ok_or_else(|| not_found("Topic", name))
    }

    async fn create_topic(&self, topic: &KafkaTopic) -> KaflowResult<()> {
        self.log.record(format!("create_topic {}", topic.name));
        self.add_topic(
            &topic.name,
            topic.config.partitions_count.unwrap_or(1),
            topic.config.replication_factor.unwrap_or(1),
            &[],
        );
        Ok(())
    }

    async fn delete_topic(&self, name: &str) -> KaflowResult<()> {
        self.log.record(format!("delete_topic {}", name));
        self.topics
            .lock()
            .unwrap()
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| not_found("Topic", name))
    }

    async fn get_topic_config(&self, name: &str) -> KaflowResult<Vec<TopicConfigEntry>> {
        self.log.record(format!("get_topic_config {}", name));
        Ok(self
            .configs
            .lock()
            .unwrap()
            .get(name)
            .cloned()
            .unwrap_or_default())
    }

    async fn batch_alter_topic_config(
        &self,
        name: &str,
        alterations: &[ConfigAlteration],
    ) -> KaflowResult<()> {
        self.log.record(format!("batch_alter_topic_config {}", name));
        self.alterations
            .lock()
            .unwrap()
            .push((name.to_string(), alterations.to_vec()));
        Ok(())
    }

    async fn get_broker_config(&self) -> KaflowResult<BTreeMap<String, String>> {
        self.log.record("get_broker_config".to_string());
        Ok(self.broker.lock().unwrap().clone())
    }
}

#[derive(Debug, Default)]
pub struct FakeKafkaConnect {
    connectors: Mutex<BTreeMap<String, ConnectorInfo>>,
    /// Number of upcoming mutations answered with 409
    conflicts: Mutex<u32>,
    /// Delay of every mutation
    delay: Mutex<Option<Duration>>,
    validation_errors: Mutex<Vec<String>>,
    log: CallLog,
}

impl FakeKafkaConnect {
    pub fn add_connector(&self, name: &str, config: &[(&str, &str)]) {
        self.connectors.lock().unwrap().insert(
            name.to_string(),
            ConnectorInfo {
                name: name.to_string(),
                config: config
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
                connector_type: None,
            },
        );
    }

    pub fn fail_with_conflicts(&self, count: u32) {
        *self.conflicts.lock().unwrap() = count;
    }

    pub fn delay_mutations(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    pub fn set_validation_errors(&self, errors: &[&str]) {
        *self.validation_errors.lock().unwrap() = errors.iter().map(|e| e.to_string()).collect();
    }

    pub fn connector(&self, name: &str) -> Option<ConnectorInfo> {
        self.connectors.lock().unwrap().get(name).cloned()
    }

    pub fn calls(&self) -> Vec<String> {
        self.log.all()
    }

    async fn mutation(&self, name: &str) -> KaflowResult<()> {
        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut conflicts = self.conflicts.lock().unwrap();
        if *conflicts > 0 {
            *conflicts -= 1;
            return Err(KaflowError::Conflict {
                resource: "Connector",
                name: name.to_string(),
            });
        }
        Ok(())
    }

    fn store(&self, name: &str, config: &BTreeMap<String, String>) -> ConnectorInfo {
        let info = ConnectorInfo {
            name: name.to_string(),
            config: config.clone(),
            connector_type: None,
        };
        self.connectors
            .lock()
            .unwrap()
            .insert(name.to_string(), info.clone());
        info
    }
}

#[async_trait]
impl KafkaConnectApi for FakeKafkaConnect {
    async fn get_connector(&self, name: &str) -> KaflowResult<ConnectorInfo> {
        self.log.record(format!("get_connector {}", name));
        self.connector(name)
            .ok_or_else(|| not_found("Connector", name))
    }

    async fn create_connector(
        &self,
        name: &str,
        config: &BTreeMap<String, String>,
    ) -> KaflowResult<ConnectorInfo> {
        self.log.record(format!("create_connector {}", name));
        self.mutation(name).await?;
        Ok(self.store(name, config))
    }

    async fn update_connector_config(
        &self,
        name: &str,
        config: &BTreeMap<String, String>,
    ) -> KaflowResult<ConnectorInfo> {
        self.log.record(format!("update_connector_config {}", name));
        self.mutation(name).await?;
        Ok(self.store(name, config))
    }

    async fn delete_connector(&self, name: &str) -> KaflowResult<()> {
        self.log.record(format!("delete_connector {}", name));
        self.mutation(name).await?;
        self.connectors
            .lock()
            .unwrap()
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| not_found("Connector", name))
    }

    async fn validate_connector_config(
        &self,
        config: &BTreeMap<String, String>,
    ) -> KaflowResult<Vec<String>> {
        let name = config.get("name").cloned().unwrap_or_default();
        self.log.record(format!("validate_connector_config {}", name));
        Ok(self.validation_errors.lock().unwrap().clone())
    }
}

#[derive(Debug)]
pub struct FakeSchemaRegistry {
    subjects: Mutex<BTreeMap<String, Vec<String>>>,
    compatible: Mutex<bool>,
    log: CallLog,
}

impl Default for FakeSchemaRegistry {
    fn default() -> Self {
        Self {
            subjects: Mutex::new(BTreeMap::new()),
            compatible: Mutex::new(true),
            log: CallLog::default(),
        }
    }
}

impl FakeSchemaRegistry {
    pub fn add_subject(&self, subject: &str, schema: &str) {
        self.subjects
            .lock()
            .unwrap()
            .entry(subject.to_string())
            .or_default()
            .push(schema.to_string());
    }

    pub fn set_compatible(&self, compatible: bool) {
        *self.compatible.lock().unwrap() = compatible;
    }

    pub fn calls(&self) -> Vec<String> {
        self.log.all()
    }
}

#[async_trait]
impl SchemaRegistryApi for FakeSchemaRegistry {
    async fn get_latest_version(&self, subject: &str) -> KaflowResult<SchemaVersion> {
        self.log.record(format!("get_latest_version {}", subject));
        let subjects = self.subjects.lock().unwrap();
        let versions = subjects
            .get(subject)
            .ok_or_else(|| not_found("Subject", subject))?;
        let schema = versions.last().cloned().unwrap_or_default();
        Ok(SchemaVersion {
            subject: subject.to_string(),
            version: versions.len() as u32,
            id: versions.len() as u32,
            schema,
        })
    }

    async fn check_compatibility(&self, subject: &str, _schema: &str) -> KaflowResult<bool> {
        self.log.record(format!("check_compatibility {}", subject));
        Ok(*self.compatible.lock().unwrap())
    }

    async fn register_schema(&self, subject: &str, schema: &str) -> KaflowResult<u32> {
        self.log.record(format!("register_schema {}", subject));
        self.add_subject(subject, schema);
        Ok(1)
    }

    async fn delete_subject(&self, subject: &str) -> KaflowResult<Vec<u32>> {
        self.log.record(format!("delete_subject {}", subject));
        let removed = self
            .subjects
            .lock()
            .unwrap()
            .remove(subject)
            .ok_or_else(|| not_found("Subject", subject))?;
        Ok((1..=removed.len() as u32).collect())
    }
}

#[derive(Debug, Default)]
pub struct FakeHelm {
    releases: Mutex<BTreeMap<String, Vec<HelmTemplate>>>,
    template_output: Mutex<String>,
    log: CallLog,
}

impl FakeHelm {
    pub fn set_template_output(&self, manifest: &str) {
        *self.template_output.lock().unwrap() = manifest.to_string();
    }

    pub fn install(&self, release_name: &str, manifest: &str) {
        let templates = parse_manifest(manifest).unwrap();
        self.releases
            .lock()
            .unwrap()
            .insert(release_name.to_string(), templates);
    }

    pub fn has_release(&self, release_name: &str) -> bool {
        self.releases.lock().unwrap().contains_key(release_name)
    }

    pub fn calls(&self) -> Vec<String> {
        self.log.all()
    }
}

#[async_trait]
impl HelmApi for FakeHelm {
    async fn add_repo(&self, name: &str, _url: &str, _auth: &RepoAuthFlags) -> KaflowResult<()> {
        self.log.record(format!("add_repo {}", name));
        Ok(())
    }

    async fn upgrade_install(
        &self,
        release_name: &str,
        chart: &str,
        dry_run: bool,
        _namespace: &str,
        _values: &Value,
        _flags: &HelmFlags,
    ) -> KaflowResult<String> {
        self.log
            .record(format!("upgrade_install {} {}", release_name, chart));
        if !dry_run {
            let manifest = self.template_output.lock().unwrap().clone();
            self.install(release_name, &manifest);
        }
        Ok(String::new())
    }

    async fn uninstall(
        &self,
        _namespace: &str,
        release_name: &str,
        dry_run: bool,
    ) -> KaflowResult<Option<String>> {
        self.log.record(format!("uninstall {}", release_name));
        let mut releases = self.releases.lock().unwrap();
        if !releases.contains_key(release_name) {
            return Ok(None);
        }
        if !dry_run {
            releases.remove(release_name);
        }
        Ok(Some(format!("release \"{}\" uninstalled", release_name)))
    }

    async fn get_manifest(
        &self,
        release_name: &str,
        _namespace: &str,
    ) -> KaflowResult<Vec<HelmTemplate>> {
        self.log.record(format!("get_manifest {}", release_name));
        Ok(self
            .releases
            .lock()
            .unwrap()
            .get(release_name)
            .cloned()
            .unwrap_or_default())
    }

    async fn template(
        &self,
        release_name: &str,
        chart: &str,
        _namespace: &str,
        _values: &Value,
        _flags: &HelmFlags,
    ) -> KaflowResult<String> {
        self.log.record(format!("template {} {}", release_name, chart));
        Ok(self.template_output.lock().unwrap().clone())
    }
}

/// One instance of every fake service
pub struct Fakes {
    pub rest: Arc<FakeKafkaRest>,
    pub connect: Arc<FakeKafkaConnect>,
    pub schema_registry: Arc<FakeSchemaRegistry>,
    pub helm: Arc<FakeHelm>,
}

impl Fakes {
    pub fn new() -> Self {
        Self {
            rest: Arc::new(FakeKafkaRest::default()),
            connect: Arc::new(FakeKafkaConnect::default()),
            schema_registry: Arc::new(FakeSchemaRegistry::default()),
            helm: Arc::new(FakeHelm::default()),
        }
    }

    pub fn config() -> KaflowConfig {
        KaflowConfig {
            kafka_brokers: "broker:9092".into(),
            timeout: 5,
            ..Default::default()
        }
    }

    /// Handlers over these fakes, with or without a schema registry
    pub fn handlers(&self, schema_registry: bool) -> Handlers {
        self.handlers_with(Self::config(), schema_registry)
    }

    pub fn handlers_with(&self, config: KaflowConfig, schema_registry: bool) -> Handlers {
        let registry: Option<Arc<dyn SchemaRegistryApi>> = if schema_registry {
            Some(self.schema_registry.clone())
        } else {
            None
        };

        Handlers::new(
            config,
            self.helm.clone(),
            self.connect.clone(),
            self.rest.clone(),
            registry,
        )
    }
}
