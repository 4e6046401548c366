// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 kaflow contributors

//! Reconciliation handlers
//!
//! A handler compares the desired state of one kind of resource with what
//! is live and applies the difference. In dry-run mode it only reports what
//! it would do. Every operation returns a [`Report`] for the CLI to print.

mod connector;
mod helm_app;
mod schema;
mod topic;

#[cfg(test)]
pub(crate) mod fakes;

pub use connector::{ConnectorHandler, MAX_ATTEMPTS};
pub use helm_app::HelmAppHandler;
pub use schema::SchemaHandler;
pub use topic::TopicHandler;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::clients::{
    KafkaConnectApi, KafkaConnectClient, KafkaRestApi, KafkaRestClient, SchemaRegistryApi,
    SchemaRegistryClient,
};
use crate::components::{topic::deduplicate_topics, KafkaTopic};
use crate::config::KaflowConfig;
use crate::errors::KaflowResult;
use crate::helm::{Helm, HelmApi};

/// What an operation did, or would do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Created,
    Updated,
    Applied,
    Unchanged,
    Deleted,
    Skipped,
    /// Dry run, nothing was changed
    Planned,
    /// Gave up after retries or a timeout
    Incomplete,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Created => "created",
            Self::Updated => "updated",
            Self::Applied => "applied",
            Self::Unchanged => "unchanged",
            Self::Deleted => "deleted",
            Self::Skipped => "skipped",
            Self::Planned => "planned",
            Self::Incomplete => "incomplete",
        };
        write!(f, "{}", text)
    }
}

/// Result of one operation on one resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    /// e.g. `topic orders-out`
    pub resource: String,
    pub outcome: Outcome,
    /// Rendered line diff of planned changes
    pub diff: Option<String>,
}

impl Report {
    pub fn new(resource: impl Into<String>, outcome: Outcome) -> Self {
        Self {
            resource: resource.into(),
            outcome,
            diff: None,
        }
    }

    pub fn with_diff(mut self, diff: Option<String>) -> Self {
        self.diff = diff;
        self
    }
}

/// All handlers of a pipeline run
pub struct Handlers {
    pub config: KaflowConfig,
    pub topics: TopicHandler,
    pub schemas: Option<SchemaHandler>,
    pub connectors: ConnectorHandler,
    pub helm: HelmAppHandler,
}

impl Handlers {
    /// Handlers over the given service implementations
    pub fn new(
        config: KaflowConfig,
        helm: Arc<dyn HelmApi>,
        connect: Arc<dyn KafkaConnectApi>,
        rest: Arc<dyn KafkaRestApi>,
        schema_registry: Option<Arc<dyn SchemaRegistryApi>>,
    ) -> Self {
        let timeout = Duration::from_secs(config.timeout);
        let ignore = config.helm_diff_config.ignore.clone();

        Self {
            topics: TopicHandler::new(rest),
            schemas: schema_registry.map(SchemaHandler::new),
            connectors: ConnectorHandler::new(connect, timeout),
            helm: HelmAppHandler::new(helm, ignore),
            config,
        }
    }

    /// Handlers talking to the services named in `config`
    pub fn from_config(config: KaflowConfig) -> KaflowResult<Self> {
        let helm = Arc::new(Helm::new(&config.helm_config)?);
        let connect = Arc::new(KafkaConnectClient::new(&config.kafka_connect)?);
        let rest = Arc::new(KafkaRestClient::new(&config.kafka_rest)?);
        let schema_registry: Option<Arc<dyn SchemaRegistryApi>> = if config.schema_registry.enabled
        {
            Some(Arc::new(SchemaRegistryClient::new(&config.schema_registry)?))
        } else {
            None
        };

        Ok(Self::new(config, helm, connect, rest, schema_registry))
    }

    /// Create or reconcile topics, then register their schemas
    pub async fn deploy_topics(
        &self,
        topics: &[KafkaTopic],
        dry_run: bool,
    ) -> KaflowResult<Vec<Report>> {
        let topics = deduplicate_topics(topics.to_vec());
        let mut reports = Vec::with_capacity(topics.len());

        for topic in &topics {
            reports.push(self.topics.apply(topic, dry_run).await?);
        }
        if let Some(ref schemas) = self.schemas {
            reports.extend(schemas.submit(&topics, dry_run).await?);
        }

        Ok(reports)
    }

    /// Delete schemas and topics
    pub async fn delete_topics(
        &self,
        topics: &[KafkaTopic],
        dry_run: bool,
    ) -> KaflowResult<Vec<Report>> {
        let topics = deduplicate_topics(topics.to_vec());
        let mut reports = Vec::with_capacity(topics.len());

        if let Some(ref schemas) = self.schemas {
            reports.extend(schemas.delete(&topics, dry_run).await?);
        }
        for topic in &topics {
            reports.push(self.topics.delete(topic, dry_run).await?);
        }

        Ok(reports)
    }
}
