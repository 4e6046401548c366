// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 kaflow contributors

//! Topic reconciliation through the Kafka REST Proxy

use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

use super::{Outcome, Report};
use crate::clients::{ConfigAlteration, KafkaRestApi, TopicInfo};
use crate::components::KafkaTopic;
use crate::diff::{diff, render_diff, Change, PathSegment};
use crate::errors::{KaflowError, KaflowResult};

const BROKER_PARTITIONS: &str = "num.partitions";
const BROKER_REPLICATION: &str = "default.replication.factor";

/// Creates, reconciles and deletes topics
pub struct TopicHandler {
    api: Arc<dyn KafkaRestApi>,
}

/// Planned changes with both sides for rendering
struct Plan {
    changes: Vec<Change>,
    before: Value,
    after: Value,
}

fn config_value(configs: &BTreeMap<String, String>) -> Value {
    Value::Object(
        configs
            .iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect(),
    )
}

fn resource(topic: &str) -> String {
    format!("topic {}", topic)
}

impl TopicHandler {
    pub fn new(api: Arc<dyn KafkaRestApi>) -> Self {
        Self { api }
    }

    /// Per-topic config values, inherited values left out
    async fn live_config(&self, name: &str) -> KaflowResult<BTreeMap<String, String>> {
        Ok(self
            .api
            .get_topic_config(name)
            .await?
            .into_iter()
            .filter(|entry| entry.is_dynamic())
            .filter_map(|entry| entry.value.map(|value| (entry.name, value)))
            .collect())
    }

    /// Partition count and replication factor of a live topic cannot change
    async fn check_immutable(&self, topic: &KafkaTopic, live: &TopicInfo) -> KaflowResult<()> {
        let broker = self.api.get_broker_config().await?;
        let broker_value = |key: &str| broker.get(key).and_then(|v| v.parse::<u32>().ok());

        let partitions = topic
            .config
            .partitions_count
            .or_else(|| broker_value(BROKER_PARTITIONS));
        if let Some(desired) = partitions {
            if desired != live.partitions_count {
                return Err(KaflowError::ImmutableField {
                    topic: topic.name.clone(),
                    field: "partition count",
                    live: live.partitions_count,
                    desired,
                });
            }
        }

        let replication = topic
            .config
            .replication_factor
            .or_else(|| broker_value(BROKER_REPLICATION));
        if let Some(desired) = replication {
            if desired != live.replication_factor {
                return Err(KaflowError::ImmutableField {
                    topic: topic.name.clone(),
                    field: "replication factor",
                    live: live.replication_factor,
                    desired,
                });
            }
        }

        Ok(())
    }

    async fn plan_topic(&self, topic: &KafkaTopic) -> KaflowResult<Plan> {
        let live = match self.api.get_topic(&topic.name).await {
            Ok(live) => live,
            Err(e) if e.is_not_found() => {
                let spec = serde_json::to_value(&topic.config)?;
                return Ok(Plan {
                    changes: vec![Change::add(
                        vec![PathSegment::Key(topic.name.clone())],
                        spec.clone(),
                    )],
                    before: Value::Null,
                    after: spec,
                });
            }
            Err(e) => return Err(e),
        };

        self.check_immutable(topic, &live).await?;

        let before = config_value(&self.live_config(&topic.name).await?);
        let after = config_value(&topic.config.configs);
        Ok(Plan {
            changes: diff(&before, &after, &[]),
            before,
            after,
        })
    }

    /// Changes needed to reach `topic`, without touching the cluster
    pub async fn plan(&self, topic: &KafkaTopic) -> KaflowResult<Vec<Change>> {
        Ok(self.plan_topic(topic).await?.changes)
    }

    /// Create the topic or bring its configuration in line
    pub async fn apply(&self, topic: &KafkaTopic, dry_run: bool) -> KaflowResult<Report> {
        if dry_run {
            let plan = self.plan_topic(topic).await?;
            if plan.changes.is_empty() {
                tracing::info!("Topic {}: no changes", topic.name);
                return Ok(Report::new(resource(&topic.name), Outcome::Unchanged));
            }
            for change in &plan.changes {
                tracing::debug!("Topic {}: {}", topic.name, change);
            }
            let rendered = render_diff(&plan.before, &plan.after, &[]);
            return Ok(Report::new(resource(&topic.name), Outcome::Planned).with_diff(rendered));
        }

        match self.api.get_topic(&topic.name).await {
            Ok(_) => {}
            Err(e) if e.is_not_found() => {
                self.api.create_topic(topic).await?;
                return Ok(Report::new(resource(&topic.name), Outcome::Created));
            }
            Err(e) => return Err(e),
        }

        let live = self.live_config(&topic.name).await?;
        let desired = &topic.config.configs;
        if diff(&config_value(&live), &config_value(desired), &[]).is_empty() {
            tracing::info!("Topic {}: config unchanged", topic.name);
            return Ok(Report::new(resource(&topic.name), Outcome::Unchanged));
        }

        let mut alterations: Vec<ConfigAlteration> = live
            .keys()
            .filter(|key| !desired.contains_key(*key))
            .map(|key| ConfigAlteration::delete(key))
            .collect();
        alterations.extend(
            desired
                .iter()
                .map(|(key, value)| ConfigAlteration::set(key, value)),
        );

        self.api
            .batch_alter_topic_config(&topic.name, &alterations)
            .await?;
        tracing::info!("Topic {}: config updated", topic.name);
        Ok(Report::new(resource(&topic.name), Outcome::Updated))
    }

    /// Delete the topic if it exists
    pub async fn delete(&self, topic: &KafkaTopic, dry_run: bool) -> KaflowResult<Report> {
        match self.api.get_topic(&topic.name).await {
            Ok(_) => {}
            Err(e) if e.is_not_found() => {
                tracing::info!("Topic {} does not exist, skipping deletion", topic.name);
                return Ok(Report::new(resource(&topic.name), Outcome::Skipped));
            }
            Err(e) => return Err(e),
        }

        if dry_run {
            tracing::info!("Topic {} would be deleted", topic.name);
            return Ok(Report::new(resource(&topic.name), Outcome::Planned));
        }

        self.api.delete_topic(&topic.name).await?;
        Ok(Report::new(resource(&topic.name), Outcome::Deleted))
    }
}

#[cfg(test)]
mod tests {
    use super::super::fakes::FakeKafkaRest;
    use super::*;
    use crate::clients::ConfigOperation;
    use crate::components::{OutputTopicType, TopicConfig};
    use crate::diff::ChangeKind;

    fn topic(name: &str, partitions: Option<u32>, configs: &[(&str, &str)]) -> KafkaTopic {
        let mut config = TopicConfig::of_type(OutputTopicType::Output);
        config.partitions_count = partitions;
        for (key, value) in configs {
            config.configs.insert(key.to_string(), value.to_string());
        }
        KafkaTopic {
            name: name.into(),
            config,
        }
    }

    fn handler() -> (Arc<FakeKafkaRest>, TopicHandler) {
        let rest = Arc::new(FakeKafkaRest::default());
        (rest.clone(), TopicHandler::new(rest))
    }

    #[tokio::test]
    async fn test_missing_topic_is_created() {
        let (rest, handler) = handler();
        let report = handler.apply(&topic("orders", Some(3), &[]), false).await.unwrap();

        assert_eq!(report.outcome, Outcome::Created);
        assert!(rest.has_topic("orders"));
    }

    #[tokio::test]
    async fn test_config_drift_is_one_batched_alteration() {
        let (rest, handler) = handler();
        rest.add_topic("orders", 3, 1, &[("cleanup.policy", "compact")]);

        let desired = topic(
            "orders",
            None,
            &[("cleanup.policy", "delete"), ("retention.ms", "1000")],
        );
        let report = handler.apply(&desired, false).await.unwrap();
        assert_eq!(report.outcome, Outcome::Updated);

        let alterations = rest.alterations();
        assert_eq!(alterations.len(), 1);
        let (name, ops) = &alterations[0];
        assert_eq!(name, "orders");
        assert_eq!(
            ops,
            &vec![
                ConfigAlteration::set("cleanup.policy", "delete"),
                ConfigAlteration::set("retention.ms", "1000"),
            ]
        );
        assert!(ops.iter().all(|op| op.operation != ConfigOperation::Delete));
    }

    #[tokio::test]
    async fn test_undesired_live_keys_are_deleted() {
        let (rest, handler) = handler();
        rest.add_topic("orders", 1, 1, &[("retention.ms", "5"), ("cleanup.policy", "compact")]);

        handler
            .apply(&topic("orders", None, &[("cleanup.policy", "compact")]), false)
            .await
            .unwrap();

        let (_, ops) = &rest.alterations()[0];
        assert_eq!(ops[0], ConfigAlteration::delete("retention.ms"));
        assert_eq!(ops[1], ConfigAlteration::set("cleanup.policy", "compact"));
    }

    #[tokio::test]
    async fn test_unchanged_config_is_skipped() {
        let (rest, handler) = handler();
        rest.add_topic("orders", 1, 1, &[("cleanup.policy", "compact")]);

        let report = handler
            .apply(&topic("orders", None, &[("cleanup.policy", "compact")]), false)
            .await
            .unwrap();

        assert_eq!(report.outcome, Outcome::Unchanged);
        assert!(rest.alterations().is_empty());
    }

    #[tokio::test]
    async fn test_dry_run_partition_change_is_rejected() {
        let (rest, handler) = handler();
        rest.add_topic("orders", 10, 1, &[]);

        let err = handler
            .apply(&topic("orders", Some(5), &[]), true)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            KaflowError::ImmutableField { live: 10, desired: 5, .. }
        ));
        assert!(rest.alterations().is_empty());
    }

    #[tokio::test]
    async fn test_dry_run_uses_broker_defaults() {
        let (rest, handler) = handler();
        rest.add_topic("orders", 6, 3, &[]);
        rest.set_broker_config(&[("num.partitions", "6"), ("default.replication.factor", "2")]);

        let err = handler.apply(&topic("orders", None, &[]), true).await.unwrap_err();
        assert!(matches!(
            err,
            KaflowError::ImmutableField { field: "replication factor", .. }
        ));
    }

    #[tokio::test]
    async fn test_plan_for_missing_topic_is_one_add() {
        let (rest, handler) = handler();
        let changes = handler.plan(&topic("new", Some(1), &[])).await.unwrap();

        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].kind, ChangeKind::Add);
        assert_eq!(rest.calls(), vec!["get_topic new"]);
    }

    #[tokio::test]
    async fn test_dry_run_renders_config_diff() {
        let (rest, handler) = handler();
        rest.add_topic("orders", 1, 1, &[("cleanup.policy", "compact")]);

        let report = handler
            .apply(&topic("orders", Some(1), &[("cleanup.policy", "delete")]), true)
            .await
            .unwrap();

        assert_eq!(report.outcome, Outcome::Planned);
        let rendered = report.diff.unwrap();
        assert!(rendered.contains("- cleanup.policy: compact"));
        assert!(rendered.contains("+ cleanup.policy: delete"));
        assert!(rest.alterations().is_empty());
    }

    #[tokio::test]
    async fn test_delete_missing_topic_is_skipped() {
        let (rest, handler) = handler();
        let report = handler.delete(&topic("gone", None, &[]), false).await.unwrap();

        assert_eq!(report.outcome, Outcome::Skipped);
        assert!(!rest.calls().iter().any(|c| c.starts_with("delete_topic")));
    }
}
