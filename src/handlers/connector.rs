// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 kaflow contributors

//! Connector reconciliation through Kafka Connect

use serde_json::Value;
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use super::{Outcome, Report};
use crate::clients::KafkaConnectApi;
use crate::diff::{diff, render_diff, Change};
use crate::errors::{KaflowError, KaflowResult};

/// Attempts of one mutating call while Kafka Connect is rebalancing
pub const MAX_ATTEMPTS: u32 = 2;

/// Creates, updates and deletes connectors
pub struct ConnectorHandler {
    api: Arc<dyn KafkaConnectApi>,
    timeout: Duration,
}

fn resource(name: &str) -> String {
    format!("connector {}", name)
}

fn config_value(config: &BTreeMap<String, String>) -> Value {
    Value::Object(
        config
            .iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect(),
    )
}

impl ConnectorHandler {
    pub fn new(api: Arc<dyn KafkaConnectApi>, timeout: Duration) -> Self {
        Self { api, timeout }
    }

    /// Run `call` under the timeout, retrying immediately on 409
    ///
    /// `None` means the call timed out or kept conflicting.
    async fn with_retry<T, F, Fut>(&self, name: &str, mut call: F) -> KaflowResult<Option<T>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = KaflowResult<T>>,
    {
        for attempt in 1..=MAX_ATTEMPTS {
            match tokio::time::timeout(self.timeout, call()).await {
                Err(_) => {
                    tracing::warn!(
                        "Connector {}: timed out after {}s",
                        name,
                        self.timeout.as_secs_f64()
                    );
                    return Ok(None);
                }
                Ok(Ok(value)) => return Ok(Some(value)),
                Ok(Err(e)) if e.is_conflict() => {
                    tracing::warn!(
                        "Connector {} is rebalancing (attempt {}/{})",
                        name,
                        attempt,
                        MAX_ATTEMPTS
                    );
                }
                Ok(Err(e)) => return Err(e),
            }
        }

        tracing::warn!("Connector {}: giving up after {} attempts", name, MAX_ATTEMPTS);
        Ok(None)
    }

    /// Live config, `None` when the connector does not exist
    async fn live_config(&self, name: &str) -> KaflowResult<Option<BTreeMap<String, String>>> {
        match self.api.get_connector(name).await {
            Ok(info) => Ok(Some(info.config)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn plan_with_sides(
        &self,
        name: &str,
        config: &BTreeMap<String, String>,
    ) -> KaflowResult<(Vec<Change>, Value, Value)> {
        let before = match self.live_config(name).await? {
            Some(live) => {
                tracing::info!("Connector {} exists, its config would be updated", name);
                config_value(&live)
            }
            None => {
                tracing::info!("Connector {} does not exist, it would be created", name);
                Value::Null
            }
        };

        let errors = self.api.validate_connector_config(config).await?;
        if !errors.is_empty() {
            return Err(KaflowError::validation(format!(
                "connector '{}' config is invalid: {}",
                name,
                errors.join("; ")
            )));
        }

        let after = config_value(config);
        Ok((diff(&before, &after, &[]), before, after))
    }

    /// Changes needed to reach `config`, validated by Kafka Connect
    pub async fn plan(
        &self,
        name: &str,
        config: &BTreeMap<String, String>,
    ) -> KaflowResult<Vec<Change>> {
        Ok(self.plan_with_sides(name, config).await?.0)
    }

    /// Create the connector or replace its config
    pub async fn apply(
        &self,
        name: &str,
        config: &BTreeMap<String, String>,
        dry_run: bool,
    ) -> KaflowResult<Report> {
        if dry_run {
            let (changes, before, after) = self.plan_with_sides(name, config).await?;
            if changes.is_empty() {
                return Ok(Report::new(resource(name), Outcome::Unchanged));
            }
            for change in &changes {
                tracing::debug!("Connector {}: {}", name, change);
            }
            return Ok(Report::new(resource(name), Outcome::Planned)
                .with_diff(render_diff(&before, &after, &[])));
        }

        let exists = self.live_config(name).await?.is_some();
        let api = self.api.as_ref();
        let (result, outcome) = if exists {
            let result = self
                .with_retry(name, move || api.update_connector_config(name, config))
                .await?;
            (result, Outcome::Updated)
        } else {
            let result = self
                .with_retry(name, move || api.create_connector(name, config))
                .await?;
            (result, Outcome::Created)
        };

        match result {
            Some(_) => {
                tracing::info!("Connector {} {}", name, outcome);
                Ok(Report::new(resource(name), outcome))
            }
            None => Ok(Report::new(resource(name), Outcome::Incomplete)),
        }
    }

    /// Delete the connector if it exists
    pub async fn destroy(&self, name: &str, dry_run: bool) -> KaflowResult<Report> {
        if self.live_config(name).await?.is_none() {
            tracing::info!("Connector {} does not exist, skipping deletion", name);
            return Ok(Report::new(resource(name), Outcome::Skipped));
        }

        if dry_run {
            tracing::info!("Connector {} would be deleted", name);
            return Ok(Report::new(resource(name), Outcome::Planned));
        }

        let api = self.api.as_ref();
        match self.with_retry(name, move || api.delete_connector(name)).await? {
            Some(()) => Ok(Report::new(resource(name), Outcome::Deleted)),
            None => Ok(Report::new(resource(name), Outcome::Incomplete)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::fakes::FakeKafkaConnect;
    use super::*;
    use crate::diff::ChangeKind;

    fn config(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn handler(timeout: Duration) -> (Arc<FakeKafkaConnect>, ConnectorHandler) {
        let connect = Arc::new(FakeKafkaConnect::default());
        (connect.clone(), ConnectorHandler::new(connect, timeout))
    }

    #[tokio::test]
    async fn test_missing_connector_is_created() {
        let (connect, handler) = handler(Duration::from_secs(5));
        let desired = config(&[("connector.class", "C"), ("name", "sink")]);

        let report = handler.apply("sink", &desired, false).await.unwrap();
        assert_eq!(report.outcome, Outcome::Created);
        assert_eq!(connect.connector("sink").unwrap().config, desired);
    }

    #[tokio::test]
    async fn test_existing_connector_is_updated() {
        let (connect, handler) = handler(Duration::from_secs(5));
        connect.add_connector("sink", &[("connector.class", "C")]);

        let report = handler
            .apply("sink", &config(&[("connector.class", "D")]), false)
            .await
            .unwrap();

        assert_eq!(report.outcome, Outcome::Updated);
        assert_eq!(
            connect.calls(),
            vec!["get_connector sink", "update_connector_config sink"]
        );
    }

    #[tokio::test]
    async fn test_conflict_is_retried_once() {
        let (connect, handler) = handler(Duration::from_secs(5));
        connect.fail_with_conflicts(1);

        let report = handler
            .apply("sink", &config(&[("connector.class", "C")]), false)
            .await
            .unwrap();

        assert_eq!(report.outcome, Outcome::Created);
        let creates = connect
            .calls()
            .iter()
            .filter(|c| c.starts_with("create_connector"))
            .count();
        assert_eq!(creates, 2);
    }

    #[tokio::test]
    async fn test_exhausted_retries_are_incomplete() {
        let (connect, handler) = handler(Duration::from_secs(5));
        connect.fail_with_conflicts(10);

        let report = handler
            .apply("sink", &config(&[("connector.class", "C")]), false)
            .await
            .unwrap();

        assert_eq!(report.outcome, Outcome::Incomplete);
        let creates = connect
            .calls()
            .iter()
            .filter(|c| c.starts_with("create_connector"))
            .count();
        assert_eq!(creates as u32, MAX_ATTEMPTS);
    }

    #[tokio::test]
    async fn test_timeout_is_incomplete() {
        let (connect, handler) = handler(Duration::from_millis(20));
        connect.delay_mutations(Duration::from_secs(5));

        let report = handler
            .apply("sink", &config(&[("connector.class", "C")]), false)
            .await
            .unwrap();

        assert_eq!(report.outcome, Outcome::Incomplete);
        assert!(connect.connector("sink").is_none());
    }

    #[tokio::test]
    async fn test_dry_run_validation_errors_fail() {
        let (connect, handler) = handler(Duration::from_secs(5));
        connect.set_validation_errors(&["topics: Missing required configuration"]);

        let err = handler
            .apply("sink", &config(&[("connector.class", "C")]), true)
            .await
            .unwrap_err();

        assert!(err.to_string().contains("Missing required configuration"));
        assert!(!connect.calls().iter().any(|c| c.starts_with("create")));
    }

    #[tokio::test]
    async fn test_plan_diffs_live_config() {
        let (connect, handler) = handler(Duration::from_secs(5));
        connect.add_connector("sink", &[("connector.class", "C"), ("tasks.max", "1")]);

        let changes = handler
            .plan("sink", &config(&[("connector.class", "C"), ("tasks.max", "2")]))
            .await
            .unwrap();

        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].kind, ChangeKind::Change);
        assert_eq!(changes[0].path_string(), "tasks.max");
    }

    #[tokio::test]
    async fn test_destroy_missing_is_skipped() {
        let (connect, handler) = handler(Duration::from_secs(5));
        let report = handler.destroy("gone", false).await.unwrap();

        assert_eq!(report.outcome, Outcome::Skipped);
        assert_eq!(connect.calls(), vec!["get_connector gone"]);
    }

    #[tokio::test]
    async fn test_destroy_deletes() {
        let (connect, handler) = handler(Duration::from_secs(5));
        connect.add_connector("sink", &[]);

        let report = handler.destroy("sink", false).await.unwrap();
        assert_eq!(report.outcome, Outcome::Deleted);
        assert!(connect.connector("sink").is_none());
    }
}
