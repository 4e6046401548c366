// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 kaflow contributors

//! Schema registration for output topics

use std::sync::Arc;

use super::{Outcome, Report};
use crate::clients::SchemaRegistryApi;
use crate::components::KafkaTopic;
use crate::errors::{KaflowError, KaflowResult};

/// Registers and deletes the key and value schemas of topics
pub struct SchemaHandler {
    api: Arc<dyn SchemaRegistryApi>,
}

/// `(subject, schema)` pairs declared on a topic
fn declared_subjects(topic: &KafkaTopic) -> Vec<(String, &str)> {
    let mut subjects = Vec::new();
    if let Some(ref schema) = topic.config.key_schema {
        subjects.push((topic.key_subject(), schema.as_str()));
    }
    if let Some(ref schema) = topic.config.value_schema {
        subjects.push((topic.value_subject(), schema.as_str()));
    }
    subjects
}

fn resource(subject: &str) -> String {
    format!("subject {}", subject)
}

impl SchemaHandler {
    pub fn new(api: Arc<dyn SchemaRegistryApi>) -> Self {
        Self { api }
    }

    /// Register declared schemas, or check their compatibility in a dry run
    pub async fn submit(&self, topics: &[KafkaTopic], dry_run: bool) -> KaflowResult<Vec<Report>> {
        let mut reports = Vec::new();

        for topic in topics {
            for (subject, schema) in declared_subjects(topic) {
                if !dry_run {
                    let id = self.api.register_schema(&subject, schema).await?;
                    tracing::info!("Registered schema {} for subject {}", id, subject);
                    reports.push(Report::new(resource(&subject), Outcome::Applied));
                    continue;
                }

                match self.api.get_latest_version(&subject).await {
                    Ok(latest) => {
                        if !self.api.check_compatibility(&subject, schema).await? {
                            return Err(KaflowError::validation(format!(
                                "schema for subject '{}' is not compatible with version {}",
                                subject, latest.version
                            )));
                        }
                        tracing::info!("Schema for subject {} is compatible", subject);
                    }
                    Err(e) if e.is_not_found() => {
                        tracing::info!("Subject {} does not exist, schema would be registered", subject);
                    }
                    Err(e) => return Err(e),
                }
                reports.push(Report::new(resource(&subject), Outcome::Planned));
            }
        }

        Ok(reports)
    }

    /// Delete the key and value subjects of every topic
    pub async fn delete(&self, topics: &[KafkaTopic], dry_run: bool) -> KaflowResult<Vec<Report>> {
        let mut reports = Vec::new();

        for topic in topics {
            for subject in [topic.key_subject(), topic.value_subject()] {
                if dry_run {
                    tracing::info!("Subject {} would be deleted if it exists", subject);
                    reports.push(Report::new(resource(&subject), Outcome::Planned));
                    continue;
                }

                match self.api.delete_subject(&subject).await {
                    Ok(versions) => {
                        tracing::info!("Deleted {} versions of subject {}", versions.len(), subject);
                        reports.push(Report::new(resource(&subject), Outcome::Deleted));
                    }
                    Err(e) if e.is_not_found() => {
                        tracing::debug!("Subject {} not found", subject);
                    }
                    Err(e) => return Err(e),
                }
            }
        }

        Ok(reports)
    }
}
