// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 kaflow contributors

//! `from` and `to` sections
//!
//! The `to` section declares the topics a component writes, the `from`
//! section the topics (or upstream components) it reads.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::errors::{KaflowError, KaflowResult};

/// Kind of an input topic
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum InputTopicType {
    Input,
    Pattern,
}

/// How a component reads a topic or an upstream component's output
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct FromTopic {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub topic_type: Option<InputTopicType>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

impl FromTopic {
    /// Plain input topic
    pub fn input() -> Self {
        Self {
            topic_type: Some(InputTopicType::Input),
            role: None,
        }
    }

    /// A role is only meaningful for patterns and untyped topics
    pub fn validate(&self, name: &str) -> KaflowResult<()> {
        if self.topic_type == Some(InputTopicType::Input) && has_role(&self.role) {
            return Err(KaflowError::validation(format!(
                "input topic '{}': define `role` only if `type` is `pattern` or unset",
                name
            )));
        }
        Ok(())
    }
}

/// Topics and components a component reads from
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct FromSection {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub topics: BTreeMap<String, FromTopic>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub components: BTreeMap<String, FromTopic>,
}

impl FromSection {
    pub fn validate(&self) -> KaflowResult<()> {
        for (name, topic) in self.topics.iter().chain(self.components.iter()) {
            topic.validate(name)?;
        }
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.topics.is_empty() && self.components.is_empty()
    }
}

/// Kind of an output topic
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OutputTopicType {
    Output,
    Error,
}

/// Declaration of a topic a component writes
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TopicConfig {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub topic_type: Option<OutputTopicType>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,

    #[serde(
        default,
        alias = "partitions",
        skip_serializing_if = "Option::is_none"
    )]
    pub partitions_count: Option<u32>,

    #[serde(
        default,
        alias = "replication-factor",
        skip_serializing_if = "Option::is_none"
    )]
    pub replication_factor: Option<u32>,

    #[serde(
        default,
        deserialize_with = "string_map",
        skip_serializing_if = "BTreeMap::is_empty"
    )]
    pub configs: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_schema: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_schema: Option<String>,
}

impl TopicConfig {
    /// Topic of the given type
    pub fn of_type(topic_type: OutputTopicType) -> Self {
        Self {
            topic_type: Some(topic_type),
            ..Default::default()
        }
    }

    /// A topic is either typed or labeled by a role
    pub fn validate(&self, name: &str) -> KaflowResult<()> {
        match (self.topic_type, has_role(&self.role)) {
            (Some(_), true) => Err(KaflowError::validation(format!(
                "output topic '{}': define `role` only if `type` is undefined",
                name
            ))),
            (None, false) => Err(KaflowError::validation(format!(
                "output topic '{}': either `type` or `role` is required",
                name
            ))),
            _ => Ok(()),
        }
    }
}

/// Topics a component writes
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ToSection {
    #[serde(default)]
    pub topics: BTreeMap<String, TopicConfig>,
}

impl ToSection {
    pub fn validate(&self) -> KaflowResult<()> {
        for (name, config) in &self.topics {
            config.validate(name)?;
        }
        Ok(())
    }

    /// Names of topics that downstream components chain onto
    ///
    /// Error topics and role-labeled topics are never woven.
    pub fn output_topics(&self) -> Vec<&str> {
        self.topics
            .iter()
            .filter(|(_, config)| config.topic_type == Some(OutputTopicType::Output))
            .map(|(name, _)| name.as_str())
            .collect()
    }

    /// All declared topics as [`KafkaTopic`]s
    pub fn kafka_topics(&self) -> Vec<KafkaTopic> {
        self.topics
            .iter()
            .map(|(name, config)| KafkaTopic {
                name: name.clone(),
                config: config.clone(),
            })
            .collect()
    }
}

/// A topic to create, reconcile or delete
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KafkaTopic {
    pub name: String,
    pub config: TopicConfig,
}

impl KafkaTopic {
    /// `<topic>-key` subject in the schema registry
    pub fn key_subject(&self) -> String {
        format!("{}-key", self.name)
    }

    /// `<topic>-value` subject in the schema registry
    pub fn value_subject(&self) -> String {
        format!("{}-value", self.name)
    }
}

/// Deduplicate topics by name, the last occurrence wins
pub fn deduplicate_topics(topics: Vec<KafkaTopic>) -> Vec<KafkaTopic> {
    let mut out: Vec<KafkaTopic> = Vec::with_capacity(topics.len());
    for topic in topics {
        if let Some(existing) = out.iter_mut().find(|t| t.name == topic.name) {
            *existing = topic;
        } else {
            out.push(topic);
        }
    }
    out
}

fn has_role(role: &Option<String>) -> bool {
    role.as_deref().is_some_and(|r| !r.is_empty())
}

/// Accept scalar values and keep them as strings
pub(crate) fn string_map<'de, D>(deserializer: D) -> Result<BTreeMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<BTreeMap<String, Value>> = Option::deserialize(deserializer)?;
    let mut out = BTreeMap::new();

    for (key, value) in raw.unwrap_or_default() {
        let text = match value {
            Value::String(s) => s,
            Value::Bool(_) | Value::Number(_) => value.to_string(),
            Value::Null => continue,
            other => {
                return Err(serde::de::Error::custom(format!(
                    "config '{}' must be a scalar, got {}",
                    key, other
                )))
            }
        };
        out.insert(key, text);
    }

    Ok(out)
}
