// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 kaflow contributors

//! Fields shared by every component

use serde::{Deserialize, Serialize};

use super::topic::{FromSection, KafkaTopic, ToSection};
use crate::errors::KaflowResult;

/// Common component fields
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ComponentBase {
    /// Registered type tag
    #[serde(rename = "type")]
    pub component_type: String,

    /// Final name, already prefixed
    pub name: String,

    #[serde(default)]
    pub prefix: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<FromSection>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<ToSection>,
}

impl ComponentBase {
    /// Name without the pipeline prefix
    pub fn raw_name(&self) -> &str {
        if self.prefix.is_empty() {
            return &self.name;
        }
        self.name.strip_prefix(&self.prefix).unwrap_or(&self.name)
    }

    /// Whether `reference` is this component's final or raw name
    pub fn is_named(&self, reference: &str) -> bool {
        self.name == reference || self.raw_name() == reference
    }

    /// Topics declared in the `to` section
    pub fn to_topics(&self) -> Vec<KafkaTopic> {
        self.to
            .as_ref()
            .map(ToSection::kafka_topics)
            .unwrap_or_default()
    }

    pub fn validate_sections(&self) -> KaflowResult<()> {
        if let Some(ref from) = self.from {
            from.validate()?;
        }
        if let Some(ref to) = self.to {
            to.validate()?;
        }
        Ok(())
    }
}
