// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 kaflow contributors

//! Pipeline components
//!
//! [`Component`] is the closed set of deployable component kinds. Each kind
//! decides which topic bindings it supports through [`TopicBinding`] and
//! implements its own deploy, destroy, reset and clean steps.

mod base;
mod connector;
mod helm_app;
mod streams_bootstrap;
pub mod topic;

pub use base::ComponentBase;
pub use connector::{KafkaSinkConnector, KafkaSourceConnector};
pub use helm_app::HelmApp;
pub use streams_bootstrap::{ProducerApp, StreamsApp, StreamsAppValues, StreamsConfig};
pub use topic::{
    FromSection, FromTopic, InputTopicType, KafkaTopic, OutputTopicType, ToSection, TopicConfig,
};

use serde::Serialize;
use serde_json::Value;

use crate::config::KaflowConfig;
use crate::errors::KaflowResult;
use crate::handlers::{Handlers, Report};
use crate::registry::ComponentKind;

/// Where a component keeps the topics it is wired to
///
/// Every binding defaults to a no-op; kinds override what they support.
pub trait TopicBinding {
    fn binding_name(&self) -> &str;

    fn add_input_topics(&mut self, _topics: &[String]) {
        ignored(self.binding_name(), "input topics");
    }

    fn set_input_pattern(&mut self, _pattern: &str) {
        ignored(self.binding_name(), "an input pattern");
    }

    fn add_extra_input_topics(&mut self, _role: &str, _topics: &[String]) {
        ignored(self.binding_name(), "extra input topics");
    }

    fn add_extra_input_pattern(&mut self, _role: &str, _pattern: &str) {
        ignored(self.binding_name(), "extra input patterns");
    }

    fn set_output_topic(&mut self, _topic: &str) {
        ignored(self.binding_name(), "an output topic");
    }

    fn set_error_topic(&mut self, _topic: &str) {
        ignored(self.binding_name(), "an error topic");
    }

    fn add_extra_output_topic(&mut self, _role: &str, _topic: &str) {
        ignored(self.binding_name(), "extra output topics");
    }

    /// Topics the component reads
    fn inputs(&self) -> Vec<String> {
        vec![]
    }

    /// Topics the component writes
    fn outputs(&self) -> Vec<String> {
        vec![]
    }
}

fn ignored(name: &str, what: &str) {
    tracing::debug!("Component '{}' does not bind {}, ignoring", name, what);
}

/// A resolved pipeline component
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(untagged)]
pub enum Component {
    HelmApp(HelmApp),
    StreamsApp(StreamsApp),
    ProducerApp(ProducerApp),
    KafkaSinkConnector(KafkaSinkConnector),
    KafkaSourceConnector(KafkaSourceConnector),
}

macro_rules! each_kind {
    ($value:expr, $inner:ident => $body:expr) => {
        match $value {
            Component::HelmApp($inner) => $body,
            Component::StreamsApp($inner) => $body,
            Component::ProducerApp($inner) => $body,
            Component::KafkaSinkConnector($inner) => $body,
            Component::KafkaSourceConnector($inner) => $body,
        }
    };
}

impl Component {
    /// Deserialize a fully merged component tree as the given kind
    pub fn from_value(kind: ComponentKind, value: Value) -> KaflowResult<Self> {
        let component = match kind {
            ComponentKind::HelmApp => Self::HelmApp(serde_json::from_value(value)?),
            ComponentKind::StreamsApp => Self::StreamsApp(serde_json::from_value(value)?),
            ComponentKind::ProducerApp => Self::ProducerApp(serde_json::from_value(value)?),
            ComponentKind::KafkaSinkConnector => {
                Self::KafkaSinkConnector(serde_json::from_value(value)?)
            }
            ComponentKind::KafkaSourceConnector => {
                Self::KafkaSourceConnector(serde_json::from_value(value)?)
            }
        };
        Ok(component)
    }

    pub fn kind(&self) -> ComponentKind {
        match self {
            Self::HelmApp(_) => ComponentKind::HelmApp,
            Self::StreamsApp(_) => ComponentKind::StreamsApp,
            Self::ProducerApp(_) => ComponentKind::ProducerApp,
            Self::KafkaSinkConnector(_) => ComponentKind::KafkaSinkConnector,
            Self::KafkaSourceConnector(_) => ComponentKind::KafkaSourceConnector,
        }
    }

    pub fn base(&self) -> &ComponentBase {
        each_kind!(self, c => &c.base)
    }

    pub fn base_mut(&mut self) -> &mut ComponentBase {
        each_kind!(self, c => &mut c.base)
    }

    pub fn name(&self) -> &str {
        &self.base().name
    }

    pub fn raw_name(&self) -> &str {
        self.base().raw_name()
    }

    pub fn component_type(&self) -> &str {
        &self.base().component_type
    }

    pub fn binding(&self) -> &dyn TopicBinding {
        each_kind!(self, c => c as &dyn TopicBinding)
    }

    pub fn binding_mut(&mut self) -> &mut dyn TopicBinding {
        each_kind!(self, c => c as &mut dyn TopicBinding)
    }

    /// Serialized form, as written by `generate`
    pub fn to_value(&self) -> KaflowResult<Value> {
        Ok(serde_json::to_value(self)?)
    }

    /// Kind specific completion after construction
    pub fn finish(&mut self, config: &KaflowConfig) -> KaflowResult<()> {
        match self {
            Self::HelmApp(_) => {}
            Self::StreamsApp(app) => app.finish(config),
            Self::ProducerApp(app) => app.finish(config),
            Self::KafkaSinkConnector(connector) => connector.finish(config)?,
            Self::KafkaSourceConnector(connector) => connector.finish(config)?,
        }
        Ok(())
    }

    /// Check topic sections and kind specific constraints
    pub fn validate(&self) -> KaflowResult<()> {
        self.base().validate_sections()?;
        match self {
            Self::KafkaSinkConnector(connector) => connector.validate(),
            Self::KafkaSourceConnector(connector) => connector.validate(),
            _ => Ok(()),
        }
    }

    /// Whether upstream output topics are chained into this component
    pub fn accepts_inputs(&self) -> bool {
        !matches!(self, Self::KafkaSourceConnector(_))
    }

    /// Bind one `from` entry
    pub fn apply_from_topic(&mut self, topic: &str, from: &FromTopic) {
        let role = from.role.as_deref().filter(|r| !r.is_empty());
        let binding = self.binding_mut();

        match (from.topic_type, role) {
            (Some(InputTopicType::Input), _) | (None, None) => {
                binding.add_input_topics(&[topic.to_string()])
            }
            (Some(InputTopicType::Pattern), None) => binding.set_input_pattern(topic),
            (Some(InputTopicType::Pattern), Some(role)) => {
                binding.add_extra_input_pattern(role, topic)
            }
            (None, Some(role)) => binding.add_extra_input_topics(role, &[topic.to_string()]),
        }
    }

    /// Bind every topic of the own `to` section
    pub fn apply_to_section(&mut self) {
        let Some(to) = self.base().to.clone() else {
            return;
        };
        let binding = self.binding_mut();

        for (topic, config) in &to.topics {
            let role = config.role.as_deref().filter(|r| !r.is_empty());
            match (config.topic_type, role) {
                (Some(OutputTopicType::Output), _) => binding.set_output_topic(topic),
                (Some(OutputTopicType::Error), _) => binding.set_error_topic(topic),
                (None, Some(role)) => binding.add_extra_output_topic(role, topic),
                (None, None) => {}
            }
        }
    }

    /// Read the output topics of an upstream `to` section
    pub fn weave_from(&mut self, upstream: &ToSection, from: &FromTopic) {
        for topic in upstream.output_topics() {
            self.apply_from_topic(topic, from);
        }
    }

    pub fn inputs(&self) -> Vec<String> {
        self.binding().inputs()
    }

    pub fn outputs(&self) -> Vec<String> {
        self.binding().outputs()
    }

    /// Topics declared in the `to` section
    pub fn to_topics(&self) -> Vec<KafkaTopic> {
        self.base().to_topics()
    }

    /// Create or update everything the component needs
    pub async fn deploy(&self, handlers: &Handlers, dry_run: bool) -> KaflowResult<Vec<Report>> {
        each_kind!(self, c => c.deploy(handlers, dry_run).await)
    }

    /// Remove the running component, keeping its data
    pub async fn destroy(&self, handlers: &Handlers, dry_run: bool) -> KaflowResult<Vec<Report>> {
        each_kind!(self, c => c.destroy(handlers, dry_run).await)
    }

    /// Reset consumer state
    pub async fn reset(&self, handlers: &Handlers, dry_run: bool) -> KaflowResult<Vec<Report>> {
        match self {
            Self::StreamsApp(app) => app.reset(handlers, dry_run).await,
            Self::KafkaSinkConnector(connector) => connector.reset(handlers, dry_run).await,
            Self::KafkaSourceConnector(connector) => connector.reset(handlers, dry_run).await,
            Self::HelmApp(_) | Self::ProducerApp(_) => Ok(vec![]),
        }
    }

    /// Reset state and delete the component's data
    pub async fn clean(&self, handlers: &Handlers, dry_run: bool) -> KaflowResult<Vec<Report>> {
        match self {
            Self::StreamsApp(app) => app.clean(handlers, dry_run).await,
            Self::ProducerApp(app) => app.clean(handlers, dry_run).await,
            Self::KafkaSinkConnector(connector) => connector.clean(handlers, dry_run).await,
            Self::KafkaSourceConnector(connector) => connector.clean(handlers, dry_run).await,
            Self::HelmApp(_) => Ok(vec![]),
        }
    }
}
