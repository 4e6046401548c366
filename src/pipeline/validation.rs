// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 kaflow contributors

//! Checks of a resolved pipeline
//!
//! Construction already rejects what cannot be built. These checks report
//! wiring that builds but is probably not what the author meant.

use std::collections::BTreeMap;

use super::graph::PipelineGraph;
use super::Pipeline;
use crate::components::Component;

/// Pipeline validator
pub struct PipelineValidator;

impl PipelineValidator {
    /// Validate the wiring of a resolved pipeline
    pub fn validate(pipeline: &Pipeline) -> ValidationResult {
        let mut result = ValidationResult::new();

        if pipeline.is_empty() {
            result.add_error("Pipeline has no components");
            return result;
        }

        let mut writers: BTreeMap<String, Vec<&str>> = BTreeMap::new();
        for component in pipeline.components() {
            for topic in component.outputs() {
                writers.entry(topic).or_default().push(component.name());
            }
            Self::validate_component(component, &mut result);
        }

        for (topic, components) in &writers {
            if components.len() > 1 {
                result.add_warning(&format!(
                    "Topic '{}' is written by several components: {}",
                    topic,
                    components.join(", ")
                ));
            }
        }

        for topic in PipelineGraph::new(pipeline).external_topics() {
            result.add_warning(&format!(
                "Topic '{}' is read but not written by any component of the pipeline",
                topic
            ));
        }

        result
    }

    fn validate_component(component: &Component, result: &mut ValidationResult) {
        match component {
            Component::StreamsApp(app) => {
                let streams = &app.app.streams;
                if streams.input_topics.is_empty()
                    && streams.input_pattern.is_none()
                    && streams.extra_input_topics.is_empty()
                    && streams.extra_input_patterns.is_empty()
                {
                    result.add_warning(&format!(
                        "Streams app '{}' has no input topics",
                        component.name()
                    ));
                }
                if streams.output_topic.is_none() {
                    result.add_warning(&format!(
                        "Streams app '{}' has no output topic",
                        component.name()
                    ));
                }
            }
            Component::ProducerApp(app) if app.app.streams.output_topic.is_none() => {
                result.add_warning(&format!(
                    "Producer app '{}' has no output topic",
                    component.name()
                ));
            }
            Component::KafkaSinkConnector(connector)
                if !connector.config.contains_key("topics")
                    && !connector.config.contains_key("topics.regex") =>
            {
                result.add_error(&format!(
                    "Sink connector '{}' reads no topics, set 'from' or chain it after a producer",
                    component.name()
                ));
            }
            _ => {}
        }
    }
}

/// Result of pipeline validation
#[derive(Debug, Default)]
pub struct ValidationResult {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_error(&mut self, message: &str) {
        self.errors.push(message.to_string());
    }

    pub fn add_warning(&mut self, message: &str) {
        self.warnings.push(message.to_string());
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::FromTopic;
    use crate::registry::ComponentKind;
    use serde_json::json;

    fn component(kind: ComponentKind, value: serde_json::Value) -> Component {
        let mut component = Component::from_value(kind, value).unwrap();
        component.apply_to_section();
        component
    }

    fn producer(name: &str, output: &str) -> Component {
        component(
            ComponentKind::ProducerApp,
            json!({
                "type": "producer-app",
                "name": name,
                "namespace": "ns",
                "to": {"topics": {output: {"type": "output"}}}
            }),
        )
    }

    fn sink(name: &str) -> Component {
        component(
            ComponentKind::KafkaSinkConnector,
            json!({
                "type": "kafka-sink-connector",
                "name": name,
                "config": {"connector.class": "C"}
            }),
        )
    }

    #[test]
    fn test_empty_pipeline_is_invalid() {
        let result = PipelineValidator::validate(&Pipeline::new("empty"));
        assert!(!result.is_valid());
        assert!(result.errors[0].contains("no components"));
    }

    #[test]
    fn test_wired_pipeline_is_valid() {
        let mut pipeline = Pipeline::new("orders");
        pipeline.push(producer("source", "raw"));
        let mut consumer = sink("sink");
        consumer.apply_from_topic("raw", &FromTopic::input());
        pipeline.push(consumer);

        let result = PipelineValidator::validate(&pipeline);
        assert!(result.is_valid());
        assert!(!result.has_warnings());
    }

    #[test]
    fn test_unwired_sink_is_an_error() {
        let mut pipeline = Pipeline::new("orders");
        pipeline.push(sink("sink"));

        let result = PipelineValidator::validate(&pipeline);
        assert!(result.errors.iter().any(|e| e.contains("reads no topics")));
    }

    #[test]
    fn test_shared_output_and_external_input_warn() {
        let mut pipeline = Pipeline::new("orders");
        pipeline.push(producer("a", "shared"));
        pipeline.push(producer("b", "shared"));
        let mut consumer = sink("sink");
        consumer.apply_from_topic("elsewhere", &FromTopic::input());
        pipeline.push(consumer);

        let result = PipelineValidator::validate(&pipeline);
        assert!(result.is_valid());
        assert!(result.warnings.iter().any(|w| w.contains("several components: a, b")));
        assert!(result.warnings.iter().any(|w| w.contains("'elsewhere'")));
    }
}
