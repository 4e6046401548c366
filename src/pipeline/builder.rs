// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 kaflow contributors

//! Pipeline construction
//!
//! [`PipelineBuilder`] turns raw component mappings into resolved
//! [`Component`]s, in declaration order:
//!
//! 1. look up the type in the [`Registry`]
//! 2. layer the explicit fields over the type's defaults, substitute
//!    placeholders and prefix the name
//! 3. merge the matching environment override
//! 4. inflate into one or more components
//! 5. wire `from` topics and components, or chain onto the previous
//!    component, then bind the own `to` section
//! 6. check the name and append
//!
//! The finished pipeline must form an acyclic graph.

use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;

use super::graph::PipelineGraph;
use super::substitution::SubstitutionContext;
use super::Pipeline;
use crate::components::{Component, FromTopic};
use crate::config::KaflowConfig;
use crate::defaults::{merge_missing, DefaultsResolver};
use crate::errors::{KaflowError, KaflowResult};
use crate::registry::{ComponentKind, Registry, TypeDescriptor};

static NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9.-]+$").expect("valid component name regex"));

/// Substitution variables of one pipeline
///
/// `env` is whatever part of the process environment the caller wants to
/// expose to placeholders.
pub fn pipeline_context<I>(config: &KaflowConfig, pipeline_name: &str, env: I) -> SubstitutionContext
where
    I: IntoIterator<Item = (String, String)>,
{
    let mut context = SubstitutionContext::new()
        .with_vars(env)
        .with_vars(config.substitution_vars());
    context.set_pipeline_name(pipeline_name);
    context
}

/// The components a declared entry was inflated into
struct InflationGroup {
    name: String,
    raw_name: String,
    /// Index of the last member in the pipeline
    last: usize,
}

/// Builds a [`Pipeline`] from raw component mappings
pub struct PipelineBuilder<'a> {
    registry: &'a Registry,
    resolver: &'a DefaultsResolver,
    config: &'a KaflowConfig,
    context: SubstitutionContext,
}

impl<'a> PipelineBuilder<'a> {
    pub fn new(
        registry: &'a Registry,
        resolver: &'a DefaultsResolver,
        config: &'a KaflowConfig,
        context: SubstitutionContext,
    ) -> Self {
        Self {
            registry,
            resolver,
            config,
            context,
        }
    }

    /// Resolve every entry of `components`, applying `overrides` by name
    pub fn build(&self, components: &[Value], overrides: &[Value]) -> KaflowResult<Pipeline> {
        let name = self.context.get("pipeline_name").unwrap_or_default();
        let mut pipeline = Pipeline::new(name);
        let mut groups = Vec::new();

        for entry in components {
            let component_type = entry.get("type").and_then(Value::as_str);
            let component_name = entry.get("name").and_then(Value::as_str);

            self.add_entry(&mut pipeline, &mut groups, entry, overrides)
                .map_err(|e| e.in_component(component_type, component_name))?;
        }

        PipelineGraph::new(&pipeline).check_acyclic()?;
        tracing::debug!(
            "Pipeline '{}' resolved with {} components",
            pipeline.name,
            pipeline.len()
        );
        Ok(pipeline)
    }

    fn add_entry(
        &self,
        pipeline: &mut Pipeline,
        groups: &mut Vec<InflationGroup>,
        entry: &Value,
        overrides: &[Value],
    ) -> KaflowResult<()> {
        let component_type = entry
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| KaflowError::validation("component is missing its 'type'"))?;
        let (descriptor, kind) = self.registry.concrete(component_type)?;

        let (component, context) = self.construct(entry, descriptor, kind)?;
        let component = self.enrich(component, &context, overrides)?;
        let name = component.name().to_string();
        let raw_name = component.raw_name().to_string();

        let inflated = match descriptor.inflate {
            Some(inflate) => {
                let members = inflate(component)?;
                tracing::debug!("Component '{}' inflated into {}", name, members.len());
                members
                    .into_iter()
                    .map(|member| self.enrich(member, &context, overrides))
                    .collect::<KaflowResult<Vec<_>>>()?
            }
            None => vec![component],
        };

        let before = pipeline.len();
        for mut component in inflated {
            component.validate()?;
            self.wire(&mut component, pipeline, groups)?;
            component.apply_to_section();
            check_name(&component, pipeline)?;
            pipeline.push(component);
        }

        // An empty inflation leaves nothing to reference
        if pipeline.len() > before {
            groups.push(InflationGroup {
                name,
                raw_name,
                last: pipeline.len() - 1,
            });
        }
        Ok(())
    }

    /// Merge defaults, substitute placeholders and deserialize
    fn construct(
        &self,
        entry: &Value,
        descriptor: &TypeDescriptor,
        kind: ComponentKind,
    ) -> KaflowResult<(Component, SubstitutionContext)> {
        let defaults = self.resolver.defaults_for(&descriptor.chain())?;
        let mut merged = merge_missing(entry.clone(), &Value::Object(defaults));

        let fields = merged
            .as_object_mut()
            .ok_or_else(|| KaflowError::validation("component is not a mapping"))?;
        fields
            .entry("prefix")
            .or_insert_with(|| Value::String(self.config.pipeline_prefix.clone()));
        let raw_name = fields
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| KaflowError::validation("component is missing its 'name'"))?
            .to_string();

        let mut context = self.context.clone();
        context.set("component_type", descriptor.type_name.as_str());
        let raw_name = context.substitute(&raw_name);
        context.set("component_name", raw_name.as_str());
        context.set(
            "output_topic_name",
            self.config.topic_name_config.default_output_topic_name.as_str(),
        );
        context.set(
            "error_topic_name",
            self.config.topic_name_config.default_error_topic_name.as_str(),
        );

        let mut value = context.substitute_value(&merged);
        let prefix = value
            .get("prefix")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let name = format!("{}{}", prefix, raw_name);
        tracing::debug!("Component '{}' resolved as '{}'", raw_name, name);
        value["name"] = Value::String(name);

        let mut component = Component::from_value(kind, value)?;
        component.finish(self.config)?;
        Ok((component, context))
    }

    /// Apply the environment override matching the component's name
    fn enrich(
        &self,
        component: Component,
        context: &SubstitutionContext,
        overrides: &[Value],
    ) -> KaflowResult<Component> {
        let matching = overrides.iter().find(|entry| {
            entry
                .get("name")
                .and_then(Value::as_str)
                .is_some_and(|name| component.base().is_named(&context.substitute(name)))
        });
        let Some(entry) = matching else {
            return Ok(component);
        };

        let mut patch = context.substitute_value(entry);
        if let Some(fields) = patch.as_object_mut() {
            fields.remove("name");
            fields.remove("type");
        }
        tracing::debug!("Applying environment override to '{}'", component.name());

        let merged = merge_missing(patch, &component.to_value()?);
        let mut enriched = Component::from_value(component.kind(), merged)?;
        enriched.finish(self.config)?;
        Ok(enriched)
    }

    /// Bind input topics from `from`, or from the previous component
    fn wire(
        &self,
        component: &mut Component,
        pipeline: &Pipeline,
        groups: &[InflationGroup],
    ) -> KaflowResult<()> {
        let Some(from) = component.base().from.clone() else {
            if !component.accepts_inputs() {
                return Ok(());
            }
            if let Some(to) = pipeline.last().and_then(|c| c.base().to.clone()) {
                component.weave_from(&to, &FromTopic::input());
            }
            return Ok(());
        };

        for (topic, from_topic) in &from.topics {
            component.apply_from_topic(topic, from_topic);
        }

        for (reference, from_topic) in &from.components {
            let upstream = find_upstream(pipeline, groups, reference).ok_or_else(|| {
                KaflowError::UnknownComponent {
                    component: component.name().to_string(),
                    reference: reference.clone(),
                }
            })?;
            if let Some(ref to) = upstream.base().to {
                component.weave_from(to, from_topic);
            }
        }

        Ok(())
    }
}

/// A prior component by final or raw name, through its inflation group
fn find_upstream<'p>(
    pipeline: &'p Pipeline,
    groups: &[InflationGroup],
    reference: &str,
) -> Option<&'p Component> {
    groups
        .iter()
        .rev()
        .find(|g| g.name == reference || g.raw_name == reference)
        .and_then(|g| pipeline.components().get(g.last))
        .or_else(|| pipeline.find(reference))
}

fn check_name(component: &Component, pipeline: &Pipeline) -> KaflowResult<()> {
    let name = component.name();
    if !NAME_RE.is_match(name) {
        return Err(KaflowError::InvalidComponentName {
            name: name.to_string(),
        });
    }
    if pipeline.components().iter().any(|c| c.name() == name) {
        return Err(KaflowError::DuplicateComponent {
            name: name.to_string(),
        });
    }
    Ok(())
}
