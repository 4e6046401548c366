// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 kaflow contributors

//! Pipelines
//!
//! Loading, resolution, graph and execution of a pipeline of components.

mod builder;
mod definition;
mod graph;
mod runner;
pub mod substitution;
mod validation;

pub use builder::{pipeline_context, PipelineBuilder};
pub use definition::{defaults_dirs, find_pipelines, PipelineDefinition, PIPELINE_FILE};
pub use graph::{GraphNode, PipelineGraph};
pub use runner::{ComponentRun, FilterType, Operation, PipelineRunner, RunOptions, RunSummary};
pub use substitution::{pipeline_name_from_path, SubstitutionContext};
pub use validation::{PipelineValidator, ValidationResult};

use serde_json::Value;
use std::path::Path;

use crate::components::Component;
use crate::config::KaflowConfig;
use crate::defaults::DefaultsResolver;
use crate::errors::KaflowResult;
use crate::registry::Registry;

/// An ordered list of resolved components
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Pipeline {
    pub name: String,
    components: Vec<Component>,
}

impl Pipeline {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            components: Vec::new(),
        }
    }

    pub fn components(&self) -> &[Component] {
        &self.components
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    pub fn last(&self) -> Option<&Component> {
        self.components.last()
    }

    /// Append a resolved component
    pub fn push(&mut self, component: Component) {
        self.components.push(component);
    }

    /// Most recent component with this final or raw name
    pub fn find(&self, reference: &str) -> Option<&Component> {
        self.components
            .iter()
            .rev()
            .find(|c| c.base().is_named(reference))
    }

    /// Resolved components as a YAML sequence
    pub fn to_yaml(&self) -> KaflowResult<String> {
        let values = self
            .components
            .iter()
            .map(Component::to_value)
            .collect::<KaflowResult<Vec<Value>>>()?;
        Ok(serde_yaml::to_string(&values)?)
    }
}

/// Load and resolve the pipeline file at `path`
///
/// Defaults are looked up next to the pipeline file, in its parents up to
/// the configured base directory, then in the configured defaults path.
pub fn load_pipeline(
    registry: &Registry,
    config: &KaflowConfig,
    path: &Path,
    environment: Option<&str>,
    env: Vec<(String, String)>,
) -> KaflowResult<Pipeline> {
    let definition = PipelineDefinition::load(path, environment)?;
    let name = pipeline_name_from_path(&config.pipeline_base_dir, path);
    tracing::info!("Loading pipeline '{}' from {}", name, path.display());

    let resolver = DefaultsResolver::new(
        defaults_dirs(path, &config.pipeline_base_dir, &config.defaults_path),
        &config.defaults_filename_prefix,
        environment,
    );
    let context = pipeline_context(config, &name, env);

    PipelineBuilder::new(registry, &resolver, config, context)
        .build(&definition.components, &definition.overrides)
}
