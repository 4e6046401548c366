// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 kaflow contributors

//! Pipeline runner
//!
//! Drives one operation across the components of a resolved pipeline.
//! Deploy walks the pipeline in order; destroy, reset and clean walk it in
//! reverse so consumers go before the producers they depend on.

use std::fmt;
use std::time::{Duration, Instant};

use super::Pipeline;
use crate::components::Component;
use crate::errors::{KaflowError, KaflowResult};
use crate::handlers::{Handlers, Outcome, Report};

/// Operation applied to every selected component
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Deploy,
    Destroy,
    Reset,
    Clean,
}

impl Operation {
    /// Whether components are processed last to first
    pub fn is_reverse(self) -> bool {
        !matches!(self, Self::Deploy)
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Deploy => "deploy",
            Self::Destroy => "destroy",
            Self::Reset => "reset",
            Self::Clean => "clean",
        };
        write!(f, "{}", text)
    }
}

/// How `steps` select components
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum FilterType {
    /// Only the listed components
    #[default]
    Include,
    /// Every component except the listed ones
    Exclude,
}

/// Options of one run
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Only report what would change
    pub dry_run: bool,
    /// Final component names; empty selects everything
    pub steps: Vec<String>,
    pub filter: FilterType,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            dry_run: true,
            steps: vec![],
            filter: FilterType::Include,
        }
    }
}

impl RunOptions {
    pub fn selects(&self, component: &Component) -> bool {
        if self.steps.is_empty() {
            return true;
        }
        let listed = self.steps.iter().any(|step| step == component.name());
        match self.filter {
            FilterType::Include => listed,
            FilterType::Exclude => !listed,
        }
    }
}

/// Reports of one component
#[derive(Debug, Clone)]
pub struct ComponentRun {
    pub component: String,
    pub component_type: String,
    pub reports: Vec<Report>,
}

/// Result of a run
#[derive(Debug)]
pub struct RunSummary {
    pub operation: Operation,
    pub dry_run: bool,
    pub components: Vec<ComponentRun>,
    pub duration: Duration,
}

impl RunSummary {
    /// Reports that gave up after retries or a timeout
    pub fn incomplete(&self) -> Vec<&Report> {
        self.components
            .iter()
            .flat_map(|run| &run.reports)
            .filter(|report| report.outcome == Outcome::Incomplete)
            .collect()
    }
}

/// Runs operations against the services behind [`Handlers`]
pub struct PipelineRunner<'a> {
    handlers: &'a Handlers,
}

impl<'a> PipelineRunner<'a> {
    pub fn new(handlers: &'a Handlers) -> Self {
        Self { handlers }
    }

    /// Apply `operation` to the selected components
    ///
    /// The first error aborts the run; nothing already done is rolled back.
    pub async fn run(
        &self,
        pipeline: &Pipeline,
        operation: Operation,
        options: &RunOptions,
    ) -> KaflowResult<RunSummary> {
        let start = Instant::now();

        let mut selected: Vec<&Component> = pipeline
            .components()
            .iter()
            .filter(|c| options.selects(c))
            .collect();
        if operation.is_reverse() {
            selected.reverse();
        }

        if selected.is_empty() {
            tracing::warn!("No components selected in pipeline '{}'", pipeline.name);
        }

        let mut components = Vec::with_capacity(selected.len());
        for component in selected {
            tracing::info!(
                "{} {} ({}){}",
                operation,
                component.name(),
                component.component_type(),
                if options.dry_run { " [dry run]" } else { "" }
            );

            let reports = self
                .run_component(component, operation, options.dry_run)
                .await
                .map_err(|e| KaflowError::OperationFailed {
                    operation: operation.to_string(),
                    component: component.name().to_string(),
                    source: Box::new(e),
                })?;

            components.push(ComponentRun {
                component: component.name().to_string(),
                component_type: component.component_type().to_string(),
                reports,
            });
        }

        Ok(RunSummary {
            operation,
            dry_run: options.dry_run,
            components,
            duration: start.elapsed(),
        })
    }

    async fn run_component(
        &self,
        component: &Component,
        operation: Operation,
        dry_run: bool,
    ) -> KaflowResult<Vec<Report>> {
        let handlers = self.handlers;
        match operation {
            Operation::Deploy => component.deploy(handlers, dry_run).await,
            Operation::Destroy => component.destroy(handlers, dry_run).await,
            Operation::Reset => {
                let mut reports = component.destroy(handlers, dry_run).await?;
                reports.extend(component.reset(handlers, dry_run).await?);
                Ok(reports)
            }
            Operation::Clean => {
                let mut reports = component.destroy(handlers, dry_run).await?;
                reports.extend(component.clean(handlers, dry_run).await?);
                Ok(reports)
            }
        }
    }
}
