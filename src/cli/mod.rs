// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 kaflow contributors

//! CLI command definitions and handlers
//!
//! Defines the command-line interface for kaflow.

pub mod generate;
pub mod graph;
pub mod operation;
pub mod validate;

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::config::KaflowConfig;
use crate::errors::KaflowResult;
use crate::pipeline::{find_pipelines, load_pipeline, FilterType, Pipeline};
use crate::registry::Registry;

/// Declarative Kafka pipeline orchestrator
#[derive(Parser, Debug)]
#[clap(
    name = "kaflow",
    version,
    about = "Deploy, reset and clean Kafka pipelines described in YAML",
    long_about = None,
    after_help = "Examples:\n\
        kaflow generate pipelines/orders          Print the resolved pipeline\n\
        kaflow deploy pipelines/orders            Show what a deploy would change\n\
        kaflow deploy pipelines/orders --execute  Deploy the pipeline\n\
        kaflow clean pipelines/orders --steps orders-sink --execute\n\n\
        See 'kaflow <command> --help' for more information on a specific command."
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[clap(short, long, global = true)]
    pub verbose: bool,

    /// Change to directory before executing
    #[clap(short = 'C', long, global = true, value_name = "DIR")]
    pub directory: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print the fully resolved pipeline
    Generate(PipelineArgs),

    /// Resolve the pipeline and check its wiring
    Validate(PipelineArgs),

    /// Show the pipeline as a graph of components and topics
    Graph {
        #[clap(flatten)]
        pipeline: PipelineArgs,

        /// Output format
        #[clap(short, long, value_enum, default_value_t = GraphFormat::Text)]
        format: GraphFormat,
    },

    /// Create or update topics, schemas, apps and connectors
    Deploy(OperationArgs),

    /// Remove apps and connectors, keeping topics
    Destroy(OperationArgs),

    /// Destroy, then reset consumer offsets
    Reset(OperationArgs),

    /// Destroy, then reset and delete topics and schemas
    Clean(OperationArgs),
}

/// Arguments shared by every command
#[derive(Args, Debug, Clone)]
pub struct PipelineArgs {
    /// Pipeline file, or a directory searched for pipeline.yaml files
    pub pipeline: PathBuf,

    /// Config file, or a directory containing config.yaml
    #[clap(long, value_name = "PATH", env = "KAFLOW_CONFIG")]
    pub config: Option<PathBuf>,

    /// Defaults directory, overriding defaults_path from the config
    #[clap(long, value_name = "DIR", env = "KAFLOW_DEFAULT_PATH")]
    pub defaults: Option<PathBuf>,

    /// Environment selecting config_<env>.yaml, defaults_<env>.yaml and pipeline_<env>.yaml
    #[clap(short, long, env = "KAFLOW_ENVIRONMENT")]
    pub environment: Option<String>,
}

/// Arguments of deploy, destroy, reset and clean
#[derive(Args, Debug, Clone)]
pub struct OperationArgs {
    #[clap(flatten)]
    pub pipeline: PipelineArgs,

    /// Apply the changes; without it nothing is modified
    #[clap(long)]
    pub execute: bool,

    /// Component names to include or exclude, comma separated
    #[clap(long, value_delimiter = ',', value_name = "NAMES")]
    pub steps: Vec<String>,

    /// Whether --steps includes or excludes components
    #[clap(long, value_enum, default_value_t = FilterType::Include)]
    pub filter_type: FilterType,
}

/// Graph output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum GraphFormat {
    Text,
    Dot,
    Mermaid,
}

/// Configuration and resolved pipelines of one invocation
pub struct Session {
    pub config: KaflowConfig,
    pub pipelines: Vec<Pipeline>,
}

impl Session {
    /// Load the config and every pipeline named by `args`
    ///
    /// The process environment is read once here and handed to placeholder
    /// substitution.
    pub fn load(args: &PipelineArgs) -> KaflowResult<Self> {
        let env: Vec<(String, String)> = std::env::vars().collect();
        let environment = args.environment.as_deref();

        let mut config = KaflowConfig::load(args.config.as_deref(), environment)?;
        if let Some(ref defaults) = args.defaults {
            config.defaults_path = defaults.clone();
        }

        let registry = Registry::builtin();
        let pipelines = find_pipelines(&args.pipeline)?
            .iter()
            .map(|path| load_pipeline(&registry, &config, path, environment, env.clone()))
            .collect::<KaflowResult<Vec<_>>>()?;

        Ok(Self { config, pipelines })
    }
}
