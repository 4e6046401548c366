// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 kaflow contributors

//! kaflow - declarative Kafka pipeline orchestrator

use clap::Parser;
use miette::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use kaflow::cli::{Cli, Commands};
use kaflow::pipeline::Operation;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "kaflow=debug" } else { "kaflow=info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    // Change to specified directory if provided
    if let Some(ref dir) = cli.directory {
        std::env::set_current_dir(dir).map_err(|e| {
            miette::miette!("Failed to change to directory '{}': {}", dir.display(), e)
        })?;
    }

    match cli.command {
        Commands::Generate(args) => kaflow::cli::generate::run(args, cli.verbose).await,
        Commands::Validate(args) => kaflow::cli::validate::run(args, cli.verbose).await,
        Commands::Graph { pipeline, format } => {
            kaflow::cli::graph::run(pipeline, format, cli.verbose).await
        }
        Commands::Deploy(args) => {
            kaflow::cli::operation::run(Operation::Deploy, args, cli.verbose).await
        }
        Commands::Destroy(args) => {
            kaflow::cli::operation::run(Operation::Destroy, args, cli.verbose).await
        }
        Commands::Reset(args) => {
            kaflow::cli::operation::run(Operation::Reset, args, cli.verbose).await
        }
        Commands::Clean(args) => {
            kaflow::cli::operation::run(Operation::Clean, args, cli.verbose).await
        }
    }
}
