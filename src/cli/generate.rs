// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 kaflow contributors

//! Generate command - print the resolved pipeline

use colored::Colorize;
use miette::Result;

use super::{PipelineArgs, Session};

/// Run the generate command
pub async fn run(args: PipelineArgs, verbose: bool) -> Result<()> {
    let session = Session::load(&args)?;

    for (i, pipeline) in session.pipelines.iter().enumerate() {
        if i > 0 {
            println!("---");
        }
        if verbose {
            eprintln!(
                "{} {} ({} components)",
                "Pipeline".bold(),
                pipeline.name,
                pipeline.len()
            );
        }
        print!("{}", pipeline.to_yaml()?);
    }

    Ok(())
}
