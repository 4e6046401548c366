// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 kaflow contributors

//! Validate command - check pipeline configuration

use colored::Colorize;
use miette::Result;

use super::{PipelineArgs, Session};
use crate::pipeline::PipelineValidator;

/// Run the validate command
pub async fn run(args: PipelineArgs, verbose: bool) -> Result<()> {
    println!("{}", "Validating pipeline...".bold());
    println!();

    let session = match Session::load(&args) {
        Ok(session) => session,
        Err(e) => {
            eprintln!("  {} Failed to resolve pipeline", "✗".red());
            eprintln!();
            return Err(e.into());
        }
    };

    let mut has_errors = false;
    let mut has_warnings = false;

    for pipeline in &session.pipelines {
        println!("  {} Pipeline '{}' resolves", "✓".green(), pipeline.name);
        let validation = PipelineValidator::validate(pipeline);

        if !validation.is_valid() {
            has_errors = true;
            println!();
            println!("{}:", "Errors".red().bold());
            for error in &validation.errors {
                println!("  {} {}", "✗".red(), error);
            }
        }

        if validation.has_warnings() {
            has_warnings = true;
            println!();
            println!("{}:", "Warnings".yellow().bold());
            for warning in &validation.warnings {
                println!("  {} {}", "⚠".yellow(), warning);
            }
        }

        if verbose {
            println!();
            println!("{}:", "Pipeline summary".bold());
            println!("  Name: {}", pipeline.name);
            println!("  Components: {}", pipeline.len());
            for component in pipeline.components() {
                let inputs = component.inputs();
                let from = if inputs.is_empty() {
                    String::new()
                } else {
                    format!(" [from: {}]", inputs.join(", "))
                };
                println!(
                    "    - {} ({}){}",
                    component.name(),
                    component.component_type(),
                    from.dimmed()
                );
            }
        }
    }

    println!();

    if has_errors {
        Err(miette::miette!("Pipeline validation failed"))
    } else if has_warnings {
        println!("{}", "Pipeline is valid but has warnings.".yellow().bold());
        Ok(())
    } else {
        println!("{}", "Pipeline is valid!".green().bold());
        Ok(())
    }
}
