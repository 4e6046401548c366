// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 kaflow contributors

//! Deploy, destroy, reset and clean commands

use colored::Colorize;
use miette::Result;

use super::{OperationArgs, Session};
use crate::handlers::{Handlers, Outcome, Report};
use crate::pipeline::{Operation, PipelineRunner, RunOptions, RunSummary};
use crate::utils::colorize_diff;

/// Run one operation over every pipeline named by `args`
pub async fn run(operation: Operation, args: OperationArgs, verbose: bool) -> Result<()> {
    let session = Session::load(&args.pipeline)?;
    let handlers = Handlers::from_config(session.config.clone())?;
    let runner = PipelineRunner::new(&handlers);

    let options = RunOptions {
        dry_run: !args.execute,
        steps: args.steps,
        filter: args.filter_type,
    };

    let mut incomplete = 0;
    for pipeline in &session.pipelines {
        println!(
            "{} {} {}",
            format!("{}", operation).to_uppercase().bold(),
            pipeline.name.cyan(),
            if options.dry_run {
                "(dry run)".dimmed().to_string()
            } else {
                String::new()
            }
        );
        println!();

        let summary = runner.run(pipeline, operation, &options).await?;
        print_summary(&summary, verbose);
        incomplete += summary.incomplete().len();
    }

    if incomplete > 0 {
        println!(
            "{} {} resource(s) did not finish; rerun the command to retry",
            "⚠".yellow(),
            incomplete
        );
    }
    if options.dry_run {
        println!(
            "{}",
            "Dry run: nothing was changed. Pass --execute to apply.".dimmed()
        );
    }

    Ok(())
}

fn print_summary(summary: &RunSummary, verbose: bool) {
    for run in &summary.components {
        println!("  {} ({})", run.component.bold(), run.component_type.dimmed());
        for report in &run.reports {
            print_report(report, verbose);
        }
    }

    println!();
    println!(
        "{} component(s) in {:.2}s",
        summary.components.len(),
        summary.duration.as_secs_f64()
    );
}

fn print_report(report: &Report, verbose: bool) {
    let outcome = report.outcome.to_string();
    let styled = match report.outcome {
        Outcome::Created | Outcome::Updated | Outcome::Applied | Outcome::Deleted => {
            format!("{} {}", "✓".green(), outcome.green())
        }
        Outcome::Planned => format!("{} {}", "→".blue(), outcome.blue()),
        Outcome::Unchanged | Outcome::Skipped => format!("{} {}", "○".dimmed(), outcome.dimmed()),
        Outcome::Incomplete => format!("{} {}", "⚠".yellow(), outcome.yellow()),
    };
    println!("    {} {}", styled, report.resource);

    if let Some(ref diff) = report.diff {
        if verbose || report.outcome == Outcome::Planned {
            for line in colorize_diff(diff).lines() {
                println!("        {}", line);
            }
        }
    }
}
