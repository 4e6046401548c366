// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 kaflow contributors

//! Graph command - visualize pipeline as a graph

use miette::Result;

use super::{GraphFormat, PipelineArgs, Session};
use crate::pipeline::PipelineGraph;

/// Run the graph command
pub async fn run(args: PipelineArgs, format: GraphFormat, _verbose: bool) -> Result<()> {
    let session = Session::load(&args)?;

    for pipeline in &session.pipelines {
        let graph = PipelineGraph::new(pipeline);
        let output = match format {
            GraphFormat::Text => graph.to_text(),
            GraphFormat::Dot => graph.to_dot(),
            GraphFormat::Mermaid => graph.to_mermaid(),
        };
        println!("{}", output);
    }

    Ok(())
}
