// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 kaflow contributors

//! Component and topic graph
//!
//! Components and the topics they read and write become nodes of one
//! directed graph: `topic -> component` for inputs and `component -> topic`
//! for outputs. A wired pipeline must be acyclic.

use petgraph::algo::{has_path_connecting, toposort};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use std::collections::HashMap;

use super::Pipeline;
use crate::errors::{KaflowError, KaflowResult};

/// A node of the pipeline graph
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum GraphNode {
    Component(String),
    Topic(String),
}

impl GraphNode {
    pub fn name(&self) -> &str {
        match self {
            Self::Component(name) | Self::Topic(name) => name,
        }
    }

    fn id(&self) -> String {
        match self {
            Self::Component(name) => format!("component:{}", name),
            Self::Topic(name) => format!("topic:{}", name),
        }
    }
}

/// Dataflow graph of a resolved pipeline
pub struct PipelineGraph {
    graph: DiGraph<GraphNode, ()>,
    index: HashMap<GraphNode, NodeIndex>,
    /// Components in pipeline order
    components: Vec<(String, String)>,
}

impl PipelineGraph {
    /// Build the graph from the inputs and outputs of every component
    pub fn new(pipeline: &Pipeline) -> Self {
        let mut graph = Self {
            graph: DiGraph::new(),
            index: HashMap::new(),
            components: Vec::new(),
        };

        for component in pipeline.components() {
            let node = graph.node(GraphNode::Component(component.name().to_string()));
            graph.components.push((
                component.name().to_string(),
                component.component_type().to_string(),
            ));

            for topic in component.inputs() {
                let topic = graph.node(GraphNode::Topic(topic));
                graph.edge(topic, node);
            }
            for topic in component.outputs() {
                let topic = graph.node(GraphNode::Topic(topic));
                graph.edge(node, topic);
            }
        }

        graph
    }

    fn node(&mut self, node: GraphNode) -> NodeIndex {
        if let Some(index) = self.index.get(&node) {
            return *index;
        }
        let index = self.graph.add_node(node.clone());
        self.index.insert(node, index);
        index
    }

    fn edge(&mut self, from: NodeIndex, to: NodeIndex) {
        if !self.graph.contains_edge(from, to) {
            self.graph.add_edge(from, to, ());
        }
    }

    /// Fail with the nodes of a cycle if there is one
    pub fn check_acyclic(&self) -> KaflowResult<()> {
        match toposort(&self.graph, None) {
            Ok(_) => Ok(()),
            Err(cycle) => Err(KaflowError::CircularDependency {
                nodes: self.cycle_members(cycle.node_id()),
            }),
        }
    }

    /// Nodes on a cycle through `start`, in edge order
    fn cycle_members(&self, start: NodeIndex) -> Vec<String> {
        let mut visited = vec![start];
        let mut current = start;

        while let Some(next) = self
            .graph
            .neighbors_directed(current, Direction::Outgoing)
            .find(|n| *n == start || has_path_connecting(&self.graph, *n, start, None))
        {
            if visited.contains(&next) {
                break;
            }
            visited.push(next);
            current = next;
        }

        visited
            .into_iter()
            .map(|n| self.graph[n].name().to_string())
            .collect()
    }

    /// Components reading a topic the given component writes
    pub fn downstream(&self, component: &str) -> Vec<String> {
        let Some(node) = self.index.get(&GraphNode::Component(component.to_string())) else {
            return vec![];
        };

        let mut names: Vec<String> = self
            .graph
            .neighbors_directed(*node, Direction::Outgoing)
            .flat_map(|topic| self.graph.neighbors_directed(topic, Direction::Outgoing))
            .map(|n| self.graph[n].name().to_string())
            .collect();
        names.sort();
        names.dedup();
        names
    }

    /// Topics no component in the pipeline writes
    pub fn external_topics(&self) -> Vec<String> {
        let mut topics: Vec<String> = self
            .graph
            .node_indices()
            .filter(|n| matches!(self.graph[*n], GraphNode::Topic(_)))
            .filter(|n| {
                self.graph
                    .neighbors_directed(*n, Direction::Incoming)
                    .next()
                    .is_none()
            })
            .map(|n| self.graph[n].name().to_string())
            .collect();
        topics.sort();
        topics
    }

    fn topics_of(&self, component: &str, direction: Direction) -> Vec<String> {
        let Some(node) = self.index.get(&GraphNode::Component(component.to_string())) else {
            return vec![];
        };
        let mut topics: Vec<String> = self
            .graph
            .neighbors_directed(*node, direction)
            .map(|n| self.graph[n].name().to_string())
            .collect();
        topics.sort();
        topics
    }

    /// Components in pipeline order with their topics
    pub fn to_text(&self) -> String {
        let mut out = String::new();

        for (i, (name, component_type)) in self.components.iter().enumerate() {
            out.push_str(&format!("{}. {} ({})\n", i + 1, name, component_type));
            for topic in self.topics_of(name, Direction::Incoming) {
                out.push_str(&format!("     <- {}\n", topic));
            }
            for topic in self.topics_of(name, Direction::Outgoing) {
                out.push_str(&format!("     -> {}\n", topic));
            }
        }

        out
    }

    /// Graphviz rendering
    pub fn to_dot(&self) -> String {
        let mut out = String::from("digraph pipeline {\n");
        out.push_str("    rankdir=LR;\n");

        for node in self.graph.node_indices() {
            let shape = match self.graph[node] {
                GraphNode::Component(_) => "box, style=rounded",
                GraphNode::Topic(_) => "ellipse",
            };
            out.push_str(&format!(
                "    \"{}\" [label=\"{}\", shape={}];\n",
                self.graph[node].id(),
                self.graph[node].name(),
                shape
            ));
        }

        for edge in self.graph.edge_references() {
            out.push_str(&format!(
                "    \"{}\" -> \"{}\";\n",
                self.graph[edge.source()].id(),
                self.graph[edge.target()].id()
            ));
        }

        out.push_str("}\n");
        out
    }

    /// Mermaid flowchart rendering
    pub fn to_mermaid(&self) -> String {
        let mut out = String::from("graph LR\n");
        let ids: HashMap<NodeIndex, String> = self
            .graph
            .node_indices()
            .map(|n| (n, format!("n{}", n.index())))
            .collect();

        for node in self.graph.node_indices() {
            let label = self.graph[node].name();
            match self.graph[node] {
                GraphNode::Component(_) => {
                    out.push_str(&format!("    {}[{}]\n", ids[&node], label))
                }
                GraphNode::Topic(_) => out.push_str(&format!("    {}([{}])\n", ids[&node], label)),
            }
        }

        for edge in self.graph.edge_references() {
            out.push_str(&format!(
                "    {} --> {}\n",
                ids[&edge.source()],
                ids[&edge.target()]
            ));
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::Component;
    use crate::registry::ComponentKind;
    use serde_json::json;

    fn streams_app(name: &str, input: &str, output: &str) -> Component {
        let mut component = Component::from_value(
            ComponentKind::StreamsApp,
            json!({
                "type": "streams-app",
                "name": name,
                "namespace": "ns",
                "from": {"topics": {input: {"type": "input"}}},
                "to": {"topics": {output: {"type": "output"}}}
            }),
        )
        .unwrap();
        let from = component.base().from.clone().unwrap();
        for (topic, config) in &from.topics {
            component.apply_from_topic(topic, config);
        }
        component.apply_to_section();
        component
    }

    fn pipeline(components: Vec<Component>) -> Pipeline {
        let mut pipeline = Pipeline::new("test");
        for component in components {
            pipeline.push(component);
        }
        pipeline
    }

    #[test]
    fn test_linear_pipeline_is_acyclic() {
        let graph = PipelineGraph::new(&pipeline(vec![
            streams_app("a", "raw", "clean"),
            streams_app("b", "clean", "enriched"),
        ]));

        assert!(graph.check_acyclic().is_ok());
        assert_eq!(graph.downstream("a"), vec!["b"]);
        assert_eq!(graph.external_topics(), vec!["raw"]);
    }

    #[test]
    fn test_cycle_is_detected() {
        let graph = PipelineGraph::new(&pipeline(vec![
            streams_app("a", "t2", "t1"),
            streams_app("b", "t1", "t2"),
        ]));

        let Err(KaflowError::CircularDependency { nodes }) = graph.check_acyclic() else {
            panic!("expected a cycle");
        };
        assert_eq!(nodes.len(), 4);
        assert!(nodes.contains(&"a".to_string()));
        assert!(nodes.contains(&"t2".to_string()));
    }

    #[test]
    fn test_text_rendering() {
        let graph = PipelineGraph::new(&pipeline(vec![streams_app("a", "in", "out")]));
        assert_eq!(graph.to_text(), "1. a (streams-app)\n     <- in\n     -> out\n");
    }

    #[test]
    fn test_dot_and_mermaid_rendering() {
        let graph = PipelineGraph::new(&pipeline(vec![streams_app("a", "in", "out")]));

        let dot = graph.to_dot();
        assert!(dot.starts_with("digraph pipeline {"));
        assert!(dot.contains("\"topic:in\" -> \"component:a\";"));

        let mermaid = graph.to_mermaid();
        assert!(mermaid.contains("graph LR"));
        assert!(mermaid.contains("[a]"));
        assert!(mermaid.contains("([out])"));
    }
}
