// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 kaflow contributors

//! Error types
//!
//! Every fatal condition of a pipeline run is a `KaflowError`. Not-found and
//! conflict variants are recoverable and are handled inside the handlers
//! that produce them.

use miette::Diagnostic;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for kaflow operations
pub type KaflowResult<T> = Result<T, KaflowError>;

/// Main error type for kaflow
#[derive(Error, Debug, Diagnostic)]
pub enum KaflowError {
    // ─────────────────────────────────────────────────────────────────────────
    // Parse Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("Pipeline file not found: {path}")]
    #[diagnostic(
        code(kaflow::pipeline_not_found),
        help("Pass the path of a pipeline.yaml file or of a directory containing one")
    )]
    PipelineNotFound { path: PathBuf },

    #[error("Invalid pipeline definition: {reason}")]
    #[diagnostic(code(kaflow::pipeline_parse))]
    PipelineParse {
        reason: String,
        #[help]
        help: Option<String>,
    },

    #[error("Component type '{component_type}' is not registered")]
    #[diagnostic(
        code(kaflow::class_not_found),
        help("Built-in types: helm-app, streams-app, producer-app, kafka-sink-connector, kafka-source-connector")
    )]
    ClassNotFound { component_type: String },

    #[error("Component type '{component_type}' is abstract and cannot be instantiated")]
    #[diagnostic(code(kaflow::abstract_type))]
    AbstractType { component_type: String },

    #[error("Error enriching {} component {}", .component_type.as_deref().unwrap_or("unknown"), .component_name.as_deref().unwrap_or("<unnamed>"))]
    #[diagnostic(code(kaflow::component_parse))]
    ComponentParse {
        component_type: Option<String>,
        component_name: Option<String>,
        #[source]
        source: Box<KaflowError>,
    },

    #[error("Invalid defaults file '{path}': {message}")]
    #[diagnostic(code(kaflow::defaults_parse))]
    DefaultsParse { path: PathBuf, message: String },

    // ─────────────────────────────────────────────────────────────────────────
    // Validation Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("Validation failed: {reason}")]
    #[diagnostic(code(kaflow::validation))]
    Validation { reason: String },

    #[error("Component name '{name}' is invalid")]
    #[diagnostic(
        code(kaflow::invalid_component_name),
        help("Names may only contain lowercase alphanumerics, '-' and '.'")
    )]
    InvalidComponentName { name: String },

    #[error("Duplicate component name '{name}'")]
    #[diagnostic(
        code(kaflow::duplicate_component),
        help("Component names must be unique within a pipeline after prefixing")
    )]
    DuplicateComponent { name: String },

    #[error("Component '{component}' references unknown component '{reference}'")]
    #[diagnostic(code(kaflow::unknown_component))]
    UnknownComponent { component: String, reference: String },

    #[error("Circular dependency detected")]
    #[diagnostic(
        code(kaflow::circular_dependency),
        help("Review the from/to sections of your components to remove the cycle")
    )]
    CircularDependency { nodes: Vec<String> },

    #[error("Invalid configuration: {reason}")]
    #[diagnostic(code(kaflow::config))]
    Config { reason: String },

    // ─────────────────────────────────────────────────────────────────────────
    // Reconciliation Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("{resource} '{name}' not found")]
    #[diagnostic(code(kaflow::not_found))]
    NotFound { resource: &'static str, name: String },

    #[error("{resource} '{name}' is rebalancing")]
    #[diagnostic(code(kaflow::conflict))]
    Conflict { resource: &'static str, name: String },

    #[error("Topic '{topic}': {field} cannot be changed from {live} to {desired}")]
    #[diagnostic(
        code(kaflow::immutable_field),
        help("Partition count and replication factor of an existing topic cannot be altered")
    )]
    ImmutableField {
        topic: String,
        field: &'static str,
        live: u32,
        desired: u32,
    },

    // ─────────────────────────────────────────────────────────────────────────
    // External Tool Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("Failed to {operation} component '{component}'")]
    #[diagnostic(code(kaflow::operation_failed))]
    OperationFailed {
        operation: String,
        component: String,
        #[source]
        source: Box<KaflowError>,
    },

    #[error("Tool '{tool}' not found")]
    #[diagnostic(code(kaflow::tool_not_found), help("{suggestion}"))]
    ToolNotFound { tool: String, suggestion: String },

    #[error("{tool} failed: {stderr}")]
    #[diagnostic(code(kaflow::external_tool))]
    ExternalTool { tool: String, stderr: String },

    #[error("Could not parse helm manifest: {reason}")]
    #[diagnostic(code(kaflow::manifest_parse))]
    ManifestParse { reason: String },

    #[error("{service} responded with HTTP {status}: {body}")]
    #[diagnostic(code(kaflow::transport))]
    Transport {
        service: &'static str,
        status: u16,
        body: String,
    },

    #[error("HTTP request failed: {message}")]
    #[diagnostic(code(kaflow::http))]
    Http { message: String },

    // ─────────────────────────────────────────────────────────────────────────
    // IO/System Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("Failed to read file '{path}': {error}")]
    #[diagnostic(code(kaflow::file_read_error))]
    FileReadError { path: PathBuf, error: String },

    #[error("IO error: {message}")]
    #[diagnostic(code(kaflow::io_error))]
    Io { message: String },

    #[error("YAML parsing error: {message}")]
    #[diagnostic(code(kaflow::yaml_error))]
    Yaml { message: String },

    #[error("JSON error: {message}")]
    #[diagnostic(code(kaflow::json_error))]
    Json { message: String },

    #[error("Glob pattern error: {message}")]
    #[diagnostic(code(kaflow::glob_error))]
    GlobPattern { message: String },
}

impl From<std::io::Error> for KaflowError {
    fn from(e: std::io::Error) -> Self {
        Self::Io { message: e.to_string() }
    }
}

impl From<serde_yaml::Error> for KaflowError {
    fn from(e: serde_yaml::Error) -> Self {
        Self::Yaml { message: e.to_string() }
    }
}

impl From<serde_json::Error> for KaflowError {
    fn from(e: serde_json::Error) -> Self {
        Self::Json { message: e.to_string() }
    }
}

impl From<reqwest::Error> for KaflowError {
    fn from(e: reqwest::Error) -> Self {
        Self::Http { message: e.to_string() }
    }
}

impl From<glob::PatternError> for KaflowError {
    fn from(e: glob::PatternError) -> Self {
        Self::GlobPattern { message: e.to_string() }
    }
}

impl KaflowError {
    /// Create a tool not found error with installation suggestion
    pub fn tool_not_found(tool: &str) -> Self {
        let suggestion = match tool {
            "helm" => "Install Helm: https://helm.sh/docs/intro/install/".to_string(),
            _ => format!("Install {} and ensure it's in your PATH", tool),
        };

        Self::ToolNotFound {
            tool: tool.to_string(),
            suggestion,
        }
    }

    /// Shorthand for a validation error
    pub fn validation(reason: impl Into<String>) -> Self {
        Self::Validation {
            reason: reason.into(),
        }
    }

    /// Wrap an error raised while building a component
    pub fn in_component(
        self,
        component_type: Option<&str>,
        component_name: Option<&str>,
    ) -> Self {
        // Keep the innermost component context
        if matches!(self, Self::ComponentParse { .. }) {
            return self;
        }

        Self::ComponentParse {
            component_type: component_type.map(str::to_string),
            component_name: component_name.map(str::to_string),
            source: Box::new(self),
        }
    }

    /// Whether this error reports a missing remote resource
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Whether this error reports a 409 rebalancing conflict
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_component_parse_names_component() {
        let err = KaflowError::validation("bad topic")
            .in_component(Some("streams-app"), Some("orders-app"));

        let message = err.to_string();
        assert!(message.contains("streams-app"));
        assert!(message.contains("orders-app"));
    }

    #[test]
    fn test_component_parse_keeps_innermost_context() {
        let err = KaflowError::validation("bad topic")
            .in_component(Some("streams-app"), Some("inner"))
            .in_component(Some("streams-app"), None);

        assert!(err.to_string().contains("inner"));
    }

    #[test]
    fn test_tool_not_found_helm_suggestion() {
        match KaflowError::tool_not_found("helm") {
            KaflowError::ToolNotFound { suggestion, .. } => {
                assert!(suggestion.contains("helm.sh"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
