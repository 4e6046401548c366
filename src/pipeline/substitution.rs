// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 kaflow contributors

//! `${...}` placeholder substitution
//!
//! Variables come from an explicit [`SubstitutionContext`] that the caller
//! builds from the pipeline name, the configuration and whatever process
//! environment it chooses to hand in. Unknown placeholders are left as they
//! are.

use regex::Regex;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::LazyLock;

static PLACEHOLDER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_.\-]*)\}").expect("valid placeholder regex")
});

/// Nested placeholders are resolved up to this depth
const MAX_PASSES: usize = 8;

/// Template variables available to `${...}` placeholders
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubstitutionContext {
    vars: BTreeMap<String, String>,
}

impl SubstitutionContext {
    /// Empty context
    pub fn new() -> Self {
        Self::default()
    }

    /// Add every `(name, value)` pair, e.g. the process environment
    pub fn with_vars<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        for (key, value) in vars {
            self.vars.insert(key.into(), value.into());
        }
        self
    }

    /// Set a single variable
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.vars.insert(key.into(), value.into());
    }

    /// Value of a variable
    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    /// Set `pipeline_name` and the numbered `pipeline_name_<i>` parts
    pub fn set_pipeline_name(&mut self, name: &str) {
        self.set("pipeline_name", name);
        for (i, part) in name.split('-').enumerate() {
            self.set(format!("pipeline_name_{}", i), part);
        }
    }

    /// Substitute placeholders in a string
    pub fn substitute(&self, input: &str) -> String {
        let mut current = input.to_string();

        for _ in 0..MAX_PASSES {
            if !current.contains("${") {
                break;
            }

            let next = PLACEHOLDER_RE
                .replace_all(&current, |caps: &regex::Captures<'_>| {
                    match self.vars.get(&caps[1]) {
                        Some(value) => value.clone(),
                        None => caps[0].to_string(),
                    }
                })
                .into_owned();

            if next == current {
                break;
            }
            current = next;
        }

        current
    }

    /// Substitute placeholders in every string and mapping key of a tree
    pub fn substitute_value(&self, value: &Value) -> Value {
        match value {
            Value::String(s) => Value::String(self.substitute(s)),
            Value::Array(items) => {
                Value::Array(items.iter().map(|item| self.substitute_value(item)).collect())
            }
            Value::Object(map) => {
                let mut out = Map::new();
                for (key, inner) in map {
                    out.insert(self.substitute(key), self.substitute_value(inner));
                }
                Value::Object(out)
            }
            other => other.clone(),
        }
    }
}

/// Derive a pipeline name from its file location
///
/// The directories between `base_dir` and the pipeline file are joined with
/// `-`. A pipeline file directly inside `base_dir` is named after
/// `base_dir` itself.
pub fn pipeline_name_from_path(base_dir: &Path, pipeline_path: &Path) -> String {
    let parent = pipeline_path.parent().unwrap_or_else(|| Path::new(""));

    let relative = parent.strip_prefix(base_dir).unwrap_or(parent);
    let mut parts: Vec<String> = relative
        .components()
        .filter_map(|c| match c {
            std::path::Component::Normal(part) => Some(part.to_string_lossy().to_string()),
            _ => None,
        })
        .collect();

    if parts.is_empty() {
        let fallback = base_dir
            .canonicalize()
            .ok()
            .and_then(|p| p.file_name().map(|n| n.to_string_lossy().to_string()))
            .or_else(|| parent.file_name().map(|n| n.to_string_lossy().to_string()));
        if let Some(name) = fallback {
            parts.push(name);
        }
    }

    parts.join("-")
}
