// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 kaflow contributors

//! Pipeline files on disk
//!
//! A pipeline is a `pipeline.yaml` holding a sequence of component
//! mappings. A sibling `pipeline_<env>.yaml` holds per-environment
//! overrides in the same shape, matched to components by name.

use serde_json::Value;
use std::path::{Path, PathBuf};

use crate::errors::{KaflowError, KaflowResult};

/// File name of a pipeline definition
pub const PIPELINE_FILE: &str = "pipeline.yaml";

/// Raw, unresolved content of one pipeline file
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PipelineDefinition {
    pub path: PathBuf,
    pub components: Vec<Value>,
    pub overrides: Vec<Value>,
}

impl PipelineDefinition {
    /// Load a pipeline file and its environment overrides
    pub fn load(path: &Path, environment: Option<&str>) -> KaflowResult<Self> {
        if !path.is_file() {
            return Err(KaflowError::PipelineNotFound {
                path: path.to_path_buf(),
            });
        }

        let components = read_component_list(path)?;
        let overrides = match environment {
            Some(env) => {
                let overrides_path = environment_file(path, env);
                if overrides_path.is_file() {
                    tracing::debug!("Loading overrides from {}", overrides_path.display());
                    read_component_list(&overrides_path)?
                } else {
                    vec![]
                }
            }
            None => vec![],
        };

        Ok(Self {
            path: path.to_path_buf(),
            components,
            overrides,
        })
    }

    /// Parse a definition from YAML text, without overrides
    pub fn from_yaml(yaml: &str) -> KaflowResult<Self> {
        Ok(Self {
            path: PathBuf::from(PIPELINE_FILE),
            components: parse_component_list(yaml)?,
            overrides: vec![],
        })
    }

    /// Directory holding the pipeline file
    pub fn dir(&self) -> &Path {
        self.path.parent().unwrap_or_else(|| Path::new("."))
    }
}

/// `pipeline.yaml` -> `pipeline_<env>.yaml`
fn environment_file(path: &Path, environment: &str) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "pipeline".to_string());
    path.with_file_name(format!("{}_{}.yaml", stem, environment))
}

fn read_component_list(path: &Path) -> KaflowResult<Vec<Value>> {
    let content = std::fs::read_to_string(path).map_err(|e| KaflowError::FileReadError {
        path: path.to_path_buf(),
        error: e.to_string(),
    })?;

    parse_component_list(&content).map_err(|e| match e {
        KaflowError::PipelineParse { reason, help } => KaflowError::PipelineParse {
            reason: format!("{}: {}", path.display(), reason),
            help,
        },
        other => other,
    })
}

fn parse_component_list(yaml: &str) -> KaflowResult<Vec<Value>> {
    let document: Value = serde_yaml::from_str(yaml).map_err(|e| KaflowError::PipelineParse {
        reason: e.to_string(),
        help: None,
    })?;

    let items = match document {
        Value::Null => return Ok(vec![]),
        Value::Array(items) => items,
        _ => {
            return Err(KaflowError::PipelineParse {
                reason: "expected a list of components".into(),
                help: Some("A pipeline file is a YAML sequence of component mappings".into()),
            })
        }
    };

    for (i, item) in items.iter().enumerate() {
        if !item.is_object() {
            return Err(KaflowError::PipelineParse {
                reason: format!("entry {} is not a mapping", i),
                help: None,
            });
        }
    }

    Ok(items)
}

/// Pipeline files at `path`
///
/// A file is returned as is. A directory is searched recursively for
/// `pipeline.yaml` files, in sorted order.
pub fn find_pipelines(path: &Path) -> KaflowResult<Vec<PathBuf>> {
    if path.is_file() {
        return Ok(vec![path.to_path_buf()]);
    }
    if !path.is_dir() {
        return Err(KaflowError::PipelineNotFound {
            path: path.to_path_buf(),
        });
    }

    let pattern = path.join("**").join(PIPELINE_FILE);
    let mut found: Vec<PathBuf> = glob::glob(&pattern.to_string_lossy())?
        .filter_map(Result::ok)
        .collect();
    found.sort();

    if found.is_empty() {
        return Err(KaflowError::PipelineNotFound {
            path: path.to_path_buf(),
        });
    }
    Ok(found)
}

/// Defaults directories for a pipeline, most specific first
///
/// The pipeline's own directory and each ancestor up to `base_dir`, then
/// `defaults_path`.
pub fn defaults_dirs(pipeline_path: &Path, base_dir: &Path, defaults_path: &Path) -> Vec<PathBuf> {
    let mut dirs = Vec::new();
    let mut current = pipeline_path.parent();

    while let Some(dir) = current {
        if dir.as_os_str().is_empty() {
            dirs.push(PathBuf::from("."));
            break;
        }
        dirs.push(dir.to_path_buf());
        if dir == base_dir || !dir.starts_with(base_dir) {
            break;
        }
        current = dir.parent();
    }

    if !dirs.iter().any(|d| d == defaults_path) {
        dirs.push(defaults_path.to_path_buf());
    }
    dirs
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_load_with_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(PIPELINE_FILE);
        std::fs::write(&path, "- type: helm-app\n  name: app\n").unwrap();
        std::fs::write(
            dir.path().join("pipeline_dev.yaml"),
            "- name: app\n  namespace: dev\n",
        )
        .unwrap();

        let definition = PipelineDefinition::load(&path, Some("dev")).unwrap();
        assert_eq!(definition.components, vec![json!({"type": "helm-app", "name": "app"})]);
        assert_eq!(definition.overrides, vec![json!({"name": "app", "namespace": "dev"})]);

        let without_env = PipelineDefinition::load(&path, None).unwrap();
        assert!(without_env.overrides.is_empty());
    }

    #[test]
    fn test_missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let result = PipelineDefinition::load(&dir.path().join(PIPELINE_FILE), None);
        assert!(matches!(result, Err(KaflowError::PipelineNotFound { .. })));
    }

    #[test]
    fn test_non_sequence_is_rejected() {
        let result = PipelineDefinition::from_yaml("type: helm-app\n");
        assert!(matches!(result, Err(KaflowError::PipelineParse { .. })));

        let result = PipelineDefinition::from_yaml("- just a string\n");
        assert!(matches!(result, Err(KaflowError::PipelineParse { .. })));
    }

    #[test]
    fn test_empty_file_has_no_components() {
        assert!(PipelineDefinition::from_yaml("").unwrap().components.is_empty());
    }

    #[test]
    fn test_find_pipelines_in_directory() {
        let dir = tempfile::tempdir().unwrap();
        for sub in ["b", "a/nested"] {
            let path = dir.path().join(sub);
            std::fs::create_dir_all(&path).unwrap();
            std::fs::write(path.join(PIPELINE_FILE), "[]").unwrap();
        }

        let found = find_pipelines(dir.path()).unwrap();
        assert_eq!(
            found,
            vec![
                dir.path().join("a/nested").join(PIPELINE_FILE),
                dir.path().join("b").join(PIPELINE_FILE),
            ]
        );
    }

    #[test]
    fn test_defaults_dirs_walk_up_to_base() {
        let dirs = defaults_dirs(
            Path::new("pipelines/data/orders/pipeline.yaml"),
            Path::new("pipelines"),
            Path::new("defaults"),
        );

        assert_eq!(
            dirs,
            vec![
                PathBuf::from("pipelines/data/orders"),
                PathBuf::from("pipelines/data"),
                PathBuf::from("pipelines"),
                PathBuf::from("defaults"),
            ]
        );
    }
}
