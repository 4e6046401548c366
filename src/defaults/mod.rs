// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 kaflow contributors

//! Hierarchical component defaults
//!
//! Defaults files map a component type to default field values. A type
//! inherits the defaults of every ancestor in its chain; the most specific
//! definition of a key wins, and an environment file (`defaults_dev.yaml`)
//! wins over the base file (`defaults.yaml`) for the same type.
//!
//! All layers are folded with [`merge_missing`], so the accumulator always
//! keeps what it already has and only gains keys it is missing.

use serde_json::{Map, Value};
use std::cell::RefCell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::errors::{KaflowError, KaflowResult};

/// Merge `new` into `acc`, keeping every value `acc` already defines
///
/// Keys missing from `acc` are copied over. When both sides hold a mapping
/// for the same key the mappings are merged recursively. In every other
/// case `acc` wins, including an explicit `null`, which suppresses the
/// inherited value.
pub fn merge_missing(acc: Value, new: &Value) -> Value {
    match (acc, new) {
        (Value::Object(mut acc_map), Value::Object(new_map)) => {
            for (key, new_value) in new_map {
                match acc_map.remove(key) {
                    None => {
                        acc_map.insert(key.clone(), new_value.clone());
                    }
                    Some(existing @ Value::Object(_)) if new_value.is_object() => {
                        acc_map.insert(key.clone(), merge_missing(existing, new_value));
                    }
                    Some(existing) => {
                        acc_map.insert(key.clone(), existing);
                    }
                }
            }
            Value::Object(acc_map)
        }
        (acc, _) => acc,
    }
}

/// Resolves the default field values of a component type
///
/// Files are looked up in every defaults directory, most specific first,
/// and cached for the lifetime of the resolver.
#[derive(Debug)]
pub struct DefaultsResolver {
    dirs: Vec<PathBuf>,
    filename_prefix: String,
    environment: Option<String>,
    cache: RefCell<HashMap<PathBuf, Option<Map<String, Value>>>>,
}

impl DefaultsResolver {
    /// Create a resolver over `dirs`, ordered from most to least specific
    pub fn new(dirs: Vec<PathBuf>, filename_prefix: &str, environment: Option<&str>) -> Self {
        let mut unique: Vec<PathBuf> = Vec::new();
        for dir in dirs {
            if !unique.contains(&dir) {
                unique.push(dir);
            }
        }

        Self {
            dirs: unique,
            filename_prefix: filename_prefix.to_string(),
            environment: environment.map(str::to_string),
            cache: RefCell::new(HashMap::new()),
        }
    }

    /// Resolver that never yields defaults
    pub fn empty() -> Self {
        Self::new(vec![], "defaults", None)
    }

    /// Defaults directories in lookup order
    pub fn dirs(&self) -> &[PathBuf] {
        &self.dirs
    }

    /// Files to consult for one directory, overlay first
    fn files_in(&self, dir: &Path) -> Vec<PathBuf> {
        let mut files = Vec::with_capacity(2);
        if let Some(ref env) = self.environment {
            files.push(dir.join(format!("{}_{}.yaml", self.filename_prefix, env)));
        }
        files.push(dir.join(format!("{}.yaml", self.filename_prefix)));
        files
    }

    /// Merged defaults for a type, given its ancestor chain
    ///
    /// `ancestors` starts with the type itself and runs from most to least
    /// specific. Layers are applied type-major: every file of the type
    /// itself, then every file of its parent, and so on.
    pub fn defaults_for(&self, ancestors: &[String]) -> KaflowResult<Map<String, Value>> {
        let mut merged = Value::Object(Map::new());

        for component_type in ancestors {
            for dir in &self.dirs {
                for file in self.files_in(dir) {
                    if let Some(values) = self.type_defaults(&file, component_type)? {
                        merged = merge_missing(merged, &Value::Object(values));
                    }
                }
            }
        }

        match merged {
            Value::Object(map) => Ok(map),
            _ => Ok(Map::new()),
        }
    }

    /// Defaults for a single type key in a single file
    fn type_defaults(
        &self,
        file: &Path,
        component_type: &str,
    ) -> KaflowResult<Option<Map<String, Value>>> {
        let Some(document) = self.load_file(file)? else {
            return Ok(None);
        };

        match document.get(component_type) {
            Some(Value::Object(values)) => Ok(Some(values.clone())),
            Some(Value::Null) | None => Ok(None),
            Some(_) => {
                tracing::warn!(
                    "Defaults for '{}' in {} are not a mapping, ignoring",
                    component_type,
                    file.display()
                );
                Ok(None)
            }
        }
    }

    fn load_file(&self, file: &Path) -> KaflowResult<Option<Map<String, Value>>> {
        if let Some(cached) = self.cache.borrow().get(file) {
            return Ok(cached.clone());
        }

        let loaded = load_defaults_file(file)?;
        self.cache
            .borrow_mut()
            .insert(file.to_path_buf(), loaded.clone());
        Ok(loaded)
    }
}

/// Read a defaults file
///
/// A missing file or a document that is not a mapping yields `None`;
/// malformed YAML is an error.
pub fn load_defaults_file(path: &Path) -> KaflowResult<Option<Map<String, Value>>> {
    if !path.is_file() {
        tracing::debug!("No defaults file at {}", path.display());
        return Ok(None);
    }

    let content = std::fs::read_to_string(path).map_err(|e| KaflowError::FileReadError {
        path: path.to_path_buf(),
        error: e.to_string(),
    })?;

    let document: Value =
        serde_yaml::from_str(&content).map_err(|e| KaflowError::DefaultsParse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

    match document {
        Value::Object(map) => Ok(Some(map)),
        Value::Null => Ok(None),
        _ => {
            tracing::warn!(
                "Defaults file {} is not a mapping, ignoring it",
                path.display()
            );
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn chain(types: &[&str]) -> Vec<String> {
        types.iter().map(|t| t.to_string()).collect()
    }

    #[test]
    fn test_merge_missing_keeps_accumulator() {
        let acc = json!({"a": 1, "nested": {"x": 1}});
        let new = json!({"a": 2, "b": 3, "nested": {"x": 2, "y": 2}});

        let merged = merge_missing(acc, &new);
        assert_eq!(merged, json!({"a": 1, "b": 3, "nested": {"x": 1, "y": 2}}));
    }

    #[test]
    fn test_merge_missing_null_suppresses_inheritance() {
        let acc = json!({"resources": null});
        let new = json!({"resources": {"limits": {"cpu": "1"}}});

        assert_eq!(merge_missing(acc, &new), json!({"resources": null}));
    }

    #[test]
    fn test_merge_missing_scalar_beats_mapping() {
        let acc = json!({"value": "explicit"});
        let new = json!({"value": {"nested": true}});

        assert_eq!(merge_missing(acc, &new), json!({"value": "explicit"}));
    }

    #[test]
    fn test_child_defaults_win_over_environment_parent() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("defaults.yaml"),
            "parent-type:\n  value: 1.0\nchild-type:\n  value: 2.0\n  nice:\n    k: v\n",
        )
        .unwrap();
        std::fs::write(
            dir.path().join("defaults_development.yaml"),
            "parent-type:\n  value: 9.0\n",
        )
        .unwrap();

        let resolver = DefaultsResolver::new(
            vec![dir.path().to_path_buf()],
            "defaults",
            Some("development"),
        );

        let child = resolver
            .defaults_for(&chain(&["child-type", "parent-type"]))
            .unwrap();
        assert_eq!(child.get("value"), Some(&json!(2.0)));
        assert_eq!(child.get("nice"), Some(&json!({"k": "v"})));

        let parent = resolver.defaults_for(&chain(&["parent-type"])).unwrap();
        assert_eq!(parent.get("value"), Some(&json!(9.0)));
    }

    #[test]
    fn test_parent_fills_missing_keys() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("defaults.yaml"),
            "parent-type:\n  namespace: ns\n  app:\n    replicas: 1\n    image: base\nchild-type:\n  app:\n    image: child\n",
        )
        .unwrap();

        let resolver = DefaultsResolver::new(vec![dir.path().to_path_buf()], "defaults", None);
        let defaults = resolver
            .defaults_for(&chain(&["child-type", "parent-type"]))
            .unwrap();

        assert_eq!(
            Value::Object(defaults),
            json!({"namespace": "ns", "app": {"replicas": 1, "image": "child"}})
        );
    }

    #[test]
    fn test_closer_directory_wins() {
        let outer = tempfile::tempdir().unwrap();
        let inner = outer.path().join("pipeline");
        std::fs::create_dir(&inner).unwrap();
        std::fs::write(outer.path().join("defaults.yaml"), "t:\n  a: outer\n  b: outer\n").unwrap();
        std::fs::write(inner.join("defaults.yaml"), "t:\n  a: inner\n").unwrap();

        let resolver = DefaultsResolver::new(
            vec![inner.clone(), outer.path().to_path_buf()],
            "defaults",
            None,
        );
        let defaults = resolver.defaults_for(&chain(&["t"])).unwrap();

        assert_eq!(Value::Object(defaults), json!({"a": "inner", "b": "outer"}));
    }

    #[test]
    fn test_missing_and_non_mapping_files_yield_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let resolver = DefaultsResolver::new(vec![dir.path().to_path_buf()], "defaults", Some("dev"));
        assert!(resolver.defaults_for(&chain(&["t"])).unwrap().is_empty());

        std::fs::write(dir.path().join("defaults.yaml"), "- just\n- a list\n").unwrap();
        let resolver = DefaultsResolver::new(vec![dir.path().to_path_buf()], "defaults", None);
        assert!(resolver.defaults_for(&chain(&["t"])).unwrap().is_empty());
    }

    #[test]
    fn test_malformed_yaml_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("defaults.yaml"), "t: [unclosed\n").unwrap();

        let resolver = DefaultsResolver::new(vec![dir.path().to_path_buf()], "defaults", None);
        let err = resolver.defaults_for(&chain(&["t"])).unwrap_err();
        assert!(matches!(err, KaflowError::DefaultsParse { .. }));
    }
}
