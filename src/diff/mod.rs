// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 kaflow contributors

//! Structural diff of nested values
//!
//! [`diff`] walks two trees in parallel and reports typed changes with
//! their path. Mapping keys are compared as a sorted union; sequences are
//! compared index by index without alignment. [`render_diff`] turns a diff
//! into a line-oriented YAML diff for humans.

mod lines;

pub use lines::line_diff;

use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::fmt;

use crate::helm::HelmTemplate;

/// One step of a change path
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    Key(String),
    Index(usize),
}

impl PathSegment {
    /// Whether an ignore-list segment selects this one
    fn matches(&self, ignored: &str) -> bool {
        match self {
            Self::Key(key) => key == ignored,
            Self::Index(index) => index.to_string() == ignored,
        }
    }
}

/// Kind of a change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Add,
    Change,
    Remove,
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Add => write!(f, "add"),
            Self::Change => write!(f, "change"),
            Self::Remove => write!(f, "remove"),
        }
    }
}

/// A difference at one path
#[derive(Debug, Clone, PartialEq)]
pub struct Change {
    pub path: Vec<PathSegment>,
    pub kind: ChangeKind,
    pub old: Option<Value>,
    pub new: Option<Value>,
}

impl Change {
    pub fn add(path: Vec<PathSegment>, new: Value) -> Self {
        Self {
            path,
            kind: ChangeKind::Add,
            old: None,
            new: Some(new),
        }
    }

    pub fn change(path: Vec<PathSegment>, old: Value, new: Value) -> Self {
        Self {
            path,
            kind: ChangeKind::Change,
            old: Some(old),
            new: Some(new),
        }
    }

    pub fn remove(path: Vec<PathSegment>, old: Value) -> Self {
        Self {
            path,
            kind: ChangeKind::Remove,
            old: Some(old),
            new: None,
        }
    }

    /// Dotted path with bracketed indices, e.g. `spec.containers[0].image`
    pub fn path_string(&self) -> String {
        format_path(&self.path)
    }
}

impl fmt::Display for Change {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind, self.path_string())
    }
}

pub fn format_path(path: &[PathSegment]) -> String {
    let mut out = String::new();
    for segment in path {
        match segment {
            PathSegment::Key(key) => {
                if !out.is_empty() {
                    out.push('.');
                }
                out.push_str(key);
            }
            PathSegment::Index(index) => out.push_str(&format!("[{}]", index)),
        }
    }
    out
}

fn is_ignored(path: &[PathSegment], ignore: &[Vec<String>]) -> bool {
    ignore.iter().any(|prefix| {
        !prefix.is_empty()
            && prefix.len() <= path.len()
            && prefix
                .iter()
                .zip(path)
                .all(|(ignored, segment)| segment.matches(ignored))
    })
}

/// Changes turning `before` into `after`
///
/// Paths starting with one of the `ignore` key paths are skipped.
pub fn diff(before: &Value, after: &Value, ignore: &[Vec<String>]) -> Vec<Change> {
    let mut changes = Vec::new();
    walk(&mut Vec::new(), before, after, ignore, &mut changes);
    changes
}

fn walk(
    path: &mut Vec<PathSegment>,
    before: &Value,
    after: &Value,
    ignore: &[Vec<String>],
    out: &mut Vec<Change>,
) {
    if is_ignored(path, ignore) {
        return;
    }

    match (before, after) {
        (Value::Object(old), Value::Object(new)) => {
            let keys: BTreeSet<&String> = old.keys().chain(new.keys()).collect();
            for key in keys {
                path.push(PathSegment::Key(key.clone()));
                if !is_ignored(path, ignore) {
                    match (old.get(key), new.get(key)) {
                        (Some(o), Some(n)) => walk(path, o, n, ignore, out),
                        (Some(o), None) => out.push(Change::remove(path.clone(), o.clone())),
                        (None, Some(n)) => out.push(Change::add(path.clone(), n.clone())),
                        (None, None) => {}
                    }
                }
                path.pop();
            }
        }
        (Value::Array(old), Value::Array(new)) => {
            for index in 0..old.len().max(new.len()) {
                path.push(PathSegment::Index(index));
                if !is_ignored(path, ignore) {
                    match (old.get(index), new.get(index)) {
                        (Some(o @ Value::Object(_)), Some(n @ Value::Object(_))) => {
                            walk(path, o, n, ignore, out)
                        }
                        (Some(o), Some(n)) if o != n => {
                            out.push(Change::change(path.clone(), o.clone(), n.clone()))
                        }
                        (Some(o), None) => out.push(Change::remove(path.clone(), o.clone())),
                        (None, Some(n)) => out.push(Change::add(path.clone(), n.clone())),
                        _ => {}
                    }
                }
                path.pop();
            }
        }
        (old, new) if old != new => out.push(Change::change(path.clone(), old.clone(), new.clone())),
        _ => {}
    }
}

/// Apply a change list to `before`
pub fn patch(before: &Value, changes: &[Change]) -> Value {
    let mut result = before.clone();

    for change in changes.iter().filter(|c| c.kind != ChangeKind::Remove) {
        if let Some(ref new) = change.new {
            set_at(&mut result, &change.path, new.clone());
        }
    }

    // Later sequence indices first so earlier removals keep them valid
    for change in changes.iter().rev().filter(|c| c.kind == ChangeKind::Remove) {
        remove_at(&mut result, &change.path);
    }

    result
}

fn set_at(target: &mut Value, path: &[PathSegment], value: Value) {
    let Some((head, rest)) = path.split_first() else {
        *target = value;
        return;
    };

    match head {
        PathSegment::Key(key) => {
            if !target.is_object() {
                *target = Value::Object(Map::new());
            }
            if let Value::Object(map) = target {
                let child = map.entry(key.clone()).or_insert(Value::Null);
                set_at(child, rest, value);
            }
        }
        PathSegment::Index(index) => {
            if !target.is_array() {
                *target = Value::Array(Vec::new());
            }
            if let Value::Array(items) = target {
                while items.len() <= *index {
                    items.push(Value::Null);
                }
                set_at(&mut items[*index], rest, value);
            }
        }
    }
}

fn remove_at(target: &mut Value, path: &[PathSegment]) {
    let Some((last, parents)) = path.split_last() else {
        *target = Value::Null;
        return;
    };

    let mut current = target;
    for segment in parents {
        let next = match (segment, current) {
            (PathSegment::Key(key), Value::Object(map)) => map.get_mut(key),
            (PathSegment::Index(index), Value::Array(items)) => items.get_mut(*index),
            _ => None,
        };
        match next {
            Some(value) => current = value,
            None => return,
        }
    }

    match (last, current) {
        (PathSegment::Key(key), Value::Object(map)) => {
            map.remove(key);
        }
        (PathSegment::Index(index), Value::Array(items)) if *index < items.len() => {
            items.remove(*index);
        }
        _ => {}
    }
}

/// YAML rendering used on both sides of a diff
///
/// Null and empty mappings render as empty text.
pub fn to_yaml(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Object(map) if map.is_empty() => String::new(),
        other => serde_yaml::to_string(other).unwrap_or_else(|_| other.to_string()),
    }
}

/// Human readable diff, `None` when nothing outside `ignore` differs
pub fn render_diff(before: &Value, after: &Value, ignore: &[Vec<String>]) -> Option<String> {
    let changes = diff(before, after, ignore);
    if changes.is_empty() {
        return None;
    }

    let patched = patch(before, &changes);
    Some(line_diff(&to_yaml(before), &to_yaml(&patched)))
}

/// Compare rendered manifests of a release, matched by template file
///
/// Changed pairs come first in the order of `new`, followed by templates
/// that disappeared.
pub fn diff_helm_templates(
    current: &[HelmTemplate],
    new: &[HelmTemplate],
    ignore: &[Vec<String>],
) -> Vec<Change> {
    let mut changes = Vec::new();

    for template in new {
        let path = vec![PathSegment::Key(template.filepath.clone())];
        match current.iter().find(|c| c.filepath == template.filepath) {
            Some(live) => {
                if !diff(&live.manifest, &template.manifest, ignore).is_empty() {
                    changes.push(Change::change(
                        path,
                        live.manifest.clone(),
                        template.manifest.clone(),
                    ));
                }
            }
            None => changes.push(Change::add(path, template.manifest.clone())),
        }
    }

    for live in current {
        if !new.iter().any(|t| t.filepath == live.filepath) {
            changes.push(Change::remove(
                vec![PathSegment::Key(live.filepath.clone())],
                live.manifest.clone(),
            ));
        }
    }

    changes
}

/// Render a document level change as a line diff
pub fn render_change(change: &Change, ignore: &[Vec<String>]) -> Option<String> {
    let old = change.old.clone().unwrap_or(Value::Null);
    let new = change.new.clone().unwrap_or(Value::Null);
    render_diff(&old, &new, ignore)
}
