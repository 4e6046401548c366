// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 kaflow contributors

//! Parsing of rendered helm manifests

use serde_json::Value;

use crate::errors::{KaflowError, KaflowResult};

const SOURCE_MARKER: &str = "# Source:";

/// One rendered Kubernetes resource
#[derive(Debug, Clone, PartialEq)]
pub struct HelmTemplate {
    /// Chart file the resource was rendered from
    pub filepath: String,
    pub manifest: Value,
}

/// Split a multi-document manifest into [`HelmTemplate`]s
///
/// Documents are separated by `---` lines. Every non-blank document must
/// carry a `# Source: <path>` comment.
pub fn parse_manifest(text: &str) -> KaflowResult<Vec<HelmTemplate>> {
    let mut templates = Vec::new();

    for document in split_documents(text) {
        let source = document
            .lines()
            .find_map(|line| line.trim().strip_prefix(SOURCE_MARKER))
            .map(|path| path.trim().to_string());

        let manifest: Value =
            serde_yaml::from_str(&document).map_err(|e| KaflowError::ManifestParse {
                reason: e.to_string(),
            })?;

        if manifest.is_null() {
            continue;
        }

        let Some(filepath) = source else {
            return Err(KaflowError::ManifestParse {
                reason: format!("document without '{}' comment", SOURCE_MARKER),
            });
        };

        templates.push(HelmTemplate { filepath, manifest });
    }

    Ok(templates)
}

fn split_documents(text: &str) -> Vec<String> {
    let mut documents = Vec::new();
    let mut current = String::new();

    for line in text.lines() {
        if line.trim_end() == "---" {
            documents.push(std::mem::take(&mut current));
            continue;
        }
        current.push_str(line);
        current.push('\n');
    }
    documents.push(current);

    documents
        .into_iter()
        .filter(|doc| {
            doc.lines()
                .any(|l| !l.trim().is_empty() && !l.trim_start().starts_with('#'))
        })
        .collect()
}
