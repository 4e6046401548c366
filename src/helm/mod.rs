// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 kaflow contributors

//! Helm integration
//!
//! [`HelmApi`] is the call boundary to the `helm` binary. [`Helm`] is the
//! subprocess-backed implementation; handlers only see the trait.

mod client;
mod manifest;

pub use client::Helm;
pub use manifest::{parse_manifest, HelmTemplate};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::KaflowResult;

/// Longest release name helm accepts
pub const MAX_RELEASE_NAME_LEN: usize = 53;

/// Suffix of cleanup and resetter releases
pub const CLEAN_SUFFIX: &str = "-clean";

/// Authentication flags of a helm repository
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RepoAuthFlags {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ca_file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cert_file: Option<String>,
    pub insecure_skip_tls_verify: bool,
}

impl RepoAuthFlags {
    /// Command line flags for `helm repo add` and chart commands
    pub fn to_args(&self) -> Vec<String> {
        let mut args = Vec::new();
        if let Some(ref username) = self.username {
            args.push(format!("--username={}", username));
        }
        if let Some(ref password) = self.password {
            args.push(format!("--password={}", password));
        }
        if let Some(ref ca_file) = self.ca_file {
            args.push(format!("--ca-file={}", ca_file));
        }
        if let Some(ref cert_file) = self.cert_file {
            args.push(format!("--cert-file={}", cert_file));
        }
        if self.insecure_skip_tls_verify {
            args.push("--insecure-skip-tls-verify".to_string());
        }
        args
    }
}

/// Helm repository holding a component's chart
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HelmRepoConfig {
    pub repository_name: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "is_default_auth")]
    pub repo_auth_flags: RepoAuthFlags,
}

fn is_default_auth(flags: &RepoAuthFlags) -> bool {
    *flags == RepoAuthFlags::default()
}

impl HelmRepoConfig {
    pub fn new(repository_name: &str, url: &str) -> Self {
        Self {
            repository_name: repository_name.to_string(),
            url: url.to_string(),
            repo_auth_flags: RepoAuthFlags::default(),
        }
    }
}

/// Flags of `helm upgrade --install` and `helm template`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HelmFlags {
    pub version: Option<String>,
    pub repo_auth_flags: RepoAuthFlags,
    pub create_namespace: bool,
    pub wait: bool,
    pub wait_for_jobs: bool,
    pub force: bool,
    /// Timeout in seconds
    pub timeout: u64,
    /// Kubernetes API version for `helm template`
    pub api_version: Option<String>,
}

/// Desired state of one helm release
#[derive(Debug, Clone, PartialEq)]
pub struct HelmRelease {
    pub release_name: String,
    /// `<repository>/<chart>` or a local chart path
    pub chart: String,
    pub namespace: String,
    pub values: Value,
    pub repo: Option<HelmRepoConfig>,
    pub flags: HelmFlags,
}

/// Calls into the helm binary
#[async_trait]
pub trait HelmApi: Send + Sync {
    /// `helm repo add` followed by `helm repo update`
    async fn add_repo(&self, name: &str, url: &str, auth: &RepoAuthFlags) -> KaflowResult<()>;

    /// `helm upgrade --install`, returns stdout
    async fn upgrade_install(
        &self,
        release_name: &str,
        chart: &str,
        dry_run: bool,
        namespace: &str,
        values: &Value,
        flags: &HelmFlags,
    ) -> KaflowResult<String>;

    /// `helm uninstall`, `None` when the release does not exist
    async fn uninstall(
        &self,
        namespace: &str,
        release_name: &str,
        dry_run: bool,
    ) -> KaflowResult<Option<String>>;

    /// Rendered manifest of a deployed release, empty when not found
    async fn get_manifest(
        &self,
        release_name: &str,
        namespace: &str,
    ) -> KaflowResult<Vec<HelmTemplate>>;

    /// `helm template`, returns the rendered manifest
    async fn template(
        &self,
        release_name: &str,
        chart: &str,
        namespace: &str,
        values: &Value,
        flags: &HelmFlags,
    ) -> KaflowResult<String>;
}

/// Fit a release name into helm's length limit
///
/// Names over the limit are cut and suffixed with a short hash of the full
/// name so that distinct long names stay distinct. `suffix` is kept intact.
pub fn trim_release_name(name: &str, suffix: &str) -> String {
    let full = format!("{}{}", name, suffix);
    if full.len() <= MAX_RELEASE_NAME_LEN {
        return full;
    }

    let hash = blake3::hash(full.as_bytes()).to_hex();
    let hash = &hash.as_str()[..6];
    let keep = MAX_RELEASE_NAME_LEN.saturating_sub(suffix.len() + hash.len() + 1);
    let mut cut: String = name.chars().take(keep).collect();
    while cut.len() > keep {
        cut.pop();
    }

    let trimmed = format!("{}-{}{}", cut, hash, suffix);
    tracing::warn!(
        "Release name '{}' exceeds {} characters, using '{}'",
        full,
        MAX_RELEASE_NAME_LEN,
        trimmed
    );
    trimmed
}
