// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 kaflow contributors

//! Helm subprocess client

use async_trait::async_trait;
use serde_json::Value;
use std::io::Write;
use std::path::PathBuf;
use tokio::process::Command;

use super::{parse_manifest, HelmApi, HelmFlags, HelmTemplate, RepoAuthFlags};
use crate::config::HelmConfig;
use crate::errors::{KaflowError, KaflowResult};

/// Runs the `helm` binary found on `PATH`
#[derive(Debug, Clone)]
pub struct Helm {
    binary: PathBuf,
    context: Option<String>,
    debug: bool,
}

/// Captured result of one helm invocation
#[derive(Debug)]
struct HelmOutput {
    stdout: String,
    stderr: String,
    success: bool,
}

impl Helm {
    /// Locate helm and apply the global flags of `config`
    pub fn new(config: &HelmConfig) -> KaflowResult<Self> {
        let binary = which::which("helm").map_err(|_| KaflowError::tool_not_found("helm"))?;

        Ok(Self {
            binary,
            context: config.context.clone(),
            debug: config.debug,
        })
    }

    fn global_args(&self) -> Vec<String> {
        let mut args = Vec::new();
        if let Some(ref context) = self.context {
            args.push(format!("--kube-context={}", context));
        }
        if self.debug {
            args.push("--debug".to_string());
        }
        args
    }

    async fn run(&self, mut args: Vec<String>) -> KaflowResult<HelmOutput> {
        args.extend(self.global_args());
        tracing::debug!("Calling helm {}", args.join(" "));

        let output = Command::new(&self.binary)
            .args(&args)
            .output()
            .await
            .map_err(|e| KaflowError::ExternalTool {
                tool: "helm".to_string(),
                stderr: e.to_string(),
            })?;

        Ok(HelmOutput {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            success: output.status.success(),
        })
    }

    /// Run helm and classify its stderr
    async fn execute(&self, args: Vec<String>, resource: &str) -> KaflowResult<String> {
        let output = self.run(args).await?;
        check_stderr(&output, resource)?;
        Ok(output.stdout)
    }
}

/// Map helm's stderr onto errors
///
/// `release: not found` means the release is missing, any other line
/// mentioning an error is fatal. Warnings are logged.
fn check_stderr(output: &HelmOutput, resource: &str) -> KaflowResult<()> {
    for line in output.stderr.lines() {
        let lower = line.to_lowercase();
        if lower.contains("release: not found") {
            return Err(KaflowError::NotFound {
                resource: "Helm release",
                name: resource.to_string(),
            });
        }
        if lower.contains("error") {
            return Err(KaflowError::ExternalTool {
                tool: "helm".to_string(),
                stderr: output.stderr.trim().to_string(),
            });
        }
        if lower.contains("warning") {
            tracing::warn!("helm: {}", line.trim());
        }
    }

    if !output.success {
        return Err(KaflowError::ExternalTool {
            tool: "helm".to_string(),
            stderr: output.stderr.trim().to_string(),
        });
    }

    Ok(())
}

/// Write release values to a temporary YAML file
fn values_file(values: &Value) -> KaflowResult<tempfile::NamedTempFile> {
    let mut file = tempfile::Builder::new()
        .prefix("kaflow-values-")
        .suffix(".yaml")
        .tempfile()?;
    let yaml = serde_yaml::to_string(values)?;
    file.write_all(yaml.as_bytes())?;
    file.flush()?;
    Ok(file)
}

fn chart_args(flags: &HelmFlags) -> Vec<String> {
    let mut args = flags.repo_auth_flags.to_args();
    if let Some(ref version) = flags.version {
        args.push(format!("--version={}", version));
    }
    args
}

#[async_trait]
impl HelmApi for Helm {
    async fn add_repo(&self, name: &str, url: &str, auth: &RepoAuthFlags) -> KaflowResult<()> {
        let mut args = vec!["repo".into(), "add".into(), name.into(), url.into()];
        args.extend(auth.to_args());

        let output = self.run(args).await?;
        if !output.success {
            // An existing repository with the same url is fine
            if output.stderr.contains("already exists") {
                tracing::debug!("Helm repository '{}' already exists", name);
            } else {
                check_stderr(&output, name)?;
            }
        }

        self.execute(vec!["repo".into(), "update".into()], name).await?;
        Ok(())
    }

    async fn upgrade_install(
        &self,
        release_name: &str,
        chart: &str,
        dry_run: bool,
        namespace: &str,
        values: &Value,
        flags: &HelmFlags,
    ) -> KaflowResult<String> {
        let file = values_file(values)?;

        let mut args = vec![
            "upgrade".to_string(),
            release_name.to_string(),
            chart.to_string(),
            "--install".to_string(),
            format!("--namespace={}", namespace),
            format!("--values={}", file.path().display()),
            format!("--timeout={}s", flags.timeout),
        ];
        args.extend(chart_args(flags));
        if dry_run {
            args.push("--dry-run".to_string());
        }
        if flags.create_namespace {
            args.push("--create-namespace".to_string());
        }
        if flags.wait {
            args.push("--wait".to_string());
        }
        if flags.wait_for_jobs {
            args.push("--wait-for-jobs".to_string());
        }
        if flags.force {
            args.push("--force".to_string());
        }

        self.execute(args, release_name).await
    }

    async fn uninstall(
        &self,
        namespace: &str,
        release_name: &str,
        dry_run: bool,
    ) -> KaflowResult<Option<String>> {
        let mut args = vec![
            "uninstall".to_string(),
            release_name.to_string(),
            format!("--namespace={}", namespace),
        ];
        if dry_run {
            args.push("--dry-run".to_string());
        }

        match self.execute(args, release_name).await {
            Ok(stdout) => Ok(Some(stdout)),
            Err(e) if e.is_not_found() => {
                tracing::info!("Release '{}' not found, nothing to uninstall", release_name);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    async fn get_manifest(
        &self,
        release_name: &str,
        namespace: &str,
    ) -> KaflowResult<Vec<HelmTemplate>> {
        let args = vec![
            "get".to_string(),
            "manifest".to_string(),
            release_name.to_string(),
            format!("--namespace={}", namespace),
        ];

        match self.execute(args, release_name).await {
            Ok(stdout) => parse_manifest(&stdout),
            Err(e) if e.is_not_found() => Ok(vec![]),
            Err(e) => Err(e),
        }
    }

    async fn template(
        &self,
        release_name: &str,
        chart: &str,
        namespace: &str,
        values: &Value,
        flags: &HelmFlags,
    ) -> KaflowResult<String> {
        let file = values_file(values)?;

        let mut args = vec![
            "template".to_string(),
            release_name.to_string(),
            chart.to_string(),
            format!("--namespace={}", namespace),
            format!("--values={}", file.path().display()),
        ];
        args.extend(chart_args(flags));
        if let Some(ref api_version) = flags.api_version {
            args.push(format!("--api-versions={}", api_version));
        }

        self.execute(args, release_name).await
    }
}
