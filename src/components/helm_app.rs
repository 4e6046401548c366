// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 kaflow contributors

//! Generic helm chart

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::base::ComponentBase;
use super::TopicBinding;
use crate::config::KaflowConfig;
use crate::errors::KaflowResult;
use crate::handlers::{Handlers, Report};
use crate::helm::{trim_release_name, HelmFlags, HelmRelease, HelmRepoConfig};

/// Any helm chart, deployed with the values in `app`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HelmApp {
    #[serde(flatten)]
    pub base: ComponentBase,

    pub namespace: String,

    /// Chart reference, `<repository>/<chart>` or a local path
    pub chart: String,

    #[serde(default)]
    pub app: Map<String, Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repo_config: Option<HelmRepoConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

impl HelmApp {
    pub fn release(&self, config: &KaflowConfig) -> HelmRelease {
        let repo_auth_flags = self
            .repo_config
            .as_ref()
            .map(|repo| repo.repo_auth_flags.clone())
            .unwrap_or_default();

        HelmRelease {
            release_name: trim_release_name(&self.base.name, ""),
            chart: self.chart.clone(),
            namespace: self.namespace.clone(),
            values: Value::Object(self.app.clone()),
            repo: self.repo_config.clone(),
            flags: HelmFlags {
                version: self.version.clone(),
                repo_auth_flags,
                create_namespace: config.create_namespace,
                timeout: config.timeout,
                api_version: config.helm_config.api_version.clone(),
                ..Default::default()
            },
        }
    }

    pub async fn deploy(&self, handlers: &Handlers, dry_run: bool) -> KaflowResult<Vec<Report>> {
        let release = self.release(&handlers.config);
        Ok(vec![handlers.helm.apply(&release, dry_run).await?])
    }

    pub async fn destroy(&self, handlers: &Handlers, dry_run: bool) -> KaflowResult<Vec<Report>> {
        let release = self.release(&handlers.config);
        Ok(vec![handlers.helm.destroy(&release, dry_run).await?])
    }
}

impl TopicBinding for HelmApp {
    fn binding_name(&self) -> &str {
        &self.base.name
    }
}
