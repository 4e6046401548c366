// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 kaflow contributors

//! Helm release reconciliation

use std::sync::Arc;

use super::{Outcome, Report};
use crate::diff::{diff_helm_templates, render_change};
use crate::errors::KaflowResult;
use crate::helm::{parse_manifest, HelmApi, HelmRelease};

/// Installs, diffs and uninstalls helm releases
pub struct HelmAppHandler {
    api: Arc<dyn HelmApi>,
    diff_ignore: Vec<Vec<String>>,
}

fn resource(release: &HelmRelease) -> String {
    format!("release {}", release.release_name)
}

impl HelmAppHandler {
    pub fn new(api: Arc<dyn HelmApi>, diff_ignore: Vec<Vec<String>>) -> Self {
        Self { api, diff_ignore }
    }

    async fn add_repo(&self, release: &HelmRelease) -> KaflowResult<()> {
        if let Some(ref repo) = release.repo {
            self.api
                .add_repo(&repo.repository_name, &repo.url, &repo.repo_auth_flags)
                .await?;
        }
        Ok(())
    }

    /// Render the release and diff it against what is deployed
    async fn plan(&self, release: &HelmRelease) -> KaflowResult<Report> {
        let rendered = self
            .api
            .template(
                &release.release_name,
                &release.chart,
                &release.namespace,
                &release.values,
                &release.flags,
            )
            .await?;
        let desired = parse_manifest(&rendered)?;
        let live = self
            .api
            .get_manifest(&release.release_name, &release.namespace)
            .await?;

        let changes = diff_helm_templates(&live, &desired, &self.diff_ignore);
        if changes.is_empty() {
            tracing::info!("Release {}: no changes", release.release_name);
            return Ok(Report::new(resource(release), Outcome::Unchanged));
        }

        let rendered: Vec<String> = changes
            .iter()
            .filter_map(|change| {
                tracing::debug!("Release {}: {}", release.release_name, change);
                render_change(change, &self.diff_ignore)
                    .map(|lines| format!("{}\n{}", change.path_string(), lines))
            })
            .collect();
        let diff = if rendered.is_empty() {
            None
        } else {
            Some(rendered.join("\n"))
        };

        Ok(Report::new(resource(release), Outcome::Planned).with_diff(diff))
    }

    /// Install or upgrade the release
    pub async fn apply(&self, release: &HelmRelease, dry_run: bool) -> KaflowResult<Report> {
        self.add_repo(release).await?;

        if dry_run {
            return self.plan(release).await;
        }

        let stdout = self
            .api
            .upgrade_install(
                &release.release_name,
                &release.chart,
                false,
                &release.namespace,
                &release.values,
                &release.flags,
            )
            .await?;
        if !stdout.trim().is_empty() {
            tracing::debug!("{}", stdout.trim_end());
        }
        tracing::info!(
            "Release {} applied in namespace {}",
            release.release_name,
            release.namespace
        );

        Ok(Report::new(resource(release), Outcome::Applied))
    }

    /// Uninstall the release, a missing release is not an error
    pub async fn destroy(&self, release: &HelmRelease, dry_run: bool) -> KaflowResult<Report> {
        let uninstalled = self
            .api
            .uninstall(&release.namespace, &release.release_name, dry_run)
            .await?;

        let outcome = match uninstalled {
            None => {
                tracing::info!(
                    "Release {} not found in namespace {}, skipping",
                    release.release_name,
                    release.namespace
                );
                Outcome::Skipped
            }
            Some(_) if dry_run => Outcome::Planned,
            Some(_) => {
                tracing::info!("Release {} uninstalled", release.release_name);
                Outcome::Deleted
            }
        };

        Ok(Report::new(resource(release), outcome))
    }

    /// Run a one-off job release to completion
    ///
    /// A leftover release from an earlier run is removed first. The job is
    /// installed and waited for, then uninstalled unless `retain` is set.
    /// A dry run only renders and diffs the job.
    pub async fn run_clean_job(
        &self,
        release: &HelmRelease,
        dry_run: bool,
        retain: bool,
    ) -> KaflowResult<Vec<Report>> {
        if dry_run {
            return Ok(vec![self.apply(release, true).await?]);
        }

        let mut reports = Vec::new();

        if self
            .api
            .uninstall(&release.namespace, &release.release_name, false)
            .await?
            .is_some()
        {
            tracing::info!("Removed leftover release {}", release.release_name);
        }

        let mut job = release.clone();
        job.flags.wait = true;
        reports.push(self.apply(&job, false).await?);

        if retain {
            tracing::info!("Keeping release {}", release.release_name);
        } else {
            reports.push(self.destroy(release, false).await?);
        }

        Ok(reports)
    }
}

#[cfg(test)]
mod tests {
    use super::super::fakes::FakeHelm;
    use super::*;
    use crate::diff::ChangeKind;
    use crate::helm::{HelmFlags, HelmRepoConfig};
    use serde_json::json;

    const MANIFEST: &str = "---\n# Source: chart/templates/deployment.yaml\nkind: Deployment\nmetadata:\n  name: app\nspec:\n  replicas: 1\n";

    fn release(name: &str) -> HelmRelease {
        HelmRelease {
            release_name: name.into(),
            chart: "repo/chart".into(),
            namespace: "ns".into(),
            values: json!({"replicas": 1}),
            repo: Some(HelmRepoConfig::new("repo", "https://charts.example.com")),
            flags: HelmFlags::default(),
        }
    }

    fn handler(ignore: Vec<Vec<String>>) -> (Arc<FakeHelm>, HelmAppHandler) {
        let helm = Arc::new(FakeHelm::default());
        (helm.clone(), HelmAppHandler::new(helm, ignore))
    }

    #[tokio::test]
    async fn test_apply_adds_repo_and_installs() {
        let (helm, handler) = handler(vec![]);
        helm.set_template_output(MANIFEST);

        let report = handler.apply(&release("app"), false).await.unwrap();

        assert_eq!(report.outcome, Outcome::Applied);
        assert_eq!(
            helm.calls(),
            vec!["add_repo repo", "upgrade_install app repo/chart"]
        );
        assert!(helm.has_release("app"));
    }

    #[tokio::test]
    async fn test_dry_run_diffs_new_release() {
        let (helm, handler) = handler(vec![]);
        helm.set_template_output(MANIFEST);

        let report = handler.apply(&release("app"), true).await.unwrap();

        assert_eq!(report.outcome, Outcome::Planned);
        let diff = report.diff.unwrap();
        assert!(diff.starts_with("chart/templates/deployment.yaml"));
        assert!(diff.contains("+ kind: Deployment"));
        assert!(!helm.has_release("app"));
        assert!(!helm.calls().iter().any(|c| c.starts_with("upgrade_install")));
    }

    #[tokio::test]
    async fn test_dry_run_of_deployed_release_is_unchanged() {
        let (helm, handler) = handler(vec![]);
        helm.set_template_output(MANIFEST);
        helm.install("app", MANIFEST);

        let report = handler.apply(&release("app"), true).await.unwrap();
        assert_eq!(report.outcome, Outcome::Unchanged);
        assert_eq!(report.diff, None);
    }

    #[tokio::test]
    async fn test_ignored_paths_do_not_count() {
        let ignore = vec![vec!["spec".to_string(), "replicas".to_string()]];
        let (helm, handler) = handler(ignore);
        helm.install("app", MANIFEST);
        helm.set_template_output(&MANIFEST.replace("replicas: 1", "replicas: 3"));

        let report = handler.apply(&release("app"), true).await.unwrap();
        assert_eq!(report.outcome, Outcome::Unchanged);
    }

    #[tokio::test]
    async fn test_manifest_diff_reports_changed_document() {
        let live = parse_manifest(MANIFEST).unwrap();
        let desired = parse_manifest(&MANIFEST.replace("replicas: 1", "replicas: 2")).unwrap();

        let changes = diff_helm_templates(&live, &desired, &[]);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].kind, ChangeKind::Change);
    }

    #[tokio::test]
    async fn test_destroy_missing_release_is_skipped() {
        let (_, handler) = handler(vec![]);
        let report = handler.destroy(&release("gone"), false).await.unwrap();
        assert_eq!(report.outcome, Outcome::Skipped);
    }

    #[tokio::test]
    async fn test_clean_job_removes_leftover_and_uninstalls() {
        let (helm, handler) = handler(vec![]);
        helm.set_template_output(MANIFEST);
        helm.install("app-clean", MANIFEST);

        let reports = handler
            .run_clean_job(&release("app-clean"), false, false)
            .await
            .unwrap();

        assert_eq!(
            helm.calls(),
            vec![
                "uninstall app-clean",
                "add_repo repo",
                "upgrade_install app-clean repo/chart",
                "uninstall app-clean",
            ]
        );
        assert_eq!(reports.len(), 2);
        assert_eq!(reports[1].outcome, Outcome::Deleted);
        assert!(!helm.has_release("app-clean"));
    }

    #[tokio::test]
    async fn test_retained_clean_job_stays_installed() {
        let (helm, handler) = handler(vec![]);
        helm.set_template_output(MANIFEST);

        let reports = handler
            .run_clean_job(&release("app-clean"), false, true)
            .await
            .unwrap();

        assert_eq!(reports.len(), 1);
        assert!(helm.has_release("app-clean"));
    }

    #[tokio::test]
    async fn test_dry_run_clean_job_only_renders() {
        let (helm, handler) = handler(vec![]);
        helm.set_template_output(MANIFEST);

        let reports = handler
            .run_clean_job(&release("app-clean"), true, false)
            .await
            .unwrap();

        assert_eq!(reports[0].outcome, Outcome::Planned);
        assert!(!helm.calls().iter().any(|c| c.starts_with("uninstall")));
        assert!(!helm.has_release("app-clean"));
    }
}
