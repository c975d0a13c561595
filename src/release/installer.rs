//! Installer collaborator
//!
//! [`HelmCli`] drives the `helm` binary. Each call writes the workload
//! cluster's kubeconfig and the rendered values to private temporary files.

use std::io::Write;
use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use serde::Deserialize;
use tempfile::NamedTempFile;
use tokio::process::Command;
use tracing::{debug, instrument};

use super::ReleaseError;
use super::chart::read_chart_version;
use super::types::{ChartSource, Release, ReleaseSpec, ReleaseStatus};
use crate::document::Document;
use crate::remote::ClusterCredentials;

/// Packaged-release engine acting on a workload cluster
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Installer: Send + Sync {
    /// Look up a release; `None` when it does not exist
    async fn get(
        &self,
        credentials: &ClusterCredentials,
        name: &str,
        namespace: &str,
    ) -> Result<Option<Release>, ReleaseError>;

    /// Version of the chart `spec` would install
    async fn chart_version(&self, spec: &ReleaseSpec) -> Result<String, ReleaseError>;

    async fn install(
        &self,
        credentials: &ClusterCredentials,
        spec: &ReleaseSpec,
        values: &Document,
    ) -> Result<Release, ReleaseError>;

    async fn upgrade(
        &self,
        credentials: &ClusterCredentials,
        name: &str,
        spec: &ReleaseSpec,
        values: &Document,
    ) -> Result<Release, ReleaseError>;

    /// Remove a release; [`ReleaseError::NotFound`] when there is none
    async fn uninstall(
        &self,
        credentials: &ClusterCredentials,
        name: &str,
        namespace: &str,
    ) -> Result<(), ReleaseError>;
}

/// Installer backed by the `helm` command line
#[derive(Clone, Debug)]
pub struct HelmCli {
    binary: PathBuf,
}

impl HelmCli {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    async fn run(
        &self,
        credentials: Option<&ClusterCredentials>,
        args: &[String],
    ) -> Result<Vec<u8>, ReleaseError> {
        let mut command = Command::new(&self.binary);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        // Held until the command exits
        let kubeconfig = match credentials {
            Some(credentials) => {
                let file = temp_file_with(credentials.kubeconfig.as_bytes())?;
                command.arg("--kubeconfig").arg(file.path());
                if let Some(context) = &credentials.context {
                    command.arg("--kube-context").arg(context);
                }
                Some(file)
            }
            None => None,
        };

        let summary = args.iter().take(2).cloned().collect::<Vec<_>>().join(" ");
        debug!(command = %summary, "running helm");
        let output = command.output().await?;
        drop(kubeconfig);

        if output.status.success() {
            Ok(output.stdout)
        } else {
            Err(ReleaseError::Command {
                command: format!("helm {summary}"),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            })
        }
    }

    async fn apply(
        &self,
        credentials: &ClusterCredentials,
        mut args: Vec<String>,
        spec: &ReleaseSpec,
        values: &Document,
    ) -> Result<Release, ReleaseError> {
        let values_file = temp_file_with(values.to_yaml_string()?.as_bytes())?;
        args.extend(chart_args(spec));
        args.extend([
            "--namespace".to_string(),
            spec.namespace.clone(),
            "--values".to_string(),
            values_file.path().display().to_string(),
            "--output".to_string(),
            "json".to_string(),
        ]);

        let stdout = self.run(Some(credentials), &args).await?;
        let output: ReleaseOutput = serde_json::from_slice(&stdout)?;
        Ok(output.into())
    }
}

#[async_trait]
impl Installer for HelmCli {
    #[instrument(skip(self, credentials), fields(cluster = %credentials.cluster))]
    async fn get(
        &self,
        credentials: &ClusterCredentials,
        name: &str,
        namespace: &str,
    ) -> Result<Option<Release>, ReleaseError> {
        if name.is_empty() {
            return Ok(None);
        }

        let args = strings(&[
            "list",
            "--all",
            "--namespace",
            namespace,
            "--filter",
            &format!("^{name}$"),
            "--output",
            "json",
        ]);
        let listed: Vec<ListedRelease> =
            serde_json::from_slice(&self.run(Some(credentials), &args).await?)?;
        let Some(found) = listed.into_iter().find(|r| r.name == name) else {
            return Ok(None);
        };

        let args = strings(&["get", "values", name, "--namespace", namespace, "--output", "json"]);
        let stdout = self.run(Some(credentials), &args).await?;
        let values: Option<serde_json::Value> = serde_json::from_slice(&stdout)?;

        Ok(Some(Release {
            name: found.name,
            namespace: found.namespace,
            revision: found.revision.parse().unwrap_or_default(),
            status: found.status.parse().unwrap_or(ReleaseStatus::Unknown),
            chart_version: chart_label_version(&found.chart).to_string(),
            values: values.map(Document::new).unwrap_or_else(Document::object),
        }))
    }

    async fn chart_version(&self, spec: &ReleaseSpec) -> Result<String, ReleaseError> {
        if let ChartSource::Local(dir) = &spec.source {
            return read_chart_version(dir).await;
        }

        let mut args = strings(&["show", "chart"]);
        args.extend(chart_args(spec));
        let stdout = self.run(None, &args).await?;
        let metadata = Document::from_yaml_str(&String::from_utf8_lossy(&stdout))?;
        metadata
            .get_str(&["version"])
            .map(str::to_string)
            .ok_or_else(|| ReleaseError::Chart(format!("chart {} has no version", spec.chart_name)))
    }

    #[instrument(skip(self, credentials, values), fields(cluster = %credentials.cluster))]
    async fn install(
        &self,
        credentials: &ClusterCredentials,
        spec: &ReleaseSpec,
        values: &Document,
    ) -> Result<Release, ReleaseError> {
        let mut args = strings(&["install"]);
        match spec.release_name.as_deref().filter(|n| !n.is_empty()) {
            Some(name) => args.push(name.to_string()),
            None => args.push("--generate-name".to_string()),
        }
        args.push("--create-namespace".to_string());
        self.apply(credentials, args, spec, values).await
    }

    #[instrument(skip(self, credentials, spec, values), fields(cluster = %credentials.cluster))]
    async fn upgrade(
        &self,
        credentials: &ClusterCredentials,
        name: &str,
        spec: &ReleaseSpec,
        values: &Document,
    ) -> Result<Release, ReleaseError> {
        let args = strings(&["upgrade", name]);
        self.apply(credentials, args, spec, values).await
    }

    #[instrument(skip(self, credentials), fields(cluster = %credentials.cluster))]
    async fn uninstall(
        &self,
        credentials: &ClusterCredentials,
        name: &str,
        namespace: &str,
    ) -> Result<(), ReleaseError> {
        let args = strings(&["uninstall", name, "--namespace", namespace, "--wait"]);
        match self.run(Some(credentials), &args).await {
            Ok(_) => Ok(()),
            Err(ReleaseError::Command { stderr, .. }) if stderr.contains("not found") => {
                Err(ReleaseError::NotFound(format!("{namespace}/{name}")))
            }
            Err(e) => Err(e),
        }
    }
}

fn strings(args: &[&str]) -> Vec<String> {
    args.iter().map(|a| a.to_string()).collect()
}

fn temp_file_with(contents: &[u8]) -> Result<NamedTempFile, ReleaseError> {
    let mut file = NamedTempFile::new()?;
    file.write_all(contents)?;
    file.flush()?;
    Ok(file)
}

/// Chart reference arguments for install, upgrade and show
fn chart_args(spec: &ReleaseSpec) -> Vec<String> {
    let mut args = match &spec.source {
        ChartSource::Local(dir) => vec![dir.display().to_string()],
        ChartSource::Repository { url, chart } => {
            vec![chart.clone(), "--repo".to_string(), url.clone()]
        }
        ChartSource::Oci { reference } => vec![reference.clone()],
    };
    if let Some(version) = spec.version.as_deref().filter(|v| !v.is_empty()) {
        args.extend(["--version".to_string(), version.to_string()]);
    }
    args
}

/// Version part of a `helm list` chart label such as `vpo-1.6.0-rc.1`
pub fn chart_label_version(label: &str) -> &str {
    label
        .char_indices()
        .find(|(i, c)| {
            *c == '-'
                && label
                    .get(i + 1..)
                    .and_then(|rest| rest.chars().next())
                    .is_some_and(|next| next.is_ascii_digit())
        })
        .and_then(|(i, _)| label.get(i + 1..))
        .unwrap_or_default()
}

#[derive(Deserialize)]
struct ListedRelease {
    name: String,
    namespace: String,
    revision: String,
    status: String,
    chart: String,
}

#[derive(Deserialize)]
struct ReleaseOutput {
    name: String,
    namespace: String,
    version: i64,
    info: ReleaseInfo,
    chart: ChartOutput,
    #[serde(default)]
    config: Option<serde_json::Value>,
}

#[derive(Deserialize)]
struct ReleaseInfo {
    status: String,
}

#[derive(Deserialize)]
struct ChartOutput {
    metadata: ChartMetadata,
}

#[derive(Deserialize)]
struct ChartMetadata {
    version: String,
}

impl From<ReleaseOutput> for Release {
    fn from(output: ReleaseOutput) -> Self {
        Release {
            name: output.name,
            namespace: output.namespace,
            revision: output.version,
            status: output
                .info
                .status
                .parse()
                .unwrap_or(ReleaseStatus::Unknown),
            chart_version: output.chart.metadata.version,
            values: output.config.map(Document::new).unwrap_or_else(Document::object),
        }
    }
}
