//! Platform operator chart materialisation
//!
//! The admin cluster's own Verrazzano installation publishes the platform
//! operator chart as a ConfigMap. Each data key is a chart-relative file path
//! with `/` encoded as `...`.

use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use k8s_openapi::api::core::v1::ConfigMap;
use kube::{Api, Client};
#[cfg(test)]
use mockall::automock;
use tempfile::TempDir;
use tracing::{debug, instrument};

use super::ReleaseError;
use super::types::{ChartSource, PLATFORM_OPERATOR_NAMESPACE};
use crate::document::Document;

/// ConfigMap holding the platform operator chart files
pub const CHART_CONFIG_MAP: &str = "vpo-helm-chart";

const PATH_SEPARATOR_ENCODING: &str = "...";

/// A chart ready for the installer, plus the default image it declares
#[derive(Debug)]
pub struct PreparedChart {
    pub source: ChartSource,
    pub default_image: String,
    /// Keeps a materialised chart directory alive until the pass is done
    _workdir: Option<TempDir>,
}

impl PreparedChart {
    /// A chart the operator does not own on disk
    pub fn new(source: ChartSource, default_image: impl Into<String>) -> Self {
        Self {
            source,
            default_image: default_image.into(),
            _workdir: None,
        }
    }
}

/// Supplies the platform operator chart for a reconcile pass
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ChartProvider: Send + Sync {
    async fn prepare(&self) -> Result<PreparedChart, ReleaseError>;
}

/// Materialises the chart from the `vpo-helm-chart` ConfigMap
pub struct ConfigMapChartProvider {
    client: Client,
    base_dir: PathBuf,
}

impl ConfigMapChartProvider {
    pub fn new(client: Client, base_dir: impl Into<PathBuf>) -> Self {
        Self {
            client,
            base_dir: base_dir.into(),
        }
    }
}

#[async_trait]
impl ChartProvider for ConfigMapChartProvider {
    #[instrument(skip(self))]
    async fn prepare(&self) -> Result<PreparedChart, ReleaseError> {
        let api: Api<ConfigMap> = Api::namespaced(self.client.clone(), PLATFORM_OPERATOR_NAMESPACE);
        let config_map = api.get_opt(CHART_CONFIG_MAP).await?.ok_or_else(|| {
            ReleaseError::Chart(format!(
                "ConfigMap {PLATFORM_OPERATOR_NAMESPACE}/{CHART_CONFIG_MAP} not found; \
                 the admin cluster must have Verrazzano installed"
            ))
        })?;
        let files = config_map.data.unwrap_or_default();

        // Concurrent passes each get their own directory
        tokio::fs::create_dir_all(&self.base_dir).await?;
        let workdir = tempfile::Builder::new()
            .prefix("verrazzano-platform-operator-")
            .tempdir_in(&self.base_dir)?;

        write_chart(workdir.path(), &files).await?;
        let default_image = read_default_image(workdir.path()).await?;
        debug!(dir = %workdir.path().display(), files = files.len(), "materialised chart");

        Ok(PreparedChart {
            source: ChartSource::Local(workdir.path().to_path_buf()),
            default_image,
            _workdir: Some(workdir),
        })
    }
}

/// Decode a ConfigMap key into a chart-relative path, refusing escapes
pub fn chart_file_path(key: &str) -> Result<PathBuf, ReleaseError> {
    let relative = PathBuf::from(key.replace(PATH_SEPARATOR_ENCODING, "/"));
    let safe = relative
        .components()
        .all(|component| matches!(component, Component::Normal(_)));
    if !safe || relative.as_os_str().is_empty() {
        return Err(ReleaseError::Chart(format!("invalid chart file key {key:?}")));
    }
    Ok(relative)
}

/// Write chart files below `dir`
pub async fn write_chart(dir: &Path, files: &BTreeMap<String, String>) -> Result<(), ReleaseError> {
    tokio::fs::create_dir_all(dir.join("crds")).await?;
    tokio::fs::create_dir_all(dir.join("templates")).await?;

    for (key, contents) in files {
        let path = dir.join(chart_file_path(key)?);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, contents).await?;
    }
    Ok(())
}

/// `image` from the chart's `values.yaml`
pub async fn read_default_image(chart_dir: &Path) -> Result<String, ReleaseError> {
    let raw = tokio::fs::read_to_string(chart_dir.join("values.yaml")).await?;
    let values = Document::from_yaml_str(&raw)?;
    values
        .get_str(&["image"])
        .map(str::to_string)
        .ok_or_else(|| ReleaseError::Chart("values.yaml does not name an image".to_string()))
}

/// `version` from a chart's `Chart.yaml`
pub async fn read_chart_version(chart_dir: &Path) -> Result<String, ReleaseError> {
    let raw = tokio::fs::read_to_string(chart_dir.join("Chart.yaml")).await?;
    let metadata = Document::from_yaml_str(&raw)?;
    metadata
        .get_str(&["version"])
        .map(str::to_string)
        .ok_or_else(|| ReleaseError::Chart("Chart.yaml has no version".to_string()))
}
