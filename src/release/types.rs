use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::document::Document;

/// Chart and release name of the Verrazzano platform operator
pub const PLATFORM_OPERATOR: &str = "verrazzano-platform-operator";

/// Namespace the platform operator is installed into on each workload cluster
pub const PLATFORM_OPERATOR_NAMESPACE: &str = "verrazzano-install";

/// Where a chart is loaded from
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChartSource {
    /// Unpacked chart directory on the local filesystem
    Local(PathBuf),
    /// Classic chart repository
    Repository { url: String, chart: String },
    /// OCI registry reference, e.g. `oci://ghcr.io/verrazzano/charts/vpo`
    Oci { reference: String },
}

impl ChartSource {
    /// Resolve a repository URL and chart name into a source.
    ///
    /// An empty URL means the chart is a local path; an `oci://` URL turns the
    /// chart into a reference below that URL.
    pub fn resolve(repo_url: &str, chart: &str) -> Self {
        if repo_url.is_empty() {
            ChartSource::Local(PathBuf::from(chart))
        } else if repo_url.starts_with("oci://") {
            ChartSource::Oci {
                reference: format!("{}/{}", repo_url.trim_end_matches('/'), chart),
            }
        } else {
            ChartSource::Repository {
                url: repo_url.to_string(),
                chart: chart.to_string(),
            }
        }
    }
}

/// Everything the installer needs to place a release, rebuilt on every pass
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReleaseSpec {
    pub chart_name: String,
    /// Release name; a name is generated on install when absent
    pub release_name: Option<String>,
    pub namespace: String,
    /// Requested chart version, latest when absent
    pub version: Option<String>,
    pub source: ChartSource,
}

impl ReleaseSpec {
    /// Release of the platform operator chart from `source`
    pub fn platform_operator(source: ChartSource) -> Self {
        Self {
            chart_name: PLATFORM_OPERATOR.to_string(),
            release_name: Some(PLATFORM_OPERATOR.to_string()),
            namespace: PLATFORM_OPERATOR_NAMESPACE.to_string(),
            version: None,
            source,
        }
    }
}

/// Lifecycle state of an installed release
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ReleaseStatus {
    Unknown,
    Deployed,
    Uninstalled,
    Superseded,
    Failed,
    Uninstalling,
    PendingInstall,
    PendingUpgrade,
    PendingRollback,
}

impl ReleaseStatus {
    /// True while the installer is still acting on the release
    pub fn is_pending(&self) -> bool {
        matches!(
            self,
            ReleaseStatus::PendingInstall
                | ReleaseStatus::PendingUpgrade
                | ReleaseStatus::PendingRollback
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ReleaseStatus::Unknown => "unknown",
            ReleaseStatus::Deployed => "deployed",
            ReleaseStatus::Uninstalled => "uninstalled",
            ReleaseStatus::Superseded => "superseded",
            ReleaseStatus::Failed => "failed",
            ReleaseStatus::Uninstalling => "uninstalling",
            ReleaseStatus::PendingInstall => "pending-install",
            ReleaseStatus::PendingUpgrade => "pending-upgrade",
            ReleaseStatus::PendingRollback => "pending-rollback",
        }
    }
}

impl fmt::Display for ReleaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReleaseStatus {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "deployed" => ReleaseStatus::Deployed,
            "uninstalled" => ReleaseStatus::Uninstalled,
            "superseded" => ReleaseStatus::Superseded,
            "failed" => ReleaseStatus::Failed,
            "uninstalling" => ReleaseStatus::Uninstalling,
            "pending-install" => ReleaseStatus::PendingInstall,
            "pending-upgrade" => ReleaseStatus::PendingUpgrade,
            "pending-rollback" => ReleaseStatus::PendingRollback,
            _ => ReleaseStatus::Unknown,
        })
    }
}

/// An installed release as reported by the installer
#[derive(Clone, Debug, PartialEq)]
pub struct Release {
    pub name: String,
    pub namespace: String,
    pub revision: i64,
    pub status: ReleaseStatus,
    /// Version from the installed chart's metadata
    pub chart_version: String,
    /// User-supplied values stored with the release
    pub values: Document,
}

/// Kind of installer operation, used as a metric label
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ReleaseAction {
    Install,
    Upgrade,
    Uninstall,
}

impl ReleaseAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReleaseAction::Install => "install",
            ReleaseAction::Upgrade => "upgrade",
            ReleaseAction::Uninstall => "uninstall",
        }
    }
}
