//! Platform operator release lifecycle
//!
//! Chart materialisation, values rendering, the version gate and the
//! install-or-upgrade decision. The installer itself sits behind the
//! [`Installer`] trait.

pub mod chart;
pub mod engine;
pub mod installer;
pub mod types;
pub mod values;
pub mod version;

pub use chart::{ChartProvider, ConfigMapChartProvider, PreparedChart};
pub use engine::{ReleaseEngine, ReleaseOutcome};
pub use installer::{HelmCli, Installer};
pub use types::*;
pub use version::{SkipReason, UpgradeDecision, UpgradeReason};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReleaseError {
    #[error("release {0} not found")]
    NotFound(String),

    #[error("installer command `{command}` failed: {stderr}")]
    Command { command: String, stderr: String },

    #[error("failed to load chart: {0}")]
    Chart(String),

    #[error("failed to render values: {0}")]
    Values(String),

    #[error("invalid version {version:?}: {source}")]
    Version {
        version: String,
        #[source]
        source: semver::Error,
    },

    #[error("failed to read the admin cluster Verrazzano version: {0}")]
    AdminVersion(#[from] crate::remote::RemoteError),

    #[error("unexpected installer output: {0}")]
    Output(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Kubernetes API error: {0}")]
    Kube(#[from] kube::Error),
}
