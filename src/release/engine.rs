//! Install-or-upgrade driver for the platform operator release

use std::sync::Arc;

use tracing::{debug, info, instrument};

use super::ReleaseError;
use super::installer::Installer;
use super::types::{Release, ReleaseAction, ReleaseSpec};
use super::version::{UpgradeDecision, UpgradeInputs, decide_upgrade};
use crate::crd::VerrazzanoFleetBinding;
use crate::document::Document;
use crate::remote::{AdminVersionReader, ClusterCredentials};

/// Result of [`ReleaseEngine::install_or_upgrade`]
#[derive(Clone, Debug, PartialEq)]
pub struct ReleaseOutcome {
    pub release: Release,
    /// Installer operation that ran, `None` when the release was left alone
    pub action: Option<ReleaseAction>,
}

/// Drives releases through an [`Installer`], gated on the admin cluster's version
#[derive(Clone)]
pub struct ReleaseEngine {
    installer: Arc<dyn Installer>,
    admin: Arc<dyn AdminVersionReader>,
}

impl ReleaseEngine {
    pub fn new(installer: Arc<dyn Installer>, admin: Arc<dyn AdminVersionReader>) -> Self {
        Self { installer, admin }
    }

    /// Look up a release by name; an empty name never matches
    pub async fn find(
        &self,
        credentials: &ClusterCredentials,
        name: &str,
        namespace: &str,
    ) -> Result<Option<Release>, ReleaseError> {
        if name.is_empty() {
            return Ok(None);
        }
        self.installer.get(credentials, name, namespace).await
    }

    pub async fn uninstall(
        &self,
        credentials: &ClusterCredentials,
        name: &str,
        namespace: &str,
    ) -> Result<(), ReleaseError> {
        self.installer.uninstall(credentials, name, namespace).await
    }

    /// Install the release if it is missing, otherwise upgrade it when needed.
    ///
    /// A release that needs nothing is returned as found and the installer is
    /// not invoked.
    #[instrument(skip_all, fields(cluster = %credentials.cluster, namespace = %spec.namespace))]
    pub async fn install_or_upgrade(
        &self,
        credentials: &ClusterCredentials,
        values: &Document,
        spec: &ReleaseSpec,
        binding: &VerrazzanoFleetBinding,
    ) -> Result<ReleaseOutcome, ReleaseError> {
        let name = spec.release_name.as_deref().unwrap_or_default();
        let Some(existing) = self.find(credentials, name, &spec.namespace).await? else {
            info!(chart = %spec.chart_name, "installing release");
            let release = self.installer.install(credentials, spec, values).await?;
            return Ok(ReleaseOutcome {
                release,
                action: Some(ReleaseAction::Install),
            });
        };

        let requested_version = binding
            .spec
            .workload_spec()
            .and_then(Document::requested_version);
        if requested_version.is_none() {
            debug!(
                release = %existing.name,
                "no Verrazzano version requested, leaving release as is"
            );
            return Ok(unchanged(existing));
        }

        let admin_version = self.admin.admin_version().await?;
        if admin_version.is_none() {
            debug!("admin cluster has not reported a Verrazzano version yet");
            return Ok(unchanged(existing));
        }

        let requested_chart_version = self.installer.chart_version(spec).await?;
        let observed_version = binding
            .status
            .as_ref()
            .and_then(|s| s.verrazzano.as_ref())
            .and_then(|v| v.version.as_deref());

        let decision = decide_upgrade(&UpgradeInputs {
            requested_version,
            admin_version: admin_version.as_deref(),
            observed_version,
            installed: &existing,
            requested_chart_version: &requested_chart_version,
            values,
        })?;

        match decision {
            UpgradeDecision::Upgrade(reason) => {
                info!(release = %existing.name, ?reason, "upgrading release");
                let release = self
                    .installer
                    .upgrade(credentials, &existing.name, spec, values)
                    .await?;
                Ok(ReleaseOutcome {
                    release,
                    action: Some(ReleaseAction::Upgrade),
                })
            }
            UpgradeDecision::Skip(reason) => {
                debug!(release = %existing.name, ?reason, "release is current");
                Ok(unchanged(existing))
            }
        }
    }
}

fn unchanged(release: Release) -> ReleaseOutcome {
    ReleaseOutcome {
        release,
        action: None,
    }
}
