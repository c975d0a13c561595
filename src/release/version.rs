//! Version gate and the install-or-upgrade decision
//!
//! A workload cluster may only run the Verrazzano version that is active on the
//! admin cluster. The decision below is pure; the engine gathers its inputs.

use semver::Version;

use super::ReleaseError;
use super::types::{Release, ReleaseStatus};
use crate::document::Document;

/// Parse a Verrazzano version, accepting an optional leading `v`
pub fn parse_version(raw: &str) -> Result<Version, ReleaseError> {
    let trimmed = raw.trim();
    let unprefixed = trimmed
        .strip_prefix('v')
        .or_else(|| trimmed.strip_prefix('V'))
        .unwrap_or(trimmed);
    Version::parse(unprefixed).map_err(|source| ReleaseError::Version {
        version: raw.to_string(),
        source,
    })
}

/// Semantic equality; build metadata does not take part
pub fn versions_match(a: &Version, b: &Version) -> bool {
    a.major == b.major && a.minor == b.minor && a.patch == b.patch && a.pre == b.pre
}

/// The part of a version before its first `-`, without a leading `v`.
///
/// Development builds are published as `<release>-<build>` while their chart
/// metadata carries only `<release>`.
pub fn release_segment(version: &str) -> &str {
    let version = version.trim();
    let version = version.strip_prefix('v').unwrap_or(version);
    version.split('-').next().unwrap_or(version)
}

/// Whether the installed chart already satisfies the requested one.
///
/// Either the chart versions agree, or the installed chart version is the
/// release segment of a requested development build.
pub fn chart_is_current(installed: &str, requested: &str, requested_workload: &str) -> bool {
    let installed = installed.trim();
    installed == requested.trim()
        || installed.strip_prefix('v').unwrap_or(installed) == release_segment(requested_workload)
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SkipReason {
    /// The binding does not pin a Verrazzano version
    NoRequestedVersion,
    /// The admin cluster has not reported a version yet
    AdminVersionUnknown,
    /// The requested version is not the admin cluster's version
    VersionGate { requested: String, admin: String },
    /// Nothing differs from the installed release
    UpToDate,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UpgradeReason {
    ChartVersion { installed: String, requested: String },
    /// Same chart, but the workload cluster still reports an older Verrazzano
    WorkloadBehindAdmin { observed: String, admin: String },
    FailedRelease,
    ValuesChanged,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UpgradeDecision {
    Skip(SkipReason),
    Upgrade(UpgradeReason),
}

impl UpgradeDecision {
    pub fn should_upgrade(&self) -> bool {
        matches!(self, UpgradeDecision::Upgrade(_))
    }
}

/// Inputs gathered for one upgrade decision
#[derive(Clone, Debug)]
pub struct UpgradeInputs<'a> {
    /// `version` from the binding's Verrazzano spec
    pub requested_version: Option<&'a str>,
    /// Verrazzano version installed on the admin cluster
    pub admin_version: Option<&'a str>,
    /// Verrazzano version last observed on the workload cluster
    pub observed_version: Option<&'a str>,
    pub installed: &'a Release,
    /// Version of the chart that would be installed now
    pub requested_chart_version: &'a str,
    pub values: &'a Document,
}

/// Decide whether an existing release must be upgraded.
///
/// Unparseable versions are errors. A version gate miss is a skip, never an
/// error, regardless of any other difference.
pub fn decide_upgrade(inputs: &UpgradeInputs<'_>) -> Result<UpgradeDecision, ReleaseError> {
    let Some(requested_raw) = inputs.requested_version.filter(|v| !v.trim().is_empty()) else {
        return Ok(UpgradeDecision::Skip(SkipReason::NoRequestedVersion));
    };
    let Some(admin_raw) = inputs.admin_version.filter(|v| !v.trim().is_empty()) else {
        return Ok(UpgradeDecision::Skip(SkipReason::AdminVersionUnknown));
    };

    let observed = inputs
        .observed_version
        .filter(|v| !v.trim().is_empty())
        .map(|v| parse_version(v).map(|parsed| (v, parsed)))
        .transpose()?;
    let admin = parse_version(admin_raw)?;
    let requested = parse_version(requested_raw)?;

    if !versions_match(&requested, &admin) {
        return Ok(UpgradeDecision::Skip(SkipReason::VersionGate {
            requested: requested_raw.to_string(),
            admin: admin_raw.to_string(),
        }));
    }

    let installed_chart = inputs.installed.chart_version.as_str();
    if installed_chart.trim() == inputs.requested_chart_version.trim()
        && let Some((observed_raw, observed)) = &observed
        && !versions_match(observed, &admin)
    {
        return Ok(UpgradeDecision::Upgrade(UpgradeReason::WorkloadBehindAdmin {
            observed: observed_raw.to_string(),
            admin: admin_raw.to_string(),
        }));
    }

    if !chart_is_current(installed_chart, inputs.requested_chart_version, requested_raw) {
        return Ok(UpgradeDecision::Upgrade(UpgradeReason::ChartVersion {
            installed: installed_chart.to_string(),
            requested: inputs.requested_chart_version.to_string(),
        }));
    }

    if inputs.installed.status == ReleaseStatus::Failed {
        return Ok(UpgradeDecision::Upgrade(UpgradeReason::FailedRelease));
    }

    if inputs.installed.values != *inputs.values {
        return Ok(UpgradeDecision::Upgrade(UpgradeReason::ValuesChanged));
    }

    Ok(UpgradeDecision::Skip(SkipReason::UpToDate))
}

/// Boolean form of [`decide_upgrade`]
pub fn should_upgrade(inputs: &UpgradeInputs<'_>) -> Result<bool, ReleaseError> {
    decide_upgrade(inputs).map(|decision| decision.should_upgrade())
}
