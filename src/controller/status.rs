//! Status conditions for fleets and bindings
//!
//! Conditions follow the Cluster API convention: a False condition carries a
//! severity, and `Ready` summarises the others.

use std::fmt;

use chrono::Utc;

use crate::crd::Condition;

/// Condition types
pub mod condition_types {
    /// Summary of the other conditions
    pub const READY: &str = "Ready";
    /// The workload cluster and its kubeconfig could be read
    pub const CLUSTER_AVAILABLE: &str = "ClusterAvailable";
    /// The platform operator is installed and its pods are ready
    pub const VERRAZZANO_OPERATOR_READY: &str = "VerrazzanoOperatorReady";
    /// The fleet's bindings match its spec
    pub const FLEET_BINDING_SPECS_READY: &str = "VerrazzanoFleetBindingSpecsReady";
}

/// Condition status values
pub mod condition_status {
    pub const TRUE: &str = "True";
    pub const FALSE: &str = "False";
    pub const UNKNOWN: &str = "Unknown";
}

/// Condition reasons
pub mod reasons {
    pub const GET_CLUSTER_FAILED: &str = "GetClusterFailed";
    pub const GET_KUBECONFIG_FAILED: &str = "GetKubeconfigFailed";
    pub const PREPARING_TO_HELM_INSTALL: &str = "PreparingToHelmInstall";
    pub const HELM_INSTALL_OR_UPGRADE_FAILED: &str = "HelmInstallOrUpgradeFailed";
    pub const HELM_RELEASE_PENDING: &str = "HelmReleasePending";
    pub const HELM_RELEASE_DELETED: &str = "HelmReleaseDeleted";
    pub const HELM_RELEASE_DELETION_FAILED: &str = "HelmReleaseDeletionFailed";
    pub const OPERATOR_NOT_UP: &str = "VerrazzanoPlatformOperatorNotUP";
    pub const OPERATOR_NOT_RUNNING: &str = "VerrazzanoPlatformOperatorNotRunning";
    pub const OPERATOR_WEBHOOK_NOT_RUNNING: &str = "VerrazzanoPlatformOperatorWebhookNotRunning";
    pub const VERRAZZANO_DELETION_PENDING: &str = "VerrazzanoDeletionPending";

    pub const BINDING_CREATION_FAILED: &str = "VerrazzanoFleetBindingCreationFailed";
    pub const BINDING_DELETION_FAILED: &str = "VerrazzanoFleetBindingDeletionFailed";
    pub const BINDING_EXISTS: &str = "VerrazzanoFleetBindingExists";
    pub const CLUSTER_NOT_FOUND: &str = "ClusterNotFound";
}

/// Severity of a False condition
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "Info",
            Severity::Warning => "Warning",
            Severity::Error => "Error",
        }
    }

    fn parse(raw: Option<&str>) -> Option<Self> {
        match raw? {
            "Error" => Some(Severity::Error),
            "Warning" => Some(Severity::Warning),
            "Info" => Some(Severity::Info),
            _ => None,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Builder for creating and updating status conditions
#[derive(Clone, Debug, Default)]
pub struct ConditionBuilder {
    conditions: Vec<Condition>,
}

impl ConditionBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create from existing conditions
    pub fn from_existing(existing: Vec<Condition>) -> Self {
        Self {
            conditions: existing,
        }
    }

    /// Set a condition, updating if it exists or adding if it doesn't.
    ///
    /// The transition time only moves when the status changes.
    pub fn set_condition(
        &mut self,
        type_: &str,
        status: &str,
        severity: Option<Severity>,
        reason: &str,
        message: &str,
    ) -> &mut Self {
        let severity = severity.map(|s| s.to_string());
        if let Some(existing) = self.conditions.iter_mut().find(|c| c.type_ == type_) {
            if existing.status != status {
                existing.status = status.to_string();
                existing.last_transition_time = Utc::now().to_rfc3339();
            }
            existing.severity = severity;
            existing.reason = reason.to_string();
            existing.message = message.to_string();
        } else {
            self.conditions.push(Condition {
                type_: type_.to_string(),
                status: status.to_string(),
                severity,
                reason: reason.to_string(),
                message: message.to_string(),
                last_transition_time: Utc::now().to_rfc3339(),
            });
        }
        self
    }

    pub fn mark_true(&mut self, type_: &str) -> &mut Self {
        self.set_condition(type_, condition_status::TRUE, None, "", "")
    }

    pub fn mark_false(
        &mut self,
        type_: &str,
        reason: &str,
        severity: Severity,
        message: &str,
    ) -> &mut Self {
        self.set_condition(type_, condition_status::FALSE, Some(severity), reason, message)
    }

    /// Add a condition only if none of that type exists yet
    pub fn init_false(
        &mut self,
        type_: &str,
        reason: &str,
        severity: Severity,
        message: &str,
    ) -> &mut Self {
        if self.get(type_).is_none() {
            self.mark_false(type_, reason, severity, message);
        }
        self
    }

    /// Copy another condition under a different type
    pub fn mirror(&mut self, type_: &str, source: &Condition) -> &mut Self {
        let severity = Severity::parse(source.severity.as_deref());
        self.set_condition(type_, &source.status, severity, &source.reason, &source.message)
    }

    pub fn get(&self, type_: &str) -> Option<&Condition> {
        self.conditions.iter().find(|c| c.type_ == type_)
    }

    pub fn is_true(&self, type_: &str) -> bool {
        self.get(type_).is_some_and(Condition::is_true)
    }

    /// Set `Ready` from the given condition types.
    ///
    /// Ready is True when all present conditions are True. Otherwise it takes
    /// the reason, severity and message of the most severe False condition,
    /// the first one listed winning ties.
    pub fn summarize(&mut self, types: &[&str]) -> &mut Self {
        let present: Vec<Condition> = types
            .iter()
            .filter_map(|type_| self.get(type_).cloned())
            .collect();
        if present.is_empty() {
            return self;
        }

        let worst = present
            .iter()
            .filter(|c| !c.is_true())
            .fold(None::<&Condition>, |worst, candidate| match worst {
                Some(current)
                    if Severity::parse(current.severity.as_deref())
                        >= Severity::parse(candidate.severity.as_deref()) =>
                {
                    Some(current)
                }
                _ => Some(candidate),
            });

        match worst {
            Some(condition) => {
                let condition = condition.clone();
                self.mirror(condition_types::READY, &condition)
            }
            None => self.mark_true(condition_types::READY),
        }
    }

    /// Build the conditions list
    pub fn build(self) -> Vec<Condition> {
        self.conditions
    }
}
