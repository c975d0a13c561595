use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::document::Document;

/// API group shared by the fleet and binding resources
pub const GROUP: &str = "addons.cluster.x-k8s.io";

/// Label naming the workload cluster a binding targets
pub const CLUSTER_NAME_LABEL: &str = "cluster.x-k8s.io/cluster-name";

/// Label naming the fleet that owns a binding
pub const FLEET_NAME_LABEL: &str =
    "verrazzanofleetbinding.addons.cluster.x-k8s.io/verrazzanofleet-name";

/// Finalizer guarding fleet deletion until its bindings are gone
pub const FLEET_FINALIZER: &str = "verrazzanofleet.addons.cluster.x-k8s.io";

/// Finalizer guarding binding deletion until the workload cluster is cleaned up
pub const BINDING_FINALIZER: &str = "verrazzanofleetbinding.addons.cluster.x-k8s.io";

/// Pull policy applied when an image override leaves it empty
pub const DEFAULT_PULL_POLICY: &str = "IfNotPresent";

/// Image override for the platform operator
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ImageSpec {
    /// Repository holding the operator image, e.g. `ghcr.io/verrazzano`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repository: Option<String>,

    /// Image tag
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,

    /// Kubernetes image pull policy
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pull_policy: Option<String>,
}

/// Reference to a pull secret in the platform operator namespace
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq, JsonSchema)]
pub struct SecretName {
    pub name: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PrivateRegistrySpec {
    #[serde(default)]
    pub enabled: bool,
}

/// Verrazzano resource configuration to apply on the workload cluster
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct VerrazzanoSpec {
    /// Spec of the `Verrazzano` resource, passed through untouched
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spec: Option<Document>,
}

/// Reference to a Cluster API cluster
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ClusterReference {
    #[serde(default)]
    pub api_version: String,

    #[serde(default)]
    pub kind: String,

    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub namespace: String,
}

impl ClusterReference {
    /// Registry key used to compare cluster selections
    pub fn key(&self) -> String {
        format!("{}/{}", self.namespace, self.name)
    }
}

/// Status condition with a severity, in the Cluster API style
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// Type of condition
    #[serde(rename = "type")]
    pub type_: String,

    /// Status of the condition: True, False, or Unknown
    pub status: String,

    /// Error, Warning or Info when the condition is False
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<String>,

    /// Reason for the condition's last transition
    #[serde(default)]
    pub reason: String,

    /// Human-readable message
    #[serde(default)]
    pub message: String,

    /// Last time the condition transitioned
    pub last_transition_time: String,
}

impl Condition {
    pub fn is_true(&self) -> bool {
        self.status == "True"
    }
}

/// Find a condition by type
pub fn find_condition<'a>(conditions: &'a [Condition], type_: &str) -> Option<&'a Condition> {
    conditions.iter().find(|c| c.type_ == type_)
}
