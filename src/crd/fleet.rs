use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::common::{Condition, ImageSpec, PrivateRegistrySpec, SecretName, VerrazzanoSpec};

/// VerrazzanoFleet declares the Verrazzano installation wanted on a set of workload clusters
#[derive(CustomResource, Serialize, Deserialize, Clone, Debug, PartialEq, JsonSchema)]
#[kube(
    group = "addons.cluster.x-k8s.io",
    version = "v1alpha1",
    kind = "VerrazzanoFleet",
    plural = "verrazzanofleets",
    shortname = "vf",
    shortname = "vfs",
    category = "cluster-api",
    namespaced,
    status = "VerrazzanoFleetStatus",
    printcolumn = r#"{"name":"Ready", "type":"string", "jsonPath":".status.conditions[?(@.type=='Ready')].status"}"#,
    printcolumn = r#"{"name":"Reason", "type":"string", "jsonPath":".status.conditions[?(@.type=='Ready')].reason"}"#,
    printcolumn = r#"{"name":"Message", "type":"string", "priority":1, "jsonPath":".status.conditions[?(@.type=='Ready')].message"}"#,
    printcolumn = r#"{"name":"Age", "type":"date", "jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct VerrazzanoFleetSpec {
    /// Selects the workload cluster this fleet installs onto
    pub cluster_selector: ClusterSelector,

    /// Platform operator image override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<ImageSpec>,

    /// Pull secrets for authenticated registries
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_pull_secrets: Option<Vec<SecretName>>,

    /// Verrazzano resource to create on the workload cluster
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verrazzano: Option<VerrazzanoSpec>,

    /// Private registry settings
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub private_registry: Option<PrivateRegistrySpec>,
}

/// Cluster selection; a single cluster is selected by name in the fleet's namespace
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq, JsonSchema)]
pub struct ClusterSelector {
    #[serde(default)]
    pub name: String,
}

/// Status of the VerrazzanoFleet
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct VerrazzanoFleetStatus {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,
}
