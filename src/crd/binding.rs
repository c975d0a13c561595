use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::common::{
    ClusterReference, Condition, ImageSpec, PrivateRegistrySpec, SecretName, VerrazzanoSpec,
};
use crate::document::Document;

/// VerrazzanoFleetBinding carries one fleet's desired state for one workload cluster
#[derive(CustomResource, Serialize, Deserialize, Clone, Debug, PartialEq, JsonSchema)]
#[kube(
    group = "addons.cluster.x-k8s.io",
    version = "v1alpha1",
    kind = "VerrazzanoFleetBinding",
    plural = "verrazzanofleetbindings",
    shortname = "vfb",
    shortname = "vfbs",
    category = "cluster-api",
    namespaced,
    derive = "PartialEq",
    status = "VerrazzanoFleetBindingStatus",
    printcolumn = r#"{"name":"Cluster", "type":"string", "jsonPath":".spec.clusterRef.name"}"#,
    printcolumn = r#"{"name":"Ready", "type":"string", "jsonPath":".status.conditions[?(@.type=='Ready')].status"}"#,
    printcolumn = r#"{"name":"Reason", "type":"string", "priority":1, "jsonPath":".status.conditions[?(@.type=='Ready')].reason"}"#,
    printcolumn = r#"{"name":"Operator", "type":"string", "priority":1, "jsonPath":".status.conditions[?(@.type=='VerrazzanoOperatorReady')].status"}"#,
    printcolumn = r#"{"name":"Revision", "type":"string", "priority":1, "jsonPath":".status.revision"}"#,
    printcolumn = r#"{"name":"Verrazzano", "type":"string", "priority":1, "jsonPath":".status.verrazzano.state"}"#,
    printcolumn = r#"{"name":"Age", "type":"date", "jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct VerrazzanoFleetBindingSpec {
    /// Cluster the platform operator is installed on
    pub cluster_ref: ClusterReference,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<ImageSpec>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_pull_secrets: Option<Vec<SecretName>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verrazzano: Option<VerrazzanoSpec>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub private_registry: Option<PrivateRegistrySpec>,
}

impl VerrazzanoFleetBindingSpec {
    /// Spec of the Verrazzano resource to apply remotely, if one was given
    pub fn workload_spec(&self) -> Option<&Document> {
        self.verrazzano.as_ref().and_then(|v| v.spec.as_ref())
    }

    pub fn private_registry_enabled(&self) -> bool {
        self.private_registry.as_ref().is_some_and(|p| p.enabled)
    }
}

/// Status of the VerrazzanoFleetBinding
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct VerrazzanoFleetBindingStatus {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,

    /// Status of the platform operator release
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,

    /// Revision of the platform operator release
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revision: Option<i64>,

    /// Verrazzano as observed on the workload cluster
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verrazzano: Option<VerrazzanoStatus>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct VerrazzanoStatus {
    /// Component health summary, e.g. `21/21`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub components_available: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
}

impl VerrazzanoStatus {
    /// Read the handful of status fields the operator reports from a remote `Verrazzano` object
    pub fn from_object(object: &Document) -> Self {
        let field = |name: &str| object.get_str(&["status", name]).map(str::to_string);
        Self {
            components_available: field("available"),
            version: field("version"),
            state: field("state"),
        }
    }
}
