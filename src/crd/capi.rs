//! Read-only view of the Cluster API `Cluster` resource
//!
//! Only metadata is consumed. Unknown spec fields are ignored and the status is
//! kept as a document so any Cluster API release serving `v1beta1` is accepted.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::common::ClusterReference;
use crate::document::Document;

#[derive(CustomResource, Serialize, Deserialize, Clone, Debug, Default, PartialEq, JsonSchema)]
#[kube(
    group = "cluster.x-k8s.io",
    version = "v1beta1",
    kind = "Cluster",
    plural = "clusters",
    namespaced,
    status = "Document"
)]
#[serde(rename_all = "camelCase")]
pub struct ClusterSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paused: Option<bool>,
}

pub const CLUSTER_API_VERSION: &str = "cluster.x-k8s.io/v1beta1";
pub const CLUSTER_KIND: &str = "Cluster";

impl Cluster {
    /// Reference to this cluster as stored on a binding
    pub fn reference(&self) -> ClusterReference {
        ClusterReference {
            api_version: CLUSTER_API_VERSION.to_string(),
            kind: CLUSTER_KIND.to_string(),
            name: self.metadata.name.clone().unwrap_or_default(),
            namespace: self.metadata.namespace.clone().unwrap_or_default(),
        }
    }
}
