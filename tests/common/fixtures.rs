//! Builders for fleets, bindings, clusters and releases
//!
//! ```rust,ignore
//! let fleet = FleetBuilder::new("fleet-a", "default", "c1")
//!     .with_version("1.6.0")
//!     .with_image("ghcr.io/verrazzano", "v1.6.0")
//!     .build();
//! let binding = BindingBuilder::new("c1", "default").with_version("1.6.0").build();
//! ```

use kube::core::ObjectMeta;
use serde_json::{Value, json};
use verrazzano_fleet_operator::crd::{
    CLUSTER_API_VERSION, CLUSTER_KIND, Cluster, ClusterReference, ClusterSelector, ClusterSpec,
    ImageSpec, PrivateRegistrySpec, SecretName, VerrazzanoFleet, VerrazzanoFleetBinding,
    VerrazzanoFleetBindingSpec, VerrazzanoFleetSpec, VerrazzanoSpec,
};
use verrazzano_fleet_operator::document::Document;
use verrazzano_fleet_operator::release::{Release, ReleaseStatus};

pub const TEST_UID: &str = "test-uid-12345";

/// Reference to a Cluster API cluster
pub fn cluster_ref(name: &str, namespace: &str) -> ClusterReference {
    ClusterReference {
        api_version: CLUSTER_API_VERSION.to_string(),
        kind: CLUSTER_KIND.to_string(),
        name: name.to_string(),
        namespace: namespace.to_string(),
    }
}

pub fn cluster(name: &str, namespace: &str) -> Cluster {
    let mut cluster = Cluster::new(name, ClusterSpec::default());
    cluster.metadata.namespace = Some(namespace.to_string());
    cluster
}

/// Verrazzano resource spec for the workload cluster
pub fn workload_spec(version: Option<&str>) -> Document {
    let mut spec = json!({"profile": "dev"});
    if let Some(version) = version {
        spec["version"] = Value::String(version.to_string());
    }
    Document::new(spec)
}

pub fn release(chart_version: &str, status: ReleaseStatus, values: Document) -> Release {
    Release {
        name: "verrazzano-platform-operator".to_string(),
        namespace: "verrazzano-install".to_string(),
        revision: 1,
        status,
        chart_version: chart_version.to_string(),
        values,
    }
}

/// Builder for VerrazzanoFleet resources
pub struct FleetBuilder {
    name: String,
    namespace: String,
    spec: VerrazzanoFleetSpec,
}

impl FleetBuilder {
    pub fn new(name: &str, namespace: &str, cluster: &str) -> Self {
        Self {
            name: name.to_string(),
            namespace: namespace.to_string(),
            spec: VerrazzanoFleetSpec {
                cluster_selector: ClusterSelector {
                    name: cluster.to_string(),
                },
                image: None,
                image_pull_secrets: None,
                verrazzano: None,
                private_registry: None,
            },
        }
    }

    pub fn with_image(mut self, repository: &str, tag: &str) -> Self {
        self.spec.image = Some(ImageSpec {
            repository: Some(repository.to_string()),
            tag: Some(tag.to_string()),
            pull_policy: None,
        });
        self
    }

    pub fn with_pull_secrets(mut self, names: &[&str]) -> Self {
        self.spec.image_pull_secrets = Some(
            names
                .iter()
                .map(|name| SecretName {
                    name: name.to_string(),
                })
                .collect(),
        );
        self
    }

    /// Verrazzano spec pinned to `version`
    pub fn with_version(mut self, version: &str) -> Self {
        self.spec.verrazzano = Some(VerrazzanoSpec {
            spec: Some(workload_spec(Some(version))),
        });
        self
    }

    pub fn with_workload_spec(mut self, spec: Document) -> Self {
        self.spec.verrazzano = Some(VerrazzanoSpec { spec: Some(spec) });
        self
    }

    pub fn with_private_registry(mut self, enabled: bool) -> Self {
        self.spec.private_registry = Some(PrivateRegistrySpec { enabled });
        self
    }

    pub fn spec(self) -> VerrazzanoFleetSpec {
        self.spec
    }

    pub fn build(self) -> VerrazzanoFleet {
        VerrazzanoFleet {
            metadata: ObjectMeta {
                name: Some(self.name),
                namespace: Some(self.namespace),
                uid: Some(TEST_UID.to_string()),
                generation: Some(1),
                ..Default::default()
            },
            spec: self.spec,
            status: None,
        }
    }
}

/// Builder for VerrazzanoFleetBinding resources
pub struct BindingBuilder {
    name: String,
    namespace: String,
    spec: VerrazzanoFleetBindingSpec,
}

impl BindingBuilder {
    pub fn new(name: &str, namespace: &str) -> Self {
        Self {
            name: name.to_string(),
            namespace: namespace.to_string(),
            spec: VerrazzanoFleetBindingSpec {
                cluster_ref: cluster_ref(name, namespace),
                image: None,
                image_pull_secrets: None,
                verrazzano: None,
                private_registry: None,
            },
        }
    }

    pub fn for_cluster(mut self, cluster: ClusterReference) -> Self {
        self.spec.cluster_ref = cluster;
        self
    }

    pub fn with_image(mut self, repository: Option<&str>, tag: Option<&str>) -> Self {
        self.spec.image = Some(ImageSpec {
            repository: repository.map(str::to_string),
            tag: tag.map(str::to_string),
            pull_policy: None,
        });
        self
    }

    pub fn with_version(mut self, version: &str) -> Self {
        self.spec.verrazzano = Some(VerrazzanoSpec {
            spec: Some(workload_spec(Some(version))),
        });
        self
    }

    pub fn with_private_registry(mut self, enabled: bool) -> Self {
        self.spec.private_registry = Some(PrivateRegistrySpec { enabled });
        self
    }

    pub fn spec(self) -> VerrazzanoFleetBindingSpec {
        self.spec
    }

    pub fn build(self) -> VerrazzanoFleetBinding {
        VerrazzanoFleetBinding {
            metadata: ObjectMeta {
                name: Some(self.name),
                namespace: Some(self.namespace),
                ..Default::default()
            },
            spec: self.spec,
            status: None,
        }
    }
}
