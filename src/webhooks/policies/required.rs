//! Required fields on fleets and bindings
//!
//! Checked on create and on every update, independently of the update
//! allow-list.

use super::FieldError;
use crate::crd::{
    CLUSTER_API_VERSION, CLUSTER_KIND, ImageSpec, PrivateRegistrySpec, VerrazzanoFleetBindingSpec,
    VerrazzanoFleetSpec, VerrazzanoSpec,
};

/// Field errors of a fleet spec
pub fn validate_fleet(spec: &VerrazzanoFleetSpec) -> Vec<FieldError> {
    let mut errors = shared(
        spec.private_registry.as_ref(),
        spec.image.as_ref(),
        spec.verrazzano.as_ref(),
    );
    if spec.cluster_selector.name.trim().is_empty() {
        errors.push(FieldError::required(
            "spec.clusterSelector",
            "a cluster name is required",
        ));
    }
    errors
}

/// Field errors of a binding spec; the cluster must live in `namespace`
pub fn validate_binding(spec: &VerrazzanoFleetBindingSpec, namespace: &str) -> Vec<FieldError> {
    let mut errors = shared(
        spec.private_registry.as_ref(),
        spec.image.as_ref(),
        spec.verrazzano.as_ref(),
    );
    let cluster = &spec.cluster_ref;
    if cluster.namespace != namespace {
        errors.push(FieldError::required(
            "spec.clusterRef",
            "cluster reference needs to point to a cluster in the same namespace as the binding",
        ));
    }
    if cluster.api_version != CLUSTER_API_VERSION {
        errors.push(FieldError::required(
            "spec.clusterRef",
            &format!("cluster reference api version needs to be {CLUSTER_API_VERSION}"),
        ));
    }
    if cluster.kind != CLUSTER_KIND {
        errors.push(FieldError::required(
            "spec.clusterRef",
            &format!("cluster reference kind needs to be {CLUSTER_KIND}"),
        ));
    }
    errors
}

fn shared(
    registry: Option<&PrivateRegistrySpec>,
    image: Option<&ImageSpec>,
    verrazzano: Option<&VerrazzanoSpec>,
) -> Vec<FieldError> {
    let mut errors = Vec::new();

    if registry.is_some_and(|r| r.enabled) {
        match image {
            None => errors.push(FieldError::required(
                "spec.image",
                "image needs to be set if private registry is enabled",
            )),
            Some(image) => {
                if blank(image.repository.as_deref()) {
                    errors.push(FieldError::required(
                        "spec.image.repository",
                        "image repository cannot be empty if image is specified",
                    ));
                }
                if blank(image.tag.as_deref()) {
                    errors.push(FieldError::required(
                        "spec.image.tag",
                        "image tag cannot be empty if image is specified",
                    ));
                }
            }
        }
    }

    if verrazzano.is_some_and(|v| v.spec.is_none()) {
        errors.push(FieldError::required(
            "spec.verrazzano.spec",
            "verrazzano spec is required",
        ));
    }

    errors
}

fn blank(value: Option<&str>) -> bool {
    value.is_none_or(|v| v.is_empty())
}
