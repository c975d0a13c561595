//! Projection of a fleet onto one workload cluster
//!
//! A binding copies the fleet-controlled fields at creation time and is kept in
//! step afterwards. Fields the fleet leaves unset are never cleared on the
//! binding.

use std::collections::BTreeMap;

use kube::api::ObjectMeta;
use kube::{Resource, ResourceExt};

use super::error::{Error, Result};
use crate::crd::{
    CLUSTER_NAME_LABEL, ClusterReference, FLEET_NAME_LABEL, VerrazzanoFleet,
    VerrazzanoFleetBinding, VerrazzanoFleetBindingSpec,
};

/// Binding fields owned by the fleet
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FleetField {
    Image,
    ImagePullSecrets,
    Verrazzano,
    PrivateRegistry,
}

/// What the caller must write
#[derive(Clone, Debug, PartialEq)]
pub enum Projection {
    Create(VerrazzanoFleetBinding),
    Update(VerrazzanoFleetBinding),
}

/// Fleet-controlled fields whose value on the fleet differs from the binding.
///
/// A field unset on the fleet never counts as a difference. The Verrazzano
/// field only counts when the fleet carries a Verrazzano spec.
pub fn changed_fields(
    binding: &VerrazzanoFleetBindingSpec,
    fleet: &VerrazzanoFleet,
) -> Vec<FleetField> {
    let spec = &fleet.spec;
    let mut changed = Vec::new();

    if spec.image.as_ref().is_some_and(|image| binding.image.as_ref() != Some(image)) {
        changed.push(FleetField::Image);
    }
    if spec
        .image_pull_secrets
        .as_ref()
        .is_some_and(|secrets| binding.image_pull_secrets.as_ref() != Some(secrets))
    {
        changed.push(FleetField::ImagePullSecrets);
    }
    if let Some(wanted) = spec.verrazzano.as_ref().and_then(|v| v.spec.as_ref())
        && binding.workload_spec() != Some(wanted)
    {
        changed.push(FleetField::Verrazzano);
    }
    if spec
        .private_registry
        .as_ref()
        .is_some_and(|registry| binding.private_registry.as_ref() != Some(registry))
    {
        changed.push(FleetField::PrivateRegistry);
    }

    changed
}

/// Whether the binding has drifted from its fleet
pub fn should_reinstall(binding: &VerrazzanoFleetBindingSpec, fleet: &VerrazzanoFleet) -> bool {
    !changed_fields(binding, fleet).is_empty()
}

/// Project `fleet` onto `cluster`.
///
/// Returns `None` when `existing` already matches the fleet.
pub fn project(
    existing: Option<&VerrazzanoFleetBinding>,
    fleet: &VerrazzanoFleet,
    cluster: &ClusterReference,
) -> Result<Option<Projection>> {
    match existing {
        None => new_binding(fleet, cluster).map(|b| Some(Projection::Create(b))),
        Some(binding) => {
            let changed = changed_fields(&binding.spec, fleet);
            if changed.is_empty() {
                return Ok(None);
            }
            let mut updated = binding.clone();
            apply_fleet_fields(&mut updated.spec, fleet);
            Ok(Some(Projection::Update(updated)))
        }
    }
}

/// Labels identifying the binding for a fleet and cluster
pub fn binding_labels(fleet_name: &str, cluster_name: &str) -> BTreeMap<String, String> {
    BTreeMap::from([
        (CLUSTER_NAME_LABEL.to_string(), cluster_name.to_string()),
        (FLEET_NAME_LABEL.to_string(), fleet_name.to_string()),
    ])
}

/// Label selector for the binding of a fleet and cluster
pub fn binding_selector(fleet_name: &str, cluster_name: &str) -> String {
    format!("{CLUSTER_NAME_LABEL}={cluster_name},{FLEET_NAME_LABEL}={fleet_name}")
}

/// Label selector for every binding of a fleet
pub fn fleet_selector(fleet_name: &str) -> String {
    format!("{FLEET_NAME_LABEL}={fleet_name}")
}

fn new_binding(
    fleet: &VerrazzanoFleet,
    cluster: &ClusterReference,
) -> Result<VerrazzanoFleetBinding> {
    let owner = fleet
        .controller_owner_ref(&())
        .ok_or(Error::MissingObjectKey(".metadata.uid"))?;

    let mut labels = fleet.labels().clone();
    labels.extend(binding_labels(&fleet.name_any(), &cluster.name));

    let spec = VerrazzanoFleetBindingSpec {
        cluster_ref: cluster.clone(),
        image: fleet.spec.image.clone(),
        image_pull_secrets: fleet.spec.image_pull_secrets.clone(),
        verrazzano: fleet.spec.verrazzano.clone(),
        private_registry: fleet.spec.private_registry.clone(),
    };

    Ok(VerrazzanoFleetBinding {
        metadata: ObjectMeta {
            name: Some(cluster.name.clone()),
            namespace: fleet.namespace(),
            labels: Some(labels),
            owner_references: Some(vec![owner]),
            ..Default::default()
        },
        spec,
        status: None,
    })
}

/// Copy the fleet-controlled fields the fleet sets onto an existing binding
fn apply_fleet_fields(spec: &mut VerrazzanoFleetBindingSpec, fleet: &VerrazzanoFleet) {
    let source = &fleet.spec;
    if let Some(image) = &source.image {
        spec.image = Some(image.clone());
    }
    if let Some(secrets) = &source.image_pull_secrets {
        spec.image_pull_secrets = Some(secrets.clone());
    }
    if let Some(verrazzano) = source.verrazzano.as_ref().filter(|v| v.spec.is_some()) {
        spec.verrazzano = Some(verrazzano.clone());
    }
    if let Some(registry) = &source.private_registry {
        spec.private_registry = Some(registry.clone());
    }
}
