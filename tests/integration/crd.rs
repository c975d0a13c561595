//! CRD installation helpers for integration tests

use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
use kube::api::{Patch, PatchParams};
use kube::runtime::wait::{await_condition, conditions};
use kube::{Api, Client, CustomResourceExt, ResourceExt};
use std::time::Duration;
use thiserror::Error;
use verrazzano_fleet_operator::crd::{Cluster, VerrazzanoFleet, VerrazzanoFleetBinding};

#[derive(Error, Debug)]
pub enum CrdError {
    #[error("Kubernetes API error: {0}")]
    KubeError(#[from] kube::Error),

    #[error("CRD establishment timeout")]
    EstablishmentTimeout,

    #[error("Wait error: {0}")]
    WaitError(#[from] kube::runtime::wait::Error),
}

/// Install the fleet and binding CRDs, and a minimal Cluster CRD when Cluster
/// API is not installed
pub async fn install_crds(client: Client) -> Result<(), CrdError> {
    let crds: Api<CustomResourceDefinition> = Api::all(client);

    apply_crd(&crds, VerrazzanoFleet::crd()).await?;
    apply_crd(&crds, VerrazzanoFleetBinding::crd()).await?;

    let cluster_crd = Cluster::crd();
    if crds.get_opt(&cluster_crd.name_any()).await?.is_none() {
        apply_crd(&crds, cluster_crd).await?;
    } else {
        tracing::info!("Cluster API CRD already present");
    }

    Ok(())
}

async fn apply_crd(
    crds: &Api<CustomResourceDefinition>,
    crd: CustomResourceDefinition,
) -> Result<(), CrdError> {
    let name = crd.name_any();
    let params = PatchParams::apply("integration-test").force();

    tracing::info!("Installing CRD {}...", name);
    crds.patch(&name, &params, &Patch::Apply(&crd)).await?;

    // Wait for CRD to be established (up to 30 seconds)
    let establish = await_condition(crds.clone(), &name, conditions::is_crd_established());
    tokio::time::timeout(Duration::from_secs(30), establish)
        .await
        .map_err(|_| CrdError::EstablishmentTimeout)??;

    tracing::info!("CRD {} installed and established", name);
    Ok(())
}
