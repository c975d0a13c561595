pub mod config;
pub mod controller;
pub mod crd;
pub mod document;
pub mod health;
pub mod release;
pub mod remote;
pub mod webhooks;

pub use config::OperatorConfig;
pub use controller::{
    BackoffConfig, Context, Error, Result, error_policy, reconcile_binding, reconcile_fleet,
};
pub use crd::{Cluster, VerrazzanoFleet, VerrazzanoFleetBinding};
pub use health::{HealthState, Metrics};
pub use webhooks::{
    WEBHOOK_CERT_PATH, WEBHOOK_KEY_PATH, WEBHOOK_PORT, WebhookError, run_webhook_server,
};

use std::sync::Arc;

use futures::StreamExt;
use kube::runtime::Controller;
use kube::runtime::reflector::ObjectRef;
use kube::runtime::watcher::Config as WatcherConfig;
use kube::{Api, Client, Resource, ResourceExt};
use serde::de::DeserializeOwned;

/// Helper to create a namespaced or cluster-wide API based on scope.
fn scoped_api<T>(client: Client, namespace: Option<&str>) -> Api<T>
where
    T: Resource<Scope = k8s_openapi::NamespaceResourceScope>,
    <T as Resource>::DynamicType: Default,
    T: Clone + DeserializeOwned + std::fmt::Debug,
{
    match namespace {
        Some(ns) => Api::namespaced(client, ns),
        None => Api::all(client),
    }
}

/// Fleets whose selector names `cluster` in the cluster's namespace
pub fn fleets_for_cluster(
    fleets: &[Arc<VerrazzanoFleet>],
    cluster: &Cluster,
) -> Vec<ObjectRef<VerrazzanoFleet>> {
    let name = cluster.name_any();
    let namespace = cluster.namespace();
    fleets
        .iter()
        .filter(|fleet| fleet.namespace() == namespace && fleet.spec.cluster_selector.name == name)
        .map(|fleet| ObjectRef::from_obj(fleet.as_ref()))
        .collect()
}

fn log_controller_error<E: std::fmt::Debug>(
    kind: &str,
    err: &kube::runtime::controller::Error<Error, E>,
) {
    // A watch event for an object deleted since it was queued is expected
    let is_not_found = matches!(
        err,
        kube::runtime::controller::Error::ReconcilerFailed(e, _) if e.is_not_found()
    );
    if is_not_found {
        tracing::debug!("{} no longer exists: {:?}", kind, err);
    } else {
        tracing::error!("{} reconciliation error: {:?}", kind, err);
    }
}

/// Run the VerrazzanoFleet controller.
///
/// Watches fleets, the bindings they own, and the Cluster API clusters they
/// select. Scoped to `WATCH_NAMESPACE` when it is set.
pub async fn run_fleet_controller(client: Client, ctx: Arc<Context>) {
    let namespace = ctx.config.watch_namespace.clone();
    let namespace = namespace.as_deref();
    tracing::info!(
        "Starting controller for VerrazzanoFleet resources (scope: {})",
        namespace.unwrap_or("cluster-wide")
    );

    let fleets: Api<VerrazzanoFleet> = scoped_api(client.clone(), namespace);
    let bindings: Api<VerrazzanoFleetBinding> = scoped_api(client.clone(), namespace);
    let clusters: Api<Cluster> = scoped_api(client.clone(), namespace);

    let watcher_config = WatcherConfig::default().any_semantic();

    let controller = Controller::new(fleets, watcher_config.clone());
    let store = controller.store();
    controller
        .owns(bindings, watcher_config.clone())
        .watches(clusters, watcher_config, move |cluster: Cluster| {
            fleets_for_cluster(&store.state(), &cluster)
        })
        .run(reconcile_fleet, error_policy, ctx)
        .for_each(|result| async move {
            match result {
                Ok((obj, _action)) => tracing::debug!("Reconciled fleet: {}", obj.name),
                Err(e) => log_controller_error("VerrazzanoFleet", &e),
            }
        })
        .await;

    tracing::error!("Fleet controller stream ended unexpectedly");
}

/// Run the VerrazzanoFleetBinding controller.
///
/// Successful passes requeue periodically so remote drift is picked up.
pub async fn run_binding_controller(client: Client, ctx: Arc<Context>) {
    let namespace = ctx.config.watch_namespace.clone();
    let namespace = namespace.as_deref();
    tracing::info!(
        "Starting controller for VerrazzanoFleetBinding resources (scope: {})",
        namespace.unwrap_or("cluster-wide")
    );

    let bindings: Api<VerrazzanoFleetBinding> = scoped_api(client, namespace);
    let watcher_config = WatcherConfig::default().any_semantic();

    Controller::new(bindings, watcher_config)
        .run(reconcile_binding, error_policy, ctx)
        .for_each(|result| async move {
            match result {
                Ok((obj, _action)) => tracing::debug!("Reconciled binding: {}", obj.name),
                Err(e) => log_controller_error("VerrazzanoFleetBinding", &e),
            }
        })
        .await;

    tracing::error!("Binding controller stream ended unexpectedly");
}
