//! Wait condition helpers for fleets and bindings

use kube::runtime::wait::{Condition, await_condition};
use kube::{Api, Resource};
use serde::de::DeserializeOwned;
use std::fmt::Debug;
use std::time::Duration;
use thiserror::Error;
use verrazzano_fleet_operator::crd::{VerrazzanoFleet, VerrazzanoFleetBinding};

#[derive(Error, Debug)]
pub enum WaitError {
    #[error("Timeout waiting for condition")]
    Timeout,

    #[error("Watch error: {0}")]
    Watch(#[from] kube::runtime::wait::Error),

    #[error("Resource not found after wait")]
    ResourceNotFound,
}

/// Condition that checks if a fleet condition has a given status
pub fn fleet_condition(type_: &str, expected_status: &str) -> impl Condition<VerrazzanoFleet> {
    let cond_type = type_.to_string();
    let status = expected_status.to_string();
    move |obj: Option<&VerrazzanoFleet>| {
        obj.and_then(|fleet| fleet.status.as_ref())
            .is_some_and(|s| {
                s.conditions
                    .iter()
                    .any(|c| c.type_ == cond_type && c.status == status)
            })
    }
}

/// Condition that checks the fleet carries `finalizer`
pub fn has_finalizer(finalizer: &str) -> impl Condition<VerrazzanoFleet> {
    let finalizer = finalizer.to_string();
    move |obj: Option<&VerrazzanoFleet>| {
        obj.and_then(|fleet| fleet.metadata.finalizers.as_ref())
            .is_some_and(|f| f.contains(&finalizer))
    }
}

/// Condition that checks the binding's workload spec requests `version`
pub fn binding_requests_version(version: &str) -> impl Condition<VerrazzanoFleetBinding> {
    let version = version.to_string();
    move |obj: Option<&VerrazzanoFleetBinding>| {
        obj.and_then(|b| b.spec.workload_spec())
            .and_then(|s| s.requested_version())
            .is_some_and(|v| v == version)
    }
}

/// Condition that holds once the object no longer exists
pub fn is_gone<K>() -> impl Condition<K> {
    |obj: Option<&K>| obj.is_none()
}

/// Wait for `condition` on `name`, returning the object that satisfied it
pub async fn wait_for<K, C>(
    api: &Api<K>,
    name: &str,
    condition: C,
    timeout: Duration,
) -> Result<Option<K>, WaitError>
where
    K: Resource + Clone + DeserializeOwned + Debug + Send + 'static,
    C: Condition<K>,
{
    tokio::time::timeout(timeout, await_condition(api.clone(), name, condition))
        .await
        .map_err(|_| WaitError::Timeout)?
        .map_err(WaitError::from)
}

/// Like [`wait_for`] but the object must still exist
pub async fn wait_for_present<K, C>(
    api: &Api<K>,
    name: &str,
    condition: C,
    timeout: Duration,
) -> Result<K, WaitError>
where
    K: Resource + Clone + DeserializeOwned + Debug + Send + 'static,
    C: Condition<K>,
{
    wait_for(api, name, condition, timeout)
        .await?
        .ok_or(WaitError::ResourceNotFound)
}
