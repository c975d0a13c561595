//! Hub cluster reads and writes used by the reconcilers

use async_trait::async_trait;
use kube::api::{DeleteParams, ListParams, Patch, PatchParams, PostParams};
use kube::{Api, Client};
#[cfg(test)]
use mockall::automock;
use serde_json::json;
use tracing::debug;

use super::error::{Error, Result};
use crate::crd::{
    Cluster, VerrazzanoFleet, VerrazzanoFleetBinding, VerrazzanoFleetBindingStatus,
    VerrazzanoFleetStatus,
};

/// Field manager for writes to the hub cluster
pub const MANAGER: &str = "verrazzano-fleet-operator";

/// Object registry for fleets, bindings and Cluster API clusters
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Registry: Send + Sync {
    /// Bindings in `namespace` matching a label selector
    async fn list_bindings(
        &self,
        namespace: &str,
        selector: &str,
    ) -> Result<Vec<VerrazzanoFleetBinding>>;

    async fn create_binding(
        &self,
        binding: &VerrazzanoFleetBinding,
    ) -> Result<VerrazzanoFleetBinding>;

    /// Replace a binding; fails with a conflict when its resourceVersion is stale
    async fn replace_binding(
        &self,
        binding: &VerrazzanoFleetBinding,
    ) -> Result<VerrazzanoFleetBinding>;

    async fn delete_binding(&self, namespace: &str, name: &str) -> Result<()>;

    async fn patch_binding_status(
        &self,
        namespace: &str,
        name: &str,
        status: &VerrazzanoFleetBindingStatus,
    ) -> Result<()>;

    async fn patch_fleet_status(
        &self,
        namespace: &str,
        name: &str,
        status: &VerrazzanoFleetStatus,
    ) -> Result<()>;

    /// Write the full finalizer list, guarded by `resource_version`
    async fn set_binding_finalizers(
        &self,
        namespace: &str,
        name: &str,
        finalizers: Vec<String>,
        resource_version: Option<String>,
    ) -> Result<()>;

    /// Write the full finalizer list, guarded by `resource_version`
    async fn set_fleet_finalizers(
        &self,
        namespace: &str,
        name: &str,
        finalizers: Vec<String>,
        resource_version: Option<String>,
    ) -> Result<()>;

    /// A Cluster API cluster, `None` when it does not exist
    async fn get_cluster(&self, namespace: &str, name: &str) -> Result<Option<Cluster>>;
}

/// [`Registry`] backed by the hub cluster's API server
#[derive(Clone)]
pub struct KubeRegistry {
    client: Client,
}

impl KubeRegistry {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn bindings(&self, namespace: &str) -> Api<VerrazzanoFleetBinding> {
        Api::namespaced(self.client.clone(), namespace)
    }

    fn fleets(&self, namespace: &str) -> Api<VerrazzanoFleet> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

fn finalizer_patch(finalizers: Vec<String>, resource_version: Option<String>) -> serde_json::Value {
    let finalizers = if finalizers.is_empty() {
        serde_json::Value::Null
    } else {
        json!(finalizers)
    };
    json!({
        "metadata": {
            "finalizers": finalizers,
            "resourceVersion": resource_version,
        }
    })
}

#[async_trait]
impl Registry for KubeRegistry {
    async fn list_bindings(
        &self,
        namespace: &str,
        selector: &str,
    ) -> Result<Vec<VerrazzanoFleetBinding>> {
        let list = self
            .bindings(namespace)
            .list(&ListParams::default().labels(selector))
            .await?;
        Ok(list.items)
    }

    async fn create_binding(
        &self,
        binding: &VerrazzanoFleetBinding,
    ) -> Result<VerrazzanoFleetBinding> {
        let namespace = binding
            .metadata
            .namespace
            .as_deref()
            .ok_or(Error::MissingObjectKey(".metadata.namespace"))?;
        Ok(self
            .bindings(namespace)
            .create(&PostParams::default(), binding)
            .await?)
    }

    async fn replace_binding(
        &self,
        binding: &VerrazzanoFleetBinding,
    ) -> Result<VerrazzanoFleetBinding> {
        let namespace = binding
            .metadata
            .namespace
            .as_deref()
            .ok_or(Error::MissingObjectKey(".metadata.namespace"))?;
        let name = binding
            .metadata
            .name
            .as_deref()
            .ok_or(Error::MissingObjectKey(".metadata.name"))?;
        Ok(self
            .bindings(namespace)
            .replace(name, &PostParams::default(), binding)
            .await?)
    }

    async fn delete_binding(&self, namespace: &str, name: &str) -> Result<()> {
        self.bindings(namespace)
            .delete(name, &DeleteParams::default())
            .await?;
        debug!(name, namespace, "binding deleted");
        Ok(())
    }

    async fn patch_binding_status(
        &self,
        namespace: &str,
        name: &str,
        status: &VerrazzanoFleetBindingStatus,
    ) -> Result<()> {
        let patch = json!({ "status": status });
        self.bindings(namespace)
            .patch_status(name, &PatchParams::apply(MANAGER), &Patch::Merge(&patch))
            .await?;
        Ok(())
    }

    async fn patch_fleet_status(
        &self,
        namespace: &str,
        name: &str,
        status: &VerrazzanoFleetStatus,
    ) -> Result<()> {
        let patch = json!({ "status": status });
        self.fleets(namespace)
            .patch_status(name, &PatchParams::apply(MANAGER), &Patch::Merge(&patch))
            .await?;
        Ok(())
    }

    async fn set_binding_finalizers(
        &self,
        namespace: &str,
        name: &str,
        finalizers: Vec<String>,
        resource_version: Option<String>,
    ) -> Result<()> {
        let patch = finalizer_patch(finalizers, resource_version);
        self.bindings(namespace)
            .patch(name, &PatchParams::apply(MANAGER), &Patch::Merge(&patch))
            .await?;
        Ok(())
    }

    async fn set_fleet_finalizers(
        &self,
        namespace: &str,
        name: &str,
        finalizers: Vec<String>,
        resource_version: Option<String>,
    ) -> Result<()> {
        let patch = finalizer_patch(finalizers, resource_version);
        self.fleets(namespace)
            .patch(name, &PatchParams::apply(MANAGER), &Patch::Merge(&patch))
            .await?;
        Ok(())
    }

    async fn get_cluster(&self, namespace: &str, name: &str) -> Result<Option<Cluster>> {
        let api: Api<Cluster> = Api::namespaced(self.client.clone(), namespace);
        Ok(api.get_opt(name).await?)
    }
}

/// Finalizers of an object with `finalizer` added, `None` if already present
pub fn with_finalizer(current: &[String], finalizer: &str) -> Option<Vec<String>> {
    if current.iter().any(|f| f == finalizer) {
        return None;
    }
    let mut finalizers = current.to_vec();
    finalizers.push(finalizer.to_string());
    Some(finalizers)
}

/// Finalizers of an object with `finalizer` removed, `None` if absent
pub fn without_finalizer(current: &[String], finalizer: &str) -> Option<Vec<String>> {
    if !current.iter().any(|f| f == finalizer) {
        return None;
    }
    Some(current.iter().filter(|f| *f != finalizer).cloned().collect())
}
