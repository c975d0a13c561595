//! Clients for a single workload cluster

use std::sync::Arc;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Pod;
use kube::api::{
    ApiResource, DeleteParams, DynamicObject, GroupVersionKind, ListParams, Patch, PatchParams,
};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Api, Client, Config, ResourceExt};
#[cfg(test)]
use mockall::automock;
use serde_json::json;
use tracing::{debug, instrument};

use super::RemoteError;
use super::credentials::ClusterCredentials;
use crate::document::Document;
use crate::release::PLATFORM_OPERATOR_NAMESPACE;

/// Name and namespace of the `Verrazzano` resource the operator manages
pub const WORKLOAD_NAME: &str = "verrazzano";
pub const WORKLOAD_NAMESPACE: &str = "default";

/// Field manager for server-side apply on workload clusters
pub const FIELD_MANAGER: &str = "verrazzano-fleet-operator";

/// `install.verrazzano.io/v1beta1` `Verrazzano`
pub fn verrazzano_resource() -> ApiResource {
    let gvk = GroupVersionKind::gvk("install.verrazzano.io", "v1beta1", "Verrazzano");
    ApiResource::from_gvk_with_plural(&gvk, "verrazzanos")
}

/// A `Verrazzano` resource read from a workload cluster
#[derive(Clone, Debug, PartialEq)]
pub struct WorkloadObject {
    pub name: String,
    pub namespace: String,
    /// Set once the object is being deleted
    pub deleting: bool,
    /// The full object
    pub document: Document,
}

impl WorkloadObject {
    fn from_dynamic(object: DynamicObject) -> Result<Self, RemoteError> {
        let name = object.name_any();
        let namespace = object.namespace().unwrap_or_else(|| WORKLOAD_NAMESPACE.to_string());
        let deleting = object.metadata.deletion_timestamp.is_some();
        let document = serde_json::to_value(&object)
            .map(Document::new)
            .map_err(|e| RemoteError::Kube(kube::Error::SerdeError(e)))?;
        Ok(Self {
            name,
            namespace,
            deleting,
            document,
        })
    }
}

/// Running and ready state of one pod
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PodHealth {
    pub name: String,
    pub running: bool,
    pub ready: bool,
}

impl From<&Pod> for PodHealth {
    fn from(pod: &Pod) -> Self {
        let status = pod.status.as_ref();
        let running = status.and_then(|s| s.phase.as_deref()) == Some("Running");
        let ready = status
            .and_then(|s| s.conditions.as_ref())
            .is_some_and(|conditions| {
                conditions
                    .iter()
                    .any(|c| c.type_ == "Ready" && c.status == "True")
            });
        Self {
            name: pod.name_any(),
            running,
            ready,
        }
    }
}

/// Operations on one workload cluster
#[cfg_attr(test, automock)]
#[async_trait]
pub trait RemoteCluster: Send + Sync {
    /// The `Verrazzano` resource, if one exists
    async fn get_workload(&self) -> Result<Option<WorkloadObject>, RemoteError>;

    /// Server-side apply `{"spec": spec}` to the managed `Verrazzano` resource
    async fn apply_workload(&self, spec: &Document) -> Result<(), RemoteError>;

    async fn delete_workload(&self, object: &WorkloadObject) -> Result<(), RemoteError>;

    /// Pods of the platform operator
    async fn operator_pods(&self) -> Result<Vec<PodHealth>, RemoteError>;
}

/// Builds [`RemoteCluster`] clients from credentials
#[cfg_attr(test, automock)]
#[async_trait]
pub trait RemoteConnector: Send + Sync {
    async fn connect(
        &self,
        credentials: &ClusterCredentials,
    ) -> Result<Arc<dyn RemoteCluster>, RemoteError>;
}

#[derive(Clone, Debug, Default)]
pub struct KubeRemoteConnector;

#[async_trait]
impl RemoteConnector for KubeRemoteConnector {
    async fn connect(
        &self,
        credentials: &ClusterCredentials,
    ) -> Result<Arc<dyn RemoteCluster>, RemoteError> {
        let kubeconfig = Kubeconfig::from_yaml(&credentials.kubeconfig)?;
        let options = KubeConfigOptions {
            context: credentials.context.clone(),
            ..Default::default()
        };
        let config = Config::from_custom_kubeconfig(kubeconfig, &options).await?;
        let client = Client::try_from(config)?;
        Ok(Arc::new(KubeRemoteCluster::new(client)))
    }
}

/// [`RemoteCluster`] backed by a kube client
#[derive(Clone)]
pub struct KubeRemoteCluster {
    client: Client,
}

impl KubeRemoteCluster {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn verrazzanos(&self, namespace: &str) -> Api<DynamicObject> {
        Api::namespaced_with(self.client.clone(), namespace, &verrazzano_resource())
    }
}

#[async_trait]
impl RemoteCluster for KubeRemoteCluster {
    async fn get_workload(&self) -> Result<Option<WorkloadObject>, RemoteError> {
        let list = match self
            .verrazzanos(WORKLOAD_NAMESPACE)
            .list(&ListParams::default())
            .await
        {
            Ok(list) => list,
            // CRD not installed yet
            Err(kube::Error::Api(e)) if e.code == 404 => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        list.items
            .into_iter()
            .last()
            .map(WorkloadObject::from_dynamic)
            .transpose()
    }

    #[instrument(skip(self, spec))]
    async fn apply_workload(&self, spec: &Document) -> Result<(), RemoteError> {
        let resource = verrazzano_resource();
        let patch = json!({
            "apiVersion": resource.api_version,
            "kind": resource.kind,
            "metadata": {
                "name": WORKLOAD_NAME,
                "namespace": WORKLOAD_NAMESPACE,
            },
            "spec": spec,
        });
        self.verrazzanos(WORKLOAD_NAMESPACE)
            .patch(
                WORKLOAD_NAME,
                &PatchParams::apply(FIELD_MANAGER).force(),
                &Patch::Apply(&patch),
            )
            .await?;
        Ok(())
    }

    #[instrument(skip(self, object), fields(name = %object.name, namespace = %object.namespace))]
    async fn delete_workload(&self, object: &WorkloadObject) -> Result<(), RemoteError> {
        match self
            .verrazzanos(&object.namespace)
            .delete(&object.name, &DeleteParams::default())
            .await
        {
            Ok(_) => Ok(()),
            Err(kube::Error::Api(e)) if e.code == 404 => {
                debug!("Verrazzano already deleted");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn operator_pods(&self) -> Result<Vec<PodHealth>, RemoteError> {
        let pods: Api<Pod> = Api::namespaced(self.client.clone(), PLATFORM_OPERATOR_NAMESPACE);
        let list = pods.list(&ListParams::default()).await?;
        Ok(list.items.iter().map(PodHealth::from).collect())
    }
}
