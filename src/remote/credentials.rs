//! Workload cluster credentials
//!
//! Cluster API stores an admin kubeconfig for every cluster in the secret
//! `<cluster>-kubeconfig` under the key `value`.

use std::fmt;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Secret;
use kube::config::Kubeconfig;
use kube::{Api, Client};
#[cfg(test)]
use mockall::automock;
use tracing::{debug, instrument};

use super::RemoteError;
use crate::crd::ClusterReference;

const KUBECONFIG_KEY: &str = "value";

/// Kubeconfig and context for one workload cluster
#[derive(Clone, PartialEq, Eq)]
pub struct ClusterCredentials {
    /// `namespace/name` of the cluster, for logging
    pub cluster: String,
    pub kubeconfig: String,
    /// Context to use; the kubeconfig's current context when `None`
    pub context: Option<String>,
}

impl fmt::Debug for ClusterCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClusterCredentials")
            .field("cluster", &self.cluster)
            .field("context", &self.context)
            .finish_non_exhaustive()
    }
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    async fn credentials(
        &self,
        cluster: &ClusterReference,
    ) -> Result<ClusterCredentials, RemoteError>;
}

/// Reads Cluster API kubeconfig secrets from the admin cluster
pub struct SecretCredentialProvider {
    client: Client,
    context_override: Option<String>,
}

impl SecretCredentialProvider {
    /// `context_override` replaces the `<cluster>-admin@<cluster>` context name
    pub fn new(client: Client, context_override: Option<String>) -> Self {
        Self {
            client,
            context_override,
        }
    }
}

#[async_trait]
impl CredentialProvider for SecretCredentialProvider {
    #[instrument(skip(self), fields(cluster = %cluster.key()))]
    async fn credentials(
        &self,
        cluster: &ClusterReference,
    ) -> Result<ClusterCredentials, RemoteError> {
        let secret_name = format!("{}-kubeconfig", cluster.name);
        let api: Api<Secret> = Api::namespaced(self.client.clone(), &cluster.namespace);
        let secret = api
            .get_opt(&secret_name)
            .await?
            .ok_or_else(|| {
                RemoteError::SecretNotFound(format!("{}/{secret_name}", cluster.namespace))
            })?;

        let kubeconfig = secret
            .data
            .and_then(|mut data| data.remove(KUBECONFIG_KEY))
            .map(|bytes| String::from_utf8_lossy(&bytes.0).into_owned())
            .ok_or_else(|| RemoteError::MissingKubeconfig {
                secret: secret_name.clone(),
                key: KUBECONFIG_KEY,
            })?;

        let parsed = Kubeconfig::from_yaml(&kubeconfig)?;
        let wanted = self
            .context_override
            .clone()
            .unwrap_or_else(|| admin_context_name(&cluster.name));
        let context = select_context(&parsed, &wanted);
        debug!(?context, "resolved workload cluster context");

        Ok(ClusterCredentials {
            cluster: cluster.key(),
            kubeconfig,
            context,
        })
    }
}

/// Context Cluster API writes for a cluster's admin user
pub fn admin_context_name(cluster: &str) -> String {
    format!("{cluster}-admin@{cluster}")
}

/// `wanted` when the kubeconfig defines it, otherwise `None` for the current context
pub fn select_context(kubeconfig: &Kubeconfig, wanted: &str) -> Option<String> {
    kubeconfig
        .contexts
        .iter()
        .any(|c| c.name == wanted)
        .then(|| wanted.to_string())
}
