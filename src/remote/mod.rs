//! Access to workload clusters and to the admin cluster's own Verrazzano

pub mod admin;
pub mod credentials;
pub mod workload;

pub use admin::{AdminVersionReader, KubeAdminVersionReader};
pub use credentials::{ClusterCredentials, CredentialProvider, SecretCredentialProvider};
pub use workload::{
    KubeRemoteConnector, PodHealth, RemoteCluster, RemoteConnector, WorkloadObject,
};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RemoteError {
    #[error("kubeconfig secret {0} not found")]
    SecretNotFound(String),

    #[error("kubeconfig secret {secret} has no {key:?} entry")]
    MissingKubeconfig { secret: String, key: &'static str },

    #[error("invalid kubeconfig: {0}")]
    Kubeconfig(#[from] kube::config::KubeconfigError),

    #[error("Kubernetes API error: {0}")]
    Kube(#[from] kube::Error),
}

impl RemoteError {
    pub fn is_not_found(&self) -> bool {
        match self {
            RemoteError::SecretNotFound(_) => true,
            RemoteError::Kube(kube::Error::Api(e)) => e.code == 404,
            _ => false,
        }
    }
}
