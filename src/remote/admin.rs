use async_trait::async_trait;
use kube::api::{DynamicObject, ListParams};
use kube::{Api, Client};
#[cfg(test)]
use mockall::automock;

use super::RemoteError;
use super::workload::verrazzano_resource;

/// Reads the Verrazzano version installed on the admin cluster
#[cfg_attr(test, automock)]
#[async_trait]
pub trait AdminVersionReader: Send + Sync {
    /// `None` until the admin cluster reports a version
    async fn admin_version(&self) -> Result<Option<String>, RemoteError>;
}

pub struct KubeAdminVersionReader {
    client: Client,
}

impl KubeAdminVersionReader {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl AdminVersionReader for KubeAdminVersionReader {
    async fn admin_version(&self) -> Result<Option<String>, RemoteError> {
        let api: Api<DynamicObject> = Api::all_with(self.client.clone(), &verrazzano_resource());
        let list = api.list(&ListParams::default()).await?;
        Ok(list.items.iter().rev().find_map(status_version))
    }
}

fn status_version(object: &DynamicObject) -> Option<String> {
    object
        .data
        .get("status")
        .and_then(|status| status.get("version"))
        .and_then(|version| version.as_str())
        .filter(|version| !version.is_empty())
        .map(str::to_string)
}
