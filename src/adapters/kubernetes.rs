//! Kubernetes DataVolume Store Adapter
//!
//! Implements the `DataVolumeStore` port against the CDI custom resource
//! through the cluster API server.

use async_trait::async_trait;
use kube::api::{Api, DeleteParams, Patch, PatchParams, PostParams};
use kube::Client;
use tracing::{debug, instrument};

use crate::crd::DataVolume;
use crate::domain::ports::DataVolumeStore;
use crate::error::{Error, Result};

/// DataVolume store backed by the Kubernetes API.
#[derive(Clone)]
pub struct KubernetesDataVolumeStore {
    client: Client,
}

impl KubernetesDataVolumeStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Connect using the ambient kubeconfig or in-cluster service account.
    pub async fn try_default() -> Result<Self> {
        Ok(Self::new(Client::try_default().await?))
    }

    fn api(&self, namespace: &str) -> Api<DataVolume> {
        Api::namespaced(self.client.clone(), namespace)
    }

    /// Map a 404 from the API server to `NotFound`.
    fn classify(err: kube::Error, namespace: &str, name: &str) -> Error {
        match err {
            kube::Error::Api(e) if e.code == 404 => Error::NotFound {
                namespace: namespace.to_string(),
                name: name.to_string(),
            },
            e => Error::Kube(e),
        }
    }
}

impl std::fmt::Debug for KubernetesDataVolumeStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubernetesDataVolumeStore").finish()
    }
}

#[async_trait]
impl DataVolumeStore for KubernetesDataVolumeStore {
    #[instrument(skip(self, dv), fields(namespace = ?dv.metadata.namespace, name = ?dv.metadata.name))]
    async fn create_data_volume(&self, dv: &DataVolume) -> Result<DataVolume> {
        let namespace = dv
            .metadata
            .namespace
            .as_deref()
            .ok_or_else(|| Error::Validation("metadata.namespace is not set".to_string()))?;

        let created = self.api(namespace).create(&PostParams::default(), dv).await?;
        debug!(uid = ?created.metadata.uid, "Created DataVolume");
        Ok(created)
    }

    #[instrument(skip(self))]
    async fn read_data_volume(&self, namespace: &str, name: &str) -> Result<DataVolume> {
        self.api(namespace)
            .get(name)
            .await
            .map_err(|e| Self::classify(e, namespace, name))
    }

    #[instrument(skip(self, patch), fields(operations = patch.0.len()))]
    async fn update_data_volume(
        &self,
        namespace: &str,
        name: &str,
        patch: &json_patch::Patch,
    ) -> Result<DataVolume> {
        let updated = self
            .api(namespace)
            .patch(name, &PatchParams::default(), &Patch::Json::<()>(patch.clone()))
            .await
            .map_err(|e| Self::classify(e, namespace, name))?;
        debug!(resource_version = ?updated.metadata.resource_version, "Patched DataVolume");
        Ok(updated)
    }

    #[instrument(skip(self))]
    async fn delete_data_volume(&self, namespace: &str, name: &str) -> Result<()> {
        self.api(namespace)
            .delete(name, &DeleteParams::default())
            .await
            .map_err(|e| Self::classify(e, namespace, name))?;
        debug!("Delete request accepted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use kube::core::ErrorResponse;

    fn api_error(code: u16) -> kube::Error {
        kube::Error::Api(ErrorResponse {
            status: "Failure".to_string(),
            message: "boom".to_string(),
            reason: "Test".to_string(),
            code,
        })
    }

    #[test]
    fn test_classify_not_found() {
        let err = KubernetesDataVolumeStore::classify(api_error(404), "images", "fedora");
        assert_matches!(
            err,
            Error::NotFound { ref namespace, ref name } if namespace == "images" && name == "fedora"
        );
        assert!(err.is_not_found());
    }

    #[test]
    fn test_classify_other_errors_pass_through() {
        let err = KubernetesDataVolumeStore::classify(api_error(409), "images", "fedora");
        assert_matches!(err, Error::Kube(kube::Error::Api(ref e)) if e.code == 409);
        assert!(!err.is_not_found());
    }
}
