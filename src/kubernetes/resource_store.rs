// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Typed access to Arlon's own resources and the config objects around them

use crate::constants::{annotations, finalizers, labels};
use crate::error::{ArlonError, Result};
use crate::git::{normalize_repo_url, RepoCredentials};
use crate::types::app_profile::{AppProfile, AppProfileStatus};
use crate::types::argocd::secret_value;
use crate::types::cluster::{Cluster, ClusterStatus};
use crate::types::profile::Profile;
use async_trait::async_trait;
use k8s_openapi::api::core::v1::{ConfigMap, Secret};
use kube::{
    api::{DeleteParams, ListParams, Patch, PatchParams},
    Api, Client, ResourceExt,
};
use tracing::{debug, info, instrument};

#[async_trait]
pub trait ResourceStore: Send + Sync {
    async fn get_cluster(&self, name: &str) -> Result<Option<Cluster>>;

    async fn add_cluster_finalizer(&self, name: &str) -> Result<()>;

    async fn remove_cluster_finalizer(&self, name: &str) -> Result<()>;

    async fn update_cluster_status(&self, name: &str, status: &ClusterStatus) -> Result<()>;

    /// Set (or with None, remove) the profile list annotation of a cluster
    async fn set_cluster_profiles(&self, name: &str, profiles: Option<&str>) -> Result<()>;

    async fn delete_cluster(&self, name: &str) -> Result<()>;

    async fn list_app_profiles(&self) -> Result<Vec<AppProfile>>;

    async fn update_app_profile_status(&self, name: &str, status: &AppProfileStatus)
        -> Result<()>;

    async fn get_profile(&self, name: &str) -> Result<Option<Profile>>;

    async fn get_clusterspec(&self, name: &str) -> Result<Option<ConfigMap>>;

    /// Credentials registered for a repository URL
    async fn get_repo_credentials(&self, repo_url: &str) -> Result<RepoCredentials>;
}

pub struct KubeResourceStore {
    client: Client,
    arlon_namespace: String,
    argocd_namespace: String,
}

impl KubeResourceStore {
    pub fn new(
        client: Client,
        arlon_namespace: impl Into<String>,
        argocd_namespace: impl Into<String>,
    ) -> Self {
        Self {
            client,
            arlon_namespace: arlon_namespace.into(),
            argocd_namespace: argocd_namespace.into(),
        }
    }

    fn clusters(&self) -> Api<Cluster> {
        Api::namespaced(self.client.clone(), &self.arlon_namespace)
    }

    fn app_profiles(&self) -> Api<AppProfile> {
        Api::namespaced(self.client.clone(), &self.arlon_namespace)
    }

    async fn patch_cluster_metadata(&self, name: &str, patch: serde_json::Value) -> Result<()> {
        self.clusters()
            .patch(name, &PatchParams::default(), &Patch::Merge(&patch))
            .await?;
        Ok(())
    }
}

/// Get an object, mapping 404 to None
async fn get_opt<K>(api: &Api<K>, name: &str) -> Result<Option<K>>
where
    K: Clone + serde::de::DeserializeOwned + std::fmt::Debug,
{
    match api.get(name).await {
        Ok(obj) => Ok(Some(obj)),
        Err(kube::Error::Api(err)) if err.code == 404 => Ok(None),
        Err(e) => Err(e.into()),
    }
}

#[async_trait]
impl ResourceStore for KubeResourceStore {
    async fn get_cluster(&self, name: &str) -> Result<Option<Cluster>> {
        get_opt(&self.clusters(), name).await
    }

    #[instrument(skip(self))]
    async fn add_cluster_finalizer(&self, name: &str) -> Result<()> {
        let cluster = self.clusters().get(name).await?;
        let mut cluster_finalizers = cluster.finalizers().to_vec();

        if cluster_finalizers.iter().any(|f| f == finalizers::CLUSTER) {
            return Ok(());
        }
        cluster_finalizers.push(finalizers::CLUSTER.to_string());

        self.patch_cluster_metadata(
            name,
            serde_json::json!({ "metadata": { "finalizers": cluster_finalizers } }),
        )
        .await?;
        info!("Added cluster finalizer");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn remove_cluster_finalizer(&self, name: &str) -> Result<()> {
        let cluster = self.clusters().get(name).await?;
        let cluster_finalizers: Vec<String> = cluster
            .finalizers()
            .iter()
            .filter(|f| *f != finalizers::CLUSTER)
            .cloned()
            .collect();

        self.patch_cluster_metadata(
            name,
            serde_json::json!({ "metadata": { "finalizers": cluster_finalizers } }),
        )
        .await?;
        info!("Removed cluster finalizer");
        Ok(())
    }

    #[instrument(skip(self, status))]
    async fn update_cluster_status(&self, name: &str, status: &ClusterStatus) -> Result<()> {
        // Every field is spelled out so that a merge patch also clears them
        let patch = serde_json::json!({
            "status": {
                "state": status.state,
                "innerClusterName": status.inner_cluster_name,
                "overrideSuccessful": status.override_successful,
                "message": status.message,
            }
        });
        self.clusters()
            .patch_status(name, &PatchParams::default(), &Patch::Merge(&patch))
            .await?;
        debug!("Updated cluster status: {:?}", status);
        Ok(())
    }

    #[instrument(skip(self))]
    async fn set_cluster_profiles(&self, name: &str, profiles: Option<&str>) -> Result<()> {
        self.patch_cluster_metadata(
            name,
            serde_json::json!({ "metadata": { "annotations": { (annotations::PROFILES): profiles } } }),
        )
        .await
    }

    #[instrument(skip(self))]
    async fn delete_cluster(&self, name: &str) -> Result<()> {
        self.clusters().delete(name, &DeleteParams::default()).await?;
        info!("Requested cluster deletion");
        Ok(())
    }

    async fn list_app_profiles(&self) -> Result<Vec<AppProfile>> {
        Ok(self.app_profiles().list(&ListParams::default()).await?.items)
    }

    #[instrument(skip(self, status))]
    async fn update_app_profile_status(
        &self,
        name: &str,
        status: &AppProfileStatus,
    ) -> Result<()> {
        let patch = serde_json::json!({
            "status": {
                "health": status.health,
                "invalidAppNames": status.invalid_app_names,
            }
        });
        self.app_profiles()
            .patch_status(name, &PatchParams::default(), &Patch::Merge(&patch))
            .await?;
        Ok(())
    }

    async fn get_profile(&self, name: &str) -> Result<Option<Profile>> {
        let api: Api<Profile> = Api::namespaced(self.client.clone(), &self.arlon_namespace);
        get_opt(&api, name).await
    }

    async fn get_clusterspec(&self, name: &str) -> Result<Option<ConfigMap>> {
        let api: Api<ConfigMap> = Api::namespaced(self.client.clone(), &self.arlon_namespace);
        let cm = get_opt(&api, name).await?;
        Ok(cm.filter(|cm| {
            cm.labels()
                .get(labels::ARLON_TYPE)
                .is_some_and(|t| t == labels::TYPE_CLUSTERSPEC)
        }))
    }

    #[instrument(skip(self))]
    async fn get_repo_credentials(&self, repo_url: &str) -> Result<RepoCredentials> {
        let api: Api<Secret> = Api::namespaced(self.client.clone(), &self.argocd_namespace);
        let lp = ListParams::default().labels(&format!(
            "{}={}",
            labels::ARGOCD_SECRET_TYPE,
            labels::ARGOCD_SECRET_TYPE_REPOSITORY
        ));
        let wanted = normalize_repo_url(repo_url);

        let secret = api
            .list(&lp)
            .await?
            .items
            .into_iter()
            .find(|s| secret_value(s, "url").is_some_and(|u| normalize_repo_url(&u) == wanted))
            .ok_or_else(|| {
                ArlonError::CredentialsError(format!("no repository registered for {}", repo_url))
            })?;

        Ok(RepoCredentials {
            username: secret_value(&secret, "username").unwrap_or_default(),
            password: secret_value(&secret, "password").unwrap_or_default(),
        })
    }
}
