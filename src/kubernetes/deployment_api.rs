// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! CRUD over ArgoCD applications, application sets and registered clusters

use crate::constants::{finalizers, labels};
use crate::error::{ArlonError, Result};
use crate::types::argocd::{Application, ApplicationSet, RegisteredCluster};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::Secret;
use kube::{
    api::{DeleteParams, ListParams, Patch, PatchParams, PostParams},
    Api, Client, ResourceExt,
};
use tracing::{debug, info, instrument};

#[async_trait]
pub trait DeploymentApi: Send + Sync {
    async fn get_application(&self, name: &str) -> Result<Option<Application>>;

    async fn list_applications(&self, selector: &str) -> Result<Vec<Application>>;

    async fn create_application(&self, app: &Application) -> Result<()>;

    async fn update_application(&self, app: &Application) -> Result<()>;

    /// Delete an application. A cascading delete also removes every
    /// resource the application deployed. Absent apps yield a not-found error.
    async fn delete_application(&self, name: &str, cascade: bool) -> Result<()>;

    async fn list_application_sets(&self, selector: &str) -> Result<Vec<ApplicationSet>>;

    async fn update_application_set(&self, set: &ApplicationSet) -> Result<()>;

    async fn list_clusters(&self) -> Result<Vec<RegisteredCluster>>;

    async fn get_cluster(&self, name: &str) -> Result<Option<RegisteredCluster>>;

    /// Persist the labels and annotations of a registered cluster
    async fn update_cluster(&self, cluster: &RegisteredCluster) -> Result<()>;
}

/// Selector for every object of one arlon type
pub fn arlon_selector(arlon_type: &str) -> String {
    format!(
        "{}={},{}={}",
        labels::MANAGED_BY,
        labels::MANAGED_BY_ARLON,
        labels::ARLON_TYPE,
        arlon_type
    )
}

/// The declarative ArgoCD backend: CRDs and secrets in the ArgoCD namespace
pub struct KubeDeploymentApi {
    client: Client,
    namespace: String,
}

impl KubeDeploymentApi {
    pub fn new(client: Client, namespace: impl Into<String>) -> Self {
        Self {
            client,
            namespace: namespace.into(),
        }
    }

    fn applications(&self) -> Api<Application> {
        Api::namespaced(self.client.clone(), &self.namespace)
    }

    fn application_sets(&self) -> Api<ApplicationSet> {
        Api::namespaced(self.client.clone(), &self.namespace)
    }

    fn secrets(&self) -> Api<Secret> {
        Api::namespaced(self.client.clone(), &self.namespace)
    }
}

#[async_trait]
impl DeploymentApi for KubeDeploymentApi {
    async fn get_application(&self, name: &str) -> Result<Option<Application>> {
        match self.applications().get(name).await {
            Ok(app) => Ok(Some(app)),
            Err(kube::Error::Api(err)) if err.code == 404 => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn list_applications(&self, selector: &str) -> Result<Vec<Application>> {
        let lp = ListParams::default().labels(selector);
        Ok(self.applications().list(&lp).await?.items)
    }

    #[instrument(skip(self, app), fields(app = %app.name_any()))]
    async fn create_application(&self, app: &Application) -> Result<()> {
        self.applications()
            .create(&PostParams::default(), app)
            .await?;
        info!("Created application");
        Ok(())
    }

    #[instrument(skip(self, app), fields(app = %app.name_any()))]
    async fn update_application(&self, app: &Application) -> Result<()> {
        self.applications()
            .replace(&app.name_any(), &PostParams::default(), app)
            .await?;
        debug!("Updated application");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete_application(&self, name: &str, cascade: bool) -> Result<()> {
        let api = self.applications();

        if cascade {
            let app = api.get(name).await?;
            let mut app_finalizers = app.finalizers().to_vec();
            if !app_finalizers.iter().any(|f| f == finalizers::ARGOCD_RESOURCES) {
                app_finalizers.push(finalizers::ARGOCD_RESOURCES.to_string());
                let patch = serde_json::json!({
                    "metadata": { "finalizers": app_finalizers }
                });
                api.patch(name, &PatchParams::default(), &Patch::Merge(&patch))
                    .await?;
            }
        }

        let dp = if cascade {
            DeleteParams::foreground()
        } else {
            DeleteParams::default()
        };
        api.delete(name, &dp).await?;
        info!("Deleted application (cascade={})", cascade);
        Ok(())
    }

    async fn list_application_sets(&self, selector: &str) -> Result<Vec<ApplicationSet>> {
        let lp = ListParams::default().labels(selector);
        Ok(self.application_sets().list(&lp).await?.items)
    }

    #[instrument(skip(self, set), fields(app = %set.name_any()))]
    async fn update_application_set(&self, set: &ApplicationSet) -> Result<()> {
        self.application_sets()
            .replace(&set.name_any(), &PostParams::default(), set)
            .await?;
        debug!("Updated application set");
        Ok(())
    }

    async fn list_clusters(&self) -> Result<Vec<RegisteredCluster>> {
        let lp = ListParams::default().labels(&format!(
            "{}={}",
            labels::ARGOCD_SECRET_TYPE,
            labels::ARGOCD_SECRET_TYPE_CLUSTER
        ));
        let secrets = self.secrets().list(&lp).await?;
        Ok(secrets
            .items
            .iter()
            .filter_map(RegisteredCluster::from_secret)
            .collect())
    }

    async fn get_cluster(&self, name: &str) -> Result<Option<RegisteredCluster>> {
        Ok(self
            .list_clusters()
            .await?
            .into_iter()
            .find(|c| c.name == name))
    }

    #[instrument(skip(self, cluster), fields(cluster = %cluster.name))]
    async fn update_cluster(&self, cluster: &RegisteredCluster) -> Result<()> {
        let api = self.secrets();
        let mut secret = match api.get(&cluster.secret_name).await {
            Ok(secret) => secret,
            Err(kube::Error::Api(err)) if err.code == 404 => {
                return Err(ArlonError::not_found("cluster secret", &cluster.secret_name))
            }
            Err(e) => return Err(e.into()),
        };

        // Replace keeps key removals, which a merge patch would not
        secret.metadata.labels = Some(cluster.labels.clone());
        secret.metadata.annotations = Some(cluster.annotations.clone());
        api.replace(&cluster.secret_name, &PostParams::default(), &secret)
            .await?;
        debug!("Updated registered cluster metadata");
        Ok(())
    }
}
