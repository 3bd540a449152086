// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! A uniform view over managed, legacy and external clusters.

use crate::constants::{annotations, labels};
use crate::error::Result;
use crate::kubernetes::{arlon_selector, DeploymentApi};
use crate::types::argocd::{Application, RegisteredCluster};
use crate::types::cluster::RepoRef;
use crate::types::profile::parse_profile_list;
use kube::ResourceExt;
use std::collections::BTreeMap;
use tracing::instrument;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClusterKind {
    /// Backed by a Cluster resource and its cluster app
    Managed,
    /// A single root app rendered from a clusterspec
    Legacy,
    /// Provisioned elsewhere and registered with the deployment backend
    External,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ClusterInfo {
    pub name: String,
    pub kind: ClusterKind,
    /// Template the cluster was built from, for managed clusters
    pub base_cluster: Option<RepoRef>,
    pub clusterspec: Option<String>,
    pub profiles: Vec<String>,
}

impl ClusterInfo {
    pub fn is_external(&self) -> bool {
        self.kind == ClusterKind::External
    }

    pub fn from_application(app: &Application) -> Option<Self> {
        if app.labels().get(labels::MANAGED_BY).map(String::as_str) != Some(labels::MANAGED_BY_ARLON)
        {
            return None;
        }
        let annotation = |key: &str| app.annotations().get(key).cloned();

        match app.arlon_type()? {
            labels::TYPE_CLUSTER_APP => {
                let base_cluster = match (
                    annotation(annotations::BASE_CLUSTER_REPO_URL),
                    annotation(annotations::BASE_CLUSTER_REPO_PATH),
                ) {
                    (Some(url), Some(path)) => Some(RepoRef {
                        url,
                        path,
                        revision: annotation(annotations::BASE_CLUSTER_REPO_REVISION)
                            .unwrap_or_else(|| "HEAD".to_string()),
                    }),
                    _ => None,
                };
                Some(ClusterInfo {
                    name: app.name_any(),
                    kind: ClusterKind::Managed,
                    base_cluster,
                    clusterspec: None,
                    profiles: parse_profile_list(app.profiles_annotation()),
                })
            }
            labels::TYPE_CLUSTER => Some(ClusterInfo {
                name: app.name_any(),
                kind: ClusterKind::Legacy,
                base_cluster: None,
                clusterspec: annotation(annotations::CLUSTERSPEC),
                profiles: parse_profile_list(
                    app.annotations().get(annotations::PROFILE).map(String::as_str),
                ),
            }),
            _ => None,
        }
    }

    pub fn from_registered(cluster: &RegisteredCluster) -> Option<Self> {
        cluster.is_external().then(|| ClusterInfo {
            name: cluster.name.clone(),
            kind: ClusterKind::External,
            base_cluster: None,
            clusterspec: None,
            profiles: parse_profile_list(cluster.profiles_annotation()),
        })
    }
}

/// Look a cluster up by name. Arlon-built clusters take precedence over a
/// registered cluster of the same name.
#[instrument(skip(deploy))]
pub async fn get(deploy: &dyn DeploymentApi, name: &str) -> Result<Option<ClusterInfo>> {
    if let Some(info) = deploy
        .get_application(name)
        .await?
        .as_ref()
        .and_then(ClusterInfo::from_application)
    {
        return Ok(Some(info));
    }

    Ok(deploy
        .get_cluster(name)
        .await?
        .as_ref()
        .and_then(ClusterInfo::from_registered))
}

/// Every known cluster, sorted by name
pub async fn list(deploy: &dyn DeploymentApi) -> Result<Vec<ClusterInfo>> {
    let mut clusters: BTreeMap<String, ClusterInfo> = BTreeMap::new();

    for cluster in deploy.list_clusters().await? {
        if let Some(info) = ClusterInfo::from_registered(&cluster) {
            clusters.insert(info.name.clone(), info);
        }
    }

    for arlon_type in [labels::TYPE_CLUSTER, labels::TYPE_CLUSTER_APP] {
        for app in deploy.list_applications(&arlon_selector(arlon_type)).await? {
            if let Some(info) = ClusterInfo::from_application(&app) {
                clusters.insert(info.name.clone(), info);
            }
        }
    }

    Ok(clusters.into_values().collect())
}
