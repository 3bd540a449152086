// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use crate::constants::naming::IN_CLUSTER_SERVER;
use crate::types::cluster::HelmChartSource;
use anyhow::{Context, Result};
use std::env;

const DEFAULT_ARLON_NAMESPACE: &str = "arlon";
const DEFAULT_ARGOCD_NAMESPACE: &str = "argocd";
const DEFAULT_CHART_REPO_URL: &str = "https://github.com/arlonproj/arlon.git";
const DEFAULT_CHART_PATH: &str = "pkg/cluster/manifests";
const DEFAULT_CHART_REVISION: &str = "main";

/// Operator configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// Namespace holding Cluster, AppProfile, Profile and clusterspec objects
    pub arlon_namespace: String,
    /// Namespace holding ArgoCD applications, application sets and cluster secrets
    pub argocd_namespace: String,
    /// Default source of the Arlon support chart
    pub arlon_chart: HelmChartSource,
    pub management_cluster_url: String,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let arlon_namespace = var_or("ARLON_NAMESPACE", DEFAULT_ARLON_NAMESPACE);
        let argocd_namespace = var_or("ARGOCD_NAMESPACE", DEFAULT_ARGOCD_NAMESPACE);

        let repo_url = var_or("ARLON_CHART_REPO_URL", DEFAULT_CHART_REPO_URL);
        url::Url::parse(&repo_url)
            .with_context(|| format!("ARLON_CHART_REPO_URL is not a valid URL: {}", repo_url))?;

        let management_cluster_url = var_or("MANAGEMENT_CLUSTER_URL", IN_CLUSTER_SERVER);
        url::Url::parse(&management_cluster_url).with_context(|| {
            format!(
                "MANAGEMENT_CLUSTER_URL is not a valid URL: {}",
                management_cluster_url
            )
        })?;

        Ok(Config {
            arlon_namespace,
            argocd_namespace,
            arlon_chart: HelmChartSource {
                repo_url,
                path: var_or("ARLON_CHART_PATH", DEFAULT_CHART_PATH),
                revision: var_or("ARLON_CHART_REVISION", DEFAULT_CHART_REVISION),
            },
            management_cluster_url,
        })
    }
}

fn var_or(key: &str, default: &str) -> String {
    env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}

#[cfg(test)]
impl Config {
    pub fn for_testing() -> Self {
        Config {
            arlon_namespace: DEFAULT_ARLON_NAMESPACE.to_string(),
            argocd_namespace: DEFAULT_ARGOCD_NAMESPACE.to_string(),
            arlon_chart: HelmChartSource {
                repo_url: DEFAULT_CHART_REPO_URL.to_string(),
                path: DEFAULT_CHART_PATH.to_string(),
                revision: DEFAULT_CHART_REVISION.to_string(),
            },
            management_cluster_url: "https://mgmt.example.com:6443".to_string(),
        }
    }
}
