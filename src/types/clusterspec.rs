// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Clusterspecs describe legacy clusters and are stored as config maps.

use crate::error::{ArlonError, Result};
use k8s_openapi::api::core::v1::ConfigMap;
use kube::ResourceExt;
use std::fmt;
use std::str::FromStr;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ApiProvider {
    Capi,
    Xplane,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CloudProvider {
    Aws,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ClusterType {
    Kubeadm,
    Eks,
}

impl ApiProvider {
    pub const ALL: [ApiProvider; 2] = [ApiProvider::Capi, ApiProvider::Xplane];

    /// Cluster types each api provider can build
    pub fn cluster_types(self) -> &'static [ClusterType] {
        match self {
            ApiProvider::Capi => &[ClusterType::Kubeadm, ClusterType::Eks],
            ApiProvider::Xplane => &[ClusterType::Eks],
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            ApiProvider::Capi => "capi",
            ApiProvider::Xplane => "xplane",
        }
    }
}

impl CloudProvider {
    pub const ALL: [CloudProvider; 1] = [CloudProvider::Aws];

    fn as_str(self) -> &'static str {
        match self {
            CloudProvider::Aws => "aws",
        }
    }
}

impl ClusterType {
    fn as_str(self) -> &'static str {
        match self {
            ClusterType::Kubeadm => "kubeadm",
            ClusterType::Eks => "eks",
        }
    }
}

macro_rules! display_from_str {
    ($ty:ty, $kind:literal, [$($variant:expr),+]) => {
        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $ty {
            type Err = ArlonError;

            fn from_str(s: &str) -> Result<Self> {
                [$($variant),+]
                    .into_iter()
                    .find(|v: &$ty| v.as_str() == s)
                    .ok_or_else(|| ArlonError::InvalidClusterSpec(format!("invalid {}: {}", $kind, s)))
            }
        }
    };
}

display_from_str!(ApiProvider, "api provider", [ApiProvider::Capi, ApiProvider::Xplane]);
display_from_str!(CloudProvider, "cloud provider", [CloudProvider::Aws]);
display_from_str!(ClusterType, "cluster type", [ClusterType::Kubeadm, ClusterType::Eks]);

/// A validated (api provider, cloud provider, cluster type) triple
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Flavor {
    pub api_provider: ApiProvider,
    pub cloud_provider: CloudProvider,
    pub cluster_type: ClusterType,
}

impl Flavor {
    pub fn new(
        api_provider: ApiProvider,
        cloud_provider: CloudProvider,
        cluster_type: ClusterType,
    ) -> Result<Self> {
        if !api_provider.cluster_types().contains(&cluster_type) {
            return Err(ArlonError::InvalidClusterSpec(format!(
                "cluster type {} is not supported by api provider {}",
                cluster_type, api_provider
            )));
        }
        Ok(Flavor {
            api_provider,
            cloud_provider,
            cluster_type,
        })
    }

    /// Every triple accepted by the validity tables
    pub fn all() -> Vec<Flavor> {
        ApiProvider::ALL
            .iter()
            .flat_map(|api| {
                CloudProvider::ALL.iter().flat_map(move |cloud| {
                    api.cluster_types().iter().map(move |ty| Flavor {
                        api_provider: *api,
                        cloud_provider: *cloud,
                        cluster_type: *ty,
                    })
                })
            })
            .collect()
    }

    /// Name of the cluster chart's subchart that renders this flavor
    pub fn subchart_name(&self) -> String {
        format!(
            "{}-{}-{}",
            self.api_provider, self.cloud_provider, self.cluster_type
        )
    }

    pub fn from_subchart_name(name: &str) -> Result<Self> {
        let mut parts = name.splitn(3, '-');
        let (Some(api), Some(cloud), Some(ty)) = (parts.next(), parts.next(), parts.next()) else {
            return Err(ArlonError::InvalidClusterSpec(format!(
                "malformed subchart name: {}",
                name
            )));
        };
        Flavor::new(api.parse()?, cloud.parse()?, ty.parse()?)
    }
}

/// Parsed content of a clusterspec config map
#[derive(Clone, Debug, PartialEq)]
pub struct ClusterSpecConfig {
    pub name: String,
    pub flavor: Flavor,
    pub kubernetes_version: String,
    pub region: String,
    pub node_type: String,
    pub node_count: u32,
    pub master_node_count: u32,
    pub ssh_key_name: Option<String>,
    pub autoscaler: Option<AutoscalerRange>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AutoscalerRange {
    pub min_nodes: u32,
    pub max_nodes: u32,
}

impl ClusterSpecConfig {
    pub fn from_config_map(cm: &ConfigMap) -> Result<Self> {
        let name = cm.name_any();
        let data = cm.data.clone().unwrap_or_default();
        let get = |key: &str| -> Result<String> {
            data.get(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .ok_or_else(|| {
                    ArlonError::InvalidClusterSpec(format!("{}: missing key {}", name, key))
                })
        };
        let get_u32 = |key: &str, default: u32| -> Result<u32> {
            match data.get(key).map(|v| v.trim()).filter(|v| !v.is_empty()) {
                None => Ok(default),
                Some(v) => v.parse().map_err(|_| {
                    ArlonError::InvalidClusterSpec(format!("{}: {} is not a number: {}", name, key, v))
                }),
            }
        };

        let flavor = Flavor::new(
            get("apiProvider")?.parse()?,
            get("cloudProvider")?.parse()?,
            get("type")?.parse()?,
        )?;

        let autoscaler = if data
            .get("clusterAutoscalerEnabled")
            .is_some_and(|v| v.trim() == "true")
        {
            let min_nodes = get_u32("clusterAutoscalerMinNodes", 1)?;
            let max_nodes = get_u32("clusterAutoscalerMaxNodes", 9)?;
            if min_nodes > max_nodes {
                return Err(ArlonError::InvalidClusterSpec(format!(
                    "{}: autoscaler min nodes {} exceeds max nodes {}",
                    name, min_nodes, max_nodes
                )));
            }
            Some(AutoscalerRange { min_nodes, max_nodes })
        } else {
            None
        };

        Ok(ClusterSpecConfig {
            flavor,
            kubernetes_version: get("kubernetesVersion")?,
            region: get("region")?,
            node_type: get("nodeType")?,
            node_count: get_u32("nodeCount", 2)?,
            master_node_count: get_u32("masterNodeCount", 3)?,
            ssh_key_name: get("sshKeyName").ok(),
            autoscaler,
            name,
        })
    }
}
