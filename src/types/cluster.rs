// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use crate::constants::{annotations, finalizers};
use crate::error::{ArlonError, Result};
use crate::types::profile::parse_profile_list;
use kube::{CustomResource, ResourceExt};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(CustomResource, Serialize, Deserialize, Clone, Debug, PartialEq, schemars::JsonSchema)]
#[kube(group = "core.arlon.io", version = "v1", kind = "Cluster")]
#[kube(namespaced)]
#[kube(status = "ClusterStatus")]
#[serde(rename_all = "camelCase")]
pub struct ClusterSpec {
    pub cluster_template: RepoRef,
    #[serde(rename = "override", skip_serializing_if = "Option::is_none")]
    pub override_: Option<ClusterOverride>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub autoscaler: Option<AutoscalerConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arlon_helm_chart: Option<HelmChartSource>,
}

/// A location inside a git repository
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RepoRef {
    pub url: String,
    pub path: String,
    #[serde(default = "default_revision")]
    pub revision: String,
}

fn default_revision() -> String {
    "HEAD".to_string()
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ClusterOverride {
    /// Literal strategic-merge patch applied on top of the base template
    pub patch: String,
    /// Where the overlay directory gets materialized
    pub repo: RepoRef,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AutoscalerConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub management_cluster_url: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct HelmChartSource {
    pub repo_url: String,
    pub path: String,
    pub revision: String,
}

impl Cluster {
    pub fn has_finalizer(&self) -> bool {
        self.finalizers().iter().any(|f| f == finalizers::CLUSTER)
    }

    pub fn is_being_deleted(&self) -> bool {
        self.metadata.deletion_timestamp.is_some()
    }

    /// Raw profile list annotation, if any
    pub fn profiles_annotation(&self) -> Option<&str> {
        self.annotations()
            .get(annotations::PROFILES)
            .map(String::as_str)
    }

    pub fn profiles(&self) -> Vec<String> {
        parse_profile_list(self.profiles_annotation())
    }

    /// Cluster name found in the template, empty until validated
    pub fn inner_cluster_name(&self) -> &str {
        self.status
            .as_ref()
            .map(|s| s.inner_cluster_name.as_str())
            .unwrap_or_default()
    }

    pub fn override_successful(&self) -> bool {
        self.status
            .as_ref()
            .is_some_and(|s| s.override_successful)
    }

    pub fn state(&self) -> Option<ClusterState> {
        self.status.as_ref().and_then(|s| s.state)
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ClusterStatus {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<ClusterState>,
    #[serde(default)]
    pub inner_cluster_name: String,
    #[serde(default)]
    pub override_successful: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,
}

/// Progress of a cluster through its lifecycle.
///
/// A cluster without a state has just been created (or only has its
/// finalizer recorded so far).
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, schemars::JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub enum ClusterState {
    Retrying,
    TemplateValidated,
    OverrideCreated,
    Created,
}

impl ClusterState {
    /// Transition table. Staying in the same state is always allowed so
    /// retries stay idempotent; the validated/override steps never go back.
    pub fn transition(from: Option<ClusterState>, to: ClusterState) -> Result<ClusterState> {
        use ClusterState::*;

        let allowed = match (from, to) {
            (_, Retrying) => true,
            (None, TemplateValidated) => true,
            (None, _) => false,
            (Some(Retrying), _) => true,
            (Some(TemplateValidated), TemplateValidated | OverrideCreated | Created) => true,
            (Some(OverrideCreated), OverrideCreated | Created) => true,
            // an override added once the apps exist
            (Some(Created), OverrideCreated | Created) => true,
            _ => false,
        };

        if allowed {
            Ok(to)
        } else {
            Err(ArlonError::IllegalTransition {
                from: from.map(|s| s.to_string()).unwrap_or_else(|| "none".to_string()),
                to: to.to_string(),
            })
        }
    }
}

impl fmt::Display for ClusterState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ClusterState::Retrying => "retrying",
            ClusterState::TemplateValidated => "template-validated",
            ClusterState::OverrideCreated => "override-created",
            ClusterState::Created => "created",
        };
        f.write_str(label)
    }
}
