// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use kube::CustomResource;
use serde::{Deserialize, Serialize};

/// Pushes a kubeconfig for the management cluster into a workload cluster
#[derive(CustomResource, Serialize, Deserialize, Clone, Debug, PartialEq, schemars::JsonSchema)]
#[kube(group = "core.arlon.io", version = "v1", kind = "CallHomeConfig")]
#[kube(namespaced)]
#[kube(status = "CallHomeConfigStatus")]
#[serde(rename_all = "camelCase")]
pub struct CallHomeConfigSpec {
    /// Secret holding the workload cluster's kubeconfig
    pub kubeconfig_secret_name: String,
    pub kubeconfig_secret_key: String,
    pub target_namespace: String,
    pub target_secret_name: String,
    /// Management cluster service account the workload cluster acts as
    pub service_account_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub management_cluster_url: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CallHomeConfigStatus {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<CallHomeState>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, schemars::JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum CallHomeState {
    Retrying,
    Complete,
    Error,
}

impl CallHomeConfig {
    /// A complete or failed config is left alone until its spec changes
    pub fn is_settled(&self) -> bool {
        let Some(status) = self.status.as_ref() else {
            return false;
        };
        matches!(
            status.state,
            Some(CallHomeState::Complete) | Some(CallHomeState::Error)
        ) && status.observed_generation == self.metadata.generation
    }
}
