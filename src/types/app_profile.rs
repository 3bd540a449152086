// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use kube::CustomResource;
use serde::{Deserialize, Serialize};

/// A named set of deployable app references
#[derive(CustomResource, Serialize, Deserialize, Clone, Debug, Default, PartialEq, schemars::JsonSchema)]
#[kube(group = "core.arlon.io", version = "v1", kind = "AppProfile")]
#[kube(namespaced)]
#[kube(status = "AppProfileStatus")]
#[serde(rename_all = "camelCase")]
pub struct AppProfileSpec {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default)]
    pub app_names: Vec<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AppProfileStatus {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub health: Option<ProfileHealth>,
    #[serde(default)]
    pub invalid_app_names: Vec<String>,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, schemars::JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ProfileHealth {
    Healthy,
    Degraded,
}

impl AppProfile {
    pub fn status_or_default(&self) -> AppProfileStatus {
        self.status.clone().unwrap_or_default()
    }
}
