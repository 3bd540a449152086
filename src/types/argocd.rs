// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! The slice of the ArgoCD object model the operator reads and writes.

use crate::constants::{annotations, labels};
use k8s_openapi::api::core::v1::Secret;
use kube::{CustomResource, ResourceExt};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(CustomResource, Serialize, Deserialize, Clone, Debug, Default, PartialEq, schemars::JsonSchema)]
#[kube(group = "argoproj.io", version = "v1alpha1", kind = "Application")]
#[kube(namespaced)]
#[kube(status = "ApplicationStatus")]
#[serde(rename_all = "camelCase")]
pub struct ApplicationSpec {
    pub project: String,
    pub source: ApplicationSource,
    pub destination: ApplicationDestination,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sync_policy: Option<SyncPolicy>,
}

/// Observed sync and health, as reported by ArgoCD
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, schemars::JsonSchema)]
pub struct ApplicationStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub health: Option<StatusField>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sync: Option<StatusField>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, schemars::JsonSchema)]
pub struct StatusField {
    #[serde(default)]
    pub status: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationSource {
    #[serde(rename = "repoURL")]
    pub repo_url: String,
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub target_revision: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub helm: Option<HelmSource>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct HelmSource {
    #[serde(default)]
    pub parameters: Vec<HelmParameter>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, schemars::JsonSchema)]
pub struct HelmParameter {
    pub name: String,
    pub value: String,
}

impl HelmParameter {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationDestination {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SyncPolicy {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub automated: Option<AutomatedSync>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sync_options: Vec<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AutomatedSync {
    #[serde(default)]
    pub prune: bool,
    #[serde(default)]
    pub self_heal: bool,
}

impl Application {
    pub fn is_being_deleted(&self) -> bool {
        self.metadata.deletion_timestamp.is_some()
    }

    pub fn profiles_annotation(&self) -> Option<&str> {
        self.annotations()
            .get(annotations::PROFILES)
            .map(String::as_str)
    }

    pub fn arlon_type(&self) -> Option<&str> {
        self.labels().get(labels::ARLON_TYPE).map(String::as_str)
    }

    pub fn helm_parameter(&self, name: &str) -> Option<&str> {
        self.spec
            .source
            .helm
            .as_ref()?
            .parameters
            .iter()
            .find(|p| p.name == name)
            .map(|p| p.value.as_str())
    }
}

/// An Application templated over a list of target clusters
#[derive(CustomResource, Serialize, Deserialize, Clone, Debug, Default, PartialEq, schemars::JsonSchema)]
#[kube(group = "argoproj.io", version = "v1alpha1", kind = "ApplicationSet")]
#[kube(namespaced)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationSetSpec {
    #[serde(default)]
    pub generators: Vec<ApplicationSetGenerator>,
    pub template: ApplicationSetTemplate,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, schemars::JsonSchema)]
pub struct ApplicationSetGenerator {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub list: Option<ListGenerator>,
    /// Generators the operator does not manage are carried through untouched
    #[serde(flatten)]
    pub other: BTreeMap<String, serde_json::Value>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, schemars::JsonSchema)]
pub struct ListGenerator {
    #[serde(default)]
    pub elements: Vec<ListElement>,
}

/// One target cluster of an ApplicationSet list generator
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, schemars::JsonSchema)]
pub struct ListElement {
    pub cluster: String,
    pub url: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, schemars::JsonSchema)]
pub struct ApplicationSetTemplate {
    #[serde(default)]
    pub metadata: TemplateMetadata,
    pub spec: ApplicationSpec,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, schemars::JsonSchema)]
pub struct TemplateMetadata {
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
}

impl ApplicationSet {
    /// Current targets from the list generator, sorted by cluster name
    pub fn target_elements(&self) -> Vec<ListElement> {
        let mut elements: Vec<ListElement> = self
            .spec
            .generators
            .iter()
            .filter_map(|g| g.list.as_ref())
            .flat_map(|l| l.elements.iter().cloned())
            .collect();
        elements.sort();
        elements
    }

    /// Replace the list generator targets, adding a list generator if the
    /// set had none.
    pub fn set_target_elements(&mut self, elements: Vec<ListElement>) {
        match self.spec.generators.iter_mut().find(|g| g.list.is_some()) {
            Some(generator) => generator.list = Some(ListGenerator { elements }),
            None => self.spec.generators.push(ApplicationSetGenerator {
                list: Some(ListGenerator { elements }),
                other: BTreeMap::new(),
            }),
        }
    }
}

/// A cluster registered with ArgoCD, backed by a declarative cluster secret
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RegisteredCluster {
    pub secret_name: String,
    pub name: String,
    pub server: String,
    pub labels: BTreeMap<String, String>,
    pub annotations: BTreeMap<String, String>,
}

impl RegisteredCluster {
    /// Parse an ArgoCD cluster secret, returning None when it lacks a name or server
    pub fn from_secret(secret: &Secret) -> Option<Self> {
        let name = secret_value(secret, "name")?;
        let server = secret_value(secret, "server")?;

        Some(RegisteredCluster {
            secret_name: secret.name_any(),
            name,
            server,
            labels: secret.labels().clone(),
            annotations: secret.annotations().clone(),
        })
    }

    pub fn profiles_annotation(&self) -> Option<&str> {
        self.annotations.get(annotations::PROFILES).map(String::as_str)
    }

    pub fn is_external(&self) -> bool {
        self.labels
            .get(labels::EXTERNAL_CLUSTER)
            .is_some_and(|v| v == "true")
    }
}

/// Read a key from either `data` or `stringData`
pub fn secret_value(secret: &Secret, key: &str) -> Option<String> {
    if let Some(value) = secret.data.as_ref().and_then(|d| d.get(key)) {
        return String::from_utf8(value.0.clone()).ok();
    }
    secret
        .string_data
        .as_ref()
        .and_then(|d| d.get(key))
        .cloned()
}
