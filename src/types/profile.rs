// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use kube::CustomResource;
use serde::{Deserialize, Serialize};

/// A configuration profile: a named set of bundles, optionally rendered
/// into a git location that profile apps deploy from.
#[derive(CustomResource, Serialize, Deserialize, Clone, Debug, Default, PartialEq, schemars::JsonSchema)]
#[kube(group = "core.arlon.io", version = "v1", kind = "Profile")]
#[kube(namespaced)]
#[serde(rename_all = "camelCase")]
pub struct ProfileSpec {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default)]
    pub bundles: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repo_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repo_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repo_revision: Option<String>,
}

impl Profile {
    /// Static profiles live in git; dynamic ones have no repo location.
    pub fn is_static(&self) -> bool {
        self.spec.repo_url.is_some() && self.spec.repo_path.is_some()
    }
}

/// Split a comma separated profile annotation into names, dropping blanks
/// and duplicates while keeping the original order.
pub fn parse_profile_list(raw: Option<&str>) -> Vec<String> {
    let mut profiles: Vec<String> = Vec::new();
    for name in raw.unwrap_or_default().split(',').map(str::trim) {
        if !name.is_empty() && !profiles.iter().any(|p| p == name) {
            profiles.push(name.to_string());
        }
    }
    profiles
}

pub fn format_profile_list<S: AsRef<str>>(profiles: &[S]) -> String {
    profiles
        .iter()
        .map(|p| p.as_ref().trim())
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join(",")
}

/// Compare two raw annotations by meaning: a missing annotation equals an
/// empty one, and surrounding whitespace is ignored.
pub fn same_profile_list(a: Option<&str>, b: Option<&str>) -> bool {
    parse_profile_list(a) == parse_profile_list(b)
}
