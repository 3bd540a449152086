// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Names and paths of the objects derived from a cluster.
//!
//! Derived objects are joined back to their cluster by these conventions
//! rather than by stored references, so every builder here has an inverse.

use crate::constants::naming::{ARLON_APP_SUFFIX, PROFILE_APP_INFIX};
use std::path::PathBuf;

use crate::git::repo_path;

/// Orchestration app: `<cluster>-arlon`
pub fn arlon_app_name(cluster: &str) -> String {
    format!("{}{}", cluster, ARLON_APP_SUFFIX)
}

pub fn cluster_from_arlon_app_name(app: &str) -> Option<&str> {
    app.strip_suffix(ARLON_APP_SUFFIX).filter(|c| !c.is_empty())
}

/// Profile app: `<cluster>-profile-<profile>`
pub fn profile_app_name(cluster: &str, profile: &str) -> String {
    format!("{}{}{}", cluster, PROFILE_APP_INFIX, profile)
}

/// Split a profile app name into cluster and profile. The profile name is
/// taken after the last infix since cluster names may themselves contain it.
pub fn split_profile_app_name(app: &str) -> Option<(&str, &str)> {
    let (cluster, profile) = app.rsplit_once(PROFILE_APP_INFIX)?;
    if cluster.is_empty() || profile.is_empty() {
        return None;
    }
    Some((cluster, profile))
}

/// Location of a legacy cluster's chart copy: `<base>/<cluster>`
pub fn cluster_chart_path(base_path: &str, cluster: &str) -> String {
    let base = base_path.trim_end_matches('/');
    if base.is_empty() {
        cluster.to_string()
    } else {
        format!("{}/{}", base, cluster)
    }
}

pub fn split_cluster_chart_path(path: &str) -> Option<(&str, &str)> {
    match path.trim_end_matches('/').rsplit_once('/') {
        Some((base, cluster)) if !cluster.is_empty() => Some((base, cluster)),
        Some(_) => None,
        None if !path.is_empty() => Some(("", path)),
        None => None,
    }
}

/// Directory of a cluster's override overlay inside the override repository
pub fn override_dir(override_path: &str, cluster: &str) -> PathBuf {
    repo_path(override_path).join(cluster)
}
