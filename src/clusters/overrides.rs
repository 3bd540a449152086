// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Override overlays: a kustomize directory per cluster that patches the
//! base template through a remote base reference.

use crate::clusters::naming::override_dir;
use crate::error::Result;
use crate::git::{RepoCredentials, RepositoryMutator};
use crate::types::cluster::RepoRef;
use tracing::{debug, info, instrument};

const KUSTOMIZATION_FILE: &str = "kustomization.yaml";
const PATCH_FILE: &str = "patch.yaml";

/// Remote base reference understood by kustomize
pub fn remote_base(base: &RepoRef) -> String {
    let url = base.url.trim_end_matches('/');
    let path = base.path.trim_matches('/');
    format!("{}//{}?ref={}", url, path, base.revision)
}

pub fn render_kustomization(base: &RepoRef) -> String {
    format!(
        "apiVersion: kustomize.config.k8s.io/v1beta1\n\
         kind: Kustomization\n\
         resources:\n\
         - {}\n\
         patches:\n\
         - path: {}\n",
        remote_base(base),
        PATCH_FILE
    )
}

/// Create or replace the overlay for `cluster`. Pushes only when the tree
/// changed; returns whether a push happened.
#[instrument(skip(repos, patch, base, credentials), fields(repo = %override_repo.url))]
pub fn create_patch_dir(
    repos: &dyn RepositoryMutator,
    cluster: &str,
    override_repo: &RepoRef,
    patch: &str,
    base: &RepoRef,
    credentials: &RepoCredentials,
) -> Result<bool> {
    let mut tree = repos.clone_repo(&override_repo.url, &override_repo.revision, credentials)?;
    let dir = override_dir(&override_repo.path, cluster);

    tree.remove_dir(&dir)?;
    tree.write_file(&dir.join(KUSTOMIZATION_FILE), &render_kustomization(base))?;
    tree.write_file(&dir.join(PATCH_FILE), patch)?;

    if !tree.commit_if_changed(&format!("override cluster {}", cluster))? {
        debug!("Override for {} already up to date", cluster);
        return Ok(false);
    }
    tree.push()?;
    info!("Pushed override for {}", cluster);
    Ok(true)
}

/// Remove the overlay for `cluster`; an absent overlay is a no-op
#[instrument(skip(repos, credentials), fields(repo = %override_repo.url))]
pub fn delete_patch_dir(
    repos: &dyn RepositoryMutator,
    cluster: &str,
    override_repo: &RepoRef,
    credentials: &RepoCredentials,
) -> Result<bool> {
    let mut tree = repos.clone_repo(&override_repo.url, &override_repo.revision, credentials)?;
    tree.remove_dir(&override_dir(&override_repo.path, cluster))?;

    if !tree.commit_if_changed(&format!("remove override of cluster {}", cluster))? {
        debug!("No override for {} to remove", cluster);
        return Ok(false);
    }
    tree.push()?;
    info!("Removed override for {}", cluster);
    Ok(true)
}
