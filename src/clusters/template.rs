// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Read-only validation of a base cluster template.

use crate::error::{ArlonError, Result};
use crate::git::{repo_path, RepoCredentials, RepositoryMutator};
use crate::types::cluster::RepoRef;
use serde::Deserialize;
use std::path::Path;
use tracing::{debug, instrument};

const CLUSTER_API_GROUP: &str = "cluster.x-k8s.io/";
const KUSTOMIZATION_FILE: &str = "kustomization.yaml";

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ManifestHeader {
    #[serde(default)]
    api_version: String,
    #[serde(default)]
    kind: String,
    #[serde(default)]
    metadata: ManifestMetadata,
}

#[derive(Deserialize, Default)]
struct ManifestMetadata {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    namespace: Option<String>,
}

/// Check a set of manifest documents: exactly one Cluster API `Cluster`
/// and no object pinned to a namespace. Returns the cluster's name.
pub fn inspect_manifests<'a, I>(documents: I) -> Result<String>
where
    I: IntoIterator<Item = (&'a Path, &'a str)>,
{
    let mut cluster_names = Vec::new();

    for (file, contents) in documents {
        for document in serde_yaml::Deserializer::from_str(contents) {
            let value = serde_yaml::Value::deserialize(document)?;
            if value.is_null() {
                continue;
            }
            let header: ManifestHeader = serde_yaml::from_value(value)?;

            if let Some(ns) = header.metadata.namespace.as_deref().filter(|ns| !ns.is_empty()) {
                return Err(ArlonError::InvalidTemplate(format!(
                    "{} {:?} in {} has namespace {}",
                    header.kind,
                    header.metadata.name.unwrap_or_default(),
                    file.display(),
                    ns
                )));
            }

            if header.kind == "Cluster" && header.api_version.starts_with(CLUSTER_API_GROUP) {
                cluster_names.push(header.metadata.name.unwrap_or_default());
            }
        }
    }

    match cluster_names.as_slice() {
        [name] if !name.is_empty() => Ok(name.clone()),
        [_] => Err(ArlonError::InvalidTemplate(
            "cluster resource has no name".to_string(),
        )),
        [] => Err(ArlonError::InvalidTemplate(
            "no cluster resource found".to_string(),
        )),
        names => Err(ArlonError::InvalidTemplate(format!(
            "expected one cluster resource, found {}",
            names.len()
        ))),
    }
}

fn is_manifest(path: &Path) -> bool {
    let yaml = path
        .extension()
        .is_some_and(|ext| ext == "yaml" || ext == "yml");
    yaml && path.file_name().is_some_and(|f| f != KUSTOMIZATION_FILE)
}

/// Clone the template repository and validate the manifests below its path.
/// Blocking: callers on the runtime wrap this in `spawn_blocking`.
#[instrument(skip(repos, credentials), fields(url = %template.url, path = %template.path))]
pub fn validate_template(
    repos: &dyn RepositoryMutator,
    template: &RepoRef,
    credentials: &RepoCredentials,
) -> Result<String> {
    let tree = repos.clone_repo(&template.url, &template.revision, credentials)?;

    let mut documents = Vec::new();
    for file in tree.list_files(&repo_path(&template.path))? {
        if is_manifest(&file) {
            let contents = tree.read_file(&file)?;
            documents.push((file, contents));
        }
    }
    debug!("Inspecting {} manifest files", documents.len());

    inspect_manifests(documents.iter().map(|(f, c)| (f.as_path(), c.as_str())))
}
