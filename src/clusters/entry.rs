// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Update and delete entry points. Each dispatches on the kind of cluster
//! the classifier reports.

use crate::clusters::apps::{construct_legacy_root_app, construct_profile_app};
use crate::clusters::classifier::{self, ClusterKind};
use crate::clusters::naming::profile_app_name;
use crate::constants::{annotations, labels};
use crate::context::Context;
use crate::error::{ArlonError, Result};
use crate::types::cluster::RepoRef;
use crate::types::clusterspec::ClusterSpecConfig;
use crate::types::profile::format_profile_list;
use kube::ResourceExt;
use tracing::{info, instrument};

/// Delete an app, treating "already gone" as success
async fn delete_if_present(ctx: &Context, name: &str) -> Result<()> {
    match ctx.deploy.delete_application(name, true).await {
        Err(e) if e.is_not_found() => Ok(()),
        other => other,
    }
}

/// Replace the profiles attached to a cluster
#[instrument(skip(ctx, profiles))]
pub async fn update_profiles(ctx: &Context, name: &str, profiles: &[String]) -> Result<()> {
    let info = classifier::get(ctx.deploy.as_ref(), name)
        .await?
        .ok_or_else(|| ArlonError::not_found("cluster", name))?;
    let formatted = format_profile_list(profiles);
    let value = (!formatted.is_empty()).then_some(formatted.as_str());

    match info.kind {
        ClusterKind::External => {
            let mut cluster = ctx
                .deploy
                .get_cluster(name)
                .await?
                .ok_or_else(|| ArlonError::not_found("cluster", name))?;
            match value {
                Some(v) => cluster
                    .annotations
                    .insert(annotations::PROFILES.to_string(), v.to_string()),
                None => cluster.annotations.remove(annotations::PROFILES),
            };
            ctx.deploy.update_cluster(&cluster).await?;
        }
        // the lifecycle reconciler mirrors the annotation onto the cluster app
        ClusterKind::Managed => ctx.store.set_cluster_profiles(name, value).await?,
        ClusterKind::Legacy => update_legacy_profile(ctx, name, &info.profiles, profiles).await?,
    }

    info!("Updated profiles of {:?} cluster to [{}]", info.kind, formatted);
    Ok(())
}

async fn update_legacy_profile(
    ctx: &Context,
    name: &str,
    current: &[String],
    wanted: &[String],
) -> Result<()> {
    if wanted.len() > 1 {
        return Err(ArlonError::InvalidConfig(format!(
            "legacy cluster {} accepts a single profile",
            name
        )));
    }
    let wanted = wanted.first().map(String::as_str).filter(|p| !p.is_empty());

    // Build the new app first so a bad profile leaves the cluster untouched
    let new_app = match wanted {
        Some(profile) => {
            let profile = ctx
                .store
                .get_profile(profile)
                .await?
                .ok_or_else(|| ArlonError::not_found("profile", profile))?;
            Some(construct_profile_app(name, &profile, &ctx.config.argocd_namespace)?)
        }
        None => None,
    };

    for old in current.iter().filter(|p| Some(p.as_str()) != wanted) {
        delete_if_present(ctx, &profile_app_name(name, old)).await?;
    }
    if let Some(app) = new_app {
        match ctx.deploy.get_application(&app.name_any()).await? {
            Some(existing) => {
                let mut updated = app;
                updated.metadata.resource_version = existing.metadata.resource_version;
                ctx.deploy.update_application(&updated).await?;
            }
            None => ctx.deploy.create_application(&app).await?,
        }
    }

    let mut root = ctx
        .deploy
        .get_application(name)
        .await?
        .ok_or_else(|| ArlonError::not_found("application", name))?;
    let root_annotations = root.annotations_mut();
    match wanted {
        Some(p) => root_annotations.insert(annotations::PROFILE.to_string(), p.to_string()),
        None => root_annotations.remove(annotations::PROFILE),
    };
    ctx.deploy.update_application(&root).await
}

/// Delete a cluster through whichever path owns it
#[instrument(skip(ctx))]
pub async fn delete(ctx: &Context, name: &str) -> Result<()> {
    let info = classifier::get(ctx.deploy.as_ref(), name)
        .await?
        .ok_or_else(|| ArlonError::not_found("cluster", name))?;

    match info.kind {
        // external clusters are only released from management
        ClusterKind::External => {
            let mut cluster = ctx
                .deploy
                .get_cluster(name)
                .await?
                .ok_or_else(|| ArlonError::not_found("cluster", name))?;
            cluster.annotations.remove(annotations::PROFILES);
            cluster.labels.remove(labels::EXTERNAL_CLUSTER);
            ctx.deploy.update_cluster(&cluster).await?;
        }
        ClusterKind::Managed => ctx.store.delete_cluster(name).await?,
        ClusterKind::Legacy => {
            for profile in &info.profiles {
                delete_if_present(ctx, &profile_app_name(name, profile)).await?;
            }
            delete_if_present(ctx, name).await?;
        }
    }

    info!("Deleted {:?} cluster", info.kind);
    Ok(())
}

/// Bring an already registered cluster under management as an external cluster
#[instrument(skip(ctx, profiles))]
pub async fn manage_external(ctx: &Context, name: &str, profiles: &[String]) -> Result<()> {
    if let Some(info) = classifier::get(ctx.deploy.as_ref(), name).await? {
        if !info.is_external() {
            return Err(ArlonError::InvalidConfig(format!(
                "cluster {} is already managed as {:?}",
                name, info.kind
            )));
        }
    }

    let mut cluster = ctx
        .deploy
        .get_cluster(name)
        .await?
        .ok_or_else(|| ArlonError::not_found("cluster", name))?;
    cluster
        .labels
        .insert(labels::EXTERNAL_CLUSTER.to_string(), "true".to_string());
    let formatted = format_profile_list(profiles);
    if formatted.is_empty() {
        cluster.annotations.remove(annotations::PROFILES);
    } else {
        cluster
            .annotations
            .insert(annotations::PROFILES.to_string(), formatted);
    }
    ctx.deploy.update_cluster(&cluster).await?;

    info!("Managing external cluster");
    Ok(())
}

/// Deploy a legacy cluster from a clusterspec, plus its profile app
#[instrument(skip(ctx, repo))]
pub async fn create_legacy(
    ctx: &Context,
    name: &str,
    clusterspec: &str,
    repo: &RepoRef,
    profile: Option<&str>,
) -> Result<()> {
    if ctx.deploy.get_application(name).await?.is_some() {
        return Err(ArlonError::InvalidConfig(format!(
            "cluster {} already exists",
            name
        )));
    }

    let cm = ctx
        .store
        .get_clusterspec(clusterspec)
        .await?
        .ok_or_else(|| ArlonError::not_found("clusterspec", clusterspec))?;
    let spec = ClusterSpecConfig::from_config_map(&cm)?;

    let profile_app = match profile {
        Some(p) => {
            let profile = ctx
                .store
                .get_profile(p)
                .await?
                .ok_or_else(|| ArlonError::not_found("profile", p))?;
            Some(construct_profile_app(name, &profile, &ctx.config.argocd_namespace)?)
        }
        None => None,
    };

    let root = construct_legacy_root_app(name, &spec, repo, profile, &ctx.config);
    ctx.deploy.create_application(&root).await?;
    if let Some(app) = profile_app {
        ctx.deploy.create_application(&app).await?;
    }

    info!("Created legacy cluster from clusterspec {}", clusterspec);
    Ok(())
}
