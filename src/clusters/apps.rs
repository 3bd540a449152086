// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Builders for the deployment objects backing a cluster.

use crate::clusters::naming::{
    arlon_app_name, cluster_chart_path, override_dir, profile_app_name, split_cluster_chart_path,
};
use crate::config::Config;
use crate::constants::{annotations, labels, naming};
use crate::error::{ArlonError, Result};
use crate::types::argocd::{
    Application, ApplicationDestination, ApplicationSource, ApplicationSpec, AutomatedSync,
    HelmParameter, HelmSource, SyncPolicy,
};
use crate::types::cluster::{Cluster, RepoRef};
use crate::types::clusterspec::{ClusterSpecConfig, Flavor};
use crate::types::profile::Profile;
use kube::api::ObjectMeta;
use kube::ResourceExt;
use std::collections::BTreeMap;

/// Helm parameter names understood by the Arlon charts
pub mod params {
    pub const CLUSTER_NAME: &str = "global.clusterName";
    pub const KUBECONFIG_SECRET_KEY_NAME: &str = "global.kubeconfigSecretKeyName";
    pub const AUTOSCALER_ENABLED: &str = "global.clusterAutoscalerEnabled";
    pub const MANAGEMENT_CLUSTER_URL: &str = "global.managementClusterUrl";
    pub const KUBERNETES_VERSION: &str = "global.kubernetesVersion";
    pub const REGION: &str = "global.region";
    pub const NODE_TYPE: &str = "global.nodeType";
    pub const NODE_COUNT: &str = "global.nodeCount";
    pub const MASTER_NODE_COUNT: &str = "global.masterNodeCount";
    pub const SSH_KEY_NAME: &str = "global.sshKeyName";
    pub const AUTOSCALER_MIN_NODES: &str = "global.clusterAutoscalerMinNodes";
    pub const AUTOSCALER_MAX_NODES: &str = "global.clusterAutoscalerMaxNodes";
    /// Prefix of the helm tag that enables a flavor's subchart
    pub const SUBCHART_TAG_PREFIX: &str = "tags.";
}

const KUBECONFIG_SECRET_KEY: &str = "value";

fn metadata(name: &str, namespace: &str, arlon_type: &str) -> ObjectMeta {
    ObjectMeta {
        name: Some(name.to_string()),
        namespace: Some(namespace.to_string()),
        labels: Some(BTreeMap::from([
            (labels::MANAGED_BY.to_string(), labels::MANAGED_BY_ARLON.to_string()),
            (labels::ARLON_TYPE.to_string(), arlon_type.to_string()),
        ])),
        ..Default::default()
    }
}

fn automated_sync() -> Option<SyncPolicy> {
    Some(SyncPolicy {
        automated: Some(AutomatedSync {
            prune: true,
            self_heal: true,
        }),
        sync_options: vec!["CreateNamespace=true".to_string()],
    })
}

fn in_cluster(namespace: &str) -> ApplicationDestination {
    ApplicationDestination {
        server: Some(naming::IN_CLUSTER_SERVER.to_string()),
        name: None,
        namespace: Some(namespace.to_string()),
    }
}

/// The orchestration app: the Arlon support chart, deployed into the
/// cluster's namespace on the management cluster.
pub fn construct_arlon_app(cluster: &Cluster, config: &Config) -> Application {
    let name = cluster.name_any();
    let chart = cluster
        .spec
        .arlon_helm_chart
        .clone()
        .unwrap_or_else(|| config.arlon_chart.clone());

    let mut parameters = vec![
        HelmParameter::new(params::CLUSTER_NAME, cluster.inner_cluster_name()),
        HelmParameter::new(params::KUBECONFIG_SECRET_KEY_NAME, KUBECONFIG_SECRET_KEY),
        HelmParameter::new(
            params::AUTOSCALER_ENABLED,
            cluster.spec.autoscaler.is_some().to_string(),
        ),
    ];
    if let Some(autoscaler) = &cluster.spec.autoscaler {
        let url = autoscaler
            .management_cluster_url
            .clone()
            .unwrap_or_else(|| config.management_cluster_url.clone());
        parameters.push(HelmParameter::new(params::MANAGEMENT_CLUSTER_URL, url));
    }

    let mut meta = metadata(&arlon_app_name(&name), &config.argocd_namespace, labels::TYPE_ARLON_APP);
    meta.labels
        .get_or_insert_with(BTreeMap::new)
        .insert(labels::CLUSTER.to_string(), name.clone());

    Application {
        metadata: meta,
        spec: ApplicationSpec {
            project: naming::ARGOCD_PROJECT.to_string(),
            source: ApplicationSource {
                repo_url: chart.repo_url,
                path: chart.path,
                target_revision: chart.revision,
                helm: Some(HelmSource { parameters }),
            },
            destination: in_cluster(&name),
            sync_policy: automated_sync(),
        },
        status: None,
    }
}

/// The cluster app: the base template, or the override overlay when the
/// cluster is overridden.
pub fn construct_cluster_app(cluster: &Cluster, argocd_namespace: &str) -> Application {
    let name = cluster.name_any();
    let template = &cluster.spec.cluster_template;

    let source = match &cluster.spec.override_ {
        Some(ov) => ApplicationSource {
            repo_url: ov.repo.url.clone(),
            path: override_dir(&ov.repo.path, &name).to_string_lossy().into_owned(),
            target_revision: ov.repo.revision.clone(),
            helm: None,
        },
        None => ApplicationSource {
            repo_url: template.url.clone(),
            path: template.path.clone(),
            target_revision: template.revision.clone(),
            helm: None,
        },
    };

    let mut meta = metadata(&name, argocd_namespace, labels::TYPE_CLUSTER_APP);
    let mut app_annotations = BTreeMap::from([
        (annotations::BASE_CLUSTER_REPO_URL.to_string(), template.url.clone()),
        (annotations::BASE_CLUSTER_REPO_PATH.to_string(), template.path.clone()),
        (annotations::BASE_CLUSTER_REPO_REVISION.to_string(), template.revision.clone()),
    ]);
    if let Some(profiles) = cluster.profiles_annotation() {
        app_annotations.insert(annotations::PROFILES.to_string(), profiles.to_string());
    }
    meta.annotations = Some(app_annotations);

    Application {
        metadata: meta,
        spec: ApplicationSpec {
            project: naming::ARGOCD_PROJECT.to_string(),
            source,
            destination: in_cluster(&name),
            sync_policy: automated_sync(),
        },
        status: None,
    }
}

/// A profile app deploys a static profile's rendered bundles to the
/// workload cluster registered under `cluster`.
pub fn construct_profile_app(
    cluster: &str,
    profile: &Profile,
    argocd_namespace: &str,
) -> Result<Application> {
    let profile_name = profile.name_any();
    let (Some(repo_url), Some(repo_path)) = (&profile.spec.repo_url, &profile.spec.repo_path)
    else {
        return Err(ArlonError::InvalidConfig(format!(
            "profile {} has no repository location",
            profile_name
        )));
    };

    let mut meta = metadata(
        &profile_app_name(cluster, &profile_name),
        argocd_namespace,
        labels::TYPE_PROFILE_APP,
    );
    let app_labels = meta.labels.get_or_insert_with(BTreeMap::new);
    app_labels.insert(labels::CLUSTER.to_string(), cluster.to_string());
    app_labels.insert(labels::PROFILE.to_string(), profile_name.clone());

    Ok(Application {
        metadata: meta,
        spec: ApplicationSpec {
            project: naming::ARGOCD_PROJECT.to_string(),
            source: ApplicationSource {
                repo_url: repo_url.clone(),
                path: repo_path.clone(),
                target_revision: profile
                    .spec
                    .repo_revision
                    .clone()
                    .unwrap_or_else(|| "HEAD".to_string()),
                helm: Some(HelmSource {
                    parameters: vec![HelmParameter::new(params::CLUSTER_NAME, cluster)],
                }),
            },
            destination: ApplicationDestination {
                server: None,
                name: Some(cluster.to_string()),
                namespace: Some("default".to_string()),
            },
            sync_policy: automated_sync(),
        },
        status: None,
    })
}

/// Root app of a legacy cluster built from a clusterspec. `repo.path` is
/// the base directory; the chart copy lives at `<base>/<cluster>`.
pub fn construct_legacy_root_app(
    cluster: &str,
    spec: &ClusterSpecConfig,
    repo: &RepoRef,
    profile: Option<&str>,
    config: &Config,
) -> Application {
    let flavor_tag = format!(
        "{}{}",
        params::SUBCHART_TAG_PREFIX,
        spec.flavor.subchart_name()
    );
    let mut parameters = vec![
        HelmParameter::new(params::CLUSTER_NAME, cluster),
        HelmParameter::new(flavor_tag, "true"),
        HelmParameter::new(params::KUBERNETES_VERSION, &spec.kubernetes_version),
        HelmParameter::new(params::REGION, &spec.region),
        HelmParameter::new(params::NODE_TYPE, &spec.node_type),
        HelmParameter::new(params::NODE_COUNT, spec.node_count.to_string()),
        HelmParameter::new(params::MASTER_NODE_COUNT, spec.master_node_count.to_string()),
        HelmParameter::new(
            params::AUTOSCALER_ENABLED,
            spec.autoscaler.is_some().to_string(),
        ),
    ];
    if let Some(key) = &spec.ssh_key_name {
        parameters.push(HelmParameter::new(params::SSH_KEY_NAME, key));
    }
    if let Some(range) = spec.autoscaler {
        parameters.push(HelmParameter::new(
            params::AUTOSCALER_MIN_NODES,
            range.min_nodes.to_string(),
        ));
        parameters.push(HelmParameter::new(
            params::AUTOSCALER_MAX_NODES,
            range.max_nodes.to_string(),
        ));
        parameters.push(HelmParameter::new(
            params::MANAGEMENT_CLUSTER_URL,
            &config.management_cluster_url,
        ));
    }

    let mut meta = metadata(cluster, &config.argocd_namespace, labels::TYPE_CLUSTER);
    let mut app_annotations = BTreeMap::from([(
        annotations::CLUSTERSPEC.to_string(),
        spec.name.clone(),
    )]);
    if let Some(profile) = profile {
        app_annotations.insert(annotations::PROFILE.to_string(), profile.to_string());
    }
    meta.annotations = Some(app_annotations);

    Application {
        metadata: meta,
        spec: ApplicationSpec {
            project: naming::ARGOCD_PROJECT.to_string(),
            source: ApplicationSource {
                repo_url: repo.url.clone(),
                path: cluster_chart_path(&repo.path, cluster),
                target_revision: repo.revision.clone(),
                helm: Some(HelmSource { parameters }),
            },
            destination: in_cluster(cluster),
            sync_policy: automated_sync(),
        },
        status: None,
    }
}

/// Recover the cluster name and flavor from a legacy root app
pub fn decompose_legacy_root_app(app: &Application) -> Result<(String, Flavor)> {
    let (_, cluster) = split_cluster_chart_path(&app.spec.source.path).ok_or_else(|| {
        ArlonError::InvalidClusterSpec(format!(
            "{} has no cluster chart path",
            app.name_any()
        ))
    })?;

    let subchart = app
        .spec
        .source
        .helm
        .iter()
        .flat_map(|h| h.parameters.iter())
        .find_map(|p| p.name.strip_prefix(params::SUBCHART_TAG_PREFIX))
        .ok_or_else(|| {
            ArlonError::InvalidClusterSpec(format!("{} enables no subchart", app.name_any()))
        })?;

    Ok((cluster.to_string(), Flavor::from_subchart_name(subchart)?))
}
