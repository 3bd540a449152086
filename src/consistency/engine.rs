// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

use crate::constants::{annotations, labels};
use crate::error::Result;
use crate::kubernetes::{arlon_selector, DeploymentApi, ResourceStore};
use crate::types::app_profile::{AppProfileStatus, ProfileHealth};
use crate::types::argocd::ListElement;
use crate::types::profile::{parse_profile_list, same_profile_list};
use kube::ResourceExt;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, info, instrument};

/// Writes performed by one pass
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PassReport {
    pub clusters_updated: usize,
    pub profiles_updated: usize,
    pub apps_updated: usize,
}

impl PassReport {
    pub fn writes(&self) -> usize {
        self.clusters_updated + self.profiles_updated + self.apps_updated
    }
}

/// Recomputes the whole fixed point on every call. Passes never overlap:
/// each one reads then writes across two backends without a transaction.
pub struct ConsistencyEngine {
    deploy: Arc<dyn DeploymentApi>,
    store: Arc<dyn ResourceStore>,
    pass_permit: Semaphore,
}

impl ConsistencyEngine {
    pub fn new(deploy: Arc<dyn DeploymentApi>, store: Arc<dyn ResourceStore>) -> Self {
        Self {
            deploy,
            store,
            pass_permit: Semaphore::new(1),
        }
    }

    #[instrument(skip(self))]
    pub async fn reconcile_all(&self) -> Result<PassReport> {
        // never closed, so acquire cannot fail
        let _permit = self.pass_permit.acquire().await;
        let mut report = PassReport::default();

        let mut clusters = self.deploy.list_clusters().await?;
        let cluster_apps = self
            .deploy
            .list_applications(&arlon_selector(labels::TYPE_CLUSTER_APP))
            .await?;
        let apps = self
            .deploy
            .list_application_sets(&arlon_selector(labels::TYPE_APPLICATION))
            .await?;
        let app_profiles = self.store.list_app_profiles().await?;

        // The arlon cluster app is authoritative for the clusters it backs
        let app_annotations: HashMap<String, Option<String>> = cluster_apps
            .iter()
            .map(|a| (a.name_any(), a.profiles_annotation().map(str::to_string)))
            .collect();
        for cluster in clusters.iter_mut() {
            let Some(wanted) = app_annotations.get(&cluster.name) else {
                continue;
            };
            if same_profile_list(wanted.as_deref(), cluster.profiles_annotation()) {
                continue;
            }
            match wanted {
                Some(value) => cluster
                    .annotations
                    .insert(annotations::PROFILES.to_string(), value.clone()),
                None => cluster.annotations.remove(annotations::PROFILES),
            };
            self.deploy.update_cluster(cluster).await?;
            debug!("Synced profiles of registered cluster {}", cluster.name);
            report.clusters_updated += 1;
        }

        let mut profile_targets: HashMap<String, BTreeSet<ListElement>> = HashMap::new();
        for cluster in &clusters {
            for profile in parse_profile_list(cluster.profiles_annotation()) {
                profile_targets.entry(profile).or_default().insert(ListElement {
                    cluster: cluster.name.clone(),
                    url: cluster.server.clone(),
                });
            }
        }

        let app_names: HashSet<String> = apps.iter().map(|a| a.name_any()).collect();
        let mut app_targets: BTreeMap<String, BTreeSet<ListElement>> = BTreeMap::new();
        for profile in &app_profiles {
            let name = profile.name_any();
            let (valid, invalid): (Vec<&String>, Vec<&String>) = profile
                .spec
                .app_names
                .iter()
                .partition(|app| app_names.contains(*app));

            let status = AppProfileStatus {
                health: Some(if invalid.is_empty() {
                    ProfileHealth::Healthy
                } else {
                    ProfileHealth::Degraded
                }),
                invalid_app_names: invalid.into_iter().cloned().collect(),
            };
            if profile.status.as_ref() != Some(&status) {
                self.store.update_app_profile_status(&name, &status).await?;
                debug!("Profile {} is now {:?}", name, status.health);
                report.profiles_updated += 1;
            }

            let targets = profile_targets.get(&name);
            for app in valid {
                let entry = app_targets.entry(app.clone()).or_default();
                if let Some(targets) = targets {
                    entry.extend(targets.iter().cloned());
                }
            }
        }

        for mut app in apps {
            let name = app.name_any();
            let wanted: Vec<ListElement> = app_targets
                .remove(&name)
                .map(|t| t.into_iter().collect())
                .unwrap_or_default();
            if app.target_elements() == wanted {
                continue;
            }
            app.set_target_elements(wanted);
            self.deploy.update_application_set(&app).await?;
            debug!("Retargeted app {}", name);
            report.apps_updated += 1;
        }

        if report.writes() > 0 {
            info!("Consistency pass wrote {:?}", report);
        } else {
            debug!("Consistency pass found nothing to change");
        }
        Ok(report)
    }
}
