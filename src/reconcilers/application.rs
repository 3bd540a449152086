// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Application reconciler - deployable apps and cluster apps feed the
//! consistency pass.

use crate::consistency::ConsistencyEngine;
use crate::constants::{labels, RETRY_DELAY_SECS};
use crate::error::{ArlonError, Result};
use crate::kubernetes::arlon_selector;
use crate::types::argocd::{Application, ApplicationSet};
use futures::StreamExt;
use k8s_openapi::api::core::v1::Secret;
use kube::{
    runtime::{controller::Action, watcher, Controller},
    Api, Client, Resource, ResourceExt,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, warn};

/// Watches deployable apps (application sets labeled `application`), arlon
/// cluster apps and registered cluster secrets. Profile annotations on the
/// latter two drive targeting.
pub struct ApplicationReconciler {
    client: Client,
    namespace: String,
    engine: Arc<ConsistencyEngine>,
}

impl ApplicationReconciler {
    pub fn new(client: Client, namespace: impl Into<String>, engine: Arc<ConsistencyEngine>) -> Self {
        Self {
            client,
            namespace: namespace.into(),
            engine,
        }
    }

    pub async fn run(self) -> anyhow::Result<()> {
        let apps: Api<ApplicationSet> = Api::namespaced(self.client.clone(), &self.namespace);
        let cluster_apps: Api<Application> = Api::namespaced(self.client.clone(), &self.namespace);
        let cluster_secrets: Api<Secret> = Api::namespaced(self.client.clone(), &self.namespace);

        let app_sets = Controller::new(
            apps,
            watcher::Config::default().labels(&arlon_selector(labels::TYPE_APPLICATION)),
        )
        .run(reconcile, error_policy, self.engine.clone())
        .for_each(|res| async move {
            match res {
                Ok(o) => debug!("Reconciled app: {:?}", o),
                Err(e) => warn!("Reconciliation error: {:?}", e),
            }
        });

        let cluster_app_changes = Controller::new(
            cluster_apps,
            watcher::Config::default().labels(&arlon_selector(labels::TYPE_CLUSTER_APP)),
        )
        .run(reconcile, error_policy, self.engine.clone())
        .for_each(|res| async move {
            match res {
                Ok(o) => debug!("Reconciled cluster app: {:?}", o),
                Err(e) => warn!("Reconciliation error: {:?}", e),
            }
        });

        let registered_clusters = Controller::new(
            cluster_secrets,
            watcher::Config::default().labels(&format!(
                "{}={}",
                labels::ARGOCD_SECRET_TYPE,
                labels::ARGOCD_SECRET_TYPE_CLUSTER
            )),
        )
        .run(reconcile, error_policy, self.engine)
        .for_each(|res| async move {
            match res {
                Ok(o) => debug!("Reconciled registered cluster: {:?}", o),
                Err(e) => warn!("Reconciliation error: {:?}", e),
            }
        });

        futures::join!(app_sets, cluster_app_changes, registered_clusters);
        Ok(())
    }
}

async fn reconcile<K>(obj: Arc<K>, engine: Arc<ConsistencyEngine>) -> Result<Action>
where
    K: Resource,
{
    debug!("{} changed", obj.name_any());
    engine.reconcile_all().await?;
    Ok(Action::await_change())
}

fn error_policy<K>(obj: Arc<K>, error: &ArlonError, _engine: Arc<ConsistencyEngine>) -> Action
where
    K: Resource,
{
    error!("Consistency pass for {} failed: {}", obj.name_any(), error);
    Action::requeue(Duration::from_secs(RETRY_DELAY_SECS))
}
