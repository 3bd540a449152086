// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! AppProfile reconciler - any profile change triggers a full consistency pass.

use crate::consistency::ConsistencyEngine;
use crate::constants::RETRY_DELAY_SECS;
use crate::error::{ArlonError, Result};
use crate::types::app_profile::AppProfile;
use futures::StreamExt;
use kube::{
    runtime::{controller::Action, watcher, Controller},
    Api, Client, ResourceExt,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, warn};

pub struct AppProfileReconciler {
    client: Client,
    namespace: String,
    engine: Arc<ConsistencyEngine>,
}

impl AppProfileReconciler {
    pub fn new(client: Client, namespace: impl Into<String>, engine: Arc<ConsistencyEngine>) -> Self {
        Self {
            client,
            namespace: namespace.into(),
            engine,
        }
    }

    pub async fn run(self) -> anyhow::Result<()> {
        let profiles: Api<AppProfile> = Api::namespaced(self.client.clone(), &self.namespace);

        Controller::new(profiles, watcher::Config::default())
            .run(reconcile, error_policy, self.engine)
            .for_each(|res| async move {
                match res {
                    Ok(o) => debug!("Reconciled app profile: {:?}", o),
                    Err(e) => warn!("Reconciliation error: {:?}", e),
                }
            })
            .await;

        Ok(())
    }
}

async fn reconcile(profile: Arc<AppProfile>, engine: Arc<ConsistencyEngine>) -> Result<Action> {
    debug!("App profile {} changed", profile.name_any());
    engine.reconcile_all().await?;
    Ok(Action::await_change())
}

fn error_policy(
    profile: Arc<AppProfile>,
    error: &ArlonError,
    _engine: Arc<ConsistencyEngine>,
) -> Action {
    error!(
        "Consistency pass for app profile {} failed: {}",
        profile.name_any(),
        error
    );
    Action::requeue(Duration::from_secs(RETRY_DELAY_SECS))
}
