// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use anyhow::Result;
use kube::Client;
use std::sync::Arc;
use tracing::{info, warn};

use arlon::config::Config;
use arlon::consistency::ConsistencyEngine;
use arlon::context::Context;
use arlon::git::GitRepositoryMutator;
use arlon::kubernetes::{wait_for_crds, KubeDeploymentApi, KubeResourceStore};
use arlon::reconcilers::{
    AppProfileReconciler, ApplicationReconciler, CallHomeReconciler, ClusterReconciler,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    info!("Starting Arlon controller");

    let config = Config::from_env()?;
    info!(
        "Configuration loaded: arlon_namespace={}, argocd_namespace={}",
        config.arlon_namespace, config.argocd_namespace
    );

    let client = Client::try_default().await?;
    info!("Connected to Kubernetes cluster");

    info!("Waiting for Arlon and ArgoCD CRDs to become available...");
    wait_for_crds(&client).await?;

    let deploy = Arc::new(KubeDeploymentApi::new(
        client.clone(),
        &config.argocd_namespace,
    ));
    let store = Arc::new(KubeResourceStore::new(
        client.clone(),
        &config.arlon_namespace,
        &config.argocd_namespace,
    ));
    let ctx = Arc::new(Context::new(
        deploy.clone(),
        store.clone(),
        Arc::new(GitRepositoryMutator::new()),
        config.clone(),
    ));
    // One engine shared by every trigger so passes never overlap
    let engine = Arc::new(ConsistencyEngine::new(deploy, store));

    let cluster_reconciler = ClusterReconciler::new(client.clone(), ctx);
    let app_profile_reconciler =
        AppProfileReconciler::new(client.clone(), &config.arlon_namespace, engine.clone());
    let application_reconciler =
        ApplicationReconciler::new(client.clone(), &config.argocd_namespace, engine);
    let callhome_reconciler = CallHomeReconciler::new(client, config);

    info!("Starting reconcilers...");

    tokio::try_join!(
        cluster_reconciler.run(),
        app_profile_reconciler.run(),
        application_reconciler.run(),
        callhome_reconciler.run()
    )?;

    // This should never be reached as reconcilers run forever
    warn!("All reconcilers stopped unexpectedly");
    Ok(())
}
