// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! CallHomeConfig reconciler - hands a workload cluster a kubeconfig that
//! reaches back into the management cluster.

use crate::config::Config;
use crate::constants::{OPERATOR_NAME, RETRY_DELAY_SECS};
use crate::error::{ArlonError, Result};
use crate::kubernetes::{
    create_client_from_kubeconfig, ensure_namespace_exists, kubeconfig_from_secret,
    render_token_kubeconfig,
};
use crate::types::callhome::{CallHomeConfig, CallHomeState};
use futures::StreamExt;
use k8s_openapi::api::core::v1::Secret;
use kube::{
    api::{ObjectMeta, Patch, PatchParams, PostParams},
    runtime::{controller::Action, watcher, Controller},
    Api, Client, ResourceExt,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

const SERVICE_ACCOUNT_TOKEN_TYPE: &str = "kubernetes.io/service-account-token";
const SERVICE_ACCOUNT_NAME_ANNOTATION: &str = "kubernetes.io/service-account.name";
const TARGET_SECRET_KEY: &str = "value";
const MANAGEMENT_CLUSTER_NAME: &str = "management";

pub struct CallHomeContext {
    client: Client,
    config: Config,
}

pub struct CallHomeReconciler {
    client: Client,
    config: Config,
}

impl CallHomeReconciler {
    pub fn new(client: Client, config: Config) -> Self {
        Self { client, config }
    }

    pub async fn run(self) -> anyhow::Result<()> {
        let configs: Api<CallHomeConfig> =
            Api::namespaced(self.client.clone(), &self.config.arlon_namespace);
        let ctx = Arc::new(CallHomeContext {
            client: self.client,
            config: self.config,
        });

        Controller::new(configs, watcher::Config::default())
            .run(reconcile, error_policy, ctx)
            .for_each(|res| async move {
                match res {
                    Ok(o) => debug!("Reconciled callhome config: {:?}", o),
                    Err(e) => warn!("Reconciliation error: {:?}", e),
                }
            })
            .await;

        Ok(())
    }
}

#[instrument(skip(chc, ctx), fields(callhome = %chc.name_any()))]
async fn reconcile(chc: Arc<CallHomeConfig>, ctx: Arc<CallHomeContext>) -> Result<Action> {
    if chc.is_settled() {
        return Ok(Action::await_change());
    }

    match push_kubeconfig(&chc, &ctx).await {
        Ok(()) => {
            info!(
                "Pushed management kubeconfig to {}/{}",
                chc.spec.target_namespace, chc.spec.target_secret_name
            );
            set_status(&chc, &ctx, CallHomeState::Complete, String::new()).await?;
            Ok(Action::await_change())
        }
        // Nothing changes until the user edits the config or its secret
        Err(e @ ArlonError::InvalidConfig(_)) => {
            warn!("CallHomeConfig cannot be applied: {}", e);
            set_status(&chc, &ctx, CallHomeState::Error, e.to_string()).await?;
            Ok(Action::await_change())
        }
        Err(e) => {
            warn!("CallHomeConfig not applied yet: {}", e);
            set_status(&chc, &ctx, CallHomeState::Retrying, e.to_string()).await?;
            Ok(Action::requeue(Duration::from_secs(RETRY_DELAY_SECS)))
        }
    }
}

async fn push_kubeconfig(chc: &CallHomeConfig, ctx: &CallHomeContext) -> Result<()> {
    let namespace = chc
        .namespace()
        .unwrap_or_else(|| ctx.config.arlon_namespace.clone());
    let secrets: Api<Secret> = Api::namespaced(ctx.client.clone(), &namespace);

    let kubeconfig_secret = secrets
        .get_opt(&chc.spec.kubeconfig_secret_name)
        .await?
        .ok_or_else(|| ArlonError::not_found("secret", &chc.spec.kubeconfig_secret_name))?;
    let workload_kubeconfig =
        kubeconfig_from_secret(&kubeconfig_secret, &chc.spec.kubeconfig_secret_key)?;

    let (token, ca_data) = service_account_token(&secrets, &chc.spec.service_account_name).await?;
    let server = chc
        .spec
        .management_cluster_url
        .as_deref()
        .unwrap_or(&ctx.config.management_cluster_url);
    let management_kubeconfig =
        render_token_kubeconfig(MANAGEMENT_CLUSTER_NAME, server, &ca_data, &token)?;

    let workload = create_client_from_kubeconfig(&workload_kubeconfig).await?;
    ensure_namespace_exists(&workload, &chc.spec.target_namespace).await?;

    let target: Api<Secret> = Api::namespaced(workload, &chc.spec.target_namespace);
    let secret = Secret {
        metadata: ObjectMeta {
            name: Some(chc.spec.target_secret_name.clone()),
            namespace: Some(chc.spec.target_namespace.clone()),
            ..Default::default()
        },
        string_data: Some(BTreeMap::from([(
            TARGET_SECRET_KEY.to_string(),
            management_kubeconfig,
        )])),
        ..Default::default()
    };
    target
        .patch(
            &chc.spec.target_secret_name,
            &PatchParams::apply(OPERATOR_NAME).force(),
            &Patch::Apply(&secret),
        )
        .await?;
    Ok(())
}

/// Token and base64 CA bundle of a service account, creating its token
/// secret when it does not exist yet
async fn service_account_token(secrets: &Api<Secret>, account: &str) -> Result<(String, String)> {
    let name = format!("{}-token", account);

    let Some(secret) = secrets.get_opt(&name).await? else {
        let token_secret = Secret {
            metadata: ObjectMeta {
                name: Some(name.clone()),
                annotations: Some(BTreeMap::from([(
                    SERVICE_ACCOUNT_NAME_ANNOTATION.to_string(),
                    account.to_string(),
                )])),
                ..Default::default()
            },
            type_: Some(SERVICE_ACCOUNT_TOKEN_TYPE.to_string()),
            ..Default::default()
        };
        secrets.create(&PostParams::default(), &token_secret).await?;
        info!("Created token secret {} for service account {}", name, account);
        return Err(ArlonError::CredentialsError(format!(
            "waiting for token in {}",
            name
        )));
    };

    let data = secret.data.unwrap_or_default();
    let (Some(token), Some(ca)) = (data.get("token"), data.get("ca.crt")) else {
        return Err(ArlonError::CredentialsError(format!(
            "token secret {} is not populated yet",
            name
        )));
    };

    let token = String::from_utf8(token.0.clone())
        .map_err(|e| ArlonError::CredentialsError(format!("token in {}: {}", name, e)))?;
    // ByteString serializes as base64
    let ca_data = serde_json::to_value(ca)?
        .as_str()
        .map(str::to_string)
        .unwrap_or_default();
    Ok((token, ca_data))
}

async fn set_status(
    chc: &CallHomeConfig,
    ctx: &CallHomeContext,
    state: CallHomeState,
    message: String,
) -> Result<()> {
    let namespace = chc
        .namespace()
        .unwrap_or_else(|| ctx.config.arlon_namespace.clone());
    let api: Api<CallHomeConfig> = Api::namespaced(ctx.client.clone(), &namespace);
    let patch = serde_json::json!({
        "status": {
            "state": state,
            "message": message,
            "observedGeneration": chc.metadata.generation,
        }
    });
    api.patch_status(
        &chc.name_any(),
        &PatchParams::default(),
        &Patch::Merge(&patch),
    )
    .await?;
    Ok(())
}

fn error_policy(chc: Arc<CallHomeConfig>, error: &ArlonError, _ctx: Arc<CallHomeContext>) -> Action {
    warn!("CallHomeConfig {} reconcile failed: {}", chc.name_any(), error);
    Action::requeue(Duration::from_secs(RETRY_DELAY_SECS))
}
