// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Workload cluster clients and kubeconfig rendering

use crate::error::{ArlonError, Result};
use k8s_openapi::api::core::v1::Secret;
use kube::{
    config::{KubeConfigOptions, Kubeconfig},
    Client,
};

/// Read a kubeconfig out of a secret key.
///
/// A missing key is a configuration error that retrying cannot fix.
pub fn kubeconfig_from_secret(secret: &Secret, key: &str) -> Result<String> {
    let name = secret.metadata.name.clone().unwrap_or_default();

    let Some(data) = secret.data.as_ref() else {
        return Err(ArlonError::InvalidConfig(format!(
            "kubeconfig secret {} has no data",
            name
        )));
    };

    let Some(kubeconfig_data) = data.get(key) else {
        return Err(ArlonError::InvalidConfig(format!(
            "kubeconfig secret {} does not contain '{}' key",
            name, key
        )));
    };

    String::from_utf8(kubeconfig_data.0.clone()).map_err(|e| {
        ArlonError::InvalidConfig(format!("failed to decode kubeconfig in {}: {}", name, e))
    })
}

/// Create a Kubernetes client from a kubeconfig string
pub async fn create_client_from_kubeconfig(kubeconfig: &str) -> Result<Client> {
    let kubeconfig_parsed: Kubeconfig = serde_yaml::from_str(kubeconfig)
        .map_err(|e| ArlonError::KubeconfigError(format!("Failed to parse kubeconfig: {}", e)))?;

    let client_config =
        kube::Config::from_custom_kubeconfig(kubeconfig_parsed, &KubeConfigOptions::default())
            .await
            .map_err(|e| {
                ArlonError::KubeconfigError(format!("Failed to create config: {}", e))
            })?;

    Client::try_from(client_config)
        .map_err(|e| ArlonError::KubeconfigError(format!("Failed to create client: {}", e)))
}

/// Render a token based kubeconfig for reaching `server`
pub fn render_token_kubeconfig(
    cluster_name: &str,
    server: &str,
    ca_data_b64: &str,
    token: &str,
) -> Result<String> {
    let user = format!("{}-callhome", cluster_name);
    let kubeconfig = serde_json::json!({
        "apiVersion": "v1",
        "kind": "Config",
        "clusters": [{
            "name": cluster_name,
            "cluster": {
                "server": server,
                "certificate-authority-data": ca_data_b64,
            }
        }],
        "users": [{
            "name": user,
            "user": { "token": token }
        }],
        "contexts": [{
            "name": cluster_name,
            "context": { "cluster": cluster_name, "user": user }
        }],
        "current-context": cluster_name,
    });
    Ok(serde_yaml::to_string(&kubeconfig)?)
}
