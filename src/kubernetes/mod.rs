// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Kubernetes access: the deployment and resource collaborators, CRD
//! discovery, workload cluster clients, and namespace management.

pub mod client;
pub mod crd;
pub mod deployment_api;
pub mod namespaces;
pub mod resource_store;

pub use client::{create_client_from_kubeconfig, kubeconfig_from_secret, render_token_kubeconfig};
pub use crd::wait_for_crds;
pub use deployment_api::{arlon_selector, DeploymentApi, KubeDeploymentApi};
pub use namespaces::ensure_namespace_exists;
pub use resource_store::{KubeResourceStore, ResourceStore};
