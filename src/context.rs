// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

use crate::config::Config;
use crate::git::RepositoryMutator;
use crate::kubernetes::{DeploymentApi, ResourceStore};
use std::sync::Arc;

/// Collaborators shared by the cluster reconciler and the entry points
#[derive(Clone)]
pub struct Context {
    pub deploy: Arc<dyn DeploymentApi>,
    pub store: Arc<dyn ResourceStore>,
    pub repos: Arc<dyn RepositoryMutator>,
    pub config: Config,
}

impl Context {
    pub fn new(
        deploy: Arc<dyn DeploymentApi>,
        store: Arc<dyn ResourceStore>,
        repos: Arc<dyn RepositoryMutator>,
        config: Config,
    ) -> Self {
        Self {
            deploy,
            store,
            repos,
            config,
        }
    }
}
