// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! CRD availability checking utilities

use crate::constants::crd::{POLL_INTERVAL_SECS, POLL_MAX_INTERVAL_SECS};
use crate::error::Result;
use kube::{discovery::Discovery, Client};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, warn};

/// A kind the operator cannot run without
#[derive(Debug, Clone, Copy)]
pub struct RequiredKind {
    pub group: &'static str,
    pub version: &'static str,
    pub kind: &'static str,
}

pub const REQUIRED_KINDS: [RequiredKind; 2] = [
    RequiredKind {
        group: "core.arlon.io",
        version: "v1",
        kind: "Cluster",
    },
    RequiredKind {
        group: "argoproj.io",
        version: "v1alpha1",
        kind: "Application",
    },
];

/// Wait for every required CRD to become available.
/// This uses exponential backoff starting at POLL_INTERVAL_SECS seconds.
pub async fn wait_for_crds(client: &Client) -> Result<()> {
    for required in REQUIRED_KINDS {
        wait_for_crd(client, required).await?;
    }
    Ok(())
}

async fn wait_for_crd(client: &Client, required: RequiredKind) -> Result<()> {
    let mut interval = POLL_INTERVAL_SECS;

    loop {
        match crd_exists(client, required).await {
            Ok(true) => {
                info!(
                    "{} CRD ({}/{}) is available",
                    required.kind, required.group, required.version
                );
                return Ok(());
            }
            Ok(false) => {
                info!(
                    "{} CRD ({}/{}) not yet available, waiting {} seconds...",
                    required.kind, required.group, required.version, interval
                );
            }
            Err(e) => {
                warn!(
                    "Error checking for {} CRD: {}, retrying in {} seconds...",
                    required.kind, e, interval
                );
            }
        }

        sleep(Duration::from_secs(interval)).await;

        interval = (interval * 2).min(POLL_MAX_INTERVAL_SECS);
    }
}

async fn crd_exists(client: &Client, required: RequiredKind) -> Result<bool> {
    let discovery = Discovery::new(client.clone())
        .filter(&[required.group])
        .run()
        .await?;

    let found = discovery
        .groups()
        .filter(|g| g.name() == required.group)
        .flat_map(|g| g.recommended_resources())
        .any(|(ar, _)| ar.kind == required.kind && ar.version == required.version);
    Ok(found)
}
