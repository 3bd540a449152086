// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Kubernetes reconcilers that react to watch events.

pub mod app_profile;
pub mod application;
pub mod callhome;
pub mod cluster;

pub use app_profile::AppProfileReconciler;
pub use application::ApplicationReconciler;
pub use callhome::CallHomeReconciler;
pub use cluster::ClusterReconciler;
