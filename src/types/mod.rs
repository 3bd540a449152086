// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Resource types owned by Arlon and the ArgoCD objects it drives.

pub mod app_profile;
pub mod argocd;
pub mod callhome;
pub mod cluster;
pub mod clusterspec;
pub mod profile;
