// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Cluster level operations: derived object construction, template
//! validation, override overlays, classification and entry points.

pub mod apps;
pub mod classifier;
pub mod entry;
pub mod naming;
pub mod overrides;
pub mod template;

pub use classifier::{ClusterInfo, ClusterKind};
