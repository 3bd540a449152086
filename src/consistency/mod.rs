// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Fleet wide agreement between cluster annotations, app profiles and
//! app targeting.

pub mod engine;

pub use engine::{ConsistencyEngine, PassReport};
