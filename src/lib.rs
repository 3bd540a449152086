// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
pub mod clusters;
pub mod config;
pub mod consistency;
pub mod constants;
pub mod context;
pub mod error;
pub mod git;
pub mod kubernetes;
pub mod reconcilers;
pub mod types;

#[cfg(test)]
pub mod test_utils;
