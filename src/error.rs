// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ArlonError {
    #[error("Kubernetes API error: {0}")]
    KubeError(#[from] kube::Error),

    #[error("Git error: {0}")]
    GitError(#[from] git2::Error),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Background task failed: {0}")]
    TaskError(#[from] tokio::task::JoinError),

    #[error("Repository operation failed: {0}")]
    RepositoryError(String),

    #[error("Repository credentials unavailable: {0}")]
    CredentialsError(String),

    #[error("Invalid cluster template: {0}")]
    InvalidTemplate(String),

    #[error("Invalid clusterspec: {0}")]
    InvalidClusterSpec(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Illegal cluster state transition from {from} to {to}")]
    IllegalTransition { from: String, to: String },

    #[error("Failed to parse kubeconfig: {0}")]
    KubeconfigError(String),

    #[error("Namespace creation failed: {0}")]
    NamespaceError(String),

    #[error("{kind} \"{name}\" not found")]
    NotFound { kind: &'static str, name: String },
}

impl ArlonError {
    pub fn not_found(kind: &'static str, name: impl Into<String>) -> Self {
        ArlonError::NotFound {
            kind,
            name: name.into(),
        }
    }

    /// True when the backend reported the object as absent (HTTP 404).
    pub fn is_not_found(&self) -> bool {
        match self {
            ArlonError::KubeError(kube::Error::Api(err)) => err.code == 404,
            ArlonError::NotFound { .. } => true,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, ArlonError>;
