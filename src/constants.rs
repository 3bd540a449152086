// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

/// Label keys and values other tooling relies on
pub mod labels {
    pub const MANAGED_BY: &str = "managed-by";
    pub const MANAGED_BY_ARLON: &str = "arlon";
    pub const ARLON_TYPE: &str = "arlon-type";

    pub const TYPE_CLUSTER: &str = "cluster";
    pub const TYPE_CLUSTER_APP: &str = "cluster-app";
    pub const TYPE_ARLON_APP: &str = "arlon-app";
    pub const TYPE_APPLICATION: &str = "application";
    pub const TYPE_PROFILE_APP: &str = "profile-app";
    pub const TYPE_CLUSTERSPEC: &str = "clusterspec";

    /// Cluster and profile a profile app was generated for
    pub const CLUSTER: &str = "arlon.io/cluster";
    pub const PROFILE: &str = "arlon.io/profile";

    /// Marks a registered cluster as externally provisioned
    pub const EXTERNAL_CLUSTER: &str = "arlon.io/external-cluster";

    /// ArgoCD declarative secret types
    pub const ARGOCD_SECRET_TYPE: &str = "argocd.argoproj.io/secret-type";
    pub const ARGOCD_SECRET_TYPE_CLUSTER: &str = "cluster";
    pub const ARGOCD_SECRET_TYPE_REPOSITORY: &str = "repository";
}

/// Annotation keys used by Arlon
pub mod annotations {
    /// Comma separated list of profile names attached to a cluster
    pub const PROFILES: &str = "arlon.io/profiles";
    pub const BASE_CLUSTER_REPO_URL: &str = "arlon.io/basecluster-repo-url";
    pub const BASE_CLUSTER_REPO_REVISION: &str = "arlon.io/basecluster-repo-revision";
    pub const BASE_CLUSTER_REPO_PATH: &str = "arlon.io/basecluster-repo-path";
    pub const CLUSTERSPEC: &str = "arlon.io/clusterspec";
    pub const PROFILE: &str = "arlon.io/profile";
}

/// Finalizers owned by the operator
pub mod finalizers {
    pub const CLUSTER: &str = "core.arlon.io/cluster-finalizer";
    /// Makes ArgoCD delete the managed resources together with the app
    pub const ARGOCD_RESOURCES: &str = "resources-finalizer.argocd.argoproj.io";
}

/// Naming conventions for derived objects
pub mod naming {
    pub const ARLON_APP_SUFFIX: &str = "-arlon";
    pub const PROFILE_APP_INFIX: &str = "-profile-";
    pub const ARGOCD_PROJECT: &str = "default";
    pub const IN_CLUSTER_SERVER: &str = "https://kubernetes.default.svc";
}

/// The operator name used for server-side apply
pub const OPERATOR_NAME: &str = "arlon-controller";

/// Fixed requeue delay for every retryable failure
pub const RETRY_DELAY_SECS: u64 = 10;

/// CRD polling configuration
pub mod crd {
    /// Initial polling interval in seconds when waiting for CRD
    pub const POLL_INTERVAL_SECS: u64 = 10;
    /// Maximum polling interval in seconds (exponential backoff cap)
    pub const POLL_MAX_INTERVAL_SECS: u64 = 60;
}
