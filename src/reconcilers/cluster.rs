// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Cluster reconciler - drives a Cluster from creation to its deployed apps,
//! and back out through ordered deletion.

use crate::clusters::apps::{construct_arlon_app, construct_cluster_app};
use crate::clusters::naming::arlon_app_name;
use crate::clusters::overrides::{create_patch_dir, delete_patch_dir};
use crate::clusters::template::validate_template;
use crate::constants::{annotations, RETRY_DELAY_SECS};
use crate::context::Context;
use crate::error::{ArlonError, Result};
use crate::types::cluster::{Cluster, ClusterOverride, ClusterState, ClusterStatus};
use futures::StreamExt;
use kube::{
    runtime::{controller::Action, watcher, Controller},
    Api, Client, ResourceExt,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};

/// Template problems are retried like any other failure; the prefix lets an
/// operator tell a broken template apart from a transient outage.
pub const TEMPLATE_FAILURE_PREFIX: &str = "template validation failed (retrying): ";

pub struct ClusterReconciler {
    client: Client,
    ctx: Arc<Context>,
}

impl ClusterReconciler {
    pub fn new(client: Client, ctx: Arc<Context>) -> Self {
        Self { client, ctx }
    }

    pub async fn run(self) -> anyhow::Result<()> {
        let clusters: Api<Cluster> =
            Api::namespaced(self.client.clone(), &self.ctx.config.arlon_namespace);

        Controller::new(clusters, watcher::Config::default())
            .run(reconcile, error_policy, self.ctx)
            .for_each(|res| async move {
                match res {
                    Ok(o) => debug!("Reconciled cluster: {:?}", o),
                    Err(e) => warn!("Reconciliation error: {:?}", e),
                }
            })
            .await;

        Ok(())
    }
}

fn retry_later() -> Action {
    Action::requeue(Duration::from_secs(RETRY_DELAY_SECS))
}

fn advance(status: &mut ClusterStatus, to: ClusterState) -> Result<()> {
    // a status carrying an inner name but no state has passed validation
    let from = match status.state {
        None if !status.inner_cluster_name.is_empty() => Some(ClusterState::TemplateValidated),
        state => state,
    };
    status.state = Some(ClusterState::transition(from, to)?);
    Ok(())
}

async fn mark_retrying(
    ctx: &Context,
    name: &str,
    mut status: ClusterStatus,
    message: String,
) -> Result<Action> {
    warn!("{}", message);
    advance(&mut status, ClusterState::Retrying)?;
    status.message = message;
    ctx.store.update_cluster_status(name, &status).await?;
    Ok(retry_later())
}

async fn validate(cluster: &Cluster, ctx: &Context) -> Result<String> {
    let template = cluster.spec.cluster_template.clone();
    let credentials = ctx.store.get_repo_credentials(&template.url).await?;
    let repos = ctx.repos.clone();

    tokio::task::spawn_blocking(move || validate_template(repos.as_ref(), &template, &credentials))
        .await?
}

async fn create_override(cluster: &Cluster, ov: &ClusterOverride, ctx: &Context) -> Result<bool> {
    let name = cluster.name_any();
    let override_repo = ov.repo.clone();
    let patch = ov.patch.clone();
    let base = cluster.spec.cluster_template.clone();
    let credentials = ctx.store.get_repo_credentials(&override_repo.url).await?;
    let repos = ctx.repos.clone();

    tokio::task::spawn_blocking(move || {
        create_patch_dir(
            repos.as_ref(),
            &name,
            &override_repo,
            &patch,
            &base,
            &credentials,
        )
    })
    .await?
}

async fn delete_override(cluster: &Cluster, ov: &ClusterOverride, ctx: &Context) -> Result<bool> {
    let name = cluster.name_any();
    let override_repo = ov.repo.clone();
    let credentials = ctx.store.get_repo_credentials(&override_repo.url).await?;
    let repos = ctx.repos.clone();

    tokio::task::spawn_blocking(move || {
        delete_patch_dir(repos.as_ref(), &name, &override_repo, &credentials)
    })
    .await?
}

#[instrument(skip(cluster, ctx), fields(cluster = %cluster.name_any()))]
pub async fn reconcile(cluster: Arc<Cluster>, ctx: Arc<Context>) -> Result<Action> {
    if cluster.is_being_deleted() {
        return reconcile_deletion(&cluster, &ctx).await;
    }

    let name = cluster.name_any();

    if !cluster.has_finalizer() {
        ctx.store.add_cluster_finalizer(&name).await?;
        return Ok(Action::await_change());
    }

    let mut status = cluster.status.clone().unwrap_or_default();

    if status.inner_cluster_name.is_empty() {
        match validate(&cluster, &ctx).await {
            Ok(inner) => {
                info!("Template validated, inner cluster name is {}", inner);
                status.inner_cluster_name = inner;
                status.message.clear();
                advance(&mut status, ClusterState::TemplateValidated)?;
                ctx.store.update_cluster_status(&name, &status).await?;
            }
            Err(e) => {
                let message = format!("{}{}", TEMPLATE_FAILURE_PREFIX, e);
                return mark_retrying(&ctx, &name, status, message).await;
            }
        }
    }

    if let Some(ov) = &cluster.spec.override_ {
        if !status.override_successful {
            match create_override(&cluster, ov, &ctx).await {
                Ok(pushed) => {
                    info!("Override ready (pushed: {})", pushed);
                    status.override_successful = true;
                    advance(&mut status, ClusterState::OverrideCreated)?;
                    ctx.store.update_cluster_status(&name, &status).await?;
                }
                Err(e) => {
                    warn!("Failed to create override: {}", e);
                    return Ok(retry_later());
                }
            }
        }
    }

    let mut current = (*cluster).clone();
    current.status = Some(status.clone());

    let arlon_name = arlon_app_name(&name);
    match ctx.deploy.get_application(&arlon_name).await {
        Ok(Some(_)) => {}
        Ok(None) => {
            let app = construct_arlon_app(&current, &ctx.config);
            if let Err(e) = ctx.deploy.create_application(&app).await {
                let message = format!("failed to create app {}: {}", arlon_name, e);
                return mark_retrying(&ctx, &name, status, message).await;
            }
        }
        Err(e) => {
            let message = format!("failed to look up app {}: {}", arlon_name, e);
            return mark_retrying(&ctx, &name, status, message).await;
        }
    }

    let desired = construct_cluster_app(&current, &ctx.config.argocd_namespace);
    let mut cluster_app = match ctx.deploy.get_application(&name).await {
        Ok(Some(app)) => app,
        Ok(None) => {
            if let Err(e) = ctx.deploy.create_application(&desired).await {
                let message = format!("failed to create app {}: {}", name, e);
                return mark_retrying(&ctx, &name, status, message).await;
            }
            desired.clone()
        }
        Err(e) => {
            let message = format!("failed to look up app {}: {}", name, e);
            return mark_retrying(&ctx, &name, status, message).await;
        }
    };

    if status.state != Some(ClusterState::Created) {
        advance(&mut status, ClusterState::Created)?;
        status.message.clear();
        ctx.store.update_cluster_status(&name, &status).await?;
        info!("Cluster apps created");
    }

    let mut changed = false;

    // follows the override once it exists
    let (have, want) = (&cluster_app.spec.source, &desired.spec.source);
    if (&have.repo_url, &have.path, &have.target_revision)
        != (&want.repo_url, &want.path, &want.target_revision)
    {
        info!("Pointing cluster app at {} {}", want.repo_url, want.path);
        cluster_app.spec.source = desired.spec.source.clone();
        changed = true;
    }

    // The Cluster is the source of truth for the profile list
    let wanted = cluster.profiles_annotation();
    if wanted != cluster_app.profiles_annotation() {
        match wanted {
            Some(profiles) => cluster_app
                .annotations_mut()
                .insert(annotations::PROFILES.to_string(), profiles.to_string()),
            None => cluster_app.annotations_mut().remove(annotations::PROFILES),
        };
        info!("Syncing profiles {:?} to cluster app", wanted);
        changed = true;
    }

    if changed {
        ctx.deploy.update_application(&cluster_app).await?;
    }

    Ok(Action::await_change())
}

/// One step of ordered deletion for a derived app. Returns the action to
/// stop with, or None once the app is confirmed gone.
async fn delete_app_step(ctx: &Context, app_name: &str) -> Result<Option<Action>> {
    let Some(app) = ctx.deploy.get_application(app_name).await? else {
        return Ok(None);
    };

    if app.is_being_deleted() {
        debug!("Deletion of app {} still pending", app_name);
        return Ok(Some(retry_later()));
    }

    match ctx.deploy.delete_application(app_name, true).await {
        Ok(()) => {
            info!("Requested cascading delete of app {}", app_name);
            Ok(Some(retry_later()))
        }
        Err(e) if e.is_not_found() => Ok(None),
        Err(e) => Err(e),
    }
}

async fn reconcile_deletion(cluster: &Cluster, ctx: &Context) -> Result<Action> {
    if !cluster.has_finalizer() {
        return Ok(Action::await_change());
    }
    let name = cluster.name_any();

    if let Some(ov) = &cluster.spec.override_ {
        if cluster.override_successful() {
            delete_override(cluster, ov, ctx).await?;
            let mut status = cluster.status.clone().unwrap_or_default();
            status.override_successful = false;
            ctx.store.update_cluster_status(&name, &status).await?;
            info!("Removed override");
            return Ok(Action::await_change());
        }
    }

    // cluster app first, orchestration app second
    for app_name in [name.clone(), arlon_app_name(&name)] {
        if let Some(action) = delete_app_step(ctx, &app_name).await? {
            return Ok(action);
        }
    }

    ctx.store.remove_cluster_finalizer(&name).await?;
    info!("Dependent objects removed, released cluster");
    Ok(Action::await_change())
}

fn error_policy(cluster: Arc<Cluster>, error: &ArlonError, _ctx: Arc<Context>) -> Action {
    error!("Reconciliation error for cluster {}: {}", cluster.name_any(), error);
    retry_later()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clusters::apps::params;
    use crate::constants::finalizers;
    use crate::context::testing::TestContext;
    use crate::git::RepoCredentials;
    use crate::kubernetes::ResourceStore;
    use crate::types::cluster::{ClusterSpec, RepoRef};

    const TEMPLATES: &str = "https://github.com/example/templates.git";
    const OVERRIDES: &str = "https://github.com/example/overrides.git";

    const CLUSTER_YAML: &str = "apiVersion: cluster.x-k8s.io/v1beta1\nkind: Cluster\nmetadata:\n  name: capi-quickstart\n";

    fn setup() -> TestContext {
        let t = TestContext::new();
        t.repos.seed(TEMPLATES, &[("capi/aws/cluster.yaml", CLUSTER_YAML)]);
        t.repos.seed(OVERRIDES, &[("README.md", "overrides\n")]);
        t.store.insert_credentials(TEMPLATES, RepoCredentials::default());
        t.store.insert_credentials(OVERRIDES, RepoCredentials::default());
        t
    }

    fn make_cluster(name: &str, with_override: bool) -> Cluster {
        let mut cluster = Cluster::new(
            name,
            ClusterSpec {
                cluster_template: RepoRef {
                    url: TEMPLATES.to_string(),
                    path: "capi/aws".to_string(),
                    revision: "main".to_string(),
                },
                override_: with_override.then(|| ClusterOverride {
                    patch: "spec:\n  replicas: 3\n".to_string(),
                    repo: RepoRef {
                        url: OVERRIDES.to_string(),
                        path: "overrides".to_string(),
                        revision: "main".to_string(),
                    },
                }),
                autoscaler: None,
                arlon_helm_chart: None,
            },
        );
        cluster.metadata.namespace = Some("arlon".to_string());
        cluster
    }

    fn with_finalizer(mut cluster: Cluster) -> Cluster {
        cluster.metadata.finalizers = Some(vec![finalizers::CLUSTER.to_string()]);
        cluster
    }

    async fn pass(t: &TestContext, name: &str) -> Action {
        let cluster = t.store.cluster(name).expect("cluster exists");
        reconcile(Arc::new(cluster), t.ctx.clone()).await.unwrap()
    }

    fn status(t: &TestContext, name: &str) -> ClusterStatus {
        t.store.cluster(name).unwrap().status.unwrap_or_default()
    }

    #[tokio::test]
    async fn test_first_pass_only_adds_finalizer() {
        let t = setup();
        t.store.insert_cluster(make_cluster("c1", true));

        let action = pass(&t, "c1").await;

        assert_eq!(action, Action::await_change());
        assert!(t.store.cluster("c1").unwrap().has_finalizer());
        assert_eq!(t.store.writes(), vec!["add-finalizer c1"]);
        assert_eq!(t.deploy.write_count(), 0);
        assert_eq!(t.repos.clone_count(), 0);
    }

    #[tokio::test]
    async fn test_creates_everything_in_one_pass() {
        let t = setup();
        t.store.insert_cluster(with_finalizer(make_cluster("c1", true)));

        let action = pass(&t, "c1").await;
        assert_eq!(action, Action::await_change());

        let current = status(&t, "c1");
        assert_eq!(current.state, Some(ClusterState::Created));
        assert_eq!(current.inner_cluster_name, "capi-quickstart");
        assert!(current.override_successful);
        assert!(current.message.is_empty());

        let arlon = t.deploy.application("c1-arlon").unwrap();
        assert_eq!(arlon.helm_parameter(params::CLUSTER_NAME), Some("capi-quickstart"));
        let cluster_app = t.deploy.application("c1").unwrap();
        assert_eq!(cluster_app.spec.source.repo_url, OVERRIDES);
        assert_eq!(cluster_app.spec.source.path, "overrides/c1");
        assert!(t.repos.file(OVERRIDES, "overrides/c1/patch.yaml").is_some());

        assert_eq!(t.deploy.writes(), vec!["create c1-arlon", "create c1"]);
    }

    #[tokio::test]
    async fn test_steady_state_does_not_revalidate_or_recreate() {
        let t = setup();
        t.store.insert_cluster(with_finalizer(make_cluster("c1", true)));
        pass(&t, "c1").await;
        let clones = t.repos.clone_count();
        let deploy_writes = t.deploy.write_count();
        let store_writes = t.store.write_count();

        pass(&t, "c1").await;
        pass(&t, "c1").await;

        assert_eq!(t.repos.clone_count(), clones);
        assert_eq!(t.repos.push_count(), 1);
        assert_eq!(t.deploy.write_count(), deploy_writes);
        assert_eq!(t.store.write_count(), store_writes);
    }

    #[tokio::test]
    async fn test_validated_cluster_skips_validation() {
        let t = setup();
        let mut cluster = with_finalizer(make_cluster("c1", false));
        cluster.status = Some(ClusterStatus {
            state: Some(ClusterState::TemplateValidated),
            inner_cluster_name: "from-earlier".to_string(),
            ..Default::default()
        });
        t.store.insert_cluster(cluster);

        pass(&t, "c1").await;

        assert_eq!(t.repos.clone_count(), 0);
        assert_eq!(status(&t, "c1").state, Some(ClusterState::Created));
        let arlon = t.deploy.application("c1-arlon").unwrap();
        assert_eq!(arlon.helm_parameter(params::CLUSTER_NAME), Some("from-earlier"));
    }

    #[tokio::test]
    async fn test_invalid_template_is_retried() {
        let t = setup();
        t.repos.seed(TEMPLATES, &[("capi/aws/cm.yaml", "kind: ConfigMap\n")]);
        t.store.insert_cluster(with_finalizer(make_cluster("c1", false)));

        let action = pass(&t, "c1").await;

        assert_eq!(action, Action::requeue(Duration::from_secs(10)));
        let current = status(&t, "c1");
        assert_eq!(current.state, Some(ClusterState::Retrying));
        assert!(current.message.starts_with(TEMPLATE_FAILURE_PREFIX));
        assert!(current.inner_cluster_name.is_empty());
        assert_eq!(t.deploy.write_count(), 0);

        // fixed template recovers on the next pass
        t.repos.seed(TEMPLATES, &[("capi/aws/cluster.yaml", CLUSTER_YAML)]);
        pass(&t, "c1").await;
        assert_eq!(status(&t, "c1").state, Some(ClusterState::Created));
    }

    #[tokio::test]
    async fn test_missing_credentials_are_retried() {
        let t = TestContext::new();
        t.store.insert_cluster(with_finalizer(make_cluster("c1", false)));

        let action = pass(&t, "c1").await;

        assert_eq!(action, Action::requeue(Duration::from_secs(10)));
        assert_eq!(status(&t, "c1").state, Some(ClusterState::Retrying));
        assert!(status(&t, "c1").message.contains("credentials"));
    }

    #[tokio::test]
    async fn test_override_failure_keeps_state() {
        let t = setup();
        t.repos.fail_pushes(true);
        t.store.insert_cluster(with_finalizer(make_cluster("c1", true)));

        let action = pass(&t, "c1").await;

        assert_eq!(action, Action::requeue(Duration::from_secs(10)));
        let current = status(&t, "c1");
        assert_eq!(current.state, Some(ClusterState::TemplateValidated));
        assert!(!current.override_successful);
        assert_eq!(t.deploy.write_count(), 0);
    }

    #[tokio::test]
    async fn test_override_added_after_creation_is_applied() {
        let t = setup();
        t.store.insert_cluster(with_finalizer(make_cluster("c1", false)));
        pass(&t, "c1").await;
        assert_eq!(status(&t, "c1").state, Some(ClusterState::Created));
        assert_eq!(t.deploy.application("c1").unwrap().spec.source.repo_url, TEMPLATES);

        let mut cluster = t.store.cluster("c1").unwrap();
        cluster.spec.override_ = make_cluster("c1", true).spec.override_;
        t.store.insert_cluster(cluster);

        let action = pass(&t, "c1").await;

        assert_eq!(action, Action::await_change());
        let current = status(&t, "c1");
        assert!(current.override_successful);
        assert_eq!(current.state, Some(ClusterState::Created));
        assert!(t.repos.file(OVERRIDES, "overrides/c1/patch.yaml").is_some());
        let cluster_app = t.deploy.application("c1").unwrap();
        assert_eq!(cluster_app.spec.source.repo_url, OVERRIDES);
        assert_eq!(cluster_app.spec.source.path, "overrides/c1");
        assert_eq!(t.deploy.writes().last().map(String::as_str), Some("update c1"));

        // settled again
        let deploy_writes = t.deploy.write_count();
        pass(&t, "c1").await;
        assert_eq!(t.deploy.write_count(), deploy_writes);
        assert_eq!(t.repos.push_count(), 1);
    }

    #[tokio::test]
    async fn test_inner_name_without_state_counts_as_validated() {
        let t = setup();
        let mut cluster = with_finalizer(make_cluster("c1", true));
        cluster.status = Some(ClusterStatus {
            state: None,
            inner_cluster_name: "from-earlier".to_string(),
            ..Default::default()
        });
        t.store.insert_cluster(cluster);

        let action = pass(&t, "c1").await;

        assert_eq!(action, Action::await_change());
        let current = status(&t, "c1");
        assert_eq!(current.state, Some(ClusterState::Created));
        assert!(current.override_successful);
        // only the override repo was cloned
        assert_eq!(t.repos.clone_count(), 1);
    }

    #[tokio::test]
    async fn test_lookup_error_never_creates() {
        let t = setup();
        t.deploy.fail_gets(true);
        t.store.insert_cluster(with_finalizer(make_cluster("c1", false)));

        let action = pass(&t, "c1").await;

        assert_eq!(action, Action::requeue(Duration::from_secs(10)));
        assert_eq!(t.deploy.write_count(), 0);
        let current = status(&t, "c1");
        assert_eq!(current.state, Some(ClusterState::Retrying));
        assert!(current.message.contains("c1-arlon"));

        t.deploy.fail_gets(false);
        pass(&t, "c1").await;
        assert_eq!(status(&t, "c1").state, Some(ClusterState::Created));
    }

    #[tokio::test]
    async fn test_profiles_annotation_is_mirrored_to_cluster_app() {
        let t = setup();
        t.store.insert_cluster(with_finalizer(make_cluster("c1", false)));
        pass(&t, "c1").await;
        assert_eq!(t.deploy.application("c1").unwrap().profiles_annotation(), None);

        t.store.set_cluster_profiles("c1", Some("marketing,qa")).await.unwrap();
        pass(&t, "c1").await;
        assert_eq!(
            t.deploy.application("c1").unwrap().profiles_annotation(),
            Some("marketing,qa")
        );

        t.store.set_cluster_profiles("c1", None).await.unwrap();
        pass(&t, "c1").await;
        assert_eq!(t.deploy.application("c1").unwrap().profiles_annotation(), None);
    }

    #[tokio::test]
    async fn test_ordered_deletion() {
        let t = setup();
        t.store.insert_cluster(with_finalizer(make_cluster("c1", true)));
        pass(&t, "c1").await;
        t.store.mark_cluster_deleted("c1");

        // override first, apps untouched
        pass(&t, "c1").await;
        assert!(!status(&t, "c1").override_successful);
        assert!(t.repos.file(OVERRIDES, "overrides/c1/patch.yaml").is_none());
        assert!(!t.deploy.application("c1").unwrap().is_being_deleted());
        assert!(!t.deploy.application("c1-arlon").unwrap().is_being_deleted());

        // then the cluster app
        let action = pass(&t, "c1").await;
        assert_eq!(action, Action::requeue(Duration::from_secs(10)));
        assert!(t.deploy.application("c1").unwrap().is_being_deleted());
        assert!(!t.deploy.application("c1-arlon").unwrap().is_being_deleted());

        // pending deletion backs off without new writes
        let writes = t.deploy.write_count();
        let action = pass(&t, "c1").await;
        assert_eq!(action, Action::requeue(Duration::from_secs(10)));
        assert_eq!(t.deploy.write_count(), writes);

        // then the orchestration app
        t.deploy.finish_deletions();
        pass(&t, "c1").await;
        assert!(t.deploy.application("c1-arlon").unwrap().is_being_deleted());
        assert!(t.store.cluster("c1").unwrap().has_finalizer());

        // finally the finalizer
        t.deploy.finish_deletions();
        pass(&t, "c1").await;
        assert!(t.store.cluster("c1").is_none());

        assert_eq!(
            t.deploy.writes(),
            vec!["create c1-arlon", "create c1", "delete c1", "delete c1-arlon"]
        );
        assert_eq!(t.repos.push_count(), 2);
    }

    #[tokio::test]
    async fn test_deletion_before_creation_finished() {
        let t = setup();
        t.store.insert_cluster(with_finalizer(make_cluster("c1", true)));
        t.store.mark_cluster_deleted("c1");

        pass(&t, "c1").await;

        assert!(t.store.cluster("c1").is_none());
        assert_eq!(t.repos.clone_count(), 0);
        assert_eq!(t.deploy.write_count(), 0);
    }

    #[tokio::test]
    async fn test_deleted_cluster_without_finalizer_is_ignored() {
        let t = setup();
        t.store.insert_cluster(make_cluster("c1", false));
        t.store.mark_cluster_deleted("c1");

        assert_eq!(pass(&t, "c1").await, Action::await_change());
        assert!(t.store.writes().is_empty());
    }

    #[tokio::test]
    async fn test_deletion_lookup_error_is_surfaced() {
        let t = setup();
        t.store.insert_cluster(with_finalizer(make_cluster("c1", false)));
        pass(&t, "c1").await;
        t.store.mark_cluster_deleted("c1");
        t.deploy.fail_gets(true);

        let cluster = t.store.cluster("c1").unwrap();
        let err = reconcile(Arc::new(cluster), t.ctx.clone()).await.unwrap_err();
        assert!(!err.is_not_found());
        assert!(t.store.cluster("c1").unwrap().has_finalizer());
    }
}
