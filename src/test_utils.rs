// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Test utilities: canned Kubernetes API responses and in-memory
//! collaborators that record every write.

use crate::constants::finalizers;
use crate::error::{ArlonError, Result};
use crate::git::{normalize_repo_url, RepoCredentials, RepositoryMutator, WorkingTree};
use crate::kubernetes::{DeploymentApi, ResourceStore};
use crate::types::app_profile::{AppProfile, AppProfileStatus};
use crate::types::argocd::{Application, ApplicationSet, RegisteredCluster};
use crate::types::cluster::{Cluster, ClusterStatus};
use crate::types::profile::Profile;
use async_trait::async_trait;
use http::{Request, Response};
use k8s_openapi::api::core::v1::ConfigMap;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
use kube::client::Body;
use kube::core::ErrorResponse;
use kube::{Client, ResourceExt};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use tower::Service;

/// A mock HTTP service that returns predefined responses based on request paths.
#[derive(Clone)]
pub struct MockService {
    responses: Arc<Mutex<HashMap<(String, String), (u16, String)>>>,
    requests: Arc<Mutex<Vec<(String, String)>>>,
    uris: Arc<Mutex<Vec<String>>>,
}

impl MockService {
    pub fn new() -> Self {
        Self {
            responses: Arc::new(Mutex::new(HashMap::new())),
            requests: Arc::new(Mutex::new(Vec::new())),
            uris: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Every (method, path) received so far, in order
    pub fn requests(&self) -> Vec<(String, String)> {
        self.requests.lock().unwrap().clone()
    }

    /// Every request line received so far, including the query string
    pub fn uris(&self) -> Vec<String> {
        self.uris.lock().unwrap().clone()
    }

    fn on(self, method: &str, path: &str, status: u16, body: &str) -> Self {
        self.responses
            .lock()
            .unwrap()
            .insert((method.to_string(), path.to_string()), (status, body.to_string()));
        self
    }

    /// Add a response for GET requests matching the exact path
    pub fn on_get(self, path: &str, status: u16, body: &str) -> Self {
        self.on("GET", path, status, body)
    }

    /// Add a response for POST requests matching the exact path
    pub fn on_post(self, path: &str, status: u16, body: &str) -> Self {
        self.on("POST", path, status, body)
    }

    /// Add a response for PATCH requests matching the exact path
    pub fn on_patch(self, path: &str, status: u16, body: &str) -> Self {
        self.on("PATCH", path, status, body)
    }

    pub fn on_delete(self, path: &str, status: u16, body: &str) -> Self {
        self.on("DELETE", path, status, body)
    }

    /// Build a kube Client from this mock service
    pub fn into_client(self) -> Client {
        Client::new(self, "https://kubernetes.default.svc")
    }

    fn find_response(&self, method: &str, path: &str) -> Option<(u16, String)> {
        let responses = self.responses.lock().unwrap();

        // Try exact match first
        if let Some(resp) = responses.get(&(method.to_string(), path.to_string())) {
            return Some(resp.clone());
        }

        // Try prefix match for paths like /api/v1/namespaces/foo
        for ((m, p), resp) in responses.iter() {
            if m == method && path.starts_with(p) {
                return Some(resp.clone());
            }
        }

        None
    }
}

impl Default for MockService {
    fn default() -> Self {
        Self::new()
    }
}

impl Service<Request<Body>> for MockService {
    type Response = Response<Body>;
    type Error = tower::BoxError;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = std::result::Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<std::result::Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let method = req.method().to_string();
        let path = req.uri().path().to_string();
        self.requests
            .lock()
            .unwrap()
            .push((method.clone(), path.clone()));
        self.uris.lock().unwrap().push(format!("{} {}", method, req.uri()));

        let response = self.find_response(&method, &path);

        Box::pin(async move {
            match response {
                Some((status, body)) => Ok(Response::builder()
                    .status(status)
                    .header("content-type", "application/json")
                    .body(Body::from(body.into_bytes()))
                    .unwrap()),
                None => {
                    // Default 404 for unmatched requests
                    let body = r#"{"kind":"Status","apiVersion":"v1","status":"Failure","message":"not found","reason":"NotFound","code":404}"#;
                    Ok(Response::builder()
                        .status(404)
                        .header("content-type", "application/json")
                        .body(Body::from(body.as_bytes().to_vec()))
                        .unwrap())
                }
            }
        })
    }
}

/// Create a mock namespace JSON response
pub fn namespace_json(name: &str) -> String {
    serde_json::json!({
        "apiVersion": "v1",
        "kind": "Namespace",
        "metadata": {
            "name": name,
            "uid": "test-uid"
        }
    })
    .to_string()
}

/// Create a 404 not found response
pub fn not_found_json(resource: &str, name: &str) -> String {
    serde_json::json!({
        "kind": "Status",
        "apiVersion": "v1",
        "status": "Failure",
        "message": format!("{} \"{}\" not found", resource, name),
        "reason": "NotFound",
        "code": 404
    })
    .to_string()
}

/// A backend failure that is not "not found"
pub fn server_error() -> ArlonError {
    ArlonError::KubeError(kube::Error::Api(ErrorResponse {
        status: "Failure".to_string(),
        message: "etcd unavailable".to_string(),
        reason: "InternalError".to_string(),
        code: 500,
    }))
}

fn now() -> Time {
    Time(k8s_openapi::chrono::Utc::now())
}

fn matches_selector(labels: &BTreeMap<String, String>, selector: &str) -> bool {
    selector
        .split(',')
        .filter(|term| !term.is_empty())
        .all(|term| match term.split_once('=') {
            Some((k, v)) => labels.get(k).is_some_and(|actual| actual == v),
            None => labels.contains_key(term),
        })
}

#[derive(Default)]
struct DeploymentState {
    applications: BTreeMap<String, Application>,
    application_sets: BTreeMap<String, ApplicationSet>,
    clusters: BTreeMap<String, RegisteredCluster>,
    writes: Vec<String>,
    calls: Vec<String>,
    fail_gets: bool,
}

/// In-memory deployment backend. Cascading deletes leave the app marked
/// for deletion until `finish_deletions` runs, like a real foreground delete.
#[derive(Default)]
pub struct FakeDeploymentApi {
    state: Mutex<DeploymentState>,
}

impl FakeDeploymentApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_application(&self, app: Application) {
        let mut state = self.state.lock().unwrap();
        state.applications.insert(app.name_any(), app);
    }

    pub fn insert_application_set(&self, set: ApplicationSet) {
        let mut state = self.state.lock().unwrap();
        state.application_sets.insert(set.name_any(), set);
    }

    pub fn insert_cluster(&self, cluster: RegisteredCluster) {
        let mut state = self.state.lock().unwrap();
        state.clusters.insert(cluster.name.clone(), cluster);
    }

    pub fn application(&self, name: &str) -> Option<Application> {
        self.state.lock().unwrap().applications.get(name).cloned()
    }

    pub fn application_set(&self, name: &str) -> Option<ApplicationSet> {
        self.state.lock().unwrap().application_sets.get(name).cloned()
    }

    pub fn cluster(&self, name: &str) -> Option<RegisteredCluster> {
        self.state.lock().unwrap().clusters.get(name).cloned()
    }

    /// Every write so far, as "<verb> <name>"
    pub fn writes(&self) -> Vec<String> {
        self.state.lock().unwrap().writes.clone()
    }

    pub fn write_count(&self) -> usize {
        self.state.lock().unwrap().writes.len()
    }

    /// List and application set calls in arrival order
    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    /// Log a call, then hand control back to the runtime so concurrent
    /// callers get a chance to interleave
    async fn record_call(&self, call: String) {
        self.state.lock().unwrap().calls.push(call);
        tokio::task::yield_now().await;
    }

    pub fn fail_gets(&self, fail: bool) {
        self.state.lock().unwrap().fail_gets = fail;
    }

    /// Complete every pending cascading delete
    pub fn finish_deletions(&self) {
        let mut state = self.state.lock().unwrap();
        state
            .applications
            .retain(|_, app| app.metadata.deletion_timestamp.is_none());
    }
}

#[async_trait]
impl DeploymentApi for FakeDeploymentApi {
    async fn get_application(&self, name: &str) -> Result<Option<Application>> {
        let state = self.state.lock().unwrap();
        if state.fail_gets {
            return Err(server_error());
        }
        Ok(state.applications.get(name).cloned())
    }

    async fn list_applications(&self, selector: &str) -> Result<Vec<Application>> {
        self.record_call("list-apps".to_string()).await;
        let state = self.state.lock().unwrap();
        Ok(state
            .applications
            .values()
            .filter(|a| matches_selector(a.labels(), selector))
            .cloned()
            .collect())
    }

    async fn create_application(&self, app: &Application) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let name = app.name_any();
        if state.applications.contains_key(&name) {
            return Err(ArlonError::InvalidConfig(format!("{} already exists", name)));
        }
        state.writes.push(format!("create {}", name));
        state.applications.insert(name, app.clone());
        Ok(())
    }

    async fn update_application(&self, app: &Application) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let name = app.name_any();
        if !state.applications.contains_key(&name) {
            return Err(ArlonError::not_found("application", name));
        }
        state.writes.push(format!("update {}", name));
        state.applications.insert(name, app.clone());
        Ok(())
    }

    async fn delete_application(&self, name: &str, cascade: bool) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if !state.applications.contains_key(name) {
            return Err(ArlonError::not_found("application", name));
        }
        state.writes.push(format!("delete {}", name));
        if cascade {
            if let Some(app) = state.applications.get_mut(name) {
                app.metadata.deletion_timestamp = Some(now());
                app.metadata
                    .finalizers
                    .get_or_insert_with(Vec::new)
                    .push(finalizers::ARGOCD_RESOURCES.to_string());
            }
        } else {
            state.applications.remove(name);
        }
        Ok(())
    }

    async fn list_application_sets(&self, selector: &str) -> Result<Vec<ApplicationSet>> {
        self.record_call("list-sets".to_string()).await;
        let state = self.state.lock().unwrap();
        Ok(state
            .application_sets
            .values()
            .filter(|s| matches_selector(s.labels(), selector))
            .cloned()
            .collect())
    }

    async fn update_application_set(&self, set: &ApplicationSet) -> Result<()> {
        let name = set.name_any();
        self.record_call(format!("update-set {}", name)).await;
        let mut state = self.state.lock().unwrap();
        state.writes.push(format!("update-set {}", name));
        state.application_sets.insert(name, set.clone());
        Ok(())
    }

    async fn list_clusters(&self) -> Result<Vec<RegisteredCluster>> {
        self.record_call("list-clusters".to_string()).await;
        Ok(self.state.lock().unwrap().clusters.values().cloned().collect())
    }

    async fn get_cluster(&self, name: &str) -> Result<Option<RegisteredCluster>> {
        Ok(self.state.lock().unwrap().clusters.get(name).cloned())
    }

    async fn update_cluster(&self, cluster: &RegisteredCluster) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if !state.clusters.contains_key(&cluster.name) {
            return Err(ArlonError::not_found("cluster", &cluster.name));
        }
        state.writes.push(format!("update-cluster {}", cluster.name));
        state.clusters.insert(cluster.name.clone(), cluster.clone());
        Ok(())
    }
}

#[derive(Default)]
struct StoreState {
    clusters: BTreeMap<String, Cluster>,
    app_profiles: BTreeMap<String, AppProfile>,
    profiles: BTreeMap<String, Profile>,
    clusterspecs: BTreeMap<String, ConfigMap>,
    credentials: Vec<(String, RepoCredentials)>,
    writes: Vec<String>,
}

/// In-memory resource store with finalizer and deletion timestamp semantics
#[derive(Default)]
pub struct FakeResourceStore {
    state: Mutex<StoreState>,
}

impl FakeResourceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_cluster(&self, cluster: Cluster) {
        let mut state = self.state.lock().unwrap();
        state.clusters.insert(cluster.name_any(), cluster);
    }

    pub fn insert_app_profile(&self, profile: AppProfile) {
        let mut state = self.state.lock().unwrap();
        state.app_profiles.insert(profile.name_any(), profile);
    }

    pub fn insert_profile(&self, profile: Profile) {
        let mut state = self.state.lock().unwrap();
        state.profiles.insert(profile.name_any(), profile);
    }

    pub fn insert_clusterspec(&self, cm: ConfigMap) {
        let mut state = self.state.lock().unwrap();
        state.clusterspecs.insert(cm.name_any(), cm);
    }

    pub fn insert_credentials(&self, url: &str, credentials: RepoCredentials) {
        let mut state = self.state.lock().unwrap();
        state.credentials.push((normalize_repo_url(url), credentials));
    }

    pub fn cluster(&self, name: &str) -> Option<Cluster> {
        self.state.lock().unwrap().clusters.get(name).cloned()
    }

    pub fn app_profile(&self, name: &str) -> Option<AppProfile> {
        self.state.lock().unwrap().app_profiles.get(name).cloned()
    }

    pub fn writes(&self) -> Vec<String> {
        self.state.lock().unwrap().writes.clone()
    }

    pub fn write_count(&self) -> usize {
        self.state.lock().unwrap().writes.len()
    }

    /// Mark a cluster for deletion the way the API server does
    pub fn mark_cluster_deleted(&self, name: &str) {
        let mut state = self.state.lock().unwrap();
        if let Some(cluster) = state.clusters.get_mut(name) {
            cluster.metadata.deletion_timestamp = Some(now());
        }
    }

    fn cluster_mut<'a>(state: &'a mut StoreState, name: &str) -> Result<&'a mut Cluster> {
        state
            .clusters
            .get_mut(name)
            .ok_or_else(|| ArlonError::not_found("cluster", name))
    }
}

#[async_trait]
impl ResourceStore for FakeResourceStore {
    async fn get_cluster(&self, name: &str) -> Result<Option<Cluster>> {
        Ok(self.state.lock().unwrap().clusters.get(name).cloned())
    }

    async fn add_cluster_finalizer(&self, name: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let cluster = Self::cluster_mut(&mut state, name)?;
        let cluster_finalizers = cluster.metadata.finalizers.get_or_insert_with(Vec::new);
        if !cluster_finalizers.iter().any(|f| f == finalizers::CLUSTER) {
            cluster_finalizers.push(finalizers::CLUSTER.to_string());
        }
        state.writes.push(format!("add-finalizer {}", name));
        Ok(())
    }

    async fn remove_cluster_finalizer(&self, name: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let cluster = Self::cluster_mut(&mut state, name)?;
        if let Some(cluster_finalizers) = cluster.metadata.finalizers.as_mut() {
            cluster_finalizers.retain(|f| f != finalizers::CLUSTER);
        }
        let gone = cluster.metadata.deletion_timestamp.is_some() && cluster.finalizers().is_empty();
        if gone {
            state.clusters.remove(name);
        }
        state.writes.push(format!("remove-finalizer {}", name));
        Ok(())
    }

    async fn update_cluster_status(&self, name: &str, status: &ClusterStatus) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        Self::cluster_mut(&mut state, name)?.status = Some(status.clone());
        state.writes.push(format!("status {}", name));
        Ok(())
    }

    async fn set_cluster_profiles(&self, name: &str, profiles: Option<&str>) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let cluster = Self::cluster_mut(&mut state, name)?;
        let cluster_annotations = cluster.metadata.annotations.get_or_insert_with(BTreeMap::new);
        match profiles {
            Some(p) => {
                cluster_annotations.insert(crate::constants::annotations::PROFILES.to_string(), p.to_string())
            }
            None => cluster_annotations.remove(crate::constants::annotations::PROFILES),
        };
        state.writes.push(format!("profiles {}", name));
        Ok(())
    }

    async fn delete_cluster(&self, name: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let cluster = Self::cluster_mut(&mut state, name)?;
        if cluster.finalizers().is_empty() {
            state.clusters.remove(name);
        } else {
            cluster.metadata.deletion_timestamp = Some(now());
        }
        state.writes.push(format!("delete {}", name));
        Ok(())
    }

    async fn list_app_profiles(&self) -> Result<Vec<AppProfile>> {
        Ok(self.state.lock().unwrap().app_profiles.values().cloned().collect())
    }

    async fn update_app_profile_status(
        &self,
        name: &str,
        status: &AppProfileStatus,
    ) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let profile = state
            .app_profiles
            .get_mut(name)
            .ok_or_else(|| ArlonError::not_found("appprofile", name))?;
        profile.status = Some(status.clone());
        state.writes.push(format!("profile-status {}", name));
        Ok(())
    }

    async fn get_profile(&self, name: &str) -> Result<Option<Profile>> {
        Ok(self.state.lock().unwrap().profiles.get(name).cloned())
    }

    async fn get_clusterspec(&self, name: &str) -> Result<Option<ConfigMap>> {
        Ok(self.state.lock().unwrap().clusterspecs.get(name).cloned())
    }

    async fn get_repo_credentials(&self, repo_url: &str) -> Result<RepoCredentials> {
        let wanted = normalize_repo_url(repo_url);
        self.state
            .lock()
            .unwrap()
            .credentials
            .iter()
            .find(|(url, _)| *url == wanted)
            .map(|(_, creds)| creds.clone())
            .ok_or_else(|| {
                ArlonError::CredentialsError(format!("no repository registered for {}", repo_url))
            })
    }
}

type Files = BTreeMap<PathBuf, String>;

#[derive(Default)]
struct RepoState {
    repos: HashMap<String, Files>,
    clones: usize,
    commits: usize,
    pushes: usize,
    fail_pushes: bool,
}

/// Git remotes held in memory. Clones see the last pushed state.
#[derive(Clone, Default)]
pub struct InMemoryRepositories {
    state: Arc<Mutex<RepoState>>,
}

impl InMemoryRepositories {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed(&self, url: &str, files: &[(&str, &str)]) {
        let files = files
            .iter()
            .map(|(path, contents)| (PathBuf::from(path), contents.to_string()))
            .collect();
        self.state
            .lock()
            .unwrap()
            .repos
            .insert(normalize_repo_url(url), files);
    }

    pub fn file(&self, url: &str, path: &str) -> Option<String> {
        self.state
            .lock()
            .unwrap()
            .repos
            .get(&normalize_repo_url(url))?
            .get(Path::new(path))
            .cloned()
    }

    pub fn clone_count(&self) -> usize {
        self.state.lock().unwrap().clones
    }

    pub fn commit_count(&self) -> usize {
        self.state.lock().unwrap().commits
    }

    pub fn push_count(&self) -> usize {
        self.state.lock().unwrap().pushes
    }

    pub fn fail_pushes(&self, fail: bool) {
        self.state.lock().unwrap().fail_pushes = fail;
    }
}

impl RepositoryMutator for InMemoryRepositories {
    fn clone_repo(
        &self,
        url: &str,
        _revision: &str,
        _credentials: &RepoCredentials,
    ) -> Result<Box<dyn WorkingTree>> {
        let key = normalize_repo_url(url);
        let mut state = self.state.lock().unwrap();
        let files = state
            .repos
            .get(&key)
            .cloned()
            .ok_or_else(|| ArlonError::RepositoryError(format!("no repository at {}", url)))?;
        state.clones += 1;

        Ok(Box::new(InMemoryTree {
            key,
            committed: files.clone(),
            files,
            state: self.state.clone(),
        }))
    }
}

struct InMemoryTree {
    key: String,
    files: Files,
    committed: Files,
    state: Arc<Mutex<RepoState>>,
}

impl WorkingTree for InMemoryTree {
    fn list_files(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        let files: Vec<PathBuf> = self
            .files
            .keys()
            .filter(|p| p.starts_with(dir))
            .cloned()
            .collect();
        if files.is_empty() {
            return Err(ArlonError::RepositoryError(format!(
                "{} has no directory {}",
                self.key,
                dir.display()
            )));
        }
        Ok(files)
    }

    fn read_file(&self, path: &Path) -> Result<String> {
        self.files.get(path).cloned().ok_or_else(|| {
            ArlonError::IoError(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                path.display().to_string(),
            ))
        })
    }

    fn write_file(&mut self, path: &Path, contents: &str) -> Result<()> {
        self.files.insert(path.to_path_buf(), contents.to_string());
        Ok(())
    }

    fn remove_dir(&mut self, dir: &Path) -> Result<()> {
        self.files.retain(|p, _| !p.starts_with(dir));
        Ok(())
    }

    fn commit_if_changed(&mut self, _message: &str) -> Result<bool> {
        if self.files == self.committed {
            return Ok(false);
        }
        self.committed = self.files.clone();
        self.state.lock().unwrap().commits += 1;
        Ok(true)
    }

    fn push(&mut self) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.fail_pushes {
            return Err(ArlonError::RepositoryError(format!(
                "push to {} rejected",
                self.key
            )));
        }
        state.repos.insert(self.key.clone(), self.committed.clone());
        state.pushes += 1;
        Ok(())
    }
}
