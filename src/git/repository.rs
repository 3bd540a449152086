// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! git2 backed working trees in temporary directories

use crate::error::{ArlonError, Result};
use crate::git::{RepoCredentials, RepositoryMutator, WorkingTree};
use git2::{
    build::RepoBuilder, Cred, FetchOptions, IndexAddOption, PushOptions, RemoteCallbacks,
    Repository, Signature,
};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, info, instrument};

const COMMIT_AUTHOR_NAME: &str = "arlon automation";
const COMMIT_AUTHOR_EMAIL: &str = "arlon@arlon.io";

#[derive(Debug, Default, Clone)]
pub struct GitRepositoryMutator;

impl GitRepositoryMutator {
    pub fn new() -> Self {
        Self
    }
}

fn remote_callbacks(credentials: &RepoCredentials) -> RemoteCallbacks<'_> {
    let mut callbacks = RemoteCallbacks::new();
    callbacks.credentials(move |_url, username_from_url, allowed_types| {
        if allowed_types.contains(git2::CredentialType::USER_PASS_PLAINTEXT)
            && !credentials.username.is_empty()
        {
            return Cred::userpass_plaintext(&credentials.username, &credentials.password);
        }
        Cred::default().or_else(|_| Cred::username(username_from_url.unwrap_or("git")))
    });
    callbacks
}

impl RepositoryMutator for GitRepositoryMutator {
    #[instrument(skip(self, credentials))]
    fn clone_repo(
        &self,
        url: &str,
        revision: &str,
        credentials: &RepoCredentials,
    ) -> Result<Box<dyn WorkingTree>> {
        let dir = tempfile::Builder::new().prefix("arlon-repo-").tempdir()?;

        let mut fetch_options = FetchOptions::new();
        fetch_options.remote_callbacks(remote_callbacks(credentials));

        let mut builder = RepoBuilder::new();
        builder.fetch_options(fetch_options);
        if !revision.is_empty() && revision != "HEAD" {
            builder.branch(revision);
        }

        let repo = builder.clone(url, dir.path()).map_err(|e| {
            ArlonError::RepositoryError(format!("failed to clone {}@{}: {}", url, revision, e))
        })?;

        let branch = {
            let head = repo.head()?;
            head.shorthand()
                .map(str::to_string)
                .ok_or_else(|| ArlonError::RepositoryError(format!("{} has a detached HEAD", url)))?
        };

        debug!("Cloned {} (branch {}) into {}", url, branch, dir.path().display());

        Ok(Box::new(GitWorkingTree {
            dir,
            repo,
            branch,
            url: url.to_string(),
            credentials: credentials.clone(),
        }))
    }
}

pub struct GitWorkingTree {
    dir: TempDir,
    repo: Repository,
    branch: String,
    url: String,
    credentials: RepoCredentials,
}

impl GitWorkingTree {
    fn abs(&self, path: &Path) -> PathBuf {
        self.dir.path().join(path)
    }
}

fn collect_files(root: &Path, dir: &Path, out: &mut Vec<PathBuf>) -> Result<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if entry.file_name() == ".git" {
            continue;
        }
        if entry.file_type()?.is_dir() {
            collect_files(root, &path, out)?;
        } else if let Ok(rel) = path.strip_prefix(root) {
            out.push(rel.to_path_buf());
        }
    }
    Ok(())
}

impl WorkingTree for GitWorkingTree {
    fn list_files(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        let abs = self.abs(dir);
        if !abs.is_dir() {
            return Err(ArlonError::RepositoryError(format!(
                "{} has no directory {}",
                self.url,
                dir.display()
            )));
        }
        let mut files = Vec::new();
        collect_files(self.dir.path(), &abs, &mut files)?;
        files.sort();
        Ok(files)
    }

    fn read_file(&self, path: &Path) -> Result<String> {
        Ok(fs::read_to_string(self.abs(path))?)
    }

    fn write_file(&mut self, path: &Path, contents: &str) -> Result<()> {
        let abs = self.abs(path);
        if let Some(parent) = abs.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(abs, contents)?;
        Ok(())
    }

    fn remove_dir(&mut self, dir: &Path) -> Result<()> {
        let abs = self.abs(dir);
        if abs.is_dir() {
            fs::remove_dir_all(abs)?;
        }
        Ok(())
    }

    fn commit_if_changed(&mut self, message: &str) -> Result<bool> {
        let mut index = self.repo.index()?;
        index.add_all(["*"].iter(), IndexAddOption::DEFAULT, None)?;
        index.update_all(["*"].iter(), None)?;
        index.write()?;
        let tree_id = index.write_tree()?;

        let parent = self.repo.head()?.peel_to_commit()?;
        if parent.tree_id() == tree_id {
            debug!("No changes to commit in {}", self.url);
            return Ok(false);
        }

        let tree = self.repo.find_tree(tree_id)?;
        let signature = Signature::now(COMMIT_AUTHOR_NAME, COMMIT_AUTHOR_EMAIL)?;
        self.repo
            .commit(Some("HEAD"), &signature, &signature, message, &tree, &[&parent])?;

        info!("Committed to {}: {}", self.url, message);
        Ok(true)
    }

    fn push(&mut self) -> Result<()> {
        let mut remote = self.repo.find_remote("origin")?;
        let mut push_options = PushOptions::new();
        push_options.remote_callbacks(remote_callbacks(&self.credentials));

        let refspec = format!("refs/heads/{0}:refs/heads/{0}", self.branch);
        remote
            .push(&[refspec.as_str()], Some(&mut push_options))
            .map_err(|e| {
                ArlonError::RepositoryError(format!("failed to push to {}: {}", self.url, e))
            })?;

        info!("Pushed branch {} to {}", self.branch, self.url);
        Ok(())
    }
}
