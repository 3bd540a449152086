// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Repository mutation: clone, edit, commit-if-changed and push.

pub mod repository;

use crate::error::Result;
use std::path::{Path, PathBuf};

pub use repository::GitRepositoryMutator;

#[cfg(test)]
use mockall::automock;

/// Credentials for an https git remote
#[derive(Clone, Default, PartialEq)]
pub struct RepoCredentials {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for RepoCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RepoCredentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Clones repositories into working trees
#[cfg_attr(test, automock)]
pub trait RepositoryMutator: Send + Sync {
    fn clone_repo(
        &self,
        url: &str,
        revision: &str,
        credentials: &RepoCredentials,
    ) -> Result<Box<dyn WorkingTree>>;
}

/// A checked out repository. Paths are relative to the repository root.
pub trait WorkingTree: Send {
    /// Files below `dir`, recursively, relative to the repository root
    fn list_files(&self, dir: &Path) -> Result<Vec<PathBuf>>;

    fn read_file(&self, path: &Path) -> Result<String>;

    fn write_file(&mut self, path: &Path, contents: &str) -> Result<()>;

    /// Remove a directory and everything below it; absent directories are fine
    fn remove_dir(&mut self, dir: &Path) -> Result<()>;

    /// Commit all pending changes, returning false when there was nothing to commit
    fn commit_if_changed(&mut self, message: &str) -> Result<bool>;

    fn push(&mut self) -> Result<()>;
}

/// Canonical form of a repository URL for credential matching
pub fn normalize_repo_url(raw: &str) -> String {
    let trimmed = raw.trim().trim_end_matches('/');
    let trimmed = trimmed.strip_suffix(".git").unwrap_or(trimmed);
    match url::Url::parse(trimmed) {
        Ok(parsed) => parsed.as_str().trim_end_matches('/').to_string(),
        Err(_) => trimmed.to_string(),
    }
}

/// Path inside a repository, with leading `./` and `/` stripped
pub fn repo_path(path: &str) -> PathBuf {
    let cleaned = path.trim().trim_start_matches("./").trim_matches('/');
    PathBuf::from(cleaned)
}
