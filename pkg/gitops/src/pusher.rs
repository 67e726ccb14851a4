//! Single-shot git transaction: clone, write, commit, push.
//!
//! Every invocation clones into its own temporary directory, which is
//! removed when the [`Checkout`] is dropped, on success and on failure
//! alike. Nothing is shared between concurrent invocations except the
//! remote itself, so callers pushing to the same branch concurrently must
//! serialize or retry on [`PushError::is_retriable`].

use chrono::{DateTime, Utc};
use git2::build::RepoBuilder;
use git2::{
    Cred, CredentialType, ErrorClass, ErrorCode, FetchOptions, PushOptions, RemoteCallbacks,
    Repository, Signature, Time,
};
use pkg_constants::git::{
    BRANCH_REF_PREFIX, COMMIT_MESSAGE_PREFIX, MAX_CREDENTIAL_ATTEMPTS, ORIGIN_REMOTE,
    SHALLOW_CLONE_DEPTH, SHALLOW_SCHEMES,
};
use std::fmt;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

use crate::error::PushError;
use crate::path::{RepoPath, Target, materialize};

/// Basic-auth credentials for the remote.
#[derive(Clone, Default)]
pub struct GitCredentials {
    pub username: String,
    pub token: String,
}

impl fmt::Debug for GitCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GitCredentials")
            .field("username", &self.username)
            .field("token", &"***")
            .finish()
    }
}

/// Author of the commits.
#[derive(Debug, Clone, Default)]
pub struct GitIdentity {
    pub name: String,
    pub email: String,
}

/// Everything one push needs. Owned so it can move onto a blocking worker.
#[derive(Debug, Clone)]
pub struct PushRequest {
    pub remote: String,
    pub branch: String,
    /// Validated base path, see [`crate::path::resolve_repo_path`].
    pub path: RepoPath,
    pub resource: String,
    pub object_name: String,
    /// Serialized object, written byte for byte.
    pub content: String,
}

/// Result of a successful push.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushResponse {
    /// File the object was written to.
    pub path: String,
    pub commit_hash: String,
    /// The base path already existed as a directory.
    pub existing_directory: bool,
}

/// `main` for both `main` and `refs/heads/main`.
pub fn short_branch(branch: &str) -> &str {
    branch.strip_prefix(BRANCH_REF_PREFIX).unwrap_or(branch)
}

/// `Add or modify <resource> <name>`.
pub fn commit_message(resource: &str, object_name: &str) -> String {
    format!("{} {} {}", COMMIT_MESSAGE_PREFIX, resource, object_name)
}

fn is_network_remote(remote: &str) -> bool {
    let remote = remote.to_lowercase();
    SHALLOW_SCHEMES.iter().any(|scheme| remote.starts_with(scheme))
}

/// Callbacks answering credential requests with `credentials`, once.
fn auth_callbacks(credentials: &GitCredentials) -> RemoteCallbacks<'_> {
    let mut attempts = 0;
    let mut callbacks = RemoteCallbacks::new();
    callbacks.credentials(move |_url, username_from_url, allowed| {
        attempts += 1;
        if attempts > MAX_CREDENTIAL_ATTEMPTS {
            return Err(git2::Error::new(
                ErrorCode::Auth,
                ErrorClass::Http,
                "credentials rejected by remote",
            ));
        }
        if !allowed.contains(CredentialType::USER_PASS_PLAINTEXT) {
            return Err(git2::Error::new(
                ErrorCode::Auth,
                ErrorClass::Net,
                "remote requires an unsupported authentication method",
            ));
        }
        let username = if credentials.username.is_empty() {
            username_from_url.unwrap_or_default()
        } else {
            credentials.username.as_str()
        };
        Cred::userpass_plaintext(username, &credentials.token)
    });
    callbacks
}

/// Pushes serialized objects to a remote branch.
#[derive(Debug, Clone)]
pub struct GitPusher {
    identity: GitIdentity,
    credentials: GitCredentials,
    shallow: bool,
}

impl GitPusher {
    pub fn new(identity: GitIdentity, credentials: GitCredentials) -> Self {
        Self {
            identity,
            credentials,
            shallow: true,
        }
    }

    /// Clone network remotes with depth 1 (default `true`).
    pub fn with_shallow_clone(mut self, shallow: bool) -> Self {
        self.shallow = shallow;
        self
    }

    pub fn identity(&self) -> &GitIdentity {
        &self.identity
    }

    /// Run the whole transaction. Each step's failure ends it.
    pub fn push(&self, request: &PushRequest) -> Result<PushResponse, PushError> {
        let checkout = self.clone_branch(&request.remote, &request.branch)?;
        let target = checkout.write(&request.path, &request.object_name, &request.content)?;
        let message = commit_message(&request.resource, &request.object_name);
        let commit_hash = checkout.commit(&target.file, &message, &self.identity, Utc::now())?;
        checkout.push()?;
        Ok(PushResponse {
            path: target.file.to_string(),
            commit_hash,
            existing_directory: target.existing_directory,
        })
    }

    /// Single-branch clone of `branch` into a fresh temporary directory.
    pub fn clone_branch(&self, remote: &str, branch: &str) -> Result<Checkout, PushError> {
        let dir = tempfile::Builder::new()
            .prefix("kgio-")
            .tempdir()
            .map_err(|e| PushError::Worktree(e.to_string()))?;
        let branch = short_branch(branch).to_string();

        let mut fetch = FetchOptions::new();
        fetch.remote_callbacks(auth_callbacks(&self.credentials));
        if self.shallow && is_network_remote(remote) {
            fetch.depth(SHALLOW_CLONE_DEPTH);
        }

        let repo = RepoBuilder::new()
            .branch(&branch)
            .fetch_options(fetch)
            .clone(remote, dir.path())
            .map_err(PushError::Clone)?;

        Ok(Checkout {
            repo,
            branch,
            credentials: self.credentials.clone(),
            _dir: dir,
        })
    }
}

/// A throwaway clone with a checked-out worktree.
pub struct Checkout {
    repo: Repository,
    branch: String,
    credentials: GitCredentials,
    // Dropped last: removes the clone from disk.
    _dir: TempDir,
}

impl Checkout {
    pub fn workdir(&self) -> Result<&Path, PushError> {
        self.repo
            .workdir()
            .ok_or_else(|| PushError::Worktree("repository has no working directory".to_string()))
    }

    /// Write `content` at the file `base` resolves to, creating or truncating it.
    pub fn write(&self, base: &RepoPath, object_name: &str, content: &str) -> Result<Target, PushError> {
        let workdir = self.workdir()?;
        let target = materialize(workdir, base, object_name)?;
        fs::write(target.file.under(workdir), content).map_err(|source| PushError::Write {
            path: target.file.to_string(),
            source,
        })?;
        Ok(target)
    }

    /// Stage exactly `file` and commit it on top of the branch tip.
    pub fn commit(
        &self,
        file: &RepoPath,
        message: &str,
        author: &GitIdentity,
        when: DateTime<Utc>,
    ) -> Result<String, PushError> {
        let mut index = self.repo.index().map_err(PushError::Stage)?;
        index
            .add_path(Path::new(file.as_str()))
            .map_err(PushError::Stage)?;
        index.write().map_err(PushError::Stage)?;

        let tree_id = index.write_tree().map_err(PushError::Commit)?;
        let tree = self.repo.find_tree(tree_id).map_err(PushError::Commit)?;
        let parent = self
            .repo
            .head()
            .and_then(|head| head.peel_to_commit())
            .map_err(PushError::Commit)?;
        let signature = Signature::new(&author.name, &author.email, &Time::new(when.timestamp(), 0))
            .map_err(PushError::Commit)?;

        let oid = self
            .repo
            .commit(Some("HEAD"), &signature, &signature, message, &tree, &[&parent])
            .map_err(PushError::Commit)?;
        Ok(oid.to_string())
    }

    /// Push the branch to `origin` with the clone's credentials.
    pub fn push(&self) -> Result<(), PushError> {
        let mut remote = self.repo.find_remote(ORIGIN_REMOTE).map_err(PushError::Push)?;
        let reference = format!("{}{}", BRANCH_REF_PREFIX, self.branch);
        let refspec = format!("{0}:{0}", reference);

        let mut rejection: Option<(String, String)> = None;
        {
            let mut callbacks = auth_callbacks(&self.credentials);
            callbacks.push_update_reference(|name, status| {
                if let Some(message) = status {
                    rejection = Some((name.to_string(), message.to_string()));
                }
                Ok(())
            });
            let mut options = PushOptions::new();
            options.remote_callbacks(callbacks);
            remote
                .push(&[refspec.as_str()], Some(&mut options))
                .map_err(PushError::Push)?;
        }

        match rejection {
            Some((reference, message)) => Err(PushError::Rejected { reference, message }),
            None => Ok(()),
        }
    }
}
