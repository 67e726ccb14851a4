use chrono::Utc;
use pkg_constants::git::{DEFAULT_MAX_PUSH_ATTEMPTS, PUSH_RETRY_BACKOFF_MS};
use pkg_gitops::{GitPusher, PushError, PushRequest, RepoPath, resolve_repo_path};
use pkg_types::identity::ResourceIdentity;
use pkg_types::interceptor::{
    LastPushedObjectState, Operation, PushedObjectStatus, ResourcesInterceptorSpec,
};
use pkg_types::object::{AuthorizationVerdict, InterceptedObject};
use pkg_types::validate::validate_object_name;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::locks::BranchLocks;

#[derive(Debug, Clone)]
pub struct StorageSettings {
    /// Attempts per invocation when the remote branch moved under us.
    pub max_push_attempts: u32,
    pub retry_backoff: Duration,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            max_push_attempts: DEFAULT_MAX_PUSH_ATTEMPTS,
            retry_backoff: Duration::from_millis(PUSH_RETRY_BACKOFF_MS),
        }
    }
}

/// Content and destination of an in-scope object, ready to push.
#[derive(Debug, Clone)]
pub struct Prepared {
    pub identity: ResourceIdentity,
    pub path: RepoPath,
    /// Redacted object as YAML.
    pub content: String,
}

/// Decide scope, resolve the destination and redact the object.
///
/// Returns `Ok(None)` for out-of-scope objects. Invalid destinations fail
/// here, before any network I/O.
pub fn prepare(
    spec: &ResourcesInterceptorSpec,
    object: &InterceptedObject,
) -> Result<Option<Prepared>, PushError> {
    let identity = object.identity();
    if !pkg_scope::in_scope(&identity, &spec.include_rules(), &spec.exclude_rules()) {
        return Ok(None);
    }

    validate_object_name(&object.name)
        .map_err(|e| PushError::invalid_path(&object.name, e.to_string()))?;
    let path = resolve_repo_path(spec, &identity, &object.name)?;

    let mut body = object.body.clone();
    pkg_redact::redact_all(&mut body, &spec.excluded_fields);
    let content = serde_yaml::to_string(&body).map_err(|e| PushError::Encode(e.to_string()))?;

    Ok(Some(Prepared {
        identity,
        path,
        content,
    }))
}

/// Outcome of a push attempt, as handed to the status writer.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PushReport {
    pub path: String,
    pub commit_hash: Option<String>,
    pub status: PushedObjectStatus,
    /// Original error text, for diagnostics.
    pub error: Option<String>,
    pub attempts: u32,
    pub state: LastPushedObjectState,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "camelCase")]
pub enum StorageOutcome {
    /// The verdict does not call for a git write.
    NotPersisted { verdict: AuthorizationVerdict },
    /// The policy does not intercept this operation.
    OperationIgnored { operation: Operation },
    OutOfScope,
    Attempted(PushReport),
}

/// Scope check, redaction and serialized push of intercepted objects.
#[derive(Clone)]
pub struct StoragePipeline {
    pusher: Arc<GitPusher>,
    locks: BranchLocks,
    settings: StorageSettings,
}

impl StoragePipeline {
    pub fn new(pusher: GitPusher, settings: StorageSettings) -> Self {
        Self {
            pusher: Arc::new(pusher),
            locks: BranchLocks::new(),
            settings,
        }
    }

    /// Share branch locks with other pipelines in this process.
    pub fn with_locks(mut self, locks: BranchLocks) -> Self {
        self.locks = locks;
        self
    }

    /// Persist `object` to the policy's repository.
    ///
    /// Transport and authorization failures come back as an `Attempted`
    /// report carrying the matching status. Validation and local failures,
    /// where no push happened, are returned as errors.
    pub async fn store(
        &self,
        spec: &ResourcesInterceptorSpec,
        object: &InterceptedObject,
        verdict: AuthorizationVerdict,
        git_user_id: &str,
    ) -> Result<StorageOutcome, PushError> {
        if !verdict.should_persist() {
            debug!("{} not persisted: verdict {:?}", object.identity(), verdict);
            return Ok(StorageOutcome::NotPersisted { verdict });
        }
        if let Some(operation) = object.operation.filter(|op| !spec.intercepts(*op)) {
            debug!("{} not persisted: {} is not intercepted", object.identity(), operation);
            return Ok(StorageOutcome::OperationIgnored { operation });
        }

        let Some(prepared) = prepare(spec, object)? else {
            info!("{} is out of scope", object.identity());
            return Ok(StorageOutcome::OutOfScope);
        };

        let request = PushRequest {
            remote: spec.remote_repository.clone(),
            branch: spec.branch.clone(),
            path: prepared.path.clone(),
            resource: object.gvr.resource.clone(),
            object_name: object.name.clone(),
            content: prepared.content,
        };

        let _guard = self.locks.lock(&request.remote, &request.branch).await;
        let (result, attempts) = self.push_with_retry(&request).await;

        let mut state = LastPushedObjectState {
            last_pushed_object_time: Some(Utc::now()),
            last_pushed_git_user_id: git_user_id.to_string(),
            last_pushed_object_git_path: prepared.path.to_string(),
            last_pushed_object: object.scoped_object(),
            last_pushed_object_status: None,
        };

        match result {
            Ok(response) => {
                info!(
                    "Pushed {} to {}@{} at {} ({})",
                    prepared.identity, request.remote, request.branch, response.path, response.commit_hash
                );
                state.last_pushed_object_git_path = response.path.clone();
                state.last_pushed_object_status = Some(PushedObjectStatus::Pushed);
                Ok(StorageOutcome::Attempted(PushReport {
                    path: response.path,
                    commit_hash: Some(response.commit_hash),
                    status: PushedObjectStatus::Pushed,
                    error: None,
                    attempts,
                    state,
                }))
            }
            Err(e) => match e.class().status() {
                Some(status) => {
                    warn!(
                        "Push of {} failed at {} step ({:?}): {}",
                        prepared.identity,
                        e.step(),
                        e.class(),
                        e
                    );
                    state.last_pushed_object_status = Some(status);
                    Ok(StorageOutcome::Attempted(PushReport {
                        path: state.last_pushed_object_git_path.clone(),
                        commit_hash: None,
                        status,
                        error: Some(e.to_string()),
                        attempts,
                        state,
                    }))
                }
                None => {
                    warn!("Storing {} failed at {} step: {}", prepared.identity, e.step(), e);
                    Err(e)
                }
            },
        }
    }

    /// Run the transaction on a blocking worker, re-cloning after
    /// non-fast-forward rejections.
    async fn push_with_retry(
        &self,
        request: &PushRequest,
    ) -> (Result<pkg_gitops::PushResponse, PushError>, u32) {
        let max_attempts = self.settings.max_push_attempts.max(1);
        let mut attempts = 0;
        loop {
            attempts += 1;
            let pusher = Arc::clone(&self.pusher);
            let req = request.clone();
            let result = tokio::task::spawn_blocking(move || pusher.push(&req))
                .await
                .unwrap_or_else(|e| Err(PushError::Interrupted(e.to_string())));

            match result {
                Err(e) if e.is_retriable() && attempts < max_attempts => {
                    warn!(
                        "Push to {}@{} rejected, retrying ({}/{}): {}",
                        request.remote, request.branch, attempts, max_attempts, e
                    );
                    tokio::time::sleep(self.settings.retry_backoff).await;
                }
                other => return (other, attempts),
            }
        }
    }
}
