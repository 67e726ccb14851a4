use anyhow::{Result, bail};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::scope::{NamespaceScopedResources, NamespaceScopedResourcesPath, ScopeRule};
use crate::validate::contains_invalid_path_chars;

// --- Modes ---

/// How an intercepted change reaches the repository.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommitMode {
    #[default]
    Commit,
    MergeRequest,
}

/// Whether the change is only committed or also applied to the cluster.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommitProcess {
    #[default]
    CommitOnly,
    CommitApply,
}

/// What happens to requests from users that are not authorized.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DefaultUnauthorizedUserMode {
    #[default]
    Block,
    UseDefaultUserBind,
}

/// Admission operations a policy can intercept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Operation {
    Create,
    Update,
    Delete,
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Operation::Create => write!(f, "CREATE"),
            Operation::Update => write!(f, "UPDATE"),
            Operation::Delete => write!(f, "DELETE"),
        }
    }
}

// --- References ---

/// Reference to another object (e.g. a git user binding).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectReference {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubjectKind {
    User,
    Group,
    ServiceAccount,
}

/// RBAC subject, as carried by admission requests and bypass lists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subject {
    pub kind: SubjectKind,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_group: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

// --- Spec ---

/// Desired state of a `ResourcesInterceptor`.
///
/// Owned by the cluster operator; the storage pipeline only reads it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourcesInterceptorSpec {
    pub commit_mode: CommitMode,
    /// Between one and three operations.
    #[serde(default)]
    pub operations: Vec<Operation>,
    pub commit_process: CommitProcess,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_block_applied_message: Option<String>,
    pub remote_repository: String,
    /// Either `main` or `refs/heads/main`.
    pub branch: String,
    #[serde(default)]
    pub authorized_users: Vec<ObjectReference>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub bypass_interception_subjects: Vec<Subject>,
    pub default_unauthorized_user_mode: DefaultUnauthorizedUserMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_user_bind: Option<ObjectReference>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub included_resources: Vec<NamespaceScopedResourcesPath>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub excluded_resources: Vec<NamespaceScopedResources>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub excluded_fields: Vec<String>,
}

impl ResourcesInterceptorSpec {
    /// Whether this policy intercepts `op`.
    pub fn intercepts(&self, op: Operation) -> bool {
        self.operations.contains(&op)
    }

    pub fn include_rules(&self) -> Vec<ScopeRule> {
        self.included_resources
            .iter()
            .cloned()
            .map(ScopeRule::from)
            .collect()
    }

    pub fn exclude_rules(&self) -> Vec<ScopeRule> {
        self.excluded_resources
            .iter()
            .cloned()
            .map(ScopeRule::from)
            .collect()
    }

    /// Structural checks a CRD schema would enforce.
    pub fn validate(&self) -> Result<()> {
        if self.remote_repository.trim().is_empty() {
            bail!("remoteRepository must not be empty");
        }
        if self.branch.trim().is_empty() {
            bail!("branch must not be empty");
        }
        if self.operations.is_empty() || self.operations.len() > 3 {
            bail!(
                "operations must list between 1 and 3 entries (got {})",
                self.operations.len()
            );
        }
        if self.default_unauthorized_user_mode == DefaultUnauthorizedUserMode::UseDefaultUserBind
            && self.default_user_bind.is_none()
        {
            bail!("defaultUserBind is required when defaultUnauthorizedUserMode is UseDefaultUserBind");
        }
        let templates = self.included_resources.iter().filter_map(|r| r.repo_path());
        for path in templates {
            if contains_invalid_path_chars(path) {
                bail!("repoPath '{}' contains invalid characters", path);
            }
        }
        Ok(())
    }
}

// --- Status ---

/// The object an interceptor last acted on.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NamespaceScopedObject {
    #[serde(default, rename = "apiGroups")]
    pub api_group: String,
    #[serde(default, rename = "apiVersions")]
    pub api_version: String,
    #[serde(default, rename = "resources")]
    pub resource: String,
    #[serde(default)]
    pub name: String,
}

/// Outcome of a push, rendered as the message shown in the cluster status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PushedObjectStatus {
    #[serde(rename = "Resource correctly pushed")]
    Pushed,
    #[serde(rename = "Error: Push permission is not allowed on this git repository for this user")]
    PushNotAllowed,
    #[serde(rename = "Error: A network error occured")]
    NetworkError,
}

impl std::fmt::Display for PushedObjectStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PushedObjectStatus::Pushed => write!(f, "Resource correctly pushed"),
            PushedObjectStatus::PushNotAllowed => write!(
                f,
                "Error: Push permission is not allowed on this git repository for this user"
            ),
            PushedObjectStatus::NetworkError => write!(f, "Error: A network error occured"),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LastBypassedObjectState {
    #[serde(default, rename = "lastBypassObjectTime", skip_serializing_if = "Option::is_none")]
    pub last_bypassed_object_time: Option<DateTime<Utc>>,
    #[serde(default, rename = "lastBypassObjectSubject", skip_serializing_if = "Option::is_none")]
    pub last_bypassed_object_subject: Option<Subject>,
    #[serde(default, rename = "lastBypassObject")]
    pub last_bypassed_object: NamespaceScopedObject,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LastInterceptedObjectState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_intercepted_object_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_intercepted_object_kubernetes_user: Option<Subject>,
    #[serde(default)]
    pub last_intercepted_object: NamespaceScopedObject,
}

/// Last observed push outcome. Overwritten on every attempt, not a history.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LastPushedObjectState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_pushed_object_time: Option<DateTime<Utc>>,
    #[serde(default, rename = "lastPushedGitUserID")]
    pub last_pushed_git_user_id: String,
    #[serde(default)]
    pub last_pushed_object_git_path: String,
    #[serde(default)]
    pub last_pushed_object: NamespaceScopedObject,
    #[serde(default, rename = "lastPushedObjectState", skip_serializing_if = "Option::is_none")]
    pub last_pushed_object_status: Option<PushedObjectStatus>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourcesInterceptorStatus {
    #[serde(default)]
    pub last_bypassed_object_state: LastBypassedObjectState,
    #[serde(default)]
    pub last_intercepted_object_state: LastInterceptedObjectState,
    #[serde(default)]
    pub last_pushed_object_state: LastPushedObjectState,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ObjectMeta {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

/// A `ResourcesInterceptor` manifest as stored in the cluster.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourcesInterceptor {
    #[serde(default)]
    pub api_version: String,
    #[serde(default)]
    pub kind: String,
    pub metadata: ObjectMeta,
    pub spec: ResourcesInterceptorSpec,
    #[serde(default)]
    pub status: ResourcesInterceptorStatus,
}

impl ResourcesInterceptor {
    /// Parse a manifest from YAML (JSON is valid YAML).
    pub fn from_yaml(content: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(content)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MANIFEST: &str = r#"
apiVersion: kgio.dams.com/v1
kind: ResourcesInterceptor
metadata:
  name: intercept-apps
  namespace: default
spec:
  commitMode: Commit
  commitProcess: CommitOnly
  operations: [CREATE, UPDATE]
  remoteRepository: https://git.example.com/org/cluster.git
  branch: main
  authorizedUsers:
    - name: alice-binding
  defaultUnauthorizedUserMode: Block
  includedResources:
    - apiGroups: ["apps"]
      apiVersions: ["v1"]
      resources: ["deployments"]
      repoPath: apps/deployments
  excludedResources:
    - apiGroups: [""]
      apiVersions: ["v1"]
      resources: ["secrets"]
  excludedFields:
    - metadata.managedFields
"#;

    #[test]
    fn test_parse_manifest() {
        let ri = ResourcesInterceptor::from_yaml(MANIFEST).unwrap();
        assert_eq!(ri.metadata.name, "intercept-apps");
        assert_eq!(ri.spec.commit_mode, CommitMode::Commit);
        assert!(ri.spec.intercepts(Operation::Create));
        assert!(!ri.spec.intercepts(Operation::Delete));
        assert_eq!(ri.spec.include_rules().len(), 1);
        assert_eq!(ri.spec.exclude_rules().len(), 1);
        assert_eq!(ri.spec.excluded_fields, vec!["metadata.managedFields"]);
        assert!(ri.spec.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_specs() {
        let base = ResourcesInterceptor::from_yaml(MANIFEST).unwrap().spec;

        let mut spec = base.clone();
        spec.operations.clear();
        assert!(spec.validate().is_err());

        let mut spec = base.clone();
        spec.default_unauthorized_user_mode = DefaultUnauthorizedUserMode::UseDefaultUserBind;
        assert!(spec.validate().is_err());

        let mut spec = base.clone();
        spec.included_resources[0].repo_path = Some("apps|deployments".to_string());
        assert!(spec.validate().is_err());

        let mut spec = base;
        spec.branch = String::new();
        assert!(spec.validate().is_err());
    }

    #[test]
    fn test_pushed_status_wire_format() {
        let json = serde_json::to_string(&PushedObjectStatus::NetworkError).unwrap();
        assert_eq!(json, "\"Error: A network error occured\"");
        assert_eq!(
            PushedObjectStatus::Pushed.to_string(),
            "Resource correctly pushed"
        );
    }
}
