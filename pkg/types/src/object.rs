use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::identity::{GroupVersionKind, GroupVersionResource, ResourceIdentity};
use crate::interceptor::{NamespaceScopedObject, Operation};

/// Admission-time payload handed to the storage pipeline.
///
/// Lives for one invocation only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterceptedObject {
    pub gvr: GroupVersionResource,
    pub kind: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation: Option<Operation>,
    /// Decoded object body.
    pub body: Value,
}

impl InterceptedObject {
    /// Build from a decoded manifest. `resource` is the plural resource name
    /// the admission request carried for this object's kind.
    pub fn from_manifest(body: Value, resource: &str) -> Result<Self> {
        let api_version = body
            .get("apiVersion")
            .and_then(Value::as_str)
            .context("object has no apiVersion")?;
        let kind = body
            .get("kind")
            .and_then(Value::as_str)
            .context("object has no kind")?
            .to_string();
        let metadata = body.get("metadata").context("object has no metadata")?;
        let name = metadata
            .get("name")
            .and_then(Value::as_str)
            .context("object has no metadata.name")?
            .to_string();
        let namespace = metadata
            .get("namespace")
            .and_then(Value::as_str)
            .map(str::to_string);

        let (group, version) = split_api_version(api_version);
        Ok(Self {
            gvr: GroupVersionResource::new(group, version, resource),
            kind,
            name,
            namespace,
            operation: None,
            body,
        })
    }

    pub fn with_operation(mut self, op: Operation) -> Self {
        self.operation = Some(op);
        self
    }

    pub fn gvk(&self) -> GroupVersionKind {
        GroupVersionKind::new(&self.gvr.group, &self.gvr.version, &self.kind)
    }

    /// Named identity of this object, for scope matching.
    pub fn identity(&self) -> ResourceIdentity {
        ResourceIdentity::named(&self.gvr, &self.name)
    }

    /// Status-block view of this object.
    pub fn scoped_object(&self) -> NamespaceScopedObject {
        NamespaceScopedObject {
            api_group: self.gvr.group.clone(),
            api_version: self.gvr.version.clone(),
            resource: self.gvr.resource.clone(),
            name: self.name.clone(),
        }
    }
}

/// Split `apps/v1` into `("apps", "v1")` and `v1` into `("", "v1")`.
pub fn split_api_version(api_version: &str) -> (&str, &str) {
    match api_version.split_once('/') {
        Some((group, version)) => (group, version),
        None => ("", api_version),
    }
}

/// Authorization decision computed upstream of the storage pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuthorizationVerdict {
    /// Subject bypasses interception; the request is applied as-is.
    Bypass,
    /// Subject is an authorized user; the change is persisted as them.
    Authorized,
    /// Unauthorized subject mapped to the policy's default identity.
    FallbackToDefault,
    /// Unauthorized subject and the policy blocks.
    Blocked,
}

impl AuthorizationVerdict {
    /// Whether the change should be persisted to git.
    pub fn should_persist(self) -> bool {
        matches!(
            self,
            AuthorizationVerdict::Authorized | AuthorizationVerdict::FallbackToDefault
        )
    }
}
