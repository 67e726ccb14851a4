use serde::{Deserialize, Serialize};
use std::fmt;

/// Kubernetes Group-Version-Resource triple. The core group is the empty string.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GroupVersionResource {
    #[serde(default)]
    pub group: String,
    pub version: String,
    pub resource: String,
}

impl GroupVersionResource {
    pub fn new(
        group: impl Into<String>,
        version: impl Into<String>,
        resource: impl Into<String>,
    ) -> Self {
        Self {
            group: group.into(),
            version: version.into(),
            resource: resource.into(),
        }
    }

    pub fn is_core(&self) -> bool {
        self.group.is_empty()
    }

    /// `v1` for the core group, `apps/v1` otherwise.
    pub fn api_version(&self) -> String {
        if self.is_core() {
            self.version.clone()
        } else {
            format!("{}/{}", self.group, self.version)
        }
    }
}

impl fmt::Display for GroupVersionResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.api_version(), self.resource)
    }
}

/// Kubernetes Group-Version-Kind triple.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GroupVersionKind {
    #[serde(default)]
    pub group: String,
    pub version: String,
    pub kind: String,
}

impl GroupVersionKind {
    pub fn new(
        group: impl Into<String>,
        version: impl Into<String>,
        kind: impl Into<String>,
    ) -> Self {
        Self {
            group: group.into(),
            version: version.into(),
            kind: kind.into(),
        }
    }
}

/// A flattened `(group, version, resource, name?)` tuple used as a set key.
///
/// `resource` holds a plural resource name for identities produced from
/// resource rules and a Kind for identities produced by kind resolution.
/// A missing `name` stands for every instance of the resource.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResourceIdentity {
    pub group: String,
    pub version: String,
    pub resource: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl ResourceIdentity {
    /// Identity covering every instance of `gvr`.
    pub fn all(gvr: &GroupVersionResource) -> Self {
        Self {
            group: gvr.group.clone(),
            version: gvr.version.clone(),
            resource: gvr.resource.clone(),
            name: None,
        }
    }

    /// Identity of the single object `name` of `gvr`.
    pub fn named(gvr: &GroupVersionResource, name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::all(gvr)
        }
    }

    pub fn gvr(&self) -> GroupVersionResource {
        GroupVersionResource::new(&self.group, &self.version, &self.resource)
    }

    /// Rule-side match: group, version and resource must be equal, and the
    /// name matches when this identity has none or both names are equal.
    pub fn matches(&self, target: &ResourceIdentity) -> bool {
        if self.group != target.group
            || self.version != target.version
            || self.resource != target.resource
        {
            return false;
        }
        match &self.name {
            None => true,
            Some(name) => target.name.as_deref() == Some(name.as_str()),
        }
    }
}

impl fmt::Display for ResourceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.gvr())?;
        match &self.name {
            Some(name) => write!(f, "/{}", name),
            None => write!(f, "/*"),
        }
    }
}
