use serde::{Deserialize, Serialize};

// --- Scope rules ---
//
// Policy-declared patterns selecting which resources a behavior applies to.
// Every list is crossed with the others; an empty `names` list selects
// every instance.

/// Resource-based rule without routing information (used for exclusions).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NamespaceScopedResources {
    #[serde(default)]
    pub api_groups: Vec<String>,
    #[serde(default)]
    pub api_versions: Vec<String>,
    #[serde(default)]
    pub resources: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub names: Vec<String>,
}

/// Resource-based rule that may route matched objects to `repo_path`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NamespaceScopedResourcesPath {
    #[serde(default)]
    pub api_groups: Vec<String>,
    #[serde(default)]
    pub api_versions: Vec<String>,
    #[serde(default)]
    pub resources: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub names: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repo_path: Option<String>,
}

impl NamespaceScopedResourcesPath {
    /// The template, if one is set and non-blank.
    pub fn repo_path(&self) -> Option<&str> {
        self.repo_path.as_deref().filter(|p| !p.trim().is_empty())
    }
}

impl From<&NamespaceScopedResourcesPath> for NamespaceScopedResources {
    fn from(rule: &NamespaceScopedResourcesPath) -> Self {
        Self {
            api_groups: rule.api_groups.clone(),
            api_versions: rule.api_versions.clone(),
            resources: rule.resources.clone(),
            names: rule.names.clone(),
        }
    }
}

/// Kind-based rule. Kinds are pluralized into resources before matching.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NamespaceScopedKinds {
    #[serde(default)]
    pub api_groups: Vec<String>,
    #[serde(default)]
    pub api_versions: Vec<String>,
    #[serde(default)]
    pub kinds: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub names: Vec<String>,
}

/// Any of the three rule shapes a policy can declare.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScopeRule {
    Kinds(NamespaceScopedKinds),
    ResourcesPath(NamespaceScopedResourcesPath),
    Resources(NamespaceScopedResources),
}

impl From<NamespaceScopedKinds> for ScopeRule {
    fn from(rule: NamespaceScopedKinds) -> Self {
        ScopeRule::Kinds(rule)
    }
}

impl From<NamespaceScopedResourcesPath> for ScopeRule {
    fn from(rule: NamespaceScopedResourcesPath) -> Self {
        ScopeRule::ResourcesPath(rule)
    }
}

impl From<NamespaceScopedResources> for ScopeRule {
    fn from(rule: NamespaceScopedResources) -> Self {
        ScopeRule::Resources(rule)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_camel_case() {
        let yaml = r#"
apiGroups: ["apps"]
apiVersions: ["v1"]
resources: ["deployments"]
repoPath: "clusters/prod/deployments"
"#;
        let rule: NamespaceScopedResourcesPath = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(rule.api_groups, vec!["apps"]);
        assert!(rule.names.is_empty());
        assert_eq!(rule.repo_path(), Some("clusters/prod/deployments"));
    }

    #[test]
    fn test_blank_repo_path_is_none() {
        let rule = NamespaceScopedResourcesPath {
            repo_path: Some("  ".to_string()),
            ..Default::default()
        };
        assert_eq!(rule.repo_path(), None);
    }

    #[test]
    fn test_path_rule_drops_routing() {
        let rule = NamespaceScopedResourcesPath {
            api_groups: vec![String::new()],
            api_versions: vec!["v1".to_string()],
            resources: vec!["configmaps".to_string()],
            names: vec!["settings".to_string()],
            repo_path: Some("config".to_string()),
        };
        let plain = NamespaceScopedResources::from(&rule);
        assert_eq!(plain.resources, vec!["configmaps"]);
        assert_eq!(plain.names, vec!["settings"]);
    }
}
