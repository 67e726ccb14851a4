//! Scope resolution: turns policy rules into a deduplicated set of
//! resource identities and decides whether an intercepted object is in scope.
//!
//! Malformed rules (an empty group, version or resource list) resolve to an
//! empty cross-product and therefore match nothing. Nothing here errors.

pub mod pluralize;

use pkg_types::identity::ResourceIdentity;
use pkg_types::scope::{
    NamespaceScopedKinds, NamespaceScopedResources, NamespaceScopedResourcesPath, ScopeRule,
};
use std::collections::HashSet;

pub use pluralize::{kind_to_resource, pluralize};

/// Translate a kind-based rule into a resource-based one.
pub fn kinds_to_resources(rule: &NamespaceScopedKinds) -> NamespaceScopedResources {
    NamespaceScopedResources {
        api_groups: rule.api_groups.clone(),
        api_versions: rule.api_versions.clone(),
        resources: rule.kinds.iter().map(|k| kind_to_resource(k)).collect(),
        names: rule.names.clone(),
    }
}

/// Normalize any rule shape into the common resource-based shape.
pub fn normalize(rule: &ScopeRule) -> NamespaceScopedResources {
    match rule {
        ScopeRule::Kinds(rule) => kinds_to_resources(rule),
        ScopeRule::ResourcesPath(rule) => NamespaceScopedResources::from(rule),
        ScopeRule::Resources(rule) => rule.clone(),
    }
}

/// Resolve rules into the set of identities they select.
///
/// Each rule yields group x version x resource, crossed with its names when
/// it declares any. Iteration order of the returned set is unspecified.
pub fn resolve_identities(rules: &[ScopeRule]) -> HashSet<ResourceIdentity> {
    let mut set = HashSet::new();
    for rule in rules {
        let rule = normalize(rule);
        cross_into(
            &rule.api_groups,
            &rule.api_versions,
            &rule.resources,
            &rule.names,
            &mut set,
        );
    }
    set
}

/// Resolve kind-based rules without pluralization. The `resource` field of
/// each returned identity holds the Kind.
pub fn resolve_kind_identities(rules: &[NamespaceScopedKinds]) -> HashSet<ResourceIdentity> {
    let mut set = HashSet::new();
    for rule in rules {
        cross_into(
            &rule.api_groups,
            &rule.api_versions,
            &rule.kinds,
            &rule.names,
            &mut set,
        );
    }
    set
}

fn cross_into(
    groups: &[String],
    versions: &[String],
    resources: &[String],
    names: &[String],
    set: &mut HashSet<ResourceIdentity>,
) {
    for group in groups {
        for version in versions {
            for resource in resources {
                let base = ResourceIdentity {
                    group: group.clone(),
                    version: version.clone(),
                    resource: resource.clone(),
                    name: None,
                };
                if names.is_empty() {
                    set.insert(base);
                    continue;
                }
                for name in names {
                    set.insert(ResourceIdentity {
                        name: Some(name.clone()),
                        ..base.clone()
                    });
                }
            }
        }
    }
}

/// Whether `target` matches any identity selected by `rules`.
pub fn matches_any(target: &ResourceIdentity, rules: &[ScopeRule]) -> bool {
    resolve_identities(rules)
        .iter()
        .any(|identity| identity.matches(target))
}

/// An object is in scope when it matches an include rule (an empty include
/// list includes everything) and matches no exclude rule.
pub fn in_scope(target: &ResourceIdentity, includes: &[ScopeRule], excludes: &[ScopeRule]) -> bool {
    let included = includes.is_empty() || matches_any(target, includes);
    included && !matches_any(target, excludes)
}

/// The `repoPath` template of the first include rule that matches `target`.
pub fn repo_path_for<'a>(
    includes: &'a [NamespaceScopedResourcesPath],
    target: &ResourceIdentity,
) -> Option<&'a str> {
    includes.iter().find_map(|rule| {
        let path = rule.repo_path()?;
        let routed = [ScopeRule::Resources(NamespaceScopedResources::from(rule))];
        matches_any(target, &routed).then_some(path)
    })
}

/// Identities in a stable order, for callers that need determinism.
pub fn sorted(set: HashSet<ResourceIdentity>) -> Vec<ResourceIdentity> {
    let mut list: Vec<_> = set.into_iter().collect();
    list.sort();
    list
}
