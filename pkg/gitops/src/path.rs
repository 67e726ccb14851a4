//! Destination path resolution inside the target repository.
//!
//! Resolution happens in two phases. [`resolve_repo_path`] picks and
//! validates the base path before any network I/O. [`materialize`] then
//! inspects the checked-out worktree to decide whether the base path is a
//! directory (the object lands in `<name>.yaml` inside it) or a file (used
//! verbatim), creating missing directories on the way.

use pkg_constants::paths::{YAML_EXTENSION, YAML_EXTENSIONS};
use pkg_types::identity::{GroupVersionResource, ResourceIdentity};
use pkg_types::interceptor::ResourcesInterceptorSpec;
use pkg_types::validate::contains_invalid_path_chars;
use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::error::PushError;

/// A cleaned, validated path relative to the repository root, using `/`
/// separators. The empty path is the repository root.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct RepoPath(String);

impl RepoPath {
    /// Lexically clean `raw` and reject anything unsafe to write.
    pub fn parse(raw: &str) -> Result<Self, PushError> {
        let cleaned = clean(raw);
        if contains_invalid_path_chars(&cleaned) {
            return Err(PushError::invalid_path(raw, "contains invalid characters"));
        }
        let mut segments = cleaned.split('/');
        if segments.clone().next() == Some("..") {
            return Err(PushError::invalid_path(raw, "escapes the repository root"));
        }
        if segments.any(|s| s == ".git") {
            return Err(PushError::invalid_path(raw, "points into the git directory"));
        }
        Ok(Self(cleaned))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether the last segment names a YAML file.
    pub fn is_yaml_file(&self) -> bool {
        YAML_EXTENSIONS.iter().any(|ext| self.0.ends_with(ext))
    }

    pub fn parent(&self) -> RepoPath {
        match self.0.rsplit_once('/') {
            Some((parent, _)) => RepoPath(parent.to_string()),
            None => RepoPath::default(),
        }
    }

    pub fn join(&self, name: &str) -> RepoPath {
        if self.is_root() {
            RepoPath(name.to_string())
        } else {
            RepoPath(format!("{}/{}", self.0, name))
        }
    }

    /// Absolute location of this path inside `workdir`.
    pub fn under(&self, workdir: &Path) -> PathBuf {
        self.0
            .split('/')
            .filter(|s| !s.is_empty())
            .fold(workdir.to_path_buf(), |acc, s| acc.join(s))
    }
}

impl fmt::Display for RepoPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lexical normalization: drops empty and `.` segments, folds `..` into its
/// parent, and makes the result relative. Leading `..` segments are kept so
/// that escapes can be detected.
fn clean(raw: &str) -> String {
    let mut stack: Vec<&str> = Vec::new();
    for segment in raw.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if stack.last().is_some_and(|s| *s != "..") {
                    stack.pop();
                } else {
                    stack.push("..");
                }
            }
            s => stack.push(s),
        }
    }
    stack.join("/")
}

/// `<group>/<version>/<resource>/<name>.yaml`, without a leading slash for
/// the core group.
pub fn default_repo_path(gvr: &GroupVersionResource, object_name: &str) -> String {
    let path = format!(
        "{}/{}/{}/{}{}",
        gvr.group, gvr.version, gvr.resource, object_name, YAML_EXTENSION
    );
    match path.strip_prefix('/') {
        Some(stripped) => stripped.to_string(),
        None => path,
    }
}

/// Pick the base path for `target`: the `repoPath` of the first matching
/// include rule, else the default layout. Fails on invalid paths.
pub fn resolve_repo_path(
    spec: &ResourcesInterceptorSpec,
    target: &ResourceIdentity,
    object_name: &str,
) -> Result<RepoPath, PushError> {
    match pkg_scope::repo_path_for(&spec.included_resources, target) {
        Some(template) => RepoPath::parse(template),
        None => RepoPath::parse(&default_repo_path(&target.gvr(), object_name)),
    }
}

/// Final file location of an object inside a worktree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    /// File the object is written to.
    pub file: RepoPath,
    /// The base path already existed as a directory in the worktree.
    pub existing_directory: bool,
}

/// Decide the file for `base` in `workdir` and create missing directories.
///
/// Every existing component of `base` must be a plain directory or file:
/// symlinks anywhere on the path are rejected. An existing file is only
/// reused when it is a YAML file.
pub fn materialize(workdir: &Path, base: &RepoPath, object_name: &str) -> Result<Target, PushError> {
    reject_symlinks(workdir, base)?;
    let full = base.under(workdir);
    match fs::metadata(&full) {
        Ok(meta) if meta.is_dir() => Ok(Target {
            file: object_file(base, object_name)?,
            existing_directory: true,
        }),
        Ok(_) if base.is_yaml_file() => Ok(Target {
            file: base.clone(),
            existing_directory: false,
        }),
        Ok(_) => Err(PushError::invalid_path(
            base.as_str(),
            "is an existing non-YAML file",
        )),
        Err(e) if e.kind() == ErrorKind::NotFound => {
            let (dir, file) = if base.is_yaml_file() {
                (base.parent(), base.clone())
            } else {
                (base.clone(), object_file(base, object_name)?)
            };
            create_dirs(workdir, &dir)?;
            Ok(Target {
                file,
                existing_directory: false,
            })
        }
        Err(source) => Err(PushError::CreateDir {
            path: base.to_string(),
            source,
        }),
    }
}

/// `<dir>/<name>.yaml`, checked like any other destination.
fn object_file(dir: &RepoPath, object_name: &str) -> Result<RepoPath, PushError> {
    let file = dir.join(&format!("{}{}", object_name, YAML_EXTENSION));
    if object_name.contains('/') || contains_invalid_path_chars(object_name) {
        return Err(PushError::invalid_path(file.as_str(), "contains invalid characters"));
    }
    Ok(file)
}

/// Walk `base` from the root and fail on the first symlink. Stops at the
/// first component that does not exist yet.
fn reject_symlinks(workdir: &Path, base: &RepoPath) -> Result<(), PushError> {
    let mut current = workdir.to_path_buf();
    for segment in base.as_str().split('/').filter(|s| !s.is_empty()) {
        current.push(segment);
        match fs::symlink_metadata(&current) {
            Ok(meta) if meta.file_type().is_symlink() => {
                return Err(PushError::invalid_path(base.as_str(), "crosses a symbolic link"));
            }
            Ok(_) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
            Err(source) => {
                return Err(PushError::CreateDir {
                    path: base.to_string(),
                    source,
                });
            }
        }
    }
    Ok(())
}

fn create_dirs(workdir: &Path, dir: &RepoPath) -> Result<(), PushError> {
    fs::create_dir_all(dir.under(workdir)).map_err(|source| PushError::CreateDir {
        path: dir.to_string(),
        source,
    })
}

/// Resolve and materialize in one call.
pub fn resolve_path(
    spec: &ResourcesInterceptorSpec,
    target: &ResourceIdentity,
    object_name: &str,
    workdir: &Path,
) -> Result<Target, PushError> {
    let base = resolve_repo_path(spec, target, object_name)?;
    materialize(workdir, &base, object_name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FailureClass;
    use pkg_types::scope::NamespaceScopedResourcesPath;

    fn pods() -> GroupVersionResource {
        GroupVersionResource::new("", "v1", "pods")
    }

    fn spec_with_template(resource: &str, template: &str) -> ResourcesInterceptorSpec {
        ResourcesInterceptorSpec {
            included_resources: vec![NamespaceScopedResourcesPath {
                api_groups: vec![String::new()],
                api_versions: vec!["v1".to_string()],
                resources: vec![resource.to_string()],
                names: vec![],
                repo_path: Some(template.to_string()),
            }],
            ..Default::default()
        }
    }

    #[test]
    fn test_default_path_core_group() {
        assert_eq!(default_repo_path(&pods(), "nginx"), "v1/pods/nginx.yaml");
        let deploy = GroupVersionResource::new("apps", "v1", "deployments");
        assert_eq!(default_repo_path(&deploy, "web"), "apps/v1/deployments/web.yaml");
    }

    #[test]
    fn test_clean() {
        assert_eq!(clean("/a//b/./c/"), "a/b/c");
        assert_eq!(clean("a/b/../c"), "a/c");
        assert_eq!(clean("../a"), "../a");
        assert_eq!(clean("a/../../b"), "../b");
        assert_eq!(clean("."), "");
    }

    #[test]
    fn test_parse_rejects_invalid_characters() {
        for raw in ["a:b/c.yaml", "a|b", "x*", "what?", "\"q\"", "<a>"] {
            let err = RepoPath::parse(raw).unwrap_err();
            assert_eq!(err.class(), FailureClass::Validation, "path {}", raw);
        }
    }

    #[test]
    fn test_parse_rejects_traversal() {
        assert!(RepoPath::parse("../outside").is_err());
        assert!(RepoPath::parse("a/../../outside").is_err());
        assert!(RepoPath::parse(".git/config").is_err());
        assert!(RepoPath::parse("a/.git/hooks").is_err());
        assert_eq!(RepoPath::parse("a/../b").unwrap().as_str(), "b");
        assert!(RepoPath::parse("/").unwrap().is_root());
    }

    #[test]
    fn test_resolve_uses_template_when_rule_matches() {
        let spec = spec_with_template("configmaps", "config//shared/./");
        let target = ResourceIdentity::named(&GroupVersionResource::new("", "v1", "configmaps"), "cfg");
        let path = resolve_repo_path(&spec, &target, "cfg").unwrap();
        assert_eq!(path.as_str(), "config/shared");

        let target = ResourceIdentity::named(&pods(), "nginx");
        let path = resolve_repo_path(&spec, &target, "nginx").unwrap();
        assert_eq!(path.as_str(), "v1/pods/nginx.yaml");
    }

    #[test]
    fn test_resolve_rejects_template_with_pipe() {
        let spec = spec_with_template("pods", "pods|all");
        let target = ResourceIdentity::named(&pods(), "nginx");
        let err = resolve_repo_path(&spec, &target, "nginx").unwrap_err();
        assert_eq!(err.class(), FailureClass::Validation);
    }

    #[test]
    fn test_materialize_existing_directory() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("apps/web")).unwrap();
        let base = RepoPath::parse("apps/web").unwrap();
        let target = materialize(dir.path(), &base, "frontend").unwrap();
        assert_eq!(target.file.as_str(), "apps/web/frontend.yaml");
        assert!(target.existing_directory);
    }

    #[test]
    fn test_materialize_new_directory() {
        let dir = tempfile::tempdir().unwrap();
        let base = RepoPath::parse("clusters/prod").unwrap();
        let target = materialize(dir.path(), &base, "cfg").unwrap();
        assert_eq!(target.file.as_str(), "clusters/prod/cfg.yaml");
        assert!(!target.existing_directory);
        assert!(dir.path().join("clusters/prod").is_dir());
    }

    #[test]
    fn test_materialize_yaml_file_target() {
        let dir = tempfile::tempdir().unwrap();
        let base = RepoPath::parse("config/all.yml").unwrap();
        let target = materialize(dir.path(), &base, "cfg").unwrap();
        assert_eq!(target.file.as_str(), "config/all.yml");
        assert!(dir.path().join("config").is_dir());
        assert!(!dir.path().join("config/all.yml").exists());
    }

    #[test]
    fn test_materialize_existing_file_is_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("shared.yaml"), "a: 1\n").unwrap();
        let base = RepoPath::parse("shared.yaml").unwrap();
        let target = materialize(dir.path(), &base, "cfg").unwrap();
        assert_eq!(target.file.as_str(), "shared.yaml");
        assert!(!target.existing_directory);
    }

    #[test]
    fn test_materialize_root() {
        let dir = tempfile::tempdir().unwrap();
        let target = materialize(dir.path(), &RepoPath::default(), "cfg").unwrap();
        assert_eq!(target.file.as_str(), "cfg.yaml");
        assert!(target.existing_directory);
    }

    #[test]
    fn test_materialize_rejects_existing_non_yaml_file() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("README.md"), "# docs\n").unwrap();
        let base = RepoPath::parse("README.md").unwrap();
        let err = materialize(dir.path(), &base, "cfg").unwrap_err();
        assert_eq!(err.class(), FailureClass::Validation);
        assert_eq!(fs::read_to_string(dir.path().join("README.md")).unwrap(), "# docs\n");
    }

    #[test]
    fn test_materialize_rejects_invalid_file_name() {
        let dir = tempfile::tempdir().unwrap();
        let base = RepoPath::parse("rbac").unwrap();
        let err = materialize(dir.path(), &base, "system:controller").unwrap_err();
        assert_eq!(err.class(), FailureClass::Validation);
        assert!(!dir.path().join("rbac").exists());
    }

    #[test]
    fn test_materialize_file_target_ignores_object_name() {
        let dir = tempfile::tempdir().unwrap();
        let base = RepoPath::parse("rbac/cluster-roles.yaml").unwrap();
        let target = materialize(dir.path(), &base, "system:controller").unwrap();
        assert_eq!(target.file.as_str(), "rbac/cluster-roles.yaml");
    }

    #[cfg(unix)]
    #[test]
    fn test_materialize_rejects_intermediate_symlink() {
        let dir = tempfile::tempdir().unwrap();
        let outside = tempfile::tempdir().unwrap();
        std::os::unix::fs::symlink(outside.path(), dir.path().join("escape")).unwrap();

        for raw in ["escape/sub", "escape/sub/all.yaml", "escape/existing"] {
            let base = RepoPath::parse(raw).unwrap();
            let err = materialize(dir.path(), &base, "cfg").unwrap_err();
            assert_eq!(err.class(), FailureClass::Validation, "path {}", raw);
        }
        assert!(!outside.path().join("sub").exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_materialize_rejects_symlink() {
        let dir = tempfile::tempdir().unwrap();
        let outside = tempfile::tempdir().unwrap();
        std::os::unix::fs::symlink(outside.path(), dir.path().join("escape")).unwrap();
        let base = RepoPath::parse("escape").unwrap();
        let err = materialize(dir.path(), &base, "cfg").unwrap_err();
        assert_eq!(err.class(), FailureClass::Validation);
    }
}
