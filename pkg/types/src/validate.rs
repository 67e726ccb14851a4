use anyhow::{Result, bail};
use pkg_constants::paths::INVALID_PATH_CHARS;

/// Validate an object name used as a single path segment.
/// Rules: non-empty, max 253 chars, no `/`, not `.` or `..`.
/// Case and other characters are left to the API server and the path checks.
pub fn validate_object_name(name: &str) -> Result<()> {
    if name.is_empty() {
        bail!("name must not be empty");
    }
    if name.len() > 253 {
        bail!("name '{}' exceeds 253 characters (got {})", name, name.len());
    }
    if name.contains('/') {
        bail!("name '{}' must not contain '/'", name);
    }
    if name == "." || name == ".." {
        bail!("name '{}' is not a valid path segment", name);
    }
    Ok(())
}

/// Whether `path` contains a character some filesystems cannot store.
pub fn contains_invalid_path_chars(path: &str) -> bool {
    path.chars().any(|c| INVALID_PATH_CHARS.contains(&c))
}
