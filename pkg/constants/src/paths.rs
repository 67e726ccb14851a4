//! Repository path constants.

/// Characters rejected in a destination path because at least one common
/// filesystem cannot represent them.
pub const INVALID_PATH_CHARS: &[char] = &[':', '*', '?', '"', '<', '>', '|'];

/// Extension appended to an object's name when the destination is a directory.
pub const YAML_EXTENSION: &str = ".yaml";

/// Extensions that mark a destination as an explicit file target.
pub const YAML_EXTENSIONS: &[&str] = &[".yaml", ".yml"];

/// Default config file path for the CLI.
pub const DEFAULT_CONFIG: &str = "/etc/kgio/config.yaml";
