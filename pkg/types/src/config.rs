use serde::{Deserialize, Serialize};

/// Git identity and push settings (YAML).
///
/// Example `config.yaml`:
/// ```yaml
/// git-user: kgio-bot
/// git-email: kgio-bot@example.com
/// git-token: glpat-xxxxxxxx
/// max-push-attempts: 3
/// shallow-clone: true
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GitIdentityConfigFile {
    #[serde(default, alias = "git-user")]
    pub git_user: Option<String>,
    #[serde(default, alias = "git-email")]
    pub git_email: Option<String>,
    #[serde(default, alias = "git-token")]
    pub git_token: Option<String>,
    #[serde(default, alias = "max-push-attempts")]
    pub max_push_attempts: Option<u32>,
    #[serde(default, alias = "shallow-clone")]
    pub shallow_clone: Option<bool>,
}

/// Load a YAML config file, returning the default if the file doesn't exist.
pub fn load_config_file<T: serde::de::DeserializeOwned + Default>(path: &str) -> anyhow::Result<T> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Ok(T::default());
        }
        Err(e) => return Err(e.into()),
    };
    let config: T = serde_yaml::from_str(&content)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_yields_default() {
        let cfg: GitIdentityConfigFile =
            load_config_file("/nonexistent/kgio/config.yaml").unwrap();
        assert!(cfg.git_user.is_none());
        assert!(cfg.max_push_attempts.is_none());
    }

    #[test]
    fn test_kebab_case_aliases() {
        let yaml = "git-user: bot\ngit-email: bot@example.com\nmax-push-attempts: 5\n";
        let cfg: GitIdentityConfigFile = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(cfg.git_user.as_deref(), Some("bot"));
        assert_eq!(cfg.git_email.as_deref(), Some("bot@example.com"));
        assert_eq!(cfg.max_push_attempts, Some(5));
        assert_eq!(cfg.shallow_clone, None);
    }
}
