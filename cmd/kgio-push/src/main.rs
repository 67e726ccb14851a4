use anyhow::{Context, bail};
use clap::{Parser, Subcommand, ValueEnum};
use pkg_constants::git::DEFAULT_MAX_PUSH_ATTEMPTS;
use pkg_constants::paths::DEFAULT_CONFIG;
use pkg_controllers::{StorageOutcome, StoragePipeline, StorageSettings};
use pkg_gitops::{GitCredentials, GitIdentity, GitPusher};
use pkg_types::config::{GitIdentityConfigFile, load_config_file};
use pkg_types::interceptor::{Operation, PushedObjectStatus, ResourcesInterceptor};
use pkg_types::object::{AuthorizationVerdict, InterceptedObject};
use serde_json::json;
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "kgio-push", about = "Store Kubernetes objects in a git repository")]
struct Cli {
    /// Path to YAML config file
    #[arg(long, short, default_value = DEFAULT_CONFIG)]
    config: String,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show where an object would be stored, and what, without pushing
    Check {
        #[command(flatten)]
        input: InputArgs,
    },
    /// Push an object to the policy's repository
    Push {
        #[command(flatten)]
        input: InputArgs,

        /// Authorization decision for the request
        #[arg(long, value_enum, default_value_t = VerdictArg::Authorized)]
        verdict: VerdictArg,

        /// User recorded in the last-pushed state
        #[arg(long, default_value = "")]
        git_user_id: String,

        /// Commit author name
        #[arg(long)]
        git_user: Option<String>,

        /// Commit author email
        #[arg(long)]
        git_email: Option<String>,

        /// Token used as the basic-auth password
        #[arg(long)]
        git_token: Option<String>,

        /// Attempts when the branch moved during a push
        #[arg(long)]
        max_push_attempts: Option<u32>,

        /// Clone the full history instead of depth 1
        #[arg(long)]
        full_clone: bool,
    },
}

#[derive(clap::Args, Debug)]
struct InputArgs {
    /// ResourcesInterceptor manifest (YAML or JSON)
    #[arg(long)]
    policy: String,

    /// Object manifest (YAML or JSON)
    #[arg(long)]
    object: String,

    /// Resource name of the object; derived from its kind when omitted
    #[arg(long)]
    resource: Option<String>,

    /// Admission operation
    #[arg(long, value_enum, default_value_t = OperationArg::Create)]
    operation: OperationArg,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum OperationArg {
    Create,
    Update,
    Delete,
}

impl From<OperationArg> for Operation {
    fn from(op: OperationArg) -> Self {
        match op {
            OperationArg::Create => Operation::Create,
            OperationArg::Update => Operation::Update,
            OperationArg::Delete => Operation::Delete,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum VerdictArg {
    Bypass,
    Authorized,
    Fallback,
    Blocked,
}

impl From<VerdictArg> for AuthorizationVerdict {
    fn from(v: VerdictArg) -> Self {
        match v {
            VerdictArg::Bypass => AuthorizationVerdict::Bypass,
            VerdictArg::Authorized => AuthorizationVerdict::Authorized,
            VerdictArg::Fallback => AuthorizationVerdict::FallbackToDefault,
            VerdictArg::Blocked => AuthorizationVerdict::Blocked,
        }
    }
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init(),
        LogFormat::Text => registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init(),
    }
}

/// CLI value, then the environment, then the config file.
fn merge(cli: Option<String>, env_key: &str, file: Option<String>) -> Option<String> {
    cli.or_else(|| std::env::var(env_key).ok().filter(|v| !v.is_empty()))
        .or(file)
}

fn mask_token(token: &str) -> String {
    let prefix: String = token.chars().take(4).collect();
    format!("{}***", prefix)
}

fn load_policy(path: &str) -> anyhow::Result<ResourcesInterceptor> {
    let content =
        std::fs::read_to_string(path).with_context(|| format!("reading policy {}", path))?;
    let policy = ResourcesInterceptor::from_yaml(&content)
        .with_context(|| format!("parsing policy {}", path))?;
    policy.spec.validate()?;
    Ok(policy)
}

fn load_object(input: &InputArgs) -> anyhow::Result<InterceptedObject> {
    let content = std::fs::read_to_string(&input.object)
        .with_context(|| format!("reading object {}", input.object))?;
    let body: serde_json::Value = serde_yaml::from_str(&content)
        .with_context(|| format!("parsing object {}", input.object))?;
    let resource = match &input.resource {
        Some(r) => r.clone(),
        None => match body.get("kind").and_then(|k| k.as_str()) {
            Some(kind) => pkg_scope::kind_to_resource(kind),
            None => bail!("object {} has no kind; pass --resource", input.object),
        },
    };
    let object = InterceptedObject::from_manifest(body, &resource)?;
    Ok(object.with_operation(input.operation.into()))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_format);

    match cli.command {
        Commands::Check { input } => {
            let policy = load_policy(&input.policy)?;
            let object = load_object(&input)?;
            let prepared = pkg_controllers::prepare(&policy.spec, &object)?;
            let report = match prepared {
                Some(p) => json!({
                    "inScope": true,
                    "identity": p.identity.to_string(),
                    "path": p.path.to_string(),
                    "content": p.content,
                }),
                None => json!({
                    "inScope": false,
                    "identity": object.identity().to_string(),
                }),
            };
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Commands::Push {
            input,
            verdict,
            git_user_id,
            git_user,
            git_email,
            git_token,
            max_push_attempts,
            full_clone,
        } => {
            let file_cfg: GitIdentityConfigFile = load_config_file(&cli.config)?;
            info!("Config file: {}", cli.config);

            // Merge: CLI args > environment > config file > defaults
            let user = merge(git_user, "KGIO_GIT_USER", file_cfg.git_user)
                .unwrap_or_else(|| "kgio-bot".to_string());
            let email = merge(git_email, "KGIO_GIT_EMAIL", file_cfg.git_email)
                .unwrap_or_else(|| "kgio-bot@localhost".to_string());
            let token = merge(git_token, "KGIO_GIT_TOKEN", file_cfg.git_token).unwrap_or_default();
            let max_push_attempts = max_push_attempts
                .or(file_cfg.max_push_attempts)
                .unwrap_or(DEFAULT_MAX_PUSH_ATTEMPTS);
            let shallow = !full_clone && file_cfg.shallow_clone.unwrap_or(true);

            let policy = load_policy(&input.policy)?;
            let object = load_object(&input)?;

            info!("Storing {} for policy {}", object.identity(), policy.metadata.name);
            info!("  Remote:    {}", policy.spec.remote_repository);
            info!("  Branch:    {}", policy.spec.branch);
            info!("  Author:    {} <{}>", user, email);
            info!("  Token:     {}", mask_token(&token));
            info!("  Attempts:  {}", max_push_attempts);

            let pusher = GitPusher::new(
                GitIdentity { name: user.clone(), email },
                GitCredentials { username: user, token },
            )
            .with_shallow_clone(shallow);
            let pipeline = StoragePipeline::new(
                pusher,
                StorageSettings {
                    max_push_attempts,
                    ..Default::default()
                },
            );

            let outcome = pipeline
                .store(&policy.spec, &object, verdict.into(), &git_user_id)
                .await?;
            println!("{}", serde_json::to_string_pretty(&outcome)?);

            if let StorageOutcome::Attempted(report) = &outcome {
                if report.status != PushedObjectStatus::Pushed {
                    std::process::exit(2);
                }
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_merge_prefers_cli_then_file() {
        let key = "KGIO_TEST_UNSET_VARIABLE";
        assert_eq!(
            merge(Some("cli".into()), key, Some("file".into())).as_deref(),
            Some("cli")
        );
        assert_eq!(merge(None, key, Some("file".into())).as_deref(), Some("file"));
        assert_eq!(merge(None, key, None), None);
    }

    #[test]
    fn test_mask_token() {
        assert_eq!(mask_token("glpat-abcdef"), "glpa***");
        assert_eq!(mask_token("ab"), "ab***");
        assert_eq!(mask_token(""), "***");
    }

    #[test]
    fn test_load_object_derives_resource_from_kind() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "apiVersion: networking.k8s.io/v1\nkind: NetworkPolicy\nmetadata:\n  name: deny-all\n  namespace: prod"
        )
        .unwrap();
        let input = InputArgs {
            policy: String::new(),
            object: file.path().to_string_lossy().into_owned(),
            resource: None,
            operation: OperationArg::Update,
        };

        let object = load_object(&input).unwrap();
        assert_eq!(object.gvr.resource, "networkpolicies");
        assert_eq!(object.gvr.group, "networking.k8s.io");
        assert_eq!(object.name, "deny-all");
        assert_eq!(object.operation, Some(Operation::Update));
    }

    #[test]
    fn test_verdict_mapping() {
        assert!(AuthorizationVerdict::from(VerdictArg::Fallback).should_persist());
        assert!(!AuthorizationVerdict::from(VerdictArg::Bypass).should_persist());
    }
}
