use git2::ErrorCode;
use pkg_types::interceptor::PushedObjectStatus;
use std::fmt;
use thiserror::Error;

/// Step of the git transaction that produced an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushStep {
    Validate,
    Clone,
    Worktree,
    Write,
    Commit,
    Push,
}

impl fmt::Display for PushStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PushStep::Validate => write!(f, "validate"),
            PushStep::Clone => write!(f, "clone"),
            PushStep::Worktree => write!(f, "worktree"),
            PushStep::Write => write!(f, "write"),
            PushStep::Commit => write!(f, "commit"),
            PushStep::Push => write!(f, "push"),
        }
    }
}

/// Failure categories the status writer and retry policy act on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// Destination rejected before any network I/O.
    Validation,
    /// Connectivity, TLS, DNS, or a non-fast-forward race at the remote.
    Network,
    /// The remote refused the credentials or the write.
    NotAllowed,
    /// Failure inside the throwaway clone.
    Local,
}

impl FailureClass {
    /// Push status recorded for this class. `None` when no push was attempted.
    pub fn status(self) -> Option<PushedObjectStatus> {
        match self {
            FailureClass::Network => Some(PushedObjectStatus::NetworkError),
            FailureClass::NotAllowed => Some(PushedObjectStatus::PushNotAllowed),
            FailureClass::Validation | FailureClass::Local => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum PushError {
    #[error("the path is not valid: '{path}': {reason}")]
    InvalidPath { path: String, reason: String },

    #[error("failed to clone repository: {0}")]
    Clone(#[source] git2::Error),

    #[error("failed to get worktree: {0}")]
    Worktree(String),

    #[error("failed to create directory '{path}': {source}")]
    CreateDir {
        path: String,
        source: std::io::Error,
    },

    #[error("failed to serialize object: {0}")]
    Encode(String),

    #[error("failed to write file '{path}': {source}")]
    Write {
        path: String,
        source: std::io::Error,
    },

    #[error("failed to add file to staging area: {0}")]
    Stage(#[source] git2::Error),

    #[error("failed to commit changes: {0}")]
    Commit(#[source] git2::Error),

    #[error("failed to push changes: {0}")]
    Push(#[source] git2::Error),

    #[error("remote rejected update of {reference}: {message}")]
    Rejected { reference: String, message: String },

    #[error("push task did not complete: {0}")]
    Interrupted(String),
}

impl PushError {
    pub fn invalid_path(path: impl Into<String>, reason: impl Into<String>) -> Self {
        PushError::InvalidPath {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn step(&self) -> PushStep {
        match self {
            PushError::InvalidPath { .. } => PushStep::Validate,
            PushError::Clone(_) => PushStep::Clone,
            PushError::Worktree(_) | PushError::Interrupted(_) => PushStep::Worktree,
            PushError::CreateDir { .. } | PushError::Encode(_) | PushError::Write { .. } => {
                PushStep::Write
            }
            PushError::Stage(_) | PushError::Commit(_) => PushStep::Commit,
            PushError::Push(_) | PushError::Rejected { .. } => PushStep::Push,
        }
    }

    pub fn class(&self) -> FailureClass {
        match self {
            PushError::InvalidPath { .. } => FailureClass::Validation,
            PushError::Clone(e) | PushError::Push(e) => classify_remote(e),
            PushError::Rejected { message, .. } => {
                if mentions_denial(message) {
                    FailureClass::NotAllowed
                } else {
                    FailureClass::Network
                }
            }
            PushError::Worktree(_)
            | PushError::Interrupted(_)
            | PushError::CreateDir { .. }
            | PushError::Encode(_)
            | PushError::Write { .. }
            | PushError::Stage(_)
            | PushError::Commit(_) => FailureClass::Local,
        }
    }

    /// Whether re-cloning and re-pushing can succeed: the remote branch moved
    /// while this transaction was in flight.
    pub fn is_retriable(&self) -> bool {
        match self {
            PushError::Push(e) => {
                e.code() == ErrorCode::NotFastForward || mentions_stale_tip(e.message())
            }
            PushError::Rejected { message, .. } => {
                !mentions_denial(message) && mentions_stale_tip(message)
            }
            _ => false,
        }
    }
}

fn classify_remote(err: &git2::Error) -> FailureClass {
    if err.code() == ErrorCode::Auth || mentions_denial(err.message()) {
        FailureClass::NotAllowed
    } else {
        FailureClass::Network
    }
}

fn mentions_denial(message: &str) -> bool {
    let message = message.to_lowercase();
    [
        "status code: 401",
        "status code: 403",
        "unauthorized",
        "forbidden",
        "permission",
        "authentication",
        "credentials",
        "not allowed",
        "declined",
        "protected branch",
    ]
    .iter()
    .any(|needle| message.contains(needle))
}

fn mentions_stale_tip(message: &str) -> bool {
    let message = message.to_lowercase();
    [
        "fast-forward",
        "fastforward",
        "fetch first",
        "stale info",
        "not present locally",
    ]
    .iter()
    .any(|needle| message.contains(needle))
}

#[cfg(test)]
mod tests {
    use super::*;
    use git2::ErrorClass;

    fn git_error(code: ErrorCode, class: ErrorClass, message: &str) -> git2::Error {
        git2::Error::new(code, class, message)
    }

    #[test]
    fn test_auth_errors_are_not_allowed() {
        let err = PushError::Push(git_error(
            ErrorCode::Auth,
            ErrorClass::Http,
            "credentials rejected by remote",
        ));
        assert_eq!(err.class(), FailureClass::NotAllowed);
        assert_eq!(err.class().status(), Some(PushedObjectStatus::PushNotAllowed));
        assert!(!err.is_retriable());

        let err = PushError::Clone(git_error(
            ErrorCode::GenericError,
            ErrorClass::Http,
            "unexpected http status code: 403",
        ));
        assert_eq!(err.class(), FailureClass::NotAllowed);
        assert_eq!(err.step(), PushStep::Clone);
    }

    #[test]
    fn test_transport_errors_are_network() {
        let err = PushError::Clone(git_error(
            ErrorCode::GenericError,
            ErrorClass::Net,
            "failed to resolve address for git.example.com",
        ));
        assert_eq!(err.class(), FailureClass::Network);
        assert_eq!(err.class().status(), Some(PushedObjectStatus::NetworkError));
        assert!(!err.is_retriable());
    }

    #[test]
    fn test_status_digits_in_host_names_stay_network() {
        let err = PushError::Clone(git_error(
            ErrorCode::GenericError,
            ErrorClass::Net,
            "failed to resolve address for git-403.example.com: Name or service not known",
        ));
        assert_eq!(err.class(), FailureClass::Network);

        let err = PushError::Clone(git_error(
            ErrorCode::GenericError,
            ErrorClass::Http,
            "unexpected http status code: 401",
        ));
        assert_eq!(err.class(), FailureClass::NotAllowed);
    }

    #[test]
    fn test_non_fast_forward_is_retriable_network() {
        let err = PushError::Push(git_error(
            ErrorCode::NotFastForward,
            ErrorClass::Reference,
            "cannot push non-fastforwardable reference",
        ));
        assert_eq!(err.class(), FailureClass::Network);
        assert!(err.is_retriable());

        let err = PushError::Rejected {
            reference: "refs/heads/main".to_string(),
            message: "fetch first".to_string(),
        };
        assert_eq!(err.class(), FailureClass::Network);
        assert!(err.is_retriable());
    }

    #[test]
    fn test_hook_rejection_is_not_allowed() {
        let err = PushError::Rejected {
            reference: "refs/heads/main".to_string(),
            message: "pre-receive hook declined".to_string(),
        };
        assert_eq!(err.class(), FailureClass::NotAllowed);
        assert!(!err.is_retriable());
    }

    #[test]
    fn test_local_and_validation_have_no_status() {
        let err = PushError::invalid_path("a:b", "contains invalid characters");
        assert_eq!(err.class(), FailureClass::Validation);
        assert_eq!(err.step(), PushStep::Validate);
        assert_eq!(err.class().status(), None);

        let err = PushError::Commit(git_error(
            ErrorCode::GenericError,
            ErrorClass::Object,
            "failed to write tree",
        ));
        assert_eq!(err.class(), FailureClass::Local);
        assert_eq!(err.step(), PushStep::Commit);
        assert!(err.to_string().starts_with("failed to commit changes"));
    }
}
