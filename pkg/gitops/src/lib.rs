//! GitOps storage: destination path resolution and the git push transaction.

pub mod error;
pub mod path;
pub mod pusher;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use error::{FailureClass, PushError, PushStep};
pub use path::{RepoPath, Target, resolve_path, resolve_repo_path};
pub use pusher::{GitCredentials, GitIdentity, GitPusher, PushRequest, PushResponse};
