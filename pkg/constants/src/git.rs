//! Git transaction constants.

// ─── Commit ────────────────────────────────────────────────────────────────

/// Commit message prefix. Full message = `"<prefix> <resource> <name>"`.
pub const COMMIT_MESSAGE_PREFIX: &str = "Add or modify";

/// Fully-qualified prefix of local branch references.
pub const BRANCH_REF_PREFIX: &str = "refs/heads/";

/// Name of the remote created by a clone.
pub const ORIGIN_REMOTE: &str = "origin";

// ─── Transport ─────────────────────────────────────────────────────────────

/// Clone depth used for network remotes.
pub const SHALLOW_CLONE_DEPTH: i32 = 1;

/// URL schemes that are fetched shallowly.
pub const SHALLOW_SCHEMES: &[&str] = &["http://", "https://"];

/// Maximum number of times the credentials callback may be asked for
/// credentials before the transaction is treated as unauthorized.
pub const MAX_CREDENTIAL_ATTEMPTS: u32 = 1;

// ─── Retry ─────────────────────────────────────────────────────────────────

/// Default number of push attempts per invocation when the remote rejects
/// a non-fast-forward update.
pub const DEFAULT_MAX_PUSH_ATTEMPTS: u32 = 3;

/// Delay between two push attempts, in milliseconds.
pub const PUSH_RETRY_BACKOFF_MS: u64 = 200;
