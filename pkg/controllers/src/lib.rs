//! Admission-side storage of intercepted objects into git.

pub mod locks;
pub mod storage;

pub use locks::BranchLocks;
pub use storage::{PushReport, StorageOutcome, StoragePipeline, StorageSettings, prepare};
