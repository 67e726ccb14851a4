//! Centralized constants for the kgio project.
//!
//! All project-wide constant values live here.
//! Change a value in one place and it applies everywhere.

pub mod git;
pub mod paths;
