//! Observing what the agents did to the repository.

pub mod git;

pub use git::{CommitInfo, GitTracker};
