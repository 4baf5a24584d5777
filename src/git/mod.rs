//! Git operations using git2-rs
//!
//! This module provides the working-tree operations used by `clean`:
//! - `manager` - Core GitManager struct and basic operations
//! - `status` - Untracked and ignored entry listing
//! - `clean` - `git clean -fdx` equivalent with exclusions
//! - `types` - Shared data structures

// Submodules
mod clean;
mod manager;
mod status;
mod types;

// Re-export the main GitManager struct
pub use manager::GitManager;

pub use types::{CleanSummary, EntryKind, UntrackedEntry};
