//! Dependency tracking between cells.
//!
//! This module provides:
//! - The [`DependencyTracker`] strategy and its line-based heuristic
//! - A descriptive cell-to-cell [`DependencyGraph`] for display and diagnostics

mod tracker;
mod types;

pub use tracker::{
    Assignment, DependencyAnalysis, DependencyTracker, HeuristicTracker, is_identifier,
    referenced_keys, split_assignment,
};
pub use types::DependencyGraph;
