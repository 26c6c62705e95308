//! Notebook state.
//!
//! This module provides:
//! - `Value`, the runtime value model shared by all cell variants
//! - `State`, the ordered name → value store a notebook owns exclusively

mod store;
mod value;

pub use store::State;
pub use value::Value;

/// Names with this prefix are execution artifacts, never notebook state.
pub const RESERVED_PREFIX: char = '_';

/// Whether `name` is reserved for the execution environment.
pub fn is_reserved_name(name: &str) -> bool {
    name.starts_with(RESERVED_PREFIX)
}
