//! Cell execution.
//!
//! - [`Engine`]: dispatches cells to their handlers and applies the results
//! - [`ExecutionCallback`]: progress notifications for front-ends
//! - [`ExecutionPolicy`]: what "execute all" does after a failed cell

mod context;
mod engine;

pub use context::{EventLog, ExecutionCallback, ExecutionEvent};
pub use engine::{CellRun, Engine, ExecutionPolicy, RunSummary};
