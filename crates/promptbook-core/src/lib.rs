//! Core engine for the promptbook notebook environment.
//!
//! This crate provides:
//! - Shared notebook state and the runtime value model
//! - An embedded script language for computation and memory cells
//! - Heuristic dependency tracking and a descriptive cell graph
//! - Cell variants (markdown, computation, prompt, memory) and their handlers
//! - LLM providers (deterministic mock, OpenAI-compatible remote) and configuration
//! - Notebook editing, sequential execution and JSON persistence

pub mod cell;
pub mod error;
pub mod execute;
pub mod graph;
pub mod llm;
pub mod notebook;
pub mod script;
pub mod state;

pub use cell::{Cell, CellId, CellKind, CellStatus, MemoryEntry, Output, PromptConfig};
pub use error::{Error, FragmentError, FragmentErrorKind, ProviderError, Result};
pub use execute::{
    CellRun, Engine, EventLog, ExecutionCallback, ExecutionEvent, ExecutionPolicy, RunSummary,
};
pub use graph::{DependencyAnalysis, DependencyGraph, DependencyTracker, HeuristicTracker};
pub use llm::{
    LlmProvider, MockProvider, ProviderConfig, ProviderKind, RemoteProvider, Settings,
    build_provider,
};
pub use notebook::{CellRef, MoveDirection, Notebook};
pub use script::{FragmentExecutor, FragmentOutcome, ScriptExecutor, evaluate_expression};
pub use state::{State, Value};
