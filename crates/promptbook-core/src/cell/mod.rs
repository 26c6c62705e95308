//! Cells: the unit of a notebook.
//!
//! The variant set is closed. Each [`CellKind`] has one handler, and every
//! handler takes the current [`State`] by reference and returns a fresh state
//! on success. A failed handler never returns partial state.

mod computation;
mod memory;
mod output;
mod prompt;
pub mod template;

pub use output::{MemoryEntry, Output};

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::graph::{DependencyAnalysis, DependencyTracker, is_identifier};
use crate::llm::{LlmProvider, ProviderConfig, validate_temperature};
use crate::script::FragmentExecutor;
use crate::state::{State, is_reserved_name};

/// Opaque, stable cell identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CellId(Uuid);

impl CellId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// First eight characters of the id, used for display and response keys.
    pub fn short(&self) -> String {
        self.0.simple().to_string()[..8].to_string()
    }
}

impl Default for CellId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CellId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for CellId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Cell variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CellKind {
    Markdown,
    Computation,
    Prompt,
    Memory,
}

impl fmt::Display for CellKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CellKind::Markdown => "markdown",
            CellKind::Computation => "computation",
            CellKind::Prompt => "prompt",
            CellKind::Memory => "memory",
        };
        f.write_str(name)
    }
}

impl FromStr for CellKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "markdown" | "md" => Ok(CellKind::Markdown),
            "computation" | "code" => Ok(CellKind::Computation),
            "prompt" => Ok(CellKind::Prompt),
            "memory" => Ok(CellKind::Memory),
            other => Err(Error::Configuration(format!("unknown cell type '{other}'"))),
        }
    }
}

/// Execution status. `Idle -> Running -> {Success, Error}`; a rerun starts over.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CellStatus {
    #[default]
    Idle,
    Running,
    Success,
    Error,
}

impl fmt::Display for CellStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CellStatus::Idle => "idle",
            CellStatus::Running => "running",
            CellStatus::Success => "success",
            CellStatus::Error => "error",
        };
        f.write_str(name)
    }
}

/// Per-cell overrides for prompt cells. Unset fields fall back to the
/// provider defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PromptConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_var: Option<String>,
}

impl PromptConfig {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(temperature) = self.temperature {
            validate_temperature(temperature).map_err(|e| Error::Configuration(e.to_string()))?;
        }
        if self.max_tokens == Some(0) {
            return Err(Error::Configuration("max_tokens must be greater than zero".into()));
        }
        if let Some(model) = &self.model {
            if model.trim().is_empty() {
                return Err(Error::Configuration("model must not be empty".into()));
            }
        }
        if let Some(var) = &self.response_var {
            if !is_identifier(var) || is_reserved_name(var) {
                return Err(Error::Configuration(format!(
                    "'{var}' is not a valid response variable name"
                )));
            }
        }
        Ok(())
    }
}

/// One notebook cell.
///
/// Identity and content change only through explicit edits; status, outputs
/// and the dependency sets change only through execution.
#[derive(Debug, Clone, PartialEq)]
pub struct Cell {
    id: CellId,
    kind: CellKind,
    content: String,
    prompt: PromptConfig,
    pub(crate) outputs: Vec<Output>,
    pub(crate) status: CellStatus,
    pub(crate) state_dependencies: BTreeSet<String>,
    pub(crate) state_produces: BTreeSet<String>,
}

impl Cell {
    pub fn new(kind: CellKind, content: impl Into<String>) -> Self {
        Self::with_id(CellId::new(), kind, content.into())
    }

    /// Create a prompt cell with per-cell overrides.
    pub fn prompt(content: impl Into<String>, config: PromptConfig) -> Result<Self> {
        config.validate()?;
        let mut cell = Self::new(CellKind::Prompt, content);
        cell.prompt = config;
        Ok(cell)
    }

    pub(crate) fn with_id(id: CellId, kind: CellKind, content: String) -> Self {
        Self {
            id,
            kind,
            content,
            prompt: PromptConfig::default(),
            outputs: Vec::new(),
            status: CellStatus::Idle,
            state_dependencies: BTreeSet::new(),
            state_produces: BTreeSet::new(),
        }
    }

    pub fn id(&self) -> CellId {
        self.id
    }

    pub fn kind(&self) -> CellKind {
        self.kind
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn prompt_config(&self) -> &PromptConfig {
        &self.prompt
    }

    pub fn outputs(&self) -> &[Output] {
        &self.outputs
    }

    pub fn status(&self) -> CellStatus {
        self.status
    }

    pub fn state_dependencies(&self) -> &BTreeSet<String> {
        &self.state_dependencies
    }

    pub fn state_produces(&self) -> &BTreeSet<String> {
        &self.state_produces
    }

    /// State key a prompt cell binds its response to.
    pub fn response_key(&self) -> String {
        match &self.prompt.response_var {
            Some(var) => var.clone(),
            None => format!("response_{}", self.id.short()),
        }
    }

    pub(crate) fn set_content(&mut self, content: String) {
        self.content = content;
    }

    pub(crate) fn set_prompt_config(&mut self, config: PromptConfig) -> Result<()> {
        config.validate()?;
        self.prompt = config;
        Ok(())
    }

    pub(crate) fn clear_outputs(&mut self) {
        self.outputs.clear();
        self.status = CellStatus::Idle;
    }

    /// Run this cell's handler against `state`.
    pub(crate) fn run(&self, state: &State, ctx: &CellContext<'_>) -> Result<Execution> {
        match self.kind {
            CellKind::Markdown => Ok(Execution {
                state: None,
                outputs: vec![Output::Markdown {
                    text: self.content.clone(),
                }],
                analysis: DependencyAnalysis::default(),
            }),
            CellKind::Computation => computation::execute(&self.content, state, ctx),
            CellKind::Prompt => prompt::execute(self, state, ctx),
            CellKind::Memory => memory::execute(&self.content, state, ctx),
        }
    }
}

/// Collaborators a handler may call.
pub(crate) struct CellContext<'a> {
    pub executor: &'a dyn FragmentExecutor,
    pub tracker: &'a dyn DependencyTracker,
    pub provider: &'a dyn LlmProvider,
    pub defaults: &'a ProviderConfig,
}

/// Successful result of one handler run.
#[derive(Debug)]
pub(crate) struct Execution {
    /// Replacement state; `None` leaves the notebook's state as it is.
    pub state: Option<State>,
    pub outputs: Vec<Output>,
    pub analysis: DependencyAnalysis,
}
