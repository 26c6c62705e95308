//! Notebooks: an ordered list of cells plus the state they share.
//!
//! A notebook exclusively owns its cells and its [`State`]. Execution lives in
//! [`crate::execute`]; this module covers structure, editing and lookup.

mod persist;

pub use persist::FORMAT_VERSION;

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::cell::{Cell, CellId, CellKind, PromptConfig};
use crate::error::{Error, Result};
use crate::graph::DependencyGraph;
use crate::state::State;

/// Direction for moving a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveDirection {
    /// Swap with the previous cell.
    Up,
    /// Swap with the next cell.
    Down,
}

/// How a caller names a cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CellRef {
    Id(CellId),
    /// Zero-based position.
    Index(usize),
    /// Leading characters of an id, as shown in listings.
    Prefix(String),
}

impl From<CellId> for CellRef {
    fn from(id: CellId) -> Self {
        CellRef::Id(id)
    }
}

impl From<usize> for CellRef {
    fn from(index: usize) -> Self {
        CellRef::Index(index)
    }
}

impl FromStr for CellRef {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if let Ok(index) = s.parse::<usize>() {
            return Ok(CellRef::Index(index));
        }
        if let Ok(id) = s.parse::<CellId>() {
            return Ok(CellRef::Id(id));
        }
        if !s.is_empty() && s.chars().all(|c| c.is_ascii_hexdigit() || c == '-') {
            return Ok(CellRef::Prefix(s.to_ascii_lowercase()));
        }
        Err(Error::CellNotFound(s.to_string()))
    }
}

impl fmt::Display for CellRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellRef::Id(id) => write!(f, "{id}"),
            CellRef::Index(index) => write!(f, "#{index}"),
            CellRef::Prefix(prefix) => write!(f, "{prefix}"),
        }
    }
}

/// An ordered sequence of cells and their shared state.
#[derive(Debug, Clone)]
pub struct Notebook {
    id: Uuid,
    name: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    cells: Vec<Cell>,
    state: State,
}

impl Notebook {
    pub fn new(name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            created_at: now,
            updated_at: now,
            cells: Vec::new(),
            state: State::new(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
        self.touch();
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Current state, for display.
    pub fn state(&self) -> &State {
        &self.state
    }

    /// Position of the referenced cell.
    ///
    /// An index past the end is retried as an id prefix, since a short id can
    /// consist of decimal digits only.
    pub fn position(&self, cell: &CellRef) -> Result<usize> {
        let found = match cell {
            CellRef::Index(index) if *index < self.cells.len() => Some(*index),
            CellRef::Index(index) => self.position_by_prefix(&index.to_string())?,
            CellRef::Id(id) => self.cells.iter().position(|c| c.id() == *id),
            CellRef::Prefix(prefix) => self.position_by_prefix(prefix)?,
        };
        found.ok_or_else(|| Error::CellNotFound(cell.to_string()))
    }

    fn position_by_prefix(&self, prefix: &str) -> Result<Option<usize>> {
        let mut matches = self
            .cells
            .iter()
            .enumerate()
            .filter(|(_, c)| c.id().to_string().starts_with(prefix));
        match (matches.next(), matches.next()) {
            (Some((index, _)), None) => Ok(Some(index)),
            (Some(_), Some(_)) => Err(Error::InvalidOperation(format!(
                "cell prefix '{prefix}' is ambiguous"
            ))),
            _ => Ok(None),
        }
    }

    pub fn cell(&self, cell: &CellRef) -> Result<&Cell> {
        let index = self.position(cell)?;
        Ok(&self.cells[index])
    }

    /// Append a cell and return its id.
    pub fn add_cell(&mut self, cell: Cell) -> CellId {
        let id = cell.id();
        self.cells.push(cell);
        self.touch();
        id
    }

    /// Insert a cell at `index` (`index == len` appends).
    pub fn insert_cell(&mut self, index: usize, cell: Cell) -> Result<CellId> {
        if index > self.cells.len() {
            return Err(Error::InvalidOperation(format!(
                "cannot insert at position {index} in a notebook of {} cells",
                self.cells.len()
            )));
        }
        let id = cell.id();
        self.cells.insert(index, cell);
        self.touch();
        Ok(id)
    }

    /// Replace a cell's content. Outputs and status are left as they are.
    pub fn edit_cell(&mut self, cell: &CellRef, content: impl Into<String>) -> Result<()> {
        let index = self.position(cell)?;
        self.cells[index].set_content(content.into());
        self.touch();
        Ok(())
    }

    /// Replace the overrides of a prompt cell.
    pub fn set_prompt_config(&mut self, cell: &CellRef, config: PromptConfig) -> Result<()> {
        let index = self.position(cell)?;
        let target = &mut self.cells[index];
        if target.kind() != CellKind::Prompt {
            return Err(Error::InvalidOperation(format!(
                "cell {} is a {} cell, not a prompt cell",
                target.id(),
                target.kind()
            )));
        }
        target.set_prompt_config(config)?;
        self.touch();
        Ok(())
    }

    pub fn delete_cell(&mut self, cell: &CellRef) -> Result<Cell> {
        let index = self.position(cell)?;
        let removed = self.cells.remove(index);
        self.touch();
        Ok(removed)
    }

    /// Move a cell one position. Returns its new index.
    pub fn move_cell(&mut self, cell: &CellRef, direction: MoveDirection) -> Result<usize> {
        let index = self.position(cell)?;
        let target = match direction {
            MoveDirection::Up if index == 0 => {
                return Err(Error::InvalidOperation("cannot move the first cell up".into()));
            }
            MoveDirection::Down if index + 1 == self.cells.len() => {
                return Err(Error::InvalidOperation("cannot move the last cell down".into()));
            }
            MoveDirection::Up => index - 1,
            MoveDirection::Down => index + 1,
        };
        self.cells.swap(index, target);
        self.touch();
        Ok(target)
    }

    /// Drop every cell's outputs and reset statuses to idle.
    pub fn clear_outputs(&mut self) {
        for cell in &mut self.cells {
            cell.clear_outputs();
        }
        self.touch();
    }

    pub fn clear_state(&mut self) {
        self.state.clear();
        self.touch();
    }

    /// Producer/consumer graph from the last recorded dependency sets.
    pub fn dependency_graph(&self) -> DependencyGraph {
        DependencyGraph::build(
            self.cells
                .iter()
                .map(|c| (c.state_dependencies(), c.state_produces())),
        )
    }

    /// Positions of earlier cells that the cell reads from.
    pub fn cell_dependencies(&self, cell: &CellRef) -> Result<BTreeSet<usize>> {
        let index = self.position(cell)?;
        Ok(self.dependency_graph().dependencies_of(index))
    }

    /// Positions of later cells that read from the cell.
    pub fn dependent_cells(&self, cell: &CellRef) -> Result<BTreeSet<usize>> {
        let index = self.position(cell)?;
        Ok(self.dependency_graph().dependents_of(index))
    }

    /// Every cell position mapped to the positions it depends on.
    pub fn execution_graph(&self) -> BTreeMap<usize, BTreeSet<usize>> {
        self.dependency_graph().to_map()
    }

    pub(crate) fn cell_mut(&mut self, index: usize) -> &mut Cell {
        &mut self.cells[index]
    }

    pub(crate) fn replace_state(&mut self, state: State) {
        self.state = state;
    }

    pub(crate) fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}
