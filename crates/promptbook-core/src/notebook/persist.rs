//! JSON document format for notebooks.
//!
//! State values are never written. The document keeps structure, the last
//! outputs and the last dependency sets; a loaded notebook starts with empty
//! state and every cell idle.

use std::collections::BTreeSet;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Notebook;
use crate::cell::{Cell, CellId, CellKind, Output, PromptConfig};
use crate::error::{Error, Result};
use crate::state::State;

/// Version written into every saved document.
pub const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct NotebookDocument {
    format_version: u32,
    notebook_id: Uuid,
    name: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    cells: Vec<CellDocument>,
    /// Names present in state at save time. Informational only.
    #[serde(default)]
    state_keys: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct CellDocument {
    cell_id: CellId,
    #[serde(rename = "type")]
    kind: CellKind,
    content: String,
    #[serde(default)]
    outputs: Vec<Output>,
    #[serde(default)]
    state_dependencies: BTreeSet<String>,
    #[serde(default)]
    state_produces: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "PromptConfig::is_empty")]
    prompt: PromptConfig,
}

impl From<&Cell> for CellDocument {
    fn from(cell: &Cell) -> Self {
        Self {
            cell_id: cell.id(),
            kind: cell.kind(),
            content: cell.content().to_string(),
            outputs: cell.outputs().to_vec(),
            state_dependencies: cell.state_dependencies().clone(),
            state_produces: cell.state_produces().clone(),
            prompt: cell.prompt_config().clone(),
        }
    }
}

impl CellDocument {
    fn into_cell(self) -> Result<Cell> {
        let mut cell = Cell::with_id(self.cell_id, self.kind, self.content);
        if self.kind == CellKind::Prompt {
            cell.set_prompt_config(self.prompt)?;
        }
        cell.outputs = self.outputs;
        cell.state_dependencies = self.state_dependencies;
        cell.state_produces = self.state_produces;
        Ok(cell)
    }
}

/// Sibling of `path` with `.tmp` appended to the full file name.
fn temp_path(path: &Path) -> Result<PathBuf> {
    let Some(file_name) = path.file_name() else {
        return Err(Error::persistence(path, "path does not name a file"));
    };
    let mut temp_name = file_name.to_os_string();
    temp_name.push(".tmp");
    Ok(path.with_file_name(temp_name))
}

impl Notebook {
    /// Serialize to the JSON document format.
    pub fn to_json(&self) -> Result<String> {
        self.render_document(Path::new(""))
    }

    fn render_document(&self, path: &Path) -> Result<String> {
        let document = NotebookDocument {
            format_version: FORMAT_VERSION,
            notebook_id: self.id,
            name: self.name.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
            cells: self.cells.iter().map(CellDocument::from).collect(),
            state_keys: self.state.keys().map(str::to_string).collect(),
        };
        serde_json::to_string_pretty(&document).map_err(|e| Error::persistence(path, e))
    }

    /// Parse a JSON document. State starts empty.
    pub fn from_json(text: &str) -> Result<Self> {
        Self::parse_document(text, Path::new(""))
    }

    fn parse_document(text: &str, path: &Path) -> Result<Self> {
        let document: NotebookDocument =
            serde_json::from_str(text).map_err(|e| Error::persistence(path, e))?;

        if document.format_version > FORMAT_VERSION {
            return Err(Error::persistence(
                path,
                format!(
                    "document format version {} is newer than supported version {FORMAT_VERSION}",
                    document.format_version
                ),
            ));
        }

        let mut seen = FxHashSet::default();
        let mut cells = Vec::with_capacity(document.cells.len());
        for cell in document.cells {
            if !seen.insert(cell.cell_id) {
                return Err(Error::persistence(
                    path,
                    format!("duplicate cell id {}", cell.cell_id),
                ));
            }
            cells.push(cell.into_cell().map_err(|e| Error::persistence(path, e))?);
        }

        Ok(Self {
            id: document.notebook_id,
            name: document.name,
            created_at: document.created_at,
            updated_at: document.updated_at,
            cells,
            state: State::new(),
        })
    }

    /// Write the notebook to `path`.
    ///
    /// The document goes to a sibling temp file first and is renamed into
    /// place, so a failed save leaves any previous file intact.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| Error::persistence(parent, e))?;
        }

        let json = self.render_document(path)?;

        let temp = temp_path(path)?;
        let write = || -> std::io::Result<()> {
            let mut file = fs::File::create(&temp)?;
            file.write_all(json.as_bytes())?;
            file.sync_all()?;
            fs::rename(&temp, path)
        };
        if let Err(e) = write() {
            let _ = fs::remove_file(&temp);
            return Err(Error::persistence(path, e));
        }

        tracing::info!(
            path = %path.display(),
            cells = self.cells.len(),
            "saved notebook"
        );
        Ok(())
    }

    /// Read a notebook from `path`. State starts empty and cells idle.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| Error::persistence(path, e))?;
        let notebook = Self::parse_document(&text, path)?;
        tracing::info!(
            path = %path.display(),
            cells = notebook.cells.len(),
            "loaded notebook"
        );
        Ok(notebook)
    }
}
