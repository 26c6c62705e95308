//! Notebook editing commands.

use std::io::Read;
use std::path::Path;

use anyhow::Context;
use promptbook_core::{Cell, CellKind, CellRef, MoveDirection, Notebook, PromptConfig};

use crate::colors;

/// Use the given content, or read it from stdin when absent.
fn content_or_stdin(content: Option<String>) -> anyhow::Result<String> {
    match content {
        Some(content) => Ok(content),
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("failed to read cell content from stdin")?;
            Ok(buf.trim_end_matches('\n').to_string())
        }
    }
}

pub fn create(path: &Path, name: Option<&str>) -> anyhow::Result<()> {
    if path.exists() {
        anyhow::bail!("{} already exists", path.display());
    }
    let name = name
        .map(str::to_string)
        .or_else(|| path.file_stem().map(|s| s.to_string_lossy().into_owned()))
        .unwrap_or_else(|| "untitled".to_string());

    let notebook = Notebook::new(name);
    notebook.save(path)?;
    println!(
        "{}Created{} {} ({})",
        colors::GREEN,
        colors::RESET,
        path.display(),
        notebook.name()
    );
    Ok(())
}

pub fn add(
    path: &Path,
    kind: CellKind,
    content: Option<String>,
    at: Option<usize>,
    prompt: PromptConfig,
) -> anyhow::Result<()> {
    let mut notebook = Notebook::load(path)?;
    let content = content_or_stdin(content)?;

    let cell = if kind == CellKind::Prompt {
        Cell::prompt(content, prompt)?
    } else {
        if !prompt.is_empty() {
            anyhow::bail!("--model, --temperature, --max-tokens and --response-var apply only to prompt cells");
        }
        Cell::new(kind, content)
    };

    let id = match at {
        Some(index) => notebook.insert_cell(index, cell)?,
        None => notebook.add_cell(cell),
    };
    notebook.save(path)?;

    let position = notebook.position(&CellRef::Id(id))?;
    println!(
        "{}Added{} {kind} cell {} at #{position}",
        colors::GREEN,
        colors::RESET,
        id.short()
    );
    Ok(())
}

pub fn replace(path: &Path, cell: &str, content: Option<String>) -> anyhow::Result<()> {
    let mut notebook = Notebook::load(path)?;
    let cell_ref: CellRef = cell.parse()?;
    let content = content_or_stdin(content)?;

    notebook.edit_cell(&cell_ref, content)?;
    notebook.save(path)?;
    println!("{}Updated{} cell {cell_ref}", colors::GREEN, colors::RESET);
    Ok(())
}

pub fn delete(path: &Path, cell: &str) -> anyhow::Result<()> {
    let mut notebook = Notebook::load(path)?;
    let removed = notebook.delete_cell(&cell.parse::<CellRef>()?)?;
    notebook.save(path)?;
    println!(
        "{}Deleted{} {} cell {}",
        colors::GREEN,
        colors::RESET,
        removed.kind(),
        removed.id().short()
    );
    Ok(())
}

pub fn move_cell(path: &Path, cell: &str, direction: MoveDirection) -> anyhow::Result<()> {
    let mut notebook = Notebook::load(path)?;
    let position = notebook.move_cell(&cell.parse::<CellRef>()?, direction)?;
    notebook.save(path)?;
    println!("{}Moved{} cell to #{position}", colors::GREEN, colors::RESET);
    Ok(())
}

pub fn clear(path: &Path) -> anyhow::Result<()> {
    let mut notebook = Notebook::load(path)?;
    notebook.clear_outputs();
    notebook.save(path)?;
    println!("{}Cleared{} outputs of {} cells", colors::GREEN, colors::RESET, notebook.len());
    Ok(())
}
