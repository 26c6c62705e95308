//! Show command: print a notebook's cells and recorded outputs.

use std::path::Path;

use promptbook_core::{Cell, CellStatus, Notebook};

use crate::colors;

fn status_color(status: CellStatus) -> &'static str {
    match status {
        CellStatus::Success => colors::GREEN,
        CellStatus::Error => colors::RED,
        CellStatus::Running => colors::YELLOW,
        CellStatus::Idle => colors::DIM,
    }
}

fn join(keys: &std::collections::BTreeSet<String>) -> String {
    keys.iter().map(String::as_str).collect::<Vec<_>>().join(", ")
}

fn print_cell(index: usize, cell: &Cell) {
    println!(
        "\n{}#{index}{} {}{}{} {} {}[{}]{}",
        colors::BOLD,
        colors::RESET,
        colors::CYAN,
        cell.kind(),
        colors::RESET,
        cell.id().short(),
        status_color(cell.status()),
        cell.status(),
        colors::RESET,
    );

    for line in cell.content().lines() {
        println!("  {}│{} {line}", colors::DIM, colors::RESET);
    }

    if !cell.state_dependencies().is_empty() {
        println!("  reads: {}", join(cell.state_dependencies()));
    }
    if !cell.state_produces().is_empty() {
        println!("  writes: {}", join(cell.state_produces()));
    }

    for output in cell.outputs() {
        let color = if output.is_error() { colors::RED } else { colors::RESET };
        for line in output.to_string().lines() {
            println!("  {color}» {line}{}", colors::RESET);
        }
    }
}

pub fn execute(path: &Path, graph_only: bool) -> anyhow::Result<()> {
    let notebook = Notebook::load(path)?;

    println!(
        "{}{}{} {}({} cells, updated {}){}",
        colors::BOLD,
        notebook.name(),
        colors::RESET,
        colors::DIM,
        notebook.len(),
        notebook.updated_at().format("%Y-%m-%d %H:%M:%S UTC"),
        colors::RESET
    );

    if graph_only {
        let graph = notebook.dependency_graph();
        if graph.edges().is_empty() {
            println!("No dependencies recorded. Run the notebook first.");
        }
        for (producer, consumer) in graph.edges() {
            println!("  #{producer} -> #{consumer}");
        }
        return Ok(());
    }

    if notebook.is_empty() {
        println!("\n{}No cells yet.{} Add one with `promptbook add`.", colors::YELLOW, colors::RESET);
        return Ok(());
    }

    for (index, cell) in notebook.cells().iter().enumerate() {
        print_cell(index, cell);
    }
    Ok(())
}
