//! Run command: execute a notebook and save the outputs.

use std::path::Path;
use std::time::Instant;

use promptbook_core::{
    CellId, CellRef, CellStatus, Engine, ExecutionCallback, ExecutionPolicy, Notebook, Output,
};
use uuid::Uuid;

use crate::colors;
use crate::provider::load_settings;

/// Flags of the run command.
pub struct RunOptions {
    pub cell: Option<String>,
    pub stop_on_error: bool,
    pub provider: Option<String>,
    pub model: Option<String>,
    pub api_key: Option<String>,
    pub clear: bool,
}

/// Prints each cell's result as it finishes.
struct ConsoleProgress;

impl ExecutionCallback for ConsoleProgress {
    fn on_cell_started(&self, _notebook_id: Uuid, cell_id: CellId) {
        tracing::debug!(cell = %cell_id, "started");
    }

    fn on_cell_completed(&self, _notebook_id: Uuid, cell_id: CellId, outputs: &[Output]) {
        println!("{}✓{} {}", colors::GREEN, colors::RESET, cell_id.short());
        for output in outputs {
            for line in output.to_string().lines() {
                println!("  » {line}");
            }
        }
    }

    fn on_cell_error(
        &self,
        _notebook_id: Uuid,
        cell_id: CellId,
        error: &promptbook_core::Error,
    ) {
        println!("{}✗{} {}: {error}", colors::RED, colors::RESET, cell_id.short());
    }
}

pub fn execute(path: &Path, config: Option<&Path>, options: RunOptions) -> anyhow::Result<()> {
    let start = Instant::now();

    let mut provider_config = load_settings(config)?.provider;
    if let Some(kind) = &options.provider {
        provider_config.kind = kind.parse()?;
    }
    if let Some(model) = options.model {
        provider_config.model = model;
    }

    let mut engine = Engine::new(provider_config, options.api_key.as_deref())?;
    if options.stop_on_error {
        engine.set_policy(ExecutionPolicy::StopOnError);
    }
    engine.set_callback(ConsoleProgress);

    let mut notebook = Notebook::load(path)?;
    if options.clear {
        notebook.clear_outputs();
    }

    println!(
        "{}Running{} {} with {} provider",
        colors::BOLD,
        colors::RESET,
        notebook.name(),
        engine.provider().name()
    );
    println!("{}", "─".repeat(50));

    let (executed, failed) = match &options.cell {
        Some(cell) => {
            let status = engine.execute_cell(&mut notebook, &cell.parse::<CellRef>()?)?;
            (1, usize::from(status == CellStatus::Error))
        }
        None => {
            let summary = engine.execute_all(&mut notebook);
            if let Some(stopped) = summary.stopped_at {
                println!(
                    "{}Stopped{} after failure in {}",
                    colors::YELLOW,
                    colors::RESET,
                    stopped.short()
                );
            }
            (summary.cells.len(), summary.failed())
        }
    };

    notebook.save(path)?;

    println!("\n{}State:{}", colors::BOLD, colors::RESET);
    if notebook.state().is_empty() {
        println!("  {}(empty){}", colors::DIM, colors::RESET);
    }
    for (name, value) in notebook.state().iter() {
        println!("  {name} = {}", value.repr());
    }

    println!("{}", "─".repeat(50));
    let (color, label) = if failed == 0 {
        (colors::GREEN, "Completed")
    } else {
        (colors::RED, "Finished with errors:")
    };
    println!(
        "{color}{label}{} {executed} cells, {failed} failed in {:.2}s",
        colors::RESET,
        start.elapsed().as_secs_f64()
    );

    if failed > 0 {
        anyhow::bail!("{failed} cell(s) failed");
    }
    Ok(())
}
