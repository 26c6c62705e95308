//! promptbook CLI - notebooks mixing script cells with LLM prompts.

mod colors;
mod edit;
mod provider;
mod run;
mod show;

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "promptbook")]
#[command(about = "Notebooks that mix script cells, memory cells and LLM prompts")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Settings file (default: ~/.promptbook/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Clone, Copy, ValueEnum)]
enum KindArg {
    Markdown,
    Computation,
    Prompt,
    Memory,
}

#[derive(Clone, Copy, ValueEnum)]
enum DirectionArg {
    Up,
    Down,
}

#[derive(Subcommand)]
enum Commands {
    /// Create an empty notebook file
    New {
        /// Path of the notebook (.json)
        notebook: PathBuf,

        /// Display name (default: file stem)
        #[arg(long)]
        name: Option<String>,
    },

    /// Print cells, outputs and the dependency graph
    Show {
        /// Path of the notebook (.json)
        notebook: PathBuf,

        /// Print only the cell-to-cell dependency graph
        #[arg(long)]
        graph: bool,
    },

    /// Add a cell
    Add {
        notebook: PathBuf,

        #[arg(short, long, value_enum)]
        kind: KindArg,

        /// Cell content; read from stdin when omitted
        content: Option<String>,

        /// Insert at this position instead of appending
        #[arg(long)]
        at: Option<usize>,

        /// Prompt cells: model override
        #[arg(long)]
        model: Option<String>,

        /// Prompt cells: temperature override (0.0 - 2.0)
        #[arg(long)]
        temperature: Option<f64>,

        /// Prompt cells: max tokens override
        #[arg(long)]
        max_tokens: Option<u32>,

        /// Prompt cells: state key for the response
        #[arg(long)]
        response_var: Option<String>,
    },

    /// Replace a cell's content
    Edit {
        notebook: PathBuf,

        /// Cell index, id or id prefix
        cell: String,

        /// New content; read from stdin when omitted
        content: Option<String>,
    },

    /// Delete a cell
    Delete {
        notebook: PathBuf,

        /// Cell index, id or id prefix
        cell: String,
    },

    /// Move a cell one position up or down
    Move {
        notebook: PathBuf,

        /// Cell index, id or id prefix
        cell: String,

        #[arg(value_enum)]
        direction: DirectionArg,
    },

    /// Remove all recorded outputs
    Clear { notebook: PathBuf },

    /// Execute cells and save their outputs
    Run {
        notebook: PathBuf,

        /// Run only a specific cell (index, id or id prefix)
        #[arg(long)]
        cell: Option<String>,

        /// Stop at the first failing cell
        #[arg(long)]
        stop_on_error: bool,

        /// Provider type for this run (mock or remote)
        #[arg(long)]
        provider: Option<String>,

        /// Default model for this run
        #[arg(long)]
        model: Option<String>,

        /// API key for this run
        #[arg(long)]
        api_key: Option<String>,

        /// Clear previous outputs before running
        #[arg(long)]
        clear: bool,
    },

    /// Inspect or change the LLM provider settings
    Provider {
        #[command(subcommand)]
        action: ProviderAction,
    },
}

#[derive(Subcommand)]
enum ProviderAction {
    /// Print the current settings
    Show,

    /// Switch provider and save the settings
    Set {
        /// mock or remote
        provider: String,

        #[arg(long)]
        model: Option<String>,

        #[arg(long)]
        api_key: Option<String>,

        #[arg(long)]
        temperature: Option<f64>,

        #[arg(long)]
        max_tokens: Option<u32>,

        /// Base URL of an OpenAI-compatible API
        #[arg(long)]
        base_url: Option<String>,
    },
}

impl From<KindArg> for promptbook_core::CellKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Markdown => Self::Markdown,
            KindArg::Computation => Self::Computation,
            KindArg::Prompt => Self::Prompt,
            KindArg::Memory => Self::Memory,
        }
    }
}

impl From<DirectionArg> for promptbook_core::MoveDirection {
    fn from(direction: DirectionArg) -> Self {
        match direction {
            DirectionArg::Up => Self::Up,
            DirectionArg::Down => Self::Down,
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        tracing_subscriber::EnvFilter::from_default_env()
            .add_directive(tracing::Level::DEBUG.into())
    } else {
        tracing_subscriber::EnvFilter::from_default_env().add_directive(tracing::Level::WARN.into())
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    // Format promptbook-core errors with recovery hints
    let format_error = |err: anyhow::Error| -> anyhow::Error {
        if let Some(core_err) = err.downcast_ref::<promptbook_core::Error>() {
            anyhow::anyhow!("{}", core_err.with_hint())
        } else {
            err
        }
    };

    let config = cli.config.as_deref();

    match cli.command {
        Commands::New { notebook, name } => {
            edit::create(&notebook, name.as_deref()).map_err(format_error)?;
        }

        Commands::Show { notebook, graph } => {
            show::execute(&notebook, graph).map_err(format_error)?;
        }

        Commands::Add {
            notebook,
            kind,
            content,
            at,
            model,
            temperature,
            max_tokens,
            response_var,
        } => {
            let prompt = promptbook_core::PromptConfig {
                model,
                temperature,
                max_tokens,
                response_var,
            };
            edit::add(&notebook, kind.into(), content, at, prompt).map_err(format_error)?;
        }

        Commands::Edit {
            notebook,
            cell,
            content,
        } => {
            edit::replace(&notebook, &cell, content).map_err(format_error)?;
        }

        Commands::Delete { notebook, cell } => {
            edit::delete(&notebook, &cell).map_err(format_error)?;
        }

        Commands::Move {
            notebook,
            cell,
            direction,
        } => {
            edit::move_cell(&notebook, &cell, direction.into()).map_err(format_error)?;
        }

        Commands::Clear { notebook } => {
            edit::clear(&notebook).map_err(format_error)?;
        }

        Commands::Run {
            notebook,
            cell,
            stop_on_error,
            provider,
            model,
            api_key,
            clear,
        } => {
            let options = run::RunOptions {
                cell,
                stop_on_error,
                provider,
                model,
                api_key,
                clear,
            };
            run::execute(&notebook, config, options).map_err(format_error)?;
        }

        Commands::Provider { action } => match action {
            ProviderAction::Show => provider::show(config).map_err(format_error)?,
            ProviderAction::Set {
                provider: kind,
                model,
                api_key,
                temperature,
                max_tokens,
                base_url,
            } => {
                let changes = provider::ProviderChanges {
                    kind,
                    model,
                    api_key,
                    temperature,
                    max_tokens,
                    base_url,
                };
                provider::set(config, changes).map_err(format_error)?;
            }
        },
    }

    Ok(())
}
