//! Sequential cell executor.
//!
//! Cells run strictly in notebook order. Dependency sets are recorded for
//! display and never used to reorder or skip cells.

use std::sync::Arc;

use serde::Serialize;

use crate::cell::{CellContext, CellId, CellStatus, Output};
use crate::error::Result;
use crate::graph::{DependencyTracker, HeuristicTracker};
use crate::llm::{LlmProvider, ProviderConfig, build_provider};
use crate::notebook::{CellRef, Notebook};
use crate::script::{FragmentExecutor, ScriptExecutor};

use super::context::ExecutionCallback;

/// What "execute all" does after a cell fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionPolicy {
    /// Record the failure and go on with the next cell.
    #[default]
    ContinueOnError,
    /// Stop after the first failed cell.
    StopOnError,
}

/// Result of one cell within a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CellRun {
    pub index: usize,
    pub cell_id: CellId,
    pub status: CellStatus,
}

/// Result of executing a whole notebook.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub cells: Vec<CellRun>,
    /// The failed cell that ended the run under [`ExecutionPolicy::StopOnError`].
    pub stopped_at: Option<CellId>,
}

impl RunSummary {
    pub fn succeeded(&self) -> usize {
        self.count(CellStatus::Success)
    }

    pub fn failed(&self) -> usize {
        self.count(CellStatus::Error)
    }

    pub fn is_success(&self) -> bool {
        self.failed() == 0
    }

    fn count(&self, status: CellStatus) -> usize {
        self.cells.iter().filter(|run| run.status == status).count()
    }
}

/// Runs notebook cells against a provider, a fragment executor and a
/// dependency tracker.
///
/// The engine holds no notebook state. One notebook must not be executed
/// from two threads at once; separate notebooks are independent.
pub struct Engine {
    provider: Arc<dyn LlmProvider>,
    config: ProviderConfig,
    executor: Box<dyn FragmentExecutor>,
    tracker: Box<dyn DependencyTracker>,
    callback: Option<Box<dyn ExecutionCallback>>,
    policy: ExecutionPolicy,
}

impl Engine {
    /// Build an engine for the provider `config` describes.
    pub fn new(config: ProviderConfig, api_key: Option<&str>) -> Result<Self> {
        let provider = build_provider(&config, api_key)?;
        Ok(Self::with_provider(provider, config))
    }

    /// Use an already constructed provider. `config` supplies default
    /// sampling parameters for prompt cells.
    pub fn with_provider(provider: Arc<dyn LlmProvider>, config: ProviderConfig) -> Self {
        Self {
            provider,
            config,
            executor: Box::new(ScriptExecutor),
            tracker: Box::new(HeuristicTracker),
            callback: None,
            policy: ExecutionPolicy::default(),
        }
    }

    pub fn provider(&self) -> &dyn LlmProvider {
        self.provider.as_ref()
    }

    pub fn provider_config(&self) -> &ProviderConfig {
        &self.config
    }

    pub fn policy(&self) -> ExecutionPolicy {
        self.policy
    }

    pub fn set_policy(&mut self, policy: ExecutionPolicy) {
        self.policy = policy;
    }

    /// Set the execution callback for progress reporting.
    pub fn set_callback(&mut self, callback: impl ExecutionCallback + 'static) {
        self.callback = Some(Box::new(callback));
    }

    /// Replace the fragment executor used by computation cells.
    pub fn set_executor(&mut self, executor: impl FragmentExecutor + 'static) {
        self.executor = Box::new(executor);
    }

    pub fn set_tracker(&mut self, tracker: impl DependencyTracker + 'static) {
        self.tracker = Box::new(tracker);
    }

    /// Switch providers.
    ///
    /// The new provider is fully constructed before the old one is replaced;
    /// on error the current provider and configuration stay active.
    pub fn set_provider(&mut self, config: ProviderConfig, api_key: Option<&str>) -> Result<()> {
        let provider = build_provider(&config, api_key)?;
        tracing::info!(
            provider = provider.name(),
            model = %config.model,
            "switched provider"
        );
        self.provider = provider;
        self.config = config;
        Ok(())
    }

    /// Execute one cell.
    ///
    /// Only an unknown cell is an `Err`. A failure inside the cell is recorded
    /// on the cell as an error output and reported as [`CellStatus::Error`].
    pub fn execute_cell(&self, notebook: &mut Notebook, cell: &CellRef) -> Result<CellStatus> {
        let index = notebook.position(cell)?;
        Ok(self.run_at(notebook, index))
    }

    /// Execute every cell in stored order according to the engine's policy.
    pub fn execute_all(&self, notebook: &mut Notebook) -> RunSummary {
        let mut summary = RunSummary::default();

        for index in 0..notebook.len() {
            let status = self.run_at(notebook, index);
            let cell_id = notebook.cells()[index].id();
            summary.cells.push(CellRun {
                index,
                cell_id,
                status,
            });

            if status == CellStatus::Error && self.policy == ExecutionPolicy::StopOnError {
                tracing::debug!(cell = %cell_id, "stopping run after failed cell");
                summary.stopped_at = Some(cell_id);
                break;
            }
        }

        tracing::debug!(
            succeeded = summary.succeeded(),
            failed = summary.failed(),
            "notebook run finished"
        );
        summary
    }

    fn run_at(&self, notebook: &mut Notebook, index: usize) -> CellStatus {
        let notebook_id = notebook.id();
        let cell_id = notebook.cells()[index].id();
        let kind = notebook.cells()[index].kind();

        notebook.cell_mut(index).status = CellStatus::Running;
        if let Some(callback) = &self.callback {
            callback.on_cell_started(notebook_id, cell_id);
        }
        tracing::debug!(cell = %cell_id, %kind, "executing cell");

        let ctx = CellContext {
            executor: self.executor.as_ref(),
            tracker: self.tracker.as_ref(),
            provider: self.provider.as_ref(),
            defaults: &self.config,
        };
        let result = notebook.cells()[index].run(notebook.state(), &ctx);

        let status = match result {
            Ok(execution) => {
                if let Some(state) = execution.state {
                    notebook.replace_state(state);
                }
                let cell = notebook.cell_mut(index);
                cell.outputs.extend(execution.outputs.iter().cloned());
                cell.state_dependencies = execution.analysis.dependencies;
                cell.state_produces = execution.analysis.produces;
                cell.status = CellStatus::Success;

                if let Some(callback) = &self.callback {
                    callback.on_cell_completed(notebook_id, cell_id, &execution.outputs);
                }
                tracing::debug!(cell = %cell_id, "cell succeeded");
                CellStatus::Success
            }
            Err(error) => {
                let cell = notebook.cell_mut(index);
                cell.outputs.push(Output::Error {
                    message: error.to_string(),
                });
                cell.state_dependencies.clear();
                cell.state_produces.clear();
                cell.status = CellStatus::Error;

                if let Some(callback) = &self.callback {
                    callback.on_cell_error(notebook_id, cell_id, &error);
                }
                tracing::warn!(cell = %cell_id, %kind, %error, "cell failed");
                CellStatus::Error
            }
        };

        notebook.touch();
        status
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::with_provider(
            Arc::new(crate::llm::MockProvider::new()),
            ProviderConfig::default(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::{Cell, CellKind};
    use crate::error::{Error, ProviderError};
    use crate::execute::{EventLog, ExecutionEvent};
    use crate::llm::ProviderKind;
    use crate::state::Value;

    struct FailingProvider;

    impl LlmProvider for FailingProvider {
        fn name(&self) -> &str {
            "failing"
        }

        fn generate(
            &self,
            _prompt: &str,
            _model: &str,
            _temperature: f64,
            _max_tokens: Option<u32>,
        ) -> std::result::Result<String, ProviderError> {
            Err(ProviderError::Network("connection refused".into()))
        }

        fn available_models(&self) -> Vec<String> {
            Vec::new()
        }
    }

    #[test]
    fn test_execute_cell_success_and_failure() {
        let engine = Engine::default();
        let mut notebook = Notebook::new("t");
        notebook.add_cell(Cell::new(CellKind::Computation, "x = 2"));
        notebook.add_cell(Cell::new(CellKind::Computation, "y = x / 0"));

        assert_eq!(
            engine.execute_cell(&mut notebook, &CellRef::Index(0)).unwrap(),
            CellStatus::Success
        );
        assert_eq!(
            engine.execute_cell(&mut notebook, &CellRef::Index(1)).unwrap(),
            CellStatus::Error
        );

        assert_eq!(notebook.state().get("x"), Some(&Value::Int(2)));
        assert!(!notebook.state().contains_key("y"));
        let failed = &notebook.cells()[1];
        assert!(failed.outputs()[0].is_error());
        assert!(failed.state_produces().is_empty());
    }

    #[test]
    fn test_unknown_cell_is_an_error() {
        let engine = Engine::default();
        let mut notebook = Notebook::new("t");
        assert!(matches!(
            engine.execute_cell(&mut notebook, &CellRef::Index(0)),
            Err(Error::CellNotFound(_))
        ));
    }

    #[test]
    fn test_provider_failure_leaves_state() {
        let engine = Engine::with_provider(Arc::new(FailingProvider), ProviderConfig::default());
        let mut notebook = Notebook::new("t");
        notebook.add_cell(Cell::new(CellKind::Prompt, "hello"));

        let status = engine.execute_cell(&mut notebook, &CellRef::Index(0)).unwrap();
        assert_eq!(status, CellStatus::Error);
        assert!(notebook.state().is_empty());
        assert!(matches!(
            &notebook.cells()[0].outputs()[0],
            Output::Error { message } if message.contains("connection refused")
        ));
    }

    #[test]
    fn test_stop_on_error_policy() {
        let mut engine = Engine::default();
        engine.set_policy(ExecutionPolicy::StopOnError);

        let mut notebook = Notebook::new("t");
        let failing = notebook.add_cell(Cell::new(CellKind::Computation, "boom("));
        notebook.add_cell(Cell::new(CellKind::Computation, "after = 1"));

        let summary = engine.execute_all(&mut notebook);
        assert_eq!(summary.cells.len(), 1);
        assert_eq!(summary.stopped_at, Some(failing));
        assert_eq!(notebook.cells()[1].status(), CellStatus::Idle);
    }

    #[test]
    fn test_callback_events() {
        let log = Arc::new(EventLog::new());
        let mut engine = Engine::default();
        engine.set_callback(Arc::clone(&log));

        let mut notebook = Notebook::new("t");
        let ok = notebook.add_cell(Cell::new(CellKind::Computation, "print('hi')"));
        let bad = notebook.add_cell(Cell::new(CellKind::Computation, "nope"));
        engine.execute_all(&mut notebook);

        let events = log.events();
        assert_eq!(events.len(), 4);
        assert!(matches!(
            &events[1],
            ExecutionEvent::CellCompleted { cell_id, outputs, .. }
                if *cell_id == ok && outputs.len() == 1
        ));
        assert!(matches!(
            &events[3],
            ExecutionEvent::CellError { cell_id, .. } if *cell_id == bad
        ));
    }

    #[test]
    fn test_set_provider_is_atomic() {
        let mut engine = Engine::default();
        let remote = ProviderConfig {
            kind: ProviderKind::Remote,
            temperature: 7.0,
            ..ProviderConfig::default()
        };

        assert!(engine.set_provider(remote, Some("sk-test")).is_err());
        assert_eq!(engine.provider().name(), "mock");
        assert_eq!(engine.provider_config(), &ProviderConfig::default());
    }

    #[test]
    fn test_rerun_appends_outputs() {
        let engine = Engine::default();
        let mut notebook = Notebook::new("t");
        notebook.add_cell(Cell::new(CellKind::Markdown, "# Title"));

        engine.execute_all(&mut notebook);
        engine.execute_all(&mut notebook);
        assert_eq!(notebook.cells()[0].outputs().len(), 2);
    }
}
