//! Execution callbacks and the events they carry.

use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::cell::{CellId, Output};
use crate::error::Error;

/// Callback trait for execution progress reporting.
pub trait ExecutionCallback: Send + Sync {
    /// Called when a cell starts executing.
    fn on_cell_started(&self, notebook_id: Uuid, cell_id: CellId);

    /// Called when a cell completes successfully, with the outputs it appended.
    fn on_cell_completed(&self, notebook_id: Uuid, cell_id: CellId, outputs: &[Output]);

    /// Called when a cell execution fails.
    fn on_cell_error(&self, notebook_id: Uuid, cell_id: CellId, error: &Error);
}

/// Serializable form of a callback notification, for event streams.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ExecutionEvent {
    CellStarted {
        notebook_id: Uuid,
        cell_id: CellId,
    },
    CellCompleted {
        notebook_id: Uuid,
        cell_id: CellId,
        outputs: Vec<Output>,
    },
    CellError {
        notebook_id: Uuid,
        cell_id: CellId,
        message: String,
    },
}

impl ExecutionEvent {
    pub fn cell_id(&self) -> CellId {
        match self {
            ExecutionEvent::CellStarted { cell_id, .. }
            | ExecutionEvent::CellCompleted { cell_id, .. }
            | ExecutionEvent::CellError { cell_id, .. } => *cell_id,
        }
    }
}

/// Callback that records every event in order.
#[derive(Debug, Default)]
pub struct EventLog {
    events: Mutex<Vec<ExecutionEvent>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the events recorded so far.
    pub fn events(&self) -> Vec<ExecutionEvent> {
        match self.events.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn record(&self, event: ExecutionEvent) {
        if let Ok(mut guard) = self.events.lock() {
            guard.push(event);
        }
    }
}

impl ExecutionCallback for EventLog {
    fn on_cell_started(&self, notebook_id: Uuid, cell_id: CellId) {
        self.record(ExecutionEvent::CellStarted {
            notebook_id,
            cell_id,
        });
    }

    fn on_cell_completed(&self, notebook_id: Uuid, cell_id: CellId, outputs: &[Output]) {
        self.record(ExecutionEvent::CellCompleted {
            notebook_id,
            cell_id,
            outputs: outputs.to_vec(),
        });
    }

    fn on_cell_error(&self, notebook_id: Uuid, cell_id: CellId, error: &Error) {
        self.record(ExecutionEvent::CellError {
            notebook_id,
            cell_id,
            message: error.to_string(),
        });
    }
}

/// Shared logs can be handed to an engine while the caller keeps a handle.
impl<T: ExecutionCallback + ?Sized> ExecutionCallback for std::sync::Arc<T> {
    fn on_cell_started(&self, notebook_id: Uuid, cell_id: CellId) {
        (**self).on_cell_started(notebook_id, cell_id);
    }

    fn on_cell_completed(&self, notebook_id: Uuid, cell_id: CellId, outputs: &[Output]) {
        (**self).on_cell_completed(notebook_id, cell_id, outputs);
    }

    fn on_cell_error(&self, notebook_id: Uuid, cell_id: CellId, error: &Error) {
        (**self).on_cell_error(notebook_id, cell_id, error);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_log_records_in_order() {
        let log = EventLog::new();
        let notebook_id = Uuid::new_v4();
        let cell_id = CellId::new();

        log.on_cell_started(notebook_id, cell_id);
        log.on_cell_error(notebook_id, cell_id, &Error::MissingVariable("name".into()));

        let events = log.events();
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], ExecutionEvent::CellStarted { .. }));
        assert!(matches!(
            &events[1],
            ExecutionEvent::CellError { message, .. } if message.contains("name")
        ));
        assert_eq!(events[1].cell_id(), cell_id);
    }

    #[test]
    fn test_event_serde_tag() {
        let event = ExecutionEvent::CellCompleted {
            notebook_id: Uuid::nil(),
            cell_id: CellId::new(),
            outputs: vec![Output::Stdout { text: "1\n".into() }],
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "cell_completed");
        assert_eq!(json["outputs"][0]["type"], "stdout");
    }
}
