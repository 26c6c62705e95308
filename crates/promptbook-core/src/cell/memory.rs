//! Memory cells: literal and expression assignments applied straight to state.
//!
//! Each line is one of:
//!
//! - `name = expr`, evaluated read-only against the state built so far;
//! - `memory.update({"key": expr, ...})`, merging a mapping with string keys;
//! - a `#` comment or blank line.
//!
//! A right-hand side that fails to evaluate is stored as its raw text. The
//! cell fails only when no assignment evaluated at all.

use crate::error::{FragmentError, Result};
use crate::graph::{is_identifier, split_assignment};
use crate::script::evaluate_expression;
use crate::state::{State, Value, is_reserved_name};

use super::{CellContext, Execution, MemoryEntry, Output};

fn update_argument(line: &str) -> Option<&str> {
    line.strip_prefix("memory.update(")?
        .trim_end_matches(';')
        .trim_end()
        .strip_suffix(')')
        .map(str::trim)
}

fn evaluate_update(source: &str, context: &State) -> std::result::Result<Vec<(String, Value)>, FragmentError> {
    match evaluate_expression(source, context)? {
        Value::Dict(entries) => entries
            .into_iter()
            .map(|(key, value)| match key {
                Value::Str(key) if is_identifier(&key) && !is_reserved_name(&key) => Ok((key, value)),
                other => Err(FragmentError::type_error(format!(
                    "memory.update() keys must be variable names, got {}",
                    other.repr()
                ))),
            })
            .collect(),
        other => Err(FragmentError::type_error(format!(
            "memory.update() expects a mapping, got {}",
            other.type_name()
        ))),
    }
}

pub(super) fn execute(content: &str, state: &State, ctx: &CellContext<'_>) -> Result<Execution> {
    let mut analysis = ctx.tracker.analyze(content, state);
    analysis.produces.clear();

    let mut next = state.clone();
    let mut entries = Vec::new();
    let mut succeeded = 0usize;
    let mut first_error: Option<FragmentError> = None;

    for (index, raw) in content.lines().enumerate() {
        let line_no = index + 1;
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        if let Some(argument) = update_argument(line) {
            match evaluate_update(argument, &next) {
                Ok(pairs) => {
                    succeeded += 1;
                    for (key, value) in pairs {
                        entries.push(MemoryEntry {
                            key: key.clone(),
                            value: value.to_string(),
                        });
                        next.insert(key, value);
                    }
                }
                Err(err) => {
                    tracing::warn!(line = line_no, error = %err, "skipping memory.update line");
                    first_error.get_or_insert(FragmentError {
                        line: Some(line_no),
                        ..err
                    });
                }
            }
            continue;
        }

        let assignment = match split_assignment(line) {
            Some(a) if a.op == "=" && is_identifier(a.target) && !is_reserved_name(a.target) => a,
            _ => {
                tracing::warn!(line = line_no, "ignoring non-assignment line in memory cell");
                continue;
            }
        };

        let value = match evaluate_expression(assignment.value, &next) {
            Ok(value) => {
                succeeded += 1;
                value
            }
            Err(err) => {
                tracing::warn!(
                    line = line_no,
                    key = assignment.target,
                    error = %err,
                    "storing raw text for memory assignment"
                );
                first_error.get_or_insert(FragmentError {
                    line: Some(line_no),
                    ..err
                });
                Value::Str(assignment.value.to_string())
            }
        };

        entries.push(MemoryEntry {
            key: assignment.target.to_string(),
            value: value.to_string(),
        });
        next.insert(assignment.target, value);
    }

    if let (0, Some(err)) = (succeeded, first_error) {
        return Err(err.into());
    }

    analysis
        .produces
        .extend(entries.iter().map(|entry| entry.key.clone()));

    let outputs = if entries.is_empty() {
        Vec::new()
    } else {
        vec![Output::MemoryUpdate { entries }]
    };

    Ok(Execution {
        state: Some(next),
        outputs,
        analysis,
    })
}
