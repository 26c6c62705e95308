//! Computation cells: run a script fragment and merge what it bound.

use crate::error::Result;
use crate::graph::DependencyAnalysis;
use crate::state::{State, is_reserved_name};

use super::{CellContext, Execution, Output};

pub(super) fn execute(content: &str, state: &State, ctx: &CellContext<'_>) -> Result<Execution> {
    let outcome = ctx.executor.execute(content, state)?;
    let candidates = ctx.tracker.analyze(content, state);

    let mut next = state.clone();
    let mut analysis = DependencyAnalysis {
        dependencies: candidates.dependencies,
        ..DependencyAnalysis::default()
    };

    for (name, value) in outcome.bindings.iter() {
        if is_reserved_name(name) {
            continue;
        }
        let changed = state.get(name) != Some(value);
        if changed || candidates.produces.contains(name) {
            next.insert(name, value.clone());
            analysis.produces.insert(name.to_string());
        }
    }

    let mut outputs = Vec::new();
    if !outcome.stdout.is_empty() {
        outputs.push(Output::Stdout {
            text: outcome.stdout,
        });
    }

    Ok(Execution {
        state: Some(next),
        outputs,
        analysis,
    })
}
