//! Embedded script language for computation and memory cells.
//!
//! # Architecture
//!
//! ```text
//! source ──► lexer ──► parser ──► Vec<Stmt> ──► Interpreter (Cow<State>)
//!                                                   │
//!                                                   └── (bindings, captured stdout)
//! ```
//!
//! Execution sits behind [`FragmentExecutor`] so the trust boundary is a
//! pluggable strategy: the in-process [`ScriptExecutor`] is the default, and
//! a host that wants isolation can provide its own implementation.

mod ast;
mod builtins;
mod interp;
mod lexer;
mod parser;

pub use ast::{BinaryOp, CompareOp, Expr, Stmt, StmtKind, UnaryOp};
pub use interp::{Interpreter, Mode};
pub use lexer::{KEYWORDS, is_keyword};
pub use parser::{parse_expression, parse_program};

use crate::error::FragmentError;
use crate::state::{State, Value};

/// Result of running a fragment.
#[derive(Debug, Clone, PartialEq)]
pub struct FragmentOutcome {
    /// All bindings after execution (inputs included).
    pub bindings: State,
    /// Text written by `print`.
    pub stdout: String,
}

/// Capability that runs a script fragment against input bindings.
///
/// Implementations must not modify `bindings`; on failure nothing of the
/// partial execution is observable.
pub trait FragmentExecutor: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &str;

    fn execute(&self, source: &str, bindings: &State) -> Result<FragmentOutcome, FragmentError>;
}

/// In-process tree-walking interpreter. No sandboxing, no resource limits.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScriptExecutor;

impl FragmentExecutor for ScriptExecutor {
    fn name(&self) -> &str {
        "script"
    }

    fn execute(&self, source: &str, bindings: &State) -> Result<FragmentOutcome, FragmentError> {
        let program = parse_program(source)?;
        let (bindings, stdout) = Interpreter::new(bindings, Mode::Script).run(&program)?;
        Ok(FragmentOutcome { bindings, stdout })
    }
}

/// Evaluate one expression against read-only bindings.
///
/// This is the restricted evaluator memory cells use: no statements, no
/// `print`, no mutation of the context.
pub fn evaluate_expression(source: &str, context: &State) -> Result<Value, FragmentError> {
    let expr = parse_expression(source)?;
    Interpreter::new(context, Mode::ReadOnly).eval(&expr)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FragmentErrorKind;

    #[test]
    fn test_script_executor_captures_stdout() {
        let outcome = ScriptExecutor
            .execute("print('Hello, world!')", &State::new())
            .unwrap();
        assert_eq!(outcome.stdout, "Hello, world!\n");
        assert!(outcome.bindings.is_empty());
    }

    #[test]
    fn test_script_executor_syntax_error() {
        let err = ScriptExecutor.execute("x = = 1", &State::new()).unwrap_err();
        assert_eq!(err.kind, FragmentErrorKind::Syntax);
    }

    #[test]
    fn test_evaluate_expression_reads_context() {
        let context: State = [("base", Value::Int(40))].into_iter().collect();
        assert_eq!(evaluate_expression("base + 2", &context).unwrap(), Value::Int(42));
        assert_eq!(
            evaluate_expression("[1, 'two', None]", &State::new()).unwrap(),
            Value::List(vec![Value::Int(1), Value::from("two"), Value::None])
        );
    }

    #[test]
    fn test_evaluate_expression_rejects_statements() {
        assert!(evaluate_expression("x = 1", &State::new()).is_err());
        assert!(evaluate_expression("this is not valid", &State::new()).is_err());
    }
}
