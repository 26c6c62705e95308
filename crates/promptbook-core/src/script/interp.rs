//! Tree-walking interpreter for the cell script language.

use std::borrow::Cow;

use super::ast::{Expr, Stmt, StmtKind, UnaryOp};
use super::builtins;
use crate::error::{FragmentError, FragmentErrorKind};
use crate::state::{State, Value};

/// What the interpreter is allowed to do with its bindings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Full statements; bindings may be created and modified, `print` is captured.
    Script,
    /// Expressions only, over read-only bindings, without `print`.
    ReadOnly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Normal,
    Break,
    Continue,
}

/// Interpreter over a copy-on-write view of the input bindings.
///
/// The caller's bindings are only cloned on the first write, so a read-only
/// evaluation never copies state and a failed script never touches it.
pub struct Interpreter<'a> {
    env: Cow<'a, State>,
    stdout: String,
    mode: Mode,
    loop_depth: usize,
}

impl<'a> Interpreter<'a> {
    pub fn new(bindings: &'a State, mode: Mode) -> Self {
        Self {
            env: Cow::Borrowed(bindings),
            stdout: String::new(),
            mode,
            loop_depth: 0,
        }
    }

    /// Run a program, returning the final bindings and captured output.
    pub fn run(mut self, program: &[Stmt]) -> Result<(State, String), FragmentError> {
        self.exec_block(program)?;
        Ok((self.env.into_owned(), self.stdout))
    }

    fn lookup(&self, name: &str) -> Result<&Value, FragmentError> {
        self.env.get(name).ok_or_else(|| {
            FragmentError::new(FragmentErrorKind::Name, format!("name '{name}' is not defined"))
        })
    }

    fn writable(&mut self) -> Result<&mut State, FragmentError> {
        match self.mode {
            Mode::Script => Ok(self.env.to_mut()),
            Mode::ReadOnly => Err(FragmentError::type_error(
                "bindings are read-only in this context",
            )),
        }
    }

    fn binding_mut(&mut self, name: &str) -> Result<&mut Value, FragmentError> {
        self.lookup(name)?;
        self.writable()?.get_mut(name).ok_or_else(|| {
            FragmentError::new(FragmentErrorKind::Name, format!("name '{name}' is not defined"))
        })
    }

    fn exec_block(&mut self, stmts: &[Stmt]) -> Result<Flow, FragmentError> {
        for stmt in stmts {
            let flow = self.exec(stmt).map_err(|e| e.at_line(stmt.line))?;
            if flow != Flow::Normal {
                return Ok(flow);
            }
        }
        Ok(Flow::Normal)
    }

    fn exec(&mut self, stmt: &Stmt) -> Result<Flow, FragmentError> {
        match &stmt.kind {
            StmtKind::Assign { target, value } => {
                let value = self.eval(value)?;
                self.writable()?.insert(target.as_str(), value);
            }
            StmtKind::AugAssign { target, op, value } => {
                let current = self.lookup(target)?.clone();
                let rhs = self.eval(value)?;
                let updated = builtins::binary(*op, &current, &rhs)?;
                self.writable()?.insert(target.as_str(), updated);
            }
            StmtKind::IndexAssign {
                target,
                index,
                value,
            } => {
                let key = self.eval(index)?;
                let value = self.eval(value)?;
                builtins::set_index(self.binding_mut(target)?, key, value)?;
            }
            StmtKind::Expr(expr) => {
                self.eval(expr)?;
            }
            StmtKind::If {
                branches,
                otherwise,
            } => {
                for (cond, body) in branches {
                    if self.eval(cond)?.is_truthy() {
                        return self.exec_block(body);
                    }
                }
                if let Some(body) = otherwise {
                    return self.exec_block(body);
                }
            }
            StmtKind::For { var, iter, body } => {
                let items = builtins::iterate(&self.eval(iter)?)?;
                self.loop_depth += 1;
                for item in items {
                    self.writable()?.insert(var.as_str(), item);
                    if self.exec_block(body)? == Flow::Break {
                        break;
                    }
                }
                self.loop_depth -= 1;
            }
            StmtKind::While { cond, body } => {
                self.loop_depth += 1;
                while self.eval(cond)?.is_truthy() {
                    if self.exec_block(body)? == Flow::Break {
                        break;
                    }
                }
                self.loop_depth -= 1;
            }
            StmtKind::Break | StmtKind::Continue if self.loop_depth == 0 => {
                return Err(FragmentError::new(
                    FragmentErrorKind::Syntax,
                    "'break' or 'continue' outside a loop",
                ));
            }
            StmtKind::Break => return Ok(Flow::Break),
            StmtKind::Continue => return Ok(Flow::Continue),
            StmtKind::Pass => {}
        }
        Ok(Flow::Normal)
    }

    /// Evaluate an expression against the current bindings.
    pub fn eval(&mut self, expr: &Expr) -> Result<Value, FragmentError> {
        match expr {
            Expr::Literal(value) => Ok(value.clone()),
            Expr::Name(name) => self.lookup(name).cloned(),
            Expr::List(items) => Ok(Value::List(
                items
                    .iter()
                    .map(|item| self.eval(item))
                    .collect::<Result<_, _>>()?,
            )),
            Expr::Dict(entries) => {
                let mut out: Vec<(Value, Value)> = Vec::with_capacity(entries.len());
                for (k, v) in entries {
                    let key = self.eval(k)?;
                    let value = self.eval(v)?;
                    match out.iter_mut().find(|(existing, _)| existing.loose_eq(&key)) {
                        Some((_, slot)) => *slot = value,
                        None => out.push((key, value)),
                    }
                }
                Ok(Value::Dict(out))
            }
            Expr::Unary(UnaryOp::Neg, operand) => builtins::negate(&self.eval(operand)?),
            Expr::Unary(UnaryOp::Not, operand) => Ok(Value::Bool(!self.eval(operand)?.is_truthy())),
            Expr::Binary(op, left, right) => {
                let left = self.eval(left)?;
                let right = self.eval(right)?;
                builtins::binary(*op, &left, &right)
            }
            Expr::Compare(op, left, right) => {
                let left = self.eval(left)?;
                let right = self.eval(right)?;
                Ok(Value::Bool(builtins::compare(*op, &left, &right)?))
            }
            Expr::And(left, right) => {
                let left = self.eval(left)?;
                if !left.is_truthy() {
                    return Ok(left);
                }
                self.eval(right)
            }
            Expr::Or(left, right) => {
                let left = self.eval(left)?;
                if left.is_truthy() {
                    return Ok(left);
                }
                self.eval(right)
            }
            Expr::Index(base, key) => {
                let base = self.eval(base)?;
                let key = self.eval(key)?;
                builtins::index(&base, &key)
            }
            Expr::Call(name, args) => {
                let args = args
                    .iter()
                    .map(|a| self.eval(a))
                    .collect::<Result<Vec<_>, _>>()?;
                if name == "print" {
                    return self.print(args);
                }
                builtins::call_function(name, args)
            }
            Expr::Method(receiver, name, args) => {
                let args = args
                    .iter()
                    .map(|a| self.eval(a))
                    .collect::<Result<Vec<_>, _>>()?;
                if !builtins::is_mutating_method(name) {
                    let receiver = self.eval(receiver)?;
                    return builtins::call_method(&receiver, name, &args);
                }
                match receiver.as_ref() {
                    Expr::Name(var) => {
                        builtins::call_mutating_method(self.binding_mut(var)?, name, args)
                    }
                    other => {
                        let mut temp = self.eval(other)?;
                        builtins::call_mutating_method(&mut temp, name, args)
                    }
                }
            }
        }
    }

    fn print(&mut self, args: Vec<Value>) -> Result<Value, FragmentError> {
        if self.mode == Mode::ReadOnly {
            return Err(FragmentError::new(
                FragmentErrorKind::Name,
                "print() is not available in expressions",
            ));
        }
        let line: Vec<String> = args.iter().map(Value::to_string).collect();
        self.stdout.push_str(&line.join(" "));
        self.stdout.push('\n');
        Ok(Value::None)
    }
}
