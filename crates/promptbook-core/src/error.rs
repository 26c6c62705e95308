//! Error types for promptbook-core.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Result type for promptbook-core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in promptbook-core.
#[derive(Debug, Error)]
pub enum Error {
    /// A script fragment or memory expression failed to parse or run.
    #[error("fragment execution failed: {0}")]
    FragmentExecution(#[from] FragmentError),

    /// The LLM provider call failed.
    #[error("provider error: {0}")]
    Provider(#[from] ProviderError),

    /// A prompt template references a variable that is not in state.
    #[error("missing variable in state: {0}")]
    MissingVariable(String),

    /// Reading or writing the notebook document failed.
    #[error("persistence error for {}: {message}", path.display())]
    Persistence { path: PathBuf, message: String },

    /// Invalid provider or cell parameters.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Cell not found.
    #[error("cell not found: {0}")]
    CellNotFound(String),

    /// Invalid operation (e.g., moving first cell up).
    #[error("invalid operation: {0}")]
    InvalidOperation(String),
}

impl Error {
    pub(crate) fn persistence(path: impl Into<PathBuf>, message: impl ToString) -> Self {
        Error::Persistence {
            path: path.into(),
            message: message.to_string(),
        }
    }

    /// Render the error together with a recovery hint, if one applies.
    pub fn with_hint(&self) -> String {
        let hint = match self {
            Error::Provider(ProviderError::Authentication(_)) => Some(
                "check the API key (--api-key, OPENAI_API_KEY, or the config file)",
            ),
            Error::Provider(ProviderError::Network(_)) => {
                Some("check network connectivity and the provider base URL")
            }
            Error::Configuration(_) => Some("run `promptbook provider show` to inspect settings"),
            Error::Persistence { .. } => Some("check that the path exists and is writable"),
            Error::CellNotFound(_) => Some("run `promptbook show <notebook>` to list cells"),
            Error::MissingVariable(_) => {
                Some("execute the cell that defines the variable before this prompt")
            }
            _ => None,
        };

        match hint {
            Some(hint) => format!("{self}\n  hint: {hint}"),
            None => self.to_string(),
        }
    }
}

/// Failure of the LLM provider.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProviderError {
    /// Transport failure (connection refused, DNS, timeout).
    #[error("network error: {0}")]
    Network(String),

    /// Credential missing or rejected by the remote API.
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// Request parameters rejected before or by the provider.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// Remote API returned a non-success status.
    #[error("API returned status {status}: {message}")]
    Api { status: u16, message: String },

    /// Response body could not be understood.
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

/// Category of a fragment failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FragmentErrorKind {
    Syntax,
    Name,
    Type,
    Value,
    Index,
    Key,
    DivisionByZero,
    Overflow,
}

impl fmt::Display for FragmentErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            FragmentErrorKind::Syntax => "syntax error",
            FragmentErrorKind::Name => "name error",
            FragmentErrorKind::Type => "type error",
            FragmentErrorKind::Value => "value error",
            FragmentErrorKind::Index => "index error",
            FragmentErrorKind::Key => "key error",
            FragmentErrorKind::DivisionByZero => "division by zero",
            FragmentErrorKind::Overflow => "overflow",
        };
        f.write_str(label)
    }
}

/// Failure raised while parsing or running a script fragment.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{kind}: {message}{}", line.map(|l| format!(" (line {l})")).unwrap_or_default())]
pub struct FragmentError {
    pub kind: FragmentErrorKind,
    pub message: String,
    /// 1-based source line, when known.
    pub line: Option<usize>,
}

impl FragmentError {
    pub fn new(kind: FragmentErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            line: None,
        }
    }

    pub fn at_line(mut self, line: usize) -> Self {
        if self.line.is_none() {
            self.line = Some(line);
        }
        self
    }

    pub(crate) fn syntax(message: impl Into<String>, line: usize) -> Self {
        Self::new(FragmentErrorKind::Syntax, message).at_line(line)
    }

    pub(crate) fn type_error(message: impl Into<String>) -> Self {
        Self::new(FragmentErrorKind::Type, message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fragment_error_display() {
        let err = FragmentError::new(FragmentErrorKind::DivisionByZero, "division by zero").at_line(3);
        assert_eq!(err.to_string(), "division by zero: division by zero (line 3)");

        let err = FragmentError::new(FragmentErrorKind::Name, "name 'x' is not defined");
        assert_eq!(err.to_string(), "name error: name 'x' is not defined");
    }

    #[test]
    fn test_at_line_keeps_first_line() {
        let err = FragmentError::syntax("unexpected token", 2).at_line(7);
        assert_eq!(err.line, Some(2));
    }

    #[test]
    fn test_with_hint() {
        let err = Error::Provider(ProviderError::Authentication("401".into()));
        assert!(err.with_hint().contains("hint:"));

        let err = Error::InvalidOperation("cannot move".into());
        assert_eq!(err.with_hint(), "invalid operation: cannot move");
    }
}
