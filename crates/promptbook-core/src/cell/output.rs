//! Execution artifacts recorded on cells.

use std::fmt;

use serde::{Deserialize, Serialize};

/// One key written by a memory cell, with its value rendered as text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryEntry {
    pub key: String,
    pub value: String,
}

/// A recorded artifact of one cell execution.
///
/// Outputs are appended on every run and never cleared implicitly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Output {
    /// Text the fragment printed.
    Stdout { text: String },
    /// Failure message for a run that ended in Error.
    Error { message: String },
    /// Rendered markdown content.
    Markdown { text: String },
    /// The exact prompt sent and the text returned, so a notebook can be
    /// inspected without calling the provider again.
    LlmResponse {
        prompt: String,
        response: String,
        #[serde(default)]
        model: String,
    },
    /// Keys a memory cell assigned.
    MemoryUpdate { entries: Vec<MemoryEntry> },
}

impl Output {
    pub fn is_error(&self) -> bool {
        matches!(self, Output::Error { .. })
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Output::Stdout { .. } => "stdout",
            Output::Error { .. } => "error",
            Output::Markdown { .. } => "markdown",
            Output::LlmResponse { .. } => "llm_response",
            Output::MemoryUpdate { .. } => "memory_update",
        }
    }
}

impl fmt::Display for Output {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Output::Stdout { text } | Output::Markdown { text } => write!(f, "{}", text.trim_end()),
            Output::Error { message } => write!(f, "error: {message}"),
            Output::LlmResponse {
                prompt,
                response,
                model,
            } => {
                writeln!(f, "prompt ({model}): {prompt}")?;
                write!(f, "response: {response}")
            }
            Output::MemoryUpdate { entries } => {
                let assigned: Vec<String> = entries
                    .iter()
                    .map(|e| format!("{} = {}", e.key, e.value))
                    .collect();
                write!(f, "memory: {}", assigned.join(", "))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_serde_tag() {
        let output = Output::LlmResponse {
            prompt: "Hello Ada".into(),
            response: "Hi".into(),
            model: "mock".into(),
        };
        let json = serde_json::to_value(&output).unwrap();
        assert_eq!(json["type"], "llm_response");
        assert_eq!(json["prompt"], "Hello Ada");

        let back: Output = serde_json::from_value(json).unwrap();
        assert_eq!(back, output);
    }

    #[test]
    fn test_llm_response_model_defaults() {
        let output: Output =
            serde_json::from_str(r#"{"type": "llm_response", "prompt": "p", "response": "r"}"#)
                .unwrap();
        assert!(matches!(output, Output::LlmResponse { ref model, .. } if model.is_empty()));
    }

    #[test]
    fn test_display() {
        let output = Output::MemoryUpdate {
            entries: vec![MemoryEntry {
                key: "goal".into(),
                value: "ship".into(),
            }],
        };
        assert_eq!(output.to_string(), "memory: goal = ship");
        assert!(Output::Error { message: "x".into() }.is_error());
    }
}
