//! Heuristic dependency tracking.
//!
//! The tracker works line by line on the raw cell text and never parses it.
//! It can miss reads hidden behind attribute or index access it does not
//! special-case, and it reports false positives when a state key is a
//! substring of an unrelated identifier. Both are part of its contract.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::script::is_keyword;
use crate::state::State;

/// State keys a cell reads and writes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyAnalysis {
    /// Keys the cell plausibly reads.
    pub dependencies: BTreeSet<String>,
    /// Keys the cell writes.
    pub produces: BTreeSet<String>,
}

/// Strategy for inferring what a cell reads and writes from its text.
///
/// The result is descriptive metadata only; execution order never depends on it.
pub trait DependencyTracker: Send + Sync {
    fn analyze(&self, content: &str, state: &State) -> DependencyAnalysis;
}

/// Line-based substring heuristic used for computation and memory cells.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicTracker;

impl DependencyTracker for HeuristicTracker {
    fn analyze(&self, content: &str, state: &State) -> DependencyAnalysis {
        let mut analysis = DependencyAnalysis::default();

        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let read_text = match split_assignment(line) {
                Some(assignment) if is_identifier(assignment.target) => {
                    analysis.produces.insert(assignment.target.to_string());
                    if assignment.op == "=" {
                        assignment.value
                    } else {
                        // Augmented assignment reads its target too.
                        line
                    }
                }
                _ => line,
            };

            analysis
                .dependencies
                .extend(referenced_keys(read_text, state));
        }

        analysis
    }
}

/// One `target op value` split of a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Assignment<'a> {
    pub target: &'a str,
    /// `=` or an augmented form such as `+=`.
    pub op: &'a str,
    pub value: &'a str,
}

/// Split a line at its first assignment token, ignoring `==`, `!=`, `<=`, `>=`
/// and anything inside string literals.
pub fn split_assignment(line: &str) -> Option<Assignment<'_>> {
    let bytes = line.as_bytes();
    let mut quote: Option<u8> = None;
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];
        if let Some(q) = quote {
            if b == b'\\' {
                i += 2;
                continue;
            }
            if b == q {
                quote = None;
            }
            i += 1;
            continue;
        }

        match b {
            b'\'' | b'"' => quote = Some(b),
            b'#' => return None,
            b'=' => {
                if bytes.get(i + 1) == Some(&b'=') {
                    i += 2;
                    continue;
                }
                let prev = if i > 0 { Some(bytes[i - 1]) } else { None };
                if matches!(prev, Some(b'!' | b'<' | b'>' | b'=')) {
                    i += 1;
                    continue;
                }
                let op_start = match prev {
                    Some(b'+' | b'-' | b'*' | b'/' | b'%') => i - 1,
                    _ => i,
                };
                return Some(Assignment {
                    target: line[..op_start].trim(),
                    op: &line[op_start..=i],
                    value: line[i + 1..].trim(),
                });
            }
            _ => {}
        }
        i += 1;
    }

    None
}

/// Whether `name` can be used as a state variable name.
pub fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    (first.is_alphabetic() || first == '_')
        && chars.all(|c| c.is_alphanumeric() || c == '_')
        && !is_keyword(name)
}

/// State keys that occur anywhere in `text`, as plain substrings.
pub fn referenced_keys<'a>(text: &'a str, state: &'a State) -> impl Iterator<Item = String> + 'a {
    state
        .keys()
        .filter(move |key| text.contains(key))
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::Value;

    fn state_with(keys: &[&str]) -> State {
        keys.iter().map(|k| (*k, Value::Int(0))).collect()
    }

    #[test]
    fn test_split_assignment() {
        let a = split_assignment("x = a == b").unwrap();
        assert_eq!((a.target, a.op, a.value), ("x", "=", "a == b"));

        let a = split_assignment("total += step").unwrap();
        assert_eq!((a.target, a.op, a.value), ("total", "+=", "step"));

        assert!(split_assignment("if a >= b {").is_none());
        assert!(split_assignment("print('a = b')").is_none());
        assert!(split_assignment("a != b").is_none());
    }

    #[test]
    fn test_analyze_reads_and_writes() {
        let state = state_with(&["price", "qty", "unused"]);
        let analysis = HeuristicTracker.analyze("# total = unused\ntotal = price * qty\n", &state);

        assert_eq!(
            analysis.dependencies,
            BTreeSet::from(["price".to_string(), "qty".to_string()])
        );
        assert_eq!(analysis.produces, BTreeSet::from(["total".to_string()]));
    }

    #[test]
    fn test_augmented_assignment_reads_target() {
        let state = state_with(&["count"]);
        let analysis = HeuristicTracker.analyze("count += 1", &state);
        assert!(analysis.dependencies.contains("count"));
        assert!(analysis.produces.contains("count"));
    }

    #[test]
    fn test_substring_false_positive_is_kept() {
        let state = state_with(&["x"]);
        let analysis = HeuristicTracker.analyze("y = max_value", &state);
        assert!(analysis.dependencies.contains("x"));
    }

    #[test]
    fn test_analysis_is_deterministic() {
        let state = state_with(&["a", "b", "c"]);
        let content = "d = a + b\ne = c\nprint(d)";
        let first = HeuristicTracker.analyze(content, &state);
        let second = HeuristicTracker.analyze(content, &state);
        assert_eq!(first, second);
    }

    #[test]
    fn test_is_identifier() {
        assert!(is_identifier("response_1"));
        assert!(is_identifier("_hidden"));
        assert!(!is_identifier("1abc"));
        assert!(!is_identifier("a-b"));
        assert!(!is_identifier("for"));
        assert!(!is_identifier(""));
    }
}
