//! `{name}` substitution for prompt cells.
//!
//! Only flat names are supported. `{{` and `}}` produce literal braces, and a
//! brace group whose contents are not an identifier is copied through as text.

use crate::error::{Error, Result};
use crate::graph::is_identifier;
use crate::state::State;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Piece<'a> {
    Text(&'a str),
    Placeholder(&'a str),
}

fn pieces(template: &str) -> Vec<Piece<'_>> {
    let mut out = Vec::new();
    let mut rest = template;

    while let Some(pos) = rest.find(['{', '}']) {
        let (before, tail) = rest.split_at(pos);
        if !before.is_empty() {
            out.push(Piece::Text(before));
        }

        if tail.starts_with("{{") || tail.starts_with("}}") {
            out.push(Piece::Text(&tail[..1]));
            rest = &tail[2..];
            continue;
        }

        if tail.starts_with('{')
            && let Some(end) = tail[1..].find('}')
            && is_identifier(&tail[1..=end])
        {
            out.push(Piece::Placeholder(&tail[1..=end]));
            rest = &tail[end + 2..];
            continue;
        }

        out.push(Piece::Text(&tail[..1]));
        rest = &tail[1..];
    }

    if !rest.is_empty() {
        out.push(Piece::Text(rest));
    }
    out
}

/// Placeholder names in order of first appearance, without duplicates.
pub fn placeholders(template: &str) -> Vec<&str> {
    let mut names: Vec<&str> = Vec::new();
    for piece in pieces(template) {
        if let Piece::Placeholder(name) = piece
            && !names.contains(&name)
        {
            names.push(name);
        }
    }
    names
}

/// Substitute every placeholder with the display form of its state value.
///
/// Fails with [`Error::MissingVariable`] on the first name absent from state.
pub fn render(template: &str, state: &State) -> Result<String> {
    let mut out = String::with_capacity(template.len());
    for piece in pieces(template) {
        match piece {
            Piece::Text(text) => out.push_str(text),
            Piece::Placeholder(name) => {
                let value = state
                    .get(name)
                    .ok_or_else(|| Error::MissingVariable(name.to_string()))?;
                out.push_str(&value.to_string());
            }
        }
    }
    Ok(out)
}
