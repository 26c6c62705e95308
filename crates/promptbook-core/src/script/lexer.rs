//! Tokenizer for the cell script language.

use crate::error::FragmentError;

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Int(i64),
    Float(f64),
    Str(String),
    Ident(String),
    Newline,
    Semicolon,
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Comma,
    Colon,
    Dot,
    Plus,
    Minus,
    Star,
    StarStar,
    Slash,
    SlashSlash,
    Percent,
    Assign,
    PlusAssign,
    MinusAssign,
    StarAssign,
    SlashAssign,
    PercentAssign,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Eof,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    /// 1-based source line.
    pub line: usize,
}

/// Words that cannot be used as variable names.
pub const KEYWORDS: &[&str] = &[
    "if", "else", "for", "in", "while", "break", "continue", "pass", "and", "or", "not", "True",
    "False", "None", "true", "false", "none",
];

pub fn is_keyword(word: &str) -> bool {
    KEYWORDS.contains(&word)
}

struct Lexer {
    chars: Vec<char>,
    pos: usize,
    line: usize,
    tokens: Vec<Token>,
}

/// Split source text into tokens, ending with a single `Eof`.
pub fn tokenize(source: &str) -> Result<Vec<Token>, FragmentError> {
    let mut lexer = Lexer {
        chars: source.chars().collect(),
        pos: 0,
        line: 1,
        tokens: Vec::new(),
    };
    lexer.run()?;
    Ok(lexer.tokens)
}

impl Lexer {
    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_next(&self) -> Option<char> {
        self.chars.get(self.pos + 1).copied()
    }

    fn push(&mut self, kind: TokenKind) {
        self.tokens.push(Token {
            kind,
            line: self.line,
        });
    }

    /// Emit `with_eq` if the next char is `=`, otherwise `plain`.
    fn push_maybe_eq(&mut self, plain: TokenKind, with_eq: TokenKind) {
        if self.peek() == Some('=') {
            self.pos += 1;
            self.push(with_eq);
        } else {
            self.push(plain);
        }
    }

    fn run(&mut self) -> Result<(), FragmentError> {
        while let Some(c) = self.peek() {
            self.pos += 1;
            match c {
                '\n' => {
                    self.push(TokenKind::Newline);
                    self.line += 1;
                }
                ' ' | '\t' | '\r' => {}
                '#' => {
                    while let Some(c) = self.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.pos += 1;
                    }
                }
                '\\' if self.peek() == Some('\n') => {
                    // Line continuation.
                    self.pos += 1;
                    self.line += 1;
                }
                ';' => self.push(TokenKind::Semicolon),
                '(' => self.push(TokenKind::LParen),
                ')' => self.push(TokenKind::RParen),
                '[' => self.push(TokenKind::LBracket),
                ']' => self.push(TokenKind::RBracket),
                '{' => self.push(TokenKind::LBrace),
                '}' => self.push(TokenKind::RBrace),
                ',' => self.push(TokenKind::Comma),
                ':' => self.push(TokenKind::Colon),
                '.' if self.peek().is_some_and(|c| c.is_ascii_digit()) => {
                    self.pos -= 1;
                    self.number()?;
                }
                '.' => self.push(TokenKind::Dot),
                '+' => self.push_maybe_eq(TokenKind::Plus, TokenKind::PlusAssign),
                '-' => self.push_maybe_eq(TokenKind::Minus, TokenKind::MinusAssign),
                '%' => self.push_maybe_eq(TokenKind::Percent, TokenKind::PercentAssign),
                '*' => {
                    if self.peek() == Some('*') {
                        self.pos += 1;
                        self.push(TokenKind::StarStar);
                    } else {
                        self.push_maybe_eq(TokenKind::Star, TokenKind::StarAssign);
                    }
                }
                '/' => {
                    if self.peek() == Some('/') {
                        self.pos += 1;
                        self.push(TokenKind::SlashSlash);
                    } else {
                        self.push_maybe_eq(TokenKind::Slash, TokenKind::SlashAssign);
                    }
                }
                '=' => self.push_maybe_eq(TokenKind::Assign, TokenKind::Eq),
                '<' => self.push_maybe_eq(TokenKind::Lt, TokenKind::Le),
                '>' => self.push_maybe_eq(TokenKind::Gt, TokenKind::Ge),
                '!' if self.peek() == Some('=') => {
                    self.pos += 1;
                    self.push(TokenKind::Ne);
                }
                '\'' | '"' => self.string(c)?,
                c if c.is_ascii_digit() => {
                    self.pos -= 1;
                    self.number()?;
                }
                c if c.is_alphabetic() || c == '_' => {
                    let start = self.pos - 1;
                    while self.peek().is_some_and(|c| c.is_alphanumeric() || c == '_') {
                        self.pos += 1;
                    }
                    let word: String = self.chars[start..self.pos].iter().collect();
                    self.push(TokenKind::Ident(word));
                }
                other => {
                    return Err(FragmentError::syntax(
                        format!("unexpected character '{other}'"),
                        self.line,
                    ));
                }
            }
        }
        self.push(TokenKind::Eof);
        Ok(())
    }

    fn string(&mut self, quote: char) -> Result<(), FragmentError> {
        let start_line = self.line;
        let mut text = String::new();
        loop {
            let Some(c) = self.peek() else {
                return Err(FragmentError::syntax("unterminated string literal", start_line));
            };
            self.pos += 1;
            match c {
                c if c == quote => break,
                '\n' => {
                    return Err(FragmentError::syntax("unterminated string literal", start_line));
                }
                '\\' => {
                    let Some(escaped) = self.peek() else {
                        return Err(FragmentError::syntax(
                            "unterminated string literal",
                            start_line,
                        ));
                    };
                    self.pos += 1;
                    match escaped {
                        'n' => text.push('\n'),
                        't' => text.push('\t'),
                        'r' => text.push('\r'),
                        '0' => text.push('\0'),
                        '\\' | '\'' | '"' => text.push(escaped),
                        other => {
                            text.push('\\');
                            text.push(other);
                        }
                    }
                }
                c => text.push(c),
            }
        }
        self.push(TokenKind::Str(text));
        Ok(())
    }

    fn number(&mut self) -> Result<(), FragmentError> {
        let start = self.pos;
        let mut is_float = false;
        while let Some(c) = self.peek() {
            match c {
                '0'..='9' | '_' => self.pos += 1,
                '.' if !is_float && self.peek_next().is_none_or(|n| n.is_ascii_digit() || !n.is_alphabetic()) => {
                    is_float = true;
                    self.pos += 1;
                }
                'e' | 'E' => {
                    let sign_or_digit = self.peek_next();
                    let has_exponent = match sign_or_digit {
                        Some('+') | Some('-') => self
                            .chars
                            .get(self.pos + 2)
                            .is_some_and(|c| c.is_ascii_digit()),
                        Some(d) => d.is_ascii_digit(),
                        None => false,
                    };
                    if !has_exponent {
                        break;
                    }
                    is_float = true;
                    self.pos += 2;
                    while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                        self.pos += 1;
                    }
                    break;
                }
                _ => break,
            }
        }

        let text: String = self.chars[start..self.pos]
            .iter()
            .filter(|&&c| c != '_')
            .collect();
        let kind = if is_float {
            text.parse::<f64>()
                .map(TokenKind::Float)
                .map_err(|_| FragmentError::syntax(format!("invalid number '{text}'"), self.line))?
        } else {
            text.parse::<i64>().map(TokenKind::Int).map_err(|_| {
                FragmentError::syntax(format!("integer literal '{text}' out of range"), self.line)
            })?
        };
        self.push(kind);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        tokenize(source).unwrap().into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn test_assignment_tokens() {
        assert_eq!(
            kinds("x += 1.5"),
            vec![
                TokenKind::Ident("x".into()),
                TokenKind::PlusAssign,
                TokenKind::Float(1.5),
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn test_comparison_and_power() {
        assert_eq!(
            kinds("a == b ** 2 != c"),
            vec![
                TokenKind::Ident("a".into()),
                TokenKind::Eq,
                TokenKind::Ident("b".into()),
                TokenKind::StarStar,
                TokenKind::Int(2),
                TokenKind::Ne,
                TokenKind::Ident("c".into()),
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn test_strings_and_comments() {
        assert_eq!(
            kinds("s = 'it\\'s' # note\n"),
            vec![
                TokenKind::Ident("s".into()),
                TokenKind::Assign,
                TokenKind::Str("it's".into()),
                TokenKind::Newline,
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn test_line_numbers() {
        let tokens = tokenize("a\nb\n\nc").unwrap();
        let c = tokens
            .iter()
            .find(|t| t.kind == TokenKind::Ident("c".into()))
            .unwrap();
        assert_eq!(c.line, 4);
    }

    #[test]
    fn test_unterminated_string() {
        let err = tokenize("x = 'abc").unwrap_err();
        assert_eq!(err.kind, crate::error::FragmentErrorKind::Syntax);
        assert_eq!(err.line, Some(1));
    }

    #[test]
    fn test_numbers() {
        assert_eq!(kinds("1_000")[0], TokenKind::Int(1000));
        assert_eq!(kinds("2e3")[0], TokenKind::Float(2000.0));
        assert_eq!(kinds(".5")[0], TokenKind::Float(0.5));
    }
}
