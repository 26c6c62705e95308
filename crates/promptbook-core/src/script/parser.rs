//! Recursive-descent parser for the cell script language.
//!
//! Precedence, lowest first: `or`, `and`, `not`, comparisons, `+ -`,
//! `* / // %`, unary `-`, `**`, then postfix indexing and calls.

use super::ast::{BinaryOp, CompareOp, Expr, Stmt, StmtKind, UnaryOp};
use super::lexer::{Token, TokenKind, is_keyword, tokenize};
use crate::error::FragmentError;
use crate::state::Value;

/// Parse a whole fragment into statements.
pub fn parse_program(source: &str) -> Result<Vec<Stmt>, FragmentError> {
    let mut parser = Parser::new(tokenize(source)?);
    parser.program()
}

/// Parse a single expression; anything after it other than blank lines is an error.
pub fn parse_expression(source: &str) -> Result<Expr, FragmentError> {
    let mut parser = Parser::new(tokenize(source)?);
    parser.skip_newlines();
    let expr = parser.expression()?;
    parser.skip_newlines();
    if !parser.at(&TokenKind::Eof) {
        return Err(parser.unexpected("end of expression"));
    }
    Ok(expr)
}

/// Deepest nesting of blocks, brackets, prefix operators and operator
/// chains. Parsing and evaluation both recurse once per level.
const MAX_NESTING: usize = 100;

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            pos: 0,
            depth: 0,
        }
    }

    fn enter(&mut self) -> Result<(), FragmentError> {
        if self.depth >= MAX_NESTING {
            return Err(FragmentError::syntax(
                "expression nested too deeply",
                self.line(),
            ));
        }
        self.depth += 1;
        Ok(())
    }

    /// Run `parse` one nesting level deeper.
    fn nested<T>(
        &mut self,
        parse: fn(&mut Self) -> Result<T, FragmentError>,
    ) -> Result<T, FragmentError> {
        self.enter()?;
        let result = parse(self);
        self.depth -= 1;
        result
    }

    fn peek(&self) -> &TokenKind {
        &self.tokens[self.pos.min(self.tokens.len() - 1)].kind
    }

    fn line(&self) -> usize {
        self.tokens[self.pos.min(self.tokens.len() - 1)].line
    }

    fn at(&self, kind: &TokenKind) -> bool {
        self.peek() == kind
    }

    fn at_keyword(&self, word: &str) -> bool {
        matches!(self.peek(), TokenKind::Ident(w) if w == word)
    }

    fn advance(&mut self) -> TokenKind {
        let kind = self.peek().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        kind
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.at(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn eat_keyword(&mut self, word: &str) -> bool {
        if self.at_keyword(word) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: TokenKind, what: &str) -> Result<(), FragmentError> {
        if self.eat(&kind) {
            Ok(())
        } else {
            Err(self.unexpected(what))
        }
    }

    fn unexpected(&self, expected: &str) -> FragmentError {
        let found = match self.peek() {
            TokenKind::Eof => "end of input".to_string(),
            TokenKind::Newline => "end of line".to_string(),
            TokenKind::Ident(w) => format!("'{w}'"),
            TokenKind::Str(s) => format!("string '{s}'"),
            TokenKind::Int(i) => format!("number {i}"),
            TokenKind::Float(f) => format!("number {f}"),
            other => format!("{other:?}"),
        };
        FragmentError::syntax(format!("expected {expected}, found {found}"), self.line())
    }

    fn skip_newlines(&mut self) {
        while matches!(self.peek(), TokenKind::Newline) {
            self.advance();
        }
    }

    fn skip_separators(&mut self) {
        while matches!(self.peek(), TokenKind::Newline | TokenKind::Semicolon) {
            self.advance();
        }
    }

    fn identifier(&mut self, what: &str) -> Result<String, FragmentError> {
        match self.peek() {
            TokenKind::Ident(name) if !is_keyword(name) => {
                let name = name.clone();
                self.advance();
                Ok(name)
            }
            _ => Err(self.unexpected(what)),
        }
    }

    // ---------------------------------------------------------------------
    // Statements
    // ---------------------------------------------------------------------

    fn program(&mut self) -> Result<Vec<Stmt>, FragmentError> {
        let mut stmts = Vec::new();
        loop {
            self.skip_separators();
            if self.at(&TokenKind::Eof) {
                return Ok(stmts);
            }
            stmts.push(self.statement()?);
            if !matches!(
                self.peek(),
                TokenKind::Newline | TokenKind::Semicolon | TokenKind::Eof
            ) {
                return Err(self.unexpected("end of statement"));
            }
        }
    }

    fn block(&mut self) -> Result<Vec<Stmt>, FragmentError> {
        self.nested(Self::block_body)
    }

    fn block_body(&mut self) -> Result<Vec<Stmt>, FragmentError> {
        self.expect(TokenKind::LBrace, "'{' to open a block")?;
        let mut stmts = Vec::new();
        loop {
            self.skip_separators();
            if self.eat(&TokenKind::RBrace) {
                return Ok(stmts);
            }
            if self.at(&TokenKind::Eof) {
                return Err(self.unexpected("'}' to close the block"));
            }
            stmts.push(self.statement()?);
            if !matches!(
                self.peek(),
                TokenKind::Newline | TokenKind::Semicolon | TokenKind::RBrace
            ) {
                return Err(self.unexpected("end of statement"));
            }
        }
    }

    fn statement(&mut self) -> Result<Stmt, FragmentError> {
        let line = self.line();
        let kind = if self.eat_keyword("if") {
            self.if_statement()?
        } else if self.eat_keyword("for") {
            let var = self.identifier("loop variable")?;
            if !self.eat_keyword("in") {
                return Err(self.unexpected("'in'"));
            }
            let iter = self.expression()?;
            let body = self.block()?;
            StmtKind::For { var, iter, body }
        } else if self.eat_keyword("while") {
            let cond = self.expression()?;
            let body = self.block()?;
            StmtKind::While { cond, body }
        } else if self.eat_keyword("break") {
            StmtKind::Break
        } else if self.eat_keyword("continue") {
            StmtKind::Continue
        } else if self.eat_keyword("pass") {
            StmtKind::Pass
        } else {
            self.simple_statement()?
        };
        Ok(Stmt { kind, line })
    }

    fn if_statement(&mut self) -> Result<StmtKind, FragmentError> {
        let mut branches = Vec::new();
        let cond = self.expression()?;
        branches.push((cond, self.block()?));
        let mut otherwise = None;

        loop {
            // `else` may sit on the line after the closing brace.
            let checkpoint = self.pos;
            self.skip_newlines();
            if !self.eat_keyword("else") {
                self.pos = checkpoint;
                break;
            }
            if self.eat_keyword("if") {
                let cond = self.expression()?;
                branches.push((cond, self.block()?));
            } else {
                otherwise = Some(self.block()?);
                break;
            }
        }

        Ok(StmtKind::If {
            branches,
            otherwise,
        })
    }

    fn simple_statement(&mut self) -> Result<StmtKind, FragmentError> {
        let target = self.expression()?;
        let op = match self.peek() {
            TokenKind::Assign => None,
            TokenKind::PlusAssign => Some(BinaryOp::Add),
            TokenKind::MinusAssign => Some(BinaryOp::Sub),
            TokenKind::StarAssign => Some(BinaryOp::Mul),
            TokenKind::SlashAssign => Some(BinaryOp::Div),
            TokenKind::PercentAssign => Some(BinaryOp::Mod),
            _ => return Ok(StmtKind::Expr(target)),
        };
        self.advance();
        let value = self.expression()?;

        match (target, op) {
            (Expr::Name(target), None) => Ok(StmtKind::Assign { target, value }),
            (Expr::Name(target), Some(op)) => Ok(StmtKind::AugAssign { target, op, value }),
            (Expr::Index(base, index), None) => match *base {
                Expr::Name(target) => Ok(StmtKind::IndexAssign {
                    target,
                    index: *index,
                    value,
                }),
                _ => Err(FragmentError::syntax(
                    "only a named variable can be indexed on the left of '='",
                    self.line(),
                )),
            },
            _ => Err(FragmentError::syntax("cannot assign to expression", self.line())),
        }
    }

    // ---------------------------------------------------------------------
    // Expressions
    // ---------------------------------------------------------------------

    fn expression(&mut self) -> Result<Expr, FragmentError> {
        self.nested(Self::or_expr)
    }

    fn or_expr(&mut self) -> Result<Expr, FragmentError> {
        let mut left = self.and_expr()?;
        let mut links = 0;
        while self.eat_keyword("or") {
            self.enter()?;
            links += 1;
            let right = self.and_expr()?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }
        self.depth -= links;
        Ok(left)
    }

    fn and_expr(&mut self) -> Result<Expr, FragmentError> {
        let mut left = self.not_expr()?;
        let mut links = 0;
        while self.eat_keyword("and") {
            self.enter()?;
            links += 1;
            let right = self.not_expr()?;
            left = Expr::And(Box::new(left), Box::new(right));
        }
        self.depth -= links;
        Ok(left)
    }

    fn not_expr(&mut self) -> Result<Expr, FragmentError> {
        if self.eat_keyword("not") {
            let operand = self.nested(Self::not_expr)?;
            return Ok(Expr::Unary(UnaryOp::Not, Box::new(operand)));
        }
        self.comparison()
    }

    fn comparison(&mut self) -> Result<Expr, FragmentError> {
        let mut left = self.additive()?;
        let mut links = 0;
        loop {
            let op = match self.peek() {
                TokenKind::Eq => CompareOp::Eq,
                TokenKind::Ne => CompareOp::Ne,
                TokenKind::Lt => CompareOp::Lt,
                TokenKind::Le => CompareOp::Le,
                TokenKind::Gt => CompareOp::Gt,
                TokenKind::Ge => CompareOp::Ge,
                TokenKind::Ident(w) if w == "in" => CompareOp::In,
                TokenKind::Ident(w) if w == "not" => CompareOp::NotIn,
                _ => break,
            };
            if op == CompareOp::NotIn {
                let next = self.tokens.get(self.pos + 1).map(|t| &t.kind);
                if !matches!(next, Some(TokenKind::Ident(w)) if w == "in") {
                    break;
                }
                self.advance();
            }
            self.advance();
            self.enter()?;
            links += 1;
            let right = self.additive()?;
            left = Expr::Compare(op, Box::new(left), Box::new(right));
        }
        self.depth -= links;
        Ok(left)
    }

    fn additive(&mut self) -> Result<Expr, FragmentError> {
        let mut left = self.multiplicative()?;
        let mut links = 0;
        loop {
            let op = match self.peek() {
                TokenKind::Plus => BinaryOp::Add,
                TokenKind::Minus => BinaryOp::Sub,
                _ => break,
            };
            self.advance();
            self.enter()?;
            links += 1;
            let right = self.multiplicative()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
        self.depth -= links;
        Ok(left)
    }

    fn multiplicative(&mut self) -> Result<Expr, FragmentError> {
        let mut left = self.unary()?;
        let mut links = 0;
        loop {
            let op = match self.peek() {
                TokenKind::Star => BinaryOp::Mul,
                TokenKind::Slash => BinaryOp::Div,
                TokenKind::SlashSlash => BinaryOp::FloorDiv,
                TokenKind::Percent => BinaryOp::Mod,
                _ => break,
            };
            self.advance();
            self.enter()?;
            links += 1;
            let right = self.unary()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
        self.depth -= links;
        Ok(left)
    }

    fn unary(&mut self) -> Result<Expr, FragmentError> {
        if self.eat(&TokenKind::Minus) {
            let operand = self.nested(Self::unary)?;
            return Ok(match operand {
                Expr::Literal(Value::Int(i)) => Expr::Literal(Value::Int(-i)),
                Expr::Literal(Value::Float(f)) => Expr::Literal(Value::Float(-f)),
                other => Expr::Unary(UnaryOp::Neg, Box::new(other)),
            });
        }
        if self.eat(&TokenKind::Plus) {
            return self.nested(Self::unary);
        }
        self.power()
    }

    fn power(&mut self) -> Result<Expr, FragmentError> {
        let base = self.postfix()?;
        if self.eat(&TokenKind::StarStar) {
            // Right-associative, and binds tighter than a unary minus on its left.
            let exponent = self.nested(Self::unary)?;
            return Ok(Expr::Binary(BinaryOp::Pow, Box::new(base), Box::new(exponent)));
        }
        Ok(base)
    }

    fn postfix(&mut self) -> Result<Expr, FragmentError> {
        let mut expr = self.primary()?;
        let mut links = 0;
        loop {
            if matches!(self.peek(), TokenKind::LBracket | TokenKind::LParen | TokenKind::Dot) {
                self.enter()?;
                links += 1;
            }
            if self.eat(&TokenKind::LBracket) {
                self.skip_newlines();
                let index = self.expression()?;
                self.skip_newlines();
                self.expect(TokenKind::RBracket, "']'")?;
                expr = Expr::Index(Box::new(expr), Box::new(index));
            } else if self.at(&TokenKind::LParen) {
                let Expr::Name(name) = expr else {
                    return Err(FragmentError::syntax(
                        "only named functions can be called",
                        self.line(),
                    ));
                };
                self.advance();
                let args = self.arguments()?;
                expr = Expr::Call(name, args);
            } else if self.eat(&TokenKind::Dot) {
                let method = self.identifier("method name")?;
                self.expect(TokenKind::LParen, "'(' after method name")?;
                let args = self.arguments()?;
                expr = Expr::Method(Box::new(expr), method, args);
            } else {
                break;
            }
        }
        self.depth -= links;
        Ok(expr)
    }

    /// Comma-separated expressions up to the closing `)`; the `(` is already consumed.
    fn arguments(&mut self) -> Result<Vec<Expr>, FragmentError> {
        self.sequence(TokenKind::RParen, "')'")
    }

    fn sequence(&mut self, close: TokenKind, what: &str) -> Result<Vec<Expr>, FragmentError> {
        let mut items = Vec::new();
        loop {
            self.skip_newlines();
            if self.eat(&close) {
                return Ok(items);
            }
            items.push(self.expression()?);
            self.skip_newlines();
            if !self.eat(&TokenKind::Comma) {
                self.skip_newlines();
                self.expect(close, what)?;
                return Ok(items);
            }
        }
    }

    fn primary(&mut self) -> Result<Expr, FragmentError> {
        let line = self.line();
        match self.advance() {
            TokenKind::Int(i) => Ok(Expr::Literal(Value::Int(i))),
            TokenKind::Float(f) => Ok(Expr::Literal(Value::Float(f))),
            TokenKind::Str(s) => {
                // Adjacent string literals concatenate.
                let mut text = s;
                while let TokenKind::Str(next) = self.peek() {
                    text.push_str(next);
                    self.advance();
                }
                Ok(Expr::Literal(Value::Str(text)))
            }
            TokenKind::Ident(word) => match word.as_str() {
                "True" | "true" => Ok(Expr::Literal(Value::Bool(true))),
                "False" | "false" => Ok(Expr::Literal(Value::Bool(false))),
                "None" | "none" => Ok(Expr::Literal(Value::None)),
                w if is_keyword(w) => Err(FragmentError::syntax(
                    format!("unexpected keyword '{w}'"),
                    line,
                )),
                _ => Ok(Expr::Name(word)),
            },
            TokenKind::LParen => {
                self.skip_newlines();
                let expr = self.expression()?;
                self.skip_newlines();
                self.expect(TokenKind::RParen, "')'")?;
                Ok(expr)
            }
            TokenKind::LBracket => Ok(Expr::List(self.sequence(TokenKind::RBracket, "']'")?)),
            TokenKind::LBrace => self.dict_literal(),
            _ => {
                self.pos = self.pos.saturating_sub(1);
                Err(self.unexpected("an expression"))
            }
        }
    }

    fn dict_literal(&mut self) -> Result<Expr, FragmentError> {
        let mut entries = Vec::new();
        loop {
            self.skip_newlines();
            if self.eat(&TokenKind::RBrace) {
                return Ok(Expr::Dict(entries));
            }
            let key = self.expression()?;
            self.skip_newlines();
            self.expect(TokenKind::Colon, "':' in mapping literal")?;
            self.skip_newlines();
            let value = self.expression()?;
            entries.push((key, value));
            self.skip_newlines();
            if !self.eat(&TokenKind::Comma) {
                self.skip_newlines();
                self.expect(TokenKind::RBrace, "'}'")?;
                return Ok(Expr::Dict(entries));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lit(i: i64) -> Box<Expr> {
        Box::new(Expr::Literal(Value::Int(i)))
    }

    #[test]
    fn test_precedence() {
        let expr = parse_expression("1 + 2 * 3").unwrap();
        assert_eq!(
            expr,
            Expr::Binary(
                BinaryOp::Add,
                lit(1),
                Box::new(Expr::Binary(BinaryOp::Mul, lit(2), lit(3)))
            )
        );
    }

    #[test]
    fn test_power_binds_tighter_than_negation() {
        let expr = parse_expression("-x ** 2").unwrap();
        assert!(matches!(expr, Expr::Unary(UnaryOp::Neg, _)));
    }

    #[test]
    fn test_not_in() {
        let expr = parse_expression("a not in b").unwrap();
        assert!(matches!(expr, Expr::Compare(CompareOp::NotIn, _, _)));
    }

    #[test]
    fn test_assignment_forms() {
        let stmts = parse_program("x = 1\ny += 2; z[0] = 3").unwrap();
        assert_eq!(stmts.len(), 3);
        assert!(matches!(stmts[0].kind, StmtKind::Assign { .. }));
        assert!(matches!(stmts[1].kind, StmtKind::AugAssign { op: BinaryOp::Add, .. }));
        assert!(matches!(stmts[2].kind, StmtKind::IndexAssign { .. }));
        assert_eq!(stmts[1].line, 2);
    }

    #[test]
    fn test_if_else_chain_across_lines() {
        let source = "if x > 1 {\n  y = 1\n}\nelse if x > 0 {\n  y = 2\n} else {\n  y = 3\n}";
        let stmts = parse_program(source).unwrap();
        assert_eq!(stmts.len(), 1);
        let StmtKind::If {
            branches,
            otherwise,
        } = &stmts[0].kind
        else {
            panic!("expected if statement");
        };
        assert_eq!(branches.len(), 2);
        assert!(otherwise.is_some());
    }

    #[test]
    fn test_multiline_literals() {
        let stmts = parse_program("d = {\n  'a': 1,\n  'b': [1,\n 2],\n}\n").unwrap();
        assert_eq!(stmts.len(), 1);
    }

    #[test]
    fn test_invalid_assignment_target() {
        let err = parse_program("1 = x").unwrap_err();
        assert!(err.message.contains("cannot assign"));
    }

    #[test]
    fn test_trailing_garbage_is_error() {
        assert!(parse_expression("1 2").is_err());
        assert!(parse_program("x = 1 2").is_err());
    }

    fn assert_too_deep(result: Result<Vec<Stmt>, FragmentError>) {
        let err = result.unwrap_err();
        assert_eq!(err.kind, crate::error::FragmentErrorKind::Syntax);
        assert!(err.message.contains("nested too deeply"), "{}", err.message);
    }

    #[test]
    fn test_deep_nesting_is_rejected() {
        let parens = format!("x = {}1{}", "(".repeat(6000), ")".repeat(6000));
        assert_too_deep(parse_program(&parens));

        let negations = format!("x = {}1", "-".repeat(6000));
        assert_too_deep(parse_program(&negations));

        let sum = format!("x = 1{}", " + 1".repeat(6000));
        assert_too_deep(parse_program(&sum));

        let blocks = format!("{}pass{}", "if True {\n".repeat(3000), "\n}".repeat(3000));
        assert_too_deep(parse_program(&blocks));
    }

    #[test]
    fn test_moderate_nesting_is_accepted() {
        let parens = format!("x = {}1{}", "(".repeat(40), ")".repeat(40));
        let program = parse_program(&parens).unwrap();
        assert_eq!(program.len(), 1);

        let sum = format!("x = 1{}", " + 1".repeat(50));
        assert!(parse_program(&sum).is_ok());
    }
}
