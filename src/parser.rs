//! Recursive-descent parser from tokens to the `Expr` tree.
//!
//! Precedence, lowest to highest:
//!
//! ```text
//! additive := term (('+' | '-') term)*        left-assoc
//! term     := power (('*' | '/') power)*      left-assoc
//! power    := unary ('^' power)?              right-assoc
//! unary    := ('-' | '+') unary | primary
//! primary  := NUMBER | x | CONSTANT | FUNC '(' args ')' | '(' additive ')'
//! ```
//!
//! `^` is an ordinary binary production, so any operand works on either side:
//! `(x^2)^2`, `x^(1/2)`, `2^-1` and `sin(x)^2` all parse. A leading minus belongs to
//! the base, so `-x^2` reads as `(-x)^2`.
//!
//! Two limits keep every later tree walk within a bounded stack: `MAX_DEPTH` on
//! parser recursion and `MAX_TREE_DEPTH` on the left-deep trees that long
//! `+ - * /` chains build without recursing.

use crate::errors::ParseError;
use crate::expr::{BinaryOp, Expr};
use crate::functions::{self, Entity};
use crate::lexer::{tokenize, Token, TokenKind};

/// Deepest nesting of parentheses, signs and exponent chains the parser accepts.
pub const MAX_DEPTH: usize = 256;

/// Deepest tree an operator chain such as `x + x + ... + x` may grow to.
pub const MAX_TREE_DEPTH: usize = 1024;

/// Parses `source` into an expression tree.
///
/// # Errors
/// Returns a `ParseError` for empty input, unknown identifiers, misplaced operators,
/// unbalanced parentheses, wrong argument counts or invalid number literals.
pub fn parse(source: &str) -> Result<Expr, ParseError> {
    if source.trim_matches(|c: char| c.is_ascii_whitespace()).is_empty() {
        return Err(ParseError::Empty);
    }

    let tokens = tokenize(source)?;
    let mut parser = Parser::new(&tokens);
    let expr = parser.parse_additive()?;

    match parser.peek() {
        None => Ok(expr),
        Some(token) if token.kind == TokenKind::RParen => Err(ParseError::UnmatchedParen {
            column: token.column,
        }),
        Some(token) => Err(unexpected(token, "an operator or end of expression")),
    }
}

/// Depth of `lhs op rhs` given the depth of `lhs`.
fn chain_depth(lhs_depth: usize, rhs: &Expr) -> Result<usize, ParseError> {
    let depth = 1 + lhs_depth.max(rhs.depth());
    if depth > MAX_TREE_DEPTH {
        return Err(ParseError::TooDeep {
            limit: MAX_TREE_DEPTH,
        });
    }
    Ok(depth)
}

fn unexpected(token: &Token, expected: &'static str) -> ParseError {
    ParseError::UnexpectedToken {
        found: token.kind.to_string(),
        expected,
        column: token.column,
    }
}

struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
    depth: usize,
    open_parens: usize,
}

impl<'a> Parser<'a> {
    fn new(tokens: &'a [Token]) -> Self {
        Self {
            tokens,
            pos: 0,
            depth: 0,
            open_parens: 0,
        }
    }

    fn peek(&self) -> Option<&'a Token> {
        self.tokens.get(self.pos)
    }

    fn peek_kind(&self) -> Option<&'a TokenKind> {
        self.peek().map(|t| &t.kind)
    }

    fn advance(&mut self) -> Option<&'a Token> {
        let token = self.tokens.get(self.pos);
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    /// Runs `rule` one nesting level deeper, failing past `MAX_DEPTH`.
    fn descend<T>(
        &mut self,
        rule: impl FnOnce(&mut Self) -> Result<T, ParseError>,
    ) -> Result<T, ParseError> {
        if self.depth >= MAX_DEPTH {
            return Err(ParseError::TooDeep { limit: MAX_DEPTH });
        }
        self.depth += 1;
        let result = rule(self);
        self.depth -= 1;
        result
    }

    /// Consumes the `)` closing the parenthesis opened at `open_column`.
    fn close_paren(&mut self, open_column: usize) -> Result<(), ParseError> {
        match self.advance() {
            Some(token) if token.kind == TokenKind::RParen => {
                self.open_parens -= 1;
                Ok(())
            }
            Some(token) => Err(unexpected(token, "')'")),
            None => Err(ParseError::UnclosedParen {
                column: open_column,
            }),
        }
    }

    // ── Grammar rules ──────────────────────────────────────────

    fn parse_additive(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_term()?;
        let mut depth = lhs.depth();
        loop {
            let op = match self.peek_kind() {
                Some(TokenKind::Plus) => BinaryOp::Add,
                Some(TokenKind::Minus) => BinaryOp::Sub,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_term()?;
            depth = chain_depth(depth, &rhs)?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_term(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_power()?;
        let mut depth = lhs.depth();
        loop {
            let op = match self.peek_kind() {
                Some(TokenKind::Star) => BinaryOp::Mul,
                Some(TokenKind::Slash) => BinaryOp::Div,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_power()?;
            depth = chain_depth(depth, &rhs)?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_power(&mut self) -> Result<Expr, ParseError> {
        self.descend(|p| {
            let base = p.parse_unary()?;
            if p.peek_kind() != Some(&TokenKind::Caret) {
                return Ok(base);
            }
            p.advance();
            let exponent = p.parse_power()?;
            Ok(Expr::Binary(BinaryOp::Pow, Box::new(base), Box::new(exponent)))
        })
    }

    fn parse_unary(&mut self) -> Result<Expr, ParseError> {
        match self.peek_kind() {
            Some(TokenKind::Minus) => {
                self.advance();
                self.descend(|p| Ok(Expr::Neg(Box::new(p.parse_unary()?))))
            }
            Some(TokenKind::Plus) => {
                self.advance();
                self.descend(|p| p.parse_unary())
            }
            _ => self.parse_primary(),
        }
    }

    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        let token = self.advance().ok_or(ParseError::UnexpectedEnd {
            expected: "an operand",
        })?;

        match &token.kind {
            TokenKind::Number(value) => Ok(Expr::Const(*value)),
            TokenKind::LParen => {
                self.open_parens += 1;
                let inner = self.parse_additive()?;
                self.close_paren(token.column)?;
                Ok(inner)
            }
            TokenKind::Ident(name) => self.parse_identifier(name, token.column),
            TokenKind::RParen if self.open_parens == 0 => Err(ParseError::UnmatchedParen {
                column: token.column,
            }),
            _ => Err(unexpected(token, "an operand")),
        }
    }

    fn parse_identifier(&mut self, name: &str, column: usize) -> Result<Expr, ParseError> {
        let entity = functions::lookup(name).ok_or_else(|| ParseError::UnknownIdentifier {
            name: name.to_string(),
            column,
        })?;
        let followed_by_paren = self.peek_kind() == Some(&TokenKind::LParen);

        let Some(arity) = entity.arity() else {
            if followed_by_paren {
                return Err(ParseError::MissingCall {
                    name: name.to_string(),
                    reason: "is not a function",
                    column,
                });
            }
            return Ok(match entity {
                Entity::Constant(constant) => Expr::Named(constant),
                _ => Expr::Var,
            });
        };

        if !followed_by_paren {
            return Err(ParseError::MissingCall {
                name: name.to_string(),
                reason: "must be followed by '('",
                column,
            });
        }

        let mut args = self.parse_arguments()?;
        if args.len() != arity {
            return Err(ParseError::ArgumentCount {
                name: name.to_string(),
                expected: arity,
                got: args.len(),
            });
        }

        match entity {
            Entity::Unary(func) => Ok(Expr::Unary(func, Box::new(args.remove(0)))),
            Entity::Binary(func) => {
                let rhs = args.remove(1);
                let lhs = args.remove(0);
                Ok(Expr::Binary(BinaryOp::Call(func), Box::new(lhs), Box::new(rhs)))
            }
            Entity::Variable | Entity::Constant(_) => Err(ParseError::MissingCall {
                name: name.to_string(),
                reason: "is not a function",
                column,
            }),
        }
    }

    /// Parses `'(' (additive (',' additive)*)? ')'`.
    fn parse_arguments(&mut self) -> Result<Vec<Expr>, ParseError> {
        let open_column = self.advance().map_or(0, |t| t.column);
        self.open_parens += 1;

        let mut args = Vec::new();
        if self.peek_kind() != Some(&TokenKind::RParen) {
            args.push(self.parse_additive()?);
            while self.peek_kind() == Some(&TokenKind::Comma) {
                self.advance();
                args.push(self.parse_additive()?);
            }
        }

        self.close_paren(open_column)?;
        Ok(args)
    }
}
