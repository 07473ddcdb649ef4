//! Tokenizer for expression source strings.
//!
//! Splits the source into numbers, identifiers and the operator/punctuation set
//! `+ - * / ^ ( ) ,`. Whitespace is skipped. Every token remembers the 1-based
//! column it starts at so parse errors can point into the source.

use std::fmt;

use crate::errors::ParseError;

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Number(f64),
    Ident(String),
    Plus,
    Minus,
    Star,
    Slash,
    Caret,
    LParen,
    RParen,
    Comma,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Number(n) => write!(f, "{}", n),
            TokenKind::Ident(name) => write!(f, "{}", name),
            TokenKind::Plus => write!(f, "+"),
            TokenKind::Minus => write!(f, "-"),
            TokenKind::Star => write!(f, "*"),
            TokenKind::Slash => write!(f, "/"),
            TokenKind::Caret => write!(f, "^"),
            TokenKind::LParen => write!(f, "("),
            TokenKind::RParen => write!(f, ")"),
            TokenKind::Comma => write!(f, ","),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    /// 1-based character column of the first character
    pub column: usize,
}

/// Splits `source` into tokens.
///
/// # Errors
/// Returns `ParseError::UnexpectedCharacter` for characters outside the token set
/// and `ParseError::InvalidNumber` for literals such as `1.2.3`, a lone `.` or a
/// value too large for `f64`. Only ASCII whitespace separates tokens.
pub fn tokenize(source: &str) -> Result<Vec<Token>, ParseError> {
    let chars: Vec<char> = source.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let column = i + 1;

        if c.is_ascii_whitespace() {
            i += 1;
            continue;
        }

        let kind = match c {
            '+' => TokenKind::Plus,
            '-' => TokenKind::Minus,
            '*' => TokenKind::Star,
            '/' => TokenKind::Slash,
            '^' => TokenKind::Caret,
            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            ',' => TokenKind::Comma,
            _ if c.is_ascii_digit() || c == '.' => {
                let end = scan_number(&chars, i);
                let literal: String = chars[i..end].iter().collect();
                // overflowing literals such as `1e400` are rejected, not read as inf
                let value = literal
                    .parse::<f64>()
                    .ok()
                    .filter(|v| v.is_finite())
                    .ok_or_else(|| ParseError::InvalidNumber {
                        literal: literal.clone(),
                        column,
                    })?;
                tokens.push(Token {
                    kind: TokenKind::Number(value),
                    column,
                });
                i = end;
                continue;
            }
            _ if c.is_ascii_alphabetic() || c == '_' => {
                let mut end = i + 1;
                while end < chars.len() && (chars[end].is_ascii_alphanumeric() || chars[end] == '_')
                {
                    end += 1;
                }
                tokens.push(Token {
                    kind: TokenKind::Ident(chars[i..end].iter().collect()),
                    column,
                });
                i = end;
                continue;
            }
            _ => return Err(ParseError::UnexpectedCharacter { ch: c, column }),
        };

        tokens.push(Token { kind, column });
        i += 1;
    }

    Ok(tokens)
}

/// Returns the end index of the number literal starting at `start`.
///
/// Digits and dots are consumed greedily (so `1.2.3` becomes one invalid literal).
/// An exponent marker is only taken when digits follow it, so `2e` stops before
/// the `e`.
fn scan_number(chars: &[char], start: usize) -> usize {
    let mut end = start;
    while end < chars.len() && (chars[end].is_ascii_digit() || chars[end] == '.') {
        end += 1;
    }

    if end < chars.len() && (chars[end] == 'e' || chars[end] == 'E') {
        let mut exp = end + 1;
        if exp < chars.len() && (chars[exp] == '+' || chars[exp] == '-') {
            exp += 1;
        }
        if exp < chars.len() && chars[exp].is_ascii_digit() {
            while exp < chars.len() && chars[exp].is_ascii_digit() {
                exp += 1;
            }
            end = exp;
        }
    }

    end
}
