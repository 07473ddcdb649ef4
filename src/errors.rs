//! Error types for the graph-eval crate.
//!
//! - `ParseError`: the source string could not be compiled into an expression
//! - `RequestError`: a wire request was rejected before or during compilation
//!
//! Numeric domain results (NaN, ±inf) are deliberately absent: they are valid
//! evaluator outputs and are filtered by the sampler.

use thiserror::Error;

/// Errors raised while compiling an expression string.
///
/// Column numbers are 1-based character positions in the original source.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    /// The source is empty or only whitespace
    #[error("Expression is empty")]
    Empty,
    /// A character that starts no token
    #[error("Unexpected character '{ch}' at column {column}")]
    UnexpectedCharacter { ch: char, column: usize },
    /// A number literal that does not parse as f64 (e.g. `1.2.3`)
    #[error("Invalid number literal '{literal}' at column {column}")]
    InvalidNumber { literal: String, column: usize },
    /// An identifier that is neither `x`, a constant nor a function
    #[error("Unknown identifier '{name}' at column {column}")]
    UnknownIdentifier { name: String, column: usize },
    /// A token in a position the grammar does not allow
    #[error("Unexpected '{found}' at column {column}, expected {expected}")]
    UnexpectedToken {
        found: String,
        expected: &'static str,
        column: usize,
    },
    /// The source ended where an operand or `)` was required
    #[error("Unexpected end of expression, expected {expected}")]
    UnexpectedEnd { expected: &'static str },
    /// An opening parenthesis without its `)`
    #[error("Unclosed '(' at column {column}")]
    UnclosedParen { column: usize },
    /// A `)` without a matching `(`
    #[error("Unmatched ')' at column {column}")]
    UnmatchedParen { column: usize },
    /// A function called with the wrong number of arguments
    #[error("Function '{name}' expects {expected} argument(s), got {got}")]
    ArgumentCount {
        name: String,
        expected: usize,
        got: usize,
    },
    /// A function name used without a call, or a non-function followed by `(`
    #[error("'{name}' at column {column} {reason}")]
    MissingCall {
        name: String,
        reason: &'static str,
        column: usize,
    },
    /// Nesting beyond the parser's recursion limit
    #[error("Expression nests deeper than {limit} levels")]
    TooDeep { limit: usize },
}

/// Errors that reject a graph request as a whole.
#[derive(Debug, Error)]
pub enum RequestError {
    /// The `function` field is missing, empty or blank
    #[error("Function is required")]
    MissingFunction,
    /// `minX` or `maxX` is NaN or infinite
    #[error("Invalid range: minX = {min_x}, maxX = {max_x}")]
    InvalidRange { min_x: f64, max_x: f64 },
    /// `points` is below one
    #[error("Invalid point count: {0}, expected at least 1")]
    InvalidPointCount(i64),
    /// The request body is not valid JSON for a graph request
    #[error("Malformed request: {0}")]
    Json(#[from] serde_json::Error),
    /// The expression failed to compile
    #[error(transparent)]
    Parse(#[from] ParseError),
}
