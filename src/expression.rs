//! Compiled single-variable expressions.
//!
//! This module provides the `Expression` type: a source string parsed once into an
//! `Expr` tree and lowered into a constant-folded `FlattenedExpr`. Evaluation goes
//! through the flattened form and never re-parses.
//!
//! # Example
//!
//! ```
//! use graph_eval::Expression;
//!
//! let expr = Expression::new("x^2 - 2*x").unwrap();
//! assert_eq!(expr.eval(3.0), 3.0);
//! assert_eq!(expr.eval(-1.0), 3.0);
//! ```
//!
//! An `Expression` holds no mutable state. It is `Send + Sync`, so one instance can
//! be evaluated from many threads at once.

use colored::Colorize;

use crate::errors::ParseError;
use crate::expr::{Expr, FlattenedExpr};
use crate::opt::optimize;
use crate::parser::parse;

/// A parsed and compiled expression in the variable `x`.
#[derive(Clone, PartialEq)]
pub struct Expression {
    source: String,
    ast: Expr,
    flattened: FlattenedExpr,
}

impl std::fmt::Debug for Expression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "{{")?;
        writeln!(f, "    {}: {}", "Expression".cyan(), self.source)?;
        writeln!(f, "    {}: {}", "Tree".cyan(), self.ast)?;
        writeln!(f, "    {}: {}", "Program".cyan(), self.flattened)?;
        writeln!(f, "}}")?;
        Ok(())
    }
}

impl std::fmt::Display for Expression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.source)
    }
}

impl Expression {
    /// Compiles `source` into an evaluable expression.
    ///
    /// # Errors
    /// Returns a `ParseError` describing the first problem found in `source`.
    ///
    /// # Example
    /// ```
    /// # use graph_eval::Expression;
    /// let expr = Expression::new("2*x + 3").unwrap();
    /// assert_eq!(expr.eval(5.0), 13.0);
    /// assert!(Expression::new("2*y").is_err());
    /// ```
    pub fn new(source: &str) -> Result<Self, ParseError> {
        let ast = parse(source)?;
        let flattened = optimize(ast.flatten());

        log::debug!(
            "compiled '{}': {} nodes, {} ops, stack depth {}",
            source,
            ast.node_count(),
            flattened.ops().len(),
            flattened.max_stack()
        );

        Ok(Self {
            source: source.to_string(),
            ast,
            flattened,
        })
    }

    /// Evaluates the expression at `x`.
    ///
    /// Never fails: domain errors come back as NaN or ±inf.
    #[inline]
    pub fn eval(&self, x: f64) -> f64 {
        self.flattened.eval(x)
    }

    /// Evaluates at `x`, using `stack` as scratch space to avoid allocating.
    #[inline]
    pub fn eval_with_stack(&self, x: f64, stack: &mut Vec<f64>) -> f64 {
        self.flattened.eval_with_stack(x, stack)
    }

    /// Returns the original source string.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Returns the parsed expression tree.
    pub fn ast(&self) -> &Expr {
        &self.ast
    }

    /// Returns the flattened, constant-folded program used for evaluation.
    pub fn program(&self) -> &FlattenedExpr {
        &self.flattened
    }

    /// Returns true if the value does not depend on `x`.
    pub fn is_constant(&self) -> bool {
        self.flattened.constant_result().is_some()
    }
}

/// Compiles `source` into an `Expression`.
///
/// Shorthand for [`Expression::new`].
pub fn compile(source: &str) -> Result<Expression, ParseError> {
    Expression::new(source)
}
