//! Single-variable expression compiler and sampler for function graphing.
//!
//! A source string such as `"sin(x) * x^2"` is parsed once into an expression tree,
//! lowered into a constant-folded stack program, and then evaluated at as many
//! points as needed. The sampler chooses an adaptive number of points over a range
//! and drops samples where the function is undefined or infinite.
//!
//! # Features
//!
//! - Operators `+ - * / ^` with parentheses and unary minus
//! - Functions `sin, cos, tan, sqrt, log, exp, abs, pow` and constants `pi, e`
//! - Allocation-free evaluation of a compiled expression
//! - Sequential, parallel (rayon) and cancellable sampling
//! - serde request/response types for an HTTP front end
//!
//! # Example
//!
//! ```rust
//! use graph_eval::{compile, sample};
//!
//! // Compile once
//! let expr = compile("2*x + 3").unwrap();
//! assert_eq!(expr.eval(5.0), 13.0);
//!
//! // Sample over [0, 10]: 200 intervals, 201 points
//! let result = sample(&expr, 0.0, 10.0, 10);
//! assert!(result.succeeded);
//! assert_eq!(result.points.len(), 201);
//! ```

pub use errors::{ParseError, RequestError};
pub use expression::{compile, Expression};
pub use sampler::{sample, sample_source, Point, SampleResult, Sampler, SamplerConfig};
pub use wire::{calculate_graph, GraphRequest, GraphResponse};

pub mod prelude {
    pub use crate::expr::{Expr, FlattenedExpr};
    pub use crate::expression::{compile, Expression};
    pub use crate::sampler::{sample, sample_source, Point, SampleRequest, SampleResult, Sampler};
    pub use crate::wire::{calculate_graph, GraphRequest, GraphResponse};
}

/// Error types for the various failure modes
pub mod errors;
/// Expression tree and flattened stack program
pub mod expr;
/// Compiled expressions
pub mod expression;
/// Built-in functions and constants
pub mod functions;
/// Tokenizer for expression source
pub mod lexer;
/// Constant folding of flattened programs
pub mod opt;
/// Recursive-descent parser
pub mod parser;
/// Adaptive sampling over a range
pub mod sampler;
/// JSON request and response types
pub mod wire;
