//! Expression module for representing compiled single-variable expressions.
//!
//! This module defines the two forms an expression takes after parsing:
//!
//! - `Expr`: the operator tree produced by the parser
//! - `FlattenedExpr`: the same tree lowered into a postfix sequence of `LinearOp`s,
//!   evaluated on a small value stack
//!
//! Both forms are immutable and evaluate as a pure function of `x`, so one compiled
//! expression can be shared across threads and evaluated concurrently.
//!
//! # Expression Tree Structure
//! The expression tree is built recursively with each node being one of:
//! - Leaf nodes: constants, named constants and the variable `x`
//! - Unary operations: negation and the named unary functions
//! - Binary operations: `+ - * /`, the `^` operator and the named binary functions
//!
//! # Evaluation Semantics
//! Evaluation never fails. Domain errors follow IEEE 754 exactly as the `f64`
//! methods do: `sqrt(-1)` is NaN, `log(0)` is `-inf`, `1/0` is `+inf`, `0/0` is NaN.
//! `Expr::eval` and `FlattenedExpr::eval` perform the same floating point operations
//! in the same order and therefore agree bit for bit.

use std::fmt;

use itertools::Itertools;

use crate::functions::{BinaryFn, NamedConstant, UnaryFn};

/// Binary operations appearing in the tree.
///
/// `Pow` is the `^` operator, `Call` is a named binary function such as `pow(a, b)`.
/// The two evaluate identically; they are kept apart so the tree prints back the
/// way it was written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
    Call(BinaryFn),
}

impl BinaryOp {
    #[inline]
    pub fn apply(self, lhs: f64, rhs: f64) -> f64 {
        match self {
            BinaryOp::Add => lhs + rhs,
            BinaryOp::Sub => lhs - rhs,
            BinaryOp::Mul => lhs * rhs,
            BinaryOp::Div => lhs / rhs,
            BinaryOp::Pow => lhs.powf(rhs),
            BinaryOp::Call(func) => func.apply(lhs, rhs),
        }
    }

    /// Operator symbol, or the function name for `Call`.
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Pow => "^",
            BinaryOp::Call(func) => func.into(),
        }
    }
}

/// An expression tree node.
///
/// The tree is built recursively using `Box<Expr>` for nested expressions.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// A constant floating point value
    Const(f64),
    /// The free variable `x`
    Var,
    /// A named constant such as `pi`
    Named(NamedConstant),
    /// Negation of an expression
    Neg(Box<Expr>),
    /// A named unary function applied to an expression
    Unary(UnaryFn, Box<Expr>),
    /// A binary operator or named binary function
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
}

impl Expr {
    /// Evaluates the tree at `x` by recursive post-order traversal.
    pub fn eval(&self, x: f64) -> f64 {
        match self {
            Expr::Const(value) => *value,
            Expr::Var => x,
            Expr::Named(constant) => constant.value(),
            Expr::Neg(inner) => -inner.eval(x),
            Expr::Unary(func, arg) => func.apply(arg.eval(x)),
            Expr::Binary(op, lhs, rhs) => {
                let l = lhs.eval(x);
                let r = rhs.eval(x);
                op.apply(l, r)
            }
        }
    }

    /// Returns true if the value of the expression depends on `x`.
    pub fn depends_on_x(&self) -> bool {
        match self {
            Expr::Var => true,
            Expr::Const(_) | Expr::Named(_) => false,
            Expr::Neg(inner) | Expr::Unary(_, inner) => inner.depends_on_x(),
            Expr::Binary(_, lhs, rhs) => lhs.depends_on_x() || rhs.depends_on_x(),
        }
    }

    /// Total number of nodes in the tree.
    pub fn node_count(&self) -> usize {
        match self {
            Expr::Const(_) | Expr::Var | Expr::Named(_) => 1,
            Expr::Neg(inner) | Expr::Unary(_, inner) => 1 + inner.node_count(),
            Expr::Binary(_, lhs, rhs) => 1 + lhs.node_count() + rhs.node_count(),
        }
    }

    /// Length of the longest root-to-leaf path.
    pub fn depth(&self) -> usize {
        match self {
            Expr::Const(_) | Expr::Var | Expr::Named(_) => 1,
            Expr::Neg(inner) | Expr::Unary(_, inner) => 1 + inner.depth(),
            Expr::Binary(_, lhs, rhs) => 1 + lhs.depth().max(rhs.depth()),
        }
    }

    /// Lowers the tree into a postfix operation sequence.
    ///
    /// Named constants become constant loads. No folding happens here; see
    /// `opt::optimize` for that.
    pub fn flatten(&self) -> FlattenedExpr {
        let mut ops = Vec::with_capacity(self.node_count());
        self.flatten_into(&mut ops);
        FlattenedExpr::from_ops(ops)
    }

    fn flatten_into(&self, ops: &mut Vec<LinearOp>) {
        match self {
            Expr::Const(value) => ops.push(LinearOp::LoadConst(*value)),
            Expr::Var => ops.push(LinearOp::LoadVar),
            Expr::Named(constant) => ops.push(LinearOp::LoadConst(constant.value())),
            Expr::Neg(inner) => {
                inner.flatten_into(ops);
                ops.push(LinearOp::Neg);
            }
            Expr::Unary(func, arg) => {
                arg.flatten_into(ops);
                ops.push(LinearOp::Unary(*func));
            }
            Expr::Binary(op, lhs, rhs) => {
                lhs.flatten_into(ops);
                rhs.flatten_into(ops);
                ops.push(LinearOp::from(*op));
            }
        }
    }
}

/// Prints a fully parenthesised form that parses back to an equivalent tree.
impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Const(value) if value.is_sign_negative() => write!(f, "({})", value),
            Expr::Const(value) => write!(f, "{}", value),
            Expr::Var => write!(f, "x"),
            Expr::Named(constant) => write!(f, "{}", constant),
            Expr::Neg(inner) => write!(f, "(-{})", inner),
            Expr::Unary(func, arg) => write!(f, "{}({})", func, arg),
            Expr::Binary(BinaryOp::Call(func), lhs, rhs) => {
                write!(f, "{}({}, {})", func, lhs, rhs)
            }
            Expr::Binary(op, lhs, rhs) => write!(f, "({} {} {})", lhs, op.symbol(), rhs),
        }
    }
}

/// Linear operation for flattened expression evaluation
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LinearOp {
    /// Load constant value
    LoadConst(f64),
    /// Load the variable `x`
    LoadVar,
    /// Negate stack top
    Neg,
    /// Add the two topmost values
    Add,
    /// Subtract stack top from the value below it
    Sub,
    /// Multiply the two topmost values
    Mul,
    /// Divide the value below stack top by stack top
    Div,
    /// Raise the value below stack top to the power of stack top
    Pow,
    /// Apply a named unary function to stack top
    Unary(UnaryFn),
    /// Apply a named binary function to the two topmost values
    Binary(BinaryFn),
}

impl LinearOp {
    /// Net change in stack height caused by the operation.
    fn stack_effect(self) -> isize {
        match self {
            LinearOp::LoadConst(_) | LinearOp::LoadVar => 1,
            LinearOp::Neg | LinearOp::Unary(_) => 0,
            LinearOp::Add
            | LinearOp::Sub
            | LinearOp::Mul
            | LinearOp::Div
            | LinearOp::Pow
            | LinearOp::Binary(_) => -1,
        }
    }
}

impl From<BinaryOp> for LinearOp {
    fn from(op: BinaryOp) -> Self {
        match op {
            BinaryOp::Add => LinearOp::Add,
            BinaryOp::Sub => LinearOp::Sub,
            BinaryOp::Mul => LinearOp::Mul,
            BinaryOp::Div => LinearOp::Div,
            BinaryOp::Pow => LinearOp::Pow,
            BinaryOp::Call(func) => LinearOp::Binary(func),
        }
    }
}

impl fmt::Display for LinearOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinearOp::LoadConst(value) => write!(f, "push {}", value),
            LinearOp::LoadVar => write!(f, "load x"),
            LinearOp::Neg => write!(f, "neg"),
            LinearOp::Add => write!(f, "add"),
            LinearOp::Sub => write!(f, "sub"),
            LinearOp::Mul => write!(f, "mul"),
            LinearOp::Div => write!(f, "div"),
            LinearOp::Pow => write!(f, "pow"),
            LinearOp::Unary(func) => write!(f, "call {}", func),
            LinearOp::Binary(func) => write!(f, "call {}", func),
        }
    }
}

/// Flattened expression representation for efficient evaluation
///
/// Only produced by `Expr::flatten` and the optimiser, so the operation sequence is
/// always well formed: every operation finds its operands on the stack and exactly
/// one value remains at the end.
#[derive(Debug, Clone, PartialEq)]
pub struct FlattenedExpr {
    ops: Vec<LinearOp>,
    max_stack: usize,
    constant_result: Option<f64>,
}

impl FlattenedExpr {
    pub(crate) fn from_ops(ops: Vec<LinearOp>) -> Self {
        let mut height = 0isize;
        let mut max_stack = 0isize;
        for op in &ops {
            height += op.stack_effect();
            max_stack = max_stack.max(height);
        }
        let constant_result = match ops.as_slice() {
            [LinearOp::LoadConst(value)] => Some(*value),
            _ => None,
        };
        Self {
            ops,
            max_stack: max_stack as usize,
            constant_result,
        }
    }

    pub(crate) fn into_ops(self) -> Vec<LinearOp> {
        self.ops
    }

    /// Linear sequence of operations
    pub fn ops(&self) -> &[LinearOp] {
        &self.ops
    }

    /// Deepest stack the sequence needs
    pub fn max_stack(&self) -> usize {
        self.max_stack
    }

    /// Pre-computed result if the expression does not depend on `x`
    pub fn constant_result(&self) -> Option<f64> {
        self.constant_result
    }

    /// Evaluates the operation sequence at `x`.
    pub fn eval(&self, x: f64) -> f64 {
        if let Some(value) = self.constant_result {
            return value;
        }
        let mut stack = Vec::with_capacity(self.max_stack);
        self.eval_with_stack(x, &mut stack)
    }

    /// Evaluates at `x` using `stack` as scratch space.
    ///
    /// The buffer is cleared first; reusing one buffer across calls avoids an
    /// allocation per evaluation in sampling loops.
    pub fn eval_with_stack(&self, x: f64, stack: &mut Vec<f64>) -> f64 {
        if let Some(value) = self.constant_result {
            return value;
        }
        stack.clear();
        for op in &self.ops {
            match *op {
                LinearOp::LoadConst(value) => stack.push(value),
                LinearOp::LoadVar => stack.push(x),
                LinearOp::Neg => apply_top(stack, |a| -a),
                LinearOp::Add => apply_pair(stack, |a, b| a + b),
                LinearOp::Sub => apply_pair(stack, |a, b| a - b),
                LinearOp::Mul => apply_pair(stack, |a, b| a * b),
                LinearOp::Div => apply_pair(stack, |a, b| a / b),
                LinearOp::Pow => apply_pair(stack, f64::powf),
                LinearOp::Unary(func) => apply_top(stack, |a| func.apply(a)),
                LinearOp::Binary(func) => apply_pair(stack, |a, b| func.apply(a, b)),
            }
        }
        stack.pop().unwrap_or(f64::NAN)
    }
}

impl fmt::Display for FlattenedExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.ops.iter().join("; "))
    }
}

#[inline]
fn apply_top(stack: &mut [f64], f: impl FnOnce(f64) -> f64) {
    if let Some(top) = stack.last_mut() {
        *top = f(*top);
    }
}

#[inline]
fn apply_pair(stack: &mut Vec<f64>, f: impl FnOnce(f64, f64) -> f64) {
    if let Some(rhs) = stack.pop() {
        if let Some(lhs) = stack.last_mut() {
            *lhs = f(*lhs, rhs);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn c(value: f64) -> Box<Expr> {
        Box::new(Expr::Const(value))
    }

    fn x() -> Box<Expr> {
        Box::new(Expr::Var)
    }

    #[test]
    fn test_eval_tree() {
        // 2*x + 3
        let expr = Expr::Binary(
            BinaryOp::Add,
            Box::new(Expr::Binary(BinaryOp::Mul, c(2.0), x())),
            c(3.0),
        );
        assert_eq!(expr.eval(5.0), 13.0);
        assert_eq!(expr.eval(0.0), 3.0);
    }

    #[test]
    fn test_domain_errors_propagate() {
        let sqrt = Expr::Unary(UnaryFn::Sqrt, x());
        assert!(sqrt.eval(-1.0).is_nan());

        let recip = Expr::Binary(BinaryOp::Div, c(1.0), x());
        assert_eq!(recip.eval(0.0), f64::INFINITY);
        assert_eq!(recip.eval(-0.0), f64::NEG_INFINITY);

        let zero_over_zero = Expr::Binary(BinaryOp::Div, x(), x());
        assert!(zero_over_zero.eval(0.0).is_nan());
    }

    #[test]
    fn test_pow_operator_and_call_agree() {
        let op = Expr::Binary(BinaryOp::Pow, x(), c(2.0));
        let call = Expr::Binary(BinaryOp::Call(BinaryFn::Pow), x(), c(2.0));
        assert_ne!(op, call);
        for value in [-3.0, -0.5, 0.0, 1.5, 7.0] {
            assert_eq!(op.eval(value).to_bits(), call.eval(value).to_bits());
        }
    }

    #[test]
    fn test_flatten_postfix_order() {
        // sin(x) * 2
        let expr = Expr::Binary(BinaryOp::Mul, Box::new(Expr::Unary(UnaryFn::Sin, x())), c(2.0));
        let flat = expr.flatten();
        assert_eq!(
            flat.ops(),
            &[
                LinearOp::LoadVar,
                LinearOp::Unary(UnaryFn::Sin),
                LinearOp::LoadConst(2.0),
                LinearOp::Mul,
            ]
        );
        assert_eq!(flat.max_stack(), 2);
        assert_eq!(flat.constant_result(), None);
    }

    #[test]
    fn test_flattened_matches_tree() {
        // (x - pi) / -(abs(x) + e)
        let expr = Expr::Binary(
            BinaryOp::Div,
            Box::new(Expr::Binary(
                BinaryOp::Sub,
                x(),
                Box::new(Expr::Named(NamedConstant::Pi)),
            )),
            Box::new(Expr::Neg(Box::new(Expr::Binary(
                BinaryOp::Add,
                Box::new(Expr::Unary(UnaryFn::Abs, x())),
                Box::new(Expr::Named(NamedConstant::E)),
            )))),
        );
        let flat = expr.flatten();
        let mut stack = Vec::new();
        for value in [-10.0, -1.25, 0.0, 0.1, 3.0, 1e6] {
            let expected = expr.eval(value);
            assert_eq!(flat.eval(value).to_bits(), expected.to_bits());
            assert_eq!(
                flat.eval_with_stack(value, &mut stack).to_bits(),
                expected.to_bits()
            );
        }
    }

    #[test]
    fn test_constant_result() {
        let flat = Expr::Const(4.0).flatten();
        assert_eq!(flat.constant_result(), Some(4.0));
        assert_eq!(flat.eval(123.0), 4.0);
    }

    #[test]
    fn test_display() {
        let expr = Expr::Binary(
            BinaryOp::Add,
            Box::new(Expr::Binary(BinaryOp::Pow, x(), c(2.0))),
            Box::new(Expr::Binary(
                BinaryOp::Call(BinaryFn::Pow),
                Box::new(Expr::Neg(x())),
                Box::new(Expr::Unary(UnaryFn::Log, Box::new(Expr::Named(NamedConstant::E)))),
            )),
        );
        assert_eq!(expr.to_string(), "((x ^ 2) + pow((-x), log(e)))");
        assert_eq!(Expr::Const(-1.5).to_string(), "(-1.5)");
    }

    #[test]
    fn test_tree_metrics() {
        // sqrt(x + 1) * x
        let expr = Expr::Binary(
            BinaryOp::Mul,
            Box::new(Expr::Unary(
                UnaryFn::Sqrt,
                Box::new(Expr::Binary(BinaryOp::Add, x(), c(1.0))),
            )),
            x(),
        );
        assert_eq!(expr.node_count(), 6);
        assert_eq!(expr.depth(), 4);
        assert!(expr.depends_on_x());
        assert!(!Expr::Named(NamedConstant::Pi).depends_on_x());
    }

    #[test]
    fn test_flattened_display() {
        let expr = Expr::Neg(Box::new(Expr::Unary(UnaryFn::Cos, x())));
        assert_eq!(expr.flatten().to_string(), "load x; call cos; neg");
    }
}
