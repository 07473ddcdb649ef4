//! Constant folding for the flattened stack IR.
//!
//! Every maximal sub-sequence that does not touch `x` collapses into a single
//! `LoadConst`. Folding evaluates with exactly the operations the runtime would use,
//! in the same order, so a folded program returns the same bits as the unfolded
//! one. There is deliberately no reassociation (`(x + 1) + 2` stays as written)
//! and no fused multiply-add, both of which would change rounding.

use crate::expr::{FlattenedExpr, LinearOp};

/// Folds all constant sub-expressions of `flattened`.
///
/// A single left-to-right pass reaches the fix-point because the sequence is in
/// postfix order: an operation is folded as soon as all of its operands are known.
pub fn optimize(flattened: FlattenedExpr) -> FlattenedExpr {
    FlattenedExpr::from_ops(fold_consts(flattened.into_ops()))
}

fn fold_consts(ops: Vec<LinearOp>) -> Vec<LinearOp> {
    use LinearOp::*;

    // The instruction stream is walked while mirroring its effect on an auxiliary
    // stack of `Option<f64>` (Some if known at compile time). A `Some` entry is
    // always produced by the most recent `LoadConst` for that slot.
    let mut out: Vec<LinearOp> = Vec::with_capacity(ops.len());
    let mut cstk: Vec<Option<f64>> = Vec::with_capacity(8);

    for op in ops {
        match op {
            LoadConst(value) => {
                out.push(op);
                cstk.push(Some(value));
            }
            LoadVar => {
                out.push(op);
                cstk.push(None);
            }

            Neg => fold_top(op, &mut out, &mut cstk, |a| -a),
            Unary(func) => fold_top(op, &mut out, &mut cstk, |a| func.apply(a)),

            Add => fold_pair(op, &mut out, &mut cstk, |a, b| a + b),
            Sub => fold_pair(op, &mut out, &mut cstk, |a, b| a - b),
            Mul => fold_pair(op, &mut out, &mut cstk, |a, b| a * b),
            Div => fold_pair(op, &mut out, &mut cstk, |a, b| a / b),
            Pow => fold_pair(op, &mut out, &mut cstk, f64::powf),
            Binary(func) => fold_pair(op, &mut out, &mut cstk, |a, b| func.apply(a, b)),
        }
    }

    out
}

fn fold_top(
    op: LinearOp,
    out: &mut Vec<LinearOp>,
    cstk: &mut [Option<f64>],
    f: impl FnOnce(f64) -> f64,
) {
    match cstk.last_mut() {
        Some(slot) => match *slot {
            Some(a) => {
                let value = f(a);
                *slot = Some(value);
                // replace the load that introduced the operand
                out.pop();
                out.push(LinearOp::LoadConst(value));
            }
            None => out.push(op),
        },
        None => out.push(op),
    }
}

fn fold_pair(
    op: LinearOp,
    out: &mut Vec<LinearOp>,
    cstk: &mut Vec<Option<f64>>,
    f: impl FnOnce(f64, f64) -> f64,
) {
    let n = cstk.len();
    if n < 2 {
        out.push(op);
        return;
    }

    match (cstk[n - 2], cstk[n - 1]) {
        (Some(a), Some(b)) => {
            let value = f(a, b);
            // drop the two producing loads
            out.truncate(out.len() - 2);
            out.push(LinearOp::LoadConst(value));
            cstk.truncate(n - 2);
            cstk.push(Some(value));
        }
        _ => {
            out.push(op);
            cstk.truncate(n - 2);
            cstk.push(None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::{BinaryOp, Expr};
    use crate::functions::{NamedConstant, UnaryFn};

    fn optimized(expr: &Expr) -> FlattenedExpr {
        optimize(expr.flatten())
    }

    #[test]
    fn test_folds_constant_subtree() {
        // pi / 2 * x
        let expr = Expr::Binary(
            BinaryOp::Mul,
            Box::new(Expr::Binary(
                BinaryOp::Div,
                Box::new(Expr::Named(NamedConstant::Pi)),
                Box::new(Expr::Const(2.0)),
            )),
            Box::new(Expr::Var),
        );
        let flat = optimized(&expr);
        assert_eq!(
            flat.ops(),
            &[
                LinearOp::LoadConst(std::f64::consts::PI / 2.0),
                LinearOp::LoadVar,
                LinearOp::Mul,
            ]
        );
    }

    #[test]
    fn test_no_reassociation() {
        // (x + 1) + 2 must keep both additions
        let expr = Expr::Binary(
            BinaryOp::Add,
            Box::new(Expr::Binary(
                BinaryOp::Add,
                Box::new(Expr::Var),
                Box::new(Expr::Const(1.0)),
            )),
            Box::new(Expr::Const(2.0)),
        );
        assert_eq!(optimized(&expr).ops().len(), 5);
    }

    #[test]
    fn test_fully_constant_expression() {
        // -sqrt(16) folds to a constant result
        let expr = Expr::Neg(Box::new(Expr::Unary(
            UnaryFn::Sqrt,
            Box::new(Expr::Const(16.0)),
        )));
        let flat = optimized(&expr);
        assert_eq!(flat.ops(), &[LinearOp::LoadConst(-4.0)]);
        assert_eq!(flat.constant_result(), Some(-4.0));
        assert_eq!(flat.max_stack(), 1);
    }

    #[test]
    fn test_domain_errors_fold_to_values() {
        let nan = Expr::Unary(UnaryFn::Sqrt, Box::new(Expr::Const(-1.0)));
        assert!(optimized(&nan).constant_result().is_some_and(f64::is_nan));

        let inf = Expr::Binary(
            BinaryOp::Div,
            Box::new(Expr::Const(1.0)),
            Box::new(Expr::Const(0.0)),
        );
        assert_eq!(optimized(&inf).constant_result(), Some(f64::INFINITY));
    }

    #[test]
    fn test_folding_preserves_bits() {
        // exp(1/3) * x ^ (e - 1) + log(10) / x
        let expr = Expr::Binary(
            BinaryOp::Add,
            Box::new(Expr::Binary(
                BinaryOp::Mul,
                Box::new(Expr::Unary(
                    UnaryFn::Exp,
                    Box::new(Expr::Binary(
                        BinaryOp::Div,
                        Box::new(Expr::Const(1.0)),
                        Box::new(Expr::Const(3.0)),
                    )),
                )),
                Box::new(Expr::Binary(
                    BinaryOp::Pow,
                    Box::new(Expr::Var),
                    Box::new(Expr::Binary(
                        BinaryOp::Sub,
                        Box::new(Expr::Named(NamedConstant::E)),
                        Box::new(Expr::Const(1.0)),
                    )),
                )),
            )),
            Box::new(Expr::Binary(
                BinaryOp::Div,
                Box::new(Expr::Unary(UnaryFn::Log, Box::new(Expr::Const(10.0)))),
                Box::new(Expr::Var),
            )),
        );
        let plain = expr.flatten();
        let folded = optimize(plain.clone());
        assert!(folded.ops().len() < plain.ops().len());
        for x in [0.001, 0.5, 1.0, 2.75, 10.0, 1234.5] {
            assert_eq!(folded.eval(x).to_bits(), plain.eval(x).to_bits());
            assert_eq!(folded.eval(x).to_bits(), expr.eval(x).to_bits());
        }
    }
}
