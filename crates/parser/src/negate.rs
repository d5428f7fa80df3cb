//! Logical negation of condition expressions
//!
//! Produces the readable false-branch labels: single-operator comparisons map to
//! their complements, boolean connectives go through De Morgan, a leading `not`
//! strips itself, and boolean literals flip. Anything else is wrapped in an
//! explicit `not`.

use crate::ast::Expr;

/// Negate a condition expression
///
/// Chained comparisons (`a < b < c`) are not rewritten operator-by-operator;
/// they take the wrapper fallback like any other opaque expression.
pub fn negate_condition(expr: &Expr) -> Expr {
    match expr {
        Expr::Compare { left, ops, comparators } if ops.len() == 1 => Expr::Compare {
            left: left.clone(),
            ops: vec![ops[0].complement()],
            comparators: comparators.clone(),
        },
        Expr::Not { operand } => (**operand).clone(),
        Expr::BoolOp { op, values } => {
            Expr::BoolOp { op: op.dual(), values: values.iter().map(negate_condition).collect() }
        }
        Expr::Bool(value) => Expr::Bool(!value),
        _ => Expr::Not { operand: Box::new(expr.clone()) },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{BoolOp, CmpOp};

    fn atom(text: &str) -> Expr {
        Expr::Atom(text.to_string())
    }

    fn compare(left: &str, op: CmpOp, right: &str) -> Expr {
        Expr::Compare { left: Box::new(atom(left)), ops: vec![op], comparators: vec![atom(right)] }
    }

    #[test]
    fn test_negate_comparison_complements() {
        assert_eq!(negate_condition(&compare("x", CmpOp::Gt, "5")).to_string(), "x <= 5");
        assert_eq!(negate_condition(&compare("x", CmpOp::Eq, "y")).to_string(), "x != y");
        assert_eq!(negate_condition(&compare("x", CmpOp::Is, "None")).to_string(), "x is not None");
        assert_eq!(negate_condition(&compare("k", CmpOp::In, "d")).to_string(), "k not in d");
    }

    #[test]
    fn test_negate_de_morgan() {
        let both = Expr::BoolOp {
            op: BoolOp::And,
            values: vec![compare("a", CmpOp::Gt, "0"), compare("b", CmpOp::Lt, "1")],
        };
        assert_eq!(negate_condition(&both).to_string(), "a <= 0 or b >= 1");

        let either = Expr::BoolOp { op: BoolOp::Or, values: vec![atom("a"), atom("b")] };
        assert_eq!(negate_condition(&either).to_string(), "not a and not b");
    }

    #[test]
    fn test_negate_strips_leading_not() {
        let negated = Expr::Not { operand: Box::new(atom("flag")) };
        assert_eq!(negate_condition(&negated), atom("flag"));
    }

    #[test]
    fn test_negate_flips_boolean_literal() {
        assert_eq!(negate_condition(&Expr::Bool(true)), Expr::Bool(false));
        assert_eq!(negate_condition(&Expr::Bool(false)), Expr::Bool(true));
    }

    #[test]
    fn test_negate_falls_back_to_wrapper() {
        assert_eq!(negate_condition(&atom("callback()")).to_string(), "not callback()");

        let chained = Expr::Compare {
            left: Box::new(atom("a")),
            ops: vec![CmpOp::Lt, CmpOp::Lt],
            comparators: vec![atom("b"), atom("c")],
        };
        assert_eq!(negate_condition(&chained).to_string(), "not a < b < c");
    }

    #[test]
    fn test_double_negation_round_trips() {
        let original = compare("x", CmpOp::LtE, "9");
        assert_eq!(negate_condition(&negate_condition(&original)), original);
    }
}
