//! Statement tree handed to the graph engine
//!
//! The tree is deliberately shallow: every statement carries its rendered source
//! text so downstream consumers can caption graph nodes without holding onto the
//! concrete syntax tree. Only condition expressions keep structure, because the
//! false-branch labels are produced by rewriting them.

use std::fmt;

/// A statement in the parsed tree
#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    /// Whole-program container
    Module { body: Vec<Stmt> },
    /// Callable-body container
    FunctionDef { name: String, body: Vec<Stmt>, text: String },
    /// Plain, augmented, and annotated assignments
    Assign { text: String },
    /// Expression statement; `is_call` marks bare call expressions
    Expr { text: String, is_call: bool },
    Pass,
    Return { text: String },
    Raise { text: String },
    Break,
    Continue,
    If { test: Expr, body: Vec<Stmt>, orelse: Vec<Stmt>, text: String },
    While { test: Expr, body: Vec<Stmt>, orelse: Vec<Stmt>, text: String },
    For { target: String, iter: String, body: Vec<Stmt>, orelse: Vec<Stmt>, text: String },
    Try { body: Vec<Stmt>, handlers: Vec<ExceptHandler>, orelse: Vec<Stmt>, finally: Vec<Stmt>, text: String },
    Match { subject: String, cases: Vec<MatchCase>, text: String },
    /// Any statement the engine treats as a plain block (class definitions,
    /// imports, with blocks, ...)
    Other { text: String },
}

impl Stmt {
    /// Rendered source text of this statement
    pub fn text(&self) -> &str {
        match self {
            Stmt::Module { .. } => "",
            Stmt::Pass => "pass",
            Stmt::Break => "break",
            Stmt::Continue => "continue",
            Stmt::FunctionDef { text, .. }
            | Stmt::Assign { text }
            | Stmt::Expr { text, .. }
            | Stmt::Return { text }
            | Stmt::Raise { text }
            | Stmt::If { text, .. }
            | Stmt::While { text, .. }
            | Stmt::For { text, .. }
            | Stmt::Try { text, .. }
            | Stmt::Match { text, .. }
            | Stmt::Other { text } => text,
        }
    }
}

/// Exception handler clause of a try block
#[derive(Debug, Clone, PartialEq)]
pub struct ExceptHandler {
    pub exception_type: Option<String>,
    pub name: Option<String>,
    pub body: Vec<Stmt>,
}

/// One arm of a match statement
#[derive(Debug, Clone, PartialEq)]
pub struct MatchCase {
    /// Rendered pattern text
    pub pattern: String,
    /// Rendered guard expression, when present
    pub guard: Option<String>,
    pub body: Vec<Stmt>,
}

/// A condition expression, structured just far enough for negation
///
/// Boolean connectives, `not`, comparisons, and boolean literals are modeled;
/// every other operand is kept as its source text and rendered verbatim.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Compare { left: Box<Expr>, ops: Vec<CmpOp>, comparators: Vec<Expr> },
    BoolOp { op: BoolOp, values: Vec<Expr> },
    Not { operand: Box<Expr> },
    Bool(bool),
    /// Any other expression, kept as source text
    Atom(String),
}

/// Boolean connectives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoolOp {
    And,
    Or,
}

impl BoolOp {
    pub fn as_str(self) -> &'static str {
        match self {
            BoolOp::And => "and",
            BoolOp::Or => "or",
        }
    }

    /// De Morgan dual
    pub fn dual(self) -> Self {
        match self {
            BoolOp::And => BoolOp::Or,
            BoolOp::Or => BoolOp::And,
        }
    }
}

/// Comparison operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    NotEq,
    Lt,
    LtE,
    Gt,
    GtE,
    Is,
    IsNot,
    In,
    NotIn,
}

impl CmpOp {
    pub fn as_str(self) -> &'static str {
        match self {
            CmpOp::Eq => "==",
            CmpOp::NotEq => "!=",
            CmpOp::Lt => "<",
            CmpOp::LtE => "<=",
            CmpOp::Gt => ">",
            CmpOp::GtE => ">=",
            CmpOp::Is => "is",
            CmpOp::IsNot => "is not",
            CmpOp::In => "in",
            CmpOp::NotIn => "not in",
        }
    }

    /// The operator whose result is the logical negation of this one
    pub fn complement(self) -> Self {
        match self {
            CmpOp::Eq => CmpOp::NotEq,
            CmpOp::NotEq => CmpOp::Eq,
            CmpOp::Lt => CmpOp::GtE,
            CmpOp::LtE => CmpOp::Gt,
            CmpOp::Gt => CmpOp::LtE,
            CmpOp::GtE => CmpOp::Lt,
            CmpOp::Is => CmpOp::IsNot,
            CmpOp::IsNot => CmpOp::Is,
            CmpOp::In => CmpOp::NotIn,
            CmpOp::NotIn => CmpOp::In,
        }
    }
}

impl Expr {
    /// Binding strength, loosest to tightest: or, and, not, comparison, atom
    fn precedence(&self) -> u8 {
        match self {
            Expr::BoolOp { op: BoolOp::Or, .. } => 1,
            Expr::BoolOp { op: BoolOp::And, .. } => 2,
            Expr::Not { .. } => 3,
            Expr::Compare { .. } => 4,
            Expr::Bool(_) | Expr::Atom(_) => 5,
        }
    }

    fn fmt_operand(&self, f: &mut fmt::Formatter<'_>, parent: u8) -> fmt::Result {
        if self.precedence() < parent {
            write!(f, "({self})")
        } else {
            write!(f, "{self}")
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Atom(text) => f.write_str(text),
            Expr::Bool(true) => f.write_str("True"),
            Expr::Bool(false) => f.write_str("False"),
            Expr::Not { operand } => {
                f.write_str("not ")?;
                operand.fmt_operand(f, self.precedence())
            }
            Expr::BoolOp { op, values } => {
                for (i, value) in values.iter().enumerate() {
                    if i > 0 {
                        write!(f, " {} ", op.as_str())?;
                    }
                    value.fmt_operand(f, self.precedence())?;
                }
                Ok(())
            }
            Expr::Compare { left, ops, comparators } => {
                left.fmt_operand(f, self.precedence())?;
                for (op, comparator) in ops.iter().zip(comparators) {
                    write!(f, " {} ", op.as_str())?;
                    comparator.fmt_operand(f, self.precedence())?;
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn atom(text: &str) -> Expr {
        Expr::Atom(text.to_string())
    }

    fn compare(left: &str, op: CmpOp, right: &str) -> Expr {
        Expr::Compare { left: Box::new(atom(left)), ops: vec![op], comparators: vec![atom(right)] }
    }

    #[test]
    fn test_render_comparison() {
        assert_eq!(compare("x", CmpOp::GtE, "10").to_string(), "x >= 10");
        assert_eq!(compare("a", CmpOp::NotIn, "items").to_string(), "a not in items");
    }

    #[test]
    fn test_render_chained_comparison() {
        let chained = Expr::Compare {
            left: Box::new(atom("a")),
            ops: vec![CmpOp::Lt, CmpOp::Lt],
            comparators: vec![atom("b"), atom("c")],
        };
        assert_eq!(chained.to_string(), "a < b < c");
    }

    #[test]
    fn test_render_bool_op_precedence() {
        let or_inside_and = Expr::BoolOp {
            op: BoolOp::And,
            values: vec![Expr::BoolOp { op: BoolOp::Or, values: vec![atom("a"), atom("b")] }, atom("c")],
        };
        assert_eq!(or_inside_and.to_string(), "(a or b) and c");

        let and_inside_or = Expr::BoolOp {
            op: BoolOp::Or,
            values: vec![Expr::BoolOp { op: BoolOp::And, values: vec![atom("a"), atom("b")] }, atom("c")],
        };
        assert_eq!(and_inside_or.to_string(), "a and b or c");
    }

    #[test]
    fn test_render_not() {
        let simple = Expr::Not { operand: Box::new(atom("flag")) };
        assert_eq!(simple.to_string(), "not flag");

        let grouped = Expr::Not {
            operand: Box::new(Expr::BoolOp { op: BoolOp::And, values: vec![atom("a"), atom("b")] }),
        };
        assert_eq!(grouped.to_string(), "not (a and b)");

        let over_comparison = Expr::Not { operand: Box::new(compare("x", CmpOp::Eq, "y")) };
        assert_eq!(over_comparison.to_string(), "not x == y");
    }
}
