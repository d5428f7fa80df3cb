//! Python parsing front end for the graph engine
//!
//! Wraps [tree_sitter] with the Python grammar and converts the concrete syntax
//! tree into the shallow statement tree the graph engine consumes. Parsing is the
//! engine's input collaborator: a source string either yields a statement tree or
//! a parse error with the location of the first syntax problem, never a partial
//! tree.

use tree_sitter::{Node, Parser, Tree};
use wayfinder_core::{ParseError, Result};

pub mod ast;
pub mod negate;

pub use ast::{BoolOp, CmpOp, ExceptHandler, Expr, MatchCase, Stmt};
pub use negate::negate_condition;

/// Python parser using [tree_sitter]
pub struct PythonParser {
    parser: Parser,
}

/// Represents a parsed Python source file
pub struct ParsedFile {
    pub tree: Tree,
    pub source: String,
}

impl PythonParser {
    pub fn new() -> Result<Self> {
        let language = tree_sitter_python::LANGUAGE;
        let mut parser = Parser::new();
        parser
            .set_language(&language.into())
            .map_err(|e| ParseError::TreeSitterError(e.to_string()))?;

        Ok(PythonParser { parser })
    }

    /// Parse Python source code into a tree
    ///
    /// Fails with a located syntax error when the source does not parse; a graph
    /// is never built from a broken tree.
    pub fn parse(&mut self, source: &str) -> Result<ParsedFile> {
        let tree = self
            .parser
            .parse(source, None)
            .ok_or_else(|| ParseError::TreeSitterError("Failed to parse source".to_string()))?;

        if tree.root_node().has_error() {
            if let Some((message, line, col)) = Self::first_syntax_error(tree.root_node()) {
                return Err(ParseError::Syntax { message, line, col }.into());
            }
        }

        Ok(ParsedFile { tree, source: source.to_string() })
    }

    /// Convert a parsed file into the statement tree
    pub fn to_tree(&self, parsed: &ParsedFile) -> Result<Stmt> {
        self.stmt_from_node(parsed.tree.root_node(), &parsed.source)
    }

    /// Parse source text straight to a statement tree
    pub fn parse_to_tree(&mut self, source: &str) -> Result<Stmt> {
        let parsed = self.parse(source)?;
        self.to_tree(&parsed)
    }

    fn first_syntax_error(node: Node) -> Option<(String, usize, usize)> {
        let position = node.start_position();
        if node.is_error() {
            return Some(("invalid syntax".to_string(), position.row + 1, position.column + 1));
        }
        if node.is_missing() {
            return Some((format!("missing {}", node.kind()), position.row + 1, position.column + 1));
        }

        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            if let Some(found) = Self::first_syntax_error(child) {
                return Some(found);
            }
        }
        None
    }

    fn span_text(&self, node: &Node, source: &str) -> Result<String> {
        let text = node.utf8_text(source.as_bytes()).map_err(|_| ParseError::InvalidUtf8)?;
        Ok(text.trim().to_string())
    }

    fn stmt_from_node(&self, node: Node, source: &str) -> Result<Stmt> {
        match node.kind() {
            "module" => Ok(Stmt::Module { body: self.extract_body(&node, source)? }),
            "function_definition" | "async_function_definition" => {
                let name = self.extract_field_text(&node, source, "name")?;
                let body_node = node
                    .child_by_field_name("body")
                    .ok_or_else(|| ParseError::MissingNode("function body".to_string()))?;
                let body = self.extract_body(&body_node, source)?;
                Ok(Stmt::FunctionDef { name, body, text: self.span_text(&node, source)? })
            }
            "decorated_definition" => {
                let mut cursor = node.walk();
                let definition = node.children(&mut cursor).find(|child| {
                    matches!(child.kind(), "function_definition" | "async_function_definition")
                });
                match definition {
                    Some(def_node) => self.stmt_from_node(def_node, source),
                    None => Ok(Stmt::Other { text: self.span_text(&node, source)? }),
                }
            }
            "expression_statement" => {
                let text = self.span_text(&node, source)?;
                match node.named_child(0).map(|child| child.kind()) {
                    Some("assignment" | "augmented_assignment") => Ok(Stmt::Assign { text }),
                    Some("call") => Ok(Stmt::Expr { text, is_call: true }),
                    _ => Ok(Stmt::Expr { text, is_call: false }),
                }
            }
            "pass_statement" => Ok(Stmt::Pass),
            "break_statement" => Ok(Stmt::Break),
            "continue_statement" => Ok(Stmt::Continue),
            "return_statement" => Ok(Stmt::Return { text: self.span_text(&node, source)? }),
            "raise_statement" => Ok(Stmt::Raise { text: self.span_text(&node, source)? }),
            "if_statement" => self.if_from_node(node, source),
            "while_statement" => {
                let test = self.condition_from_field(&node, source, "condition")?;
                let body = self.extract_field_body(&node, source, "body")?;
                let orelse = self.extract_else_clause(&node, source)?;
                Ok(Stmt::While { test, body, orelse, text: self.span_text(&node, source)? })
            }
            "for_statement" => {
                let target = self.extract_field_text(&node, source, "left")?;
                let iter = self.extract_field_text(&node, source, "right")?;
                let body = self.extract_field_body(&node, source, "body")?;
                let orelse = self.extract_else_clause(&node, source)?;
                Ok(Stmt::For { target, iter, body, orelse, text: self.span_text(&node, source)? })
            }
            "try_statement" => self.try_from_node(node, source),
            "match_statement" => self.match_from_node(node, source),
            _ => Ok(Stmt::Other { text: self.span_text(&node, source)? }),
        }
    }

    fn extract_body(&self, node: &Node, source: &str) -> Result<Vec<Stmt>> {
        let mut body = Vec::new();
        let mut cursor = node.walk();

        for child in node.children(&mut cursor) {
            if !child.is_extra() {
                body.push(self.stmt_from_node(child, source)?);
            }
        }

        Ok(body)
    }

    fn extract_field_body(&self, node: &Node, source: &str, field: &str) -> Result<Vec<Stmt>> {
        let body_node = node
            .child_by_field_name(field)
            .ok_or_else(|| ParseError::MissingNode(format!("{} field", field)))?;
        self.extract_body(&body_node, source)
    }

    fn extract_field_text(&self, node: &Node, source: &str, field: &str) -> Result<String> {
        let field_node = node
            .child_by_field_name(field)
            .ok_or_else(|| ParseError::MissingNode(format!("{} field", field)))?;
        self.span_text(&field_node, source)
    }

    /// Body of a loop's `else` clause, or empty when there is none
    fn extract_else_clause(&self, node: &Node, source: &str) -> Result<Vec<Stmt>> {
        let else_body = node
            .child_by_field_name("alternative")
            .and_then(|alt| if alt.kind() == "else_clause" { alt.child_by_field_name("body") } else { Some(alt) });

        match else_body {
            Some(body_node) => self.extract_body(&body_node, source),
            None => Ok(Vec::new()),
        }
    }

    fn if_from_node(&self, node: Node, source: &str) -> Result<Stmt> {
        let test = self.condition_from_field(&node, source, "condition")?;
        let body = self.extract_field_body(&node, source, "consequence")?;

        let mut elif_parts = Vec::new();
        let mut else_body = Vec::new();

        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            match child.kind() {
                "elif_clause" => {
                    let elif_test = self.condition_from_field(&child, source, "condition")?;
                    let elif_body = self.extract_field_body(&child, source, "consequence")?;
                    elif_parts.push((elif_test, elif_body, self.span_text(&child, source)?));
                }
                "else_clause" => {
                    if let Some(else_block) = child.child_by_field_name("body") {
                        else_body = self.extract_body(&else_block, source)?;
                    }
                }
                _ => {}
            }
        }

        // elif chains become nested ifs in the else position, as in `ast.If`
        let mut orelse = else_body;
        for (elif_test, elif_body, elif_text) in elif_parts.into_iter().rev() {
            orelse = vec![Stmt::If { test: elif_test, body: elif_body, orelse, text: elif_text }];
        }

        Ok(Stmt::If { test, body, orelse, text: self.span_text(&node, source)? })
    }

    fn try_from_node(&self, node: Node, source: &str) -> Result<Stmt> {
        let body = self.extract_field_body(&node, source, "body")?;

        let mut handlers = Vec::new();
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            if child.kind() == "except_clause" {
                handlers.push(self.except_handler_from_node(&child, source)?);
            }
        }

        let orelse = self.extract_clause_body(&node, "else_clause", source)?;
        let finally = self.extract_clause_body(&node, "finally_clause", source)?;

        Ok(Stmt::Try { body, handlers, orelse, finally, text: self.span_text(&node, source)? })
    }

    fn extract_clause_body(&self, node: &Node, clause_kind: &str, source: &str) -> Result<Vec<Stmt>> {
        let mut cursor = node.walk();
        if let Some(clause) = node.children(&mut cursor).find(|n| n.kind() == clause_kind) {
            if let Some(body) = clause.child_by_field_name("body") {
                return self.extract_body(&body, source);
            }

            let mut clause_cursor = clause.walk();
            if let Some(block) = clause.children(&mut clause_cursor).find(|n| n.kind() == "block") {
                return self.extract_body(&block, source);
            }
        }

        Ok(Vec::new())
    }

    fn except_handler_from_node(&self, node: &Node, source: &str) -> Result<ExceptHandler> {
        let mut exception_type = None;
        let mut name = None;
        let mut body = Vec::new();

        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            if child.is_extra() {
                continue;
            }
            match child.kind() {
                // `except ValueError as e`
                "as_pattern" => {
                    if let Some(value) = child.child(0) {
                        exception_type = Some(self.span_text(&value, source)?);
                    }
                    let mut pattern_cursor = child.walk();
                    for part in child.children(&mut pattern_cursor) {
                        if part.kind() == "as_pattern_target" {
                            name = Some(self.span_text(&part, source)?);
                        }
                    }
                }
                "block" => body = self.extract_body(&child, source)?,
                _ if child.is_named() => {
                    if exception_type.is_none() {
                        exception_type = Some(self.span_text(&child, source)?);
                    }
                }
                _ => {}
            }
        }

        Ok(ExceptHandler { exception_type, name, body })
    }

    fn match_from_node(&self, node: Node, source: &str) -> Result<Stmt> {
        let mut cursor = node.walk();
        let subjects: Vec<String> = node
            .children_by_field_name("subject", &mut cursor)
            .map(|subject| self.span_text(&subject, source))
            .collect::<Result<_>>()?;
        let subject = subjects.join(", ");

        let mut cases = Vec::new();
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            if child.kind() == "block" {
                let mut block_cursor = child.walk();
                for case_node in child.children(&mut block_cursor) {
                    if case_node.kind() == "case_clause" {
                        cases.push(self.case_from_node(&case_node, source)?);
                    }
                }
            }
        }

        Ok(Stmt::Match { subject, cases, text: self.span_text(&node, source)? })
    }

    fn case_from_node(&self, node: &Node, source: &str) -> Result<MatchCase> {
        let mut patterns = Vec::new();
        let mut guard = None;
        let mut body = Vec::new();

        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            match child.kind() {
                "case_pattern" => patterns.push(self.span_text(&child, source)?),
                "if_clause" => {
                    if let Some(cond) = child.named_child(0) {
                        guard = Some(self.span_text(&cond, source)?);
                    }
                }
                "block" => body = self.extract_body(&child, source)?,
                _ => {}
            }
        }

        Ok(MatchCase { pattern: patterns.join(", "), guard, body })
    }

    fn condition_from_field(&self, node: &Node, source: &str, field: &str) -> Result<Expr> {
        let condition = node
            .child_by_field_name(field)
            .ok_or_else(|| ParseError::MissingNode(format!("{} field", field)))?;
        self.condition_from_node(condition, source)
    }

    /// Convert a test expression, keeping only the boolean skeleton structured
    fn condition_from_node(&self, node: Node, source: &str) -> Result<Expr> {
        match node.kind() {
            "parenthesized_expression" => match node.named_child(0) {
                Some(inner) => self.condition_from_node(inner, source),
                None => Ok(Expr::Atom(self.span_text(&node, source)?)),
            },
            "boolean_operator" => {
                let op = {
                    let mut cursor = node.walk();
                    match node.children(&mut cursor).find(|n| n.kind() == "and" || n.kind() == "or") {
                        Some(token) if token.kind() == "and" => BoolOp::And,
                        Some(_) => BoolOp::Or,
                        None => return Ok(Expr::Atom(self.span_text(&node, source)?)),
                    }
                };

                let left_node = node
                    .child_by_field_name("left")
                    .ok_or_else(|| ParseError::MissingNode("boolean operator left operand".to_string()))?;
                let right_node = node
                    .child_by_field_name("right")
                    .ok_or_else(|| ParseError::MissingNode("boolean operator right operand".to_string()))?;

                // flatten same-operator chains the way `ast.BoolOp` does
                let mut values = Vec::new();
                for side in [self.condition_from_node(left_node, source)?, self.condition_from_node(right_node, source)?]
                {
                    match side {
                        Expr::BoolOp { op: inner, values: mut inner_values } if inner == op => {
                            values.append(&mut inner_values)
                        }
                        other => values.push(other),
                    }
                }

                Ok(Expr::BoolOp { op, values })
            }
            "not_operator" => {
                let operand = node
                    .child_by_field_name("argument")
                    .ok_or_else(|| ParseError::MissingNode("not operand".to_string()))?;
                Ok(Expr::Not { operand: Box::new(self.condition_from_node(operand, source)?) })
            }
            "comparison_operator" => self.comparison_from_node(node, source),
            "true" => Ok(Expr::Bool(true)),
            "false" => Ok(Expr::Bool(false)),
            _ => Ok(Expr::Atom(self.span_text(&node, source)?)),
        }
    }

    fn comparison_from_node(&self, node: Node, source: &str) -> Result<Expr> {
        let mut operands = Vec::new();
        let mut op_tokens = Vec::new();

        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            if child.is_extra() {
                continue;
            }
            if child.is_named() {
                operands.push(Expr::Atom(self.span_text(&child, source)?));
            } else if Self::is_compare_token(child.kind()) {
                op_tokens.push(child.kind());
            }
        }

        let mut ops = Vec::new();
        let mut index = 0;
        while index < op_tokens.len() {
            let op = match (op_tokens[index], op_tokens.get(index + 1).copied()) {
                ("is", Some("not")) => {
                    index += 1;
                    CmpOp::IsNot
                }
                ("not", Some("in")) => {
                    index += 1;
                    CmpOp::NotIn
                }
                ("==", _) => CmpOp::Eq,
                ("!=", _) | ("<>", _) => CmpOp::NotEq,
                ("<", _) => CmpOp::Lt,
                ("<=", _) => CmpOp::LtE,
                (">", _) => CmpOp::Gt,
                (">=", _) => CmpOp::GtE,
                ("is", _) => CmpOp::Is,
                ("in", _) => CmpOp::In,
                // a stray token means the shape is something we do not model
                _ => return Ok(Expr::Atom(self.span_text(&node, source)?)),
            };
            ops.push(op);
            index += 1;
        }

        if operands.is_empty() || ops.len() != operands.len() - 1 {
            return Ok(Expr::Atom(self.span_text(&node, source)?));
        }

        let left = operands.remove(0);
        Ok(Expr::Compare { left: Box::new(left), ops, comparators: operands })
    }

    fn is_compare_token(kind: &str) -> bool {
        matches!(kind, "==" | "!=" | "<>" | "<" | "<=" | ">" | ">=" | "is" | "in" | "not")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wayfinder_core::WayfinderError;

    fn parse(source: &str) -> Stmt {
        let mut parser = PythonParser::new().unwrap();
        parser.parse_to_tree(source).unwrap()
    }

    fn first_stmt(source: &str) -> Stmt {
        match parse(source) {
            Stmt::Module { body } => body.into_iter().next().unwrap(),
            other => panic!("expected module, got {other:?}"),
        }
    }

    #[test]
    fn test_condition_keeps_boolean_skeleton() {
        let stmt = first_stmt("if x > 5 and not done:\n    pass\n");
        let Stmt::If { test, .. } = stmt else { panic!("expected if") };
        assert_eq!(test.to_string(), "x > 5 and not done");
        assert_eq!(negate_condition(&test).to_string(), "x <= 5 or done");
    }

    #[test]
    fn test_condition_unwraps_parentheses() {
        let stmt = first_stmt("if (x > 5):\n    pass\n");
        let Stmt::If { test, .. } = stmt else { panic!("expected if") };
        assert_eq!(test.to_string(), "x > 5");
    }

    #[test]
    fn test_two_word_comparison_operators() {
        let Stmt::If { test, .. } = first_stmt("if x is not None:\n    pass\n") else { panic!() };
        assert_eq!(test, Expr::Compare {
            left: Box::new(Expr::Atom("x".to_string())),
            ops: vec![CmpOp::IsNot],
            comparators: vec![Expr::Atom("None".to_string())],
        });

        let Stmt::If { test, .. } = first_stmt("if k not in d:\n    pass\n") else { panic!() };
        let Expr::Compare { ops, .. } = test else { panic!("expected comparison") };
        assert_eq!(ops, vec![CmpOp::NotIn]);
    }

    #[test]
    fn test_syntax_error_carries_location() {
        let mut parser = PythonParser::new().unwrap();
        let err = parser.parse_to_tree("if x >\n    pass\n").unwrap_err();
        match err {
            WayfinderError::ParseError(ParseError::Syntax { line, .. }) => assert_eq!(line, 1),
            other => panic!("expected syntax error, got {other:?}"),
        }
    }
}
