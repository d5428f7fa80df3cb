//! Control Flow Graph (CFG) construction
//!
//! Builds the control flow structure of a Python statement tree for static
//! analysis and visualization. Nodes are basic blocks captioned with rendered
//! source text; edges encode sequencing, branching, looping, exception
//! propagation, and match dispatch.
//!
//! Construction threads "loose ends" through the tree: every visitor returns the
//! nodes the next statement must attach to, and non-local exits (return, raise,
//! break, continue) are carried through untouched so nothing downstream can ever
//! link out of them.

use rustc_hash::{FxHashMap, FxHashSet};
use std::collections::VecDeque;
use wayfinder_core::Result;
use wayfinder_parser::{Expr, ExceptHandler, MatchCase, PythonParser, Stmt, negate_condition};

/// Unique identifier for graph nodes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

/// Kind of a graph node
///
/// The set is closed; terminal kinds are the non-local exits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Entry,
    Exit,
    Assignment,
    Expression,
    Call,
    Pass,
    Return,
    Break,
    Continue,
    Raise,
    Condition,
    MatchDispatch,
    TryStart,
    FinallyStart,
    HandlerStart,
    ElseStart,
    /// Plain statement block; empty ones are construction placeholders
    Block,
    /// Convergence point after an exception block
    Merge,
}

impl NodeKind {
    /// Terminal nodes must never gain outgoing links
    pub fn is_terminal(self) -> bool {
        matches!(self, NodeKind::Return | NodeKind::Break | NodeKind::Continue | NodeKind::Raise)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            NodeKind::Entry => "entry",
            NodeKind::Exit => "exit",
            NodeKind::Assignment => "assignment",
            NodeKind::Expression => "expression_statement",
            NodeKind::Call => "function_call",
            NodeKind::Pass => "pass_statement",
            NodeKind::Return => "return_statement",
            NodeKind::Break => "break_statement",
            NodeKind::Continue => "continue_statement",
            NodeKind::Raise => "raise_statement",
            NodeKind::Condition => "condition",
            NodeKind::MatchDispatch => "match_dispatcher",
            NodeKind::TryStart => "try_block_start",
            NodeKind::FinallyStart => "finally_block_start",
            NodeKind::HandlerStart => "exception_handler_start",
            NodeKind::ElseStart => "else_block_start",
            NodeKind::Block => "statement_block",
            NodeKind::Merge => "merge_point",
        }
    }
}

/// Which successor slot an edge occupies
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkKind {
    /// Unconditional sequel
    Next,
    /// True / primary path
    Branch,
    /// False / alternate / fallback path
    Else,
}

/// A basic block in the control flow graph
#[derive(Debug, Clone)]
pub struct Node {
    pub id: NodeId,
    /// Rendered statement text; zero or one fragment in practice
    pub statements: Vec<String>,
    pub kind: NodeKind,
    pub next: Option<NodeId>,
    pub branch: Option<NodeId>,
    pub orelse: Option<NodeId>,
    /// Case fan-out, populated only on match dispatch nodes
    pub cases: Vec<(String, NodeId)>,
    /// Cached true-branch edge label on condition nodes
    pub true_label: Option<String>,
    /// Cached false-branch edge label on condition nodes
    pub false_label: Option<String>,
}

impl Node {
    fn new(id: NodeId, statements: Vec<String>, kind: NodeKind) -> Self {
        Self {
            id,
            statements,
            kind,
            next: None,
            branch: None,
            orelse: None,
            cases: Vec::new(),
            true_label: None,
            false_label: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.kind.is_terminal()
    }

    /// Outgoing targets in next / branch / orelse / case order
    pub fn successors(&self) -> Vec<NodeId> {
        let mut successors = Vec::new();
        if let Some(next) = self.next {
            successors.push(next);
        }
        if let Some(branch) = self.branch {
            successors.push(branch);
        }
        if let Some(orelse) = self.orelse {
            successors.push(orelse);
        }
        for (_, target) in &self.cases {
            successors.push(*target);
        }
        successors
    }
}

/// A finished control flow graph
///
/// Node table keyed by stable identity, reachable from the designated entry
/// node. The shared exit node exists only when some path actually fell off the
/// end of the program without a non-local exit.
#[derive(Debug, Clone)]
pub struct ControlFlowGraph {
    pub nodes: FxHashMap<NodeId, Node>,
    pub entry: NodeId,
    pub exit: Option<NodeId>,
}

impl ControlFlowGraph {
    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// Node identities in ascending order
    pub fn sorted_ids(&self) -> Vec<NodeId> {
        let mut ids: Vec<NodeId> = self.nodes.keys().copied().collect();
        ids.sort();
        ids
    }

    pub fn successors(&self, id: NodeId) -> Vec<NodeId> {
        self.nodes.get(&id).map(Node::successors).unwrap_or_default()
    }

    /// All nodes reachable from the entry node
    pub fn reachable_ids(&self) -> FxHashSet<NodeId> {
        let mut visited = FxHashSet::default();
        let mut queue = VecDeque::new();
        queue.push_back(self.entry);
        visited.insert(self.entry);

        while let Some(id) = queue.pop_front() {
            for successor in self.successors(id) {
                if visited.insert(successor) {
                    queue.push_back(successor);
                }
            }
        }

        visited
    }

    /// Splice out empty pass-through placeholder blocks
    ///
    /// A stub is an empty plain block with exactly one outgoing `next` link and
    /// no branch/orelse/case links, and is neither the entry nor the exit. Every
    /// link that targeted a stub is redirected to the stub's ultimate successor,
    /// resolved transitively through stub chains; a chain that loops back on
    /// itself is left in place. Runs to a fixed point and returns the number of
    /// removed nodes; a second call removes nothing and changes no edge.
    pub fn eliminate_stubs(&mut self) -> usize {
        let mut removed_total = 0;

        loop {
            let mut forwards: FxHashMap<NodeId, NodeId> = FxHashMap::default();
            for id in self.sorted_ids() {
                let Some(node) = self.nodes.get(&id) else { continue };
                let is_stub = node.kind == NodeKind::Block
                    && node.statements.is_empty()
                    && id != self.entry
                    && Some(id) != self.exit
                    && node.next.is_some()
                    && node.branch.is_none()
                    && node.orelse.is_none()
                    && node.cases.is_empty();
                if is_stub {
                    if let Some(next) = node.next {
                        forwards.insert(id, next);
                    }
                }
            }

            let mut resolved: FxHashMap<NodeId, NodeId> = FxHashMap::default();
            for (&stub, &first) in &forwards {
                let mut seen = FxHashSet::default();
                seen.insert(stub);
                let mut target = first;
                let mut cyclic = false;
                while forwards.contains_key(&target) {
                    if !seen.insert(target) {
                        cyclic = true;
                        break;
                    }
                    target = forwards[&target];
                }
                if !cyclic {
                    resolved.insert(stub, target);
                }
            }

            if resolved.is_empty() {
                break;
            }

            for node in self.nodes.values_mut() {
                if resolved.contains_key(&node.id) {
                    continue;
                }
                if let Some(next) = node.next {
                    if let Some(&target) = resolved.get(&next) {
                        node.next = Some(target);
                    }
                }
                if let Some(branch) = node.branch {
                    if let Some(&target) = resolved.get(&branch) {
                        node.branch = Some(target);
                    }
                }
                if let Some(orelse) = node.orelse {
                    if let Some(&target) = resolved.get(&orelse) {
                        node.orelse = Some(target);
                    }
                }
                for case in &mut node.cases {
                    if let Some(&target) = resolved.get(&case.1) {
                        case.1 = target;
                    }
                }
            }

            for (&stub, _) in &resolved {
                self.nodes.remove(&stub);
            }
            removed_total += resolved.len();
        }

        removed_total
    }

    /// Reassign contiguous identities from 1, preserving construction order
    pub fn renumber(&mut self) {
        let ids = self.sorted_ids();
        let mapping: FxHashMap<NodeId, NodeId> = ids
            .iter()
            .enumerate()
            .map(|(index, &old)| (old, NodeId(index as u32 + 1)))
            .collect();

        let mut renumbered = FxHashMap::default();
        for old in ids {
            if let Some(mut node) = self.nodes.remove(&old) {
                node.id = mapping[&old];
                node.next = node.next.and_then(|target| mapping.get(&target).copied());
                node.branch = node.branch.and_then(|target| mapping.get(&target).copied());
                node.orelse = node.orelse.and_then(|target| mapping.get(&target).copied());
                for case in &mut node.cases {
                    if let Some(&target) = mapping.get(&case.1) {
                        case.1 = target;
                    }
                }
                renumbered.insert(node.id, node);
            }
        }

        self.nodes = renumbered;
        if let Some(&entry) = mapping.get(&self.entry) {
            self.entry = entry;
        }
        self.exit = self.exit.and_then(|exit| mapping.get(&exit).copied());
    }
}

/// Context for building, tracking loop resolution targets
#[derive(Debug, Default)]
struct BuildContext {
    /// Innermost-last break targets
    loop_exits: Vec<NodeId>,
    /// Innermost-last continue targets
    loop_heads: Vec<NodeId>,
}

/// Builder for control flow graphs
///
/// One instance per concurrent construction; `build` resets all state, so an
/// instance can be reused for consecutive builds.
pub struct CfgBuilder {
    nodes: FxHashMap<NodeId, Node>,
    current_id: u32,
    exit: Option<NodeId>,
    ctx: BuildContext,
}

impl CfgBuilder {
    pub fn new() -> Self {
        Self { nodes: FxHashMap::default(), current_id: 0, exit: None, ctx: BuildContext::default() }
    }

    /// Build a graph from an already-parsed statement tree
    ///
    /// A `Module` or `FunctionDef` root has its body processed as the top-level
    /// sequence; any other root is dispatched as a single statement.
    pub fn build(&mut self, root: &Stmt, graph_name: &str) -> ControlFlowGraph {
        self.nodes = FxHashMap::default();
        self.current_id = 0;
        self.exit = None;
        self.ctx = BuildContext::default();

        let entry = self.new_node(vec![format!("Entry to {graph_name}")], NodeKind::Entry);

        let loose_ends = match root {
            Stmt::Module { body } | Stmt::FunctionDef { body, .. } => self.process_block(body, vec![entry]),
            other => self.visit_stmt(other, entry),
        };

        // Paths that fall off the end converge on one shared exit node; a graph
        // whose every path ends in a non-local exit has none.
        for end in loose_ends {
            if !self.is_terminal(end) {
                let exit = match self.exit {
                    Some(exit) => exit,
                    None => {
                        let exit = self.new_node(vec![format!("Exit from {graph_name}")], NodeKind::Exit);
                        self.exit = Some(exit);
                        exit
                    }
                };
                self.link(end, exit, LinkKind::Next);
            }
        }

        let mut graph =
            ControlFlowGraph { nodes: std::mem::take(&mut self.nodes), entry, exit: self.exit };
        graph.eliminate_stubs();
        graph.renumber();

        tracing::debug!(nodes = graph.num_nodes(), graph = graph_name, "built control flow graph");
        graph
    }

    /// Parse source text and build its graph
    ///
    /// Parse failures are returned as-is; no partial graph is constructed.
    pub fn build_source(&mut self, source: &str, graph_name: &str) -> Result<ControlFlowGraph> {
        let mut parser = PythonParser::new()?;
        let tree = parser.parse_to_tree(source)?;
        Ok(self.build(&tree, graph_name))
    }

    fn new_id(&mut self) -> NodeId {
        self.current_id += 1;
        NodeId(self.current_id)
    }

    fn new_node(&mut self, statements: Vec<String>, kind: NodeKind) -> NodeId {
        let id = self.new_id();
        self.nodes.insert(id, Node::new(id, statements, kind));
        id
    }

    fn is_terminal(&self, id: NodeId) -> bool {
        self.nodes.get(&id).is_some_and(Node::is_terminal)
    }

    /// Single chokepoint for edge creation
    ///
    /// No-ops when either endpoint is absent and refuses every outgoing edge
    /// from a terminal node, which is what holds the terminal invariant no
    /// matter which visitor asks.
    fn link(&mut self, pred: NodeId, succ: NodeId, kind: LinkKind) {
        if !self.nodes.contains_key(&succ) {
            return;
        }
        let Some(pred_node) = self.nodes.get_mut(&pred) else { return };
        if pred_node.is_terminal() {
            return;
        }

        match kind {
            LinkKind::Next => pred_node.next = Some(succ),
            LinkKind::Branch => pred_node.branch = Some(succ),
            LinkKind::Else => pred_node.orelse = Some(succ),
        }
    }

    /// Process an ordered statement sequence from a set of entry predecessors,
    /// returning the loose ends the caller's next statement must attach to
    fn process_block(&mut self, stmts: &[Stmt], sources: Vec<NodeId>) -> Vec<NodeId> {
        let mut active = sources;
        let mut skip_next = false;

        for (index, stmt) in stmts.iter().enumerate() {
            if skip_next {
                skip_next = false;
                continue;
            }
            if active.is_empty() {
                break;
            }

            let mut next_active = Vec::new();
            let mut live = Vec::new();
            for &source in &active {
                if self.is_terminal(source) {
                    // anything after a guaranteed non-local exit is unreachable
                    // via that path; carry the node through unchanged
                    next_active.push(source);
                } else {
                    live.push(source);
                }
            }

            if live.is_empty() {
                active = dedup(next_active);
                continue;
            }

            let follower = if matches!(stmt, Stmt::If { .. } | Stmt::Match { .. }) {
                stmts.get(index + 1)
            } else {
                None
            };

            let mut loose_ends = Vec::new();
            for &source in &live {
                loose_ends.extend(self.visit_stmt(stmt, source));
            }
            let loose_ends = dedup(loose_ends);

            if let Some(follower_stmt) = follower {
                // exactly one physical join node right after an if/match; the
                // follower is consumed here and skipped by the outer loop
                let follower_node = self
                    .new_node(vec![follower_stmt.text().to_string()], Self::statement_kind(follower_stmt));

                let mut linked = false;
                for &end in &loose_ends {
                    if self.is_terminal(end) {
                        next_active.push(end);
                    } else {
                        self.link(end, follower_node, LinkKind::Next);
                        linked = true;
                    }
                }
                if linked || loose_ends.is_empty() {
                    next_active.push(follower_node);
                }
                skip_next = true;
            } else {
                next_active.extend(loose_ends);
            }

            active = dedup(next_active);
        }

        active
    }

    fn visit_stmt(&mut self, stmt: &Stmt, source: NodeId) -> Vec<NodeId> {
        match stmt {
            Stmt::If { test, body, orelse, .. } => self.visit_if(test, body, orelse, source),
            Stmt::While { test, body, orelse, .. } => {
                self.visit_loop(format!("while {test}"), body, orelse, "while", source)
            }
            Stmt::For { target, iter, body, orelse, .. } => {
                self.visit_loop(format!("for {target} in {iter}"), body, orelse, "for", source)
            }
            Stmt::Try { body, handlers, orelse, finally, .. } => {
                self.visit_try(body, handlers, orelse, finally, source)
            }
            Stmt::Match { subject, cases, .. } => self.visit_match(subject, cases, source),
            Stmt::Break => self.visit_break(source),
            Stmt::Continue => self.visit_continue(source),
            _ => self.generic_statement(stmt, source),
        }
    }

    /// Node kind for a statement handled as a single block
    fn statement_kind(stmt: &Stmt) -> NodeKind {
        match stmt {
            Stmt::Assign { .. } => NodeKind::Assignment,
            Stmt::Expr { is_call: true, .. } => NodeKind::Call,
            Stmt::Expr { .. } => NodeKind::Expression,
            Stmt::Pass => NodeKind::Pass,
            Stmt::Return { .. } => NodeKind::Return,
            Stmt::Break => NodeKind::Break,
            Stmt::Continue => NodeKind::Continue,
            Stmt::Raise { .. } => NodeKind::Raise,
            Stmt::If { .. } | Stmt::While { .. } | Stmt::For { .. } => NodeKind::Condition,
            Stmt::Match { .. } => NodeKind::MatchDispatch,
            _ => NodeKind::Block,
        }
    }

    fn generic_statement(&mut self, stmt: &Stmt, source: NodeId) -> Vec<NodeId> {
        let node = self.new_node(vec![stmt.text().to_string()], Self::statement_kind(stmt));
        self.link(source, node, LinkKind::Next);
        vec![node]
    }

    fn visit_break(&mut self, source: NodeId) -> Vec<NodeId> {
        let node = self.new_node(vec!["break".to_string()], NodeKind::Break);
        self.link(source, node, LinkKind::Next);

        match self.ctx.loop_exits.last().copied() {
            Some(target) => self.set_jump_edge(node, target),
            None => tracing::warn!("break statement outside of a loop"),
        }
        vec![node]
    }

    fn visit_continue(&mut self, source: NodeId) -> Vec<NodeId> {
        let node = self.new_node(vec!["continue".to_string()], NodeKind::Continue);
        self.link(source, node, LinkKind::Next);

        match self.ctx.loop_heads.last().copied() {
            Some(target) => self.set_jump_edge(node, target),
            None => tracing::warn!("continue statement outside of a loop"),
        }
        vec![node]
    }

    /// Install the one resolution edge a break/continue node owns
    ///
    /// Written directly: `link` refuses outgoing edges from terminal nodes, and
    /// this edge is part of the node's construction rather than a later link.
    fn set_jump_edge(&mut self, node: NodeId, target: NodeId) {
        if let Some(jump) = self.nodes.get_mut(&node) {
            jump.next = Some(target);
        }
    }

    fn visit_if(&mut self, test: &Expr, body: &[Stmt], orelse: &[Stmt], source: NodeId) -> Vec<NodeId> {
        let condition = self.new_node(vec![format!("if {test}")], NodeKind::Condition);
        self.link(source, condition, LinkKind::Next);

        let true_label = test.to_string();
        let false_label = negate_condition(test).to_string();
        if let Some(node) = self.nodes.get_mut(&condition) {
            node.true_label = Some(true_label);
            node.false_label = Some(false_label);
        }

        let true_entry = self.new_node(Vec::new(), NodeKind::Block);
        self.link(condition, true_entry, LinkKind::Branch);
        let mut loose_ends = self.process_block(body, vec![true_entry]);

        if orelse.is_empty() {
            // the condition node itself is the false-path loose end
            loose_ends.push(condition);
        } else {
            let false_entry = self.new_node(Vec::new(), NodeKind::Block);
            self.link(condition, false_entry, LinkKind::Else);
            loose_ends.extend(self.process_block(orelse, vec![false_entry]));
        }

        dedup(loose_ends)
    }

    /// Shared routine for both loop forms
    fn visit_loop(
        &mut self, header: String, body: &[Stmt], orelse: &[Stmt], loop_kind: &str, source: NodeId,
    ) -> Vec<NodeId> {
        let condition = self.new_node(vec![header], NodeKind::Condition);
        self.link(source, condition, LinkKind::Next);

        let body_entry = self.new_node(Vec::new(), NodeKind::Block);
        self.link(condition, body_entry, LinkKind::Branch);

        let exit = self
            .new_node(vec![format!("exit_point_after_{loop_kind}_{}", condition.0)], NodeKind::Block);
        self.ctx.loop_exits.push(exit);
        self.ctx.loop_heads.push(condition);

        let body_ends = self.process_block(body, vec![body_entry]);
        for end in body_ends {
            if !self.is_terminal(end) {
                // back-edge; terminal ends already resolved their own targets
                self.link(end, condition, LinkKind::Next);
            }
        }

        self.ctx.loop_exits.pop();
        self.ctx.loop_heads.pop();

        self.link(condition, exit, LinkKind::Else);

        if orelse.is_empty() {
            vec![exit]
        } else {
            self.process_block(orelse, vec![exit])
        }
    }

    fn visit_try(
        &mut self, body: &[Stmt], handlers: &[ExceptHandler], orelse: &[Stmt], finally: &[Stmt],
        source: NodeId,
    ) -> Vec<NodeId> {
        let try_entry = self.new_node(vec!["try".to_string()], NodeKind::TryStart);
        self.link(source, try_entry, LinkKind::Next);

        let body_ends = self.process_block(body, vec![try_entry]);

        // materialized on first demand so the exceptionless-success shape never
        // carries an orphaned merge node
        let mut merge = None;

        let finally_entry = if finally.is_empty() {
            None
        } else {
            Some(self.new_node(vec!["finally".to_string()], NodeKind::FinallyStart))
        };

        let block_ends = if let Some(finally_entry) = finally_entry {
            for &end in &body_ends {
                if !self.is_terminal(end) {
                    self.link(end, finally_entry, LinkKind::Next);
                }
            }
            let finally_ends = self.process_block(finally, vec![finally_entry]);
            for &end in &finally_ends {
                if !self.is_terminal(end) {
                    let target = self.merge_target(&mut merge);
                    self.link(end, target, LinkKind::Next);
                }
            }
            finally_ends
        } else {
            for &end in &body_ends {
                if !self.is_terminal(end) {
                    let target = self.merge_target(&mut merge);
                    self.link(end, target, LinkKind::Next);
                }
            }
            body_ends
        };

        let mut clause_ends = Vec::new();
        for handler in handlers {
            let mut label = String::from("except");
            if let Some(exception_type) = &handler.exception_type {
                label.push(' ');
                label.push_str(exception_type);
            }
            if let Some(name) = &handler.name {
                label.push_str(" as ");
                label.push_str(name);
            }

            // exception dispatch is a runtime decision; every handler entry is
            // registered on the try entry's alternate slot
            let handler_entry = self.new_node(vec![label], NodeKind::HandlerStart);
            self.link(try_entry, handler_entry, LinkKind::Else);

            let ends = self.process_block(&handler.body, vec![handler_entry]);
            for &end in &ends {
                if !self.is_terminal(end) {
                    match finally_entry {
                        Some(finally_entry) => self.link(end, finally_entry, LinkKind::Next),
                        None => {
                            let target = self.merge_target(&mut merge);
                            self.link(end, target, LinkKind::Next);
                        }
                    }
                }
            }
            clause_ends.extend(ends);
        }

        if !orelse.is_empty() {
            let else_entry = self.new_node(vec!["orelse".to_string()], NodeKind::ElseStart);
            self.link(try_entry, else_entry, LinkKind::Else);

            let ends = self.process_block(orelse, vec![else_entry]);
            for &end in &ends {
                if !self.is_terminal(end) {
                    match finally_entry {
                        Some(finally_entry) => self.link(end, finally_entry, LinkKind::Next),
                        None => {
                            let target = self.merge_target(&mut merge);
                            self.link(end, target, LinkKind::Next);
                        }
                    }
                }
            }
            clause_ends.extend(ends);
        }

        // terminal exits bypass merge and cleanup nodes entirely
        let mut result: Vec<NodeId> = block_ends
            .iter()
            .chain(&clause_ends)
            .copied()
            .filter(|&end| self.is_terminal(end))
            .collect();
        if let Some(merge) = merge {
            result.push(merge);
        }
        dedup(result)
    }

    fn merge_target(&mut self, merge: &mut Option<NodeId>) -> NodeId {
        match *merge {
            Some(id) => id,
            None => {
                let id = self.new_node(Vec::new(), NodeKind::Merge);
                *merge = Some(id);
                id
            }
        }
    }

    fn visit_match(&mut self, subject: &str, cases: &[MatchCase], source: NodeId) -> Vec<NodeId> {
        let dispatcher = self.new_node(vec![format!("match {subject}")], NodeKind::MatchDispatch);
        self.link(source, dispatcher, LinkKind::Next);

        let mut loose_ends = Vec::new();
        for case in cases {
            let label = match &case.guard {
                Some(guard) => format!("case: {} if {}", case.pattern, guard),
                None => format!("case: {}", case.pattern),
            };

            let is_minimal = case.body.is_empty() || matches!(case.body.as_slice(), [Stmt::Pass]);
            if is_minimal {
                let (statements, kind) = if case.body.is_empty() {
                    (Vec::new(), NodeKind::Block)
                } else {
                    (vec!["pass".to_string()], NodeKind::Pass)
                };
                let target = self.new_node(statements, kind);
                self.register_case(dispatcher, label, target);
                loose_ends.push(target);
            } else {
                // the first arm statement is the registered dispatch target;
                // the rest of the arm flows from it
                let first = &case.body[0];
                let target = self.new_node(vec![first.text().to_string()], Self::statement_kind(first));
                self.register_case(dispatcher, label, target);

                if case.body.len() > 1 {
                    loose_ends.extend(self.process_block(&case.body[1..], vec![target]));
                } else {
                    loose_ends.push(target);
                }
            }
        }

        if cases.is_empty() {
            loose_ends.push(dispatcher);
        }
        dedup(loose_ends)
    }

    fn register_case(&mut self, dispatcher: NodeId, label: String, target: NodeId) {
        if let Some(node) = self.nodes.get_mut(&dispatcher) {
            node.cases.push((label, target));
        }
    }
}

impl Default for CfgBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Deduplicate by identity, preserving first-seen order
fn dedup(ids: Vec<NodeId>) -> Vec<NodeId> {
    let mut seen = FxHashSet::default();
    ids.into_iter().filter(|id| seen.insert(*id)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build(source: &str) -> ControlFlowGraph {
        CfgBuilder::new().build_source(source, "test").unwrap()
    }

    fn find<'a>(graph: &'a ControlFlowGraph, text: &str) -> &'a Node {
        graph
            .nodes
            .values()
            .find(|node| node.statements.first().map(String::as_str) == Some(text))
            .unwrap_or_else(|| panic!("node '{text}' not found"))
    }

    #[test]
    fn test_link_refuses_terminal_sources() {
        let mut builder = CfgBuilder::new();
        let terminal = builder.new_node(vec!["return x".to_string()], NodeKind::Return);
        let other = builder.new_node(Vec::new(), NodeKind::Block);

        builder.link(terminal, other, LinkKind::Next);
        builder.link(terminal, other, LinkKind::Branch);
        builder.link(terminal, other, LinkKind::Else);

        let node = &builder.nodes[&terminal];
        assert_eq!(node.next, None);
        assert_eq!(node.branch, None);
        assert_eq!(node.orelse, None);
    }

    #[test]
    fn test_link_ignores_missing_endpoints() {
        let mut builder = CfgBuilder::new();
        let node = builder.new_node(Vec::new(), NodeKind::Block);

        builder.link(node, NodeId(99), LinkKind::Next);
        assert_eq!(builder.nodes[&node].next, None);

        builder.link(NodeId(99), node, LinkKind::Next);
        assert_eq!(builder.nodes.len(), 1);
    }

    #[test]
    fn test_terminal_nodes_have_no_outgoing_links() {
        let source = "
while x > 0:
    if x == 1:
        break
    if x == 2:
        continue
    x -= 1
def f(y):
    return y
raise ValueError('end')
";
        let graph = build(source);
        for id in graph.reachable_ids() {
            let node = &graph.nodes[&id];
            if node.is_terminal() && node.kind != NodeKind::Break && node.kind != NodeKind::Continue {
                assert!(node.successors().is_empty(), "terminal node {:?} has successors", node);
            }
            if node.is_terminal() {
                assert!(node.branch.is_none() && node.orelse.is_none() && node.cases.is_empty());
            }
        }
    }

    #[test]
    fn test_sequential_statements_form_a_chain() {
        let graph = build("x = 10\ny = 20\nz = x + y\n");

        // entry + three statements + shared exit
        assert_eq!(graph.num_nodes(), 5);
        let entry = &graph.nodes[&graph.entry];
        assert_eq!(entry.kind, NodeKind::Entry);

        let x = find(&graph, "x = 10");
        let y = find(&graph, "y = 20");
        let z = find(&graph, "z = x + y");
        assert_eq!(entry.next, Some(x.id));
        assert_eq!(x.next, Some(y.id));
        assert_eq!(y.next, Some(z.id));
        assert_eq!(z.next, graph.exit);
        assert!(graph.exit.is_some());
    }

    #[test]
    fn test_trailing_terminal_statement_leaves_no_exit() {
        let graph = build("x = 10\nreturn x\n");

        assert_eq!(graph.num_nodes(), 3);
        assert_eq!(graph.exit, None);
        let ret = find(&graph, "return x");
        assert!(ret.successors().is_empty());
    }

    #[test]
    fn test_renumbering_is_contiguous_from_one() {
        let graph = build("if a:\n    b = 1\nelse:\n    b = 2\nc = b\n");
        let ids = graph.sorted_ids();
        for (index, id) in ids.iter().enumerate() {
            assert_eq!(id.0, index as u32 + 1);
            assert_eq!(graph.nodes[id].id, *id);
        }
        assert_eq!(graph.entry, NodeId(1));
    }

    #[test]
    fn test_stub_elimination_is_idempotent() {
        let mut graph = build("if a:\n    b = 1\nelse:\n    b = 2\nc = b\n");

        let before: Vec<(NodeId, Vec<NodeId>)> =
            graph.sorted_ids().iter().map(|&id| (id, graph.successors(id))).collect();
        assert_eq!(graph.eliminate_stubs(), 0);
        let after: Vec<(NodeId, Vec<NodeId>)> =
            graph.sorted_ids().iter().map(|&id| (id, graph.successors(id))).collect();
        assert_eq!(before, after);
    }

    #[test]
    fn test_dangling_break_keeps_no_outgoing_edge() {
        let graph = build("x = 1\nbreak\n");
        let break_node = find(&graph, "break");
        assert_eq!(break_node.kind, NodeKind::Break);
        assert!(break_node.successors().is_empty());
    }

    #[test]
    fn test_dedup_preserves_first_seen_order() {
        let ids = vec![NodeId(3), NodeId(1), NodeId(3), NodeId(2), NodeId(1)];
        assert_eq!(dedup(ids), vec![NodeId(3), NodeId(1), NodeId(2)]);
    }
}
