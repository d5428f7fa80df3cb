//! Graphviz DOT serialization
//!
//! Renders a finished graph into an attributed directed-graph description that
//! an external renderer turns into an image; the engine never invokes the
//! renderer itself. Node and edge declarations are deduplicated and sorted
//! before emission, so identical graphs always serialize byte-identically.

use crate::cfg::{ControlFlowGraph, Node, NodeKind};

impl ControlFlowGraph {
    /// Render the graph as Graphviz DOT text
    ///
    /// Reachable nodes are circles captioned with their statement text (or a
    /// synthetic START/EXIT caption); unreachable nodes render as gray
    /// "Orphan:" boxes with no outgoing edges.
    pub fn to_dot(&self) -> String {
        let mut lines = vec![
            "digraph CFG {".to_string(),
            "    rankdir=TB;".to_string(),
            "    ranksep=\"1.0\";".to_string(),
            "    nodesep=\"0.5\";".to_string(),
            "    node [shape=circle, fontname=Arial];".to_string(),
            "    edge [fontname=Arial];".to_string(),
        ];

        let reachable = self.reachable_ids();
        let mut node_declarations = Vec::new();
        let mut edge_definitions = Vec::new();

        for id in self.sorted_ids() {
            let Some(node) = self.node(id) else { continue };
            if reachable.contains(&id) {
                node_declarations.push(declare_node(node));
                emit_edges(node, &mut edge_definitions);
            } else {
                node_declarations.push(declare_orphan(node));
            }
        }

        node_declarations.sort();
        node_declarations.dedup();
        edge_definitions.sort();
        edge_definitions.dedup();

        lines.extend(node_declarations);
        lines.extend(edge_definitions);
        lines.push("}".to_string());
        lines.join("\n")
    }
}

/// Escape a string for use inside a DOT double-quoted attribute
fn escape(text: &str) -> String {
    text.replace('\\', "\\\\").replace('"', "\\\"").replace('\n', "\\n")
}

fn caption(node: &Node) -> String {
    match node.kind {
        NodeKind::Entry => "START".to_string(),
        NodeKind::Exit => "EXIT".to_string(),
        _ if !node.statements.is_empty() => {
            node.statements.iter().map(|s| escape(s)).collect::<Vec<_>>().join("\\n")
        }
        NodeKind::Block => "Block (empty)".to_string(),
        _ => node.kind.as_str().to_string(),
    }
}

fn shape(kind: NodeKind) -> &'static str {
    match kind {
        NodeKind::Exit => "doublecircle",
        NodeKind::Merge => "diamond",
        _ => "circle",
    }
}

fn declare_node(node: &Node) -> String {
    format!(
        "    {id} [label=\"{id}\", xlabel=\"{caption}\", shape={shape}];",
        id = node.id.0,
        caption = caption(node),
        shape = shape(node.kind),
    )
}

fn declare_orphan(node: &Node) -> String {
    let text = if node.statements.is_empty() {
        node.kind.as_str().to_string()
    } else {
        node.statements.iter().map(|s| escape(s)).collect::<Vec<_>>().join("\\n")
    };
    format!(
        "    {id} [label=\"{id}\", xlabel=\"Orphan: {text}\", shape=box, style=filled, fillcolor=gray];",
        id = node.id.0,
    )
}

fn emit_edges(node: &Node, edges: &mut Vec<String>) {
    let id = node.id.0;

    if let Some(next) = node.next {
        // a bare next beside branch/dispatch edges still needs a label
        let unconditional =
            node.branch.is_none() && node.orelse.is_none() && node.kind != NodeKind::MatchDispatch;
        if unconditional {
            edges.push(format!("    {id} -> {};", next.0));
        } else {
            edges.push(format!("    {id} -> {} [label=\"next\"];", next.0));
        }
    }

    if let Some(branch) = node.branch {
        let label = node.true_label.as_deref().unwrap_or("True");
        edges.push(format!("    {id} -> {} [label=\"{}\"];", branch.0, escape(label)));
    }

    if let Some(orelse) = node.orelse {
        let label = node.false_label.as_deref().unwrap_or("False");
        edges.push(format!("    {id} -> {} [label=\"{}\"];", orelse.0, escape(label)));
    }

    for (label, target) in &node.cases {
        edges.push(format!("    {id} -> {} [label=\"{}\"];", target.0, escape(label)));
    }
}
