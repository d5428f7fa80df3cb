//! Control-flow graph engine for Python code
//!
//! This crate turns a parsed statement tree into structural views of a
//! procedure's execution paths:
//! - Control Flow Graph (CFG) construction with branch, loop, exception, and
//!   match dispatch handling
//! - Simple-path and prime-path enumeration for coverage criteria
//! - Deterministic Graphviz DOT serialization for external rendering

pub mod cfg;
pub mod dot;
pub mod paths;

pub use cfg::{CfgBuilder, ControlFlowGraph, LinkKind, Node, NodeId, NodeKind};
