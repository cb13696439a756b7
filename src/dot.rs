//! Summary to DOT (Graphviz) conversion.
//!
//! The generated DOT output follows these conventions:
//! - **Condition nodes** are labelled with the branch condition
//! - **Leaf nodes** are labelled with the recorded effect, or `?` where the
//!   outcome was never explored
//! - **Edges**:
//!   - Edges labelled `1` (solid) lead to the branch where the condition holds
//!   - Edges labelled `0` (dashed) lead to the branch where it does not
//!
//! # Examples
//!
//! ```
//! use concolic_rs::dot::{to_dot, DotConfig};
//! use concolic_rs::expr::Expr;
//! use concolic_rs::summary::ListRep;
//! use concolic_rs::types::Sort;
//!
//! let cond = Expr::gt(Expr::var("x", Sort::Int), Expr::int(0));
//! let rep = ListRep::Node(
//!     cond,
//!     Box::new(ListRep::Leaf(Some(Expr::int(1)))),
//!     Box::new(ListRep::Leaf(None)),
//! );
//! let dot = to_dot(&rep, &DotConfig::default()).unwrap();
//! // Write to file and render with: dot -Tpng output.dot -o output.png
//! assert!(dot.starts_with("digraph"));
//! ```

use std::fmt::Write as _;

use crate::summary::ListRep;

/// Configuration options for DOT output generation.
#[derive(Debug, Clone)]
pub struct DotConfig {
    /// Graph name (default: "summary")
    pub name: &'static str,
    /// Shape for condition nodes (default: "ellipse")
    pub node_shape: &'static str,
    /// Shape for leaves with a known effect (default: "box")
    pub leaf_shape: &'static str,
    /// Shape for unexplored leaves (default: "plaintext")
    pub unknown_shape: &'static str,
    /// Style for then edges (default: "solid")
    pub then_edge_style: &'static str,
    /// Style for else edges (default: "dashed")
    pub else_edge_style: &'static str,
}

impl Default for DotConfig {
    fn default() -> Self {
        Self {
            name: "summary",
            node_shape: "ellipse",
            leaf_shape: "box",
            unknown_shape: "plaintext",
            then_edge_style: "solid",
            else_edge_style: "dashed",
        }
    }
}

/// Renders `rep` as a `digraph`.
///
/// Nodes are numbered in pre-order, starting from `0` at the top.
pub fn to_dot(rep: &ListRep, config: &DotConfig) -> Result<String, std::fmt::Error> {
    let mut dot = String::new();
    writeln!(dot, "digraph {} {{", config.name)?;
    writeln!(dot, "node [shape={}];", config.node_shape)?;
    let mut next = 0;
    write_node(&mut dot, rep, &mut next, config)?;
    writeln!(dot, "}}")?;
    Ok(dot)
}

fn write_node(dot: &mut String, rep: &ListRep, next: &mut usize, config: &DotConfig) -> Result<usize, std::fmt::Error> {
    let id = *next;
    *next += 1;
    match rep {
        ListRep::Leaf(Some(effect)) => {
            writeln!(dot, "{} [shape={}, label=\"{}\"];", id, config.leaf_shape, escape(&effect.to_string()))?;
        }
        ListRep::Leaf(None) => {
            writeln!(dot, "{} [shape={}, label=\"?\"];", id, config.unknown_shape)?;
        }
        ListRep::Node(cond, then, else_) => {
            writeln!(dot, "{} [label=\"{}\"];", id, escape(&cond.to_string()))?;
            let t = write_node(dot, then, next, config)?;
            writeln!(dot, "{} -> {} [label=\"1\", style={}];", id, t, config.then_edge_style)?;
            let e = write_node(dot, else_, next, config)?;
            writeln!(dot, "{} -> {} [label=\"0\", style={}];", id, e, config.else_edge_style)?;
        }
    }
    Ok(id)
}

fn escape(label: &str) -> String {
    label.replace('\\', "\\\\").replace('"', "\\\"")
}
