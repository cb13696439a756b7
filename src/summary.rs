//! Functional summaries of an explored constraint tree.
//!
//! The tree is folded into a [`ListRep`], a binary decision structure whose inner
//! nodes are conditions and whose leaves are the effects recorded at the ends of
//! executions. A [`ListRep`] is then either turned into a single `ite` expression
//! by [`to_summary`], or rendered as a graph by [`crate::dot::to_dot`].
//!
//! Two-way nodes fold into one split on their condition. A node with a single
//! explored outcome gets an unknown leaf on the other side. Merged (four-way)
//! nodes fold into nested splits, one per explored combination, in the order the
//! combinations were first seen.

use std::fmt;

use crate::constraint::{ChildList, ConstraintTree, MAX_FOUR_WAY_CHILDREN};
use crate::expr::Expr;
use crate::reference::ConstraintId;

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum ListRep {
    /// An execution end with its effect; `None` where nothing is known.
    Leaf(Option<Expr>),
    /// A split on a condition: `(cond, then, else)`.
    Node(Expr, Box<ListRep>, Box<ListRep>),
}

impl ListRep {
    fn node(cond: Expr, then: ListRep, else_: ListRep) -> Self {
        ListRep::Node(cond, Box::new(then), Box::new(else_))
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self, ListRep::Leaf(_))
    }

    /// Number of splits.
    pub fn size(&self) -> usize {
        match self {
            ListRep::Leaf(_) => 0,
            ListRep::Node(_, t, e) => 1 + t.size() + e.size(),
        }
    }
}

impl fmt::Display for ListRep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ListRep::Leaf(Some(e)) => write!(f, "{}", e),
            ListRep::Leaf(None) => write!(f, "?"),
            ListRep::Node(c, t, e) => write!(f, "[{}, {}, {}]", c, t, e),
        }
    }
}

/// Which child lists to follow when folding the tree.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub enum TreeView {
    /// The exploration tree itself.
    #[default]
    Merged,
    /// The old variant's own branch history.
    Shadow,
    /// The new variant's own branch history.
    Mirror,
}

impl TreeView {
    fn list(self) -> ChildList {
        match self {
            TreeView::Merged => ChildList::Primary,
            TreeView::Shadow => ChildList::Shadow,
            TreeView::Mirror => ChildList::Mirror,
        }
    }
}

/// Folds the tree from its root.
pub fn to_list_rep(tree: &ConstraintTree, view: TreeView) -> ListRep {
    fold(tree, tree.root(), view.list())
}

fn fold(tree: &ConstraintTree, id: ConstraintId, list: ChildList) -> ListRep {
    let node = tree.get(id);
    let children = node.children(list);
    let pred = |c: ConstraintId| tree.get(c).predicate().expect("non-root constraint has a predicate");

    match children {
        [] => ListRep::Leaf(node.effect().cloned()),
        [only] if !tree.get(*only).is_four_way() => {
            let p = pred(*only);
            let sub = fold(tree, *only, list);
            if p.result() {
                ListRep::node(p.expr().clone(), sub, ListRep::Leaf(None))
            } else {
                ListRep::node(p.expr().clone(), ListRep::Leaf(None), sub)
            }
        }
        [a, b] if !tree.get(*a).is_four_way() && !tree.get(*b).is_four_way() && *pred(*a) == pred(*b).negated() => {
            let (then, else_) = if pred(*a).result() { (*a, *b) } else { (*b, *a) };
            ListRep::node(pred(*a).expr().clone(), fold(tree, then, list), fold(tree, else_, list))
        }
        _ => {
            let complete = children.len() == MAX_FOUR_WAY_CHILDREN && children.iter().all(|&c| tree.get(c).is_four_way());
            let (init, mut rep) = match children.split_last() {
                Some((last, init)) if complete => (init, fold(tree, *last, list)),
                _ => (children, ListRep::Leaf(None)),
            };
            for &c in init.iter().rev() {
                rep = ListRep::node(pred(c).to_expr(), fold(tree, c, list), rep);
            }
            rep
        }
    }
}

/// Turns a [`ListRep`] into one `ite` expression.
///
/// Unknown leaves become `unknown`. Known leaves of a different sort than
/// `unknown` become a fresh variable of its sort, named after the leaf.
pub fn to_summary(rep: &ListRep, unknown: &Expr) -> Expr {
    match rep {
        ListRep::Leaf(None) => unknown.clone(),
        ListRep::Leaf(Some(e)) if e.sort() != unknown.sort() => Expr::var(e.to_string(), unknown.sort()),
        ListRep::Leaf(Some(e)) => e.clone(),
        ListRep::Node(c, t, e) => Expr::ite(c.clone(), to_summary(t, unknown), to_summary(e, unknown)),
    }
}
