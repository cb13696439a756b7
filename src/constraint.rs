//! The constraint tree.
//!
//! A [`Constraint`] is a path prefix: the conjunction of the predicates on the way
//! from the root to it. The root carries no predicate and stands for "no branch
//! taken yet". The tree only ever grows; nodes are never removed.
//!
//! All nodes live in one arena, the [`ConstraintTree`], and are addressed by
//! [`ConstraintId`]. Each node keeps three child lists (see [`ChildList`]):
//!
//! - `Primary`: the exploration tree proper. Children are two-way outcomes, or
//!   merged (four-way) outcomes during differential exploration.
//! - `Shadow`: the old variant's own branch history.
//! - `Mirror`: the new variant's own branch history.
//!
//! The shadow and mirror histories are separate subtrees hanging off the same
//! root, so [`ConstraintTree::get_asserts`] works uniformly for all three.

use std::collections::VecDeque;
use std::fmt::{Display, Formatter};

use log::debug;

use crate::expr::Expr;
use crate::predicate::Predicate;
use crate::reference::ConstraintId;

/// Maximum number of four-way (merged) children of a node.
pub const MAX_FOUR_WAY_CHILDREN: usize = 4;
/// Maximum number of two-way children of a node.
pub const MAX_TWO_WAY_CHILDREN: usize = 2;

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum ChildList {
    Primary,
    Shadow,
    Mirror,
}

#[derive(Debug, Clone)]
pub struct Constraint {
    id: ConstraintId,
    parent: Option<ConstraintId>,
    predicate: Option<Predicate>,
    children: Vec<ConstraintId>,
    shadow_children: Vec<ConstraintId>,
    mirror_children: Vec<ConstraintId>,
    siblings: VecDeque<Predicate>,
    processed: bool,
    effect: Option<Expr>,
    four_way: bool,
    list: ChildList,
}

impl Constraint {
    fn new(id: ConstraintId, parent: Option<ConstraintId>, predicate: Option<Predicate>, list: ChildList, four_way: bool) -> Self {
        Self {
            id,
            parent,
            predicate,
            children: Vec::new(),
            shadow_children: Vec::new(),
            mirror_children: Vec::new(),
            siblings: VecDeque::new(),
            processed: false,
            effect: None,
            four_way,
            list,
        }
    }

    pub fn id(&self) -> ConstraintId {
        self.id
    }

    pub fn parent(&self) -> Option<ConstraintId> {
        self.parent
    }

    /// The predicate of the edge leading here; `None` only at the root.
    pub fn predicate(&self) -> Option<&Predicate> {
        self.predicate.as_ref()
    }

    pub fn children(&self, list: ChildList) -> &[ConstraintId] {
        match list {
            ChildList::Primary => &self.children,
            ChildList::Shadow => &self.shadow_children,
            ChildList::Mirror => &self.mirror_children,
        }
    }

    fn children_mut(&mut self, list: ChildList) -> &mut Vec<ConstraintId> {
        match list {
            ChildList::Primary => &mut self.children,
            ChildList::Shadow => &mut self.shadow_children,
            ChildList::Mirror => &mut self.mirror_children,
        }
    }

    /// Pending divergence candidates, in the order they will be tried.
    pub fn siblings(&self) -> &VecDeque<Predicate> {
        &self.siblings
    }

    pub fn is_processed(&self) -> bool {
        self.processed
    }

    pub fn effect(&self) -> Option<&Expr> {
        self.effect.as_ref()
    }

    /// Returns `true` for merged nodes created by four-way forking.
    pub fn is_four_way(&self) -> bool {
        self.four_way
    }

    /// The child list of the parent this node belongs to.
    pub fn list(&self) -> ChildList {
        self.list
    }
}

impl Display for Constraint {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.predicate {
            Some(p) => write!(f, "{} {}", self.id, p)?,
            None => write!(f, "{} <root>", self.id)?,
        }
        write!(f, " (processed: {})", self.processed)
    }
}

#[derive(Debug, Clone)]
pub struct ConstraintTree {
    nodes: Vec<Constraint>,
}

impl Default for ConstraintTree {
    fn default() -> Self {
        Self::new()
    }
}

impl ConstraintTree {
    pub fn new() -> Self {
        Self {
            nodes: vec![Constraint::new(ConstraintId::ROOT, None, None, ChildList::Primary, false)],
        }
    }

    pub fn root(&self) -> ConstraintId {
        ConstraintId::ROOT
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn get(&self, id: ConstraintId) -> &Constraint {
        &self.nodes[id.index()]
    }

    fn get_mut(&mut self, id: ConstraintId) -> &mut Constraint {
        &mut self.nodes[id.index()]
    }

    pub fn iter(&self) -> impl Iterator<Item = &Constraint> {
        self.nodes.iter()
    }

    pub fn children(&self, id: ConstraintId, list: ChildList) -> &[ConstraintId] {
        self.get(id).children(list)
    }

    pub fn find_child(&self, id: ConstraintId, predicate: &Predicate, list: ChildList) -> Option<ConstraintId> {
        self.children(id, list)
            .iter()
            .copied()
            .find(|&c| self.get(c).predicate.as_ref() == Some(predicate))
    }

    /// Appends a new child for `predicate` to the given child list of `id`.
    ///
    /// Panics if such a child already exists, if the node would exceed its
    /// child capacity, or if two two-way children would not be the two
    /// outcomes of one condition.
    pub fn add_child(&mut self, id: ConstraintId, predicate: Predicate, list: ChildList, four_way: bool) -> ConstraintId {
        assert!(
            self.find_child(id, &predicate, list).is_none(),
            "Constraint {} already has a child for {}",
            id,
            predicate
        );

        let same_kind: Vec<ConstraintId> = self
            .children(id, list)
            .iter()
            .copied()
            .filter(|&c| self.get(c).four_way == four_way)
            .collect();
        if four_way {
            assert!(
                same_kind.len() < MAX_FOUR_WAY_CHILDREN,
                "Constraint {} cannot have more than {} merged children",
                id,
                MAX_FOUR_WAY_CHILDREN
            );
        } else {
            assert!(
                same_kind.len() < MAX_TWO_WAY_CHILDREN,
                "Constraint {} cannot have more than {} children",
                id,
                MAX_TWO_WAY_CHILDREN
            );
            if list == ChildList::Primary {
                if let Some(&other) = same_kind.first() {
                    let other = self.get(other).predicate.as_ref();
                    assert_eq!(
                        other,
                        Some(&predicate.negated()),
                        "Two children of {} must be the two outcomes of the same condition",
                        id
                    );
                }
            }
        }

        let child = ConstraintId::new(self.nodes.len() as u32);
        self.nodes.push(Constraint::new(child, Some(id), Some(predicate), list, four_way));
        self.get_mut(id).children_mut(list).push(child);
        debug!("New constraint: {}", self.get(child));
        child
    }

    /// Finds the child for `predicate`, creating it if needed.
    ///
    /// Returns the child and whether it was created.
    pub fn find_or_add_child(&mut self, id: ConstraintId, predicate: Predicate, list: ChildList, four_way: bool) -> (ConstraintId, bool) {
        match self.find_child(id, &predicate, list) {
            Some(c) => (c, false),
            None => (self.add_child(id, predicate, list, four_way), true),
        }
    }

    /// Queues a divergence candidate on `id`, in front if `priority` is set.
    pub fn add_sibling(&mut self, id: ConstraintId, predicate: Predicate, priority: bool) {
        debug!("New possible divergence on {}: {} (priority: {})", id, predicate, priority);
        let siblings = &mut self.get_mut(id).siblings;
        if priority {
            siblings.push_front(predicate);
        } else {
            siblings.push_back(predicate);
        }
    }

    pub fn pop_sibling(&mut self, id: ConstraintId) -> Option<Predicate> {
        self.get_mut(id).siblings.pop_front()
    }

    pub fn has_siblings(&self, id: ConstraintId) -> bool {
        !self.get(id).siblings.is_empty()
    }

    /// Returns `true` if `predicate` is pending as a sibling of any primary child of `id`.
    pub fn is_pending_sibling(&self, id: ConstraintId, predicate: &Predicate) -> bool {
        self.children(id, ChildList::Primary)
            .iter()
            .any(|&c| self.get(c).siblings.contains(predicate))
    }

    pub fn mark_processed(&mut self, id: ConstraintId) {
        self.get_mut(id).processed = true;
    }

    /// Records the effect of an execution ending at `id`. The first effect wins.
    ///
    /// Returns `true` if the effect was stored.
    pub fn set_effect(&mut self, id: ConstraintId, effect: Expr) -> bool {
        let node = self.get_mut(id);
        match &node.effect {
            None => {
                node.effect = Some(effect);
                true
            }
            Some(old) => {
                if *old != effect {
                    debug!("Keeping effect {} of {}, ignoring {}", old, id, effect);
                }
                false
            }
        }
    }

    /// Number of predicates on the path from the root to `id`.
    pub fn depth(&self, id: ConstraintId) -> usize {
        let mut depth = 0;
        let mut node = self.get(id);
        while let Some(parent) = node.parent {
            depth += 1;
            node = self.get(parent);
        }
        depth
    }

    /// The predicates of the proper ancestors of `id`, in root-to-node order.
    pub fn get_asserts(&self, id: ConstraintId) -> Vec<Predicate> {
        let mut asserts = Vec::new();
        let mut current = self.get(id).parent;
        while let Some(c) = current {
            let node = self.get(c);
            if let Some(p) = &node.predicate {
                asserts.push(p.clone());
            }
            current = node.parent;
        }
        asserts.reverse();
        asserts
    }

    /// The ancestor predicates of `id` and its own predicate, for the solver.
    ///
    /// Does not mark the node as processed.
    pub fn get_asserts_and_query(&self, id: ConstraintId) -> (Vec<Predicate>, Option<Predicate>) {
        (self.get_asserts(id), self.get(id).predicate.clone())
    }

    /// The path condition of `id` (its ancestors' predicates and its own) as formulas.
    pub fn path_condition(&self, id: ConstraintId) -> Vec<Expr> {
        let (asserts, own) = self.get_asserts_and_query(id);
        asserts.iter().chain(own.as_ref()).map(Predicate::to_expr).collect()
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;
    use crate::types::Sort;

    fn pred(c: i64, result: bool) -> Predicate {
        Predicate::new(Expr::gt(Expr::var("x", Sort::Int), Expr::int(c)), result)
    }

    #[test]
    fn test_add_and_find() {
        let mut tree = ConstraintTree::new();
        let root = tree.root();
        let a = tree.add_child(root, pred(0, true), ChildList::Primary, false);
        assert_eq!(tree.find_child(root, &pred(0, true), ChildList::Primary), Some(a));
        assert_eq!(tree.find_child(root, &pred(0, false), ChildList::Primary), None);
        assert_eq!(tree.find_child(root, &pred(0, true), ChildList::Shadow), None);
        let b = tree.add_child(root, pred(0, false), ChildList::Primary, false);
        assert_eq!(tree.children(root, ChildList::Primary), &[a, b]);
        assert_eq!(tree.get(b).parent(), Some(root));
        let s = tree.add_child(root, pred(0, true), ChildList::Shadow, false);
        assert_eq!(tree.get(s).list(), ChildList::Shadow);
        assert!(a < b);
    }

    #[test]
    #[should_panic(expected = "already has a child")]
    fn test_duplicate_child_panics() {
        let mut tree = ConstraintTree::new();
        let root = tree.root();
        tree.add_child(root, pred(0, true), ChildList::Primary, false);
        tree.add_child(root, pred(0, true), ChildList::Primary, false);
    }

    #[test]
    #[should_panic(expected = "same condition")]
    fn test_partition_violation_panics() {
        let mut tree = ConstraintTree::new();
        let root = tree.root();
        tree.add_child(root, pred(0, true), ChildList::Primary, false);
        tree.add_child(root, pred(1, false), ChildList::Primary, false);
    }

    #[test]
    #[should_panic(expected = "merged children")]
    fn test_four_way_capacity() {
        let mut tree = ConstraintTree::new();
        let root = tree.root();
        for c in 0..5 {
            tree.add_child(root, pred(c, true), ChildList::Primary, true);
        }
    }

    #[test]
    fn test_asserts_and_depth() {
        let mut tree = ConstraintTree::new();
        let root = tree.root();
        let a = tree.add_child(root, pred(0, true), ChildList::Primary, false);
        let b = tree.add_child(a, pred(5, false), ChildList::Primary, false);
        let c = tree.add_child(b, pred(3, true), ChildList::Primary, false);
        assert_eq!(tree.depth(root), 0);
        assert_eq!(tree.depth(c), 3);
        assert_eq!(tree.get_asserts(c), vec![pred(0, true), pred(5, false)]);
        let (asserts, query) = tree.get_asserts_and_query(c);
        assert_eq!(asserts.len(), 2);
        assert_eq!(query, Some(pred(3, true)));
        assert!(!tree.get(c).is_processed());
        let pc: Vec<String> = tree.path_condition(c).iter().map(|e| e.to_string()).collect();
        assert_eq!(pc, vec!["(> x 0)", "(not (> x 5))", "(> x 3)"]);
    }

    #[test]
    fn test_siblings() {
        let mut tree = ConstraintTree::new();
        let root = tree.root();
        let a = tree.add_child(root, pred(0, true), ChildList::Primary, true);
        tree.add_sibling(a, pred(1, true), false);
        tree.add_sibling(a, pred(2, true), true);
        tree.add_sibling(a, pred(3, true), false);
        assert!(tree.is_pending_sibling(root, &pred(3, true)));
        assert!(!tree.is_pending_sibling(root, &pred(4, true)));
        assert_eq!(tree.pop_sibling(a), Some(pred(2, true)));
        assert_eq!(tree.pop_sibling(a), Some(pred(1, true)));
        assert!(tree.has_siblings(a));
        assert_eq!(tree.pop_sibling(a), Some(pred(3, true)));
        assert!(!tree.has_siblings(a));
    }

    #[test]
    fn test_effect_first_write_wins() {
        let mut tree = ConstraintTree::new();
        let root = tree.root();
        assert!(tree.set_effect(root, Expr::int(1)));
        assert!(!tree.set_effect(root, Expr::int(2)));
        assert_eq!(tree.get(root).effect(), Some(&Expr::int(1)));
    }
}
