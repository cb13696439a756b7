//! Branch recording and forking.
//!
//! The [`PathRecorder`] follows one execution at a time through the
//! [`ConstraintTree`], extending the tree with every branch outcome it has not
//! seen before. New nodes are collected as *pending* and handed to the
//! exploration engine after the execution.
//!
//! # Two-way forking
//!
//! An ordinary branch `(e, r)` moves the current position to the child for
//! `(e, r)`, creating it if needed. Once both `(e, r)` and `(e, !r)` exist, both
//! are marked processed: nothing is left to solve at that branch.
//!
//! # Four-way forking
//!
//! Under differential exploration a branch carries two outcomes, `p` for the new
//! variant and `s` for the old. While the two variants still follow the same
//! path, the recorder moves along a *merged* child keyed by `p ∧ s` and queues
//! the feasible untried combinations of `p`, `s` and their negations as
//! *siblings* of that child. The first branch where `p` and `s` go different
//! ways marks the execution as diverged; from then on only `p` is recorded.
//!
//! Alongside the merged path, each variant's own outcomes are recorded in the
//! `Mirror` (new variant) and `Shadow` (old variant) child lists. A condition
//! that is symbolic in only one variant extends only that variant's list.

use log::{debug, warn};

use crate::constraint::{ChildList, ConstraintTree};
use crate::expr::Expr;
use crate::predicate::Predicate;
use crate::reference::ConstraintId;
use crate::solver::{SolveResult, Solver};

/// The path an execution is expected to take when replaying toward a target node.
#[derive(Debug, Clone)]
pub struct ExpectedPath {
    stack: Vec<Predicate>,
    flip_last: bool,
    cursor: usize,
}

impl ExpectedPath {
    /// Expect the path to `id` with its last branch taken the other way.
    pub fn flip(tree: &ConstraintTree, id: ConstraintId) -> Self {
        let (mut stack, own) = tree.get_asserts_and_query(id);
        stack.extend(own);
        Self {
            stack,
            flip_last: true,
            cursor: 0,
        }
    }

    /// Expect the path to the parent of `id`, with no constraint on what follows.
    pub fn follow(tree: &ConstraintTree, id: ConstraintId) -> Self {
        Self {
            stack: tree.get_asserts(id),
            flip_last: false,
            cursor: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.stack.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stack.is_empty()
    }

    /// The next expected direction, or `None` past the end of the path.
    fn next_direction(&mut self) -> Option<bool> {
        let p = self.stack.get(self.cursor)?;
        self.cursor += 1;
        let last = self.cursor == self.stack.len();
        Some(if last && self.flip_last { !p.result() } else { p.result() })
    }
}

#[derive(Debug)]
pub struct PathRecorder {
    tree: ConstraintTree,
    current: ConstraintId,
    shadow_current: ConstraintId,
    mirror_current: ConstraintId,
    expected: Option<ExpectedPath>,
    max_depth: usize,
    guard: Option<Expr>,
    diverged: bool,
    divergence_seen: bool,
    pruned: bool,
    pending: Vec<ConstraintId>,
    replay_mismatches: usize,
    undecided: usize,
}

impl PathRecorder {
    /// Creates a recorder over a fresh tree.
    ///
    /// `max_depth` bounds the length of recorded paths (`0` = unbounded). When a
    /// `guard` is given, outcomes inconsistent with it are pruned.
    pub fn new(max_depth: usize, guard: Option<Expr>) -> Self {
        let tree = ConstraintTree::new();
        let root = tree.root();
        Self {
            tree,
            current: root,
            shadow_current: root,
            mirror_current: root,
            expected: None,
            max_depth,
            guard,
            diverged: false,
            divergence_seen: false,
            pruned: false,
            pending: Vec::new(),
            replay_mismatches: 0,
            undecided: 0,
        }
    }

    pub fn tree(&self) -> &ConstraintTree {
        &self.tree
    }

    pub(crate) fn tree_mut(&mut self) -> &mut ConstraintTree {
        &mut self.tree
    }

    pub fn guard(&self) -> Option<&Expr> {
        self.guard.as_ref()
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Prepares for the next execution.
    pub fn reset(&mut self, expected: Option<ExpectedPath>) {
        debug!("EXPECTED PATH: {:?}", expected.as_ref().map(|e| &e.stack));
        let root = self.tree.root();
        self.current = root;
        self.shadow_current = root;
        self.mirror_current = root;
        self.expected = expected;
        self.diverged = false;
        self.pruned = false;
    }

    /// Position on the merged (or two-way) path.
    pub fn current(&self) -> ConstraintId {
        self.current
    }

    /// Position on the old variant's own path.
    pub fn shadow_current(&self) -> ConstraintId {
        self.shadow_current
    }

    /// Position on the new variant's own path.
    pub fn mirror_current(&self) -> ConstraintId {
        self.mirror_current
    }

    /// Returns `true` if the variants have taken different ways in this execution.
    pub fn is_diverged(&self) -> bool {
        self.diverged
    }

    /// Returns `true` if any execution so far has diverged.
    pub fn divergence_seen(&self) -> bool {
        self.divergence_seen
    }

    /// Returns `true` if this execution left the space allowed by the guard.
    pub fn is_pruned(&self) -> bool {
        self.pruned
    }

    pub fn replay_mismatches(&self) -> usize {
        self.replay_mismatches
    }

    /// Number of feasibility checks the solver could not decide.
    pub fn undecided(&self) -> usize {
        self.undecided
    }

    /// Takes the nodes created since the last call, in creation order.
    pub fn take_pending(&mut self) -> Vec<ConstraintId> {
        std::mem::take(&mut self.pending)
    }

    pub fn flag_divergence(&mut self) {
        if !self.diverged {
            debug!("Paths diverged at {}", self.current);
        }
        self.diverged = true;
        self.divergence_seen = true;
    }

    fn depth_reached(&self, at: ConstraintId) -> bool {
        self.max_depth > 0 && self.tree.depth(at) >= self.max_depth
    }

    /// Checks that taking `outcome` at `at` is consistent with the guard.
    ///
    /// An undecided check counts as inconsistent.
    fn allowed(&mut self, solver: &mut dyn Solver, at: ConstraintId, outcome: &Expr) -> bool {
        let Some(guard) = &self.guard else {
            return true;
        };
        let mut query = self.tree.path_condition(at);
        query.push(guard.clone());
        query.push(outcome.clone());
        match solver.check(&query) {
            SolveResult::Sat => true,
            SolveResult::Unsat => false,
            SolveResult::Unknown => {
                warn!("Guard check undecided at {}: {}", at, outcome);
                self.undecided += 1;
                false
            }
        }
    }

    fn check_expected(&mut self, taken: &Predicate) {
        let Some(expected) = self.expected.as_mut() else {
            return;
        };
        match expected.next_direction() {
            Some(direction) if direction != taken.result() => {
                warn!(
                    "Replay mismatch at step {}/{}: expected {}, took {}",
                    expected.cursor,
                    expected.len(),
                    direction,
                    taken
                );
                self.replay_mismatches += 1;
            }
            Some(_) => {}
            None => self.expected = None,
        }
    }

    /// Moves from `at` along the `list` child for `predicate`, creating it if needed.
    ///
    /// Returns `None` when the depth bound is reached or the outcome is pruned.
    fn fork_two_way(
        &mut self,
        solver: &mut dyn Solver,
        at: ConstraintId,
        predicate: &Predicate,
        list: ChildList,
    ) -> Option<ConstraintId> {
        if self.depth_reached(at) {
            debug!("Max depth ({}) reached", self.max_depth);
            return None;
        }
        let child = match self.tree.find_child(at, predicate, list) {
            Some(c) => c,
            None => {
                if !self.allowed(solver, at, &predicate.to_expr()) {
                    debug!("Path pruned by guard: {} {}", at, predicate);
                    self.pruned = true;
                    return None;
                }
                let c = self.tree.add_child(at, predicate.clone(), list, false);
                self.pending.push(c);
                c
            }
        };
        if let Some(neg) = self.tree.find_child(at, &predicate.negated(), list) {
            self.tree.mark_processed(neg);
            self.tree.mark_processed(child);
        }
        Some(child)
    }

    /// Extends one of the per-variant histories without queueing anything.
    fn extend_history(&mut self, at: ConstraintId, predicate: Predicate, list: ChildList) -> ConstraintId {
        if self.depth_reached(at) {
            return at;
        }
        self.tree.find_or_add_child(at, predicate, list, false).0
    }

    /// Takes the two-way step for `predicate` on the merged path.
    fn step_primary(&mut self, solver: &mut dyn Solver, predicate: &Predicate) -> bool {
        if self.pruned {
            return false;
        }
        let Some(child) = self.fork_two_way(solver, self.current, predicate, ChildList::Primary) else {
            return false;
        };
        self.check_expected(predicate);
        self.current = child;
        true
    }

    /// Records an ordinary branch of an execution following the new variant.
    pub fn report_branch(&mut self, solver: &mut dyn Solver, predicate: Predicate) {
        if !self.step_primary(solver, &predicate) {
            return;
        }
        if !self.diverged {
            self.shadow_current = self.extend_history(self.shadow_current, predicate.clone(), ChildList::Shadow);
        }
        self.mirror_current = self.extend_history(self.mirror_current, predicate, ChildList::Mirror);
    }

    /// Records a branch on a condition that only one variant computes symbolically.
    ///
    /// The merged path moves two-way on `predicate`. Of the per-variant
    /// histories, only `owner` (`Shadow` for the old variant, `Mirror` for the
    /// new one) is extended; the other variant does not branch here.
    pub fn report_one_sided(&mut self, solver: &mut dyn Solver, predicate: Predicate, owner: ChildList) {
        assert_ne!(owner, ChildList::Primary, "One-sided branches belong to a variant history");
        if !self.step_primary(solver, &predicate) {
            return;
        }
        if owner == ChildList::Shadow {
            self.shadow_current = self.extend_history(self.shadow_current, predicate, ChildList::Shadow);
        } else {
            self.mirror_current = self.extend_history(self.mirror_current, predicate, ChildList::Mirror);
        }
    }

    /// Records a branch of an execution following the old variant.
    pub fn report_shadow(&mut self, solver: &mut dyn Solver, predicate: Predicate) {
        if self.pruned {
            return;
        }
        let Some(child) = self.fork_two_way(solver, self.shadow_current, &predicate, ChildList::Shadow) else {
            return;
        };
        self.check_expected(&predicate);
        self.shadow_current = child;
    }

    /// Records a branch with outcome `p` in the new variant and `s` in the old one.
    pub fn report_four_way(&mut self, solver: &mut dyn Solver, p: Predicate, s: Predicate) {
        if self.pruned {
            return;
        }
        if p == s || self.diverged {
            return self.report_branch(solver, p);
        }
        let at = self.current;
        if self.depth_reached(at) {
            debug!("Max depth ({}) reached", self.max_depth);
            return;
        }

        let merged = p.and(&s);
        let node = match self.tree.find_child(at, &merged, ChildList::Primary) {
            Some(c) => c,
            None => {
                if !self.allowed(solver, at, &merged.to_expr()) {
                    debug!("Path pruned by guard: {} {}", at, merged);
                    self.pruned = true;
                    return;
                }
                let c = self.tree.add_child(at, merged.clone(), ChildList::Primary, true);
                self.pending.push(c);
                self.probe_siblings(solver, at, c, &p, &s);
                c
            }
        };

        self.check_expected(&merged);
        self.current = node;
        self.shadow_current = self.extend_history(self.shadow_current, s.clone(), ChildList::Shadow);
        self.mirror_current = self.extend_history(self.mirror_current, p.clone(), ChildList::Mirror);
        if p.result() != s.result() {
            self.flag_divergence();
        }
    }

    /// Queues the feasible untried combinations of `p` and `s` on the merged node.
    fn probe_siblings(&mut self, solver: &mut dyn Solver, at: ConstraintId, node: ConstraintId, p: &Predicate, s: &Predicate) {
        let mut base = self.tree.path_condition(at);
        base.extend(self.guard.clone());

        let combinations = [
            (p.negated(), s.clone()),
            (p.clone(), s.negated()),
            (p.negated(), s.negated()),
        ];
        for (cp, cs) in combinations {
            let combo = cp.and(&cs);
            if self.tree.find_child(at, &combo, ChildList::Primary).is_some() || self.tree.is_pending_sibling(at, &combo) {
                continue;
            }
            let mut query = base.clone();
            query.push(combo.to_expr());
            match solver.check(&query) {
                SolveResult::Sat => {}
                SolveResult::Unsat => {
                    debug!("Path is not feasible: {} {}", at, combo);
                    continue;
                }
                SolveResult::Unknown => {
                    warn!("Feasibility of {} {} is undecided", at, combo);
                    self.undecided += 1;
                    continue;
                }
            }
            let diverging = cp.result() != cs.result();
            let priority = if self.divergence_seen { !diverging } else { diverging };
            self.tree.add_sibling(node, combo, priority);
        }
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;
    use crate::solver::BoundedSolver;
    use crate::types::Sort;

    fn x() -> Expr {
        Expr::var("x", Sort::Int)
    }

    fn gt(c: i64, result: bool) -> Predicate {
        Predicate::new(Expr::gt(x(), Expr::int(c)), result)
    }

    #[test]
    fn test_two_way_growth() {
        let mut solver = BoundedSolver::default();
        let mut rec = PathRecorder::new(0, None);
        rec.report_branch(&mut solver, gt(0, true));
        rec.report_branch(&mut solver, gt(5, false));
        assert_eq!(rec.tree().depth(rec.current()), 2);
        assert_eq!(rec.take_pending().len(), 2);

        rec.reset(None);
        rec.report_branch(&mut solver, gt(0, true));
        assert!(rec.take_pending().is_empty());
        rec.report_branch(&mut solver, gt(5, true));
        let pending = rec.take_pending();
        assert_eq!(pending.len(), 1);
        assert!(rec.tree().get(pending[0]).is_processed());
        let other = rec.tree().find_child(rec.tree().get(pending[0]).parent().unwrap(), &gt(5, false), ChildList::Primary);
        assert!(rec.tree().get(other.unwrap()).is_processed());
    }

    #[test]
    fn test_max_depth() {
        let mut solver = BoundedSolver::default();
        let mut rec = PathRecorder::new(1, None);
        rec.report_branch(&mut solver, gt(0, true));
        rec.report_branch(&mut solver, gt(5, true));
        assert_eq!(rec.tree().depth(rec.current()), 1);
        // Root plus one node in each child list.
        assert_eq!(rec.tree().len(), 4);
    }

    #[test]
    fn test_guard_prunes() {
        let mut solver = BoundedSolver::default();
        let guard = Expr::gt(x(), Expr::int(10));
        let mut rec = PathRecorder::new(0, Some(guard));
        rec.report_branch(&mut solver, gt(5, false));
        assert!(rec.is_pruned());
        rec.report_branch(&mut solver, gt(20, true));
        assert_eq!(rec.tree().len(), 1);
        assert!(rec.take_pending().is_empty());
    }

    #[test]
    fn test_replay_mismatch_is_counted() {
        let mut solver = BoundedSolver::default();
        let mut rec = PathRecorder::new(0, None);
        rec.report_branch(&mut solver, gt(0, true));
        let target = rec.current();

        let expected = ExpectedPath::flip(rec.tree(), target);
        rec.reset(Some(expected));
        rec.report_branch(&mut solver, gt(0, false));
        assert_eq!(rec.replay_mismatches(), 0);

        let expected = ExpectedPath::flip(rec.tree(), target);
        rec.reset(Some(expected));
        rec.report_branch(&mut solver, gt(0, true));
        assert_eq!(rec.replay_mismatches(), 1);
    }

    #[test]
    fn test_four_way_merges_and_queues_siblings() {
        let mut solver = BoundedSolver::default();
        let mut rec = PathRecorder::new(0, None);
        // x = 3: new `x > 5` is false, old `x > 0` is true.
        rec.report_four_way(&mut solver, gt(5, false), gt(0, true));
        assert!(rec.is_diverged());
        let node = rec.current();
        let tree = rec.tree();
        assert!(tree.get(node).is_four_way());
        assert_eq!(tree.get(node).predicate().unwrap().expr().to_string(), "(and (not (> x 5)) (> x 0))");

        // Remaining combinations: (x>5 & x>0) feasible, (!x>5 & !x>0) feasible, (x>5 & !x>0) infeasible.
        let siblings: Vec<String> = tree.get(node).siblings().iter().map(|p| p.expr().to_string()).collect();
        assert_eq!(siblings, vec!["(and (> x 5) (> x 0))", "(and (not (> x 5)) (not (> x 0)))"]);

        let root = tree.root();
        assert_eq!(tree.children(root, ChildList::Shadow).len(), 1);
        assert_eq!(tree.children(root, ChildList::Mirror).len(), 1);

        // After divergence, later branches are two-way on the new outcome.
        rec.report_four_way(&mut solver, gt(1, true), gt(2, true));
        let last = rec.tree().get(rec.current());
        assert!(!last.is_four_way());
        assert_eq!(last.predicate(), Some(&gt(1, true)));
    }

    #[test]
    fn test_one_sided_branch_extends_owner_only() {
        let mut solver = BoundedSolver::default();
        let mut rec = PathRecorder::new(0, None);
        rec.report_one_sided(&mut solver, gt(0, true), ChildList::Shadow);
        let tree = rec.tree();
        let root = tree.root();
        assert_eq!(tree.children(root, ChildList::Primary).len(), 1);
        assert_eq!(tree.children(root, ChildList::Shadow).len(), 1);
        assert!(tree.children(root, ChildList::Mirror).is_empty());
        assert_eq!(rec.mirror_current(), root);

        rec.reset(None);
        rec.report_one_sided(&mut solver, gt(0, false), ChildList::Mirror);
        let tree = rec.tree();
        assert_eq!(tree.children(root, ChildList::Shadow).len(), 1);
        assert_eq!(tree.children(root, ChildList::Mirror).len(), 1);
        assert_eq!(rec.shadow_current(), root);
        assert_eq!(tree.get(rec.mirror_current()).predicate(), Some(&gt(0, false)));
    }

    #[test]
    fn test_undecided_checks_are_counted() {
        // `7x = 301` lies outside the bounded solver's candidates.
        let mut solver = BoundedSolver::default();
        let guard = Expr::eq(Expr::mul(x(), Expr::int(7)), Expr::int(301));
        let mut rec = PathRecorder::new(0, Some(guard));
        rec.report_branch(&mut solver, gt(0, true));
        assert!(rec.is_pruned());
        assert_eq!(rec.undecided(), 1);
    }

    #[test]
    fn test_sibling_priority_after_divergence() {
        let mut solver = BoundedSolver::default();
        let mut rec = PathRecorder::new(0, None);
        rec.flag_divergence();
        rec.reset(None);
        assert!(rec.divergence_seen());
        // Same direction in both variants: x = 7 with `x > 5` and `x > 0`.
        rec.report_four_way(&mut solver, gt(5, true), gt(0, true));
        assert!(!rec.is_diverged());
        let siblings: Vec<Predicate> = rec.tree().get(rec.current()).siblings().iter().cloned().collect();
        // A divergence was seen before, so the non-diverging combination comes first.
        assert_eq!(siblings[0], gt(5, false).and(&gt(0, false)));
        assert_eq!(siblings[1], gt(5, false).and(&gt(0, true)));
    }
}
