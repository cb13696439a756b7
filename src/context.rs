//! Per-execution state handed to the target.

use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use log::debug;

use crate::constraint::ChildList;
use crate::predicate::Predicate;
use crate::program::Fault;
use crate::recorder::PathRecorder;
use crate::solver::Solver;
use crate::symbolic::{SymBool, SymValue};

/// A symbolic replacement for a concrete function of the target.
pub type Override = Rc<dyn Fn(&mut ExecutionContext<'_>, &[SymValue]) -> Result<SymValue, Fault>>;

/// Function replacements, by function name.
#[derive(Clone, Default)]
pub struct Overrides {
    map: BTreeMap<String, Override>,
}

impl Overrides {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert<F>(&mut self, name: impl Into<String>, f: F)
    where
        F: Fn(&mut ExecutionContext<'_>, &[SymValue]) -> Result<SymValue, Fault> + 'static,
    {
        self.map.insert(name.into(), Rc::new(f));
    }

    pub fn get(&self, name: &str) -> Option<&Override> {
        self.map.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.map.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.map.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

impl fmt::Debug for Overrides {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.map.keys()).finish()
    }
}

/// The target's view of the exploration during one execution.
///
/// Branch conditions are reported through [`branch`](Self::branch), which returns
/// the concrete direction to take. Which variant's direction that is depends on
/// whether this execution follows the new variant (the default) or the old one.
pub struct ExecutionContext<'a> {
    recorder: &'a mut PathRecorder,
    solver: &'a mut dyn Solver,
    overrides: &'a Overrides,
    shadow_leading: bool,
}

impl<'a> ExecutionContext<'a> {
    pub fn new(
        recorder: &'a mut PathRecorder,
        solver: &'a mut dyn Solver,
        overrides: &'a Overrides,
        shadow_leading: bool,
    ) -> Self {
        Self {
            recorder,
            solver,
            overrides,
            shadow_leading,
        }
    }

    /// Returns `true` if this execution follows the old variant.
    pub fn is_shadow_leading(&self) -> bool {
        self.shadow_leading
    }

    /// Reports a branch on `cond` and returns the direction to take.
    ///
    /// Conditions that do not depend on symbolic inputs are not recorded, but a
    /// disagreement between the variants on one still marks the paths as diverged.
    pub fn branch(&mut self, cond: &SymBool) -> bool {
        let (new, new_expr) = (*cond.value(), cond.expr());
        let new_ground = new_expr.as_const().is_some();

        if !cond.is_shadow() {
            if !new_ground {
                let p = Predicate::new(new_expr.clone(), new);
                if self.shadow_leading {
                    self.recorder.report_shadow(&mut *self.solver, p);
                } else {
                    self.recorder.report_branch(&mut *self.solver, p);
                }
            }
            return new;
        }

        let (old, old_expr) = (*cond.old_value(), cond.old_expr());
        let old_ground = old_expr.as_const().is_some();

        if self.shadow_leading {
            if !old_ground {
                self.recorder.report_shadow(&mut *self.solver, Predicate::new(old_expr.clone(), old));
            }
            return old;
        }

        if new != old && (new_ground || old_ground) {
            debug!("Variants disagree on {} / {}", new_expr, old_expr);
            self.recorder.flag_divergence();
        }
        match (new_ground, old_ground) {
            (true, true) => {}
            (true, false) => {
                let s = Predicate::new(old_expr.clone(), old);
                self.recorder.report_one_sided(&mut *self.solver, s, ChildList::Shadow);
            }
            (false, true) => {
                let p = Predicate::new(new_expr.clone(), new);
                self.recorder.report_one_sided(&mut *self.solver, p, ChildList::Mirror);
            }
            (false, false) => {
                let p = Predicate::new(new_expr.clone(), new);
                let s = Predicate::new(old_expr.clone(), old);
                self.recorder.report_four_way(&mut *self.solver, p, s);
            }
        }
        new
    }

    /// Reports `cond` like [`branch`](Self::branch) and returns whether it holds.
    ///
    /// Targets return [`Fault::Infeasible`] when an assumption fails.
    pub fn assume(&mut self, cond: &SymBool) -> bool {
        self.branch(cond)
    }

    /// Calls the function `name`, using its registered override if there is one
    /// and the concrete implementation otherwise.
    pub fn call(
        &mut self,
        name: &str,
        args: &[SymValue],
        concrete: impl FnOnce(&mut Self, &[SymValue]) -> Result<SymValue, Fault>,
    ) -> Result<SymValue, Fault> {
        if let Some(f) = self.overrides.get(name).cloned() {
            debug!("Replacing call to `{}`", name);
            return f(self, args);
        }
        concrete(self, args)
    }
}

#[cfg(test)]
mod tests {
    use num_bigint::BigInt;
    use test_log::test;

    use super::*;
    use crate::constraint::ChildList;
    use crate::solver::BoundedSolver;
    use crate::symbolic::{Sym, SymInt};

    fn x(v: i64) -> SymInt {
        Sym::symbol("x", BigInt::from(v))
    }

    #[test]
    fn test_branch_records_symbolic_conditions() {
        let mut recorder = PathRecorder::new(0, None);
        let mut solver = BoundedSolver::default();
        let overrides = Overrides::new();
        let mut ctx = ExecutionContext::new(&mut recorder, &mut solver, &overrides, false);
        assert!(ctx.branch(&x(3).gt(0)));
        assert!(!ctx.branch(&SymInt::from(3).gt(5)));
        assert!(!ctx.branch(&x(3).gt(5)));
        let tree = recorder.tree();
        assert_eq!(tree.depth(recorder.current()), 2);
        assert_eq!(tree.children(tree.root(), ChildList::Primary).len(), 1);
    }

    #[test]
    fn test_branch_follows_leading_variant() {
        let mut recorder = PathRecorder::new(0, None);
        let mut solver = BoundedSolver::default();
        let overrides = Overrides::new();
        let cond = Sym::shadow(x(3).gt(5), x(3).gt(0));

        let mut ctx = ExecutionContext::new(&mut recorder, &mut solver, &overrides, false);
        assert!(!ctx.branch(&cond));
        assert!(recorder.is_diverged());

        recorder.reset(None);
        let mut ctx = ExecutionContext::new(&mut recorder, &mut solver, &overrides, true);
        assert!(ctx.branch(&cond));
        let tree = recorder.tree();
        assert_eq!(tree.children(tree.root(), ChildList::Shadow).len(), 1);
    }

    #[test]
    fn test_ground_disagreement_diverges() {
        let mut recorder = PathRecorder::new(0, None);
        let mut solver = BoundedSolver::default();
        let overrides = Overrides::new();
        let mut ctx = ExecutionContext::new(&mut recorder, &mut solver, &overrides, false);
        let cond = Sym::shadow(SymBool::from(true), SymBool::from(false));
        assert!(ctx.branch(&cond));
        assert!(recorder.is_diverged());
        assert_eq!(recorder.tree().len(), 1);
    }

    #[test]
    fn test_ground_half_leaves_its_history_alone() {
        let mut recorder = PathRecorder::new(0, None);
        let mut solver = BoundedSolver::default();
        let overrides = Overrides::new();
        let mut ctx = ExecutionContext::new(&mut recorder, &mut solver, &overrides, false);
        // The new variant always takes the branch; the old one tests `x > 0`.
        let cond = Sym::shadow(SymBool::from(true), x(3).gt(0));
        assert!(ctx.branch(&cond));
        // The new variant keeps its own value, the old one is symbolic.
        let cond = Sym::shadow(x(3).gt(5), SymBool::from(true));
        assert!(!ctx.branch(&cond));

        let tree = recorder.tree();
        let root = tree.root();
        let shadow = tree.children(root, ChildList::Shadow);
        assert_eq!(shadow.len(), 1);
        assert_eq!(tree.get(shadow[0]).predicate().unwrap().expr().to_string(), "(> x 0)");
        assert!(tree.children(shadow[0], ChildList::Shadow).is_empty());
        let mirror = tree.children(root, ChildList::Mirror);
        assert_eq!(mirror.len(), 1);
        assert_eq!(tree.get(mirror[0]).predicate().unwrap().expr().to_string(), "(> x 5)");
        assert_eq!(tree.depth(recorder.current()), 2);
    }

    #[test]
    fn test_call_uses_override() {
        let mut recorder = PathRecorder::new(0, None);
        let mut solver = BoundedSolver::default();
        let mut overrides = Overrides::new();
        overrides.insert("lib", |_, _| Ok(SymValue::from(42)));
        let mut ctx = ExecutionContext::new(&mut recorder, &mut solver, &overrides, false);
        let args = [SymValue::from(1)];
        let replaced = ctx.call("lib", &args, |_, _| Ok(SymValue::from(0))).unwrap();
        assert_eq!(replaced.value(), crate::types::Value::from(42));
        let kept = ctx.call("other", &args, |_, _| Ok(SymValue::from(7))).unwrap();
        assert_eq!(kept.value(), crate::types::Value::from(7));
    }
}
