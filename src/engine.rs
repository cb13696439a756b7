//! The exploration loop.
//!
//! [`ExplorationEngine::explore`] runs the target once on inputs satisfying the
//! path guard, then repeatedly picks an unresolved constraint from the worklist,
//! asks the solver for inputs that take the branch not yet seen there, and runs
//! the target again on them. Every execution extends the constraint tree through
//! the [`PathRecorder`], which queues the new constraints it creates.
//!
//! Worklist entries are resolved in one of two ways:
//!
//! - a node with pending siblings (a merged node of a differential run) is
//!   resolved one sibling at a time, by solving its parent's path condition plus
//!   the sibling combination;
//! - any other node is resolved once, by solving its ancestors' predicates plus
//!   the negation of its own.
//!
//! A merged node whose siblings are used up has nothing left to solve.
//!
//! For targets returning differential values, an execution whose variants return
//! different concrete values is reported as a [`Counterexample`].
//!
//! An exploration is complete only if the worklist ran dry and the solver
//! decided every query it was given. Queries it could not decide are counted in
//! [`Stats::unknown`] and [`Stats::undecided_checks`].

use std::collections::VecDeque;

use log::{debug, info, warn};

use crate::constraint::{ChildList, ConstraintTree};
use crate::context::{ExecutionContext, Overrides};
use crate::dot::{self, DotConfig};
use crate::error::{Error, Result};
use crate::expr::Expr;
use crate::predicate::Predicate;
use crate::program::{validate, Args, Fault, Invocation, Param, ParamKind, Program};
use crate::recorder::{ExpectedPath, PathRecorder};
use crate::reference::ConstraintId;
use crate::result::{DisplayInputs, Inputs, ResultStore};
use crate::solver::{create_solver, SolveResult, Solver, SolverKind};
use crate::summary::{to_list_rep, to_summary, TreeView};
use crate::symbolic::SymValue;
use crate::types::{Sort, Value};

/// Exploration settings.
#[derive(Debug, Clone)]
pub struct ExploreConfig {
    /// Maximum number of executions, including the first one (0 = unbounded).
    pub max_iterations: usize,
    /// Maximum length of recorded paths (0 = unbounded).
    pub max_depth: usize,
    pub solver: SolverKind,
    /// Restricts exploration to inputs satisfying this formula.
    pub guard: Option<Expr>,
    pub summary: bool,
    pub graph: bool,
    /// Stop after this many counterexamples (0 = never stop early).
    pub max_counterexamples: usize,
}

impl Default for ExploreConfig {
    fn default() -> Self {
        Self {
            max_iterations: 0,
            max_depth: 0,
            solver: SolverKind::default(),
            guard: None,
            summary: false,
            graph: false,
            max_counterexamples: 1,
        }
    }
}

impl ExploreConfig {
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_solver(mut self, solver: SolverKind) -> Self {
        self.solver = solver;
        self
    }

    pub fn with_guard(mut self, guard: Expr) -> Self {
        self.guard = Some(guard);
        self
    }

    pub fn with_summary(mut self, summary: bool) -> Self {
        self.summary = summary;
        self
    }

    pub fn with_graph(mut self, graph: bool) -> Self {
        self.graph = graph;
        self
    }

    pub fn with_max_counterexamples(mut self, max_counterexamples: usize) -> Self {
        self.max_counterexamples = max_counterexamples;
        self
    }
}

/// Exploration counters.
#[derive(Debug, Default, Clone, Copy, Eq, PartialEq)]
pub struct Stats {
    /// Executions run on fresh inputs, the first one included.
    pub iterations: usize,
    /// Solver queries issued for worklist entries.
    pub processed: usize,
    /// Queries found unsatisfiable.
    pub unsat: usize,
    /// Worklist queries the solver could not decide.
    pub unknown: usize,
    /// Guard and sibling feasibility checks the solver could not decide.
    pub undecided_checks: usize,
    /// Models that reproduced earlier inputs.
    pub duplicates: usize,
    /// Executions abandoned for leaving the guarded input space.
    pub pruned: usize,
    /// Executions in which the target failed.
    pub failures: usize,
    pub replay_mismatches: usize,
}

/// Inputs on which the two variants of a target return different values.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Counterexample {
    pub inputs: Inputs,
    pub new_value: Value,
    pub old_value: Value,
}

/// The outcome of an exploration.
#[derive(Debug, Clone)]
pub struct Exploration {
    pub generated_inputs: Vec<Inputs>,
    /// One entry per generated input; `None` where the execution produced no value.
    pub return_values: Vec<Option<Value>>,
    pub counterexamples: Vec<Counterexample>,
    pub stats: Stats,
    /// `true` if the worklist was exhausted with every solver query decided.
    pub complete: bool,
    pub tree: ConstraintTree,
    pub summary: Option<Expr>,
    pub graph: Option<String>,
    /// Whether the return values matched the target's expected results, if it declares any.
    pub expected_check: Option<bool>,
}

pub struct ExplorationEngine<P> {
    program: P,
    params: Vec<Param>,
    config: ExploreConfig,
    solver: Box<dyn Solver>,
    recorder: PathRecorder,
    results: ResultStore,
    worklist: VecDeque<ConstraintId>,
    overrides: Overrides,
    counterexamples: Vec<Counterexample>,
    stats: Stats,
}

impl<P: Program> ExplorationEngine<P> {
    /// Creates an engine using the solver named in `config`.
    pub fn new(program: P, config: ExploreConfig) -> Result<Self> {
        let solver = create_solver(config.solver)?;
        Self::with_solver(program, config, solver)
    }

    /// Creates an engine with an explicit solver instance.
    pub fn with_solver(program: P, config: ExploreConfig, solver: Box<dyn Solver>) -> Result<Self> {
        let params = program.params();
        validate(&params, config.guard.as_ref())?;
        let recorder = PathRecorder::new(config.max_depth, config.guard.clone());
        Ok(Self {
            program,
            params,
            config,
            solver,
            recorder,
            results: ResultStore::new(),
            worklist: VecDeque::new(),
            overrides: Overrides::new(),
            counterexamples: Vec::new(),
            stats: Stats::default(),
        })
    }

    /// Replaces calls to the function `name` made through [`ExecutionContext::call`].
    pub fn with_override<F>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&mut ExecutionContext<'_>, &[SymValue]) -> std::result::Result<SymValue, Fault> + 'static,
    {
        self.overrides.insert(name, f);
        self
    }

    pub fn config(&self) -> &ExploreConfig {
        &self.config
    }

    pub fn tree(&self) -> &ConstraintTree {
        self.recorder.tree()
    }

    pub fn results(&self) -> &ResultStore {
        &self.results
    }

    pub fn stats(&self) -> Stats {
        self.stats
    }

    pub fn counterexamples(&self) -> &[Counterexample] {
        &self.counterexamples
    }

    pub fn worklist_len(&self) -> usize {
        self.worklist.len()
    }

    /// Runs the exploration until the worklist is empty or a limit is reached.
    pub fn explore(&mut self) -> Result<Exploration> {
        info!(
            "EXPLORATION START: solver = {}, max iterations = {}, max depth = {}",
            self.solver.name(),
            self.config.max_iterations,
            self.config.max_depth
        );

        let guard: Vec<Expr> = self.config.guard.iter().cloned().collect();
        let seed = self.solver.solve(&guard);
        if !seed.is_sat() {
            let text = self.config.guard.as_ref().map_or_else(|| "true".to_string(), Expr::to_string);
            return Err(match seed {
                SolveResult::Unsat => Error::UnsatisfiableGuard(text),
                _ => Error::UnsolvedGuard(text),
            });
        }
        let inputs = self.read_inputs();
        self.results.record_inputs(&inputs);
        self.stats.iterations += 1;
        self.execute(&inputs, None, true)?;

        let mut exhausted = false;
        loop {
            if self.config.max_iterations > 0 && self.stats.iterations >= self.config.max_iterations {
                info!("Maximum number of iterations reached ({})", self.config.max_iterations);
                break;
            }
            if self.config.max_counterexamples > 0 && self.counterexamples.len() >= self.config.max_counterexamples {
                info!("Counterexample limit reached ({})", self.config.max_counterexamples);
                break;
            }
            let Some(id) = self.worklist.pop_front() else {
                exhausted = true;
                break;
            };
            if self.recorder.tree().get(id).is_processed() {
                continue;
            }

            let Some((mut query, expected)) = self.next_query(id) else {
                debug!("Nothing left to try at {}", id);
                continue;
            };
            query.extend(self.config.guard.iter().cloned());
            self.stats.processed += 1;
            debug!("Solving for {}: {:?}", id, query);
            match self.solver.solve(&query) {
                SolveResult::Sat => {}
                SolveResult::Unsat => {
                    debug!("UNSAT: {}", id);
                    self.stats.unsat += 1;
                    continue;
                }
                SolveResult::Unknown => {
                    warn!("Solver could not decide the query for {}", id);
                    self.stats.unknown += 1;
                    continue;
                }
            }

            let inputs = self.read_inputs();
            if !self.results.record_inputs(&inputs) {
                debug!("Duplicate inputs: {}", DisplayInputs(&inputs));
                self.stats.duplicates += 1;
                continue;
            }
            self.stats.iterations += 1;
            self.execute(&inputs, expected, false)?;
        }

        let undecided = self.stats.unknown + self.stats.undecided_checks;
        let complete = exhausted && undecided == 0;
        if complete {
            info!("EXPLORATION COMPLETE");
        } else if exhausted {
            warn!("Worklist exhausted, but {} solver queries were left undecided", undecided);
        }
        info!(
            "Explored {} inputs ({} queries, {} unsat, {} duplicates)",
            self.results.len(),
            self.stats.processed,
            self.stats.unsat,
            self.stats.duplicates
        );
        self.finish(complete)
    }

    /// Runs the target on `inputs` outside the exploration loop.
    ///
    /// Inputs not seen before are recorded like generated ones. Constraints the
    /// run discovers are queued for the next call to [`explore`](Self::explore).
    pub fn run_inputs(&mut self, inputs: &Inputs) -> Result<Option<Value>> {
        if self.results.record_inputs(inputs) {
            self.execute(inputs, None, false)?;
            return Ok(self.results.return_values().last().cloned().flatten());
        }
        let outcome = self.run(inputs, None, false);
        self.worklist.extend(self.recorder.take_pending());
        self.stats.undecided_checks = self.recorder.undecided();
        match outcome {
            Invocation::Returned(value) if !self.recorder.is_pruned() => Ok(Some(value.value())),
            Invocation::Unsupported(msg) => Err(Error::Unsupported(msg)),
            _ => Ok(None),
        }
    }

    /// Builds the solver query (without the guard) and the expected path for `id`.
    ///
    /// Returns `None` for a merged node without siblings left to try.
    fn next_query(&mut self, id: ConstraintId) -> Option<(Vec<Expr>, Option<ExpectedPath>)> {
        let tree = self.recorder.tree_mut();
        if let Some(sibling) = tree.pop_sibling(id) {
            if tree.has_siblings(id) {
                self.worklist.push_front(id);
            } else {
                tree.mark_processed(id);
            }
            debug!("Trying sibling of {}: {}", id, sibling);
            let mut query = tree.get(id).parent().map(|p| tree.path_condition(p)).unwrap_or_default();
            query.push(sibling.to_expr());
            let expected = (tree.get(id).list() == ChildList::Primary).then(|| ExpectedPath::follow(tree, id));
            return Some((query, expected));
        }

        tree.mark_processed(id);
        if tree.get(id).is_four_way() {
            return None;
        }
        let (asserts, own) = tree.get_asserts_and_query(id);
        let mut query: Vec<Expr> = asserts.iter().map(Predicate::to_expr).collect();
        query.extend(own.map(|p| p.negated().to_expr()));
        let expected = (tree.get(id).list() == ChildList::Primary).then(|| ExpectedPath::flip(tree, id));
        Some((query, expected))
    }

    /// Reads the current model as an input tuple.
    fn read_inputs(&self) -> Inputs {
        self.params
            .iter()
            .map(|p| {
                let value = match p.kind() {
                    ParamKind::Symbolic(sort) => self
                        .solver
                        .value(&Expr::var(p.name(), *sort))
                        .unwrap_or_else(|| sort.default_value()),
                    ParamKind::Concrete(v) => v.clone(),
                };
                (p.name().to_string(), value)
            })
            .collect()
    }

    fn run(&mut self, inputs: &Inputs, expected: Option<ExpectedPath>, shadow_leading: bool) -> Invocation {
        self.recorder.reset(expected);
        let mut args = Args::new();
        for (param, (name, value)) in self.params.iter().zip(inputs) {
            let arg = if param.is_symbolic() {
                SymValue::symbol(name, value)
            } else {
                SymValue::constant(value)
            };
            args.insert(name.clone(), arg);
        }
        let mut ctx = ExecutionContext::new(&mut self.recorder, &mut *self.solver, &self.overrides, shadow_leading);
        self.program.invoke(&mut ctx, &args)
    }

    fn execute(&mut self, inputs: &Inputs, expected: Option<ExpectedPath>, seed: bool) -> Result<()> {
        info!("USING INPUTS: {}", DisplayInputs(inputs));
        let outcome = self.run(inputs, expected, false);
        let pruned = self.recorder.is_pruned();
        self.worklist.extend(self.recorder.take_pending());
        self.stats.replay_mismatches = self.recorder.replay_mismatches();
        self.stats.undecided_checks = self.recorder.undecided();

        match outcome {
            Invocation::Returned(value) if !pruned => {
                info!("RETURN: {}", value);
                let diverged = self.recorder.is_diverged();
                self.results.record_output(&mut self.recorder, &value, false);
                let old_value = if diverged {
                    self.run_shadow(inputs)?
                } else if value.is_shadow() {
                    Some(value.old_value())
                } else {
                    None
                };
                if let Some(old_value) = old_value {
                    let new_value = value.value();
                    if new_value != old_value {
                        info!(
                            "COUNTEREXAMPLE: {} (new: {}, old: {})",
                            DisplayInputs(inputs),
                            new_value,
                            old_value
                        );
                        self.counterexamples.push(Counterexample {
                            inputs: inputs.clone(),
                            new_value,
                            old_value,
                        });
                    }
                }
            }
            Invocation::Returned(_) | Invocation::Infeasible => {
                if pruned {
                    debug!("Execution left the guarded input space");
                    self.stats.pruned += 1;
                } else {
                    debug!("Execution is infeasible");
                }
                self.results.record_absent();
            }
            Invocation::Failed(msg) => {
                if seed {
                    return Err(Error::SeedFailed(msg));
                }
                warn!("Execution failed: {}", msg);
                self.stats.failures += 1;
                self.results.record_absent();
            }
            Invocation::Unsupported(msg) => return Err(Error::Unsupported(msg)),
        }
        Ok(())
    }

    /// Re-runs `inputs` following the old variant, returning its value.
    fn run_shadow(&mut self, inputs: &Inputs) -> Result<Option<Value>> {
        debug!("Re-running with the old variant leading");
        let outcome = self.run(inputs, None, true);
        let pruned = self.recorder.is_pruned();
        self.worklist.extend(self.recorder.take_pending());
        self.stats.undecided_checks = self.recorder.undecided();
        match outcome {
            Invocation::Returned(value) if !pruned => {
                self.results.record_output(&mut self.recorder, &value, true);
                Ok(Some(value.old_value()))
            }
            Invocation::Unsupported(msg) => Err(Error::Unsupported(msg)),
            Invocation::Failed(msg) => {
                warn!("Old variant failed: {}", msg);
                Ok(None)
            }
            _ => Ok(None),
        }
    }

    fn finish(&self, complete: bool) -> Result<Exploration> {
        let tree = self.recorder.tree();
        let (summary, graph) = if self.config.summary || self.config.graph {
            let rep = to_list_rep(tree, TreeView::Merged);
            let summary = if self.config.summary {
                let sort = self
                    .results
                    .return_values()
                    .iter()
                    .flatten()
                    .next()
                    .map_or(Sort::Int, Value::sort);
                Some(to_summary(&rep, &Expr::var("unknown", sort)))
            } else {
                None
            };
            let graph = if self.config.graph {
                Some(dot::to_dot(&rep, &DotConfig::default())?)
            } else {
                None
            };
            (summary, graph)
        } else {
            (None, None)
        };

        let expected_check = self.program.expected().map(|expected| {
            let values: Vec<Value> = self.results.return_values().iter().flatten().cloned().collect();
            expected.check(&values)
        });

        Ok(Exploration {
            generated_inputs: self.results.generated_inputs().to_vec(),
            return_values: self.results.return_values().to_vec(),
            counterexamples: self.counterexamples.clone(),
            stats: self.stats,
            complete,
            tree: tree.clone(),
            summary,
            graph,
            expected_check,
        })
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;
    use crate::program::{ExpectedResults, FnProgram};
    use crate::solver::BoundedSolver;
    use crate::symbolic::{Sym, SymInt};

    fn sign() -> impl Program {
        FnProgram::new(vec![Param::symbolic("x", Sort::Int)], |ctx, args| {
            let x = args.int("x")?;
            if ctx.branch(&x.gt(0)) {
                Ok(SymValue::from(1))
            } else if ctx.branch(&x.lt(0)) {
                Ok(SymValue::from(-1))
            } else {
                Ok(SymValue::from(0))
            }
        })
    }

    #[test]
    fn test_explore_sign() {
        let mut engine = ExplorationEngine::new(sign(), ExploreConfig::default()).unwrap();
        let result = engine.explore().unwrap();
        assert!(result.complete);
        assert_eq!(result.generated_inputs.len(), 3);
        let mut values: Vec<Value> = result.return_values.iter().flatten().cloned().collect();
        values.sort_by_key(|v| v.to_string());
        assert_eq!(values, vec![Value::from(-1), Value::from(0), Value::from(1)]);
        assert_eq!(result.stats.iterations, 3);
        assert_eq!(result.stats.replay_mismatches, 0);
        assert!(result.counterexamples.is_empty());
    }

    #[test]
    fn test_max_iterations() {
        let config = ExploreConfig::default().with_max_iterations(2);
        let mut engine = ExplorationEngine::new(sign(), config).unwrap();
        let result = engine.explore().unwrap();
        assert!(!result.complete);
        assert_eq!(result.generated_inputs.len(), 2);
    }

    #[test]
    fn test_concrete_params_are_fixed() {
        let program = FnProgram::new(
            vec![Param::symbolic("x", Sort::Int), Param::concrete("k", 10)],
            |ctx, args| {
                let (x, k) = (args.int("x")?, args.int("k")?);
                Ok(SymValue::from(ctx.branch(&x.gt(&k))))
            },
        );
        let mut engine = ExplorationEngine::new(program, ExploreConfig::default()).unwrap();
        let result = engine.explore().unwrap();
        assert_eq!(result.generated_inputs.len(), 2);
        assert!(result.generated_inputs.iter().all(|inputs| inputs[1] == ("k".to_string(), Value::from(10))));
    }

    fn scaled() -> impl Program {
        FnProgram::new(vec![Param::symbolic("x", Sort::Int)], |ctx, args| {
            let x = args.int("x")?;
            Ok(SymValue::from(if ctx.branch(&(&x * 7i64).eq(301)) { 1 } else { 2 }))
        })
    }

    #[test]
    fn test_undecided_query_is_not_complete() {
        // x = 43 is outside the bounded solver's candidates.
        let solver = Box::new(BoundedSolver::default());
        let mut engine = ExplorationEngine::with_solver(scaled(), ExploreConfig::default(), solver).unwrap();
        let result = engine.explore().unwrap();
        assert_eq!(engine.worklist_len(), 0);
        assert!(!result.complete);
        assert_eq!(result.stats.unknown, 1);
        assert_eq!(result.stats.unsat, 0);
        assert_eq!(result.return_values, vec![Some(Value::from(2))]);
    }

    #[cfg(feature = "z3")]
    #[test]
    fn test_z3_reaches_scaled_branch() {
        let config = ExploreConfig::default().with_solver(SolverKind::Z3);
        let mut engine = ExplorationEngine::new(scaled(), config).unwrap();
        let result = engine.explore().unwrap();
        assert!(result.complete);
        assert!(result.generated_inputs.contains(&vec![("x".to_string(), Value::from(43))]));
    }

    #[test]
    fn test_undecided_sibling_is_not_complete() {
        // The merged branch is feasible, but its siblings need 7x = 301.
        let program = FnProgram::new(vec![Param::symbolic("x", Sort::Int)], |ctx, args| {
            let x: SymInt = args.int("x")?;
            let cond = Sym::shadow(x.ge(0), (&x * 7i64).eq(301));
            Ok(SymValue::from(if ctx.branch(&cond) { 1 } else { 0 }))
        });
        let solver = Box::new(BoundedSolver::default());
        let config = ExploreConfig::default().with_max_counterexamples(0);
        let mut engine = ExplorationEngine::with_solver(program, config, solver).unwrap();
        let result = engine.explore().unwrap();
        assert_eq!(engine.worklist_len(), 0);
        assert!(!result.complete);
        assert!(result.stats.undecided_checks > 0);
    }

    #[test]
    fn test_merged_node_without_siblings_is_skipped() {
        // Both variants test `x` against zero, written differently.
        let program = FnProgram::new(vec![Param::symbolic("x", Sort::Int)], |ctx, args| {
            let x: SymInt = args.int("x")?;
            let cond = Sym::shadow(x.gt(0), x.ge(1));
            Ok(SymValue::from(if ctx.branch(&cond) { 1 } else { 0 }))
        });
        let solver = Box::new(BoundedSolver::default());
        let mut engine = ExplorationEngine::with_solver(program, ExploreConfig::default(), solver).unwrap();
        let result = engine.explore().unwrap();
        assert!(result.complete);
        assert_eq!(result.generated_inputs.len(), 2);
        // One sibling query; the merged nodes themselves are never solved.
        assert_eq!(result.stats.processed, 1);
        assert_eq!(result.stats.duplicates, 0);
        assert!(result.counterexamples.is_empty());
    }

    #[test]
    fn test_seed_failure_is_fatal() {
        let program = FnProgram::new(vec![Param::symbolic("x", Sort::Int)], |_, args| {
            let x = args.int("x")?;
            x.div_floor(0).map(SymValue::from)
        });
        let mut engine = ExplorationEngine::new(program, ExploreConfig::default()).unwrap();
        assert!(matches!(engine.explore(), Err(Error::SeedFailed(_))));
    }

    #[test]
    fn test_later_failure_is_a_dead_end() {
        let program = FnProgram::new(vec![Param::symbolic("x", Sort::Int)], |ctx, args| {
            let x = args.int("x")?;
            if ctx.branch(&x.gt(3)) {
                return Err(Fault::Failed("boom".to_string()));
            }
            Ok(SymValue::from(x))
        });
        let mut engine = ExplorationEngine::new(program, ExploreConfig::default()).unwrap();
        let result = engine.explore().unwrap();
        assert!(result.complete);
        assert_eq!(result.stats.failures, 1);
        assert_eq!(result.return_values.iter().filter(|v| v.is_none()).count(), 1);
    }

    #[test]
    fn test_unsupported_is_fatal() {
        let program = FnProgram::new(vec![Param::symbolic("x", Sort::Int)], |_, args| {
            let x = args.int("x")?;
            x.pow(x.clone()).map(SymValue::from)
        });
        let mut engine = ExplorationEngine::new(program, ExploreConfig::default()).unwrap();
        assert!(matches!(engine.explore(), Err(Error::Unsupported(_))));
    }

    #[test]
    fn test_unsatisfiable_guard() {
        let x = Expr::var("x", Sort::Int);
        let guard = Expr::and2(Expr::gt(x.clone(), Expr::int(1)), Expr::lt(x, Expr::int(0)));
        let mut engine = ExplorationEngine::new(sign(), ExploreConfig::default().with_guard(guard)).unwrap();
        assert!(matches!(engine.explore(), Err(Error::UnsatisfiableGuard(_))));
    }

    #[test]
    fn test_guard_must_name_symbolic_params() {
        let guard = Expr::gt(Expr::var("y", Sort::Int), Expr::int(0));
        let result = ExplorationEngine::new(sign(), ExploreConfig::default().with_guard(guard));
        assert!(matches!(result, Err(Error::InvalidProgram(_))));
    }

    #[test]
    fn test_override_is_used() {
        let program = FnProgram::new(vec![Param::symbolic("x", Sort::Int)], |ctx, args| {
            let x = args.int("x")?;
            let y = ctx.call("opaque", &[SymValue::from(x)], |_, _| Ok(SymValue::from(0)))?;
            match y {
                SymValue::Int(y) => Ok(SymValue::from(ctx.branch(&y.gt(5)))),
                _ => Err(Fault::Failed("expected an integer".to_string())),
            }
        });
        let mut engine = ExplorationEngine::new(program, ExploreConfig::default())
            .unwrap()
            .with_override("opaque", |_, args| match &args[0] {
                SymValue::Int(x) => Ok(SymValue::from(x * 2)),
                _ => Err(Fault::Unsupported("opaque".to_string())),
            });
        let result = engine.explore().unwrap();
        assert_eq!(result.generated_inputs.len(), 2);
        assert!(result.return_values.contains(&Some(Value::from(true))));
    }

    #[test]
    fn test_summary_and_graph() {
        let config = ExploreConfig::default().with_summary(true).with_graph(true);
        let program = FnProgram::new(vec![Param::symbolic("x", Sort::Int)], |ctx, args| {
            let x = args.int("x")?;
            Ok(SymValue::from(if ctx.branch(&x.gt(0)) { 1 } else { 2 }))
        });
        let mut engine = ExplorationEngine::new(program, config).unwrap();
        let result = engine.explore().unwrap();
        assert_eq!(result.summary.map(|s| s.to_string()), Some("(ite (> x 0) 1 2)".to_string()));
        assert!(result.graph.is_some_and(|g| g.starts_with("digraph")));
    }

    #[test]
    fn test_expected_results_check() {
        let program = FnProgram::new(vec![Param::symbolic("x", Sort::Int)], |ctx, args| {
            let x = args.int("x")?;
            Ok(SymValue::from(ctx.branch(&x.ge(0))))
        })
        .with_expected(ExpectedResults::Set(vec![Value::from(true), Value::from(false)]));
        let mut engine = ExplorationEngine::new(program, ExploreConfig::default()).unwrap();
        assert_eq!(engine.explore().unwrap().expected_check, Some(true));
    }

    #[test]
    fn test_differential_return_values() {
        let program = FnProgram::new(vec![Param::symbolic("x", Sort::Int)], |_, args| {
            let x: SymInt = args.int("x")?;
            Ok(SymValue::from(Sym::shadow(&x + 1, x)))
        });
        let mut engine = ExplorationEngine::new(program, ExploreConfig::default()).unwrap();
        let result = engine.explore().unwrap();
        assert_eq!(result.counterexamples.len(), 1);
        let cex = &result.counterexamples[0];
        assert_eq!(cex.inputs, vec![("x".to_string(), Value::from(0))]);
        assert_eq!((cex.new_value.clone(), cex.old_value.clone()), (Value::from(1), Value::from(0)));
    }
}
