use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;

use concolic_rs::constraint::{ChildList, ConstraintTree};
use concolic_rs::engine::{ExplorationEngine, ExploreConfig};
use concolic_rs::expr::{Expr, Model};
use concolic_rs::program::{FnProgram, Param, Program};
use concolic_rs::solver::{BoundedSolver, SolveResult, Solver};
use concolic_rs::symbolic::SymValue;
use concolic_rs::types::{Sort, Value};
use test_log::test;

/// Passes queries through to a [`BoundedSolver`], remembering every `solve` query.
struct RecordingSolver {
    inner: BoundedSolver,
    queries: Rc<RefCell<Vec<String>>>,
}

impl Solver for RecordingSolver {
    fn name(&self) -> &str {
        "recording"
    }

    fn solve(&mut self, assumptions: &[Expr]) -> SolveResult {
        let text: Vec<String> = assumptions.iter().map(|e| e.to_string()).collect();
        self.queries.borrow_mut().push(text.join(" & "));
        self.inner.solve(assumptions)
    }

    fn check(&mut self, assumptions: &[Expr]) -> SolveResult {
        self.inner.check(assumptions)
    }

    fn last_result(&self) -> SolveResult {
        self.inner.last_result()
    }

    fn model(&self) -> Option<&Model> {
        self.inner.model()
    }
}

fn quadrant() -> impl Program {
    FnProgram::new(
        vec![Param::symbolic("x", Sort::Int), Param::symbolic("y", Sort::Int)],
        |ctx, args| {
            let (x, y) = (args.int("x")?, args.int("y")?);
            let q = if ctx.branch(&x.gt(0)) {
                if ctx.branch(&y.gt(0)) {
                    1
                } else {
                    4
                }
            } else if ctx.branch(&y.gt(0)) {
                2
            } else {
                3
            };
            Ok(SymValue::from(q))
        },
    )
}

fn assert_partitioned(tree: &ConstraintTree) {
    for node in tree.iter() {
        let two_way: Vec<_> = node
            .children(ChildList::Primary)
            .iter()
            .map(|&c| tree.get(c))
            .filter(|c| !c.is_four_way())
            .collect();
        assert!(two_way.len() <= 2);
        if let [a, b] = two_way.as_slice() {
            let (pa, pb) = (a.predicate().unwrap(), b.predicate().unwrap());
            assert_eq!(pa.expr(), pb.expr(), "children of {} branch on different conditions", node.id());
            assert_ne!(pa.result(), pb.result());
        }
    }
}

#[test]
fn test_quadrant_is_covered() {
    let mut engine = ExplorationEngine::new(quadrant(), ExploreConfig::default()).unwrap();
    let result = engine.explore().unwrap();
    assert!(result.complete);
    let values: HashSet<String> = result.return_values.iter().flatten().map(|v| v.to_string()).collect();
    assert_eq!(values, HashSet::from(["1", "2", "3", "4"].map(String::from)));
    assert_eq!(result.generated_inputs.len(), 4);
    assert_partitioned(&result.tree);
}

#[test]
fn test_no_query_is_solved_twice() {
    let queries = Rc::new(RefCell::new(Vec::new()));
    let solver = RecordingSolver {
        inner: BoundedSolver::default(),
        queries: Rc::clone(&queries),
    };
    let mut engine = ExplorationEngine::with_solver(quadrant(), ExploreConfig::default(), Box::new(solver)).unwrap();
    let result = engine.explore().unwrap();
    assert!(result.complete);

    let queries = queries.borrow();
    let unique: HashSet<&String> = queries.iter().collect();
    assert_eq!(unique.len(), queries.len(), "repeated queries: {:?}", queries);
    // The seed query plus one per worklist entry that was not skipped.
    assert_eq!(queries.len(), 1 + result.stats.processed);
}

#[test]
fn test_depth_bound() {
    for depth in 1..=2 {
        let config = ExploreConfig::default().with_max_depth(depth);
        let mut engine = ExplorationEngine::new(quadrant(), config).unwrap();
        let result = engine.explore().unwrap();
        assert!(result.complete);
        for node in result.tree.iter() {
            assert!(result.tree.depth(node.id()) <= depth);
        }
    }

    let config = ExploreConfig::default().with_max_depth(1);
    let mut engine = ExplorationEngine::new(quadrant(), config).unwrap();
    let result = engine.explore().unwrap();
    // Only the first branch is explored.
    assert_eq!(result.generated_inputs.len(), 2);
}

#[test]
fn test_repeated_inputs_do_not_grow_the_tree() {
    let mut engine = ExplorationEngine::new(quadrant(), ExploreConfig::default()).unwrap();
    let result = engine.explore().unwrap();
    let size = engine.tree().len();
    for inputs in &result.generated_inputs {
        engine.run_inputs(inputs).unwrap();
    }
    assert_eq!(engine.tree().len(), size);
    assert_eq!(engine.results().len(), result.generated_inputs.len());
    assert_eq!(engine.worklist_len(), 0);
}

#[test]
fn test_round_trip_summary() {
    let program = FnProgram::new(vec![Param::symbolic("x", Sort::Int)], |ctx, args| {
        let x = args.int("x")?;
        Ok(SymValue::from(if ctx.branch(&x.gt(0)) { 1 } else { 2 }))
    });
    let config = ExploreConfig::default().with_summary(true);
    let mut engine = ExplorationEngine::new(program, config).unwrap();
    let result = engine.explore().unwrap();
    let summary = result.summary.unwrap();
    assert_eq!(summary.to_string(), "(ite (> x 0) 1 2)");

    let x = Expr::var("x", Sort::Int);
    for (v, expected) in [(-3, 2), (0, 2), (1, 1), (40, 1)] {
        let model: Model = [("x".to_string(), Value::from(v))].into_iter().collect();
        assert_eq!(summary.eval(&model).unwrap(), Value::from(expected));
    }
    assert_eq!(summary.vars().into_iter().collect::<Vec<_>>(), vec![("x".to_string(), x.sort())]);
}

#[test]
fn test_guard_restricts_inputs() {
    let program = FnProgram::new(vec![Param::symbolic("x", Sort::Int)], |ctx, args| {
        let x = args.int("x")?;
        let r = if ctx.branch(&x.gt(20)) {
            1
        } else if ctx.branch(&x.lt(5)) {
            2
        } else {
            3
        };
        Ok(SymValue::from(r))
    });
    let guard = Expr::gt(Expr::var("x", Sort::Int), Expr::int(10));
    let config = ExploreConfig::default().with_guard(guard.clone());
    let mut engine = ExplorationEngine::new(program, config).unwrap();
    let result = engine.explore().unwrap();
    assert!(result.complete);
    assert!(!result.generated_inputs.is_empty());
    for inputs in &result.generated_inputs {
        let model: Model = inputs.iter().cloned().collect();
        assert!(guard.holds(&model), "{:?} violates the guard", inputs);
    }
    assert!(!result.return_values.contains(&Some(Value::from(2))));
}
