use concolic_rs::constraint::ChildList;
use concolic_rs::engine::{ExplorationEngine, ExploreConfig};
use concolic_rs::program::{FnProgram, Param};
use concolic_rs::summary::{to_list_rep, TreeView};
use concolic_rs::symbolic::{Sym, SymBool, SymInt, SymValue};
use concolic_rs::types::{Sort, Value};
use num_bigint::BigInt;
use test_log::test;

fn int(v: &Value) -> BigInt {
    v.as_int().cloned().unwrap()
}

#[test]
fn test_off_by_one_is_reported() {
    // new: `x + 1`, old: `x`, behind a branch both variants agree on.
    let program = FnProgram::new(vec![Param::symbolic("x", Sort::Int)], |ctx, args| {
        let x: SymInt = args.int("x")?;
        let r = if ctx.branch(&x.gt(3)) { Sym::shadow(&x + 1, x.clone()) } else { x.clone() };
        Ok(SymValue::from(r))
    });
    let config = ExploreConfig::default().with_max_counterexamples(0);
    let mut engine = ExplorationEngine::new(program, config).unwrap();
    let result = engine.explore().unwrap();
    assert!(result.complete);
    assert_eq!(result.counterexamples.len(), 1);
    let cex = &result.counterexamples[0];
    assert_eq!(int(&cex.new_value) - int(&cex.old_value), BigInt::from(1));
    let x = int(&cex.inputs[0].1);
    assert!(x > BigInt::from(3));
}

#[test]
fn test_divergent_branch_is_found_first() {
    // new: `x > 5`, old: `x > 0`.
    let program = FnProgram::new(vec![Param::symbolic("x", Sort::Int)], |ctx, args| {
        let x: SymInt = args.int("x")?;
        let cond = Sym::shadow(x.gt(5), x.gt(0));
        Ok(SymValue::from(if ctx.branch(&cond) { 1 } else { 0 }))
    });
    let mut engine = ExplorationEngine::new(program, ExploreConfig::default()).unwrap();
    let result = engine.explore().unwrap();

    // The seed agrees on both sides; the first sibling tried is the divergent one.
    assert_eq!(result.stats.iterations, 2);
    assert_eq!(result.counterexamples.len(), 1);
    let cex = &result.counterexamples[0];
    let x = int(&cex.inputs[0].1);
    assert!(x > BigInt::from(0) && x <= BigInt::from(5));
    assert_eq!((cex.new_value.clone(), cex.old_value.clone()), (Value::from(0), Value::from(1)));

    let tree = &result.tree;
    let merged = tree.children(tree.root(), ChildList::Primary);
    assert_eq!(merged.len(), 2);
    assert!(merged.iter().all(|&c| tree.get(c).is_four_way()));
}

#[test]
fn test_all_combinations_are_explored() {
    let program = FnProgram::new(vec![Param::symbolic("x", Sort::Int)], |ctx, args| {
        let x: SymInt = args.int("x")?;
        let cond = Sym::shadow(x.gt(5), x.gt(0));
        Ok(SymValue::from(if ctx.branch(&cond) { 1 } else { 0 }))
    });
    let config = ExploreConfig::default().with_max_counterexamples(0);
    let mut engine = ExplorationEngine::new(program, config).unwrap();
    let result = engine.explore().unwrap();
    assert!(result.complete);
    // x <= 0, 0 < x <= 5 and x > 5; `x > 5 && x <= 0` is infeasible.
    assert_eq!(result.generated_inputs.len(), 3);
    assert_eq!(result.counterexamples.len(), 1);

    let tree = &result.tree;
    assert_eq!(tree.children(tree.root(), ChildList::Primary).len(), 3);
    assert_eq!(tree.children(tree.root(), ChildList::Shadow).len(), 2);
    assert_eq!(tree.children(tree.root(), ChildList::Mirror).len(), 2);

    let old = to_list_rep(tree, TreeView::Shadow);
    let new = to_list_rep(tree, TreeView::Mirror);
    assert_eq!(old.to_string(), "[(> x 0), 1, 0]");
    assert_eq!(new.to_string(), "[(> x 5), 1, 0]");
}

#[test]
fn test_identical_variants_report_nothing() {
    let program = FnProgram::new(vec![Param::symbolic("x", Sort::Int)], |ctx, args| {
        let x: SymInt = args.int("x")?;
        let cond = Sym::shadow(x.gt(2), x.gt(2));
        Ok(SymValue::from(if ctx.branch(&cond) { 1 } else { 0 }))
    });
    let mut engine = ExplorationEngine::new(program, ExploreConfig::default()).unwrap();
    let result = engine.explore().unwrap();
    assert!(result.complete);
    assert!(result.counterexamples.is_empty());
    assert_eq!(result.generated_inputs.len(), 2);
}

#[test]
fn test_one_sided_condition_views() {
    // new: always takes the branch, old: `x > 0`.
    let program = FnProgram::new(vec![Param::symbolic("x", Sort::Int)], |ctx, args| {
        let x: SymInt = args.int("x")?;
        let cond = Sym::shadow(SymBool::from(true), x.gt(0));
        Ok(SymValue::from(if ctx.branch(&cond) { 1 } else { 0 }))
    });
    let config = ExploreConfig::default().with_max_counterexamples(0);
    let mut engine = ExplorationEngine::new(program, config).unwrap();
    let result = engine.explore().unwrap();
    assert!(result.complete);
    assert_eq!(result.counterexamples.len(), 1);

    let tree = &result.tree;
    assert!(tree.children(tree.root(), ChildList::Mirror).is_empty());
    let new = to_list_rep(tree, TreeView::Mirror);
    let old = to_list_rep(tree, TreeView::Shadow);
    assert!(new.is_leaf());
    assert_eq!(new.to_string(), "1");
    assert_eq!(old.to_string(), "[(> x 0), 1, 0]");
}
