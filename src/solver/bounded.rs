//! Enumerative model finder.
//!
//! [`BoundedSolver`] searches a finite candidate domain per variable:
//!
//! - `Bool`: `false`, `true`;
//! - `Int`: the window `-radius..=radius`, plus every integer constant `c`
//!   occurring in the assumptions together with `c - 1` and `c + 1`;
//! - `Real`: the integer candidates and their midpoints `c + 1/2`.
//!
//! Top-level comparisons of a variable with a constant bound that variable to an
//! interval. An empty interval refutes the query outright. An integer whose
//! interval is small enough is enumerated in full instead of sampled.
//!
//! Candidates are ordered by magnitude and assignments are enumerated in layers
//! (all assignments using only the first `k` candidates of every domain come
//! before any assignment using the `k+1`-th), so models use small values when
//! small values exist. Every reported model satisfies the assumptions. A query is
//! reported unsatisfiable only when the search covered every possible value of
//! every variable; otherwise running out of candidates or out of the assignment
//! budget is reported as [`SolveResult::Unknown`].

use std::collections::BTreeMap;

use log::{debug, warn};
use num_bigint::BigInt;
use num_rational::BigRational;
use num_traits::{Signed, ToPrimitive};

use crate::expr::{rational, CmpOp, Expr, ExprKind, Model};
use crate::solver::{SolveResult, Solver};
use crate::types::{Sort, Value};

/// Integer intervals up to this size are enumerated exhaustively.
const FULL_RANGE: u64 = 4096;

#[derive(Debug, Clone)]
pub struct BoundedSolver {
    radius: i64,
    budget: u64,
    last_model: Option<Model>,
    last_result: SolveResult,
}

impl Default for BoundedSolver {
    fn default() -> Self {
        BoundedSolver::new(16, 2_000_000)
    }
}

impl BoundedSolver {
    pub fn new(radius: i64, budget: u64) -> Self {
        assert!(radius >= 0, "Radius should be non-negative");
        Self {
            radius,
            budget,
            last_model: None,
            last_result: SolveResult::Unknown,
        }
    }

    /// Candidate values for one variable, and whether they cover all of its values.
    fn domain(&self, sort: Sort, bounds: &Bounds, consts: &[BigInt]) -> (Vec<Value>, bool) {
        if sort == Sort::Bool {
            return (vec![Value::Bool(false), Value::Bool(true)], true);
        }

        if sort == Sort::Int {
            if let Some((lo, hi)) = bounds.int_range() {
                if (&hi - &lo).to_u64().is_some_and(|n| n < FULL_RANGE) {
                    let mut ints: Vec<BigInt> = enumerate(&lo, &hi);
                    ints.sort_by(|a, b| a.abs().cmp(&b.abs()).then(b.cmp(a)));
                    return (ints.into_iter().map(Value::Int).collect(), true);
                }
            }
        }

        let mut ints: Vec<BigInt> = (-self.radius..=self.radius).map(BigInt::from).collect();
        for c in consts {
            ints.push(c - 1);
            ints.push(c.clone());
            ints.push(c + 1);
        }
        ints.sort_by(|a, b| a.abs().cmp(&b.abs()).then(b.cmp(a)));
        ints.dedup();

        let values: Vec<Value> = match sort {
            Sort::Int => ints.into_iter().map(Value::Int).collect(),
            _ => {
                let half = rational(1, 2);
                let mut reals: Vec<BigRational> = Vec::with_capacity(ints.len() * 2);
                for i in ints {
                    let r = BigRational::from_integer(i);
                    reals.push(&r + &half);
                    reals.push(r);
                }
                reals.sort_by(|a, b| a.abs().cmp(&b.abs()).then(b.cmp(a)));
                reals.dedup();
                reals.into_iter().map(Value::Real).collect()
            }
        };
        let mut values: Vec<Value> = values.into_iter().filter(|v| bounds.contains(v)).collect();
        if values.is_empty() {
            values.extend(bounds.witness(sort));
        }
        (values, false)
    }

    fn search(&self, assumptions: &[Expr]) -> (SolveResult, Option<Model>) {
        let mut vars = BTreeMap::new();
        let mut consts = Vec::new();
        for a in assumptions {
            a.collect_vars(&mut vars);
            a.collect_int_consts(&mut consts);
        }

        // Ground assumptions decide on their own.
        let empty = Model::new();
        if assumptions.iter().filter(|a| a.is_ground()).any(|a| !a.holds(&empty)) {
            return (SolveResult::Unsat, None);
        }
        let open: Vec<&Expr> = assumptions.iter().filter(|a| !a.is_ground()).collect();
        if open.is_empty() {
            return (SolveResult::Sat, Some(empty));
        }

        let mut bounds: BTreeMap<String, Bounds> = BTreeMap::new();
        for a in &open {
            collect_bounds(a, true, &mut bounds);
        }
        if let Some((name, _)) = bounds.iter().find(|(_, b)| b.is_empty()) {
            debug!("No value of `{}` satisfies its bounds", name);
            return (SolveResult::Unsat, None);
        }

        let names: Vec<String> = vars.keys().cloned().collect();
        let mut domains: Vec<Vec<Value>> = Vec::with_capacity(names.len());
        let mut exhaustive = true;
        for (name, &sort) in &vars {
            let (domain, full) = self.domain(sort, bounds.get(name).unwrap_or(&Bounds::default()), &consts);
            exhaustive &= full;
            domains.push(domain);
        }
        if domains.iter().any(Vec::is_empty) {
            return (SolveResult::Unknown, None);
        }
        let max_len = domains.iter().map(Vec::len).max().unwrap_or(0);

        let mut search = Search {
            names: &names,
            domains: &domains,
            assumptions: &open,
            budget: self.budget,
            index: vec![0; names.len()],
        };
        for level in 0..max_len {
            match search.visit(level, 0, false) {
                Step::Found(model) => return (SolveResult::Sat, Some(model)),
                Step::Exhausted => {
                    warn!("Bounded solver gave up after {} assignments", self.budget);
                    return (SolveResult::Unknown, None);
                }
                Step::Continue => {}
            }
        }
        if exhaustive {
            (SolveResult::Unsat, None)
        } else {
            debug!("No model within the candidate domain of {:?}", names);
            (SolveResult::Unknown, None)
        }
    }
}

/// Every integer in `lo..=hi`.
fn enumerate(lo: &BigInt, hi: &BigInt) -> Vec<BigInt> {
    let mut out = Vec::new();
    let mut i = lo.clone();
    while &i <= hi {
        out.push(i.clone());
        i += 1;
    }
    out
}

/// Bounds on one variable: `(value, strict)` at either end.
#[derive(Debug, Clone, Default)]
struct Bounds {
    lower: Option<(BigRational, bool)>,
    upper: Option<(BigRational, bool)>,
    integral: bool,
}

impl Bounds {
    fn tighten_lower(&mut self, value: BigRational, strict: bool) {
        let tighter = match &self.lower {
            None => true,
            Some((v, s)) => value > *v || (value == *v && strict && !s),
        };
        if tighter {
            self.lower = Some((value, strict));
        }
    }

    fn tighten_upper(&mut self, value: BigRational, strict: bool) {
        let tighter = match &self.upper {
            None => true,
            Some((v, s)) => value < *v || (value == *v && strict && !s),
        };
        if tighter {
            self.upper = Some((value, strict));
        }
    }

    /// Inclusive integer bounds, when both ends are known.
    fn int_range(&self) -> Option<(BigInt, BigInt)> {
        let (lo, lo_strict) = self.lower.as_ref()?;
        let (hi, hi_strict) = self.upper.as_ref()?;
        let lo = if *lo_strict { lo.floor().to_integer() + 1 } else { lo.ceil().to_integer() };
        let hi = if *hi_strict { hi.ceil().to_integer() - 1 } else { hi.floor().to_integer() };
        Some((lo, hi))
    }

    fn is_empty(&self) -> bool {
        if self.integral {
            return self.int_range().is_some_and(|(lo, hi)| lo > hi);
        }
        match (&self.lower, &self.upper) {
            (Some((lo, ls)), Some((hi, hs))) => lo > hi || (lo == hi && (*ls || *hs)),
            _ => false,
        }
    }

    fn contains(&self, value: &Value) -> bool {
        let v = match value {
            Value::Int(i) => BigRational::from_integer(i.clone()),
            Value::Real(r) => r.clone(),
            Value::Bool(_) => return true,
        };
        let above = match &self.lower {
            Some((lo, true)) => v > *lo,
            Some((lo, false)) => v >= *lo,
            None => true,
        };
        let below = match &self.upper {
            Some((hi, true)) => v < *hi,
            Some((hi, false)) => v <= *hi,
            None => true,
        };
        above && below
    }

    /// Some value inside the bounds.
    fn witness(&self, sort: Sort) -> Option<Value> {
        let value = if sort == Sort::Int {
            let v = match (&self.lower, &self.upper) {
                (Some((lo, true)), _) => lo.floor().to_integer() + 1,
                (Some((lo, false)), _) => lo.ceil().to_integer(),
                (None, Some((hi, true))) => hi.ceil().to_integer() - 1,
                (None, Some((hi, false))) => hi.floor().to_integer(),
                (None, None) => BigInt::from(0),
            };
            Value::Int(v)
        } else {
            let one = BigRational::from_integer(BigInt::from(1));
            let v = match (&self.lower, &self.upper) {
                (Some((lo, _)), Some((hi, _))) => (lo + hi) / BigRational::from_integer(BigInt::from(2)),
                (Some((lo, _)), None) => lo + one,
                (None, Some((hi, _))) => hi - one,
                (None, None) => BigRational::from_integer(BigInt::from(0)),
            };
            Value::Real(v)
        };
        self.contains(&value).then_some(value)
    }
}

/// Collects bounds from comparisons of a variable with a constant that must hold
/// (`positive`) or must fail.
fn collect_bounds(e: &Expr, positive: bool, out: &mut BTreeMap<String, Bounds>) {
    match e.kind() {
        ExprKind::And(args) if positive => {
            for a in args {
                collect_bounds(a, true, out);
            }
        }
        ExprKind::Or(args) if !positive => {
            for a in args {
                collect_bounds(a, false, out);
            }
        }
        ExprKind::Not(inner) => collect_bounds(inner, !positive, out),
        ExprKind::Cmp(op, a, b) => {
            let (name, sort, c, op) = match (a.kind(), b.as_const()) {
                (ExprKind::Var(name, sort), Some(c)) => (name, *sort, c, *op),
                _ => match (a.as_const(), b.kind()) {
                    (Some(c), ExprKind::Var(name, sort)) => (name, *sort, c, mirrored(*op)),
                    _ => return,
                },
            };
            let c = match c {
                Value::Int(i) => BigRational::from_integer(i.clone()),
                Value::Real(r) => r.clone(),
                Value::Bool(_) => return,
            };
            let bounds = out.entry(name.clone()).or_default();
            bounds.integral = sort == Sort::Int;
            match (op, positive) {
                (CmpOp::Eq, true) => {
                    bounds.tighten_lower(c.clone(), false);
                    bounds.tighten_upper(c, false);
                }
                (CmpOp::Eq, false) => {}
                (CmpOp::Lt, true) | (CmpOp::Ge, false) => bounds.tighten_upper(c, true),
                (CmpOp::Le, true) | (CmpOp::Gt, false) => bounds.tighten_upper(c, false),
                (CmpOp::Gt, true) | (CmpOp::Le, false) => bounds.tighten_lower(c, true),
                (CmpOp::Ge, true) | (CmpOp::Lt, false) => bounds.tighten_lower(c, false),
            }
        }
        _ => {}
    }
}

/// The operator with its operands swapped: `c < x` is `x > c`.
fn mirrored(op: CmpOp) -> CmpOp {
    match op {
        CmpOp::Eq => CmpOp::Eq,
        CmpOp::Lt => CmpOp::Gt,
        CmpOp::Le => CmpOp::Ge,
        CmpOp::Gt => CmpOp::Lt,
        CmpOp::Ge => CmpOp::Le,
    }
}

enum Step {
    Found(Model),
    Exhausted,
    Continue,
}

struct Search<'a> {
    names: &'a [String],
    domains: &'a [Vec<Value>],
    assumptions: &'a [&'a Expr],
    budget: u64,
    index: Vec<usize>,
}

impl Search<'_> {
    /// Visits every assignment whose indices are all `<= level`, with at least one equal to `level`.
    fn visit(&mut self, level: usize, var: usize, hit: bool) -> Step {
        if var == self.names.len() {
            if !hit {
                return Step::Continue;
            }
            if self.budget == 0 {
                return Step::Exhausted;
            }
            self.budget -= 1;
            let model: Model = self
                .names
                .iter()
                .zip(&self.index)
                .zip(self.domains)
                .map(|((name, &i), domain)| (name.clone(), domain[i].clone()))
                .collect();
            if self.assumptions.iter().all(|a| a.holds(&model)) {
                return Step::Found(model);
            }
            return Step::Continue;
        }

        let top = level.min(self.domains[var].len() - 1);
        for k in 0..=top {
            self.index[var] = k;
            match self.visit(level, var + 1, hit || k == level) {
                Step::Continue => {}
                done => return done,
            }
        }
        Step::Continue
    }
}

impl Solver for BoundedSolver {
    fn name(&self) -> &str {
        "bounded"
    }

    fn solve(&mut self, assumptions: &[Expr]) -> SolveResult {
        debug!("SOLVING: {:?}", assumptions);
        let (result, model) = self.search(assumptions);
        self.last_model = model;
        self.last_result = result;
        result
    }

    fn check(&mut self, assumptions: &[Expr]) -> SolveResult {
        self.search(assumptions).0
    }

    fn last_result(&self) -> SolveResult {
        self.last_result
    }

    fn model(&self) -> Option<&Model> {
        self.last_model.as_ref()
    }
}
