//! Z3 backend (feature `z3`).
//!
//! Each query builds a fresh `Context`, so no Z3 object outlives a call. After a
//! successful `solve` the values of all free variables are copied out of the Z3
//! model into a [`Model`]; later `value` queries evaluate against that copy.
//! Numerals are read from their printed form, so model values are not limited
//! to 64 bits.
//!
//! Integer `div`/`mod` in [`Expr`] use floor semantics while SMT-LIB uses
//! Euclidean division, so both are translated through a correction term.

use std::collections::{BTreeMap, HashMap};

use ::z3::ast::{self, Ast};
use ::z3::{Config, Context, SatResult};
use log::{debug, warn};
use num_bigint::BigInt;
use num_rational::BigRational;
use num_traits::{One, Zero};

use crate::expr::{ArithOp, CmpOp, Expr, ExprKind, Model};
use crate::solver::{SolveResult, Solver};
use crate::types::{Sort, Value};

#[derive(Debug, Default)]
pub struct Z3Solver {
    last_model: Option<Model>,
    last_result: Option<SolveResult>,
}

impl Z3Solver {
    pub fn new() -> Self {
        Self::default()
    }

    fn run(&self, assumptions: &[Expr], want_model: bool) -> (SolveResult, Option<Model>) {
        let cfg = Config::new();
        let ctx = Context::new(&cfg);
        let solver = ::z3::Solver::new(&ctx);

        let mut vars = BTreeMap::new();
        let mut tr = Translator {
            ctx: &ctx,
            consts: HashMap::new(),
        };
        for a in assumptions {
            a.collect_vars(&mut vars);
            solver.assert(&tr.boolean(a));
        }

        match solver.check() {
            SatResult::Sat => {}
            SatResult::Unsat => return (SolveResult::Unsat, None),
            SatResult::Unknown => {
                warn!("Z3 returned unknown: {:?}", solver.get_reason_unknown());
                return (SolveResult::Unknown, None);
            }
        }
        if !want_model {
            return (SolveResult::Sat, None);
        }

        let Some(z3_model) = solver.get_model() else {
            warn!("Z3 reported sat without a model");
            return (SolveResult::Unknown, None);
        };
        let mut model = Model::new();
        for (name, sort) in vars {
            let term = tr.term(&Expr::var(name.clone(), sort));
            let value = match sort {
                Sort::Bool => term
                    .as_bool()
                    .and_then(|b| z3_model.eval(&b, true))
                    .and_then(|b| b.as_bool())
                    .map(Value::Bool),
                Sort::Int => term
                    .as_int()
                    .and_then(|i| z3_model.eval(&i, true))
                    .and_then(|i| numeral(&i.to_string()))
                    .filter(|r| r.is_integer())
                    .map(|r| Value::Int(r.to_integer())),
                Sort::Real => term
                    .as_real()
                    .and_then(|r| z3_model.eval(&r, true))
                    .and_then(|r| numeral(&r.to_string()))
                    .map(Value::Real),
            };
            match value {
                Some(v) => model.insert(name, v),
                None => {
                    warn!("Could not read `{}` from the Z3 model", name);
                    return (SolveResult::Unknown, None);
                }
            }
        }
        (SolveResult::Sat, Some(model))
    }
}

struct Translator<'ctx> {
    ctx: &'ctx Context,
    consts: HashMap<String, ast::Dynamic<'ctx>>,
}

impl<'ctx> Translator<'ctx> {
    fn boolean(&mut self, e: &Expr) -> ast::Bool<'ctx> {
        self.term(e).as_bool().expect("boolean term")
    }

    fn int(&mut self, e: &Expr) -> ast::Int<'ctx> {
        self.term(e).as_int().expect("integer term")
    }

    fn real(&mut self, e: &Expr) -> ast::Real<'ctx> {
        let t = self.term(e);
        match t.as_int() {
            Some(i) => i.to_real(),
            None => t.as_real().expect("real term"),
        }
    }

    fn term(&mut self, e: &Expr) -> ast::Dynamic<'ctx> {
        let ctx = self.ctx;
        match e.kind() {
            ExprKind::Const(Value::Bool(b)) => ast::Bool::from_bool(ctx, *b).into(),
            ExprKind::Const(Value::Int(i)) => int_literal(ctx, i).into(),
            ExprKind::Const(Value::Real(r)) => {
                let n = int_literal(ctx, r.numer());
                let d = int_literal(ctx, r.denom());
                n.to_real().div(&d.to_real()).into()
            }
            ExprKind::Var(name, sort) => {
                if let Some(c) = self.consts.get(name) {
                    return c.clone();
                }
                let c: ast::Dynamic<'ctx> = match sort {
                    Sort::Bool => ast::Bool::new_const(ctx, name.as_str()).into(),
                    Sort::Int => ast::Int::new_const(ctx, name.as_str()).into(),
                    Sort::Real => ast::Real::new_const(ctx, name.as_str()).into(),
                };
                self.consts.insert(name.clone(), c.clone());
                c
            }
            ExprKind::Not(a) => self.boolean(a).not().into(),
            ExprKind::And(args) | ExprKind::Or(args) => {
                let terms: Vec<ast::Bool<'ctx>> = args.iter().map(|a| self.boolean(a)).collect();
                let refs: Vec<&ast::Bool<'ctx>> = terms.iter().collect();
                if matches!(e.kind(), ExprKind::And(_)) {
                    ast::Bool::and(ctx, &refs).into()
                } else {
                    ast::Bool::or(ctx, &refs).into()
                }
            }
            ExprKind::Cmp(op, a, b) => self.compare(*op, a, b).into(),
            ExprKind::Arith(op, a, b) if e.sort() == Sort::Real => {
                let (x, y) = (self.real(a), self.real(b));
                match op {
                    ArithOp::Add => ast::Real::add(ctx, &[&x, &y]).into(),
                    ArithOp::Sub => ast::Real::sub(ctx, &[&x, &y]).into(),
                    ArithOp::Mul => ast::Real::mul(ctx, &[&x, &y]).into(),
                    ArithOp::Div => x.div(&y).into(),
                    ArithOp::Mod => panic!("mod on reals"),
                }
            }
            ExprKind::Arith(op, a, b) => {
                let (x, y) = (self.int(a), self.int(b));
                match op {
                    ArithOp::Add => ast::Int::add(ctx, &[&x, &y]).into(),
                    ArithOp::Sub => ast::Int::sub(ctx, &[&x, &y]).into(),
                    ArithOp::Mul => ast::Int::mul(ctx, &[&x, &y]).into(),
                    ArithOp::Div => floor_div(ctx, &x, &y).into(),
                    ArithOp::Mod => {
                        let q = floor_div(ctx, &x, &y);
                        ast::Int::sub(ctx, &[&x, &ast::Int::mul(ctx, &[&y, &q])]).into()
                    }
                }
            }
            ExprKind::Neg(a) if a.sort() == Sort::Real => self.real(a).unary_minus().into(),
            ExprKind::Neg(a) => self.int(a).unary_minus().into(),
            ExprKind::ToReal(a) => self.real(a).into(),
            ExprKind::Ite(c, t, f) => {
                let c = self.boolean(c);
                let (t, f) = (self.term(t), self.term(f));
                c.ite(&t, &f)
            }
        }
    }

    fn compare(&mut self, op: CmpOp, a: &Expr, b: &Expr) -> ast::Bool<'ctx> {
        if a.sort() == Sort::Bool {
            let (x, y) = (self.boolean(a), self.boolean(b));
            return x._eq(&y);
        }
        if a.sort() == Sort::Int && b.sort() == Sort::Int {
            let (x, y) = (self.int(a), self.int(b));
            return match op {
                CmpOp::Eq => x._eq(&y),
                CmpOp::Lt => x.lt(&y),
                CmpOp::Le => x.le(&y),
                CmpOp::Gt => x.gt(&y),
                CmpOp::Ge => x.ge(&y),
            };
        }
        let (x, y) = (self.real(a), self.real(b));
        match op {
            CmpOp::Eq => x._eq(&y),
            CmpOp::Lt => x.lt(&y),
            CmpOp::Le => x.le(&y),
            CmpOp::Gt => x.gt(&y),
            CmpOp::Ge => x.ge(&y),
        }
    }
}

fn int_literal<'ctx>(ctx: &'ctx Context, i: &BigInt) -> ast::Int<'ctx> {
    ast::Int::from_str(ctx, &i.to_string()).expect("decimal integer literal")
}

/// Parses a numeral as Z3 prints it: `43`, `2.5`, `(- 7)` or `(/ 1.0 3.0)`.
fn numeral(text: &str) -> Option<BigRational> {
    let text = text.trim();
    if let Some(inner) = text.strip_prefix("(-").and_then(|t| t.strip_suffix(')')) {
        return numeral(inner).map(|v| -v);
    }
    if let Some(inner) = text.strip_prefix("(/").and_then(|t| t.strip_suffix(')')) {
        let inner = inner.trim();
        let mut depth = 0usize;
        let split = inner.char_indices().find(|&(_, c)| {
            match c {
                '(' => depth += 1,
                ')' => depth = depth.saturating_sub(1),
                _ => {}
            }
            depth == 0 && c.is_whitespace()
        })?;
        let (n, d) = (numeral(&inner[..split.0])?, numeral(&inner[split.0..])?);
        return (!d.is_zero()).then(|| n / d);
    }
    let (int, frac) = text.split_once('.').unwrap_or((text, ""));
    let digits: BigInt = format!("{}{}", int, frac).parse().ok()?;
    let scale = (0..frac.len()).fold(BigInt::one(), |acc, _| acc * 10);
    Some(BigRational::new(digits, scale))
}

/// Floor division expressed through SMT-LIB's Euclidean `div`.
fn floor_div<'ctx>(ctx: &'ctx Context, x: &ast::Int<'ctx>, y: &ast::Int<'ctx>) -> ast::Int<'ctx> {
    let zero = ast::Int::from_i64(ctx, 0);
    let one = ast::Int::from_i64(ctx, 1);
    let q = x.div(y);
    let r = x.modulo(y);
    let adjust = ast::Bool::and(ctx, &[&y.lt(&zero), &r._eq(&zero).not()]);
    adjust.ite(&ast::Int::sub(ctx, &[&q, &one]), &q)
}

impl Solver for Z3Solver {
    fn name(&self) -> &str {
        "z3"
    }

    fn solve(&mut self, assumptions: &[Expr]) -> SolveResult {
        debug!("SOLVING: {:?}", assumptions);
        let (result, model) = self.run(assumptions, true);
        self.last_model = model;
        self.last_result = Some(result);
        result
    }

    fn check(&mut self, assumptions: &[Expr]) -> SolveResult {
        self.run(assumptions, false).0
    }

    fn last_result(&self) -> SolveResult {
        self.last_result.unwrap_or(SolveResult::Unknown)
    }

    fn model(&self) -> Option<&Model> {
        self.last_model.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    #[test]
    fn test_z3_floor_division() {
        let x = Expr::var("x", Sort::Int);
        let mut solver = Z3Solver::new();
        let assumptions = [
            Expr::eq(x.clone(), Expr::int(7)),
            Expr::eq(Expr::div(x.clone(), Expr::int(-2)), Expr::int(-4)),
            Expr::eq(Expr::modulo(x.clone(), Expr::int(-2)), Expr::int(-1)),
        ];
        assert!(solver.solve(&assumptions).is_sat());
        assert_eq!(solver.value(&x), Some(Value::from(7)));
    }

    #[test]
    fn test_z3_unsat() {
        let x = Expr::var("x", Sort::Int);
        let mut solver = Z3Solver::new();
        let query = [Expr::gt(x.clone(), Expr::int(0)), Expr::lt(x, Expr::int(1))];
        assert_eq!(solver.solve(&query), SolveResult::Unsat);
    }

    #[test]
    fn test_z3_values_beyond_64_bits() {
        let x = Expr::var("x", Sort::Int);
        let big: BigInt = "100000000000000000000000".parse().unwrap();
        let mut solver = Z3Solver::new();
        assert!(solver.solve(&[Expr::gt(x.clone(), Expr::int(big.clone()))]).is_sat());
        let value = solver.value(&x).unwrap();
        assert!(value.as_int().is_some_and(|v| *v > big));

        let neg = -big.clone();
        assert!(solver.solve(&[Expr::eq(x.clone(), Expr::int(neg.clone()))]).is_sat());
        assert_eq!(solver.value(&x), Some(Value::Int(neg)));
    }

    #[test]
    fn test_numeral_forms() {
        assert_eq!(numeral("43"), Some(BigRational::from_integer(BigInt::from(43))));
        assert_eq!(numeral("(- 7)"), Some(BigRational::from_integer(BigInt::from(-7))));
        assert_eq!(numeral("2.5"), Some(BigRational::new(BigInt::from(5), BigInt::from(2))));
        assert_eq!(numeral("(/ 1.0 3.0)"), Some(BigRational::new(BigInt::from(1), BigInt::from(3))));
        assert_eq!(numeral("(- (/ 1.0 3.0))"), Some(BigRational::new(BigInt::from(-1), BigInt::from(3))));
        assert_eq!(numeral("x"), None);
    }
}
