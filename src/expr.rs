//! Symbolic expressions.
//!
//! [`Expr`] is the opaque expression abstraction the exploration engine works with:
//! an immutable, reference-counted tree over boolean, integer and real sorts.
//! Two expressions are equal iff they are structurally identical, which is the
//! equality the constraint tree uses to match branch predicates.
//!
//! Expressions print as SMT-LIB-style s-expressions:
//!
//! ```
//! use concolic_rs::expr::Expr;
//! use concolic_rs::types::Sort;
//!
//! let x = Expr::var("x", Sort::Int);
//! let e = Expr::gt(x, Expr::int(0));
//! assert_eq!(e.to_string(), "(> x 0)");
//! ```
//!
//! The textual form can be read back with [`crate::sexpr::parse`].

use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use num_bigint::BigInt;
use num_integer::Integer;
use num_rational::BigRational;
use num_traits::{One, Zero};

use crate::types::{Sort, Value};

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum CmpOp {
    Eq,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CmpOp {
    pub fn symbol(self) -> &'static str {
        match self {
            CmpOp::Eq => "=",
            CmpOp::Lt => "<",
            CmpOp::Le => "<=",
            CmpOp::Gt => ">",
            CmpOp::Ge => ">=",
        }
    }
}

/// Arithmetic operators. `Div` and `Mod` use floor semantics on integers;
/// `Div` is exact division on reals.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub enum ExprKind {
    Const(Value),
    Var(String, Sort),
    Not(Expr),
    And(Vec<Expr>),
    Or(Vec<Expr>),
    Cmp(CmpOp, Expr, Expr),
    Arith(ArithOp, Expr, Expr),
    Neg(Expr),
    ToReal(Expr),
    Ite(Expr, Expr, Expr),
}

#[derive(Clone, Eq, PartialEq, Hash)]
pub struct Expr(Rc<ExprKind>);

#[derive(Debug, Clone, Eq, PartialEq, thiserror::Error)]
pub enum EvalError {
    #[error("division by zero")]
    DivisionByZero,
    #[error("sort mismatch: expected {expected}, found {found}")]
    SortMismatch { expected: Sort, found: Sort },
}

/// An assignment of concrete values to variable names.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct Model {
    values: BTreeMap<String, Value>,
}

impl Model {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: Value) {
        self.values.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.values.iter()
    }
}

impl FromIterator<(String, Value)> for Model {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

impl Expr {
    pub fn new(kind: ExprKind) -> Self {
        Expr(Rc::new(kind))
    }

    pub fn kind(&self) -> &ExprKind {
        &self.0
    }

    pub fn constant(value: Value) -> Self {
        Expr::new(ExprKind::Const(value))
    }

    pub fn bool(value: bool) -> Self {
        Expr::constant(Value::Bool(value))
    }

    pub fn int(value: impl Into<BigInt>) -> Self {
        Expr::constant(Value::Int(value.into()))
    }

    pub fn real(value: BigRational) -> Self {
        Expr::constant(Value::Real(value))
    }

    pub fn var(name: impl Into<String>, sort: Sort) -> Self {
        Expr::new(ExprKind::Var(name.into(), sort))
    }

    /// Logical negation. Double negations and boolean constants are folded.
    pub fn not(e: Expr) -> Self {
        match e.kind() {
            ExprKind::Not(inner) => inner.clone(),
            ExprKind::Const(Value::Bool(b)) => Expr::bool(!b),
            _ => Expr::new(ExprKind::Not(e)),
        }
    }

    pub fn and(mut args: Vec<Expr>) -> Self {
        match args.len() {
            0 => Expr::bool(true),
            1 => args.swap_remove(0),
            _ => Expr::new(ExprKind::And(args)),
        }
    }

    pub fn and2(lhs: Expr, rhs: Expr) -> Self {
        Expr::and(vec![lhs, rhs])
    }

    pub fn or(mut args: Vec<Expr>) -> Self {
        match args.len() {
            0 => Expr::bool(false),
            1 => args.swap_remove(0),
            _ => Expr::new(ExprKind::Or(args)),
        }
    }

    pub fn or2(lhs: Expr, rhs: Expr) -> Self {
        Expr::or(vec![lhs, rhs])
    }

    pub fn cmp(op: CmpOp, lhs: Expr, rhs: Expr) -> Self {
        Expr::new(ExprKind::Cmp(op, lhs, rhs))
    }

    pub fn eq(lhs: Expr, rhs: Expr) -> Self {
        Expr::cmp(CmpOp::Eq, lhs, rhs)
    }

    pub fn lt(lhs: Expr, rhs: Expr) -> Self {
        Expr::cmp(CmpOp::Lt, lhs, rhs)
    }

    pub fn le(lhs: Expr, rhs: Expr) -> Self {
        Expr::cmp(CmpOp::Le, lhs, rhs)
    }

    pub fn gt(lhs: Expr, rhs: Expr) -> Self {
        Expr::cmp(CmpOp::Gt, lhs, rhs)
    }

    pub fn ge(lhs: Expr, rhs: Expr) -> Self {
        Expr::cmp(CmpOp::Ge, lhs, rhs)
    }

    pub fn arith(op: ArithOp, lhs: Expr, rhs: Expr) -> Self {
        Expr::new(ExprKind::Arith(op, lhs, rhs))
    }

    pub fn add(lhs: Expr, rhs: Expr) -> Self {
        Expr::arith(ArithOp::Add, lhs, rhs)
    }

    pub fn sub(lhs: Expr, rhs: Expr) -> Self {
        Expr::arith(ArithOp::Sub, lhs, rhs)
    }

    pub fn mul(lhs: Expr, rhs: Expr) -> Self {
        Expr::arith(ArithOp::Mul, lhs, rhs)
    }

    pub fn div(lhs: Expr, rhs: Expr) -> Self {
        Expr::arith(ArithOp::Div, lhs, rhs)
    }

    pub fn modulo(lhs: Expr, rhs: Expr) -> Self {
        Expr::arith(ArithOp::Mod, lhs, rhs)
    }

    pub fn neg(e: Expr) -> Self {
        Expr::new(ExprKind::Neg(e))
    }

    pub fn to_real(e: Expr) -> Self {
        if e.sort() == Sort::Real {
            return e;
        }
        Expr::new(ExprKind::ToReal(e))
    }

    pub fn ite(cond: Expr, then: Expr, else_: Expr) -> Self {
        Expr::new(ExprKind::Ite(cond, then, else_))
    }
}

impl Expr {
    pub fn sort(&self) -> Sort {
        match self.kind() {
            ExprKind::Const(v) => v.sort(),
            ExprKind::Var(_, sort) => *sort,
            ExprKind::Not(_) | ExprKind::And(_) | ExprKind::Or(_) | ExprKind::Cmp(..) => Sort::Bool,
            ExprKind::Arith(_, a, b) => {
                if a.sort() == Sort::Real || b.sort() == Sort::Real {
                    Sort::Real
                } else {
                    Sort::Int
                }
            }
            ExprKind::Neg(e) => e.sort(),
            ExprKind::ToReal(_) => Sort::Real,
            ExprKind::Ite(_, t, _) => t.sort(),
        }
    }

    pub fn as_const(&self) -> Option<&Value> {
        match self.kind() {
            ExprKind::Const(v) => Some(v),
            _ => None,
        }
    }

    /// Collects the free variables of the expression together with their sorts.
    pub fn vars(&self) -> BTreeMap<String, Sort> {
        let mut vars = BTreeMap::new();
        self.collect_vars(&mut vars);
        vars
    }

    pub(crate) fn collect_vars(&self, vars: &mut BTreeMap<String, Sort>) {
        match self.kind() {
            ExprKind::Const(_) => {}
            ExprKind::Var(name, sort) => {
                vars.insert(name.clone(), *sort);
            }
            ExprKind::Not(e) | ExprKind::Neg(e) | ExprKind::ToReal(e) => e.collect_vars(vars),
            ExprKind::And(args) | ExprKind::Or(args) => {
                for a in args {
                    a.collect_vars(vars);
                }
            }
            ExprKind::Cmp(_, a, b) | ExprKind::Arith(_, a, b) => {
                a.collect_vars(vars);
                b.collect_vars(vars);
            }
            ExprKind::Ite(c, t, e) => {
                c.collect_vars(vars);
                t.collect_vars(vars);
                e.collect_vars(vars);
            }
        }
    }

    /// Returns `true` if the expression has no free variables.
    pub fn is_ground(&self) -> bool {
        match self.kind() {
            ExprKind::Const(_) => true,
            ExprKind::Var(..) => false,
            ExprKind::Not(e) | ExprKind::Neg(e) | ExprKind::ToReal(e) => e.is_ground(),
            ExprKind::And(args) | ExprKind::Or(args) => args.iter().all(Expr::is_ground),
            ExprKind::Cmp(_, a, b) | ExprKind::Arith(_, a, b) => a.is_ground() && b.is_ground(),
            ExprKind::Ite(c, t, e) => c.is_ground() && t.is_ground() && e.is_ground(),
        }
    }

    /// Collects every integer constant occurring in the expression.
    pub(crate) fn collect_int_consts(&self, out: &mut Vec<BigInt>) {
        match self.kind() {
            ExprKind::Const(Value::Int(i)) => out.push(i.clone()),
            ExprKind::Const(Value::Real(r)) => out.push(r.floor().to_integer()),
            ExprKind::Const(_) | ExprKind::Var(..) => {}
            ExprKind::Not(e) | ExprKind::Neg(e) | ExprKind::ToReal(e) => e.collect_int_consts(out),
            ExprKind::And(args) | ExprKind::Or(args) => {
                for a in args {
                    a.collect_int_consts(out);
                }
            }
            ExprKind::Cmp(_, a, b) | ExprKind::Arith(_, a, b) => {
                a.collect_int_consts(out);
                b.collect_int_consts(out);
            }
            ExprKind::Ite(c, t, e) => {
                c.collect_int_consts(out);
                t.collect_int_consts(out);
                e.collect_int_consts(out);
            }
        }
    }
}

fn expect_bool(value: Value) -> Result<bool, EvalError> {
    match value {
        Value::Bool(b) => Ok(b),
        other => Err(EvalError::SortMismatch {
            expected: Sort::Bool,
            found: other.sort(),
        }),
    }
}

fn expect_real(value: &Value) -> Result<BigRational, EvalError> {
    value.to_real().ok_or(EvalError::SortMismatch {
        expected: Sort::Real,
        found: value.sort(),
    })
}

pub(crate) fn apply_cmp(op: CmpOp, a: &Value, b: &Value) -> Result<bool, EvalError> {
    if let (Value::Bool(x), Value::Bool(y)) = (a, b) {
        return match op {
            CmpOp::Eq => Ok(x == y),
            _ => Err(EvalError::SortMismatch {
                expected: Sort::Int,
                found: Sort::Bool,
            }),
        };
    }
    let ord = match (a, b) {
        (Value::Int(x), Value::Int(y)) => x.cmp(y),
        _ => expect_real(a)?.cmp(&expect_real(b)?),
    };
    Ok(match op {
        CmpOp::Eq => ord.is_eq(),
        CmpOp::Lt => ord.is_lt(),
        CmpOp::Le => ord.is_le(),
        CmpOp::Gt => ord.is_gt(),
        CmpOp::Ge => ord.is_ge(),
    })
}

pub(crate) fn apply_arith(op: ArithOp, a: &Value, b: &Value) -> Result<Value, EvalError> {
    if let (Value::Int(x), Value::Int(y)) = (a, b) {
        return Ok(Value::Int(match op {
            ArithOp::Add => x + y,
            ArithOp::Sub => x - y,
            ArithOp::Mul => x * y,
            ArithOp::Div if y.is_zero() => return Err(EvalError::DivisionByZero),
            ArithOp::Div => x.div_floor(y),
            ArithOp::Mod if y.is_zero() => return Err(EvalError::DivisionByZero),
            ArithOp::Mod => x.mod_floor(y),
        }));
    }
    let x = expect_real(a)?;
    let y = expect_real(b)?;
    Ok(Value::Real(match op {
        ArithOp::Add => x + y,
        ArithOp::Sub => x - y,
        ArithOp::Mul => x * y,
        ArithOp::Div if y.is_zero() => return Err(EvalError::DivisionByZero),
        ArithOp::Div => x / y,
        ArithOp::Mod => {
            return Err(EvalError::SortMismatch {
                expected: Sort::Int,
                found: Sort::Real,
            })
        }
    }))
}

impl Expr {
    /// Evaluates the expression under `model`. Variables missing from the model
    /// take the default value of their sort.
    pub fn eval(&self, model: &Model) -> Result<Value, EvalError> {
        match self.kind() {
            ExprKind::Const(v) => Ok(v.clone()),
            ExprKind::Var(name, sort) => match model.get(name) {
                Some(v) if v.sort() == *sort => Ok(v.clone()),
                Some(v) if *sort == Sort::Real && v.sort() == Sort::Int => Ok(Value::Real(expect_real(v)?)),
                Some(v) => Err(EvalError::SortMismatch {
                    expected: *sort,
                    found: v.sort(),
                }),
                None => Ok(sort.default_value()),
            },
            ExprKind::Not(e) => Ok(Value::Bool(!expect_bool(e.eval(model)?)?)),
            ExprKind::And(args) => {
                for a in args {
                    if !expect_bool(a.eval(model)?)? {
                        return Ok(Value::Bool(false));
                    }
                }
                Ok(Value::Bool(true))
            }
            ExprKind::Or(args) => {
                for a in args {
                    if expect_bool(a.eval(model)?)? {
                        return Ok(Value::Bool(true));
                    }
                }
                Ok(Value::Bool(false))
            }
            ExprKind::Cmp(op, a, b) => Ok(Value::Bool(apply_cmp(*op, &a.eval(model)?, &b.eval(model)?)?)),
            ExprKind::Arith(op, a, b) => apply_arith(*op, &a.eval(model)?, &b.eval(model)?),
            ExprKind::Neg(e) => match e.eval(model)? {
                Value::Int(i) => Ok(Value::Int(-i)),
                Value::Real(r) => Ok(Value::Real(-r)),
                Value::Bool(_) => Err(EvalError::SortMismatch {
                    expected: Sort::Int,
                    found: Sort::Bool,
                }),
            },
            ExprKind::ToReal(e) => Ok(Value::Real(expect_real(&e.eval(model)?)?)),
            ExprKind::Ite(c, t, e) => {
                if expect_bool(c.eval(model)?)? {
                    t.eval(model)
                } else {
                    e.eval(model)
                }
            }
        }
    }

    /// Evaluates a boolean expression; evaluation errors count as `false`.
    pub fn holds(&self, model: &Model) -> bool {
        matches!(self.eval(model), Ok(Value::Bool(true)))
    }
}

fn fmt_value(value: &Value, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match value {
        Value::Real(r) if !r.denom().is_one() => write!(f, "(/ {} {})", r.numer(), r.denom()),
        other => write!(f, "{}", other),
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind() {
            ExprKind::Const(v) => fmt_value(v, f),
            ExprKind::Var(name, _) => write!(f, "{}", name),
            ExprKind::Not(e) => write!(f, "(not {})", e),
            ExprKind::And(args) | ExprKind::Or(args) => {
                let op = if matches!(self.kind(), ExprKind::And(_)) { "and" } else { "or" };
                write!(f, "({}", op)?;
                for a in args {
                    write!(f, " {}", a)?;
                }
                write!(f, ")")
            }
            ExprKind::Cmp(op, a, b) => write!(f, "({} {} {})", op.symbol(), a, b),
            ExprKind::Arith(op, a, b) => {
                let symbol = match op {
                    ArithOp::Add => "+",
                    ArithOp::Sub => "-",
                    ArithOp::Mul => "*",
                    ArithOp::Div if self.sort() == Sort::Real => "/",
                    ArithOp::Div => "div",
                    ArithOp::Mod => "mod",
                };
                write!(f, "({} {} {})", symbol, a, b)
            }
            ExprKind::Neg(e) => write!(f, "(- {})", e),
            ExprKind::ToReal(e) => write!(f, "(to_real {})", e),
            ExprKind::Ite(c, t, e) => write!(f, "(ite {} {} {})", c, t, e),
        }
    }
}

impl fmt::Debug for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self)
    }
}

impl From<bool> for Expr {
    fn from(value: bool) -> Self {
        Expr::bool(value)
    }
}

impl From<i64> for Expr {
    fn from(value: i64) -> Self {
        Expr::int(value)
    }
}

impl From<Value> for Expr {
    fn from(value: Value) -> Self {
        Expr::constant(value)
    }
}

pub(crate) fn rational(numer: i64, denom: i64) -> BigRational {
    assert!(denom != 0, "Denominator should not be zero");
    if denom == 1 {
        return BigRational::from_integer(BigInt::from(numer));
    }
    BigRational::new(BigInt::from(numer), BigInt::from(denom))
}
