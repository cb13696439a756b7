//! Concolic values.
//!
//! A [`Sym<T>`] pairs a concrete value with the expression that computed it from
//! the symbolic inputs. Target programs compute with these values directly
//! (arithmetic through the usual operators, comparisons through methods) and
//! hand the resulting [`SymBool`]s to
//! [`ExecutionContext::branch`][crate::context::ExecutionContext::branch] when
//! they need a native `bool`.
//!
//! A value may additionally carry a second (value, expression) pair for the
//! *old* variant of a program under differential exploration. Such a value is
//! built with [`Sym::shadow`], and every operation is applied to both halves.
//! When both halves agree the pair collapses back to a plain value.
//!
//! Expressions whose operands are all constants are folded, so a value
//! computed from concrete inputs alone is always a constant.

use std::fmt;
use std::ops::{Add, BitAnd, BitOr, Mul, Neg, Not, Sub};

use num_bigint::BigInt;
use num_integer::Integer;
use num_rational::BigRational;
use num_traits::{Signed, ToPrimitive, Zero};

use crate::expr::Expr;
use crate::program::Fault;
use crate::types::{Sort, Value};

/// Native types that back a concolic value.
pub trait Concrete: Clone + fmt::Debug + PartialEq + Into<Value> {
    const SORT: Sort;

    fn from_value(value: &Value) -> Option<Self>;
}

impl Concrete for bool {
    const SORT: Sort = Sort::Bool;

    fn from_value(value: &Value) -> Option<Self> {
        value.as_bool()
    }
}

impl Concrete for BigInt {
    const SORT: Sort = Sort::Int;

    fn from_value(value: &Value) -> Option<Self> {
        value.as_int().cloned()
    }
}

impl Concrete for BigRational {
    const SORT: Sort = Sort::Real;

    fn from_value(value: &Value) -> Option<Self> {
        value.to_real()
    }
}

#[derive(Debug, Clone)]
struct Half<T> {
    value: T,
    expr: Expr,
}

impl<T: Concrete> Half<T> {
    fn new(value: T, expr: Expr) -> Self {
        if expr.as_const().is_none() && expr.is_ground() {
            return Self::constant(value);
        }
        Self { value, expr }
    }

    fn constant(value: T) -> Self {
        let expr = Expr::constant(value.clone().into());
        Self { value, expr }
    }

    fn is_const(&self) -> bool {
        self.expr.as_const().is_some()
    }

    fn same_as(&self, other: &Half<T>) -> bool {
        self.value == other.value && self.expr == other.expr
    }
}

/// A concolic value, possibly carrying a distinct old-variant half.
#[derive(Debug, Clone)]
pub struct Sym<T> {
    new: Half<T>,
    old: Option<Half<T>>,
}

pub type SymBool = Sym<bool>;
pub type SymInt = Sym<BigInt>;
pub type SymReal = Sym<BigRational>;

impl<T: Concrete> Sym<T> {
    /// A value computed by `expr`. Ground expressions are folded to `value`.
    pub fn new(value: T, expr: Expr) -> Self {
        debug_assert_eq!(expr.sort(), T::SORT, "Expression {} has the wrong sort", expr);
        Self {
            new: Half::new(value, expr),
            old: None,
        }
    }

    pub fn constant(value: T) -> Self {
        Self {
            new: Half::constant(value),
            old: None,
        }
    }

    /// A symbolic input named `name` whose current concrete value is `value`.
    pub fn symbol(name: impl Into<String>, value: T) -> Self {
        Self::new(value, Expr::var(name, T::SORT))
    }

    /// A differential value: `new` in the new variant, `old` in the old one.
    pub fn shadow(new: Sym<T>, old: Sym<T>) -> Self {
        let old_half = old.old.unwrap_or(old.new);
        Self::from_halves(new.new, Some(old_half))
    }

    fn from_halves(new: Half<T>, old: Option<Half<T>>) -> Self {
        let old = old.filter(|o| !o.same_as(&new));
        Self { new, old }
    }

    fn old_half(&self) -> &Half<T> {
        self.old.as_ref().unwrap_or(&self.new)
    }

    pub fn value(&self) -> &T {
        &self.new.value
    }

    pub fn expr(&self) -> &Expr {
        &self.new.expr
    }

    pub fn old_value(&self) -> &T {
        &self.old_half().value
    }

    pub fn old_expr(&self) -> &Expr {
        &self.old_half().expr
    }

    /// Returns `true` if the two variants disagree on this value.
    pub fn is_shadow(&self) -> bool {
        self.old.is_some()
    }

    /// Returns `true` if neither half depends on a symbolic input.
    pub fn is_ground(&self) -> bool {
        self.new.is_const() && self.old_half().is_const()
    }

    /// The new variant's half as a plain value.
    pub fn to_new(&self) -> Sym<T> {
        Self::from_halves(self.new.clone(), None)
    }

    /// The old variant's half as a plain value.
    pub fn to_old(&self) -> Sym<T> {
        Self::from_halves(self.old_half().clone(), None)
    }

    fn map<U: Concrete>(&self, f: impl Fn(&T) -> U, g: impl Fn(Expr) -> Expr) -> Sym<U> {
        let apply = |h: &Half<T>| {
            if h.is_const() {
                Half::constant(f(&h.value))
            } else {
                Half::new(f(&h.value), g(h.expr.clone()))
            }
        };
        let new = apply(&self.new);
        let old = self.old.as_ref().map(apply);
        Sym::from_halves(new, old)
    }

    fn try_zip<U: Concrete>(
        &self,
        rhs: &Sym<T>,
        f: impl Fn(&T, &T) -> Result<U, Fault>,
        g: impl Fn(Expr, Expr) -> Expr,
    ) -> Result<Sym<U>, Fault> {
        let apply = |a: &Half<T>, b: &Half<T>| -> Result<Half<U>, Fault> {
            let value = f(&a.value, &b.value)?;
            if a.is_const() && b.is_const() {
                Ok(Half::constant(value))
            } else {
                Ok(Half::new(value, g(a.expr.clone(), b.expr.clone())))
            }
        };
        let new = apply(&self.new, &rhs.new)?;
        let old = if self.is_shadow() || rhs.is_shadow() {
            Some(apply(self.old_half(), rhs.old_half())?)
        } else {
            None
        };
        Ok(Sym::from_halves(new, old))
    }

    fn zip<U: Concrete>(&self, rhs: &Sym<T>, f: impl Fn(&T, &T) -> U, g: impl Fn(Expr, Expr) -> Expr) -> Sym<U> {
        match self.try_zip(rhs, |a, b| Ok(f(a, b)), g) {
            Ok(v) => v,
            Err(_) => unreachable!("infallible operation"),
        }
    }

    pub fn eq(&self, rhs: impl Into<Sym<T>>) -> SymBool {
        self.zip(&rhs.into(), |a, b| a == b, Expr::eq)
    }

    pub fn ne(&self, rhs: impl Into<Sym<T>>) -> SymBool {
        self.zip(&rhs.into(), |a, b| a != b, |a, b| Expr::not(Expr::eq(a, b)))
    }
}

impl<T: Concrete + Ord> Sym<T> {
    pub fn lt(&self, rhs: impl Into<Sym<T>>) -> SymBool {
        self.zip(&rhs.into(), |a, b| a < b, Expr::lt)
    }

    pub fn le(&self, rhs: impl Into<Sym<T>>) -> SymBool {
        self.zip(&rhs.into(), |a, b| a <= b, Expr::le)
    }

    pub fn gt(&self, rhs: impl Into<Sym<T>>) -> SymBool {
        self.zip(&rhs.into(), |a, b| a > b, Expr::gt)
    }

    pub fn ge(&self, rhs: impl Into<Sym<T>>) -> SymBool {
        self.zip(&rhs.into(), |a, b| a >= b, Expr::ge)
    }
}

impl<T: Concrete> From<&Sym<T>> for Sym<T> {
    fn from(value: &Sym<T>) -> Self {
        value.clone()
    }
}

impl From<bool> for SymBool {
    fn from(value: bool) -> Self {
        Sym::constant(value)
    }
}

impl From<i32> for SymInt {
    fn from(value: i32) -> Self {
        Sym::constant(BigInt::from(value))
    }
}

impl From<i64> for SymInt {
    fn from(value: i64) -> Self {
        Sym::constant(BigInt::from(value))
    }
}

impl From<BigInt> for SymInt {
    fn from(value: BigInt) -> Self {
        Sym::constant(value)
    }
}

impl From<i32> for SymReal {
    fn from(value: i32) -> Self {
        Sym::constant(BigRational::from_integer(BigInt::from(value)))
    }
}

impl From<i64> for SymReal {
    fn from(value: i64) -> Self {
        Sym::constant(BigRational::from_integer(BigInt::from(value)))
    }
}

impl From<BigRational> for SymReal {
    fn from(value: BigRational) -> Self {
        Sym::constant(value)
    }
}

macro_rules! impl_arith {
    ($t:ty, $Trait:ident, $method:ident, $build:path) => {
        impl $Trait<&Sym<$t>> for &Sym<$t> {
            type Output = Sym<$t>;

            fn $method(self, rhs: &Sym<$t>) -> Sym<$t> {
                self.zip::<$t>(rhs, |a, b| $Trait::$method(a, b), $build)
            }
        }

        impl $Trait<Sym<$t>> for Sym<$t> {
            type Output = Sym<$t>;

            fn $method(self, rhs: Sym<$t>) -> Sym<$t> {
                $Trait::$method(&self, &rhs)
            }
        }

        impl $Trait<&Sym<$t>> for Sym<$t> {
            type Output = Sym<$t>;

            fn $method(self, rhs: &Sym<$t>) -> Sym<$t> {
                $Trait::$method(&self, rhs)
            }
        }

        impl $Trait<Sym<$t>> for &Sym<$t> {
            type Output = Sym<$t>;

            fn $method(self, rhs: Sym<$t>) -> Sym<$t> {
                $Trait::$method(self, &rhs)
            }
        }

        impl_arith!(@scalar $t, $Trait, $method, i32);
        impl_arith!(@scalar $t, $Trait, $method, i64);
    };
    (@scalar $t:ty, $Trait:ident, $method:ident, $scalar:ty) => {
        impl $Trait<$scalar> for Sym<$t> {
            type Output = Sym<$t>;

            fn $method(self, rhs: $scalar) -> Sym<$t> {
                $Trait::$method(&self, &Sym::<$t>::from(rhs))
            }
        }

        impl $Trait<$scalar> for &Sym<$t> {
            type Output = Sym<$t>;

            fn $method(self, rhs: $scalar) -> Sym<$t> {
                $Trait::$method(self, &Sym::<$t>::from(rhs))
            }
        }
    };
}

impl_arith!(BigInt, Add, add, Expr::add);
impl_arith!(BigInt, Sub, sub, Expr::sub);
impl_arith!(BigInt, Mul, mul, Expr::mul);
impl_arith!(BigRational, Add, add, Expr::add);
impl_arith!(BigRational, Sub, sub, Expr::sub);
impl_arith!(BigRational, Mul, mul, Expr::mul);

macro_rules! impl_neg {
    ($t:ty) => {
        impl Neg for &Sym<$t> {
            type Output = Sym<$t>;

            fn neg(self) -> Sym<$t> {
                self.map::<$t>(|a| -a, Expr::neg)
            }
        }

        impl Neg for Sym<$t> {
            type Output = Sym<$t>;

            fn neg(self) -> Sym<$t> {
                -&self
            }
        }
    };
}

impl_neg!(BigInt);
impl_neg!(BigRational);

fn division_by_zero() -> Fault {
    Fault::Failed("division by zero".to_string())
}

impl SymInt {
    /// Floor division. Division by zero is a failure of the target.
    pub fn div_floor(&self, rhs: impl Into<SymInt>) -> Result<SymInt, Fault> {
        self.try_zip(
            &rhs.into(),
            |a, b| {
                if b.is_zero() {
                    return Err(division_by_zero());
                }
                Ok(a.div_floor(b))
            },
            Expr::div,
        )
    }

    /// Floor remainder (the sign follows the divisor).
    pub fn rem_floor(&self, rhs: impl Into<SymInt>) -> Result<SymInt, Fault> {
        self.try_zip(
            &rhs.into(),
            |a, b| {
                if b.is_zero() {
                    return Err(division_by_zero());
                }
                Ok(a.mod_floor(b))
            },
            Expr::modulo,
        )
    }

    pub fn abs(&self) -> SymInt {
        self.map(
            |a| a.abs(),
            |e| Expr::ite(Expr::lt(e.clone(), Expr::int(0)), Expr::neg(e.clone()), e),
        )
    }

    /// Exponentiation by a concrete, non-negative exponent.
    pub fn pow(&self, exp: impl Into<SymInt>) -> Result<SymInt, Fault> {
        let exp = exp.into();
        if !exp.is_ground() {
            return Err(Fault::Unsupported("exponentiation with a symbolic exponent".to_string()));
        }
        for e in [exp.value(), exp.old_value()] {
            if e.to_u32().is_none() {
                return Err(Fault::Unsupported(format!("exponentiation with exponent {}", e)));
            }
        }
        self.try_zip(
            &exp,
            |a, b| Ok(num_traits::pow(a.clone(), b.to_usize().unwrap_or(0))),
            |base, n| {
                let n = n.as_const().and_then(Value::as_int).and_then(ToPrimitive::to_u32).unwrap_or(0);
                (1..n).fold(if n == 0 { Expr::int(1) } else { base.clone() }, |acc, _| {
                    Expr::mul(acc, base.clone())
                })
            },
        )
    }

    pub fn to_real(&self) -> SymReal {
        self.map(|a| BigRational::from_integer(a.clone()), Expr::to_real)
    }
}

impl SymReal {
    /// Exact division. Division by zero is a failure of the target.
    pub fn div(&self, rhs: impl Into<SymReal>) -> Result<SymReal, Fault> {
        self.try_zip(
            &rhs.into(),
            |a, b| {
                if b.is_zero() {
                    return Err(division_by_zero());
                }
                Ok(a / b)
            },
            Expr::div,
        )
    }
}

impl BitAnd<&SymBool> for &SymBool {
    type Output = SymBool;

    fn bitand(self, rhs: &SymBool) -> SymBool {
        self.zip(rhs, |a, b| *a && *b, Expr::and2)
    }
}

impl BitAnd for SymBool {
    type Output = SymBool;

    fn bitand(self, rhs: SymBool) -> SymBool {
        &self & &rhs
    }
}

impl BitOr<&SymBool> for &SymBool {
    type Output = SymBool;

    fn bitor(self, rhs: &SymBool) -> SymBool {
        self.zip(rhs, |a, b| *a || *b, Expr::or2)
    }
}

impl BitOr for SymBool {
    type Output = SymBool;

    fn bitor(self, rhs: SymBool) -> SymBool {
        &self | &rhs
    }
}

impl Not for &SymBool {
    type Output = SymBool;

    fn not(self) -> SymBool {
        self.map(|a| !a, Expr::not)
    }
}

impl Not for SymBool {
    type Output = SymBool;

    fn not(self) -> SymBool {
        !&self
    }
}

impl<T: Concrete + fmt::Display> fmt::Display for Sym<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.old {
            Some(old) => write!(f, "{} | {}", self.new.value, old.value),
            None => write!(f, "{}", self.new.value),
        }
    }
}

/// A concolic value of any sort.
#[derive(Debug, Clone)]
pub enum SymValue {
    Bool(SymBool),
    Int(SymInt),
    Real(SymReal),
}

impl SymValue {
    /// A symbolic input named `name` holding `value`.
    pub fn symbol(name: &str, value: &Value) -> Self {
        match value {
            Value::Bool(b) => SymValue::Bool(Sym::symbol(name, *b)),
            Value::Int(i) => SymValue::Int(Sym::symbol(name, i.clone())),
            Value::Real(r) => SymValue::Real(Sym::symbol(name, r.clone())),
        }
    }

    pub fn constant(value: &Value) -> Self {
        match value {
            Value::Bool(b) => SymValue::Bool(Sym::constant(*b)),
            Value::Int(i) => SymValue::Int(Sym::constant(i.clone())),
            Value::Real(r) => SymValue::Real(Sym::constant(r.clone())),
        }
    }

    pub fn sort(&self) -> Sort {
        match self {
            SymValue::Bool(_) => Sort::Bool,
            SymValue::Int(_) => Sort::Int,
            SymValue::Real(_) => Sort::Real,
        }
    }

    /// The new variant's concrete value.
    pub fn value(&self) -> Value {
        match self {
            SymValue::Bool(v) => Value::Bool(*v.value()),
            SymValue::Int(v) => Value::Int(v.value().clone()),
            SymValue::Real(v) => Value::Real(v.value().clone()),
        }
    }

    /// The old variant's concrete value.
    pub fn old_value(&self) -> Value {
        match self {
            SymValue::Bool(v) => Value::Bool(*v.old_value()),
            SymValue::Int(v) => Value::Int(v.old_value().clone()),
            SymValue::Real(v) => Value::Real(v.old_value().clone()),
        }
    }

    pub fn expr(&self) -> &Expr {
        match self {
            SymValue::Bool(v) => v.expr(),
            SymValue::Int(v) => v.expr(),
            SymValue::Real(v) => v.expr(),
        }
    }

    pub fn old_expr(&self) -> &Expr {
        match self {
            SymValue::Bool(v) => v.old_expr(),
            SymValue::Int(v) => v.old_expr(),
            SymValue::Real(v) => v.old_expr(),
        }
    }

    pub fn is_shadow(&self) -> bool {
        match self {
            SymValue::Bool(v) => v.is_shadow(),
            SymValue::Int(v) => v.is_shadow(),
            SymValue::Real(v) => v.is_shadow(),
        }
    }
}

impl From<SymBool> for SymValue {
    fn from(value: SymBool) -> Self {
        SymValue::Bool(value)
    }
}

impl From<SymInt> for SymValue {
    fn from(value: SymInt) -> Self {
        SymValue::Int(value)
    }
}

impl From<SymReal> for SymValue {
    fn from(value: SymReal) -> Self {
        SymValue::Real(value)
    }
}

impl From<bool> for SymValue {
    fn from(value: bool) -> Self {
        SymValue::Bool(Sym::constant(value))
    }
}

impl From<i64> for SymValue {
    fn from(value: i64) -> Self {
        SymValue::Int(SymInt::from(value))
    }
}

impl From<i32> for SymValue {
    fn from(value: i32) -> Self {
        SymValue::Int(SymInt::from(value))
    }
}

impl fmt::Display for SymValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SymValue::Bool(v) => write!(f, "{}", v),
            SymValue::Int(v) => write!(f, "{}", v),
            SymValue::Real(v) => {
                let (new, old) = (Value::Real(v.value().clone()), Value::Real(v.old_value().clone()));
                if v.is_shadow() {
                    write!(f, "{} | {}", new, old)
                } else {
                    write!(f, "{}", new)
                }
            }
        }
    }
}
