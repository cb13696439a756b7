//! The program-under-test interface.
//!
//! A target is anything implementing [`Program`]: it declares its parameters and
//! how each argument is constructed (a symbolic input, or a fixed concrete value),
//! and runs once per call to [`Program::invoke`], reporting its branches through
//! the [`ExecutionContext`] it is handed.
//!
//! ```
//! use concolic_rs::program::{FnProgram, Param, Program};
//! use concolic_rs::types::Sort;
//!
//! let sign = FnProgram::new(vec![Param::symbolic("x", Sort::Int)], |ctx, args| {
//!     let x = args.int("x")?;
//!     if ctx.branch(&x.gt(0)) {
//!         Ok(1.into())
//!     } else if ctx.branch(&x.lt(0)) {
//!         Ok((-1).into())
//!     } else {
//!         Ok(0.into())
//!     }
//! });
//! assert!(sign.names().contains("x"));
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::context::ExecutionContext;
use crate::error::{Error, Result};
use crate::expr::Expr;
use crate::symbolic::{SymBool, SymInt, SymReal, SymValue};
use crate::types::{Sort, Value};

/// How the argument of a parameter is constructed for each execution.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum ParamKind {
    /// A fresh symbolic input of the given sort, valued from the current model.
    Symbolic(Sort),
    /// The same concrete value on every execution.
    Concrete(Value),
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Param {
    name: String,
    kind: ParamKind,
}

impl Param {
    pub fn symbolic(name: impl Into<String>, sort: Sort) -> Self {
        Self {
            name: name.into(),
            kind: ParamKind::Symbolic(sort),
        }
    }

    pub fn concrete(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            kind: ParamKind::Concrete(value.into()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &ParamKind {
        &self.kind
    }

    pub fn sort(&self) -> Sort {
        match &self.kind {
            ParamKind::Symbolic(sort) => *sort,
            ParamKind::Concrete(value) => value.sort(),
        }
    }

    pub fn is_symbolic(&self) -> bool {
        matches!(self.kind, ParamKind::Symbolic(_))
    }
}

/// Abnormal end of one execution, as raised inside a target.
///
/// Targets propagate these with `?`; the engine receives them as an [`Invocation`].
#[derive(Debug, Clone, Eq, PartialEq, thiserror::Error)]
pub enum Fault {
    /// The execution left the explored input space (a failed assumption).
    #[error("infeasible execution")]
    Infeasible,
    /// The target used an operation the symbolic layer cannot model.
    #[error("unsupported operation: {0}")]
    Unsupported(String),
    /// The target itself failed.
    #[error("{0}")]
    Failed(String),
}

/// The outcome of one execution of a target.
#[derive(Debug, Clone)]
pub enum Invocation {
    Returned(SymValue),
    Infeasible,
    Unsupported(String),
    Failed(String),
}

impl From<std::result::Result<SymValue, Fault>> for Invocation {
    fn from(result: std::result::Result<SymValue, Fault>) -> Self {
        match result {
            Ok(value) => Invocation::Returned(value),
            Err(Fault::Infeasible) => Invocation::Infeasible,
            Err(Fault::Unsupported(what)) => Invocation::Unsupported(what),
            Err(Fault::Failed(why)) => Invocation::Failed(why),
        }
    }
}

/// The arguments of one execution, by parameter name.
#[derive(Debug, Clone, Default)]
pub struct Args {
    values: BTreeMap<String, SymValue>,
}

impl Args {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: SymValue) {
        self.values.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<&SymValue> {
        self.values.get(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &SymValue)> {
        self.values.iter()
    }

    fn lookup(&self, name: &str) -> std::result::Result<&SymValue, Fault> {
        self.get(name)
            .ok_or_else(|| Fault::Failed(format!("missing argument `{}`", name)))
    }

    fn sort_error(name: &str, expected: Sort, found: Sort) -> Fault {
        Fault::Failed(format!("argument `{}` is {}, expected {}", name, found, expected))
    }

    pub fn int(&self, name: &str) -> std::result::Result<SymInt, Fault> {
        match self.lookup(name)? {
            SymValue::Int(v) => Ok(v.clone()),
            other => Err(Self::sort_error(name, Sort::Int, other.sort())),
        }
    }

    /// The argument as a real; integer arguments are promoted.
    pub fn real(&self, name: &str) -> std::result::Result<SymReal, Fault> {
        match self.lookup(name)? {
            SymValue::Real(v) => Ok(v.clone()),
            SymValue::Int(v) => Ok(v.to_real()),
            other => Err(Self::sort_error(name, Sort::Real, other.sort())),
        }
    }

    pub fn bool(&self, name: &str) -> std::result::Result<SymBool, Fault> {
        match self.lookup(name)? {
            SymValue::Bool(v) => Ok(v.clone()),
            other => Err(Self::sort_error(name, Sort::Bool, other.sort())),
        }
    }
}

/// Return values a target declares it should produce over a full exploration.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum ExpectedResults {
    /// The same values with the same multiplicities, in any order.
    Bag(Vec<Value>),
    /// The same set of distinct values.
    Set(Vec<Value>),
}

impl ExpectedResults {
    pub fn check(&self, computed: &[Value]) -> bool {
        match self {
            ExpectedResults::Bag(expected) => {
                let mut a: Vec<String> = expected.iter().map(Value::to_string).collect();
                let mut b: Vec<String> = computed.iter().map(Value::to_string).collect();
                a.sort();
                b.sort();
                a == b
            }
            ExpectedResults::Set(expected) => {
                let a: BTreeSet<String> = expected.iter().map(Value::to_string).collect();
                let b: BTreeSet<String> = computed.iter().map(Value::to_string).collect();
                a == b
            }
        }
    }
}

pub trait Program {
    fn params(&self) -> Vec<Param>;

    /// Runs the target once.
    fn invoke(&self, ctx: &mut ExecutionContext<'_>, args: &Args) -> Invocation;

    fn names(&self) -> BTreeSet<String> {
        self.params().into_iter().map(|p| p.name).collect()
    }

    fn expected(&self) -> Option<ExpectedResults> {
        None
    }
}

impl<P: Program + ?Sized> Program for Box<P> {
    fn params(&self) -> Vec<Param> {
        (**self).params()
    }

    fn invoke(&self, ctx: &mut ExecutionContext<'_>, args: &Args) -> Invocation {
        (**self).invoke(ctx, args)
    }

    fn names(&self) -> BTreeSet<String> {
        (**self).names()
    }

    fn expected(&self) -> Option<ExpectedResults> {
        (**self).expected()
    }
}

/// A [`Program`] made of a parameter list and a closure.
pub struct FnProgram<F> {
    params: Vec<Param>,
    expected: Option<ExpectedResults>,
    f: F,
}

impl<F> FnProgram<F>
where
    F: Fn(&mut ExecutionContext<'_>, &Args) -> std::result::Result<SymValue, Fault>,
{
    pub fn new(params: Vec<Param>, f: F) -> Self {
        Self {
            params,
            expected: None,
            f,
        }
    }

    pub fn with_expected(mut self, expected: ExpectedResults) -> Self {
        self.expected = Some(expected);
        self
    }
}

impl<F> Program for FnProgram<F>
where
    F: Fn(&mut ExecutionContext<'_>, &Args) -> std::result::Result<SymValue, Fault>,
{
    fn params(&self) -> Vec<Param> {
        self.params.clone()
    }

    fn invoke(&self, ctx: &mut ExecutionContext<'_>, args: &Args) -> Invocation {
        (self.f)(ctx, args).into()
    }

    fn expected(&self) -> Option<ExpectedResults> {
        self.expected.clone()
    }
}

impl<F> fmt::Debug for FnProgram<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnProgram").field("params", &self.params).finish_non_exhaustive()
    }
}

/// Checks a program's parameters, and the path guard against them, before exploration.
pub fn validate(params: &[Param], guard: Option<&Expr>) -> Result<()> {
    let mut seen = BTreeSet::new();
    for p in params {
        if !seen.insert(p.name()) {
            return Err(Error::InvalidProgram(format!("parameter `{}` is declared twice", p.name())));
        }
    }
    if let Some(guard) = guard {
        if guard.sort() != Sort::Bool {
            return Err(Error::GuardSort(guard.sort()));
        }
        for (name, sort) in guard.vars() {
            match params.iter().find(|p| p.name() == name) {
                Some(p) if p.is_symbolic() && p.sort() == sort => {}
                Some(p) if p.is_symbolic() => {
                    return Err(Error::InvalidProgram(format!(
                        "guard uses `{}` as {}, but the parameter is {}",
                        name,
                        sort,
                        p.sort()
                    )))
                }
                _ => {
                    return Err(Error::InvalidProgram(format!(
                        "guard mentions `{}`, which is not a symbolic parameter",
                        name
                    )))
                }
            }
        }
    }
    Ok(())
}
