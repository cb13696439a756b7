//! SMT solver adapters.
//!
//! The exploration engine talks to a solver through the [`Solver`] trait:
//!
//! - [`Solver::solve`] looks for a model of a conjunction of assumptions and,
//!   on success, keeps it as the *last model*. The answer is a [`SolveResult`]:
//!   a backend that can neither find a model nor refute the query says
//!   [`SolveResult::Unknown`] rather than `Unsat`;
//! - [`Solver::value`] reads a concrete value out of the last model, and is only
//!   meaningful while the most recent `solve` succeeded;
//! - [`Solver::check`] is a pure feasibility query that leaves the last model alone.
//!   The path recorder uses it in the middle of an execution whose inputs were read
//!   from that model.
//!
//! Two backends exist: [`BoundedSolver`], a dependency-free enumerative model
//! finder, and (with the `z3` feature) [`Z3Solver`].

use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::expr::{Expr, Model};
use crate::types::Value;

pub mod bounded;
#[cfg(feature = "z3")]
pub mod z3_backend;

pub use bounded::BoundedSolver;
#[cfg(feature = "z3")]
pub use z3_backend::Z3Solver;

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum SolveResult {
    Sat,
    Unsat,
    /// The backend gave up without deciding the query.
    Unknown,
}

impl SolveResult {
    pub fn is_sat(self) -> bool {
        self == SolveResult::Sat
    }

    pub fn is_unknown(self) -> bool {
        self == SolveResult::Unknown
    }
}

impl fmt::Display for SolveResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SolveResult::Sat => write!(f, "sat"),
            SolveResult::Unsat => write!(f, "unsat"),
            SolveResult::Unknown => write!(f, "unknown"),
        }
    }
}

pub trait Solver {
    fn name(&self) -> &str;

    /// Searches for a model of the conjunction of `assumptions`.
    fn solve(&mut self, assumptions: &[Expr]) -> SolveResult;

    /// Checks satisfiability of `assumptions` without touching the last model.
    fn check(&mut self, assumptions: &[Expr]) -> SolveResult;

    /// Result of the most recent [`Solver::solve`] call.
    fn last_result(&self) -> SolveResult;

    /// The last model, if the most recent `solve` succeeded.
    fn model(&self) -> Option<&Model>;

    /// Evaluates `expr` under the last model.
    fn value(&self, expr: &Expr) -> Option<Value> {
        if !self.last_result().is_sat() {
            return None;
        }
        self.model().and_then(|model| expr.eval(model).ok())
    }
}

/// Solver backends. Z3 is the default when it is compiled in.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum SolverKind {
    Bounded,
    Z3,
}

impl Default for SolverKind {
    fn default() -> Self {
        if cfg!(feature = "z3") {
            SolverKind::Z3
        } else {
            SolverKind::Bounded
        }
    }
}

impl SolverKind {
    pub fn is_available(self) -> bool {
        match self {
            SolverKind::Bounded => true,
            SolverKind::Z3 => cfg!(feature = "z3"),
        }
    }
}

impl fmt::Display for SolverKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SolverKind::Bounded => write!(f, "bounded"),
            SolverKind::Z3 => write!(f, "z3"),
        }
    }
}

impl FromStr for SolverKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "bounded" => Ok(SolverKind::Bounded),
            "z3" => Ok(SolverKind::Z3),
            _ => Err(Error::UnknownSolver(s.to_string())),
        }
    }
}

pub fn create_solver(kind: SolverKind) -> Result<Box<dyn Solver>> {
    match kind {
        SolverKind::Bounded => Ok(Box::new(BoundedSolver::default())),
        #[cfg(feature = "z3")]
        SolverKind::Z3 => Ok(Box::new(Z3Solver::new())),
        #[cfg(not(feature = "z3"))]
        SolverKind::Z3 => Err(Error::SolverUnavailable(kind.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    #[test]
    fn test_solver_kind_names() {
        assert_eq!("bounded".parse::<SolverKind>().unwrap(), SolverKind::Bounded);
        assert_eq!("Z3".parse::<SolverKind>().unwrap(), SolverKind::Z3);
        assert!(matches!("cvc5".parse::<SolverKind>(), Err(Error::UnknownSolver(_))));
        let default = if cfg!(feature = "z3") { "z3" } else { "bounded" };
        assert_eq!(SolverKind::default().to_string(), default);
        assert!(SolverKind::default().is_available());
    }

    #[test]
    fn test_create_solver() {
        let solver = create_solver(SolverKind::Bounded).unwrap();
        assert_eq!(solver.name(), "bounded");
        if !SolverKind::Z3.is_available() {
            assert!(matches!(create_solver(SolverKind::Z3), Err(Error::SolverUnavailable(_))));
        }
    }
}
