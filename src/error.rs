//! Run-level errors.
//!
//! Everything here aborts a whole exploration. Per-path conditions (infeasible
//! branches, duplicate inputs, failed executions) are not errors; the engine
//! handles them in place and keeps exploring.

use crate::expr::EvalError;
use crate::types::Sort;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("unknown solver `{0}` (available: bounded, z3)")]
    UnknownSolver(String),

    #[error("solver `{0}` is not available in this build")]
    SolverUnavailable(String),

    #[error("invalid program: {0}")]
    InvalidProgram(String),

    #[error("seed execution failed: {0}")]
    SeedFailed(String),

    #[error("unsupported operation: {0}")]
    Unsupported(String),

    #[error("path guard `{0}` is unsatisfiable")]
    UnsatisfiableGuard(String),

    #[error("solver could not find inputs satisfying path guard `{0}`")]
    UnsolvedGuard(String),

    #[error("path guard must be a boolean expression, found {0}")]
    GuardSort(Sort),

    #[error("parse error: {0}")]
    Parse(String),

    #[error(transparent)]
    Eval(#[from] EvalError),

    #[error(transparent)]
    Fmt(#[from] std::fmt::Error),
}
