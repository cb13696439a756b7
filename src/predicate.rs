//! Branch outcomes.

use std::fmt::{Display, Formatter};

use crate::expr::Expr;

/// One observed branch outcome: the condition and the direction taken.
///
/// Equality is structural equality of the conditions plus equality of the directions.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct Predicate {
    expr: Expr,
    result: bool,
}

impl Predicate {
    pub fn new(expr: Expr, result: bool) -> Self {
        Self { expr, result }
    }

    pub fn expr(&self) -> &Expr {
        &self.expr
    }

    pub fn result(&self) -> bool {
        self.result
    }

    /// Flips the direction in place.
    pub fn negate(&mut self) {
        self.result = !self.result;
    }

    pub fn negated(&self) -> Self {
        Self::new(self.expr.clone(), !self.result)
    }

    /// Conjunction of two outcomes, itself an outcome taken in the `true` direction.
    ///
    /// Conjoining a predicate with itself yields a copy of it.
    pub fn and(&self, other: &Predicate) -> Predicate {
        if self == other {
            return self.clone();
        }
        Predicate::new(Expr::and2(self.to_expr(), other.to_expr()), true)
    }

    /// The condition as a formula that holds exactly when this outcome was taken.
    pub fn to_expr(&self) -> Expr {
        if self.result {
            self.expr.clone()
        } else {
            Expr::not(self.expr.clone())
        }
    }

    /// Returns `true` if `other` has the same condition, in either direction.
    pub fn same_condition(&self, other: &Predicate) -> bool {
        self.expr == other.expr
    }
}

impl Display for Predicate {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.expr, self.result)
    }
}
