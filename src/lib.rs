//! # concolic-rs: Concolic path exploration in Rust
//!
//! **`concolic-rs`** explores the execution paths of a program by running it on concrete
//! inputs while tracking the symbolic conditions of every branch it takes. Each run
//! extends a tree of *path prefixes*; an SMT solver then produces inputs that take the
//! branches not seen yet, until every feasible path (up to a depth bound) is covered.
//!
//! ## Key Features
//!
//! - **Explicit execution context**: the program under test reports branches through an
//!   [`ExecutionContext`][crate::context::ExecutionContext] and computes with concolic values
//!   ([`Sym`][crate::symbolic::Sym]) that carry a concrete value and its expression.
//! - **Arena-based constraint tree**: nodes live in a [`ConstraintTree`][crate::constraint::ConstraintTree]
//!   and are addressed by lightweight [`ConstraintId`][crate::reference::ConstraintId] handles.
//! - **Differential exploration**: a value can hold a *new* and an *old* variant at once.
//!   Branches where the variants may disagree are forked four ways, and inputs on which the
//!   variants return different values are reported as counterexamples.
//! - **Path guard**: exploration can be restricted to inputs satisfying a given formula.
//! - **Summaries**: the explored tree folds into one `ite` expression, or a Graphviz graph.
//!
//! ## Basic Usage
//!
//! ```rust
//! use concolic_rs::engine::{ExplorationEngine, ExploreConfig};
//! use concolic_rs::program::{FnProgram, Param};
//! use concolic_rs::symbolic::SymValue;
//! use concolic_rs::types::{Sort, Value};
//!
//! // 1. Describe the program: one symbolic integer parameter
//! let program = FnProgram::new(vec![Param::symbolic("x", Sort::Int)], |ctx, args| {
//!     let x = args.int("x")?;
//!     // 2. Report branch conditions through the context
//!     if ctx.branch(&x.gt(0)) {
//!         Ok(SymValue::from(1))
//!     } else {
//!         Ok(SymValue::from(2))
//!     }
//! });
//!
//! // 3. Explore
//! let config = ExploreConfig::default().with_summary(true);
//! let mut engine = ExplorationEngine::new(program, config).unwrap();
//! let result = engine.explore().unwrap();
//!
//! assert!(result.complete);
//! assert_eq!(result.generated_inputs.len(), 2);
//! assert!(result.return_values.contains(&Some(Value::from(1))));
//! assert_eq!(result.summary.unwrap().to_string(), "(ite (> x 0) 1 2)");
//! ```
//!
//! ## Core Components
//!
//! - **[`engine`]**: The exploration loop and its configuration.
//! - **[`recorder`]**: Branch recording, two-way and four-way forking.
//! - **[`constraint`]**: The constraint tree.
//! - **[`solver`]**: Solver backends.
//! - **[`summary`]** and **[`dot`]**: Projections of the explored tree.

pub mod constraint;
pub mod context;
pub mod dot;
pub mod engine;
pub mod error;
pub mod expr;
pub mod predicate;
pub mod program;
pub mod recorder;
pub mod reference;
pub mod result;
pub mod sexpr;
pub mod solver;
pub mod summary;
pub mod symbolic;
pub mod types;
