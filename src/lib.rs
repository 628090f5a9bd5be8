//! Derivative-free trust-region optimization.
//!
//! This crate minimizes a black-box objective of `n` real variables using
//! only function values, under an increasingly rich hierarchy of
//! constraints: none ([`Uobyqa`], [`Newuoa`]), variable bounds ([`Bobyqa`]),
//! linear inequalities and equalities ([`Lincoa`]), and general nonlinear
//! constraints ([`Cobyla`]). All five share one iteration engine: a local
//! surrogate model is interpolated on a geometry-managed sample set, a
//! trust-region subproblem proposes a step, and the ratio of actual to
//! predicted reduction decides whether to trust, shrink, or rebuild.
//!
//! Solvers are configured through builders and report a closed set of
//! termination codes; invalid input is rejected before the objective is
//! ever called, and a NaN or infinite objective value never aborts a run.
//!
//! # Examples
//!
//! ```
//! # use ndarray::prelude::*;
//! use dfopt::{Minimizer, BobyqaBuilder};
//!
//! let objective = |x: ArrayView1<f64>| (x[0] - 2.0).powi(2) + (x[1] + 1.0).powi(2);
//! let solver = BobyqaBuilder::default()
//!     .rhobeg(0.5)
//!     .rhoend(1e-8)
//!     .xl(array![-1.0, -1.0])
//!     .xu(array![1.0, 1.0])
//!     .build()
//!     .unwrap();
//! let result = solver.minimize(&objective, array![0.0, 0.0].view()).unwrap();
//! assert!(result.status.is_success());
//! // the unconstrained minimum (2, -1) is cut off by the box
//! assert!((result.x[0] - 1.0).abs() < 1e-6);
//! ```
//!
//! Iteration progress is reported through the [`log`] facade (`debug!` per
//! iteration, `info!` on resolution changes); wire up any logger to see it.

mod engine;
mod linalg;
pub mod minimizer;
mod model;
pub mod powell;
mod problem;
mod subproblem;
mod utils;

pub use crate::minimizer::{InvalidInput, Minimizer, OptimResult, Status};
pub use crate::powell::{
    Bobyqa, BobyqaBuilder, Cobyla, CobylaBuilder, Lincoa, LincoaBuilder, Newuoa, NewuoaBuilder,
    Uobyqa, UobyqaBuilder,
};
