//! This module provides the base framework for all solvers present in this crate: the
//! common trait, the result type, and the closed set of termination codes.
use ndarray::prelude::*;
use thiserror::Error;

/// Terminal state of a solve. Every run of a solver ends in exactly one of
/// these, and each carries a stable human-readable message (see [`Status::description`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// The trust-region resolution reached its final value `rhoend`. This is
    /// the normal convergence exit.
    SmallRadius,
    /// The objective fell at or below the configured target value.
    TargetReached,
    /// The evaluation budget `maxfun` was spent before convergence.
    MaxEvaluations,
    /// The trust-region subproblem could not predict any reduction at the
    /// final resolution. The returned point is the best one seen.
    TrustRegionStall,
    /// The interpolation system stayed singular, or produced non-finite model
    /// coefficients, after every geometry remedy. The returned point is the
    /// best one seen.
    NanModel,
}

impl Status {
    /// Whether the run converged (by radius or by target).
    pub fn is_success(self) -> bool {
        matches!(self, Status::SmallRadius | Status::TargetReached)
    }

    /// The stable message associated with this code.
    pub fn description(self) -> &'static str {
        match self {
            Status::SmallRadius => "the trust-region resolution reached its final value",
            Status::TargetReached => "the objective reached the target value",
            Status::MaxEvaluations => "the maximum number of function evaluations was reached",
            Status::TrustRegionStall => "the trust-region step could not achieve further reduction",
            Status::NanModel => "the interpolation model broke down and could not be repaired",
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.description())
    }
}

/// A problem definition the solver rejects before evaluating the objective
/// even once. The evaluation budget is untouched when any of these is returned.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InvalidInput {
    /// The initial point has zero length.
    #[error("the initial point must contain at least one variable")]
    EmptyInitialPoint,
    /// The initial point contains a NaN or infinite coordinate.
    #[error("the initial point contains a non-finite coordinate")]
    NonFiniteInitialPoint,
    /// A bound vector's length does not match the dimension of the initial point.
    #[error("bound vector has length {found}, expected {expected}")]
    BoundLength { expected: usize, found: usize },
    /// A lower bound exceeds the corresponding upper bound.
    #[error("lower bound exceeds upper bound at index {index} ({lower} > {upper})")]
    InconsistentBounds { index: usize, lower: f64, upper: f64 },
    /// A linear-constraint matrix or right-hand side has the wrong shape.
    #[error("linear constraint system has {rows} rows of length {cols}, \
             expected row length {expected_cols} and a right-hand side of length {rows}")]
    ConstraintShape {
        rows: usize,
        cols: usize,
        expected_cols: usize,
    },
    /// A linear-constraint coefficient or right-hand side entry is not finite.
    #[error("a linear constraint coefficient is not finite")]
    NonFiniteConstraint,
    /// `rhobeg` must be finite and positive.
    #[error("rhobeg must be finite and positive, got {0}")]
    InvalidInitialRadius(f64),
    /// `rhoend` must satisfy `0 < rhoend <= rhobeg`.
    #[error("rhoend must satisfy 0 < rhoend <= rhobeg, got {0}")]
    InvalidFinalRadius(f64),
    /// `maxfun` must allow at least one evaluation.
    #[error("maxfun must be at least 1, got {0}")]
    InvalidBudget(usize),
}

/// The outcome of a solve: the best point found together with how the run ended.
///
/// `cstrv` is the maximum constraint violation at `x` over every declared
/// bound, linear, and nonlinear constraint; it is exactly `0.0` for solvers
/// that have nothing to violate. `nlconstr` holds the nonlinear constraint
/// values at `x` and is empty unless the solver evaluates nonlinear
/// constraints.
#[derive(Debug, Clone, PartialEq)]
pub struct OptimResult {
    /// The best point found.
    pub x: Array1<f64>,
    /// The objective value at `x`.
    pub fun: f64,
    /// Maximum constraint violation at `x`; `0.0` means fully feasible.
    pub cstrv: f64,
    /// Nonlinear constraint values at `x` (empty when none are declared).
    pub nlconstr: Array1<f64>,
    /// The number of objective evaluations performed.
    pub nf: usize,
    /// How the run terminated.
    pub status: Status,
}

/// A general minimizer trait for solvers that need only objective values.
///
/// The callback is `FnMut`: callers are free to thread mutable state of their
/// own (counters, recorders) through the closure environment. The solver
/// calls it exactly once per counted evaluation and never retains it.
pub trait Minimizer {
    /// Minimizes `func` starting from the initial guess `x0`.
    fn minimize<F: FnMut(ArrayView1<f64>) -> f64>(
        &self,
        func: F,
        x0: ArrayView1<f64>,
    ) -> Result<OptimResult, InvalidInput>;
}
