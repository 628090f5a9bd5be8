//! Linearly-constrained minimization: a quadratic surrogate on `2n + 1`
//! points driven through an active-set subproblem over the polytope
//! `A_ineq · x ≤ b_ineq`, `A_eq · x = b_eq` intersected with the bounds and
//! the trust region. With no linear rows declared it runs the identical
//! trajectory as [`crate::Bobyqa`].
use derive_builder::Builder;
use ndarray::prelude::*;

use super::{constraint_pair, objective_only, resolve_maxfun, validate_radii};
use crate::engine::{self, Config, Variant};
use crate::minimizer::{InvalidInput, Minimizer, OptimResult};
use crate::model::ModelKind;
use crate::problem::Problem;

const VARIANT: Variant = Variant {
    name: "lincoa",
    model: ModelKind::DiagonalQuadratic,
};

/// Linearly-constrained derivative-free minimizer.
#[derive(Builder, Debug, Clone)]
pub struct Lincoa {
    /// Initial trust-region radius.
    #[builder(default = "1.0")]
    pub rhobeg: f64,

    /// Final resolution.
    #[builder(default = "1e-6")]
    pub rhoend: f64,

    /// Maximum number of objective evaluations. Defaults to `500 n`.
    #[builder(default = "None")]
    #[builder(setter(into))]
    pub maxfun: Option<usize>,

    /// Stop early once a feasible point reaches this objective value.
    #[builder(default = "None")]
    #[builder(setter(into))]
    pub ftarget: Option<f64>,

    /// Lower variable bounds.
    #[builder(default = "None")]
    #[builder(setter(into))]
    pub xl: Option<Array1<f64>>,

    /// Upper variable bounds.
    #[builder(default = "None")]
    #[builder(setter(into))]
    pub xu: Option<Array1<f64>>,

    /// Inequality matrix of `a_ineq · x ≤ b_ineq`, one row per constraint.
    #[builder(default = "None")]
    #[builder(setter(into))]
    pub a_ineq: Option<Array2<f64>>,

    /// Right-hand side of the inequality system.
    #[builder(default = "None")]
    #[builder(setter(into))]
    pub b_ineq: Option<Array1<f64>>,

    /// Equality matrix of `a_eq · x = b_eq`.
    #[builder(default = "None")]
    #[builder(setter(into))]
    pub a_eq: Option<Array2<f64>>,

    /// Right-hand side of the equality system.
    #[builder(default = "None")]
    #[builder(setter(into))]
    pub b_eq: Option<Array1<f64>>,
}

impl Minimizer for Lincoa {
    fn minimize<F: FnMut(ArrayView1<f64>) -> f64>(
        &self,
        func: F,
        x0: ArrayView1<f64>,
    ) -> Result<OptimResult, InvalidInput> {
        validate_radii(self.rhobeg, self.rhoend)?;
        let n = x0.len();
        let ineq = constraint_pair(&self.a_ineq, &self.b_ineq, n)?;
        let eq = constraint_pair(&self.a_eq, &self.b_eq, n)?;
        let problem = Problem::new(x0, self.xl.as_ref(), self.xu.as_ref(), ineq, eq, 0)?;
        let config = Config {
            rhobeg: self.rhobeg,
            rhoend: self.rhoend,
            maxfun: resolve_maxfun(self.maxfun, problem.n)?,
            ftarget: self.ftarget,
        };
        Ok(engine::solve(VARIANT, problem, config, objective_only(func), x0))
    }
}
