//! Unconstrained minimization through a *full* quadratic surrogate
//! interpolated on `(n + 1)(n + 2)/2` points. Models cross-curvature exactly
//! at the price of a larger initialization cost, so it suits small `n` where
//! the objective couples its variables.
use derive_builder::Builder;
use ndarray::prelude::*;

use super::{objective_only, resolve_maxfun, validate_radii};
use crate::engine::{self, Config, Variant};
use crate::minimizer::{InvalidInput, Minimizer, OptimResult};
use crate::model::ModelKind;
use crate::problem::Problem;

const VARIANT: Variant = Variant {
    name: "uobyqa",
    model: ModelKind::FullQuadratic,
};

/// Unconstrained derivative-free minimizer with a full quadratic surrogate.
#[derive(Builder, Debug, Clone)]
pub struct Uobyqa {
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

    /// Stop early once the objective reaches this value.
    #[builder(default = "None")]
    #[builder(setter(into))]
    pub ftarget: Option<f64>,
}

impl Minimizer for Uobyqa {
    fn minimize<F: FnMut(ArrayView1<f64>) -> f64>(
        &self,
        func: F,
        x0: ArrayView1<f64>,
    ) -> Result<OptimResult, InvalidInput> {
        validate_radii(self.rhobeg, self.rhoend)?;
        let problem = Problem::new(x0, None, None, None, None, 0)?;
        let config = Config {
            rhobeg: self.rhobeg,
            rhoend: self.rhoend,
            maxfun: resolve_maxfun(self.maxfun, problem.n)?,
            ftarget: self.ftarget,
        };
        Ok(engine::solve(VARIANT, problem, config, objective_only(func), x0))
    }
}
