//! Bound-constrained minimization through a quadratic surrogate on `2n + 1`
//! points. Bounds are honored everywhere: the initial pattern, every
//! geometry step, and every trust-region trial point stay inside the box,
//! so the objective is never evaluated at an out-of-bounds point.
use derive_builder::Builder;
use ndarray::prelude::*;

use super::{objective_only, resolve_maxfun, validate_radii};
use crate::engine::{self, Config, Variant};
use crate::minimizer::{InvalidInput, Minimizer, OptimResult};
use crate::model::ModelKind;
use crate::problem::Problem;

const VARIANT: Variant = Variant {
    name: "bobyqa",
    model: ModelKind::DiagonalQuadratic,
};

/// Bound-constrained derivative-free minimizer.
#[derive(Builder, Debug, Clone)]
pub struct Bobyqa {
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

    /// Lower variable bounds; absent coordinates are unbounded below.
    #[builder(default = "None")]
    #[builder(setter(into))]
    pub xl: Option<Array1<f64>>,

    /// Upper variable bounds; absent coordinates are unbounded above.
    #[builder(default = "None")]
    #[builder(setter(into))]
    pub xu: Option<Array1<f64>>,
}

impl Minimizer for Bobyqa {
    fn minimize<F: FnMut(ArrayView1<f64>) -> f64>(
        &self,
        func: F,
        x0: ArrayView1<f64>,
    ) -> Result<OptimResult, InvalidInput> {
        validate_radii(self.rhobeg, self.rhoend)?;
        let problem = Problem::new(x0, self.xl.as_ref(), self.xu.as_ref(), None, None, 0)?;
        let config = Config {
            rhobeg: self.rhobeg,
            rhoend: self.rhoend,
            maxfun: resolve_maxfun(self.maxfun, problem.n)?,
            ftarget: self.ftarget,
        };
        Ok(engine::solve(VARIANT, problem, config, objective_only(func), x0))
    }
}
