//! Nonlinearly-constrained minimization by linear approximation: both the
//! objective and the constraints are interpolated linearly on a simplex of
//! `n + 1` points, and each trust-region step minimizes the linear objective
//! model against the linearized constraints. The one variant that accepts
//! general nonlinear constraints, at the price of first-order-only models.
//!
//! The callback returns the objective value together with the constraint
//! vector; a point is feasible when every constraint value is `<= 0`.
//!
//! # Examples
//!
//! ```
//! # use ndarray::prelude::*;
//! # use dfopt::CobylaBuilder;
//! // minimize x'x subject to x1 + x2 >= 1, i.e. 1 - x1 - x2 <= 0
//! let res = CobylaBuilder::default()
//!     .rhobeg(0.5)
//!     .rhoend(1e-6)
//!     .m_nlcon(1usize)
//!     .build()
//!     .unwrap()
//!     .minimize(
//!         |x: ArrayView1<f64>| (x.dot(&x), array![1.0 - x[0] - x[1]]),
//!         array![2.0, 0.0].view(),
//!     )
//!     .unwrap();
//! assert!(res.cstrv <= 1e-6);
//! ```
use derive_builder::Builder;
use ndarray::prelude::*;

use super::{constraint_pair, resolve_maxfun, validate_radii};
use crate::engine::{self, Config, Variant};
use crate::minimizer::{InvalidInput, OptimResult};
use crate::model::ModelKind;
use crate::problem::Problem;
use crate::utils::Evaluation;

const VARIANT: Variant = Variant {
    name: "cobyla",
    model: ModelKind::Linear,
};

/// Nonlinearly-constrained derivative-free minimizer.
#[derive(Builder, Debug, Clone)]
pub struct Cobyla {
    /// Initial trust-region radius.
    #[builder(default = "1.0")]
    pub rhobeg: f64,

    /// Final resolution.
    #[builder(default = "1e-6")]
    pub rhoend: f64,

    /// Maximum number of evaluations (objective and constraints count as
    /// one). Defaults to `500 n`.
    #[builder(default = "None")]
    #[builder(setter(into))]
    pub maxfun: Option<usize>,

    /// Stop early once a feasible point reaches this objective value.
    #[builder(default = "None")]
    #[builder(setter(into))]
    pub ftarget: Option<f64>,

    /// Number of nonlinear constraints the callback evaluates.
    #[builder(default = "0")]
    pub m_nlcon: usize,

    /// Lower variable bounds.
    #[builder(default = "None")]
    #[builder(setter(into))]
    pub xl: Option<Array1<f64>>,

    /// Upper variable bounds.
    #[builder(default = "None")]
    #[builder(setter(into))]
    pub xu: Option<Array1<f64>>,

    /// Inequality matrix of `a_ineq · x ≤ b_ineq`.
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

impl Cobyla {
    /// Minimizes `func` starting from `x0`. The callback returns
    /// `(objective, constraints)` and must produce exactly `m_nlcon`
    /// constraint values per call.
    pub fn minimize<F>(&self, mut func: F, x0: ArrayView1<f64>) -> Result<OptimResult, InvalidInput>
    where
        F: FnMut(ArrayView1<f64>) -> (f64, Array1<f64>),
    {
        validate_radii(self.rhobeg, self.rhoend)?;
        let n = x0.len();
        let ineq = constraint_pair(&self.a_ineq, &self.b_ineq, n)?;
        let eq = constraint_pair(&self.a_eq, &self.b_eq, n)?;
        let problem = Problem::new(
            x0,
            self.xl.as_ref(),
            self.xu.as_ref(),
            ineq,
            eq,
            self.m_nlcon,
        )?;
        let config = Config {
            rhobeg: self.rhobeg,
            rhoend: self.rhoend,
            maxfun: resolve_maxfun(self.maxfun, problem.n)?,
            ftarget: self.ftarget,
        };
        let m_nlcon = self.m_nlcon;
        let adapter = move |x: ArrayView1<f64>| {
            let (f, nlconstr) = func(x);
            assert_eq!(
                nlconstr.len(),
                m_nlcon,
                "constraint callback returned {} values, expected m_nlcon = {}",
                nlconstr.len(),
                m_nlcon
            );
            Evaluation { f, nlconstr }
        };
        Ok(engine::solve(VARIANT, problem, config, adapter, x0))
    }
}
