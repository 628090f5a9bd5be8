//! Unconstrained minimization through a quadratic surrogate interpolated on
//! `2n + 1` points. The workhorse variant for smooth problems without
//! constraints; prefer [`crate::Bobyqa`] when the variables have bounds.
//!
//! # Examples
//!
//! ```
//! # use ndarray::prelude::*;
//! # use dfopt::{Minimizer, NewuoaBuilder};
//! let objective = |x: ArrayView1<f64>| (x[0] - 1.0).powi(2) + (x[1] + 2.0).powi(2);
//! let solver = NewuoaBuilder::default()
//!     .rhobeg(0.5)
//!     .rhoend(1e-8)
//!     .build()
//!     .unwrap();
//! let result = solver.minimize(&objective, array![0.0, 0.0].view()).unwrap();
//! assert!(result.status.is_success());
//! assert!((result.x[0] - 1.0).abs() < 1e-5);
//! ```
use derive_builder::Builder;
use ndarray::prelude::*;

use super::{objective_only, resolve_maxfun, validate_radii};
use crate::engine::{self, Config, Variant};
use crate::minimizer::{InvalidInput, Minimizer, OptimResult};
use crate::model::ModelKind;
use crate::problem::Problem;

const VARIANT: Variant = Variant {
    name: "newuoa",
    model: ModelKind::DiagonalQuadratic,
};

/// Unconstrained derivative-free minimizer with a quadratic surrogate.
#[derive(Builder, Debug, Clone)]
pub struct Newuoa {
    /// Initial trust-region radius; roughly the scale on which the objective
    /// varies. Also the spacing of the first interpolation pattern.
    #[builder(default = "1.0")]
    pub rhobeg: f64,

    /// Final resolution: the run converges once the trust region cannot
    /// usefully shrink below this.
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

impl Minimizer for Newuoa {
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::minimizer::Status;

    #[test]
    fn coupled_convex_quadratic() {
        // cross term included: the diagonal surrogate cannot represent it
        // exactly and has to earn convergence through the ratio test
        let function = |x: ArrayView1<f64>| {
            let u = x[0] - 1.0;
            let v = x[1] - 2.0;
            2.0 * u * u + u * v + 3.0 * v * v + 5.0
        };
        let minimizer = NewuoaBuilder::default()
            .rhobeg(0.5)
            .rhoend(1e-8)
            .maxfun(4000)
            .build()
            .unwrap();
        let res = minimizer
            .minimize(&function, array![0.0, 0.0].view())
            .unwrap();
        assert!(res.status.is_success(), "status {:?}", res.status);
        assert!((res.x[0] - 1.0).abs() < 1e-4, "x = {:?}", res.x);
        assert!((res.x[1] - 2.0).abs() < 1e-4, "x = {:?}", res.x);
        assert_eq!(res.cstrv, 0.0);
        assert!(res.nlconstr.is_empty());
    }

    #[test]
    fn callback_side_state_is_visible() {
        // the engine promises one callback invocation per counted evaluation
        let mut calls = 0usize;
        let res = NewuoaBuilder::default()
            .maxfun(60)
            .build()
            .unwrap()
            .minimize(
                |x: ArrayView1<f64>| {
                    calls += 1;
                    x.dot(&x)
                },
                array![1.0, -1.0].view(),
            )
            .unwrap();
        assert_eq!(calls, res.nf);
    }

    #[test]
    fn empty_start_point_is_invalid() {
        let err = NewuoaBuilder::default()
            .build()
            .unwrap()
            .minimize(|_| 0.0, Array1::zeros(0).view())
            .unwrap_err();
        assert_eq!(err, InvalidInput::EmptyInitialPoint);
    }

    #[test]
    fn stall_is_not_reported_as_success() {
        // a flat objective gives the model nothing to chew on; whatever the
        // exit, it must not claim the target or burn past the budget
        let res = NewuoaBuilder::default()
            .maxfun(100)
            .build()
            .unwrap()
            .minimize(|_| 3.5, array![0.0, 0.0].view())
            .unwrap();
        assert!(res.nf <= 100);
        assert_ne!(res.status, Status::TargetReached);
        assert_eq!(res.fun, 3.5);
    }
}
