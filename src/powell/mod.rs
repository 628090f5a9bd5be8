//! The five derivative-free trust-region solvers, one per constraint
//! capability: [`Uobyqa`] and [`Newuoa`] (unconstrained), [`Bobyqa`] (bound
//! constraints), [`Lincoa`] (linear constraints), and [`Cobyla`] (nonlinear
//! constraints). Each is a thin, builder-configured adapter over the shared
//! iteration engine; they differ in the surrogate shape they interpolate and
//! in the constraint data they accept.

mod bobyqa;
mod cobyla;
mod lincoa;
mod newuoa;
mod uobyqa;

pub use self::bobyqa::{Bobyqa, BobyqaBuilder};
pub use self::cobyla::{Cobyla, CobylaBuilder};
pub use self::lincoa::{Lincoa, LincoaBuilder};
pub use self::newuoa::{Newuoa, NewuoaBuilder};
pub use self::uobyqa::{Uobyqa, UobyqaBuilder};

use crate::minimizer::InvalidInput;
use crate::utils::Evaluation;
use ndarray::prelude::*;

/// Checks the radius pair shared by every solver.
pub(crate) fn validate_radii(rhobeg: f64, rhoend: f64) -> Result<(), InvalidInput> {
    if !rhobeg.is_finite() || rhobeg <= 0.0 {
        return Err(InvalidInput::InvalidInitialRadius(rhobeg));
    }
    if !rhoend.is_finite() || rhoend <= 0.0 || rhoend > rhobeg {
        return Err(InvalidInput::InvalidFinalRadius(rhoend));
    }
    Ok(())
}

/// Resolves the evaluation budget, defaulting to `500 n`.
pub(crate) fn resolve_maxfun(maxfun: Option<usize>, n: usize) -> Result<usize, InvalidInput> {
    let maxfun = maxfun.unwrap_or(500 * n.max(1));
    if maxfun == 0 {
        return Err(InvalidInput::InvalidBudget(0));
    }
    Ok(maxfun)
}

/// Pairs an optional constraint matrix with its right-hand side; providing
/// one without the other is an input error.
pub(crate) fn constraint_pair(
    a: &Option<Array2<f64>>,
    b: &Option<Array1<f64>>,
    n: usize,
) -> Result<Option<(Array2<f64>, Array1<f64>)>, InvalidInput> {
    match (a, b) {
        (Some(a), Some(b)) => Ok(Some((a.clone(), b.clone()))),
        (None, None) => Ok(None),
        (Some(a), None) => Err(InvalidInput::ConstraintShape {
            rows: a.nrows(),
            cols: a.ncols(),
            expected_cols: n,
        }),
        (None, Some(b)) => Err(InvalidInput::ConstraintShape {
            rows: b.len(),
            cols: 0,
            expected_cols: n,
        }),
    }
}

/// Adapts an objective-only callback to the engine's evaluation record.
pub(crate) fn objective_only<F>(mut func: F) -> impl FnMut(ArrayView1<f64>) -> Evaluation
where
    F: FnMut(ArrayView1<f64>) -> f64,
{
    move |x| Evaluation {
        f: func(x),
        nlconstr: Array1::zeros(0),
    }
}
