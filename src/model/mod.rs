//! Interpolation-based surrogate modeling: the sample set, the fitted
//! models, and the Lagrange-polynomial machinery that keeps the set poised.

mod set;
mod surrogate;

pub(crate) use self::set::{Fit, InterpolationSet};
pub(crate) use self::surrogate::{Curvature, ModelKind, SurrogateModel};
