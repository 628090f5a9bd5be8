//! Normalized view of the problem a solver is asked to handle: variable
//! bounds, linear inequality/equality constraints, and the number of
//! nonlinear constraints the callback evaluates. All feasibility queries
//! (`cstrv`) and the merit order used to rank candidate points live here.
use crate::minimizer::InvalidInput;
use crate::utils::sanitize;
use ndarray::prelude::*;

/// Two candidate points whose violations differ by less than this are ranked
/// by objective value alone.
pub(crate) const CSTRV_TIE: f64 = 1e-10;

/// Variable bounds, stored densely with `±inf` for absent sides.
#[derive(Debug, Clone)]
pub(crate) struct Bounds {
    pub lower: Array1<f64>,
    pub upper: Array1<f64>,
}

impl Bounds {
    pub fn unbounded(n: usize) -> Self {
        Bounds {
            lower: Array1::from_elem(n, f64::NEG_INFINITY),
            upper: Array1::from_elem(n, f64::INFINITY),
        }
    }

    /// Builds bounds from optional user vectors, checking lengths and
    /// `lower <= upper` componentwise (a NaN bound fails that check too).
    pub fn from_optional(
        n: usize,
        xl: Option<&Array1<f64>>,
        xu: Option<&Array1<f64>>,
    ) -> Result<Self, InvalidInput> {
        let mut bounds = Bounds::unbounded(n);
        if let Some(l) = xl {
            if l.len() != n {
                return Err(InvalidInput::BoundLength {
                    expected: n,
                    found: l.len(),
                });
            }
            bounds.lower.assign(l);
        }
        if let Some(u) = xu {
            if u.len() != n {
                return Err(InvalidInput::BoundLength {
                    expected: n,
                    found: u.len(),
                });
            }
            bounds.upper.assign(u);
        }
        for i in 0..n {
            if !(bounds.lower[i] <= bounds.upper[i]) {
                return Err(InvalidInput::InconsistentBounds {
                    index: i,
                    lower: bounds.lower[i],
                    upper: bounds.upper[i],
                });
            }
        }
        Ok(bounds)
    }

    /// Projects `x` onto the box in place. Bounds are never relaxed: every
    /// point handed to the user callback goes through this first.
    pub fn clip(&self, x: &mut Array1<f64>) {
        for i in 0..x.len() {
            x[i] = x[i].max(self.lower[i]).min(self.upper[i]);
        }
    }

    /// Maximum bound violation at `x`, zero if `x` is inside the box.
    pub fn violation(&self, x: ArrayView1<f64>) -> f64 {
        let mut v = 0.0f64;
        for i in 0..x.len() {
            v = v.max(self.lower[i] - x[i]).max(x[i] - self.upper[i]);
        }
        v.max(0.0)
    }
}

/// A dense linear system `a · x ≤ b` (or `a · x = b` for the equality block).
#[derive(Debug, Clone)]
pub(crate) struct LinearConstraints {
    pub a: Array2<f64>,
    pub b: Array1<f64>,
}

impl LinearConstraints {
    pub fn new(a: Array2<f64>, b: Array1<f64>, n: usize) -> Result<Self, InvalidInput> {
        if a.ncols() != n || a.nrows() != b.len() {
            return Err(InvalidInput::ConstraintShape {
                rows: a.nrows(),
                cols: a.ncols(),
                expected_cols: n,
            });
        }
        if a.iter().any(|v| !v.is_finite()) || b.iter().any(|v| !v.is_finite()) {
            return Err(InvalidInput::NonFiniteConstraint);
        }
        Ok(LinearConstraints { a, b })
    }

    pub fn len(&self) -> usize {
        self.b.len()
    }

    /// `b - a · x`; nonnegative entries mean the row holds at `x`.
    pub fn residuals(&self, x: ArrayView1<f64>) -> Array1<f64> {
        &self.b - &self.a.dot(&x)
    }
}

/// The immutable problem description a single solve runs against.
#[derive(Debug, Clone)]
pub(crate) struct Problem {
    pub n: usize,
    pub bounds: Bounds,
    pub ineq: Option<LinearConstraints>,
    pub eq: Option<LinearConstraints>,
    pub m_nlcon: usize,
}

impl Problem {
    pub fn new(
        x0: ArrayView1<f64>,
        xl: Option<&Array1<f64>>,
        xu: Option<&Array1<f64>>,
        ineq: Option<(Array2<f64>, Array1<f64>)>,
        eq: Option<(Array2<f64>, Array1<f64>)>,
        m_nlcon: usize,
    ) -> Result<Self, InvalidInput> {
        let n = x0.len();
        if n == 0 {
            return Err(InvalidInput::EmptyInitialPoint);
        }
        if x0.iter().any(|v| !v.is_finite()) {
            return Err(InvalidInput::NonFiniteInitialPoint);
        }
        let bounds = Bounds::from_optional(n, xl, xu)?;
        let ineq = ineq
            .map(|(a, b)| LinearConstraints::new(a, b, n))
            .transpose()?;
        let eq = eq.map(|(a, b)| LinearConstraints::new(a, b, n)).transpose()?;
        Ok(Problem {
            n,
            bounds,
            ineq,
            eq,
            m_nlcon,
        })
    }

    /// Maximum constraint violation at `x` across bounds, linear rows, and
    /// the supplied nonlinear constraint values (feasible iff each ≤ 0).
    /// Always ≥ 0; exactly 0 when there is nothing violated.
    pub fn violation(&self, x: ArrayView1<f64>, nlconstr: ArrayView1<f64>) -> f64 {
        let mut v = self.bounds.violation(x);
        if let Some(ineq) = &self.ineq {
            for r in ineq.residuals(x).iter() {
                v = v.max(-r);
            }
        }
        if let Some(eq) = &self.eq {
            for r in eq.residuals(x).iter() {
                v = v.max(r.abs());
            }
        }
        for c in nlconstr.iter() {
            // a NaN constraint value counts as a unit violation rather than
            // poisoning the comparison
            v = v.max(sanitize(*c).min(f64::MAX));
        }
        v.max(0.0)
    }

}

/// The merit order of §constraint handling: strictly smaller violation wins
/// outright; within the violation tie tolerance the smaller objective wins.
/// NaN objectives rank behind everything finite.
pub(crate) fn merit_better(f_a: f64, v_a: f64, f_b: f64, v_b: f64) -> bool {
    if v_a + CSTRV_TIE < v_b {
        return true;
    }
    if v_b + CSTRV_TIE < v_a {
        return false;
    }
    sanitize(f_a) < sanitize(f_b)
}
