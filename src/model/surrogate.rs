//! Polynomial surrogate models derived from interpolation conditions.
//!
//! Three shapes are in play, one per solver family: a purely linear model,
//! a quadratic with diagonal curvature, and a full quadratic. The shape
//! fixes the cardinality of the interpolation set that determines it.
use ndarray::prelude::*;

/// The surrogate shape a solver variant interpolates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ModelKind {
    /// Constant plus gradient; determined by `n + 1` points.
    Linear,
    /// Constant, gradient, and diagonal curvature; `2n + 1` points.
    DiagonalQuadratic,
    /// Full symmetric quadratic; `(n + 1)(n + 2)/2` points.
    FullQuadratic,
}

impl ModelKind {
    /// Number of interpolation points (equivalently, basis functions).
    pub fn points(self, n: usize) -> usize {
        match self {
            ModelKind::Linear => n + 1,
            ModelKind::DiagonalQuadratic => 2 * n + 1,
            ModelKind::FullQuadratic => (n + 1) * (n + 2) / 2,
        }
    }

    /// Writes the basis row `phi(u)` for a (scaled) displacement `u`.
    ///
    /// Layout: `[1, u_1..u_n]`, then for the diagonal shape `u_i^2 / 2`
    /// (so the coefficient is the curvature itself), then for the full
    /// shape the cross terms `u_i u_j` for `i < j`.
    pub fn fill_basis_row(self, mut row: ArrayViewMut1<f64>, u: ArrayView1<f64>) {
        let n = u.len();
        row[0] = 1.0;
        for i in 0..n {
            row[i + 1] = u[i];
        }
        match self {
            ModelKind::Linear => {}
            ModelKind::DiagonalQuadratic | ModelKind::FullQuadratic => {
                for i in 0..n {
                    row[n + 1 + i] = 0.5 * u[i] * u[i];
                }
                if self == ModelKind::FullQuadratic {
                    let mut k = 2 * n + 1;
                    for i in 0..n {
                        for j in (i + 1)..n {
                            row[k] = u[i] * u[j];
                            k += 1;
                        }
                    }
                }
            }
        }
    }

    /// Rebuilds a model from its basis coefficients, undoing the `scale`
    /// applied to displacements when the interpolation system was formed.
    pub fn model_from_coeffs(self, n: usize, coeffs: ArrayView1<f64>, scale: f64) -> SurrogateModel {
        let c = coeffs[0];
        let g = Array1::from_shape_fn(n, |i| coeffs[i + 1] / scale);
        let h = match self {
            ModelKind::Linear => Curvature::None,
            ModelKind::DiagonalQuadratic => {
                let d = Array1::from_shape_fn(n, |i| coeffs[n + 1 + i] / (scale * scale));
                Curvature::Diagonal(d)
            }
            ModelKind::FullQuadratic => {
                let mut h = Array2::zeros((n, n));
                for i in 0..n {
                    h[[i, i]] = coeffs[n + 1 + i] / (scale * scale);
                }
                let mut k = 2 * n + 1;
                for i in 0..n {
                    for j in (i + 1)..n {
                        let v = coeffs[k] / (scale * scale);
                        h[[i, j]] = v;
                        h[[j, i]] = v;
                        k += 1;
                    }
                }
                Curvature::Full(h)
            }
        };
        SurrogateModel { c, g, h }
    }
}

/// Curvature part of a surrogate model.
#[derive(Debug, Clone)]
pub(crate) enum Curvature {
    None,
    Diagonal(Array1<f64>),
    Full(Array2<f64>),
}

/// A fitted local model `q(s) = c + g·s + s·H·s / 2` of the objective (or of
/// one constraint), in displacements `s` from the fit's base point.
#[derive(Debug, Clone)]
pub(crate) struct SurrogateModel {
    pub c: f64,
    pub g: Array1<f64>,
    pub h: Curvature,
}

impl SurrogateModel {
    /// `H · v`.
    pub fn hess_vec(&self, v: ArrayView1<f64>) -> Array1<f64> {
        match &self.h {
            Curvature::None => Array1::zeros(v.len()),
            Curvature::Diagonal(d) => d * &v,
            Curvature::Full(h) => h.dot(&v),
        }
    }

    /// Model value at displacement `s`.
    pub fn value(&self, s: ArrayView1<f64>) -> f64 {
        self.c + self.g.dot(&s) + 0.5 * s.dot(&self.hess_vec(s))
    }

    /// Model gradient at displacement `s`.
    pub fn gradient_at(&self, s: ArrayView1<f64>) -> Array1<f64> {
        &self.g + &self.hess_vec(s)
    }

    /// Whether every coefficient is finite.
    pub fn is_finite(&self) -> bool {
        if !self.c.is_finite() || self.g.iter().any(|v| !v.is_finite()) {
            return false;
        }
        match &self.h {
            Curvature::None => true,
            Curvature::Diagonal(d) => d.iter().all(|v| v.is_finite()),
            Curvature::Full(h) => h.iter().all(|v| v.is_finite()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::approx_eq;

    #[test]
    fn cardinality_by_kind() {
        assert_eq!(ModelKind::Linear.points(3), 4);
        assert_eq!(ModelKind::DiagonalQuadratic.points(3), 7);
        assert_eq!(ModelKind::FullQuadratic.points(3), 10);
    }

    #[test]
    fn full_quadratic_round_trip() {
        // q(u) = 2 + u1 - u2 + u1^2/2 + 3 u2^2/2 + 2 u1 u2, scale 1
        let coeffs = array![2.0, 1.0, -1.0, 1.0, 3.0, 2.0];
        let m = ModelKind::FullQuadratic.model_from_coeffs(2, coeffs.view(), 1.0);
        let s = array![0.5, -1.0];
        let mut row = Array1::zeros(6);
        ModelKind::FullQuadratic.fill_basis_row(row.view_mut(), s.view());
        assert!(approx_eq!(
            f64,
            m.value(s.view()),
            row.dot(&coeffs),
            ulps = 4
        ));
    }

    #[test]
    fn scale_is_undone() {
        // With displacements scaled by 2, coefficients double (gradient) and
        // quadruple (curvature); the rebuilt model must agree either way.
        let s = array![0.8, -0.4];
        let scale = 2.0;
        let mut row = Array1::zeros(5);
        ModelKind::DiagonalQuadratic.fill_basis_row(row.view_mut(), (&s / scale).view());
        let coeffs = array![1.0, 2.0 * scale, 0.0, 4.0 * scale * scale, 2.0 * scale * scale];
        let m = ModelKind::DiagonalQuadratic.model_from_coeffs(2, coeffs.view(), scale);
        let expected = row.dot(&coeffs);
        assert!((m.value(s.view()) - expected).abs() < 1e-12);
        assert!((m.g[0] - 2.0).abs() < 1e-12);
    }

    #[test]
    fn gradient_matches_finite_difference() {
        let m = SurrogateModel {
            c: 0.0,
            g: array![1.0, -2.0],
            h: Curvature::Full(array![[2.0, 0.5], [0.5, 4.0]]),
        };
        let s = array![0.3, 0.7];
        let g = m.gradient_at(s.view());
        let eps = 1e-6;
        for i in 0..2 {
            let mut sp = s.clone();
            sp[i] += eps;
            let mut sm = s.clone();
            sm[i] -= eps;
            let fd = (m.value(sp.view()) - m.value(sm.view())) / (2.0 * eps);
            assert!((g[i] - fd).abs() < 1e-6);
        }
    }
}
