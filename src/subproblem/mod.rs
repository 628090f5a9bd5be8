//! Trust-region subproblem solvers, one per constraint capability: truncated
//! conjugate gradients over ball ∩ box, an active-set quadratic program over
//! ball ∩ polytope, and a two-stage linear subproblem for linearized
//! nonlinear constraints.

mod active_set;
mod linearized;
mod trsbox;

pub(crate) use self::active_set::{solve_qp, PolytopeRows};
pub(crate) use self::linearized::{solve_linearized, LinearizedRow};
pub(crate) use self::trsbox::trsbox;

use crate::linalg::LuFactors;
use ndarray::prelude::*;

/// Largest `alpha >= 0` with `‖s + alpha d‖ <= delta`. Returns 0 when `s`
/// already sits on the boundary and `d` points outward.
pub(super) fn to_ball_boundary(s: ArrayView1<f64>, d: ArrayView1<f64>, delta: f64) -> f64 {
    let dd = d.dot(&d);
    if dd <= 0.0 {
        return 0.0;
    }
    let sd = s.dot(&d);
    let ss = s.dot(&s);
    let slack = delta * delta - ss;
    if slack <= 0.0 {
        return 0.0;
    }
    let disc = (sd * sd + dd * slack).max(0.0).sqrt();
    // stable quadratic root for alpha > 0
    let alpha = if sd <= 0.0 {
        (disc - sd) / dd
    } else {
        slack / (disc + sd)
    };
    alpha.max(0.0)
}

/// Projects `v` onto the null space of the rows of `normals` (a `k x n`
/// matrix). `None` when the normals are linearly dependent to working
/// precision, which callers treat as "stop adding constraints".
pub(super) fn nullspace_project(
    v: ArrayView1<f64>,
    normals: &Array2<f64>,
) -> Option<Array1<f64>> {
    if normals.nrows() == 0 {
        return Some(v.to_owned());
    }
    let gram = normals.dot(&normals.t());
    let lu = LuFactors::new(gram).ok()?;
    let lam = lu.solve(normals.dot(&v).view());
    Some(&v - &normals.t().dot(&lam))
}

/// Lagrange multipliers of the active rows for the stationarity test
/// `grad + normals^T lambda = 0` (least-squares sense). `None` on dependent
/// normals.
pub(super) fn multipliers(grad: ArrayView1<f64>, normals: &Array2<f64>) -> Option<Array1<f64>> {
    let gram = normals.dot(&normals.t());
    let lu = LuFactors::new(gram).ok()?;
    Some(lu.solve(normals.dot(&grad.mapv(|x| -x)).view()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ball_boundary_from_center() {
        let s = array![0.0, 0.0];
        let d = array![3.0, 4.0];
        let a = to_ball_boundary(s.view(), d.view(), 10.0);
        assert!((a - 2.0).abs() < 1e-12);
    }

    #[test]
    fn ball_boundary_from_inside_moving_back() {
        let s = array![0.9, 0.0];
        let d = array![-1.0, 0.0];
        let a = to_ball_boundary(s.view(), d.view(), 1.0);
        assert!((a - 1.9).abs() < 1e-12);
    }

    #[test]
    fn ball_boundary_at_edge_is_zero() {
        let s = array![1.0, 0.0];
        let d = array![1.0, 0.0];
        assert_eq!(to_ball_boundary(s.view(), d.view(), 1.0), 0.0);
    }

    #[test]
    fn projection_removes_normal_components() {
        let normals = array![[1.0, 0.0, 0.0], [0.0, 1.0, 0.0]];
        let v = array![2.0, -3.0, 5.0];
        let p = nullspace_project(v.view(), &normals).unwrap();
        assert!(p[0].abs() < 1e-12);
        assert!(p[1].abs() < 1e-12);
        assert!((p[2] - 5.0).abs() < 1e-12);
    }

    #[test]
    fn dependent_normals_are_detected() {
        let normals = array![[1.0, 1.0], [2.0, 2.0]];
        assert!(nullspace_project(array![1.0, 0.0].view(), &normals).is_none());
    }

    #[test]
    fn multipliers_recover_active_gradient() {
        // grad = -2 * a0, single active row a0: lambda = [2]
        let normals = array![[1.0, 1.0]];
        let grad = array![-2.0, -2.0];
        let lam = multipliers(grad.view(), &normals).unwrap();
        assert!((lam[0] - 2.0).abs() < 1e-12);
    }
}
