//! Active-set quadratic programming over the intersection of the trust
//! region ball and a polytope of linear rows (bound rows folded in by the
//! caller). Search directions are projected steepest-descent directions in
//! the null space of the working set, so the working set changes one row at
//! a time and the first move dominates the projected Cauchy step.
use super::{multipliers, nullspace_project, to_ball_boundary};
use crate::model::SurrogateModel;
use ndarray::prelude::*;

const TINY: f64 = 1e-12;

/// Inequality rows `a · s <= resid` in step space. Residuals are clamped at
/// zero by the caller: a row the current iterate already violates acts as a
/// wall, so a step never deepens an existing violation.
#[derive(Debug, Clone)]
pub(crate) struct PolytopeRows {
    pub a: Array2<f64>,
    pub resid: Array1<f64>,
}

impl PolytopeRows {
    pub fn len(&self) -> usize {
        self.resid.len()
    }
}

/// Minimizes the surrogate over `‖s‖ <= delta`, the inequality rows, and the
/// equality rows `a_eq · s = r_eq` (kept permanently in the working set).
///
/// A nonzero equality residual is corrected first by the minimum-norm step,
/// capped at half the radius; the projected iterations that follow preserve
/// whatever residual remains.
pub(crate) fn solve_qp(
    model: &SurrogateModel,
    ineq: &PolytopeRows,
    eq: Option<(&Array2<f64>, &Array1<f64>)>,
    delta: f64,
) -> Array1<f64> {
    let n = model.g.len();
    let n_eq = eq.map_or(0, |(a, _)| a.nrows());
    let mut s = Array1::zeros(n);

    if let Some((a_eq, r_eq)) = eq {
        if a_eq.nrows() > 0 && r_eq.dot(r_eq).sqrt() > TINY {
            let gram = a_eq.dot(&a_eq.t());
            if let Ok(lu) = crate::linalg::LuFactors::new(gram) {
                let mut s0 = a_eq.t().dot(&lu.solve(r_eq.view()));
                let norm = s0.dot(&s0).sqrt();
                let cap = 0.5 * delta;
                if norm > cap {
                    s0 *= cap / norm;
                }
                s = s0;
            }
        }
    }

    // working set: equality rows first (never dropped), then row indices of
    // the inequality block
    let mut active: Vec<usize> = Vec::new();

    let max_iter = 10 * (n + ineq.len()) + 10;
    for _it in 0..max_iter {
        let grad = model.gradient_at(s.view());
        let normals = stack_normals(eq.map(|(a, _)| a), ineq, &active, n);
        let d = match nullspace_project(grad.mapv(|x| -x).view(), &normals) {
            Some(d) => d,
            None => break, // dependent working set: accept the iterate
        };
        let dnorm = d.dot(&d).sqrt();

        if dnorm <= TINY * (1.0 + grad.dot(&grad).sqrt()) {
            // stationary in the current subspace; try releasing the most
            // negative inequality multiplier
            if active.is_empty() {
                break;
            }
            let lam = match multipliers(grad.view(), &normals) {
                Some(lam) => lam,
                None => break,
            };
            let mut drop = None;
            let mut most_negative = -TINY;
            for (k, row) in active.iter().enumerate() {
                let l = lam[n_eq + k];
                if l < most_negative {
                    most_negative = l;
                    drop = Some((k, *row));
                }
            }
            match drop {
                Some((k, _)) => {
                    active.remove(k);
                    continue;
                }
                None => break, // all multipliers nonnegative: KKT point
            }
        }

        let hd = model.hess_vec(d.view());
        let curv = d.dot(&hd);
        let alpha_ball = to_ball_boundary(s.view(), d.view(), delta);
        let (alpha_con, blocker) = blocking_row(ineq, &active, &s, &d);
        let alpha_curv = if curv > 0.0 {
            -grad.dot(&d) / curv
        } else {
            f64::INFINITY
        };

        let alpha = alpha_ball.min(alpha_con).min(alpha_curv);
        if !(alpha > TINY) {
            // no room along the projected direction; treat the blocker as
            // active and try again, or give up at the boundary
            match blocker {
                Some(row) if alpha_con <= alpha_ball && !active.contains(&row) => {
                    active.push(row);
                    continue;
                }
                _ => break,
            }
        }

        s.scaled_add(alpha, &d);

        if alpha == alpha_con {
            if let Some(row) = blocker {
                active.push(row);
                continue;
            }
        }
        if alpha == alpha_ball {
            break;
        }
        // alpha_curv: subspace minimizer reached, loop to re-project
    }
    s
}

/// Stacks equality rows and the active inequality rows into one normal
/// matrix.
fn stack_normals(
    eq: Option<&Array2<f64>>,
    ineq: &PolytopeRows,
    active: &[usize],
    n: usize,
) -> Array2<f64> {
    let n_eq = eq.map_or(0, |a| a.nrows());
    let mut normals = Array2::zeros((n_eq + active.len(), n));
    if let Some(a_eq) = eq {
        normals.slice_mut(s![..n_eq, ..]).assign(a_eq);
    }
    for (k, row) in active.iter().enumerate() {
        normals.row_mut(n_eq + k).assign(&ineq.a.row(*row));
    }
    normals
}

/// First inactive inequality row hit when moving from `s` along `d`.
fn blocking_row(
    ineq: &PolytopeRows,
    active: &[usize],
    s: &Array1<f64>,
    d: &Array1<f64>,
) -> (f64, Option<usize>) {
    let mut alpha = f64::INFINITY;
    let mut blocker = None;
    for row in 0..ineq.len() {
        if active.contains(&row) {
            continue;
        }
        let ad = ineq.a.row(row).dot(d);
        if ad <= TINY {
            continue;
        }
        let room = ineq.resid[row] - ineq.a.row(row).dot(s);
        let a = (room / ad).max(0.0);
        if a < alpha {
            alpha = a;
            blocker = Some(row);
        }
    }
    (alpha, blocker)
}
