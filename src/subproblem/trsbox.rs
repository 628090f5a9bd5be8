//! Truncated conjugate-gradient minimization of a quadratic surrogate over
//! the intersection of a trust-region ball and the variable box.
//!
//! The first direction of every (re)start is the projected steepest-descent
//! direction, so the returned step never does worse than the projected
//! Cauchy step. When a variable runs into its bound it is pinned there and
//! the iteration restarts in the remaining free subspace.
use super::to_ball_boundary;
use crate::model::SurrogateModel;
use ndarray::prelude::*;

/// Minimizes `model` over `‖s‖ <= delta`, `lo <= s <= hi` (step-space bounds,
/// `lo <= 0 <= hi`). Returns the step; the caller derives the predicted
/// reduction from the model.
pub(crate) fn trsbox(
    model: &SurrogateModel,
    lo: &Array1<f64>,
    hi: &Array1<f64>,
    delta: f64,
) -> Array1<f64> {
    let n = model.g.len();
    let mut s = Array1::zeros(n);
    let mut free = vec![true; n];

    // variables with no room in the descent direction are fixed up front
    for i in 0..n {
        if hi[i] <= 0.0 && lo[i] >= 0.0 {
            free[i] = false;
        }
    }

    let gnorm0 = model.g.dot(&model.g).sqrt();
    let gtol = 1e-10 * (1.0 + gnorm0);

    // each restart pins at least one variable, so n + 1 rounds suffice
    'restart: for _round in 0..(n + 1) {
        let mut r = model.gradient_at(s.view()).mapv(|x| -x);
        mask(&mut r, &free);
        if r.dot(&r).sqrt() <= gtol {
            break;
        }
        let mut d = r.clone();

        for _it in 0..(2 * n + 2) {
            let mut hd = model.hess_vec(d.view());
            mask(&mut hd, &free);
            let curv = d.dot(&hd);
            let rr = r.dot(&r);

            let alpha_ball = to_ball_boundary(s.view(), d.view(), delta);
            let (alpha_box, blocked) = to_box_boundary(&s, &d, lo, hi, &free);
            let alpha_edge = alpha_ball.min(alpha_box);

            let alpha_cg = if curv > 0.0 { rr / curv } else { f64::INFINITY };

            if alpha_cg >= alpha_edge {
                // the model minimizer along d lies outside; stop at the edge
                if alpha_edge > 0.0 {
                    s.scaled_add(alpha_edge, &d);
                }
                if alpha_box <= alpha_ball {
                    if let Some(i) = blocked {
                        // land exactly on the bound and drop the variable
                        s[i] = if d[i] > 0.0 { hi[i] } else { lo[i] };
                        free[i] = false;
                        continue 'restart;
                    }
                }
                // trust-region boundary: done
                break 'restart;
            }

            s.scaled_add(alpha_cg, &d);
            r.scaled_add(-alpha_cg, &hd);
            mask(&mut r, &free);
            let rr_new = r.dot(&r);
            if rr_new.sqrt() <= gtol {
                break 'restart;
            }
            let beta = rr_new / rr;
            d = &r + &(&d * beta);
        }
        break;
    }

    // guard against drift outside the box from floating-point accumulation
    for i in 0..n {
        s[i] = s[i].max(lo[i]).min(hi[i]);
    }
    s
}

fn mask(v: &mut Array1<f64>, free: &[bool]) {
    for i in 0..v.len() {
        if !free[i] {
            v[i] = 0.0;
        }
    }
}

/// Largest feasible step along `d` before some free variable hits its bound,
/// plus the index of the first blocker (if any bound is reachable).
fn to_box_boundary(
    s: &Array1<f64>,
    d: &Array1<f64>,
    lo: &Array1<f64>,
    hi: &Array1<f64>,
    free: &[bool],
) -> (f64, Option<usize>) {
    let mut alpha = f64::INFINITY;
    let mut blocker = None;
    for i in 0..s.len() {
        if !free[i] {
            continue;
        }
        let a = if d[i] > f64::EPSILON {
            (hi[i] - s[i]) / d[i]
        } else if d[i] < -f64::EPSILON {
            (lo[i] - s[i]) / d[i]
        } else {
            continue;
        };
        if a < alpha {
            alpha = a;
            blocker = Some(i);
        }
    }
    (alpha.max(0.0), blocker)
}
