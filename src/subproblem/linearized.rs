//! The subproblem of the nonlinear-constraint variant: a *linear* model of
//! the objective minimized against *linearized* constraints inside the trust
//! region. Runs in two stages, the way the classic simplex-based method
//! does: first drive the maximum linearized violation down, then improve the
//! objective without giving back the violation level just attained.
//!
//! Stage one is confined to 80% of the radius so stage two always keeps room
//! to move when the linearized system cannot be satisfied inside the ball.
use super::{nullspace_project, to_ball_boundary};
use ndarray::prelude::*;

const TINY: f64 = 1e-12;
/// Fraction of the trust-region radius stage one may use up.
const FEASIBILITY_FRACTION: f64 = 0.8;

/// A linearized constraint `value + grad · s <= 0`.
#[derive(Debug, Clone)]
pub(crate) struct LinearizedRow {
    pub value: f64,
    pub grad: Array1<f64>,
}

impl LinearizedRow {
    fn at(&self, s: &Array1<f64>) -> f64 {
        self.value + self.grad.dot(s)
    }
}

/// Minimizes `g_obj · s` over `‖s‖ <= delta` subject to the rows. Returns
/// the step; the caller prices it through the models.
pub(crate) fn solve_linearized(
    g_obj: &Array1<f64>,
    rows: &[LinearizedRow],
    delta: f64,
) -> Array1<f64> {
    let n = g_obj.len();
    let mut s = Array1::zeros(n);

    // stage one: reduce the worst linearized violation
    let stage_one_radius = FEASIBILITY_FRACTION * delta;
    for _it in 0..20 {
        let worst = max_violation(rows, &s);
        if worst <= 0.0 {
            break;
        }
        // subgradient of the max over the near-worst rows
        let cutoff = worst - 0.2 * worst.abs() - TINY;
        let near_worst: Vec<usize> = (0..rows.len())
            .filter(|&j| rows[j].at(&s) >= cutoff)
            .collect();
        let mut d = Array1::<f64>::zeros(n);
        for &j in &near_worst {
            d -= &rows[j].grad;
        }
        let dnorm = d.dot(&d).sqrt();
        if dnorm <= TINY {
            break;
        }
        d /= dnorm;

        // the step that would zero every near-worst row, if they all descend
        let mut rate_min = f64::INFINITY;
        for &j in &near_worst {
            rate_min = rate_min.min(-rows[j].grad.dot(&d));
        }
        let alpha_ball = to_ball_boundary(s.view(), d.view(), stage_one_radius);
        let mut alpha = if rate_min > TINY {
            (worst / rate_min).min(alpha_ball)
        } else {
            alpha_ball
        };
        if alpha <= TINY {
            break;
        }
        // backtrack until the max violation actually drops
        let mut improved = false;
        for _half in 0..8 {
            let trial = &s + &(&d * alpha);
            if max_violation(rows, &trial) < worst {
                s = trial;
                improved = true;
                break;
            }
            alpha *= 0.5;
        }
        if !improved {
            break;
        }
    }

    // stage two: improve the objective while holding the attained level
    let level = max_violation(rows, &s).max(0.0);
    for _it in 0..(2 * n + 5) {
        let active: Vec<usize> = (0..rows.len())
            .filter(|&j| rows[j].at(&s) >= level - 1e-10)
            .collect();
        let mut normals = Array2::zeros((active.len(), n));
        for (k, &j) in active.iter().enumerate() {
            normals.row_mut(k).assign(&rows[j].grad);
        }

        let d = match nullspace_project(g_obj.mapv(|x| -x).view(), &normals) {
            Some(d) => d,
            None => break,
        };
        let dnorm = d.dot(&d).sqrt();
        if dnorm <= TINY * (1.0 + g_obj.dot(g_obj).sqrt()) {
            break;
        }

        let alpha_ball = to_ball_boundary(s.view(), d.view(), delta);
        let mut alpha = alpha_ball;
        let mut blocked = false;
        for (j, row) in rows.iter().enumerate() {
            if active.contains(&j) {
                continue;
            }
            let gd = row.grad.dot(&d);
            if gd <= TINY {
                continue;
            }
            let room = level - row.at(&s);
            let a = (room / gd).max(0.0);
            if a < alpha {
                alpha = a;
                blocked = true;
            }
        }
        if alpha <= TINY {
            if !blocked {
                break;
            }
            // a zero-room row joins the working set on the next round
            continue;
        }
        s.scaled_add(alpha, &d);
        if alpha == alpha_ball {
            break;
        }
    }
    s
}

fn max_violation(rows: &[LinearizedRow], s: &Array1<f64>) -> f64 {
    rows.iter()
        .fold(f64::NEG_INFINITY, |acc, row| acc.max(row.at(s)))
}
