//! The iteration controller shared by all five solvers: one loop of
//! {fit model → solve subproblem → evaluate → accept/reject → update radius
//! and geometry}, parameterized by the surrogate shape and driven against
//! the normalized [`Problem`]. The five public entry points are thin
//! adapters over [`solve`].
use crate::minimizer::{OptimResult, Status};
use crate::model::{Fit, InterpolationSet, ModelKind};
use crate::problem::{merit_better, Problem, CSTRV_TIE};
use crate::subproblem::{solve_linearized, solve_qp, trsbox, LinearizedRow, PolytopeRows};
use crate::utils::{sanitize, Evaluation, Evaluator};
use log::{debug, info, warn};
use ndarray::prelude::*;

/// Which solver family is running: fixes the surrogate shape and names the
/// run in the log.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Variant {
    pub name: &'static str,
    pub model: ModelKind,
}

/// Resolved configuration common to every variant.
#[derive(Debug, Clone)]
pub(crate) struct Config {
    pub rhobeg: f64,
    pub rhoend: f64,
    pub maxfun: usize,
    pub ftarget: Option<f64>,
}

/// Ratio thresholds and radius factors of the accept/reject rule.
const RATIO_LOW: f64 = 0.1;
const RATIO_HIGH: f64 = 0.7;

/// Early-exit conditions raised from inside an iteration.
enum Interrupt {
    Budget,
    Target,
}

/// The best point seen so far, kept separately from the interpolation set so
/// that budget exhaustion mid-flight still reports a well-formed result.
struct Best {
    x: Array1<f64>,
    f: f64,
    v: f64,
    nlconstr: Array1<f64>,
}

impl Best {
    fn consider(&mut self, x: ArrayView1<f64>, f: f64, v: f64, nlconstr: ArrayView1<f64>) {
        if merit_better(f, v, self.f, self.v) {
            self.x.assign(&x);
            self.f = f;
            self.v = v;
            self.nlconstr.assign(&nlconstr);
        }
    }
}

/// Runs one solve. The problem and configuration are validated by the entry
/// points; this function assumes them consistent.
pub(crate) fn solve<F>(
    variant: Variant,
    problem: Problem,
    config: Config,
    func: F,
    x0: ArrayView1<f64>,
) -> OptimResult
where
    F: FnMut(ArrayView1<f64>) -> Evaluation,
{
    let mut ctrl = Controller {
        best: Best {
            x: {
                let mut x = x0.to_owned();
                problem.bounds.clip(&mut x);
                x
            },
            f: f64::INFINITY,
            v: f64::INFINITY,
            nlconstr: Array1::from_elem(problem.m_nlcon, f64::INFINITY),
        },
        set: InterpolationSet::new(variant.model, problem.n, problem.m_nlcon),
        eval: Evaluator::new(func, config.maxfun),
        rho: config.rhobeg,
        delta: config.rhobeg,
        mu: 1.0,
        variant,
        problem,
        config,
    };
    let status = match ctrl.run(x0) {
        Ok(status) => status,
        Err(Interrupt::Budget) => Status::MaxEvaluations,
        Err(Interrupt::Target) => Status::TargetReached,
    };
    ctrl.finish(status)
}

struct Controller<F> {
    variant: Variant,
    problem: Problem,
    config: Config,
    eval: Evaluator<F>,
    set: InterpolationSet,
    rho: f64,
    delta: f64,
    /// Penalty weight of the violation term in the nonlinear-constraint
    /// merit function. Only ever raised.
    mu: f64,
    best: Best,
}

impl<F> Controller<F>
where
    F: FnMut(ArrayView1<f64>) -> Evaluation,
{
    fn run(&mut self, x0: ArrayView1<f64>) -> Result<Status, Interrupt> {
        // ---- Initializing: build the starting interpolation set
        let start = InterpolationSet::shifted_start(x0, &self.problem.bounds, self.rho);
        for p in
            InterpolationSet::initial_pattern(self.variant.model, &start, self.rho, &self.problem.bounds)
        {
            let (f, nlconstr, v) = self.evaluate(&p)?;
            self.set.push(p.view(), f, nlconstr.view(), v);
        }
        debug!(
            "{}: initialized {} samples, rho = {:e}",
            self.variant.name,
            self.set.capacity(),
            self.rho
        );

        // ---- Iterating / GeometryFixing
        let mut singular_repairs = 0usize;
        loop {
            let scale = self.delta.max(self.rho);
            let fit = match self.set.fit(scale) {
                Ok(fit) => {
                    singular_repairs = 0;
                    fit
                }
                Err(_) => {
                    // degenerate set: geometry repair is mandatory before any
                    // further model-improving step
                    if singular_repairs >= self.set.capacity() + self.problem.n {
                        return Ok(Status::NanModel);
                    }
                    warn!(
                        "{}: interpolation system degenerate, repairing geometry",
                        self.variant.name
                    );
                    if !self.repair_without_model(singular_repairs)? {
                        return Ok(Status::NanModel);
                    }
                    singular_repairs += 1;
                    continue;
                }
            };

            let s = self.trial_step(&fit);
            let snorm = s.dot(&s).sqrt();
            let pred = self.predicted_reduction(&fit, &s);

            if snorm < 0.5 * self.rho || !(pred > 0.0) {
                // the model sees nothing useful at this scale: fix geometry,
                // then sharpen the resolution, then stop
                let mut repaired = false;
                if let Some(t) = self.set.worst_geometry_index(self.delta) {
                    repaired = self.improve_geometry(t, &fit)?;
                }
                if repaired {
                    continue;
                }
                if self.rho > self.config.rhoend {
                    self.reduce_rho();
                    continue;
                }
                return Ok(if snorm < 0.5 * self.rho {
                    Status::SmallRadius
                } else {
                    Status::TrustRegionStall
                });
            }

            // trial evaluation at x = base + s; the adapter must not be
            // asked once the budget is spent
            if !self.eval.has_budget() {
                return Err(Interrupt::Budget);
            }
            let mut x_trial = &fit.base + &s;
            self.problem.bounds.clip(&mut x_trial);
            let (f_new, nlconstr_new, v_new) = self.evaluate(&x_trial)?;

            let f_base = self.set.fval(self.set.best_index());
            let v_base = self.set.vval(self.set.best_index());
            let actual = self.merit(f_base, v_base) - self.merit(f_new, v_new);
            let ratio = actual / pred;

            // radius update, floored at the current resolution; a NaN ratio
            // (infinite merit at both ends) shrinks like a failed step
            self.delta = if ratio > RATIO_HIGH {
                (0.5 * self.delta).max(2.0 * snorm)
            } else if ratio > RATIO_LOW {
                (0.5 * self.delta).max(snorm)
            } else {
                0.5 * snorm
            }
            .max(self.rho);

            // the evaluated point is offered to the set either way; a
            // rejected trial still carries geometry information
            let replaced = self.set.update(
                x_trial.view(),
                f_new,
                nlconstr_new.view(),
                v_new,
                &fit,
                self.delta,
            );
            debug!(
                "{}: nf = {}, f = {:.6e}, cstrv = {:.2e}, ratio = {:.3}, delta = {:.3e}, replaced = {}",
                self.variant.name,
                self.eval.count(),
                f_new,
                v_new,
                ratio,
                self.delta,
                replaced
            );

            // a failed step already at the resolution floor: repair any far
            // geometry first, and once the set is clean the resolution is
            // spent
            if !(ratio > RATIO_LOW) && self.delta <= self.rho {
                let mut repaired = false;
                if let Some(t) = self.set.worst_geometry_index(self.delta) {
                    repaired = self.improve_geometry(t, &fit)?;
                }
                if !repaired {
                    if self.rho > self.config.rhoend {
                        self.reduce_rho();
                    } else {
                        return Ok(Status::SmallRadius);
                    }
                }
            }
        }
    }

    /// Calls the adapter, records the point in the best-so-far slot, and
    /// raises the target interrupt when the configured objective target is
    /// reached by a (tolerably) feasible point.
    fn evaluate(&mut self, x: &Array1<f64>) -> Result<(f64, Array1<f64>, f64), Interrupt> {
        let Evaluation { f, nlconstr } = self
            .eval
            .call(x.view())
            .map_err(|_| Interrupt::Budget)?;
        let v = self.problem.violation(x.view(), nlconstr.view());
        self.best.consider(x.view(), f, v, nlconstr.view());
        if let Some(target) = self.config.ftarget {
            if v <= CSTRV_TIE && sanitize(f) <= target {
                return Err(Interrupt::Target);
            }
        }
        Ok((f, nlconstr, v))
    }

    /// Merit of a point for the acceptance ratio: the plain objective unless
    /// nonlinear constraints are in play, then the penalty function.
    fn merit(&self, f: f64, v: f64) -> f64 {
        if self.problem.m_nlcon > 0 {
            sanitize(f) + self.mu * v
        } else {
            sanitize(f)
        }
    }

    /// Dispatches the trust-region subproblem on the constraints actually
    /// present, not on the variant: a linearly-constrained solver with no
    /// rows runs the identical path as the bound-constrained one.
    fn trial_step(&self, fit: &Fit) -> Array1<f64> {
        if self.problem.m_nlcon > 0 {
            let rows = self.linearized_rows(fit);
            return solve_linearized(&fit.objective.g, &rows, self.delta);
        }
        if self.problem.ineq.is_some() || self.problem.eq.is_some() {
            let (rows, eq_a, eq_r) = self.polytope_rows(&fit.base);
            let eq = match (&eq_a, &eq_r) {
                (Some(a), Some(r)) => Some((a, r)),
                _ => None,
            };
            return solve_qp(&fit.objective, &rows, eq, self.delta);
        }
        let n = self.problem.n;
        let mut lo = Array1::zeros(n);
        let mut hi = Array1::zeros(n);
        for i in 0..n {
            lo[i] = self.problem.bounds.lower[i] - fit.base[i];
            hi[i] = self.problem.bounds.upper[i] - fit.base[i];
        }
        trsbox(&fit.objective, &lo, &hi, self.delta)
    }

    /// Every constraint as a linearized row `value + grad · s <= 0` at the
    /// fit base: nonlinear surrogates, linear rows, and finite bounds.
    fn linearized_rows(&self, fit: &Fit) -> Vec<LinearizedRow> {
        let x = &fit.base;
        let n = self.problem.n;
        let mut rows = Vec::new();
        for m in &fit.constraints {
            rows.push(LinearizedRow {
                value: m.c,
                grad: m.g.clone(),
            });
        }
        if let Some(ineq) = &self.problem.ineq {
            for i in 0..ineq.len() {
                rows.push(LinearizedRow {
                    value: ineq.a.row(i).dot(x) - ineq.b[i],
                    grad: ineq.a.row(i).to_owned(),
                });
            }
        }
        if let Some(eq) = &self.problem.eq {
            for i in 0..eq.len() {
                let value = eq.a.row(i).dot(x) - eq.b[i];
                rows.push(LinearizedRow {
                    value,
                    grad: eq.a.row(i).to_owned(),
                });
                rows.push(LinearizedRow {
                    value: -value,
                    grad: eq.a.row(i).mapv(|c| -c),
                });
            }
        }
        for i in 0..n {
            if self.problem.bounds.upper[i].is_finite() {
                let mut e = Array1::zeros(n);
                e[i] = 1.0;
                rows.push(LinearizedRow {
                    value: x[i] - self.problem.bounds.upper[i],
                    grad: e,
                });
            }
            if self.problem.bounds.lower[i].is_finite() {
                let mut e = Array1::zeros(n);
                e[i] = -1.0;
                rows.push(LinearizedRow {
                    value: self.problem.bounds.lower[i] - x[i],
                    grad: e,
                });
            }
        }
        rows
    }

    /// Inequality rows (linear constraints plus finite bounds) in step space
    /// with residuals clamped at zero, and the equality block with its
    /// residuals.
    #[allow(clippy::type_complexity)]
    fn polytope_rows(
        &self,
        x: &Array1<f64>,
    ) -> (PolytopeRows, Option<Array2<f64>>, Option<Array1<f64>>) {
        let n = self.problem.n;
        let m_ineq = self.problem.ineq.as_ref().map_or(0, |c| c.len());
        let mut n_bound_rows = 0;
        for i in 0..n {
            if self.problem.bounds.upper[i].is_finite() {
                n_bound_rows += 1;
            }
            if self.problem.bounds.lower[i].is_finite() {
                n_bound_rows += 1;
            }
        }

        let mut a = Array2::zeros((m_ineq + n_bound_rows, n));
        let mut resid = Array1::zeros(m_ineq + n_bound_rows);
        if let Some(ineq) = &self.problem.ineq {
            for i in 0..m_ineq {
                a.row_mut(i).assign(&ineq.a.row(i));
                resid[i] = (ineq.b[i] - ineq.a.row(i).dot(x)).max(0.0);
            }
        }
        let mut k = m_ineq;
        for i in 0..n {
            if self.problem.bounds.upper[i].is_finite() {
                a[[k, i]] = 1.0;
                resid[k] = (self.problem.bounds.upper[i] - x[i]).max(0.0);
                k += 1;
            }
            if self.problem.bounds.lower[i].is_finite() {
                a[[k, i]] = -1.0;
                resid[k] = (x[i] - self.problem.bounds.lower[i]).max(0.0);
                k += 1;
            }
        }

        let (eq_a, eq_r) = match &self.problem.eq {
            Some(eq) => (Some(eq.a.clone()), Some(eq.residuals(x.view()))),
            None => (None, None),
        };
        (PolytopeRows { a, resid }, eq_a, eq_r)
    }

    /// Predicted reduction of the merit quantity for step `s`. For the
    /// nonlinear variant this is where the penalty weight is raised: a step
    /// that is predicted to reduce the violation must never be priced at a
    /// non-positive merit reduction.
    fn predicted_reduction(&mut self, fit: &Fit, s: &Array1<f64>) -> f64 {
        if self.problem.m_nlcon == 0 {
            return fit.objective.c - fit.objective.value(s.view());
        }
        let rows = self.linearized_rows(fit);
        let zero = Array1::zeros(s.len());
        let v0 = predicted_violation(&rows, &zero);
        let vs = predicted_violation(&rows, s);
        let pred_f = -fit.objective.g.dot(s);
        let pred_v = v0 - vs;
        let mut pred = pred_f + self.mu * pred_v;
        if pred <= 0.0 && pred_v > CSTRV_TIE {
            let breakeven = -pred_f / pred_v;
            self.mu = (2.0 * self.mu).max(2.0 * breakeven);
            debug!("{}: penalty raised to {:.3e}", self.variant.name, self.mu);
            pred = pred_f + self.mu * pred_v;
        }
        pred
    }

    /// One geometry-improving evaluation replacing sample `t`.
    fn improve_geometry(&mut self, t: usize, fit: &Fit) -> Result<bool, Interrupt> {
        let radius = self.delta.max(self.rho);
        let xg = match self
            .set
            .geometry_point(t, fit, radius, &self.problem.bounds)
        {
            Some(xg) => xg,
            None => return Ok(false),
        };
        let (f, nlconstr, v) = self.evaluate(&xg)?;
        self.set.replace(t, xg.view(), f, nlconstr.view(), v);
        debug!(
            "{}: geometry step replaced sample {} (nf = {})",
            self.variant.name,
            t,
            self.eval.count()
        );
        Ok(true)
    }

    /// Geometry repair when no model exists (singular fit): move the most
    /// expendable sample onto a coordinate step from the best point.
    fn repair_without_model(&mut self, attempt: usize) -> Result<bool, Interrupt> {
        let t = match self.set.any_replaceable_index() {
            Some(t) => t,
            None => return Ok(false),
        };
        let n = self.problem.n;
        let k = attempt % n;
        let radius = self.delta.max(self.rho);
        let best = self.set.point(self.set.best_index()).to_owned();

        let mut xg = best.clone();
        let room_up = self.problem.bounds.upper[k] - best[k];
        let room_dn = best[k] - self.problem.bounds.lower[k];
        xg[k] += if room_up >= room_dn {
            radius.min(room_up)
        } else {
            -radius.min(room_dn)
        };
        let d = &xg - &best;
        if d.dot(&d).sqrt() < 0.1 * radius {
            return Ok(false);
        }
        let (f, nlconstr, v) = self.evaluate(&xg)?;
        self.set.replace(t, xg.view(), f, nlconstr.view(), v);
        Ok(true)
    }

    /// The staged resolution schedule: jump to `rhoend` when close, take the
    /// geometric mean in the mid range, otherwise cut by ten.
    fn reduce_rho(&mut self) {
        let rho_old = self.rho;
        let ratio = self.rho / self.config.rhoend;
        self.rho = if ratio <= 16.0 {
            self.config.rhoend
        } else if ratio <= 250.0 {
            (self.rho * self.config.rhoend).sqrt()
        } else {
            0.1 * self.rho
        };
        self.delta = (0.5 * rho_old).max(self.rho);
        info!(
            "{}: rho = {:.3e}, best f = {:.6e}, nf = {}",
            self.variant.name,
            self.rho,
            self.best.f,
            self.eval.count()
        );
    }

    /// The result reporter: a pure function of the best record and terminal
    /// state.
    fn finish(self, status: Status) -> OptimResult {
        info!(
            "{}: {} (f = {:.6e}, cstrv = {:.2e}, nf = {})",
            self.variant.name,
            status,
            self.best.f,
            self.best.v,
            self.eval.count()
        );
        OptimResult {
            x: self.best.x,
            fun: self.best.f,
            cstrv: self.best.v,
            nlconstr: self.best.nlconstr,
            nf: self.eval.count(),
            status,
        }
    }
}

fn predicted_violation(rows: &[LinearizedRow], s: &Array1<f64>) -> f64 {
    rows.iter()
        .fold(0.0f64, |acc, row| acc.max(row.value + row.grad.dot(s)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain_eval(f: impl Fn(ArrayView1<f64>) -> f64) -> impl FnMut(ArrayView1<f64>) -> Evaluation {
        move |x| Evaluation {
            f: f(x),
            nlconstr: Array1::zeros(0),
        }
    }

    fn newuoa_variant() -> Variant {
        Variant {
            name: "newuoa",
            model: ModelKind::DiagonalQuadratic,
        }
    }

    fn config(maxfun: usize) -> Config {
        Config {
            rhobeg: 0.5,
            rhoend: 1e-6,
            maxfun,
            ftarget: None,
        }
    }

    fn unconstrained(n: usize) -> Problem {
        Problem::new(Array1::zeros(n).view(), None, None, None, None, 0).unwrap()
    }

    #[test]
    fn converges_on_convex_quadratic() {
        let result = solve(
            newuoa_variant(),
            unconstrained(2),
            config(500),
            plain_eval(|x| (x[0] - 0.7).powi(2) + 2.0 * (x[1] + 0.3).powi(2)),
            array![0.0, 0.0].view(),
        );
        assert!(result.status.is_success(), "status {:?}", result.status);
        assert!((result.x[0] - 0.7).abs() < 2e-5, "x = {:?}", result.x);
        assert!((result.x[1] + 0.3).abs() < 2e-5, "x = {:?}", result.x);
        assert_eq!(result.cstrv, 0.0);
    }

    #[test]
    fn budget_is_respected_and_result_well_formed() {
        let result = solve(
            newuoa_variant(),
            unconstrained(2),
            config(7),
            plain_eval(|x| x.dot(&x)),
            array![1.0, 1.0].view(),
        );
        assert_eq!(result.status, Status::MaxEvaluations);
        assert_eq!(result.nf, 7);
        assert!(result.fun.is_finite());
    }

    #[test]
    fn target_exit_fires() {
        let mut cfg = config(500);
        cfg.ftarget = Some(0.25);
        let result = solve(
            newuoa_variant(),
            unconstrained(2),
            cfg,
            plain_eval(|x| x.dot(&x)),
            array![2.0, 2.0].view(),
        );
        assert_eq!(result.status, Status::TargetReached);
        assert!(result.fun <= 0.25);
    }

    #[test]
    fn best_record_is_monotone_and_prefers_feasibility() {
        let mut best = Best {
            x: Array1::zeros(1),
            f: f64::INFINITY,
            v: f64::INFINITY,
            nlconstr: Array1::zeros(0),
        };
        let none = Array1::zeros(0);
        // (x, f, v): an improvement, a regression, an equal-f tie, and a
        // better objective at worse feasibility
        for &(x, f, v) in &[(1.0, 5.0, 0.0), (2.0, 3.0, 0.0), (3.0, 4.0, 0.0), (4.0, -9.0, 1.0)] {
            let prev = (best.f, best.v);
            best.consider(array![x].view(), f, v, none.view());
            assert!(
                !merit_better(prev.0, prev.1, best.f, best.v),
                "best record went backwards at x = {}",
                x
            );
        }
        assert_eq!(best.f, 3.0);
        assert_eq!(best.x[0], 2.0);
    }

    #[test]
    fn nan_objective_everywhere_fails_cleanly() {
        let result = solve(
            newuoa_variant(),
            unconstrained(2),
            config(200),
            plain_eval(|_| f64::NAN),
            array![0.0, 0.0].view(),
        );
        assert_eq!(result.status, Status::NanModel);
        assert!(result.nf <= 200);
    }
}
