//! The interpolation set: a fixed-cardinality collection of evaluated sample
//! points that uniquely determines the current surrogate model(s).
//!
//! Poisedness is watched through the pivots of the interpolation matrix and
//! through the Lagrange polynomial values of candidate replacements: a swap
//! whose Lagrange value is large improves the geometry, one near zero would
//! collapse it. The set never gives up its best-merit member.
use super::surrogate::{ModelKind, SurrogateModel};
use crate::linalg::{LuFactors, Singular};
use crate::problem::{merit_better, Bounds};
use ndarray::prelude::*;

/// Candidate replacement directions shorter than this fraction of the
/// trust-region radius are useless for geometry and are discarded.
const MIN_GEOMETRY_FRACTION: f64 = 0.1;

/// A fitted interpolation system: the surrogate(s) plus the factorization
/// they came from, kept so Lagrange queries can reuse it.
pub(crate) struct Fit {
    kind: ModelKind,
    scale: f64,
    pub base: Array1<f64>,
    lu: LuFactors,
    pub objective: SurrogateModel,
    pub constraints: Vec<SurrogateModel>,
}

impl Fit {
    /// Values of all Lagrange polynomials at `x`. Entry `t` tells how much
    /// the interpolation determinant scales if sample `t` is swapped for `x`.
    pub fn lagrange_values(&self, x: ArrayView1<f64>) -> Array1<f64> {
        let u = (&x - &self.base) / self.scale;
        let mut phi = Array1::zeros(self.lu.dim());
        self.kind.fill_basis_row(phi.view_mut(), u.view());
        self.lu.solve_transposed(phi.view())
    }

    /// The `t`-th Lagrange polynomial as a surrogate model (value 1 at sample
    /// `t`, 0 at every other sample), in displacements from `base`.
    pub fn lagrange_model(&self, t: usize) -> SurrogateModel {
        let m = self.lu.dim();
        let mut e = Array1::zeros(m);
        e[t] = 1.0;
        let coeffs = self.lu.solve(e.view());
        self.kind.model_from_coeffs(self.base.len(), coeffs.view(), self.scale)
    }
}

/// The sample set itself. Rows of `points` are absolute coordinates; each
/// carries its objective value, nonlinear constraint values, and violation.
pub(crate) struct InterpolationSet {
    kind: ModelKind,
    n: usize,
    points: Array2<f64>,
    fvals: Array1<f64>,
    cvals: Array2<f64>,
    vvals: Array1<f64>,
    filled: usize,
    best: usize,
}

impl InterpolationSet {
    pub fn new(kind: ModelKind, n: usize, m_nlcon: usize) -> Self {
        let m = kind.points(n);
        InterpolationSet {
            kind,
            n,
            points: Array2::zeros((m, n)),
            fvals: Array1::zeros(m),
            cvals: Array2::zeros((m, m_nlcon)),
            vvals: Array1::zeros(m),
            filled: 0,
            best: 0,
        }
    }

    /// Capacity of the set (model cardinality).
    pub fn capacity(&self) -> usize {
        self.kind.points(self.n)
    }

    pub fn is_complete(&self) -> bool {
        self.filled == self.capacity()
    }

    pub fn best_index(&self) -> usize {
        self.best
    }

    pub fn point(&self, t: usize) -> ArrayView1<f64> {
        self.points.row(t)
    }

    pub fn fval(&self, t: usize) -> f64 {
        self.fvals[t]
    }

    pub fn vval(&self, t: usize) -> f64 {
        self.vvals[t]
    }

    /// Moves the start point far enough inside the box that the initial
    /// pattern has room on both sides of every coordinate. Boxes narrower
    /// than `2 rho` pin the coordinate at the midpoint instead.
    pub fn shifted_start(x0: ArrayView1<f64>, bounds: &Bounds, rho: f64) -> Array1<f64> {
        let mut x = x0.to_owned();
        for i in 0..x.len() {
            let lo = bounds.lower[i];
            let hi = bounds.upper[i];
            if hi - lo >= 2.0 * rho {
                x[i] = x[i].max(lo + rho).min(hi - rho);
            } else {
                x[i] = 0.5 * (lo + hi);
            }
        }
        x
    }

    /// The initial sample pattern around a (shifted) start point: coordinate
    /// steps of length `rho`, truncated to the room the box leaves, with the
    /// full-quadratic shape adding the pairwise diagonal points.
    pub fn initial_pattern(
        kind: ModelKind,
        x0: &Array1<f64>,
        rho: f64,
        bounds: &Bounds,
    ) -> Vec<Array1<f64>> {
        let n = x0.len();
        let mut up = Array1::zeros(n);
        let mut dn = Array1::zeros(n);
        for i in 0..n {
            up[i] = rho.min(bounds.upper[i] - x0[i]).max(0.0);
            dn[i] = -rho.min(x0[i] - bounds.lower[i]).max(0.0);
        }

        let mut pts = Vec::with_capacity(kind.points(n));
        pts.push(x0.clone());
        for i in 0..n {
            // prefer the roomier side for the first step of each coordinate
            let first = if up[i] >= -dn[i] { up[i] } else { dn[i] };
            let mut p = x0.clone();
            p[i] += first;
            pts.push(p);
        }
        if kind != ModelKind::Linear {
            for i in 0..n {
                let second = if up[i] >= -dn[i] { dn[i] } else { up[i] };
                let mut p = x0.clone();
                p[i] += second;
                pts.push(p);
            }
        }
        if kind == ModelKind::FullQuadratic {
            for i in 0..n {
                for j in (i + 1)..n {
                    let si = if up[i] >= -dn[i] { up[i] } else { dn[i] };
                    let sj = if up[j] >= -dn[j] { up[j] } else { dn[j] };
                    let mut p = x0.clone();
                    p[i] += si;
                    p[j] += sj;
                    pts.push(p);
                }
            }
        }
        pts
    }

    /// Appends an evaluated sample during initialization.
    pub fn push(&mut self, x: ArrayView1<f64>, f: f64, nlconstr: ArrayView1<f64>, v: f64) {
        let t = self.filled;
        assert!(t < self.capacity());
        self.points.row_mut(t).assign(&x);
        self.fvals[t] = f;
        self.cvals.row_mut(t).assign(&nlconstr);
        self.vvals[t] = v;
        self.filled += 1;
        if t != self.best && merit_better(f, v, self.fvals[self.best], self.vvals[self.best]) {
            self.best = t;
        }
    }

    /// Solves the interpolation system around the current best point, with
    /// displacements scaled by `scale` for conditioning. A singular system or
    /// non-finite data flags the set degenerate; the controller must repair
    /// the geometry before asking again.
    pub fn fit(&self, scale: f64) -> Result<Fit, Singular> {
        assert!(self.is_complete());
        let m = self.capacity();
        let base = self.points.row(self.best).to_owned();

        if self.fvals.iter().any(|v| !v.is_finite()) || self.cvals.iter().any(|v| !v.is_finite())
        {
            return Err(Singular);
        }

        let mut phi = Array2::zeros((m, m));
        for k in 0..m {
            let u = (&self.points.row(k) - &base) / scale;
            self.kind.fill_basis_row(phi.row_mut(k), u.view());
        }
        let lu = LuFactors::new(phi)?;

        let objective = self
            .kind
            .model_from_coeffs(self.n, lu.solve(self.fvals.view()).view(), scale);
        if !objective.is_finite() {
            return Err(Singular);
        }

        let mut constraints = Vec::with_capacity(self.cvals.ncols());
        for j in 0..self.cvals.ncols() {
            let coeffs = lu.solve(self.cvals.column(j));
            let model = self.kind.model_from_coeffs(self.n, coeffs.view(), scale);
            if !model.is_finite() {
                return Err(Singular);
            }
            constraints.push(model);
        }

        Ok(Fit {
            kind: self.kind,
            scale,
            base,
            lu,
            objective,
            constraints,
        })
    }

    /// Offers an evaluated point to the set. The replaced sample is the one
    /// whose Lagrange value at the new point, weighted by its distance from
    /// the best point, is largest; the best sample itself is never replaced.
    /// A point that is worse than every member of an already well-poised set
    /// is rejected and the set is left unchanged. Returns whether the set
    /// changed.
    pub fn update(
        &mut self,
        x: ArrayView1<f64>,
        f: f64,
        nlconstr: ArrayView1<f64>,
        v: f64,
        fit: &Fit,
        delta: f64,
    ) -> bool {
        let m = self.capacity();
        let lam = fit.lagrange_values(x);
        let best_point = self.points.row(self.best).to_owned();

        let mut t_pick = None;
        let mut score_pick = 0.0;
        let mut lam_max = 0.0f64;
        for t in 0..m {
            if t == self.best {
                continue;
            }
            lam_max = lam_max.max(lam[t].abs());
            let d = &self.points.row(t) - &best_point;
            let dist2 = d.dot(&d);
            let weight = (dist2 / (delta * delta)).max(1.0);
            let score = lam[t].abs() * weight;
            if score > score_pick {
                score_pick = score;
                t_pick = Some(t);
            }
        }

        let improves_any = (0..m).any(|t| merit_better(f, v, self.fvals[t], self.vvals[t]));
        if !improves_any && lam_max <= 1.0 + 1e-6 {
            return false;
        }

        let t = match t_pick {
            Some(t) if score_pick > 1e-8 => t,
            _ => {
                // the new point spans no useful direction; admit it only if
                // it beats the incumbent, evicting the farthest sample
                if !merit_better(f, v, self.fvals[self.best], self.vvals[self.best]) {
                    return false;
                }
                match self.farthest_index(&best_point) {
                    Some(t) => t,
                    None => return false,
                }
            }
        };
        self.replace(t, x, f, nlconstr, v);
        true
    }

    /// Replaces sample `t` outright (geometry repairs use this) and refreshes
    /// the best index.
    pub fn replace(&mut self, t: usize, x: ArrayView1<f64>, f: f64, nlconstr: ArrayView1<f64>, v: f64) {
        self.points.row_mut(t).assign(&x);
        self.fvals[t] = f;
        self.cvals.row_mut(t).assign(&nlconstr);
        self.vvals[t] = v;
        if t != self.best && merit_better(f, v, self.fvals[self.best], self.vvals[self.best]) {
            self.best = t;
        }
    }

    fn farthest_index(&self, from: &Array1<f64>) -> Option<usize> {
        let mut t_far = None;
        let mut d_far = 0.0;
        for t in 0..self.capacity() {
            if t == self.best {
                continue;
            }
            let d = &self.points.row(t) - from;
            let dist2 = d.dot(&d);
            if dist2 > d_far {
                d_far = dist2;
                t_far = Some(t);
            }
        }
        t_far
    }

    /// The sample most in need of replacement for geometry's sake: any member
    /// with non-finite data first, otherwise the sample farthest from the
    /// best point provided it lies beyond twice the trust-region radius.
    pub fn worst_geometry_index(&self, delta: f64) -> Option<usize> {
        for t in 0..self.capacity() {
            if t == self.best {
                continue;
            }
            if !self.fvals[t].is_finite()
                || self.cvals.row(t).iter().any(|v| !v.is_finite())
            {
                return Some(t);
            }
        }
        let best_point = self.points.row(self.best).to_owned();
        let t = self.farthest_index(&best_point)?;
        let d = &self.points.row(t) - &best_point;
        if d.dot(&d) > (2.0 * delta) * (2.0 * delta) {
            Some(t)
        } else {
            None
        }
    }

    /// Like [`worst_geometry_index`], but with no distance threshold: used
    /// when the fit is singular and some sample must move regardless.
    pub fn any_replaceable_index(&self) -> Option<usize> {
        for t in 0..self.capacity() {
            if t == self.best {
                continue;
            }
            if !self.fvals[t].is_finite()
                || self.cvals.row(t).iter().any(|v| !v.is_finite())
            {
                return Some(t);
            }
        }
        let best_point = self.points.row(self.best).to_owned();
        self.farthest_index(&best_point)
    }

    /// A point within the box and a `delta` ball of the best sample that
    /// maximizes the magnitude of sample `t`'s Lagrange polynomial, i.e. the
    /// evaluation that most improves the geometry when it replaces `t`.
    /// `None` means the box leaves no room to move.
    pub fn geometry_point(
        &self,
        t: usize,
        fit: &Fit,
        delta: f64,
        bounds: &Bounds,
    ) -> Option<Array1<f64>> {
        let lm = fit.lagrange_model(t);
        let best_point = self.points.row(self.best).to_owned();

        let mut directions: Vec<Array1<f64>> = Vec::new();
        let gnorm = lm.g.dot(&lm.g).sqrt();
        if gnorm > f64::EPSILON {
            directions.push(&lm.g / gnorm);
        }
        let out = &self.points.row(t) - &best_point;
        let onorm = out.dot(&out).sqrt();
        if onorm > f64::EPSILON {
            directions.push(&out / onorm);
        }
        for k in 0..self.n {
            let mut e = Array1::zeros(self.n);
            e[k] = 1.0;
            directions.push(e);
        }

        let mut pick: Option<Array1<f64>> = None;
        let mut pick_val = 0.0;
        for d in &directions {
            for sign in &[1.0, -1.0] {
                let mut cand = &best_point + &(d * (*sign * delta));
                bounds.clip(&mut cand);
                let step = &cand - &best_point;
                let len = step.dot(&step).sqrt();
                if len < MIN_GEOMETRY_FRACTION * delta {
                    continue;
                }
                let val = lm.value((&cand - &fit.base).view()).abs();
                if pick.is_none() || val > pick_val {
                    pick_val = val;
                    pick = Some(cand);
                }
            }
        }
        pick
    }
}
