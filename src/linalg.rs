//! Dense LU factorization with partial pivoting, sized for the small systems
//! this crate solves: interpolation fits and active-set normal equations.
//! Both `A x = b` and `A^T x = b` solves run off one factorization, which the
//! geometry machinery relies on (Lagrange values need the transposed system).
use ndarray::prelude::*;

/// The matrix is singular to working precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Singular;

/// Packed LU factors of a square matrix, `P A = L U`.
///
/// The upper triangle (diagonal included) stores `U`; the strict lower
/// triangle stores `L` (its diagonal is implicitly 1). `perm` records the row
/// permutation applied by pivoting.
pub(crate) struct LuFactors {
    lu: Array2<f64>,
    perm: Vec<usize>,
}

impl LuFactors {
    /// Factorizes `a`, consuming it. Pivots below a tolerance scaled by the
    /// largest entry of `a` are treated as singular.
    pub fn new(mut a: Array2<f64>) -> Result<Self, Singular> {
        let n = a.nrows();
        assert_eq!(n, a.ncols(), "LU factorization requires a square matrix");

        let mut amax = 0.0f64;
        for v in a.iter() {
            if !v.is_finite() {
                return Err(Singular);
            }
            amax = amax.max(v.abs());
        }
        let tol = f64::EPSILON * (n as f64) * amax.max(1.0);

        let mut perm: Vec<usize> = (0..n).collect();
        for col in 0..n {
            // partial pivoting: largest magnitude in the remaining column
            let mut max_row = col;
            let mut max_val = a[[col, col]].abs();
            for row in (col + 1)..n {
                let val = a[[row, col]].abs();
                if val > max_val {
                    max_val = val;
                    max_row = row;
                }
            }
            if !(max_val > tol) {
                return Err(Singular);
            }
            if max_row != col {
                perm.swap(col, max_row);
                for j in 0..n {
                    a.swap([col, j], [max_row, j]);
                }
            }

            let inv_pivot = 1.0 / a[[col, col]];
            for row in (col + 1)..n {
                a[[row, col]] *= inv_pivot;
            }
            for row in (col + 1)..n {
                let l = a[[row, col]];
                if l != 0.0 {
                    for j in (col + 1)..n {
                        a[[row, j]] -= l * a[[col, j]];
                    }
                }
            }
        }

        Ok(LuFactors { lu: a, perm })
    }

    pub fn dim(&self) -> usize {
        self.lu.nrows()
    }

    /// Solves `A x = b`.
    pub fn solve(&self, b: ArrayView1<f64>) -> Array1<f64> {
        let n = self.dim();
        assert_eq!(b.len(), n);

        // y = P b, then L y' = y (unit lower), then U x = y'
        let mut x = Array1::zeros(n);
        for i in 0..n {
            x[i] = b[self.perm[i]];
        }
        for i in 1..n {
            let mut acc = x[i];
            for j in 0..i {
                acc -= self.lu[[i, j]] * x[j];
            }
            x[i] = acc;
        }
        for i in (0..n).rev() {
            let mut acc = x[i];
            for j in (i + 1)..n {
                acc -= self.lu[[i, j]] * x[j];
            }
            x[i] = acc / self.lu[[i, i]];
        }
        x
    }

    /// Solves `A^T x = b` using the same factors: `A^T = U^T L^T P`.
    pub fn solve_transposed(&self, b: ArrayView1<f64>) -> Array1<f64> {
        let n = self.dim();
        assert_eq!(b.len(), n);

        // U^T z = b (forward), L^T w = z (backward), x = P^T w
        let mut w = Array1::zeros(n);
        for i in 0..n {
            let mut acc = b[i];
            for j in 0..i {
                acc -= self.lu[[j, i]] * w[j];
            }
            w[i] = acc / self.lu[[i, i]];
        }
        for i in (0..n).rev() {
            let mut acc = w[i];
            for j in (i + 1)..n {
                acc -= self.lu[[j, i]] * w[j];
            }
            w[i] = acc;
        }
        let mut x = Array1::zeros(n);
        for i in 0..n {
            x[self.perm[i]] = w[i];
        }
        x
    }
}
