use ndarray::prelude::*;

/// One evaluation of the user callback: the objective value and, when the
/// solver declares nonlinear constraints, their values at the same point.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Evaluation {
    pub f: f64,
    pub nlconstr: Array1<f64>,
}

/// Marker returned when the evaluation budget is already spent. The
/// controller checks [`Evaluator::has_budget`] before asking for a trial
/// point, so hitting this mid-flight is an ordinary terminal condition, not
/// a fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct BudgetExhausted;

/// Wraps the user callback with an evaluation counter and a hard budget.
///
/// Every call is counted, including calls whose objective comes back NaN or
/// infinite. Non-finite values are not sanitized here: ranking logic treats
/// them as worst-possible through [`sanitize`], but the raw value is what the
/// caller reported.
pub(crate) struct Evaluator<F> {
    func: F,
    nf: usize,
    maxfun: usize,
}

impl<F> Evaluator<F>
where
    F: FnMut(ArrayView1<f64>) -> Evaluation,
{
    pub fn new(func: F, maxfun: usize) -> Self {
        Evaluator { func, nf: 0, maxfun }
    }

    /// The number of evaluations performed so far.
    pub fn count(&self) -> usize {
        self.nf
    }

    /// Whether at least one more evaluation may be performed.
    pub fn has_budget(&self) -> bool {
        self.nf < self.maxfun
    }

    /// Evaluates the callback at `x`, counting the call unconditionally.
    pub fn call(&mut self, x: ArrayView1<f64>) -> Result<Evaluation, BudgetExhausted> {
        if self.nf >= self.maxfun {
            return Err(BudgetExhausted);
        }
        self.nf += 1;
        Ok((self.func)(x))
    }
}

/// Maps NaN to `+inf` so that comparisons never prefer an undefined value.
/// Infinite values already order correctly and pass through unchanged.
pub(crate) fn sanitize(f: f64) -> f64 {
    if f.is_nan() {
        f64::INFINITY
    } else {
        f
    }
}
