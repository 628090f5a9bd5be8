//! End-to-end properties of the five solvers: budget discipline, constraint
//! reporting, determinism, convergence on reference problems, and the
//! degenerate inputs that must be rejected before a single evaluation.
use approx::assert_abs_diff_eq;
use ndarray::prelude::*;

use dfopt::{
    BobyqaBuilder, CobylaBuilder, InvalidInput, LincoaBuilder, Minimizer, NewuoaBuilder, Status,
    UobyqaBuilder,
};

fn sphere(x: ArrayView1<f64>) -> f64 {
    x.dot(&x)
}

/// Chained Rosenbrock with the mild coupling used by the original stress
/// driver.
fn chained_rosenbrock(x: ArrayView1<f64>) -> f64 {
    let alpha = 4.0;
    let mut f = 0.0;
    for i in 0..x.len() - 1 {
        f += (x[i] - 1.0).powi(2) + alpha * (x[i + 1] - x[i] * x[i]).powi(2);
    }
    f
}

#[test]
fn evaluation_count_never_exceeds_maxfun() {
    for maxfun in [1usize, 3, 10, 57] {
        let mut calls = 0usize;
        let res = NewuoaBuilder::default()
            .maxfun(maxfun)
            .build()
            .unwrap()
            .minimize(
                |x: ArrayView1<f64>| {
                    calls += 1;
                    chained_rosenbrock(x)
                },
                array![-1.2, 1.0].view(),
            )
            .unwrap();
        assert!(res.nf <= maxfun, "nf = {} > maxfun = {}", res.nf, maxfun);
        assert_eq!(calls, res.nf);
        if res.nf == maxfun {
            assert_eq!(res.status, Status::MaxEvaluations);
        }
    }
}

#[test]
fn unconstrained_variants_report_zero_cstrv() {
    let res = NewuoaBuilder::default()
        .build()
        .unwrap()
        .minimize(sphere, array![1.0, -2.0].view())
        .unwrap();
    assert_eq!(res.cstrv, 0.0);
    assert!(res.nlconstr.is_empty());

    let res = UobyqaBuilder::default()
        .build()
        .unwrap()
        .minimize(sphere, array![1.0, -2.0].view())
        .unwrap();
    assert_eq!(res.cstrv, 0.0);
}

#[test]
fn returned_point_is_the_best_evaluated_point() {
    // the reporter must hand back the argmin over everything it evaluated,
    // not merely the last iterate
    let mut seen: Vec<(Array1<f64>, f64)> = Vec::new();
    let res = BobyqaBuilder::default()
        .rhobeg(0.5)
        .rhoend(1e-6)
        .xl(array![-2.0, -2.0])
        .xu(array![2.0, 2.0])
        .build()
        .unwrap()
        .minimize(
            |x: ArrayView1<f64>| {
                let f = chained_rosenbrock(x);
                seen.push((x.to_owned(), f));
                f
            },
            array![-1.0, 1.0].view(),
        )
        .unwrap();
    // first strict minimum, matching the engine's only-replace-on-improvement rule
    let (x_min, f_min) = seen
        .iter()
        .fold(None::<&(Array1<f64>, f64)>, |acc, item| match acc {
            Some(best) if item.1 >= best.1 => Some(best),
            _ => Some(item),
        })
        .unwrap();
    assert_eq!(res.fun, *f_min);
    assert_eq!(&res.x, x_min);
    assert_eq!(res.nf, seen.len());
}

#[test]
fn reruns_are_bit_identical() {
    let run = || {
        NewuoaBuilder::default()
            .rhobeg(0.7)
            .rhoend(1e-7)
            .maxfun(300)
            .build()
            .unwrap()
            .minimize(chained_rosenbrock, array![0.3, -0.4].view())
            .unwrap()
    };
    let a = run();
    let b = run();
    assert_eq!(a, b);
}

#[test]
fn newuoa_converges_on_strictly_convex_quadratic() {
    let res = NewuoaBuilder::default()
        .rhobeg(1.0)
        .rhoend(1e-3)
        .build()
        .unwrap()
        .minimize(
            |x: ArrayView1<f64>| (x[0] - 1.0).powi(2) + 2.0 * (x[1] - 1.5).powi(2),
            array![0.0, 0.0].view(),
        )
        .unwrap();
    assert!(res.status.is_success(), "status {:?}", res.status);
    assert!((res.x[0] - 1.0).abs() <= 2e-3, "x = {:?}", res.x);
    assert!((res.x[1] - 1.5).abs() <= 2e-3, "x = {:?}", res.x);
}

#[test]
fn uobyqa_converges_on_strictly_convex_quadratic() {
    let res = UobyqaBuilder::default()
        .rhobeg(1.0)
        .rhoend(1e-3)
        .build()
        .unwrap()
        .minimize(
            |x: ArrayView1<f64>| {
                let u = x[0] - 1.0;
                let v = x[1] - 1.5;
                u * u + u * v + 2.0 * v * v
            },
            array![0.0, 0.0].view(),
        )
        .unwrap();
    assert!(res.status.is_success(), "status {:?}", res.status);
    assert!((res.x[0] - 1.0).abs() <= 2e-3, "x = {:?}", res.x);
    assert!((res.x[1] - 1.5).abs() <= 2e-3, "x = {:?}", res.x);
}

#[test]
fn lincoa_solves_the_reference_polytope_problem() {
    // the LINCOA acceptance problem: minimize
    // 5(x1-3)^2 + 7(x2-2)^2 + 0.1(x1+x2) - 10 over x1<=4, x2<=3, x1+x2<=10
    let res = LincoaBuilder::default()
        .rhobeg(1.0)
        .rhoend(1e-3)
        .maxfun(400)
        .a_ineq(array![[1.0, 0.0], [0.0, 1.0], [1.0, 1.0]])
        .b_ineq(array![4.0, 3.0, 10.0])
        .xl(array![-6.0, -6.0])
        .xu(array![6.0, 6.0])
        .build()
        .unwrap()
        .minimize(
            |x: ArrayView1<f64>| {
                5.0 * (x[0] - 3.0).powi(2) + 7.0 * (x[1] - 2.0).powi(2) + 0.1 * (x[0] + x[1])
                    - 10.0
            },
            array![0.0, 0.0].view(),
        )
        .unwrap();
    assert_abs_diff_eq!(res.x[0], 3.0, epsilon = 2e-2);
    assert_abs_diff_eq!(res.x[1], 2.0, epsilon = 2e-2);
    assert!(res.x[0] <= 4.0 + 1e-9);
    assert!(res.x[1] <= 3.0 + 1e-9);
    assert!(res.x[0] + res.x[1] <= 10.0 + 1e-9);
    assert_eq!(res.cstrv, 0.0);
}

#[test]
fn lincoa_without_rows_matches_bobyqa_exactly() {
    // with no linear rows the linearly-constrained variant must follow the
    // bound-constrained trajectory bit for bit
    let xl = array![-1.5, -1.5];
    let xu = array![1.5, 1.5];
    let from_lincoa = LincoaBuilder::default()
        .rhobeg(0.5)
        .rhoend(1e-7)
        .xl(xl.clone())
        .xu(xu.clone())
        .build()
        .unwrap()
        .minimize(chained_rosenbrock, array![-1.0, 0.5].view())
        .unwrap();
    let from_bobyqa = BobyqaBuilder::default()
        .rhobeg(0.5)
        .rhoend(1e-7)
        .xl(xl)
        .xu(xu)
        .build()
        .unwrap()
        .minimize(chained_rosenbrock, array![-1.0, 0.5].view())
        .unwrap();
    assert_eq!(from_lincoa, from_bobyqa);
}

#[test]
fn bobyqa_handles_the_stress_objective_in_a_box() {
    // moderate-n rendition of the stress driver setup: chained Rosenbrock
    // inside [-1, 1]^n
    let n = 5;
    let x0 = Array1::from_elem(n, -0.5);
    let res = BobyqaBuilder::default()
        .rhobeg(0.25)
        .rhoend(1e-5)
        .maxfun(2500)
        .xl(Array1::from_elem(n, -1.0))
        .xu(Array1::from_elem(n, 1.0))
        .build()
        .unwrap()
        .minimize(chained_rosenbrock, x0.view())
        .unwrap();
    assert!(res.nf <= 2500);
    assert_eq!(res.cstrv, 0.0);
    for i in 0..n {
        assert!(res.x[i] >= -1.0 - 1e-12 && res.x[i] <= 1.0 + 1e-12);
    }
    // the run must make serious progress from f(x0)
    let f0 = chained_rosenbrock(x0.view());
    assert!(res.fun < 0.2 * f0, "f = {} from f0 = {}", res.fun, f0);
}

#[test]
fn cobyla_handles_the_stress_constraints() {
    // nonlinear constraints of the stress driver: x[i+1] <= x[i]^2
    let n = 3;
    let res = CobylaBuilder::default()
        .rhobeg(0.25)
        .rhoend(1e-5)
        .maxfun(2000)
        .m_nlcon(n - 1)
        .xl(Array1::from_elem(n, -1.0))
        .xu(Array1::from_elem(n, 1.0))
        .build()
        .unwrap()
        .minimize(
            |x: ArrayView1<f64>| {
                let c = Array1::from_shape_fn(n - 1, |i| x[i + 1] - x[i] * x[i]);
                (chained_rosenbrock(x), c)
            },
            Array1::zeros(n).view(),
        )
        .unwrap();
    assert!(res.nf <= 2000);
    assert!(res.cstrv <= 1e-4, "cstrv = {}", res.cstrv);
    assert_eq!(res.nlconstr.len(), n - 1);
    for i in 0..n - 1 {
        assert!(
            res.x[i + 1] <= res.x[i] * res.x[i] + 1e-4,
            "x = {:?}",
            res.x
        );
    }
}

#[test]
fn invalid_inputs_never_reach_the_callback() {
    let mut calls = 0usize;
    let mut counted = |x: ArrayView1<f64>| {
        calls += 1;
        sphere(x)
    };

    // zero-dimensional start point
    let err = NewuoaBuilder::default()
        .build()
        .unwrap()
        .minimize(&mut counted, Array1::zeros(0).view())
        .unwrap_err();
    assert_eq!(err, InvalidInput::EmptyInitialPoint);

    // mismatched bound length
    let err = BobyqaBuilder::default()
        .xl(array![0.0, 0.0, 0.0])
        .build()
        .unwrap()
        .minimize(&mut counted, array![0.0, 0.0].view())
        .unwrap_err();
    assert!(matches!(err, InvalidInput::BoundLength { .. }));

    // crossed bounds
    let err = BobyqaBuilder::default()
        .xl(array![1.0, 0.0])
        .xu(array![0.0, 1.0])
        .build()
        .unwrap()
        .minimize(&mut counted, array![0.0, 0.0].view())
        .unwrap_err();
    assert!(matches!(err, InvalidInput::InconsistentBounds { .. }));

    // bad radii
    let err = NewuoaBuilder::default()
        .rhobeg(-1.0)
        .build()
        .unwrap()
        .minimize(&mut counted, array![0.0].view())
        .unwrap_err();
    assert!(matches!(err, InvalidInput::InvalidInitialRadius(_)));

    assert_eq!(calls, 0);
}

#[test]
fn nan_objective_region_does_not_poison_the_run() {
    // the objective is undefined past x0 = 0.6; the engine must treat those
    // points as catastrophically bad, never crash, and report a finite best
    let res = NewuoaBuilder::default()
        .rhobeg(0.2)
        .rhoend(1e-6)
        .maxfun(500)
        .build()
        .unwrap()
        .minimize(
            |x: ArrayView1<f64>| {
                if x[0] > 0.6 {
                    f64::NAN
                } else {
                    (x[0] - 1.0).powi(2) + x[1] * x[1]
                }
            },
            array![0.0, 0.0].view(),
        )
        .unwrap();
    assert!(res.nf <= 500);
    assert!(res.fun.is_finite(), "fun = {}", res.fun);
    assert!(res.x[0] <= 0.6 + 1e-12, "x = {:?}", res.x);
}

#[test]
fn infinite_objective_is_survivable_too() {
    let res = BobyqaBuilder::default()
        .rhobeg(0.3)
        .maxfun(400)
        .xl(array![-4.0, -4.0])
        .xu(array![4.0, 4.0])
        .build()
        .unwrap()
        .minimize(
            |x: ArrayView1<f64>| {
                if x[1] < -1.0 {
                    f64::INFINITY
                } else {
                    sphere(x)
                }
            },
            array![2.0, 2.0].view(),
        )
        .unwrap();
    assert!(res.fun.is_finite());
    assert!(res.x[1] >= -1.0);
}

#[test]
fn ftarget_short_circuits_feasibly() {
    let mut calls = 0usize;
    let res = BobyqaBuilder::default()
        .ftarget(0.5)
        .xl(array![-3.0, -3.0])
        .xu(array![3.0, 3.0])
        .build()
        .unwrap()
        .minimize(
            |x: ArrayView1<f64>| {
                calls += 1;
                sphere(x)
            },
            array![2.0, 2.0].view(),
        )
        .unwrap();
    assert_eq!(res.status, Status::TargetReached);
    assert!(res.fun <= 0.5);
    assert_eq!(res.cstrv, 0.0);
    // the run stopped at the triggering evaluation
    assert_eq!(calls, res.nf);
}
