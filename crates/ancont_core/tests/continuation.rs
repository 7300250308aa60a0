use ancont_core::ball::{pi, ComplexBall, Mag};
use ancont_core::continuation::{
    analytic_continuation, step_transition_matrix, util, Context, SummationSettings,
};
use ancont_core::error::Error;
use ancont_core::exact::{qqi_gauss, qqi_int, qqi_ratio, rat, QQi};
use ancont_core::local_solutions::local_basis_structure;
use ancont_core::operator::DiffOp;
use ancont_core::path::{Path, Point, PointAnalyzer, Step};
use nalgebra::DMatrix;

fn exp_op() -> DiffOp {
    DiffOp::from_int_coeffs(&[&[-1], &[1]])
}

fn arctan_op() -> DiffOp {
    DiffOp::from_int_coeffs(&[&[], &[0, 2], &[1, 0, 1]])
}

fn gauss(re: i64, im: i64) -> QQi {
    qqi_gauss(rat(re, 1), rat(im, 1))
}

fn column(values: &[f64]) -> DMatrix<ComplexBall> {
    let balls: Vec<ComplexBall> = values
        .iter()
        .map(|&x| ComplexBall::from_f64(x, 0.0, 64))
        .collect();
    DMatrix::from_column_slice(values.len(), 1, &balls)
}

#[test]
fn exponential_at_one() {
    let path = Path::from_values([0, 1]).unwrap();
    let eps = Mag::from_f64(1e-16);
    let records = analytic_continuation(
        &exp_op(),
        &path,
        eps,
        &Context::default(),
        Some(&column(&[1.0])),
        None,
    )
    .unwrap();
    assert_eq!(records.len(), 1);
    let value = &records[0].value[(0, 0)];
    let e = ComplexBall::one_at(256).exp();
    assert!(value.overlaps(&e));
    assert!(value.rad() <= eps);
}

#[test]
fn arctan_at_one_half() {
    let path = Path::from_values([qqi_int(0), qqi_ratio(1, 2)]).unwrap();
    let records = analytic_continuation(
        &arctan_op(),
        &path,
        Mag::from_f64(1e-20),
        &Context::default(),
        Some(&column(&[0.0, 1.0])),
        None,
    )
    .unwrap();
    let value = &records[0].value[(0, 0)];
    // arctan(1/2) = Im log(1 + i/2)
    let expected = ComplexBall::from_real(ComplexBall::from_f64(1.0, 0.5, 256).log().im().clone());
    assert!(value.overlaps(&expected));
    assert!(value.rad().to_f64() < 1e-19);
    // derivative 1/(1 + x^2)
    let deriv = &records[0].value[(1, 0)];
    assert!(deriv.overlaps(&ComplexBall::from_i64(4, 128).div_i64(5)));
}

#[test]
fn logarithmic_basis_at_the_origin() {
    // x D^2 + D: basis log(x), 1
    let dop = DiffOp::from_int_coeffs(&[&[], &[1], &[0, 1]]);
    let sols = local_basis_structure(&dop).unwrap();
    assert_eq!(sols.len(), 2);
    let mut log_powers: Vec<usize> = sols.iter().map(|s| s.log_power).collect();
    log_powers.sort();
    assert_eq!(log_powers, vec![0, 1]);
    assert!(sols.iter().all(|s| s.valuation().norm() == 0.0));

    let path = Path::from_values([0, 1]).unwrap();
    let ctx = Context {
        return_local_bases: true,
        ..Context::default()
    };
    let records = analytic_continuation(&dop, &path, Mag::from_f64(1e-20), &ctx, None, None).unwrap();
    let m = &records[0].value;
    assert_eq!(m.shape(), (2, 2));
    // log(x) at 1: value 0, derivative 1
    assert!(m[(0, 0)].contains_zero());
    assert!(m[(1, 0)].overlaps(&ComplexBall::one_at(64)));
    assert!(m[(0, 1)].overlaps(&ComplexBall::one_at(64)));
    assert!(m[(1, 1)].contains_zero());
    assert_eq!(records[0].structure.as_ref().map(|s| s.len()), Some(2));
}

#[test]
fn ordinary_point_structure() {
    let dop = arctan_op();
    let an = PointAnalyzer::new(&dop).unwrap();
    let sols = an.local_basis_structure(&Point::new(qqi_ratio(1, 3))).unwrap();
    assert_eq!(sols.len(), 2);
    for (k, s) in sols.iter().enumerate() {
        assert_eq!(s.valuation.re, k as f64);
        assert_eq!(s.valuation.im, 0.0);
        assert_eq!(s.log_power, 0);
    }
}

#[test]
fn unreachable_accuracy_is_a_retryable_failure() {
    let path = Path::from_values([0, 1]).unwrap();
    let err = analytic_continuation(
        &exp_op(),
        &path,
        Mag::from_decimal(1.0, -9999),
        &Context::default(),
        None,
        None,
    )
    .unwrap_err();
    assert!(err.is_retryable(), "unexpected error {err}");
    assert!(matches!(err, Error::Precision(_)));
}

#[test]
fn arctan_around_i_gains_pi() {
    let path = Path::from_values([
        gauss(0, 0),
        gauss(1, 0),
        gauss(1, 2),
        gauss(-1, 2),
        gauss(-1, 0),
        gauss(0, 0),
    ])
    .unwrap();
    let records = analytic_continuation(
        &arctan_op(),
        &path,
        Mag::from_f64(1e-20),
        &Context::default(),
        Some(&column(&[0.0, 1.0])),
        None,
    )
    .unwrap();
    assert_eq!(records.len(), 1);
    let value = &records[0].value[(0, 0)];
    assert!(value.overlaps(&ComplexBall::from_real(pi(128))));
    assert!(value.rad().to_f64() < 1e-15);
    // the derivative 1/(1 + x^2) is single-valued
    assert!(records[0].value[(1, 0)].overlaps(&ComplexBall::one_at(64)));
}

#[test]
fn split_steps_agree_with_direct_summation() {
    // summing e^30 at once loses more than the starting precision
    let dop = exp_op();
    let eps = Mag::from_f64(1e-10);
    let step = Step::new(Point::new(0), Point::new(30));
    let splitting = Context {
        summation: SummationSettings {
            fail_fast_doublings: 0,
            ..SummationSettings::default()
        },
        ..Context::default()
    };
    let split = step_transition_matrix(&dop, &step, eps, &splitting).unwrap();
    let direct =
        step_transition_matrix(&dop, &step.clone().with_max_split(0), eps, &Context::default()).unwrap();
    assert!(direct[(0, 0)].rad() <= eps);
    assert!(split[(0, 0)].overlaps(&direct[(0, 0)]));
    let e30 = ComplexBall::from_i64(30, 256).exp();
    assert!(split[(0, 0)].overlaps(&e30));
    assert!(direct[(0, 0)].overlaps(&e30));
}

#[test]
fn subdivision_is_idempotent() {
    let dop = arctan_op();
    let an = PointAnalyzer::new(&dop).unwrap();
    let path = Path::from_values([gauss(-3, 0), gauss(0, 3), gauss(3, 0)]).unwrap();
    let sub = path.subdivide(&an, 0.6, 0.5).unwrap();
    sub.check_singularity(&an).unwrap();
    sub.check_convergence(&an).unwrap();
    let again = sub.subdivide(&an, 0.6, 0.5).unwrap();
    assert_eq!(again.vert, sub.vert);
}

#[test]
fn chained_steps_agree_with_the_whole_step() {
    let dop = arctan_op();
    let ctx = Context::default();
    let eps = Mag::from_f64(1e-20);
    let whole = Step::new(Point::new(0), Point::new(qqi_ratio(1, 2)));
    let first = Step::new(Point::new(0), Point::new(qqi_ratio(1, 4)));
    let second = Step::new(Point::new(qqi_ratio(1, 4)), Point::new(qqi_ratio(1, 2)));
    let m = step_transition_matrix(&dop, &whole, eps, &ctx).unwrap();
    let m0 = step_transition_matrix(&dop, &first, eps, &ctx).unwrap();
    let m1 = step_transition_matrix(&dop, &second, eps, &ctx).unwrap();
    let chained = util::mat_mul(&m1, &m0).unwrap();
    for i in 0..2 {
        for j in 0..2 {
            assert!(m[(i, j)].overlaps(&chained[(i, j)]));
        }
    }
}

#[test]
fn paths_through_singularities_are_rejected() {
    let path = Path::from_values([gauss(0, -2), gauss(0, 2)]).unwrap();
    let err = analytic_continuation(
        &arctan_op(),
        &path,
        Mag::from_f64(1e-10),
        &Context::default(),
        None,
        None,
    )
    .unwrap_err();
    match err {
        Error::SingularPath { points, .. } => assert_eq!(points.len(), 2),
        other => panic!("unexpected error {other}"),
    }
}

#[test]
fn assuming_analytic_solutions_bypasses_singularities() {
    let path = Path::from_values([gauss(0, 0), gauss(0, 2)]).unwrap();
    let ctx = Context {
        assume_analytic: true,
        ..Context::default()
    };
    let records =
        analytic_continuation(&arctan_op(), &path, Mag::from_f64(1e-10), &ctx, None, None).unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].value.shape(), (2, 2));
}

#[test]
fn steps_escaping_the_disk_of_convergence() {
    // x (1 - x) D^2 + D: regular singular points 0 and 1
    let dop = DiffOp::from_int_coeffs(&[&[], &[1], &[0, 1, -1]]);
    let an = PointAnalyzer::new(&dop).unwrap();
    let path = Path::from_values([1, 0]).unwrap();
    assert!(matches!(
        path.check_convergence(&an),
        Err(Error::ConvergenceDomain { .. })
    ));
    // subdivision makes the same path usable
    let records = analytic_continuation(
        &dop,
        &path,
        Mag::from_f64(1e-10),
        &Context::default(),
        None,
        None,
    )
    .unwrap();
    assert_eq!(records[0].value.shape(), (2, 2));
}
