//! Direct summation of local series solutions.
//!
//! Coefficients come from the backward recurrence one at a time and are
//! accumulated into jets at the evaluation point. Every `stride` terms a cheap
//! estimate decides whether a certified tail bound is worth computing; once
//! the bound meets the target it is added to every returned coefficient. The
//! whole computation restarts at twice the working precision when the
//! accumulated rounding error makes the target unreachable.

use std::collections::VecDeque;

use log::{debug, warn};
use nalgebra::DMatrix;
use num_traits::Zero;

use crate::accuracy::{working_prec, Accuracy, StoppingCriterion};
use crate::ball::{ComplexBall, Mag};
use crate::bounds::{residual_norms, Majorant, TailBound};
use crate::continuation::types::SummationSettings;
use crate::error::{Error, Result};
use crate::exact::QQi;
use crate::jet::Jet;
use crate::local_solutions::{
    log_series_values, next_log_coefficient, walk_modz_class, LocalBasisMapper,
    LogSeriesInitialValues, SolutionContext,
};
use crate::operator::DiffOp;
use crate::recurrence::BwShiftRec;
use crate::roots::Algebraic;
use crate::traits::Enclose;

/// Where a local series is evaluated: `pt + η`, truncated at `η^jet_order`.
#[derive(Clone, Debug)]
pub struct EvaluationPoint {
    pub pt: ComplexBall,
    pub exact: Option<QQi>,
    pub jet_order: usize,
    /// Upper bound on `|pt|`.
    pub rad: Mag,
    /// Branches of `log` to average over, for non-integer exponents and logs.
    pub branch: Vec<i64>,
}

impl EvaluationPoint {
    pub fn new(pt: ComplexBall, jet_order: usize) -> Self {
        let rad = pt.abs_upper();
        Self {
            pt,
            exact: None,
            jet_order,
            rad,
            branch: vec![0],
        }
    }

    pub fn exact(pt: QQi, jet_order: usize) -> Self {
        let ball = pt.enclose(64);
        Self {
            rad: ball.abs_upper(),
            pt: ball,
            exact: Some(pt),
            jet_order,
            branch: vec![0],
        }
    }

    pub fn with_branch(mut self, branch: Vec<i64>) -> Self {
        self.branch = branch;
        self
    }

    pub fn at_prec(&self, prec: u32) -> ComplexBall {
        match &self.exact {
            Some(q) => q.enclose(prec),
            None => self.pt.set_prec(prec),
        }
    }

    pub fn is_precise(&self, eps: Mag) -> bool {
        self.exact.is_some() || self.pt.rad() < eps
    }
}

/// Everything the summation loop needs besides the working precision.
struct SumSetup<'a> {
    ini: &'a LogSeriesInitialValues,
    evpt: &'a EvaluationPoint,
    crit: StoppingCriterion,
    maj: &'a dyn TailBound,
    /// Indices below this one are not candidates for stopping.
    min_stop: usize,
    settings: &'a SummationSettings,
}

/// One summation attempt at fixed precision; returns the partial sums (one
/// jet per log power) with the tail bound already added.
fn sum_at_prec(
    bwrec: &BwShiftRec<ComplexBall>,
    setup: &SumSetup<'_>,
    prec: u32,
) -> Result<Vec<Jet>> {
    let log_prec = setup.ini.log_prec().max(1);
    let jet_order = setup.evpt.jet_order;
    let x = Jet::variable(&setup.evpt.at_prec(prec), jet_order);
    let zero = Jet::constant(ComplexBall::zero_at(prec), jet_order);
    let mut psum = vec![zero; log_prec];
    let mut jetpow = Jet::constant(ComplexBall::one_at(prec), jet_order);
    let mut radpow = Mag::one();
    let mut window: VecDeque<Vec<ComplexBall>> = VecDeque::new();
    let mut tail_bound = Mag::INF;
    let mut last_noise: Option<Mag> = None;
    let mut n = 0usize;
    loop {
        if let Some(limit) = setup.settings.max_terms {
            if n > limit {
                return Err(Error::TermLimit { limit });
            }
        }
        if n % setup.settings.stride == 0 && n >= setup.min_stop {
            let est = window
                .iter()
                .flatten()
                .map(|c| c.abs_upper())
                .fold(Mag::ZERO, Mag::max)
                .mul(radpow);
            // Radii that dominate the terms and keep growing will never let
            // the tail bound meet the target at this precision.
            let noise = window
                .iter()
                .flatten()
                .map(|c| c.rad())
                .fold(Mag::ZERO, Mag::max)
                .mul(radpow);
            if noise > setup.crit.eps
                && noise.mul_2exp(1) >= est
                && last_noise.is_some_and(|prev| noise > prev)
            {
                return Err(Error::precision(format!(
                    "coefficient radii keep growing ({noise} after {n} terms)"
                )));
            }
            last_noise = Some(noise);
            let lead = psum[0].coeff(0);
            if setup.crit.reached(est, &lead)? {
                let residuals = residual_norms(bwrec, n, &window, log_prec, prec);
                tail_bound = setup.maj.tail_bound(n, &residuals, setup.evpt.rad, jet_order)?;
                debug!("n = {n}, est = {est}, tail bound = {tail_bound}");
                if setup.crit.reached(tail_bound, &lead)? {
                    break;
                }
            }
        }
        let bw = bwrec.eval_series(&ComplexBall::from_i64(n as i64, prec), log_prec);
        let mult = setup.ini.mult(n);
        let mut new = next_log_coefficient(&bw, &window, mult, log_prec, prec)?;
        if let Some(values) = setup.ini.shift.get(&n) {
            for (slot, v) in new.iter_mut().zip(values) {
                *slot = v.set_prec(prec);
            }
        }
        for (acc, c) in psum.iter_mut().zip(&new) {
            if !c.is_zero() {
                *acc = acc.add(&jetpow.scale(c));
            }
        }
        window.push_front(new);
        window.truncate(bwrec.order());
        jetpow = jetpow.mul(&x);
        radpow = radpow.mul(setup.evpt.rad);
        n += 1;
    }
    for jet in psum.iter_mut() {
        for c in jet.coeffs.iter_mut() {
            *c = c.add_error(tail_bound);
        }
    }
    debug!(
        "summed {n} terms, tail <= {tail_bound}, radius <= {}",
        psum.iter()
            .flat_map(|j| j.coeffs.iter())
            .map(|c| c.rad())
            .fold(Mag::ZERO, Mag::max)
    );
    Ok(psum)
}

/// Runs `attempt` at increasing precisions until it stops failing with
/// `Precision`.
fn with_precision_doubling<T>(
    eps: Mag,
    settings: &SummationSettings,
    fail_fast: bool,
    mut attempt: impl FnMut(u32) -> Result<T>,
) -> Result<T> {
    settings.validate()?;
    let mut prec = working_prec(eps).max(64);
    let mut doublings = 0u32;
    loop {
        if prec > settings.max_prec {
            return Err(Error::precision(format!(
                "working precision would exceed {} bits",
                settings.max_prec
            )));
        }
        match attempt(prec) {
            Err(Error::Precision(msg)) => {
                doublings += 1;
                if fail_fast && doublings > settings.fail_fast_doublings {
                    return Err(Error::Precision(msg));
                }
                prec *= 2;
                debug!("lost too much precision ({msg}), restarting with {prec} bits");
            }
            other => return other,
        }
    }
}

/// Error target of one summation.
#[derive(Clone, Copy, Debug)]
struct Target {
    eps: Mag,
    relative: bool,
}

impl From<Accuracy> for Target {
    fn from(acc: Accuracy) -> Self {
        Target {
            eps: acc.eps(),
            relative: matches!(acc, Accuracy::Relative(_)),
        }
    }
}

impl Target {
    fn absolute(eps: Mag) -> Self {
        Target {
            eps,
            relative: false,
        }
    }

    fn criterion(self, precise: bool) -> StoppingCriterion {
        StoppingCriterion {
            eps: self.eps,
            relative: self.relative,
            precise,
        }
    }
}

fn check_target(target: Target, evpt: &EvaluationPoint) -> Result<()> {
    if target.relative && evpt.jet_order > 1 {
        return Err(Error::invalid_input(
            "relative error not supported when computing derivatives",
        ));
    }
    Ok(())
}

fn input_is_precise(ini: &LogSeriesInitialValues, evpt: &EvaluationPoint, eps: Mag) -> bool {
    let precise = evpt.is_precise(eps) && ini.max_rad() < eps;
    if !precise {
        warn!("input intervals too wide for requested accuracy");
    }
    precise
}

/// Sum of the power series solution of `dop` with Taylor initial values `ini`
/// (`ini[k] = y^(k)(0)/k!`), at an ordinary point. Returns `y^(k)(pt)/k!` for
/// `k < jet_order`.
pub fn series_sum_ordinary(
    dop: &DiffOp,
    ini: &[ComplexBall],
    evpt: &EvaluationPoint,
    target: Accuracy,
    settings: &SummationSettings,
) -> Result<Vec<ComplexBall>> {
    if !dop.is_ordinary_at_origin() {
        return Err(Error::invalid_input(
            "singular operator, use regular summation",
        ));
    }
    let maj = Majorant::new(dop, &Algebraic::Exact(crate::exact::qqi_int(0)), 1)?;
    sum_ordinary_with(dop, &dop.to_recurrence(), &maj, ini, evpt, target.into(), settings, false)
}

#[allow(clippy::too_many_arguments)]
fn sum_ordinary_with(
    dop: &DiffOp,
    bwrec: &BwShiftRec<QQi>,
    maj: &Majorant,
    ini: &[ComplexBall],
    evpt: &EvaluationPoint,
    target: Target,
    settings: &SummationSettings,
    fail_fast: bool,
) -> Result<Vec<ComplexBall>> {
    check_target(target, evpt)?;
    if ini.len() != dop.order() {
        return Err(Error::InvalidInitialData(format!(
            "expected {} initial values, got {}",
            dop.order(),
            ini.len()
        )));
    }
    let ini = LogSeriesInitialValues::from_taylor(ini.to_vec());
    let eps = target.eps;
    let precise = input_is_precise(&ini, evpt, eps);
    let setup = SumSetup {
        ini: &ini,
        evpt,
        crit: target.criterion(precise),
        maj,
        min_stop: dop.order().max(maj.min_index()),
        settings,
    };
    with_precision_doubling(eps, settings, fail_fast, |prec| {
        let psum = sum_at_prec(&bwrec.to_balls(prec), &setup, prec)?;
        Ok(psum.into_iter().next().map(|j| j.coeffs).unwrap_or_default())
    })
}

/// The recurrence of `dop` shifted by an exponent, evaluated at any precision.
#[derive(Clone, Debug)]
enum ShiftedRec {
    Exact(BwShiftRec<QQi>),
    Algebraic(BwShiftRec<QQi>, Algebraic),
}

impl ShiftedRec {
    fn new(bwrec: &BwShiftRec<QQi>, expo: &Algebraic) -> Self {
        match expo.as_exact() {
            Some(q) => ShiftedRec::Exact(bwrec.shift(q)),
            None => ShiftedRec::Algebraic(bwrec.clone(), expo.clone()),
        }
    }

    fn at_prec(&self, prec: u32) -> Result<BwShiftRec<ComplexBall>> {
        match self {
            ShiftedRec::Exact(rec) => Ok(rec.to_balls(prec)),
            ShiftedRec::Algebraic(rec, expo) => Ok(rec.shift_ball(&expo.enclosure(prec)?)),
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn sum_regular_with(
    dop: &DiffOp,
    rec: &ShiftedRec,
    maj: &Majorant,
    ini: &LogSeriesInitialValues,
    evpt: &EvaluationPoint,
    target: Target,
    settings: &SummationSettings,
    fail_fast: bool,
) -> Result<Vec<ComplexBall>> {
    check_target(target, evpt)?;
    let eps = target.eps;
    let precise = input_is_precise(ini, evpt, eps);
    let setup = SumSetup {
        ini,
        evpt,
        crit: target.criterion(precise),
        maj,
        min_stop: (dop.order() + 1)
            .max(ini.last_shift() + 1)
            .max(maj.min_index()),
        settings,
    };
    with_precision_doubling(eps, settings, fail_fast, |prec| {
        let psum = sum_at_prec(&rec.at_prec(prec)?, &setup, prec)?;
        log_series_values(
            &ini.expo,
            &psum,
            &evpt.at_prec(prec),
            evpt.jet_order,
            &evpt.branch,
        )
    })
}

/// Sum of the logarithmic series solution of `dop` defined by `ini` at a
/// regular singular point, with its `x^expo log(x)^k` factors applied.
pub fn series_sum_regular(
    dop: &DiffOp,
    ini: &LogSeriesInitialValues,
    evpt: &EvaluationPoint,
    target: Accuracy,
    settings: &SummationSettings,
) -> Result<Vec<ComplexBall>> {
    if !dop.is_fuchsian_at_origin() {
        return Err(Error::unsupported("irregular singular point"));
    }
    ini.validate(dop)?;
    let rec = ShiftedRec::new(&dop.to_recurrence(), &ini.expo);
    let maj = Majorant::new(dop, &ini.expo, ini.log_prec())?;
    sum_regular_with(dop, &rec, &maj, ini, evpt, target.into(), settings, false)
}

fn column_eps(eps: Mag, order: usize) -> Mag {
    eps.div(Mag::from_f64(order.max(1) as f64).sqrt())
}

fn columns_to_matrix(cols: &[Vec<ComplexBall>], rows: usize, prec: u32) -> DMatrix<ComplexBall> {
    DMatrix::from_fn(rows, cols.len(), |i, j| {
        cols[j]
            .get(i)
            .cloned()
            .unwrap_or_else(|| ComplexBall::zero_at(prec))
    })
}

/// Transition matrix of an ordinary point: column `j` holds the expansion at
/// `evpt` of the solution with Taylor initial values `e_j`.
pub fn fundamental_matrix_ordinary(
    dop: &DiffOp,
    evpt: &EvaluationPoint,
    eps: Mag,
    settings: &SummationSettings,
    fail_fast: bool,
) -> Result<DMatrix<ComplexBall>> {
    let order = dop.order();
    if !dop.is_ordinary_at_origin() {
        return Err(Error::invalid_input(
            "singular operator, use regular summation",
        ));
    }
    let target = Target::absolute(column_eps(eps, order));
    let bwrec = dop.to_recurrence();
    let maj = Majorant::new(dop, &Algebraic::Exact(crate::exact::qqi_int(0)), 1)?;
    let mut cols = Vec::with_capacity(order);
    for j in 0..order {
        let ini: Vec<ComplexBall> = (0..order)
            .map(|k| {
                if k == j {
                    ComplexBall::one_at(64)
                } else {
                    ComplexBall::zero_at(64)
                }
            })
            .collect();
        cols.push(sum_ordinary_with(
            dop, &bwrec, &maj, &ini, evpt, target, settings, fail_fast,
        )?);
    }
    Ok(columns_to_matrix(&cols, evpt.jet_order, evpt.pt.prec()))
}

/// Maps every element of the canonical local basis to its expansion at an
/// evaluation point; the shifted recurrence and the majorant are shared by
/// all solutions with the same leftmost exponent.
struct ColumnMapper<'a> {
    evpt: &'a EvaluationPoint,
    target: Target,
    settings: &'a SummationSettings,
    fail_fast: bool,
    cache: Option<(ShiftedRec, Majorant)>,
}

impl LocalBasisMapper for ColumnMapper<'_> {
    type Value = Vec<ComplexBall>;

    fn process_modz_class(
        &mut self,
        ctx: SolutionContext<'_>,
        out: &mut Vec<crate::local_solutions::FundamentalSolution<Self::Value>>,
    ) -> Result<()> {
        let log_prec = ctx.shifts.iter().map(|&(_, m)| m).sum();
        let rec = ShiftedRec::new(ctx.bwrec, ctx.leftmost);
        let maj = Majorant::new(ctx.dop, ctx.leftmost, log_prec)?;
        self.cache = Some((rec, maj));
        walk_modz_class(self, ctx, out)
    }

    fn fun(
        &mut self,
        ctx: &SolutionContext<'_>,
        ini: &LogSeriesInitialValues,
    ) -> Result<Vec<ComplexBall>> {
        let Some((rec, maj)) = &self.cache else {
            return Err(Error::unsupported("solution outside of a class"));
        };
        debug!(
            "solution x^({} + {})·log(x)^{}/{}! + ···",
            ctx.leftmost, ctx.shift, ctx.log_power, ctx.log_power
        );
        sum_regular_with(
            ctx.dop,
            rec,
            maj,
            ini,
            self.evpt,
            self.target,
            self.settings,
            self.fail_fast,
        )
    }
}

/// Transition matrix of a regular singular point: one column per element of
/// the canonical local basis, sorted by asymptotic order.
pub fn fundamental_matrix_regular(
    dop: &DiffOp,
    evpt: &EvaluationPoint,
    eps: Mag,
    settings: &SummationSettings,
    fail_fast: bool,
) -> Result<DMatrix<ComplexBall>> {
    let mut mapper = ColumnMapper {
        evpt,
        target: Target::absolute(column_eps(eps, dop.order())),
        settings,
        fail_fast,
        cache: None,
    };
    let sols = mapper.run(dop)?;
    let cols: Vec<Vec<ComplexBall>> = sols.into_iter().map(|s| s.value).collect();
    Ok(columns_to_matrix(&cols, evpt.jet_order, evpt.pt.prec()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exact::{qqi_gauss, qqi_int, qqi_ratio, rat};
    use std::collections::BTreeMap;

    fn settings() -> SummationSettings {
        SummationSettings::default()
    }

    fn ball(x: f64) -> ComplexBall {
        ComplexBall::from_f64(x, 0.0, 64)
    }

    #[test]
    fn exponential_and_derivatives() {
        let dop = DiffOp::from_int_coeffs(&[&[-1], &[1]]);
        let evpt = EvaluationPoint::exact(qqi_int(1), 3);
        let val = series_sum_ordinary(&dop, &[ball(1.0)], &evpt, Accuracy::Absolute(1e-20), &settings())
            .unwrap();
        let e = std::f64::consts::E;
        assert_eq!(val.len(), 3);
        assert!((val[0].re().to_f64() - e).abs() < 1e-15);
        assert!((val[1].re().to_f64() - e).abs() < 1e-15);
        assert!((val[2].re().to_f64() - e / 2.0).abs() < 1e-15);
        assert!(val[0].rad().to_f64() <= 1e-20);
    }

    #[test]
    fn arctangent_at_one_half() {
        let dop = DiffOp::from_int_coeffs(&[&[], &[0, 2], &[1, 0, 1]]);
        let evpt = EvaluationPoint::exact(qqi_ratio(1, 2), 1);
        let val = series_sum_ordinary(
            &dop,
            &[ball(0.0), ball(1.0)],
            &evpt,
            Accuracy::Absolute(1e-30),
            &settings(),
        )
        .unwrap();
        assert!((val[0].re().to_f64() - 0.5f64.atan()).abs() < 1e-15);
        assert!(val[0].rad().to_f64() <= 1e-30);
    }

    #[test]
    fn wide_inputs_are_not_an_error() {
        let dop = DiffOp::from_int_coeffs(&[&[-1], &[1]]);
        let evpt = EvaluationPoint::exact(qqi_ratio(1, 2), 1);
        let ini = [ball(1.0).add_error(Mag::from_f64(1e-8))];
        let val = series_sum_ordinary(&dop, &ini, &evpt, Accuracy::Absolute(1e-20), &settings())
            .unwrap();
        assert!(val[0].rad().to_f64() >= 1e-8);
        assert!((val[0].re().to_f64() - 0.5f64.exp()).abs() < 1e-7);
    }

    #[test]
    fn term_limit_and_precision_ceiling() {
        let dop = DiffOp::from_int_coeffs(&[&[-1], &[1]]);
        let evpt = EvaluationPoint::exact(qqi_int(10), 1);
        let limited = SummationSettings {
            max_terms: Some(5),
            ..settings()
        };
        let err = series_sum_ordinary(&dop, &[ball(1.0)], &evpt, Accuracy::Absolute(1e-10), &limited)
            .unwrap_err();
        assert!(matches!(err, Error::TermLimit { limit: 5 }));
        let tiny = Accuracy::Absolute(f64::MIN_POSITIVE);
        let capped = SummationSettings {
            max_prec: 256,
            ..settings()
        };
        let err = series_sum_ordinary(&dop, &[ball(1.0)], &evpt, tiny, &capped).unwrap_err();
        assert!(err.is_retryable());
    }

    #[test]
    fn complex_recentered_step() {
        // arctan operator recentered at 1 + 2i/3, summed at 7i/12
        let arctan = DiffOp::from_int_coeffs(&[&[], &[0, 2], &[1, 0, 1]]);
        let dop = arctan.shift(&qqi_gauss(rat(1, 1), rat(2, 3)));
        let evpt = EvaluationPoint::exact(qqi_gauss(rat(0, 1), rat(7, 12)), 2);
        let eps = Mag::from_f64(1e-5);
        let mat = fundamental_matrix_ordinary(&dop, &evpt, eps, &settings(), false).unwrap();
        assert_eq!(mat.shape(), (2, 2));
        assert!(mat.iter().all(|c| c.rad() <= eps));

        // wide inputs make the radii blow up at every precision
        let wide = |x: f64| ball(x).add_error(Mag::from_f64(1e-3));
        let capped = SummationSettings {
            max_prec: 256,
            ..settings()
        };
        let err = series_sum_ordinary(
            &dop,
            &[wide(0.0), wide(1.0)],
            &EvaluationPoint::exact(qqi_gauss(rat(0, 1), rat(7, 12)), 1),
            Accuracy::Absolute(1e-5),
            &capped,
        )
        .unwrap_err();
        assert!(matches!(err, Error::Precision(_)));
    }

    #[test]
    fn zero_stride_is_rejected() {
        let dop = DiffOp::from_int_coeffs(&[&[-1], &[1]]);
        let evpt = EvaluationPoint::exact(qqi_int(1), 1);
        let bad = SummationSettings {
            stride: 0,
            ..settings()
        };
        let err = series_sum_ordinary(&dop, &[ball(1.0)], &evpt, Accuracy::Absolute(1e-10), &bad)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
        let err = fundamental_matrix_ordinary(&dop, &evpt, Mag::from_f64(1e-10), &bad, false)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn relative_error_with_derivatives_is_rejected() {
        let dop = DiffOp::from_int_coeffs(&[&[-1], &[1]]);
        let evpt = EvaluationPoint::exact(qqi_int(1), 2);
        let err = series_sum_ordinary(&dop, &[ball(1.0)], &evpt, Accuracy::Relative(1e-10), &settings())
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn logarithmic_solution_of_x_d2_plus_d() {
        // x D^2 + D: basis log(x), 1
        let dop = DiffOp::from_int_coeffs(&[&[], &[1], &[0, 1]]);
        let evpt = EvaluationPoint::exact(qqi_int(2), 2);
        let ini = LogSeriesInitialValues::new(
            Algebraic::Exact(qqi_int(0)),
            BTreeMap::from([(0, vec![ball(0.0), ball(1.0)])]),
        );
        let val = series_sum_regular(&dop, &ini, &evpt, Accuracy::Absolute(1e-20), &settings())
            .unwrap();
        assert!((val[0].re().to_f64() - 2f64.ln()).abs() < 1e-15);
        assert!((val[1].re().to_f64() - 0.5).abs() < 1e-15);
        let mat = fundamental_matrix_regular(&dop, &evpt, Mag::from_f64(1e-20), &settings(), false)
            .unwrap();
        assert_eq!(mat.shape(), (2, 2));
        assert!((mat[(0, 0)].re().to_f64() - 2f64.ln()).abs() < 1e-15);
        assert!((mat[(0, 1)].re().to_f64() - 1.0).abs() < 1e-15);
        assert!(mat[(1, 1)].contains(&ComplexBall::zero_at(64)));
    }

    #[test]
    fn regular_singular_series_with_a_pole() {
        // x^2 D^2 + x D - 4: basis x^-2, x^2
        let dop = DiffOp::from_int_coeffs(&[&[-4], &[0, 1], &[0, 0, 1]]);
        let evpt = EvaluationPoint::exact(qqi_ratio(1, 2), 1);
        let mat = fundamental_matrix_regular(&dop, &evpt, Mag::from_f64(1e-20), &settings(), false)
            .unwrap();
        assert!((mat[(0, 0)].re().to_f64() - 4.0).abs() < 1e-14);
        assert!((mat[(0, 1)].re().to_f64() - 0.25).abs() < 1e-15);
    }

    #[test]
    fn ordinary_fundamental_matrix() {
        // D^2 + 1: columns cos, sin
        let dop = DiffOp::from_int_coeffs(&[&[1], &[], &[1]]);
        let evpt = EvaluationPoint::exact(qqi_int(1), 2);
        let mat = fundamental_matrix_ordinary(&dop, &evpt, Mag::from_f64(1e-20), &settings(), false)
            .unwrap();
        let (s, c) = 1f64.sin_cos();
        assert!((mat[(0, 0)].re().to_f64() - c).abs() < 1e-15);
        assert!((mat[(1, 0)].re().to_f64() + s).abs() < 1e-15);
        assert!((mat[(0, 1)].re().to_f64() - s).abs() < 1e-15);
        assert!((mat[(1, 1)].re().to_f64() - c).abs() < 1e-15);
    }
}
