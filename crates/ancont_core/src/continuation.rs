pub mod backend;
pub mod types;
pub mod util;

pub use backend::{Backends, DirectSummation, SummationBackend};
pub use types::{Algorithm, Context, ContinuationRecord, KeepPolicy, SummationSettings};

use log::{debug, info};
use nalgebra::DMatrix;

use crate::accuracy::working_prec;
use crate::ball::{ComplexBall, Mag};
use crate::error::{Error, Result};
use crate::exact::ball_midpoint;
use crate::operator::DiffOp;
use crate::path::{Path, Point, PointAnalyzer, PointValue, Step};
use util::{identity, inverse, mat_mul, max_prec, with_prec};

/// Transition matrix of a single step: maps the initial values at
/// `step.start` (Taylor coefficients at an ordinary point, coefficients on
/// the canonical local basis at a regular singular point) to the same kind
/// of data at `step.end`.
pub fn step_transition_matrix(
    dop: &DiffOp,
    step: &Step,
    eps: Mag,
    ctx: &Context,
) -> Result<DMatrix<ComplexBall>> {
    step_transition_matrix_with(dop, step, eps, ctx, &Backends::default())
}

pub fn step_transition_matrix_with(
    dop: &DiffOp,
    step: &Step,
    eps: Mag,
    ctx: &Context,
    backends: &Backends,
) -> Result<DMatrix<ComplexBall>> {
    ctx.validate()?;
    let an = PointAnalyzer::new(dop)?;
    Driver {
        an: &an,
        ctx,
        backends,
    }
    .step_matrix(step, eps)
}

/// Continues a basis of solutions of `dop` along `path`.
///
/// Initial values at the first vertex are the columns of `ini` (the identity
/// when absent). Every kept vertex produces a record; with `post`, the record
/// holds the values of `post` applied to the solutions instead of their
/// Taylor coefficients.
pub fn analytic_continuation(
    dop: &DiffOp,
    path: &Path,
    eps: Mag,
    ctx: &Context,
    ini: Option<&DMatrix<ComplexBall>>,
    post: Option<&DiffOp>,
) -> Result<Vec<ContinuationRecord>> {
    analytic_continuation_with(dop, path, eps, ctx, ini, post, &Backends::default())
}

pub fn analytic_continuation_with(
    dop: &DiffOp,
    path: &Path,
    eps: Mag,
    ctx: &Context,
    ini: Option<&DMatrix<ComplexBall>>,
    post: Option<&DiffOp>,
    backends: &Backends,
) -> Result<Vec<ContinuationRecord>> {
    if dop.is_zero() {
        return Err(Error::unsupported("the zero operator has no solution space"));
    }
    ctx.validate()?;
    let order = dop.order();
    if let Some(ini) = ini {
        if ini.nrows() != order {
            return Err(Error::invalid_input(format!(
                "expected {order} rows of initial values, got {}",
                ini.nrows()
            )));
        }
    }
    let an = PointAnalyzer::new(dop)?;
    let path = prepare_path(&an, path, ctx)?;
    let eps1 = eps.div(Mag::from_f64(4.0 * (1 + path.len()) as f64));
    let prec = working_prec(eps1);
    let driver = Driver {
        an: &an,
        ctx,
        backends,
    };
    let post = post.map(|p| dop.reduce(p));

    let emit = |point: &Point, mat: DMatrix<ComplexBall>| -> Result<ContinuationRecord> {
        let mut value = match ini {
            Some(ini) => mat_mul(&mat, ini)?,
            None => mat,
        };
        if let Some(post) = &post {
            if an.is_singular(point)? {
                return Err(Error::unsupported(format!(
                    "cannot apply a post-transform at the singular point {point}"
                )));
            }
            let row = match &point.value {
                PointValue::Exact(q) => post.eval_row_exact(q, order, prec),
                PointValue::Ball(b) => post.eval_row(&b.set_prec(prec.max(b.prec())), order),
            };
            let row = DMatrix::from_row_slice(1, order, &row);
            value = mat_mul(&row, &value)?;
        }
        let structure = if ctx.return_local_bases {
            Some(an.local_basis_structure(point)?)
        } else {
            None
        };
        Ok(ContinuationRecord {
            point: point.value.clone(),
            value,
            structure,
        })
    };

    let z0 = &path.vert[0];
    let first = Step::new(z0.clone(), an.simple_approx(z0)?).with_max_split(0);
    let mut main_end = first.end.clone();
    let mut path_mat = driver.step_matrix(&first, eps1)?;
    let mut records = Vec::new();
    if z0.keep {
        records.push(emit(z0, identity(order, prec))?);
    }
    for step in path.steps() {
        let step = step.with_max_split(ctx.max_split);
        let (main, dev) = step.chain_simple(&main_end, &an)?;
        let main_mat = driver.step_matrix(&main, eps1)?;
        path_mat = mat_mul(&main_mat, &path_mat)?;
        main_end = main.end;
        if let Some(dev) = dev {
            let dev_mat = driver.step_matrix(&dev, eps1)?;
            records.push(emit(&dev.end, mat_mul(&dev_mat, &path_mat)?)?);
        }
    }

    let common = records
        .iter()
        .map(|r| max_prec(&r.value))
        .max()
        .unwrap_or(prec);
    for r in &mut records {
        r.value = with_prec(&r.value, common);
    }
    Ok(records)
}

/// Validates the path, applies the keep policy and subdivides it into steps
/// that stay well inside the disks of convergence.
fn prepare_path(an: &PointAnalyzer<'_>, path: &Path, ctx: &Context) -> Result<Path> {
    if !ctx.assume_analytic {
        path.check_singularity(an)?;
    }
    for v in &path.vert {
        if !an.is_regular(v)? {
            return Err(Error::unsupported(format!(
                "analytic continuation through the irregular singular point {v}"
            )));
        }
    }
    let last = path.vert.len() - 1;
    let vert = path
        .vert
        .iter()
        .enumerate()
        .map(|(i, v)| {
            let keep = match ctx.keep {
                KeepPolicy::All => true,
                KeepPolicy::Last => v.keep || i == last,
            };
            let mut v = v.clone().keep(keep);
            if let (PointValue::Ball(b), true) = (&v.value, ctx.squash_intervals) {
                v.value = PointValue::Exact(ball_midpoint(b));
            }
            v
        })
        .collect();
    let mut path = Path::new(vert)?;
    if ctx.assume_analytic {
        path = path.bypass_singularities(an)?;
        path.check_singularity(an)?;
    }
    let path = path.subdivide(an, 0.6, 0.5)?;
    path.check_singularity(an)?;
    path.check_convergence(an)?;
    debug!("continuation path: {path}");
    Ok(path)
}

struct Driver<'a, 'b> {
    an: &'a PointAnalyzer<'b>,
    ctx: &'a Context,
    backends: &'a Backends,
}

impl Driver<'_, '_> {
    fn step_matrix(&self, step: &Step, eps: Mag) -> Result<DMatrix<ComplexBall>> {
        let order = self.an.dop().order();
        if order == 0 || step.start.value == step.end.value {
            return Ok(identity(order, working_prec(eps)));
        }
        let fail_fast = step.max_split > 0;
        match self.classify_and_sum(step, eps, fail_fast) {
            Err(err) if err.is_retryable() && step.max_split > 0 => {
                info!("failed to compute the transition matrix of {step} ({err}), splitting");
                let (s0, s1) = step.split(self.an)?;
                let eps = eps.mul_2exp(-2);
                let m0 = self.step_matrix(&s0, eps)?;
                let m1 = self.step_matrix(&s1, eps)?;
                mat_mul(&m1, &m0)
            }
            res => res,
        }
    }

    fn classify_and_sum(
        &self,
        step: &Step,
        eps: Mag,
        fail_fast: bool,
    ) -> Result<DMatrix<ComplexBall>> {
        if !step.start.is_exact() && !step.end.is_exact() {
            return Err(Error::unsupported(format!(
                "step {step} between two inexact points"
            )));
        }
        let start_ordinary = self.an.is_ordinary(&step.start)?;
        let end_ordinary = self.an.is_ordinary(&step.end)?;
        if start_ordinary && end_ordinary {
            if step.start.is_exact() {
                self.sum(step, eps, fail_fast, false)
            } else {
                let rev = self.sum(&step.reversed(), eps.mul_2exp(-1), fail_fast, false)?;
                inverse(&rev)
            }
        } else if !start_ordinary && end_ordinary {
            if !self.an.is_regular(&step.start)? {
                return Err(Error::unsupported(format!(
                    "irregular singular point {}",
                    step.start
                )));
            }
            self.sum(step, eps, fail_fast, true)
        } else if start_ordinary {
            if !self.an.is_regular(&step.end)? {
                return Err(Error::unsupported(format!(
                    "irregular singular point {}",
                    step.end
                )));
            }
            let rev = self.sum(&step.reversed(), eps.mul_2exp(-1), fail_fast, true)?;
            inverse(&rev)
        } else {
            Err(Error::unsupported(format!(
                "step {step} connects two singular points"
            )))
        }
    }

    /// Sums the local expansions at `step.start`, an exact point, trying the
    /// summation strategies in policy order.
    fn sum(
        &self,
        step: &Step,
        eps: Mag,
        fail_fast: bool,
        regular: bool,
    ) -> Result<DMatrix<ComplexBall>> {
        let Some(start) = step.start.value.as_exact() else {
            return Err(Error::unsupported(format!(
                "local expansion at the inexact point {}",
                step.start
            )));
        };
        let dop = self.an.dop().shift(start);
        let evpt = step.evpt(dop.order());
        let strategies = self.strategies(step, eps, fail_fast)?;
        let mut first_err: Option<Error> = None;
        for (i, &algorithm) in strategies.iter().enumerate() {
            let res = self.backends.get(algorithm).and_then(|backend| {
                let res = if regular {
                    backend.fundamental_matrix_regular(
                        &dop,
                        &evpt,
                        eps,
                        &self.ctx.summation,
                        fail_fast,
                    )
                } else {
                    backend.fundamental_matrix_ordinary(
                        &dop,
                        &evpt,
                        eps,
                        &self.ctx.summation,
                        fail_fast,
                    )
                };
                res.map_err(Error::from_backend)
            });
            match res {
                Ok(mat) => return Ok(mat),
                Err(err)
                    if i + 1 < strategies.len()
                        && (err.is_retryable() || matches!(err, Error::Unsupported(_))) =>
                {
                    info!("{algorithm:?} summation failed on {step} ({err}), falling back");
                    first_err.get_or_insert(err);
                }
                Err(err) => {
                    return Err(match first_err {
                        Some(orig) if matches!(err, Error::Unsupported(_)) => orig,
                        _ => err,
                    })
                }
            }
        }
        Err(first_err.unwrap_or_else(|| Error::unsupported("no summation strategy")))
    }

    fn strategies(&self, step: &Step, eps: Mag, fail_fast: bool) -> Result<Vec<Algorithm>> {
        use Algorithm::{Binsplit, Naive};
        let ctx = self.ctx;
        if ctx.force_binsplit() {
            return Ok(vec![Binsplit]);
        }
        if ctx.force_naive() || (fail_fast && !ctx.prefer_binsplit()) {
            return Ok(vec![Naive]);
        }
        if ctx.prefer_binsplit() || self.binsplit_is_cheaper(step, eps)? {
            return Ok(vec![Binsplit, Naive]);
        }
        Ok(vec![Naive, Binsplit])
    }

    /// Estimated term count against the size of the operator.
    fn binsplit_is_cheaper(&self, step: &Step, eps: Mag) -> Result<bool> {
        if !self.backends.has(Algorithm::Binsplit) || !step.is_exact() || step.branch != [0] {
            return Ok(false);
        }
        let ratio = step.cvg_ratio(self.an)?;
        let neg_log_eps = -eps.log2() * std::f64::consts::LN_2;
        if ratio <= 0.0 || neg_log_eps <= 1.0 {
            return Ok(false);
        }
        let terms_est = neg_log_eps / (-ratio.ln()).min(neg_log_eps.ln());
        let deg = self.an.dop().degree() as f64;
        Ok(terms_est >= 256.0 + 32.0 * deg * deg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exact::{qqi_int, qqi_ratio};
    use util::assert_err_contains;

    fn exp_op() -> DiffOp {
        DiffOp::from_int_coeffs(&[&[-1], &[1]])
    }

    #[test]
    fn trivial_steps() {
        let dop = exp_op();
        let step = Step::new(Point::new(1), Point::new(1));
        let m = step_transition_matrix(&dop, &step, Mag::from_f64(1e-10), &Context::default())
            .unwrap();
        assert_eq!(m.nrows(), 1);
        assert!(m[(0, 0)].contains(&ComplexBall::one_at(64)));
        let zero_order = DiffOp::from_int_coeffs(&[&[1, 1]]);
        let step = Step::new(Point::new(0), Point::new(1));
        let m = step_transition_matrix(&zero_order, &step, Mag::from_f64(1e-10), &Context::default())
            .unwrap();
        assert_eq!(m.nrows(), 0);
    }

    #[test]
    fn backward_step_inverts_the_forward_one() {
        let dop = exp_op();
        let ctx = Context::default();
        let eps = Mag::from_f64(1e-20);
        let fwd = Step::new(Point::new(0), Point::new(qqi_ratio(1, 2)));
        let bwd = fwd.reversed();
        let a = step_transition_matrix(&dop, &fwd, eps, &ctx).unwrap();
        let b = step_transition_matrix(&dop, &bwd, eps, &ctx).unwrap();
        let prod = mat_mul(&b, &a).unwrap();
        assert!(prod[(0, 0)].contains(&ComplexBall::one_at(64)));
    }

    #[test]
    fn inexact_start_goes_through_the_inverse() {
        let dop = exp_op();
        let start = ComplexBall::from_f64(0.5, 0.0, 128);
        let step = Step::new(Point::new(start), Point::new(qqi_int(1)));
        let m = step_transition_matrix(&dop, &step, Mag::from_f64(1e-20), &Context::default())
            .unwrap();
        let sqrt_e = ComplexBall::one_at(256).div_i64(2).exp();
        assert!(m[(0, 0)].overlaps(&sqrt_e));
        let both = Step::new(
            Point::new(ComplexBall::from_f64(0.5, 0.0, 64)),
            Point::new(ComplexBall::from_f64(0.75, 0.0, 64)),
        );
        assert_err_contains(
            step_transition_matrix(&dop, &both, Mag::from_f64(1e-20), &Context::default()),
            "two inexact points",
        );
    }

    #[test]
    fn forcing_an_unavailable_backend() {
        let dop = exp_op();
        let ctx = Context {
            algorithm: Some(Algorithm::Binsplit),
            force_algorithm: true,
            ..Context::default()
        };
        let step = Step::new(Point::new(0), Point::new(1));
        assert!(matches!(
            step_transition_matrix(&dop, &step, Mag::from_f64(1e-10), &ctx),
            Err(Error::Unsupported(_))
        ));
        let preferred = Context {
            algorithm: Some(Algorithm::Binsplit),
            ..Context::default()
        };
        assert!(step_transition_matrix(&dop, &step, Mag::from_f64(1e-10), &preferred).is_ok());
    }

    #[test]
    fn zero_operator_and_bad_initial_values() {
        let path = Path::from_values([0, 1]).unwrap();
        let ctx = Context::default();
        let eps = Mag::from_f64(1e-10);
        assert!(matches!(
            analytic_continuation(&DiffOp::new(vec![]), &path, eps, &ctx, None, None),
            Err(Error::Unsupported(_))
        ));
        let ini = identity(2, 64);
        assert_err_contains(
            analytic_continuation(&exp_op(), &path, eps, &ctx, Some(&ini), None),
            "rows of initial values",
        );
    }

    #[test]
    fn keep_policy() {
        let dop = exp_op();
        let path = Path::from_values([0, 1, 2]).unwrap();
        let eps = Mag::from_f64(1e-12);
        let last = analytic_continuation(&dop, &path, eps, &Context::default(), None, None).unwrap();
        assert_eq!(last.len(), 1);
        assert_eq!(last[0].point, PointValue::from(2));
        let ctx = Context {
            keep: KeepPolicy::All,
            ..Context::default()
        };
        let all = analytic_continuation(&dop, &path, eps, &ctx, None, None).unwrap();
        assert_eq!(all.len(), 3);
        assert!(all[0].value[(0, 0)].contains(&ComplexBall::one_at(64)));
        let e = ComplexBall::one_at(256).exp();
        assert!(all[1].value[(0, 0)].overlaps(&e));
        let prec = all[0].value[(0, 0)].prec();
        assert!(all.iter().all(|r| r.value[(0, 0)].prec() == prec));
    }

    #[test]
    fn post_transform_gives_derivatives() {
        // y'' + y = 0, post-transform D
        let dop = DiffOp::from_int_coeffs(&[&[1], &[], &[1]]);
        let post = DiffOp::from_int_coeffs(&[&[], &[1]]);
        let path = Path::from_values([0, 1]).unwrap();
        let ini = DMatrix::from_column_slice(2, 1, &[ComplexBall::one_at(64), ComplexBall::zero_at(64)]);
        let rec = analytic_continuation(
            &dop,
            &path,
            Mag::from_f64(1e-15),
            &Context::default(),
            Some(&ini),
            Some(&post),
        )
        .unwrap();
        // d/dx cos(x) at 1
        let v = &rec[0].value;
        assert_eq!((v.nrows(), v.ncols()), (1, 1));
        // Im exp(i) = sin(1)
        let sin1 = ComplexBall::imaginary_unit(256).exp().im().clone();
        assert!(v[(0, 0)].overlaps(&ComplexBall::from_real(sin1.neg())));
    }
}
