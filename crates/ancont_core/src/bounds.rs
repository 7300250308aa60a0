//! Certified bounds on the tails of series solutions.
//!
//! The operator is taken in θ-form, `P = Σ_m e_m(x) θ^m`, and normalized by its
//! leading coefficient: `P / e_r = Q(θ) + x·R(x, θ)` with `Q = E_0 / e_r(0)`.
//! If the truncated sum `y_N` leaves the residual `P(y_N) = −Σ R_n x^(λ+n)`, the
//! tail `t = y − y_N` is majorized coefficientwise by the solution of a first
//! order equation, which gives
//!
//! ```text
//!   Σ_{n≥N} ‖t_n‖ y^n  ≤  h(y) · F · Σ ‖R_n‖ y^n / (|c0| (1 − y/ρ)^d)
//! ```
//!
//! where `F` bounds `1/Q(λ+n)` for `n ≥ N`, `h` is the exponential of a rational
//! majorant of `R`, `c0 = e_r(0)`, `d = deg e_r` and `ρ` is a lower bound on
//! the moduli of the roots of `e_r`. Bounds on derivatives follow by Cauchy's
//! estimate on a slightly larger circle.

use std::collections::VecDeque;

use log::trace;

use crate::ball::{ComplexBall, Mag};
use crate::error::{Error, Result};
use crate::operator::DiffOp;
use crate::recurrence::BwShiftRec;
use crate::roots::{isolate_squarefree, roots_with_multiplicities, Algebraic};
use crate::traits::Enclose;

const BOUND_PREC: u32 = 64;

/// The tail-bound service consumed by series summation.
pub trait TailBound {
    /// Bound on every one of the first `jet_order` Taylor coefficients, at any
    /// point of modulus at most `rad`, of the tail `Σ_{n≥n0} t_n w^n` whose
    /// residuals at `n0, n0+1, …` have the given norms.
    fn tail_bound(&self, n0: usize, residuals: &[Mag], rad: Mag, jet_order: usize)
        -> Result<Mag>;

    /// Smallest `n0` for which [`tail_bound`](Self::tail_bound) can be finite.
    fn min_index(&self) -> usize;
}

/// Normalized majorant of an operator at the origin, for solutions with
/// leftmost exponent `λ`.
#[derive(Clone, Debug)]
pub struct Majorant {
    c0: Mag,
    rho: Mag,
    d: u64,
    /// `|q_m[j]|`, for `m < r`
    q_abs: Vec<Vec<Mag>>,
    lambda_abs: Mag,
    /// `(|λ − α_i|, multiplicity)` over the indicial roots `α_i`
    roots: Vec<(Mag, u64)>,
    log_prec: usize,
}

impl Majorant {
    /// `dop` is the operator re-centered at the expansion point.
    pub fn new(dop: &DiffOp, lambda: &Algebraic, log_prec: usize) -> Result<Self> {
        let theta = dop.theta_form();
        let r = theta.order();
        let er = &theta.coeffs[r];
        let c0q = er.coeff(0);
        let c0 = c0q.enclose(BOUND_PREC).abs_lower();
        if c0.is_zero() {
            return Err(Error::unsupported("irregular singular point"));
        }
        let d = er.degree().unwrap_or(0);
        let rho = if d == 0 {
            Mag::INF
        } else {
            isolate_squarefree(&er.squarefree_part(), BOUND_PREC)?
                .iter()
                .map(|z| z.abs_lower())
                .fold(Mag::INF, Mag::min)
        };
        let q_abs = theta.coeffs[..r]
            .iter()
            .map(|em| {
                let num = em.scale(&c0q).sub(&er.scale(&em.coeff(0)));
                num.shift_down(1)
                    .coeffs()
                    .iter()
                    .map(|c| c.enclose(BOUND_PREC).abs_upper())
                    .collect()
            })
            .collect();
        let lambda_ball = lambda.enclosure(BOUND_PREC)?;
        let mut roots = Vec::new();
        for (alpha, mult) in roots_with_multiplicities(&theta.theta_polynomial(0))? {
            let diff = &lambda_ball - &alpha.enclosure(BOUND_PREC)?;
            roots.push((diff.abs_upper(), mult as u64));
        }
        Ok(Self {
            c0,
            rho,
            d: d as u64,
            q_abs,
            lambda_abs: lambda_ball.abs_upper(),
            roots,
            log_prec: log_prec.max(1),
        })
    }

    /// Lower bound on the distance to the nearest singularity other than the origin.
    pub fn radius(&self) -> Mag {
        self.rho
    }

    /// `F ≥ sup_{n≥n0} ‖1/Q(λ+n+η)‖`, truncated at `η^log_prec`.
    fn inverse_indicial_bound(&self, n0: usize) -> Mag {
        let big_n = Mag::from_f64(n0 as f64);
        let mut f = Mag::one();
        for &(c, mult) in &self.roots {
            let a = big_n.sub_lower(c);
            let inv = Mag::one().div(a);
            let mut fk = Mag::ZERO;
            let mut pow = inv;
            for _ in 0..self.log_prec {
                fk = fk.add(pow);
                pow = pow.mul(inv);
            }
            f = f.mul(fk.pow(mult));
        }
        f
    }

    /// `Σ_{n≥n0} ‖t_n‖ y^n`.
    fn series_bound(&self, n0: usize, residuals: &[Mag], y: Mag) -> Result<Mag> {
        let u = y.div(self.rho);
        let one_minus_u = Mag::one().sub_lower(u);
        if one_minus_u.is_zero() {
            return Err(Error::bound_precision(format!(
                "radius {y} too close to the nearest singularity ({})",
                self.rho
            )));
        }
        let inv_sing = Mag::one().div(one_minus_u.pow_lower(self.d));
        let big_n = Mag::from_f64(n0 as f64);
        let f = self.inverse_indicial_bound(n0);
        let base = big_n.add(self.lambda_abs).add(Mag::one());
        let mut qop = Mag::ZERO;
        let mut gamma = big_n.mul(f);
        for qm in &self.q_abs {
            let mut ypow = Mag::one();
            let mut acc = Mag::ZERO;
            for c in qm {
                acc = acc.add(c.mul(ypow));
                ypow = ypow.mul(y);
            }
            qop = qop.add(gamma.mul(acc));
            gamma = gamma.mul(base);
        }
        // ∫_0^y dt / (1 − t/ρ)^d ≤ y / (1 − y/ρ)^d
        let integral = y.mul(inv_sing);
        let h = qop.mul(integral).div(self.c0.mul_lower(self.c0)).exp_upper();
        let mut res = Mag::ZERO;
        let mut ypow = y.pow(n0 as u64);
        for r in residuals {
            res = res.add(r.mul(ypow));
            ypow = ypow.mul(y);
        }
        let g = res.mul(inv_sing).div(self.c0);
        Ok(h.mul(f).mul(g))
    }
}

impl TailBound for Majorant {
    fn min_index(&self) -> usize {
        let cmax = self
            .roots
            .iter()
            .map(|(c, _)| c.to_f64_upper())
            .fold(0.0, f64::max);
        cmax.floor() as usize + 2
    }

    fn tail_bound(
        &self,
        n0: usize,
        residuals: &[Mag],
        rad: Mag,
        jet_order: usize,
    ) -> Result<Mag> {
        if n0 < self.min_index() {
            return Ok(Mag::INF);
        }
        if rad.is_zero() && jet_order <= n0 {
            return Ok(Mag::ZERO);
        }
        if !rad.is_finite() || rad >= self.rho {
            return Err(Error::bound_precision(format!(
                "evaluation radius {rad} not below the radius of convergence {}",
                self.rho
            )));
        }
        let x = rad.to_f64_upper();
        let rho = self.rho.to_f64_lower();
        let mut bound = Mag::ZERO;
        for k in 0..jet_order {
            let b = if k == 0 {
                self.series_bound(n0, residuals, rad)?
            } else {
                let mut delta = if n0 > k {
                    k as f64 * x / (n0 - k) as f64
                } else {
                    x.max(1.0)
                };
                if rho.is_finite() {
                    delta = delta.min((rho - x) / 2.0);
                }
                if !(delta > 0.0) {
                    delta = f64::MIN_POSITIVE.max(x * 1e-3);
                }
                let delta = Mag::from_f64(delta);
                let w = self.series_bound(n0, residuals, rad.add(delta))?;
                w.div(delta.pow_lower(k as u64))
            };
            bound = bound.max(b);
        }
        trace!("tail bound at n = {n0}, rad = {rad}: {bound}");
        Ok(bound)
    }
}

/// ℓ1 norms of the residuals `R_n0, …, R_{n0+s−1}` left by truncating a series
/// after `u_{n0−1}`; `window[i]` holds `u_{n0−1−i}`.
pub fn residual_norms(
    bwrec: &BwShiftRec<ComplexBall>,
    n0: usize,
    window: &VecDeque<Vec<ComplexBall>>,
    log_prec: usize,
    prec: u32,
) -> Vec<Mag> {
    let s = bwrec.order();
    (0..s)
        .map(|t| {
            let n = n0 + t;
            let bw = bwrec.eval_series(&ComplexBall::from_i64(n as i64, prec), log_prec);
            let mut norm = Mag::ZERO;
            for p in 0..log_prec {
                let mut acc = ComplexBall::zero_at(prec);
                for i in t + 1..=s {
                    let Some(u) = window.get(i - t - 1) else {
                        continue;
                    };
                    for l in 0..log_prec - p {
                        acc += &bw[i][l] * &u[p + l];
                    }
                }
                norm = norm.add(acc.abs_upper());
            }
            norm
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exact::qqi_int;

    fn factorial(n: u64) -> f64 {
        (1..=n).map(|k| k as f64).product()
    }

    #[test]
    fn exponential_tail_is_tight() {
        // D - 1: the bound is e^y y^N / N!
        let dop = DiffOp::from_int_coeffs(&[&[-1], &[1]]);
        let maj = Majorant::new(&dop, &Algebraic::Exact(qqi_int(0)), 1).unwrap();
        assert!(!maj.radius().is_finite());
        let n0 = 20;
        let residual = Mag::from_f64(1.0 / factorial(19));
        let b = maj.tail_bound(n0, &[residual], Mag::one(), 1).unwrap();
        let truth: f64 = (20..40).map(|n| 1.0 / factorial(n)).sum();
        assert!(b.to_f64() >= truth);
        assert!(b.to_f64() <= 3.0 * truth);
    }

    #[test]
    fn derivative_bounds_and_radius() {
        // (x^2 + 1) D^2 + 2x D: singularities at ±i
        let dop = DiffOp::from_int_coeffs(&[&[], &[0, 2], &[1, 0, 1]]);
        let maj = Majorant::new(&dop, &Algebraic::Exact(qqi_int(0)), 1).unwrap();
        assert!((maj.radius().to_f64() - 1.0).abs() < 1e-6);
        let res = [Mag::from_f64(1e-10), Mag::from_f64(1e-10)];
        let half = Mag::from_f64(0.5);
        let b0 = maj.tail_bound(60, &res, half, 1).unwrap();
        let b1 = maj.tail_bound(60, &res, half, 2).unwrap();
        assert!(b0.is_finite() && b0 <= b1);
        assert!(matches!(
            maj.tail_bound(60, &res, Mag::from_f64(1.5), 1),
            Err(Error::BoundPrecision(_))
        ));
    }

    #[test]
    fn bounds_are_infinite_below_the_indicial_roots() {
        // x^2 D^2 + x D - 4: exponents -2 and 2
        let dop = DiffOp::from_int_coeffs(&[&[-4], &[0, 1], &[0, 0, 1]]);
        let maj = Majorant::new(&dop, &Algebraic::Exact(qqi_int(-2)), 1).unwrap();
        assert_eq!(maj.min_index(), 6);
        let b = maj.tail_bound(3, &[], Mag::from_f64(0.5), 1).unwrap();
        assert!(!b.is_finite());
    }

    #[test]
    fn residuals_of_the_exponential_series() {
        let dop = DiffOp::from_int_coeffs(&[&[-1], &[1]]);
        let rec = dop.to_recurrence().to_balls(64);
        let mut window = VecDeque::new();
        window.push_front(vec![ComplexBall::from_f64(0.5, 0.0, 64)]);
        let norms = residual_norms(&rec, 3, &window, 1, 64);
        assert_eq!(norms.len(), 1);
        assert!((norms[0].to_f64() - 0.5).abs() < 1e-15);
    }
}
