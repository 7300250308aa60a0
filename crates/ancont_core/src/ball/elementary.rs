//! Elementary functions on balls: π, `log 2`, complex `exp`, `log` and powers.

use num_complex::Complex64;

use super::complex::ComplexBall;
use super::mag::Mag;
use super::real::RealBall;

/// `Σ_k (-1)^k / ((2k+1) q^(2k+1))`, i.e. `atan(1/q)` when `alternate`, else `atanh(1/q)`.
fn arctan_recip(q: i64, alternate: bool, wp: u32) -> RealBall {
    let q2 = RealBall::from_i64(q * q, wp);
    let mut power = RealBall::from_i64(1, wp) / RealBall::from_i64(q, wp);
    let mut sum = RealBall::zero(wp);
    let tol = Mag::pow2(-(wp as i64) - 4);
    let mut k = 0i64;
    loop {
        let term = &power / &RealBall::from_i64(2 * k + 1, wp);
        sum = if alternate && k % 2 == 1 {
            &sum - &term
        } else {
            &sum + &term
        };
        power = &power / &q2;
        k += 1;
        let rest = power.abs_upper();
        if rest < tol {
            // geometric tail, ratio at most 1/q^2 <= 1/4
            return sum.add_error(rest.mul_f64(2.0));
        }
    }
}

pub fn pi(prec: u32) -> RealBall {
    let wp = prec + 16;
    let a = arctan_recip(5, true, wp).mul_2exp(4);
    let b = arctan_recip(239, true, wp).mul_2exp(2);
    (&a - &b).set_prec(prec)
}

pub fn ln2(prec: u32) -> RealBall {
    let wp = prec + 16;
    arctan_recip(3, false, wp).mul_2exp(1).set_prec(prec)
}

impl ComplexBall {
    pub fn exp(&self) -> ComplexBall {
        let prec = self.prec();
        if !self.is_finite() {
            return ComplexBall::indeterminate(prec);
        }
        let m = self.abs_upper();
        if m.is_zero() {
            return ComplexBall::one_at(prec);
        }
        if m.log2() > 40.0 {
            return ComplexBall::indeterminate(prec);
        }
        let s = (m.log2().ceil() as i64 + 8).max(0);
        let wp = prec + s as u32 + 10;
        let w = self.set_prec(wp).mul_2exp(-s);
        let wabs = w.abs_upper();
        let tol = Mag::pow2(-(wp as i64) - 2);

        let mut term = ComplexBall::one_at(wp);
        let mut sum = ComplexBall::one_at(wp);
        let mut bound = Mag::one();
        let mut k = 1i64;
        loop {
            term = (&term * &w).div_i64(k);
            sum += &term;
            bound = bound.mul(wabs).div(Mag::from_f64(k as f64));
            let next = bound.mul(wabs).div(Mag::from_f64((k + 1) as f64));
            if next < tol {
                // |w| < 1, so the remainder is at most twice its first term
                sum = sum.add_error(next.mul_f64(2.0));
                break;
            }
            k += 1;
        }
        for _ in 0..s {
            sum = &sum * &sum;
        }
        sum.set_prec(prec)
    }

    /// Logarithm on the branch through the midpoint's principal value.
    pub fn log(&self) -> ComplexBall {
        let prec = self.prec();
        if !self.is_finite() || self.contains_zero() {
            return ComplexBall::indeterminate(prec);
        }
        let wp = prec + 20;
        let e = self.abs_upper().exponent();
        let z = self.set_prec(wp).mul_2exp(-e);
        let approx = z.to_complex64();
        if !approx.is_finite() || approx == Complex64::new(0.0, 0.0) {
            return ComplexBall::indeterminate(prec);
        }
        let one = ComplexBall::one_at(wp);
        let mut w = ComplexBall::from_complex64(approx.ln(), wp);
        let mut good_bits = 40u32;
        while good_bits < wp {
            let p = (2 * good_bits + 10).min(wp);
            let w_p = w.set_prec(p);
            let t = &(&z.set_prec(p) * &w_p.neg().exp()) - &one;
            w = (&w + &t).mid_ball();
            good_bits *= 2;
        }
        let t = &(&z * &w.neg().exp()) - &one;
        let ta = t.abs_upper();
        if ta >= Mag::from_f64(0.5) {
            return ComplexBall::indeterminate(prec);
        }
        // |log(1 + t) - t| <= |t|^2 / (1 - |t|)
        let err = ta.mul(ta).div(Mag::one().sub_lower(ta));
        let mut res = (&w + &t).add_error(err);
        if e != 0 {
            let shift = &ln2(wp) * &RealBall::from_i64(e, wp);
            res = &res + &ComplexBall::from_real(shift);
        }
        res.set_prec(prec)
    }

    /// `self^expo = exp(expo · log(self))`.
    pub fn pow(&self, expo: &ComplexBall) -> ComplexBall {
        (expo * &self.log()).exp()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(ball: &RealBall, value: f64, tol: f64) -> bool {
        (ball.to_f64() - value).abs() <= tol && ball.rad().to_f64() <= tol
    }

    #[test]
    fn pi_and_ln2() {
        let p = pi(200);
        assert!(close(&p, std::f64::consts::PI, 1e-15));
        assert!(p.rad().log2() < -190.0);
        assert!(close(&ln2(100), std::f64::consts::LN_2, 1e-15));
    }

    #[test]
    fn exp_of_one_and_of_i_pi() {
        let e = ComplexBall::one_at(128).exp();
        assert!(close(e.re(), std::f64::consts::E, 1e-15));
        assert!(e.re().rad().log2() < -110.0);
        let ipi = ComplexBall::new(RealBall::zero(128), pi(128));
        let m1 = ipi.exp();
        assert!(m1.contains(&ComplexBall::from_i64(-1, 128)));
    }

    #[test]
    fn log_inverts_exp() {
        let z = ComplexBall::from_f64(-3.0, 4.0, 128);
        let l = z.log();
        assert!((l.re().to_f64() - 5f64.ln()).abs() < 1e-14);
        assert!((l.im().to_f64() - 4f64.atan2(-3.0)).abs() < 1e-14);
        assert!(l.exp().overlaps(&z));
        assert!(l.rad().log2() < -100.0);
    }

    #[test]
    fn log_of_large_and_small_moduli() {
        let big = ComplexBall::from_f64(1e300, 0.0, 64).mul_2exp(5000);
        let l = big.log();
        let expected = 300.0 * std::f64::consts::LN_10 + 5000.0 * std::f64::consts::LN_2;
        assert!((l.re().to_f64() - expected).abs() < 1e-9);
    }

    #[test]
    fn complex_power() {
        let two = ComplexBall::from_i64(2, 100);
        let half = ComplexBall::from_f64(0.5, 0.0, 100);
        let r = two.pow(&half);
        assert!((r.re().to_f64() - 2f64.sqrt()).abs() < 1e-15);
        assert!(r.im().abs_upper().to_f64() < 1e-25);
    }

    #[test]
    fn log_of_zero_is_indeterminate() {
        assert!(!ComplexBall::zero_at(64).log().is_finite());
    }
}
