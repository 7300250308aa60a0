//! Complex balls as rectangles: a real ball for each component.

use std::fmt;

use num_complex::Complex64;
use num_rational::BigRational;
use num_traits::{One, Zero};

use super::dyadic::Dyadic;
use super::mag::Mag;
use super::real::{ball_binop, RealBall, DEFAULT_PREC};

#[derive(Clone, Debug, PartialEq)]
pub struct ComplexBall {
    re: RealBall,
    im: RealBall,
}

impl ComplexBall {
    pub fn new(re: RealBall, im: RealBall) -> ComplexBall {
        ComplexBall { re, im }
    }

    pub fn from_real(re: RealBall) -> ComplexBall {
        let im = RealBall::zero(re.prec());
        ComplexBall { re, im }
    }

    pub fn zero_at(prec: u32) -> ComplexBall {
        ComplexBall::from_real(RealBall::zero(prec))
    }

    pub fn one_at(prec: u32) -> ComplexBall {
        ComplexBall::from_i64(1, prec)
    }

    pub fn from_i64(n: i64, prec: u32) -> ComplexBall {
        ComplexBall::from_real(RealBall::from_i64(n, prec))
    }

    pub fn from_f64(re: f64, im: f64, prec: u32) -> ComplexBall {
        ComplexBall::new(RealBall::from_f64(re, prec), RealBall::from_f64(im, prec))
    }

    pub fn from_complex64(z: Complex64, prec: u32) -> ComplexBall {
        ComplexBall::from_f64(z.re, z.im, prec)
    }

    pub fn from_rationals(re: &BigRational, im: &BigRational, prec: u32) -> ComplexBall {
        ComplexBall::new(
            RealBall::from_rational(re, prec),
            RealBall::from_rational(im, prec),
        )
    }

    pub fn from_dyadics(re: Dyadic, im: Dyadic, prec: u32) -> ComplexBall {
        ComplexBall::new(RealBall::from_dyadic(re, prec), RealBall::from_dyadic(im, prec))
    }

    pub fn indeterminate(prec: u32) -> ComplexBall {
        ComplexBall::new(RealBall::indeterminate(prec), RealBall::indeterminate(prec))
    }

    /// `i`
    pub fn imaginary_unit(prec: u32) -> ComplexBall {
        ComplexBall::new(RealBall::zero(prec), RealBall::from_i64(1, prec))
    }

    pub fn re(&self) -> &RealBall {
        &self.re
    }

    pub fn im(&self) -> &RealBall {
        &self.im
    }

    pub fn prec(&self) -> u32 {
        self.re.prec().max(self.im.prec())
    }

    pub fn set_prec(&self, prec: u32) -> ComplexBall {
        ComplexBall::new(self.re.set_prec(prec), self.im.set_prec(prec))
    }

    pub fn mid_ball(&self) -> ComplexBall {
        ComplexBall::new(self.re.mid_ball(), self.im.mid_ball())
    }

    pub fn is_finite(&self) -> bool {
        self.re.is_finite() && self.im.is_finite()
    }

    pub fn is_exact(&self) -> bool {
        self.re.is_exact() && self.im.is_exact()
    }

    /// Imaginary part exactly zero.
    pub fn is_real(&self) -> bool {
        self.im.is_zero()
    }

    pub fn contains_zero(&self) -> bool {
        self.re.contains_zero() && self.im.contains_zero()
    }

    pub fn abs_upper(&self) -> Mag {
        let a = self.re.abs_upper();
        let b = self.im.abs_upper();
        a.mul(a).add(b.mul(b)).sqrt()
    }

    pub fn abs_lower(&self) -> Mag {
        let a = self.re.abs_lower();
        let b = self.im.abs_lower();
        a.mul_lower(a).add_lower(b.mul_lower(b)).sqrt_lower()
    }

    /// Radius of a disk containing the rectangle, around its center.
    pub fn rad(&self) -> Mag {
        let a = self.re.rad();
        let b = self.im.rad();
        a.mul(a).add(b.mul(b)).sqrt()
    }

    /// Widens both components so the ball contains the disk of radius `err`.
    pub fn add_error(&self, err: Mag) -> ComplexBall {
        ComplexBall::new(self.re.add_error(err), self.im.add_error(err))
    }

    pub fn overlaps(&self, other: &ComplexBall) -> bool {
        self.re.overlaps(&other.re) && self.im.overlaps(&other.im)
    }

    pub fn contains(&self, other: &ComplexBall) -> bool {
        self.re.contains(&other.re) && self.im.contains(&other.im)
    }

    pub fn to_complex64(&self) -> Complex64 {
        Complex64::new(self.re.to_f64(), self.im.to_f64())
    }

    pub fn conj(&self) -> ComplexBall {
        ComplexBall::new(self.re.clone(), self.im.neg())
    }

    pub fn neg(&self) -> ComplexBall {
        ComplexBall::new(self.re.neg(), self.im.neg())
    }

    pub fn mul_2exp(&self, e: i64) -> ComplexBall {
        ComplexBall::new(self.re.mul_2exp(e), self.im.mul_2exp(e))
    }

    pub fn mul_real(&self, x: &RealBall) -> ComplexBall {
        ComplexBall::new(&self.re * x, &self.im * x)
    }

    pub fn div_real(&self, x: &RealBall) -> ComplexBall {
        ComplexBall::new(&self.re / x, &self.im / x)
    }

    pub fn mul_i64(&self, n: i64) -> ComplexBall {
        self.mul_real(&RealBall::from_i64(n, self.prec()))
    }

    pub fn div_i64(&self, n: i64) -> ComplexBall {
        self.div_real(&RealBall::from_i64(n, self.prec()))
    }

    /// Squared modulus as a real ball.
    pub fn norm_sqr(&self) -> RealBall {
        &self.re.sqr() + &self.im.sqr()
    }

    pub fn inv(&self) -> ComplexBall {
        let n = self.norm_sqr();
        ComplexBall::new(&self.re / &n, &self.im.neg() / &n)
    }

    pub fn pow_u(&self, mut n: u64) -> ComplexBall {
        let mut acc = ComplexBall::one_at(self.prec());
        let mut base = self.clone();
        while n > 0 {
            if n & 1 == 1 {
                acc = &acc * &base;
            }
            n >>= 1;
            if n > 0 {
                base = &base * &base;
            }
        }
        acc
    }

    /// Integer power, negative exponents through the inverse.
    pub fn pow_i(&self, n: i64) -> ComplexBall {
        if n >= 0 {
            self.pow_u(n as u64)
        } else {
            self.inv().pow_u(n.unsigned_abs())
        }
    }

    fn add_ball(&self, other: &ComplexBall) -> ComplexBall {
        ComplexBall::new(&self.re + &other.re, &self.im + &other.im)
    }

    fn sub_ball(&self, other: &ComplexBall) -> ComplexBall {
        ComplexBall::new(&self.re - &other.re, &self.im - &other.im)
    }

    fn mul_ball(&self, other: &ComplexBall) -> ComplexBall {
        if other.is_real() {
            return self.mul_real(&other.re);
        }
        if self.is_real() {
            return other.mul_real(&self.re);
        }
        let re = &(&self.re * &other.re) - &(&self.im * &other.im);
        let im = &(&self.re * &other.im) + &(&self.im * &other.re);
        ComplexBall::new(re, im)
    }

    fn div_ball(&self, other: &ComplexBall) -> ComplexBall {
        if other.is_real() {
            return self.div_real(&other.re);
        }
        let n = other.norm_sqr();
        let num = self.mul_ball(&other.conj());
        num.div_real(&n)
    }
}

ball_binop!(ComplexBall, Add, add, ComplexBall::add_ball);
ball_binop!(ComplexBall, Sub, sub, ComplexBall::sub_ball);
ball_binop!(ComplexBall, Mul, mul, ComplexBall::mul_ball);
ball_binop!(ComplexBall, Div, div, ComplexBall::div_ball);

impl std::ops::Neg for ComplexBall {
    type Output = ComplexBall;
    fn neg(self) -> ComplexBall {
        ComplexBall::neg(&self)
    }
}

impl std::ops::Neg for &ComplexBall {
    type Output = ComplexBall;
    fn neg(self) -> ComplexBall {
        ComplexBall::neg(self)
    }
}

impl std::ops::AddAssign for ComplexBall {
    fn add_assign(&mut self, rhs: ComplexBall) {
        *self = self.add_ball(&rhs);
    }
}

impl std::ops::AddAssign<&ComplexBall> for ComplexBall {
    fn add_assign(&mut self, rhs: &ComplexBall) {
        *self = self.add_ball(rhs);
    }
}

impl std::ops::SubAssign for ComplexBall {
    fn sub_assign(&mut self, rhs: ComplexBall) {
        *self = self.sub_ball(&rhs);
    }
}

impl std::ops::MulAssign for ComplexBall {
    fn mul_assign(&mut self, rhs: ComplexBall) {
        *self = self.mul_ball(&rhs);
    }
}

impl std::ops::MulAssign<&ComplexBall> for ComplexBall {
    fn mul_assign(&mut self, rhs: &ComplexBall) {
        *self = self.mul_ball(rhs);
    }
}

impl Zero for ComplexBall {
    fn zero() -> Self {
        ComplexBall::zero_at(DEFAULT_PREC)
    }

    /// Exactly zero.
    fn is_zero(&self) -> bool {
        self.re.is_zero() && self.im.is_zero()
    }
}

impl One for ComplexBall {
    fn one() -> Self {
        ComplexBall::one_at(DEFAULT_PREC)
    }
}

impl fmt::Display for ComplexBall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_real() {
            write!(f, "{}", self.re)
        } else {
            write!(f, "{} + {}*I", self.re, self.im)
        }
    }
}
