//! Real balls: a dyadic midpoint, a radius and a working precision.
//!
//! Every operation rounds its midpoint to the larger of the operand
//! precisions and adds the rounding error to the radius. A ball with an
//! infinite radius is indeterminate and absorbs everything it touches.

use std::fmt;

use num_rational::BigRational;

use super::dyadic::Dyadic;
use super::mag::Mag;

/// Precision of constants built without an explicit precision (zero, one, small integers).
pub const DEFAULT_PREC: u32 = 64;

#[derive(Clone, Debug, PartialEq)]
pub struct RealBall {
    mid: Dyadic,
    rad: Mag,
    prec: u32,
}

impl RealBall {
    /// Rounds `mid` to `prec` bits and widens `rad` accordingly.
    pub fn new(mid: Dyadic, rad: Mag, prec: u32) -> RealBall {
        let (mid, err) = mid.round(prec);
        RealBall {
            mid,
            rad: rad.add(err),
            prec,
        }
    }

    pub fn from_dyadic(mid: Dyadic, prec: u32) -> RealBall {
        RealBall::new(mid, Mag::ZERO, prec)
    }

    pub fn zero(prec: u32) -> RealBall {
        RealBall {
            mid: Dyadic::zero(),
            rad: Mag::ZERO,
            prec,
        }
    }

    pub fn from_i64(n: i64, prec: u32) -> RealBall {
        RealBall::from_dyadic(Dyadic::from_i64(n), prec)
    }

    /// Non-finite input gives an indeterminate ball.
    pub fn from_f64(x: f64, prec: u32) -> RealBall {
        match Dyadic::from_f64(x) {
            Some(d) => RealBall::from_dyadic(d, prec),
            None => RealBall::indeterminate(prec),
        }
    }

    pub fn from_rational(q: &BigRational, prec: u32) -> RealBall {
        let (mid, err) = Dyadic::from_rational(q, prec);
        RealBall { mid, rad: err, prec }
    }

    pub fn indeterminate(prec: u32) -> RealBall {
        RealBall {
            mid: Dyadic::zero(),
            rad: Mag::INF,
            prec,
        }
    }

    pub fn mid(&self) -> &Dyadic {
        &self.mid
    }

    pub fn rad(&self) -> Mag {
        self.rad
    }

    pub fn prec(&self) -> u32 {
        self.prec
    }

    pub fn mid_ball(&self) -> RealBall {
        RealBall {
            mid: self.mid.clone(),
            rad: Mag::ZERO,
            prec: self.prec,
        }
    }

    pub fn set_prec(&self, prec: u32) -> RealBall {
        RealBall::new(self.mid.clone(), self.rad, prec)
    }

    pub fn is_exact(&self) -> bool {
        self.rad.is_zero()
    }

    pub fn is_finite(&self) -> bool {
        self.rad.is_finite()
    }

    /// Exactly zero.
    pub fn is_zero(&self) -> bool {
        self.mid.is_zero() && self.rad.is_zero()
    }

    pub fn contains_zero(&self) -> bool {
        self.abs_lower().is_zero()
    }

    pub fn is_positive(&self) -> bool {
        !self.contains_zero() && !self.mid.is_negative()
    }

    pub fn is_negative(&self) -> bool {
        !self.contains_zero() && self.mid.is_negative()
    }

    pub fn abs_upper(&self) -> Mag {
        self.mid.abs_upper().add(self.rad)
    }

    pub fn abs_lower(&self) -> Mag {
        self.mid.abs_lower().sub_lower(self.rad)
    }

    pub fn add_error(&self, err: Mag) -> RealBall {
        RealBall {
            mid: self.mid.clone(),
            rad: self.rad.add(err),
            prec: self.prec,
        }
    }

    pub fn overlaps(&self, other: &RealBall) -> bool {
        self.mid.sub(&other.mid).abs_lower() <= self.rad.add(other.rad)
    }

    /// Certainly contains every point of `other`.
    pub fn contains(&self, other: &RealBall) -> bool {
        self.mid.sub(&other.mid).abs_upper().add(other.rad) <= self.rad
    }

    pub fn contains_dyadic(&self, x: &Dyadic) -> bool {
        self.mid.sub(x).abs_upper() <= self.rad
    }

    /// Lower and upper endpoints, rounded outward; `None` if indeterminate.
    pub fn endpoints(&self) -> Option<(Dyadic, Dyadic)> {
        let r = Dyadic::from_mag(&self.rad)?;
        Some((self.mid.sub(&r), self.mid.add(&r)))
    }

    pub fn to_f64(&self) -> f64 {
        self.mid.to_f64()
    }

    pub fn neg(&self) -> RealBall {
        RealBall {
            mid: self.mid.neg(),
            rad: self.rad,
            prec: self.prec,
        }
    }

    pub fn mul_2exp(&self, e: i64) -> RealBall {
        RealBall {
            mid: self.mid.mul_2exp(e),
            rad: self.rad.mul_2exp(e),
            prec: self.prec,
        }
    }

    fn add_signed(&self, other: &RealBall, negate: bool) -> RealBall {
        let prec = self.prec.max(other.prec);
        if !self.is_finite() || !other.is_finite() {
            return RealBall::indeterminate(prec);
        }
        let b = if negate {
            other.mid.neg()
        } else {
            other.mid.clone()
        };
        let rad = self.rad.add(other.rad);
        if self.mid.is_zero() {
            return RealBall::new(b, rad, prec);
        }
        if b.is_zero() {
            return RealBall::new(self.mid.clone(), rad, prec);
        }
        let (ta, tb) = (self.mid.top(), b.top());
        let gap = prec as i64 + 8;
        if ta > tb + gap {
            RealBall::new(self.mid.clone(), rad.add(b.abs_upper()), prec)
        } else if tb > ta + gap {
            RealBall::new(b, rad.add(self.mid.abs_upper()), prec)
        } else {
            RealBall::new(self.mid.add(&b), rad, prec)
        }
    }

    fn add_ball(&self, other: &RealBall) -> RealBall {
        self.add_signed(other, false)
    }

    fn sub_ball(&self, other: &RealBall) -> RealBall {
        self.add_signed(other, true)
    }

    fn mul_ball(&self, other: &RealBall) -> RealBall {
        let prec = self.prec.max(other.prec);
        if !self.is_finite() || !other.is_finite() {
            return RealBall::indeterminate(prec);
        }
        let rad = self
            .mid
            .abs_upper()
            .mul(other.rad)
            .add(other.mid.abs_upper().mul(self.rad))
            .add(self.rad.mul(other.rad));
        RealBall::new(self.mid.mul(&other.mid), rad, prec)
    }

    fn div_ball(&self, other: &RealBall) -> RealBall {
        let prec = self.prec.max(other.prec);
        let mb_low = other.mid.abs_lower();
        let denom_low = mb_low.sub_lower(other.rad);
        if !self.is_finite() || denom_low.is_zero() {
            return RealBall::indeterminate(prec);
        }
        let (mid, err) = self.mid.div_round(&other.mid, prec);
        let num = self
            .mid
            .abs_upper()
            .mul(other.rad)
            .add(self.rad.mul(other.mid.abs_upper()));
        let rad = num.div(mb_low.mul_lower(denom_low)).add(err);
        RealBall { mid, rad, prec }
    }

    pub fn sqr(&self) -> RealBall {
        self.mul_ball(self)
    }

    pub fn inv(&self) -> RealBall {
        RealBall::from_i64(1, self.prec).div_ball(self)
    }
}

macro_rules! ball_binop {
    ($t:ty, $tr:ident, $method:ident, $body:path) => {
        impl std::ops::$tr<&$t> for &$t {
            type Output = $t;
            fn $method(self, rhs: &$t) -> $t {
                $body(self, rhs)
            }
        }
        impl std::ops::$tr<$t> for $t {
            type Output = $t;
            fn $method(self, rhs: $t) -> $t {
                $body(&self, &rhs)
            }
        }
        impl std::ops::$tr<&$t> for $t {
            type Output = $t;
            fn $method(self, rhs: &$t) -> $t {
                $body(&self, rhs)
            }
        }
        impl std::ops::$tr<$t> for &$t {
            type Output = $t;
            fn $method(self, rhs: $t) -> $t {
                $body(self, &rhs)
            }
        }
    };
}
pub(crate) use ball_binop;

ball_binop!(RealBall, Add, add, RealBall::add_ball);
ball_binop!(RealBall, Sub, sub, RealBall::sub_ball);
ball_binop!(RealBall, Mul, mul, RealBall::mul_ball);
ball_binop!(RealBall, Div, div, RealBall::div_ball);

impl std::ops::Neg for RealBall {
    type Output = RealBall;
    fn neg(self) -> RealBall {
        RealBall::neg(&self)
    }
}

impl std::ops::Neg for &RealBall {
    type Output = RealBall;
    fn neg(self) -> RealBall {
        RealBall::neg(self)
    }
}

impl fmt::Display for RealBall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.rad.is_zero() {
            write!(f, "{}", self.mid.to_f64())
        } else {
            write!(f, "[{:e} +/- {}]", self.mid.to_f64(), self.rad)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_bigint::BigInt;

    fn contains_rational(ball: &RealBall, q: &BigRational) -> bool {
        let (lo, hi) = ball.endpoints().unwrap();
        &lo.to_rational() <= q && q <= &hi.to_rational()
    }

    fn q(n: i64, d: i64) -> BigRational {
        BigRational::new(BigInt::from(n), BigInt::from(d))
    }

    #[test]
    fn rational_arithmetic_is_enclosed() {
        let third = RealBall::from_rational(&q(1, 3), 80);
        let seventh = RealBall::from_rational(&q(1, 7), 80);
        assert!(contains_rational(&(&third + &seventh), &q(10, 21)));
        assert!(contains_rational(&(&third - &seventh), &q(4, 21)));
        assert!(contains_rational(&(&third * &seventh), &q(1, 21)));
        assert!(contains_rational(&(&third / &seventh), &q(7, 3)));
        assert!((&third * &seventh).rad().log2() < -75.0);
    }

    #[test]
    fn precision_is_the_larger_one() {
        let a = RealBall::from_i64(3, 32);
        let b = RealBall::from_i64(5, 200);
        assert_eq!((&a / &b).prec(), 200);
        assert!((&a / &b).rad().log2() < -195.0);
    }

    #[test]
    fn negligible_terms_are_absorbed_into_the_radius() {
        let one = RealBall::from_i64(1, 64);
        let tiny = RealBall::from_dyadic(Dyadic::new(BigInt::from(1), -10000), 64);
        let s = &one + &tiny;
        assert!(s.rad() > Mag::ZERO);
        assert!(s.rad().log2() < -9000.0);
        assert_eq!(s.mid(), one.mid());
    }

    #[test]
    fn division_by_a_ball_around_zero_is_indeterminate() {
        let z = RealBall::from_i64(0, 64).add_error(Mag::from_f64(0.5));
        let r = RealBall::from_i64(1, 64) / z;
        assert!(!r.is_finite());
        assert!((r + RealBall::from_i64(1, 64)).contains_zero());
    }

    #[test]
    fn sign_and_containment_queries() {
        let b = RealBall::from_f64(2.0, 64).add_error(Mag::from_f64(0.5));
        assert!(b.is_positive());
        assert!(!b.neg().is_positive() && b.neg().is_negative());
        assert!(b.contains(&RealBall::from_f64(2.25, 64)));
        assert!(!b.contains(&RealBall::from_f64(2.75, 64)));
        assert!(b.overlaps(&RealBall::from_f64(2.75, 64).add_error(Mag::from_f64(0.5))));
    }
}
