//! Exact Gaussian rationals and conversions between them and balls.

use num_bigint::BigInt;
use num_complex::{Complex, Complex64};
use num_rational::BigRational;
use num_traits::{One, Signed, ToPrimitive, Zero};

use crate::ball::{ComplexBall, RealBall};

/// Elements of `Q(i)`.
pub type QQi = Complex<BigRational>;

pub fn rat(n: i64, d: i64) -> BigRational {
    BigRational::new(BigInt::from(n), BigInt::from(d))
}

pub fn qqi_int(n: i64) -> QQi {
    QQi::new(BigRational::from_integer(BigInt::from(n)), BigRational::zero())
}

pub fn qqi_ratio(n: i64, d: i64) -> QQi {
    QQi::new(rat(n, d), BigRational::zero())
}

pub fn qqi_gauss(re: BigRational, im: BigRational) -> QQi {
    QQi::new(re, im)
}

/// The integer value of `z`, if it is a (small) integer.
pub fn as_integer(z: &QQi) -> Option<i64> {
    if z.im.is_zero() && z.re.is_integer() {
        z.re.to_integer().to_i64()
    } else {
        None
    }
}

pub fn to_complex64(z: &QQi) -> Complex64 {
    Complex64::new(
        z.re.to_f64().unwrap_or(f64::NAN),
        z.im.to_f64().unwrap_or(f64::NAN),
    )
}

/// Bit size of the largest numerator or denominator of `z`.
pub fn height_bits(z: &QQi) -> u64 {
    [z.re.numer(), z.re.denom(), z.im.numer(), z.im.denom()]
        .iter()
        .map(|n| n.bits())
        .max()
        .unwrap_or(0)
}

/// `|z|^2` as a rational.
pub fn norm_sqr(z: &QQi) -> BigRational {
    &z.re * &z.re + &z.im * &z.im
}

/// Exact midpoint of a ball.
pub fn ball_midpoint(b: &ComplexBall) -> QQi {
    QQi::new(b.re().mid().to_rational(), b.im().mid().to_rational())
}

/// Rational of least denominator (then least absolute numerator) in `[lo, hi]`.
pub fn simplest_rational_in(lo: &BigRational, hi: &BigRational) -> BigRational {
    if lo > hi {
        return simplest_rational_in(hi, lo);
    }
    if !lo.is_positive() && !hi.is_negative() {
        return BigRational::zero();
    }
    if hi.is_negative() {
        return -simplest_positive(&-hi, &-lo);
    }
    simplest_positive(lo, hi)
}

/// Continued fraction walk, `0 < lo <= hi`.
fn simplest_positive(lo: &BigRational, hi: &BigRational) -> BigRational {
    let mut quotients = Vec::new();
    let (mut lo, mut hi) = (lo.clone(), hi.clone());
    loop {
        let c = lo.ceil();
        if c <= hi {
            quotients.push(c);
            break;
        }
        let fl = lo.floor();
        let next_lo = (&hi - &fl).recip();
        let next_hi = (&lo - &fl).recip();
        quotients.push(fl);
        lo = next_lo;
        hi = next_hi;
    }
    let mut value = quotients.pop().unwrap_or_else(BigRational::zero);
    while let Some(q) = quotients.pop() {
        value = q + value.recip();
    }
    value
}

fn simplest_in_ball(b: &RealBall) -> Option<BigRational> {
    let (lo, hi) = b.endpoints()?;
    Some(simplest_rational_in(&lo.to_rational(), &hi.to_rational()))
}

/// Simplest Gaussian rational inside the rectangle `b`; `None` if `b` is not finite.
pub fn rationalize(b: &ComplexBall) -> Option<QQi> {
    Some(QQi::new(simplest_in_ball(b.re())?, simplest_in_ball(b.im())?))
}

/// Simplest Gaussian rational within `tol` of `z` in each component.
pub fn rationalize_near(z: &QQi, tol: &BigRational) -> QQi {
    QQi::new(
        simplest_rational_in(&(&z.re - tol), &(&z.re + tol)),
        simplest_rational_in(&(&z.im - tol), &(&z.im + tol)),
    )
}

/// `1/2`, `-3*I`, `1/2 + 3*I`.
pub fn format_qqi(z: &QQi) -> String {
    let imag = |v: &BigRational| {
        if v.is_one() {
            "I".to_string()
        } else {
            format!("{v}*I")
        }
    };
    if z.im.is_zero() {
        z.re.to_string()
    } else if z.re.is_zero() {
        if (-&z.im).is_one() {
            "-I".to_string()
        } else {
            imag(&z.im)
        }
    } else if z.im.is_negative() {
        format!("{} - {}", z.re, imag(&-&z.im))
    } else {
        format!("{} + {}", z.re, imag(&z.im))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ball::Mag;
    use crate::traits::Enclose;

    #[test]
    fn simplest_rationals() {
        assert_eq!(simplest_rational_in(&rat(1, 3), &rat(1, 2)), rat(1, 2));
        assert_eq!(simplest_rational_in(&rat(3, 10), &rat(4, 10)), rat(1, 3));
        assert_eq!(simplest_rational_in(&rat(-1, 5), &rat(7, 3)), rat(0, 1));
        assert_eq!(simplest_rational_in(&rat(-7, 10), &rat(-6, 10)), rat(-2, 3));
        assert_eq!(simplest_rational_in(&rat(5, 2), &rat(7, 2)), rat(3, 1));
        assert_eq!(simplest_rational_in(&rat(314, 100), &rat(315, 100)), rat(22, 7));
    }

    #[test]
    fn rationalize_recovers_small_fractions() {
        let z = QQi::new(rat(2, 7), rat(-5, 3));
        let b = z.enclose(100).add_error(Mag::pow2(-60));
        assert_eq!(rationalize(&b), Some(z));
    }

    #[test]
    fn rationalize_near_stays_within_tolerance() {
        let z = QQi::new(rat(123456789, 1000000007), rat(1, 1));
        let tol = rat(1, 1000);
        let w = rationalize_near(&z, &tol);
        assert!((&w.re - &z.re).abs() <= tol);
        assert!(height_bits(&w) < height_bits(&z));
    }

    #[test]
    fn integer_detection_and_formatting() {
        assert_eq!(as_integer(&qqi_int(-4)), Some(-4));
        assert_eq!(as_integer(&qqi_ratio(1, 2)), None);
        assert_eq!(format_qqi(&qqi_ratio(1, 2)), "1/2");
        assert_eq!(format_qqi(&QQi::new(rat(1, 2), rat(3, 1))), "1/2 + 3*I");
        assert_eq!(format_qqi(&QQi::new(rat(0, 1), rat(-1, 1))), "-I");
        assert_eq!(format_qqi(&QQi::new(rat(1, 1), rat(-2, 1))), "1 - 2*I");
    }
}
