//! Exact binary floating-point numbers `man · 2^exp` with a big-integer mantissa.

use std::cmp::Ordering;
use std::fmt;

use num_bigint::{BigInt, BigUint, Sign};
use num_rational::BigRational;
use num_traits::{Float, One, Signed, ToPrimitive, Zero};

use super::mag::{ldexp, Mag};

/// Normalized so that the mantissa is odd (or zero with `exp == 0`).
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Dyadic {
    man: BigInt,
    exp: i64,
}

/// `|man|` split as `[t, t + 1) · 2^shift` with `t < 2^53`; `exact` when the split loses nothing.
fn top_bits(man: &BigInt) -> (f64, i64, bool) {
    let mag: &BigUint = man.magnitude();
    let bits = mag.bits();
    let shift = bits.saturating_sub(53);
    let t = (mag >> shift).to_f64().unwrap_or(f64::INFINITY);
    let exact = shift == 0 || mag.trailing_zeros().unwrap_or(0) >= shift;
    (t, shift as i64, exact)
}

impl Dyadic {
    pub fn new(man: BigInt, exp: i64) -> Dyadic {
        if man.is_zero() {
            return Dyadic::zero();
        }
        let tz = man.trailing_zeros().unwrap_or(0);
        Dyadic {
            man: man >> tz,
            exp: exp + tz as i64,
        }
    }

    pub fn zero() -> Dyadic {
        Dyadic {
            man: BigInt::zero(),
            exp: 0,
        }
    }

    pub fn from_i64(n: i64) -> Dyadic {
        Dyadic::new(BigInt::from(n), 0)
    }

    pub fn from_bigint(n: BigInt) -> Dyadic {
        Dyadic::new(n, 0)
    }

    /// Exact conversion; `None` for infinities and NaN.
    pub fn from_f64(x: f64) -> Option<Dyadic> {
        if !x.is_finite() {
            return None;
        }
        let (m, e, sign) = x.integer_decode();
        let man = BigInt::from(m) * BigInt::from(sign);
        Some(Dyadic::new(man, e as i64))
    }

    /// Exact conversion of a finite magnitude.
    pub fn from_mag(m: &Mag) -> Option<Dyadic> {
        if m.is_zero() {
            return Some(Dyadic::zero());
        }
        if !m.is_finite() {
            return None;
        }
        // mantissa in [1/2, 1): scale it to an integer without loss
        let scaled = ldexp(m.mantissa(), 60);
        Dyadic::from_f64(scaled).map(|d| d.mul_2exp(m.exponent() - 60))
    }

    pub fn mantissa(&self) -> &BigInt {
        &self.man
    }

    pub fn exponent(&self) -> i64 {
        self.exp
    }

    pub fn is_zero(&self) -> bool {
        self.man.is_zero()
    }

    pub fn is_negative(&self) -> bool {
        self.man.sign() == Sign::Minus
    }

    pub fn bits(&self) -> u64 {
        self.man.bits()
    }

    /// Smallest `t` with `|self| < 2^t`; `i64::MIN` for zero.
    pub fn top(&self) -> i64 {
        if self.is_zero() {
            i64::MIN
        } else {
            self.exp + self.man.bits() as i64
        }
    }

    pub fn neg(&self) -> Dyadic {
        Dyadic {
            man: -&self.man,
            exp: self.exp,
        }
    }

    pub fn abs(&self) -> Dyadic {
        Dyadic {
            man: self.man.abs(),
            exp: self.exp,
        }
    }

    pub fn add(&self, other: &Dyadic) -> Dyadic {
        if self.is_zero() {
            return other.clone();
        }
        if other.is_zero() {
            return self.clone();
        }
        let e = self.exp.min(other.exp);
        let a = &self.man << ((self.exp - e) as usize);
        let b = &other.man << ((other.exp - e) as usize);
        Dyadic::new(a + b, e)
    }

    pub fn sub(&self, other: &Dyadic) -> Dyadic {
        self.add(&other.neg())
    }

    pub fn mul(&self, other: &Dyadic) -> Dyadic {
        if self.is_zero() || other.is_zero() {
            return Dyadic::zero();
        }
        Dyadic {
            man: &self.man * &other.man,
            exp: self.exp + other.exp,
        }
    }

    pub fn mul_2exp(&self, e: i64) -> Dyadic {
        if self.is_zero() {
            return Dyadic::zero();
        }
        Dyadic {
            man: self.man.clone(),
            exp: self.exp + e,
        }
    }

    pub fn abs_upper(&self) -> Mag {
        if self.is_zero() {
            return Mag::ZERO;
        }
        let (t, shift, exact) = top_bits(&self.man);
        let t = if exact { t } else { t + 1.0 };
        Mag::from_f64(t).mul_2exp(shift + self.exp)
    }

    pub fn abs_lower(&self) -> Mag {
        if self.is_zero() {
            return Mag::ZERO;
        }
        let (t, shift, _) = top_bits(&self.man);
        Mag::from_f64(t).mul_2exp(shift + self.exp)
    }

    pub fn to_f64(&self) -> f64 {
        if self.is_zero() {
            return 0.0;
        }
        let (t, shift, _) = top_bits(&self.man);
        let v = ldexp(t, shift + self.exp);
        if self.is_negative() {
            -v
        } else {
            v
        }
    }

    /// Truncates to `prec` significant bits; returns the result and the error bound.
    pub fn round(&self, prec: u32) -> (Dyadic, Mag) {
        let bits = self.man.bits();
        if bits <= prec as u64 {
            return (self.clone(), Mag::ZERO);
        }
        let shift = bits - prec as u64;
        let e = self.exp + shift as i64;
        (Dyadic::new(&self.man >> shift, e), Mag::pow2(e))
    }

    /// `self / other` rounded to `prec` bits, with the error bound. `other` must be non-zero.
    pub fn div_round(&self, other: &Dyadic, prec: u32) -> (Dyadic, Mag) {
        if self.is_zero() || other.is_zero() {
            return (Dyadic::zero(), Mag::ZERO);
        }
        let k = (prec as i64 + 2 + other.bits() as i64 - self.bits() as i64).max(0);
        let q = (&self.man << (k as usize)) / &other.man;
        let e = self.exp - other.exp - k;
        let (r, err) = Dyadic::new(q, e).round(prec);
        (r, err.add(Mag::pow2(e)))
    }

    pub fn from_rational(q: &BigRational, prec: u32) -> (Dyadic, Mag) {
        let num = Dyadic::from_bigint(q.numer().clone());
        if q.denom().is_one() {
            return num.round(prec);
        }
        num.div_round(&Dyadic::from_bigint(q.denom().clone()), prec)
    }

    pub fn to_rational(&self) -> BigRational {
        if self.exp >= 0 {
            BigRational::from_integer(&self.man << (self.exp as usize))
        } else {
            BigRational::new(
                self.man.clone(),
                BigInt::one() << ((-self.exp) as usize),
            )
        }
    }
}

impl PartialOrd for Dyadic {
    fn partial_cmp(&self, other: &Dyadic) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Dyadic {
    fn cmp(&self, other: &Dyadic) -> Ordering {
        match self.sub(other).man.sign() {
            Sign::Minus => Ordering::Less,
            Sign::NoSign => Ordering::Equal,
            Sign::Plus => Ordering::Greater,
        }
    }
}

impl fmt::Display for Dyadic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:e}", self.to_f64())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn q(n: i64, d: i64) -> BigRational {
        BigRational::new(BigInt::from(n), BigInt::from(d))
    }

    #[test]
    fn normalization_strips_trailing_zeros() {
        let a = Dyadic::new(BigInt::from(12), 0);
        assert_eq!(a, Dyadic::new(BigInt::from(3), 2));
        assert_eq!(Dyadic::from_f64(0.75), Some(Dyadic::new(BigInt::from(3), -2)));
        assert_eq!(Dyadic::from_f64(f64::NAN), None);
    }

    #[test]
    fn exact_ring_operations() {
        let a = Dyadic::from_f64(1.5).unwrap();
        let b = Dyadic::from_f64(-0.25).unwrap();
        assert_eq!(a.add(&b).to_f64(), 1.25);
        assert_eq!(a.sub(&b).to_f64(), 1.75);
        assert_eq!(a.mul(&b).to_f64(), -0.375);
        assert!(b < a);
        assert_eq!(a.to_rational(), q(3, 2));
    }

    #[test]
    fn rounding_reports_its_error() {
        let third = q(1, 3);
        let (d, err) = Dyadic::from_rational(&third, 64);
        let diff = (d.to_rational() - third).abs();
        assert!(diff <= Dyadic::from_mag(&err).unwrap().to_rational());
        assert!(err.log2() <= -63.0);
        assert!(d.bits() <= 64);
    }

    #[test]
    fn magnitude_bounds_bracket_the_value() {
        let big = Dyadic::new((BigInt::one() << 200usize) + BigInt::from(12345), -3);
        let up = big.abs_upper();
        let low = big.abs_lower();
        assert!(low <= up);
        assert!((up.log2() - 197.0).abs() < 1e-9);
        assert!(Dyadic::from_i64(5).abs_upper() == Mag::from_f64(5.0));
        assert_eq!(big.top(), 198);
    }

    #[test]
    fn magnitudes_convert_exactly() {
        let m = Mag::from_f64(0.375).mul_2exp(-5000);
        let d = Dyadic::from_mag(&m).unwrap();
        assert_eq!(d, Dyadic::new(BigInt::from(3), -5003));
    }
}
