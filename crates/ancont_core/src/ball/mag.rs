//! Magnitude bounds: non-negative reals stored as `man · 2^exp` with an
//! unbounded exponent, rounded in a chosen direction.
//!
//! Every operation comes in an upper-bound flavour (the default) and, where
//! needed, a `_lower` flavour. Inputs of an upper-bound operation are read as
//! upper bounds, except for divisors and subtrahends, which are read as lower
//! bounds.

use std::cmp::Ordering;
use std::fmt;

const PAD_UP: f64 = 1.0 + 4.0 * f64::EPSILON;
const PAD_DOWN: f64 = 1.0 - 4.0 * f64::EPSILON;
/// Beyond this exponent gap the smaller operand of a sum is below one ulp.
const ALIGN_LIMIT: i64 = 60;

/// `man · 2^exp` with `man ∈ [1/2, 1)`; zero has `man == 0`, infinity `man == ∞`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Mag {
    man: f64,
    exp: i64,
}

/// Splits a finite positive `x` into `(m, e)` with `x = m · 2^e`, `m ∈ [1/2, 1)`.
fn frexp(x: f64) -> (f64, i64) {
    let bits = x.to_bits();
    let biased = ((bits >> 52) & 0x7ff) as i64;
    if biased == 0 {
        let (m, e) = frexp(x * 2f64.powi(64));
        return (m, e - 64);
    }
    let m = f64::from_bits((bits & !(0x7ffu64 << 52)) | (1022u64 << 52));
    (m, biased - 1022)
}

/// `x · 2^e`, saturating to zero or infinity.
pub(crate) fn ldexp(mut x: f64, mut e: i64) -> f64 {
    if x == 0.0 || !x.is_finite() {
        return x;
    }
    while e > 1000 {
        x *= 2f64.powi(1000);
        e -= 1000;
        if x.is_infinite() {
            return x;
        }
    }
    while e < -1000 {
        x *= 2f64.powi(-1000);
        e += 1000;
        if x == 0.0 {
            return x;
        }
    }
    x * 2f64.powi(e as i32)
}

impl Mag {
    pub const ZERO: Mag = Mag { man: 0.0, exp: 0 };
    pub const INF: Mag = Mag {
        man: f64::INFINITY,
        exp: 0,
    };

    fn from_parts(man: f64, exp: i64) -> Mag {
        if man == 0.0 {
            Mag::ZERO
        } else if !man.is_finite() {
            Mag::INF
        } else {
            let (m, e) = frexp(man);
            Mag {
                man: m,
                exp: exp.saturating_add(e),
            }
        }
    }

    pub fn zero() -> Mag {
        Mag::ZERO
    }

    pub fn inf() -> Mag {
        Mag::INF
    }

    pub fn one() -> Mag {
        Mag::from_parts(1.0, 0)
    }

    /// Exact conversion of `|x|`; NaN maps to infinity.
    pub fn from_f64(x: f64) -> Mag {
        if x.is_nan() {
            return Mag::INF;
        }
        Mag::from_parts(x.abs(), 0)
    }

    /// Approximately `m · 10^e10`, for user-facing tolerances such as `1e-9999`.
    pub fn from_decimal(m: f64, e10: i64) -> Mag {
        if m == 0.0 {
            return Mag::ZERO;
        }
        let l2 = m.abs().log2() + e10 as f64 * std::f64::consts::LOG2_10;
        let k = l2.floor();
        Mag::from_parts(2f64.powf(l2 - k), k as i64)
    }

    /// Exactly `2^e`.
    pub fn pow2(e: i64) -> Mag {
        Mag {
            man: 0.5,
            exp: e.saturating_add(1),
        }
    }

    pub fn is_zero(&self) -> bool {
        self.man == 0.0
    }

    pub fn is_finite(&self) -> bool {
        self.man.is_finite()
    }

    pub(crate) fn mantissa(&self) -> f64 {
        self.man
    }

    /// Smallest `e` with `self < 2^e` (for non-zero finite values).
    pub fn exponent(&self) -> i64 {
        self.exp
    }

    /// Nearest `f64`, saturating.
    pub fn to_f64(&self) -> f64 {
        if !self.is_finite() {
            return f64::INFINITY;
        }
        ldexp(self.man, self.exp)
    }

    /// An `f64` not smaller than the value.
    pub fn to_f64_upper(&self) -> f64 {
        let v = self.to_f64();
        if v == 0.0 && !self.is_zero() {
            f64::MIN_POSITIVE
        } else {
            v * PAD_UP
        }
    }

    /// An `f64` not larger than the value.
    pub fn to_f64_lower(&self) -> f64 {
        self.to_f64() * PAD_DOWN
    }

    /// Approximate base-2 logarithm.
    pub fn log2(&self) -> f64 {
        if self.is_zero() {
            f64::NEG_INFINITY
        } else if !self.is_finite() {
            f64::INFINITY
        } else {
            self.exp as f64 + self.man.log2()
        }
    }

    pub fn mul_2exp(self, e: i64) -> Mag {
        if self.is_zero() || !self.is_finite() {
            self
        } else {
            Mag {
                man: self.man,
                exp: self.exp.saturating_add(e),
            }
        }
    }

    pub fn mul(self, other: Mag) -> Mag {
        if self.is_zero() || other.is_zero() {
            return Mag::ZERO;
        }
        if !self.is_finite() || !other.is_finite() {
            return Mag::INF;
        }
        Mag::from_parts(self.man * other.man * PAD_UP, self.exp + other.exp)
    }

    pub fn mul_lower(self, other: Mag) -> Mag {
        if self.is_zero() || other.is_zero() {
            return Mag::ZERO;
        }
        if !self.is_finite() || !other.is_finite() {
            return Mag::INF;
        }
        Mag::from_parts(self.man * other.man * PAD_DOWN, self.exp + other.exp)
    }

    pub fn mul_f64(self, x: f64) -> Mag {
        self.mul(Mag::from_f64(x))
    }

    pub fn add(self, other: Mag) -> Mag {
        if self.is_zero() {
            return other;
        }
        if other.is_zero() {
            return self;
        }
        if !self.is_finite() || !other.is_finite() {
            return Mag::INF;
        }
        let (a, b) = if self.exp >= other.exp {
            (self, other)
        } else {
            (other, self)
        };
        let diff = a.exp - b.exp;
        let small = if diff > ALIGN_LIMIT {
            ldexp(1.0, -ALIGN_LIMIT)
        } else {
            ldexp(b.man, -diff)
        };
        Mag::from_parts((a.man + small) * PAD_UP, a.exp)
    }

    pub fn add_lower(self, other: Mag) -> Mag {
        if self.is_zero() {
            return other;
        }
        if other.is_zero() {
            return self;
        }
        if !self.is_finite() || !other.is_finite() {
            return Mag::INF;
        }
        let (a, b) = if self.exp >= other.exp {
            (self, other)
        } else {
            (other, self)
        };
        let diff = a.exp - b.exp;
        let small = if diff > ALIGN_LIMIT {
            0.0
        } else {
            ldexp(b.man, -diff)
        };
        Mag::from_parts((a.man + small) * PAD_DOWN, a.exp)
    }

    /// Lower bound of `max(self - other, 0)`.
    pub fn sub_lower(self, other: Mag) -> Mag {
        if other.is_zero() {
            return self;
        }
        if !other.is_finite() || other >= self {
            return Mag::ZERO;
        }
        if !self.is_finite() {
            return Mag::INF;
        }
        let diff = self.exp - other.exp;
        let small = if diff > ALIGN_LIMIT {
            ldexp(1.0, -ALIGN_LIMIT)
        } else {
            ldexp(other.man, -diff)
        };
        let m = (self.man - small) * PAD_DOWN;
        if m <= 0.0 {
            Mag::ZERO
        } else {
            Mag::from_parts(m, self.exp)
        }
    }

    /// Upper bound of `self / other`, `other` read as a lower bound.
    pub fn div(self, other: Mag) -> Mag {
        if self.is_zero() {
            return Mag::ZERO;
        }
        if other.is_zero() || !self.is_finite() {
            return Mag::INF;
        }
        if !other.is_finite() {
            return Mag::ZERO;
        }
        Mag::from_parts(self.man / other.man * PAD_UP, self.exp - other.exp)
    }

    /// Lower bound of `self / other`, `other` read as an upper bound.
    pub fn div_lower(self, other: Mag) -> Mag {
        if self.is_zero() || !other.is_finite() {
            return Mag::ZERO;
        }
        if other.is_zero() || !self.is_finite() {
            return Mag::INF;
        }
        Mag::from_parts(self.man / other.man * PAD_DOWN, self.exp - other.exp)
    }

    pub fn pow(self, n: u64) -> Mag {
        self.pow_with(n, Mag::mul)
    }

    pub fn pow_lower(self, n: u64) -> Mag {
        self.pow_with(n, Mag::mul_lower)
    }

    fn pow_with(self, mut n: u64, mul: fn(Mag, Mag) -> Mag) -> Mag {
        let mut acc = Mag::one();
        let mut base = self;
        while n > 0 {
            if n & 1 == 1 {
                acc = mul(acc, base);
            }
            n >>= 1;
            if n > 0 {
                base = mul(base, base);
            }
        }
        acc
    }

    pub fn sqrt(self) -> Mag {
        self.sqrt_with(PAD_UP)
    }

    pub fn sqrt_lower(self) -> Mag {
        self.sqrt_with(PAD_DOWN)
    }

    fn sqrt_with(self, pad: f64) -> Mag {
        if self.is_zero() || !self.is_finite() {
            return self;
        }
        let half = self.exp.div_euclid(2);
        let m = if self.exp.rem_euclid(2) == 0 {
            self.man
        } else {
            self.man * 2.0
        };
        Mag::from_parts(m.sqrt() * pad, half)
    }

    /// Upper bound of `e^self`.
    pub fn exp_upper(self) -> Mag {
        if !self.is_finite() {
            return Mag::INF;
        }
        let v = self.to_f64_upper();
        if v < 700.0 {
            return Mag::from_parts(v.exp() * PAD_UP * PAD_UP, 0);
        }
        let t = v * std::f64::consts::LOG2_E * PAD_UP;
        if t > 1e18 {
            Mag::INF
        } else {
            Mag::pow2(t.ceil() as i64)
        }
    }

    pub fn max(self, other: Mag) -> Mag {
        if self >= other {
            self
        } else {
            other
        }
    }

    pub fn min(self, other: Mag) -> Mag {
        if self <= other {
            self
        } else {
            other
        }
    }
}

impl PartialOrd for Mag {
    fn partial_cmp(&self, other: &Mag) -> Option<Ordering> {
        let rank = |m: &Mag| {
            if m.is_zero() {
                0
            } else if m.is_finite() {
                1
            } else {
                2
            }
        };
        match (rank(self), rank(other)) {
            (1, 1) => Some(
                self.exp
                    .cmp(&other.exp)
                    .then(self.man.partial_cmp(&other.man).unwrap_or(Ordering::Equal)),
            ),
            (a, b) => Some(a.cmp(&b)),
        }
    }
}

impl fmt::Display for Mag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_zero() {
            return write!(f, "0");
        }
        if !self.is_finite() {
            return write!(f, "+inf");
        }
        let l10 = self.log2() * std::f64::consts::LOG10_2;
        let e = l10.floor();
        write!(f, "{:.3}e{}", 10f64.powf(l10 - e), e as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_f64_is_exact() {
        for x in [1.0, 0.75, 3.0e-300, 1.0e300, 5.0e-320] {
            assert_eq!(Mag::from_f64(x).to_f64(), x);
        }
        assert!(Mag::from_f64(0.0).is_zero());
    }

    #[test]
    fn arithmetic_rounds_outward() {
        let third = Mag::from_f64(1.0 / 3.0);
        let three = Mag::from_f64(3.0);
        assert!(third.mul(three).to_f64() >= 1.0);
        assert!(third.mul_lower(three).to_f64() <= 1.0);
        assert!(Mag::one().div(three).to_f64() >= 1.0 / 3.0);
        assert!(Mag::one().div_lower(three).to_f64() <= 1.0 / 3.0);
        let a = Mag::from_f64(0.1).add(Mag::from_f64(0.2));
        assert!(a.to_f64() >= 0.1 + 0.2);
    }

    #[test]
    fn huge_and_tiny_exponents_survive() {
        let tiny = Mag::pow2(-40000);
        let also_tiny = tiny.mul(Mag::from_f64(3.0));
        assert!(also_tiny > tiny);
        assert!(also_tiny.log2() > -40000.0 && also_tiny.log2() < -39997.0);
        assert_eq!(tiny.to_f64(), 0.0);
        let eps = Mag::from_decimal(1.0, -9999);
        assert!((eps.log2() + 9999.0 * std::f64::consts::LOG2_10).abs() < 1e-6);
    }

    #[test]
    fn sums_with_negligible_terms_stay_upper_bounds() {
        let big = Mag::one();
        let small = Mag::pow2(-500);
        assert!(big.add(small) > big);
        assert!(big.add_lower(small) <= big.add(small));
        assert_eq!(big.add_lower(Mag::ZERO), big);
        assert!(big.sub_lower(small) < big);
        assert!(small.sub_lower(big).is_zero());
    }

    #[test]
    fn powers_square_roots_and_exponentials() {
        let two = Mag::from_f64(2.0);
        assert!(two.pow(10).to_f64() >= 1024.0);
        assert!(two.pow_lower(10).to_f64() <= 1024.0);
        assert!(Mag::from_f64(8.0).sqrt().to_f64() >= 8f64.sqrt());
        assert!(Mag::one().exp_upper().to_f64() >= std::f64::consts::E);
        assert!(Mag::from_f64(2000.0).exp_upper().log2() >= 2000.0 * std::f64::consts::LOG2_E);
        assert!(!Mag::INF.exp_upper().is_finite());
    }

    #[test]
    fn ordering_handles_special_values() {
        assert!(Mag::ZERO < Mag::pow2(-100000));
        assert!(Mag::pow2(100000) < Mag::INF);
        assert!(Mag::from_f64(0.75) > Mag::from_f64(0.5));
        assert_eq!(Mag::from_f64(0.75).max(Mag::ZERO), Mag::from_f64(0.75));
    }
}
