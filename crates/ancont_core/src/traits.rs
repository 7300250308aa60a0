use num_bigint::BigInt;
use num_rational::BigRational;
use num_traits::{One, Zero};
use std::fmt::Debug;
use std::ops::{Add, Mul, Neg, Sub};

use crate::ball::{ComplexBall, DEFAULT_PREC};
use crate::exact::QQi;

/// Coefficient rings for polynomials and recurrences.
/// Implemented by the exact Gaussian rationals and by complex balls.
pub trait Ring:
    Clone
    + Debug
    + PartialEq
    + Zero
    + One
    + Add<Output = Self>
    + Sub<Output = Self>
    + Mul<Output = Self>
    + Neg<Output = Self>
    + 'static
{
    fn from_i64(n: i64) -> Self;
}

impl Ring for QQi {
    fn from_i64(n: i64) -> Self {
        QQi::new(
            BigRational::from_integer(BigInt::from(n)),
            BigRational::zero(),
        )
    }
}

impl Ring for ComplexBall {
    fn from_i64(n: i64) -> Self {
        ComplexBall::from_i64(n, DEFAULT_PREC)
    }
}

/// Exact scalar types that can be enclosed in a ball at any precision.
pub trait Enclose {
    fn enclose(&self, prec: u32) -> ComplexBall;
}

impl Enclose for QQi {
    fn enclose(&self, prec: u32) -> ComplexBall {
        ComplexBall::from_rationals(&self.re, &self.im, prec)
    }
}

impl Enclose for ComplexBall {
    fn enclose(&self, prec: u32) -> ComplexBall {
        self.set_prec(prec)
    }
}
