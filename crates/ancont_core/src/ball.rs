//! Ball arithmetic: certified enclosures of real and complex numbers.
//!
//! Balls carry their own working precision; the result of an operation is
//! rounded to the larger precision of its operands, with every rounding
//! error folded into the radius.

pub mod complex;
pub mod dyadic;
mod elementary;
pub mod mag;
pub mod real;

pub use complex::ComplexBall;
pub use dyadic::Dyadic;
pub use elementary::{ln2, pi};
pub use mag::Mag;
pub use real::{RealBall, DEFAULT_PREC};
