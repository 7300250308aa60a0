//! Target accuracies and the stopping criterion of series summation.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ball::{ComplexBall, Mag};
use crate::error::{Error, Result};

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum Accuracy {
    Absolute(f64),
    Relative(f64),
}

impl Accuracy {
    pub fn eps(&self) -> Mag {
        match *self {
            Accuracy::Absolute(e) | Accuracy::Relative(e) => Mag::from_f64(e.abs()),
        }
    }
}

impl fmt::Display for Accuracy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Accuracy::Absolute(e) => write!(f, "absolute error < {e:e}"),
            Accuracy::Relative(e) => write!(f, "relative error < {e:e}"),
        }
    }
}

/// When a partial sum is close enough to its limit.
///
/// `precise` records whether the inputs were accurate enough for the target
/// to be reachable at all; when it holds, a partial sum whose own radius
/// exceeds the target means that the working precision is too low.
#[derive(Clone, Copy, Debug)]
pub struct StoppingCriterion {
    pub eps: Mag,
    pub relative: bool,
    pub precise: bool,
}

impl StoppingCriterion {
    pub fn new(target: Accuracy, precise: bool) -> Self {
        Self {
            eps: target.eps(),
            relative: matches!(target, Accuracy::Relative(_)),
            precise,
        }
    }

    /// `err` bounds the neglected part, `sum` is the current partial sum.
    pub fn reached(&self, err: Mag, sum: &ComplexBall) -> Result<bool> {
        let eps = if self.relative {
            self.eps.mul_lower(sum.abs_lower())
        } else {
            self.eps
        };
        if self.precise && sum.rad() > self.eps {
            return Err(Error::precision(format!(
                "partial sum radius {} exceeds the target {}",
                sum.rad(),
                self.eps
            )));
        }
        Ok(err <= eps)
    }
}

impl fmt::Display for StoppingCriterion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = if self.relative { "relative" } else { "absolute" };
        write!(f, "{kind} error < {}", self.eps)?;
        if !self.precise {
            write!(f, " (imprecise input)")?;
        }
        Ok(())
    }
}

/// Number of bits needed to represent numbers to within `eps`.
pub fn prec_from_eps(eps: Mag) -> u32 {
    if eps.is_zero() {
        return 4096;
    }
    let bits = -eps.log2();
    (bits.ceil().max(0.0) as u32).saturating_add(4).max(8)
}

/// Starting working precision of a summation targeting `eps`.
pub fn working_prec(eps: Mag) -> u32 {
    let p = prec_from_eps(eps);
    p + 3 * (u32::BITS - p.leading_zeros())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn precision_from_tolerance() {
        assert_eq!(prec_from_eps(Mag::from_f64(0.5)), 8);
        assert!(prec_from_eps(Mag::from_f64(1e-16)) >= 53);
        assert!(prec_from_eps(Mag::from_decimal(1.0, -9999)) > 33000);
        let p = prec_from_eps(Mag::from_f64(1e-30));
        assert!(working_prec(Mag::from_f64(1e-30)) > p);
    }

    #[test]
    fn absolute_criterion() {
        let crit = StoppingCriterion::new(Accuracy::Absolute(1e-10), true);
        let sum = ComplexBall::from_f64(1.0, 0.0, 64);
        assert!(!crit.reached(Mag::from_f64(1e-9), &sum).unwrap());
        assert!(crit.reached(Mag::from_f64(1e-11), &sum).unwrap());
        let wide = sum.add_error(Mag::from_f64(1e-5));
        assert!(crit.reached(Mag::from_f64(1e-11), &wide).unwrap_err().is_retryable());
        // a wide partial sum is a precision failure however large the error
        assert!(crit.reached(Mag::from_f64(1e3), &wide).unwrap_err().is_retryable());
        let lax = StoppingCriterion::new(Accuracy::Absolute(1e-10), false);
        assert!(lax.reached(Mag::from_f64(1e-11), &wide).unwrap());
    }

    #[test]
    fn relative_criterion_scales_with_the_sum() {
        let crit = StoppingCriterion::new(Accuracy::Relative(1e-10), false);
        let big = ComplexBall::from_f64(1e6, 0.0, 64);
        assert!(crit.reached(Mag::from_f64(1e-5), &big).unwrap());
        let small = ComplexBall::from_f64(1e-6, 0.0, 64);
        assert!(!crit.reached(Mag::from_f64(1e-5), &small).unwrap());
    }
}
