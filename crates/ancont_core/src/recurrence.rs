//! Backward-shift recurrences `Σ_i b_i(n) u_{n−i} = 0`.

use crate::ball::ComplexBall;
use crate::exact::QQi;
use crate::poly::Polynomial;
use crate::traits::Ring;

/// `coeffs[i] = b_i`; `b_0` is the indicial polynomial.
#[derive(Clone, Debug, PartialEq)]
pub struct BwShiftRec<T: Ring> {
    coeffs: Vec<Polynomial<T>>,
}

impl<T: Ring> BwShiftRec<T> {
    pub fn new(coeffs: Vec<Polynomial<T>>) -> Self {
        let mut coeffs = coeffs;
        if coeffs.is_empty() {
            coeffs.push(Polynomial::zero());
        }
        Self { coeffs }
    }

    pub fn order(&self) -> usize {
        self.coeffs.len() - 1
    }

    pub fn coeffs(&self) -> &[Polynomial<T>] {
        &self.coeffs
    }

    pub fn indicial(&self) -> &Polynomial<T> {
        &self.coeffs[0]
    }

    /// The recurrence satisfied by `v_n = u_{n+λ}`: every `b_i(x)` becomes `b_i(x + λ)`.
    pub fn shift(&self, lambda: &T) -> Self {
        Self {
            coeffs: self.coeffs.iter().map(|b| b.taylor_shift(lambda)).collect(),
        }
    }

    pub fn eval(&self, n: &T) -> Vec<T> {
        self.coeffs.iter().map(|b| b.eval(n)).collect()
    }

    /// `out[i][j]`: coefficient of `η^j` in `b_i(n + η)`, for `j < ord`.
    pub fn eval_series(&self, n: &T, ord: usize) -> Vec<Vec<T>> {
        self.coeffs.iter().map(|b| b.eval_jet(n, ord)).collect()
    }

    /// Largest degree of the coefficients.
    pub fn degree(&self) -> usize {
        self.coeffs
            .iter()
            .filter_map(|b| b.degree())
            .max()
            .unwrap_or(0)
    }
}

impl BwShiftRec<QQi> {
    pub fn to_balls(&self, prec: u32) -> BwShiftRec<ComplexBall> {
        BwShiftRec {
            coeffs: self.coeffs.iter().map(|b| b.to_balls(prec)).collect(),
        }
    }

    /// Shift by an inexact exponent; the result lives over balls.
    pub fn shift_ball(&self, lambda: &ComplexBall) -> BwShiftRec<ComplexBall> {
        self.to_balls(lambda.prec()).shift(lambda)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exact::qqi_int;

    fn rec() -> BwShiftRec<QQi> {
        // n^2 u_n - (n + 1) u_{n-1} = 0
        BwShiftRec::new(vec![
            Polynomial::from_ints(&[0, 0, 1]),
            Polynomial::from_ints(&[-1, -1]),
        ])
    }

    #[test]
    fn evaluation_and_shift() {
        let r = rec();
        assert_eq!(r.order(), 1);
        assert_eq!(r.eval(&qqi_int(3)), vec![qqi_int(9), qqi_int(-4)]);
        let s = r.shift(&qqi_int(2));
        assert_eq!(s.eval(&qqi_int(1)), r.eval(&qqi_int(3)));
    }

    #[test]
    fn series_evaluation_gives_taylor_coefficients() {
        let series = rec().eval_series(&qqi_int(3), 3);
        // (3 + η)^2 = 9 + 6η + η^2
        assert_eq!(series[0], vec![qqi_int(9), qqi_int(6), qqi_int(1)]);
        assert_eq!(series[1], vec![qqi_int(-4), qqi_int(-1), qqi_int(0)]);
    }

    #[test]
    fn ball_shift_encloses_exact_shift() {
        let r = rec();
        let lambda = ComplexBall::from_f64(0.5, 0.0, 80);
        let b = r.shift_ball(&lambda);
        let exact = r.shift(&crate::exact::qqi_ratio(1, 2));
        let at = ComplexBall::from_i64(4, 80);
        for (x, y) in b.eval(&at).iter().zip(exact.to_balls(80).eval(&at)) {
            assert!(x.overlaps(&y));
        }
    }
}
