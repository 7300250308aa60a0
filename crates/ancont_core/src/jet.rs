//! Truncated power series in one variable with ball coefficients.
//!
//! A jet of order `n` holds the first `n` Taylor coefficients of a function
//! at a point. Products are truncated to the shorter operand, so jets carry
//! derivatives forward the same way dual numbers carry a single one.

use crate::ball::ComplexBall;

#[derive(Clone, Debug, PartialEq)]
pub struct Jet {
    pub coeffs: Vec<ComplexBall>,
}

impl Jet {
    pub fn new(coeffs: Vec<ComplexBall>) -> Self {
        Self { coeffs }
    }

    pub fn constant(c: ComplexBall, order: usize) -> Self {
        let prec = c.prec();
        let mut coeffs = vec![ComplexBall::zero_at(prec); order.max(1)];
        coeffs[0] = c;
        Self { coeffs }
    }

    /// `pt + η`, truncated at `η^order`.
    pub fn variable(pt: &ComplexBall, order: usize) -> Self {
        let mut jet = Jet::constant(pt.clone(), order);
        if order > 1 {
            jet.coeffs[1] = ComplexBall::one_at(pt.prec());
        }
        jet
    }

    pub fn order(&self) -> usize {
        self.coeffs.len()
    }

    pub fn coeff(&self, k: usize) -> ComplexBall {
        self.coeffs
            .get(k)
            .cloned()
            .unwrap_or_else(|| ComplexBall::zero_at(self.prec()))
    }

    pub fn prec(&self) -> u32 {
        self.coeffs.iter().map(|c| c.prec()).max().unwrap_or(0)
    }

    pub fn add(&self, other: &Jet) -> Jet {
        let n = self.order().min(other.order());
        Jet::new((0..n).map(|k| &self.coeffs[k] + &other.coeffs[k]).collect())
    }

    pub fn sub(&self, other: &Jet) -> Jet {
        let n = self.order().min(other.order());
        Jet::new((0..n).map(|k| &self.coeffs[k] - &other.coeffs[k]).collect())
    }

    pub fn mul(&self, other: &Jet) -> Jet {
        let n = self.order().min(other.order());
        let coeffs = (0..n)
            .map(|k| {
                let mut acc = ComplexBall::zero_at(self.prec());
                for j in 0..=k {
                    acc += &self.coeffs[j] * &other.coeffs[k - j];
                }
                acc
            })
            .collect();
        Jet::new(coeffs)
    }

    pub fn scale(&self, c: &ComplexBall) -> Jet {
        Jet::new(self.coeffs.iter().map(|a| a * c).collect())
    }

    pub fn pow_u(&self, mut n: u64) -> Jet {
        let mut acc = Jet::constant(ComplexBall::one_at(self.prec()), self.order());
        let mut base = self.clone();
        while n > 0 {
            if n & 1 == 1 {
                acc = acc.mul(&base);
            }
            n >>= 1;
            if n > 0 {
                base = base.mul(&base);
            }
        }
        acc
    }

    /// Multiplicative inverse; indeterminate if the constant term may vanish.
    pub fn inv(&self) -> Jet {
        let n = self.order();
        let c0inv = self.coeffs[0].inv();
        let mut out: Vec<ComplexBall> = Vec::with_capacity(n);
        out.push(c0inv.clone());
        for k in 1..n {
            let mut acc = ComplexBall::zero_at(self.prec());
            for j in 1..=k {
                acc += &self.coeffs[j] * &out[k - j];
            }
            out.push(-(&acc * &c0inv));
        }
        Jet::new(out)
    }

    /// `exp(f)`, from `(exp f)' = f' exp f`.
    pub fn exp(&self) -> Jet {
        let n = self.order();
        let mut out = Vec::with_capacity(n);
        out.push(self.coeffs[0].exp());
        for k in 1..n {
            let mut acc = ComplexBall::zero_at(self.prec());
            for j in 1..=k {
                acc += self.coeffs[j].mul_i64(j as i64) * &out[k - j];
            }
            out.push(acc.div_i64(k as i64));
        }
        Jet::new(out)
    }

    /// `log(f)` on the branch of [`ComplexBall::log`] at the constant term.
    pub fn log(&self) -> Jet {
        let n = self.order();
        let c0inv = self.coeffs[0].inv();
        let mut out: Vec<ComplexBall> = Vec::with_capacity(n);
        out.push(self.coeffs[0].log());
        for k in 1..n {
            let mut acc = self.coeffs[k].mul_i64(k as i64);
            for j in 1..k {
                acc -= out[j].mul_i64(j as i64) * &self.coeffs[k - j];
            }
            out.push((&acc * &c0inv).div_i64(k as i64));
        }
        Jet::new(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ball(x: f64) -> ComplexBall {
        ComplexBall::from_f64(x, 0.0, 128)
    }

    #[test]
    fn powers_of_the_variable_are_binomial() {
        let x = Jet::variable(&ball(2.0), 4);
        let cube = x.pow_u(3);
        // (2 + η)^3 = 8 + 12η + 6η^2 + η^3
        for (k, v) in [8.0, 12.0, 6.0, 1.0].iter().enumerate() {
            assert!(cube.coeff(k).contains(&ball(*v)));
        }
        assert!(cube.coeff(7).contains(&ball(0.0)));
    }

    #[test]
    fn inverse_and_log_of_the_variable() {
        let x = Jet::variable(&ball(2.0), 3);
        let inv = x.inv();
        // 1/(2 + η) = 1/2 - η/4 + η^2/8
        assert!(inv.coeff(1).contains(&ball(-0.25)));
        assert!(inv.coeff(2).contains(&ball(0.125)));
        let log = x.log();
        assert!(log.coeff(1).contains(&ball(0.5)));
        assert!(log.coeff(2).contains(&ball(-0.125)));
        assert!((log.coeff(0).re().to_f64() - 2f64.ln()).abs() < 1e-15);
    }

    #[test]
    fn exp_of_log_is_identity() {
        let x = Jet::variable(&ComplexBall::from_f64(1.5, -0.5, 128), 5);
        let back = x.log().exp();
        for k in 0..5 {
            assert!(back.coeff(k).overlaps(&x.coeff(k)));
            assert!(back.coeff(k).rad().log2() < -100.0);
        }
    }
}
