//! Dense univariate polynomials over a [`Ring`].

use num_traits::Zero;

use crate::ball::ComplexBall;
use crate::exact::{format_qqi, height_bits, QQi};
use crate::traits::{Enclose, Ring};

/// Coefficients from low to high degree, without trailing zeros.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Polynomial<T: Ring> {
    coeffs: Vec<T>,
}

impl<T: Ring> Polynomial<T> {
    pub fn new(mut coeffs: Vec<T>) -> Self {
        while coeffs.last().is_some_and(|c| c.is_zero()) {
            coeffs.pop();
        }
        Self { coeffs }
    }

    pub fn zero() -> Self {
        Self { coeffs: Vec::new() }
    }

    pub fn one() -> Self {
        Self::constant(T::one())
    }

    pub fn constant(c: T) -> Self {
        Self::new(vec![c])
    }

    /// `c · x^k`
    pub fn monomial(c: T, k: usize) -> Self {
        let mut coeffs = vec![T::zero(); k];
        coeffs.push(c);
        Self::new(coeffs)
    }

    pub fn x() -> Self {
        Self::monomial(T::one(), 1)
    }

    pub fn coeffs(&self) -> &[T] {
        &self.coeffs
    }

    pub fn is_zero(&self) -> bool {
        self.coeffs.is_empty()
    }

    /// `None` for the zero polynomial.
    pub fn degree(&self) -> Option<usize> {
        self.coeffs.len().checked_sub(1)
    }

    pub fn coeff(&self, k: usize) -> T {
        self.coeffs.get(k).cloned().unwrap_or_else(T::zero)
    }

    pub fn leading_coefficient(&self) -> T {
        self.coeffs.last().cloned().unwrap_or_else(T::zero)
    }

    /// Index of the lowest non-zero coefficient; `None` for zero.
    pub fn valuation(&self) -> Option<usize> {
        self.coeffs.iter().position(|c| !c.is_zero())
    }

    pub fn eval(&self, at: &T) -> T {
        let mut acc = T::zero();
        for c in self.coeffs.iter().rev() {
            acc = acc * at.clone() + c.clone();
        }
        acc
    }

    /// First `count` Taylor coefficients of `self` at `at`.
    pub fn eval_jet(&self, at: &T, count: usize) -> Vec<T> {
        let mut res = vec![T::zero(); count];
        for c in self.coeffs.iter().rev() {
            for j in (1..count).rev() {
                res[j] = res[j].clone() * at.clone() + res[j - 1].clone();
            }
            if count > 0 {
                res[0] = res[0].clone() * at.clone() + c.clone();
            }
        }
        res
    }

    /// `self(x + a)`
    pub fn taylor_shift(&self, a: &T) -> Self {
        Self::new(self.eval_jet(a, self.coeffs.len()))
    }

    pub fn add(&self, other: &Self) -> Self {
        let n = self.coeffs.len().max(other.coeffs.len());
        Self::new((0..n).map(|k| self.coeff(k) + other.coeff(k)).collect())
    }

    pub fn sub(&self, other: &Self) -> Self {
        let n = self.coeffs.len().max(other.coeffs.len());
        Self::new((0..n).map(|k| self.coeff(k) - other.coeff(k)).collect())
    }

    pub fn neg(&self) -> Self {
        Self::new(self.coeffs.iter().map(|c| -c.clone()).collect())
    }

    pub fn mul(&self, other: &Self) -> Self {
        if self.is_zero() || other.is_zero() {
            return Self::zero();
        }
        let mut out = vec![T::zero(); self.coeffs.len() + other.coeffs.len() - 1];
        for (i, a) in self.coeffs.iter().enumerate() {
            for (j, b) in other.coeffs.iter().enumerate() {
                out[i + j] = out[i + j].clone() + a.clone() * b.clone();
            }
        }
        Self::new(out)
    }

    pub fn scale(&self, c: &T) -> Self {
        Self::new(self.coeffs.iter().map(|a| a.clone() * c.clone()).collect())
    }

    /// `self · x^k`
    pub fn shift_up(&self, k: usize) -> Self {
        if self.is_zero() {
            return Self::zero();
        }
        let mut coeffs = vec![T::zero(); k];
        coeffs.extend(self.coeffs.iter().cloned());
        Self { coeffs }
    }

    /// `self / x^k`, dropping the `k` low coefficients.
    pub fn shift_down(&self, k: usize) -> Self {
        Self::new(self.coeffs.iter().skip(k).cloned().collect())
    }

    pub fn derivative(&self) -> Self {
        Self::new(
            self.coeffs
                .iter()
                .enumerate()
                .skip(1)
                .map(|(k, c)| c.clone() * T::from_i64(k as i64))
                .collect(),
        )
    }

    pub fn map<U: Ring>(&self, f: impl Fn(&T) -> U) -> Polynomial<U> {
        Polynomial::new(self.coeffs.iter().map(f).collect())
    }
}

impl Polynomial<QQi> {
    pub fn from_ints(coeffs: &[i64]) -> Self {
        Self::new(coeffs.iter().map(|&c| QQi::from_i64(c)).collect())
    }

    /// Euclidean division; `divisor` must be non-zero.
    pub fn div_rem(&self, divisor: &Self) -> (Self, Self) {
        let Some(dd) = divisor.degree() else {
            return (Self::zero(), self.clone());
        };
        let lc = divisor.leading_coefficient();
        let mut rem = self.coeffs.clone();
        let mut quo = vec![QQi::zero(); rem.len().saturating_sub(dd)];
        while rem.len() > dd {
            let k = rem.len() - 1 - dd;
            let q = rem[rem.len() - 1].clone() / lc.clone();
            for (j, c) in divisor.coeffs.iter().enumerate() {
                rem[k + j] = rem[k + j].clone() - q.clone() * c.clone();
            }
            quo[k] = q;
            rem.pop();
            while rem.last().is_some_and(|c| c.is_zero()) {
                rem.pop();
            }
        }
        (Self::new(quo), Self::new(rem))
    }

    pub fn monic(&self) -> Self {
        if self.is_zero() {
            return Self::zero();
        }
        let lc = self.leading_coefficient();
        Self::new(self.coeffs.iter().map(|c| c.clone() / lc.clone()).collect())
    }

    /// Monic gcd (zero if both inputs are zero).
    pub fn gcd(&self, other: &Self) -> Self {
        let (mut a, mut b) = (self.clone(), other.clone());
        while !b.is_zero() {
            let (_, r) = a.div_rem(&b);
            a = b;
            b = r.monic();
        }
        a.monic()
    }

    /// Yun's algorithm: monic squarefree factors with their multiplicities.
    pub fn squarefree_decomposition(&self) -> Vec<(Self, usize)> {
        let mut out = Vec::new();
        if self.degree().unwrap_or(0) == 0 {
            return out;
        }
        let f = self.monic();
        let df = f.derivative();
        let a0 = f.gcd(&df);
        let mut b = f.div_rem(&a0).0;
        let mut c = df.div_rem(&a0).0;
        let mut d = c.sub(&b.derivative());
        let mut i = 1;
        while b.degree().unwrap_or(0) > 0 {
            let a = b.gcd(&d);
            if a.degree().unwrap_or(0) > 0 {
                out.push((a.clone(), i));
            }
            b = b.div_rem(&a).0;
            c = d.div_rem(&a).0;
            d = c.sub(&b.derivative());
            i += 1;
        }
        out
    }

    /// Product of the distinct monic irreducible-free factors.
    pub fn squarefree_part(&self) -> Self {
        if self.degree().unwrap_or(0) == 0 {
            return Self::one();
        }
        self.div_rem(&self.gcd(&self.derivative())).0.monic()
    }

    pub fn to_balls(&self, prec: u32) -> Polynomial<ComplexBall> {
        Polynomial::new(self.coeffs.iter().map(|c| c.enclose(prec)).collect())
    }

    pub fn eval_ball(&self, at: &ComplexBall) -> ComplexBall {
        let prec = at.prec();
        let mut acc = ComplexBall::zero_at(prec);
        for c in self.coeffs.iter().rev() {
            acc = &(&acc * at) + &c.enclose(prec);
        }
        acc
    }

    /// Largest coefficient bit size.
    pub fn height_bits(&self) -> u64 {
        self.coeffs.iter().map(height_bits).max().unwrap_or(0)
    }

    /// Human-readable form in the variable `var`, highest degree first.
    pub fn format_with(&self, var: &str) -> String {
        if self.is_zero() {
            return "0".to_string();
        }
        let terms: Vec<String> = self
            .coeffs
            .iter()
            .enumerate()
            .rev()
            .filter(|(_, c)| !c.is_zero())
            .map(|(k, c)| {
                let c = format_qqi(c);
                let c = if c.contains(' ') { format!("({c})") } else { c };
                match k {
                    0 => c,
                    _ => {
                        let m = if k == 1 {
                            var.to_string()
                        } else {
                            format!("{var}^{k}")
                        };
                        match c.as_str() {
                            "1" => m,
                            "-1" => format!("-{m}"),
                            _ => format!("{c}*{m}"),
                        }
                    }
                }
            })
            .collect();
        terms.join(" + ").replace("+ -", "- ")
    }
}
