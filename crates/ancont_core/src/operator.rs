//! Linear differential operators with polynomial coefficients, and what the
//! rest of the crate derives from them: θ-form, indicial polynomial,
//! backward-shift recurrence and the Fuchs criterion.

use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};

use num_traits::{One, Zero};

use crate::ball::ComplexBall;
use crate::exact::{qqi_int, QQi};
use crate::poly::Polynomial;
use crate::recurrence::BwShiftRec;
use crate::traits::Enclose;

/// `Σ_k a_k(x) D^k`, `D = d/dx`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct DiffOp {
    coeffs: Vec<Polynomial<QQi>>,
}

/// `Σ_m e_m(x) θ^m` with `θ = x·D`, normalized so that some `e_m(0) ≠ 0`.
#[derive(Clone, Debug, PartialEq)]
pub struct ThetaForm {
    pub coeffs: Vec<Polynomial<QQi>>,
}

impl ThetaForm {
    /// `E_j(θ) = Σ_m [x^j] e_m(x) · θ^m`.
    pub fn theta_polynomial(&self, j: usize) -> Polynomial<QQi> {
        Polynomial::new(self.coeffs.iter().map(|e| e.coeff(j)).collect())
    }

    /// Largest degree in `x`.
    pub fn x_degree(&self) -> usize {
        self.coeffs
            .iter()
            .filter_map(|e| e.degree())
            .max()
            .unwrap_or(0)
    }

    pub fn order(&self) -> usize {
        self.coeffs.len().saturating_sub(1)
    }
}

/// Signed Stirling numbers of the first kind `s(k, m)`, `m ≤ k ≤ n`.
fn stirling_rows(n: usize) -> Vec<Vec<QQi>> {
    let mut rows = vec![vec![QQi::one()]];
    for k in 0..n {
        let prev = &rows[k];
        let mut row = vec![QQi::zero(); k + 2];
        for m in 0..=k + 1 {
            let left = if m > 0 { prev[m - 1].clone() } else { QQi::zero() };
            let right = prev.get(m).cloned().unwrap_or_else(QQi::zero);
            row[m] = left - right * qqi_int(k as i64);
        }
        rows.push(row);
    }
    rows
}

impl DiffOp {
    pub fn new(mut coeffs: Vec<Polynomial<QQi>>) -> Self {
        while coeffs.last().is_some_and(|c| c.is_zero()) {
            coeffs.pop();
        }
        Self { coeffs }
    }

    /// `coeffs[k]` lists the integer coefficients of `a_k`, low degree first.
    pub fn from_int_coeffs(coeffs: &[&[i64]]) -> Self {
        Self::new(coeffs.iter().map(|c| Polynomial::from_ints(c)).collect())
    }

    pub fn coeffs(&self) -> &[Polynomial<QQi>] {
        &self.coeffs
    }

    pub fn coeff(&self, k: usize) -> Polynomial<QQi> {
        self.coeffs.get(k).cloned().unwrap_or_else(Polynomial::zero)
    }

    pub fn is_zero(&self) -> bool {
        self.coeffs.is_empty()
    }

    pub fn order(&self) -> usize {
        self.coeffs.len().saturating_sub(1)
    }

    pub fn leading_coefficient(&self) -> Polynomial<QQi> {
        self.coeffs.last().cloned().unwrap_or_else(Polynomial::zero)
    }

    /// Largest coefficient degree.
    pub fn degree(&self) -> usize {
        self.coeffs
            .iter()
            .filter_map(|c| c.degree())
            .max()
            .unwrap_or(0)
    }

    /// The operator re-centered at `x0`, i.e. acting on `y(x0 + x)`.
    pub fn shift(&self, x0: &QQi) -> Self {
        Self::new(self.coeffs.iter().map(|c| c.taylor_shift(x0)).collect())
    }

    /// Structural hash, used as a cache key.
    pub fn fingerprint(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.hash(&mut hasher);
        hasher.finish()
    }

    /// `x^r · L · x^{-ν}` rewritten in `θ`, using `x^k D^k = θ(θ−1)…(θ−k+1)`.
    pub fn theta_form(&self) -> ThetaForm {
        let r = self.order();
        let stirling = stirling_rows(r);
        let mut d = vec![Polynomial::<QQi>::zero(); r + 1];
        for (k, a) in self.coeffs.iter().enumerate() {
            let ak = a.shift_up(r - k);
            for (m, s) in stirling[k].iter().enumerate() {
                if !s.is_zero() {
                    d[m] = d[m].add(&ak.scale(s));
                }
            }
        }
        let nu = d.iter().filter_map(|p| p.valuation()).min().unwrap_or(0);
        let mut coeffs: Vec<Polynomial<QQi>> = d.iter().map(|p| p.shift_down(nu)).collect();
        while coeffs.last().is_some_and(|c| c.is_zero()) {
            coeffs.pop();
        }
        ThetaForm { coeffs }
    }

    /// Indicial polynomial at the origin.
    pub fn indicial_polynomial(&self) -> Polynomial<QQi> {
        self.theta_form().theta_polynomial(0)
    }

    /// Recurrence on the coefficients of power series solutions at the origin:
    /// `b_j(n) = E_j(n − j)`.
    pub fn to_recurrence(&self) -> BwShiftRec<QQi> {
        let theta = self.theta_form();
        let coeffs = (0..=theta.x_degree())
            .map(|j| theta.theta_polynomial(j).taylor_shift(&qqi_int(-(j as i64))))
            .collect();
        BwShiftRec::new(coeffs)
    }

    /// Leading coefficient non-zero at the origin.
    pub fn is_ordinary_at_origin(&self) -> bool {
        !self.leading_coefficient().coeff(0).is_zero()
    }

    /// Fuchs criterion at the origin: `val(a_k) − k ≥ val(a_r) − r` for all `k`.
    pub fn is_fuchsian_at_origin(&self) -> bool {
        let r = self.order() as i64;
        let Some(vr) = self.leading_coefficient().valuation() else {
            return false;
        };
        let lead = vr as i64 - r;
        self.coeffs.iter().enumerate().all(|(k, a)| match a.valuation() {
            Some(v) => v as i64 - k as i64 >= lead,
            None => true,
        })
    }

    /// Monic squarefree polynomial whose roots are the singular points.
    pub fn singular_polynomial(&self) -> Polynomial<QQi> {
        self.leading_coefficient().squarefree_part()
    }

    /// `D · self`, from `D ∘ a = a' + a·D`.
    fn derivative_compose(&self) -> Self {
        let mut out = vec![Polynomial::zero(); self.coeffs.len() + 1];
        for (k, a) in self.coeffs.iter().enumerate() {
            out[k] = out[k].add(&a.derivative());
            out[k + 1] = out[k + 1].add(a);
        }
        Self::new(out)
    }

    /// Rewrites `post` as `R / a_r^m` with `ord R < ord self`, such that
    /// `post(y) = R(y) / a_r^m` for every solution `y` of `self`.
    pub fn reduce(&self, post: &DiffOp) -> RationalOperator {
        let r = self.order();
        let lc = self.leading_coefficient();
        let mut q = post.clone();
        let mut power = 0;
        let mut shifted = vec![self.clone()];
        while !q.is_zero() && q.order() >= r {
            let k = q.order();
            while shifted.len() <= k - r {
                let next = shifted[shifted.len() - 1].derivative_compose();
                shifted.push(next);
            }
            let qk = q.leading_coefficient();
            let dl = &shifted[k - r];
            let n = q.coeffs.len().max(dl.coeffs.len());
            let coeffs = (0..n)
                .map(|i| {
                    let mut c = q.coeff(i).mul(&lc).sub(&dl.coeff(i).mul(&qk));
                    if i == k {
                        c = Polynomial::zero();
                    }
                    c
                })
                .collect();
            q = DiffOp::new(coeffs);
            power += 1;
        }
        RationalOperator {
            numerators: q.coeffs,
            denominator: lc,
            power,
        }
    }
}

/// `Σ_k (numerators[k] / denominator^power) D^k`.
#[derive(Clone, Debug, PartialEq)]
pub struct RationalOperator {
    pub numerators: Vec<Polynomial<QQi>>,
    pub denominator: Polynomial<QQi>,
    pub power: usize,
}

impl RationalOperator {
    /// The row mapping a Taylor jet `[y(pt), y'(pt), y''(pt)/2, …]` of length `len`
    /// to the value of the operator applied to `y` at `pt`.
    pub fn eval_row(&self, pt: &ComplexBall, len: usize) -> Vec<ComplexBall> {
        let prec = pt.prec();
        let den = self.denominator.eval_ball(pt).pow_u(self.power as u64);
        let mut factorial = ComplexBall::one_at(prec);
        (0..len)
            .map(|k| {
                if k > 0 {
                    factorial = factorial.mul_i64(k as i64);
                }
                match self.numerators.get(k) {
                    Some(num) => &(&num.eval_ball(pt) * &factorial) / &den,
                    None => ComplexBall::zero_at(prec),
                }
            })
            .collect()
    }

    pub fn eval_row_exact(&self, pt: &QQi, len: usize, prec: u32) -> Vec<ComplexBall> {
        self.eval_row(&pt.enclose(prec), len)
    }
}

impl fmt::Display for DiffOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_zero() {
            return write!(f, "0");
        }
        let terms: Vec<String> = self
            .coeffs
            .iter()
            .enumerate()
            .rev()
            .filter(|(_, c)| !c.is_zero())
            .map(|(k, c)| {
                let c = c.format_with("x");
                let d = match k {
                    0 => return c,
                    1 => "Dx".to_string(),
                    _ => format!("Dx^{k}"),
                };
                match c.as_str() {
                    "1" => d,
                    "-1" => format!("-{d}"),
                    _ if c.contains(' ') => format!("({c})*{d}"),
                    _ => format!("{c}*{d}"),
                }
            })
            .collect();
        write!(f, "{}", terms.join(" + ").replace("+ -", "- "))
    }
}
