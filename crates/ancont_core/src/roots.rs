//! Certified roots of polynomials with Gaussian rational coefficients.
//!
//! Roots are approximated in double precision (Aberth iteration), refined in
//! ball arithmetic (Weierstrass/Durand–Kerner corrections) and certified with
//! the Braess–Hadeler inclusion disks `D(z_j, d·|W_j|)`: once these disks are
//! pairwise disjoint, each one contains exactly one root.

use std::fmt;

use log::debug;
use num_complex::Complex64;
use num_traits::Zero;

use crate::ball::{ComplexBall, Mag};
use crate::error::{Error, Result};
use crate::exact::{as_integer, format_qqi, qqi_int, rationalize, to_complex64, QQi};
use crate::poly::Polynomial;
use crate::traits::Enclose;

const ABERTH_MAX_ITER: usize = 1000;
const MAX_DOUBLINGS: u32 = 8;

fn approx_coeffs(p: &Polynomial<QQi>) -> Vec<Complex64> {
    p.coeffs().iter().map(to_complex64).collect()
}

fn horner(coeffs: &[Complex64], z: Complex64) -> (Complex64, Complex64) {
    let mut v = Complex64::zero();
    let mut dv = Complex64::zero();
    for c in coeffs.iter().rev() {
        dv = dv * z + v;
        v = v * z + c;
    }
    (v, dv)
}

/// Double precision approximations of all roots.
fn aberth(coeffs: &[Complex64]) -> Vec<Complex64> {
    let n = coeffs.len() - 1;
    let lc = coeffs[n];
    if n == 1 {
        return vec![-coeffs[0] / lc];
    }
    // Fujiwara bound
    let mut bound = 0f64;
    for (k, c) in coeffs.iter().enumerate().take(n) {
        let r = (c / lc).norm();
        let r = if k == 0 { r / 2.0 } else { r };
        bound = bound.max(r.powf(1.0 / (n - k) as f64));
    }
    let bound = if bound > 0.0 && bound.is_finite() {
        2.0 * bound
    } else {
        1.0
    };
    let mut z: Vec<Complex64> = (0..n)
        .map(|j| {
            let theta = 2.0 * std::f64::consts::PI * j as f64 / n as f64 + 0.7;
            Complex64::from_polar(bound, theta)
        })
        .collect();
    for _ in 0..ABERTH_MAX_ITER {
        let mut max_step = 0f64;
        for j in 0..n {
            let (v, dv) = horner(coeffs, z[j]);
            if v == Complex64::zero() {
                continue;
            }
            let ratio = v / dv;
            let s: Complex64 = (0..n)
                .filter(|&k| k != j)
                .map(|k| (z[j] - z[k]).inv())
                .sum();
            let w = ratio / (Complex64::new(1.0, 0.0) - ratio * s);
            if !w.is_finite() {
                continue;
            }
            z[j] -= w;
            max_step = max_step.max(w.norm() / z[j].norm().max(f64::MIN_POSITIVE));
        }
        if max_step < 1e-14 {
            break;
        }
    }
    z
}

/// Weierstrass corrections `p(z_j) / (lc · ∏_{k≠j} (z_j − z_k))`.
fn corrections(p: &Polynomial<ComplexBall>, z: &[ComplexBall]) -> Vec<ComplexBall> {
    let lc = p.leading_coefficient();
    (0..z.len())
        .map(|j| {
            let mut den = lc.clone();
            for (k, zk) in z.iter().enumerate() {
                if k != j {
                    den *= &z[j] - zk;
                }
            }
            p.eval(&z[j]) / den
        })
        .collect()
}

fn pairwise_disjoint(boxes: &[ComplexBall]) -> bool {
    boxes.iter().all(|b| b.is_finite())
        && (0..boxes.len())
            .all(|i| (i + 1..boxes.len()).all(|j| !boxes[i].overlaps(&boxes[j])))
}

/// Disjoint boxes, each containing exactly one root of the squarefree `p`.
pub fn isolate_squarefree(p: &Polynomial<QQi>, prec: u32) -> Result<Vec<ComplexBall>> {
    let Some(d) = p.degree() else {
        return Err(Error::invalid_input("cannot isolate the roots of zero"));
    };
    if d == 0 {
        return Ok(Vec::new());
    }
    if d == 1 {
        let root = -p.coeff(0) / p.coeff(1);
        return Ok(vec![root.enclose(prec)]);
    }
    let approx = aberth(&approx_coeffs(p));
    let mut wp = prec.max(64) + 32;
    let mut z: Vec<ComplexBall> = approx
        .iter()
        .map(|a| ComplexBall::from_complex64(*a, wp))
        .collect();
    for _ in 0..MAX_DOUBLINGS {
        let pb = p.to_balls(wp);
        let rounds = (wp as f64 / 40.0).log2().ceil().max(0.0) as usize + 3;
        for _ in 0..rounds {
            let w = corrections(&pb, &z);
            if w.iter().any(|c| !c.is_finite()) {
                break;
            }
            z = z.iter().zip(&w).map(|(zj, wj)| (zj - wj).mid_ball()).collect();
        }
        let w = corrections(&pb, &z);
        let boxes: Vec<ComplexBall> = z
            .iter()
            .zip(&w)
            .map(|(zj, wj)| zj.add_error(wj.abs_upper().mul_f64(d as f64)))
            .collect();
        if pairwise_disjoint(&boxes) {
            return Ok(boxes);
        }
        debug!("root isolation failed at {wp} bits for degree {d}, retrying");
        wp *= 2;
        z = z.iter().map(|zj| zj.set_prec(wp)).collect();
    }
    Err(Error::precision(format!(
        "could not isolate the roots of {}",
        p.format_with("x")
    )))
}

/// A root of a polynomial with Gaussian rational coefficients.
#[derive(Clone, Debug)]
pub enum Algebraic {
    Exact(QQi),
    /// The unique root of the squarefree `poly` inside `enclosure`.
    Isolated {
        poly: Polynomial<QQi>,
        enclosure: ComplexBall,
    },
}

impl Algebraic {
    pub fn as_exact(&self) -> Option<&QQi> {
        match self {
            Algebraic::Exact(z) => Some(z),
            Algebraic::Isolated { .. } => None,
        }
    }

    pub fn to_integer(&self) -> Option<i64> {
        self.as_exact().and_then(as_integer)
    }

    pub fn approx(&self) -> Complex64 {
        match self {
            Algebraic::Exact(z) => to_complex64(z),
            Algebraic::Isolated { enclosure, .. } => enclosure.to_complex64(),
        }
    }

    /// An enclosure with roughly `prec` relative bits.
    pub fn enclosure(&self, prec: u32) -> Result<ComplexBall> {
        let (poly, enclosure) = match self {
            Algebraic::Exact(z) => return Ok(z.enclose(prec)),
            Algebraic::Isolated { poly, enclosure } => (poly, enclosure),
        };
        let target = Mag::pow2(-(prec as i64)).mul(enclosure.abs_lower());
        if enclosure.rad() <= target {
            return Ok(enclosure.clone());
        }
        let mut wp = prec + 16;
        for _ in 0..4 {
            let boxes = isolate_squarefree(poly, wp)?;
            if let Some(b) = boxes.iter().find(|b| enclosure.contains(b)) {
                return Ok(b.clone());
            }
            let overlapping: Vec<&ComplexBall> =
                boxes.iter().filter(|b| b.overlaps(enclosure)).collect();
            if let [only] = overlapping.as_slice() {
                return Ok((*only).clone());
            }
            wp *= 2;
        }
        Err(Error::precision(format!("could not refine the root {self}")))
    }

    /// The root `self + k`.
    pub fn shift_by(&self, k: i64) -> Algebraic {
        match self {
            Algebraic::Exact(z) => Algebraic::Exact(z + qqi_int(k)),
            Algebraic::Isolated { poly, enclosure } => Algebraic::Isolated {
                poly: poly.taylor_shift(&qqi_int(-k)),
                enclosure: enclosure + ComplexBall::from_i64(k, enclosure.prec()),
            },
        }
    }
}

impl fmt::Display for Algebraic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Algebraic::Exact(z) => write!(f, "{}", format_qqi(z)),
            Algebraic::Isolated { enclosure, .. } => {
                let z = enclosure.to_complex64();
                write!(f, "~({:.6} + {:.6}*I)", z.re, z.im)
            }
        }
    }
}

/// Roughly `-log2(rad)`, plus a margin.
fn width_bits(b: &ComplexBall) -> u32 {
    let r = b.rad().log2();
    if r.is_finite() {
        (-r).clamp(0.0, 65536.0) as u32 + 32
    } else {
        32
    }
}

/// Is `a − b` an integer, and which one?
pub fn integer_difference(a: &Algebraic, b: &Algebraic) -> Result<Option<i64>> {
    let (pa, pb) = match (a, b) {
        (Algebraic::Exact(x), Algebraic::Exact(y)) => return Ok(as_integer(&(x - y))),
        (Algebraic::Isolated { poly: pa, .. }, Algebraic::Isolated { poly: pb, .. }) => (pa, pb),
        // an irrational number never differs from a rational one by an integer
        _ => return Ok(None),
    };
    let d = a.approx() - b.approx();
    let k = d.re.round();
    if !k.is_finite() || k.abs() > 1e15 {
        return Ok(None);
    }
    let k = k as i64;
    let diff = &(&a.enclosure(64)? - &b.enclosure(64)?) - &ComplexBall::from_i64(k, 64);
    if !diff.contains_zero() {
        return Ok(None);
    }
    // common roots of pa and of pb(x − k), i.e. roots γ with γ − k a root of pb
    let g = pa.gcd(&pb.taylor_shift(&qqi_int(-k)));
    if g.degree().unwrap_or(0) == 0 {
        return Ok(None);
    }
    let shift = qqi_int(k);
    let mut prec = 64;
    while prec <= 4096 {
        let ea = a.enclosure(prec)?;
        let eb = b.enclosure(prec)? + shift.enclose(prec);
        // the boxes of g must be finer than both enclosures
        let boxes = isolate_squarefree(&g, prec + width_bits(&ea).max(width_bits(&eb)))?;
        if boxes.iter().any(|bx| ea.contains(bx) && eb.contains(bx)) {
            return Ok(Some(k));
        }
        if boxes.iter().all(|bx| !ea.overlaps(bx) || !eb.overlaps(bx)) {
            return Ok(None);
        }
        prec *= 2;
    }
    Err(Error::precision(format!(
        "could not decide whether {a} - {b} is an integer"
    )))
}

/// Roots of a non-zero polynomial with their multiplicities, rational roots
/// recognized exactly.
pub fn roots_with_multiplicities(p: &Polynomial<QQi>) -> Result<Vec<(Algebraic, usize)>> {
    let mut out = Vec::new();
    for (factor, mult) in p.squarefree_decomposition() {
        if factor.degree() == Some(1) {
            out.push((Algebraic::Exact(-factor.coeff(0) / factor.coeff(1)), mult));
            continue;
        }
        let prec = (5 * factor.height_bits() + 80).min(1 << 16) as u32;
        for enclosure in isolate_squarefree(&factor, prec)? {
            let root = match rationalize(&enclosure) {
                Some(cand) if factor.eval(&cand).is_zero() => Algebraic::Exact(cand),
                _ => Algebraic::Isolated {
                    poly: factor.clone(),
                    enclosure,
                },
            };
            out.push((root, mult));
        }
    }
    out.sort_by(|(x, _), (y, _)| {
        let (x, y) = (x.approx(), y.approx());
        x.re.total_cmp(&y.re).then(x.im.total_cmp(&y.im))
    });
    Ok(out)
}
