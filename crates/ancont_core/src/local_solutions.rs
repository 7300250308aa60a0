//! Local solutions at a regular singular point: logarithmic series, their
//! initial data, and the canonical basis of the solution space.
//!
//! A logarithmic series with leftmost exponent `λ` is
//! `Σ_n Σ_k u_n[k] x^(λ+n) log(x)^k / k!`. Its coefficients satisfy the
//! recurrence of the operator shifted by `λ`, evaluated as a jet in `n` so that
//! repeated roots of the indicial polynomial carry the log powers along.

use std::collections::{BTreeMap, VecDeque};

use log::debug;
use num_complex::Complex64;
use num_traits::Zero;
use serde::{Deserialize, Serialize};

use crate::ball::{pi, ComplexBall, Mag, RealBall};
use crate::error::{Error, Result};
use crate::exact::{qqi_int, QQi};
use crate::jet::Jet;
use crate::operator::DiffOp;
use crate::poly::Polynomial;
use crate::recurrence::BwShiftRec;
use crate::roots::{integer_difference, roots_with_multiplicities, Algebraic};

/// Roots of the indicial polynomial that differ by integers, sharing one
/// shift structure.
#[derive(Clone, Debug)]
pub struct IndicialFactor {
    /// Leftmost element of each class.
    pub roots: Vec<Algebraic>,
    /// `(shift, multiplicity)` by increasing shift; the first shift is `0`.
    pub shifts: Vec<(usize, usize)>,
}

fn same_polynomial(a: &Algebraic, b: &Algebraic) -> bool {
    match (a, b) {
        (Algebraic::Isolated { poly: p, .. }, Algebraic::Isolated { poly: q, .. }) => p == q,
        _ => false,
    }
}

/// Groups the roots of `ind` into classes modulo the integers.
pub fn shiftless_decomposition(ind: &Polynomial<QQi>) -> Result<Vec<IndicialFactor>> {
    // (representative, [(root, offset from the representative, multiplicity)])
    let mut classes: Vec<Vec<(Algebraic, i64, usize)>> = Vec::new();
    for (root, mult) in roots_with_multiplicities(ind)? {
        let mut placed = false;
        for class in classes.iter_mut() {
            if let Some(k) = integer_difference(&root, &class[0].0)? {
                class.push((root.clone(), k, mult));
                placed = true;
                break;
            }
        }
        if !placed {
            classes.push(vec![(root, 0, mult)]);
        }
    }
    let mut factors: Vec<IndicialFactor> = Vec::new();
    for class in classes {
        let Some(min) = class.iter().map(|(_, k, _)| *k).min() else {
            continue;
        };
        let leftmost = class
            .iter()
            .find(|(_, k, _)| *k == min)
            .map(|(r, _, _)| r.clone());
        let Some(leftmost) = leftmost else { continue };
        let mut shifts: Vec<(usize, usize)> = class
            .iter()
            .map(|(_, k, m)| ((k - min) as usize, *m))
            .collect();
        shifts.sort();
        let sibling = factors.iter_mut().find(|f| {
            f.shifts == shifts && f.roots.first().is_some_and(|r| same_polynomial(r, &leftmost))
        });
        match sibling {
            Some(f) => f.roots.push(leftmost),
            None => factors.push(IndicialFactor {
                roots: vec![leftmost],
                shifts,
            }),
        }
    }
    Ok(factors)
}

/// Indicial structure at the origin; ordinary points get exponents `0..r`.
pub fn local_decomposition(dop: &DiffOp) -> Result<Vec<IndicialFactor>> {
    if dop.is_ordinary_at_origin() {
        return Ok(vec![IndicialFactor {
            roots: vec![Algebraic::Exact(qqi_int(0))],
            shifts: (0..dop.order()).map(|i| (i, 1)).collect(),
        }]);
    }
    shiftless_decomposition(&dop.indicial_polynomial())
}

/// Initial data of a logarithmic series: `shift[s][k]` is the coefficient of
/// `x^(expo+s) log(x)^k / k!`.
#[derive(Clone, Debug)]
pub struct LogSeriesInitialValues {
    pub expo: Algebraic,
    pub shift: BTreeMap<usize, Vec<ComplexBall>>,
}

impl LogSeriesInitialValues {
    pub fn new(expo: Algebraic, shift: BTreeMap<usize, Vec<ComplexBall>>) -> Self {
        Self { expo, shift }
    }

    /// Taylor initial values `y(0), y'(0)/1!, …` at an ordinary point, as
    /// coefficients of `x^0, x^1, …`.
    pub fn from_taylor(values: Vec<ComplexBall>) -> Self {
        let shift = values.into_iter().enumerate().map(|(n, v)| (n, vec![v])).collect();
        Self {
            expo: Algebraic::Exact(qqi_int(0)),
            shift,
        }
    }

    /// All zero except the coefficient of `x^(expo+shift) log(x)^log_power / log_power!`.
    pub fn indicator(
        expo: &Algebraic,
        shifts: &[(usize, usize)],
        shift: usize,
        log_power: usize,
        prec: u32,
    ) -> Self {
        let values = shifts
            .iter()
            .map(|&(s, m)| {
                let v = (0..m)
                    .map(|p| {
                        if (s, p) == (shift, log_power) {
                            ComplexBall::one_at(prec)
                        } else {
                            ComplexBall::zero_at(prec)
                        }
                    })
                    .collect();
                (s, v)
            })
            .collect();
        Self {
            expo: expo.clone(),
            shift: values,
        }
    }

    /// Total number of log powers.
    pub fn log_prec(&self) -> usize {
        self.shift.values().map(|v| v.len()).sum()
    }

    pub fn mult(&self, n: usize) -> usize {
        self.shift.get(&n).map_or(0, |v| v.len())
    }

    /// Largest shift of the structure, zero or not.
    pub fn last_shift(&self) -> usize {
        self.shift.keys().copied().max().unwrap_or(0)
    }

    pub fn max_rad(&self) -> Mag {
        self.shift
            .values()
            .flatten()
            .map(|c| c.rad())
            .fold(Mag::ZERO, Mag::max)
    }

    /// Checks that the shifts and multiplicities match those that the indicial
    /// polynomial of `dop` dictates for `expo`.
    pub fn validate(&self, dop: &DiffOp) -> Result<()> {
        let invalid = || Error::InvalidInitialData(format!("invalid initial data for {dop} at 0"));
        for factor in local_decomposition(dop)? {
            for root in &factor.roots {
                let Some(offset) = integer_difference(&self.expo, root)? else {
                    continue;
                };
                let Some(k) = factor
                    .shifts
                    .iter()
                    .position(|&(s, _)| s as i64 == offset)
                else {
                    return Err(invalid());
                };
                let tail = &factor.shifts[k..];
                if self.shift.len() != tail.len() {
                    return Err(invalid());
                }
                let base = factor.shifts[k].0;
                let consistent = tail
                    .iter()
                    .all(|&(s, m)| self.shift.get(&(s - base)).map(|v| v.len()) == Some(m));
                return if consistent { Ok(()) } else { Err(invalid()) };
            }
        }
        Err(invalid())
    }
}

/// Solves the recurrence for the next coefficient vector.
///
/// `bw[i][j]` is the coefficient of `η^j` in `b_i(n + η)`; `window[i-1]` holds
/// `u_{n−i}`. The first `mult` slots are left at zero for the caller to fill
/// with initial values.
pub(crate) fn next_log_coefficient(
    bw: &[Vec<ComplexBall>],
    window: &VecDeque<Vec<ComplexBall>>,
    mult: usize,
    log_prec: usize,
    prec: u32,
) -> Result<Vec<ComplexBall>> {
    let mut new = vec![ComplexBall::zero_at(prec); log_prec];
    if mult >= log_prec {
        return Ok(new);
    }
    let pivot = &bw[0][mult];
    if pivot.contains_zero() {
        return Err(Error::precision(
            "leading recurrence coefficient cannot be certified non-zero",
        ));
    }
    let pivot_inv = pivot.inv();
    let depth = window.len().min(bw.len() - 1);
    for p in (0..log_prec - mult).rev() {
        let mut combin = ComplexBall::zero_at(prec);
        for j in 0..log_prec - p {
            for i in 1..=depth {
                let c = &bw[i][j];
                if !c.is_zero() {
                    combin += c * &window[i - 1][p + j];
                }
            }
        }
        for j in mult + 1..log_prec - p {
            combin += &bw[0][j] * &new[p + j];
        }
        new[mult + p] = -(&pivot_inv * &combin);
    }
    Ok(new)
}

/// The first `order` coefficient vectors of the series defined by `ini`;
/// `bwrec` must already be shifted by `ini.expo`.
pub fn log_series(
    ini: &LogSeriesInitialValues,
    bwrec: &BwShiftRec<ComplexBall>,
    order: usize,
    prec: u32,
) -> Result<Vec<Vec<ComplexBall>>> {
    let log_prec = ini.log_prec();
    let mut window: VecDeque<Vec<ComplexBall>> = VecDeque::new();
    let mut series = Vec::with_capacity(order);
    for n in 0..order {
        let bw = bwrec.eval_series(&ComplexBall::from_i64(n as i64, prec), log_prec);
        let mult = ini.mult(n);
        let mut new = next_log_coefficient(&bw, &window, mult, log_prec, prec)?;
        if let Some(values) = ini.shift.get(&n) {
            for (slot, v) in new.iter_mut().zip(values) {
                *slot = v.clone();
            }
        }
        window.push_front(new.clone());
        window.truncate(bwrec.order());
        series.push(new);
    }
    Ok(series)
}

/// Value at `pt + η` of `(pt+η)^expo Σ_p psum[p] log(pt+η)^p / p!`, truncated
/// at `η^jet_order`, averaged over the branches `log + 2πib`, `b ∈ branch`.
pub fn log_series_values(
    expo: &Algebraic,
    psum: &[Jet],
    pt: &ComplexBall,
    jet_order: usize,
    branch: &[i64],
) -> Result<Vec<ComplexBall>> {
    let prec = pt.prec();
    if branch.is_empty() {
        return Err(Error::invalid_input("empty branch specification"));
    }
    let x = Jet::variable(pt, jet_order);
    let zero_jet = Jet::constant(ComplexBall::zero_at(prec), jet_order);
    if psum.len() <= 1 && branch == [0] {
        if let Some(k) = expo.to_integer() {
            let pow = if k >= 0 {
                x.pow_u(k as u64)
            } else {
                x.inv().pow_u(k.unsigned_abs())
            };
            let base = psum.first().unwrap_or(&zero_jet);
            return Ok(pow.mul(base).coeffs);
        }
    }
    let lambda = expo.enclosure(prec)?;
    let logx = x.log();
    let two_pi_i = ComplexBall::new(RealBall::zero(prec), pi(prec).mul_2exp(1));
    let mut val = zero_jet.clone();
    for &b in branch {
        let mut logpt = logx.clone();
        logpt.coeffs[0] += two_pi_i.mul_i64(b);
        let inipow = logpt.scale(&lambda).exp();
        let mut acc = zero_jet.clone();
        let mut logpow = Jet::constant(ComplexBall::one_at(prec), jet_order);
        let mut factorial = ComplexBall::one_at(prec);
        for (p, coeffs) in psum.iter().enumerate() {
            if p > 0 {
                logpow = logpow.mul(&logpt);
                factorial = factorial.mul_i64(p as i64);
            }
            acc = acc.add(&coeffs.mul(&logpow).scale(&factorial.inv()));
        }
        val = val.add(&inipow.mul(&acc));
    }
    let count = ComplexBall::from_i64(branch.len() as i64, prec).inv();
    Ok(val.scale(&count).coeffs)
}

/// One element of the canonical local basis.
#[derive(Clone, Debug)]
pub struct FundamentalSolution<V> {
    pub leftmost: Algebraic,
    pub shift: usize,
    pub log_power: usize,
    pub value: V,
}

/// Serializable summary of a [`FundamentalSolution`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SolutionStructure {
    pub valuation: Complex64,
    pub leftmost: String,
    pub shift: usize,
    pub log_power: usize,
}

impl<V> FundamentalSolution<V> {
    pub fn valuation(&self) -> Complex64 {
        self.leftmost.approx() + Complex64::new(self.shift as f64, 0.0)
    }

    pub fn structure(&self) -> SolutionStructure {
        SolutionStructure {
            valuation: self.valuation(),
            leftmost: self.leftmost.to_string(),
            shift: self.shift,
            log_power: self.log_power,
        }
    }

    /// Most singular first: ascending real part of the valuation, then
    /// descending log power, descending `|Im|`, then the sign of `Im`.
    fn sort_key(&self) -> (f64, i64, f64, f64) {
        let v = self.valuation();
        let snap = |x: f64| (x * 1e10).round();
        (
            snap(v.re),
            -(self.log_power as i64),
            -snap(v.im.abs()),
            sign(snap(v.im)),
        )
    }
}

fn sign(x: f64) -> f64 {
    if x == 0.0 {
        0.0
    } else {
        x.signum()
    }
}

pub fn sort_by_asymptotic_order<V>(sols: &mut [FundamentalSolution<V>]) {
    sols.sort_by(|a, b| {
        let (ka, kb) = (a.sort_key(), b.sort_key());
        ka.0.total_cmp(&kb.0)
            .then(ka.1.cmp(&kb.1))
            .then(ka.2.total_cmp(&kb.2))
            .then(ka.3.total_cmp(&kb.3))
    });
}

/// Shared, read-only data of a basis traversal.
#[derive(Clone, Copy)]
pub struct BasisContext<'a> {
    pub dop: &'a DiffOp,
    pub bwrec: &'a BwShiftRec<QQi>,
    pub decomposition: &'a [IndicialFactor],
}

/// Position of the traversal: one `(leftmost, shift, log_power)` triple.
#[derive(Clone, Copy)]
pub struct SolutionContext<'a> {
    pub dop: &'a DiffOp,
    pub bwrec: &'a BwShiftRec<QQi>,
    pub shifts: &'a [(usize, usize)],
    pub leftmost: &'a Algebraic,
    pub shift: usize,
    pub mult: usize,
    pub log_power: usize,
}

impl<'a> SolutionContext<'a> {
    pub fn at_valuation(self, shift: usize, mult: usize) -> Self {
        Self {
            shift,
            mult,
            ..self
        }
    }

    pub fn at_log_power(self, log_power: usize) -> Self {
        Self { log_power, ..self }
    }
}

type Solutions<V> = Vec<FundamentalSolution<V>>;

/// Walks the canonical local basis at the origin of an operator.
///
/// Implementors compute one value per basis element in [`fun`](Self::fun);
/// the `process_*` hooks may be overridden to share work across a factor or a
/// class, and can resume the default traversal through the `walk_*` functions.
pub trait LocalBasisMapper {
    type Value;

    fn fun(
        &mut self,
        ctx: &SolutionContext<'_>,
        ini: &LogSeriesInitialValues,
    ) -> Result<Self::Value>;

    fn process_decomposition(&mut self, _ctx: &BasisContext<'_>) -> Result<()> {
        Ok(())
    }

    fn process_irred_factor(
        &mut self,
        ctx: &BasisContext<'_>,
        factor: &IndicialFactor,
        out: &mut Solutions<Self::Value>,
    ) -> Result<()> {
        walk_irred_factor(self, ctx, factor, out)
    }

    fn process_modz_class(
        &mut self,
        ctx: SolutionContext<'_>,
        out: &mut Solutions<Self::Value>,
    ) -> Result<()> {
        walk_modz_class(self, ctx, out)
    }

    fn process_valuation(
        &mut self,
        ctx: SolutionContext<'_>,
        out: &mut Solutions<Self::Value>,
    ) -> Result<()> {
        walk_valuation(self, ctx, out)
    }

    fn process_solution(
        &mut self,
        ctx: SolutionContext<'_>,
        out: &mut Solutions<Self::Value>,
    ) -> Result<()> {
        walk_solution(self, ctx, out)
    }

    /// The mapped basis, sorted by asymptotic order.
    fn run(&mut self, dop: &DiffOp) -> Result<Solutions<Self::Value>>
    where
        Self: Sized,
    {
        if dop.is_zero() {
            return Err(Error::unsupported("zero operator"));
        }
        if !dop.is_fuchsian_at_origin() {
            return Err(Error::unsupported(
                "irregular singular point (not implemented)",
            ));
        }
        let bwrec = dop.to_recurrence();
        let decomposition = local_decomposition(dop)?;
        let ctx = BasisContext {
            dop,
            bwrec: &bwrec,
            decomposition: &decomposition,
        };
        self.process_decomposition(&ctx)?;
        let mut out = Vec::new();
        for factor in &decomposition {
            debug!(
                "indicial factor: roots = [{}], shifts = {:?}",
                factor
                    .roots
                    .iter()
                    .map(|r| r.to_string())
                    .collect::<Vec<_>>()
                    .join(", "),
                factor.shifts
            );
            self.process_irred_factor(&ctx, factor, &mut out)?;
        }
        sort_by_asymptotic_order(&mut out);
        Ok(out)
    }
}

pub fn walk_irred_factor<M: LocalBasisMapper + ?Sized>(
    mapper: &mut M,
    ctx: &BasisContext<'_>,
    factor: &IndicialFactor,
    out: &mut Solutions<M::Value>,
) -> Result<()> {
    for leftmost in &factor.roots {
        let sctx = SolutionContext {
            dop: ctx.dop,
            bwrec: ctx.bwrec,
            shifts: &factor.shifts,
            leftmost,
            shift: 0,
            mult: 0,
            log_power: 0,
        };
        mapper.process_modz_class(sctx, out)?;
    }
    Ok(())
}

pub fn walk_modz_class<M: LocalBasisMapper + ?Sized>(
    mapper: &mut M,
    ctx: SolutionContext<'_>,
    out: &mut Solutions<M::Value>,
) -> Result<()> {
    for &(shift, mult) in ctx.shifts.iter().rev() {
        mapper.process_valuation(ctx.at_valuation(shift, mult), out)?;
    }
    Ok(())
}

pub fn walk_valuation<M: LocalBasisMapper + ?Sized>(
    mapper: &mut M,
    ctx: SolutionContext<'_>,
    out: &mut Solutions<M::Value>,
) -> Result<()> {
    for log_power in (0..ctx.mult).rev() {
        mapper.process_solution(ctx.at_log_power(log_power), out)?;
    }
    Ok(())
}

pub fn walk_solution<M: LocalBasisMapper + ?Sized>(
    mapper: &mut M,
    ctx: SolutionContext<'_>,
    out: &mut Solutions<M::Value>,
) -> Result<()> {
    let ini = LogSeriesInitialValues::indicator(
        ctx.leftmost,
        ctx.shifts,
        ctx.shift,
        ctx.log_power,
        crate::ball::DEFAULT_PREC,
    );
    let value = mapper.fun(&ctx, &ini)?;
    out.push(FundamentalSolution {
        leftmost: ctx.leftmost.clone(),
        shift: ctx.shift,
        log_power: ctx.log_power,
        value,
    });
    Ok(())
}

/// Maps every basis element to nothing; only the structure is kept.
struct StructureMapper;

impl LocalBasisMapper for StructureMapper {
    type Value = ();

    fn fun(&mut self, _ctx: &SolutionContext<'_>, _ini: &LogSeriesInitialValues) -> Result<()> {
        Ok(())
    }
}

/// Structure of the canonical local basis at the origin of `dop`.
pub fn local_basis_structure(dop: &DiffOp) -> Result<Vec<FundamentalSolution<()>>> {
    StructureMapper.run(dop)
}
