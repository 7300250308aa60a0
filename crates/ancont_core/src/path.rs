//! Points, steps and paths of an analytic continuation.
//!
//! A [`PointAnalyzer`] owns everything that depends on the operator: the
//! certified list of singularities and a per-run cache of point
//! classifications. Points and steps are plain values; all their
//! operator-dependent queries go through the analyzer.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;

use log::debug;
use num_bigint::BigInt;
use num_rational::BigRational;
use num_traits::{One, Zero};

use crate::ball::{ComplexBall, Mag};
use crate::error::{Error, Result};
use crate::exact::{ball_midpoint, format_qqi, height_bits, qqi_ratio, rationalize, rationalize_near, QQi};
use crate::local_solutions::{local_basis_structure, SolutionStructure};
use crate::operator::DiffOp;
use crate::roots::{roots_with_multiplicities, Algebraic};
use crate::summation::EvaluationPoint;
use crate::traits::Enclose;

const POINT_PREC: u32 = 64;
const MAX_SING_PREC: u32 = 1024;

/// Position of a vertex: an exact Gaussian rational or a complex ball.
#[derive(Clone, Debug, PartialEq)]
pub enum PointValue {
    Exact(QQi),
    Ball(ComplexBall),
}

impl PointValue {
    pub fn ball(&self, prec: u32) -> ComplexBall {
        match self {
            PointValue::Exact(q) => q.enclose(prec),
            PointValue::Ball(b) => b.set_prec(prec.max(b.prec())),
        }
    }

    pub fn as_exact(&self) -> Option<&QQi> {
        match self {
            PointValue::Exact(q) => Some(q),
            PointValue::Ball(_) => None,
        }
    }

    pub fn is_exact(&self) -> bool {
        self.as_exact().is_some()
    }

    pub fn is_real(&self) -> bool {
        match self {
            PointValue::Exact(q) => q.im.is_zero(),
            PointValue::Ball(b) => b.is_real(),
        }
    }

    fn key(&self) -> String {
        match self {
            PointValue::Exact(q) => format_qqi(q),
            PointValue::Ball(b) => format!("{b:?}"),
        }
    }
}

impl From<QQi> for PointValue {
    fn from(q: QQi) -> Self {
        PointValue::Exact(q)
    }
}

impl From<i64> for PointValue {
    fn from(n: i64) -> Self {
        PointValue::Exact(crate::exact::qqi_int(n))
    }
}

impl From<i32> for PointValue {
    fn from(n: i32) -> Self {
        PointValue::from(i64::from(n))
    }
}

impl From<ComplexBall> for PointValue {
    fn from(b: ComplexBall) -> Self {
        PointValue::Ball(b)
    }
}

impl fmt::Display for PointValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PointValue::Exact(q) => f.write_str(&format_qqi(q)),
            PointValue::Ball(b) => write!(f, "{b}"),
        }
    }
}

/// A vertex of a path.
#[derive(Clone, Debug, PartialEq)]
pub struct Point {
    pub value: PointValue,
    /// Produce an output record at this vertex.
    pub keep: bool,
    /// Branch of the local solutions used when leaving this vertex.
    pub outgoing_branch: Option<Vec<i64>>,
    force_singular: bool,
}

impl Point {
    pub fn new(value: impl Into<PointValue>) -> Self {
        Self {
            value: value.into(),
            keep: false,
            outgoing_branch: None,
            force_singular: false,
        }
    }

    /// A point known to be singular even when its enclosure cannot tell.
    pub fn singular(value: impl Into<PointValue>) -> Self {
        Self {
            force_singular: true,
            ..Self::new(value)
        }
    }

    pub fn keep(mut self, keep: bool) -> Self {
        self.keep = keep;
        self
    }

    pub fn with_outgoing_branch(mut self, branch: Vec<i64>) -> Self {
        self.outgoing_branch = Some(branch);
        self
    }

    pub fn is_exact(&self) -> bool {
        self.value.is_exact()
    }

    pub fn ball(&self, prec: u32) -> ComplexBall {
        self.value.ball(prec)
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value)
    }
}

#[derive(Clone, Debug, Default)]
struct PointInfo {
    ordinary: Option<bool>,
    regular: Option<bool>,
    dist: Option<Mag>,
}

/// Operator-dependent queries about points, cached for one continuation run.
pub struct PointAnalyzer<'a> {
    dop: &'a DiffOp,
    fingerprint: u64,
    singularities: Vec<Algebraic>,
    cache: RefCell<HashMap<(u64, String), PointInfo>>,
}

impl<'a> PointAnalyzer<'a> {
    pub fn new(dop: &'a DiffOp) -> Result<Self> {
        let sing = dop.singular_polynomial();
        let singularities = if sing.degree().unwrap_or(0) == 0 {
            Vec::new()
        } else {
            roots_with_multiplicities(&sing)?
                .into_iter()
                .map(|(r, _)| r)
                .collect()
        };
        debug!(
            "singularities of {dop}: [{}]",
            singularities
                .iter()
                .map(|s| s.to_string())
                .collect::<Vec<_>>()
                .join(", ")
        );
        Ok(Self {
            dop,
            fingerprint: dop.fingerprint(),
            singularities,
            cache: RefCell::new(HashMap::new()),
        })
    }

    pub fn dop(&self) -> &DiffOp {
        self.dop
    }

    pub fn singularities(&self) -> &[Algebraic] {
        &self.singularities
    }

    fn cached<T>(
        &self,
        pt: &Point,
        get: impl Fn(&PointInfo) -> Option<T>,
        set: impl Fn(&mut PointInfo, &T),
        compute: impl FnOnce() -> Result<T>,
    ) -> Result<T> {
        let key = (self.fingerprint, format!("{}{}", pt.value.key(), pt.force_singular));
        if let Some(v) = self.cache.borrow().get(&key).and_then(&get) {
            return Ok(v);
        }
        let v = compute()?;
        set(self.cache.borrow_mut().entry(key).or_default(), &v);
        Ok(v)
    }

    pub fn is_ordinary(&self, pt: &Point) -> Result<bool> {
        if pt.force_singular {
            return Ok(false);
        }
        self.cached(
            pt,
            |i| i.ordinary,
            |i, v| i.ordinary = Some(*v),
            || {
                let lc = self.dop.leading_coefficient();
                if !lc.eval_ball(&pt.ball(POINT_PREC)).contains_zero() {
                    return Ok(true);
                }
                match &pt.value {
                    PointValue::Exact(q) => Ok(!lc.eval(q).is_zero()),
                    PointValue::Ball(_) => Err(Error::unsupported(format!(
                        "can't tell if inexact point {pt} is singular"
                    ))),
                }
            },
        )
    }

    pub fn is_singular(&self, pt: &Point) -> Result<bool> {
        Ok(!self.is_ordinary(pt)?)
    }

    /// Fuchs criterion at `pt`; ordinary points are regular.
    pub fn is_regular(&self, pt: &Point) -> Result<bool> {
        if self.is_ordinary(pt)? {
            return Ok(true);
        }
        self.cached(
            pt,
            |i| i.regular,
            |i, v| i.regular = Some(*v),
            || match &pt.value {
                PointValue::Exact(q) => Ok(self.dop.shift(q).is_fuchsian_at_origin()),
                PointValue::Ball(_) => Err(Error::unsupported(format!(
                    "can't tell if inexact point {pt} is regular"
                ))),
            },
        )
    }

    pub fn is_regular_singular(&self, pt: &Point) -> Result<bool> {
        Ok(!self.is_ordinary(pt)? && self.is_regular(pt)?)
    }

    pub fn describe(&self, pt: &Point) -> String {
        match (self.is_ordinary(pt), self.is_regular(pt)) {
            (Ok(true), _) => pt.to_string(),
            (Ok(false), Ok(true)) => format!("regular singular point {pt}"),
            (Ok(false), Ok(false)) => format!("irregular singular point {pt}"),
            _ => format!("point of unknown singularity type {pt}"),
        }
    }

    /// Lower bound on the distance from `pt` to the singularities other
    /// than `pt` itself; infinite when there are none.
    pub fn dist_to_sing(&self, pt: &Point) -> Result<Mag> {
        self.cached(
            pt,
            |i| i.dist,
            |i, v| i.dist = Some(*v),
            || {
                let singular = self.is_singular(pt)?;
                let mut prec = POINT_PREC;
                while prec <= MAX_SING_PREC {
                    let z = pt.ball(prec);
                    let mut close = 0;
                    let mut dist = Mag::INF;
                    for s in &self.singularities {
                        let sb = s.enclosure(prec)?;
                        if sb.overlaps(&z) {
                            close += 1;
                        } else {
                            dist = dist.min((&z - &sb).abs_lower());
                        }
                    }
                    if (close == 0 || (close == 1 && singular)) && !dist.is_zero() {
                        return Ok(dist);
                    }
                    prec *= 2;
                }
                Err(Error::precision(format!(
                    "cannot separate {pt} from the singular points of the operator"
                )))
            },
        )
    }

    pub fn local_basis_structure(&self, pt: &Point) -> Result<Vec<SolutionStructure>> {
        let ordinary = self.is_ordinary(pt)?;
        if !ordinary && !self.is_regular(pt)? {
            return Err(Error::unsupported(format!(
                "irregular singular point {pt}"
            )));
        }
        match &pt.value {
            PointValue::Exact(q) => Ok(local_basis_structure(&self.dop.shift(q))?
                .iter()
                .map(|s| s.structure())
                .collect()),
            PointValue::Ball(_) => Ok((0..self.dop.order())
                .map(|k| SolutionStructure {
                    valuation: num_complex::Complex64::new(k as f64, 0.0),
                    leftmost: "0".to_string(),
                    shift: k,
                    log_power: 0,
                })
                .collect()),
        }
    }

    /// A nearby point that is cheaper to expand around: the center of an
    /// inexact point, or a low-height rational close to an exact ordinary
    /// point of large height.
    pub fn simple_approx(&self, pt: &Point) -> Result<Point> {
        match &pt.value {
            PointValue::Ball(b) => Ok(Point::new(ball_midpoint(b))),
            PointValue::Exact(q) if height_bits(q) > 64 && self.is_ordinary(pt)? => {
                let dist = self.dist_to_sing(pt)?;
                let tol = mag_to_rational(dist.mul_2exp(-4));
                let Some(tol) = tol else {
                    return Ok(pt.clone());
                };
                let disk = pt.ball(POINT_PREC).add_error(dist.mul_2exp(-4));
                for s in &self.singularities {
                    if s.enclosure(POINT_PREC)?.overlaps(&disk) {
                        return Ok(pt.clone());
                    }
                }
                Ok(Point::new(rationalize_near(q, &tol)))
            }
            PointValue::Exact(_) => Ok(Point::new(pt.value.clone())),
        }
    }

    /// Singularities on, or too close to tell from, the segment of `step`.
    pub fn offending_singularities(&self, step: &Step) -> Result<Vec<Algebraic>> {
        let z0 = step.start.ball(POINT_PREC);
        let z1 = step.end.ball(POINT_PREC);
        let one = ComplexBall::one_at(POINT_PREC);
        let mut res = Vec::new();
        for s in &self.singularities {
            if is_vertex(s, &step.start) || is_vertex(s, &step.end) {
                continue;
            }
            let sb = s.enclosure(POINT_PREC)?;
            let ds = &sb - &z0;
            if ds.contains_zero() {
                res.push(s.clone());
                continue;
            }
            let t = &(&z1 - &z0) / &ds;
            if t.im().contains_zero() && !(t.re() - one.re()).is_negative() {
                res.push(s.clone());
            }
        }
        Ok(res)
    }
}

fn is_vertex(s: &Algebraic, pt: &Point) -> bool {
    match (s, &pt.value) {
        (Algebraic::Exact(a), PointValue::Exact(b)) => a == b,
        (Algebraic::Isolated { poly, enclosure }, PointValue::Exact(b)) => {
            poly.eval(b).is_zero() && enclosure.overlaps(&b.enclose(POINT_PREC))
        }
        (_, PointValue::Ball(b)) => pt.force_singular && s.approx() == b.to_complex64(),
    }
}

fn mag_to_rational(m: Mag) -> Option<BigRational> {
    if !m.is_finite() || m.is_zero() {
        return None;
    }
    let x = m.to_f64_lower();
    if x > 0.0 && x.is_finite() {
        return BigRational::from_float(x);
    }
    let e = m.exponent() - 1;
    let two = BigInt::from(2);
    Some(if e >= 0 {
        BigRational::from_integer(two.pow(e as u32))
    } else {
        BigRational::new(BigInt::one(), two.pow((-e) as u32))
    })
}

/// An analytic continuation step between two points.
#[derive(Clone, Debug)]
pub struct Step {
    pub start: Point,
    pub end: Point,
    pub branch: Vec<i64>,
    /// How many more times the step may be split on failure.
    pub max_split: u32,
}

impl Step {
    pub fn new(start: Point, end: Point) -> Self {
        Self {
            start,
            end,
            branch: vec![0],
            max_split: 3,
        }
    }

    pub fn with_max_split(mut self, max_split: u32) -> Self {
        self.max_split = max_split;
        self
    }

    pub fn with_branch(mut self, branch: Vec<i64>) -> Self {
        self.branch = branch;
        self
    }

    pub fn is_exact(&self) -> bool {
        self.start.is_exact() && self.end.is_exact()
    }

    pub fn reversed(&self) -> Self {
        Step {
            start: self.end.clone(),
            end: self.start.clone(),
            branch: self.branch.clone(),
            max_split: self.max_split,
        }
    }

    /// `end - start`, exact when both endpoints are.
    pub fn delta(&self) -> PointValue {
        match (&self.start.value, &self.end.value) {
            (PointValue::Exact(a), PointValue::Exact(b)) => PointValue::Exact(b - a),
            (a, b) => {
                let prec = POINT_PREC.max(ball_prec(a)).max(ball_prec(b));
                PointValue::Ball(&b.ball(prec) - &a.ball(prec))
            }
        }
    }

    pub fn evpt(&self, jet_order: usize) -> EvaluationPoint {
        let evpt = match self.delta() {
            PointValue::Exact(q) => EvaluationPoint::exact(q, jet_order),
            PointValue::Ball(b) => EvaluationPoint::new(b, jet_order),
        };
        evpt.with_branch(self.branch.clone())
    }

    /// Upper bound on `|end - start|`.
    pub fn length(&self) -> Mag {
        self.delta().ball(POINT_PREC).abs_upper()
    }

    /// Step length relative to the convergence radius at the start.
    pub fn cvg_ratio(&self, an: &PointAnalyzer<'_>) -> Result<f64> {
        Ok(self.length().div(an.dist_to_sing(&self.start)?).to_f64())
    }

    /// Halves of the step; when one endpoint is singular the split point sits
    /// two thirds of the way from it, closer to the regular endpoint.
    pub fn split(&self, an: &PointAnalyzer<'_>) -> Result<(Step, Step)> {
        if self.max_split == 0 {
            return Err(Error::invalid_input(format!("step {self} cannot be split")));
        }
        let (wa, wb) = if an.is_singular(&self.start)? {
            (qqi_ratio(1, 3), qqi_ratio(2, 3))
        } else if an.is_singular(&self.end)? {
            (qqi_ratio(2, 3), qqi_ratio(1, 3))
        } else {
            (qqi_ratio(1, 2), qqi_ratio(1, 2))
        };
        let exact = |p: &Point| match &p.value {
            PointValue::Exact(q) => q.clone(),
            PointValue::Ball(b) => ball_midpoint(b),
        };
        let mid = exact(&self.start) * wa + exact(&self.end) * wb;
        let tol = mag_to_rational(self.length().mul_2exp(-10));
        let mid = match tol {
            Some(tol) => rationalize_near(&mid, &tol),
            None => mid,
        };
        let mid = Point::new(mid);
        debug!("splitting {self} at {mid}");
        let s0 = Step {
            start: self.start.clone(),
            end: mid.clone(),
            branch: self.branch.clone(),
            max_split: self.max_split - 1,
        };
        let s1 = Step {
            start: mid,
            end: self.end.clone(),
            branch: vec![0],
            max_split: self.max_split - 1,
        };
        Ok((s0, s1))
    }

    /// The step from `prev_end` (the simplified version of `self.start`) to
    /// the simplified version of `self.end`, and when the end is kept, the
    /// deviation step from there to the end itself.
    pub fn chain_simple(
        &self,
        prev_end: &Point,
        an: &PointAnalyzer<'_>,
    ) -> Result<(Step, Option<Step>)> {
        let main = Step {
            start: prev_end.clone(),
            end: an.simple_approx(&self.end)?,
            branch: self.branch.clone(),
            max_split: self.max_split,
        };
        let dev = if self.end.keep {
            Some(Step {
                start: main.end.clone(),
                end: self.end.clone(),
                branch: vec![0],
                max_split: 0,
            })
        } else {
            None
        };
        Ok((main, dev))
    }

    pub fn check_singularity(&self, an: &PointAnalyzer<'_>) -> Result<()> {
        let sing = an.offending_singularities(self)?;
        if sing.is_empty() {
            return Ok(());
        }
        Err(Error::SingularPath {
            step: self.to_string(),
            points: sing.iter().map(|s| s.to_string()).collect(),
        })
    }

    pub fn check_convergence(&self, an: &PointAnalyzer<'_>) -> Result<()> {
        let reference = if an.is_regular_singular(&self.end)? {
            &self.end
        } else {
            &self.start
        };
        if self.length() < an.dist_to_sing(reference)? {
            return Ok(());
        }
        Err(Error::ConvergenceDomain {
            step: self.to_string(),
            point: an.describe(reference),
        })
    }
}

fn ball_prec(v: &PointValue) -> u32 {
    match v {
        PointValue::Exact(_) => 0,
        PointValue::Ball(b) => b.prec(),
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} --> {}", self.start, self.end)
    }
}

/// A polygonal path through the complex plane.
#[derive(Clone, Debug)]
pub struct Path {
    pub vert: Vec<Point>,
}

impl Path {
    pub fn new(vert: Vec<Point>) -> Result<Self> {
        if vert.is_empty() {
            return Err(Error::invalid_input("empty path"));
        }
        Ok(Self { vert })
    }

    pub fn from_values<V: Into<PointValue>>(values: impl IntoIterator<Item = V>) -> Result<Self> {
        Self::new(values.into_iter().map(Point::new).collect())
    }

    /// Number of steps.
    pub fn len(&self) -> usize {
        self.vert.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn steps(&self) -> Vec<Step> {
        self.vert
            .windows(2)
            .map(|w| {
                let step = Step::new(w[0].clone(), w[1].clone());
                match &w[0].outgoing_branch {
                    Some(b) => step.with_branch(b.clone()),
                    None => step,
                }
            })
            .collect()
    }

    pub fn check_singularity(&self, an: &PointAnalyzer<'_>) -> Result<()> {
        self.steps()
            .iter()
            .try_for_each(|s| s.check_singularity(an))
    }

    pub fn check_convergence(&self, an: &PointAnalyzer<'_>) -> Result<()> {
        self.steps()
            .iter()
            .try_for_each(|s| s.check_convergence(an))
    }

    /// Replaces every crossing of a singularity by a detour around it.
    pub fn bypass_singularities(&self, an: &PointAnalyzer<'_>) -> Result<Path> {
        let mut new = Vec::new();
        for step in self.steps() {
            new.push(step.start.clone());
            let z0 = step.start.ball(POINT_PREC);
            let z1 = step.end.ball(POINT_PREC);
            let delta = &z1 - &z0;
            let dir = delta.div_real(&crate::ball::RealBall::from_f64(
                delta.abs_upper().to_f64(),
                POINT_PREC,
            ));
            let mut sings = an.offending_singularities(&step)?;
            sings.sort_by(|a, b| {
                let da = (a.approx() - z0.to_complex64()).norm();
                let db = (b.approx() - z0.to_complex64()).norm();
                da.total_cmp(&db)
            });
            for s in sings {
                let sb = s.enclosure(POINT_PREC)?;
                let ds = an.dist_to_sing(&Point::singular(sb.clone()))?;
                let d0 = (&sb - &z0).abs_lower();
                let d1 = (&sb - &z1).abs_lower();
                let mut offsets = Vec::new();
                if !(d0 < ds) {
                    offsets.push(ComplexBall::from_i64(-1, POINT_PREC));
                }
                offsets.push(ComplexBall::imaginary_unit(POINT_PREC));
                if !(d1 < ds) {
                    offsets.push(ComplexBall::one_at(POINT_PREC));
                }
                let rad = ds.mul_2exp(-1).min(d0).min(d1);
                let rad_ball = ComplexBall::from_f64(rad.to_f64_lower(), 0.0, POINT_PREC);
                for z in offsets {
                    let p = &sb + &(&(&rad_ball * &z) * &dir);
                    let p = p.add_error(rad.mul_2exp(-6));
                    let q = rationalize(&p).ok_or_else(|| {
                        Error::precision(format!("cannot bypass singular point {s}"))
                    })?;
                    new.push(Point::new(q));
                }
            }
        }
        if let Some(last) = self.vert.last() {
            new.push(last.clone());
        }
        Path::new(new)
    }

    /// Inserts intermediate points until every step stays well inside the
    /// disk of convergence at its start, or at its end when the end is
    /// singular.
    pub fn subdivide(&self, an: &PointAnalyzer<'_>, threshold: f64, factor: f64) -> Result<Path> {
        let mut new = vec![self.vert[0].clone()];
        let mut i = 1;
        let max_points = 64 * self.vert.len() + 10_000;
        while i < self.vert.len() {
            if new.len() > max_points {
                return Err(Error::precision("path subdivision does not terminate"));
            }
            let cur = new[new.len() - 1].clone();
            let next = &self.vert[i];
            let rad = an.dist_to_sing(&cur)?;
            let step = Step::new(cur.clone(), next.clone());
            let dist = step.length();
            let accept = if an.is_ordinary(next)? {
                dist <= rad.mul_f64(threshold)
            } else {
                cur.value == next.value
                    || (an.is_ordinary(&cur)?
                        && dist <= an.dist_to_sing(next)?.mul_f64(threshold))
            };
            if accept {
                new.push(next.clone());
                i += 1;
                continue;
            }
            let z0 = cur.ball(POINT_PREC);
            let delta = &next.ball(POINT_PREC) - &z0;
            let scale = factor * rad.to_f64_lower() / delta.abs_upper().to_f64();
            let interm = &z0 + &delta.mul_real(&crate::ball::RealBall::from_f64(scale, POINT_PREC));
            let interm = interm.add_error(rad.mul_2exp(-4));
            Step::new(cur.clone(), Point::new(interm.clone())).check_singularity(an)?;
            let q = rationalize(&interm)
                .ok_or_else(|| Error::precision("cannot rationalize intermediate point"))?;
            debug!("subdividing {cur} --> {next} at {}", format_qqi(&q));
            new.push(Point::new(q));
        }
        Path::new(new)
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.vert.iter().map(|v| v.to_string()).collect();
        f.write_str(&parts.join(" --> "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exact::{qqi_gauss, qqi_int, rat};
    use num_traits::Signed;

    fn arctan_op() -> DiffOp {
        // (x^2 + 1) D^2 + 2x D
        DiffOp::from_int_coeffs(&[&[], &[0, 2], &[1, 0, 1]])
    }

    fn gauss(re: i64, im: i64) -> QQi {
        qqi_gauss(rat(re, 1), rat(im, 1))
    }

    #[test]
    fn classification() {
        let dop = DiffOp::from_int_coeffs(&[&[], &[1], &[0, 1]]);
        let an = PointAnalyzer::new(&dop).unwrap();
        let origin = Point::new(0);
        assert!(!an.is_ordinary(&origin).unwrap());
        assert!(an.is_regular(&origin).unwrap());
        assert!(an.is_ordinary(&Point::new(1)).unwrap());
        assert_eq!(an.describe(&origin), "regular singular point 0");
        let irregular = DiffOp::from_int_coeffs(&[&[-1], &[0, 0, 1]]);
        let an = PointAnalyzer::new(&irregular).unwrap();
        assert!(!an.is_regular(&Point::new(0)).unwrap());
    }

    #[test]
    fn distance_to_singularities() {
        let dop = arctan_op();
        let an = PointAnalyzer::new(&dop).unwrap();
        assert_eq!(an.singularities().len(), 2);
        let d = an.dist_to_sing(&Point::new(0)).unwrap().to_f64();
        assert!((d - 1.0).abs() < 1e-9 && d <= 1.0);
        let at_i = Point::new(gauss(0, 1));
        let d = an.dist_to_sing(&at_i).unwrap().to_f64();
        assert!((d - 2.0).abs() < 1e-9);
        let exp = DiffOp::from_int_coeffs(&[&[-1], &[1]]);
        let an = PointAnalyzer::new(&exp).unwrap();
        assert!(!an.dist_to_sing(&Point::new(5)).unwrap().is_finite());
    }

    #[test]
    fn ordinary_point_structure() {
        let dop = DiffOp::from_int_coeffs(&[&[1], &[0, 1], &[0, 0, 1], &[1]]);
        let an = PointAnalyzer::new(&dop).unwrap();
        let s = an.local_basis_structure(&Point::new(1)).unwrap();
        assert_eq!(s.len(), 3);
        for (k, sol) in s.iter().enumerate() {
            assert_eq!(sol.shift, k);
            assert_eq!(sol.log_power, 0);
            assert_eq!(sol.valuation.re, k as f64);
        }
    }

    #[test]
    fn singular_steps_are_detected() {
        let dop = arctan_op();
        let an = PointAnalyzer::new(&dop).unwrap();
        let through = Step::new(Point::new(gauss(0, -2)), Point::new(gauss(0, 2)));
        let err = through.check_singularity(&an).unwrap_err();
        match err {
            Error::SingularPath { points, .. } => assert_eq!(points.len(), 2),
            other => panic!("unexpected error {other}"),
        }
        let beside = Step::new(Point::new(0), Point::new(gauss(2, 2)));
        assert!(beside.check_singularity(&an).is_ok());
        let towards = Step::new(Point::new(0), Point::new(gauss(0, 1)));
        assert!(towards.check_singularity(&an).is_ok());
    }

    #[test]
    fn convergence_is_checked_at_the_regular_singular_end() {
        let dop = DiffOp::from_int_coeffs(&[&[], &[1], &[0, 1, -1]]);
        // x (1 - x) D^2 + D: singular at 0 and 1
        let an = PointAnalyzer::new(&dop).unwrap();
        let step = Step::new(Point::new(1), Point::new(0));
        assert!(matches!(
            step.check_convergence(&an),
            Err(Error::ConvergenceDomain { .. })
        ));
        let short = Step::new(Point::new(qqi_ratio(1, 2)), Point::new(0));
        assert!(short.check_convergence(&an).is_ok());
    }

    #[test]
    fn subdivision_is_valid_and_idempotent() {
        let dop = arctan_op();
        let an = PointAnalyzer::new(&dop).unwrap();
        let path = Path::from_values([qqi_int(0), gauss(3, 1), qqi_int(-2)]).unwrap();
        path.check_singularity(&an).unwrap();
        let sub = path.subdivide(&an, 0.6, 0.5).unwrap();
        assert!(sub.len() > path.len());
        sub.check_singularity(&an).unwrap();
        sub.check_convergence(&an).unwrap();
        let again = sub.subdivide(&an, 0.6, 0.5).unwrap();
        assert_eq!(again.vert, sub.vert);
    }

    #[test]
    fn bypassing_a_singularity() {
        let dop = arctan_op();
        let an = PointAnalyzer::new(&dop).unwrap();
        let path = Path::from_values([qqi_int(0), gauss(0, 2)]).unwrap();
        assert!(path.check_singularity(&an).is_err());
        let detour = path.bypass_singularities(&an).unwrap();
        assert!(detour.len() > 1);
        detour.check_singularity(&an).unwrap();
    }

    #[test]
    fn splitting_steps() {
        let dop = DiffOp::from_int_coeffs(&[&[], &[1], &[0, 1]]);
        let an = PointAnalyzer::new(&dop).unwrap();
        let step = Step::new(Point::new(0), Point::new(qqi_ratio(3, 4)));
        let (s0, s1) = step.split(&an).unwrap();
        // two thirds of the way from the singular start
        assert_eq!(s0.end.value, PointValue::Exact(qqi_ratio(1, 2)));
        assert_eq!(s1.start, s0.end);
        let (r0, _) = step.reversed().split(&an).unwrap();
        assert_eq!(r0.end.value, PointValue::Exact(qqi_ratio(1, 2)));
        let far = Step::new(Point::new(0), Point::new(3));
        let (f0, _) = far.split(&an).unwrap();
        assert_eq!(f0.end.value, PointValue::Exact(qqi_int(2)));
        assert_eq!(s0.max_split, 2);
        let ordinary = Step::new(Point::new(1), Point::new(2)).with_max_split(0);
        assert!(ordinary.split(&an).is_err());
    }

    #[test]
    fn simple_approximations() {
        let dop = arctan_op();
        let an = PointAnalyzer::new(&dop).unwrap();
        let ball = Point::new(ComplexBall::from_f64(0.25, 0.0, 64).add_error(Mag::from_f64(1e-3)));
        let simple = an.simple_approx(&ball).unwrap();
        assert_eq!(simple.value, PointValue::Exact(qqi_ratio(1, 4)));
        let big = BigRational::new(BigInt::from(1) << 100u32, (BigInt::from(1) << 101u32) + 1);
        let tall = Point::new(QQi::new(big, BigRational::zero()));
        let simple = an.simple_approx(&tall).unwrap();
        let q = simple.value.as_exact().unwrap();
        assert!(height_bits(q) < 16);
        assert!((q.re.clone() - rat(1, 2)).abs() < rat(1, 16));
    }
}
