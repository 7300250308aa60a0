//! Settings and records of the continuation driver.
//!
//! `Context` is a plain serde struct so front ends can load it from a file or
//! a request body; the library itself only reads it.

use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

use crate::ball::ComplexBall;
use crate::error::{Error, Result};
use crate::local_solutions::SolutionStructure;
use crate::path::PointValue;

/// Summation algorithm preference.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Algorithm {
    Naive,
    Binsplit,
}

/// Which input vertices produce an output record.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum KeepPolicy {
    All,
    #[default]
    Last,
}

/// Knobs of a single series summation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct SummationSettings {
    /// Terms between two evaluations of the stopping criterion.
    pub stride: usize,
    /// Working precision, in bits, above which summation gives up.
    pub max_prec: u32,
    pub max_terms: Option<usize>,
    /// Precision doublings allowed before a step that may still be split
    /// reports failure.
    pub fail_fast_doublings: u32,
}

impl SummationSettings {
    pub fn validate(&self) -> Result<()> {
        if self.stride == 0 {
            return Err(Error::invalid_input("summation stride must be positive"));
        }
        if self.max_prec < 64 {
            return Err(Error::invalid_input(format!(
                "max_prec = {} is below 64 bits",
                self.max_prec
            )));
        }
        Ok(())
    }
}

impl Default for SummationSettings {
    fn default() -> Self {
        Self {
            stride: 50,
            max_prec: 16384,
            max_terms: None,
            fail_fast_doublings: 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Context {
    pub algorithm: Option<Algorithm>,
    pub force_algorithm: bool,
    /// Treat the solutions as analytic at the singular points of the
    /// operator, bypassing them instead of rejecting paths through them.
    pub assume_analytic: bool,
    pub keep: KeepPolicy,
    /// Replace inexact vertices by their midpoints.
    pub squash_intervals: bool,
    pub return_local_bases: bool,
    pub max_split: u32,
    pub summation: SummationSettings,
}

impl Default for Context {
    fn default() -> Self {
        Self {
            algorithm: None,
            force_algorithm: false,
            assume_analytic: false,
            keep: KeepPolicy::Last,
            squash_intervals: false,
            return_local_bases: false,
            max_split: 3,
            summation: SummationSettings::default(),
        }
    }
}

impl Context {
    pub fn validate(&self) -> Result<()> {
        self.summation.validate()?;
        if self.force_algorithm && self.algorithm.is_none() {
            return Err(Error::invalid_input(
                "force_algorithm requires an algorithm",
            ));
        }
        Ok(())
    }

    pub fn prefer_binsplit(&self) -> bool {
        self.algorithm == Some(Algorithm::Binsplit)
    }

    pub fn force_binsplit(&self) -> bool {
        self.prefer_binsplit() && self.force_algorithm
    }

    pub fn prefer_naive(&self) -> bool {
        self.algorithm == Some(Algorithm::Naive)
    }

    pub fn force_naive(&self) -> bool {
        self.prefer_naive() && self.force_algorithm
    }
}

/// Values of the solutions at one kept point.
///
/// Row `k` of `value` holds the coefficients of `η^k` in the expansion at
/// `point + η`, that is `y^(k)(point) / k!`; one column per solution.
#[derive(Debug, Clone)]
pub struct ContinuationRecord {
    pub point: PointValue,
    pub value: DMatrix<ComplexBall>,
    pub structure: Option<Vec<SolutionStructure>>,
}
