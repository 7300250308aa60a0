//! Summation backends behind `step_transition_matrix`.
//!
//! A backend computes the transition matrix of a single step whose start is
//! the origin of the (re-centered) operator. Backends live outside the core
//! numerics and report failures through `anyhow`; the errors raised by this
//! crate travel through unchanged and are recovered with
//! [`Error::from_backend`].

use nalgebra::DMatrix;

use super::types::{Algorithm, SummationSettings};
use crate::ball::{ComplexBall, Mag};
use crate::error::Error;
use crate::operator::DiffOp;
use crate::summation::{self, EvaluationPoint};

pub trait SummationBackend {
    fn algorithm(&self) -> Algorithm;

    fn fundamental_matrix_ordinary(
        &self,
        dop: &DiffOp,
        evpt: &EvaluationPoint,
        eps: Mag,
        settings: &SummationSettings,
        fail_fast: bool,
    ) -> anyhow::Result<DMatrix<ComplexBall>>;

    fn fundamental_matrix_regular(
        &self,
        dop: &DiffOp,
        evpt: &EvaluationPoint,
        eps: Mag,
        settings: &SummationSettings,
        fail_fast: bool,
    ) -> anyhow::Result<DMatrix<ComplexBall>>;
}

/// Term-by-term summation with certified tail bounds.
#[derive(Debug, Clone, Copy, Default)]
pub struct DirectSummation;

impl SummationBackend for DirectSummation {
    fn algorithm(&self) -> Algorithm {
        Algorithm::Naive
    }

    fn fundamental_matrix_ordinary(
        &self,
        dop: &DiffOp,
        evpt: &EvaluationPoint,
        eps: Mag,
        settings: &SummationSettings,
        fail_fast: bool,
    ) -> anyhow::Result<DMatrix<ComplexBall>> {
        Ok(summation::fundamental_matrix_ordinary(
            dop, evpt, eps, settings, fail_fast,
        )?)
    }

    fn fundamental_matrix_regular(
        &self,
        dop: &DiffOp,
        evpt: &EvaluationPoint,
        eps: Mag,
        settings: &SummationSettings,
        fail_fast: bool,
    ) -> anyhow::Result<DMatrix<ComplexBall>> {
        Ok(summation::fundamental_matrix_regular(
            dop, evpt, eps, settings, fail_fast,
        )?)
    }
}

/// The backends available to one continuation run, looked up by algorithm.
pub struct Backends {
    direct: Box<dyn SummationBackend>,
    binsplit: Option<Box<dyn SummationBackend>>,
}

impl Default for Backends {
    fn default() -> Self {
        Self {
            direct: Box::new(DirectSummation),
            binsplit: None,
        }
    }
}

impl Backends {
    pub fn with_binsplit(mut self, backend: Box<dyn SummationBackend>) -> Self {
        self.binsplit = Some(backend);
        self
    }

    pub fn has(&self, algorithm: Algorithm) -> bool {
        match algorithm {
            Algorithm::Naive => true,
            Algorithm::Binsplit => self.binsplit.is_some(),
        }
    }

    pub fn get(&self, algorithm: Algorithm) -> crate::error::Result<&dyn SummationBackend> {
        match algorithm {
            Algorithm::Naive => Ok(self.direct.as_ref()),
            Algorithm::Binsplit => self.binsplit.as_deref().ok_or_else(|| {
                Error::unsupported("no binary splitting backend is available")
            }),
        }
    }
}

impl Error {
    /// Recovers the crate error a backend passed through `anyhow`.
    pub fn from_backend(err: anyhow::Error) -> Self {
        match err.downcast::<Error>() {
            Ok(e) => e,
            Err(e) => Error::Backend(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exact::qqi_int;

    #[test]
    fn crate_errors_survive_the_backend_boundary() {
        let dop = DiffOp::from_int_coeffs(&[&[], &[1], &[0, 1]]);
        let evpt = EvaluationPoint::exact(qqi_int(1), 2);
        let err = DirectSummation
            .fundamental_matrix_ordinary(&dop, &evpt, Mag::from_f64(1e-10), &SummationSettings::default(), false)
            .unwrap_err();
        assert!(matches!(Error::from_backend(err), Error::InvalidInput(_)));
        let foreign = Error::from_backend(anyhow::anyhow!("out of memory"));
        assert!(matches!(foreign, Error::Backend(_)));
    }

    #[test]
    fn missing_binsplit_backend() {
        let backends = Backends::default();
        assert_eq!(backends.get(Algorithm::Naive).unwrap().algorithm(), Algorithm::Naive);
        assert!(matches!(
            backends.get(Algorithm::Binsplit),
            Err(Error::Unsupported(_))
        ));
    }
}
