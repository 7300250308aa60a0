//! Error taxonomy shared by every stage of the continuation pipeline.
//!
//! Retryable conditions (`Precision`, `BoundPrecision`) are recovered by the
//! caller, either by doubling the working precision or by splitting a step.
//! Everything else is fatal for the current request.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Working precision was insufficient to certify the requested accuracy.
    #[error("precision error: {0}")]
    Precision(String),

    /// The tail bound could not be certified at the current precision.
    #[error("bound precision error: {0}")]
    BoundPrecision(String),

    #[error(
        "Step {step} passes through or too close to singular point(s) {} \
         (to compute the connection to a singular point, make it a vertex of the path)",
        .points.join(", ")
    )]
    SingularPath { step: String, points: Vec<String> },

    #[error(
        "Step {step} escapes from the disk of (guaranteed) convergence of the solutions at {point}"
    )]
    ConvergenceDomain { step: String, point: String },

    #[error("not supported: {0}")]
    Unsupported(String),

    #[error("invalid initial data: {0}")]
    InvalidInitialData(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("summation exceeded the limit of {limit} terms")]
    TermLimit { limit: usize },

    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

impl Error {
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Precision(_) | Error::BoundPrecision(_))
    }

    pub(crate) fn precision(msg: impl Into<String>) -> Self {
        Error::Precision(msg.into())
    }

    pub(crate) fn bound_precision(msg: impl Into<String>) -> Self {
        Error::BoundPrecision(msg.into())
    }

    pub(crate) fn unsupported(msg: impl Into<String>) -> Self {
        Error::Unsupported(msg.into())
    }

    pub(crate) fn invalid_input(msg: impl Into<String>) -> Self {
        Error::InvalidInput(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_classification() {
        assert!(Error::precision("x").is_retryable());
        assert!(Error::bound_precision("x").is_retryable());
        assert!(!Error::unsupported("x").is_retryable());
        assert!(!Error::TermLimit { limit: 3 }.is_retryable());
        let backend: Error = anyhow::anyhow!("backend failed").into();
        assert!(!backend.is_retryable());
    }

    #[test]
    fn singular_path_message_names_points() {
        let err = Error::SingularPath {
            step: "0 --> 2".to_string(),
            points: vec!["1".to_string(), "1 + I".to_string()],
        };
        let message = format!("{err}");
        assert!(message.contains("0 --> 2"));
        assert!(message.contains("1, 1 + I"));
        assert!(message.contains("make it a vertex"));
    }
}
