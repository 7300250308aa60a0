//! The `ancont_core` crate computes certified enclosures of solutions of linear
//! differential equations with polynomial coefficients (D-finite functions),
//! continued analytically along paths in the complex plane.
//!
//! Key components:
//! - **Arithmetic**: `ball` (certified real and complex balls), `exact` (Gaussian
//!   rationals), `poly`, `jet` (truncated power series), `roots` (algebraic numbers).
//! - **Operators**: `operator` (differential operators, θ-form, reduction),
//!   `recurrence` (backward recurrences on series coefficients).
//! - **Local solutions**: `local_solutions` (indicial structure, canonical local
//!   bases, logarithmic series), `bounds` (certified tail bounds), `summation`.
//! - **Continuation**: `path` (points, steps, subdivision), `continuation`
//!   (transition matrices and the path driver).
pub mod accuracy;
pub mod ball;
pub mod bounds;
pub mod continuation;
pub mod error;
pub mod exact;
pub mod jet;
pub mod local_solutions;
pub mod operator;
pub mod path;
pub mod poly;
pub mod recurrence;
pub mod roots;
pub mod summation;
pub mod traits;

pub use accuracy::Accuracy;
pub use ball::{ComplexBall, Mag, RealBall};
pub use continuation::{analytic_continuation, step_transition_matrix, Context, ContinuationRecord};
pub use error::{Error, Result};
pub use operator::DiffOp;
pub use path::{Path, Point, PointValue, Step};
