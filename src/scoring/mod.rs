//! Risk scoring
//!
//! Scoring algorithms are independent plugins implementing [`ScoringAlgorithm`].
//! A [`ScoringEngine`] holds the registered set, evaluates each one in
//! isolation against a session and folds the results into a single
//! confidence-weighted risk score.

pub mod algorithms;
pub mod engine;

pub use algorithms::{
    builtin_algorithm, default_engine, PauseRhythm, PressureVariance, VelocityUniformity,
    BUILTIN_ALGORITHMS,
};
pub use engine::{combine, Evaluation, ScoringEngine};

use crate::error::ScoringError;
use crate::types::{CaptchaSession, ScoringResult};

/// A named, versioned risk signal over a finished session.
///
/// Implementations must be pure functions of the session: no shared mutable
/// state, no dependence on wall-clock time. They may be evaluated from any
/// thread. Returning an error (or panicking) yields a sentinel result for this
/// algorithm only.
pub trait ScoringAlgorithm: Send + Sync {
    fn name(&self) -> &str;

    fn version(&self) -> &str;

    fn score(&self, session: &CaptchaSession) -> Result<ScoringResult, ScoringError>;
}
