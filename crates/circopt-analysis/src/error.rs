//! Error types for circopt-analysis.

use thiserror::Error;

use crate::verifier::VerifierError;

#[derive(Debug, Error)]
pub enum Error {
    #[error("margin analysis requires a starting point that passes verification")]
    InvalidStartingPoint,

    #[error("yield percentage is undefined before any samples are recorded")]
    NoSamples,

    #[error(
        "invalid search boundary for {parameter}: [{lower}, {upper}] does not fit within [{minimum}, {maximum}]"
    )]
    InvalidBoundary {
        parameter: String,
        lower: f64,
        upper: f64,
        minimum: f64,
        maximum: f64,
    },

    #[error(
        "unable to determine next guess: {message} ({iterations} iterations, {evaluations} evaluations)"
    )]
    CandidateSearchFailure {
        message: String,
        iterations: usize,
        evaluations: usize,
    },

    #[error(transparent)]
    Verifier(#[from] VerifierError),

    #[error("score is undefined without any recorded points of failure")]
    NoFailurePoints,

    #[error("coordinate {index} must be strictly positive, got {value}")]
    NonPositiveCoordinate { index: usize, value: f64 },

    #[error("invalid vector dimensions: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("parameter not found: {0}")]
    MissingParameter(String),

    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("worker pool error: {0}")]
    WorkerPool(String),
}

pub type Result<T> = std::result::Result<T, Error>;
