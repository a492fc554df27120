//! Error types for the verifier crate.

use std::path::PathBuf;

use circopt_analysis::VerifierError;
use thiserror::Error;

/// Result type for verifier operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while preparing or running a verification.
#[derive(Debug, Error)]
pub enum Error {
    /// JoSIM is not installed or not found in PATH.
    #[error("josim not found: {0}")]
    JosimNotFound(String),

    /// JoSIM execution failed.
    #[error("josim execution failed: {0}")]
    JosimExecutionFailed(String),

    /// JoSIM timed out.
    #[error("josim timed out after {0} seconds")]
    JosimTimeout(u64),

    /// Malformed spec file.
    #[error("invalid spec file: {0}")]
    SpecFileParse(String),

    /// Malformed simulator output.
    #[error("failed to parse simulation output: {0}")]
    OutputParse(String),

    /// A spec file trace is missing from the simulator output.
    #[error("trace not found in simulation output: {0}")]
    TraceNotFound(String),

    /// A parameter has no `.param` line in the circuit.
    #[error("parameter not defined in circuit: {0}")]
    ParameterNotFound(String),

    /// Failed to read an input file.
    #[error("failed to read {path}: {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Temp file error.
    #[error("temp file error: {0}")]
    TempFile(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<Error> for VerifierError {
    fn from(error: Error) -> Self {
        VerifierError::new(error)
    }
}
