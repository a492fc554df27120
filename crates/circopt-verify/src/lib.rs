//! JoSIM-backed verification of superconducting circuits.
//!
//! This crate provides the [`Verifier`](circopt_analysis::Verifier) used by
//! the analyses in `circopt-analysis`:
//! - Reading reference spec files of expected phase flips
//! - Preparing a netlist and substituting `.param` values
//! - Running JoSIM as a subprocess and parsing its CSV output
//! - Comparing simulated phase traces against a spec file

pub mod error;

mod netlist;
mod output;
mod runner;
mod spec_file;
mod verifier;

pub use error::{Error as VerifyError, Result as VerifyResult};
pub use netlist::Netlist;
pub use output::{SimulationOutput, Trace};
pub use runner::{JosimConfig, run_josim};
pub use spec_file::SpecFile;
pub use verifier::{JosimVerifier, JosimVerifierFactory, VerifyConfig, matches_spec};
