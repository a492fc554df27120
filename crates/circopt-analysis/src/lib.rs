//! Margin analysis, Monte Carlo yield and yield-aware optimization of
//! simulated circuits.
//!
//! Everything in this crate talks to the circuit through a [`Verifier`]: an
//! expensive, opaque pass/fail check of a parameter set. The crate provides:
//!
//! - [`MarginAnalysis`]: how far each parameter can be scaled around a
//!   nominal point before verification fails
//! - [`YieldAnalysis`]: the fraction of normally distributed samples that pass
//! - [`Optimizer`]: an iterative search for the point farthest from every
//!   known failure
//! - [`VectorBuffer`]: the growable row store behind the optimizer's history
//!
//! Parallel work runs on a fixed-size worker pool. Each worker builds its own
//! verifier from a shared [`VerifierFactory`], so no simulator state is
//! shared between workers.

pub mod buffer;
pub mod error;
pub mod margin;
pub mod optimizer;
pub mod parameters;
mod pool;
pub mod rng;
pub mod verifier;
pub mod yield_analysis;

pub use buffer::{RowsView, VectorBuffer};
pub use error::{Error, Result};
pub use margin::{
    CriticalMargin, Direction, Margin, MarginAnalysis, MarginConfig, MarginResult, search_line,
};
pub use optimizer::{
    OptimizeConfig, OptimizeMethod, OptimizeOutcome, OptimizeState, Optimizer, ParameterBounds,
    default_margin_workers,
};
pub use parameters::{ParameterLayout, ParameterSet, is_close};
pub use verifier::{Verifier, VerifierError, VerifierFactory};
pub use yield_analysis::{NormalDistribution, YieldAnalysis, YieldTally, split_work};
