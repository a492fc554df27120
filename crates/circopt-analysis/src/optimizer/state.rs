//! Guess history and failure point cloud.

use crate::buffer::{RowsView, VectorBuffer};
use crate::error::Result;

use super::score::{check_positive, score};

/// Everything the optimizer has learned so far.
///
/// Guesses are points that passed verification. Failure points are points
/// that failed verification or lie on a measured margin boundary.
#[derive(Debug, Clone)]
pub struct OptimizeState {
    guesses: VectorBuffer,
    failures: VectorBuffer,
}

impl OptimizeState {
    pub fn new(num_parameters: usize) -> Self {
        Self {
            guesses: VectorBuffer::new(num_parameters),
            failures: VectorBuffer::new(num_parameters),
        }
    }

    pub fn add_guess(&mut self, point: &[f64]) -> Result<()> {
        self.guesses.push(point)
    }

    /// Record a failure point. Every coordinate must be strictly positive.
    pub fn add_failure(&mut self, point: &[f64]) -> Result<()> {
        check_positive(point)?;
        self.failures.push(point)
    }

    pub fn guesses(&self) -> RowsView<'_> {
        self.guesses.view()
    }

    pub fn failures(&self) -> RowsView<'_> {
        self.failures.view()
    }

    /// Score `x` against the current failure cloud.
    pub fn score(&self, x: &[f64]) -> Result<f64> {
        score(self.failures.view(), x)
    }

    /// Highest-scoring guess and its score; the first one wins ties.
    pub fn best_guess(&self) -> Result<Option<(Vec<f64>, f64)>> {
        let mut best: Option<(&[f64], f64)> = None;
        for guess in self.guesses.view().iter() {
            let value = self.score(guess)?;
            match best {
                Some((_, best_value)) if value <= best_value => {}
                _ => best = Some((guess, value)),
            }
        }
        Ok(best.map(|(point, value)| (point.to_vec(), value)))
    }
}
