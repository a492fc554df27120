//! Distance of a candidate from the known points of failure.
//!
//! For a candidate `x` and failure point `f`, the relative offset is the
//! Euclidean norm of `f / x - 1` taken elementwise. The score is the smallest
//! such offset over every recorded failure point, scaled by 100, so a point
//! that sits exactly on a failure point scores 0 and a higher score means more
//! relative headroom against every failure mode seen so far.

use crate::buffer::RowsView;
use crate::error::{Error, Result};

/// Reject candidates with a zero, negative or non-finite coordinate.
pub fn check_positive(x: &[f64]) -> Result<()> {
    match x.iter().position(|value| !(*value > 0.0) || !value.is_finite()) {
        Some(index) => Err(Error::NonPositiveCoordinate {
            index,
            value: x[index],
        }),
        None => Ok(()),
    }
}

/// Relative distance of one failure point from `x`.
#[inline]
fn relative_distance(failure: &[f64], x: &[f64]) -> f64 {
    failure
        .iter()
        .zip(x)
        .map(|(f, xi)| {
            let offset = f / xi - 1.0;
            offset * offset
        })
        .sum::<f64>()
        .sqrt()
}

/// Score `x` against a cloud of failure points.
pub fn score(failures: RowsView<'_>, x: &[f64]) -> Result<f64> {
    if x.len() != failures.width() {
        return Err(Error::DimensionMismatch {
            expected: failures.width(),
            actual: x.len(),
        });
    }
    check_positive(x)?;

    let nearest = failures
        .iter()
        .map(|failure| relative_distance(failure, x))
        .fold(None, |acc: Option<f64>, d| Some(acc.map_or(d, |m| m.min(d))))
        .ok_or(Error::NoFailurePoints)?;

    Ok(nearest * 100.0)
}
