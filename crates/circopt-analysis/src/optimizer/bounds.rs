//! Per-parameter limits and the candidate search box.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Optional hard limits on one optimized parameter.
///
/// A missing minimum means 0, a missing maximum means unbounded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ParameterBounds {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
}

impl ParameterBounds {
    pub fn new(min: Option<f64>, max: Option<f64>) -> Self {
        Self { min, max }
    }

    #[inline]
    pub fn minimum(&self) -> f64 {
        self.min.unwrap_or(0.0)
    }

    #[inline]
    pub fn maximum(&self) -> f64 {
        self.max.unwrap_or(f64::INFINITY)
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.minimum() && value <= self.maximum()
    }

    /// Check the limits themselves: `0 <= min < max`.
    pub fn validate(&self, name: &str) -> Result<()> {
        if !(self.minimum() >= 0.0) {
            return Err(Error::InvalidConfiguration(format!(
                "{}: minimum must be non-negative",
                name
            )));
        }
        if !(self.minimum() < self.maximum()) {
            return Err(Error::InvalidConfiguration(format!(
                "{}: minimum must be below maximum",
                name
            )));
        }
        Ok(())
    }

    /// Clip `(lower, upper)` to these limits.
    ///
    /// The interval must be non-empty and overlap the limits, and so must
    /// the clipped result.
    pub fn clip(&self, name: &str, lower: f64, upper: f64) -> Result<(f64, f64)> {
        let minimum = self.minimum();
        let maximum = self.maximum();

        let invalid = || Error::InvalidBoundary {
            parameter: name.to_string(),
            lower,
            upper,
            minimum,
            maximum,
        };

        if !(lower < upper) || !(lower < maximum) || !(upper > minimum) {
            return Err(invalid());
        }

        let clipped = (lower.max(minimum), upper.min(maximum));
        if !(clipped.0 < clipped.1) {
            return Err(invalid());
        }
        Ok(clipped)
    }
}

/// Box of `±radius` (relative) around `center`, clipped per parameter.
pub fn search_box(
    names: &[String],
    bounds: &[ParameterBounds],
    center: &[f64],
    radius: f64,
) -> Result<Vec<(f64, f64)>> {
    if center.len() != names.len() || bounds.len() != names.len() {
        return Err(Error::DimensionMismatch {
            expected: names.len(),
            actual: center.len().min(bounds.len()),
        });
    }

    names
        .iter()
        .zip(bounds)
        .zip(center)
        .map(|((name, bound), &x)| bound.clip(name, (1.0 - radius) * x, (1.0 + radius) * x))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let bounds = ParameterBounds::default();
        assert_eq!(bounds.minimum(), 0.0);
        assert!(bounds.maximum().is_infinite());
        assert!(bounds.contains(1e12));
        assert!(!bounds.contains(-1.0));
    }

    #[test]
    fn test_clip_inside() {
        let bounds = ParameterBounds::new(Some(1.0), Some(10.0));
        let (lower, upper) = bounds.clip("R", 4.0, 6.0).unwrap();
        assert_eq!((lower, upper), (4.0, 6.0));
    }

    #[test]
    fn test_clip_to_limits() {
        let bounds = ParameterBounds::new(Some(5.0), Some(5.5));
        let (lower, upper) = bounds.clip("R", 4.75, 5.25).unwrap();
        assert_eq!((lower, upper), (5.0, 5.25));

        let (lower, upper) = bounds.clip("R", 5.2, 5.8).unwrap();
        assert_eq!((lower, upper), (5.2, 5.5));
    }

    #[test]
    fn test_clip_disjoint() {
        let bounds = ParameterBounds::new(None, Some(3.0));
        let err = bounds.clip("L", 4.0, 5.0).unwrap_err();
        assert!(matches!(err, Error::InvalidBoundary { ref parameter, .. } if parameter == "L"));

        let bounds = ParameterBounds::new(Some(6.0), None);
        assert!(bounds.clip("L", 4.0, 5.0).is_err());
    }

    #[test]
    fn test_clip_empty_interval() {
        let bounds = ParameterBounds::default();
        assert!(bounds.clip("C", 2.0, 2.0).is_err());
        assert!(bounds.clip("C", 3.0, 2.0).is_err());
    }

    #[test]
    fn test_clip_touching_limit_is_empty() {
        // Upper end touches the minimum: nothing left after clipping
        let bounds = ParameterBounds::new(Some(5.0), None);
        assert!(bounds.clip("C", 4.0, 5.0).is_err());
    }

    #[test]
    fn test_validate() {
        assert!(ParameterBounds::new(Some(1.0), Some(2.0)).validate("a").is_ok());
        assert!(ParameterBounds::new(Some(-1.0), None).validate("a").is_err());
        assert!(ParameterBounds::new(Some(2.0), Some(2.0)).validate("a").is_err());
    }

    #[test]
    fn test_search_box() {
        let names = vec!["a".to_string(), "b".to_string()];
        let bounds = [ParameterBounds::default(), ParameterBounds::new(None, Some(10.5))];
        let region = search_box(&names, &bounds, &[2.0, 10.0], 0.1).unwrap();

        assert!((region[0].0 - 1.8).abs() < 1e-12);
        assert!((region[0].1 - 2.2).abs() < 1e-12);
        assert!((region[1].0 - 9.0).abs() < 1e-12);
        assert_eq!(region[1].1, 10.5);
    }
}
