//! Named and dense parameter vectors.
//!
//! Verifiers are called with a keyed [`ParameterSet`], while the numeric
//! search works on dense vectors. A [`ParameterLayout`] fixes the key order
//! once per run and converts between the two.

use indexmap::IndexMap;
use nalgebra::DVector;

use crate::error::{Error, Result};

/// Parameter name to value, in a stable insertion order.
pub type ParameterSet = IndexMap<String, f64>;

/// Fixed ordering of parameter names for dense vectors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterLayout {
    keys: Vec<String>,
}

impl ParameterLayout {
    /// Create a layout from an ordered list of names.
    pub fn new(keys: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            keys: keys.into_iter().map(Into::into).collect(),
        }
    }

    /// Layout following the iteration order of a parameter set.
    pub fn from_set(parameters: &ParameterSet) -> Self {
        Self::new(parameters.keys().cloned())
    }

    /// Number of parameters.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// True when the layout has no parameters.
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Parameter names in dense order.
    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    /// Convert a keyed set into a dense vector.
    pub fn to_dense(&self, parameters: &ParameterSet) -> Result<DVector<f64>> {
        let values = self
            .keys
            .iter()
            .map(|key| {
                parameters
                    .get(key)
                    .copied()
                    .ok_or_else(|| Error::MissingParameter(key.clone()))
            })
            .collect::<Result<Vec<f64>>>()?;
        Ok(DVector::from_vec(values))
    }

    /// Convert a dense vector into a keyed set.
    pub fn to_set(&self, values: &[f64]) -> Result<ParameterSet> {
        if values.len() != self.keys.len() {
            return Err(Error::DimensionMismatch {
                expected: self.keys.len(),
                actual: values.len(),
            });
        }
        Ok(self
            .keys
            .iter()
            .cloned()
            .zip(values.iter().copied())
            .collect())
    }
}

/// Relative and absolute closeness test (rtol = 1e-5, atol = 1e-8).
#[inline]
pub fn is_close(a: f64, b: f64) -> bool {
    (a - b).abs() <= 1e-8 + 1e-5 * b.abs()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_set() -> ParameterSet {
        let mut set = ParameterSet::new();
        set.insert("R1".to_string(), 100.0);
        set.insert("L1".to_string(), 2.5);
        set.insert("B1".to_string(), 0.7);
        set
    }

    #[test]
    fn test_layout_preserves_order() {
        let layout = ParameterLayout::from_set(&sample_set());
        assert_eq!(layout.keys(), &["R1", "L1", "B1"]);
    }

    #[test]
    fn test_dense_and_back() {
        let set = sample_set();
        let layout = ParameterLayout::from_set(&set);

        let dense = layout.to_dense(&set).unwrap();
        assert_eq!(dense.as_slice(), &[100.0, 2.5, 0.7]);

        let back = layout.to_set(dense.as_slice()).unwrap();
        assert_eq!(back, set);
    }

    #[test]
    fn test_missing_parameter() {
        let layout = ParameterLayout::new(["R1", "R2"]);
        let err = layout.to_dense(&sample_set()).unwrap_err();
        assert!(matches!(err, Error::MissingParameter(name) if name == "R2"));
    }

    #[test]
    fn test_dimension_mismatch() {
        let layout = ParameterLayout::new(["R1", "R2"]);
        let err = layout.to_set(&[1.0]).unwrap_err();
        assert!(matches!(
            err,
            Error::DimensionMismatch {
                expected: 2,
                actual: 1
            }
        ));
    }

    #[test]
    fn test_is_close() {
        assert!(is_close(1.9, 1.9));
        assert!(is_close(0.1, 0.1 + 1e-12));
        assert!(!is_close(1.28125, 1.5));
    }
}
