//! Growable array of fixed-width vectors.
//!
//! Rows are stored contiguously in row-major order. When an append would
//! overflow the allocated rows, capacity doubles (or becomes 1 from 0).
//! Slots beyond the logical size are never handed out.

use crate::error::{Error, Result};

/// Append-only buffer of equally sized `f64` rows.
#[derive(Debug, Clone)]
pub struct VectorBuffer {
    data: Vec<f64>,
    width: usize,
    rows: usize,
    capacity: usize,
}

impl VectorBuffer {
    /// Default number of preallocated rows.
    pub const DEFAULT_CAPACITY: usize = 4;

    /// Create a buffer for rows of `width` values.
    pub fn new(width: usize) -> Self {
        Self::with_capacity(width, Self::DEFAULT_CAPACITY)
    }

    /// Create a buffer with `capacity` preallocated rows.
    pub fn with_capacity(width: usize, capacity: usize) -> Self {
        Self {
            data: vec![0.0; width * capacity],
            width,
            rows: 0,
            capacity,
        }
    }

    /// Number of appended rows.
    #[inline]
    pub fn len(&self) -> usize {
        self.rows
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    /// Number of allocated rows.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Values per row.
    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    /// Append one row.
    pub fn push(&mut self, row: &[f64]) -> Result<()> {
        if row.len() != self.width {
            return Err(Error::DimensionMismatch {
                expected: self.width,
                actual: row.len(),
            });
        }

        if self.rows == self.capacity {
            let capacity = if self.capacity == 0 {
                1
            } else {
                self.capacity * 2
            };
            self.data.resize(capacity * self.width, 0.0);
            self.capacity = capacity;
        }

        let start = self.rows * self.width;
        self.data[start..start + self.width].copy_from_slice(row);
        self.rows += 1;
        Ok(())
    }

    /// Append every row in order.
    pub fn extend<'a>(&mut self, rows: impl IntoIterator<Item = &'a [f64]>) -> Result<()> {
        for row in rows {
            self.push(row)?;
        }
        Ok(())
    }

    /// Read-only view over the appended rows.
    pub fn view(&self) -> RowsView<'_> {
        RowsView {
            data: &self.data[..self.rows * self.width],
            width: self.width,
            rows: self.rows,
        }
    }
}

/// Borrowed view over the valid rows of a [`VectorBuffer`].
#[derive(Debug, Clone, Copy)]
pub struct RowsView<'a> {
    data: &'a [f64],
    width: usize,
    rows: usize,
}

impl<'a> RowsView<'a> {
    #[inline]
    pub fn len(&self) -> usize {
        self.rows
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    /// Row at `index`, if appended.
    pub fn row(&self, index: usize) -> Option<&'a [f64]> {
        if index < self.rows {
            let start = index * self.width;
            Some(&self.data[start..start + self.width])
        } else {
            None
        }
    }

    /// Iterate over rows in insertion order.
    pub fn iter(&self) -> impl ExactSizeIterator<Item = &'a [f64]> + 'a {
        let data = self.data;
        let width = self.width;
        (0..self.rows).map(move |i| &data[i * width..(i + 1) * width])
    }

    /// Flat row-major slice of every valid value.
    pub fn as_slice(&self) -> &'a [f64] {
        self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_growth_from_empty() {
        let a = [1.0, 2.0, 3.0, 4.0];
        let b = [5.0, 6.0, 7.0, 8.0];
        let c = [9.0, 10.0, 11.0, 12.0];
        let d = [13.0, 14.0, 15.0, 16.0];

        let mut buffer = VectorBuffer::with_capacity(4, 0);
        assert_eq!(buffer.capacity(), 0);
        assert_eq!(buffer.len(), 0);
        assert_eq!(buffer.width(), 4);
        assert!(buffer.view().is_empty());

        buffer.push(&a).unwrap();
        assert_eq!(buffer.capacity(), 1);
        assert_eq!(buffer.len(), 1);
        assert_eq!(buffer.view().as_slice(), &a);

        buffer.extend([&b[..]]).unwrap();
        assert_eq!(buffer.capacity(), 2);
        assert_eq!(buffer.len(), 2);

        buffer.push(&c).unwrap();
        assert_eq!(buffer.capacity(), 4);
        assert_eq!(buffer.len(), 3);
        assert_eq!(buffer.view().row(2), Some(&c[..]));
        assert_eq!(buffer.view().row(3), None);

        buffer.push(&d).unwrap();
        assert_eq!(buffer.capacity(), 4);
        assert_eq!(buffer.len(), 4);

        let rows: Vec<&[f64]> = buffer.view().iter().collect();
        assert_eq!(rows, vec![&a[..], &b[..], &c[..], &d[..]]);
    }

    #[test]
    fn test_capacity_only_doubles() {
        let mut buffer = VectorBuffer::new(2);
        let mut previous = buffer.capacity();

        for i in 0..100 {
            buffer.push(&[i as f64, -(i as f64)]).unwrap();
            let capacity = buffer.capacity();
            assert!(capacity == previous || capacity == previous * 2);
            assert!(capacity >= buffer.len());
            previous = capacity;
        }

        assert_eq!(buffer.len(), 100);
        assert_eq!(buffer.capacity(), 128);
        assert_eq!(buffer.view().as_slice().len(), 200);
    }

    #[test]
    fn test_width_mismatch() {
        let mut buffer = VectorBuffer::new(3);
        let err = buffer.push(&[1.0, 2.0]).unwrap_err();
        assert!(matches!(
            err,
            Error::DimensionMismatch {
                expected: 3,
                actual: 2
            }
        ));
        assert_eq!(buffer.len(), 0);
    }
}
