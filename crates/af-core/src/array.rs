//! Dense n-dimensional arrays.
//!
//! The exchange format between configuration, computed containers and the
//! on-disk store: a shape plus row-major data.

use crate::error::{AfError, AfResult};

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(deny_unknown_fields))]
pub struct ArrayData {
    pub shape: Vec<usize>,
    pub data: Vec<f64>,
}

impl ArrayData {
    pub fn new(shape: Vec<usize>, data: Vec<f64>) -> AfResult<Self> {
        let expected: usize = shape.iter().product();
        if expected != data.len() {
            return Err(AfError::Shape {
                what: "array data".to_string(),
                expected: shape,
                actual: vec![data.len()],
            });
        }
        Ok(Self { shape, data })
    }

    pub fn scalar(v: f64) -> Self {
        Self {
            shape: Vec::new(),
            data: vec![v],
        }
    }

    pub fn vector(data: Vec<f64>) -> Self {
        Self {
            shape: vec![data.len()],
            data,
        }
    }

    /// Builds a 2-d array from equally long rows.
    pub fn from_rows(rows: &[Vec<f64>]) -> AfResult<Self> {
        let cols = rows.first().map_or(0, Vec::len);
        let mut data = Vec::with_capacity(rows.len() * cols);
        for row in rows {
            if row.len() != cols {
                return Err(AfError::Shape {
                    what: "array rows".to_string(),
                    expected: vec![cols],
                    actual: vec![row.len()],
                });
            }
            data.extend_from_slice(row);
        }
        Ok(Self {
            shape: vec![rows.len(), cols],
            data,
        })
    }

    pub fn ndim(&self) -> usize {
        self.shape.len()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Errors unless the shape equals `expected`.
    pub fn expect_shape(&self, what: &str, expected: &[usize]) -> AfResult<()> {
        if self.shape != expected {
            return Err(AfError::Shape {
                what: what.to_string(),
                expected: expected.to_vec(),
                actual: self.shape.clone(),
            });
        }
        Ok(())
    }

    /// Errors unless the array has `ndim` axes.
    pub fn expect_ndim(&self, what: &str, ndim: usize) -> AfResult<()> {
        if self.shape.len() != ndim {
            return Err(AfError::InvalidArg {
                what: format!("{what}: expected {ndim} axes, got shape {:?}", self.shape),
            });
        }
        Ok(())
    }

    fn offset(&self, index: &[usize]) -> usize {
        let mut off = 0;
        for (i, n) in index.iter().zip(&self.shape) {
            off = off * n + i;
        }
        off
    }

    pub fn get(&self, index: &[usize]) -> f64 {
        self.data[self.offset(index)]
    }

    /// Rows of a 2-d array.
    pub fn rows(&self) -> Vec<Vec<f64>> {
        let cols = self.shape.last().copied().unwrap_or(1).max(1);
        self.data.chunks(cols).map(<[f64]>::to_vec).collect()
    }

    /// Contiguous block `i` along the first axis.
    pub fn block(&self, i: usize) -> &[f64] {
        let stride: usize = self.shape.iter().skip(1).product();
        &self.data[i * stride..(i + 1) * stride]
    }

    pub fn all_finite(&self) -> bool {
        self.data.iter().all(|v| v.is_finite())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indexing_is_row_major() {
        let a = ArrayData::new(vec![2, 3, 2], (0..12).map(f64::from).collect()).unwrap();
        assert_eq!(a.get(&[1, 2, 1]), 11.0);
        assert_eq!(a.get(&[0, 1, 0]), 2.0);
        assert_eq!(a.block(1), &[6.0, 7.0, 8.0, 9.0, 10.0, 11.0]);
    }

    #[test]
    fn shape_mismatch_is_rejected() {
        assert!(ArrayData::new(vec![2, 2], vec![1.0; 3]).is_err());
        assert!(ArrayData::from_rows(&[vec![1.0, 2.0], vec![3.0]]).is_err());
    }
}
