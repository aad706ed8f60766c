// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Tensor shapes

use core::fmt;
use core::ops::Index;

/// Ordered dimension sizes of a tensor.
///
/// An empty shape describes a scalar and has a volume of 1.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "std", derive(serde::Serialize, serde::Deserialize))]
pub struct Shape(Vec<usize>);

impl Shape {
    pub fn new(dims: impl Into<Vec<usize>>) -> Self {
        Self(dims.into())
    }

    /// Product of all dimensions
    pub fn volume(&self) -> usize {
        self.0.iter().product()
    }

    pub fn rank(&self) -> usize {
        self.0.len()
    }

    pub fn dims(&self) -> &[usize] {
        &self.0
    }

    /// Innermost dimension (1 for a scalar)
    pub fn last(&self) -> usize {
        self.0.last().copied().unwrap_or(1)
    }

    /// Number of rows when the shape is viewed as `[volume / last, last]`
    pub fn rows(&self) -> usize {
        match self.last() {
            0 => 0,
            last => self.volume() / last,
        }
    }
}

impl From<Vec<usize>> for Shape {
    fn from(dims: Vec<usize>) -> Self {
        Self(dims)
    }
}

impl From<&[usize]> for Shape {
    fn from(dims: &[usize]) -> Self {
        Self(dims.to_vec())
    }
}

impl<const N: usize> From<[usize; N]> for Shape {
    fn from(dims: [usize; N]) -> Self {
        Self(dims.to_vec())
    }
}

impl Index<usize> for Shape {
    type Output = usize;

    fn index(&self, axis: usize) -> &usize {
        &self.0[axis]
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, dim) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", dim)?;
        }
        write!(f, "}}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_volume_and_rows() {
        let shape = Shape::from([4, 8, 16]);
        assert_eq!(shape.volume(), 512);
        assert_eq!(shape.last(), 16);
        assert_eq!(shape.rows(), 32);
        assert_eq!(shape[1], 8);
    }

    #[test]
    fn test_scalar_shape() {
        let shape = Shape::default();
        assert_eq!(shape.volume(), 1);
        assert_eq!(shape.last(), 1);
        assert_eq!(shape.rank(), 0);
    }

    #[test]
    fn test_zero_sized_dimension() {
        let shape = Shape::from([3, 0]);
        assert_eq!(shape.volume(), 0);
        assert_eq!(shape.rows(), 0);
    }

    #[test]
    fn test_display() {
        assert_eq!(Shape::from([2, 3]).to_string(), "{2, 3}");
    }
}
