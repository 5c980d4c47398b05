//! Integer points used by the singleton fast path and evaluation.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::space::Space;
use crate::vector::Int;

/// One integer tuple in a space: a value for every parameter, input,
/// and output dimension, in row order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Point {
    space: Space,
    values: Vec<Int>,
}

impl Point {
    /// Create a point. The number of values must match the space's
    /// total dimension.
    pub fn new(space: Space, values: Vec<Int>) -> Self {
        assert_eq!(space.dim_total(), values.len());
        Self { space, values }
    }

    /// Create a point from machine integers.
    pub fn from_i64(space: Space, values: &[i64]) -> Self {
        Self::new(space, values.iter().map(|&v| Int::from(v)).collect())
    }

    /// The space this point lives in.
    pub fn space(&self) -> &Space {
        &self.space
    }

    /// Coordinate values, parameters first.
    pub fn values(&self) -> &[Int] {
        &self.values
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, v) in self.values.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", v)?;
        }
        write!(f, ")")
    }
}
