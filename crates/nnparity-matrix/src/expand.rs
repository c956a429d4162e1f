//! Cartesian expansion of named parameter lists

use crate::tuple::ParamTuple;
use crate::value::ParamValue;
use nnparity_common::MatrixError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// A named list of allowed values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Axis {
    pub name: String,
    pub values: Vec<ParamValue>,
}

impl Axis {
    pub fn new<V: Into<ParamValue>>(name: impl Into<String>, values: impl IntoIterator<Item = V>) -> Self {
        Self { name: name.into(), values: values.into_iter().map(Into::into).collect() }
    }
}

/// Declared test matrix: K named axes expanded in declaration order, with the
/// last-declared axis varying fastest.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParameterMatrix {
    axes: Vec<Axis>,
}

/// A tuple that was expanded but deliberately left out of the runnable set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Excluded {
    pub params: ParamTuple,
    pub reason: String,
}

/// Result of expanding a matrix against an exclusion predicate.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Expansion {
    pub included: Vec<ParamTuple>,
    pub excluded: Vec<Excluded>,
}

impl ParameterMatrix {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_axes(axes: Vec<Axis>) -> Self {
        Self { axes }
    }

    /// Builder-style axis declaration.
    ///
    /// ```
    /// use nnparity_matrix::ParameterMatrix;
    ///
    /// let m = ParameterMatrix::new().with_axis("n", [1, 3]).with_axis("axis", [2, 3]);
    /// let names: Vec<String> = m.expand().unwrap().iter().map(|t| t.to_string()).collect();
    /// assert_eq!(names, ["n=1, axis=2", "n=1, axis=3", "n=3, axis=2", "n=3, axis=3"]);
    /// ```
    pub fn with_axis<V: Into<ParamValue>>(
        mut self,
        name: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        self.axes.push(Axis::new(name, values));
        self
    }

    pub fn axes(&self) -> &[Axis] {
        &self.axes
    }

    /// Axis names must be non-empty and unique.
    pub fn validate(&self) -> Result<(), MatrixError> {
        let mut seen = HashSet::new();
        for axis in &self.axes {
            if axis.name.trim().is_empty() {
                return Err(MatrixError::EmptyAxisName);
            }
            if !seen.insert(axis.name.as_str()) {
                return Err(MatrixError::DuplicateAxis { name: axis.name.clone() });
            }
        }
        Ok(())
    }

    /// Number of tuples the matrix expands to. Any empty axis makes it zero;
    /// a matrix without axes has exactly one (empty) tuple.
    pub fn cardinality(&self) -> usize {
        self.axes.iter().map(|a| a.values.len()).product()
    }

    /// Iterate over tuples without materialising the whole product.
    pub fn iter(&self) -> MatrixIter<'_> {
        let exhausted = self.axes.iter().any(|a| a.values.is_empty());
        MatrixIter { axes: &self.axes, indices: vec![0; self.axes.len()], exhausted }
    }

    /// Expand into the ordered cartesian product.
    pub fn expand(&self) -> Result<Vec<ParamTuple>, MatrixError> {
        self.validate()?;
        Ok(self.iter().collect())
    }

    /// Expand and split tuples by an exclusion predicate returning the reason a
    /// tuple must not be scheduled.
    pub fn partition<F>(&self, exclusion_reason: F) -> Result<Expansion, MatrixError>
    where
        F: Fn(&ParamTuple) -> Option<String>,
    {
        self.validate()?;
        let mut expansion = Expansion::default();
        for params in self.iter() {
            match exclusion_reason(&params) {
                Some(reason) => expansion.excluded.push(Excluded { params, reason }),
                None => expansion.included.push(params),
            }
        }
        Ok(expansion)
    }
}

/// Odometer over the axes of a [`ParameterMatrix`].
pub struct MatrixIter<'a> {
    axes: &'a [Axis],
    indices: Vec<usize>,
    exhausted: bool,
}

impl Iterator for MatrixIter<'_> {
    type Item = ParamTuple;

    fn next(&mut self) -> Option<Self::Item> {
        if self.exhausted {
            return None;
        }

        let tuple = self
            .axes
            .iter()
            .zip(&self.indices)
            .map(|(axis, &i)| (axis.name.clone(), axis.values[i].clone()))
            .collect();

        // Advance: last axis fastest.
        self.exhausted = true;
        for pos in (0..self.axes.len()).rev() {
            self.indices[pos] += 1;
            if self.indices[pos] < self.axes[pos].values.len() {
                self.exhausted = false;
                break;
            }
            self.indices[pos] = 0;
        }

        Some(tuple)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_axis_yields_zero_tuples() {
        let m = ParameterMatrix::new().with_axis("n", [1, 3]).with_axis("axis", Vec::<i64>::new());
        assert_eq!(m.cardinality(), 0);
        assert!(m.expand().unwrap().is_empty());
    }

    #[test]
    fn test_no_axes_yields_single_empty_tuple() {
        let tuples = ParameterMatrix::new().expand().unwrap();
        assert_eq!(tuples.len(), 1);
        assert!(tuples[0].is_empty());
    }

    #[test]
    fn test_duplicate_axis_is_rejected() {
        let m = ParameterMatrix::new().with_axis("n", [1]).with_axis("n", [2]);
        assert!(matches!(m.expand(), Err(MatrixError::DuplicateAxis { name }) if name == "n"));
    }

    #[test]
    fn test_blank_axis_name_is_rejected() {
        let m = ParameterMatrix::new().with_axis(" ", [1]);
        assert!(matches!(m.validate(), Err(MatrixError::EmptyAxisName)));
    }

    #[test]
    fn test_partition_keeps_order_on_both_sides() {
        let m = ParameterMatrix::new().with_axis("seed", [ParamValue::None, ParamValue::Float(1.0)]).with_axis(
            "mean",
            [ParamValue::None, ParamValue::Float(1.0)],
        );
        let expansion = m
            .partition(|t| t.get("seed").filter(|v| v.is_none()).map(|_| "unseeded".to_string()))
            .unwrap();
        assert_eq!(expansion.excluded.len(), 2);
        assert_eq!(expansion.included.len(), 2);
        assert_eq!(expansion.included[0].get("mean"), Some(&ParamValue::None));
        assert_eq!(expansion.included[1].get("mean"), Some(&ParamValue::Float(1.0)));
    }
}
