//! Output-by-output comparison of a golden result against a backend result

use crate::metrics::{absolute_error, cosine_similarity, relative_error, unravel_index};
use nnparity_common::{DType, ExecutionResult, Tensor, ToleranceSpec};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Location of a failing element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MismatchIndex {
    /// Position of the output in declared order.
    pub output: usize,
    /// Row-major flat index within that output.
    pub flat_index: usize,
    pub coords: Vec<usize>,
}

impl fmt::Display for MismatchIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "output {} at {:?} (flat {})", self.output, self.coords, self.flat_index)
    }
}

/// Per-output numeric summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputStats {
    pub numel: usize,
    pub max_abs_error: f64,
    pub max_rel_error: f64,
    pub cosine_similarity: f64,
    pub mismatches: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MismatchKind {
    ShapeDtype,
    Numeric,
}

/// Why a comparison failed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub kind: MismatchKind,
    pub summary: String,
    pub tolerance: ToleranceSpec,
    pub max_abs_error: f64,
    pub max_rel_error: f64,
    pub first_mismatch: Option<MismatchIndex>,
    /// Empty for shape/dtype mismatches.
    pub outputs: Vec<OutputStats>,
}

impl Diagnostic {
    pub fn total_mismatches(&self) -> usize {
        self.outputs.iter().map(|o| o.mismatches).sum()
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.summary)?;
        if self.kind == MismatchKind::Numeric {
            write!(f, "; max_abs={:.3e} max_rel={:.3e}", self.max_abs_error, self.max_rel_error)?;
            if let Some(first) = &self.first_mismatch {
                write!(f, "; first mismatch {first}")?;
            }
        }
        Ok(())
    }
}

/// Comparator verdict for one (golden, actual) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum Comparison {
    /// Every output and every element passed.
    Match { outputs: Vec<OutputStats> },
    /// A meaningful disagreement.
    Mismatch(Diagnostic),
    /// Output counts differ. Never truncated to the shorter side.
    CountMismatch { golden: usize, actual: usize },
}

impl Comparison {
    pub fn is_match(&self) -> bool {
        matches!(self, Self::Match { .. })
    }
}

fn describe(shape: &[usize], dtype: DType) -> String {
    format!("{shape:?} {dtype}")
}

/// Compare two ordered output lists under `tolerance`.
///
/// ```
/// use nnparity_common::{Tensor, ToleranceSpec};
/// use nnparity_compare::compare;
///
/// let golden = vec![Tensor::from_f32(vec![2], vec![1.0, 2.0]).unwrap()];
/// let actual = vec![Tensor::from_f32(vec![2], vec![1.0, 2.0000001]).unwrap()];
/// assert!(compare(&golden, &actual, ToleranceSpec::default()).is_match());
/// ```
pub fn compare(golden: &[Tensor], actual: &[Tensor], tolerance: ToleranceSpec) -> Comparison {
    if golden.len() != actual.len() {
        return Comparison::CountMismatch { golden: golden.len(), actual: actual.len() };
    }

    for (i, (g, a)) in golden.iter().zip(actual).enumerate() {
        if g.shape() != a.shape() || g.dtype() != a.dtype() {
            return Comparison::Mismatch(Diagnostic {
                kind: MismatchKind::ShapeDtype,
                summary: format!(
                    "shape/dtype mismatch at output {i}: golden {} vs actual {}",
                    describe(g.shape(), g.dtype()),
                    describe(a.shape(), a.dtype())
                ),
                tolerance,
                max_abs_error: 0.0,
                max_rel_error: 0.0,
                first_mismatch: None,
                outputs: Vec::new(),
            });
        }
    }

    let mut outputs = Vec::with_capacity(golden.len());
    let mut first_mismatch = None;
    let mut max_abs_error = 0.0f64;
    let mut max_rel_error = 0.0f64;

    for (i, (g, a)) in golden.iter().zip(actual).enumerate() {
        let mut stats = OutputStats {
            numel: g.numel(),
            max_abs_error: 0.0,
            max_rel_error: 0.0,
            cosine_similarity: cosine_similarity(g.values(), a.values()),
            mismatches: 0,
        };

        for (flat, (gv, av)) in g.values().iter().zip(a.values()).enumerate() {
            let (gv, av) = (f64::from(*gv), f64::from(*av));
            stats.max_abs_error = stats.max_abs_error.max(absolute_error(gv, av));
            stats.max_rel_error = stats.max_rel_error.max(relative_error(gv, av));

            if !tolerance.allows(gv, av) {
                stats.mismatches += 1;
                if first_mismatch.is_none() {
                    first_mismatch =
                        Some(MismatchIndex { output: i, flat_index: flat, coords: unravel_index(flat, g.shape()) });
                }
            }
        }

        max_abs_error = max_abs_error.max(stats.max_abs_error);
        max_rel_error = max_rel_error.max(stats.max_rel_error);
        outputs.push(stats);
    }

    if first_mismatch.is_none() {
        return Comparison::Match { outputs };
    }

    let total: usize = outputs.iter().map(|o| o.mismatches).sum();
    let elements: usize = outputs.iter().map(|o| o.numel).sum();
    Comparison::Mismatch(Diagnostic {
        kind: MismatchKind::Numeric,
        summary: format!(
            "{total} of {elements} elements exceed abs_tol={:e} rel_tol={:e}",
            tolerance.abs_tol, tolerance.rel_tol
        ),
        tolerance,
        max_abs_error,
        max_rel_error,
        first_mismatch,
        outputs,
    })
}

/// [`compare`] over two execution results.
pub fn compare_results(golden: &ExecutionResult, actual: &ExecutionResult, tolerance: ToleranceSpec) -> Comparison {
    compare(&golden.outputs, &actual.outputs, tolerance)
}
