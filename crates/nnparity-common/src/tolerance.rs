//! Numeric closeness thresholds

use serde::{Deserialize, Serialize};

/// Absolute tolerance applied when no judge rule overrides it.
pub const DEFAULT_ABS_TOL: f64 = 1e-5;

/// Relative tolerance applied when no judge rule overrides it.
pub const DEFAULT_REL_TOL: f64 = 1e-4;

/// Elementwise closeness threshold: an element passes when
/// `|golden - actual| <= abs_tol + rel_tol * |golden|`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ToleranceSpec {
    pub abs_tol: f64,
    pub rel_tol: f64,
}

impl Default for ToleranceSpec {
    fn default() -> Self {
        Self { abs_tol: DEFAULT_ABS_TOL, rel_tol: DEFAULT_REL_TOL }
    }
}

impl ToleranceSpec {
    pub fn new(abs_tol: f64, rel_tol: f64) -> Self {
        Self { abs_tol, rel_tol }
    }

    /// Largest admissible absolute difference for a given golden value.
    pub fn bound(&self, golden: f64) -> f64 {
        self.abs_tol + self.rel_tol * golden.abs()
    }

    /// Whether `actual` is close enough to `golden`.
    ///
    /// Two NaNs are considered equal, as are two infinities of the same sign;
    /// any other non-finite pairing fails.
    ///
    /// ```
    /// use nnparity_common::ToleranceSpec;
    ///
    /// let tol = ToleranceSpec::new(0.0, 0.1);
    /// assert!(tol.allows(10.0, 10.9));
    /// assert!(!tol.allows(10.0, 11.1));
    /// assert!(tol.allows(f64::NAN, f64::NAN));
    /// ```
    pub fn allows(&self, golden: f64, actual: f64) -> bool {
        if golden.is_nan() || actual.is_nan() {
            return golden.is_nan() && actual.is_nan();
        }
        if golden.is_infinite() || actual.is_infinite() {
            return golden == actual;
        }
        (golden - actual).abs() <= self.bound(golden)
    }

    /// Both thresholds must be finite and non-negative.
    pub fn is_valid(&self) -> bool {
        self.abs_tol.is_finite() && self.rel_tol.is_finite() && self.abs_tol >= 0.0 && self.rel_tol >= 0.0
    }
}
