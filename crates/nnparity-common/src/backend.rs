//! Backend identifiers
//!
//! A backend is a compilation + execution target such as a general-purpose CPU
//! target or an embedded NPU. The harness never interprets the identifier; the
//! set of valid ids comes from the compiler/backend registry in the harness
//! configuration.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Directory names a case directory already uses for its own artifacts.
pub const RESERVED_CASE_DIRS: [&str; 2] = ["reference", "inputs"];

/// Opaque name of a compilation/execution target.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BackendId(String);

impl BackendId {
    /// Create a backend id from any string-like value.
    ///
    /// # Examples
    ///
    /// ```
    /// use nnparity_common::BackendId;
    ///
    /// let cpu = BackendId::new("cpu");
    /// assert_eq!(cpu.as_str(), "cpu");
    /// assert_eq!(cpu.to_string(), "cpu");
    /// ```
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the id can be used verbatim as a directory name inside a case
    /// directory without colliding with [`RESERVED_CASE_DIRS`].
    ///
    /// ```
    /// use nnparity_common::BackendId;
    ///
    /// assert!(BackendId::new("k210").is_path_safe());
    /// assert!(!BackendId::new("../k210").is_path_safe());
    /// assert!(!BackendId::new("").is_path_safe());
    /// assert!(!BackendId::new("reference").is_path_safe());
    /// ```
    pub fn is_path_safe(&self) -> bool {
        !self.is_reserved()
            && !self.0.is_empty()
            && self.0 != "."
            && self.0 != ".."
            && self.0.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
    }

    pub fn is_reserved(&self) -> bool {
        RESERVED_CASE_DIRS.contains(&self.0.as_str())
    }
}

impl fmt::Display for BackendId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for BackendId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for BackendId {
    fn from(value: String) -> Self {
        Self(value)
    }
}
