//! Concrete parameter tuples and the case ids derived from them

use crate::value::{ParamValue, sanitize};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Longest readable part of a case id. The hash suffix keeps truncated ids
/// distinct and the whole id well below common 255-byte name limits.
pub const MAX_READABLE_ID_LEN: usize = 120;

/// One point of an expanded matrix: `name -> value` in declared axis order.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ParamTuple {
    entries: Vec<(String, ParamValue)>,
}

impl ParamTuple {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry; later entries keep their insertion order.
    pub fn push(&mut self, name: impl Into<String>, value: impl Into<ParamValue>) {
        self.entries.push((name.into(), value.into()));
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.push(name, value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(n, _)| n.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Derive the case id for this tuple within a suite.
    ///
    /// The id is a pure function of the suite name and the ordered parameters:
    /// a readable, filesystem-safe prefix followed by eight hex digits of a
    /// SHA-256 over the canonical JSON form, so tuples whose readable parts
    /// sanitise to the same text still get distinct ids.
    ///
    /// ```
    /// use nnparity_matrix::ParamTuple;
    ///
    /// let params = ParamTuple::new().with("n", 1).with("i_size", vec![28, 28]);
    /// let id = params.case_id("caffe_slice");
    /// assert!(id.as_str().starts_with("caffe_slice__n-1_i_size-28x28__"));
    /// assert_eq!(id, params.clone().case_id("caffe_slice"));
    /// ```
    pub fn case_id(&self, suite: &str) -> CaseId {
        let readable: Vec<String> = self
            .entries
            .iter()
            .map(|(name, value)| format!("{}-{}", sanitize(name), value.id_fragment()))
            .collect();

        let canonical = serde_json::json!({ "suite": suite, "params": self.entries });
        let digest = Sha256::digest(canonical.to_string().as_bytes());
        let short: String = digest.iter().take(4).map(|b| format!("{b:02x}")).collect();

        let mut id = sanitize(suite);
        if !readable.is_empty() {
            id.push_str("__");
            id.push_str(&readable.join("_"));
        }
        truncate_at_char_boundary(&mut id, MAX_READABLE_ID_LEN);
        id.push_str("__");
        id.push_str(&short);
        CaseId(id)
    }
}

fn truncate_at_char_boundary(s: &mut String, max: usize) {
    if s.len() <= max {
        return;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    s.truncate(end);
}

impl fmt::Display for ParamTuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (name, value)) in self.entries.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{name}={value}")?;
        }
        Ok(())
    }
}

impl<N: Into<String>, V: Into<ParamValue>> FromIterator<(N, V)> for ParamTuple {
    fn from_iter<I: IntoIterator<Item = (N, V)>>(iter: I) -> Self {
        Self { entries: iter.into_iter().map(|(n, v)| (n.into(), v.into())).collect() }
    }
}

/// Filesystem-safe, reproducible identity of a test case. Also the name of the
/// case's directory under the run root.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CaseId(String);

impl CaseId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CaseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<std::path::Path> for CaseId {
    fn as_ref(&self) -> &std::path::Path {
        std::path::Path::new(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitised_collisions_get_distinct_ids() {
        let a = ParamTuple::new().with("layout", "a/b");
        let b = ParamTuple::new().with("layout", "a_b");
        let (ia, ib) = (a.case_id("s"), b.case_id("s"));
        assert_ne!(ia, ib);
        assert_eq!(ia.as_str()[..ia.as_str().len() - 8], ib.as_str()[..ib.as_str().len() - 8]);
    }

    #[test]
    fn test_suite_name_participates_in_id() {
        let p = ParamTuple::new().with("n", 1);
        assert_ne!(p.case_id("slice"), p.case_id("concat"));
    }

    #[test]
    fn test_empty_tuple_id() {
        let id = ParamTuple::new().case_id("smoke");
        assert!(id.as_str().starts_with("smoke__"));
        assert_eq!(id.as_str().len(), "smoke__".len() + 8);
    }

    #[test]
    fn test_long_tuples_get_bounded_distinct_ids() {
        let wide = |last: i64| {
            let mut dims: Vec<i64> = (1..=200).collect();
            dims.push(last);
            ParamTuple::new().with("shape", dims)
        };
        let (a, b) = (wide(1).case_id("caffe_slice"), wide(2).case_id("caffe_slice"));
        assert_ne!(a, b);
        assert_eq!(a.as_str().len(), MAX_READABLE_ID_LEN + "__".len() + 8);
        assert!(a.as_str().starts_with("caffe_slice__shape-1x2x3"));
    }

    #[test]
    fn test_display_lists_entries_in_order() {
        let p = ParamTuple::new().with("n", 1).with("axis", 2).with("slice_point", vec![10]);
        assert_eq!(p.to_string(), "n=1, axis=2, slice_point=[10]");
    }
}
