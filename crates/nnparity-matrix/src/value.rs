//! Parameter values as declared in a test matrix

use serde::{Deserialize, Serialize};
use std::fmt;

/// One candidate value of a matrix axis.
///
/// The untagged representation lets suite files write plain YAML scalars and
/// sequences (`1`, `2.0`, `true`, `uint8`, `[28, 28]`, `null`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    /// Explicitly unset (Python `None` in the original declarations).
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<ParamValue>),
}

impl ParamValue {
    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Integers widen to floats; floats never narrow to integers.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(i) => Some(*i as f64),
            Self::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[ParamValue]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    /// A list of integers, e.g. a shape or slice points.
    pub fn as_i64_list(&self) -> Option<Vec<i64>> {
        self.as_list()?.iter().map(ParamValue::as_i64).collect()
    }

    /// A list of non-negative integers, e.g. a tensor shape.
    pub fn as_usize_list(&self) -> Option<Vec<usize>> {
        self.as_list()?
            .iter()
            .map(|v| v.as_i64().and_then(|i| usize::try_from(i).ok()))
            .collect()
    }

    /// Filesystem-safe rendering used inside case ids.
    pub(crate) fn id_fragment(&self) -> String {
        match self {
            Self::None => "none".to_string(),
            Self::Bool(b) => b.to_string(),
            Self::Int(i) => i.to_string(),
            Self::Float(f) => sanitize(&format!("{f:?}")),
            Self::Str(s) => sanitize(s),
            Self::List(items) if items.is_empty() => "empty".to_string(),
            Self::List(items) => items.iter().map(ParamValue::id_fragment).collect::<Vec<_>>().join("x"),
        }
    }
}

/// Replace every character outside `[A-Za-z0-9.+-]` with `_`.
pub(crate) fn sanitize(raw: &str) -> String {
    let cleaned: String = raw
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '.' | '+' | '-') { c } else { '_' })
        .collect();
    if cleaned.is_empty() { "_".to_string() } else { cleaned }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => f.write_str("None"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x:?}"),
            Self::Str(s) => f.write_str(s),
            Self::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
        }
    }
}

impl From<bool> for ParamValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for ParamValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for ParamValue {
    fn from(value: i32) -> Self {
        Self::Int(value as i64)
    }
}

impl From<usize> for ParamValue {
    fn from(value: usize) -> Self {
        Self::Int(value as i64)
    }
}

impl From<f64> for ParamValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl<T: Into<ParamValue>> From<Vec<T>> for ParamValue {
    fn from(value: Vec<T>) -> Self {
        Self::List(value.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<ParamValue>> From<Option<T>> for ParamValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::None, Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_matches_declaration_syntax() {
        assert_eq!(ParamValue::from(vec![28, 28]).to_string(), "[28, 28]");
        assert_eq!(ParamValue::from(1.0).to_string(), "1.0");
        assert_eq!(ParamValue::from(None::<f64>).to_string(), "None");
    }

    #[test]
    fn test_id_fragment_is_filesystem_safe() {
        assert_eq!(ParamValue::from(vec![28, 28]).id_fragment(), "28x28");
        assert_eq!(ParamValue::from("a/b[0]").id_fragment(), "a_b_0_");
        assert_eq!(ParamValue::from(-2.5).id_fragment(), "-2.5");
        assert_eq!(ParamValue::List(vec![]).id_fragment(), "empty");
    }

    #[test]
    fn test_integer_accessors() {
        let shape = ParamValue::from(vec![1, 3, 16, 16]);
        assert_eq!(shape.as_usize_list(), Some(vec![1, 3, 16, 16]));
        assert_eq!(ParamValue::from(vec![-1]).as_usize_list(), None);
        assert_eq!(ParamValue::from(2).as_f64(), Some(2.0));
        assert_eq!(ParamValue::from(2.0).as_i64(), None);
    }
}
