//! Host tensors exchanged between the harness, reference engines and backends
//!
//! Values are held as `f32` regardless of the declared element type; the
//! declared [`DType`] governs how a tensor is encoded on disk and checked by
//! the comparator. Integer tensors wider than 24 bits lose precision in this
//! representation, which is acceptable for the input/output types the
//! compiler targets (`uint8`, `int8`, `float32`).

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Element type of a tensor as declared by a model or produced by an engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DType {
    Float32,
    Uint8,
    Int8,
    Int32,
}

impl DType {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Float32 => "float32",
            Self::Uint8 => "uint8",
            Self::Int8 => "int8",
            Self::Int32 => "int32",
        }
    }

    /// Size of one element in the raw little-endian encoding.
    pub fn size_in_bytes(&self) -> usize {
        match self {
            Self::Float32 | Self::Int32 => 4,
            Self::Uint8 | Self::Int8 => 1,
        }
    }

    /// Parse the names used by option documents and engine manifests.
    ///
    /// ```
    /// use nnparity_common::DType;
    ///
    /// assert_eq!(DType::from_name("uint8"), Some(DType::Uint8));
    /// assert_eq!(DType::from_name("FLOAT"), Some(DType::Float32));
    /// assert_eq!(DType::from_name("bf16"), None);
    /// ```
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "float32" | "float" | "f32" => Some(Self::Float32),
            "uint8" | "u8" => Some(Self::Uint8),
            "int8" | "i8" => Some(Self::Int8),
            "int32" | "i32" => Some(Self::Int32),
            _ => None,
        }
    }

    /// Natural value range of integer types; `None` for floating point.
    pub fn integer_range(&self) -> Option<(f32, f32)> {
        match self {
            Self::Float32 => None,
            Self::Uint8 => Some((0.0, 255.0)),
            Self::Int8 => Some((-128.0, 127.0)),
            Self::Int32 => Some((i32::MIN as f32, i32::MAX as f32)),
        }
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Number of elements described by a shape. A rank-0 shape is a scalar.
pub fn numel(shape: &[usize]) -> usize {
    shape.iter().product()
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum TensorError {
    #[error("shape {shape:?} holds {expected} elements but {actual} values were supplied")]
    ValueCount { shape: Vec<usize>, expected: usize, actual: usize },

    #[error("{dtype} tensor of shape {shape:?} needs {expected} bytes, got {actual}")]
    ByteLength { shape: Vec<usize>, dtype: DType, expected: usize, actual: usize },
}

/// Declared name, shape and element type of a model input or output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TensorSpec {
    pub name: String,
    pub shape: Vec<usize>,
    pub dtype: DType,
}

impl TensorSpec {
    pub fn new(name: impl Into<String>, shape: Vec<usize>, dtype: DType) -> Self {
        Self { name: name.into(), shape, dtype }
    }

    pub fn numel(&self) -> usize {
        numel(&self.shape)
    }
}

/// A dense, row-major host tensor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tensor {
    shape: Vec<usize>,
    dtype: DType,
    values: Vec<f32>,
}

impl Tensor {
    pub fn new(shape: Vec<usize>, dtype: DType, values: Vec<f32>) -> Result<Self, TensorError> {
        let expected = numel(&shape);
        if expected != values.len() {
            return Err(TensorError::ValueCount { shape, expected, actual: values.len() });
        }
        Ok(Self { shape, dtype, values })
    }

    pub fn zeros(shape: Vec<usize>, dtype: DType) -> Self {
        let n = numel(&shape);
        Self { shape, dtype, values: vec![0.0; n] }
    }

    /// Build a `float32` tensor; convenience for engines and tests.
    pub fn from_f32(shape: Vec<usize>, values: Vec<f32>) -> Result<Self, TensorError> {
        Self::new(shape, DType::Float32, values)
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn dtype(&self) -> DType {
        self.dtype
    }

    pub fn values(&self) -> &[f32] {
        &self.values
    }

    pub fn into_values(self) -> Vec<f32> {
        self.values
    }

    pub fn numel(&self) -> usize {
        self.values.len()
    }

    /// Whether shape and dtype agree with a declared spec.
    pub fn matches_spec(&self, spec: &TensorSpec) -> bool {
        self.shape == spec.shape && self.dtype == spec.dtype
    }

    /// Encode as raw little-endian bytes in the declared element type.
    ///
    /// Integer types are rounded and saturated to their range.
    pub fn to_le_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.values.len() * self.dtype.size_in_bytes());
        for &v in &self.values {
            match self.dtype {
                DType::Float32 => out.extend_from_slice(&v.to_le_bytes()),
                DType::Uint8 => out.push(v.round().clamp(0.0, 255.0) as u8),
                DType::Int8 => out.extend_from_slice(&(v.round().clamp(-128.0, 127.0) as i8).to_le_bytes()),
                DType::Int32 => out.extend_from_slice(&(v.round() as i32).to_le_bytes()),
            }
        }
        out
    }

    /// Decode raw little-endian bytes produced by [`Tensor::to_le_bytes`] or an
    /// external engine.
    pub fn from_le_bytes(shape: Vec<usize>, dtype: DType, bytes: &[u8]) -> Result<Self, TensorError> {
        let n = numel(&shape);
        let expected = n * dtype.size_in_bytes();
        if bytes.len() != expected {
            return Err(TensorError::ByteLength { shape, dtype, expected, actual: bytes.len() });
        }

        let values = match dtype {
            DType::Float32 => bytes
                .chunks_exact(4)
                .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
                .collect(),
            DType::Int32 => bytes
                .chunks_exact(4)
                .map(|c| i32::from_le_bytes([c[0], c[1], c[2], c[3]]) as f32)
                .collect(),
            DType::Uint8 => bytes.iter().map(|&b| b as f32).collect(),
            DType::Int8 => bytes.iter().map(|&b| b as i8 as f32).collect(),
        };

        Ok(Self { shape, dtype, values })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_rejects_wrong_value_count() {
        let err = Tensor::from_f32(vec![2, 3], vec![0.0; 5]).unwrap_err();
        assert_eq!(err, TensorError::ValueCount { shape: vec![2, 3], expected: 6, actual: 5 });
    }

    #[test]
    fn test_scalar_shape_has_one_element() {
        assert_eq!(numel(&[]), 1);
        let t = Tensor::zeros(vec![], DType::Float32);
        assert_eq!(t.numel(), 1);
    }

    #[test]
    fn test_uint8_encoding_saturates() {
        let t = Tensor::new(vec![3], DType::Uint8, vec![-4.0, 127.6, 300.0]).unwrap();
        assert_eq!(t.to_le_bytes(), vec![0, 128, 255]);
    }

    #[test]
    fn test_int8_decoding_is_signed() {
        let t = Tensor::from_le_bytes(vec![2], DType::Int8, &[0xff, 0x7f]).unwrap();
        assert_eq!(t.values(), &[-1.0, 127.0]);
    }

    #[test]
    fn test_from_le_bytes_checks_length() {
        let err = Tensor::from_le_bytes(vec![2, 2], DType::Float32, &[0u8; 15]).unwrap_err();
        assert!(matches!(err, TensorError::ByteLength { expected: 16, actual: 15, .. }));
    }

    #[test]
    fn test_float_bytes_preserve_bits() {
        let values = vec![1.5, -0.0, f32::MIN_POSITIVE, 3.25e7];
        let t = Tensor::from_f32(vec![4], values.clone()).unwrap();
        let back = Tensor::from_le_bytes(vec![4], DType::Float32, &t.to_le_bytes()).unwrap();
        for (a, b) in values.iter().zip(back.values()) {
            assert_eq!(a.to_bits(), b.to_bits());
        }
    }
}
