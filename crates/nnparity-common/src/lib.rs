//! Common types for the nnparity differential-testing harness
//!
//! This crate holds the vocabulary shared by every stage of a run: tensors and
//! their element types, opaque backend identifiers, numeric tolerances,
//! execution results and the per-stage error taxonomy.

pub mod backend;
pub mod error;
pub mod result;
pub mod tensor;
pub mod tolerance;

pub use backend::{BackendId, RESERVED_CASE_DIRS};
pub use error::{
    CompileError, ConfigError, ExecutionError, HarnessError, MatrixError, OverlayError,
    SynthesisError,
};
pub use result::{ExecutionResult, ResultSource};
pub use tensor::{DType, Tensor, TensorError, TensorSpec, numel};
pub use tolerance::{DEFAULT_ABS_TOL, DEFAULT_REL_TOL, ToleranceSpec};
