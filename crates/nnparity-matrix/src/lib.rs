//! Parameter matrices for nnparity suites.
//!
//! A suite declares K named axes of allowed values; the expander produces
//! their cartesian product in a stable order (last axis fastest). Each tuple
//! derives a [`CaseId`] that depends on nothing but the suite name and the
//! parameters, so repeated runs reuse the same per-case directory.

pub mod expand;
pub mod tuple;
pub mod value;

pub use expand::{Axis, Excluded, Expansion, MatrixIter, ParameterMatrix};
pub use tuple::{CaseId, ParamTuple};
pub use value::ParamValue;
