//! Golden-versus-actual comparison for nnparity.
//!
//! [`compare`] checks output count, then per-output shape and dtype, then
//! every element against `|golden - actual| <= abs_tol + rel_tol * |golden|`.
//! A count mismatch is an infrastructure fault and reported as
//! [`Comparison::CountMismatch`]; every other disagreement is a
//! [`Comparison::Mismatch`] carrying a [`Diagnostic`].

pub mod compare;
pub mod metrics;

pub use compare::{Comparison, Diagnostic, MismatchIndex, MismatchKind, OutputStats, compare, compare_results};
pub use metrics::{absolute_error, cosine_similarity, relative_error, unravel_index};
