//! Output of one execution of a model, either on the authoring framework's own
//! engine (the golden result) or on a compiled backend.

use crate::backend::BackendId;
use crate::tensor::Tensor;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "id")]
pub enum ResultSource {
    Reference,
    Backend(BackendId),
}

impl fmt::Display for ResultSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Reference => f.write_str("reference"),
            Self::Backend(id) => write!(f, "backend:{id}"),
        }
    }
}

/// Ordered output tensors, in the model's declared output order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub source: ResultSource,
    pub outputs: Vec<Tensor>,
}

impl ExecutionResult {
    pub fn reference(outputs: Vec<Tensor>) -> Self {
        Self { source: ResultSource::Reference, outputs }
    }

    pub fn backend(id: BackendId, outputs: Vec<Tensor>) -> Self {
        Self { source: ResultSource::Backend(id), outputs }
    }
}
