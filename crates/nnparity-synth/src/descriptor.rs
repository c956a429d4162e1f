//! Synthesised models and the per-case context they are built in

use crate::graph::Graph;
use nnparity_common::{SynthesisError, TensorSpec};
use nnparity_matrix::CaseId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Authoring front-end whose native format a model is written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Frontend {
    Caffe,
    Onnx,
}

impl Frontend {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Caffe => "caffe",
            Self::Onnx => "onnx",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "caffe" => Some(Self::Caffe),
            "onnx" => Some(Self::Onnx),
            _ => None,
        }
    }
}

impl fmt::Display for Frontend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Owned, per-case synthesis state. A fresh context is created for every case
/// and consumed by the synthesiser, so nothing leaks between cases.
#[derive(Debug)]
pub struct SynthesisContext {
    case_id: CaseId,
    case_dir: PathBuf,
}

impl SynthesisContext {
    pub fn new(case_id: CaseId, case_dir: impl Into<PathBuf>) -> Self {
        Self { case_id, case_dir: case_dir.into() }
    }

    pub fn case_id(&self) -> &CaseId {
        &self.case_id
    }

    pub fn case_dir(&self) -> &Path {
        &self.case_dir
    }

    /// Write one model file into the case directory.
    pub fn write_file(&self, name: &str, contents: &[u8]) -> Result<PathBuf, SynthesisError> {
        std::fs::create_dir_all(&self.case_dir).map_err(|e| SynthesisError::io(&self.case_dir, e))?;
        let path = self.case_dir.join(name);
        std::fs::write(&path, contents).map_err(|e| SynthesisError::io(&path, e))?;
        debug!(case_id = %self.case_id, path = %path.display(), bytes = contents.len(), "wrote model file");
        Ok(path)
    }
}

/// Handle to the serialised model of one case. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelDescriptor {
    case_id: CaseId,
    frontend: Frontend,
    files: Vec<PathBuf>,
    graph: Graph,
}

impl ModelDescriptor {
    pub(crate) fn new(ctx: &SynthesisContext, frontend: Frontend, files: Vec<PathBuf>, graph: Graph) -> Self {
        Self { case_id: ctx.case_id.clone(), frontend, files, graph }
    }

    pub fn case_id(&self) -> &CaseId {
        &self.case_id
    }

    pub fn frontend(&self) -> Frontend {
        self.frontend
    }

    /// Native model files: graph definition first, weights (if separate) second.
    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    pub fn primary_file(&self) -> Option<&Path> {
        self.files.first().map(PathBuf::as_path)
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    pub fn inputs(&self) -> &[TensorSpec] {
        &self.graph.inputs
    }

    pub fn outputs(&self) -> &[TensorSpec] {
        &self.graph.outputs
    }
}
