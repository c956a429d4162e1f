//! Front-end neutral description of a synthesised test graph
//!
//! The description is what a synthesiser serialises into the front-end's
//! native format. It travels with the [`ModelDescriptor`](crate::ModelDescriptor)
//! so compilers and engines that want a structured view do not have to parse
//! prototxt or protobuf back.

use nnparity_common::{DType, SynthesisError, TensorSpec};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// Caffe `EltwiseParameter.EltwiseOp`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EltwiseOp {
    Prod,
    Sum,
    Max,
}

impl EltwiseOp {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Prod => "prod",
            Self::Sum => "sum",
            Self::Max => "max",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "prod" => Some(Self::Prod),
            "sum" => Some(Self::Sum),
            "max" => Some(Self::Max),
            _ => None,
        }
    }

    /// Numeric value in `caffe.proto`.
    pub fn caffe_code(&self) -> i64 {
        match self {
            Self::Prod => 0,
            Self::Sum => 1,
            Self::Max => 2,
        }
    }

    pub fn from_caffe_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(Self::Prod),
            1 => Some(Self::Sum),
            2 => Some(Self::Max),
            _ => None,
        }
    }
}

impl fmt::Display for EltwiseOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Operators the templates emit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Op {
    /// Split `axis` at the given points; one output per segment.
    Slice { axis: usize, slice_points: Vec<usize> },
    /// Combine all inputs elementwise.
    Eltwise { operation: EltwiseOp },
    /// Generate a normally distributed tensor. Unset attributes are omitted
    /// from the serialised model.
    RandomNormal { dtype: DType, mean: Option<f32>, scale: Option<f32>, seed: Option<f32>, shape: Vec<usize> },
    Add,
}

impl Op {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Slice { .. } => "Slice",
            Self::Eltwise { .. } => "Eltwise",
            Self::RandomNormal { .. } => "RandomNormal",
            Self::Add => "Add",
        }
    }

    /// Whether the operator consumes randomness.
    pub fn is_stochastic(&self) -> bool {
        matches!(self, Self::RandomNormal { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub name: String,
    #[serde(flatten)]
    pub op: Op,
    pub inputs: Vec<String>,
    pub outputs: Vec<String>,
}

impl Node {
    pub fn new(
        name: impl Into<String>,
        op: Op,
        inputs: impl IntoIterator<Item = impl Into<String>>,
        outputs: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            name: name.into(),
            op,
            inputs: inputs.into_iter().map(Into::into).collect(),
            outputs: outputs.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Graph {
    pub name: String,
    pub inputs: Vec<TensorSpec>,
    pub outputs: Vec<TensorSpec>,
    pub nodes: Vec<Node>,
}

impl Graph {
    /// Structural checks a framework would perform on load: unique value
    /// names, every consumed value defined before use, every declared output
    /// produced by some node.
    pub fn validate(&self) -> Result<(), SynthesisError> {
        let mut defined: HashSet<&str> = HashSet::new();
        for input in &self.inputs {
            if !defined.insert(input.name.as_str()) {
                return Err(rejected(format!("duplicate input `{}`", input.name)));
            }
        }

        let mut node_names = HashSet::new();
        for node in &self.nodes {
            if !node_names.insert(node.name.as_str()) {
                return Err(rejected(format!("duplicate node name `{}`", node.name)));
            }
            if let Some(missing) = node.inputs.iter().find(|i| !defined.contains(i.as_str())) {
                return Err(rejected(format!("node `{}` consumes undefined value `{missing}`", node.name)));
            }
            for output in &node.outputs {
                if !defined.insert(output.as_str()) {
                    return Err(rejected(format!("value `{output}` is defined twice")));
                }
            }
        }

        for output in &self.outputs {
            if !self.nodes.iter().any(|n| n.outputs.contains(&output.name)) {
                return Err(rejected(format!("graph output `{}` is not produced by any node", output.name)));
            }
        }

        if self.outputs.is_empty() {
            return Err(rejected("graph declares no outputs"));
        }
        Ok(())
    }

    pub fn is_stochastic(&self) -> bool {
        self.nodes.iter().any(|n| n.op.is_stochastic())
    }
}

fn rejected(message: impl Into<String>) -> SynthesisError {
    SynthesisError::GraphRejected { message: message.into() }
}
