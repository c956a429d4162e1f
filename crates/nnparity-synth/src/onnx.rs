//! ONNX templates: a single `test.onnx` `ModelProto`

use crate::descriptor::{Frontend, ModelDescriptor, SynthesisContext};
use crate::graph::{Graph, Node, Op};
use crate::proto::onnx::{
    AttributeProto, AttributeType, GraphProto, ModelProto, NodeProto, OperatorSetIdProto, TensorShapeProto, TypeProto,
    ValueInfoProto, tensor_shape_proto, type_proto,
};
use crate::synthesizer::{ModelSynthesizer, optional_f32_param, param, usize_list_param};
use nnparity_common::{DType, SynthesisError, TensorSpec};
use nnparity_matrix::ParamTuple;
use prost::Message;

pub const ONNX_FILE: &str = "test.onnx";

const IR_VERSION: i64 = 7;
const OPSET_VERSION: i64 = 13;
const PRODUCER: &str = "nnparity";

/// `TensorProto.DataType` code.
pub fn onnx_elem_type(dtype: DType) -> i32 {
    match dtype {
        DType::Float32 => 1,
        DType::Uint8 => 2,
        DType::Int8 => 3,
        DType::Int32 => 6,
    }
}

fn dtype_from_onnx(code: i64) -> Option<DType> {
    match code {
        1 => Some(DType::Float32),
        2 => Some(DType::Uint8),
        3 => Some(DType::Int8),
        6 => Some(DType::Int32),
        _ => None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnnxTemplate {
    /// `output = input + RandomNormal(...)`
    RandomNormal,
}

impl OnnxTemplate {
    pub fn name(&self) -> &'static str {
        match self {
            Self::RandomNormal => "random_normal",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "random_normal" => Some(Self::RandomNormal),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct OnnxSynthesizer {
    template: OnnxTemplate,
}

impl OnnxSynthesizer {
    pub fn new(template: OnnxTemplate) -> Self {
        Self { template }
    }

    fn random_normal_graph(params: &ParamTuple) -> Result<Graph, SynthesisError> {
        let dtype_value = param(params, "dtype")?;
        let dtype = dtype_value
            .as_str()
            .and_then(DType::from_name)
            .or_else(|| dtype_value.as_i64().and_then(dtype_from_onnx))
            .ok_or_else(|| SynthesisError::invalid("dtype", format!("unknown dtype {dtype_value}")))?;
        if dtype != DType::Float32 {
            return Err(SynthesisError::invalid("dtype", "RandomNormal only produces float32"));
        }

        let shape = usize_list_param(params, "shape")?;
        if shape.is_empty() || shape.contains(&0) {
            return Err(SynthesisError::invalid("shape", "expected a non-empty list of positive dims"));
        }

        let mean = optional_f32_param(params, "mean")?;
        let scale = optional_f32_param(params, "scale")?;
        let seed = optional_f32_param(params, "seed")?;

        let rn = Node::new(
            "rn",
            Op::RandomNormal { dtype, mean, scale, seed, shape: shape.clone() },
            Vec::<String>::new(),
            ["rn_output"],
        );
        let add = Node::new("add", Op::Add, ["input", "rn_output"], ["output"]);

        Ok(Graph {
            name: "test-model".to_string(),
            inputs: vec![TensorSpec::new("input", shape.clone(), dtype)],
            outputs: vec![TensorSpec::new("output", shape, dtype)],
            nodes: vec![rn, add],
        })
    }
}

impl ModelSynthesizer for OnnxSynthesizer {
    fn frontend(&self) -> Frontend {
        Frontend::Onnx
    }

    fn template(&self) -> &'static str {
        self.template.name()
    }

    fn exclusion_reason(&self, params: &ParamTuple) -> Option<String> {
        match self.template {
            OnnxTemplate::RandomNormal => params
                .get("seed")
                .is_none_or(|seed| seed.is_none())
                .then(|| "RandomNormal without a seed is not reproducible, so it cannot be compared".to_string()),
        }
    }

    fn build(&self, ctx: SynthesisContext, params: &ParamTuple) -> Result<ModelDescriptor, SynthesisError> {
        let graph = match self.template {
            OnnxTemplate::RandomNormal => Self::random_normal_graph(params)?,
        };
        graph.validate()?;

        let model = ctx.write_file(ONNX_FILE, &to_model_proto(&graph))?;
        Ok(ModelDescriptor::new(&ctx, Frontend::Onnx, vec![model], graph))
    }
}

fn value_info(spec: &TensorSpec) -> ValueInfoProto {
    let dim = spec
        .shape
        .iter()
        .map(|d| tensor_shape_proto::Dimension {
            value: Some(tensor_shape_proto::dimension::Value::DimValue(*d as i64)),
        })
        .collect();
    let tensor = type_proto::Tensor { elem_type: Some(onnx_elem_type(spec.dtype)), shape: Some(TensorShapeProto { dim }) };

    ValueInfoProto {
        name: Some(spec.name.clone()),
        r#type: Some(TypeProto { value: Some(type_proto::Value::TensorType(tensor)) }),
    }
}

fn attribute(name: &str, kind: AttributeType) -> AttributeProto {
    AttributeProto { name: Some(name.to_string()), r#type: Some(kind as i32), ..AttributeProto::default() }
}

fn node_proto(node: &Node) -> NodeProto {
    let mut proto = NodeProto {
        input: node.inputs.clone(),
        output: node.outputs.clone(),
        name: Some(node.name.clone()),
        op_type: Some(node.op.kind().to_string()),
        attribute: Vec::new(),
    };

    if let Op::RandomNormal { dtype, mean, scale, seed, shape } = &node.op {
        proto.attribute.push(AttributeProto {
            i: Some(i64::from(onnx_elem_type(*dtype))),
            ..attribute("dtype", AttributeType::Int)
        });
        for (name, value) in [("mean", mean), ("scale", scale), ("seed", seed)] {
            if let Some(v) = value {
                proto.attribute.push(AttributeProto { f: Some(*v), ..attribute(name, AttributeType::Float) });
            }
        }
        proto.attribute.push(AttributeProto {
            ints: shape.iter().map(|d| *d as i64).collect(),
            ..attribute("shape", AttributeType::Ints)
        });
    }
    proto
}

/// Serialise a graph as an ONNX `ModelProto`.
pub fn to_model_proto(graph: &Graph) -> Vec<u8> {
    let graph_proto = GraphProto {
        node: graph.nodes.iter().map(node_proto).collect(),
        name: Some(graph.name.clone()),
        input: graph.inputs.iter().map(value_info).collect(),
        output: graph.outputs.iter().map(value_info).collect(),
    };

    ModelProto {
        ir_version: Some(IR_VERSION),
        producer_name: Some(PRODUCER.to_string()),
        graph: Some(graph_proto),
        opset_import: vec![OperatorSetIdProto { domain: None, version: Some(OPSET_VERSION) }],
    }
    .encode_to_vec()
}
