//! Caffe templates: `test.prototxt` plus a `test.caffemodel` weights blob

use crate::descriptor::{Frontend, ModelDescriptor, SynthesisContext};
use crate::graph::{EltwiseOp, Graph, Node, Op};
use crate::proto::caffe::{self as proto, BlobShape, EltwiseParameter, InputParameter, LayerParameter, NetParameter, SliceParameter};
use crate::synthesizer::{ModelSynthesizer, nchw_shape, param, usize_list_param};
use nnparity_common::{DType, SynthesisError, TensorSpec};
use nnparity_matrix::ParamTuple;
use prost::Message;
use std::fmt::Write as _;

pub const PROTOTXT_FILE: &str = "test.prototxt";
pub const CAFFEMODEL_FILE: &str = "test.caffemodel";

/// Slice with more outputs than this is miscompiled by Caffe itself.
pub const MAX_SLICE_OUTPUTS: usize = 2;

/// Four identically shaped inputs unless the tuple says otherwise.
const DEFAULT_ELTWISE_INPUTS: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaffeTemplate {
    /// `data -> Slice -> s1, s2`
    Slice,
    /// `data1..dataK -> Eltwise -> ele`
    Eltwise,
}

impl CaffeTemplate {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Slice => "slice",
            Self::Eltwise => "eltwise",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "slice" => Some(Self::Slice),
            "eltwise" => Some(Self::Eltwise),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CaffeSynthesizer {
    template: CaffeTemplate,
}

impl CaffeSynthesizer {
    pub fn new(template: CaffeTemplate) -> Self {
        Self { template }
    }

    fn slice_graph(params: &ParamTuple) -> Result<Graph, SynthesisError> {
        let shape = nchw_shape(params)?;
        let rank = shape.len() as i64;

        let raw_axis = param(params, "axis")?
            .as_i64()
            .ok_or_else(|| SynthesisError::invalid("axis", "expected an integer"))?;
        let axis = if raw_axis < 0 { raw_axis + rank } else { raw_axis };
        if !(0..rank).contains(&axis) {
            return Err(SynthesisError::invalid("axis", format!("{raw_axis} is out of range for rank {rank}")));
        }
        let axis = axis as usize;

        let points = usize_list_param(params, "slice_point")?;
        if points.is_empty() {
            return Err(SynthesisError::invalid("slice_point", "at least one slice point is required"));
        }
        if points.len() + 1 > MAX_SLICE_OUTPUTS {
            return Err(SynthesisError::GraphRejected {
                message: format!("Slice with {} outputs is not supported by the reference framework", points.len() + 1),
            });
        }

        let dim = shape[axis];
        let mut bounds = Vec::with_capacity(points.len() + 2);
        bounds.push(0);
        for &p in &points {
            if p <= *bounds.last().unwrap_or(&0) || p >= dim {
                return Err(SynthesisError::invalid(
                    "slice_point",
                    format!("points must be strictly increasing and inside (0, {dim})"),
                ));
            }
            bounds.push(p);
        }
        bounds.push(dim);

        let outputs: Vec<TensorSpec> = bounds
            .windows(2)
            .enumerate()
            .map(|(i, w)| {
                let mut out_shape = shape.clone();
                out_shape[axis] = w[1] - w[0];
                TensorSpec::new(format!("s{}", i + 1), out_shape, DType::Float32)
            })
            .collect();

        let node = Node::new(
            "slice",
            Op::Slice { axis, slice_points: points },
            ["data"],
            outputs.iter().map(|o| o.name.clone()),
        );

        Ok(Graph {
            name: "test".to_string(),
            inputs: vec![TensorSpec::new("data", shape, DType::Float32)],
            outputs,
            nodes: vec![node],
        })
    }

    fn eltwise_graph(params: &ParamTuple) -> Result<Graph, SynthesisError> {
        let shape = nchw_shape(params)?;

        let op_value = param(params, "operation")?;
        let operation = op_value
            .as_str()
            .and_then(EltwiseOp::from_name)
            .or_else(|| op_value.as_i64().and_then(EltwiseOp::from_caffe_code))
            .ok_or_else(|| SynthesisError::invalid("operation", format!("unknown eltwise operation {op_value}")))?;

        let count = match params.get("inputs") {
            Some(v) => v
                .as_i64()
                .and_then(|c| usize::try_from(c).ok())
                .ok_or_else(|| SynthesisError::invalid("inputs", "expected a non-negative integer"))?,
            None => DEFAULT_ELTWISE_INPUTS,
        };
        if count < 2 {
            return Err(SynthesisError::invalid("inputs", "eltwise needs at least two inputs"));
        }

        let inputs: Vec<TensorSpec> =
            (1..=count).map(|i| TensorSpec::new(format!("data{i}"), shape.clone(), DType::Float32)).collect();
        let node = Node::new("ele", Op::Eltwise { operation }, inputs.iter().map(|i| i.name.clone()), ["ele"]);

        Ok(Graph {
            name: "test".to_string(),
            inputs,
            outputs: vec![TensorSpec::new("ele", shape, DType::Float32)],
            nodes: vec![node],
        })
    }
}

impl ModelSynthesizer for CaffeSynthesizer {
    fn frontend(&self) -> Frontend {
        Frontend::Caffe
    }

    fn template(&self) -> &'static str {
        self.template.name()
    }

    fn exclusion_reason(&self, params: &ParamTuple) -> Option<String> {
        if self.template != CaffeTemplate::Slice {
            return None;
        }
        let outputs = params.get("slice_point").and_then(|v| v.as_list()).map(|points| points.len() + 1)?;
        (outputs > MAX_SLICE_OUTPUTS).then(|| {
            format!("Slice with {outputs} outputs is miscompiled by Caffe itself; only {MAX_SLICE_OUTPUTS} are verifiable")
        })
    }

    fn build(&self, ctx: SynthesisContext, params: &ParamTuple) -> Result<ModelDescriptor, SynthesisError> {
        let graph = match self.template {
            CaffeTemplate::Slice => Self::slice_graph(params)?,
            CaffeTemplate::Eltwise => Self::eltwise_graph(params)?,
        };
        graph.validate()?;

        let prototxt = ctx.write_file(PROTOTXT_FILE, to_prototxt(&graph).as_bytes())?;
        let caffemodel = ctx.write_file(CAFFEMODEL_FILE, &to_caffemodel(&graph)?)?;
        Ok(ModelDescriptor::new(&ctx, Frontend::Caffe, vec![prototxt, caffemodel], graph))
    }
}

/// Text-format `NetParameter`, one `Input` layer per graph input.
pub fn to_prototxt(graph: &Graph) -> String {
    let mut out = String::new();
    for input in &graph.inputs {
        let _ = writeln!(out, "layer {{\n  name: \"{0}\"\n  type: \"Input\"\n  top: \"{0}\"", input.name);
        out.push_str("  input_param {\n    shape {\n");
        for d in &input.shape {
            let _ = writeln!(out, "      dim: {d}");
        }
        out.push_str("    }\n  }\n}\n");
    }

    for node in &graph.nodes {
        let _ = writeln!(out, "layer {{\n  name: \"{}\"\n  type: \"{}\"", node.name, node.op.kind());
        for bottom in &node.inputs {
            let _ = writeln!(out, "  bottom: \"{bottom}\"");
        }
        for top in &node.outputs {
            let _ = writeln!(out, "  top: \"{top}\"");
        }
        match &node.op {
            Op::Slice { axis, slice_points } => {
                let _ = writeln!(out, "  slice_param {{\n    axis: {axis}");
                for p in slice_points {
                    let _ = writeln!(out, "    slice_point: {p}");
                }
                out.push_str("  }\n");
            }
            Op::Eltwise { operation } => {
                let _ = writeln!(out, "  eltwise_param {{\n    operation: {}\n  }}", operation.name().to_uppercase());
            }
            Op::RandomNormal { .. } | Op::Add => {}
        }
        out.push_str("}\n");
    }
    out
}

/// Binary `NetParameter`. The templates carry no learned blobs, so the
/// weights file holds the layer definitions only.
pub fn to_caffemodel(graph: &Graph) -> Result<Vec<u8>, SynthesisError> {
    let mut net = NetParameter { name: Some(graph.name.clone()), layer: Vec::new() };

    for input in &graph.inputs {
        net.layer.push(LayerParameter {
            name: Some(input.name.clone()),
            r#type: Some("Input".to_string()),
            top: vec![input.name.clone()],
            input_param: Some(InputParameter {
                shape: vec![BlobShape { dim: input.shape.iter().map(|d| *d as i64).collect() }],
            }),
            ..LayerParameter::default()
        });
    }

    for node in &graph.nodes {
        let mut layer = LayerParameter {
            name: Some(node.name.clone()),
            r#type: Some(node.op.kind().to_string()),
            bottom: node.inputs.clone(),
            top: node.outputs.clone(),
            ..LayerParameter::default()
        };
        match &node.op {
            Op::Slice { axis, slice_points } => {
                let slice_point = slice_points
                    .iter()
                    .map(|p| {
                        u32::try_from(*p)
                            .map_err(|_| SynthesisError::invalid("slice_point", format!("{p} overflows uint32")))
                    })
                    .collect::<Result<_, _>>()?;
                let axis = i32::try_from(*axis)
                    .map_err(|_| SynthesisError::invalid("axis", format!("{axis} overflows int32")))?;
                layer.slice_param = Some(SliceParameter { slice_point, axis: Some(axis) });
            }
            Op::Eltwise { operation } => {
                layer.eltwise_param = Some(EltwiseParameter { operation: Some(caffe_eltwise_op(*operation) as i32) });
            }
            Op::RandomNormal { .. } | Op::Add => {}
        }
        net.layer.push(layer);
    }

    Ok(net.encode_to_vec())
}

fn caffe_eltwise_op(operation: EltwiseOp) -> proto::EltwiseOp {
    match operation {
        EltwiseOp::Prod => proto::EltwiseOp::Prod,
        EltwiseOp::Sum => proto::EltwiseOp::Sum,
        EltwiseOp::Max => proto::EltwiseOp::Max,
    }
}
