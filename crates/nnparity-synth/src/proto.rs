//! Protobuf messages for the model formats the synthesisers write
//!
//! Only the subset of `onnx.proto` and `caffe.proto` the templates emit. Field
//! numbers and labels follow the upstream definitions, so the bytes decode
//! with the frameworks' own parsers.

/// `onnx.proto` (proto2).
pub mod onnx {
    #[derive(Clone, PartialEq, prost::Message)]
    pub struct ModelProto {
        #[prost(int64, optional, tag = "1")]
        pub ir_version: Option<i64>,
        #[prost(string, optional, tag = "2")]
        pub producer_name: Option<String>,
        #[prost(message, optional, tag = "7")]
        pub graph: Option<GraphProto>,
        #[prost(message, repeated, tag = "8")]
        pub opset_import: Vec<OperatorSetIdProto>,
    }

    #[derive(Clone, PartialEq, prost::Message)]
    pub struct OperatorSetIdProto {
        #[prost(string, optional, tag = "1")]
        pub domain: Option<String>,
        #[prost(int64, optional, tag = "2")]
        pub version: Option<i64>,
    }

    #[derive(Clone, PartialEq, prost::Message)]
    pub struct GraphProto {
        #[prost(message, repeated, tag = "1")]
        pub node: Vec<NodeProto>,
        #[prost(string, optional, tag = "2")]
        pub name: Option<String>,
        #[prost(message, repeated, tag = "11")]
        pub input: Vec<ValueInfoProto>,
        #[prost(message, repeated, tag = "12")]
        pub output: Vec<ValueInfoProto>,
    }

    #[derive(Clone, PartialEq, prost::Message)]
    pub struct NodeProto {
        #[prost(string, repeated, tag = "1")]
        pub input: Vec<String>,
        #[prost(string, repeated, tag = "2")]
        pub output: Vec<String>,
        #[prost(string, optional, tag = "3")]
        pub name: Option<String>,
        #[prost(string, optional, tag = "4")]
        pub op_type: Option<String>,
        #[prost(message, repeated, tag = "5")]
        pub attribute: Vec<AttributeProto>,
    }

    #[derive(Clone, PartialEq, prost::Message)]
    pub struct AttributeProto {
        #[prost(string, optional, tag = "1")]
        pub name: Option<String>,
        #[prost(float, optional, tag = "2")]
        pub f: Option<f32>,
        #[prost(int64, optional, tag = "3")]
        pub i: Option<i64>,
        #[prost(int64, repeated, packed = "false", tag = "8")]
        pub ints: Vec<i64>,
        #[prost(enumeration = "AttributeType", optional, tag = "20")]
        pub r#type: Option<i32>,
    }

    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
    #[repr(i32)]
    pub enum AttributeType {
        Undefined = 0,
        Float = 1,
        Int = 2,
        Ints = 7,
    }

    #[derive(Clone, PartialEq, prost::Message)]
    pub struct ValueInfoProto {
        #[prost(string, optional, tag = "1")]
        pub name: Option<String>,
        #[prost(message, optional, tag = "2")]
        pub r#type: Option<TypeProto>,
    }

    #[derive(Clone, PartialEq, prost::Message)]
    pub struct TypeProto {
        #[prost(oneof = "type_proto::Value", tags = "1")]
        pub value: Option<type_proto::Value>,
    }

    pub mod type_proto {
        #[derive(Clone, PartialEq, prost::Message)]
        pub struct Tensor {
            #[prost(int32, optional, tag = "1")]
            pub elem_type: Option<i32>,
            #[prost(message, optional, tag = "2")]
            pub shape: Option<super::TensorShapeProto>,
        }

        #[derive(Clone, PartialEq, prost::Oneof)]
        pub enum Value {
            #[prost(message, tag = "1")]
            TensorType(Tensor),
        }
    }

    #[derive(Clone, PartialEq, prost::Message)]
    pub struct TensorShapeProto {
        #[prost(message, repeated, tag = "1")]
        pub dim: Vec<tensor_shape_proto::Dimension>,
    }

    pub mod tensor_shape_proto {
        #[derive(Clone, PartialEq, prost::Message)]
        pub struct Dimension {
            #[prost(oneof = "dimension::Value", tags = "1, 2")]
            pub value: Option<dimension::Value>,
        }

        pub mod dimension {
            #[derive(Clone, PartialEq, prost::Oneof)]
            pub enum Value {
                #[prost(int64, tag = "1")]
                DimValue(i64),
                #[prost(string, tag = "2")]
                DimParam(String),
            }
        }
    }
}

/// `caffe.proto` (proto2).
pub mod caffe {
    #[derive(Clone, PartialEq, prost::Message)]
    pub struct NetParameter {
        #[prost(string, optional, tag = "1")]
        pub name: Option<String>,
        #[prost(message, repeated, tag = "100")]
        pub layer: Vec<LayerParameter>,
    }

    #[derive(Clone, PartialEq, prost::Message)]
    pub struct LayerParameter {
        #[prost(string, optional, tag = "1")]
        pub name: Option<String>,
        #[prost(string, optional, tag = "2")]
        pub r#type: Option<String>,
        #[prost(string, repeated, tag = "3")]
        pub bottom: Vec<String>,
        #[prost(string, repeated, tag = "4")]
        pub top: Vec<String>,
        #[prost(message, optional, tag = "110")]
        pub eltwise_param: Option<EltwiseParameter>,
        #[prost(message, optional, tag = "126")]
        pub slice_param: Option<SliceParameter>,
        #[prost(message, optional, tag = "143")]
        pub input_param: Option<InputParameter>,
    }

    #[derive(Clone, PartialEq, prost::Message)]
    pub struct InputParameter {
        #[prost(message, repeated, tag = "1")]
        pub shape: Vec<BlobShape>,
    }

    #[derive(Clone, PartialEq, prost::Message)]
    pub struct BlobShape {
        #[prost(int64, repeated, tag = "1")]
        pub dim: Vec<i64>,
    }

    #[derive(Clone, PartialEq, prost::Message)]
    pub struct SliceParameter {
        #[prost(uint32, repeated, packed = "false", tag = "2")]
        pub slice_point: Vec<u32>,
        #[prost(int32, optional, tag = "3")]
        pub axis: Option<i32>,
    }

    #[derive(Clone, PartialEq, prost::Message)]
    pub struct EltwiseParameter {
        #[prost(enumeration = "EltwiseOp", optional, tag = "1")]
        pub operation: Option<i32>,
    }

    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
    #[repr(i32)]
    pub enum EltwiseOp {
        Prod = 0,
        Sum = 1,
        Max = 2,
    }
}
