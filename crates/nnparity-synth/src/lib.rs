//! Model synthesis for nnparity.
//!
//! A [`ModelSynthesizer`] turns one parameter tuple plus a fixed operator
//! template into a minimal model in the authoring front-end's native format:
//! `test.prototxt` + `test.caffemodel` for Caffe, `test.onnx` for ONNX. The
//! resulting [`ModelDescriptor`] also carries a front-end neutral [`Graph`]
//! describing what was written.

pub mod caffe;
pub mod descriptor;
pub mod graph;
pub mod onnx;
pub mod proto;
pub mod synthesizer;

pub use caffe::{CaffeSynthesizer, CaffeTemplate, MAX_SLICE_OUTPUTS};
pub use descriptor::{Frontend, ModelDescriptor, SynthesisContext};
pub use graph::{EltwiseOp, Graph, Node, Op};
pub use onnx::{OnnxSynthesizer, OnnxTemplate};
pub use synthesizer::{ModelSynthesizer, synthesizer_for};
