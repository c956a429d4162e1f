//! The `ModelSynthesizer` capability and template lookup

use crate::caffe::{CaffeSynthesizer, CaffeTemplate};
use crate::descriptor::{Frontend, ModelDescriptor, SynthesisContext};
use crate::onnx::{OnnxSynthesizer, OnnxTemplate};
use nnparity_common::SynthesisError;
use nnparity_matrix::{ParamTuple, ParamValue};
use std::sync::Arc;

/// Builds a minimal self-contained model for one parameter tuple.
///
/// Implementations must not keep state between calls; each call receives its
/// own [`SynthesisContext`] by value.
pub trait ModelSynthesizer: Send + Sync {
    fn frontend(&self) -> Frontend;

    /// Template name, e.g. `slice`.
    fn template(&self) -> &'static str;

    /// Why a tuple cannot yield a verifiable golden result, if it cannot.
    /// Such tuples are excluded from the matrix and never scheduled.
    fn exclusion_reason(&self, params: &ParamTuple) -> Option<String>;

    fn build(&self, ctx: SynthesisContext, params: &ParamTuple) -> Result<ModelDescriptor, SynthesisError>;
}

/// Look up the synthesiser for a `(frontend, template)` pair.
pub fn synthesizer_for(frontend: Frontend, template: &str) -> Option<Arc<dyn ModelSynthesizer>> {
    match frontend {
        Frontend::Caffe => {
            CaffeTemplate::from_name(template).map(|t| Arc::new(CaffeSynthesizer::new(t)) as Arc<dyn ModelSynthesizer>)
        }
        Frontend::Onnx => {
            OnnxTemplate::from_name(template).map(|t| Arc::new(OnnxSynthesizer::new(t)) as Arc<dyn ModelSynthesizer>)
        }
    }
}

// Parameter accessors shared by the templates.

pub(crate) fn param<'a>(params: &'a ParamTuple, name: &str) -> Result<&'a ParamValue, SynthesisError> {
    params.get(name).ok_or_else(|| SynthesisError::missing(name))
}

pub(crate) fn usize_param(params: &ParamTuple, name: &str) -> Result<usize, SynthesisError> {
    param(params, name)?
        .as_i64()
        .and_then(|v| usize::try_from(v).ok())
        .ok_or_else(|| SynthesisError::invalid(name, "expected a non-negative integer"))
}

pub(crate) fn positive_param(params: &ParamTuple, name: &str) -> Result<usize, SynthesisError> {
    match usize_param(params, name)? {
        0 => Err(SynthesisError::invalid(name, "must be positive")),
        v => Ok(v),
    }
}

pub(crate) fn usize_list_param(params: &ParamTuple, name: &str) -> Result<Vec<usize>, SynthesisError> {
    param(params, name)?
        .as_usize_list()
        .ok_or_else(|| SynthesisError::invalid(name, "expected a list of non-negative integers"))
}

/// `None` (or an absent axis) maps to `Ok(None)`.
pub(crate) fn optional_f32_param(params: &ParamTuple, name: &str) -> Result<Option<f32>, SynthesisError> {
    match params.get(name) {
        None => Ok(None),
        Some(v) if v.is_none() => Ok(None),
        Some(v) => v
            .as_f64()
            .map(|f| Some(f as f32))
            .ok_or_else(|| SynthesisError::invalid(name, "expected a number")),
    }
}

/// `[n, c, h, w]` from the conventional `n`, `i_channel`, `i_size` axes.
pub(crate) fn nchw_shape(params: &ParamTuple) -> Result<Vec<usize>, SynthesisError> {
    let n = positive_param(params, "n")?;
    let c = positive_param(params, "i_channel")?;
    match usize_list_param(params, "i_size")?.as_slice() {
        [h, w] if *h > 0 && *w > 0 => Ok(vec![n, c, *h, *w]),
        _ => Err(SynthesisError::invalid("i_size", "expected [height, width] with positive entries")),
    }
}
