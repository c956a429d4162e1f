//! Host-side preprocessing
//!
//! With `preprocess = true` the compiled model embeds an input pipeline: the
//! backend is fed the raw tensor (`input_type`, `input_shape`, `input_layout`)
//! while the reference engine, which runs the original model, must be fed the
//! equivalent preprocessed tensor. This module computes that equivalent:
//!
//! 1. dequantise integer inputs onto `input_range`
//! 2. `swapRB` reverses the channel axis
//! 3. `(x - mean[c]) / std[c]`
//! 4. convert to NCHW
//! 5. letterbox to the model's H x W (bilinear, aspect preserving, centred,
//!    padded with `letter_value`)
//!
//! Steps 2-4 commute, so the implementation converts the layout first.

use nnparity_common::{DType, Tensor, TensorSpec};
use nnparity_config::{Layout, PreprocessOptions};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum PreprocessError {
    #[error("input {index}: expected a rank-4 image tensor, got shape {shape:?}")]
    Rank { index: usize, shape: Vec<usize> },

    #[error("input {index}: {message}")]
    Mismatch { index: usize, message: String },

    #[error("{expected} model inputs but {actual} raw tensors")]
    Count { expected: usize, actual: usize },
}

/// Shape of the raw tensor a backend receives for `spec`.
pub fn raw_input_shape(spec: &TensorSpec, pre: &PreprocessOptions) -> Vec<usize> {
    if !pre.enabled {
        return spec.shape.clone();
    }
    if let Some(shape) = &pre.input_shape {
        return shape.clone();
    }
    match (pre.input_layout, spec.shape.as_slice()) {
        (Layout::Nhwc, [n, c, h, w]) => vec![*n, *h, *w, *c],
        _ => spec.shape.clone(),
    }
}

pub fn raw_input_dtype(spec: &TensorSpec, pre: &PreprocessOptions) -> DType {
    if pre.enabled { pre.input_type } else { spec.dtype }
}

/// Reference-side inputs equivalent to the raw backend inputs.
pub fn preprocess_inputs(
    raw: &[Tensor],
    specs: &[TensorSpec],
    pre: &PreprocessOptions,
) -> Result<Vec<Tensor>, PreprocessError> {
    if !pre.enabled {
        return Ok(raw.to_vec());
    }
    if raw.len() != specs.len() {
        return Err(PreprocessError::Count { expected: specs.len(), actual: raw.len() });
    }
    raw.iter().zip(specs).enumerate().map(|(i, (t, spec))| preprocess_one(i, t, spec, pre)).collect()
}

/// Put golden outputs into the layout the compiled model emits.
pub fn to_output_layout(outputs: Vec<Tensor>, pre: &PreprocessOptions) -> Vec<Tensor> {
    if !pre.enabled || pre.output_layout == Layout::Nchw {
        return outputs;
    }
    outputs
        .into_iter()
        .map(|t| {
            let [n, c, h, w] = t.shape()[..] else { return t };
            let values = nchw_to_nhwc(t.values(), n, c, h, w);
            Tensor::new(vec![n, h, w, c], t.dtype(), values).unwrap_or(t)
        })
        .collect()
}

fn preprocess_one(index: usize, raw: &Tensor, spec: &TensorSpec, pre: &PreprocessOptions) -> Result<Tensor, PreprocessError> {
    let mismatch = |message: String| PreprocessError::Mismatch { index, message };
    let values = dequantize(raw.values(), raw.dtype(), pre.input_range);

    let [mn, mc, mh, mw] = spec.shape[..] else {
        // Non-image inputs are only dequantised.
        if raw.shape() != spec.shape {
            return Err(mismatch(format!("raw shape {:?} differs from model shape {:?}", raw.shape(), spec.shape)));
        }
        return Tensor::new(spec.shape.clone(), spec.dtype, values).map_err(|e| mismatch(e.to_string()));
    };

    let (n, c, h, w, mut x) = match (pre.input_layout, raw.shape()) {
        (Layout::Nchw, &[n, c, h, w]) => (n, c, h, w, values),
        (Layout::Nhwc, &[n, h, w, c]) => (n, c, h, w, nhwc_to_nchw(&values, n, h, w, c)),
        _ => return Err(PreprocessError::Rank { index, shape: raw.shape().to_vec() }),
    };
    if n != mn || c != mc {
        return Err(mismatch(format!(
            "raw input has batch {n} and {c} channels but the model expects batch {mn} and {mc} channels"
        )));
    }

    let plane = h * w;
    if plane == 0 {
        return Err(mismatch(format!("raw input shape {:?} is empty", raw.shape())));
    }
    if pre.swap_rb {
        for b in 0..n {
            let image = &mut x[b * c * plane..(b + 1) * c * plane];
            for ch in 0..c / 2 {
                let (head, tail) = image.split_at_mut((c - 1 - ch) * plane);
                head[ch * plane..(ch + 1) * plane].swap_with_slice(&mut tail[..plane]);
            }
        }
    }

    for (label, list) in [("mean", &pre.mean), ("std", &pre.std)] {
        if list.len() != c && list.len() != 1 {
            return Err(mismatch(format!("{label} has {} entries for {c} channels", list.len())));
        }
    }
    let per_channel = |list: &[f32], ch: usize| if list.len() == 1 { list[0] } else { list[ch] };
    for (p, chunk) in x.chunks_mut(plane).enumerate() {
        let ch = p % c;
        let (mean, std) = (per_channel(&pre.mean, ch), per_channel(&pre.std, ch));
        for v in chunk {
            *v = (*v - mean) / std;
        }
    }

    let x = if (h, w) == (mh, mw) { x } else { letterbox(&x, n * c, (h, w), (mh, mw), pre.letter_value) };
    Tensor::new(spec.shape.clone(), spec.dtype, x).map_err(|e| mismatch(e.to_string()))
}

/// Map integer values from the dtype's natural range onto `range`.
fn dequantize(values: &[f32], dtype: DType, (lo, hi): (f32, f32)) -> Vec<f32> {
    match dtype.integer_range() {
        None => values.to_vec(),
        Some((dmin, dmax)) => {
            let scale = (hi - lo) / (dmax - dmin);
            values.iter().map(|v| lo + (v - dmin) * scale).collect()
        }
    }
}

fn nhwc_to_nchw(values: &[f32], n: usize, h: usize, w: usize, c: usize) -> Vec<f32> {
    let mut out = vec![0.0; values.len()];
    for b in 0..n {
        for y in 0..h {
            for x in 0..w {
                for ch in 0..c {
                    out[((b * c + ch) * h + y) * w + x] = values[((b * h + y) * w + x) * c + ch];
                }
            }
        }
    }
    out
}

pub fn nchw_to_nhwc(values: &[f32], n: usize, c: usize, h: usize, w: usize) -> Vec<f32> {
    let mut out = vec![0.0; values.len()];
    for b in 0..n {
        for ch in 0..c {
            for y in 0..h {
                for x in 0..w {
                    out[((b * h + y) * w + x) * c + ch] = values[((b * c + ch) * h + y) * w + x];
                }
            }
        }
    }
    out
}

/// Aspect-preserving bilinear resize of `planes` HxW planes into the centre of
/// OHxOW planes filled with `pad`.
fn letterbox(values: &[f32], planes: usize, (h, w): (usize, usize), (oh, ow): (usize, usize), pad: f32) -> Vec<f32> {
    let scale = (oh as f32 / h as f32).min(ow as f32 / w as f32);
    let nh = ((h as f32 * scale).round() as usize).clamp(1, oh);
    let nw = ((w as f32 * scale).round() as usize).clamp(1, ow);
    let (top, left) = ((oh - nh) / 2, (ow - nw) / 2);
    let (sy, sx) = (h as f32 / nh as f32, w as f32 / nw as f32);

    // Half-pixel source coordinate and its two neighbours.
    let sample = |dst: usize, s: f32, len: usize| {
        let f = ((dst as f32 + 0.5) * s - 0.5).clamp(0.0, (len - 1) as f32);
        let i0 = f.floor() as usize;
        (i0, (i0 + 1).min(len - 1), f - i0 as f32)
    };

    let mut out = vec![pad; planes * oh * ow];
    for p in 0..planes {
        let src = &values[p * h * w..(p + 1) * h * w];
        let dst = &mut out[p * oh * ow..(p + 1) * oh * ow];
        for y in 0..nh {
            let (y0, y1, dy) = sample(y, sy, h);
            for x in 0..nw {
                let (x0, x1, dx) = sample(x, sx, w);
                let top_row = src[y0 * w + x0] + (src[y0 * w + x1] - src[y0 * w + x0]) * dx;
                let bottom_row = src[y1 * w + x0] + (src[y1 * w + x1] - src[y1 * w + x0]) * dx;
                dst[(top + y) * ow + left + x] = top_row + (bottom_row - top_row) * dy;
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn enabled() -> PreprocessOptions {
        PreprocessOptions { enabled: true, ..PreprocessOptions::default() }
    }

    #[test]
    fn test_disabled_is_identity() {
        let raw = vec![Tensor::from_f32(vec![1, 1, 1, 2], vec![3.0, 4.0]).unwrap()];
        let spec = TensorSpec::new("data", vec![1, 1, 1, 2], DType::Float32);
        assert_eq!(preprocess_inputs(&raw, &[spec], &PreprocessOptions::default()).unwrap(), raw);
    }

    #[test]
    fn test_dequantize_uint8_and_int8() {
        assert_eq!(dequantize(&[0.0, 255.0], DType::Uint8, (0.0, 255.0)), [0.0, 255.0]);
        assert_eq!(dequantize(&[0.0, 255.0], DType::Uint8, (0.0, 1.0)), [0.0, 1.0]);
        assert_eq!(dequantize(&[-128.0, 127.0], DType::Int8, (-1.0, 1.0)), [-1.0, 1.0]);
        assert_eq!(dequantize(&[0.25], DType::Float32, (0.0, 255.0)), [0.25]);
    }

    #[test]
    fn test_layout_transposes_are_inverse() {
        let values: Vec<f32> = (0..24).map(|v| v as f32).collect();
        let nhwc = nchw_to_nhwc(&values, 1, 3, 2, 4);
        assert_eq!(nhwc[..3], [0.0, 8.0, 16.0]);
        assert_eq!(nhwc_to_nchw(&nhwc, 1, 2, 4, 3), values);
    }

    #[test]
    fn test_swap_rb_and_normalisation() {
        let pre = PreprocessOptions { swap_rb: true, mean: vec![1.0, 2.0, 3.0], std: vec![1.0, 2.0, 4.0], ..enabled() };
        let raw = vec![Tensor::from_f32(vec![1, 3, 1, 1], vec![10.0, 20.0, 30.0]).unwrap()];
        let spec = TensorSpec::new("data", vec![1, 3, 1, 1], DType::Float32);
        let out = preprocess_inputs(&raw, &[spec], &pre).unwrap();
        // channels become [30, 20, 10] before normalisation
        assert_eq!(out[0].values(), &[29.0, 9.0, 1.75]);
    }

    #[test]
    fn test_letterbox_pads_short_side() {
        let pre = PreprocessOptions { letter_value: -1.0, mean: vec![0.0], std: vec![1.0], ..enabled() };
        let raw = vec![Tensor::from_f32(vec![1, 1, 2, 4], vec![7.0; 8]).unwrap()];
        let spec = TensorSpec::new("data", vec![1, 1, 4, 4], DType::Float32);
        let out = preprocess_inputs(&raw, &[spec], &pre).unwrap();
        let rows: Vec<&[f32]> = out[0].values().chunks(4).collect();
        assert_eq!(rows[0], [-1.0; 4]);
        assert_eq!(rows[1], [7.0; 4]);
        assert_eq!(rows[2], [7.0; 4]);
        assert_eq!(rows[3], [-1.0; 4]);
    }

    #[test]
    fn test_uint8_nhwc_letterbox_to_model_shape() {
        let pre = PreprocessOptions {
            input_shape: Some(vec![1, 56, 56, 3]),
            input_range: (0.0, 255.0),
            input_type: DType::Uint8,
            input_layout: Layout::Nhwc,
            output_layout: Layout::Nhwc,
            letter_value: 114.0,
            ..enabled()
        };
        let spec = TensorSpec::new("data1", vec![1, 3, 26, 28], DType::Float32);
        assert_eq!(raw_input_shape(&spec, &pre), [1, 56, 56, 3]);
        assert_eq!(raw_input_dtype(&spec, &pre), DType::Uint8);

        let raw = vec![Tensor::new(vec![1, 56, 56, 3], DType::Uint8, vec![50.0; 56 * 56 * 3]).unwrap()];
        let out = preprocess_inputs(&raw, &[spec], &pre).unwrap();
        assert_eq!(out[0].shape(), [1, 3, 26, 28]);
        let row = &out[0].values()[..28];
        assert_eq!(row[0], 114.0);
        assert!((row[1] - 50.0).abs() < 1e-4);
        assert_eq!(row[27], 114.0);
    }

    #[test]
    fn test_channel_mismatch_is_reported() {
        let raw = vec![Tensor::from_f32(vec![1, 1, 2, 2], vec![0.0; 4]).unwrap()];
        let spec = TensorSpec::new("data", vec![1, 3, 2, 2], DType::Float32);
        let err = preprocess_inputs(&raw, &[spec], &enabled()).unwrap_err();
        assert!(matches!(err, PreprocessError::Mismatch { index: 0, .. }));
    }

    #[test]
    fn test_output_layout_conversion() {
        let pre = PreprocessOptions { output_layout: Layout::Nhwc, ..enabled() };
        let golden = vec![Tensor::from_f32(vec![1, 2, 1, 2], vec![1.0, 2.0, 3.0, 4.0]).unwrap()];
        let out = to_output_layout(golden, &pre);
        assert_eq!(out[0].shape(), [1, 1, 2, 2]);
        assert_eq!(out[0].values(), &[1.0, 3.0, 2.0, 4.0]);
    }
}
