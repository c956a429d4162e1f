//! Elementwise error metrics

/// `|golden - actual|` with NaN/infinity pairs that `ToleranceSpec::allows`
/// treats as equal mapping to zero and any other non-finite pairing to
/// infinity.
pub fn absolute_error(golden: f64, actual: f64) -> f64 {
    if golden.is_nan() || actual.is_nan() {
        return if golden.is_nan() && actual.is_nan() { 0.0 } else { f64::INFINITY };
    }
    if golden.is_infinite() || actual.is_infinite() {
        return if golden == actual { 0.0 } else { f64::INFINITY };
    }
    (golden - actual).abs()
}

/// `|golden - actual| / |golden|`; zero when both agree exactly, infinity
/// when the golden value is zero and the actual one is not.
pub fn relative_error(golden: f64, actual: f64) -> f64 {
    let abs = absolute_error(golden, actual);
    if abs == 0.0 {
        0.0
    } else if golden == 0.0 || !golden.is_finite() {
        f64::INFINITY
    } else {
        abs / golden.abs()
    }
}

/// Cosine similarity between two vectors.
///
/// Returns 1.0 for identical directions and for two all-zero vectors, 0.0
/// when exactly one side is all zeros or the lengths differ.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot: f64 = a.iter().zip(b).map(|(x, y)| f64::from(*x) * f64::from(*y)).sum();
    let norm_a = a.iter().map(|x| f64::from(*x).powi(2)).sum::<f64>().sqrt();
    let norm_b = b.iter().map(|x| f64::from(*x).powi(2)).sum::<f64>().sqrt();

    match (norm_a == 0.0, norm_b == 0.0) {
        (true, true) => 1.0,
        (true, false) | (false, true) => 0.0,
        _ => dot / (norm_a * norm_b),
    }
}

/// Row-major flat index to per-dimension coordinates.
pub fn unravel_index(mut flat: usize, shape: &[usize]) -> Vec<usize> {
    let mut coords = vec![0; shape.len()];
    for (axis, dim) in shape.iter().enumerate().rev() {
        if *dim == 0 {
            continue;
        }
        coords[axis] = flat % dim;
        flat /= dim;
    }
    coords
}
