//! Deterministic input generation

use crate::preprocess::{raw_input_dtype, raw_input_shape};
use nnparity_common::{Tensor, TensorError, TensorSpec, numel};
use nnparity_config::PreprocessOptions;
use nnparity_matrix::CaseId;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use sha2::{Digest, Sha256};

/// Per-case RNG seed: the run seed mixed with the case id, so a case sees the
/// same inputs no matter which other cases run alongside it.
pub fn case_seed(input_seed: u64, case_id: &CaseId) -> u64 {
    let mut hasher = Sha256::new();
    hasher.update(input_seed.to_le_bytes());
    hasher.update(case_id.as_str().as_bytes());
    let digest = hasher.finalize();
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    u64::from_le_bytes(bytes)
}

/// Raw backend inputs for every model input, in declared order.
///
/// `float32` values are uniform in [-1, 1); integer values are uniform over
/// the dtype's natural range.
pub fn generate_inputs(specs: &[TensorSpec], pre: &PreprocessOptions, seed: u64) -> Result<Vec<Tensor>, TensorError> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    specs
        .iter()
        .map(|spec| {
            let shape = raw_input_shape(spec, pre);
            let dtype = raw_input_dtype(spec, pre);
            let n = numel(&shape);
            let values: Vec<f32> = match dtype.integer_range() {
                None => (0..n).map(|_| rng.random_range(-1.0f32..1.0)).collect(),
                Some((lo, hi)) => {
                    let (lo, hi) = (lo as i64, hi as i64);
                    (0..n).map(|_| rng.random_range(lo..=hi) as f32).collect()
                }
            };
            Tensor::new(shape, dtype, values)
        })
        .collect()
}
